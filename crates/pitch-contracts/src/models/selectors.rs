use super::registry::{ModelRegistry, ModelSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModelSelector {
    pub registry: ModelRegistry,
}

impl ModelSelector {
    pub fn new(registry: Option<ModelRegistry>) -> Self {
        Self {
            registry: registry.unwrap_or_else(|| ModelRegistry::new(None)),
        }
    }

    /// Resolves `requested` for `capability`, falling back to the registry
    /// default and recording why.
    pub fn select(
        &self,
        requested: Option<&str>,
        capability: &str,
    ) -> Result<ModelSelection, String> {
        let requested = requested.map(str::trim).filter(|value| !value.is_empty());
        let fallback_reason = match requested {
            Some(name) => {
                if let Some(model) = self.registry.ensure(name, capability) {
                    return Ok(ModelSelection {
                        model,
                        requested: Some(name.to_string()),
                        fallback_reason: None,
                    });
                }
                format!("Requested model '{name}' unavailable for capability '{capability}'.")
            }
            None => "No model specified; using default.".to_string(),
        };

        let Some(model) = self.registry.by_capability(capability).into_iter().next() else {
            return Err(format!(
                "No models available for capability '{capability}'."
            ));
        };
        Ok(ModelSelection {
            model,
            requested: requested.map(str::to_string),
            fallback_reason: Some(fallback_reason),
        })
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::ModelSelector;
    use crate::models::{ModelRegistry, ModelSpec, COMPLETION, EMBEDDING};

    fn completion_model(name: &str) -> ModelSpec {
        ModelSpec {
            name: name.to_string(),
            provider: "openai".to_string(),
            capabilities: vec![COMPLETION.to_string()],
            context_window: None,
            dimensions: None,
        }
    }

    #[test]
    fn known_model_is_selected_without_fallback() {
        let selection = ModelSelector::new(None)
            .select(Some("gpt-4o"), COMPLETION)
            .unwrap();
        assert_eq!(selection.model.name, "gpt-4o");
        assert_eq!(selection.fallback_reason, None);
    }

    #[test]
    fn unknown_model_falls_back_with_reason() {
        let mut models = IndexMap::new();
        models.insert("house-model".to_string(), completion_model("house-model"));
        let selection = ModelSelector::new(Some(ModelRegistry::new(Some(models))))
            .select(Some("missing"), COMPLETION)
            .unwrap();
        assert_eq!(selection.model.name, "house-model");
        assert_eq!(selection.requested.as_deref(), Some("missing"));
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("Requested model 'missing' unavailable for capability 'completion'.")
        );
    }

    #[test]
    fn blank_request_uses_default() {
        let selection = ModelSelector::new(None).select(Some("  "), EMBEDDING).unwrap();
        assert_eq!(selection.model.name, "text-embedding-3-small");
        assert_eq!(selection.requested, None);
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("No model specified; using default.")
        );
    }

    #[test]
    fn missing_capability_is_an_error() {
        let mut models = IndexMap::new();
        models.insert("house-model".to_string(), completion_model("house-model"));
        let err = ModelSelector::new(Some(ModelRegistry::new(Some(models))))
            .select(None, EMBEDDING)
            .err()
            .unwrap_or_default();
        assert_eq!(err, "No models available for capability 'embedding'.");
    }
}
