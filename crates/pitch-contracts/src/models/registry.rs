use indexmap::IndexMap;

pub const COMPLETION: &str = "completion";
pub const EMBEDDING: &str = "embedding";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub provider: String,
    pub capabilities: Vec<String>,
    pub context_window: Option<u64>,
    pub dimensions: Option<u64>,
}

impl ModelSpec {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }
}

/// Known models in preference order; the first model with a capability is
/// that capability's default.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    pub fn by_capability(&self, capability: &str) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.supports(capability))
            .cloned()
            .collect()
    }

    pub fn ensure(&self, name: &str, capability: &str) -> Option<ModelSpec> {
        self.get(name)
            .filter(|model| model.supports(capability))
            .cloned()
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let rows: [(&str, &str, &str, Option<u64>, Option<u64>); 8] = [
        ("gpt-4o-mini", "openai", COMPLETION, Some(128_000), None),
        ("gpt-4o", "openai", COMPLETION, Some(128_000), None),
        ("gpt-4.1", "openai", COMPLETION, Some(1_047_576), None),
        ("gpt-4-turbo", "openai", COMPLETION, Some(128_000), None),
        ("text-embedding-3-small", "openai", EMBEDDING, None, Some(1536)),
        ("text-embedding-3-large", "openai", EMBEDDING, None, Some(3072)),
        ("text-embedding-ada-002", "openai", EMBEDDING, None, Some(1536)),
        ("dryrun-completion-1", "dryrun", COMPLETION, Some(8192), None),
    ];

    rows.into_iter()
        .map(|(name, provider, capability, context_window, dimensions)| {
            (
                name.to_string(),
                ModelSpec {
                    name: name.to_string(),
                    provider: provider.to_string(),
                    capabilities: vec![capability.to_string()],
                    context_window,
                    dimensions,
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{ModelRegistry, COMPLETION, EMBEDDING};

    #[test]
    fn default_registry_orders_openai_models_first() {
        let registry = ModelRegistry::new(None);
        let completion = registry.by_capability(COMPLETION);
        assert_eq!(completion[0].name, "gpt-4o-mini");
        assert!(completion.iter().any(|model| model.provider == "dryrun"));

        let embedding = registry.by_capability(EMBEDDING);
        assert_eq!(embedding[0].name, "text-embedding-3-small");
        assert_eq!(embedding[0].dimensions, Some(1536));
    }

    #[test]
    fn ensure_rejects_wrong_capability() {
        let registry = ModelRegistry::new(None);
        assert!(registry.ensure("gpt-4o", COMPLETION).is_some());
        assert!(registry.ensure("gpt-4o", EMBEDDING).is_none());
        assert!(registry.ensure("missing", COMPLETION).is_none());
    }
}
