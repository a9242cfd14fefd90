use serde::{Deserialize, Serialize};

use super::join_nonempty;

/// The brief a user fills in before asking for a campaign.
///
/// The list fields behave as sets: [`CampaignInput::normalized`] trims them and
/// drops case-insensitive duplicates while keeping first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignInput {
    pub brand: String,
    pub industry: String,
    #[serde(default)]
    pub target_audience: Vec<String>,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub emotional_appeal: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_personality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_constraints: Option<String>,
}

impl CampaignInput {
    pub fn normalized(&self) -> Self {
        Self {
            brand: self.brand.trim().to_string(),
            industry: self.industry.trim().to_string(),
            target_audience: dedupe_set(&self.target_audience),
            objectives: dedupe_set(&self.objectives),
            emotional_appeal: dedupe_set(&self.emotional_appeal),
            campaign_style: non_blank(self.campaign_style.as_deref()),
            brand_personality: non_blank(self.brand_personality.as_deref()),
            additional_constraints: non_blank(self.additional_constraints.as_deref()),
        }
    }

    /// Returns a copy whose `additionalConstraints` is replaced by `constraints`.
    pub fn with_additional_constraints(&self, constraints: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.additional_constraints = non_blank(Some(&constraints.into()));
        next
    }

    /// Text handed to the embedding provider when matching references.
    pub fn descriptive_text(&self) -> String {
        let audience = self.target_audience.join(", ");
        let objectives = self.objectives.join(", ");
        let appeal = self.emotional_appeal.join(", ");
        join_nonempty(
            &[
                &self.brand,
                &self.industry,
                &audience,
                &objectives,
                &appeal,
                self.campaign_style.as_deref().unwrap_or_default(),
                self.brand_personality.as_deref().unwrap_or_default(),
            ],
            " ",
        )
    }
}

fn dedupe_set(values: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for value in values {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            continue;
        }
        let key = trimmed.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(trimmed.to_string());
    }
    out
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::CampaignInput;

    #[test]
    fn normalized_dedupes_sets_case_insensitively() {
        let input = CampaignInput {
            brand: " Acme ".to_string(),
            industry: "Food Delivery".to_string(),
            target_audience: vec![
                "Gen Z".to_string(),
                "gen z".to_string(),
                " ".to_string(),
                "Parents".to_string(),
            ],
            campaign_style: Some("   ".to_string()),
            ..Default::default()
        };
        let normalized = input.normalized();
        assert_eq!(normalized.brand, "Acme");
        assert_eq!(normalized.target_audience, vec!["Gen Z", "Parents"]);
        assert_eq!(normalized.campaign_style, None);
    }

    #[test]
    fn brief_parses_from_camel_case_json() -> anyhow::Result<()> {
        let input: CampaignInput = serde_json::from_str(
            r#"{"brand":"Acme","industry":"Food Delivery","targetAudience":["Gen Z"],"emotionalAppeal":["Excitement"]}"#,
        )?;
        assert_eq!(input.target_audience, vec!["Gen Z"]);
        assert!(input.objectives.is_empty());
        assert_eq!(input.additional_constraints, None);
        Ok(())
    }

    #[test]
    fn descriptive_text_skips_missing_fields() {
        let input = CampaignInput {
            brand: "Acme".to_string(),
            industry: "Food Delivery".to_string(),
            emotional_appeal: vec!["Excitement".to_string(), "Joy".to_string()],
            ..Default::default()
        };
        assert_eq!(input.descriptive_text(), "Acme Food Delivery Excitement, Joy");
    }

    #[test]
    fn with_additional_constraints_leaves_original_untouched() {
        let input = CampaignInput {
            brand: "Acme".to_string(),
            additional_constraints: Some("no celebrities".to_string()),
            ..Default::default()
        };
        let next = input.with_additional_constraints("keep it short");
        assert_eq!(input.additional_constraints.as_deref(), Some("no celebrities"));
        assert_eq!(next.additional_constraints.as_deref(), Some("keep it short"));
    }
}
