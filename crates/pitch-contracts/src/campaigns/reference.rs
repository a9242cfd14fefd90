use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::join_nonempty;

const BUILTIN_CORPUS_JSON: &str = include_str!("../../resources/reference_campaigns.json");

/// A past campaign used as creative context for generation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceCampaign {
    pub id: String,
    pub name: String,
    pub brand: String,
    pub industry: String,
    #[serde(default)]
    pub target_audience: Vec<String>,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub emotional_appeal: Vec<String>,
    #[serde(default)]
    pub strategy: String,
    #[serde(default)]
    pub outcomes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creative_activation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viral_element: Option<String>,
}

impl ReferenceCampaign {
    pub fn descriptive_text(&self) -> String {
        let audience = self.target_audience.join(", ");
        let objectives = self.objectives.join(", ");
        let appeal = self.emotional_appeal.join(", ");
        join_nonempty(
            &[
                &self.name,
                &self.brand,
                &self.industry,
                &audience,
                &objectives,
                &appeal,
                &self.strategy,
                &self.outcomes,
                self.creative_activation.as_deref().unwrap_or_default(),
                self.viral_element.as_deref().unwrap_or_default(),
            ],
            " ",
        )
    }
}

/// Read-only collection of reference campaigns, in corpus order.
///
/// Entries sharing an id are collapsed on construction; the first one wins.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReferenceCorpus {
    campaigns: Vec<ReferenceCampaign>,
}

impl ReferenceCorpus {
    pub fn new(campaigns: Vec<ReferenceCampaign>) -> Self {
        let mut unique: Vec<ReferenceCampaign> = Vec::with_capacity(campaigns.len());
        for campaign in campaigns {
            if unique.iter().any(|existing| existing.id == campaign.id) {
                continue;
            }
            unique.push(campaign);
        }
        Self { campaigns: unique }
    }

    /// The corpus that ships with the crate.
    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_json_str(BUILTIN_CORPUS_JSON).context("built-in reference corpus is invalid")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed reading corpus {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("failed parsing corpus {}", path.display()))
    }

    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let campaigns: Vec<ReferenceCampaign> = serde_json::from_str(raw)?;
        Ok(Self::new(campaigns))
    }

    pub fn campaigns(&self) -> &[ReferenceCampaign] {
        self.campaigns.as_slice()
    }

    pub fn get(&self, id: &str) -> Option<&ReferenceCampaign> {
        self.campaigns.iter().find(|campaign| campaign.id == id)
    }

    pub fn len(&self) -> usize {
        self.campaigns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.campaigns.is_empty()
    }
}
