use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::store::KeyedStore;
use crate::campaigns::{CampaignInput, GeneratedCampaign};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedCampaign {
    pub id: String,
    pub brand: String,
    pub industry: String,
    pub saved_at: String,
    pub campaign: GeneratedCampaign,
}

/// Saved campaigns keyed by id. Entries are created once and never updated;
/// removal is by id.
#[derive(Debug, Clone)]
pub struct CampaignLibrary {
    store: KeyedStore,
}

impl CampaignLibrary {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            store: KeyedStore::new(path),
        }
    }

    pub fn save(
        &mut self,
        input: &CampaignInput,
        campaign: &GeneratedCampaign,
    ) -> anyhow::Result<SavedCampaign> {
        campaign
            .validate()
            .context("refusing to save an incomplete campaign")?;
        let entry = SavedCampaign {
            id: Uuid::new_v4().to_string(),
            brand: input.brand.clone(),
            industry: input.industry.clone(),
            saved_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            campaign: campaign.clone(),
        };
        let written = self
            .store
            .insert_new(&entry.id, &entry)
            .with_context(|| format!("failed saving to {}", self.store.path().display()))?;
        if !written {
            bail!("campaign id {} already exists", entry.id);
        }
        tracing::debug!(id = %entry.id, name = %entry.campaign.campaign_name, "campaign saved to library");
        Ok(entry)
    }

    pub fn get(&mut self, id: &str) -> anyhow::Result<Option<SavedCampaign>> {
        self.store.get(id)
    }

    /// Newest first.
    pub fn list(&mut self) -> anyhow::Result<Vec<SavedCampaign>> {
        let mut entries: Vec<SavedCampaign> = self
            .store
            .entries::<SavedCampaign>()?
            .into_iter()
            .map(|(_, entry)| entry)
            .collect();
        entries.sort_by(|left, right| right.saved_at.cmp(&left.saved_at));
        Ok(entries)
    }

    pub fn delete(&mut self, id: &str) -> anyhow::Result<bool> {
        self.store.remove(id)
    }
}
