use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use similar::TextDiff;
use uuid::Uuid;

use crate::campaigns::{CampaignInput, GeneratedCampaign};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionOrigin {
    Generated,
    CreativeDirector,
    DisruptiveDevice,
    FeedbackRefinement,
    ChatRefinement,
}

impl VersionOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionOrigin::Generated => "generated",
            VersionOrigin::CreativeDirector => "creative_director",
            VersionOrigin::DisruptiveDevice => "disruptive_device",
            VersionOrigin::FeedbackRefinement => "feedback_refinement",
            VersionOrigin::ChatRefinement => "chat_refinement",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignVersion {
    pub version_id: String,
    pub parent_version_id: Option<String>,
    pub origin: VersionOrigin,
    pub input: CampaignInput,
    pub campaign: GeneratedCampaign,
    pub campaign_diff: Option<Vec<String>>,
    pub created_at: String,
}

/// Every campaign a session produced, each linked to the version it was
/// derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignHistory {
    pub path: PathBuf,
    pub schema_version: u64,
    pub history_id: String,
    pub created_at: String,
    pub versions: Vec<CampaignVersion>,
}

impl CampaignHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            schema_version: 1,
            history_id: Uuid::new_v4().to_string(),
            created_at: now_utc_iso(),
            versions: Vec::new(),
        }
    }

    /// Loads a history file; unreadable files and malformed versions are
    /// skipped rather than failing the session.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut history = Self::new(path.clone());
        let payload = read_json(&path).unwrap_or(Value::Object(Map::new()));
        let Some(obj) = payload.as_object() else {
            return history;
        };

        history.schema_version = obj
            .get("schema_version")
            .and_then(Value::as_u64)
            .unwrap_or(history.schema_version);
        if let Some(id) = obj.get("history_id").and_then(Value::as_str) {
            history.history_id = id.to_string();
        }
        if let Some(created_at) = obj.get("created_at").and_then(Value::as_str) {
            history.created_at = created_at.to_string();
        }
        if let Some(versions) = obj.get("versions").and_then(Value::as_array) {
            history.versions = versions
                .iter()
                .filter_map(|item| serde_json::from_value::<CampaignVersion>(item.clone()).ok())
                .collect();
        }
        history
    }

    pub fn add_version(
        &mut self,
        origin: VersionOrigin,
        input: CampaignInput,
        campaign: GeneratedCampaign,
        parent_version_id: Option<String>,
    ) -> CampaignVersion {
        let campaign_diff = self
            .get(parent_version_id.as_deref())
            .map(|parent| campaign_diff(&parent.campaign, &campaign));
        let version = CampaignVersion {
            version_id: self.next_version_id(),
            parent_version_id,
            origin,
            input,
            campaign,
            campaign_diff,
            created_at: now_utc_iso(),
        };
        self.versions.push(version.clone());
        version
    }

    pub fn get(&self, version_id: Option<&str>) -> Option<&CampaignVersion> {
        let id = version_id?;
        self.versions.iter().find(|entry| entry.version_id == id)
    }

    pub fn latest(&self) -> Option<&CampaignVersion> {
        self.versions.last()
    }

    /// The chain from the root version down to `version_id`.
    pub fn lineage(&self, version_id: &str) -> Vec<&CampaignVersion> {
        let mut chain = Vec::new();
        let mut cursor = self.get(Some(version_id));
        while let Some(version) = cursor {
            if chain
                .iter()
                .any(|seen: &&CampaignVersion| seen.version_id == version.version_id)
            {
                break;
            }
            chain.push(version);
            cursor = self.get(version.parent_version_id.as_deref());
        }
        chain.reverse();
        chain
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let mut payload = Map::new();
        payload.insert(
            "schema_version".to_string(),
            Value::Number(self.schema_version.into()),
        );
        payload.insert(
            "history_id".to_string(),
            Value::String(self.history_id.clone()),
        );
        payload.insert(
            "created_at".to_string(),
            Value::String(self.created_at.clone()),
        );
        payload.insert(
            "versions".to_string(),
            serde_json::to_value(&self.versions)?,
        );
        write_json(&self.path, &Value::Object(payload))
    }

    // Versions dropped by `load` still hold their numbers.
    fn next_version_id(&self) -> String {
        let highest = self
            .versions
            .iter()
            .filter_map(|version| version.version_id.strip_prefix('v'))
            .filter_map(|number| number.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        format!("v{}", highest + 1)
    }
}

fn campaign_diff(previous: &GeneratedCampaign, current: &GeneratedCampaign) -> Vec<String> {
    let before = previous.to_pretty_json();
    let after = current.to_pretty_json();
    TextDiff::from_lines(before.as_str(), after.as_str())
        .unified_diff()
        .header("parent", "version")
        .to_string()
        .lines()
        .map(str::to_string)
        .collect()
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_json(path: &Path, payload: &Value) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(payload)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{CampaignHistory, VersionOrigin};
    use crate::campaigns::{CampaignInput, GeneratedCampaign};

    fn campaign(name: &str) -> GeneratedCampaign {
        GeneratedCampaign {
            campaign_name: name.to_string(),
            key_message: "Dinner, sorted".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn versions_link_to_parents_and_roundtrip() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("history.json");
        let mut history = CampaignHistory::new(&path);

        let v1 = history.add_version(
            VersionOrigin::Generated,
            CampaignInput::default(),
            campaign("Midnight Feast"),
            None,
        );
        let v2 = history.add_version(
            VersionOrigin::ChatRefinement,
            CampaignInput::default(),
            campaign("Midnight Snack Club"),
            Some(v1.version_id.clone()),
        );
        assert_eq!(v1.campaign_diff, None);
        let diff = v2.campaign_diff.clone().unwrap_or_default();
        assert!(diff.iter().any(|line| line.starts_with("-") && line.contains("Midnight Feast")));
        assert!(diff.iter().any(|line| line.starts_with("+") && line.contains("Midnight Snack Club")));
        history.save()?;

        let loaded = CampaignHistory::load(&path);
        assert_eq!(loaded.history_id, history.history_id);
        assert_eq!(loaded.versions.len(), 2);
        assert_eq!(loaded.versions[1].origin, VersionOrigin::ChatRefinement);
        assert_eq!(loaded.latest().map(|v| v.version_id.as_str()), Some("v2"));
        Ok(())
    }

    #[test]
    fn lineage_walks_back_to_root() {
        let mut history = CampaignHistory::new("unused.json");
        let v1 = history.add_version(
            VersionOrigin::Generated,
            CampaignInput::default(),
            campaign("A"),
            None,
        );
        let _branch = history.add_version(
            VersionOrigin::DisruptiveDevice,
            CampaignInput::default(),
            campaign("B"),
            Some(v1.version_id.clone()),
        );
        let v3 = history.add_version(
            VersionOrigin::FeedbackRefinement,
            CampaignInput::default(),
            campaign("C"),
            Some(v1.version_id.clone()),
        );
        let chain: Vec<&str> = history
            .lineage(&v3.version_id)
            .iter()
            .map(|version| version.version_id.as_str())
            .collect();
        assert_eq!(chain, vec!["v1", "v3"]);
    }

    #[test]
    fn load_of_missing_file_starts_empty() {
        let history = CampaignHistory::load("/nonexistent/history.json");
        assert!(history.versions.is_empty());
    }

    #[test]
    fn numbering_continues_past_a_malformed_version() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("history.json");
        let mut history = CampaignHistory::new(&path);
        for name in ["A", "B", "C"] {
            history.add_version(VersionOrigin::Generated, CampaignInput::default(), campaign(name), None);
        }
        history.save()?;

        let mut raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        raw["versions"][1]["origin"] = serde_json::json!("not-an-origin");
        std::fs::write(&path, serde_json::to_string(&raw)?)?;

        let mut loaded = CampaignHistory::load(&path);
        assert_eq!(loaded.versions.len(), 2);
        let next = loaded.add_version(
            VersionOrigin::ChatRefinement,
            CampaignInput::default(),
            campaign("D"),
            Some("v3".to_string()),
        );
        assert_eq!(next.version_id, "v4");
        assert_eq!(
            loaded.get(Some("v3")).map(|v| v.campaign.campaign_name.as_str()),
            Some("C")
        );
        Ok(())
    }
}
