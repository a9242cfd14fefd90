use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::bail;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementRating {
    Positive,
    #[default]
    Neutral,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementRatings {
    pub name: ElementRating,
    pub message: ElementRating,
    pub strategy: ElementRating,
    pub execution: ElementRating,
}

impl ElementRatings {
    /// Elements in display order, paired with their label.
    pub fn labelled(&self) -> [(&'static str, ElementRating); 4] {
        [
            ("campaign name", self.name),
            ("key message", self.message),
            ("creative strategy", self.strategy),
            ("execution plan", self.execution),
        ]
    }
}

/// One user verdict on one campaign snapshot. Written once, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub campaign_id: String,
    pub overall_rating: u8,
    #[serde(default)]
    pub ratings: ElementRatings,
    #[serde(default)]
    pub comments: String,
    pub recorded_at: String,
}

impl FeedbackRecord {
    pub fn new(
        campaign_id: impl Into<String>,
        overall_rating: u8,
        ratings: ElementRatings,
        comments: impl Into<String>,
    ) -> anyhow::Result<Self> {
        if !(1..=5).contains(&overall_rating) {
            bail!("overall rating must be between 1 and 5, got {overall_rating}");
        }
        Ok(Self {
            campaign_id: campaign_id.into(),
            overall_rating,
            ratings,
            comments: comments.into().trim().to_string(),
            recorded_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
        })
    }
}

/// Append-only `feedback.jsonl`.
#[derive(Debug, Clone)]
pub struct FeedbackStore {
    path: PathBuf,
}

impl FeedbackStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn record(&self, record: &FeedbackRecord) -> anyhow::Result<()> {
        append_jsonl(&self.path, record)
    }

    pub fn all(&self) -> anyhow::Result<Vec<FeedbackRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(raw
            .lines()
            .filter_map(|line| serde_json::from_str::<FeedbackRecord>(line).ok())
            .collect())
    }

    pub fn for_campaign(&self, campaign_id: &str) -> anyhow::Result<Vec<FeedbackRecord>> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|record| record.campaign_id == campaign_id)
            .collect())
    }
}

fn append_jsonl<T: Serialize>(path: &Path, payload: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(serde_json::to_string(payload)?.as_bytes())?;
    file.write_all(b"\n")?;
    Ok(())
}
