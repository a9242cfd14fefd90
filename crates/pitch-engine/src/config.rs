//! Explicit engine configuration.
//!
//! Nothing here is read lazily from process state: callers build an
//! [`EngineConfig`] once (by hand or with [`EngineConfig::from_env`]) and pass
//! it down.

use std::env;
use std::time::Duration;

use crate::error::{CampaignError, CampaignResult};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_TEMPERATURE: f64 = 0.6;
pub const DEFAULT_REFERENCE_LIMIT: usize = 3;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    /// Base sampling temperature for generation and refinement calls.
    pub temperature: f64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_COMPLETION_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }
}

/// Additive keyword-score weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreWeights {
    pub industry: u32,
    pub audience: u32,
    pub emotion: u32,
    pub objective: u32,
    pub style: u32,
    pub personality: u32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            industry: 3,
            audience: 2,
            emotion: 2,
            objective: 1,
            style: 1,
            personality: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchingConfig {
    pub weights: ScoreWeights,
    /// Maximum number of references returned by either matcher.
    pub limit: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            limit: DEFAULT_REFERENCE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub completion: CompletionConfig,
    pub embedding: EmbeddingConfig,
    pub matching: MatchingConfig,
    pub request_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            completion: CompletionConfig::default(),
            embedding: EmbeddingConfig::default(),
            matching: MatchingConfig::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl EngineConfig {
    /// Builds a configuration from environment variables.
    ///
    /// - `OPENAI_API_KEY` (or `OPENAI_API_KEY_BACKUP`), `OPENAI_API_BASE`
    /// - `PITCH_COMPLETION_MODEL`, `PITCH_TEMPERATURE`
    /// - `PITCH_EMBEDDING_MODEL`
    /// - `PITCH_REFERENCE_LIMIT`
    /// - `PITCH_REQUEST_TIMEOUT_SECS`
    ///
    /// A missing key is not an error here; it surfaces when a call needs it.
    pub fn from_env() -> CampaignResult<Self> {
        Self::from_lookup(non_empty_env)
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CampaignResult<Self> {
        let api_key = lookup("OPENAI_API_KEY").or_else(|| lookup("OPENAI_API_KEY_BACKUP"));
        let api_base = lookup("OPENAI_API_BASE")
            .map(|value| value.trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let temperature = match lookup("PITCH_TEMPERATURE") {
            Some(raw) => parse_setting::<f64>("PITCH_TEMPERATURE", &raw)?,
            None => DEFAULT_TEMPERATURE,
        };
        if !(0.0..=2.0).contains(&temperature) {
            return Err(CampaignError::Configuration(format!(
                "PITCH_TEMPERATURE must be between 0 and 2, got {temperature}"
            )));
        }
        let limit = match lookup("PITCH_REFERENCE_LIMIT") {
            Some(raw) => parse_setting::<usize>("PITCH_REFERENCE_LIMIT", &raw)?,
            None => DEFAULT_REFERENCE_LIMIT,
        };
        let timeout_secs = match lookup("PITCH_REQUEST_TIMEOUT_SECS") {
            Some(raw) => parse_setting::<u64>("PITCH_REQUEST_TIMEOUT_SECS", &raw)?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        Ok(Self {
            completion: CompletionConfig {
                api_key: api_key.clone(),
                api_base: api_base.clone(),
                model: lookup("PITCH_COMPLETION_MODEL")
                    .unwrap_or_else(|| DEFAULT_COMPLETION_MODEL.to_string()),
                temperature,
            },
            embedding: EmbeddingConfig {
                api_key,
                api_base,
                model: lookup("PITCH_EMBEDDING_MODEL")
                    .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            },
            matching: MatchingConfig {
                weights: ScoreWeights::default(),
                limit,
            },
            request_timeout: Duration::from_secs(timeout_secs.max(1)),
        })
    }
}

fn parse_setting<T: std::str::FromStr>(key: &str, raw: &str) -> CampaignResult<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| CampaignError::Configuration(format!("{key} has an invalid value '{raw}'")))
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
