use std::cmp::Ordering;
use std::path::PathBuf;
use std::time::Duration;

use pitch_contracts::campaigns::{CampaignInput, ReferenceCorpus};
use pitch_contracts::library::KeyedStore;
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use super::RankedReference;
use crate::config::EmbeddingConfig;
use crate::truncate_text;

/// Reasons the embedding path cannot produce a ranking.
///
/// This is a signal for the selector, never a user-facing error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmbeddingUnavailable {
    #[error("no embedding provider configured")]
    NotConfigured,
    #[error("embedding API key not set")]
    MissingCredentials,
    #[error("brief has no text to embed")]
    EmptyQuery,
    #[error("embedding request failed: {0}")]
    Transport(String),
    #[error("embedding API error: {0}")]
    Api(String),
    #[error("embedding response was empty")]
    EmptyResponse,
    #[error("embedding response had {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },
    #[error("embedding vectors disagree on dimensions")]
    DimensionMismatch,
}

pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    /// One vector per input text, in input order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingUnavailable>;
}

pub struct OpenAiEmbeddingProvider {
    api_base: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
    http: HttpClient,
}

impl OpenAiEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig, timeout: Duration) -> Self {
        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout,
            http: HttpClient::new(),
        }
    }
}

impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingUnavailable> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(EmbeddingUnavailable::MissingCredentials)?;
        let endpoint = format!("{}/embeddings", self.api_base);
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(api_key)
            .timeout(self.timeout)
            .json(&json!({"model": self.model, "input": texts}))
            .send()
            .map_err(|err| EmbeddingUnavailable::Transport(err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|err| EmbeddingUnavailable::Transport(err.to_string()))?;
        if !status.is_success() {
            return Err(EmbeddingUnavailable::Api(format!(
                "({}) {}",
                status.as_u16(),
                truncate_text(&body, 256)
            )));
        }
        let payload: Value = serde_json::from_str(&body)
            .map_err(|err| EmbeddingUnavailable::Api(format!("invalid JSON payload: {err}")))?;
        parse_embedding_rows(&payload)
    }
}

// Reads `.data[*].embedding`, ordered by `.data[*].index`.
fn parse_embedding_rows(payload: &Value) -> Result<Vec<Vec<f32>>, EmbeddingUnavailable> {
    let rows = payload
        .get("data")
        .and_then(Value::as_array)
        .ok_or(EmbeddingUnavailable::EmptyResponse)?;
    let mut indexed: Vec<(u64, Vec<f32>)> = Vec::with_capacity(rows.len());
    for (position, row) in rows.iter().enumerate() {
        let index = row
            .get("index")
            .and_then(Value::as_u64)
            .unwrap_or(position as u64);
        let vector: Vec<f32> = row
            .get("embedding")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_f64)
                    .map(|value| value as f32)
                    .collect()
            })
            .unwrap_or_default();
        indexed.push((index, vector));
    }
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}

/// Cosine similarity; 0 for empty, mismatched or zero-norm vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot_product = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum::<f32>();
    let norm_a = a.iter().map(|x| x.powi(2)).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x.powi(2)).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}

/// Reference embeddings persisted across sessions, keyed by a digest of
/// model and text.
#[derive(Debug, Clone)]
pub struct EmbeddingCache {
    store: KeyedStore,
}

impl EmbeddingCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            store: KeyedStore::lenient(path),
        }
    }

    pub fn get(&mut self, model: &str, text: &str) -> Option<Vec<f32>> {
        self.store
            .get::<Vec<f32>>(&cache_key(model, text))
            .ok()
            .flatten()
            .filter(|vector| !vector.is_empty())
    }

    pub fn put(&mut self, model: &str, text: &str, vector: &[f32]) -> anyhow::Result<()> {
        self.store.upsert(&cache_key(model, text), &vector)
    }

    pub fn flush(&mut self) -> anyhow::Result<()> {
        self.store.flush()
    }
}

fn cache_key(model: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(model.as_bytes());
    hasher.update(b"\n");
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Ranks the corpus by cosine similarity to the brief, best first.
///
/// The brief is always embedded; reference vectors come from `cache` when
/// present and the rest are embedded in the same request.
pub fn rank_by_embedding(
    provider: &dyn EmbeddingProvider,
    mut cache: Option<&mut EmbeddingCache>,
    input: &CampaignInput,
    corpus: &ReferenceCorpus,
    limit: usize,
) -> Result<Vec<RankedReference>, EmbeddingUnavailable> {
    if corpus.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }
    let query = input.descriptive_text();
    if query.trim().is_empty() {
        return Err(EmbeddingUnavailable::EmptyQuery);
    }

    let model = provider.model().to_string();
    let texts: Vec<String> = corpus
        .campaigns()
        .iter()
        .map(|reference| reference.descriptive_text())
        .collect();
    let mut vectors: Vec<Option<Vec<f32>>> = texts
        .iter()
        .map(|text| cache.as_deref_mut().and_then(|cache| cache.get(&model, text)))
        .collect();

    let missing: Vec<usize> = (0..texts.len()).filter(|idx| vectors[*idx].is_none()).collect();
    let mut request = Vec::with_capacity(missing.len() + 1);
    request.push(query);
    request.extend(missing.iter().map(|idx| texts[*idx].clone()));

    let mut embedded = provider.embed(&request)?;
    if embedded.is_empty() {
        return Err(EmbeddingUnavailable::EmptyResponse);
    }
    if embedded.len() != request.len() {
        return Err(EmbeddingUnavailable::CountMismatch {
            expected: request.len(),
            got: embedded.len(),
        });
    }
    let query_vector = embedded.remove(0);
    if query_vector.is_empty() || embedded.iter().any(Vec::is_empty) {
        return Err(EmbeddingUnavailable::EmptyResponse);
    }

    for (idx, vector) in missing.into_iter().zip(embedded) {
        if let Some(cache) = cache.as_deref_mut() {
            if let Err(err) = cache.put(&model, &texts[idx], &vector) {
                tracing::warn!(error = %err, "embedding cache write failed");
            }
        }
        vectors[idx] = Some(vector);
    }
    if let Some(cache) = cache {
        if let Err(err) = cache.flush() {
            tracing::warn!(error = %err, "embedding cache flush failed");
        }
    }

    let mut scored = Vec::with_capacity(texts.len());
    for (reference, vector) in corpus.campaigns().iter().zip(vectors) {
        let vector = vector.unwrap_or_default();
        if vector.len() != query_vector.len() {
            return Err(EmbeddingUnavailable::DimensionMismatch);
        }
        scored.push((cosine_similarity(&query_vector, &vector), reference));
    }
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    Ok(scored
        .into_iter()
        .take(limit)
        .map(|(score, reference)| RankedReference {
            campaign: reference.clone(),
            score: f64::from(score),
        })
        .collect())
}
