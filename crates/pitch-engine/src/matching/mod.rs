//! Reference matching: embedding similarity first, keyword scoring as the
//! fallback.

pub mod embedding;
pub mod keyword;

use pitch_contracts::campaigns::{CampaignInput, ReferenceCampaign, ReferenceCorpus};
use serde::Serialize;

pub use embedding::{
    cosine_similarity, rank_by_embedding, EmbeddingCache, EmbeddingProvider, EmbeddingUnavailable,
    OpenAiEmbeddingProvider,
};
pub use keyword::{rank_by_keywords, score_reference};

use crate::config::MatchingConfig;

/// A reference campaign with the score that ranked it. Keyword scores are
/// whole numbers; embedding scores are cosine similarities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedReference {
    pub campaign: ReferenceCampaign,
    pub score: f64,
}

/// Which path produced a selection. Both carry the same ranked list shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceSelection {
    Embedding {
        references: Vec<RankedReference>,
    },
    Keyword {
        references: Vec<RankedReference>,
        reason: String,
    },
}

impl ReferenceSelection {
    pub fn references(&self) -> &[RankedReference] {
        match self {
            ReferenceSelection::Embedding { references }
            | ReferenceSelection::Keyword { references, .. } => references,
        }
    }

    pub fn campaigns(&self) -> Vec<ReferenceCampaign> {
        self.references()
            .iter()
            .map(|ranked| ranked.campaign.clone())
            .collect()
    }

    pub fn path(&self) -> &'static str {
        match self {
            ReferenceSelection::Embedding { .. } => "embedding",
            ReferenceSelection::Keyword { .. } => "keyword",
        }
    }

    pub fn fallback_reason(&self) -> Option<&str> {
        match self {
            ReferenceSelection::Embedding { .. } => None,
            ReferenceSelection::Keyword { reason, .. } => Some(reason),
        }
    }
}

pub struct ReferenceSelector {
    embedder: Option<Box<dyn EmbeddingProvider>>,
    cache: Option<EmbeddingCache>,
    matching: MatchingConfig,
}

impl ReferenceSelector {
    pub fn new(matching: MatchingConfig) -> Self {
        Self {
            embedder: None,
            cache: None,
            matching,
        }
    }

    pub fn with_embedder(mut self, embedder: Box<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_cache(mut self, cache: EmbeddingCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn matching(&self) -> &MatchingConfig {
        &self.matching
    }

    /// Picks at most `limit` distinct references, best first.
    ///
    /// Embedding failures and empty embedding results fall through to keyword
    /// scoring; the returned variant says which path answered.
    pub fn select(&mut self, input: &CampaignInput, corpus: &ReferenceCorpus) -> ReferenceSelection {
        let limit = self.matching.limit;
        let attempt = match self.embedder.as_deref() {
            Some(embedder) => rank_by_embedding(embedder, self.cache.as_mut(), input, corpus, limit),
            None => Err(EmbeddingUnavailable::NotConfigured),
        };

        let reason = match attempt {
            Ok(references) if !references.is_empty() => {
                tracing::info!(path = "embedding", count = references.len(), "references selected");
                return ReferenceSelection::Embedding { references };
            }
            Ok(_) => "embedding matcher returned no results".to_string(),
            Err(err) => err.to_string(),
        };

        let references = rank_by_keywords(input, corpus, &self.matching.weights, limit);
        tracing::info!(
            path = "keyword",
            count = references.len(),
            reason = %reason,
            "references selected"
        );
        ReferenceSelection::Keyword { references, reason }
    }
}
