pub mod completion;
pub mod config;
pub mod error;
pub mod generator;
pub mod matching;
pub mod prompt;
pub mod refine;
pub mod response;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pitch_contracts::campaigns::{CampaignInput, GeneratedCampaign, ReferenceCorpus};
use pitch_contracts::chat::{ChatRole, ChatTranscript};
use pitch_contracts::events::{EventPayload, EventWriter};
use pitch_contracts::library::summary::{write_summary, SessionSummary};
use pitch_contracts::library::{
    CampaignHistory, CampaignLibrary, ElementRatings, FeedbackRecord, FeedbackStore,
    SavedCampaign, VersionOrigin,
};
use pitch_contracts::models::{ModelSelection, ModelSelector, COMPLETION, EMBEDDING};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

pub use completion::{
    CompletionProvider, CompletionProviderRegistry, CompletionPurpose, CompletionRequest,
    CompletionResponse, DryrunCompletionProvider, OpenAiCompletionProvider, PromptMessage,
};
pub use config::{CompletionConfig, EmbeddingConfig, EngineConfig, MatchingConfig, ScoreWeights};
pub use error::{CampaignError, CampaignResult};
pub use generator::{CampaignGenerator, CreativePass};
pub use matching::{
    EmbeddingCache, EmbeddingProvider, EmbeddingUnavailable, OpenAiEmbeddingProvider,
    RankedReference, ReferenceSelection, ReferenceSelector,
};

pub const DRYRUN_COMPLETION_MODEL: &str = "dryrun-completion-1";

/// Where a session keeps its files and what it matches against.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub session_dir: PathBuf,
    /// Defaults to `<session_dir>/library.json`.
    pub library_path: Option<PathBuf>,
    /// Defaults to `<session_dir>/embeddings.json`.
    pub embedding_cache_path: Option<PathBuf>,
    /// Defaults to the built-in corpus.
    pub corpus: Option<ReferenceCorpus>,
    /// Use the offline provider and skip embeddings.
    pub dryrun: bool,
}

impl SessionOptions {
    pub fn new(session_dir: impl Into<PathBuf>) -> Self {
        Self {
            session_dir: session_dir.into(),
            library_path: None,
            embedding_cache_path: None,
            corpus: None,
            dryrun: false,
        }
    }
}

/// The campaign a session is currently working on.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveCampaign {
    pub version_id: String,
    /// The brief as the user gave it, without feedback constraints.
    pub input: CampaignInput,
    pub campaign: GeneratedCampaign,
}

/// One user session: references, generation, passes, refinement rounds,
/// library writes. Every step is recorded in `events.jsonl` and the
/// campaign history.
pub struct CampaignEngine {
    session_dir: PathBuf,
    session_id: String,
    events: EventWriter,
    history: CampaignHistory,
    library: CampaignLibrary,
    feedback: FeedbackStore,
    corpus: ReferenceCorpus,
    selector: ReferenceSelector,
    generator: CampaignGenerator,
    providers: CompletionProviderRegistry,
    model_selector: ModelSelector,
    summary_path: PathBuf,
    started_at: String,
    active: Option<ActiveCampaign>,
    transcript: ChatTranscript,
    last_selection_path: Option<&'static str>,
    generations: u64,
    passes: u64,
    refinements: u64,
    saved_campaign_ids: Vec<String>,
}

impl CampaignEngine {
    /// Builds a session wired to the real (or dry-run) providers.
    pub fn new(config: EngineConfig, options: SessionOptions) -> CampaignResult<Self> {
        let providers =
            completion::default_completion_registry(&config.completion, config.request_timeout);
        let model_selector = ModelSelector::new(None);
        let requested = if options.dryrun {
            DRYRUN_COMPLETION_MODEL
        } else {
            config.completion.model.as_str()
        };
        let selection = model_selector
            .select(Some(requested), COMPLETION)
            .map_err(CampaignError::Configuration)?;
        if let Some(reason) = selection.fallback_reason.as_deref() {
            tracing::warn!(model = %selection.model.name, reason, "completion model fallback");
        }
        let provider = providers.get(&selection.model.provider).ok_or_else(|| {
            CampaignError::Configuration(format!(
                "no completion provider named '{}'",
                selection.model.provider
            ))
        })?;

        let embedder = default_embedder(&config, options.dryrun)?;

        let mut engine = Self::with_providers(config, options, provider.clone(), embedder)?;
        engine.providers = providers;
        engine
            .generator
            .set_target(provider, selection.model.name.clone());
        engine.emit(
            "model_selected",
            json!({
                "model": selection.model.name,
                "provider": selection.model.provider,
                "fallback_reason": selection.fallback_reason,
            }),
        )?;
        Ok(engine)
    }

    /// Builds a session around explicit providers; the completion model name
    /// is taken from `config` as is.
    pub fn with_providers(
        config: EngineConfig,
        options: SessionOptions,
        completion: Arc<dyn CompletionProvider>,
        embedder: Option<Box<dyn EmbeddingProvider>>,
    ) -> CampaignResult<Self> {
        let session_dir = options.session_dir.clone();
        std::fs::create_dir_all(&session_dir)
            .map_err(|err| CampaignError::Storage(anyhow::Error::new(err)))?;
        let session_id = session_dir
            .file_name()
            .and_then(|value| value.to_str())
            .filter(|value| !value.is_empty())
            .unwrap_or("session")
            .to_string();
        let events = EventWriter::new(session_dir.join("events.jsonl"), session_id.clone());
        let history_path = session_dir.join("history.json");
        let history = if history_path.exists() {
            CampaignHistory::load(&history_path)
        } else {
            CampaignHistory::new(&history_path)
        };
        let library = CampaignLibrary::new(
            options
                .library_path
                .clone()
                .unwrap_or_else(|| session_dir.join("library.json")),
        );
        let corpus = match options.corpus.clone() {
            Some(corpus) => corpus,
            None => ReferenceCorpus::builtin()?,
        };

        let mut selector = ReferenceSelector::new(config.matching);
        if let Some(embedder) = embedder {
            let cache_path = options
                .embedding_cache_path
                .clone()
                .unwrap_or_else(|| session_dir.join("embeddings.json"));
            selector = selector
                .with_embedder(embedder)
                .with_cache(EmbeddingCache::new(cache_path));
        }
        let generator = CampaignGenerator::new(
            completion,
            config.completion.model.clone(),
            config.completion.temperature,
        )
        .with_receipts_dir(session_dir.join("receipts"));

        let engine = Self {
            feedback: FeedbackStore::new(session_dir.join("feedback.jsonl")),
            summary_path: session_dir.join("summary.json"),
            started_at: now_utc_iso(),
            session_dir,
            session_id,
            events,
            history,
            library,
            corpus,
            selector,
            generator,
            providers: CompletionProviderRegistry::new(),
            model_selector: ModelSelector::new(None),
            active: None,
            transcript: ChatTranscript::new(),
            last_selection_path: None,
            generations: 0,
            passes: 0,
            refinements: 0,
            saved_campaign_ids: Vec::new(),
        };
        engine.emit(
            "session_started",
            json!({
                "session_dir": engine.session_dir.to_string_lossy(),
                "corpus_size": engine.corpus.len(),
                "reference_limit": engine.selector.matching().limit,
            }),
        )?;
        Ok(engine)
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn model(&self) -> &str {
        self.generator.model()
    }

    pub fn active(&self) -> Option<&ActiveCampaign> {
        self.active.as_ref()
    }

    pub fn transcript(&self) -> &ChatTranscript {
        &self.transcript
    }

    pub fn history(&self) -> &CampaignHistory {
        &self.history
    }

    pub fn library(&mut self) -> &mut CampaignLibrary {
        &mut self.library
    }

    pub fn feedback_store(&self) -> &FeedbackStore {
        &self.feedback
    }

    /// Switches the completion model for the rest of the session.
    pub fn set_model(&mut self, requested: &str) -> CampaignResult<ModelSelection> {
        let selection = self
            .model_selector
            .select(Some(requested), COMPLETION)
            .map_err(CampaignError::Configuration)?;
        let provider = self.providers.get(&selection.model.provider).ok_or_else(|| {
            CampaignError::Configuration(format!(
                "no completion provider named '{}'",
                selection.model.provider
            ))
        })?;
        self.generator
            .set_target(provider, selection.model.name.clone());
        self.emit(
            "model_selected",
            json!({
                "model": selection.model.name,
                "provider": selection.model.provider,
                "requested": requested,
                "fallback_reason": selection.fallback_reason,
            }),
        )?;
        Ok(selection)
    }

    pub fn select_references(&mut self, input: &CampaignInput) -> CampaignResult<ReferenceSelection> {
        let input = input.normalized();
        let selection = self.selector.select(&input, &self.corpus);
        self.last_selection_path = Some(selection.path());
        let ids: Vec<&str> = selection
            .references()
            .iter()
            .map(|ranked| ranked.campaign.id.as_str())
            .collect();
        self.emit(
            "references_selected",
            json!({
                "path": selection.path(),
                "reason": selection.fallback_reason(),
                "reference_ids": ids,
            }),
        )?;
        Ok(selection)
    }

    /// Selects references, generates a campaign, then applies `passes` in
    /// [`CreativePass::ORDER`]. The result becomes the active campaign and the
    /// chat transcript starts over.
    pub fn generate(
        &mut self,
        input: &CampaignInput,
        passes: &[CreativePass],
    ) -> CampaignResult<GeneratedCampaign> {
        let input = input.normalized();
        let selection = self.select_references(&input)?;
        let mut campaign = match self.generator.generate(&input, &selection.campaigns()) {
            Ok(campaign) => campaign,
            Err(err) => return Err(self.failed("generate", err)),
        };
        let mut storytelling = Map::new();
        storytelling.insert("selectionPath".to_string(), json!(selection.path()));
        if let Some(reason) = selection.fallback_reason() {
            storytelling.insert("fallbackReason".to_string(), json!(reason));
        }
        storytelling.insert("model".to_string(), json!(self.generator.model()));
        campaign.storytelling = Some(storytelling);

        let version = self.history.add_version(
            VersionOrigin::Generated,
            input.clone(),
            campaign.clone(),
            None,
        );
        self.history.save()?;
        self.generations += 1;
        self.emit(
            "campaign_generated",
            json!({
                "version_id": version.version_id,
                "campaign_name": campaign.campaign_name,
                "reference_ids": campaign
                    .reference_campaigns
                    .iter()
                    .map(|reference| reference.id.as_str())
                    .collect::<Vec<&str>>(),
            }),
        )?;
        self.activate(version.version_id, input, campaign);

        let ordered: Vec<CreativePass> = CreativePass::ORDER
            .into_iter()
            .filter(|pass| passes.contains(pass))
            .collect();
        for pass in ordered {
            self.apply_pass(pass)?;
        }
        self.active_campaign()
    }

    /// Runs one creative pass over the active campaign.
    pub fn apply_pass(&mut self, pass: CreativePass) -> CampaignResult<GeneratedCampaign> {
        let active = self.active.clone().ok_or(CampaignError::NoOriginalInput)?;
        let revised = match self.generator.apply_pass(pass, &active.campaign, &active.input) {
            Ok(revised) => revised,
            Err(err) => return Err(self.failed(pass.as_str(), err)),
        };
        let version = self.history.add_version(
            pass.origin(),
            active.input.clone(),
            revised.clone(),
            Some(active.version_id.clone()),
        );
        self.history.save()?;
        self.passes += 1;
        self.emit(
            "pass_applied",
            json!({
                "pass": pass.as_str(),
                "temperature": pass.temperature(),
                "version_id": version.version_id,
                "parent_version_id": active.version_id,
                "campaign_name": revised.campaign_name,
            }),
        )?;
        self.activate(version.version_id, active.input, revised.clone());
        Ok(revised)
    }

    /// Adds a user turn and the advisor's answer to the transcript.
    pub fn chat(&mut self, message: &str) -> CampaignResult<String> {
        let active = self.active.clone().ok_or(CampaignError::NoOriginalInput)?;
        let message = message.trim();
        if message.is_empty() {
            return Err(CampaignError::NothingToApply);
        }
        self.transcript.push(ChatRole::User, message);
        let reply = match refine::advisor_reply(
            &self.generator,
            &self.transcript,
            &active.campaign,
            &active.input,
        ) {
            Ok(reply) => reply,
            Err(err) => return Err(self.failed("advisor_reply", err)),
        };
        self.transcript.push(ChatRole::Assistant, reply.clone());
        self.emit(
            "chat_message",
            json!({
                "version_id": active.version_id,
                "transcript_len": self.transcript.len(),
            }),
        )?;
        Ok(reply)
    }

    /// Applies the conversation so far as one refinement round.
    pub fn refine_from_chat(&mut self) -> CampaignResult<GeneratedCampaign> {
        let active = self.active.clone().ok_or(CampaignError::NoOriginalInput)?;
        let revised = match refine::refine_from_chat(
            &self.generator,
            &self.transcript,
            &active.campaign,
            &active.input,
        ) {
            Ok(revised) => revised,
            Err(err) if err.is_precondition() => return Err(err),
            Err(err) => return Err(self.failed("chat_refinement", err)),
        };
        let version = self.history.add_version(
            VersionOrigin::ChatRefinement,
            active.input.clone(),
            revised.clone(),
            Some(active.version_id.clone()),
        );
        self.history.save()?;
        self.refinements += 1;
        self.emit(
            "campaign_refined",
            json!({
                "mode": "chat",
                "version_id": version.version_id,
                "parent_version_id": active.version_id,
                "transcript_len": self.transcript.len(),
                "campaign_name": revised.campaign_name,
            }),
        )?;
        self.activate(version.version_id, active.input, revised.clone());
        Ok(revised)
    }

    /// Records feedback on the active campaign, then regenerates with the
    /// feedback as constraints.
    pub fn refine_from_feedback(
        &mut self,
        overall_rating: u8,
        ratings: ElementRatings,
        comments: &str,
    ) -> CampaignResult<GeneratedCampaign> {
        let Some(active) = self.active.clone() else {
            return Err(CampaignError::NoOriginalInput);
        };
        let campaign_id = format!("{}/{}", self.history.history_id, active.version_id);
        let record = FeedbackRecord::new(campaign_id, overall_rating, ratings, comments)
            .map_err(|err| CampaignError::InvalidFeedback(err.to_string()))?;
        self.feedback.record(&record)?;
        self.emit(
            "feedback_recorded",
            json!({
                "campaign_id": record.campaign_id,
                "overall_rating": record.overall_rating,
                "ratings": record.ratings,
            }),
        )?;

        let refined = match refine::refine_from_feedback(
            &self.generator,
            Some(&active.input),
            Some(&active.campaign),
            &record,
        ) {
            Ok(refined) => refined,
            Err(err) => return Err(self.failed("feedback_refinement", err)),
        };
        let version = self.history.add_version(
            VersionOrigin::FeedbackRefinement,
            refined.input,
            refined.campaign.clone(),
            Some(active.version_id.clone()),
        );
        self.history.save()?;
        self.refinements += 1;
        self.emit(
            "campaign_refined",
            json!({
                "mode": "feedback",
                "version_id": version.version_id,
                "parent_version_id": active.version_id,
                "campaign_name": refined.campaign.campaign_name,
            }),
        )?;
        self.activate(version.version_id, active.input, refined.campaign.clone());
        Ok(refined.campaign)
    }

    /// Saves the active campaign to the library.
    pub fn save_active(&mut self) -> CampaignResult<SavedCampaign> {
        let active = self.active.clone().ok_or(CampaignError::NoOriginalInput)?;
        let saved = self.library.save(&active.input, &active.campaign)?;
        self.saved_campaign_ids.push(saved.id.clone());
        self.emit(
            "campaign_saved",
            json!({
                "id": saved.id,
                "version_id": active.version_id,
                "campaign_name": saved.campaign.campaign_name,
            }),
        )?;
        Ok(saved)
    }

    /// Writes history and the session summary.
    pub fn finish(&mut self) -> CampaignResult<SessionSummary> {
        self.history.save()?;
        let summary = SessionSummary {
            session_id: self.session_id.clone(),
            started_at: self.started_at.clone(),
            finished_at: now_utc_iso(),
            generations: self.generations,
            passes: self.passes,
            refinements: self.refinements,
            saved_campaign_ids: self.saved_campaign_ids.clone(),
        };
        let mut extra = Map::new();
        extra.insert("model".to_string(), json!(self.generator.model()));
        extra.insert("provider".to_string(), json!(self.generator.provider_name()));
        if let Some(path) = self.last_selection_path {
            extra.insert("selection_path".to_string(), json!(path));
        }
        write_summary(&self.summary_path, &summary, Some(&extra))?;
        self.emit(
            "session_finished",
            json!({
                "summary_path": self.summary_path.to_string_lossy(),
                "generations": summary.generations,
                "passes": summary.passes,
                "refinements": summary.refinements,
            }),
        )?;
        Ok(summary)
    }

    fn active_campaign(&self) -> CampaignResult<GeneratedCampaign> {
        self.active
            .as_ref()
            .map(|active| active.campaign.clone())
            .ok_or(CampaignError::NoOriginalInput)
    }

    fn activate(&mut self, version_id: String, input: CampaignInput, campaign: GeneratedCampaign) {
        self.transcript = ChatTranscript::with_system(format!(
            "Discussing campaign '{}' ({version_id}) for {}.",
            campaign.campaign_name, input.brand
        ));
        self.active = Some(ActiveCampaign {
            version_id,
            input,
            campaign,
        });
    }

    fn failed(&self, operation: &str, err: CampaignError) -> CampaignError {
        if let Err(emit_err) = self.emit(
            "generation_failed",
            json!({
                "operation": operation,
                "kind": err.kind(),
                "message": truncate_text(&err.to_string(), 512),
            }),
        ) {
            tracing::warn!(error = %emit_err, "event write failed");
        }
        err
    }

    fn emit(&self, event_type: &str, payload: Value) -> CampaignResult<Value> {
        let payload: EventPayload = map_object(payload);
        Ok(self.events.emit(event_type, payload)?)
    }
}

/// The embedding provider a session should try first, if any.
///
/// Dry runs and configurations without an API key get none, which sends
/// reference selection straight to keyword scoring.
pub fn default_embedder(
    config: &EngineConfig,
    dryrun: bool,
) -> CampaignResult<Option<Box<dyn EmbeddingProvider>>> {
    if dryrun || config.embedding.api_key.is_none() {
        return Ok(None);
    }
    let selection = ModelSelector::new(None)
        .select(Some(config.embedding.model.as_str()), EMBEDDING)
        .map_err(CampaignError::Configuration)?;
    if let Some(reason) = selection.fallback_reason.as_deref() {
        tracing::warn!(model = %selection.model.name, reason, "embedding model fallback");
    }
    let mut embedding = config.embedding.clone();
    embedding.model = selection.model.name;
    let provider: Box<dyn EmbeddingProvider> =
        Box::new(OpenAiEmbeddingProvider::new(&embedding, config.request_timeout));
    Ok(Some(provider))
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

pub(crate) fn short_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(&hasher.finalize()[..3])
}

pub(crate) fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn now_utc_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pitch_contracts::campaigns::CampaignInput;
    use pitch_contracts::events::read_events;
    use pitch_contracts::library::{ElementRating, ElementRatings, VersionOrigin};
    use serde_json::{json, Value};

    use super::{default_embedder, CampaignEngine, CreativePass, SessionOptions};
    use crate::config::EngineConfig;
    use crate::error::CampaignError;
    use crate::generator::tests::{campaign_json, ScriptedProvider};

    fn brief() -> CampaignInput {
        CampaignInput {
            brand: "Acme".to_string(),
            industry: "Food Delivery".to_string(),
            target_audience: vec!["Gen Z".to_string()],
            emotional_appeal: vec!["Excitement".to_string()],
            ..Default::default()
        }
    }

    fn event_types(path: &std::path::Path) -> anyhow::Result<Vec<String>> {
        Ok(read_events(path)?
            .into_iter()
            .filter_map(|row| row.get("type").and_then(Value::as_str).map(str::to_string))
            .collect())
    }

    #[test]
    fn full_session_records_versions_events_and_summary() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let session_dir = temp.path().join("session-1");
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(campaign_json("Midnight Feast")),
            Ok(campaign_json("Midnight Feast Directed")),
            Ok(campaign_json("Midnight Feast Disrupted")),
            Ok("Consider a club angle.".to_string()),
            Ok(campaign_json("Midnight Snack Club")),
        ]));
        let mut engine = CampaignEngine::with_providers(
            EngineConfig::default(),
            SessionOptions::new(&session_dir),
            provider.clone(),
            None,
        )?;

        let passes = [CreativePass::DisruptiveDevice, CreativePass::CreativeDirector];
        let campaign = engine.generate(&brief(), &passes)?;
        assert_eq!(campaign.campaign_name, "Midnight Feast Disrupted");
        assert_eq!(campaign.reference_campaigns[0].id, "doordash-all-the-ads");
        let storytelling = campaign.storytelling.clone().unwrap_or_default();
        assert_eq!(storytelling.get("selectionPath"), Some(&json!("keyword")));

        let temps: Vec<f64> = provider.requests().iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![0.6, 0.7, 0.75]);

        assert!(matches!(engine.refine_from_chat(), Err(CampaignError::NothingToApply)));
        assert_eq!(provider.call_count(), 3);

        let reply = engine.chat("Make it feel like a members club")?;
        assert_eq!(reply, "Consider a club angle.");
        let refined = engine.refine_from_chat()?;
        assert_eq!(refined.campaign_name, "Midnight Snack Club");
        assert_eq!(refined.reference_campaigns, campaign.reference_campaigns);
        assert_eq!(engine.transcript().len(), 1);

        let saved = engine.save_active()?;
        assert_eq!(saved.brand, "Acme");
        let summary = engine.finish()?;
        assert_eq!(summary.generations, 1);
        assert_eq!(summary.passes, 2);
        assert_eq!(summary.refinements, 1);
        assert_eq!(summary.saved_campaign_ids, vec![saved.id.clone()]);

        let origins: Vec<VersionOrigin> = engine.history().versions.iter().map(|v| v.origin).collect();
        assert_eq!(
            origins,
            vec![
                VersionOrigin::Generated,
                VersionOrigin::CreativeDirector,
                VersionOrigin::DisruptiveDevice,
                VersionOrigin::ChatRefinement,
            ]
        );
        assert_eq!(engine.library().list()?.len(), 1);

        let types = event_types(&session_dir.join("events.jsonl"))?;
        for expected in [
            "session_started",
            "references_selected",
            "campaign_generated",
            "pass_applied",
            "chat_message",
            "campaign_refined",
            "campaign_saved",
            "session_finished",
        ] {
            assert!(types.contains(&expected.to_string()), "missing {expected}");
        }
        assert!(session_dir.join("summary.json").exists());
        assert!(session_dir.join("history.json").exists());
        assert_eq!(std::fs::read_dir(session_dir.join("receipts"))?.count(), 5);
        Ok(())
    }

    #[test]
    fn feedback_round_records_feedback_and_refines() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let session_dir = temp.path().join("session-2");
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(campaign_json("Midnight Feast")),
            Ok(campaign_json("Late Shift")),
        ]));
        let mut engine = CampaignEngine::with_providers(
            EngineConfig::default(),
            SessionOptions::new(&session_dir),
            provider.clone(),
            None,
        )?;

        let ratings = ElementRatings {
            strategy: ElementRating::Negative,
            ..Default::default()
        };
        assert!(matches!(
            engine.refine_from_feedback(2, ratings, "too safe"),
            Err(CampaignError::NoOriginalInput)
        ));
        assert_eq!(provider.call_count(), 0);

        engine.generate(&brief(), &[])?;
        let refined = engine.refine_from_feedback(2, ratings, "too safe")?;
        assert_eq!(refined.campaign_name, "Late Shift");

        let records = engine.feedback_store().all()?;
        assert_eq!(records.len(), 1);
        assert!(records[0].campaign_id.ends_with("/v1"));
        let latest = engine.history().latest().cloned();
        let latest = latest.ok_or_else(|| anyhow::anyhow!("no version"))?;
        assert_eq!(latest.origin, VersionOrigin::FeedbackRefinement);
        assert!(latest
            .input
            .additional_constraints
            .unwrap_or_default()
            .contains("Reviewer comment: too safe"));
        // the active brief stays the user's own
        assert_eq!(engine.active().and_then(|a| a.input.additional_constraints.clone()), None);
        Ok(())
    }

    #[test]
    fn failed_generation_leaves_no_active_campaign() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let session_dir = temp.path().join("session-3");
        let provider = Arc::new(ScriptedProvider::new(vec![Ok("I cannot help with that.".to_string())]));
        let mut engine = CampaignEngine::with_providers(
            EngineConfig::default(),
            SessionOptions::new(&session_dir),
            provider,
            None,
        )?;

        let err = engine.generate(&brief(), &[]);
        assert!(matches!(err, Err(CampaignError::Parse(_))));
        assert!(engine.active().is_none());
        assert!(engine.history().versions.is_empty());
        assert!(matches!(engine.save_active(), Err(CampaignError::NoOriginalInput)));
        let types = event_types(&session_dir.join("events.jsonl"))?;
        assert!(types.contains(&"generation_failed".to_string()));
        Ok(())
    }

    #[test]
    fn dryrun_session_runs_offline_and_switches_models() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut options = SessionOptions::new(temp.path().join("session-4"));
        options.dryrun = true;
        let mut engine = CampaignEngine::new(EngineConfig::default(), options)?;
        assert_eq!(engine.model(), "dryrun-completion-1");

        let campaign = engine.generate(&brief(), &[CreativePass::CreativeDirector])?;
        assert!(campaign.campaign_name.starts_with("Acme Directed"));

        let selection = engine.set_model("no-such-model")?;
        assert_eq!(selection.model.name, "gpt-4o-mini");
        assert!(selection.fallback_reason.is_some());
        Ok(())
    }

    #[test]
    fn embedder_needs_a_key_and_a_live_run() -> anyhow::Result<()> {
        let mut config = EngineConfig::default();
        config.embedding.api_key = None;
        assert!(default_embedder(&config, false)?.is_none());

        config.embedding.api_key = Some("sk-test".to_string());
        assert!(default_embedder(&config, true)?.is_none());
        let embedder = default_embedder(&config, false)?;
        assert_eq!(
            embedder.map(|provider| provider.model().to_string()).as_deref(),
            Some("text-embedding-3-small")
        );
        Ok(())
    }
}
