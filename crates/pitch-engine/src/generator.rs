use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use pitch_contracts::campaigns::{CampaignInput, GeneratedCampaign, ReferenceCampaign};
use pitch_contracts::library::receipts::{build_receipt, write_receipt};
use pitch_contracts::library::VersionOrigin;
use serde_json::{json, Value};

use crate::completion::{
    CompletionProvider, CompletionPurpose, CompletionRequest, CompletionResponse, PromptMessage,
};
use crate::error::{CampaignError, CampaignResult};
use crate::response::parse_campaign_response;
use crate::{map_object, prompt};

/// Post-processing passes over a finished campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreativePass {
    CreativeDirector,
    DisruptiveDevice,
}

impl CreativePass {
    /// Application order when several passes are requested. The passes are
    /// not assumed to commute.
    pub const ORDER: [CreativePass; 2] = [CreativePass::CreativeDirector, CreativePass::DisruptiveDevice];

    pub fn temperature(&self) -> f64 {
        match self {
            CreativePass::CreativeDirector => 0.7,
            CreativePass::DisruptiveDevice => 0.75,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.purpose().as_str()
    }

    pub fn purpose(&self) -> CompletionPurpose {
        match self {
            CreativePass::CreativeDirector => CompletionPurpose::CreativeDirector,
            CreativePass::DisruptiveDevice => CompletionPurpose::DisruptiveDevice,
        }
    }

    pub fn origin(&self) -> VersionOrigin {
        match self {
            CreativePass::CreativeDirector => VersionOrigin::CreativeDirector,
            CreativePass::DisruptiveDevice => VersionOrigin::DisruptiveDevice,
        }
    }

    /// The requested passes in application order.
    pub fn requested(creative_director: bool, disruptive_device: bool) -> Vec<CreativePass> {
        Self::ORDER
            .into_iter()
            .filter(|pass| match pass {
                CreativePass::CreativeDirector => creative_director,
                CreativePass::DisruptiveDevice => disruptive_device,
            })
            .collect()
    }
}

/// Turns briefs into campaigns with one completion call per operation.
///
/// Nothing is retried here; a failed call is returned to the caller.
pub struct CampaignGenerator {
    provider: Arc<dyn CompletionProvider>,
    model: String,
    temperature: f64,
    receipts_dir: Option<PathBuf>,
    sequence: AtomicU64,
}

impl CampaignGenerator {
    pub fn new(provider: Arc<dyn CompletionProvider>, model: impl Into<String>, temperature: f64) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            receipts_dir: None,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn with_receipts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.receipts_dir = Some(dir.into());
        self
    }

    pub fn set_target(&mut self, provider: Arc<dyn CompletionProvider>, model: impl Into<String>) {
        self.provider = provider;
        self.model = model.into();
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Generates a campaign for `input`; the references shown to the model
    /// are embedded into the result.
    pub fn generate(
        &self,
        input: &CampaignInput,
        references: &[ReferenceCampaign],
    ) -> CampaignResult<GeneratedCampaign> {
        self.generate_for(CompletionPurpose::Generate, input, references)
    }

    pub(crate) fn generate_for(
        &self,
        purpose: CompletionPurpose,
        input: &CampaignInput,
        references: &[ReferenceCampaign],
    ) -> CampaignResult<GeneratedCampaign> {
        let messages = prompt::generation_messages(input, references);
        let mut campaign = self.complete_campaign(purpose, messages, self.temperature)?;
        campaign.reference_campaigns = references
            .iter()
            .take(prompt::MAX_PROMPT_REFERENCES)
            .cloned()
            .collect();
        Ok(campaign)
    }

    /// Runs one pass and returns a new campaign; `campaign` is left as is.
    pub fn apply_pass(
        &self,
        pass: CreativePass,
        campaign: &GeneratedCampaign,
        input: &CampaignInput,
    ) -> CampaignResult<GeneratedCampaign> {
        let messages = prompt::pass_messages(pass, campaign, input);
        let revised = self.complete_campaign(pass.purpose(), messages, pass.temperature())?;
        Ok(revised.carrying_forward(campaign))
    }

    pub(crate) fn complete_campaign(
        &self,
        purpose: CompletionPurpose,
        messages: Vec<PromptMessage>,
        temperature: f64,
    ) -> CampaignResult<GeneratedCampaign> {
        let request = self.request(purpose, messages, temperature);
        let response = match self.provider.complete(&request) {
            Ok(response) => response,
            Err(err) => {
                self.record(&request, None, Err(&err));
                return Err(err);
            }
        };
        let parsed = parse_campaign_response(&response.text);
        match &parsed {
            Ok(campaign) => self.record(
                &request,
                Some(&response),
                Ok(json!({"campaignName": campaign.campaign_name})),
            ),
            Err(err) => self.record(&request, Some(&response), Err(err)),
        }
        parsed
    }

    pub(crate) fn complete_text(
        &self,
        purpose: CompletionPurpose,
        messages: Vec<PromptMessage>,
    ) -> CampaignResult<String> {
        let request = self.request(purpose, messages, self.temperature);
        match self.provider.complete(&request) {
            Ok(response) => {
                let text = response.text.trim().to_string();
                if text.is_empty() {
                    let err = CampaignError::GenerationFailure("model returned an empty reply".to_string());
                    self.record(&request, Some(&response), Err(&err));
                    return Err(err);
                }
                self.record(&request, Some(&response), Ok(json!({"chars": text.chars().count()})));
                Ok(text)
            }
            Err(err) => {
                self.record(&request, None, Err(&err));
                Err(err)
            }
        }
    }

    fn request(
        &self,
        purpose: CompletionPurpose,
        messages: Vec<PromptMessage>,
        temperature: f64,
    ) -> CompletionRequest {
        tracing::info!(
            purpose = purpose.as_str(),
            model = %self.model,
            provider = self.provider.name(),
            temperature,
            "completion request"
        );
        CompletionRequest {
            purpose,
            model: self.model.clone(),
            messages,
            temperature,
        }
    }

    fn record(
        &self,
        request: &CompletionRequest,
        response: Option<&CompletionResponse>,
        outcome: Result<Value, &CampaignError>,
    ) {
        let outcome = match outcome {
            Ok(detail) => map_object(json!({"status": "ok", "detail": detail})),
            Err(err) => {
                tracing::warn!(purpose = request.purpose.as_str(), error = %err, "completion failed");
                map_object(json!({"status": "error", "kind": err.kind(), "message": err.to_string()}))
            }
        };
        let Some(dir) = self.receipts_dir.as_ref() else {
            return;
        };
        let provider_request = response
            .map(|response| response.provider_request.clone())
            .unwrap_or_else(|| {
                map_object(json!({
                    "provider": self.provider.name(),
                    "payload": request.payload(),
                }))
            });
        let mut payload = build_receipt(
            request.purpose.as_str(),
            &provider_request,
            response.map(|response| response.text.as_str()),
            &outcome,
        );
        if let (Some(response), Some(obj)) = (response, payload.as_object_mut()) {
            obj.insert(
                "provider_response".to_string(),
                Value::Object(response.provider_response.clone()),
            );
        }
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let path = dir.join(format!(
            "receipt-{}-{:03}-{}.json",
            chrono::Utc::now().timestamp_millis(),
            seq,
            request.purpose.as_str()
        ));
        if let Err(err) = write_receipt(&path, &payload) {
            tracing::warn!(path = %path.display(), error = %err, "receipt write failed");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use pitch_contracts::campaigns::{CampaignInput, GeneratedCampaign, ReferenceCampaign};
    use serde_json::{json, Map, Value};

    use super::{CampaignGenerator, CreativePass};
    use crate::completion::{CompletionProvider, CompletionRequest, CompletionResponse};
    use crate::error::{CampaignError, CampaignResult};

    /// Replays canned answers and records each request it receives.
    pub(crate) struct ScriptedProvider {
        answers: Mutex<VecDeque<CampaignResult<String>>>,
        pub requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedProvider {
        pub(crate) fn new(answers: Vec<CampaignResult<String>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().map(|r| r.clone()).unwrap_or_default()
        }

        pub(crate) fn call_count(&self) -> usize {
            self.requests().len()
        }
    }

    impl CompletionProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn complete(&self, request: &CompletionRequest) -> CampaignResult<CompletionResponse> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request.clone());
            }
            let answer = self
                .answers
                .lock()
                .ok()
                .and_then(|mut answers| answers.pop_front())
                .unwrap_or_else(|| Err(CampaignError::Network("script exhausted".to_string())))?;
            Ok(CompletionResponse {
                text: answer,
                provider_request: Map::new(),
                provider_response: Map::new(),
            })
        }
    }

    pub(crate) fn campaign_json(name: &str) -> String {
        let body = json!({
            "campaignName": name,
            "keyMessage": "Dinner, sorted",
            "creativeStrategy": ["Own late night"],
            "executionPlan": ["Teaser", "Launch"],
            "expectedOutcomes": ["Downloads"],
        });
        format!("Here you go:\n```json\n{body}\n```")
    }

    fn input() -> CampaignInput {
        CampaignInput {
            brand: "Acme".to_string(),
            industry: "Food Delivery".to_string(),
            ..Default::default()
        }
    }

    fn references(count: usize) -> Vec<ReferenceCampaign> {
        (0..count)
            .map(|idx| ReferenceCampaign {
                id: format!("ref-{idx}"),
                name: format!("Ref {idx}"),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn generate_embeds_references_and_uses_base_temperature() -> anyhow::Result<()> {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(campaign_json("Midnight Feast"))]));
        let generator = CampaignGenerator::new(provider.clone(), "gpt-4o-mini", 0.6);
        let campaign = generator.generate(&input(), &references(4))?;

        assert_eq!(campaign.campaign_name, "Midnight Feast");
        assert_eq!(campaign.reference_campaigns.len(), 3);
        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].temperature, 0.6);
        assert_eq!(requests[0].model, "gpt-4o-mini");
        Ok(())
    }

    #[test]
    fn passes_use_their_own_temperatures_and_keep_pipeline_fields() -> anyhow::Result<()> {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(campaign_json("Directed")),
            Ok(campaign_json("Disrupted")),
        ]));
        let generator = CampaignGenerator::new(provider.clone(), "gpt-4o-mini", 0.6);
        let mut storytelling = Map::new();
        storytelling.insert("arc".to_string(), Value::String("hero".to_string()));
        let original = GeneratedCampaign {
            campaign_name: "Original".to_string(),
            key_message: "K".to_string(),
            reference_campaigns: references(2),
            storytelling: Some(storytelling.clone()),
            ..Default::default()
        };

        let mut current = original.clone();
        for pass in CreativePass::requested(true, true) {
            current = generator.apply_pass(pass, &current, &input())?;
        }
        assert_eq!(current.campaign_name, "Disrupted");
        assert_eq!(current.reference_campaigns, original.reference_campaigns);
        assert_eq!(current.storytelling, Some(storytelling));
        assert_eq!(original.campaign_name, "Original");

        let temps: Vec<f64> = provider.requests().iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![0.7, 0.75]);
        Ok(())
    }

    #[test]
    fn requested_passes_follow_fixed_order() {
        assert_eq!(
            CreativePass::requested(true, true),
            vec![CreativePass::CreativeDirector, CreativePass::DisruptiveDevice]
        );
        assert_eq!(CreativePass::requested(false, true), vec![CreativePass::DisruptiveDevice]);
        assert!(CreativePass::requested(false, false).is_empty());
    }

    #[test]
    fn provider_and_schema_failures_propagate_and_write_receipts() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(CampaignError::Network("503".to_string())),
            Ok("{\"campaignName\": \"Half\"}".to_string()),
        ]));
        let generator = CampaignGenerator::new(provider, "gpt-4o-mini", 0.6)
            .with_receipts_dir(temp.path().join("receipts"));

        let first = generator.generate(&input(), &[]);
        assert!(matches!(first, Err(CampaignError::Network(_))));
        let second = generator.generate(&input(), &[]);
        assert!(matches!(second, Err(CampaignError::Validation(_))));

        let receipts: Vec<_> = std::fs::read_dir(temp.path().join("receipts"))?
            .filter_map(Result::ok)
            .collect();
        assert_eq!(receipts.len(), 2);
        for entry in receipts {
            let parsed: Value = serde_json::from_str(&std::fs::read_to_string(entry.path())?)?;
            assert_eq!(parsed["outcome"]["status"], json!("error"));
        }
        Ok(())
    }
}
