use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use pitch_contracts::chat::ChatRole;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Map, Value};

use crate::config::CompletionConfig;
use crate::error::{CampaignError, CampaignResult};
use crate::{map_object, short_hash, truncate_text};

/// Why a completion call is made. Drives receipts and the dry-run output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionPurpose {
    Generate,
    CreativeDirector,
    DisruptiveDevice,
    FeedbackRefinement,
    ChatRefinement,
    AdvisorReply,
}

impl CompletionPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionPurpose::Generate => "generate",
            CompletionPurpose::CreativeDirector => "creative_director",
            CompletionPurpose::DisruptiveDevice => "disruptive_device",
            CompletionPurpose::FeedbackRefinement => "feedback_refinement",
            CompletionPurpose::ChatRefinement => "chat_refinement",
            CompletionPurpose::AdvisorReply => "advisor_reply",
        }
    }

    /// Whether the model is expected to answer with a campaign JSON object.
    pub fn expects_campaign(&self) -> bool {
        !matches!(self, CompletionPurpose::AdvisorReply)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromptMessage {
    pub role: ChatRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub purpose: CompletionPurpose,
    pub model: String,
    pub messages: Vec<PromptMessage>,
    pub temperature: f64,
}

impl CompletionRequest {
    /// Wire body for an OpenAI-style `chat/completions` call.
    pub fn payload(&self) -> Value {
        let messages: Vec<Value> = self
            .messages
            .iter()
            .map(|message| {
                json!({
                    "role": message.role.as_str(),
                    "content": message.content,
                })
            })
            .collect();
        json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: String,
    pub provider_request: Map<String, Value>,
    pub provider_response: Map<String, Value>,
}

pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;
    fn complete(&self, request: &CompletionRequest) -> CampaignResult<CompletionResponse>;
}

#[derive(Default)]
pub struct CompletionProviderRegistry {
    providers: BTreeMap<String, Arc<dyn CompletionProvider>>,
}

impl CompletionProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: CompletionProvider + 'static>(&mut self, provider: P) {
        self.providers
            .insert(provider.name().to_string(), Arc::new(provider));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CompletionProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

pub fn default_completion_registry(
    config: &CompletionConfig,
    timeout: Duration,
) -> CompletionProviderRegistry {
    let mut providers = CompletionProviderRegistry::new();
    providers.register(DryrunCompletionProvider);
    providers.register(OpenAiCompletionProvider::new(config, timeout));
    providers
}

pub struct OpenAiCompletionProvider {
    api_base: String,
    api_key: Option<String>,
    timeout: Duration,
    http: HttpClient,
}

impl OpenAiCompletionProvider {
    pub fn new(config: &CompletionConfig, timeout: Duration) -> Self {
        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout,
            http: HttpClient::new(),
        }
    }

    fn post_json(&self, endpoint: &str, api_key: &str, payload: &Value) -> CampaignResult<(u16, Value)> {
        let response = self
            .http
            .post(endpoint)
            .bearer_auth(api_key)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .map_err(|err| {
                CampaignError::Network(format!("OpenAI request failed ({endpoint}): {err}"))
            })?;
        let status_code = response.status().as_u16();
        let parsed = response_json_or_error("OpenAI", response)?;
        Ok((status_code, parsed))
    }
}

impl CompletionProvider for OpenAiCompletionProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn complete(&self, request: &CompletionRequest) -> CampaignResult<CompletionResponse> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(CampaignError::Configuration(
                "OPENAI_API_KEY or OPENAI_API_KEY_BACKUP not set".to_string(),
            ));
        };
        let endpoint = format!("{}/chat/completions", self.api_base);
        let payload = request.payload();
        tracing::debug!(
            model = %request.model,
            purpose = request.purpose.as_str(),
            temperature = request.temperature,
            "sending completion request"
        );
        let (status_code, response_payload) = self.post_json(&endpoint, api_key, &payload)?;

        let text = response_payload
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        if text.is_empty() {
            return Err(CampaignError::GenerationFailure(
                "OpenAI returned an empty completion".to_string(),
            ));
        }

        let mut provider_response = map_object(json!({
            "status_code": status_code,
            "finish_reason": response_payload
                .pointer("/choices/0/finish_reason")
                .cloned()
                .unwrap_or(Value::Null),
        }));
        for key in ["id", "model", "usage"] {
            if let Some(value) = response_payload.get(key) {
                provider_response.insert(key.to_string(), value.clone());
            }
        }

        Ok(CompletionResponse {
            text,
            provider_request: map_object(json!({
                "endpoint": endpoint,
                "payload": payload,
            })),
            provider_response,
        })
    }
}

/// Offline provider producing a deterministic answer derived from the prompt.
pub struct DryrunCompletionProvider;

impl DryrunCompletionProvider {
    fn campaign_text(request: &CompletionRequest) -> String {
        let prompt = request
            .messages
            .iter()
            .map(|message| message.content.as_str())
            .collect::<Vec<&str>>()
            .join("\n");
        let brand = prompt_field(&prompt, "Brand:").unwrap_or("The Brand");
        let tag = short_hash(&format!("{}|{prompt}", request.purpose.as_str()));
        let label = match request.purpose {
            CompletionPurpose::CreativeDirector => "Directed",
            CompletionPurpose::DisruptiveDevice => "Disrupted",
            CompletionPurpose::FeedbackRefinement | CompletionPurpose::ChatRefinement => {
                "Refined"
            }
            _ => "Concept",
        };
        let campaign = json!({
            "campaignName": format!("{brand} {label} {tag}"),
            "keyMessage": format!("{brand} shows up where it matters."),
            "creativeStrategy": [
                format!("Anchor the story in what {brand} customers already do"),
                "Let the audience finish the idea in public",
            ],
            "executionPlan": [
                "Launch with a short teaser film",
                "Seed creator remixes in week two",
                "Close with a live moment tied to the product",
            ],
            "viralHook": "A challenge anyone can join in ten seconds",
            "expectedOutcomes": ["Higher unaided recall", "Earned reach above paid reach"],
            "callToAction": format!("Try {brand} today"),
            "creativeInsights": ["People share what makes them look clever"],
        });
        let body = serde_json::to_string_pretty(&campaign).unwrap_or_else(|_| "{}".to_string());
        format!("Dry-run concept:\n```json\n{body}\n```")
    }

    fn advisor_text(request: &CompletionRequest) -> String {
        let last = request
            .messages
            .iter()
            .rev()
            .find(|message| message.role == ChatRole::User)
            .map(|message| truncate_text(message.content.trim(), 120))
            .unwrap_or_default();
        format!("Noted: \"{last}\". Use /apply to fold this into a revised campaign.")
    }
}

impl CompletionProvider for DryrunCompletionProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn complete(&self, request: &CompletionRequest) -> CampaignResult<CompletionResponse> {
        let text = if request.purpose.expects_campaign() {
            Self::campaign_text(request)
        } else {
            Self::advisor_text(request)
        };
        Ok(CompletionResponse {
            text,
            provider_request: map_object(json!({
                "endpoint": "dryrun-native",
                "payload": request.payload(),
            })),
            provider_response: map_object(json!({
                "status": "ok",
                "model": request.model,
            })),
        })
    }
}

fn prompt_field<'a>(prompt: &'a str, label: &str) -> Option<&'a str> {
    prompt
        .lines()
        .filter_map(|line| line.trim().strip_prefix(label))
        .map(str::trim)
        .find(|value| !value.is_empty())
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> CampaignResult<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response.text().map_err(|err| {
        CampaignError::Network(format!("{provider} response body read failed: {err}"))
    })?;
    if !status.is_success() {
        return Err(CampaignError::Network(format!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        )));
    }
    serde_json::from_str(&body).map_err(|err| {
        CampaignError::Parse(format!("{provider} returned invalid JSON payload: {err}"))
    })
}
