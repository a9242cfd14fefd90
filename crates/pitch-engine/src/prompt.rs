use pitch_contracts::campaigns::{CampaignInput, GeneratedCampaign, ReferenceCampaign};
use pitch_contracts::chat::{ChatRole, ChatTranscript};

use crate::completion::PromptMessage;
use crate::generator::CreativePass;

/// References beyond this many are not shown to the model.
pub const MAX_PROMPT_REFERENCES: usize = 3;

const STRATEGIST_ROLE: &str = "You are a senior creative strategist at an award-winning advertising agency. \
You write bold, specific campaign concepts grounded in how real audiences behave.";

const CAMPAIGN_SCHEMA: &str = r#"Respond with one JSON object and nothing else, using exactly these keys:
{
  "campaignName": string,
  "keyMessage": string,
  "creativeStrategy": [string, ...],
  "executionPlan": [string, ...],
  "viralHook": string,
  "viralElement": string,
  "consumerInteraction": string,
  "expectedOutcomes": [string, ...],
  "callToAction": string,
  "creativeInsights": [string, ...]
}
campaignName, keyMessage, creativeStrategy, executionPlan and expectedOutcomes are required."#;

const CREATIVE_DIRECTOR_BRIEF: &str = "Act as the agency's executive creative director reviewing this concept. \
Sharpen the idea: make the name more memorable, the key message more emotionally precise, and cut any \
execution step that does not earn attention. Keep what already works. Return the full revised campaign.";

const DISRUPTIVE_DEVICE_BRIEF: &str = "Inject one disruptive device into this concept: an unexpected format, \
channel hijack, or cultural provocation the category has not seen. Rebuild the viral hook and the execution \
plan around that device while keeping the brand truth intact. Return the full revised campaign.";

pub fn generation_messages(
    input: &CampaignInput,
    references: &[ReferenceCampaign],
) -> Vec<PromptMessage> {
    let mut brief = String::from("Create an original marketing campaign for this brief.\n\n");
    brief.push_str(&render_brief(input));

    let shown: Vec<&ReferenceCampaign> = references.iter().take(MAX_PROMPT_REFERENCES).collect();
    if !shown.is_empty() {
        brief.push_str("\nReference campaigns for inspiration (do not copy them):\n");
        for reference in shown {
            brief.push_str(&reference_summary(reference));
        }
    }

    vec![
        PromptMessage::system(format!("{STRATEGIST_ROLE}\n\n{CAMPAIGN_SCHEMA}")),
        PromptMessage::user(brief),
    ]
}

pub fn pass_messages(
    pass: CreativePass,
    campaign: &GeneratedCampaign,
    input: &CampaignInput,
) -> Vec<PromptMessage> {
    let instruction = match pass {
        CreativePass::CreativeDirector => CREATIVE_DIRECTOR_BRIEF,
        CreativePass::DisruptiveDevice => DISRUPTIVE_DEVICE_BRIEF,
    };
    let body = format!(
        "{instruction}\n\n{}\nCurrent campaign:\n```json\n{}\n```",
        render_brief(input),
        model_facing_json(campaign)
    );
    vec![
        PromptMessage::system(format!("{STRATEGIST_ROLE}\n\n{CAMPAIGN_SCHEMA}")),
        PromptMessage::user(body),
    ]
}

/// Prompt for folding a conversation into a revised campaign.
///
/// The model only sees the transcript's user and assistant turns; the system
/// turn that opened the chat is already represented by the campaign itself.
pub fn chat_refinement_messages(
    campaign: &GeneratedCampaign,
    input: &CampaignInput,
    transcript: &ChatTranscript,
) -> Vec<PromptMessage> {
    let mut body = String::from(
        "Revise the campaign below to reflect the refinements agreed in the conversation. \
Change only what the conversation asks for; do not invent new content or remove anything \
that was not discussed.\n\n",
    );
    body.push_str(&render_brief(input));
    body.push_str("\nOriginal campaign:\n```json\n");
    body.push_str(&model_facing_json(campaign));
    body.push_str("\n```\n\nConversation:\n");
    body.push_str(&render_transcript(transcript));

    vec![
        PromptMessage::system(format!("{STRATEGIST_ROLE}\n\n{CAMPAIGN_SCHEMA}")),
        PromptMessage::user(body),
    ]
}

/// Prompt for a conversational reply about the current campaign.
pub fn advisor_messages(
    campaign: &GeneratedCampaign,
    input: &CampaignInput,
    transcript: &ChatTranscript,
) -> Vec<PromptMessage> {
    let context = format!(
        "{STRATEGIST_ROLE}\nYou are discussing the campaign below with the client. Answer briefly, \
suggest concrete changes, and do not output JSON.\n\n{}\nCampaign:\n{}",
        render_brief(input),
        model_facing_json(campaign)
    );
    let mut messages = vec![PromptMessage::system(context)];
    messages.extend(
        transcript
            .messages()
            .iter()
            .filter(|message| message.role != ChatRole::System)
            .map(|message| PromptMessage {
                role: message.role,
                content: message.content.clone(),
            }),
    );
    messages
}

pub fn render_brief(input: &CampaignInput) -> String {
    let mut out = String::new();
    out.push_str(&format!("Brand: {}\n", input.brand));
    out.push_str(&format!("Industry: {}\n", input.industry));
    push_list(&mut out, "Target audience", &input.target_audience);
    push_list(&mut out, "Objectives", &input.objectives);
    push_list(&mut out, "Emotional appeal", &input.emotional_appeal);
    push_optional(&mut out, "Campaign style", input.campaign_style.as_deref());
    push_optional(&mut out, "Brand personality", input.brand_personality.as_deref());
    push_optional(
        &mut out,
        "Additional constraints",
        input.additional_constraints.as_deref(),
    );
    out
}

/// Compact bullet summary of one reference.
pub fn reference_summary(reference: &ReferenceCampaign) -> String {
    let mut out = format!("- {} ({}, {})\n", reference.name, reference.brand, reference.industry);
    if !reference.strategy.trim().is_empty() {
        out.push_str(&format!("  - Strategy: {}\n", reference.strategy.trim()));
    }
    if !reference.outcomes.trim().is_empty() {
        out.push_str(&format!("  - Outcomes: {}\n", reference.outcomes.trim()));
    }
    if let Some(viral) = reference
        .viral_element
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        out.push_str(&format!("  - Viral element: {viral}\n"));
    }
    out
}

fn render_transcript(transcript: &ChatTranscript) -> String {
    transcript
        .messages()
        .iter()
        .filter(|message| message.role != ChatRole::System)
        .map(|message| format!("{}: {}\n", message.role.as_str(), message.content.trim()))
        .collect()
}

// Campaign JSON without the pipeline-owned fields.
fn model_facing_json(campaign: &GeneratedCampaign) -> String {
    let mut stripped = campaign.clone();
    stripped.reference_campaigns.clear();
    stripped.storytelling = None;
    stripped.to_pretty_json()
}

fn push_list(out: &mut String, label: &str, values: &[String]) {
    if !values.is_empty() {
        out.push_str(&format!("{label}: {}\n", values.join(", ")));
    }
}

fn push_optional(out: &mut String, label: &str, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) {
        out.push_str(&format!("{label}: {value}\n"));
    }
}
