use pitch_contracts::campaigns::GeneratedCampaign;
use serde_json::Value;

use crate::error::{CampaignError, CampaignResult};

const FENCE: &str = "```";

/// Finds the JSON object inside a model answer.
///
/// A fenced block wins over anything around it; a fence tagged `json` wins
/// over an untagged one. Without a usable fence, the outermost `{ .. }` span
/// of the whole text is used.
pub fn extract_json_text(text: &str) -> Option<&str> {
    let blocks = fenced_blocks(text);
    let tagged = blocks
        .iter()
        .find(|(tag, body)| tag.eq_ignore_ascii_case("json") && body.starts_with('{'));
    let untagged = blocks.iter().find(|(_, body)| body.starts_with('{'));
    if let Some((_, body)) = tagged.or(untagged) {
        return Some(*body);
    }
    brace_span(text)
}

pub fn parse_campaign_response(text: &str) -> CampaignResult<GeneratedCampaign> {
    if text.trim().is_empty() {
        return Err(CampaignError::GenerationFailure(
            "model returned an empty response".to_string(),
        ));
    }
    let Some(json_text) = extract_json_text(text) else {
        return Err(CampaignError::Parse(
            "no JSON object found in model response".to_string(),
        ));
    };
    let value: Value =
        serde_json::from_str(json_text).map_err(|err| CampaignError::Parse(err.to_string()))?;
    Ok(GeneratedCampaign::from_model_value(&value)?)
}

// (info string, trimmed body) for each closed fence, in order.
fn fenced_blocks(text: &str) -> Vec<(&str, &str)> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find(FENCE) {
        let after_open = &rest[open + FENCE.len()..];
        let (info, body_start) = match after_open.find('\n') {
            Some(newline) => (after_open[..newline].trim(), &after_open[newline + 1..]),
            None => break,
        };
        let Some(close) = body_start.find(FENCE) else {
            break;
        };
        blocks.push((info, body_start[..close].trim()));
        rest = &body_start[close + FENCE.len()..];
    }
    blocks
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
