use pitch_contracts::campaigns::{CampaignInput, GeneratedCampaign};
use pitch_contracts::chat::ChatTranscript;
use pitch_contracts::library::{ElementRating, FeedbackRecord};

use crate::completion::CompletionPurpose;
use crate::error::{CampaignError, CampaignResult};
use crate::generator::CampaignGenerator;
use crate::prompt;

/// Result of a feedback round: the augmented brief and the campaign it
/// produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackRefinement {
    pub input: CampaignInput,
    pub campaign: GeneratedCampaign,
}

/// Summarises a feedback record as generation constraints.
pub fn feedback_constraints(feedback: &FeedbackRecord) -> String {
    let mut lines = vec![format!(
        "Feedback on the previous concept: overall {}/5.",
        feedback.overall_rating
    )];
    let labelled = feedback.ratings.labelled();
    let keep: Vec<&str> = labelled
        .iter()
        .filter(|(_, rating)| *rating == ElementRating::Positive)
        .map(|(label, _)| *label)
        .collect();
    let rework: Vec<&str> = labelled
        .iter()
        .filter(|(_, rating)| *rating == ElementRating::Negative)
        .map(|(label, _)| *label)
        .collect();
    if !keep.is_empty() {
        lines.push(format!("Keep the spirit of the {}.", keep.join(", ")));
    }
    if !rework.is_empty() {
        lines.push(format!("Rework the {} substantially.", rework.join(", ")));
    }
    if !feedback.comments.trim().is_empty() {
        lines.push(format!("Reviewer comment: {}", feedback.comments.trim()));
    }
    lines.join("\n")
}

/// Re-runs generation with the feedback folded into `additionalConstraints`.
///
/// `previous_input` is the brief the rated campaign came from; without it
/// the round fails with `NoOriginalInput` before any call is made.
pub fn refine_from_feedback(
    generator: &CampaignGenerator,
    previous_input: Option<&CampaignInput>,
    previous: Option<&GeneratedCampaign>,
    feedback: &FeedbackRecord,
) -> CampaignResult<FeedbackRefinement> {
    let Some(previous_input) = previous_input else {
        return Err(CampaignError::NoOriginalInput);
    };

    let summary = feedback_constraints(feedback);
    let constraints = match previous_input
        .additional_constraints
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        Some(existing) => format!("{existing}\n\n{summary}"),
        None => summary,
    };
    let input = previous_input.with_additional_constraints(constraints);
    let references = previous
        .map(|campaign| campaign.reference_campaigns.clone())
        .unwrap_or_default();

    tracing::info!(
        overall = feedback.overall_rating,
        references = references.len(),
        "feedback refinement"
    );
    let mut campaign =
        generator.generate_for(CompletionPurpose::FeedbackRefinement, &input, &references)?;
    if let Some(previous) = previous {
        campaign = campaign.carrying_forward(previous);
    }
    Ok(FeedbackRefinement { input, campaign })
}

/// Folds the conversation into a revised campaign.
///
/// A transcript without a real exchange yields `NothingToApply` and no call.
pub fn refine_from_chat(
    generator: &CampaignGenerator,
    transcript: &ChatTranscript,
    previous: &GeneratedCampaign,
    input: &CampaignInput,
) -> CampaignResult<GeneratedCampaign> {
    if !transcript.has_exchange() {
        return Err(CampaignError::NothingToApply);
    }
    tracing::info!(messages = transcript.len(), "chat refinement");
    let messages = prompt::chat_refinement_messages(previous, input, transcript);
    let revised = generator.complete_campaign(
        CompletionPurpose::ChatRefinement,
        messages,
        generator.temperature(),
    )?;
    Ok(revised.carrying_forward(previous))
}

/// One advisor turn answering the latest user message.
pub fn advisor_reply(
    generator: &CampaignGenerator,
    transcript: &ChatTranscript,
    campaign: &GeneratedCampaign,
    input: &CampaignInput,
) -> CampaignResult<String> {
    if !transcript.has_exchange() {
        return Err(CampaignError::NothingToApply);
    }
    let messages = prompt::advisor_messages(campaign, input, transcript);
    generator.complete_text(CompletionPurpose::AdvisorReply, messages)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pitch_contracts::campaigns::{CampaignInput, GeneratedCampaign, ReferenceCampaign};
    use pitch_contracts::chat::{ChatRole, ChatTranscript};
    use pitch_contracts::library::{ElementRating, ElementRatings, FeedbackRecord};
    use serde_json::{Map, Value};

    use super::{advisor_reply, feedback_constraints, refine_from_chat, refine_from_feedback};
    use crate::completion::CompletionPurpose;
    use crate::error::CampaignError;
    use crate::generator::tests::{campaign_json, ScriptedProvider};
    use crate::generator::CampaignGenerator;

    fn input() -> CampaignInput {
        CampaignInput {
            brand: "Acme".to_string(),
            industry: "Food Delivery".to_string(),
            additional_constraints: Some("No celebrities".to_string()),
            ..Default::default()
        }
    }

    fn previous() -> GeneratedCampaign {
        let mut storytelling = Map::new();
        storytelling.insert("selectionPath".to_string(), Value::String("keyword".to_string()));
        GeneratedCampaign {
            campaign_name: "Midnight Feast".to_string(),
            key_message: "Dinner, sorted".to_string(),
            creative_strategy: vec!["Own late night".to_string()],
            reference_campaigns: vec![ReferenceCampaign {
                id: "doordash-all-the-ads".to_string(),
                ..Default::default()
            }],
            storytelling: Some(storytelling),
            ..Default::default()
        }
    }

    fn feedback() -> anyhow::Result<FeedbackRecord> {
        let ratings = ElementRatings {
            name: ElementRating::Positive,
            strategy: ElementRating::Negative,
            execution: ElementRating::Negative,
            ..Default::default()
        };
        FeedbackRecord::new("v1", 2, ratings, "too safe for Gen Z")
    }

    #[test]
    fn constraints_summarise_ratings_and_comment() -> anyhow::Result<()> {
        let summary = feedback_constraints(&feedback()?);
        assert!(summary.contains("overall 2/5"));
        assert!(summary.contains("Keep the spirit of the campaign name."));
        assert!(summary.contains("Rework the creative strategy, execution plan substantially."));
        assert!(summary.contains("Reviewer comment: too safe for Gen Z"));

        let plain = FeedbackRecord::new("v1", 4, ElementRatings::default(), "")?;
        assert_eq!(feedback_constraints(&plain), "Feedback on the previous concept: overall 4/5.");
        Ok(())
    }

    #[test]
    fn feedback_without_prior_input_makes_no_call() -> anyhow::Result<()> {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(campaign_json("Never"))]));
        let generator = CampaignGenerator::new(provider.clone(), "m", 0.6);
        let result = refine_from_feedback(&generator, None, Some(&previous()), &feedback()?);
        assert!(matches!(result, Err(CampaignError::NoOriginalInput)));
        assert_eq!(provider.call_count(), 0);
        Ok(())
    }

    #[test]
    fn feedback_augments_constraints_and_reuses_references() -> anyhow::Result<()> {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(campaign_json("Late Shift"))]));
        let generator = CampaignGenerator::new(provider.clone(), "m", 0.6);
        let prior = previous();
        let refined = refine_from_feedback(&generator, Some(&input()), Some(&prior), &feedback()?)?;

        let constraints = refined.input.additional_constraints.clone().unwrap_or_default();
        assert!(constraints.starts_with("No celebrities"));
        assert!(constraints.contains("Reviewer comment: too safe for Gen Z"));
        assert_eq!(refined.campaign.campaign_name, "Late Shift");
        assert_eq!(refined.campaign.reference_campaigns, prior.reference_campaigns);
        assert_eq!(refined.campaign.storytelling, prior.storytelling);
        assert_eq!(prior.campaign_name, "Midnight Feast");

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].purpose, CompletionPurpose::FeedbackRefinement);
        assert!(requests[0].messages[1].content.contains("Reviewer comment"));
        Ok(())
    }

    #[test]
    fn chat_with_only_system_message_is_nothing_to_apply() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(campaign_json("Never"))]));
        let generator = CampaignGenerator::new(provider.clone(), "m", 0.6);
        let transcript = ChatTranscript::with_system("Discussing Midnight Feast");
        assert_eq!(transcript.len(), 1);

        let result = refine_from_chat(&generator, &transcript, &previous(), &input());
        assert!(matches!(result, Err(CampaignError::NothingToApply)));
        assert_eq!(provider.call_count(), 0);
    }

    #[test]
    fn chat_refinement_carries_pipeline_fields_forward() -> anyhow::Result<()> {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(campaign_json("Midnight Snack Club"))]));
        let generator = CampaignGenerator::new(provider.clone(), "m", 0.6);
        let mut transcript = ChatTranscript::with_system("Discussing Midnight Feast");
        transcript.push(ChatRole::User, "Make the name feel like a club");
        transcript.push(ChatRole::Assistant, "Maybe 'Midnight Snack Club'?");

        let prior = previous();
        let revised = refine_from_chat(&generator, &transcript, &prior, &input())?;
        assert_eq!(revised.campaign_name, "Midnight Snack Club");
        assert_eq!(revised.reference_campaigns, prior.reference_campaigns);
        assert_eq!(revised.storytelling, prior.storytelling);

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].temperature, 0.6);
        assert!(requests[0].messages[1].content.contains("\"campaignName\": \"Midnight Feast\""));
        assert!(requests[0].messages[1].content.contains("user: Make the name feel like a club"));
        Ok(())
    }

    #[test]
    fn advisor_reply_returns_plain_text() -> anyhow::Result<()> {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok("  Try a shorter name.  ".to_string())]));
        let generator = CampaignGenerator::new(provider.clone(), "m", 0.6);
        let mut transcript = ChatTranscript::with_system("Discussing Midnight Feast");
        transcript.push(ChatRole::User, "Thoughts on the name?");

        let reply = advisor_reply(&generator, &transcript, &previous(), &input())?;
        assert_eq!(reply, "Try a shorter name.");
        assert_eq!(provider.requests()[0].purpose, CompletionPurpose::AdvisorReply);
        Ok(())
    }
}
