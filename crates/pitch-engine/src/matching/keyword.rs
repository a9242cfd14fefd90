use pitch_contracts::campaigns::{CampaignInput, ReferenceCampaign, ReferenceCorpus};

use super::RankedReference;
use crate::config::ScoreWeights;

/// Additive keyword score of one reference against a brief.
pub fn score_reference(
    input: &CampaignInput,
    reference: &ReferenceCampaign,
    weights: &ScoreWeights,
) -> u32 {
    let mut score = 0;

    let industry = input.industry.trim();
    if !industry.is_empty() && industry.to_lowercase() == reference.industry.trim().to_lowercase() {
        score += weights.industry;
    }
    if cross_contains(&input.target_audience, &reference.target_audience) {
        score += weights.audience;
    }
    if cross_contains(&input.emotional_appeal, &reference.emotional_appeal) {
        score += weights.emotion;
    }

    let strategy = reference.strategy.to_lowercase();
    let objective_hit = input.objectives.iter().any(|objective| {
        let objective = objective.trim().to_lowercase();
        !objective.is_empty()
            && (reference
                .objectives
                .iter()
                .any(|other| other.trim().to_lowercase() == objective)
                || strategy.contains(&objective))
    });
    if objective_hit {
        score += weights.objective;
    }

    if let Some(style) = lowered(input.campaign_style.as_deref()) {
        let activation = reference
            .creative_activation
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        if strategy.contains(&style) || activation.contains(&style) {
            score += weights.style;
        }
    }
    if let Some(personality) = lowered(input.brand_personality.as_deref()) {
        if reference.brand.to_lowercase().contains(&personality) {
            score += weights.personality;
        }
    }
    score
}

/// Top `limit` references by keyword score, best first.
///
/// Equal scores keep corpus order. Always returns `min(limit, corpus.len())`
/// entries, including zero-score ones.
pub fn rank_by_keywords(
    input: &CampaignInput,
    corpus: &ReferenceCorpus,
    weights: &ScoreWeights,
    limit: usize,
) -> Vec<RankedReference> {
    let mut scored: Vec<(u32, &ReferenceCampaign)> = corpus
        .campaigns()
        .iter()
        .map(|reference| (score_reference(input, reference, weights), reference))
        .collect();
    // sort_by is stable
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored
        .into_iter()
        .take(limit)
        .map(|(score, reference)| RankedReference {
            campaign: reference.clone(),
            score: f64::from(score),
        })
        .collect()
}

fn cross_contains(left: &[String], right: &[String]) -> bool {
    left.iter().any(|a| {
        let a = a.trim().to_lowercase();
        !a.is_empty()
            && right.iter().any(|b| {
                let b = b.trim().to_lowercase();
                !b.is_empty() && (a.contains(&b) || b.contains(&a))
            })
    })
}

fn lowered(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use pitch_contracts::campaigns::{CampaignInput, ReferenceCampaign, ReferenceCorpus};

    use super::{rank_by_keywords, score_reference};
    use crate::config::ScoreWeights;

    fn reference(id: &str, industry: &str, audience: &[&str], appeal: &[&str]) -> ReferenceCampaign {
        ReferenceCampaign {
            id: id.to_string(),
            name: id.to_string(),
            brand: "Brand".to_string(),
            industry: industry.to_string(),
            target_audience: audience.iter().map(|s| s.to_string()).collect(),
            emotional_appeal: appeal.iter().map(|s| s.to_string()).collect(),
            strategy: "Plain strategy".to_string(),
            ..Default::default()
        }
    }

    fn acme() -> CampaignInput {
        CampaignInput {
            brand: "Acme".to_string(),
            industry: "Food Delivery".to_string(),
            target_audience: vec!["Gen Z".to_string()],
            emotional_appeal: vec!["Excitement".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn acme_example_ranks_matching_campaign_first() {
        let corpus = ReferenceCorpus::new(vec![
            reference("banking", "Banking", &["Retirees"], &["Trust"]),
            reference("delivery", "Food Delivery", &["Gen Z and Millennials"], &["Excitement"]),
            reference("insurance", "Insurance", &["Homeowners"], &["Security"]),
        ]);
        let ranked = rank_by_keywords(&acme(), &corpus, &ScoreWeights::default(), 3);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].campaign.id, "delivery");
        assert!(ranked[0].score >= 5.0);
        assert_eq!(ranked[1].score, 0.0);
        assert_eq!(ranked[2].score, 0.0);
        // zero-score ties keep corpus order
        assert_eq!(ranked[1].campaign.id, "banking");
        assert_eq!(ranked[2].campaign.id, "insurance");
    }

    #[test]
    fn builtin_corpus_puts_food_delivery_first() -> anyhow::Result<()> {
        let corpus = ReferenceCorpus::builtin()?;
        let ranked = rank_by_keywords(&acme(), &corpus, &ScoreWeights::default(), 3);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].campaign.id, "doordash-all-the-ads");
        assert!(ranked.windows(2).all(|pair| pair[0].score >= pair[1].score));
        Ok(())
    }

    #[test]
    fn industry_match_strictly_raises_score() {
        let weights = ScoreWeights::default();
        let matching = reference("a", "Food Delivery", &["Parents"], &["Calm"]);
        let mut other = matching.clone();
        other.industry = "Retail".to_string();
        assert!(score_reference(&acme(), &matching, &weights) > score_reference(&acme(), &other, &weights));
    }

    #[test]
    fn limit_bounds_results_and_respects_small_corpus() {
        let corpus = ReferenceCorpus::new(vec![
            reference("a", "Retail", &[], &[]),
            reference("b", "Retail", &[], &[]),
        ]);
        let weights = ScoreWeights::default();
        assert_eq!(rank_by_keywords(&acme(), &corpus, &weights, 3).len(), 2);
        assert_eq!(rank_by_keywords(&acme(), &corpus, &weights, 1).len(), 1);
        assert!(rank_by_keywords(&acme(), &corpus, &weights, 0).is_empty());
    }

    #[test]
    fn optional_signals_add_their_weights() {
        let weights = ScoreWeights::default();
        let mut input = CampaignInput {
            industry: "Sportswear".to_string(),
            objectives: vec!["Brand Awareness".to_string()],
            campaign_style: Some("humor".to_string()),
            brand_personality: Some("nike".to_string()),
            ..Default::default()
        };
        let nike = ReferenceCampaign {
            id: "n".to_string(),
            brand: "Nike".to_string(),
            industry: "Retail".to_string(),
            strategy: "Drive brand awareness through Humor".to_string(),
            ..Default::default()
        };
        assert_eq!(score_reference(&input, &nike, &weights), 3);
        input.campaign_style = None;
        assert_eq!(score_reference(&input, &nike, &weights), 2);
    }
}
