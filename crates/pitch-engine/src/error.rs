use pitch_contracts::campaigns::SchemaError;

/// Failures a caller of the generation and refinement pipeline can see.
///
/// Embedding problems never show up here; the reference selector turns them
/// into the keyword fallback.
#[derive(Debug, thiserror::Error)]
pub enum CampaignError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("could not parse model response: {0}")]
    Parse(String),
    #[error("model response failed validation: {0}")]
    Validation(#[from] SchemaError),
    #[error("generation failed: {0}")]
    GenerationFailure(String),
    #[error("no original campaign input to refine")]
    NoOriginalInput,
    #[error("nothing to apply: the conversation has no requests yet")]
    NothingToApply,
    #[error("invalid feedback: {0}")]
    InvalidFeedback(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl CampaignError {
    /// Short machine label used in events and receipts.
    pub fn kind(&self) -> &'static str {
        match self {
            CampaignError::Configuration(_) => "configuration",
            CampaignError::Network(_) => "network",
            CampaignError::Parse(_) => "parse",
            CampaignError::Validation(_) => "validation",
            CampaignError::GenerationFailure(_) => "generation_failure",
            CampaignError::NoOriginalInput => "no_original_input",
            CampaignError::NothingToApply => "nothing_to_apply",
            CampaignError::InvalidFeedback(_) => "invalid_feedback",
            CampaignError::Storage(_) => "storage",
        }
    }

    /// True for a failed model round trip (call error, empty or unusable
    /// response), as opposed to a precondition or local problem.
    pub fn is_generation_failure(&self) -> bool {
        matches!(
            self,
            CampaignError::Network(_)
                | CampaignError::Parse(_)
                | CampaignError::Validation(_)
                | CampaignError::GenerationFailure(_)
        )
    }

    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            CampaignError::NoOriginalInput
                | CampaignError::NothingToApply
                | CampaignError::InvalidFeedback(_)
        )
    }
}

pub type CampaignResult<T> = Result<T, CampaignError>;

#[cfg(test)]
mod tests {
    use pitch_contracts::campaigns::SchemaError;

    use super::CampaignError;

    #[test]
    fn schema_errors_become_validation_failures() {
        let err: CampaignError = SchemaError::MissingField("keyMessage").into();
        assert_eq!(err.kind(), "validation");
        assert!(err.is_generation_failure());
        assert!(err.to_string().contains("keyMessage"));
    }

    #[test]
    fn preconditions_are_not_generation_failures() {
        assert!(CampaignError::NothingToApply.is_precondition());
        assert!(!CampaignError::NothingToApply.is_generation_failure());
        assert!(!CampaignError::NoOriginalInput.is_generation_failure());
    }
}
