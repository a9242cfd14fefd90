mod generated;
mod input;
mod reference;

pub use generated::{GeneratedCampaign, SchemaError, MANDATORY_FIELDS};
pub use input::CampaignInput;
pub use reference::{ReferenceCampaign, ReferenceCorpus};

pub(crate) fn join_nonempty(parts: &[&str], separator: &str) -> String {
    parts
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<&str>>()
        .join(separator)
}
