pub mod campaigns;
pub mod feedback;
pub mod history;
pub mod receipts;
pub mod store;
pub mod summary;

pub use campaigns::{CampaignLibrary, SavedCampaign};
pub use feedback::{ElementRating, ElementRatings, FeedbackRecord, FeedbackStore};
pub use history::{CampaignHistory, CampaignVersion, VersionOrigin};
pub use store::KeyedStore;
