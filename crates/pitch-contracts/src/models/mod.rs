mod registry;
mod selectors;

pub use registry::{ModelRegistry, ModelSpec, COMPLETION, EMBEDDING};
pub use selectors::{ModelSelection, ModelSelector};
