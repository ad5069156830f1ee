//! Service modules for text-generation providers

pub mod common;
pub(crate) mod gemini;

// Re-export commonly used items
pub use common::{ProviderError, TextProvider};
pub use gemini::GeminiProvider;
