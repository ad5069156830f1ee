//! Common types for provider services

use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by a text-generation provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The HTTP client gave up waiting on the provider
    #[error("provider request timed out")]
    Timeout,

    /// Connection, TLS or protocol failure before a response arrived
    #[error("provider request failed: {0}")]
    Transport(String),

    /// Provider answered with a non-success status
    #[error("provider returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// Provider answered 2xx but the body did not match the expected shape
    #[error("failed to decode provider response: {0}")]
    Decode(String),

    /// Provider refused to generate for this prompt
    #[error("provider blocked the prompt: {0}")]
    Blocked(String),

    /// Provider answered 2xx without any text
    #[error("provider returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(e.to_string())
        }
    }
}

impl ProviderError {
    /// HTTP status returned by the provider, if it got that far
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Lowercased text used for substring heuristics
    pub fn haystack(&self) -> String {
        self.to_string().to_lowercase()
    }
}

/// An opaque text-generation backend: one prompt in, one text blob out
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Model identifier reported by `/health`
    fn model(&self) -> &str;

    /// Issue exactly one generation request
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}
