//! Enhancement Invoker - prompt construction, the provider call and failure classification
//!
//! Exactly one provider call is made per idea. It races a fixed deadline via
//! `tokio::time::timeout`; the loser is dropped, so a late provider answer can
//! never reach the response. Every outcome maps to one status and one body.

use std::sync::Arc;
use std::time::{Duration, Instant};

use hyper::StatusCode;
use tracing::{error, info, warn};

use super::templates::{
    CONFIGURATION_MESSAGE, CONNECTION_ERROR_PREFIX, CREDENTIAL_MESSAGE, ENHANCE_PROMPT_TEMPLATE,
    IDEA_PLACEHOLDER, QUOTA_MESSAGE, TIMEOUT_MESSAGE,
};
use crate::service::{ProviderError, TextProvider};

const TIMEOUT_HINTS: &[&str] = &["deadline_exceeded", "deadline exceeded", "timed out"];

const CREDENTIAL_HINTS: &[&str] = &[
    "api_key_invalid",
    "api key not valid",
    "api key expired",
    "invalid api key",
    "unauthenticated",
];

const QUOTA_HINTS: &[&str] = &[
    "resource_exhausted",
    "quota",
    "rate limit",
    "too many requests",
];

const CONFIGURATION_HINTS: &[&str] = &[
    "invalid_argument",
    "not_found",
    "is not found",
    "not supported",
    "unknown name",
];

/// Closed set of provider failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderFailureKind {
    TimedOut,
    Credential,
    Quota,
    Configuration,
    Unclassified,
}

/// First match wins; a 400 carrying `API_KEY_INVALID` is a credential problem, not configuration
const CLASSIFICATION_ORDER: [ProviderFailureKind; 4] = [
    ProviderFailureKind::TimedOut,
    ProviderFailureKind::Credential,
    ProviderFailureKind::Quota,
    ProviderFailureKind::Configuration,
];

impl ProviderFailureKind {
    /// Classify a provider error by status code and message heuristics
    pub fn classify(err: &ProviderError) -> Self {
        let haystack = err.haystack();
        CLASSIFICATION_ORDER
            .into_iter()
            .find(|kind| kind.matches(err, &haystack))
            .unwrap_or(Self::Unclassified)
    }

    fn matches(self, err: &ProviderError, haystack: &str) -> bool {
        let status = err.status();
        match self {
            Self::TimedOut => {
                matches!(err, ProviderError::Timeout)
                    || status == Some(504)
                    || contains_any(haystack, TIMEOUT_HINTS)
            }
            Self::Credential => {
                matches!(status, Some(401) | Some(403)) || contains_any(haystack, CREDENTIAL_HINTS)
            }
            Self::Quota => status == Some(429) || contains_any(haystack, QUOTA_HINTS),
            Self::Configuration => {
                matches!(status, Some(400) | Some(404))
                    || contains_any(haystack, CONFIGURATION_HINTS)
            }
            Self::Unclassified => true,
        }
    }

    /// HTTP status sent to the client
    pub fn status(self) -> StatusCode {
        match self {
            Self::TimedOut => StatusCode::REQUEST_TIMEOUT,
            // Transient and user-recoverable, so not surfaced as an error
            Self::Quota => StatusCode::OK,
            Self::Credential | Self::Configuration | Self::Unclassified => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Short, client-safe description of an unclassified failure.
/// Upstream bodies stay in the server log.
fn scrubbed_diagnostic(err: &ProviderError) -> String {
    match err {
        ProviderError::Timeout => "the provider timed out".to_string(),
        ProviderError::Transport(_) => "network error while contacting the provider".to_string(),
        ProviderError::Api { status, .. } => format!("the provider responded with HTTP {}", status),
        ProviderError::Decode(_) => "the provider sent an unexpected response".to_string(),
        ProviderError::Blocked(reason) => {
            let reason: String = reason
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
                .take(40)
                .collect();
            format!("the provider declined the request ({})", reason)
        }
        ProviderError::EmptyResponse => "the provider returned no text".to_string(),
    }
}

/// Result of one enhance call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnhanceOutcome {
    /// Provider text, passed through untouched
    Succeeded(String),
    Failed {
        kind: ProviderFailureKind,
        diagnostic: String,
    },
}

impl EnhanceOutcome {
    fn timed_out() -> Self {
        Self::Failed {
            kind: ProviderFailureKind::TimedOut,
            diagnostic: String::new(),
        }
    }

    fn from_error(err: &ProviderError) -> Self {
        Self::Failed {
            kind: ProviderFailureKind::classify(err),
            diagnostic: scrubbed_diagnostic(err),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Succeeded(_) => StatusCode::OK,
            Self::Failed { kind, .. } => kind.status(),
        }
    }

    /// Text for the `enhanced` field
    pub fn into_enhanced(self) -> String {
        match self {
            Self::Succeeded(text) => text,
            Self::Failed { kind, diagnostic } => match kind {
                ProviderFailureKind::TimedOut => TIMEOUT_MESSAGE.to_string(),
                ProviderFailureKind::Credential => CREDENTIAL_MESSAGE.to_string(),
                ProviderFailureKind::Quota => QUOTA_MESSAGE.to_string(),
                ProviderFailureKind::Configuration => CONFIGURATION_MESSAGE.to_string(),
                ProviderFailureKind::Unclassified => {
                    format!("{}: {}. Please try again.", CONNECTION_ERROR_PREFIX, diagnostic)
                }
            },
        }
    }
}

/// Embed the idea in the fixed template.
/// Split-and-concat keeps a literal `{idea}` inside user text from being expanded.
pub fn render_enhance_prompt(idea: &str) -> String {
    match ENHANCE_PROMPT_TEMPLATE.split_once(IDEA_PLACEHOLDER) {
        Some((before, after)) => {
            let mut rendered = String::with_capacity(before.len() + idea.len() + after.len());
            rendered.push_str(before);
            rendered.push_str(idea);
            rendered.push_str(after);
            rendered
        }
        None => format!("{}\n\n{}", ENHANCE_PROMPT_TEMPLATE, idea),
    }
}

/// Calls the provider once per idea under a deadline
pub struct EnhancementInvoker {
    provider: Arc<dyn TextProvider>,
    timeout: Duration,
}

impl EnhancementInvoker {
    pub fn new(provider: Arc<dyn TextProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Enhance a sanitized idea. Never fails: errors become a classified outcome.
    pub async fn invoke(&self, idea: &str) -> EnhanceOutcome {
        let prompt = render_enhance_prompt(idea);
        let start_time = Instant::now();

        match tokio::time::timeout(self.timeout, self.provider.generate(&prompt)).await {
            Ok(Ok(text)) => {
                info!(
                    "Enhancement succeeded in {}ms ({} chars)",
                    start_time.elapsed().as_millis(),
                    text.chars().count()
                );
                EnhanceOutcome::Succeeded(text)
            }
            Ok(Err(e)) => {
                let outcome = EnhanceOutcome::from_error(&e);
                if let EnhanceOutcome::Failed { kind, .. } = &outcome {
                    match kind {
                        ProviderFailureKind::Quota => warn!("Provider rate limited: {}", e),
                        _ => error!("Provider call failed ({:?}): {}", kind, e),
                    }
                }
                outcome
            }
            Err(_) => {
                warn!(
                    "Provider call exceeded {}ms, abandoning it",
                    self.timeout.as_millis()
                );
                EnhanceOutcome::timed_out()
            }
        }
    }
}
