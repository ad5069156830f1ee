//! Gemini API service

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::common::{ProviderError, TextProvider};
use crate::config::Config;
use crate::http_logger::{self, HttpRequestLog, HttpResponseLog};

/// Slack on top of the invoker's deadline so the race, not the client, decides timeouts
const CLIENT_TIMEOUT_GRACE: Duration = Duration::from_secs(5);

const MAX_OUTPUT_TOKENS: u32 = 4096;

/// Gemini API request structure
#[derive(Debug, Serialize)]
struct GeminiApiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

/// Gemini API response structure
#[derive(Debug, Deserialize)]
struct GeminiApiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiPromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

fn build_gemini_url(base_url: &str, model: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    let base_url = base_url.strip_suffix("/v1beta").unwrap_or(base_url);
    format!("{}/v1beta/models/{}:generateContent", base_url, model)
}

/// Text provider backed by Google's Gemini `generateContent` API
pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    log_root: Option<PathBuf>,
}

impl GeminiProvider {
    /// Build a provider with its own pooled HTTP client
    pub fn new(config: &Config) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.request_timeout + CLIENT_TIMEOUT_GRACE)
            .build()?;

        Ok(Self::with_client(
            client,
            &config.base_url,
            &config.api_key,
            &config.model,
        )
        .with_log_root(config.http_log_dir.clone()))
    }

    /// Build a provider around an existing client
    pub fn with_client(client: Client, base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            log_root: None,
        }
    }

    /// Write exchange logs under `log_root` instead of the working directory
    pub fn with_log_root(mut self, log_root: Option<PathBuf>) -> Self {
        self.log_root = log_root;
        self
    }
}

#[async_trait]
impl TextProvider for GeminiProvider {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let payload = GeminiApiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: Some(GeminiGenerationConfig {
                max_output_tokens: MAX_OUTPUT_TOKENS,
            }),
        };

        let url = build_gemini_url(&self.base_url, &self.model);
        let start_time = Instant::now();

        let http_request_log = if http_logger::is_enabled() {
            Some(HttpRequestLog {
                method: "POST".to_string(),
                url: url.clone(),
                headers: vec![
                    ("Content-Type".to_string(), "application/json".to_string()),
                    ("x-goog-api-key".to_string(), self.api_key.clone()),
                ],
                body: serde_json::to_string(&payload).ok(),
            })
        } else {
            None
        };

        info!("Calling Gemini API: {}", url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await;

        let duration_ms = start_time.elapsed().as_millis() as u64;
        info!("Gemini API call completed in {}ms", duration_ms);

        let resp = match response {
            Ok(resp) => resp,
            Err(e) => {
                if let Some(ref req_log) = http_request_log {
                    http_logger::log_request(
                        self.log_root.as_deref(),
                        req_log,
                        None,
                        duration_ms,
                        Some(&e.to_string()),
                    );
                }
                return Err(e.into());
            }
        };

        let status = resp.status();
        let response_headers = if http_request_log.is_some() {
            http_logger::extract_response_headers(&resp)
        } else {
            Vec::new()
        };
        let body_text = resp.text().await?;

        if let Some(ref req_log) = http_request_log {
            let response_log = HttpResponseLog {
                status: status.as_u16(),
                headers: response_headers,
                body: Some(body_text.clone()),
            };
            http_logger::log_request(
                self.log_root.as_deref(),
                req_log,
                Some(&response_log),
                duration_ms,
                None,
            );
        }

        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body: body_text,
            });
        }

        parse_gemini_text(&body_text)
    }
}

/// Concatenate every text part of the first candidate
fn parse_gemini_text(body_text: &str) -> Result<String, ProviderError> {
    let api_response: GeminiApiResponse =
        serde_json::from_str(body_text).map_err(|e| ProviderError::Decode(e.to_string()))?;

    if let Some(reason) = api_response
        .prompt_feedback
        .and_then(|f| f.block_reason)
    {
        return Err(ProviderError::Blocked(reason));
    }

    let text = api_response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(ProviderError::EmptyResponse);
    }

    Ok(text)
}
