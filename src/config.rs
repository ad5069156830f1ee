//! Configuration module - CLI arguments and settings

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

/// Environment variable holding the provider credential
pub const ENV_API_KEY: &str = "GEMINI_API_KEY";

/// Default provider model
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Default provider base URL
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default listening port
pub const DEFAULT_PORT: u16 = 3000;

/// Default bind host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default wall-clock budget for one provider call
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Optional configuration parameters for Config::new()
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    pub host: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub http_log_dir: Option<PathBuf>,
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub host: IpAddr,
    pub port: u16,
    pub model: String,
    pub base_url: String,
    pub request_timeout: Duration,
    /// Root of the provider exchange log; the working directory when unset
    pub http_log_dir: Option<PathBuf>,
}

impl Config {
    /// Create a new Config with the required credential and port, plus optional settings
    pub fn new(api_key: String, port: u16, options: ConfigOptions) -> Result<Arc<Self>> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(anyhow!(
                "{} is required: refusing to start without a provider API key",
                ENV_API_KEY
            ));
        }

        let host = options.host.as_deref().unwrap_or(DEFAULT_HOST).trim();
        let host: IpAddr = host
            .parse()
            .with_context(|| format!("invalid bind host '{}'", host))?;

        let model = options
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MODEL)
            .to_string();

        let base_url = normalize_base_url(options.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL));
        if base_url.is_empty() {
            return Err(anyhow!("base_url cannot be empty"));
        }

        let timeout_secs = options.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(anyhow!("timeout must be at least 1 second"));
        }

        Ok(Arc::new(Self {
            api_key: api_key.to_string(),
            host,
            port,
            model,
            base_url,
            request_timeout: Duration::from_secs(timeout_secs),
            http_log_dir: options.http_log_dir,
        }))
    }

    /// Address the HTTP server binds to
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Add a scheme when missing and strip trailing slashes.
/// Plain `http://` is kept so a local mock provider can be targeted.
fn normalize_base_url(base_url: &str) -> String {
    let base_url = base_url.trim();
    if base_url.is_empty() {
        return String::new();
    }

    let base_url = if base_url.starts_with("http://") || base_url.starts_with("https://") {
        base_url.to_string()
    } else {
        format!("https://{}", base_url)
    };

    base_url.trim_end_matches('/').to_string()
}
