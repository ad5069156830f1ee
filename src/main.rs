//! idea-forge - HTTP backend that expands website ideas through a generative-AI provider

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use idea_forge::config::{
    Config, ConfigOptions, DEFAULT_BASE_URL, DEFAULT_HOST, DEFAULT_MODEL, DEFAULT_PORT,
    DEFAULT_TIMEOUT_SECS, ENV_API_KEY,
};
use idea_forge::enhancer::{AppContext, EnhanceServer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "idea-forge")]
#[command(about = "Expand one-sentence website ideas into build briefs")]
struct Args {
    /// Provider API key
    #[arg(long, env = ENV_API_KEY, hide_env_values = true)]
    api_key: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to bind
    #[arg(long, env = "HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Provider model identifier
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Provider API base URL
    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Seconds to wait for the provider before answering 408
    #[arg(long, env = "ENHANCE_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Directory that receives the provider exchange log when IDEA_FORGE_HTTP_LOG is set
    #[arg(long, env = "IDEA_FORGE_HTTP_LOG_DIR")]
    http_log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = Config::new(
        args.api_key,
        args.port,
        ConfigOptions {
            host: Some(args.host),
            model: Some(args.model),
            base_url: Some(args.base_url),
            timeout_secs: Some(args.timeout_secs),
            http_log_dir: args.http_log_dir,
        },
    )?;

    info!(
        "Starting idea-forge (model {}, timeout {}s)",
        config.model,
        config.request_timeout.as_secs()
    );

    let context = Arc::new(AppContext::from_config(&config)?);
    let server = EnhanceServer::new(context);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    };

    if let Err(e) = server.run_until(config.socket_addr(), shutdown).await {
        error!("Server error: {:#}", e);
        std::process::exit(1);
    }

    info!("Server stopped");
    Ok(())
}
