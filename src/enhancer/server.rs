//! Enhance Server - HTTP surface for the enhance flow
//! Serves `POST /enhance` and `GET /health`

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Body, Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::input_gate::{InputGate, ValidationError};
use super::invoker::EnhancementInvoker;
use crate::config::Config;
use crate::service::GeminiProvider;

/// Maximum request body size (10MB)
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Extra time granted to open connections after the provider deadline during shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Everything a request needs, built once at startup
pub struct AppContext {
    gate: InputGate,
    invoker: EnhancementInvoker,
}

impl AppContext {
    pub fn new(gate: InputGate, invoker: EnhancementInvoker) -> Self {
        Self { gate, invoker }
    }

    /// Wire the Gemini provider and sanitizer from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let gate = InputGate::new().context("failed to compile input sanitizer")?;
        let provider = GeminiProvider::new(config).context("failed to build provider client")?;
        let invoker = EnhancementInvoker::new(Arc::new(provider), config.request_timeout);
        Ok(Self::new(gate, invoker))
    }

    pub fn model(&self) -> &str {
        self.invoker.model()
    }
}

#[derive(Serialize)]
struct EnhanceResponse {
    enhanced: String,
}

#[derive(Serialize)]
struct HealthReport<'a> {
    status: &'static str,
    model: &'a str,
    timestamp: String,
}

/// Enhance HTTP Server
pub struct EnhanceServer {
    context: Arc<AppContext>,
}

impl EnhanceServer {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    /// Bind and serve in a background task; returns the bound address
    pub async fn start(&self, addr: SocketAddr) -> Result<SocketAddr> {
        let listener = bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let context = self.context.clone();

        tokio::spawn(serve(listener, context, std::future::pending::<()>()));

        Ok(local_addr)
    }

    /// Bind and serve until `shutdown` resolves and open connections drain
    pub async fn run_until<F>(&self, addr: SocketAddr, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = bind(addr).await?;
        self.serve_listener(listener, shutdown).await;
        Ok(())
    }

    /// Serve an already bound listener until `shutdown` resolves and open connections drain
    pub async fn serve_listener<F>(&self, listener: TcpListener, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        serve(listener, self.context.clone(), shutdown).await;
    }
}

async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!(
        "Enhance server listening on http://{}",
        listener.local_addr().unwrap_or(addr)
    );
    Ok(listener)
}

/// Accept loop: one task per connection, drained on shutdown
async fn serve<F>(listener: TcpListener, context: Arc<AppContext>, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let graceful = GracefulShutdown::new();

    loop {
        let (stream, _) = tokio::select! {
            conn = listener.accept() => match conn {
                Ok(conn) => conn,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            },
            _ = &mut shutdown => {
                info!("Shutdown requested, no longer accepting connections");
                break;
            }
        };

        let io = TokioIo::new(stream);
        let service_context = context.clone();
        let service =
            service_fn(move |req: Request<Incoming>| handle_request(req, service_context.clone()));
        let conn = graceful.watch(http1::Builder::new().serve_connection(io, service));

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                if !e.to_string().contains("connection closed") {
                    error!("Error serving connection: {}", e);
                }
            }
        });
    }

    drop(listener);

    // In-flight requests finish within the provider deadline
    let drain_limit = context.invoker.timeout() + SHUTDOWN_GRACE;
    tokio::select! {
        _ = graceful.shutdown() => info!("All connections drained"),
        _ = tokio::time::sleep(drain_limit) => {
            warn!("Connections still open after {:?}, closing", drain_limit);
        }
    }
}

/// Handle HTTP request
pub async fn handle_request<B>(
    req: Request<B>,
    context: Arc<AppContext>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let span = info_span!("request", id = %Uuid::new_v4(), method = %method, path = %path);

    async move {
        let response = match (&method, path.as_str()) {
            (&Method::POST, "/enhance") => handle_enhance(req, &context).await,
            (&Method::GET, "/health") => handle_health(&context),
            _ => json_error_response(StatusCode::NOT_FOUND, "Not Found"),
        };
        info!("Responded {}", response.status());
        Ok(response)
    }
    .instrument(span)
    .await
}

/// Validate, sanitize, invoke, classify
async fn handle_enhance<B>(req: Request<B>, context: &AppContext) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let body = match read_body_with_limit(req, MAX_BODY_SIZE).await {
        Ok(b) => b,
        Err(status) => {
            let message = if status == StatusCode::PAYLOAD_TOO_LARGE {
                "Request body too large"
            } else {
                ValidationError::CLIENT_MESSAGE
            };
            return json_error_response(status, message);
        }
    };

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!("Malformed JSON body: {}", e);
            return json_error_response(StatusCode::BAD_REQUEST, ValidationError::CLIENT_MESSAGE);
        }
    };

    let idea = match context.gate.admit(payload.get("input")) {
        Ok(idea) => idea,
        Err(_) => {
            return json_error_response(StatusCode::BAD_REQUEST, ValidationError::CLIENT_MESSAGE)
        }
    };

    let outcome = context.invoker.invoke(&idea).await;
    let status = outcome.status();
    json_body_response(
        status,
        &EnhanceResponse {
            enhanced: outcome.into_enhanced(),
        },
    )
}

/// Liveness report, always 200
fn handle_health(context: &AppContext) -> Response<Full<Bytes>> {
    json_body_response(
        StatusCode::OK,
        &HealthReport {
            status: "OK",
            model: context.model(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        },
    )
}

/// Read request body with size limit (streaming enforcement to prevent memory exhaustion)
async fn read_body_with_limit<B>(req: Request<B>, max_size: usize) -> Result<Bytes, StatusCode>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let limited = Limited::new(req.into_body(), max_size);
    match limited.collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) => {
            if e.to_string().contains("length limit exceeded") {
                warn!("Request body exceeds {} bytes", max_size);
                Err(StatusCode::PAYLOAD_TOO_LARGE)
            } else {
                warn!("Failed to read body: {}", e);
                Err(StatusCode::BAD_REQUEST)
            }
        }
    }
}

/// Create JSON error response with safe serialization
pub fn json_error_response(status: StatusCode, error: &str) -> Response<Full<Bytes>> {
    json_body_response(status, &json!({ "error": error }))
}

fn json_body_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    let body = match serde_json::to_string(value) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"error":"Internal Server Error"}"#,
            );
        }
    };
    json_response(status, &body)
}

/// Create JSON response
pub fn json_response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
