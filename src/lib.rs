//! idea-forge library - HTTP backend that expands website ideas through a generative-AI provider

pub mod config;
pub mod enhancer;
pub mod http_logger;
pub mod service;

// Re-export commonly used types
pub use config::{Config, ConfigOptions};
pub use enhancer::{AppContext, EnhanceOutcome, EnhanceServer, EnhancementInvoker, InputGate};
pub use service::{GeminiProvider, ProviderError, TextProvider};
