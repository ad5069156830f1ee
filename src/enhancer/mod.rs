//! Enhancer module
//! Turns a one-sentence website idea into a structured build brief

pub mod input_gate;
pub mod invoker;
pub mod server;
pub mod templates;

pub use input_gate::{HtmlSanitizer, InputGate, ValidationError, MAX_INPUT_CHARS};
pub use invoker::{render_enhance_prompt, EnhanceOutcome, EnhancementInvoker, ProviderFailureKind};
pub use server::{AppContext, EnhanceServer};
