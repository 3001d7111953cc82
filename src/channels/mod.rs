//! Synthesis Channels Module
//!
//! Provides the backend port and adapters for TTS providers:
//! - Gemini (speech generation, PCM output)
//! - Google Cloud TTS (SSML marks, native sentence timestamps)
//! - OpenAI
//! - Piper (local binary)

pub mod error;
pub mod gemini;
pub mod google;
pub mod openai;
pub mod piper;
pub mod registry;
pub mod traits;

pub use error::{ChannelError, ChannelResult};
pub use gemini::GeminiChannel;
pub use google::GoogleCloudChannel;
pub use openai::OpenAiChannel;
pub use piper::PiperChannel;
pub use registry::create_backend;
pub use traits::*;

/// Turn a non-success HTTP response into a classified channel error
pub(crate) async fn error_from_response(channel: &str, response: reqwest::Response) -> ChannelError {
    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    ChannelError::from_status(channel, status, &body, retry_after)
}
