//! Contracts for the external speech-to-text and text-generation APIs.
//!
//! The pipeline only sees these traits; the concrete client (and the
//! credentials it carries) is injected at construction time.

use async_trait::async_trait;
use thiserror::Error;

/// Failure of a call to an external model API.
///
/// Messages may carry provider detail and are only ever logged.
#[derive(Debug, Error)]
pub enum ExternalApiError {
    #[error("no API key configured")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Request(String),
    #[error("API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to parse API response: {0}")]
    Parse(String),
    #[error("API returned an empty response")]
    EmptyResponse,
}

/// A single-turn completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe an encoded audio file. `filename` tells the API its format.
    async fn transcribe_audio(
        &self,
        audio: Vec<u8>,
        filename: &str,
    ) -> Result<String, ExternalApiError>;
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ExternalApiError>;
}
