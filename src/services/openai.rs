//! OpenAI-compatible HTTP client for transcription and chat completion.

use crate::{
    config::OpenAiConfig,
    services::external::{CompletionRequest, ExternalApiError, SpeechToText, TextGenerator},
};
use async_trait::async_trait;
use reqwest::{
    Client,
    multipart::{Form, Part},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Client holding the API credentials. Cheap to clone.
#[derive(Clone)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, ExternalApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("video-tagging/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ExternalApiError::Request(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn has_api_key(&self) -> bool {
        self.config.api_key.is_some()
    }

    fn api_key(&self) -> Result<&str, ExternalApiError> {
        self.config
            .api_key
            .as_deref()
            .ok_or(ExternalApiError::MissingApiKey)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

/// Turn a non-success response into an error carrying its body.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ExternalApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ExternalApiError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl SpeechToText for OpenAiClient {
    async fn transcribe_audio(
        &self,
        audio: Vec<u8>,
        filename: &str,
    ) -> Result<String, ExternalApiError> {
        let key = self.api_key()?;
        let part = Part::bytes(audio)
            .file_name(filename.to_string())
            .mime_str("audio/mpeg")
            .map_err(|e| ExternalApiError::Request(e.to_string()))?;
        let form = Form::new()
            .text("model", self.config.transcription_model.clone())
            .part("file", part);

        let response = self
            .client
            .post(self.endpoint("audio/transcriptions"))
            .bearer_auth(key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ExternalApiError::Request(e.to_string()))?;

        let parsed: TranscriptionResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ExternalApiError::Parse(e.to_string()))?;
        Ok(parsed.text)
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ExternalApiError> {
        let key = self.api_key()?;
        let body = ChatRequest {
            model: &self.config.completion_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExternalApiError::Request(e.to_string()))?;

        let parsed: ChatResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ExternalApiError::Parse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or(ExternalApiError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(api_key: Option<&str>) -> OpenAiConfig {
        OpenAiConfig {
            api_key: api_key.map(str::to_string),
            base_url: "http://127.0.0.1:9/v1/".into(),
            transcription_model: "whisper-1".into(),
            completion_model: "gpt-4o".into(),
            request_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let client = OpenAiClient::new(config(None)).unwrap();
        assert_eq!(
            client.endpoint("chat/completions"),
            "http://127.0.0.1:9/v1/chat/completions"
        );
    }

    #[tokio::test]
    async fn calls_without_key_fail_before_network() {
        let client = OpenAiClient::new(config(None)).unwrap();
        assert!(!client.has_api_key());

        let request = CompletionRequest {
            system: "s".into(),
            prompt: "p".into(),
            max_tokens: 5,
            temperature: 0.0,
        };
        assert!(matches!(
            client.complete(&request).await,
            Err(ExternalApiError::MissingApiKey)
        ));
        assert!(matches!(
            client.transcribe_audio(vec![1, 2, 3], "audio.mp3").await,
            Err(ExternalApiError::MissingApiKey)
        ));
    }

    #[test]
    fn chat_response_without_content_parses() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant"}}]}"#).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}
