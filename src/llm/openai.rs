//! OpenAI API Provider.
//!
//! Implements `CompletionClient` for OpenAI-compatible Chat Completions APIs.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::provider::{join_candidates, CompletionClient};
use super::types::{Message, SamplingParams};
use crate::error::CompletionError;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI client configuration and state.
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl OpenAIClient {
    /// Point at any OpenAI-compatible base URL, optionally bounding each call.
    pub fn with_base_url(api_key: String, base_url: &str, timeout: Option<Duration>) -> Self {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        // Builder only fails on TLS backend init; fall back to the default client
        let client = builder.build().unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionClient for OpenAIClient {
    async fn complete(
        &self,
        messages: &[Message],
        params: &SamplingParams,
    ) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: &params.model,
            messages: messages.iter().map(ApiMessage::from).collect(),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            frequency_penalty: params.frequency_penalty,
            presence_penalty: params.presence_penalty,
            stop: if params.stop.is_empty() {
                None
            } else {
                Some(&params.stop)
            },
            n: 1,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::from_status(status.as_u16(), error_message(&body)));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;

        if chat_response.choices.is_empty() {
            return Err(CompletionError::MalformedResponse(
                "no choices returned".to_string(),
            ));
        }

        Ok(join_candidates(
            chat_response
                .choices
                .iter()
                .map(|c| c.message.content.as_deref().unwrap_or_default()),
        ))
    }
}

/// Prefer the API's `error.message`, fall back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

// -----------------------------------------------------------------------------
// OpenAI DTOs (Data Transfer Objects)
// -----------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a Vec<String>>,
    n: u8,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a Message> for ApiMessage<'a> {
    fn from(msg: &'a Message) -> Self {
        Self {
            role: msg.role().as_str(),
            content: msg.content(),
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ApiResponseMessage,
}

#[derive(Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}
