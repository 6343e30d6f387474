use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::{LlmError, Result};
use super::ChatModel;
use crate::fetch::HttpClient;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f64,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// A [`ChatModel`] over the OpenAI-compatible `/chat/completions` endpoint.
///
/// Authentication is the job of the wrapped [`HttpClient`], normally an
/// [`ApiKey`](crate::fetch::auth::ApiKey) bearer wrapper.
pub struct OpenAiChatClient<C> {
    http: C,
    base_url: String,
    model: String,
    temperature: f64,
}

impl<C: HttpClient> OpenAiChatClient<C> {
    pub fn new(http: C, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
            temperature: 0.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    fn completions_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{base}/chat/completions")
    }
}

#[async_trait]
impl<C: HttpClient> ChatModel for OpenAiChatClient<C> {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = serde_json::to_vec(&ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        })?;

        let url = self
            .completions_url()
            .parse()
            .map_err(|e| LlmError::RequestFailed(format!("invalid endpoint url: {e}")))?;
        let mut req = reqwest::Request::new(reqwest::Method::POST, url);
        req.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        *req.body_mut() = Some(body.into());

        debug!(model = %self.model, prompt_chars = user.len(), "Sending chat completion request");

        let response = self.http.execute(req).await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Chat completion request rejected");
            return Err(match status.as_u16() {
                401 | 403 => LlmError::AuthFailed(text),
                429 => LlmError::RateLimited(text),
                _ => LlmError::RequestFailed(format!("HTTP {status}: {text}")),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("failed to parse response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("response has no message content".into()))
    }
}
