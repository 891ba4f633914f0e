//! OpenAI-compatible completion gateway.
//!
//! Works against any chat-completions endpoint (OpenAI, DeepSeek, local
//! proxies) via an explicit settings struct — credentials are injected at
//! construction, never read from or written to process-wide environment
//! state. Transient failures (rate limits, 5xx, transport errors) are
//! retried here with backoff; the pipeline only ever sees the final error.

use async_trait::async_trait;
use codeloop_application::ports::completion::{CompletionGateway, GatewayError};
use codeloop_domain::{Message, Role};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Retries after the initial attempt.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff between retries.
const BACKOFF_BASE: Duration = Duration::from_millis(250);

/// Connection settings for one chat-completions endpoint
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub request_timeout: Duration,
}

impl OpenAiSettings {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            request_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Chat-completions adapter for the [`CompletionGateway`] port
pub struct OpenAiGateway {
    client: reqwest::Client,
    settings: OpenAiSettings,
}

impl OpenAiGateway {
    pub fn new(settings: OpenAiSettings) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| GatewayError::ConnectionError(err.to_string()))?;
        Ok(Self { client, settings })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    fn build_request(&self, history: &[Message]) -> ChatRequest {
        ChatRequest {
            model: self.settings.model.clone(),
            messages: history
                .iter()
                .map(|message| ChatMessage {
                    role: role_str(message.role),
                    content: message.content.clone(),
                })
                .collect(),
        }
    }

    async fn attempt(&self, request: &ChatRequest) -> Result<String, GatewayError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .json(request)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::ConnectionError(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.error.message)
                .unwrap_or_else(|_| format!("HTTP {status}"));
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => GatewayError::RateLimited(detail),
                s if s.is_server_error() => GatewayError::ConnectionError(detail),
                _ => GatewayError::RequestFailed(detail),
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|err| GatewayError::RequestFailed(format!("malformed response: {err}")))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GatewayError::EmptyResponse)
    }
}

/// True for failures worth another attempt.
fn is_transient(error: &GatewayError) -> bool {
    matches!(
        error,
        GatewayError::ConnectionError(_) | GatewayError::RateLimited(_) | GatewayError::Timeout
    )
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[async_trait]
impl CompletionGateway for OpenAiGateway {
    async fn complete(
        &self,
        history: &[Message],
        cancellation: &CancellationToken,
    ) -> Result<String, GatewayError> {
        let request = self.build_request(history);

        let mut attempt = 0;
        loop {
            let result = tokio::select! {
                biased;
                _ = cancellation.cancelled() => return Err(GatewayError::Cancelled),
                result = self.attempt(&request) => result,
            };

            match result {
                Ok(content) => return Ok(content),
                Err(err) if is_transient(&err) && attempt < MAX_RETRIES => {
                    attempt += 1;
                    let delay = BACKOFF_BASE * 2u32.pow(attempt - 1);
                    warn!(attempt, ?delay, "Transient completion failure, retrying: {err}");
                    tokio::select! {
                        biased;
                        _ = cancellation.cancelled() => return Err(GatewayError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(err) => {
                    debug!("Completion failed: {err}");
                    return Err(err);
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}
