//! OpenAI-compatible chat completion client.
//!
//! One call here is one model turn: the full transcript goes out, and the
//! reply comes back interpreted as either answer text or a tool request.
//! Transient transport failures are retried with jittered exponential
//! backoff; everything else surfaces on the first attempt.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client as HttpClient;

use super::errors::GatewayError;
use super::types::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ModelReply, ToolCallRequest,
    ToolDefinition,
};
use crate::config::ModelConfig;

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Total per-attempt request timeout. Keeps a fully-hung call bounded at
/// minute scale even across every retry attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Completion attempts per call, first try included.
const MAX_ATTEMPTS: u32 = 3;

/// Shortest pause between attempts.
const BACKOFF_FLOOR: Duration = Duration::from_secs(1);

/// Longest pause between attempts.
const BACKOFF_CAP: Duration = Duration::from_secs(40);

// ─── Gateway seam ────────────────────────────────────────────────────────────

/// The dispatcher's view of the model endpoint.
///
/// [`InferenceClient`] is the production implementation; tests drive the
/// dispatcher with a scripted stand-in instead of a live endpoint.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Send the conversation and optional tool schema, returning the model's
    /// next move.
    async fn send(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ModelReply, GatewayError>;
}

// ─── InferenceClient ─────────────────────────────────────────────────────────

/// HTTP client for one configured model endpoint.
pub struct InferenceClient {
    http: HttpClient,
    config: ModelConfig,
    api_key: String,
}

impl InferenceClient {
    /// Build a client from the model section of the config.
    ///
    /// Reads the API key from the environment variable the config names;
    /// a missing key fails here, at startup, not on the first question.
    pub fn from_config(config: ModelConfig) -> Result<Self, GatewayError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| GatewayError::ConfigError {
            reason: format!("environment variable {} is not set", config.api_key_env),
        })?;

        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::ConfigError {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            config,
            api_key,
        })
    }

    /// One attempt: POST the completion request and interpret the reply.
    async fn try_completion(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ModelReply, GatewayError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let request = ChatCompletionRequest {
            model: self.config.model_name.clone(),
            messages: messages.to_vec(),
            tool_choice: tools.map(|_| "auto".to_string()),
            tools: tools.map(|t| t.to_vec()),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
        };

        tracing::debug!(
            url = %url,
            model = %request.model,
            message_count = request.messages.len(),
            tool_count = request.tools.as_ref().map(Vec::len).unwrap_or(0),
            "sending chat completion"
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout {
                        duration_secs: REQUEST_TIMEOUT.as_secs(),
                    }
                } else {
                    GatewayError::ConnectionFailed {
                        endpoint: url.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::HttpError {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletionResponse =
            response
                .json()
                .await
                .map_err(|e| GatewayError::MalformedResponse {
                    reason: format!("failed to decode completion body: {e}"),
                })?;

        interpret_completion(completion)
    }
}

#[async_trait]
impl ModelGateway for InferenceClient {
    async fn send(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ModelReply, GatewayError> {
        let mut last_error: Option<GatewayError> = None;

        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 {
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying chat completion"
                );
                tokio::time::sleep(delay).await;
            }

            match self.try_completion(messages, tools).await {
                Ok(reply) => {
                    tracing::debug!(attempt, "chat completion succeeded");
                    return Ok(reply);
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(attempt, error = %e, "transient gateway failure");
                    last_error = Some(e);
                }
                Err(e) => {
                    tracing::error!(error = %e, "gateway failure, not retrying");
                    return Err(e);
                }
            }
        }

        let last_error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown".into());
        tracing::error!(
            attempts = MAX_ATTEMPTS,
            last_error = %last_error,
            "gateway retries exhausted"
        );
        Err(GatewayError::RetriesExhausted {
            attempts: MAX_ATTEMPTS,
            last_error,
        })
    }
}

// ─── Retry policy ────────────────────────────────────────────────────────────

/// Pause before the given attempt: exponential ceiling with uniform jitter.
///
/// Attempt 2 draws from [1s, 2s], attempt 3 from [1s, 4s], and so on, never
/// above `BACKOFF_CAP`. Jitter spreads concurrent sessions so they do not
/// hit a rate-limited endpoint in lockstep.
fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let ceiling = (BACKOFF_FLOOR * 2u32.pow(exponent)).min(BACKOFF_CAP);
    let floor_ms = BACKOFF_FLOOR.as_millis() as u64;
    let ceiling_ms = ceiling.as_millis() as u64;
    Duration::from_millis(rand::thread_rng().gen_range(floor_ms..=ceiling_ms))
}

// ─── Response interpretation ─────────────────────────────────────────────────

/// Map a completion body onto the two ways a model turn can end.
///
/// Only the first tool call is honored; extras are logged and dropped so a
/// single call is pending at any time. A first choice with neither text nor
/// tool calls is malformed.
fn interpret_completion(completion: ChatCompletionResponse) -> Result<ModelReply, GatewayError> {
    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::MalformedResponse {
            reason: "completion contained no choices".into(),
        })?;

    let ChatMessage {
        content,
        tool_calls,
        ..
    } = choice.message;

    let mut calls = tool_calls.unwrap_or_default();
    if !calls.is_empty() {
        if calls.len() > 1 {
            tracing::warn!(
                dropped = calls.len() - 1,
                "model returned multiple tool calls, honoring the first"
            );
        }
        let call = calls.remove(0);
        return Ok(ModelReply::ToolRequest(ToolCallRequest {
            id: call.id,
            name: call.function.name,
            arguments: call.function.arguments,
        }));
    }

    match content {
        Some(text) if !text.trim().is_empty() => Ok(ModelReply::Answer(text)),
        _ => Err(GatewayError::EmptyTurn),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::types::{FunctionCallResponse, ResponseChoice, Role, ToolCallResponse};

    fn test_config(base_url: &str, api_key_env: &str) -> ModelConfig {
        ModelConfig {
            base_url: base_url.into(),
            model_name: "gpt-4o-mini".into(),
            api_key_env: api_key_env.into(),
            temperature: 0.2,
            max_tokens: 1024,
        }
    }

    fn completion_with(message: ChatMessage) -> ChatCompletionResponse {
        ChatCompletionResponse {
            choices: vec![ResponseChoice {
                message,
                finish_reason: None,
            }],
        }
    }

    fn wire_call(id: &str, name: &str, arguments: &str) -> ToolCallResponse {
        ToolCallResponse {
            id: id.into(),
            r#type: "function".into(),
            function: FunctionCallResponse {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    #[test]
    fn test_backoff_delay_within_bounds() {
        for _ in 0..100 {
            let second = backoff_delay(2);
            assert!(second >= BACKOFF_FLOOR && second <= Duration::from_secs(2));
            let third = backoff_delay(3);
            assert!(third >= BACKOFF_FLOOR && third <= Duration::from_secs(4));
        }
    }

    #[test]
    fn test_backoff_delay_respects_cap() {
        for _ in 0..100 {
            let late = backoff_delay(12);
            assert!(late >= BACKOFF_FLOOR && late <= BACKOFF_CAP);
        }
    }

    #[test]
    fn test_interpret_answer_text() {
        let completion = completion_with(ChatMessage {
            role: Role::Assistant,
            content: Some("There are 8807 titles.".into()),
            tool_call_id: None,
            tool_calls: None,
        });
        match interpret_completion(completion).unwrap() {
            ModelReply::Answer(text) => assert_eq!(text, "There are 8807 titles."),
            other => panic!("expected answer, got {other:?}"),
        }
    }

    #[test]
    fn test_interpret_honors_first_of_multiple_tool_calls() {
        let completion = completion_with(ChatMessage {
            role: Role::Assistant,
            content: None,
            tool_call_id: None,
            tool_calls: Some(vec![
                wire_call("call_1", "ask_database", r#"{"query": "SELECT 1"}"#),
                wire_call("call_2", "ask_database", r#"{"query": "SELECT 2"}"#),
            ]),
        });
        match interpret_completion(completion).unwrap() {
            ModelReply::ToolRequest(request) => {
                assert_eq!(request.id, "call_1");
                assert_eq!(request.name, "ask_database");
                assert!(request.arguments.contains("SELECT 1"));
            }
            other => panic!("expected tool request, got {other:?}"),
        }
    }

    #[test]
    fn test_interpret_empty_turn_is_error() {
        let completion = completion_with(ChatMessage {
            role: Role::Assistant,
            content: Some("   ".into()),
            tool_call_id: None,
            tool_calls: Some(vec![]),
        });
        assert!(matches!(
            interpret_completion(completion),
            Err(GatewayError::EmptyTurn)
        ));
    }

    #[test]
    fn test_interpret_no_choices_is_malformed() {
        let completion = ChatCompletionResponse { choices: vec![] };
        assert!(matches!(
            interpret_completion(completion),
            Err(GatewayError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_from_config_requires_api_key() {
        std::env::remove_var("__TABLETALK_MISSING_KEY__");
        let config = test_config("https://api.openai.com/v1", "__TABLETALK_MISSING_KEY__");
        assert!(matches!(
            InferenceClient::from_config(config),
            Err(GatewayError::ConfigError { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_gives_up_after_three_attempts() {
        std::env::set_var("__TABLETALK_RETRY_KEY__", "test-key");
        // Port 9 (discard) has no listener, so every attempt fails to connect.
        let config = test_config("http://127.0.0.1:9", "__TABLETALK_RETRY_KEY__");
        let client = InferenceClient::from_config(config).unwrap();

        let messages = vec![ChatMessage {
            role: Role::User,
            content: Some("hello".into()),
            tool_call_id: None,
            tool_calls: None,
        }];
        match client.send(&messages, None).await {
            Err(GatewayError::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected exhausted retries, got {other:?}"),
        }
        std::env::remove_var("__TABLETALK_RETRY_KEY__");
    }
}
