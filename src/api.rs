//! Text completion against a local language model, with retry logic.
//!
//! The model is reached through an OpenAI-compatible `/completions`
//! endpoint, such as a llama.cpp server started with the configured GGUF
//! weights. Raw completion (rather than chat) is used so the prompt keeps its
//! exact role-tagged layout and stop sequences.
//!
//! # Architecture
//!
//! - [`CompletionBackend`]: Core trait, one prompt in and generated text out
//! - [`HttpCompletion`]: Talks to the completion server over HTTP
//! - [`RetryComplete`]: Decorator that adds exponential backoff to any backend
//!
//! # Retry Strategy
//!
//! - Configurable number of retries (`model.max_retries`)
//! - Exponential backoff starting at 1 second, capped at 30 seconds
//! - Random jitter (0-250ms) added to every delay

use crate::utils::truncate_for_log;
use rand::{Rng, rng};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Role delimiters the model may echo back; removed in this order.
pub const ROLE_TOKENS: [&str; 6] = [
    "|</assistant|>",
    "</|user|>",
    "</assistant>",
    "<|user|>",
    "<|assistant|>",
    "|",
];

/// Marker that hands the turn to the model.
pub const ASSISTANT_MARKER: &str = "<|assistant|>";

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("completion response contained no choices")]
    EmptyChoices,

    #[error("no completion within {0:?}")]
    Timeout(Duration),

    #[error("inference worker is not running")]
    WorkerGone,
}

/// Speaker of one prompt turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

impl Role {
    fn tag(&self) -> &'static str {
        match self {
            Role::System => "<|system|>",
            Role::User => "<|user|>",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Render turns as `<|role|>\ncontent`, newline separated, ending with the
/// assistant marker.
///
/// # Examples
///
/// ```ignore
/// let prompt = format_chat_prompt(&[ChatMessage::new(Role::User, "hi")]);
/// assert_eq!(prompt, "<|user|>\nhi\n<|assistant|>");
/// ```
pub fn format_chat_prompt(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}\n{}", m.role.tag(), m.content))
        .chain(std::iter::once(ASSISTANT_MARKER.to_string()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Strip echoed role delimiters from raw model output.
pub fn strip_role_tokens(raw: &str) -> String {
    let mut text = raw.to_string();
    for token in ROLE_TOKENS {
        text = text.replace(token, "").trim().to_string();
    }
    text
}

/// One completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    pub temperature: f32,
    /// Generation stops before any of these strings.
    pub stop: Vec<String>,
}

/// Anything that can turn a prompt into generated text.
pub trait CompletionBackend {
    /// Run one completion and return the raw generated text.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<String, InferenceError>> + Send;
}

/// Wrapper that adds exponential backoff retry logic to any [`CompletionBackend`].
///
/// # Backoff Strategy
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryComplete<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T> RetryComplete<T>
where
    T: CompletionBackend,
{
    /// Wrap `inner`, retrying up to `max_retries` times after the first failure.
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryComplete<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryComplete")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> CompletionBackend for RetryComplete<T>
where
    T: CompletionBackend + Sync,
{
    #[instrument(level = "debug", skip_all)]
    async fn complete(&self, request: &CompletionRequest) -> Result<String, InferenceError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.complete(request).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis(),
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "complete() exhausted retries"
                        );
                        return Err(e);
                    }

                    let mut delay = self
                        .base_delay
                        .saturating_mul(1u32 << (attempt - 1).min(16));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + Duration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis(),
                        elapsed_ms_total = total_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "complete() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
    stop: &'a [String],
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: String,
}

/// Completion over HTTP against an OpenAI-compatible server.
#[derive(Debug, Clone)]
pub struct HttpCompletion {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpCompletion {
    /// # Arguments
    ///
    /// * `client` - HTTP client; no request timeout is applied here
    /// * `api_base` - Server base URL, e.g. `http://127.0.0.1:8080/v1`
    /// * `model` - Model name sent with each request (the weights file path)
    /// * `api_key` - Optional bearer token
    pub fn new(
        client: Client,
        api_base: &str,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            endpoint: completions_endpoint(api_base),
            model: model.into(),
            api_key,
        }
    }
}

fn completions_endpoint(api_base: &str) -> String {
    format!("{}/completions", api_base.trim_end_matches('/'))
}

impl CompletionBackend for HttpCompletion {
    #[instrument(level = "debug", skip_all, fields(endpoint = %self.endpoint))]
    async fn complete(&self, request: &CompletionRequest) -> Result<String, InferenceError> {
        let t0 = Instant::now();
        let body = CompletionBody {
            model: &self.model,
            prompt: &request.prompt,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stop: &request.stop,
        };

        let mut builder = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(
                elapsed_ms = t0.elapsed().as_millis(),
                %status,
                "Completion server returned an error status"
            );
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&text, 300),
            });
        }

        let parsed: CompletionResponse = response.json().await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.text)
            .ok_or(InferenceError::EmptyChoices)?;
        debug!(
            elapsed_ms = t0.elapsed().as_millis(),
            bytes = text.len(),
            "Completion received"
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::serve_once;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails a fixed number of times, then answers.
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    impl CompletionBackend for Flaky {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, InferenceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(InferenceError::EmptyChoices)
            } else {
                Ok("ok news".to_string())
            }
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            prompt: "<|user|>\nhi\n<|assistant|>".into(),
            max_tokens: 8,
            temperature: 0.7,
            stop: vec!["<|user|>".into()],
        }
    }

    #[test]
    fn test_format_chat_prompt() {
        let prompt = format_chat_prompt(&[
            ChatMessage::new(Role::System, "be brief"),
            ChatMessage::new(Role::User, "hello"),
        ]);
        assert_eq!(prompt, "<|system|>\nbe brief\n<|user|>\nhello\n<|assistant|>");
    }

    #[test]
    fn test_format_chat_prompt_single_turn() {
        let prompt = format_chat_prompt(&[ChatMessage::new(Role::User, "q")]);
        assert_eq!(prompt, "<|user|>\nq\n<|assistant|>");
    }

    #[test]
    fn test_strip_role_tokens() {
        assert_eq!(strip_role_tokens("  ok news </assistant>"), "ok news");
        assert_eq!(strip_role_tokens("<|assistant|>\nDepressing news"), "Depressing news");
        assert_eq!(strip_role_tokens("a | b"), "a  b");
        assert_eq!(strip_role_tokens("|</assistant|> ok"), "ok");
    }

    #[test]
    fn test_completions_endpoint() {
        assert_eq!(
            completions_endpoint("http://127.0.0.1:8080/v1"),
            "http://127.0.0.1:8080/v1/completions"
        );
        assert_eq!(
            completions_endpoint("http://localhost:8080/v1/"),
            "http://localhost:8080/v1/completions"
        );
    }

    #[test]
    fn test_completion_body_shape() {
        let stop = vec!["<|user|>".to_string(), "<|system|>".to_string()];
        let body = CompletionBody {
            model: "model.gguf",
            prompt: "p",
            max_tokens: 128,
            temperature: 0.5,
            stop: &stop,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["model"], "model.gguf");
        assert_eq!(value["max_tokens"], 128);
        assert_eq!(value["temperature"], 0.5);
        assert_eq!(value["stop"][1], "<|system|>");
    }

    #[test]
    fn test_completion_response_parsing() {
        let json = r#"{"id":"x","choices":[{"text":" depressing news","index":0}]}"#;
        let parsed: CompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].text, " depressing news");
    }

    async fn http_backend(status: u16, body: &'static str) -> HttpCompletion {
        let base = serve_once(status, "application/json", body).await;
        HttpCompletion::new(
            Client::new(),
            &format!("{base}/v1"),
            "model.gguf",
            Some("secret".to_string()),
        )
    }

    #[tokio::test]
    async fn test_http_completion_returns_first_choice() {
        let backend = http_backend(
            200,
            r#"{"choices":[{"text":" Depressing news","index":0},{"text":"ok news","index":1}]}"#,
        )
        .await;

        assert_eq!(backend.complete(&request()).await.unwrap(), " Depressing news");
    }

    #[tokio::test]
    async fn test_http_completion_error_status() {
        let backend = http_backend(500, r#"{"error":"model not loaded"}"#).await;

        match backend.complete(&request()).await {
            Err(InferenceError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert!(body.contains("model not loaded"));
            }
            other => panic!("expected Status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_completion_without_choices() {
        let backend = http_backend(200, r#"{"choices":[]}"#).await;

        assert!(matches!(
            backend.complete(&request()).await,
            Err(InferenceError::EmptyChoices)
        ));
    }

    #[tokio::test]
    async fn test_retry_recovers_after_failures() {
        let flaky = Flaky {
            failures: 2,
            calls: AtomicUsize::new(0),
        };
        let retry = RetryComplete::new(flaky, 2, Duration::from_millis(1));
        let text = retry.complete(&request()).await.unwrap();

        assert_eq!(text, "ok news");
        assert_eq!(retry.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_retries() {
        let flaky = Flaky {
            failures: usize::MAX,
            calls: AtomicUsize::new(0),
        };
        let retry = RetryComplete::new(flaky, 1, Duration::from_millis(1));
        let result = retry.complete(&request()).await;

        assert!(matches!(result, Err(InferenceError::EmptyChoices)));
        assert_eq!(retry.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_retries_calls_once() {
        let flaky = Flaky {
            failures: 1,
            calls: AtomicUsize::new(0),
        };
        let retry = RetryComplete::new(flaky, 0, Duration::from_millis(1));

        assert!(retry.complete(&request()).await.is_err());
        assert_eq!(retry.inner.calls.load(Ordering::SeqCst), 1);
    }
}
