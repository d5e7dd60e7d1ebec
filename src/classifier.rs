//! Headline mood classification.
//!
//! Each headline is put to the model as a two-turn prompt: a fixed system
//! instruction asking for exactly "depressing news" or "ok news", then the
//! headline. Whatever comes back is cleaned of role delimiters, lowercased,
//! and searched for the word "depressing". Anything else counts as ok.

use crate::api::{
    ChatMessage, CompletionBackend, CompletionRequest, InferenceError, Role, format_chat_prompt,
    strip_role_tokens,
};
use crate::config::ModelConfig;
use crate::models::{Classification, Label};
use tracing::{debug, instrument};

pub const SYSTEM_PROMPT: &str = "System prompt: You are a news headline analyzer. You will be given a news headline and need to say if it is depressing or not. ONLY return 'depressing news' or 'ok news'.";

/// Generation halts before the model starts inventing a new turn.
pub const STOP_SEQUENCES: [&str; 2] = ["<|user|>", "<|system|>"];

/// Build the full prompt for one headline.
pub fn headline_prompt(headline: &str) -> String {
    format_chat_prompt(&[
        ChatMessage::new(Role::System, SYSTEM_PROMPT),
        ChatMessage::new(Role::User, format!("User prompt: {headline}")),
    ])
}

/// Normalise raw model output for label matching.
pub fn clean_response(raw: &str) -> String {
    strip_role_tokens(raw).trim().to_lowercase()
}

/// Classifies headlines with any [`CompletionBackend`].
#[derive(Debug)]
pub struct HeadlineClassifier<B> {
    backend: B,
    max_tokens: u32,
    temperature: f32,
}

impl<B> HeadlineClassifier<B>
where
    B: CompletionBackend,
{
    pub fn new(backend: B, max_tokens: u32, temperature: f32) -> Self {
        Self {
            backend,
            max_tokens,
            temperature,
        }
    }

    pub fn from_config(backend: B, model: &ModelConfig) -> Self {
        Self::new(backend, model.max_tokens, model.temperature)
    }

    /// Give the backend back, e.g. to shut a worker down.
    pub fn into_backend(self) -> B {
        self.backend
    }

    fn request_for(&self, headline: &str) -> CompletionRequest {
        CompletionRequest {
            prompt: headline_prompt(headline),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stop: STOP_SEQUENCES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Classify one headline with a single completion call.
    ///
    /// # Errors
    ///
    /// Returns the backend's [`InferenceError`] unchanged. An unexpected but
    /// successful response is never an error; it resolves to [`Label::Ok`].
    #[instrument(level = "debug", skip(self))]
    pub async fn classify(&self, headline: &str) -> Result<Classification, InferenceError> {
        let raw = self.backend.complete(&self.request_for(headline)).await?;
        let response = clean_response(&raw);
        let label = Label::from_response(&response);
        debug!(%label, %response, "Classified headline");
        Ok(Classification {
            headline: headline.to_string(),
            label,
            response,
        })
    }
}
