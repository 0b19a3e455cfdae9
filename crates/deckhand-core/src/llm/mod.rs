//! Completion client trait and implementations for the hosted model endpoint.

pub mod mock;
pub mod openai;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub use openai::OpenAiClient;

/// Error type for completion requests, distinguishing the retryable
/// transport/throttling failures from the run-fatal credential and quota
/// failures.
#[derive(Debug, Clone)]
pub enum CompletionError {
    /// Server returned 429 Too Many Requests.
    RateLimited { retry_after: Option<Duration> },
    /// Credentials rejected (401/403). Never retried.
    Auth(String),
    /// Quota or billing exhausted. Never retried.
    Quota(String),
    /// Connection/timeout level failure.
    Transport(String),
    /// Any other non-2xx response.
    Api { status: u16, message: String },
    /// 2xx response that carried no completion text.
    Empty,
}

impl CompletionError {
    /// Whether the retry layer may try again. Server-side (5xx) and
    /// transport failures are transient; client-side rejections are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            CompletionError::RateLimited { .. } | CompletionError::Transport(_) => true,
            CompletionError::Api { status, .. } => *status >= 500,
            CompletionError::Auth(_) | CompletionError::Quota(_) | CompletionError::Empty => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            CompletionError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl std::fmt::Display for CompletionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompletionError::RateLimited {
                retry_after: Some(d),
            } => write!(f, "Rate limited (429), retry after {:.1}s", d.as_secs_f64()),
            CompletionError::RateLimited { retry_after: None } => write!(f, "Rate limited (429)"),
            CompletionError::Auth(msg) => write!(f, "Authentication failed: {}", msg),
            CompletionError::Quota(msg) => write!(f, "Quota exhausted: {}", msg),
            CompletionError::Transport(msg) => write!(f, "{}", msg),
            CompletionError::Api { status, message } => write!(f, "HTTP {}: {}", status, message),
            CompletionError::Empty => write!(f, "completion carried no choices"),
        }
    }
}

impl std::error::Error for CompletionError {}

/// A hosted model endpoint that can complete a prompt.
pub trait CompletionClient: Send + Sync {
    /// The display name of this endpoint (e.g. "OpenAI").
    fn name(&self) -> &str;

    /// Send `prompt` to the endpoint with the given model and return the raw
    /// completion text. The text is NOT parsed here; schema recovery belongs
    /// to the normalizer.
    fn complete<'a>(
        &'a self,
        model: &'a str,
        prompt: &'a str,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<String, CompletionError>> + Send + 'a>>;
}
