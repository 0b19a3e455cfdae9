//! Mock completion client for testing.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{CompletionClient, CompletionError};

/// A configurable mock response for [`MockCompletion`].
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Return this text as the completion.
    Text(String),
    /// Simulate a 429.
    RateLimited { retry_after: Option<Duration> },
    /// Simulate any [`CompletionError`].
    Error(CompletionErrorKind),
}

/// Cloneable stand-ins for the error variants a mock can produce.
#[derive(Clone, Debug)]
pub enum CompletionErrorKind {
    Auth(String),
    Quota(String),
    Transport(String),
    Api { status: u16, message: String },
    Empty,
}

impl From<CompletionErrorKind> for CompletionError {
    fn from(kind: CompletionErrorKind) -> Self {
        match kind {
            CompletionErrorKind::Auth(m) => CompletionError::Auth(m),
            CompletionErrorKind::Quota(m) => CompletionError::Quota(m),
            CompletionErrorKind::Transport(m) => CompletionError::Transport(m),
            CompletionErrorKind::Api { status, message } => {
                CompletionError::Api { status, message }
            }
            CompletionErrorKind::Empty => CompletionError::Empty,
        }
    }
}

/// A hand-rolled mock implementing [`CompletionClient`] for tests.
///
/// Supports a fixed response or a per-call sequence (last repeated when
/// exhausted), and counts calls.
pub struct MockCompletion {
    name: &'static str,
    /// If non-empty, each call pops the next response.
    responses: Mutex<Vec<MockResponse>>,
    /// Fallback when the sequence is exhausted (or single-response mode).
    fallback: MockResponse,
    call_count: AtomicUsize,
}

impl MockCompletion {
    /// Create a mock that always returns `response`.
    pub fn new(response: MockResponse) -> Self {
        Self {
            name: "Mock",
            responses: Mutex::new(Vec::new()),
            fallback: response,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Create a mock that always returns `text` as the completion.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(MockResponse::Text(text.into()))
    }

    /// Create a mock that returns responses in order, repeating the last one.
    pub fn with_sequence(mut responses: Vec<MockResponse>) -> Self {
        assert!(
            !responses.is_empty(),
            "sequence must have at least one response"
        );
        // Reverse so we can pop() from the front cheaply.
        responses.reverse();
        let fallback = responses.first().cloned().unwrap();
        Self {
            name: "Mock",
            responses: Mutex::new(responses),
            fallback,
            call_count: AtomicUsize::new(0),
        }
    }

    /// How many times `complete()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> MockResponse {
        let mut seq = self.responses.lock().unwrap();
        if let Some(resp) = seq.pop() {
            resp
        } else {
            self.fallback.clone()
        }
    }
}

impl CompletionClient for MockCompletion {
    fn name(&self) -> &str {
        self.name
    }

    fn complete<'a>(
        &'a self,
        _model: &'a str,
        _prompt: &'a str,
        _client: &'a reqwest::Client,
        _timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<String, CompletionError>> + Send + 'a>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let response = self.next_response();

        Box::pin(async move {
            match response {
                MockResponse::Text(text) => Ok(text),
                MockResponse::RateLimited { retry_after } => {
                    Err(CompletionError::RateLimited { retry_after })
                }
                MockResponse::Error(kind) => Err(kind.into()),
            }
        })
    }
}
