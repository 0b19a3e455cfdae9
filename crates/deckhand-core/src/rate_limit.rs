//! Endpoint rate limiting and the retry schedule around completion calls.
//!
//! Every completion waits for its governor permit via `until_ready()`, which
//! spaces requests at the configured rate across all workers. On 429 the
//! governor is slowed and the call re-enters the backoff loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use crate::llm::{CompletionClient, CompletionError};
use crate::{Config, DeckError};

/// Type alias for governor's direct rate limiter.
type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Adaptive rate limiter for the completion endpoint.
///
/// When a 429 is received, the governor is atomically swapped to a slower
/// rate. After a cooldown period (60s) with no 429s, the original rate is
/// restored.
pub struct AdaptiveLimiter {
    limiter: ArcSwap<DirectLimiter>,
    /// Base period between allowed requests.
    base_period: Duration,
    /// Current slowdown factor (1 = normal, 2 = half rate, etc.).
    current_factor: AtomicU32,
    /// Timestamp of the last 429 response.
    last_429: std::sync::Mutex<Option<Instant>>,
}

impl AdaptiveLimiter {
    /// Create a new limiter with the given period between requests.
    pub fn new(period: Duration) -> Self {
        let quota = Quota::with_period(period).expect("period must be > 0");
        let limiter = Arc::new(DirectLimiter::direct(quota));
        Self {
            limiter: ArcSwap::from(limiter),
            base_period: period,
            current_factor: AtomicU32::new(1),
            last_429: std::sync::Mutex::new(None),
        }
    }

    /// Create a limiter allowing `n` requests per minute.
    pub fn per_minute(n: u32) -> Self {
        let ms = 60_000 / n.max(1) as u64;
        Self::new(Duration::from_millis(ms))
    }

    /// Wait until the rate limiter allows a request.
    ///
    /// Blocks the calling future until a token is available, spacing
    /// requests at the configured rate across all concurrent workers.
    pub async fn acquire(&self) {
        self.try_decay();
        let limiter = self.limiter.load();
        limiter.until_ready().await;
    }

    /// Called when a 429 is received. Doubles the slowdown factor and swaps
    /// the governor.
    pub fn on_rate_limited(&self) {
        if let Ok(mut last) = self.last_429.lock() {
            *last = Some(Instant::now());
        }

        // Double factor, cap at 16x slowdown
        let _ = self
            .current_factor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |f| {
                Some((f * 2).min(16))
            });

        let factor = self.current_factor.load(Ordering::SeqCst);
        if let Some(scaled) = self.base_period.checked_mul(factor)
            && let Some(quota) = Quota::with_period(scaled)
        {
            let new_limiter = Arc::new(DirectLimiter::direct(quota));
            self.limiter.store(new_limiter);
        }
    }

    /// If 60s have passed since the last 429, restore the original rate.
    fn try_decay(&self) {
        let should_restore = self
            .last_429
            .lock()
            .ok()
            .and_then(|last| last.map(|t| t.elapsed().as_secs() >= 60))
            .unwrap_or(false);

        if should_restore && self.current_factor.load(Ordering::SeqCst) > 1 {
            self.current_factor.store(1, Ordering::SeqCst);
            let quota = Quota::with_period(self.base_period).expect("base period valid");
            let limiter = Arc::new(DirectLimiter::direct(quota));
            self.limiter.store(limiter);
        }
    }
}

/// First-attempt backoff base. Doubles per attempt, with up to 50% jitter.
const BACKOFF_BASE: Duration = Duration::from_millis(500);
const BACKOFF_CAP: Duration = Duration::from_secs(30);

fn backoff_delay(attempt: u32, retry_after: Option<Duration>) -> Duration {
    if let Some(d) = retry_after {
        return d.min(BACKOFF_CAP);
    }
    let exp = BACKOFF_BASE.saturating_mul(1u32 << (attempt - 1).min(6));
    let jitter = exp.mul_f64(0.5 * fastrand::f64());
    (exp + jitter).min(BACKOFF_CAP)
}

/// Send a prompt through a [`CompletionClient`] with rate limiting and the
/// retry schedule applied.
///
/// 1. Acquires the governor permit (waits if needed)
/// 2. Calls `llm.complete()` with the per-request timeout
/// 3. On retryable failure (transport, 429, 5xx): exponential backoff with
///    jitter, honoring Retry-After, up to `config.max_retries` attempts
///    total, then [`DeckError::ExtractionUnavailable`]
/// 4. Auth/quota rejections surface immediately as run-fatal errors
/// 5. An empty completion surfaces as [`DeckError::MalformedExtraction`];
///    malformed responses are never retried here
///
/// `on_retry` is invoked before each backoff sleep with the attempt number
/// just failed and the chosen delay.
pub async fn complete_with_retry(
    llm: &dyn CompletionClient,
    model: &str,
    prompt: &str,
    client: &reqwest::Client,
    config: &Config,
    on_retry: Option<&(dyn Fn(u32, Duration) + Send + Sync)>,
) -> Result<String, DeckError> {
    let timeout = config.request_timeout();
    let max_attempts = config.max_retries.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        config.limiter.acquire().await;

        match llm.complete(model, prompt, client, timeout).await {
            Ok(text) => return Ok(text),
            Err(CompletionError::Auth(msg)) => return Err(DeckError::ExtractionAuth(msg)),
            Err(CompletionError::Quota(msg)) => return Err(DeckError::ExtractionQuota(msg)),
            Err(CompletionError::Empty) => {
                return Err(DeckError::MalformedExtraction(
                    CompletionError::Empty.to_string(),
                ));
            }
            Err(err) if !err.is_retryable() => {
                return Err(DeckError::ExtractionUnavailable {
                    attempts: attempt,
                    message: err.to_string(),
                });
            }
            Err(err) => {
                if matches!(err, CompletionError::RateLimited { .. }) {
                    config.limiter.on_rate_limited();
                }
                if attempt >= max_attempts {
                    return Err(DeckError::ExtractionUnavailable {
                        attempts: attempt,
                        message: err.to_string(),
                    });
                }
                let delay = backoff_delay(attempt, err.retry_after());
                tracing::warn!(
                    endpoint = llm.name(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "completion failed, backing off"
                );
                if let Some(cb) = on_retry {
                    cb(attempt, delay);
                }
                tokio::time::sleep(delay).await;
            }
        }
    }
}
