//! Retry logic with exponential backoff for resilient network operations.
//!
//! Every request issued by [`crate::client::RetryingClient`] goes through
//! [`with_retry`], so transient failures against either platform (dropped
//! connections, 5xx, rate limiting) are absorbed here and never reach the
//! pipeline controllers.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Status codes retried by default (in addition to 429).
pub const DEFAULT_RETRY_STATUSES: [u16; 4] = [500, 502, 503, 504];

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (e.g., 2.0 doubles delay each retry).
    pub backoff_multiplier: f64,
    /// Whether to add jitter to prevent thundering herd.
    pub add_jitter: bool,
    /// HTTP status codes treated as transient.
    pub retry_statuses: Vec<u16>,
    /// Retry POST/PATCH as well as idempotent methods.
    pub retry_non_idempotent: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
            retry_statuses: DEFAULT_RETRY_STATUSES.to_vec(),
            retry_non_idempotent: false,
        }
    }
}

impl RetryConfig {
    /// Creates a config with a single attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
            retry_statuses: Vec::new(),
            retry_non_idempotent: false,
        }
    }

    /// Effective attempt count (never below one).
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Calculates the delay before retry number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_secs_f64()
            * self
                .backoff_multiplier
                .powi(attempt.saturating_sub(1) as i32);

        let capped_delay = base_delay.min(self.max_delay.as_secs_f64());

        // Up to 25% jitter, never past the cap
        let final_delay = if self.add_jitter {
            let jitter = capped_delay * 0.25 * rand_jitter();
            (capped_delay + jitter).min(self.max_delay.as_secs_f64())
        } else {
            capped_delay
        };

        Duration::from_secs_f64(final_delay)
    }

    /// Delay before retry `attempt` after `error`, honoring `Retry-After`.
    fn delay_after(&self, attempt: u32, error: &Error) -> Duration {
        let computed = self.delay_for_attempt(attempt);
        match error {
            Error::RateLimit {
                retry_after: Some(requested),
            } => computed.max(*requested).min(self.max_delay),
            _ => computed,
        }
    }
}

/// Simple pseudo-random jitter (0.0 to 1.0) without external dependencies.
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

/// Determines if an error belongs to a transient failure class.
pub fn is_retryable_error(error: &Error, retry_statuses: &[u16]) -> bool {
    match error {
        // Rate limits are always retryable
        Error::RateLimit { .. } => true,
        Error::Status { status, .. } => retry_statuses.contains(status),
        Error::Http(e) => {
            if let Some(status) = e.status() {
                return status.as_u16() == 429 || retry_statuses.contains(&status.as_u16());
            }
            if e.is_timeout() || e.is_connect() {
                return true;
            }
            let msg = e.to_string().to_lowercase();
            msg.contains("connection") || msg.contains("reset")
        }
        _ => false,
    }
}

/// Executes an async operation with retry logic.
///
/// # Arguments
///
/// * `config` - Retry configuration
/// * `operation_name` - Name for logging purposes
/// * `operation` - The async operation to execute
///
/// # Returns
///
/// The result of the operation, or the last error once attempts run out.
#[allow(clippy::cognitive_complexity)] // Reason: Retry logic with backoff requires tracking multiple states
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.attempts();
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!("{}: Succeeded after {} attempts", operation_name, attempt);
                }
                return Ok(result);
            }
            Err(e) => {
                if attempt >= max_attempts || !is_retryable_error(&e, &config.retry_statuses) {
                    return Err(e);
                }
                let delay = config.delay_after(attempt, &e);
                warn!(
                    "{}: Retryable error (attempt {}/{}), retrying in {:?}: {}",
                    operation_name, attempt, max_attempts, delay, e
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
