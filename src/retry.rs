//! Exponential backoff for transient upstream failures
//!
//! Chapter sources and the remote mirror are flaky: rate limits, 502s from a
//! CDN, dropped connections. [`with_retry`] re-runs an async operation while
//! its error reports [`IsRetryable::is_retryable`], doubling the delay each
//! time (capped at `max_delay`) with optional jitter.
//!
//! ```no_run
//! use novel_dl::config::RetryConfig;
//! use novel_dl::error::Error;
//! use novel_dl::retry::with_retry;
//!
//! # async fn example(client: reqwest::Client) -> Result<(), Error> {
//! let config = RetryConfig::default();
//! let body = with_retry(&config, || async {
//!     let response = client.get("https://example.com/novel/1/chapter/1").send().await?;
//!     Ok::<_, Error>(response.text().await?)
//! })
//! .await?;
//! # let _ = body;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, FetchError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, 5xx, 429, connection reset) should return `true`.
/// Permanent failures (404, unknown source, empty body) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            // Rate limiting and server-side failures usually clear up
            FetchError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            FetchError::EmptyBody { .. } => false,
            FetchError::UnresolvableChapter { .. } => false,
            // The per-chapter deadline covers all attempts; never retry past it
            FetchError::Timeout { .. } => false,
        }
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Only transport-level failures; status errors surface as FetchError
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::Interrupted
            ),
            Error::Fetch(e) => e.is_retryable(),
            Error::Config { .. }
            | Error::Store(_)
            | Error::Sqlx(_)
            | Error::RemoteSync(_)
            | Error::Task(_)
            | Error::InvalidRange(_)
            | Error::ShuttingDown
            | Error::Serialization(_)
            | Error::Export(_)
            | Error::ApiServerError(_)
            | Error::Other(_) => false,
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or exhausts
/// `config.max_attempts` retries
///
/// Returns the last error when every attempt failed.
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "Transient failure, retrying"
                );

                let jittered_delay = if config.jitter {
                    add_jitter(delay)
                } else {
                    delay
                };

                tokio::time::sleep(jittered_delay).await;

                let next_delay =
                    Duration::from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier);
                delay = next_delay.min(config.max_delay);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::warn!(
                        error = %e,
                        attempts = attempt + 1,
                        "Giving up after all retry attempts"
                    );
                } else {
                    tracing::debug!(error = %e, "Not retrying permanent failure");
                }
                return Err(e);
            }
        }
    }
}

/// Stretch `delay` by a uniform random factor in `[1.0, 2.0]`
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    let jittered_secs = delay.as_secs_f64() * (1.0 + jitter_factor);
    Duration::from_secs_f64(jittered_secs)
}
