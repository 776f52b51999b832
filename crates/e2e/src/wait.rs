//! Bounded polling
//!
//! Browser assertions race against page loads. Instead of sleeping a fixed
//! amount, every wait polls a check until it succeeds, retrying errors a
//! predicate marks as transient. When the deadline passes the last error is
//! returned as-is, so a failing test reports the real cause.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

use crate::error::{E2eError, E2eResult};

/// Default upper bound on a single wait
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(15);

/// Default delay between polls
pub const DEFAULT_POLLING_RATE: Duration = Duration::from_millis(100);

/// Environment variable overriding [`WaitConfig::max_wait`], in milliseconds
pub const ENV_MAX_WAIT_MS: &str = "SUPERLISTS_E2E_MAX_WAIT_MS";

/// Environment variable overriding [`WaitConfig::polling_rate`], in milliseconds
pub const ENV_POLLING_RATE_MS: &str = "SUPERLISTS_E2E_POLLING_RATE_MS";

/// Timing of a bounded poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    pub max_wait: Duration,
    pub polling_rate: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            max_wait: DEFAULT_MAX_WAIT,
            polling_rate: DEFAULT_POLLING_RATE,
        }
    }
}

impl WaitConfig {
    pub fn new(max_wait: Duration, polling_rate: Duration) -> Self {
        Self { max_wait, polling_rate }
    }

    /// Defaults, overridden by the process environment
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Defaults, overridden through `lookup`. Unparsable values are ignored.
    pub fn from_env_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let millis = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
        };

        let defaults = Self::default();
        Self {
            max_wait: millis(ENV_MAX_WAIT_MS).unwrap_or(defaults.max_wait),
            polling_rate: millis(ENV_POLLING_RATE_MS).unwrap_or(defaults.polling_rate),
        }
    }
}

/// Predicate deciding whether an error is worth another attempt
pub type TransientPredicate = fn(&E2eError) -> bool;

/// A bounded poll with a pluggable transient-error predicate
#[derive(Debug, Clone)]
pub struct Wait<P = TransientPredicate> {
    config: WaitConfig,
    is_transient: P,
}

impl Wait {
    /// Poll with `config`, retrying [`E2eError::is_transient`] errors
    pub fn new(config: WaitConfig) -> Self {
        Self {
            config,
            is_transient: E2eError::is_transient,
        }
    }
}

impl Default for Wait {
    fn default() -> Self {
        Self::new(WaitConfig::default())
    }
}

impl<P> Wait<P>
where
    P: Fn(&E2eError) -> bool,
{
    /// Replace the transient-error predicate
    pub fn ignoring<Q>(self, is_transient: Q) -> Wait<Q>
    where
        Q: Fn(&E2eError) -> bool,
    {
        Wait {
            config: self.config,
            is_transient,
        }
    }

    pub fn config(&self) -> WaitConfig {
        self.config
    }

    /// Run `attempt` until it succeeds.
    ///
    /// Always makes at least one attempt. A non-transient error is returned
    /// immediately; a transient one once `max_wait` has elapsed.
    pub async fn until<T, F, Fut>(&self, mut attempt: F) -> E2eResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = E2eResult<T>>,
    {
        let start = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            match attempt().await {
                Ok(value) => {
                    if attempts > 1 {
                        trace!("wait succeeded after {} attempts", attempts);
                    }
                    return Ok(value);
                }
                Err(e) if (self.is_transient)(&e) => {
                    if start.elapsed() >= self.config.max_wait {
                        debug!(
                            "giving up after {} attempts ({:?}): {}",
                            attempts,
                            start.elapsed(),
                            e
                        );
                        return Err(e);
                    }
                    trace!("attempt {} not ready: {}", attempts, e);
                    sleep(self.config.polling_rate).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
