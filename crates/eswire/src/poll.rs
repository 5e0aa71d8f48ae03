//! Fixed-interval polling with an attempt budget.
//!
//! The cluster reaches "settled" asynchronously; every wait loop in the
//! pipeline sleeps a fixed interval between probes (no backoff) and gives up
//! with [`Error::Timeout`] once the budget is spent.

use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::config::PollConfig;
use crate::error::{Error, Result};

/// Counts waits of one polling loop.
#[derive(Debug)]
pub struct Poller {
    operation: &'static str,
    interval: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl Poller {
    /// Creates a poller from the run's poll configuration.
    pub fn new(operation: &'static str, config: &PollConfig) -> Self {
        Self::with_interval(operation, config.interval(), config.max_attempts)
    }

    /// Creates a poller with an explicit interval.
    pub fn with_interval(operation: &'static str, interval: Duration, max_attempts: u32) -> Self {
        Self {
            operation,
            interval,
            max_attempts,
            attempts: 0,
        }
    }

    /// Sleeps one interval and returns the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] when the attempt budget is exhausted.
    pub async fn wait(&mut self) -> Result<u32> {
        if self.attempts >= self.max_attempts {
            return Err(Error::Timeout {
                operation: self.operation.to_string(),
                attempts: self.attempts,
            });
        }
        sleep(self.interval).await;
        self.attempts += 1;
        debug!(
            "{}: poll attempt {}/{}",
            self.operation, self.attempts, self.max_attempts
        );
        Ok(self.attempts)
    }

    /// Waits performed so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
