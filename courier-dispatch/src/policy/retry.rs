//! Retry policy for a single provider.
//!
//! A provider attempt is retried in place with exponential backoff. The delay
//! sequence starts from the base again for every call to
//! [`RetryPolicy::attempt`], so backoff never carries over between providers
//! or between messages.

use std::time::Duration;

use courier_common::{Message, dispatch};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ProviderFailure, TransportError},
    provider::Transport,
};

/// Retry policy configuration for provider attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts per provider, including the first.
    ///
    /// Default: 3 attempts
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Delay after the first failed attempt (in milliseconds).
    ///
    /// The delay doubles after every failed attempt: `base * 2^(attempt - 1)`
    ///
    /// Default: 200 milliseconds
    #[serde(default = "defaults::base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound on a single delay (in milliseconds), uncapped if unset.
    #[serde(default)]
    pub max_delay_ms: Option<u64>,

    /// Jitter factor for randomizing delays.
    ///
    /// The delay is randomized within ±`jitter_factor`.
    ///
    /// Default: 0.0 (no jitter)
    #[serde(default)]
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_delay_ms: defaults::base_delay_ms(),
            max_delay_ms: None,
            jitter_factor: 0.0,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay to wait after failed attempt number `attempt` (1-indexed).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let uncapped = if exponent >= 63 {
            u64::MAX
        } else {
            self.base_delay_ms.saturating_mul(1u64 << exponent)
        };
        let delay = self
            .max_delay_ms
            .map_or(uncapped, |max_delay| uncapped.min(max_delay));

        if self.jitter_factor.is_nan() || self.jitter_factor <= 0.0 {
            return Duration::from_millis(delay);
        }

        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let jittered = {
            let jitter_range = (delay as f64) * self.jitter_factor;
            if !jitter_range.is_finite() {
                return Duration::from_millis(delay);
            }

            let jitter: f64 = rand::rng().random_range(-jitter_range..=jitter_range);
            ((delay as f64) + jitter).max(0.0) as u64
        };

        Duration::from_millis(jittered)
    }

    /// Deliver `message` through `transport`, making up to `max_retries`
    /// attempts in total.
    ///
    /// Sleeps between failed attempts according to [`Self::delay_for_attempt`].
    /// A `max_retries` of zero still makes a single attempt.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderFailure`] carrying the last transport error once
    /// every attempt has failed.
    pub async fn attempt(
        &self,
        transport: &dyn Transport,
        message: &Message,
        max_retries: u32,
    ) -> Result<String, ProviderFailure> {
        let max_retries = max_retries.max(1);
        let mut attempt = 1;

        loop {
            match transport.deliver(message).await {
                Ok(receipt) => {
                    if attempt > 1 {
                        dispatch!(
                            level = DEBUG,
                            provider = transport.name(),
                            attempt,
                            "Delivery recovered after retry"
                        );
                    }
                    return Ok(receipt);
                }
                Err(error) if attempt < max_retries => {
                    let delay = self.delay_for_attempt(attempt);
                    dispatch!(
                        level = DEBUG,
                        provider = transport.name(),
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "Delivery attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(exhausted(transport, attempt, error)),
            }
        }
    }

    /// [`Self::attempt`] with this policy's `max_attempts`.
    ///
    /// # Errors
    ///
    /// See [`Self::attempt`].
    pub async fn execute(
        &self,
        transport: &dyn Transport,
        message: &Message,
    ) -> Result<String, ProviderFailure> {
        self.attempt(transport, message, self.max_attempts).await
    }
}

fn exhausted(transport: &dyn Transport, attempts: u32, source: TransportError) -> ProviderFailure {
    ProviderFailure {
        provider: transport.name().to_string(),
        attempts,
        source,
    }
}

mod defaults {
    pub const fn max_attempts() -> u32 {
        3
    }

    pub const fn base_delay_ms() -> u64 {
        200
    }
}
