//! Per-provider circuit breaker to stop hammering a failing provider
//!
//! Each provider owns exactly one breaker; breakers are never shared, so a
//! failing provider can never gate another.
//!
//! # States
//!
//! - **Closed**: fewer than `failure_threshold` failures recorded, requests allowed
//! - **Open**: threshold reached and the cooldown has not elapsed since the
//!   most recent failure, requests rejected
//!
//! There is no probe-based half-open state. Once the cooldown has elapsed the
//! next `allow_request` resets the failure count and the breaker behaves as
//! Closed until it accumulates `failure_threshold` failures again.
//!
//! ```text
//! ┌─────────┐  failure_count >= threshold   ┌──────┐
//! │ Closed  │ ────────────────────────────> │ Open │
//! └─────────┘                               └──────┘
//!     ^                                        │
//!     │   allow_request() after cooldown,      │
//!     └─────── failure_count reset to 0 ───────┘
//! ```

use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{info, warn};

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of failures required to open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// How long the circuit stays open after the last failure (milliseconds)
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Per-provider circuit breaker overrides, keyed by provider name
    #[serde(default)]
    pub provider_overrides: ahash::AHashMap<String, ProviderCircuitBreakerConfig>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_ms: default_cooldown_ms(),
            provider_overrides: ahash::AHashMap::default(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Resolve the effective settings for a provider, applying any override
    #[must_use]
    pub fn for_provider(&self, provider: &str) -> ProviderCircuitBreakerConfig {
        self.provider_overrides.get(provider).cloned().unwrap_or(
            ProviderCircuitBreakerConfig {
                failure_threshold: self.failure_threshold,
                cooldown_ms: self.cooldown_ms,
            },
        )
    }
}

const fn default_failure_threshold() -> u32 {
    3
}

const fn default_cooldown_ms() -> u64 {
    5000
}

/// Circuit breaker settings for a single provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCircuitBreakerConfig {
    /// Failure threshold for this provider
    pub failure_threshold: u32,
    /// Cooldown for this provider (milliseconds)
    pub cooldown_ms: u64,
}

impl ProviderCircuitBreakerConfig {
    const fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation - requests allowed
    Closed,
    /// Circuit tripped - requests rejected until the cooldown elapses
    Open,
}

#[derive(Debug, Default)]
struct CircuitBreakerData {
    /// Failures recorded since the last reset, never capped
    failure_count: u32,
    /// When the most recent failure was recorded
    last_failure_at: Option<Instant>,
}

impl CircuitBreakerData {
    fn cooldown_elapsed(&self, cooldown: Duration) -> bool {
        self.last_failure_at
            .is_none_or(|last_failure| Instant::now().duration_since(last_failure) > cooldown)
    }
}

/// Failure gate for a single provider
#[derive(Debug)]
pub struct CircuitBreaker {
    provider: String,
    config: ProviderCircuitBreakerConfig,
    data: Mutex<CircuitBreakerData>,
}

impl CircuitBreaker {
    /// Create a closed circuit breaker for `provider`
    #[must_use]
    pub fn new(provider: impl Into<String>, config: ProviderCircuitBreakerConfig) -> Self {
        Self {
            provider: provider.into(),
            config,
            data: Mutex::new(CircuitBreakerData::default()),
        }
    }

    /// Name of the provider this breaker guards
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Check whether a request may be sent to the provider.
    ///
    /// If the circuit is open but the cooldown has elapsed since the last
    /// failure, the failure count is reset and the request is allowed.
    pub fn allow_request(&self) -> bool {
        let mut data = self.data.lock();

        if data.failure_count < self.config.failure_threshold {
            return true;
        }

        if data.cooldown_elapsed(self.config.cooldown()) {
            data.failure_count = 0;
            drop(data);
            info!(
                provider = %self.provider,
                "Circuit breaker cooldown elapsed - circuit closed"
            );
            return true;
        }

        false
    }

    /// Record a failed delivery through this provider
    ///
    /// Returns `true` if this failure opened the circuit
    pub fn record_failure(&self) -> bool {
        let mut data = self.data.lock();
        data.failure_count = data.failure_count.saturating_add(1);
        data.last_failure_at = Some(Instant::now());

        let tripped = data.failure_count == self.config.failure_threshold;
        let failure_count = data.failure_count;
        drop(data);

        if tripped {
            warn!(
                provider = %self.provider,
                failure_count,
                threshold = self.config.failure_threshold,
                cooldown_ms = self.config.cooldown_ms,
                "Circuit breaker OPENED - skipping provider until cooldown elapses"
            );
        }

        tripped
    }

    /// Current state, without applying a cooldown reset
    pub fn state(&self) -> CircuitState {
        let data = self.data.lock();
        if data.failure_count >= self.config.failure_threshold
            && !data.cooldown_elapsed(self.config.cooldown())
        {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }

    /// Snapshot of the breaker for monitoring
    pub fn stats(&self) -> CircuitBreakerStats {
        let state = self.state();
        let data = self.data.lock();
        CircuitBreakerStats {
            state,
            failure_count: data.failure_count,
            last_failure_at: data.last_failure_at,
        }
    }
}

/// Circuit breaker statistics
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    /// Current circuit state
    pub state: CircuitState,
    /// Failures recorded since the last reset
    pub failure_count: u32,
    /// When the most recent failure was recorded
    pub last_failure_at: Option<Instant>,
}
