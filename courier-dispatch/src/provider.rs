//! Delivery providers
//!
//! A [`Transport`] is anything that can attempt delivery of a message and
//! report success or failure. The orchestrator depends only on that contract;
//! it never inspects how a transport delivers or why it fails.
//!
//! [`Provider`] pairs a transport with the circuit breaker that guards it.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use courier_common::Message;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    circuit_breaker::{CircuitBreaker, ProviderCircuitBreakerConfig},
    error::TransportError,
};

/// Capability to attempt delivery of a message
#[async_trait]
pub trait Transport: Send + Sync {
    /// Name used in status events and logs
    fn name(&self) -> &str;

    /// Attempt delivery of `message`, returning a provider receipt on success
    async fn deliver(&self, message: &Message) -> Result<String, TransportError>;
}

/// A transport together with the circuit breaker it exclusively owns
pub struct Provider {
    transport: Arc<dyn Transport>,
    breaker: CircuitBreaker,
}

impl Provider {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, breaker: ProviderCircuitBreakerConfig) -> Self {
        let breaker = CircuitBreaker::new(transport.name(), breaker);
        Self { transport, breaker }
    }

    pub fn name(&self) -> &str {
        self.transport.name()
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub const fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name())
            .field("breaker", &self.breaker)
            .finish_non_exhaustive()
    }
}

/// Configuration for a simulated provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider name, unique within a dispatcher
    pub name: String,

    /// Probability in `0.0..=1.0` that an attempt fails
    #[serde(default = "default_failure_rate")]
    pub failure_rate: f64,

    /// Simulated latency of every attempt (milliseconds)
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,
}

impl ProviderConfig {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure_rate: default_failure_rate(),
            latency_ms: default_latency_ms(),
        }
    }
}

const fn default_failure_rate() -> f64 {
    0.3
}

const fn default_latency_ms() -> u64 {
    100
}

/// Stand-in transport that succeeds or fails at random after a fixed latency
#[derive(Debug, Clone)]
pub struct SimulatedTransport {
    name: String,
    failure_rate: f64,
    latency: Duration,
}

impl SimulatedTransport {
    #[must_use]
    pub fn new(name: impl Into<String>, failure_rate: f64, latency: Duration) -> Self {
        Self {
            name: name.into(),
            failure_rate: failure_rate.clamp(0.0, 1.0),
            latency,
        }
    }
}

impl From<&ProviderConfig> for SimulatedTransport {
    fn from(config: &ProviderConfig) -> Self {
        Self::new(
            config.name.clone(),
            config.failure_rate,
            Duration::from_millis(config.latency_ms),
        )
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, message: &Message) -> Result<String, TransportError> {
        tokio::time::sleep(self.latency).await;

        let roll: f64 = rand::rng().random();
        if roll >= self.failure_rate {
            Ok(format!("{} sent email to {}", self.name, message.recipient))
        } else {
            Err(TransportError::Failed(format!(
                "{} failed to send email.",
                self.name
            )))
        }
    }
}
