//! Typed errors for dispatch operations.
//!
//! Transport failures are always recovered inside the orchestrator (by retry
//! and then by provider fallback) and never reach the submitting caller.
//! Configuration errors are the only errors surfaced to process wiring.

use thiserror::Error;

/// Failure reported by a transport for a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The provider refused or failed to send the message.
    #[error("{0}")]
    Failed(String),

    /// The provider could not be reached.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// The provider did not answer in time.
    #[error("Timed out: {0}")]
    Timeout(String),
}

/// A provider exhausted every retry for a message.
///
/// Carries the error from the final attempt.
#[derive(Debug, Clone, Error)]
#[error("{source}")]
pub struct ProviderFailure {
    /// Name of the provider that failed
    pub provider: String,
    /// Number of attempts made
    pub attempts: u32,
    /// Error returned by the final attempt
    pub source: TransportError,
}

/// Invalid dispatch configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// At least one provider is required.
    #[error("No providers configured")]
    NoProviders,

    /// Admission capacity must be at least one message.
    #[error("Rate limit must be at least 1")]
    ZeroRateLimit,

    /// A simulated provider's failure probability is not a probability.
    #[error("Provider {name} has failure rate {rate}, expected a value in 0.0..=1.0")]
    InvalidFailureRate { name: String, rate: f64 },

    /// Retry jitter must be a finite, non-negative fraction.
    #[error("Retry jitter factor {0} must be finite and non-negative")]
    InvalidJitter(f64),

    /// A breaker that trips at zero failures never closes.
    #[error("Circuit breaker failure threshold for {0} must be at least 1")]
    ZeroFailureThreshold(String),

    /// Provider names identify breakers and status events, so they must be unique.
    #[error("Duplicate provider name: {0}")]
    DuplicateProvider(String),

    /// A configured provider has no transport to deliver through.
    #[error("No transport supplied for provider {0}")]
    MissingTransport(String),
}
