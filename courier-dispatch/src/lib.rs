//! Resilient dispatch of notifications through interchangeable providers
//!
//! This crate provides:
//! - Per-provider circuit breaking
//! - In-place retries with exponential backoff
//! - Deduplication of delivered messages
//! - Admission control bounding concurrent dispatches
//! - Ordered provider fallback, recorded in an append-only status log

mod circuit_breaker;
mod config;
mod error;
mod orchestrator;
pub mod policy;
mod provider;
mod status;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState,
    ProviderCircuitBreakerConfig,
};
pub use config::DispatchConfig;
pub use courier_common::{Message, MessageId};
pub use error::{ConfigError, ProviderFailure, TransportError};
pub use orchestrator::{DispatchOrchestrator, DispatchOutcome};
pub use policy::{AdmissionController, AdmissionPermit, Claim, DeduplicationStore, RetryPolicy};
pub use provider::{Provider, ProviderConfig, SimulatedTransport, Transport};
pub use status::{StatusEntry, StatusEvent, StatusLog};
