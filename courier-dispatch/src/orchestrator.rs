//! Dispatch orchestration
//!
//! Routes one message through the provider fallback chain.
//!
//! ## Stages
//!
//! 1. **Deduplication**: skip identities already delivered or in flight
//! 2. **Admission**: take one of `rate_limit` in-flight slots, or skip
//! 3. **Fallback**: for each provider in priority order, consult its circuit
//!    breaker, then deliver with in-place retries; stop at the first success
//! 4. **Release**: the admission slot is released however the dispatch ends
//!
//! Failures never propagate to the caller. Every skip, failure and success is
//! recorded in the [`StatusLog`], and the caller also receives a
//! [`DispatchOutcome`] summarizing the result.

use std::sync::Arc;

use courier_common::{Message, MessageId, dispatch, internal};
use tracing::{instrument, warn};
use ulid::Ulid;

use crate::{
    config::DispatchConfig,
    error::ConfigError,
    policy::{AdmissionController, Claim, DeduplicationStore, DeliveryClaim, RetryPolicy},
    provider::{Provider, SimulatedTransport, Transport},
    status::{StatusEntry, StatusEvent, StatusLog},
};

/// How a dispatch concluded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Delivered through the named provider
    Sent { provider: String },
    /// Skipped: already delivered, or the same identity is in flight
    Duplicate,
    /// Skipped: admission capacity reached
    RateLimited,
    /// Every provider was skipped or failed; the message was dropped
    Exhausted,
}

impl DispatchOutcome {
    pub const fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}

/// Resilient dispatcher owning the providers, policies and status log
///
/// Construct one per process and share it by reference or `Arc`.
#[derive(Debug)]
pub struct DispatchOrchestrator {
    providers: Vec<Provider>,
    retry: RetryPolicy,
    deduplication: DeduplicationStore,
    admission: AdmissionController,
    status: StatusLog,
}

impl DispatchOrchestrator {
    /// Create a dispatcher over `providers`, tried in the given order
    #[must_use]
    pub fn new(providers: Vec<Provider>, retry: RetryPolicy, rate_limit: usize) -> Self {
        Self {
            providers,
            retry,
            deduplication: DeduplicationStore::new(),
            admission: AdmissionController::new(rate_limit),
            status: StatusLog::new(),
        }
    }

    /// Build a dispatcher with a [`SimulatedTransport`] for every configured provider
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn from_config(config: &DispatchConfig) -> Result<Self, ConfigError> {
        let transports = config
            .providers
            .iter()
            .map(|provider| Arc::new(SimulatedTransport::from(provider)) as Arc<dyn Transport>)
            .collect();

        Self::with_transports(config, transports)
    }

    /// Build a dispatcher from `config`, delivering through `transports`
    ///
    /// Transports are matched to configured providers by name; the configured
    /// order is the fallback order. Transports with no configured provider are
    /// not used.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, or a configured
    /// provider has no transport.
    pub fn with_transports(
        config: &DispatchConfig,
        transports: Vec<Arc<dyn Transport>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let providers = config
            .providers
            .iter()
            .map(|provider| {
                transports
                    .iter()
                    .find(|transport| transport.name() == provider.name)
                    .map(|transport| {
                        Provider::new(
                            Arc::clone(transport),
                            config.circuit_breaker.for_provider(&provider.name),
                        )
                    })
                    .ok_or_else(|| ConfigError::MissingTransport(provider.name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        internal!(
            level = DEBUG,
            providers = providers.len(),
            rate_limit = config.rate_limit,
            max_attempts = config.retry.max_attempts,
            "Dispatcher initialised"
        );

        Ok(Self::new(providers, config.retry.clone(), config.rate_limit))
    }

    /// Dispatch `message` through the provider chain.
    ///
    /// Never fails: the outcome is returned and recorded in the status log.
    #[instrument(
        level = "debug",
        skip_all,
        fields(identity = %message.id(), dispatch_id = %Ulid::new())
    )]
    pub async fn dispatch(&self, message: &Message) -> DispatchOutcome {
        let id = message.id();

        let claim = match self.deduplication.claim(&id) {
            Ok(claim) => claim,
            Err(existing) => {
                self.status.record(
                    &id,
                    StatusEvent::Duplicate {
                        in_flight: existing == Claim::InFlight,
                    },
                );
                return DispatchOutcome::Duplicate;
            }
        };

        let Some(_permit) = self.admission.admit(&id) else {
            drop(claim);
            self.status.record(&id, StatusEvent::RateLimited);
            return DispatchOutcome::RateLimited;
        };

        self.deliver(&id, message, claim).await
    }

    /// Walk the fallback chain while holding an admission slot
    async fn deliver(
        &self,
        id: &MessageId,
        message: &Message,
        claim: DeliveryClaim<'_>,
    ) -> DispatchOutcome {
        for provider in &self.providers {
            if !provider.breaker().allow_request() {
                self.status.record(
                    id,
                    StatusEvent::CircuitOpen {
                        provider: provider.name().to_string(),
                    },
                );
                continue;
            }

            match self
                .retry
                .attempt(provider.transport(), message, self.retry.max_attempts)
                .await
            {
                Ok(receipt) => {
                    claim.commit();
                    dispatch!(level = DEBUG, provider = provider.name(), receipt = %receipt, "Provider accepted message");
                    self.status.record(
                        id,
                        StatusEvent::Sent {
                            provider: provider.name().to_string(),
                        },
                    );
                    return DispatchOutcome::Sent {
                        provider: provider.name().to_string(),
                    };
                }
                Err(failure) => {
                    provider.breaker().record_failure();
                    self.status.record(
                        id,
                        StatusEvent::Failed {
                            provider: failure.provider.clone(),
                            error: failure.to_string(),
                        },
                    );
                }
            }
        }

        warn!(identity = %id, "All providers exhausted, message dropped");
        DispatchOutcome::Exhausted
    }

    /// Providers in fallback order
    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub const fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub const fn status_log(&self) -> &StatusLog {
        &self.status
    }

    /// Every status entry recorded so far, in emission order
    pub fn status_entries(&self) -> Vec<StatusEntry> {
        self.status.entries()
    }

    pub const fn deduplication(&self) -> &DeduplicationStore {
        &self.deduplication
    }

    pub const fn admission(&self) -> &AdmissionController {
        &self.admission
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{circuit_breaker::CircuitState, provider::ProviderConfig};

    fn config(providers: &[(&str, f64)]) -> DispatchConfig {
        DispatchConfig {
            providers: providers
                .iter()
                .map(|(name, failure_rate)| ProviderConfig {
                    name: (*name).to_string(),
                    failure_rate: *failure_rate,
                    latency_ms: 100,
                })
                .collect(),
            ..DispatchConfig::default()
        }
    }

    fn message() -> Message {
        Message::new("unit@test.com", "Unit Test", "This is a test.")
    }

    fn events(orchestrator: &DispatchOrchestrator) -> Vec<String> {
        orchestrator
            .status_entries()
            .iter()
            .map(StatusEntry::message)
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_then_duplicate() {
        let orchestrator =
            DispatchOrchestrator::from_config(&config(&[("ProviderA", 0.0)])).unwrap();

        assert_eq!(
            orchestrator.dispatch(&message()).await,
            DispatchOutcome::Sent {
                provider: "ProviderA".to_string()
            }
        );
        assert_eq!(
            orchestrator.dispatch(&message()).await,
            DispatchOutcome::Duplicate
        );

        assert_eq!(
            events(&orchestrator),
            ["Sent via ProviderA", "Duplicate - skipped"]
        );
        assert_eq!(orchestrator.admission().in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_back_to_second_provider() {
        let orchestrator = DispatchOrchestrator::from_config(&config(&[
            ("ProviderA", 1.0),
            ("ProviderB", 0.0),
        ]))
        .unwrap();

        let outcome = orchestrator.dispatch(&message()).await;

        assert_eq!(
            outcome,
            DispatchOutcome::Sent {
                provider: "ProviderB".to_string()
            }
        );
        assert_eq!(
            events(&orchestrator),
            [
                "Failed via ProviderA: ProviderA failed to send email.",
                "Sent via ProviderB"
            ]
        );
        assert_eq!(orchestrator.providers()[0].breaker().stats().failure_count, 1);
        assert_eq!(orchestrator.providers()[1].breaker().stats().failure_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_is_not_deduplicated() {
        let orchestrator =
            DispatchOrchestrator::from_config(&config(&[("ProviderA", 1.0)])).unwrap();

        assert_eq!(
            orchestrator.dispatch(&message()).await,
            DispatchOutcome::Exhausted
        );
        assert!(!orchestrator.deduplication().has(&message().id()));
        assert_eq!(orchestrator.admission().in_flight(), 0);

        // Eligible for resubmission
        assert_eq!(
            orchestrator.dispatch(&message()).await,
            DispatchOutcome::Exhausted
        );
        assert!(events(&orchestrator).iter().all(|event| !event.contains("Duplicate")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_takes_full_backoff() {
        let orchestrator =
            DispatchOrchestrator::from_config(&config(&[("ProviderA", 1.0)])).unwrap();
        let start = tokio::time::Instant::now();

        orchestrator.dispatch(&message()).await;

        // Three attempts of 100ms latency plus 200ms and 400ms backoff
        assert_eq!(start.elapsed(), Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_opens_after_threshold_dispatches() {
        let orchestrator =
            DispatchOrchestrator::from_config(&config(&[("ProviderA", 1.0)])).unwrap();

        for subject in ["one", "two", "three"] {
            let message = Message::new("unit@test.com", subject, "");
            orchestrator.dispatch(&message).await;
        }
        assert_eq!(
            orchestrator.providers()[0].breaker().state(),
            CircuitState::Open
        );

        orchestrator
            .dispatch(&Message::new("unit@test.com", "four", ""))
            .await;

        let events = events(&orchestrator);
        assert_eq!(events.last().unwrap(), "ProviderA circuit open - skipping");
        assert_eq!(orchestrator.providers()[0].breaker().stats().failure_count, 3);
    }

    #[tokio::test]
    async fn test_rate_limited_skip_holds_no_slot() {
        let orchestrator = DispatchOrchestrator::from_config(&DispatchConfig {
            rate_limit: 1,
            ..config(&[("ProviderA", 0.0)])
        })
        .unwrap();

        let held = orchestrator.admission().admit(&MessageId::new("other", "held"));
        assert!(held.is_some());

        assert_eq!(
            orchestrator.dispatch(&message()).await,
            DispatchOutcome::RateLimited
        );
        assert_eq!(events(&orchestrator), ["Rate limit exceeded"]);
        assert_eq!(orchestrator.admission().in_flight(), 1);
        assert!(!orchestrator.deduplication().has(&message().id()));

        drop(held);
        assert_eq!(orchestrator.admission().in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_same_identity_delivered_once() {
        let orchestrator = Arc::new(
            DispatchOrchestrator::from_config(&config(&[("ProviderA", 0.0)])).unwrap(),
        );

        let first = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.dispatch(&message()).await }
        });
        let second = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.dispatch(&message()).await }
        });

        let mut outcomes = vec![first.await.unwrap(), second.await.unwrap()];
        outcomes.sort_by_key(DispatchOutcome::is_sent);

        assert_eq!(outcomes[0], DispatchOutcome::Duplicate);
        assert!(outcomes[1].is_sent());
        let sent = events(&orchestrator)
            .iter()
            .filter(|event| event.starts_with("Sent via"))
            .count();
        assert_eq!(sent, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_dispatch_releases_slot_and_claim() {
        let orchestrator = DispatchOrchestrator::from_config(&DispatchConfig {
            rate_limit: 1,
            ..config(&[("ProviderA", 1.0)])
        })
        .unwrap();

        // First attempt fails at 100ms, so 150ms lands inside the 200ms backoff
        let cancelled =
            tokio::time::timeout(Duration::from_millis(150), orchestrator.dispatch(&message()))
                .await;

        assert!(cancelled.is_err());
        assert_eq!(orchestrator.admission().in_flight(), 0);
        assert!(!orchestrator.deduplication().has(&message().id()));
        assert!(orchestrator.deduplication().claim(&message().id()).is_ok());

        assert_eq!(
            orchestrator.dispatch(&message()).await,
            DispatchOutcome::Exhausted
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unusable_jitter_does_not_abort_dispatch() {
        let providers = vec![Provider::new(
            Arc::new(SimulatedTransport::new("ProviderA", 1.0, Duration::ZERO)),
            DispatchConfig::default().circuit_breaker.for_provider("ProviderA"),
        )];
        let retry = RetryPolicy {
            jitter_factor: f64::INFINITY,
            ..RetryPolicy::default()
        };
        let orchestrator = Arc::new(DispatchOrchestrator::new(providers, retry, 1));

        let handle = tokio::spawn({
            let orchestrator = Arc::clone(&orchestrator);
            async move { orchestrator.dispatch(&message()).await }
        });

        assert_eq!(handle.await.unwrap(), DispatchOutcome::Exhausted);
        assert_eq!(orchestrator.admission().in_flight(), 0);
    }

    #[test]
    fn test_with_transports_requires_every_provider() {
        let transports: Vec<Arc<dyn Transport>> = vec![Arc::new(SimulatedTransport::new(
            "ProviderA",
            0.0,
            Duration::ZERO,
        ))];

        let error = DispatchOrchestrator::with_transports(
            &config(&[("ProviderA", 0.0), ("ProviderB", 0.0)]),
            transports,
        )
        .unwrap_err();

        assert_eq!(error, ConfigError::MissingTransport("ProviderB".to_string()));
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let error = DispatchOrchestrator::from_config(&DispatchConfig {
            rate_limit: 0,
            ..DispatchConfig::default()
        })
        .unwrap_err();

        assert_eq!(error, ConfigError::ZeroRateLimit);
    }
}
