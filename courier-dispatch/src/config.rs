//! Dispatcher configuration

use serde::{Deserialize, Serialize};

use crate::{
    circuit_breaker::CircuitBreakerConfig, error::ConfigError, policy::RetryPolicy,
    provider::ProviderConfig,
};

const fn default_rate_limit() -> usize {
    5
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::new("ProviderA"),
        ProviderConfig::new("ProviderB"),
    ]
}

/// Configuration for a [`crate::DispatchOrchestrator`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Maximum number of concurrently in-flight dispatches
    ///
    /// Default: 5
    #[serde(default = "default_rate_limit")]
    pub rate_limit: usize,

    /// Retry behavior for each provider attempt
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Circuit breaker settings, with optional per-provider overrides
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    /// Providers in fallback priority order; the first is tried first
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            rate_limit: default_rate_limit(),
            retry: RetryPolicy::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            providers: default_providers(),
        }
    }
}

impl DispatchConfig {
    /// Check the configuration for values the dispatcher cannot work with
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit == 0 {
            return Err(ConfigError::ZeroRateLimit);
        }

        if self.providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }

        let jitter = self.retry.jitter_factor;
        if !jitter.is_finite() || jitter < 0.0 {
            return Err(ConfigError::InvalidJitter(jitter));
        }

        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::ZeroFailureThreshold("default".to_string()));
        }

        let mut seen = ahash::AHashSet::with_capacity(self.providers.len());
        for provider in &self.providers {
            if !(0.0..=1.0).contains(&provider.failure_rate) {
                return Err(ConfigError::InvalidFailureRate {
                    name: provider.name.clone(),
                    rate: provider.failure_rate,
                });
            }

            if self
                .circuit_breaker
                .for_provider(&provider.name)
                .failure_threshold
                == 0
            {
                return Err(ConfigError::ZeroFailureThreshold(provider.name.clone()));
            }

            if !seen.insert(provider.name.as_str()) {
                return Err(ConfigError::DuplicateProvider(provider.name.clone()));
            }
        }

        Ok(())
    }
}
