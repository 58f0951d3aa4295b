use std::sync::Arc;

use courier_common::{Message, internal};
use courier_dispatch::{DispatchConfig, DispatchOrchestrator, DispatchOutcome, StatusEntry};
use futures_util::future::join_all;
use serde::Deserialize;
use tracing::instrument;

/// Top-level configuration for the `courier` binary
#[derive(Debug, Default, Deserialize)]
pub struct Courier {
    #[serde(default)]
    dispatch: DispatchConfig,
}

/// Tally of dispatch outcomes from one `send` run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub sent: usize,
    pub duplicate: usize,
    pub rate_limited: usize,
    pub exhausted: usize,
}

impl Summary {
    fn record(&mut self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Sent { .. } => self.sent += 1,
            DispatchOutcome::Duplicate => self.duplicate += 1,
            DispatchOutcome::RateLimited => self.rate_limited += 1,
            DispatchOutcome::Exhausted => self.exhausted += 1,
        }
    }
}

impl Courier {
    pub const fn new(dispatch: DispatchConfig) -> Self {
        Self { dispatch }
    }

    pub const fn dispatch_config(&self) -> &DispatchConfig {
        &self.dispatch
    }

    /// Validate the configuration without dispatching anything
    ///
    /// # Errors
    ///
    /// Returns the first configuration problem found.
    pub fn check(&self) -> anyhow::Result<()> {
        self.dispatch.validate()?;
        internal!(
            providers = self.dispatch.providers.len(),
            rate_limit = self.dispatch.rate_limit,
            "Configuration is valid"
        );
        Ok(())
    }

    /// Dispatch `message` `repeat` times concurrently through simulated
    /// providers, returning the status log and an outcome tally
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    #[instrument(level = "debug", skip(self, message))]
    pub async fn send(
        &self,
        message: Message,
        repeat: usize,
    ) -> anyhow::Result<(Vec<StatusEntry>, Summary)> {
        let orchestrator = Arc::new(DispatchOrchestrator::from_config(&self.dispatch)?);
        let message = Arc::new(message);

        internal!(identity = %message.id(), repeat, "Dispatching");

        let outcomes = join_all((0..repeat).map(|_| {
            let orchestrator = Arc::clone(&orchestrator);
            let message = Arc::clone(&message);
            async move { orchestrator.dispatch(&message).await }
        }))
        .await;

        let summary = outcomes.iter().fold(Summary::default(), |mut summary, outcome| {
            summary.record(outcome);
            summary
        });

        Ok((orchestrator.status_entries(), summary))
    }
}
