//! Append-only status log of message lifecycle events
//!
//! Every dispatch outcome is recorded here; it is the authoritative record of
//! what happened to a message. Entries are never mutated or removed, and are
//! kept in emission order. Each entry is also mirrored to `tracing`.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use courier_common::MessageId;
use parking_lot::Mutex;
use tracing::info;

/// A lifecycle event for one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// Skipped because the identity was already delivered, or another
    /// dispatch of it is in flight
    Duplicate { in_flight: bool },
    /// Skipped because the admission capacity was reached
    RateLimited,
    /// Provider skipped because its circuit is open
    CircuitOpen { provider: String },
    /// Delivered through a provider
    Sent { provider: String },
    /// A provider exhausted its retries
    Failed { provider: String, error: String },
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate { in_flight: false } => f.write_str("Duplicate - skipped"),
            Self::Duplicate { in_flight: true } => {
                f.write_str("Duplicate - already in flight, skipped")
            }
            Self::RateLimited => f.write_str("Rate limit exceeded"),
            Self::CircuitOpen { provider } => write!(f, "{provider} circuit open - skipping"),
            Self::Sent { provider } => write!(f, "Sent via {provider}"),
            Self::Failed { provider, error } => write!(f, "Failed via {provider}: {error}"),
        }
    }
}

/// One recorded event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub timestamp: DateTime<Utc>,
    pub id: MessageId,
    pub event: StatusEvent,
}

impl StatusEntry {
    /// Human-readable description of the event
    pub fn message(&self) -> String {
        self.event.to_string()
    }
}

impl fmt::Display for StatusEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.id,
            self.event
        )
    }
}

/// Append-only record of status entries in emission order
#[derive(Debug, Default)]
pub struct StatusLog {
    entries: Mutex<Vec<StatusEntry>>,
}

impl StatusLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event for `id`
    pub fn record(&self, id: &MessageId, event: StatusEvent) {
        info!(target: "courier::status", identity = %id, event = %event, "{event}");

        let mut entries = self.entries.lock();
        // Stamped under the lock so timestamps follow append order
        entries.push(StatusEntry {
            timestamp: Utc::now(),
            id: id.clone(),
            event,
        });
    }

    /// Every entry recorded so far, in emission order
    pub fn entries(&self) -> Vec<StatusEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
