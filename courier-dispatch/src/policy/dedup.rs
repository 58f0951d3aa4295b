//! Deduplication of successfully delivered messages
//!
//! An identity is recorded as delivered only after a provider reports
//! success, and is never forgotten for the lifetime of the store. Failed or
//! skipped dispatches leave no trace, so the caller may resubmit them.
//!
//! Dispatches also *claim* an identity for the duration of the attempt, which
//! makes the check-and-insert atomic per identity: two concurrent dispatches
//! of the same message cannot both reach a provider.

use courier_common::MessageId;
use dashmap::{DashMap, mapref::entry::Entry};

/// Result of claiming an identity for dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// Not seen before; the caller now holds the in-flight claim
    Fresh,
    /// Already delivered successfully
    Delivered,
    /// Another dispatch of the same identity is in progress
    InFlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeliveryState {
    InFlight,
    Delivered,
}

/// Process-lifetime record of delivered message identities
#[derive(Debug, Default)]
pub struct DeduplicationStore {
    entries: DashMap<MessageId, DeliveryState>,
}

impl DeduplicationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `id` has been delivered successfully
    pub fn has(&self, id: &MessageId) -> bool {
        self.entries
            .get(id)
            .is_some_and(|state| *state == DeliveryState::Delivered)
    }

    /// Mark `id` as delivered, replacing any in-flight claim
    ///
    /// Returns `false` if it was already marked delivered
    pub fn add(&self, id: MessageId) -> bool {
        self.entries.insert(id, DeliveryState::Delivered) != Some(DeliveryState::Delivered)
    }

    /// Atomically check `id` and, if unseen, claim it as in flight
    pub fn try_claim(&self, id: &MessageId) -> Claim {
        match self.entries.entry(id.clone()) {
            Entry::Occupied(entry) => match entry.get() {
                DeliveryState::Delivered => Claim::Delivered,
                DeliveryState::InFlight => Claim::InFlight,
            },
            Entry::Vacant(entry) => {
                entry.insert(DeliveryState::InFlight);
                Claim::Fresh
            }
        }
    }

    /// Claim `id`, returning a guard that abandons the claim on drop unless
    /// it is committed.
    ///
    /// # Errors
    ///
    /// Returns [`Claim::Delivered`] or [`Claim::InFlight`] when the identity
    /// cannot be claimed.
    pub fn claim(&self, id: &MessageId) -> Result<DeliveryClaim<'_>, Claim> {
        match self.try_claim(id) {
            Claim::Fresh => Ok(DeliveryClaim {
                store: self,
                id: id.clone(),
                committed: false,
            }),
            other => Err(other),
        }
    }

    /// Drop an in-flight claim that did not end in delivery
    ///
    /// Delivered identities are never removed.
    pub fn abandon(&self, id: &MessageId) {
        self.entries
            .remove_if(id, |_, state| *state == DeliveryState::InFlight);
    }

    /// Number of identities delivered
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| *entry.value() == DeliveryState::Delivered)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-flight claim on an identity
#[derive(Debug)]
pub struct DeliveryClaim<'a> {
    store: &'a DeduplicationStore,
    id: MessageId,
    committed: bool,
}

impl DeliveryClaim<'_> {
    /// Record the identity as delivered
    pub fn commit(mut self) {
        self.store.add(self.id.clone());
        self.committed = true;
    }
}

impl Drop for DeliveryClaim<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.store.abandon(&self.id);
        }
    }
}
