//! Admission control for concurrent dispatches
//!
//! Bounds the number of messages that are in flight at once. This is not a
//! rate-over-time limiter: a slot is held from admission until the dispatch
//! concludes, however long that takes, and `capacity` is the maximum number of
//! concurrently outstanding dispatches.

use courier_common::MessageId;
use parking_lot::Mutex;
use tracing::debug;

/// Fixed-capacity multiset of in-flight message identities
#[derive(Debug)]
pub struct AdmissionController {
    capacity: usize,
    /// Identity -> number of admitted dispatches holding a slot
    in_flight: Mutex<InFlight>,
}

#[derive(Debug, Default)]
struct InFlight {
    total: usize,
    by_id: ahash::AHashMap<MessageId, usize>,
}

impl AdmissionController {
    /// Create a controller admitting at most `capacity` concurrent dispatches
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            in_flight: Mutex::new(InFlight::default()),
        }
    }

    /// Try to take a slot for `id`.
    ///
    /// The capacity check and the increment happen under one lock, so
    /// concurrent callers can never jointly overshoot the capacity.
    pub fn try_admit(&self, id: &MessageId) -> bool {
        let mut in_flight = self.in_flight.lock();
        if in_flight.total >= self.capacity {
            return false;
        }

        in_flight.total += 1;
        *in_flight.by_id.entry(id.clone()).or_insert(0) += 1;
        true
    }

    /// Release one slot held by `id`.
    ///
    /// Releasing an identity that holds no slot is ignored.
    pub fn release(&self, id: &MessageId) {
        let mut in_flight = self.in_flight.lock();
        let remaining = in_flight.by_id.get_mut(id).map(|count| {
            *count -= 1;
            *count
        });

        match remaining {
            None => {
                drop(in_flight);
                debug!(identity = %id, "Release for an identity holding no admission slot");
                return;
            }
            Some(0) => {
                in_flight.by_id.remove(id);
            }
            Some(_) => {}
        }
        in_flight.total -= 1;
    }

    /// Take a slot for `id`, released automatically when the permit drops
    pub fn admit(&self, id: &MessageId) -> Option<AdmissionPermit<'_>> {
        self.try_admit(id).then(|| AdmissionPermit {
            controller: self,
            id: id.clone(),
        })
    }

    /// Number of slots currently held
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().total
    }

    /// Maximum number of concurrently admitted dispatches
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

/// An admission slot, released exactly once on drop
#[derive(Debug)]
pub struct AdmissionPermit<'a> {
    controller: &'a AdmissionController,
    id: MessageId,
}

impl AdmissionPermit<'_> {
    pub const fn id(&self) -> &MessageId {
        &self.id
    }
}

impl Drop for AdmissionPermit<'_> {
    fn drop(&mut self) {
        self.controller.release(&self.id);
    }
}
