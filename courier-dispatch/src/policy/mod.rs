//! Policy abstractions for dispatch operations.
//!
//! - [`RetryPolicy`]: bounded in-place retries with exponential backoff
//! - [`DeduplicationStore`]: identities already delivered (and claimed in flight)
//! - [`AdmissionController`]: fixed-capacity bound on concurrent dispatches

pub mod admission;
pub mod dedup;
pub mod retry;

pub use admission::{AdmissionController, AdmissionPermit};
pub use dedup::{Claim, DeduplicationStore, DeliveryClaim};
pub use retry::RetryPolicy;
