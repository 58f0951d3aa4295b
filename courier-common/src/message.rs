//! Outbound notification model

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

/// A notification to be dispatched to a single recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Recipient address
    pub recipient: String,
    /// Subject line
    pub subject: String,
    /// Body text; not part of the identity
    #[serde(default)]
    pub body: String,
}

impl Message {
    #[must_use]
    pub fn new(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Identity used for deduplication and admission.
    ///
    /// Two messages with the same recipient and subject share an identity
    /// regardless of their body.
    #[must_use]
    pub fn id(&self) -> MessageId {
        MessageId::new(&self.recipient, &self.subject)
    }
}

/// Caller-visible identity of a logical message, `<recipient>-<subject>`
///
/// The parts are joined without escaping, so a `-` in either part can make
/// distinct pairs collide: `("a-b", "c")` and `("a", "b-c")` share the
/// identity `a-b-c` and are deduplicated together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Arc<str>);

impl MessageId {
    #[must_use]
    pub fn new(recipient: &str, subject: &str) -> Self {
        Self(Arc::from(format!("{recipient}-{subject}")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MessageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
