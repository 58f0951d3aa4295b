//! Scripted transport for exercising the dispatcher

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use courier_dispatch::{Message, Transport, TransportError};
use parking_lot::Mutex;

/// Transport that replays scripted outcomes, then repeats a fallback outcome
pub struct ScriptedTransport {
    name: String,
    latency: Duration,
    script: Mutex<VecDeque<bool>>,
    fallback: Mutex<bool>,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedTransport {
    /// Always succeeds
    pub fn succeeding(name: &str) -> Arc<Self> {
        Self::build(name, true)
    }

    /// Always fails
    pub fn failing(name: &str) -> Arc<Self> {
        Self::build(name, false)
    }

    fn build(name: &str, fallback: bool) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            latency: Duration::from_millis(50),
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        })
    }

    /// Outcomes to return before falling back, in order (`true` = success)
    pub fn script(&self, outcomes: &[bool]) {
        self.script.lock().extend(outcomes);
    }

    /// Change the outcome returned once the script is used up
    pub fn set_fallback(&self, succeed: bool) {
        *self.fallback.lock() = succeed;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of deliveries observed in progress at once
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, message: &Message) -> Result<String, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        tokio::time::sleep(self.latency).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        let succeed = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| *self.fallback.lock());

        if succeed {
            Ok(format!("{} sent email to {}", self.name, message.recipient))
        } else {
            Err(TransportError::Failed(format!(
                "{} failed to send email.",
                self.name
            )))
        }
    }
}
