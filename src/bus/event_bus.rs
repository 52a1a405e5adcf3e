use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

/// Callback invoked for every payload published on a subscribed topic
pub type Handler<P> = Arc<dyn Fn(&P) -> anyhow::Result<()> + Send + Sync>;

/// Outcome of a single publish call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Handlers that completed successfully
    pub delivered: usize,
    /// Handlers that returned an error or panicked
    pub failed: usize,
}

impl PublishReport {
    /// Total number of handlers invoked
    pub fn invoked(&self) -> usize {
        self.delivered + self.failed
    }
}

/// In-process publish/subscribe bus with synchronous fan-out
///
/// Handlers are keyed by exact topic string and invoked in registration order on
/// the publishing thread. A handler that fails, either by returning an error or by
/// panicking, is logged and skipped; the remaining handlers still receive the
/// payload and the publisher never sees the failure.
///
/// The bus is owned by the composition root and shared through an `Arc`.
/// Subscriptions are expected during startup, but the registry tolerates
/// concurrent reads while new handlers are added.
pub struct EventBus<P> {
    subscribers: RwLock<HashMap<String, Vec<Handler<P>>>>,
}

impl<P> Default for EventBus<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> EventBus<P> {
    /// Create a bus with no subscriptions
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a handler for a topic
    ///
    /// Registering the same handler twice results in it being invoked twice.
    pub fn subscribe<F>(&self, topic: &str, handler: F)
    where
        F: Fn(&P) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers
            .entry(topic.to_string())
            .or_default()
            .push(Arc::new(handler));
        info!("Subscribed callback to event: {}", topic);
    }

    /// Deliver a payload to every handler registered for `topic`
    ///
    /// Publishing to a topic without subscribers is a logged no-op.
    pub fn publish(&self, topic: &str, payload: &P) -> PublishReport {
        debug!("Publishing event: {}", topic);

        // Snapshot the handler list so handlers run without holding the lock
        let handlers: Vec<Handler<P>> = {
            let subscribers = self
                .subscribers
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match subscribers.get(topic) {
                Some(handlers) => handlers.clone(),
                None => Vec::new(),
            }
        };

        if handlers.is_empty() {
            warn!("No subscribers for event: {}", topic);
            return PublishReport::default();
        }

        debug!(
            "Notifying {} subscribers for event: {}",
            handlers.len(),
            topic
        );

        let mut report = PublishReport::default();
        for handler in &handlers {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(payload))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    error!("Error in subscriber callback for event {}: {:#}", topic, e);
                    report.failed += 1;
                }
                Err(panic_payload) => {
                    error!(
                        "Subscriber callback for event {} panicked: {}",
                        topic,
                        panic_message(panic_payload.as_ref())
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Number of handlers registered for a topic
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(topic)
            .map_or(0, Vec::len)
    }

    /// Topics that have at least one handler, sorted for stable output
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        topics.sort();
        topics
    }
}

/// Extract a readable message from a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
