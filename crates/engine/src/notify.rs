//! Notification aggregation
//!
//! Notifications are buffered per thread while a transaction is open and
//! delivered once, after the outermost transaction commits.
//!
//! ## Model
//!
//! | Type | Role |
//! |------|------|
//! | [`Notifications`] | Map handed to `execute`: namespace to payloads |
//! | [`NotificationBatch`] | The thread's pending notifications |
//! | [`NotificationEvent`] | One delivered namespace with every payload tracked for it |
//! | [`NotificationSink`] | Subscriber receiving events |
//!
//! Within a namespace payloads keep insertion order. Namespaces are
//! delivered in no particular order. A namespace with zero payloads is
//! never stored.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, trace};

/// Notification payload
pub type Payload = serde_json::Value;

// ============================================================================
// Notifications
// ============================================================================

/// Notifications to register with an `execute` call
///
/// ```
/// use lattice_engine::Notifications;
/// use serde_json::json;
///
/// let notifications = Notifications::new()
///     .with("task.created", json!({"key": "a"}))
///     .with("task.created", json!({"key": "b"}));
/// assert_eq!(notifications.get("task.created").unwrap().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Notifications {
    entries: BTreeMap<String, Vec<Payload>>,
}

impl Notifications {
    /// No notifications
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a payload (builder style)
    pub fn with(mut self, namespace: impl Into<String>, payload: impl Into<Payload>) -> Self {
        self.push(namespace, payload);
        self
    }

    /// Add a payload
    pub fn push(&mut self, namespace: impl Into<String>, payload: impl Into<Payload>) {
        self.entries
            .entry(namespace.into())
            .or_default()
            .push(payload.into());
    }

    /// Add several payloads to one namespace
    pub fn extend<I>(&mut self, namespace: impl Into<String>, payloads: I)
    where
        I: IntoIterator,
        I::Item: Into<Payload>,
    {
        let payloads: Vec<Payload> = payloads.into_iter().map(Into::into).collect();
        if payloads.is_empty() {
            return;
        }
        self.entries
            .entry(namespace.into())
            .or_default()
            .extend(payloads);
    }

    /// Payloads of `namespace`
    pub fn get(&self, namespace: &str) -> Option<&[Payload]> {
        self.entries.get(namespace).map(Vec::as_slice)
    }

    /// Namespaces with at least one payload
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of namespaces
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there is nothing to deliver
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// NotificationBatch
// ============================================================================

/// Pending notifications of one thread
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationBatch {
    pending: BTreeMap<String, Vec<Payload>>,
}

impl NotificationBatch {
    /// Merge-append every namespace of `notifications`
    pub fn merge(&mut self, notifications: Notifications) {
        for (namespace, payloads) in notifications.entries {
            self.pending.entry(namespace).or_default().extend(payloads);
        }
    }

    /// Append one payload
    pub fn track(&mut self, namespace: impl Into<String>, payload: Payload) {
        self.pending.entry(namespace.into()).or_default().push(payload);
    }

    /// Payloads pending for `namespace`
    pub fn get(&self, namespace: &str) -> Option<&[Payload]> {
        self.pending.get(namespace).map(Vec::as_slice)
    }

    /// Number of namespaces pending
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// One event per namespace
    pub fn into_events(self) -> Vec<NotificationEvent> {
        self.pending
            .into_iter()
            .map(|(namespace, instances)| NotificationEvent {
                namespace,
                instances,
            })
            .collect()
    }
}

/// A delivered notification: every payload tracked for one namespace
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    /// Namespace the payloads were tracked under
    pub namespace: String,
    /// Payloads in tracking order
    pub instances: Vec<Payload>,
}

// ============================================================================
// Sinks
// ============================================================================

/// Receives flushed notification events
pub trait NotificationSink: Send + Sync {
    /// Deliver one event
    fn deliver(&self, event: &NotificationEvent);
}

impl<F> NotificationSink for F
where
    F: Fn(&NotificationEvent) + Send + Sync,
{
    fn deliver(&self, event: &NotificationEvent) {
        self(event)
    }
}

// ============================================================================
// NotificationAggregator
// ============================================================================

/// Thread-keyed notification batches plus the subscribers they flush to
///
/// # Thread Safety
///
/// Each thread only ever touches its own batch. Sinks are invoked on the
/// flushing thread after the batch has been detached, with no lock held, so
/// a sink may subscribe further sinks or start a new transaction.
#[derive(Default)]
pub struct NotificationAggregator {
    batches: DashMap<ThreadId, NotificationBatch>,
    sinks: RwLock<Vec<Arc<dyn NotificationSink>>>,
    flushes: AtomicU64,
    delivered: AtomicU64,
}

impl std::fmt::Debug for NotificationAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationAggregator")
            .field("pending_threads", &self.batches.len())
            .field("sinks", &self.sinks.read().len())
            .field("flushes", &self.flushes.load(Ordering::Relaxed))
            .field("delivered", &self.delivered.load(Ordering::Relaxed))
            .finish()
    }
}

impl NotificationAggregator {
    /// Aggregator with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber
    pub fn subscribe(&self, sink: Arc<dyn NotificationSink>) {
        self.sinks.write().push(sink);
    }

    /// Number of subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sinks.read().len()
    }

    /// Merge `notifications` into the calling thread's batch
    pub fn register(&self, notifications: Notifications) {
        if notifications.is_empty() {
            return;
        }
        self.batches
            .entry(thread::current().id())
            .or_default()
            .merge(notifications);
    }

    /// Append one payload to the calling thread's batch
    ///
    /// The batch lives until this thread calls [`flush`](Self::flush) or
    /// [`discard`](Self::discard).
    pub fn track(&self, namespace: impl Into<String>, payload: impl Into<Payload>) {
        let namespace = namespace.into();
        trace!(target: "lattice::notify", namespace = %namespace, "Notification tracked");
        self.batches
            .entry(thread::current().id())
            .or_default()
            .track(namespace, payload.into());
    }

    /// Copy of the calling thread's batch
    pub fn pending(&self) -> NotificationBatch {
        self.batches
            .get(&thread::current().id())
            .map(|batch| batch.value().clone())
            .unwrap_or_default()
    }

    /// Number of threads holding a batch
    pub fn pending_threads(&self) -> usize {
        self.batches.len()
    }

    /// Detach the calling thread's batch and deliver it
    ///
    /// # Returns
    /// Number of events delivered (one per namespace). An empty batch fires
    /// nothing.
    pub fn flush(&self) -> usize {
        let Some((_, batch)) = self.batches.remove(&thread::current().id()) else {
            return 0;
        };
        if batch.is_empty() {
            return 0;
        }

        let events = batch.into_events();
        let sinks: Vec<Arc<dyn NotificationSink>> = self.sinks.read().clone();
        for event in &events {
            for sink in &sinks {
                sink.deliver(event);
            }
        }

        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.delivered
            .fetch_add(events.len() as u64, Ordering::Relaxed);
        debug!(target: "lattice::notify", events = events.len(), sinks = sinks.len(), "Notifications flushed");
        events.len()
    }

    /// Drop the calling thread's batch without delivering it
    ///
    /// Returns whether anything was pending.
    pub fn discard(&self) -> bool {
        match self.batches.remove(&thread::current().id()) {
            Some((_, batch)) if !batch.is_empty() => {
                debug!(target: "lattice::notify", namespaces = batch.len(), "Notifications discarded");
                true
            }
            _ => false,
        }
    }

    /// Batches flushed with at least one event
    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Events delivered across all flushes
    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}
