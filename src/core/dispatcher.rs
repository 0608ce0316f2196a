//! Event Dispatcher: synchronous fan-out of decoded messages
//!
//! Handler dipanggil berurutan sesuai urutan subscribe, di thread yang
//! memanggil [`Dispatcher::publish`]. Handler yang gagal (error atau
//! panic) dicatat lalu dilewati; handler berikutnya tetap jalan.
//!
//! Daftar subscriber dijaga `RwLock`. `publish` hanya memegang read lock
//! selama snapshot, jadi handler boleh subscribe/unsubscribe tanpa deadlock.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::protocol::{EventTag, Message};

/// Callback invoked for every matching message
pub type Handler = Arc<dyn Fn(&Message) -> anyhow::Result<()> + Send + Sync>;

/// What a subscriber listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Event(EventTag),
    All,
}

impl From<EventTag> for Topic {
    fn from(tag: EventTag) -> Self {
        Self::Event(tag)
    }
}

/// Token returned by [`Dispatcher::subscribe`]. Ids grow monotonically,
/// so ordering by id is subscription order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
struct Subscriber {
    id: SubscriptionId,
    handler: Handler,
}

/// Outcome of one publish call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub invoked: usize,
    pub failed: usize,
}

pub struct Dispatcher {
    subscribers: RwLock<HashMap<Topic, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `handler` for `topic`.
    pub fn subscribe<F>(&self, topic: impl Into<Topic>, handler: F) -> SubscriptionId
    where
        F: Fn(&Message) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let topic = topic.into();
        let handler: Handler = Arc::new(handler);

        // Id diambil di bawah write lock supaya tiap list tetap urut by id
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        subscribers
            .entry(topic)
            .or_default()
            .push(Subscriber { id, handler });
        drop(subscribers);

        debug!(?topic, id = id.0, "subscriber added");
        id
    }

    /// Remove a subscription. Returns `false` if the id was unknown.
    ///
    /// Once this returns, no publish that starts afterwards invokes the
    /// handler.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let mut removed = false;
        subscribers.retain(|_, list| {
            let before = list.len();
            list.retain(|s| s.id != id);
            removed |= list.len() != before;
            !list.is_empty()
        });

        if removed {
            debug!(id = id.0, "subscriber removed");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Snapshot handler untuk tag ini, urut sesuai subscribe
    fn matching(&self, tag: EventTag) -> Vec<Subscriber> {
        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let specific = subscribers.get(&Topic::Event(tag)).map(Vec::as_slice);
        let wildcard = subscribers.get(&Topic::All).map(Vec::as_slice);

        // Kedua list sudah urut by id; merge supaya urutan global terjaga
        let (a, b) = (specific.unwrap_or(&[]), wildcard.unwrap_or(&[]));
        let mut out = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            if a[i].id < b[j].id {
                out.push(a[i].clone());
                i += 1;
            } else {
                out.push(b[j].clone());
                j += 1;
            }
        }
        out.extend_from_slice(&a[i..]);
        out.extend_from_slice(&b[j..]);
        out
    }

    /// Invoke every matching handler in subscription order.
    ///
    /// Handler failures are logged and counted, never returned.
    pub fn publish(&self, msg: &Message) -> PublishReport {
        let tag = msg.event();
        let mut report = PublishReport::default();

        for subscriber in self.matching(tag) {
            report.invoked += 1;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (subscriber.handler)(msg)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    report.failed += 1;
                    warn!(event = %tag, id = subscriber.id.0, error = %err, "subscriber failed");
                }
                Err(_) => {
                    report.failed += 1;
                    warn!(event = %tag, id = subscriber.id.0, "subscriber panicked");
                }
            }
        }

        report
    }
}
