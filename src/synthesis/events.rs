use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::packets::{CancelationPacket, CompletionPacket, ProgressPacket, StartPacket};

/// Identifies one subscription so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

type Observer<P> = Arc<dyn Fn(&P) + Send + Sync>;

/// Observers of one event kind, called in subscription order.
pub struct ObserverList<P> {
    observers: RwLock<Vec<(SubscriptionId, Observer<P>)>>,
}

impl<P> Default for ObserverList<P> {
    fn default() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
        }
    }
}

impl<P> ObserverList<P> {
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let id = SubscriptionId(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, Arc::new(observer)));
        id
    }

    /// Returns `false` if `id` was not subscribed here.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(sid, _)| *sid != id);
        observers.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn clear(&self) {
        self.observers.write().clear();
    }

    /// Call every observer with `packet`.
    ///
    /// The list is snapshotted first, so observers may subscribe, unsubscribe
    /// or trigger further dispatch without deadlocking.
    pub fn dispatch(&self, packet: &P) {
        let snapshot: Vec<Observer<P>> = self
            .observers
            .read()
            .iter()
            .map(|(_, o)| Arc::clone(o))
            .collect();
        for observer in snapshot {
            observer(packet);
        }
    }
}

/// The four lifecycle events of a speech request.
#[derive(Default)]
pub struct SpeechEvents {
    pub started: ObserverList<StartPacket>,
    pub progressed: ObserverList<ProgressPacket>,
    pub completed: ObserverList<CompletionPacket>,
    pub canceled: ObserverList<CancelationPacket>,
}

impl SpeechEvents {
    pub fn clear(&self) {
        self.started.clear();
        self.progressed.clear();
        self.completed.clear();
        self.canceled.clear();
    }
}

/// Orchestrator-wide and request-scoped observers of one event kind.
///
/// Dispatch order is fixed: every orchestrator-wide observer, then every
/// request-scoped one.
///
/// The request scope is absent once its handle has been dropped.
pub(crate) struct Scopes<'a, P> {
    pub engine: &'a ObserverList<P>,
    pub request: Option<&'a ObserverList<P>>,
}

impl<P> Scopes<'_, P> {
    pub fn is_empty(&self) -> bool {
        self.engine.is_empty() && self.request.map_or(true, ObserverList::is_empty)
    }

    /// Build and deliver a packet, skipping construction when nobody listens.
    pub fn emit(&self, build: impl FnOnce() -> P) {
        if self.is_empty() {
            return;
        }
        let packet = build();
        self.engine.dispatch(&packet);
        if let Some(request) = self.request {
            request.dispatch(&packet);
        }
    }
}
