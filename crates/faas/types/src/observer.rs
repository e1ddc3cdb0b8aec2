//! Invocation observers
//!
//! Observers receive three hooks per invocation, always in this order:
//! `initialize` before RAM is reserved, `execution` right before the callable
//! runs, and `update` once it has finished and its RAM was released.
//!
//! The registry is an explicitly constructed object shared by reference; there is
//! no process-wide collection. Observers may be added or removed while invocations
//! are in flight: a session only notifies observers that are still registered and
//! were present at `initialize`.

use crate::invocation::{InvocationContext, InvocationOutcome};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Hooks called around every invocation
pub trait InvocationObserver: Send + Sync {
    fn initialize(&self, ctx: &InvocationContext);

    fn execution(&self, _ctx: &InvocationContext) {}

    fn update(&self, ctx: &InvocationContext, outcome: &InvocationOutcome);
}

/// Handle used to remove an observer again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Set of observers notified for each invocation
#[derive(Default)]
pub struct ObserverRegistry {
    next_id: AtomicU64,
    observers: RwLock<Vec<(ObserverId, Arc<dyn InvocationObserver>)>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, observer: Arc<dyn InvocationObserver>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.observers.write().push((id, observer));
        id
    }

    /// Remove an observer, returning whether it was registered
    pub fn remove(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(oid, _)| *oid != id);
        observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    /// Run `initialize` on every current observer and open a session for the rest
    pub fn begin(self: &Arc<Self>, ctx: InvocationContext) -> ObserverSession {
        let snapshot: Vec<_> = self.observers.read().clone();
        for (_, observer) in &snapshot {
            observer.initialize(&ctx);
        }
        ObserverSession {
            registry: Arc::clone(self),
            initialized: snapshot.into_iter().map(|(id, _)| id).collect(),
            ctx,
        }
    }

    fn matching(&self, ids: &[ObserverId]) -> Vec<Arc<dyn InvocationObserver>> {
        self.observers
            .read()
            .iter()
            .filter(|(id, _)| ids.contains(id))
            .map(|(_, o)| Arc::clone(o))
            .collect()
    }
}

/// Observer bookkeeping for one in-flight invocation
pub struct ObserverSession {
    registry: Arc<ObserverRegistry>,
    initialized: Vec<ObserverId>,
    ctx: InvocationContext,
}

impl ObserverSession {
    pub fn context(&self) -> &InvocationContext {
        &self.ctx
    }

    pub fn execution(&self) {
        for observer in self.registry.matching(&self.initialized) {
            observer.execution(&self.ctx);
        }
    }

    pub fn update(&self, outcome: &InvocationOutcome) {
        for observer in self.registry.matching(&self.initialized) {
            observer.update(&self.ctx, outcome);
        }
    }
}
