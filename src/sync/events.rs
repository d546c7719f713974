use crate::store::MutationTarget;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub type SubscriptionId = u64;

type Callback = Arc<dyn Fn(&StateEvent) + Send + Sync>;

/// Lifecycle of one mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationPhase {
    Idle,
    Pending,
    Committed,
    RolledBack,
}

/// Emitted whenever the engine's state changed or a request failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateEvent {
    /// Optimistic value applied, gateway call in flight.
    Pending { target: MutationTarget },
    Committed { target: MutationTarget },
    /// The optimistic value was reverted; `message` is meant for the user.
    RolledBack {
        target: MutationTarget,
        message: String,
    },
    /// Rejected before anything was applied.
    Failed {
        target: Option<MutationTarget>,
        message: String,
    },
    /// The local copy was replaced by a fresh fetch.
    Refreshed,
}

impl StateEvent {
    pub fn phase(&self) -> Option<MutationPhase> {
        match self {
            StateEvent::Pending { .. } => Some(MutationPhase::Pending),
            StateEvent::Committed { .. } => Some(MutationPhase::Committed),
            StateEvent::RolledBack { .. } => Some(MutationPhase::RolledBack),
            StateEvent::Failed { .. } | StateEvent::Refreshed => None,
        }
    }

    /// Human-readable text for failure notifications.
    pub fn message(&self) -> Option<&str> {
        match self {
            StateEvent::RolledBack { message, .. } | StateEvent::Failed { message, .. } => {
                Some(message)
            }
            _ => None,
        }
    }
}

#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: AtomicU64,
    callbacks: Mutex<Vec<(SubscriptionId, Callback)>>,
}

impl Subscribers {
    pub(crate) fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&StateEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    pub(crate) fn clear(&self) {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Callbacks run outside the registry lock so they may subscribe or
    /// read engine state.
    pub(crate) fn notify(&self, event: &StateEvent) {
        let callbacks: Vec<Callback> = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in callbacks {
            callback(event);
        }
    }
}
