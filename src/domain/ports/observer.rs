//! Read-only observer hook on controller transitions.

use crate::domain::models::TransitionEvent;

/// Receives every state transition of a generation session.
///
/// Called inline on the controller task, so implementations must not block.
pub trait SessionObserver: Send + Sync {
    fn on_transition(&self, event: &TransitionEvent);
}

/// Observer that forwards to several observers in order.
#[derive(Default)]
pub struct ObserverSet {
    observers: Vec<std::sync::Arc<dyn SessionObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, observer: std::sync::Arc<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl SessionObserver for ObserverSet {
    fn on_transition(&self, event: &TransitionEvent) {
        for observer in &self.observers {
            observer.on_transition(event);
        }
    }
}
