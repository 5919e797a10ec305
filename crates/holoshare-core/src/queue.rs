//! Inbound action queue.
//!
//! The one structure shared between the bus's receive callback and the tick
//! driver. Producers push one action at a time; the consumer takes everything
//! at once, so the lock is held only for a push or a swap.

use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;

use crate::Action;

/// FIFO hand-off of decoded remote actions.
///
/// Cloning yields another handle to the same queue.
#[derive(Debug, Clone, Default)]
pub struct InboundQueue {
    inner: Arc<Mutex<VecDeque<Action>>>,
}

impl InboundQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an action. Never blocks beyond a short critical section.
    pub fn enqueue(&self, action: Action) {
        self.inner.lock().push_back(action);
    }

    /// Take every queued action, in arrival order, leaving the queue empty.
    pub fn drain_all(&self) -> Vec<Action> {
        let drained = std::mem::take(&mut *self.inner.lock());
        drained.into()
    }

    /// Number of queued actions.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
