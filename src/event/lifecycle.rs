//! Node lifecycle: initialization, guard toggles, clones, component expansion.
//!
//! The `LifecycleTracker` records which nodes have been initialized (applied
//! at least once) and keeps the most recent lifecycle events for callers to
//! drain. Once `capacity` events are queued the oldest are dropped.

use std::collections::{HashSet, VecDeque};

use crate::dom::NodeId;

// ---------------------------------------------------------------------------
// LifecycleEvent
// ---------------------------------------------------------------------------

/// Events that occur while templates are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// First application of a node. An `init` event was dispatched to it.
    Initialized { node_id: NodeId },
    /// A guard turned false and the node was swapped for a placeholder.
    Hidden { node_id: NodeId },
    /// A guard turned true and the node was put back.
    Restored { node_id: NodeId },
    /// A repetition clone was created for `key`.
    CloneInserted { node_id: NodeId, key: String },
    /// A repetition clone was destroyed because `key` disappeared.
    CloneRemoved { node_id: NodeId, key: String },
    /// A component's markup replaced the node's content.
    Expanded { node_id: NodeId, component: String },
}

// ---------------------------------------------------------------------------
// LifecycleTracker
// ---------------------------------------------------------------------------

/// Default number of undrained events kept.
pub const DEFAULT_CAPACITY: usize = 256;

/// Tracks initialized nodes and keeps a bounded queue of lifecycle events.
#[derive(Debug)]
pub struct LifecycleTracker {
    initialized: HashSet<NodeId>,
    pending: VecDeque<LifecycleEvent>,
    capacity: usize,
}

impl Default for LifecycleTracker {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl LifecycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` undrained events. Zero disables recording.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            initialized: HashSet::new(),
            pending: VecDeque::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn record(&mut self, event: LifecycleEvent) {
        if self.capacity == 0 {
            return;
        }
        while self.pending.len() >= self.capacity {
            self.pending.pop_front();
        }
        self.pending.push_back(event);
    }

    /// Record a node's first application.
    ///
    /// Returns `false` (and records nothing) if it was already initialized.
    pub fn on_init(&mut self, id: NodeId) -> bool {
        let first = self.initialized.insert(id);
        if first {
            self.record(LifecycleEvent::Initialized { node_id: id });
        }
        first
    }

    pub fn on_hidden(&mut self, id: NodeId) {
        self.record(LifecycleEvent::Hidden { node_id: id });
    }

    pub fn on_restored(&mut self, id: NodeId) {
        self.record(LifecycleEvent::Restored { node_id: id });
    }

    pub fn on_clone_inserted(&mut self, id: NodeId, key: &str) {
        self.record(LifecycleEvent::CloneInserted {
            node_id: id,
            key: key.to_owned(),
        });
    }

    pub fn on_clone_removed(&mut self, id: NodeId, key: &str) {
        self.record(LifecycleEvent::CloneRemoved {
            node_id: id,
            key: key.to_owned(),
        });
    }

    pub fn on_expanded(&mut self, id: NodeId, component: &str) {
        self.record(LifecycleEvent::Expanded {
            node_id: id,
            component: component.to_owned(),
        });
    }

    pub fn is_initialized(&self, id: NodeId) -> bool {
        self.initialized.contains(&id)
    }

    /// Forget nodes that were removed from the document.
    pub fn forget(&mut self, ids: &[NodeId]) {
        for id in ids {
            self.initialized.remove(id);
        }
    }

    /// Drain and return all pending lifecycle events.
    pub fn pending_events(&mut self) -> Vec<LifecycleEvent> {
        self.pending.drain(..).collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
