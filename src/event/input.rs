//! Document events: [`Event`] and [`Key`].
//!
//! Events are plain values dispatched to a node and bubbled to its
//! ancestors. Keyboard events carry the pressed [`Key`], which is how the
//! `enter`, `tab` and `escape` pseudo-events filter `keydown`.

use crate::dom::NodeId;

// ---------------------------------------------------------------------------
// Key
// ---------------------------------------------------------------------------

/// Keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Enter,
    Escape,
    Tab,
    Backspace,
    Delete,
    Left,
    Right,
    Up,
    Down,
}

impl Key {
    /// The key a pseudo-event name (`enter`, `tab`, `escape`) listens for.
    pub fn for_pseudo_event(name: &str) -> Option<Key> {
        match name {
            "enter" => Some(Key::Enter),
            "tab" => Some(Key::Tab),
            "escape" => Some(Key::Escape),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// An event travelling from its target up through the ancestors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Event type, e.g. `click`, `change`, `keydown`, `init`.
    pub kind: String,
    pub key: Option<Key>,
    /// Set when dispatched.
    pub target: Option<NodeId>,
    /// The node whose listeners are currently running.
    pub current: Option<NodeId>,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl Event {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            key: None,
            target: None,
            current: None,
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    /// A `keydown` event for `key`.
    pub fn key(key: Key) -> Self {
        Self {
            key: Some(key),
            ..Self::new("keydown")
        }
    }

    /// Suppress the render a handler would otherwise schedule.
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Stop bubbling after the current node's listeners.
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

// ===========================================================================
// Tests
// ===========================================================================
