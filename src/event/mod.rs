//! Event system: events, listeners, lifecycle tracking.

pub mod input;
pub mod lifecycle;
pub mod listeners;

pub use input::{Event, Key};
pub use lifecycle::{LifecycleEvent, LifecycleTracker};
pub use listeners::{Handler, Listeners};
