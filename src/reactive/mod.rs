//! Render scheduling.
//!
//! - [`Scheduler`]: per-app debounce timer and pass counter.
//! - [`RenderHook`]: the callback models and components use to request a render.

pub mod scheduler;

pub use scheduler::{RenderHook, Scheduler};
