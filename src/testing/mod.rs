//! Headless testing helpers.
//!
//! Use the [`Pilot`] to drive an [`Engine`](crate::app::Engine) from tests:
//! dispatch input at elements by `id`, flush or settle pending renders, and
//! read back markup.

pub mod pilot;

pub use pilot::Pilot;
