//! # trellis
//!
//! A directive-driven template compiler and reactive renderer over a live
//! document tree.
//!
//! Markup is compiled once into a template tree: every node records which
//! directives apply to it and their compiled parameters. A render pass walks
//! the template tree and applies each directive against the current model,
//! updating the live document in place. Renders are debounced per app.
//!
//! ## Core Systems
//!
//! - **[`value`]**: Dynamic model values with shared objects and arrays
//! - **[`dom`]**: Slotmap-backed document arena, source snapshots, markup parser
//! - **[`expr`]**: Expression tokenizer, parser and evaluator
//! - **[`scope`]**: Scope chain and flattened locals tables
//! - **[`template`]**: Template arena, compile phase, apply phase
//! - **[`directive`]**: The `Directive` trait, registry and built-in directives
//! - **[`component`]**: Component registry and builders
//! - **[`event`]**: Events, listeners and lifecycle signals
//! - **[`reactive`]**: Per-app render scheduler and render hooks
//! - **[`app`]**: `Engine` tying everything together
//! - **[`testing`]**: Headless `Pilot` driver
//!
//! ```
//! use trellis::app::{AppConfig, Engine};
//! use trellis::value::Value;
//!
//! let mut engine = Engine::from_markup(
//!     r#"<ul x-app="todo"><li :each="t in items">{{ t }}</li></ul>"#,
//!     AppConfig::default(),
//! )
//! .unwrap();
//! let model = Value::object_from([("items", Value::array(["a", "b"]))]);
//! engine.setup("todo", model).unwrap();
//! engine.flush().unwrap();
//! let list = engine.app("todo").unwrap().element();
//! assert_eq!(engine.document().text_content(list), "ab");
//! ```

// Foundation
pub mod dom;
pub mod value;

// Expressions and scopes
pub mod expr;
pub mod scope;

// Compilation and rendering
pub mod directive;
pub mod template;

// Components, events and scheduling
pub mod component;
pub mod event;
pub mod reactive;

// Application
pub mod app;
pub mod testing;

pub use app::{AppConfig, Engine};
pub use value::Value;
