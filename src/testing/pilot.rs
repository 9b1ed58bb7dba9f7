//! Pilot: programmatic interaction with a headless engine.
//!
//! The `Pilot` wraps an [`Engine`] built from markup and provides methods to
//! simulate user input against elements found by `id`, drive the render
//! scheduler, and read back markup, text and form values for assertions.

use crate::app::{AppConfig, Engine, SetupError};
use crate::component::ComponentDef;
use crate::dom::NodeId;
use crate::event::{Event, Key};
use crate::reactive::RenderHook;
use crate::template::RenderError;
use crate::value::Value;

// ---------------------------------------------------------------------------
// Pilot
// ---------------------------------------------------------------------------

/// A headless engine driver for testing.
///
/// # Examples
///
/// ```
/// use trellis::testing::Pilot;
/// use trellis::value::Value;
///
/// let mut pilot = Pilot::new(r#"<div x-app="main"><b id="n">{{ n }}</b></div>"#).unwrap();
/// let model = Value::object_from([("n", 1)]);
/// pilot.setup("main", model.clone()).unwrap();
/// pilot.flush().unwrap();
/// assert_eq!(pilot.text("n").unwrap(), "1");
/// ```
pub struct Pilot {
    engine: Engine,
}

impl Pilot {
    /// Parse `markup` into a fresh engine with the default config.
    pub fn new(markup: &str) -> Result<Self, SetupError> {
        Self::with_config(markup, AppConfig::default())
    }

    pub fn with_config(markup: &str, config: AppConfig) -> Result<Self, SetupError> {
        Ok(Self {
            engine: Engine::from_markup(markup, config)?,
        })
    }

    /// Register a component (builder). Must happen before `setup`.
    pub fn with_component(mut self, def: ComponentDef) -> Self {
        self.engine.components_mut().register(def);
        self
    }

    /// Compile an app and schedule its first render.
    pub fn setup(&mut self, name: &str, model: Value) -> Result<RenderHook, SetupError> {
        self.engine.setup(name, model)
    }

    // ── Input simulation ─────────────────────────────────────────────

    /// Dispatch `click` at the element with `id`.
    pub fn click(&mut self, id: &str) -> Result<Event, RenderError> {
        self.dispatch(id, Event::new("click"))
    }

    /// Set the element's value and dispatch `input`.
    pub fn input(&mut self, id: &str, value: &str) -> Result<Event, RenderError> {
        self.set_value(id, value)?;
        self.dispatch(id, Event::new("input"))
    }

    /// Set the element's value and dispatch `change`.
    pub fn change(&mut self, id: &str, value: &str) -> Result<Event, RenderError> {
        self.set_value(id, value)?;
        self.dispatch(id, Event::new("change"))
    }

    /// Append each character of `text` to the element's value, dispatching
    /// `input` after every character.
    pub fn type_text(&mut self, id: &str, text: &str) -> Result<(), RenderError> {
        for ch in text.chars() {
            let mut value = self.value(id)?;
            value.push(ch);
            self.input(id, &value)?;
        }
        Ok(())
    }

    /// Dispatch `keydown` for `key`.
    pub fn press_key(&mut self, id: &str, key: Key) -> Result<Event, RenderError> {
        self.dispatch(id, Event::key(key))
    }

    /// Dispatch an arbitrary event at the element with `id`.
    pub fn dispatch(&mut self, id: &str, event: Event) -> Result<Event, RenderError> {
        let node = self.find(id)?;
        self.engine.dispatch(node, event)
    }

    fn set_value(&mut self, id: &str, value: &str) -> Result<(), RenderError> {
        let node = self.find(id)?;
        if let Some(data) = self.engine.document_mut().get_mut(node) {
            data.value = value.to_owned();
        }
        Ok(())
    }

    // ── Processing ───────────────────────────────────────────────────

    /// Render every app with a pending render, ignoring debounce delays.
    pub fn flush(&mut self) -> Result<usize, RenderError> {
        self.engine.flush()
    }

    /// Wait out debounce delays until no render is pending.
    pub async fn settle(&mut self) -> Result<(), RenderError> {
        self.engine.settle().await
    }

    /// Whether any app has a render pending.
    pub fn is_pending(&self) -> bool {
        self.engine.next_deadline().is_some()
    }

    // ── Query ────────────────────────────────────────────────────────

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// The attached element with `id`.
    pub fn find(&self, id: &str) -> Result<NodeId, RenderError> {
        self.engine
            .document()
            .query_by_id(id)
            .ok_or_else(|| RenderError::NoSuchElement(id.to_owned()))
    }

    /// Serialized markup of the element with `id`.
    pub fn markup(&self, id: &str) -> Result<String, RenderError> {
        let node = self.find(id)?;
        Ok(self.engine.document().to_markup(node))
    }

    /// Serialized markup of the element's children.
    pub fn inner_markup(&self, id: &str) -> Result<String, RenderError> {
        let node = self.find(id)?;
        let doc = self.engine.document();
        Ok(doc.children(node).iter().map(|&c| doc.to_markup(c)).collect())
    }

    pub fn text(&self, id: &str) -> Result<String, RenderError> {
        let node = self.find(id)?;
        Ok(self.engine.document().text_content(node))
    }

    /// Form value of the element with `id`.
    pub fn value(&self, id: &str) -> Result<String, RenderError> {
        let node = self.find(id)?;
        Ok(self
            .engine
            .document()
            .get(node)
            .map(|d| d.value.clone())
            .unwrap_or_default())
    }

    pub fn exists(&self, id: &str) -> bool {
        self.find(id).is_ok()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn counter() -> (Pilot, Value) {
        let mut pilot = Pilot::new(
            r#"<div x-app="main"><button id="inc" @click="n += 1">+</button><span id="n">{{ n }}</span><input id="name" :bind="name on (input)"></div>"#,
        )
        .unwrap();
        let model = Value::from(json!({"n": 0, "name": "ada"}));
        pilot.setup("main", model.clone()).unwrap();
        pilot.flush().unwrap();
        (pilot, model)
    }

    // ── Construction ─────────────────────────────────────────────────

    #[test]
    fn bad_markup_fails() {
        assert!(matches!(
            Pilot::new("<div></span>"),
            Err(SetupError::Markup(_))
        ));
    }

    #[test]
    fn missing_app_element_fails() {
        let mut pilot = Pilot::new("<div></div>").unwrap();
        assert!(matches!(
            pilot.setup("main", Value::object()),
            Err(SetupError::NoAppElement(_))
        ));
    }

    // ── Input ────────────────────────────────────────────────────────

    #[test]
    fn click_then_flush() {
        let (mut pilot, _) = counter();
        pilot.click("inc").unwrap();
        assert!(pilot.is_pending());
        assert_eq!(pilot.text("n").unwrap(), "0");
        pilot.flush().unwrap();
        assert_eq!(pilot.text("n").unwrap(), "1");
        assert!(!pilot.is_pending());
    }

    #[test]
    fn type_text_writes_model() {
        let (mut pilot, model) = counter();
        assert_eq!(pilot.value("name").unwrap(), "ada");
        pilot.type_text("name", "!?").unwrap();
        assert_eq!(model.get("name"), Value::from("ada!?"));
    }

    #[test]
    fn unknown_id_is_an_error() {
        let (mut pilot, _) = counter();
        assert_eq!(
            pilot.click("nope").unwrap_err(),
            RenderError::NoSuchElement("nope".into())
        );
        assert!(!pilot.exists("nope"));
    }

    // ── Query ────────────────────────────────────────────────────────

    #[test]
    fn markup_helpers() {
        let (pilot, _) = counter();
        assert_eq!(pilot.markup("n").unwrap(), r#"<span id="n">0</span>"#);
        assert_eq!(pilot.inner_markup("inc").unwrap(), "+");
    }
}
