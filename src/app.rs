//! Engine: document, template arena, directive registry, apps, scheduling.
//!
//! [`Engine`] owns everything an app needs: the live [`Document`], the
//! compiled [`Templates`], the directive and component registries, event
//! listeners and per-node directive state. Each [`App`] is a named root
//! template bound to a model with its own [`Scheduler`].

use std::rc::Rc;
use std::time::Duration;

use indexmap::IndexMap;
use slotmap::SecondaryMap;
use tokio::time::Instant;
use tracing::{debug, error};

use crate::component::ComponentRegistry;
use crate::directive::{Directive, DirectiveRegistry, NodeState};
use crate::dom::{parse_markup, Document, MarkupError, NodeData, NodeId};
use crate::event::{lifecycle, Event, LifecycleEvent, LifecycleTracker, Listeners};
use crate::reactive::{RenderHook, Scheduler};
use crate::scope::{Scope, ShadowPolicy};
use crate::template::{RenderError, TemplateId, Templates};
use crate::value::Value;

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

/// Engine-wide configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Delay used when a triggering event has no debounce entry.
    pub default_delay: Duration,
    /// How locals and same-named model properties shadow each other.
    pub shadowing: ShadowPolicy,
    /// Tags never compiled.
    pub skip_tags: Vec<String>,
    /// Alias of the root model.
    pub root_alias: String,
    /// Attribute marking an app's root element.
    pub app_attribute: String,
    /// Undrained lifecycle events kept before the oldest are dropped.
    pub lifecycle_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_delay: Duration::ZERO,
            shadowing: ShadowPolicy::default(),
            skip_tags: ["script", "style", "link", "meta"]
                .into_iter()
                .map(String::from)
                .collect(),
            root_alias: "app".to_owned(),
            app_attribute: "x-app".to_owned(),
            lifecycle_capacity: lifecycle::DEFAULT_CAPACITY,
        }
    }
}

impl AppConfig {
    /// Create a new default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default debounce delay (builder).
    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// Set the shadowing policy (builder).
    pub fn with_shadowing(mut self, policy: ShadowPolicy) -> Self {
        self.shadowing = policy;
        self
    }

    /// Replace the skipped tags (builder).
    pub fn with_skip_tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.skip_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set the root model alias (builder).
    pub fn with_root_alias(mut self, alias: impl Into<String>) -> Self {
        self.root_alias = alias.into();
        self
    }

    /// Set the app marker attribute (builder).
    pub fn with_app_attribute(mut self, name: impl Into<String>) -> Self {
        self.app_attribute = name.into();
        self
    }

    /// Set how many undrained lifecycle events are kept (builder).
    pub fn with_lifecycle_capacity(mut self, capacity: usize) -> Self {
        self.lifecycle_capacity = capacity;
        self
    }

    /// Whether elements with this tag are left uncompiled.
    pub fn is_skipped(&self, tag: &str) -> bool {
        self.skip_tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// One independently rendered root template bound to a model.
#[derive(Debug)]
pub struct App {
    name: Rc<str>,
    root: TemplateId,
    element: NodeId,
    model: Value,
    scheduler: Scheduler,
}

impl App {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> TemplateId {
        self.root
    }

    /// The element carrying the app attribute.
    pub fn element(&self) -> NodeId {
        self.element
    }

    pub fn model(&self) -> &Value {
        &self.model
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn hook(&self) -> RenderHook {
        RenderHook::new(Rc::clone(&self.name), self.scheduler.clone())
    }
}

/// Setting up an app failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SetupError {
    #[error("no element marks app '{0}'")]
    NoAppElement(String),
    #[error(transparent)]
    Markup(#[from] MarkupError),
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The template engine.
pub struct Engine {
    pub(crate) document: Document,
    pub(crate) templates: Templates,
    pub(crate) directives: Rc<DirectiveRegistry>,
    pub(crate) components: ComponentRegistry,
    pub(crate) listeners: Listeners,
    pub(crate) node_state: SecondaryMap<NodeId, NodeState>,
    pub(crate) lifecycle: LifecycleTracker,
    pub(crate) apps: IndexMap<Rc<str>, App>,
    pub(crate) config: AppConfig,
}

impl Engine {
    /// Create an engine over an existing document, with the built-in
    /// directives registered.
    pub fn new(document: Document, config: AppConfig) -> Self {
        Self {
            document,
            templates: Templates::new(),
            directives: Rc::new(DirectiveRegistry::builtin()),
            components: ComponentRegistry::new(),
            listeners: Listeners::new(),
            node_state: SecondaryMap::new(),
            lifecycle: LifecycleTracker::with_capacity(config.lifecycle_capacity),
            apps: IndexMap::new(),
            config,
        }
    }

    /// Parse `markup` into a fresh document under a `body` root.
    pub fn from_markup(markup: &str, config: AppConfig) -> Result<Self, SetupError> {
        let nodes = parse_markup(markup)?;
        let mut document = Document::new();
        let body = document.insert(NodeData::element("body"));
        for node in &nodes {
            document.instantiate(Some(body), node);
        }
        Ok(Self::new(document, config))
    }

    /// Replace the directive registry (builder).
    pub fn with_registry(mut self, registry: DirectiveRegistry) -> Self {
        self.directives = Rc::new(registry);
        self
    }

    /// Add (or replace) a directive. Affects templates compiled afterwards.
    pub fn register_directive(&mut self, directive: impl Directive + 'static) {
        Rc::make_mut(&mut self.directives).register(directive);
    }

    // -- Apps -------------------------------------------------------------

    /// Compile the element marked with `name` against `model` and schedule
    /// its first render.
    ///
    /// Setting up an existing app only triggers a render.
    pub fn setup(&mut self, name: &str, model: Value) -> Result<RenderHook, SetupError> {
        if let Some(app) = self.apps.get(name) {
            let hook = app.hook();
            hook.trigger();
            return Ok(hook);
        }

        let element = self
            .document
            .root()
            .and_then(|root| {
                self.document
                    .query_by_attr(root, &self.config.app_attribute, name)
            })
            .ok_or_else(|| SetupError::NoAppElement(name.to_owned()))?;

        let name: Rc<str> = Rc::from(name);
        let scheduler = Scheduler::new(self.config.default_delay);
        let hook = RenderHook::new(Rc::clone(&name), scheduler.clone());
        let scope = Scope::root(
            model.clone(),
            self.config.root_alias.clone(),
            self.config.shadowing,
        );
        scope.bind_locals([("$hook", hook.to_value())]);

        let root = self.compile_node(&name, element, &scope);
        self.apps.insert(
            Rc::clone(&name),
            App {
                name: Rc::clone(&name),
                root,
                element,
                model,
                scheduler,
            },
        );
        debug!(app = %name, templates = self.templates.len(), "app compiled");
        hook.trigger();
        Ok(hook)
    }

    pub fn app(&self, name: &str) -> Option<&App> {
        self.apps.get(name)
    }

    pub fn hook(&self, name: &str) -> Option<RenderHook> {
        self.apps.get(name).map(App::hook)
    }

    /// Latest pass number of an app (0 before its first render).
    pub fn pass(&self, name: &str) -> Option<u64> {
        self.apps.get(name).map(|a| a.scheduler.pass())
    }

    /// Request a debounced render. Returns the deadline, or `None` for an
    /// unknown app.
    pub fn schedule(&self, name: &str) -> Option<Instant> {
        self.apps.get(name).map(|a| a.scheduler.schedule())
    }

    // -- Rendering --------------------------------------------------------

    /// Run a render pass for `name` right away, consuming any pending
    /// deadline.
    pub fn render_now(&mut self, name: &str) -> Result<(), RenderError> {
        let app = self
            .apps
            .get(name)
            .ok_or_else(|| RenderError::UnknownApp(name.to_owned()))?;
        let root = app.root;
        let pass = app.scheduler.begin_pass();
        debug!(app = name, pass, "render pass");

        self.apply_node(root, &[])?;

        let node = self
            .templates
            .get(root)
            .map(|t| t.node)
            .ok_or(RenderError::StaleTemplate)?;
        if let Some(data) = self.document.get_mut(node) {
            data.set_attr("rendered", "true");
        }
        Ok(())
    }

    fn render_logged(&mut self, name: &str) -> Result<(), RenderError> {
        self.render_now(name).inspect_err(|err| {
            error!(app = name, error = %err, "render aborted");
        })
    }

    /// Render every app whose deadline is at or before `now`. Returns the
    /// number of passes run.
    pub fn run_pending(&mut self, now: Instant) -> Result<usize, RenderError> {
        let due = self
            .apps
            .iter()
            .filter(|(_, app)| app.scheduler.is_due(now))
            .map(|(name, _)| Rc::clone(name))
            .collect::<Vec<_>>();
        for name in &due {
            self.render_logged(name)?;
        }
        Ok(due.len())
    }

    /// Render every app with a pending deadline, ignoring the delay.
    pub fn flush(&mut self) -> Result<usize, RenderError> {
        let pending = self
            .apps
            .iter()
            .filter(|(_, app)| app.scheduler.is_pending())
            .map(|(name, _)| Rc::clone(name))
            .collect::<Vec<_>>();
        for name in &pending {
            self.render_logged(name)?;
        }
        Ok(pending.len())
    }

    /// The earliest pending deadline across all apps.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.apps
            .values()
            .filter_map(|app| app.scheduler.deadline())
            .min()
    }

    /// Sleep until each pending deadline and render, until nothing is pending.
    pub async fn settle(&mut self) -> Result<(), RenderError> {
        while let Some(deadline) = self.next_deadline() {
            tokio::time::sleep_until(deadline).await;
            self.run_pending(Instant::now())?;
        }
        Ok(())
    }

    // -- Events -----------------------------------------------------------

    /// Register a listener for `kind` events reaching `node`.
    pub fn on(
        &mut self,
        node: NodeId,
        kind: impl Into<String>,
        handler: impl Fn(&mut Engine, &mut Event) -> Result<(), RenderError> + 'static,
    ) {
        self.listeners.add(node, kind, Rc::new(handler));
    }

    /// Dispatch `event` at `node` and bubble it up to the root.
    ///
    /// Returns the event as the last listener left it.
    pub fn dispatch(&mut self, node: NodeId, mut event: Event) -> Result<Event, RenderError> {
        event.target = Some(node);
        for current in Listeners::bubble_path(&self.document, node) {
            event.current = Some(current);
            for handler in self.listeners.handlers_for(current, &event.kind) {
                handler(self, &mut event)?;
            }
            if event.is_propagation_stopped() {
                break;
            }
        }
        event.current = None;
        Ok(event)
    }

    /// Drain recorded lifecycle events.
    pub fn drain_lifecycle(&mut self) -> Vec<LifecycleEvent> {
        self.lifecycle.pending_events()
    }

    // -- Accessors --------------------------------------------------------

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    pub fn directives(&self) -> &DirectiveRegistry {
        &self.directives
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    pub fn components_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.components
    }

    pub fn node_state(&self, node: NodeId) -> Option<&NodeState> {
        self.node_state.get(node)
    }

    pub fn listener_count(&self, node: NodeId) -> usize {
        self.listeners.count(node)
    }

    // -- Crate internals --------------------------------------------------

    pub(crate) fn state_mut(&mut self, node: NodeId) -> Option<&mut NodeState> {
        self.node_state.entry(node).map(|e| e.or_default())
    }

    pub(crate) fn current_pass(&self, app: &str) -> u64 {
        self.apps.get(app).map_or(0, |a| a.scheduler.pass())
    }

    /// Set the app's delay for a render triggered by `event` on `node`.
    pub(crate) fn set_delay_for(&self, app: &str, node: NodeId, event: &str) {
        let delay = self
            .node_state
            .get(node)
            .and_then(|s| s.debounce.as_ref())
            .and_then(|d| d.get(event).copied())
            .unwrap_or(self.config.default_delay);
        if let Some(app) = self.apps.get(app) {
            app.scheduler.set_delay(delay);
        }
    }

    /// Drop per-node bookkeeping for nodes removed from the document.
    pub(crate) fn purge(&mut self, removed: &[NodeId]) {
        self.listeners.remove_nodes(removed);
        for &node in removed {
            self.node_state.remove(node);
        }
        self.lifecycle.forget(removed);
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
    use std::cell::RefCell;

    fn engine(markup: &str) -> Engine {
        Engine::from_markup(markup, AppConfig::default()).unwrap()
    }

    // ── AppConfig builder ────────────────────────────────────────────

    #[test]
    fn config_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.default_delay, Duration::ZERO);
        assert_eq!(config.root_alias, "app");
        assert_eq!(config.app_attribute, "x-app");
        assert_eq!(config.lifecycle_capacity, 256);
        assert!(config.is_skipped("SCRIPT"));
        assert!(!config.is_skipped("div"));
    }

    #[test]
    fn config_builder_chain() {
        let config = AppConfig::new()
            .with_default_delay(Duration::from_millis(5))
            .with_shadowing(ShadowPolicy::LocalAlwaysWins)
            .with_skip_tags(["template"])
            .with_root_alias("vm")
            .with_app_attribute("data-app");
        assert_eq!(config.default_delay, Duration::from_millis(5));
        assert_eq!(config.shadowing, ShadowPolicy::LocalAlwaysWins);
        assert_eq!(config.skip_tags, vec!["template".to_owned()]);
        assert_eq!(config.root_alias, "vm");
        assert_eq!(config.app_attribute, "data-app");
    }

    // ── Setup ────────────────────────────────────────────────────────

    #[test]
    fn setup_without_element_fails() {
        let mut engine = engine("<div></div>");
        let err = engine.setup("main", Value::object()).unwrap_err();
        assert_eq!(err, SetupError::NoAppElement("main".into()));
    }

    #[test]
    fn markup_errors_compare_through_setup_error() {
        let Err(err) = Engine::from_markup("<div><p></div>", AppConfig::default()) else {
            panic!("mismatched markup parsed");
        };
        assert!(matches!(
            err,
            SetupError::Markup(MarkupError::MismatchedClose { .. })
        ));
        assert_eq!(err.clone(), err);
    }

    #[test]
    fn setup_schedules_first_render() {
        let mut engine = engine(r#"<div x-app="main"><p>{{ app.title }}</p></div>"#);
        let hook = engine
            .setup("main", Value::from(json!({"title": "hi"})))
            .unwrap();
        assert_eq!(hook.app(), "main");
        assert!(engine.next_deadline().is_some());
        assert_eq!(engine.pass("main"), Some(0));

        assert_eq!(engine.flush().unwrap(), 1);
        assert_eq!(engine.pass("main"), Some(1));
        let element = engine.app("main").unwrap().element();
        assert_eq!(
            engine.document().to_markup(element),
            r#"<div x-app="main" rendered="true"><p>hi</p></div>"#
        );
        assert!(engine.next_deadline().is_none());
    }

    #[test]
    fn render_unknown_app() {
        let mut engine = engine("<div></div>");
        assert_eq!(
            engine.render_now("nope").unwrap_err(),
            RenderError::UnknownApp("nope".into())
        );
        assert!(engine.schedule("nope").is_none());
    }

    #[test]
    fn undrained_lifecycle_stays_bounded() {
        let config = AppConfig::default().with_lifecycle_capacity(8);
        let mut engine = Engine::from_markup(
            r#"<div x-app="main"><p :if="on">x</p><i :each="k in list">{{ k }}</i></div>"#,
            config,
        )
        .unwrap();
        let model = Value::from(json!({"on": true, "list": ["a"]}));
        engine.setup("main", model.clone()).unwrap();
        for round in 0..200 {
            model.set("on", Value::from(round % 2 == 0));
            model.set("list", Value::object_from([(format!("k{round}"), 1)]));
            engine.render_now("main").unwrap();
        }
        assert!(engine.lifecycle.has_pending());
        assert_eq!(engine.drain_lifecycle().len(), 8);
    }

    // ── Dispatch ─────────────────────────────────────────────────────

    #[test]
    fn dispatch_bubbles_until_stopped() {
        let mut engine = engine(r#"<div id="outer"><div id="mid"><b id="leaf"></b></div></div>"#);
        let outer = engine.document().query_by_id("outer").unwrap();
        let mid = engine.document().query_by_id("mid").unwrap();
        let leaf = engine.document().query_by_id("leaf").unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));

        for (node, label) in [(leaf, "leaf"), (mid, "mid"), (outer, "outer")] {
            let seen = Rc::clone(&seen);
            engine.on(node, "click", move |_, event| {
                seen.borrow_mut().push(label);
                if label == "mid" {
                    event.stop_propagation();
                }
                Ok(())
            });
        }

        let event = engine.dispatch(leaf, Event::new("click")).unwrap();
        assert_eq!(*seen.borrow(), vec!["leaf", "mid"]);
        assert_eq!(event.target, Some(leaf));
        assert!(event.is_propagation_stopped());
    }

    #[test]
    fn dispatch_ignores_other_kinds() {
        let mut engine = engine(r#"<b id="x"></b>"#);
        let x = engine.document().query_by_id("x").unwrap();
        let hits = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&hits);
        engine.on(x, "change", move |_, _| {
            *counter.borrow_mut() += 1;
            Ok(())
        });
        engine.dispatch(x, Event::new("click")).unwrap();
        assert_eq!(*hits.borrow(), 0);
        assert_eq!(engine.listener_count(x), 1);
    }

    // ── Scheduling ───────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn settle_waits_for_deadline() {
        let config = AppConfig::default().with_default_delay(Duration::from_millis(50));
        let mut engine =
            Engine::from_markup(r#"<div x-app="main">{{ n }}</div>"#, config).unwrap();
        engine.setup("main", Value::from(json!({"n": 1}))).unwrap();
        let start = Instant::now();

        assert_eq!(engine.run_pending(Instant::now()).unwrap(), 0);
        engine.settle().await.unwrap();
        assert_eq!(engine.pass("main"), Some(1));
        assert!(Instant::now() >= start + Duration::from_millis(50));
    }

    #[test]
    fn set_delay_prefers_node_debounce() {
        let mut engine = engine(r#"<div x-app="main"><input id="i"></div>"#);
        engine.setup("main", Value::object()).unwrap();
        let input = engine.document().query_by_id("i").unwrap();

        engine.set_delay_for("main", input, "input");
        let scheduler = engine.app("main").unwrap().scheduler().clone();
        assert_eq!(scheduler.delay(), Duration::ZERO);

        let mut map = IndexMap::new();
        map.insert("input".to_owned(), Duration::from_millis(300));
        engine.state_mut(input).unwrap().debounce = Some(map);
        engine.set_delay_for("main", input, "input");
        assert_eq!(scheduler.delay(), Duration::from_millis(300));
    }
}
