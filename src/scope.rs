//! Scope chain and locals resolution.
//!
//! A [`Scope`] exposes a model object under an alias, links to a parent scope
//! and carries local variables. Resolving a scope flattens it into a
//! [`LocalsTable`]: the locals, a live accessor for every property of the
//! bound object, and every alias up the chain.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::value::Value;

/// How a local variable competes with a same-named model property or alias.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShadowPolicy {
    /// A local shadows only while its current value is truthy. A falsy local
    /// is overwritten by the live property accessor.
    #[default]
    TruthyLocalWins,
    /// A declared local always shadows.
    LocalAlwaysWins,
}

impl ShadowPolicy {
    /// Whether an existing binding holding `existing` keeps its slot.
    fn keeps(self, existing: &Value) -> bool {
        match self {
            ShadowPolicy::TruthyLocalWins => existing.is_truthy(),
            ShadowPolicy::LocalAlwaysWins => true,
        }
    }
}

// ---------------------------------------------------------------------------
// LocalsTable
// ---------------------------------------------------------------------------

/// One name in a [`LocalsTable`].
#[derive(Debug, Clone)]
pub enum Binding {
    /// A plain value (locals and aliases).
    Value(Value),
    /// Reads and writes pass through to `owner[key]`.
    Live { owner: Value, key: String },
}

impl Binding {
    fn read(&self) -> Value {
        match self {
            Binding::Value(v) => v.clone(),
            Binding::Live { owner, key } => owner.get(key),
        }
    }
}

/// Flattened name table a compiled expression evaluates against.
#[derive(Default)]
pub struct LocalsTable {
    entries: RefCell<IndexMap<String, Binding>>,
}

impl LocalsTable {
    pub fn contains(&self, name: &str) -> bool {
        self.entries.borrow().contains_key(name)
    }

    /// Current value of `name`, reading live bindings through to the model.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.entries.borrow().get(name).map(Binding::read)
    }

    /// Write `name`. Live bindings write the model; anything else rebinds the
    /// table entry. Returns `false` when `name` is absent.
    pub fn set(&self, name: &str, value: Value) -> bool {
        let mut entries = self.entries.borrow_mut();
        match entries.get_mut(name) {
            Some(Binding::Live { owner, key }) => owner.set(key, value),
            Some(slot) => {
                *slot = Binding::Value(value);
                true
            }
            None => false,
        }
    }

    /// The object a live binding reads from (`this` for method calls).
    pub fn owner_of(&self, name: &str) -> Option<Value> {
        match self.entries.borrow().get(name) {
            Some(Binding::Live { owner, .. }) => Some(owner.clone()),
            _ => None,
        }
    }

    pub fn is_live(&self, name: &str) -> bool {
        self.owner_of(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl fmt::Debug for LocalsTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.borrow().iter()).finish()
    }
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// One link of the scope chain.
///
/// `object`, `alias` and `parent` are fixed at construction. The resolved
/// table is built lazily and then only merged into, never rebuilt.
pub struct Scope {
    object: Value,
    alias: String,
    parent: Option<Rc<Scope>>,
    locals: RefCell<IndexMap<String, Value>>,
    resolved: RefCell<Option<Rc<LocalsTable>>>,
    policy: ShadowPolicy,
}

impl Scope {
    /// A scope with no parent.
    pub fn root(object: Value, alias: impl Into<String>, policy: ShadowPolicy) -> Rc<Scope> {
        Rc::new(Scope {
            object,
            alias: alias.into(),
            parent: None,
            locals: RefCell::default(),
            resolved: RefCell::default(),
            policy,
        })
    }

    /// A nested scope binding `object` under `alias`. The current locals are
    /// copied down so loop variables stay visible.
    pub fn child(self: &Rc<Self>, object: Value, alias: impl Into<String>) -> Rc<Scope> {
        Rc::new(Scope {
            object,
            alias: alias.into(),
            parent: Some(Rc::clone(self)),
            locals: RefCell::new(self.locals.borrow().clone()),
            resolved: RefCell::default(),
            policy: self.policy,
        })
    }

    /// A new scope with the same object, alias and parent, and the current
    /// locals merged with `extra`.
    pub fn local_copy<K: Into<String>>(
        &self,
        extra: impl IntoIterator<Item = (K, Value)>,
    ) -> Rc<Scope> {
        let mut locals = self.locals.borrow().clone();
        locals.extend(extra.into_iter().map(|(k, v)| (k.into(), v)));
        Rc::new(Scope {
            object: self.object.clone(),
            alias: self.alias.clone(),
            parent: self.parent.clone(),
            locals: RefCell::new(locals),
            resolved: RefCell::default(),
            policy: self.policy,
        })
    }

    /// Declare names as `undefined` locals. Existing locals keep their value.
    pub fn declare<S: AsRef<str>>(&self, names: impl IntoIterator<Item = S>) {
        let mut locals = self.locals.borrow_mut();
        for name in names {
            let name = name.as_ref();
            if !locals.contains_key(name) {
                locals.insert(name.to_owned(), Value::Undefined);
            }
        }
    }

    /// Set locals, overwriting existing values.
    pub fn bind_locals<K: Into<String>>(&self, values: impl IntoIterator<Item = (K, Value)>) {
        self.locals
            .borrow_mut()
            .extend(values.into_iter().map(|(k, v)| (k.into(), v)));
    }

    pub fn object(&self) -> &Value {
        &self.object
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn parent(&self) -> Option<&Rc<Scope>> {
        self.parent.as_ref()
    }

    pub fn policy(&self) -> ShadowPolicy {
        self.policy
    }

    pub fn local(&self, name: &str) -> Option<Value> {
        self.locals.borrow().get(name).cloned()
    }

    /// Flatten this scope into a locals table.
    ///
    /// The first call builds the table and caches it. Later calls merge the
    /// current locals over the cached table, which is how names declared
    /// after the first resolution become visible.
    pub fn resolve_locals(&self) -> Rc<LocalsTable> {
        if let Some(table) = self.resolved.borrow().as_ref() {
            self.merge_locals(table);
            return Rc::clone(table);
        }
        let table = Rc::new(self.build_table());
        *self.resolved.borrow_mut() = Some(Rc::clone(&table));
        table
    }

    fn merge_locals(&self, table: &LocalsTable) {
        let mut entries = table.entries.borrow_mut();
        for (name, value) in self.locals.borrow().iter() {
            let keep_live = matches!(entries.get(name), Some(Binding::Live { .. }))
                && self.policy == ShadowPolicy::TruthyLocalWins
                && !value.is_truthy();
            if !keep_live {
                entries.insert(name.clone(), Binding::Value(value.clone()));
            }
        }
    }

    fn build_table(&self) -> LocalsTable {
        let mut entries = self
            .locals
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), Binding::Value(v.clone())))
            .collect::<IndexMap<_, _>>();

        for key in self.object.keys() {
            let shadowed = entries
                .get(&key)
                .is_some_and(|existing| self.policy.keeps(&existing.read()));
            if !shadowed {
                entries.insert(
                    key.clone(),
                    Binding::Live {
                        owner: self.object.clone(),
                        key,
                    },
                );
            }
        }

        let mut current = Some(self);
        while let Some(scope) = current {
            if !scope.alias.is_empty() {
                let shadowed = entries
                    .get(&scope.alias)
                    .is_some_and(|existing| self.policy.keeps(&existing.read()));
                if !shadowed {
                    entries.insert(scope.alias.clone(), Binding::Value(scope.object.clone()));
                }
            }
            current = scope.parent.as_deref();
        }

        LocalsTable {
            entries: RefCell::new(entries),
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("alias", &self.alias)
            .field("object", &self.object)
            .field("locals", &self.locals.borrow())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}
