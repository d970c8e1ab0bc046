//! The variable store a template renders against.
//!
//! A [`Scope`] is a shared, mutable key/value store. Cloning it yields another
//! handle to the same store: nested renders triggered from inside a template
//! (through a drop) see, and write to, the same variables as the outer render.
//! Variables assigned at the top level of any render (`{% set %}`) are written
//! into the store as soon as the assignment runs, so a drop rendered later in
//! the same template sees them.
//!
//! Secrets read through the store stay masked for as long as the store lives,
//! including in values assigned from them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

use minijinja::value::{Enumerator, Object, ObjectRepr};
use minijinja::Value;
use serde::Serialize;

use super::drops::ContextDrop;
use super::redact::Redactor;
use crate::error::TemplateError;

/// Zero-argument value computed only when a template first references it.
pub type Deferred = Arc<dyn Fn() -> serde_json::Value + Send + Sync>;

/// Deferred provider of secret name → value pairs.
pub type SecretsProvider = Arc<dyn Fn() -> BTreeMap<String, String> + Send + Sync>;

const DEFERRED_PLACEHOLDER: &str = "<deferred>";

/// Root context member resolving to the store itself.
pub(crate) const SCOPE_HANDLE: &str = "__scope";

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

enum Slot {
    Value(Value),
    Deferred(Deferred),
    Secrets(Arc<SecretStore>),
    Drop(Arc<dyn ContextDrop>),
}

#[derive(Default)]
struct ScopeState {
    slots: BTreeMap<String, Slot>,
    /// Number of renders currently running against this store.
    depth: usize,
    /// First failure raised inside a drop during the current render.
    failure: Option<TemplateError>,
}

/// Shared variable store for template rendering.
#[derive(Clone, Default)]
pub struct Scope {
    state: Arc<Mutex<ScopeState>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ScopeState> {
        lock(&self.state)
    }

    fn set(&self, name: impl Into<String>, slot: Slot) {
        self.state().slots.insert(name.into(), slot);
    }

    /// Sets a plain variable.
    pub fn insert<T: Serialize>(&self, name: impl Into<String>, value: T) {
        self.set(name, Slot::Value(Value::from_serialize(value)));
    }

    /// Sets a variable whose value is computed on first reference. The
    /// computed value replaces the provider in the store.
    pub fn insert_deferred<F>(&self, name: impl Into<String>, provider: F)
    where
        F: Fn() -> serde_json::Value + Send + Sync + 'static,
    {
        self.set(name, Slot::Deferred(Arc::new(provider)));
    }

    /// Sets a map of secrets. The provider runs at most once, when a template
    /// first reads from the map. Entries read by any render against this
    /// store are masked in the logged output and errors of every later
    /// render against it.
    pub fn insert_secrets<F>(&self, name: impl Into<String>, provider: F)
    where
        F: Fn() -> BTreeMap<String, String> + Send + Sync + 'static,
    {
        let store = SecretStore::new(Arc::new(provider));
        self.set(name, Slot::Secrets(Arc::new(store)));
    }

    /// Exposes a drop under `name`.
    pub fn insert_drop(&self, name: impl Into<String>, drop: Arc<dyn ContextDrop>) {
        self.set(name, Slot::Drop(drop));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state().slots.contains_key(name)
    }

    /// Returns the materialized value of a plain variable. Deferred values
    /// that were never referenced, secrets and drops return `None`.
    pub fn get(&self, name: &str) -> Option<serde_json::Value> {
        match self.state().slots.get(name)? {
            Slot::Value(value) => serde_json::to_value(value).ok(),
            _ => None,
        }
    }

    pub(crate) fn assign(&self, name: &str, value: Value) {
        self.set(name, Slot::Value(value));
    }

    /// Resolves `name` for a running template, forcing deferred values.
    pub(crate) fn lookup(&self, name: &str) -> Option<Value> {
        let deferred = {
            let state = self.state();
            match state.slots.get(name)? {
                Slot::Value(value) => return Some(value.clone()),
                Slot::Secrets(store) => return Some(Value::from_object(SecretsObject(store.clone()))),
                Slot::Drop(drop) => {
                    return Some(Value::from_object(BoundDrop {
                        drop: drop.clone(),
                        scope: Arc::downgrade(&self.state),
                    }))
                }
                Slot::Deferred(provider) => provider.clone(),
            }
        };

        let value = Value::from_serialize(deferred());
        self.assign(name, value.clone());
        Some(value)
    }

    fn names(&self) -> Vec<String> {
        self.state().slots.keys().cloned().collect()
    }

    /// Root context handed to the template engine.
    pub(crate) fn as_context(&self) -> Value {
        Value::from_object(ScopeObject(self.clone()))
    }

    /// The store behind a [`SCOPE_HANDLE`] lookup.
    pub(crate) fn from_handle(handle: &Value) -> Option<Scope> {
        handle
            .downcast_object_ref::<ScopeObject>()
            .map(|root| root.0.clone())
    }

    /// Marks the start of a render. The outermost render clears leftover
    /// failures.
    pub(crate) fn enter(&self) -> RenderGuard {
        let mut state = self.state();
        if state.depth == 0 {
            state.failure = None;
        }
        state.depth += 1;
        RenderGuard {
            scope: self.clone(),
        }
    }

    pub(crate) fn record_failure(&self, error: TemplateError) {
        let mut state = self.state();
        if state.failure.is_none() {
            state.failure = Some(error);
        }
    }

    pub(crate) fn take_failure(&self) -> Option<TemplateError> {
        self.state().failure.take()
    }

    /// Masks every secret read through this store so far.
    pub(crate) fn redactor(&self) -> Redactor {
        let mut redactor = Redactor::new();
        for slot in self.state().slots.values() {
            if let Slot::Secrets(store) = slot {
                store.register(&mut redactor);
            }
        }
        redactor
    }

    /// Diagnostic snapshot of the store. Unreferenced deferred values and
    /// unread secrets are not materialized.
    pub(crate) fn describe(&self) -> serde_json::Value {
        let state = self.state();
        let described = state
            .slots
            .iter()
            .map(|(name, slot)| {
                let value = match slot {
                    Slot::Value(value) => {
                        serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
                    }
                    Slot::Deferred(_) => serde_json::Value::from(DEFERRED_PLACEHOLDER),
                    Slot::Secrets(store) => store.describe(),
                    Slot::Drop(drop) => drop.describe(),
                };
                (name.clone(), value)
            })
            .collect();
        serde_json::Value::Object(described)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope").field("names", &self.names()).finish()
    }
}

pub(crate) struct RenderGuard {
    scope: Scope,
}

impl Drop for RenderGuard {
    fn drop(&mut self) {
        let mut state = self.scope.state();
        state.depth = state.depth.saturating_sub(1);
    }
}

struct SecretStore {
    provider: SecretsProvider,
    values: OnceLock<BTreeMap<String, String>>,
    accessed: Mutex<BTreeSet<String>>,
}

impl SecretStore {
    fn new(provider: SecretsProvider) -> Self {
        Self {
            provider,
            values: OnceLock::new(),
            accessed: Mutex::new(BTreeSet::new()),
        }
    }

    fn values(&self) -> &BTreeMap<String, String> {
        self.values.get_or_init(|| (self.provider)())
    }

    fn read(&self, key: &str) -> Option<String> {
        let value = self.values().get(key)?.clone();
        lock(&self.accessed).insert(key.to_string());
        Some(value)
    }

    fn register(&self, redactor: &mut Redactor) {
        let Some(values) = self.values.get() else {
            return;
        };
        for key in lock(&self.accessed).iter() {
            if let Some(value) = values.get(key) {
                redactor.add_secret(key, value);
            }
        }
    }

    fn describe(&self) -> serde_json::Value {
        let Some(values) = self.values.get() else {
            return serde_json::Value::from(DEFERRED_PLACEHOLDER);
        };
        let accessed = lock(&self.accessed);
        serde_json::Value::Object(
            values
                .iter()
                .filter(|(key, _)| accessed.contains(*key))
                .map(|(key, value)| (key.clone(), serde_json::Value::from(value.as_str())))
                .collect(),
        )
    }
}

impl fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretStore")
            .field("fetched", &self.values.get().is_some())
            .finish()
    }
}

/// Root template context backed by a [`Scope`].
#[derive(Debug)]
struct ScopeObject(Scope);

impl Object for ScopeObject {
    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        match key.as_str()? {
            SCOPE_HANDLE => Some(Value::from_dyn_object(self.clone())),
            name => self.0.lookup(name),
        }
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Values(self.0.names().into_iter().map(Value::from).collect())
    }
}

/// Secrets map as seen by templates; records each key read.
#[derive(Debug)]
struct SecretsObject(Arc<SecretStore>);

impl Object for SecretsObject {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Map
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        self.0.read(key.as_str()?).map(Value::from)
    }

    fn enumerate(self: &Arc<Self>) -> Enumerator {
        Enumerator::Values(self.0.values().keys().map(|k| Value::from(k.as_str())).collect())
    }
}

/// A drop paired with the store its nested renders run against.
struct BoundDrop {
    drop: Arc<dyn ContextDrop>,
    scope: Weak<Mutex<ScopeState>>,
}

impl fmt::Debug for BoundDrop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.drop.describe())
    }
}

impl Object for BoundDrop {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let key = key.as_str()?;
        let scope = Scope {
            state: self.scope.upgrade()?,
        };
        match self.drop.fetch(key, &scope) {
            Ok(value) => value.map(Value::from_serialize),
            Err(error) => {
                scope.record_failure(error);
                None
            }
        }
    }

    fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.drop.describe())
    }
}
