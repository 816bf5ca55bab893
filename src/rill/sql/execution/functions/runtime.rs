//! Function dispatch during evaluation.
//!
//! A [`FuncRuntime`] belongs to one operator instance. It resolves each function name
//! once and keeps a [`FunctionContext`] per function for the lifetime of the operator,
//! which is where analytic functions keep their history.

use super::registry::{Function, FunctionResolver};
use crate::rill::sql::execution::expression::valuer::{CallValuer, Valuer};
use crate::rill::sql::execution::types::FieldValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keyed state owned by one function within one operator.
#[derive(Debug, Default)]
pub struct FunctionContext {
    state: Mutex<HashMap<String, FieldValue>>,
}

impl FunctionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_state(&self, key: &str) -> Option<FieldValue> {
        lock(&self.state).get(key).cloned()
    }

    pub fn put_state(&self, key: impl Into<String>, value: FieldValue) {
        lock(&self.state).insert(key.into(), value);
    }

    pub fn delete_state(&self, key: &str) {
        lock(&self.state).remove(key);
    }

    pub fn state_len(&self) -> usize {
        lock(&self.state).len()
    }
}

/// View of a [`FunctionContext`] for one call site. Keys are prefixed with the call's
/// id so two uses of the same function in a statement never share history.
#[derive(Debug, Clone, Copy)]
pub struct FuncCallContext<'a> {
    ctx: &'a FunctionContext,
    func_id: usize,
}

impl<'a> FuncCallContext<'a> {
    pub fn new(ctx: &'a FunctionContext, func_id: usize) -> Self {
        Self { ctx, func_id }
    }

    pub fn func_id(&self) -> usize {
        self.func_id
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}_{}", self.func_id, key)
    }

    pub fn get_state(&self, key: &str) -> Option<FieldValue> {
        self.ctx.get_state(&self.scoped(key))
    }

    pub fn put_state(&self, key: &str, value: FieldValue) {
        self.ctx.put_state(self.scoped(key), value);
    }

    pub fn delete_state(&self, key: &str) {
        self.ctx.delete_state(&self.scoped(key));
    }
}

type Resolved = (Arc<dyn Function>, Arc<FunctionContext>);

/// Per-operator function table
pub struct FuncRuntime {
    resolver: Arc<FunctionResolver>,
    cache: Mutex<HashMap<String, Resolved>>,
}

impl FuncRuntime {
    pub fn new(resolver: Arc<FunctionResolver>) -> Self {
        Self {
            resolver,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve `name`, creating its context on first use.
    pub fn get(&self, name: &str) -> Option<Resolved> {
        let mut cache = lock(&self.cache);
        if let Some((f, ctx)) = cache.get(name) {
            return Some((Arc::clone(f), Arc::clone(ctx)));
        }
        let f = self.resolver.function(name)?;
        log::debug!("Resolved function {} ({:?})", name, f.func_type());
        let ctx = Arc::new(FunctionContext::new());
        cache.insert(name.to_string(), (Arc::clone(&f), Arc::clone(&ctx)));
        Some((f, ctx))
    }

    /// Resolve and run `name`.
    pub fn call(&self, name: &str, func_id: usize, args: &[FieldValue]) -> FieldValue {
        match self.get(name) {
            Some((f, ctx)) => f.exec(&FuncCallContext::new(&ctx, func_id), args),
            None => FieldValue::error(format!(
                "call func {} error: function {} not found",
                name, name
            )),
        }
    }
}

impl fmt::Debug for FuncRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuncRuntime")
            .field("resolved", &lock(&self.cache).len())
            .finish()
    }
}

/// Valuer link that answers function calls
#[derive(Debug, Clone)]
pub struct FunctionValuer {
    runtime: Arc<FuncRuntime>,
}

impl FunctionValuer {
    pub fn new(runtime: Arc<FuncRuntime>) -> Self {
        Self { runtime }
    }

    /// Valuer with a fresh runtime over `resolver`.
    pub fn with_resolver(resolver: Arc<FunctionResolver>) -> Self {
        Self::new(Arc::new(FuncRuntime::new(resolver)))
    }

    pub fn runtime(&self) -> &Arc<FuncRuntime> {
        &self.runtime
    }
}

impl Valuer for FunctionValuer {
    fn value(&self, _key: &str, _table: &str) -> Option<FieldValue> {
        None
    }

    fn as_call_valuer(&self) -> Option<&dyn CallValuer> {
        Some(self)
    }
}

impl CallValuer for FunctionValuer {
    fn call(&self, name: &str, func_id: usize, args: &[FieldValue]) -> FieldValue {
        self.runtime.call(name, func_id, args)
    }
}
