//! Function registration and lookup.
//!
//! Built-in functions are plain definitions collected from the per-category tables into
//! one lookup map on first use. Extension sets implement [`FunctionRegister`] and are
//! consulted after the built-ins, in registration order.

use super::runtime::FuncCallContext;
use super::validation::ValidateFn;
use super::{aggregate, analytic, scalar};
use crate::rill::sql::ast::{Expr, FuncType};
use crate::rill::sql::error::{SqlError, SqlResult};
use crate::rill::sql::execution::types::FieldValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Function handler signature
pub type FunctionHandler = fn(&FuncCallContext<'_>, &[FieldValue]) -> FieldValue;

/// A callable SQL function.
pub trait Function: Send + Sync {
    fn func_type(&self) -> FuncType;

    /// Check the parsed argument expressions. Runs once per call site at parse time.
    fn validate(&self, args: &[Expr]) -> SqlResult<()>;

    /// Run the function. Failures are returned as [`FieldValue::Error`].
    fn exec(&self, ctx: &FuncCallContext<'_>, args: &[FieldValue]) -> FieldValue;

    fn is_aggregate(&self) -> bool {
        self.func_type() == FuncType::Aggregate
    }
}

/// A set of functions that can be plugged into a [`FunctionResolver`].
pub trait FunctionRegister: Send + Sync {
    fn has_function(&self, name: &str) -> bool;

    fn function(&self, name: &str) -> Option<Arc<dyn Function>>;

    /// Canonical name for `name` as written in the query, if this set knows it.
    fn conv_name(&self, name: &str) -> Option<String>;
}

/// Categories of built-in functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCategory {
    Math,
    String,
    /// cast, coalesce, meta access and clocks
    Other,
    /// Window bounds and event time of the current evaluation scope
    Window,
    Aggregate,
    Analytic,
    /// Functions producing several columns at once
    Cols,
    SetReturning,
}

/// Static definition of a built-in function
pub struct BuiltinFunctionDef {
    /// Lower-case name
    pub name: &'static str,
    pub category: FunctionCategory,
    pub func_type: FuncType,
    pub handler: FunctionHandler,
    pub validator: ValidateFn,
}

impl BuiltinFunctionDef {
    pub const fn new(
        name: &'static str,
        category: FunctionCategory,
        func_type: FuncType,
        handler: FunctionHandler,
        validator: ValidateFn,
    ) -> Self {
        Self {
            name,
            category,
            func_type,
            handler,
            validator,
        }
    }
}

impl fmt::Debug for BuiltinFunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinFunctionDef")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("func_type", &self.func_type)
            .finish()
    }
}

/// Lookup table over every built-in definition, keyed by lower-case name.
static BUILTIN_LOOKUP: LazyLock<HashMap<&'static str, &'static BuiltinFunctionDef>> =
    LazyLock::new(|| {
        let mut map = HashMap::new();
        for def in scalar::FUNCTIONS
            .iter()
            .chain(aggregate::FUNCTIONS)
            .chain(analytic::FUNCTIONS)
        {
            map.insert(def.name, def);
        }
        map
    });

/// Every built-in definition
pub fn all_builtin_functions() -> impl Iterator<Item = &'static BuiltinFunctionDef> {
    BUILTIN_LOOKUP.values().copied()
}

/// Look up a built-in by its case-insensitive name.
pub fn builtin_function(name: &str) -> Option<&'static BuiltinFunctionDef> {
    BUILTIN_LOOKUP.get(name.to_lowercase().as_str()).copied()
}

/// [`Function`] backed by a static built-in definition
#[derive(Debug, Clone, Copy)]
pub struct BuiltinFunction {
    def: &'static BuiltinFunctionDef,
}

impl BuiltinFunction {
    pub fn new(def: &'static BuiltinFunctionDef) -> Self {
        Self { def }
    }

    pub fn name(&self) -> &'static str {
        self.def.name
    }

    pub fn category(&self) -> FunctionCategory {
        self.def.category
    }
}

impl Function for BuiltinFunction {
    fn func_type(&self) -> FuncType {
        self.def.func_type
    }

    fn validate(&self, args: &[Expr]) -> SqlResult<()> {
        // cols functions see their arguments wrapped with the column name
        let unwrapped: Vec<Expr> = args
            .iter()
            .map(|a| match a {
                Expr::ColFuncField(c) => (*c.expr).clone(),
                other => other.clone(),
            })
            .collect();
        (self.def.validator)(self.def.name, &unwrapped)
    }

    fn exec(&self, ctx: &FuncCallContext<'_>, args: &[FieldValue]) -> FieldValue {
        (self.def.handler)(ctx, args)
    }
}

/// The built-in function set as a [`FunctionRegister`]
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinRegister;

impl FunctionRegister for BuiltinRegister {
    fn has_function(&self, name: &str) -> bool {
        builtin_function(name).is_some()
    }

    fn function(&self, name: &str) -> Option<Arc<dyn Function>> {
        builtin_function(name).map(|def| Arc::new(BuiltinFunction::new(def)) as Arc<dyn Function>)
    }

    fn conv_name(&self, name: &str) -> Option<String> {
        builtin_function(name).map(|def| def.name.to_string())
    }
}

/// Ordered chain of function sets. Built-ins always come first.
#[derive(Clone)]
pub struct FunctionResolver {
    registers: Vec<Arc<dyn FunctionRegister>>,
}

impl FunctionResolver {
    pub fn new() -> Self {
        Self {
            registers: vec![Arc::new(BuiltinRegister)],
        }
    }

    /// Resolver with the built-ins followed by `register`.
    pub fn with_register(register: Arc<dyn FunctionRegister>) -> Self {
        let mut resolver = Self::new();
        resolver.register(register);
        resolver
    }

    pub fn register(&mut self, register: Arc<dyn FunctionRegister>) {
        self.registers.push(register);
    }

    pub fn conv_name(&self, name: &str) -> Option<String> {
        self.registers.iter().find_map(|r| r.conv_name(name))
    }

    pub fn function(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.registers.iter().find_map(|r| r.function(name))
    }

    pub fn func_type(&self, name: &str) -> Option<FuncType> {
        self.function(name).map(|f| f.func_type())
    }

    pub fn validate(&self, name: &str, args: &[Expr]) -> SqlResult<()> {
        match self.function(name) {
            Some(f) => f.validate(args),
            None => Err(SqlError::not_found("function", name)),
        }
    }
}

impl Default for FunctionResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FunctionResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionResolver")
            .field("registers", &self.registers.len())
            .finish()
    }
}
