//! Function registry and runtime.
//!
//! [`FunctionResolver`] answers the parser's questions (canonical name, function kind,
//! argument validation). [`FuncRuntime`] and [`FunctionValuer`] dispatch calls during
//! evaluation and hold per-operator function state.

pub mod aggregate;
pub mod analytic;
pub mod registry;
pub mod runtime;
pub mod scalar;
pub mod validation;

pub use registry::{
    all_builtin_functions, builtin_function, BuiltinFunction, BuiltinFunctionDef, BuiltinRegister,
    Function, FunctionCategory, FunctionHandler, FunctionRegister, FunctionResolver,
};
pub use runtime::{FuncCallContext, FuncRuntime, FunctionContext, FunctionValuer};
