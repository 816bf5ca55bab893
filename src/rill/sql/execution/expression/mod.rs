//! Expression evaluation for streaming SQL.
//!
//! - [`valuer`]: lookup providers and their composition into a chain
//! - [`evaluator`]: the tree walk over [`Expr`](crate::rill::sql::ast::Expr)
//! - [`operators`]: binary operator semantics and type coercion

pub mod evaluator;
pub mod operators;
pub mod valuer;

// Re-export the main API
pub use evaluator::{eval, is_implicit_value_func, ValuerEval, DEFAULT_PARTITION_KEY};
pub use operators::{simple_data_eval, values_equal};
pub use valuer::{
    AggregateCallValuer, AggregateData, CallValuer, FuncValuer, MessageValuer, MultiAggregateValuer,
    MultiValuer, Valuer, Wildcarder, WildcardValuer,
};
