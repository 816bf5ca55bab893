// Streaming SQL core for rillstream
// Scanner, parser, AST and the evaluation data model

pub mod ast;
pub mod error;
pub mod execution;
pub mod parser;

// Re-export main API
pub use ast::{Expr, SelectStatement, Statement};
pub use error::{SqlError, SqlResult};
pub use execution::{FieldValue, FunctionResolver, ValuerEval};
pub use parser::StreamingSqlParser;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
