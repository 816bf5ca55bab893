//! # rillstream
//!
//! An embeddable streaming SQL core: the scanner and parser that turn SQL text into a
//! typed AST, the expression evaluator that walks the AST against live rows, and the
//! windowed row/collection model shared by filter, projection, aggregation and sort
//! operators.

// Allow certain clippy warnings for development
#![allow(clippy::collapsible_if)]
#![allow(clippy::large_enum_variant)]
#![allow(clippy::bool_assert_comparison)]
//!
//! ## Features
//!
//! - **Streaming SQL dialect**: SELECT with joins, GROUP BY windows
//!   (`TUMBLINGWINDOW`, `HOPPINGWINDOW`, `SESSIONWINDOW`, `SLIDINGWINDOW`, `COUNTWINDOW`),
//!   analytic `OVER (PARTITION BY ... WHEN ...)` clauses and stream DDL
//! - **Dynamic values**: one [`FieldValue`](rill::sql::FieldValue) union with a single
//!   coercion table for every operator
//! - **Valuer chains**: the same evaluator serves plain rows, joined rows, grouped rows
//!   and whole windows
//! - **Pluggable functions**: built-ins plus any number of extension registers
//!
//! ## Quick Start
//!
//! ```rust
//! use rillstream::rill::sql::execution::{
//!     FieldValue, FunctionValuer, Message, MultiValuer, Tuple, ValuerEval,
//! };
//! use rillstream::rill::sql::StreamingSqlParser;
//! use std::sync::Arc;
//!
//! let parser = StreamingSqlParser::new();
//! let stmt = parser
//!     .parse("SELECT temperature * 2 AS doubled FROM demo WHERE temperature > 20")
//!     .unwrap();
//!
//! let mut message = Message::new();
//! message.insert("temperature".to_string(), FieldValue::Integer(25));
//! let tuple = Tuple::new("demo", message, 0);
//! let functions = FunctionValuer::with_resolver(Arc::clone(parser.resolver()));
//! let chain = MultiValuer::new(vec![&tuple, &functions]);
//! let ev = ValuerEval::new(&chain);
//!
//! assert_eq!(ev.eval(stmt.condition.as_ref().unwrap()), FieldValue::Boolean(true));
//! assert_eq!(ev.eval(&stmt.fields[0].expr), FieldValue::Integer(50));
//! ```

pub mod rill;

// Re-export main API at crate root for easy access
pub use rill::config::{ConfigError, EngineConfig};
pub use rill::sql::{FieldValue, SqlError, SqlResult, StreamingSqlParser};
