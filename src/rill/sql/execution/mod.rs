//! Execution data model shared by every operator.
//!
//! Rows ([`Tuple`], [`JoinTuple`], [`GroupedTuples`]) and collections ([`WindowTuples`],
//! [`JoinTuples`], [`GroupedTuplesSet`]) expose one contract to filters, projections,
//! aggregates and sorts. Expressions are evaluated against them through a valuer chain.

pub mod collection;
pub mod expression;
pub mod functions;
pub mod row;
pub mod sorter;
pub mod types;

pub use collection::{Collection, GroupedTuplesSet, JoinTuples, WindowRange, WindowTuples};
pub use expression::{MultiValuer, Valuer, ValuerEval};
pub use functions::{FuncRuntime, FunctionResolver, FunctionValuer};
pub use row::{AffiliateRow, CollectionRow, GroupedTuples, JoinTuple, Row, Tuple, TupleRow};
pub use sorter::MultiSorter;
pub use types::{FieldValue, Message, Metadata};
