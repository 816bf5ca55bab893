//! Lookup providers consulted by the evaluator.
//!
//! A [`Valuer`] resolves names, metadata keys and alias slots. Optional capabilities
//! (function calls, implicit window values, wildcard expansion, aggregate context) are
//! discovered through the `as_*` accessors, so a chain of providers can be composed
//! with [`MultiValuer`] without the evaluator knowing what each link is.

use crate::rill::sql::ast::Expr;
use crate::rill::sql::execution::expression::evaluator::ValuerEval;
use crate::rill::sql::execution::row::Row;
use crate::rill::sql::execution::types::{FieldValue, Message};

pub trait Valuer {
    /// Value of column `key`. `table` is empty for unqualified references.
    fn value(&self, key: &str, table: &str) -> Option<FieldValue>;

    fn meta(&self, _key: &str, _table: &str) -> Option<FieldValue> {
        None
    }

    /// Store a computed alias. Returns false when this valuer has no alias storage.
    fn append_alias(&self, _key: &str, _value: FieldValue) -> bool {
        false
    }

    fn alias_value(&self, _key: &str) -> Option<FieldValue> {
        None
    }

    fn as_func_valuer(&self) -> Option<&dyn FuncValuer> {
        None
    }

    fn as_wildcarder(&self) -> Option<&dyn Wildcarder> {
        None
    }

    fn as_call_valuer(&self) -> Option<&dyn CallValuer> {
        None
    }

    fn as_aggregate_call_valuer(&self) -> Option<&dyn AggregateCallValuer> {
        None
    }
}

/// Implicit values such as `window_start` that bypass function dispatch.
pub trait FuncValuer {
    fn func_value(&self, key: &str) -> Option<FieldValue>;
}

/// Whole-row access for `*`, optionally restricted to one stream.
pub trait Wildcarder {
    fn all(&self, stream: &str) -> Option<Message>;
}

/// Function invocation.
pub trait CallValuer {
    /// Invoke `name` with evaluated arguments. Failures come back as error values.
    fn call(&self, name: &str, func_id: usize, args: &[FieldValue]) -> FieldValue;
}

/// Context in which aggregate arguments are evaluated once per member row.
pub trait AggregateCallValuer {
    fn all_tuples(&self) -> &dyn AggregateData;
    /// The valuer used for per-row argument evaluation, usually the function valuer.
    fn single_call_valuer(&self) -> &dyn Valuer;
}

/// Data that can evaluate an expression against each of its member rows.
pub trait AggregateData {
    fn aggregate_eval(&self, expr: &Expr, v: &dyn Valuer, parent: &ValuerEval<'_>) -> Vec<FieldValue>;
}

/// Ordered chain of valuers. The first one answering a lookup wins.
#[derive(Default)]
pub struct MultiValuer<'a> {
    valuers: Vec<&'a dyn Valuer>,
}

impl<'a> MultiValuer<'a> {
    pub fn new(valuers: Vec<&'a dyn Valuer>) -> Self {
        Self { valuers }
    }

    pub fn push(&mut self, valuer: &'a dyn Valuer) {
        self.valuers.push(valuer);
    }
}

impl<'a> Valuer for MultiValuer<'a> {
    fn value(&self, key: &str, table: &str) -> Option<FieldValue> {
        self.valuers.iter().find_map(|v| v.value(key, table))
    }

    fn meta(&self, key: &str, table: &str) -> Option<FieldValue> {
        self.valuers.iter().find_map(|v| v.meta(key, table))
    }

    fn append_alias(&self, key: &str, value: FieldValue) -> bool {
        self.valuers
            .iter()
            .any(|v| v.append_alias(key, value.clone()))
    }

    fn alias_value(&self, key: &str) -> Option<FieldValue> {
        self.valuers.iter().find_map(|v| v.alias_value(key))
    }

    fn as_func_valuer(&self) -> Option<&dyn FuncValuer> {
        Some(self)
    }

    fn as_wildcarder(&self) -> Option<&dyn Wildcarder> {
        Some(self)
    }

    fn as_call_valuer(&self) -> Option<&dyn CallValuer> {
        Some(self)
    }
}

impl<'a> FuncValuer for MultiValuer<'a> {
    fn func_value(&self, key: &str) -> Option<FieldValue> {
        self.valuers
            .iter()
            .filter_map(|v| v.as_func_valuer())
            .find_map(|f| f.func_value(key))
    }
}

impl<'a> Wildcarder for MultiValuer<'a> {
    fn all(&self, stream: &str) -> Option<Message> {
        self.valuers
            .iter()
            .filter_map(|v| v.as_wildcarder())
            .find_map(|w| w.all(stream))
    }
}

impl<'a> CallValuer for MultiValuer<'a> {
    fn call(&self, name: &str, func_id: usize, args: &[FieldValue]) -> FieldValue {
        match self.valuers.iter().find_map(|v| v.as_call_valuer()) {
            Some(c) => c.call(name, func_id, args),
            None => FieldValue::Error(format!("call func {} error: no function valuer", name)),
        }
    }
}

/// A chain evaluated in aggregate context: aggregate arguments are evaluated against
/// every member of `data` through `single`.
pub struct MultiAggregateValuer<'a> {
    data: &'a dyn AggregateData,
    single: &'a dyn Valuer,
    chain: MultiValuer<'a>,
}

impl<'a> MultiAggregateValuer<'a> {
    pub fn new(data: &'a dyn AggregateData, single: &'a dyn Valuer, valuers: Vec<&'a dyn Valuer>) -> Self {
        Self {
            data,
            single,
            chain: MultiValuer::new(valuers),
        }
    }
}

impl<'a> Valuer for MultiAggregateValuer<'a> {
    fn value(&self, key: &str, table: &str) -> Option<FieldValue> {
        self.chain.value(key, table)
    }

    fn meta(&self, key: &str, table: &str) -> Option<FieldValue> {
        self.chain.meta(key, table)
    }

    fn append_alias(&self, key: &str, value: FieldValue) -> bool {
        self.chain.append_alias(key, value)
    }

    fn alias_value(&self, key: &str) -> Option<FieldValue> {
        self.chain.alias_value(key)
    }

    fn as_func_valuer(&self) -> Option<&dyn FuncValuer> {
        Some(&self.chain)
    }

    fn as_wildcarder(&self) -> Option<&dyn Wildcarder> {
        Some(&self.chain)
    }

    fn as_call_valuer(&self) -> Option<&dyn CallValuer> {
        Some(&self.chain)
    }

    fn as_aggregate_call_valuer(&self) -> Option<&dyn AggregateCallValuer> {
        Some(self)
    }
}

impl<'a> AggregateCallValuer for MultiAggregateValuer<'a> {
    fn all_tuples(&self) -> &dyn AggregateData {
        self.data
    }

    fn single_call_valuer(&self) -> &dyn Valuer {
        self.single
    }
}

/// Exposes a row's whole content for `*` at the end of a chain.
pub struct WildcardValuer<'a> {
    data: &'a dyn Row,
}

impl<'a> WildcardValuer<'a> {
    pub fn new(data: &'a dyn Row) -> Self {
        Self { data }
    }
}

impl<'a> Valuer for WildcardValuer<'a> {
    fn value(&self, _key: &str, _table: &str) -> Option<FieldValue> {
        None
    }

    fn as_wildcarder(&self) -> Option<&dyn Wildcarder> {
        Some(self)
    }
}

impl<'a> Wildcarder for WildcardValuer<'a> {
    fn all(&self, stream: &str) -> Option<Message> {
        self.data.all(stream)
    }
}

/// Read-only view over a plain message, used for `->` navigation into nested maps.
pub struct MessageValuer<'a> {
    message: &'a Message,
    ignore_case: bool,
}

impl<'a> MessageValuer<'a> {
    pub fn new(message: &'a Message, ignore_case: bool) -> Self {
        Self {
            message,
            ignore_case,
        }
    }
}

impl<'a> Valuer for MessageValuer<'a> {
    fn value(&self, key: &str, _table: &str) -> Option<FieldValue> {
        crate::rill::sql::execution::row::message_value(self.message, key, self.ignore_case)
    }

    fn meta(&self, key: &str, table: &str) -> Option<FieldValue> {
        if key == "*" {
            return Some(FieldValue::Map(self.message.clone()));
        }
        self.value(key, table)
    }
}
