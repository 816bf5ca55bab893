/*!
# Rows

Runtime representation of a single event ([`Tuple`]), a joined event ([`JoinTuple`]) and a
group-by bucket ([`GroupedTuples`]).

## Immutability

The source message and metadata of a tuple are shared behind an `Arc` and never modified in
place. Computed columns and memoised alias values live in the row's [`AffiliateRow`], a
lock-protected side table. [`TupleRow::clone_tuple`] copies the side table and shares the
message, so a clone is the hand-off unit between concurrent branches.

## Lookup order

Affiliate computed columns, then affiliate aliases, then the underlying message.
*/

use crate::rill::sql::ast::{Expr, DEFAULT_STREAM, JOIN_EMITTER};
use crate::rill::sql::execution::collection::WindowRange;
use crate::rill::sql::execution::expression::evaluator::ValuerEval;
use crate::rill::sql::execution::expression::valuer::{
    AggregateData, FuncValuer, MultiValuer, Valuer, WildcardValuer, Wildcarder,
};
use crate::rill::sql::execution::types::{FieldValue, Message, Metadata};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Exact lookup first, then a case-insensitive scan when `ignore_case` is set.
pub fn message_value(message: &Message, key: &str, ignore_case: bool) -> Option<FieldValue> {
    if let Some(v) = message.get(key) {
        return Some(v.clone());
    }
    if ignore_case {
        return message
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.clone());
    }
    None
}

/// A column requested by a projection: name plus the stream it comes from
/// (empty for unqualified columns).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    pub name: String,
    pub stream: String,
}

impl Column {
    pub fn new(name: impl Into<String>, stream: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stream: stream.into(),
        }
    }

    fn is_unqualified(&self) -> bool {
        self.stream.is_empty() || self.stream == DEFAULT_STREAM
    }
}

/// Projection request passed to [`Row::pick`].
#[derive(Debug, Clone, Default)]
pub struct PickSpec {
    /// `SELECT *` without stream qualifier
    pub all_wildcard: bool,
    pub cols: Vec<Column>,
    /// Emitters selected with `t.*`
    pub wildcard_emitters: HashSet<String>,
    /// Names removed by `* EXCEPT(...)`
    pub except: Vec<String>,
}

/// Read and mutate contract shared by every row variant.
pub trait Row: Valuer + Wildcarder + Send + Sync + fmt::Debug {
    /// Add or overwrite a computed column.
    fn set(&self, col: &str, value: FieldValue);

    fn del(&mut self, col: &str);

    /// Export the row as a plain map, computed columns included.
    fn to_map(&self) -> Message;

    /// Keep only the requested columns.
    fn pick(&mut self, spec: &PickSpec);

    fn as_valuer(&self) -> &dyn Valuer;
}

/// A row flowing through the operator pipeline.
pub trait TupleRow: Row {
    fn emitter(&self) -> &str;

    /// Event time in epoch milliseconds.
    fn timestamp(&self) -> i64;

    fn clone_tuple(&self) -> Box<dyn TupleRow>;

    fn as_row(&self) -> &dyn Row;
    fn as_row_mut(&mut self) -> &mut dyn Row;
}

/// Aggregation row of a group or of a whole non-grouped collection.
pub trait CollectionRow: Row + AggregateData {
    fn as_row(&self) -> &dyn Row;
    fn as_aggregate_data(&self) -> &dyn AggregateData;
    fn window_range(&self) -> Option<&WindowRange>;
}

#[derive(Debug, Default, Clone)]
struct AffiliateState {
    cal_cols: HashMap<String, FieldValue>,
    alias_map: HashMap<String, FieldValue>,
}

/// Mutable side table of computed columns and memoised aliases.
#[derive(Debug, Default)]
pub struct AffiliateRow {
    state: RwLock<AffiliateState>,
}

impl Clone for AffiliateRow {
    fn clone(&self) -> Self {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Self {
            state: RwLock::new(state.clone()),
        }
    }
}

impl AffiliateRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_alias(&self, key: &str, value: FieldValue) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.alias_map.insert(key.to_string(), value);
        true
    }

    pub fn alias_value(&self, key: &str) -> Option<FieldValue> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.alias_map.get(key).cloned()
    }

    /// Only unqualified keys are answered from the side table.
    pub fn value(&self, key: &str, table: &str) -> Option<FieldValue> {
        if !table.is_empty() {
            return None;
        }
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .cal_cols
            .get(key)
            .or_else(|| state.alias_map.get(key))
            .cloned()
    }

    pub fn set(&self, col: &str, value: FieldValue) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.cal_cols.insert(col.to_string(), value);
    }

    pub fn del(&self, col: &str) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.cal_cols.remove(col);
        state.alias_map.remove(col);
    }

    pub fn is_empty(&self) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.cal_cols.is_empty() && state.alias_map.is_empty()
    }

    /// Overlay computed columns and aliases on `target`.
    pub fn merge_map(&self, target: &mut Message) {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        for (k, v) in &state.cal_cols {
            target.insert(k.clone(), v.clone());
        }
        for (k, v) in &state.alias_map {
            target.insert(k.clone(), v.clone());
        }
    }

    /// Keep the side-table entries the projection asks for and return the columns that
    /// still have to be picked from the underlying content.
    pub fn pick(&self, cols: &[Column]) -> Vec<Column> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if cols.is_empty() {
            state.cal_cols.clear();
            state.alias_map.clear();
            return Vec::new();
        }
        let mut alias_map = HashMap::new();
        let mut cal_cols = HashMap::new();
        let mut rest = Vec::new();
        for c in cols {
            if c.is_unqualified() {
                if let Some(v) = state.alias_map.remove(&c.name) {
                    alias_map.insert(c.name.clone(), v);
                    continue;
                }
                if let Some(v) = state.cal_cols.remove(&c.name) {
                    cal_cols.insert(c.name.clone(), v);
                    continue;
                }
            }
            rest.push(c.clone());
        }
        state.alias_map = alias_map;
        state.cal_cols = cal_cols;
        rest
    }
}

/// One event from one source.
#[derive(Debug)]
pub struct Tuple {
    pub emitter: String,
    pub message: Arc<Message>,
    pub timestamp: i64,
    pub metadata: Arc<Metadata>,
    affiliate: AffiliateRow,
    ignore_case: bool,
}

impl Tuple {
    pub fn new(emitter: impl Into<String>, message: Message, timestamp: i64) -> Self {
        Self {
            emitter: emitter.into(),
            message: Arc::new(message),
            timestamp,
            metadata: Arc::new(Metadata::new()),
            affiliate: AffiliateRow::new(),
            ignore_case: true,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Arc::new(metadata);
        self
    }

    /// Case-insensitive fallback for message keys; on by default.
    pub fn with_ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }

    pub fn affiliate(&self) -> &AffiliateRow {
        &self.affiliate
    }

    fn pick_message(&mut self, spec: &PickSpec, cols: &[Column]) {
        let keep_all = spec.all_wildcard || spec.wildcard_emitters.contains(&self.emitter);
        if keep_all {
            if !spec.except.is_empty() {
                let message = Arc::make_mut(&mut self.message);
                for e in &spec.except {
                    message.remove(e);
                }
            }
            return;
        }
        let mut picked = Message::new();
        for c in cols {
            if c.is_unqualified() || c.stream == self.emitter {
                if let Some(v) = message_value(&self.message, &c.name, self.ignore_case) {
                    picked.insert(c.name.clone(), v);
                }
            }
        }
        self.message = Arc::new(picked);
    }
}

impl Clone for Tuple {
    fn clone(&self) -> Self {
        Self {
            emitter: self.emitter.clone(),
            message: Arc::clone(&self.message),
            timestamp: self.timestamp,
            metadata: Arc::clone(&self.metadata),
            affiliate: self.affiliate.clone(),
            ignore_case: self.ignore_case,
        }
    }
}

impl Valuer for Tuple {
    fn value(&self, key: &str, table: &str) -> Option<FieldValue> {
        self.affiliate
            .value(key, table)
            .or_else(|| message_value(&self.message, key, self.ignore_case))
    }

    fn meta(&self, key: &str, _table: &str) -> Option<FieldValue> {
        if key == "*" {
            return Some(FieldValue::Map((*self.metadata).clone()));
        }
        message_value(&self.metadata, key, self.ignore_case)
    }

    fn append_alias(&self, key: &str, value: FieldValue) -> bool {
        self.affiliate.append_alias(key, value)
    }

    fn alias_value(&self, key: &str) -> Option<FieldValue> {
        self.affiliate.alias_value(key)
    }

    fn as_wildcarder(&self) -> Option<&dyn Wildcarder> {
        Some(self)
    }

    fn as_func_valuer(&self) -> Option<&dyn FuncValuer> {
        Some(self)
    }
}

impl FuncValuer for Tuple {
    fn func_value(&self, key: &str) -> Option<FieldValue> {
        match key {
            "event_time" => Some(FieldValue::Integer(self.timestamp)),
            _ => None,
        }
    }
}

impl Wildcarder for Tuple {
    fn all(&self, _stream: &str) -> Option<Message> {
        Some(self.to_map())
    }
}

impl Row for Tuple {
    fn set(&self, col: &str, value: FieldValue) {
        self.affiliate.set(col, value);
    }

    fn del(&mut self, col: &str) {
        self.affiliate.del(col);
        if self.message.contains_key(col) {
            Arc::make_mut(&mut self.message).remove(col);
        }
    }

    fn to_map(&self) -> Message {
        let mut m = (*self.message).clone();
        self.affiliate.merge_map(&mut m);
        m
    }

    fn pick(&mut self, spec: &PickSpec) {
        let cols = self.affiliate.pick(&spec.cols);
        self.pick_message(spec, &cols);
    }

    fn as_valuer(&self) -> &dyn Valuer {
        self
    }
}

impl TupleRow for Tuple {
    fn emitter(&self) -> &str {
        &self.emitter
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn clone_tuple(&self) -> Box<dyn TupleRow> {
        Box::new(self.clone())
    }

    fn as_row(&self) -> &dyn Row {
        self
    }

    fn as_row_mut(&mut self) -> &mut dyn Row {
        self
    }
}

impl AggregateData for Tuple {
    fn aggregate_eval(&self, expr: &Expr, v: &dyn Valuer, parent: &ValuerEval<'_>) -> Vec<FieldValue> {
        let wildcard = WildcardValuer::new(self);
        let chain = MultiValuer::new(vec![self, v, &wildcard]);
        vec![parent.rebind(&chain).eval(expr)]
    }
}

/// Row produced by a join: one constituent per matched stream.
#[derive(Debug, Default)]
pub struct JoinTuple {
    pub tuples: Vec<Box<dyn TupleRow>>,
    affiliate: AffiliateRow,
}

impl JoinTuple {
    pub fn new(tuples: Vec<Box<dyn TupleRow>>) -> Self {
        Self {
            tuples,
            affiliate: AffiliateRow::new(),
        }
    }

    pub fn add_tuple(&mut self, tuple: Box<dyn TupleRow>) {
        self.tuples.push(tuple);
    }

    pub fn add_tuples(&mut self, tuples: Vec<Box<dyn TupleRow>>) {
        self.tuples.extend(tuples);
    }

    fn do_get_value(&self, key: &str, table: &str, is_val: bool) -> Option<FieldValue> {
        let get = |t: &Box<dyn TupleRow>| {
            if is_val {
                t.value(key, "")
            } else {
                t.meta(key, "")
            }
        };
        if table.is_empty() {
            if self.tuples.len() > 1 {
                let found = self.tuples.iter().find_map(get);
                if found.is_none() {
                    log::debug!("Wrong key: {} not found", key);
                }
                found
            } else {
                self.tuples.first().and_then(get)
            }
        } else {
            self.tuples
                .iter()
                .find(|t| t.emitter() == table)
                .and_then(get)
        }
    }
}

impl Clone for JoinTuple {
    fn clone(&self) -> Self {
        Self {
            tuples: self.tuples.iter().map(|t| t.clone_tuple()).collect(),
            affiliate: self.affiliate.clone(),
        }
    }
}

impl Valuer for JoinTuple {
    fn value(&self, key: &str, table: &str) -> Option<FieldValue> {
        self.affiliate
            .value(key, table)
            .or_else(|| self.do_get_value(key, table, true))
    }

    fn meta(&self, key: &str, table: &str) -> Option<FieldValue> {
        self.do_get_value(key, table, false)
    }

    fn append_alias(&self, key: &str, value: FieldValue) -> bool {
        self.affiliate.append_alias(key, value)
    }

    fn alias_value(&self, key: &str) -> Option<FieldValue> {
        self.affiliate.alias_value(key)
    }

    fn as_wildcarder(&self) -> Option<&dyn Wildcarder> {
        Some(self)
    }
}

impl Wildcarder for JoinTuple {
    fn all(&self, stream: &str) -> Option<Message> {
        if stream.is_empty() {
            return Some(self.to_map());
        }
        self.tuples
            .iter()
            .find(|t| t.emitter() == stream)
            .map(|t| t.to_map())
    }
}

impl Row for JoinTuple {
    fn set(&self, col: &str, value: FieldValue) {
        self.affiliate.set(col, value);
    }

    fn del(&mut self, col: &str) {
        self.affiliate.del(col);
        for t in self.tuples.iter_mut() {
            t.del(col);
        }
    }

    /// Earlier constituents win on key collisions.
    fn to_map(&self) -> Message {
        let mut m = Message::new();
        for t in self.tuples.iter().rev() {
            m.extend(t.to_map());
        }
        self.affiliate.merge_map(&mut m);
        m
    }

    fn pick(&mut self, spec: &PickSpec) {
        let cols = self.affiliate.pick(&spec.cols);
        if spec.all_wildcard {
            return;
        }
        if cols.is_empty() {
            self.tuples.clear();
            return;
        }
        let inner = PickSpec {
            all_wildcard: false,
            cols,
            wildcard_emitters: spec.wildcard_emitters.clone(),
            except: spec.except.clone(),
        };
        for t in self.tuples.iter_mut() {
            if spec.wildcard_emitters.contains(t.emitter()) {
                continue;
            }
            t.pick(&inner);
        }
    }

    fn as_valuer(&self) -> &dyn Valuer {
        self
    }
}

impl TupleRow for JoinTuple {
    fn emitter(&self) -> &str {
        JOIN_EMITTER
    }

    fn timestamp(&self) -> i64 {
        self.tuples.iter().map(|t| t.timestamp()).max().unwrap_or(0)
    }

    fn clone_tuple(&self) -> Box<dyn TupleRow> {
        Box::new(self.clone())
    }

    fn as_row(&self) -> &dyn Row {
        self
    }

    fn as_row_mut(&mut self) -> &mut dyn Row {
        self
    }
}

impl AggregateData for JoinTuple {
    fn aggregate_eval(&self, expr: &Expr, v: &dyn Valuer, parent: &ValuerEval<'_>) -> Vec<FieldValue> {
        let wildcard = WildcardValuer::new(self);
        let chain = MultiValuer::new(vec![self, v, &wildcard]);
        vec![parent.rebind(&chain).eval(expr)]
    }
}

/// Rows sharing one group key. Scalar lookups read the first member.
#[derive(Debug, Default)]
pub struct GroupedTuples {
    pub content: Vec<Box<dyn TupleRow>>,
    pub window_range: Option<WindowRange>,
    affiliate: AffiliateRow,
    cached_map: Mutex<Option<Message>>,
}

impl GroupedTuples {
    pub fn new(content: Vec<Box<dyn TupleRow>>, window_range: Option<WindowRange>) -> Self {
        Self {
            content,
            window_range,
            affiliate: AffiliateRow::new(),
            cached_map: Mutex::new(None),
        }
    }

    fn invalidate(&self) {
        *self.cached_map.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl Clone for GroupedTuples {
    fn clone(&self) -> Self {
        Self {
            content: self.content.iter().map(|t| t.clone_tuple()).collect(),
            window_range: self.window_range,
            affiliate: self.affiliate.clone(),
            cached_map: Mutex::new(None),
        }
    }
}

impl Valuer for GroupedTuples {
    fn value(&self, key: &str, table: &str) -> Option<FieldValue> {
        self.affiliate
            .value(key, table)
            .or_else(|| self.content.first().and_then(|t| t.value(key, table)))
    }

    fn meta(&self, key: &str, table: &str) -> Option<FieldValue> {
        self.content.first().and_then(|t| t.meta(key, table))
    }

    fn append_alias(&self, key: &str, value: FieldValue) -> bool {
        self.affiliate.append_alias(key, value)
    }

    fn alias_value(&self, key: &str) -> Option<FieldValue> {
        self.affiliate.alias_value(key)
    }

    fn as_wildcarder(&self) -> Option<&dyn Wildcarder> {
        Some(self)
    }

    fn as_func_valuer(&self) -> Option<&dyn FuncValuer> {
        self.window_range.as_ref().map(|w| w as &dyn FuncValuer)
    }
}

impl Wildcarder for GroupedTuples {
    fn all(&self, _stream: &str) -> Option<Message> {
        Some(self.to_map())
    }
}

impl Row for GroupedTuples {
    fn set(&self, col: &str, value: FieldValue) {
        self.affiliate.set(col, value);
    }

    fn del(&mut self, col: &str) {
        self.affiliate.del(col);
        if let Some(first) = self.content.first_mut() {
            first.del(col);
        }
        self.invalidate();
    }

    fn to_map(&self) -> Message {
        let mut cached = self.cached_map.lock().unwrap_or_else(PoisonError::into_inner);
        let base = cached.get_or_insert_with(|| {
            self.content
                .first()
                .map(|t| t.to_map())
                .unwrap_or_default()
        });
        let mut m = base.clone();
        self.affiliate.merge_map(&mut m);
        m
    }

    fn pick(&mut self, spec: &PickSpec) {
        let cols = self.affiliate.pick(&spec.cols);
        if let Some(first) = self.content.first_mut() {
            let inner = PickSpec {
                cols,
                ..spec.clone()
            };
            first.pick(&inner);
        }
        self.invalidate();
    }

    fn as_valuer(&self) -> &dyn Valuer {
        self
    }
}

impl AggregateData for GroupedTuples {
    fn aggregate_eval(&self, expr: &Expr, v: &dyn Valuer, parent: &ValuerEval<'_>) -> Vec<FieldValue> {
        members_aggregate_eval(
            self.content.iter().map(|t| t.as_ref()),
            self.window_range.as_ref(),
            expr,
            v,
            parent,
        )
    }
}

impl CollectionRow for GroupedTuples {
    fn as_row(&self) -> &dyn Row {
        self
    }

    fn as_aggregate_data(&self) -> &dyn AggregateData {
        self
    }

    fn window_range(&self) -> Option<&WindowRange> {
        self.window_range.as_ref()
    }
}

/// Evaluate `expr` once per member with the window range and `v` in the chain.
pub(crate) fn members_aggregate_eval<'r>(
    members: impl Iterator<Item = &'r dyn TupleRow>,
    window_range: Option<&WindowRange>,
    expr: &Expr,
    v: &dyn Valuer,
    parent: &ValuerEval<'_>,
) -> Vec<FieldValue> {
    members
        .map(|t| {
            let wildcard = WildcardValuer::new(t.as_row());
            let mut chain = MultiValuer::new(vec![t.as_valuer()]);
            if let Some(w) = window_range {
                chain.push(w);
            }
            chain.push(v);
            chain.push(&wildcard);
            parent.rebind(&chain).eval(expr)
        })
        .collect()
}
