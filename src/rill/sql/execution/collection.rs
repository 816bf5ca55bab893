/*!
# Collections

Window content handed from one operator to the next.

- [`WindowTuples`]: rows of one window, possibly from several emitters
- [`JoinTuples`]: output of a join
- [`GroupedTuplesSet`]: output of GROUP BY, one [`GroupedTuples`] per key

Non-grouped collections are also a [`CollectionRow`], so an aggregate projection over a
window without GROUP BY sees the whole window as a single group.

Whole-collection maps and the per-emitter index are caches. Every structural mutation
drops them.
*/

use crate::rill::sql::ast::Expr;
use crate::rill::sql::error::SqlResult;
use crate::rill::sql::execution::expression::evaluator::ValuerEval;
use crate::rill::sql::execution::expression::valuer::{AggregateData, FuncValuer, Valuer, Wildcarder};
use crate::rill::sql::execution::row::{
    members_aggregate_eval, AffiliateRow, CollectionRow, GroupedTuples, JoinTuple, PickSpec, Row,
    TupleRow,
};
use crate::rill::sql::execution::types::{FieldValue, Message};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Bounds of a fired window in epoch milliseconds. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRange {
    pub start: i64,
    pub end: i64,
    /// Time the window was triggered
    pub trigger: i64,
}

impl WindowRange {
    pub fn new(start: i64, end: i64, trigger: i64) -> Self {
        Self { start, end, trigger }
    }
}

impl Valuer for WindowRange {
    fn value(&self, _key: &str, _table: &str) -> Option<FieldValue> {
        None
    }

    fn as_func_valuer(&self) -> Option<&dyn FuncValuer> {
        Some(self)
    }
}

impl FuncValuer for WindowRange {
    fn func_value(&self, key: &str) -> Option<FieldValue> {
        match key {
            "window_start" => Some(FieldValue::Integer(self.start)),
            "window_end" => Some(FieldValue::Integer(self.end)),
            "window_trigger" | "event_time" => Some(FieldValue::Integer(self.trigger)),
            _ => None,
        }
    }
}

/// Callback for [`Collection::group_range`]. Return `Ok(false)` to stop early.
pub type GroupFn<'f> = dyn FnMut(usize, &dyn CollectionRow) -> SqlResult<bool> + 'f;
/// Callback for [`Collection::range`].
pub type RowFn<'f> = dyn FnMut(usize, &dyn Row) -> SqlResult<bool> + 'f;
/// Callback for [`Collection::range_set`]; receives a private copy of the row.
pub type RowSetFn<'f> = dyn FnMut(usize, &mut dyn Row) -> SqlResult<bool> + 'f;

/// Uniform contract over every kind of window content.
pub trait Collection: Send + Sync + fmt::Debug {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn swap(&mut self, i: usize, j: usize);

    fn index(&self, i: usize) -> Option<&dyn Row>;

    /// Iterate groups. A non-grouped collection is a single group.
    fn group_range(&self, f: &mut GroupFn<'_>) -> SqlResult<()>;

    /// Iterate rows in place. For grouped collections each row is a group. Columns set
    /// through the row are visible in later exports.
    fn range(&self, f: &mut RowFn<'_>) -> SqlResult<()>;

    /// Iterate rows, handing `f` a clone that replaces the original afterwards.
    fn range_set(&mut self, f: &mut RowSetFn<'_>) -> SqlResult<()>;

    /// Keep only the rows at `indexes`, in that order.
    fn filter(&mut self, indexes: &[usize]);

    fn window_range(&self) -> Option<&WindowRange>;

    /// Copy with independent affiliate state. Row messages are shared.
    fn clone_collection(&self) -> Box<dyn Collection>;

    /// One map per aggregation row.
    fn to_agg_maps(&self) -> Vec<Message>;

    /// One map per member row.
    fn to_row_maps(&self) -> Vec<Message>;

    fn to_maps(&self) -> Vec<Message> {
        self.to_row_maps()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keep the entries of `items` at `indexes`. A repeated index keeps the row once.
fn retain_indexes<T>(items: Vec<T>, indexes: &[usize]) -> Vec<T> {
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    indexes
        .iter()
        .filter_map(|&i| slots.get_mut(i).and_then(Option::take))
        .collect()
}

/// Drive `f` over `rows` until it asks to stop.
fn range_rows<'r>(rows: impl Iterator<Item = &'r dyn Row>, f: &mut RowFn<'_>) -> SqlResult<()> {
    for (i, row) in rows.enumerate() {
        if !f(i, row)? {
            break;
        }
    }
    Ok(())
}

/// Rows of one window.
#[derive(Debug, Default)]
pub struct WindowTuples {
    pub content: Vec<Box<dyn TupleRow>>,
    pub window_range: Option<WindowRange>,
    content_by_src: Mutex<Option<HashMap<String, Vec<usize>>>>,
    affiliate: AffiliateRow,
    cached_map: Mutex<Option<Message>>,
}

impl WindowTuples {
    pub fn new(content: Vec<Box<dyn TupleRow>>, window_range: Option<WindowRange>) -> Self {
        Self {
            content,
            window_range,
            ..Self::default()
        }
    }

    pub fn add_tuple(&mut self, tuple: Box<dyn TupleRow>) -> &mut Self {
        self.content.push(tuple);
        self.invalidate();
        self
    }

    /// Stable sort by event timestamp.
    pub fn sort_by_timestamp(&mut self) {
        self.content.sort_by_key(|t| t.timestamp());
        self.invalidate();
    }

    /// Rows emitted by `emitter`, in window order.
    pub fn get_by_src(&self, emitter: &str) -> Vec<&dyn TupleRow> {
        let mut index = lock(&self.content_by_src);
        let index = index.get_or_insert_with(|| {
            let mut by_src: HashMap<String, Vec<usize>> = HashMap::new();
            for (i, t) in self.content.iter().enumerate() {
                by_src.entry(t.emitter().to_string()).or_default().push(i);
            }
            by_src
        });
        index
            .get(emitter)
            .map(|positions| {
                positions
                    .iter()
                    .filter_map(|&i| self.content.get(i).map(|t| t.as_ref()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn invalidate(&self) {
        *lock(&self.content_by_src) = None;
        *lock(&self.cached_map) = None;
    }
}

impl Clone for WindowTuples {
    fn clone(&self) -> Self {
        Self {
            content: self.content.iter().map(|t| t.clone_tuple()).collect(),
            window_range: self.window_range,
            content_by_src: Mutex::new(None),
            affiliate: self.affiliate.clone(),
            cached_map: Mutex::new(None),
        }
    }
}

impl Valuer for WindowTuples {
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

    fn as_func_valuer(&self) -> Option<&dyn FuncValuer> {
        self.window_range.as_ref().map(|w| w as &dyn FuncValuer)
    }

    fn as_wildcarder(&self) -> Option<&dyn Wildcarder> {
        Some(self)
    }
}

impl Wildcarder for WindowTuples {
    fn all(&self, _stream: &str) -> Option<Message> {
        Some(self.to_map())
    }
}

impl Row for WindowTuples {
    fn set(&self, col: &str, value: FieldValue) {
        self.affiliate.set(col, value);
    }

    fn del(&mut self, col: &str) {
        self.affiliate.del(col);
        *lock(&self.cached_map) = None;
    }

    /// The first row's content overlaid with the collection's computed columns.
    fn to_map(&self) -> Message {
        let mut cached = lock(&self.cached_map);
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
        let inner = PickSpec {
            cols,
            ..spec.clone()
        };
        for t in self.content.iter_mut() {
            t.pick(&inner);
        }
        self.invalidate();
    }

    fn as_valuer(&self) -> &dyn Valuer {
        self
    }
}

impl AggregateData for WindowTuples {
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

impl CollectionRow for WindowTuples {
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

impl Collection for WindowTuples {
    fn len(&self) -> usize {
        self.content.len()
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.content.swap(i, j);
        self.invalidate();
    }

    fn index(&self, i: usize) -> Option<&dyn Row> {
        // the caller may set columns on the member
        *lock(&self.cached_map) = None;
        self.content.get(i).map(|t| t.as_row())
    }

    fn group_range(&self, f: &mut GroupFn<'_>) -> SqlResult<()> {
        f(0, self).map(|_| ())
    }

    fn range(&self, f: &mut RowFn<'_>) -> SqlResult<()> {
        let result = range_rows(self.content.iter().map(|t| t.as_row()), f);
        *lock(&self.cached_map) = None;
        result
    }

    fn range_set(&mut self, f: &mut RowSetFn<'_>) -> SqlResult<()> {
        self.invalidate();
        for i in 0..self.content.len() {
            let mut row = self.content[i].clone_tuple();
            let more = f(i, row.as_row_mut())?;
            self.content[i] = row;
            if !more {
                break;
            }
        }
        Ok(())
    }

    fn filter(&mut self, indexes: &[usize]) {
        let content = std::mem::take(&mut self.content);
        self.content = retain_indexes(content, indexes);
        self.invalidate();
    }

    fn window_range(&self) -> Option<&WindowRange> {
        self.window_range.as_ref()
    }

    fn clone_collection(&self) -> Box<dyn Collection> {
        Box::new(self.clone())
    }

    fn to_agg_maps(&self) -> Vec<Message> {
        if self.content.is_empty() {
            return Vec::new();
        }
        vec![self.to_map()]
    }

    fn to_row_maps(&self) -> Vec<Message> {
        self.content.iter().map(|t| t.to_map()).collect()
    }
}

/// Rows produced by a join.
#[derive(Debug, Default)]
pub struct JoinTuples {
    pub content: Vec<JoinTuple>,
    pub window_range: Option<WindowRange>,
    affiliate: AffiliateRow,
    cached_map: Mutex<Option<Message>>,
}

impl JoinTuples {
    pub fn new(content: Vec<JoinTuple>, window_range: Option<WindowRange>) -> Self {
        Self {
            content,
            window_range,
            ..Self::default()
        }
    }

    pub fn add_join_tuple(&mut self, jt: JoinTuple) {
        self.content.push(jt);
        self.invalidate();
    }

    fn invalidate(&self) {
        *lock(&self.cached_map) = None;
    }
}

impl Clone for JoinTuples {
    fn clone(&self) -> Self {
        Self {
            content: self.content.clone(),
            window_range: self.window_range,
            affiliate: self.affiliate.clone(),
            cached_map: Mutex::new(None),
        }
    }
}

impl Valuer for JoinTuples {
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

    fn as_func_valuer(&self) -> Option<&dyn FuncValuer> {
        self.window_range.as_ref().map(|w| w as &dyn FuncValuer)
    }

    fn as_wildcarder(&self) -> Option<&dyn Wildcarder> {
        Some(self)
    }
}

impl Wildcarder for JoinTuples {
    fn all(&self, stream: &str) -> Option<Message> {
        if stream.is_empty() {
            return Some(self.to_map());
        }
        self.content.first().and_then(|t| t.all(stream))
    }
}

impl Row for JoinTuples {
    fn set(&self, col: &str, value: FieldValue) {
        self.affiliate.set(col, value);
    }

    fn del(&mut self, col: &str) {
        self.affiliate.del(col);
        self.invalidate();
    }

    fn to_map(&self) -> Message {
        let mut cached = lock(&self.cached_map);
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
        let inner = PickSpec {
            cols,
            ..spec.clone()
        };
        for t in self.content.iter_mut() {
            t.pick(&inner);
        }
        self.invalidate();
    }

    fn as_valuer(&self) -> &dyn Valuer {
        self
    }
}

impl AggregateData for JoinTuples {
    fn aggregate_eval(&self, expr: &Expr, v: &dyn Valuer, parent: &ValuerEval<'_>) -> Vec<FieldValue> {
        members_aggregate_eval(
            self.content.iter().map(|t| t as &dyn TupleRow),
            self.window_range.as_ref(),
            expr,
            v,
            parent,
        )
    }
}

impl CollectionRow for JoinTuples {
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

impl Collection for JoinTuples {
    fn len(&self) -> usize {
        self.content.len()
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.content.swap(i, j);
        self.invalidate();
    }

    fn index(&self, i: usize) -> Option<&dyn Row> {
        // the caller may set columns on the member
        *lock(&self.cached_map) = None;
        self.content.get(i).map(|t| t as &dyn Row)
    }

    fn group_range(&self, f: &mut GroupFn<'_>) -> SqlResult<()> {
        f(0, self).map(|_| ())
    }

    fn range(&self, f: &mut RowFn<'_>) -> SqlResult<()> {
        let result = range_rows(self.content.iter().map(|t| t as &dyn Row), f);
        *lock(&self.cached_map) = None;
        result
    }

    fn range_set(&mut self, f: &mut RowSetFn<'_>) -> SqlResult<()> {
        self.invalidate();
        for i in 0..self.content.len() {
            let mut row = self.content[i].clone();
            let more = f(i, &mut row)?;
            self.content[i] = row;
            if !more {
                break;
            }
        }
        Ok(())
    }

    fn filter(&mut self, indexes: &[usize]) {
        let content = std::mem::take(&mut self.content);
        self.content = retain_indexes(content, indexes);
        self.invalidate();
    }

    fn window_range(&self) -> Option<&WindowRange> {
        self.window_range.as_ref()
    }

    fn clone_collection(&self) -> Box<dyn Collection> {
        Box::new(self.clone())
    }

    fn to_agg_maps(&self) -> Vec<Message> {
        if self.content.is_empty() {
            return Vec::new();
        }
        vec![self.to_map()]
    }

    fn to_row_maps(&self) -> Vec<Message> {
        self.content.iter().map(|t| t.to_map()).collect()
    }
}

/// Groups produced by GROUP BY.
#[derive(Debug, Default, Clone)]
pub struct GroupedTuplesSet {
    pub groups: Vec<GroupedTuples>,
    pub window_range: Option<WindowRange>,
}

impl GroupedTuplesSet {
    pub fn new(groups: Vec<GroupedTuples>, window_range: Option<WindowRange>) -> Self {
        Self { groups, window_range }
    }
}

impl Collection for GroupedTuplesSet {
    fn len(&self) -> usize {
        self.groups.len()
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.groups.swap(i, j);
    }

    fn index(&self, i: usize) -> Option<&dyn Row> {
        self.groups.get(i).map(|g| g as &dyn Row)
    }

    fn group_range(&self, f: &mut GroupFn<'_>) -> SqlResult<()> {
        for (i, g) in self.groups.iter().enumerate() {
            if !f(i, g)? {
                break;
            }
        }
        Ok(())
    }

    fn range(&self, f: &mut RowFn<'_>) -> SqlResult<()> {
        for (i, g) in self.groups.iter().enumerate() {
            if !f(i, g)? {
                break;
            }
        }
        Ok(())
    }

    fn range_set(&mut self, f: &mut RowSetFn<'_>) -> SqlResult<()> {
        for i in 0..self.groups.len() {
            let mut group = self.groups[i].clone();
            let more = f(i, &mut group)?;
            self.groups[i] = group;
            if !more {
                break;
            }
        }
        Ok(())
    }

    fn filter(&mut self, indexes: &[usize]) {
        let groups = std::mem::take(&mut self.groups);
        self.groups = retain_indexes(groups, indexes);
    }

    fn window_range(&self) -> Option<&WindowRange> {
        self.window_range.as_ref()
    }

    fn clone_collection(&self) -> Box<dyn Collection> {
        Box::new(self.clone())
    }

    fn to_agg_maps(&self) -> Vec<Message> {
        self.to_row_maps()
    }

    fn to_row_maps(&self) -> Vec<Message> {
        self.groups.iter().map(|g| g.to_map()).collect()
    }
}
