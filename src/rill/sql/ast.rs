/*!
# Streaming SQL Abstract Syntax Tree (AST)

The typed tree produced by [`StreamingSqlParser`](crate::rill::sql::parser::StreamingSqlParser)
and walked by the expression evaluator. Every node is immutable once built; the only
per-execution mutation (memoised analytic results) lives outside the tree, in slots
addressed by [`Call::func_id`].

## Example Queries

```sql
-- Windowed aggregation
SELECT deviceId, avg(temperature) AS t
FROM demo
WHERE humidity > 30
GROUP BY deviceId, TUMBLINGWINDOW(ss, 10)
HAVING t > 20
ORDER BY deviceId DESC

-- JSON navigation and slicing
SELECT readings[0:2], payload->device->id FROM sensors

-- Analytic function with a partition
SELECT lag(temperature) OVER (PARTITION BY deviceId) FROM demo

-- Stream definition
CREATE STREAM demo (deviceId STRING, temperature FLOAT)
WITH (DATASOURCE="demo", FORMAT="json")
```
*/

use regex::Regex;
use std::fmt;

/// Qualifier of a field reference without an explicit stream.
pub const DEFAULT_STREAM: &str = "$$default";
/// Qualifier of a field reference that resolves to a select alias.
pub const ALIAS_STREAM: &str = "$$alias";
/// Separator between stream and column in flattened keys.
pub const COLUMN_SEPARATOR: &str = "\u{7}";
/// Emitter reported by joined rows.
pub const JOIN_EMITTER: &str = "$$JOIN";

/// Top-level statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Box<SelectStatement>),
    CreateStream(StreamStmt),
    ShowStreams,
    ShowTables,
    DescribeStream(String),
    DescribeTable(String),
    ExplainStream(String),
    ExplainTable(String),
    DropStream(String),
    DropTable(String),
}

impl Statement {
    /// Short label used in logs and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Select(_) => "SELECT",
            Statement::CreateStream(s) if s.stream_type == StreamType::Table => "CREATE TABLE",
            Statement::CreateStream(_) => "CREATE STREAM",
            Statement::ShowStreams => "SHOW STREAMS",
            Statement::ShowTables => "SHOW TABLES",
            Statement::DescribeStream(_) => "DESCRIBE STREAM",
            Statement::DescribeTable(_) => "DESCRIBE TABLE",
            Statement::ExplainStream(_) => "EXPLAIN STREAM",
            Statement::ExplainTable(_) => "EXPLAIN TABLE",
            Statement::DropStream(_) => "DROP STREAM",
            Statement::DropTable(_) => "DROP TABLE",
        }
    }
}

/// A continuous SELECT query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectStatement {
    pub fields: Vec<Field>,
    pub sources: Vec<Table>,
    pub joins: Vec<Join>,
    pub condition: Option<Expr>,
    pub dimensions: Vec<Dimension>,
    pub having: Option<Expr>,
    pub sort_fields: Vec<SortField>,
}

impl SelectStatement {
    /// The window descriptor among the GROUP BY dimensions, if any.
    pub fn window(&self) -> Option<&Window> {
        self.dimensions.iter().find_map(|d| match &d.expr {
            Expr::Window(w) => Some(w),
            _ => None,
        })
    }

    /// GROUP BY dimensions that are not windows.
    pub fn groups(&self) -> Vec<&Dimension> {
        self.dimensions
            .iter()
            .filter(|d| !matches!(d.expr, Expr::Window(_)))
            .collect()
    }

    /// True when the projection is a bare `*`.
    pub fn is_select_all(&self) -> bool {
        self.fields.len() == 1 && matches!(self.fields[0].expr, Expr::Wildcard(_))
    }
}

/// One entry of the select list.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Name derived from the expression (column or function name), or a synthetic one
    pub name: String,
    /// `AS` alias
    pub alias: Option<String>,
    pub expr: Expr,
}

impl Field {
    /// Column name under which the field is emitted.
    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self.expr, Expr::Wildcard(_))
    }
}

/// A FROM source.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Left,
    Inner,
    Right,
    Full,
    Cross,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JoinType::Left => "LEFT",
            JoinType::Inner => "INNER",
            JoinType::Right => "RIGHT",
            JoinType::Full => "FULL",
            JoinType::Cross => "CROSS",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub name: String,
    pub alias: Option<String>,
    pub join_type: JoinType,
    /// ON condition; absent only for CROSS joins
    pub expr: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub expr: Expr,
}

/// ORDER BY key.
#[derive(Debug, Clone, PartialEq)]
pub struct SortField {
    pub name: String,
    pub stream: Option<String>,
    /// Stream and name joined by [`COLUMN_SEPARATOR`]
    pub uname: String,
    pub ascending: bool,
    /// Reference evaluated by the sorter; rebound to an alias when the name is one
    pub field_expr: Expr,
}

/// Binary operators, including the JSON navigation and set predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    /// `[` index or slice
    Subset,
    /// `->` nested field
    Arrow,
    /// `.` struct navigation after a complete reference
    Dot,
    In,
    NotIn,
    Between,
    NotBetween,
    Like,
    NotLike,
}

impl BinaryOperator {
    /// Binding strength used by precedence climbing. Higher binds tighter.
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Or => 1,
            BinaryOperator::And => 2,
            BinaryOperator::Eq
            | BinaryOperator::Neq
            | BinaryOperator::Lt
            | BinaryOperator::Lte
            | BinaryOperator::Gt
            | BinaryOperator::Gte
            | BinaryOperator::In
            | BinaryOperator::NotIn
            | BinaryOperator::Between
            | BinaryOperator::NotBetween
            | BinaryOperator::Like
            | BinaryOperator::NotLike => 3,
            BinaryOperator::Add
            | BinaryOperator::Sub
            | BinaryOperator::BitOr
            | BinaryOperator::BitXor => 4,
            BinaryOperator::Mul
            | BinaryOperator::Div
            | BinaryOperator::Mod
            | BinaryOperator::BitAnd
            | BinaryOperator::Subset
            | BinaryOperator::Arrow
            | BinaryOperator::Dot => 5,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitXor => "^",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
            BinaryOperator::Eq => "=",
            BinaryOperator::Neq => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Lte => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Gte => ">=",
            BinaryOperator::Subset => "[]",
            BinaryOperator::Arrow => "->",
            BinaryOperator::Dot => ".",
            BinaryOperator::In => "IN",
            BinaryOperator::NotIn => "NOT IN",
            BinaryOperator::Between => "BETWEEN",
            BinaryOperator::NotBetween => "NOT BETWEEN",
            BinaryOperator::Like => "LIKE",
            BinaryOperator::NotLike => "NOT LIKE",
        }
    }

    /// Operators whose result is always boolean.
    pub fn is_predicate(&self) -> bool {
        matches!(
            self,
            BinaryOperator::And
                | BinaryOperator::Or
                | BinaryOperator::Eq
                | BinaryOperator::Neq
                | BinaryOperator::Lt
                | BinaryOperator::Lte
                | BinaryOperator::Gt
                | BinaryOperator::Gte
                | BinaryOperator::In
                | BinaryOperator::NotIn
                | BinaryOperator::Between
                | BinaryOperator::NotBetween
                | BinaryOperator::Like
                | BinaryOperator::NotLike
        )
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Time unit literal accepted as the first window argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl TimeUnit {
    pub fn millis(&self) -> i64 {
        match self {
            TimeUnit::Day => 24 * 3600 * 1000,
            TimeUnit::Hour => 3600 * 1000,
            TimeUnit::Minute => 60 * 1000,
            TimeUnit::Second => 1000,
            TimeUnit::Millisecond => 1,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            TimeUnit::Day => "DD",
            TimeUnit::Hour => "HH",
            TimeUnit::Minute => "MI",
            TimeUnit::Second => "SS",
            TimeUnit::Millisecond => "MS",
        }
    }
}

/// Qualifier of a field or metadata reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StreamName {
    /// No explicit stream; bound later or schemaless
    Default,
    /// Reference to a select alias
    Alias,
    Named(String),
}

impl StreamName {
    /// The table argument passed to row lookups. Empty for unqualified references.
    pub fn as_table(&self) -> &str {
        match self {
            StreamName::Named(s) => s,
            _ => "",
        }
    }
}

impl fmt::Display for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamName::Default => write!(f, "{}", DEFAULT_STREAM),
            StreamName::Alias => write!(f, "{}", ALIAS_STREAM),
            StreamName::Named(s) => write!(f, "{}", s),
        }
    }
}

/// The expression behind a select alias, attached to references to that alias.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasRef {
    pub expression: Box<Expr>,
    /// Streams the aliased expression reads from
    pub ref_sources: Vec<String>,
    pub is_aggregate: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldRef {
    pub stream: StreamName,
    pub name: String,
    pub alias: Option<AliasRef>,
}

impl FieldRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            stream: StreamName::Default,
            name: name.into(),
            alias: None,
        }
    }

    pub fn qualified(stream: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            stream: StreamName::Named(stream.into()),
            name: name.into(),
            alias: None,
        }
    }

    pub fn is_alias(&self) -> bool {
        self.stream == StreamName::Alias
    }

    pub fn is_column(&self) -> bool {
        !self.is_alias()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetaRef {
    pub stream: StreamName,
    pub name: String,
}

/// Kind of a function, fixed when the call is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FuncType {
    Scalar,
    Aggregate,
    /// Depends on earlier tuples of the same partition, such as `lag`
    Analytic,
    /// Produces several named columns
    Cols,
    /// Set-returning
    Srf,
}

/// `PARTITION BY` expressions of an analytic call.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionExpr {
    pub exprs: Vec<Expr>,
}

/// Function call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Canonical (lower-case for built-ins) function name
    pub name: String,
    /// Index unique within the parsed statement
    pub func_id: usize,
    pub func_type: FuncType,
    pub args: Vec<Expr>,
    pub partition: Option<PartitionExpr>,
    pub when_expr: Option<Box<Expr>>,
    /// Column holding the memoised result of an analytic call
    pub cached_field: Option<String>,
}

impl Call {
    pub fn new(name: impl Into<String>, func_type: FuncType, args: Vec<Expr>) -> Self {
        Self {
            name: name.into(),
            func_id: 0,
            func_type,
            args,
            partition: None,
            when_expr: None,
            cached_field: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhenClause {
    pub expr: Expr,
    pub result: Expr,
}

/// CASE expression. Without `value` every WHEN is a boolean condition.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseExpr {
    pub value: Option<Box<Expr>>,
    pub when_clauses: Vec<WhenClause>,
    pub else_clause: Option<Box<Expr>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowType {
    Tumbling,
    Hopping,
    Sliding,
    Session,
    Count,
}

impl WindowType {
    pub fn from_func_name(name: &str) -> Option<WindowType> {
        match name {
            "tumblingwindow" => Some(WindowType::Tumbling),
            "hoppingwindow" => Some(WindowType::Hopping),
            "sessionwindow" => Some(WindowType::Session),
            "slidingwindow" => Some(WindowType::Sliding),
            "countwindow" => Some(WindowType::Count),
            _ => None,
        }
    }
}

/// Window descriptor. Lengths of time windows are in milliseconds, count windows in rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub window_type: WindowType,
    pub length: i64,
    /// Hop or session timeout; 0 when not applicable. Count windows use `None` for no hop.
    pub interval: Option<i64>,
    pub filter: Option<Box<Expr>>,
}

/// `*`, `t.*`, optionally with `EXCEPT(...)` and `REPLACE(...)`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Wildcard {
    pub stream: Option<String>,
    pub except: Vec<String>,
    pub replace: Vec<Field>,
}

/// Right-hand side of IN / NOT IN.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueSetExpr {
    /// `(1, 2, 3)` form
    pub literal_exprs: Vec<Expr>,
    /// Expression evaluating to an array
    pub array_expr: Option<Box<Expr>>,
}

/// Right-hand side of BETWEEN / NOT BETWEEN.
#[derive(Debug, Clone, PartialEq)]
pub struct BetweenExpr {
    pub lower: Box<Expr>,
    pub higher: Box<Expr>,
}

/// A LIKE pattern compiled to an anchored regular expression.
#[derive(Debug, Clone)]
pub struct LikeRegex {
    pub source: String,
    pub regex: Regex,
}

impl PartialEq for LikeRegex {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl LikeRegex {
    /// Translate a LIKE pattern: `%` becomes `.*`, `_` becomes `.`, `\%` and `\_` stay
    /// literal and every other character is matched verbatim.
    pub fn compile(pattern: &str) -> Result<LikeRegex, regex::Error> {
        let mut out = String::with_capacity(pattern.len() * 2 + 2);
        out.push('^');
        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.peek() {
                    Some('%') | Some('_') => {
                        let escaped = chars.next().unwrap_or_default();
                        out.push_str(&regex::escape(&escaped.to_string()));
                    }
                    _ => out.push_str(r"\\"),
                },
                '%' => out.push_str(".*"),
                '_' => out.push('.'),
                other => out.push_str(&regex::escape(&other.to_string())),
            }
        }
        out.push('$');
        Ok(LikeRegex {
            source: pattern.to_string(),
            regex: Regex::new(&out)?,
        })
    }

    pub fn is_match(&self, s: &str) -> bool {
        self.regex.is_match(s)
    }
}

/// Right-hand side of LIKE / NOT LIKE. A string-literal pattern is compiled once at
/// parse time; other patterns are compiled per evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct LikePattern {
    pub expr: Box<Expr>,
    pub pattern: Option<LikeRegex>,
}

/// Argument of a column-producing function, carrying the column name it produces.
#[derive(Debug, Clone, PartialEq)]
pub struct ColFuncField {
    pub name: String,
    pub expr: Box<Expr>,
}

/// Expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Integer(i64),
    Number(f64),
    String(String),
    Boolean(bool),
    Time(TimeUnit),
    FieldRef(FieldRef),
    MetaRef(MetaRef),
    /// Right operand of `->` or `.`
    JsonFieldRef(String),
    Paren(Box<Expr>),
    Binary {
        op: BinaryOperator,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `[i]`
    Index(Box<Expr>),
    /// `[i:j]`; an open end holds [`Expr::OPEN_END`]
    Colon {
        start: Box<Expr>,
        end: Box<Expr>,
    },
    Call(Call),
    Case(CaseExpr),
    Window(Window),
    Wildcard(Wildcard),
    ValueSet(ValueSetExpr),
    Between(BetweenExpr),
    Like(LikePattern),
    ColFuncField(ColFuncField),
}

impl Expr {
    /// Sentinel marking an open slice end.
    pub const OPEN_END: i64 = i32::MIN as i64;

    pub fn binary(op: BinaryOperator, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn field(name: impl Into<String>) -> Expr {
        Expr::FieldRef(FieldRef::new(name))
    }

    /// Visit this node and its children depth-first. Returning `false` from `f`
    /// skips the children of that node.
    pub fn walk<F>(&self, f: &mut F)
    where
        F: FnMut(&Expr) -> bool,
    {
        if !f(self) {
            return;
        }
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Mutable depth-first visit, parents before children.
    pub fn walk_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut Expr) -> bool,
    {
        if !f(self) {
            return;
        }
        match self {
            Expr::Paren(e) | Expr::Index(e) => e.walk_mut(f),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.walk_mut(f);
                rhs.walk_mut(f);
            }
            Expr::Colon { start, end } => {
                start.walk_mut(f);
                end.walk_mut(f);
            }
            Expr::Call(c) => {
                for a in c.args.iter_mut() {
                    a.walk_mut(f);
                }
                if let Some(p) = c.partition.as_mut() {
                    for e in p.exprs.iter_mut() {
                        e.walk_mut(f);
                    }
                }
                if let Some(w) = c.when_expr.as_mut() {
                    w.walk_mut(f);
                }
            }
            Expr::Case(c) => {
                if let Some(v) = c.value.as_mut() {
                    v.walk_mut(f);
                }
                for w in c.when_clauses.iter_mut() {
                    w.expr.walk_mut(f);
                    w.result.walk_mut(f);
                }
                if let Some(e) = c.else_clause.as_mut() {
                    e.walk_mut(f);
                }
            }
            Expr::Window(w) => {
                if let Some(flt) = w.filter.as_mut() {
                    flt.walk_mut(f);
                }
            }
            Expr::Wildcard(w) => {
                for r in w.replace.iter_mut() {
                    r.expr.walk_mut(f);
                }
            }
            Expr::ValueSet(vs) => {
                for e in vs.literal_exprs.iter_mut() {
                    e.walk_mut(f);
                }
                if let Some(a) = vs.array_expr.as_mut() {
                    a.walk_mut(f);
                }
            }
            Expr::Between(b) => {
                b.lower.walk_mut(f);
                b.higher.walk_mut(f);
            }
            Expr::Like(l) => l.expr.walk_mut(f),
            Expr::ColFuncField(c) => c.expr.walk_mut(f),
            _ => {}
        }
    }

    /// Direct children in evaluation order.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Paren(e) | Expr::Index(e) => vec![e.as_ref()],
            Expr::Binary { lhs, rhs, .. } => vec![lhs.as_ref(), rhs.as_ref()],
            Expr::Colon { start, end } => vec![start.as_ref(), end.as_ref()],
            Expr::Call(c) => {
                let mut v: Vec<&Expr> = c.args.iter().collect();
                if let Some(p) = &c.partition {
                    v.extend(p.exprs.iter());
                }
                if let Some(w) = &c.when_expr {
                    v.push(w.as_ref());
                }
                v
            }
            Expr::Case(c) => {
                let mut v = Vec::new();
                if let Some(val) = &c.value {
                    v.push(val.as_ref());
                }
                for w in &c.when_clauses {
                    v.push(&w.expr);
                    v.push(&w.result);
                }
                if let Some(e) = &c.else_clause {
                    v.push(e.as_ref());
                }
                v
            }
            Expr::Window(w) => w.filter.iter().map(|f| f.as_ref()).collect(),
            Expr::Wildcard(w) => w.replace.iter().map(|r| &r.expr).collect(),
            Expr::ValueSet(vs) => {
                let mut v: Vec<&Expr> = vs.literal_exprs.iter().collect();
                if let Some(a) = &vs.array_expr {
                    v.push(a.as_ref());
                }
                v
            }
            Expr::Between(b) => vec![b.lower.as_ref(), b.higher.as_ref()],
            Expr::Like(l) => vec![l.expr.as_ref()],
            Expr::ColFuncField(c) => vec![c.expr.as_ref()],
            _ => Vec::new(),
        }
    }

    /// Literal or expression statically known to produce a boolean.
    pub fn is_boolean(&self) -> bool {
        match self {
            Expr::Boolean(_) => true,
            Expr::Binary { op, .. } => op.is_predicate(),
            Expr::Paren(e) => e.is_boolean(),
            _ => false,
        }
    }

    pub fn is_numeric_literal(&self) -> bool {
        matches!(self, Expr::Integer(_) | Expr::Number(_))
    }

    pub fn is_string_literal(&self) -> bool {
        matches!(self, Expr::String(_))
    }

    pub fn is_time_literal(&self) -> bool {
        matches!(self, Expr::Time(_))
    }

    pub fn is_boolean_literal(&self) -> bool {
        matches!(self, Expr::Boolean(_))
    }

    pub fn is_float_literal(&self) -> bool {
        matches!(self, Expr::Number(_))
    }

    pub fn is_field_ref(&self) -> bool {
        matches!(self, Expr::FieldRef(_))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Integer(i) => write!(f, "{}", i),
            Expr::Number(n) => write!(f, "{}", n),
            Expr::String(s) => write!(f, "\"{}\"", s),
            Expr::Boolean(b) => write!(f, "{}", b),
            Expr::Time(t) => write!(f, "{}", t.keyword()),
            Expr::FieldRef(r) => match &r.stream {
                StreamName::Named(s) => write!(f, "{}.{}", s, r.name),
                _ => write!(f, "{}", r.name),
            },
            Expr::MetaRef(m) => match &m.stream {
                StreamName::Named(s) => write!(f, "{}.{}", s, m.name),
                _ => write!(f, "{}", m.name),
            },
            Expr::JsonFieldRef(n) => write!(f, "{}", n),
            Expr::Paren(e) => write!(f, "({})", e),
            Expr::Binary { op, lhs, rhs } => match op {
                BinaryOperator::Subset => write!(f, "{}{}", lhs, rhs),
                BinaryOperator::Arrow | BinaryOperator::Dot => write!(f, "{}{}{}", lhs, op, rhs),
                _ => write!(f, "{} {} {}", lhs, op, rhs),
            },
            Expr::Index(i) => write!(f, "[{}]", i),
            Expr::Colon { start, end } => {
                let end_s = match end.as_ref() {
                    Expr::Integer(i) if *i == Expr::OPEN_END => String::new(),
                    other => other.to_string(),
                };
                write!(f, "[{}:{}]", start, end_s)
            }
            Expr::Call(c) => {
                write!(f, "{}(", c.name)?;
                for (i, a) in c.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")
            }
            Expr::Case(c) => {
                write!(f, "CASE")?;
                if let Some(v) = &c.value {
                    write!(f, " {}", v)?;
                }
                for w in &c.when_clauses {
                    write!(f, " WHEN {} THEN {}", w.expr, w.result)?;
                }
                if let Some(e) = &c.else_clause {
                    write!(f, " ELSE {}", e)?;
                }
                write!(f, " END")
            }
            Expr::Window(w) => write!(f, "{:?}({})", w.window_type, w.length),
            Expr::Wildcard(w) => match &w.stream {
                Some(s) => write!(f, "{}.*", s),
                None => write!(f, "*"),
            },
            Expr::ValueSet(vs) => {
                if let Some(a) = &vs.array_expr {
                    return write!(f, "{}", a);
                }
                write!(f, "(")?;
                for (i, e) in vs.literal_exprs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, ")")
            }
            Expr::Between(b) => write!(f, "{} AND {}", b.lower, b.higher),
            Expr::Like(l) => write!(f, "{}", l.expr),
            Expr::ColFuncField(c) => write!(f, "{}", c.expr),
        }
    }
}

/*
 * Stream definition statements
 */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    Stream,
    Table,
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamType::Stream => write!(f, "stream"),
            StreamType::Table => write!(f, "table"),
        }
    }
}

/// Column types of a stream schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Unknown,
    Bigint,
    Float,
    Strings,
    Bytea,
    Datetime,
    Boolean,
    Array,
    Struct,
}

impl DataType {
    pub fn from_keyword(lit: &str) -> DataType {
        match lit.to_uppercase().as_str() {
            "BIGINT" => DataType::Bigint,
            "FLOAT" => DataType::Float,
            "STRING" => DataType::Strings,
            "BYTEA" => DataType::Bytea,
            "DATETIME" => DataType::Datetime,
            "BOOLEAN" => DataType::Boolean,
            "ARRAY" => DataType::Array,
            "STRUCT" => DataType::Struct,
            _ => DataType::Unknown,
        }
    }

    pub fn is_simple(&self) -> bool {
        matches!(
            self,
            DataType::Bigint
                | DataType::Float
                | DataType::Strings
                | DataType::Bytea
                | DataType::Datetime
                | DataType::Boolean
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::Unknown => "",
            DataType::Bigint => "bigint",
            DataType::Float => "float",
            DataType::Strings => "string",
            DataType::Bytea => "bytea",
            DataType::Datetime => "datetime",
            DataType::Boolean => "boolean",
            DataType::Array => "array",
            DataType::Struct => "struct",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Basic(DataType),
    /// Array of a simple type or of a struct
    Array(Box<FieldType>),
    Rec(Vec<StreamField>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamField {
    pub name: String,
    pub field_type: FieldType,
}

/// WITH options of CREATE STREAM / TABLE.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOptions {
    pub datasource: String,
    pub key: String,
    pub format: String,
    pub conf_key: String,
    pub type_: String,
    pub strict_validation: bool,
    pub timestamp: String,
    pub timestamp_format: String,
    pub retain_size: i64,
    pub shared: bool,
    pub schema_id: String,
    pub kind: String,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            datasource: String::new(),
            key: String::new(),
            format: String::new(),
            conf_key: String::new(),
            type_: String::new(),
            strict_validation: true,
            timestamp: String::new(),
            timestamp_format: String::new(),
            retain_size: 0,
            shared: false,
            schema_id: String::new(),
            kind: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamStmt {
    pub name: String,
    pub fields: Vec<StreamField>,
    pub options: StreamOptions,
    pub stream_type: StreamType,
}
