//! Post-parse semantic checks and name binding for SELECT statements.

use crate::rill::config::EngineConfig;
use crate::rill::sql::ast::{
    AliasRef, Expr, FieldRef, FuncType, SelectStatement, StreamName,
};
use crate::rill::sql::error::{SqlError, SqlResult};
use std::collections::HashMap;

/// True when the expression calls an aggregate function, directly or through an alias.
pub fn is_aggregate(expr: &Expr) -> bool {
    let mut found = false;
    expr.walk(&mut |e| {
        if found {
            return false;
        }
        match e {
            Expr::Call(c) if c.func_type == FuncType::Aggregate => {
                found = true;
                false
            }
            Expr::FieldRef(f) => {
                if f.alias.as_ref().map(|a| a.is_aggregate).unwrap_or(false) {
                    found = true;
                }
                false
            }
            _ => true,
        }
    });
    found
}

fn contains_window(expr: &Expr) -> bool {
    let mut found = false;
    expr.walk(&mut |e| {
        if matches!(e, Expr::Window(_)) {
            found = true;
        }
        !found
    });
    found
}

/// Reject aggregates in WHERE and GROUP BY, and windows outside GROUP BY.
pub fn validate(stmt: &SelectStatement, config: &EngineConfig) -> SqlResult<()> {
    if let Some(cond) = &stmt.condition {
        if !config.allow_aggregate_in_where && is_aggregate(cond) {
            return Err(SqlError::validation_error(
                "Not allowed to call aggregate functions in WHERE clause.",
            ));
        }
        if contains_window(cond) {
            return Err(window_misplaced());
        }
    }
    for d in &stmt.dimensions {
        if is_aggregate(&d.expr) {
            return Err(SqlError::validation_error(
                "Not allowed to call aggregate functions in GROUP BY clause.",
            ));
        }
        if !matches!(d.expr, Expr::Window(_)) && contains_window(&d.expr) {
            return Err(window_misplaced());
        }
    }
    let mut windows = stmt
        .dimensions
        .iter()
        .filter(|d| matches!(d.expr, Expr::Window(_)));
    if windows.nth(1).is_some() {
        return Err(SqlError::validation_error(
            "Only one window function is allowed in GROUP BY.",
        ));
    }
    let misplaced = stmt.fields.iter().any(|f| contains_window(&f.expr))
        || stmt.having.as_ref().map(contains_window).unwrap_or(false)
        || stmt
            .joins
            .iter()
            .any(|j| j.expr.as_ref().map(contains_window).unwrap_or(false));
    if misplaced {
        return Err(window_misplaced());
    }
    Ok(())
}

fn window_misplaced() -> SqlError {
    SqlError::validation_error("Window functions can only be used inside the GROUP BY clause.")
}

/// Bind source aliases and select aliases.
///
/// - Qualifiers naming a source or join alias are rewritten to the real stream name.
/// - With joins, an unaliased qualified select field `t.a` is aliased `t.a`.
/// - References to a select alias in other select fields, HAVING and ORDER BY become alias
///   references carrying the aliased expression. WHERE keeps column semantics.
pub fn bind_statement(stmt: &mut SelectStatement) -> SqlResult<()> {
    if !stmt.joins.is_empty() {
        for field in stmt.fields.iter_mut() {
            if field.alias.is_some() {
                continue;
            }
            if let Expr::FieldRef(FieldRef {
                stream: StreamName::Named(s),
                name,
                ..
            }) = &field.expr
            {
                field.alias = Some(format!("{}.{}", s, name));
            }
        }
    }

    let mut sources: HashMap<String, String> = HashMap::new();
    for t in &stmt.sources {
        if let Some(a) = &t.alias {
            sources.insert(a.clone(), t.name.clone());
        }
    }
    for j in &stmt.joins {
        if let Some(a) = &j.alias {
            sources.insert(a.clone(), j.name.clone());
        }
    }
    if !sources.is_empty() {
        let mut rename = |e: &mut Expr| {
            rename_stream(e, &sources);
            true
        };
        for f in stmt.fields.iter_mut() {
            f.expr.walk_mut(&mut rename);
        }
        for j in stmt.joins.iter_mut() {
            if let Some(e) = j.expr.as_mut() {
                e.walk_mut(&mut rename);
            }
        }
        if let Some(e) = stmt.condition.as_mut() {
            e.walk_mut(&mut rename);
        }
        for d in stmt.dimensions.iter_mut() {
            d.expr.walk_mut(&mut rename);
        }
        if let Some(e) = stmt.having.as_mut() {
            e.walk_mut(&mut rename);
        }
        for s in stmt.sort_fields.iter_mut() {
            if let Some(real) = s.stream.as_ref().and_then(|st| sources.get(st)) {
                s.stream = Some(real.clone());
            }
            s.field_expr.walk_mut(&mut rename);
        }
    }

    bind_select_aliases(stmt)
}

fn rename_stream(e: &mut Expr, sources: &HashMap<String, String>) {
    let stream = match e {
        Expr::FieldRef(f) => &mut f.stream,
        Expr::MetaRef(m) => &mut m.stream,
        Expr::Wildcard(w) => {
            if let Some(real) = w.stream.as_ref().and_then(|s| sources.get(s)) {
                w.stream = Some(real.clone());
            }
            return;
        }
        _ => return,
    };
    if let StreamName::Named(s) = stream {
        if let Some(real) = sources.get(s.as_str()) {
            *s = real.clone();
        }
    }
}

fn bind_select_aliases(stmt: &mut SelectStatement) -> SqlResult<()> {
    let mut aliases: HashMap<String, AliasRef> = HashMap::new();
    for f in &stmt.fields {
        if let Some(a) = &f.alias {
            // a bare rename of the same column never needs an alias ref
            if matches!(&f.expr, Expr::FieldRef(r) if &r.name == a) {
                continue;
            }
            aliases.insert(
                a.clone(),
                AliasRef {
                    expression: Box::new(f.expr.clone()),
                    ref_sources: ref_sources(&f.expr),
                    is_aggregate: is_aggregate(&f.expr),
                },
            );
        }
    }
    if aliases.is_empty() {
        return Ok(());
    }

    for f in stmt.fields.iter_mut() {
        let own = f.alias.clone();
        let mut nested: Option<String> = None;
        f.expr.walk_mut(&mut |e| {
            if let Expr::FieldRef(r) = e {
                if r.stream == StreamName::Default && Some(&r.name) != own.as_ref() {
                    if let Some(alias) = aliases.get(&r.name) {
                        if own.is_some() {
                            nested.get_or_insert_with(|| r.name.clone());
                        } else {
                            to_alias_ref(r, alias);
                        }
                    }
                }
            }
            true
        });
        if let Some(name) = nested {
            return Err(SqlError::validation_error(format!(
                "cannot use alias {} inside another alias",
                name
            )));
        }
    }

    let mut bind = |e: &mut Expr| {
        if let Expr::FieldRef(r) = e {
            if r.stream == StreamName::Default {
                if let Some(alias) = aliases.get(&r.name) {
                    to_alias_ref(r, alias);
                }
            }
        }
        true
    };
    if let Some(e) = stmt.having.as_mut() {
        e.walk_mut(&mut bind);
    }
    for s in stmt.sort_fields.iter_mut() {
        if s.stream.is_none() {
            s.field_expr.walk_mut(&mut bind);
        }
    }
    Ok(())
}

fn to_alias_ref(r: &mut FieldRef, alias: &AliasRef) {
    r.stream = StreamName::Alias;
    r.alias = Some(alias.clone());
}

fn ref_sources(expr: &Expr) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    expr.walk(&mut |e| {
        if let Expr::FieldRef(FieldRef {
            stream: StreamName::Named(s),
            ..
        }) = e
        {
            if !out.contains(s) {
                out.push(s.clone());
            }
        }
        true
    });
    out
}
