// Tests for select alias binding in fields, HAVING and ORDER BY
use crate::unit::common::*;

fn find_alias_ref(e: &Expr) -> Option<&FieldRef> {
    if let Expr::FieldRef(f) = e {
        if f.is_alias() {
            return Some(f);
        }
    }
    e.children().into_iter().find_map(find_alias_ref)
}

fn alias_ref(e: &Expr) -> &FieldRef {
    find_alias_ref(e).unwrap_or_else(|| panic!("no alias reference in {:?}", e))
}

#[test]
fn test_alias_reference_in_later_field() {
    let stmt = parse("SELECT a + 1 AS x, x * 2 FROM demo");

    let r = alias_ref(&stmt.fields[1].expr);
    assert_eq!(r.name, "x");
    assert_eq!(r.stream, StreamName::Alias);
    let alias = r.alias.as_ref().expect("alias payload");
    assert!(matches!(
        alias.expression.as_ref(),
        Expr::Binary { op: BinaryOperator::Add, .. }
    ));
    assert!(!alias.is_aggregate);
}

#[test]
fn test_alias_inside_another_alias_rejected() {
    assert_eq!(
        parse_err("SELECT a + 1 AS x, x * 2 AS y FROM demo"),
        "cannot use alias x inside another alias"
    );
}

#[test]
fn test_rename_of_same_column_is_not_an_alias() {
    let stmt = parse("SELECT a AS a, a + 1 FROM demo");
    match &stmt.fields[1].expr {
        Expr::Binary { lhs, .. } => match lhs.as_ref() {
            Expr::FieldRef(f) => assert!(f.is_column()),
            other => panic!("Expected field ref, got {:?}", other),
        },
        other => panic!("Expected binary, got {:?}", other),
    }
}

#[test]
fn test_having_binds_aggregate_alias() {
    let stmt = parse(
        "SELECT count(*) AS c FROM demo GROUP BY TUMBLINGWINDOW(ss, 10) HAVING c > 1",
    );
    let having = stmt.having.as_ref().expect("HAVING");
    let r = alias_ref(having);
    assert_eq!(r.name, "c");
    assert!(r.alias.as_ref().unwrap().is_aggregate);
    assert!(rillstream::rill::sql::parser::is_aggregate(having));
}

#[test]
fn test_order_by_binds_alias() {
    let stmt = parse("SELECT a + 1 AS x FROM demo ORDER BY x DESC");
    let r = alias_ref(&stmt.sort_fields[0].field_expr);
    assert_eq!(r.name, "x");
    assert!(!stmt.sort_fields[0].ascending);
}

#[test]
fn test_where_keeps_column_semantics() {
    let stmt = parse("SELECT a + 1 AS x FROM demo WHERE x > 1");
    match stmt.condition.as_ref() {
        Some(Expr::Binary { lhs, .. }) => match lhs.as_ref() {
            Expr::FieldRef(f) => {
                assert!(f.is_column());
                assert!(f.alias.is_none());
            }
            other => panic!("Expected field ref, got {:?}", other),
        },
        other => panic!("Expected comparison, got {:?}", other),
    }
}

#[test]
fn test_alias_sources_recorded() {
    let stmt = parse("SELECT demo.a + other.b AS s, s FROM demo INNER JOIN other ON demo.id = other.id");
    let r = alias_ref(&stmt.fields[1].expr);
    let sources = &r.alias.as_ref().unwrap().ref_sources;
    assert_eq!(sources, &vec!["demo".to_string(), "other".to_string()]);
}
