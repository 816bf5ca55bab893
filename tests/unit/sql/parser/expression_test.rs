// Tests for expression parsing: precedence, navigation, predicates and CASE
use crate::unit::common::*;
use rillstream::rill::sql::ast::{Call, FuncType};

fn field_expr(sql: &str) -> Expr {
    parse(sql).fields.remove(0).expr
}

fn where_expr(sql: &str) -> Expr {
    parse(sql).condition.expect("WHERE clause")
}

fn split(e: &Expr) -> (BinaryOperator, &Expr, &Expr) {
    match e {
        Expr::Binary { op, lhs, rhs } => (*op, lhs.as_ref(), rhs.as_ref()),
        other => panic!("Expected binary expression, got {:?}", other),
    }
}

fn field_name(e: &Expr) -> &str {
    match e {
        Expr::FieldRef(f) => &f.name,
        other => panic!("Expected field ref, got {:?}", other),
    }
}

#[test]
fn test_multiplication_binds_tighter_than_addition() {
    let e = field_expr("SELECT a + b * c FROM demo");
    let (op, lhs, rhs) = split(&e);
    assert_eq!(op, BinaryOperator::Add);
    assert_eq!(field_name(lhs), "a");
    let (op, _, _) = split(rhs);
    assert_eq!(op, BinaryOperator::Mul);
}

#[test]
fn test_equal_precedence_is_left_associative() {
    let e = field_expr("SELECT a - b - c FROM demo");
    let (op, lhs, rhs) = split(&e);
    assert_eq!(op, BinaryOperator::Sub);
    assert_eq!(field_name(rhs), "c");
    let (op, l, r) = split(lhs);
    assert_eq!(op, BinaryOperator::Sub);
    assert_eq!(field_name(l), "a");
    assert_eq!(field_name(r), "b");
}

#[test]
fn test_logical_precedence() {
    let e = where_expr("SELECT * FROM demo WHERE a = 1 OR b > 2 AND c < 3");
    let (op, lhs, rhs) = split(&e);
    assert_eq!(op, BinaryOperator::Or);
    assert_eq!(split(lhs).0, BinaryOperator::Eq);
    let (op, l, r) = split(rhs);
    assert_eq!(op, BinaryOperator::And);
    assert_eq!(split(l).0, BinaryOperator::Gt);
    assert_eq!(split(r).0, BinaryOperator::Lt);
}

#[test]
fn test_comparison_below_arithmetic() {
    let e = where_expr("SELECT * FROM demo WHERE a + 1 >= b * 2");
    let (op, lhs, rhs) = split(&e);
    assert_eq!(op, BinaryOperator::Gte);
    assert_eq!(split(lhs).0, BinaryOperator::Add);
    assert_eq!(split(rhs).0, BinaryOperator::Mul);
}

#[test]
fn test_parentheses_override_precedence() {
    let e = field_expr("SELECT (a + b) * c FROM demo");
    let (op, lhs, _) = split(&e);
    assert_eq!(op, BinaryOperator::Mul);
    assert!(matches!(lhs, Expr::Paren(_)));
}

#[test]
fn test_bitwise_operators() {
    let e = field_expr("SELECT a & b | c FROM demo");
    let (op, lhs, _) = split(&e);
    assert_eq!(op, BinaryOperator::BitOr);
    assert_eq!(split(lhs).0, BinaryOperator::BitAnd);
}

#[test]
fn test_literals() {
    let stmt = parse("SELECT 1, -2, 1.5, \"str\", true, false FROM demo");
    let exprs: Vec<&Expr> = stmt.fields.iter().map(|f| &f.expr).collect();
    assert_eq!(exprs[0], &Expr::Integer(1));
    assert_eq!(exprs[1], &Expr::Integer(-2));
    assert_eq!(exprs[2], &Expr::Number(1.5));
    assert_eq!(exprs[3], &Expr::String("str".to_string()));
    assert_eq!(exprs[4], &Expr::Boolean(true));
    assert_eq!(exprs[5], &Expr::Boolean(false));
}

#[test]
fn test_arrow_navigation_chains_left() {
    let e = field_expr("SELECT a->b->c FROM demo");
    let (op, lhs, rhs) = split(&e);
    assert_eq!(op, BinaryOperator::Arrow);
    assert_eq!(rhs, &Expr::JsonFieldRef("c".to_string()));
    let (op, l, r) = split(lhs);
    assert_eq!(op, BinaryOperator::Arrow);
    assert_eq!(field_name(l), "a");
    assert_eq!(r, &Expr::JsonFieldRef("b".to_string()));
}

#[test]
fn test_qualified_field_then_struct_dot() {
    let e = field_expr("SELECT demo.s.x FROM demo");
    let (op, lhs, rhs) = split(&e);
    assert_eq!(op, BinaryOperator::Dot);
    match lhs {
        Expr::FieldRef(f) => {
            assert_eq!(f.stream.as_table(), "demo");
            assert_eq!(f.name, "s");
        }
        other => panic!("Expected field ref, got {:?}", other),
    }
    assert_eq!(rhs, &Expr::JsonFieldRef("x".to_string()));
}

#[test]
fn test_bracket_index_and_slices() {
    let cases: Vec<(&str, Expr)> = vec![
        ("SELECT a[0] FROM demo", Expr::Index(Box::new(Expr::Integer(0)))),
        ("SELECT a[-1] FROM demo", Expr::Index(Box::new(Expr::Integer(-1)))),
        (
            "SELECT a[1:3] FROM demo",
            Expr::Colon {
                start: Box::new(Expr::Integer(1)),
                end: Box::new(Expr::Integer(3)),
            },
        ),
        (
            "SELECT a[:2] FROM demo",
            Expr::Colon {
                start: Box::new(Expr::Integer(0)),
                end: Box::new(Expr::Integer(2)),
            },
        ),
        (
            "SELECT a[2:] FROM demo",
            Expr::Colon {
                start: Box::new(Expr::Integer(2)),
                end: Box::new(Expr::Integer(Expr::OPEN_END)),
            },
        ),
        (
            "SELECT a[:] FROM demo",
            Expr::Colon {
                start: Box::new(Expr::Integer(0)),
                end: Box::new(Expr::Integer(Expr::OPEN_END)),
            },
        ),
        (
            "SELECT a[0:-1] FROM demo",
            Expr::Colon {
                start: Box::new(Expr::Integer(0)),
                end: Box::new(Expr::Integer(-1)),
            },
        ),
    ];
    for (sql, expected) in cases {
        let e = field_expr(sql);
        let (op, lhs, rhs) = split(&e);
        assert_eq!(op, BinaryOperator::Subset, "{}", sql);
        assert_eq!(field_name(lhs), "a", "{}", sql);
        assert_eq!(rhs, &expected, "{}", sql);
    }
}

#[test]
fn test_bracket_with_expression_index() {
    let e = field_expr("SELECT a[b + 1] FROM demo");
    let (_, _, rhs) = split(&e);
    match rhs {
        Expr::Index(i) => assert_eq!(split(i).0, BinaryOperator::Add),
        other => panic!("Expected index, got {:?}", other),
    }
}

#[test]
fn test_in_and_not_in() {
    let e = where_expr("SELECT * FROM demo WHERE a IN (1, 2, 3)");
    let (op, _, rhs) = split(&e);
    assert_eq!(op, BinaryOperator::In);
    match rhs {
        Expr::ValueSet(set) => {
            assert_eq!(set.literal_exprs.len(), 3);
            assert!(set.array_expr.is_none());
        }
        other => panic!("Expected value set, got {:?}", other),
    }

    let e = where_expr("SELECT * FROM demo WHERE a NOT IN arr");
    let (op, _, rhs) = split(&e);
    assert_eq!(op, BinaryOperator::NotIn);
    match rhs {
        Expr::ValueSet(set) => assert!(set.array_expr.is_some()),
        other => panic!("Expected value set, got {:?}", other),
    }
}

#[test]
fn test_between_bounds_stop_at_and() {
    let e = where_expr("SELECT * FROM demo WHERE a BETWEEN 1 AND 5 + 1 AND b = 2");
    let (op, lhs, rhs) = split(&e);
    assert_eq!(op, BinaryOperator::And);
    assert_eq!(split(rhs).0, BinaryOperator::Eq);
    let (op, _, bounds) = split(lhs);
    assert_eq!(op, BinaryOperator::Between);
    match bounds {
        Expr::Between(b) => {
            assert_eq!(b.lower.as_ref(), &Expr::Integer(1));
            assert_eq!(split(&b.higher).0, BinaryOperator::Add);
        }
        other => panic!("Expected between bounds, got {:?}", other),
    }
}

#[test]
fn test_like_pattern_precompiled() {
    let e = where_expr("SELECT * FROM demo WHERE name NOT LIKE \"a_c%\"");
    let (op, _, rhs) = split(&e);
    assert_eq!(op, BinaryOperator::NotLike);
    match rhs {
        Expr::Like(like) => {
            let re = like.pattern.as_ref().expect("compiled pattern");
            assert!(re.is_match("abcdef"));
            assert!(!re.is_match("xbc"));
        }
        other => panic!("Expected like pattern, got {:?}", other),
    }
}

#[test]
fn test_not_requires_set_predicate() {
    let msg = parse_err("SELECT * FROM demo WHERE a NOT 1");
    assert_eq!(msg, "found \"1\", expected IN, BETWEEN or LIKE after NOT.");
}

#[test]
fn test_case_expressions() {
    let e = field_expr("SELECT CASE WHEN a > 1 THEN \"hi\" ELSE \"lo\" END AS c FROM demo");
    match e {
        Expr::Case(case) => {
            assert!(case.value.is_none());
            assert_eq!(case.when_clauses.len(), 1);
            assert!(case.else_clause.is_some());
        }
        other => panic!("Expected case, got {:?}", other),
    }

    let e = field_expr("SELECT CASE a WHEN 1 THEN \"one\" WHEN 2 THEN \"two\" END FROM demo");
    match e {
        Expr::Case(case) => {
            assert!(case.value.is_some());
            assert_eq!(case.when_clauses.len(), 2);
            assert!(case.else_clause.is_none());
        }
        other => panic!("Expected case, got {:?}", other),
    }
}

#[test]
fn test_case_errors() {
    assert_eq!(
        parse_err("SELECT CASE WHEN a THEN 1 END FROM demo"),
        "invalid CASE expression, WHEN expression must be a bool condition"
    );
    assert_eq!(
        parse_err("SELECT CASE a ELSE 1 END FROM demo"),
        "invalid CASE expression, WHEN expected before ELSE"
    );
    assert_eq!(
        parse_err("SELECT CASE WHEN a > 1 1 END FROM demo"),
        "invalid CASE expression, THEN expected after WHEN"
    );
}

#[test]
fn test_bare_asterisk_outside_call_rejected() {
    assert_eq!(
        parse_err("SELECT a FROM demo WHERE * > 1"),
        "unsupported * expression, it must be used inside fields or function parameters."
    );
}

#[test]
fn test_meta_arguments_are_meta_refs() {
    let e = field_expr("SELECT meta(topic) FROM demo");
    match e {
        Expr::Call(Call { name, args, .. }) => {
            assert_eq!(name, "meta");
            assert!(matches!(&args[0], Expr::MetaRef(m) if m.name == "topic"));
        }
        other => panic!("Expected call, got {:?}", other),
    }

    let e = field_expr("SELECT meta(*) FROM demo");
    match e {
        Expr::Call(Call { args, .. }) => {
            assert!(matches!(&args[0], Expr::MetaRef(m) if m.name == "*"));
        }
        other => panic!("Expected call, got {:?}", other),
    }

    // nested calls restore the plain field context
    let e = field_expr("SELECT abs(meta(n)) + n FROM demo");
    let (_, _, rhs) = split(&e);
    assert!(matches!(rhs, Expr::FieldRef(_)));
}

#[test]
fn test_meta_rejects_non_meta_argument() {
    assert!(StreamingSqlParser::new()
        .parse("SELECT meta(1) FROM demo")
        .is_err());
}

#[test]
fn test_analytic_over_clause() {
    let e = field_expr("SELECT lag(a) OVER (PARTITION BY b, c WHEN a > 1) FROM demo");
    match e {
        Expr::Call(call) => {
            assert_eq!(call.func_type, FuncType::Analytic);
            assert_eq!(call.partition.map(|p| p.exprs.len()), Some(2));
            assert!(call.when_expr.is_some());
            assert_eq!(call.cached_field.as_deref(), Some("$$a_lag_0"));
        }
        other => panic!("Expected call, got {:?}", other),
    }
}

#[test]
fn test_over_after_non_analytic_rejected() {
    assert_eq!(
        parse_err("SELECT abs(a) OVER (PARTITION BY b) FROM demo"),
        "Found OVER after non analytic function abs"
    );
}

#[test]
fn test_cols_function_only_in_select() {
    let stmt = parse("SELECT changed_cols(\"c_\", true, a, b) FROM demo");
    match &stmt.fields[0].expr {
        Expr::Call(call) => {
            assert_eq!(call.func_type, FuncType::Cols);
            assert!(call.args.iter().all(|a| matches!(a, Expr::ColFuncField(_))));
        }
        other => panic!("Expected call, got {:?}", other),
    }

    assert_eq!(
        parse_err("SELECT a FROM demo WHERE changed_cols(\"c_\", true, a) = 1"),
        "function changed_cols can only be used inside the select clause"
    );
}

#[test]
fn test_deduplicate_gets_implicit_row_argument() {
    let e = field_expr("SELECT deduplicate(id, true) FROM demo");
    match e {
        Expr::Call(call) => {
            assert_eq!(call.args.len(), 3);
            assert!(matches!(call.args[0], Expr::Wildcard(_)));
        }
        other => panic!("Expected call, got {:?}", other),
    }
}

#[test]
fn test_display_round_trip_of_simple_expression() {
    let e = field_expr("SELECT a + abs(b) FROM demo");
    assert_eq!(e.to_string(), "a + abs(b)");
}
