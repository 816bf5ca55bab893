// ORDER BY over windows and grouped results
use crate::unit::common::*;
use rillstream::rill::sql::execution::collection::{Collection, GroupedTuplesSet, WindowTuples};
use rillstream::rill::sql::execution::row::GroupedTuples;
use rillstream::rill::sql::execution::sorter::MultiSorter;

fn functions() -> FunctionValuer {
    FunctionValuer::with_resolver(Arc::new(FunctionResolver::new()))
}

fn window(rows: Vec<serde_json::Value>) -> WindowTuples {
    let content: Vec<Box<dyn TupleRow>> = rows
        .into_iter()
        .enumerate()
        .map(|(i, v)| Box::new(tuple_at("demo", v, i as i64)) as Box<dyn TupleRow>)
        .collect();
    WindowTuples::new(content, None)
}

fn column(data: &dyn Collection, name: &str) -> Vec<FieldValue> {
    data.to_row_maps()
        .into_iter()
        .map(|m| m.get(name).cloned().unwrap_or(FieldValue::Null))
        .collect()
}

fn sort(sql: &str, data: &mut dyn Collection) -> Result<(), SqlError> {
    let stmt = parse(sql);
    MultiSorter::new(stmt.sort_fields).sort(data, &functions())
}

#[test]
fn test_order_by_columns() {
    let mut w = window(vec![
        json!({"id": 1, "name": "b", "t": 2}),
        json!({"id": 2, "name": "a", "t": 2}),
        json!({"id": 3, "name": "c", "t": 1.5}),
        json!({"id": 4, "name": "d"}),
    ]);
    sort("SELECT * FROM demo ORDER BY t DESC, name", &mut w).unwrap();
    assert_eq!(
        column(&w, "id"),
        vec![2i64, 1, 3, 4].into_iter().map(FieldValue::Integer).collect::<Vec<_>>()
    );
}

#[test]
fn test_order_by_alias_then_columns() {
    let mut w = window(vec![
        json!({"id": 1, "a": 3, "b": 1}),
        json!({"id": 2, "a": 1, "b": 1}),
        json!({"id": 3, "a": 2, "b": 5}),
    ]);
    sort("SELECT a + b AS s FROM demo ORDER BY s", &mut w).unwrap();
    assert_eq!(
        column(&w, "id"),
        vec![2i64, 1, 3].into_iter().map(FieldValue::Integer).collect::<Vec<_>>()
    );
    // the alias value computed for sorting is kept on each row
    assert_eq!(w.content[2].alias_value("s"), Some(FieldValue::Integer(7)));

    sort("SELECT * FROM demo ORDER BY b DESC, id", &mut w).unwrap();
    assert_eq!(
        column(&w, "id"),
        vec![3i64, 1, 2].into_iter().map(FieldValue::Integer).collect::<Vec<_>>()
    );
}

#[test]
fn test_order_groups_by_aggregate_alias() {
    let stmt = parse(
        "SELECT device, count(*) AS c FROM demo GROUP BY device, TUMBLINGWINDOW(ss, 10) ORDER BY c DESC",
    );
    let fv = functions();
    let group = |device: &str, n: usize| {
        let members: Vec<Box<dyn TupleRow>> = (0..n)
            .map(|_| Box::new(demo_tuple(json!({"device": device}))) as Box<dyn TupleRow>)
            .collect();
        GroupedTuples::new(members, None)
    };
    let mut set = GroupedTuplesSet::new(vec![group("a", 1), group("b", 3), group("c", 2)], None);

    // projection runs first and memoises the aggregate alias on every group
    set.group_range(&mut |_, g| {
        eval_group(&stmt.fields[1].expr, g, &fv);
        Ok(true)
    })
    .unwrap();
    MultiSorter::new(stmt.sort_fields.clone()).sort(&mut set, &fv).unwrap();
    assert_eq!(
        column(&set, "device"),
        vec![FieldValue::from("b"), FieldValue::from("c"), FieldValue::from("a")]
    );
}

#[test]
fn test_incompatible_key_types() {
    let mut w = window(vec![json!({"k": 1}), json!({"k": "one"})]);
    let err = sort("SELECT * FROM demo ORDER BY k", &mut w).unwrap_err();
    assert_eq!(err, SqlError::type_error("int64", "string", None));

    let mut w = window(vec![json!({"k": [1]}), json!({"k": [0]})]);
    assert!(sort("SELECT * FROM demo ORDER BY k", &mut w).is_err());
}

#[test]
fn test_key_evaluation_error_stops_sort() {
    let mut w = window(vec![json!({"a": 1, "b": 0}), json!({"a": 2, "b": 1})]);
    let err = sort("SELECT a / b AS r FROM demo ORDER BY r", &mut w).unwrap_err();
    assert_eq!(err.message(), "divided by zero");
    // rows keep their original order
    assert_eq!(column(&w, "a"), vec![FieldValue::Integer(1), FieldValue::Integer(2)]);
}
