// Aggregate projections over windows and groups
use crate::unit::common::*;
use rillstream::rill::sql::execution::collection::{
    Collection, GroupedTuplesSet, WindowRange, WindowTuples,
};
use rillstream::rill::sql::execution::row::GroupedTuples;

fn functions() -> FunctionValuer {
    FunctionValuer::with_resolver(Arc::new(FunctionResolver::new()))
}

fn readings() -> Vec<Box<dyn TupleRow>> {
    vec![
        Box::new(tuple_at("demo", json!({"device": "a", "t": 10, "h": 0.5}), 1_000)),
        Box::new(tuple_at("demo", json!({"device": "b", "t": 20, "h": 1.5}), 2_000)),
        Box::new(tuple_at("demo", json!({"device": "a", "t": 30}), 3_000)),
    ]
}

fn window() -> WindowTuples {
    WindowTuples::new(readings(), Some(WindowRange::new(0, 10_000, 10_000)))
}

#[test]
fn test_count_over_tumbling_window() {
    let stmt = parse("SELECT count(*) AS c FROM demo GROUP BY TUMBLINGWINDOW(ss, 10)");
    let fv = functions();
    let w = WindowTuples::new(
        vec![
            Box::new(demo_tuple(json!({"a": 1}))),
            Box::new(demo_tuple(json!({"a": 2}))),
        ],
        Some(WindowRange::new(0, 10_000, 10_000)),
    );
    assert_eq!(eval_group(&stmt.fields[0].expr, &w, &fv), FieldValue::Integer(2));
}

#[test]
fn test_numeric_aggregates() {
    let stmt = parse(
        "SELECT avg(t), sum(t), max(t), min(t), count(h), avg(h), collect(device) \
         FROM demo GROUP BY TUMBLINGWINDOW(ss, 10)",
    );
    let fv = functions();
    let w = window();
    let values: Vec<FieldValue> = stmt
        .fields
        .iter()
        .map(|f| eval_group(&f.expr, &w, &fv))
        .collect();
    assert_eq!(values[0], FieldValue::Integer(20));
    assert_eq!(values[1], FieldValue::Integer(60));
    assert_eq!(values[2], FieldValue::Integer(30));
    assert_eq!(values[3], FieldValue::Integer(10));
    // the third row has no humidity
    assert_eq!(values[4], FieldValue::Integer(2));
    assert_eq!(values[5], FieldValue::Float(1.0));
    assert_eq!(
        values[6],
        FieldValue::Array(vec!["a".into(), "b".into(), "a".into()])
    );
}

#[test]
fn test_aggregate_of_expression() {
    let stmt = parse("SELECT sum(t * 2) + 1, max(t) - min(t) FROM demo GROUP BY TUMBLINGWINDOW(ss, 10)");
    let fv = functions();
    let w = window();
    assert_eq!(eval_group(&stmt.fields[0].expr, &w, &fv), FieldValue::Integer(121));
    assert_eq!(eval_group(&stmt.fields[1].expr, &w, &fv), FieldValue::Integer(20));
}

#[test]
fn test_window_bounds_and_scalar_fields() {
    let stmt = parse(
        "SELECT window_start(), window_end(), device, count(*) \
         FROM demo GROUP BY TUMBLINGWINDOW(ss, 10)",
    );
    let fv = functions();
    let w = window();
    assert_eq!(eval_group(&stmt.fields[0].expr, &w, &fv), FieldValue::Integer(0));
    assert_eq!(eval_group(&stmt.fields[1].expr, &w, &fv), FieldValue::Integer(10_000));
    // non-aggregate fields read the first row
    assert_eq!(eval_group(&stmt.fields[2].expr, &w, &fv), FieldValue::from("a"));
    assert_eq!(eval_group(&stmt.fields[3].expr, &w, &fv), FieldValue::Integer(3));
}

#[test]
fn test_grouped_tuples_per_key() {
    let stmt = parse("SELECT device, sum(t) AS total FROM demo GROUP BY device, TUMBLINGWINDOW(ss, 10)");
    let fv = functions();
    let range = Some(WindowRange::new(0, 10_000, 10_000));

    let mut by_device: Vec<(String, Vec<Box<dyn TupleRow>>)> = Vec::new();
    for t in readings() {
        let key = t.value("device", "").map(|v| v.to_string()).unwrap_or_default();
        match by_device.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(t),
            None => by_device.push((key, vec![t])),
        }
    }
    let groups: Vec<GroupedTuples> = by_device
        .into_iter()
        .map(|(_, members)| GroupedTuples::new(members, range))
        .collect();
    let mut set = GroupedTuplesSet::new(groups, range);

    let mut totals = Vec::new();
    set.group_range(&mut |_, group| {
        totals.push((
            eval_group(&stmt.fields[0].expr, group, &fv),
            eval_group(&stmt.fields[1].expr, group, &fv),
        ));
        Ok(true)
    })
    .unwrap();
    assert_eq!(
        totals,
        vec![
            (FieldValue::from("a"), FieldValue::Integer(40)),
            (FieldValue::from("b"), FieldValue::Integer(20)),
        ]
    );

    // project the results onto each group and read them back as maps
    set.range_set(&mut |i, row| {
        row.set("total", totals[i].1.clone());
        Ok(true)
    })
    .unwrap();
    let maps = set.to_agg_maps();
    assert_eq!(maps.len(), 2);
    assert_eq!(maps[0]["total"], FieldValue::Integer(40));
    assert_eq!(maps[1]["device"], FieldValue::from("b"));
}

#[test]
fn test_having_with_aggregate_alias() {
    let stmt = parse(
        "SELECT device, count(*) AS c FROM demo GROUP BY device, TUMBLINGWINDOW(ss, 10) HAVING c > 1",
    );
    let fv = functions();
    let having = stmt.having.as_ref().unwrap();

    let mut members = readings();
    let b = members.remove(1);
    let group_a = GroupedTuples::new(members, None);
    let group_b = GroupedTuples::new(vec![b], None);

    assert_eq!(eval_group(having, &group_a, &fv), FieldValue::Boolean(true));
    assert_eq!(eval_group(having, &group_b, &fv), FieldValue::Boolean(false));
    // the alias value is memoised on the group
    assert_eq!(group_a.alias_value("c"), Some(FieldValue::Integer(2)));
}

#[test]
fn test_empty_window_aggregates() {
    let stmt = parse("SELECT count(*), sum(t), max(t) FROM demo GROUP BY TUMBLINGWINDOW(ss, 10)");
    let fv = functions();
    let w = WindowTuples::new(Vec::new(), None);
    assert_eq!(eval_group(&stmt.fields[0].expr, &w, &fv), FieldValue::Integer(0));
    assert_eq!(eval_group(&stmt.fields[1].expr, &w, &fv), FieldValue::Integer(0));
    assert_eq!(
        eval_group(&stmt.fields[2].expr, &w, &fv),
        FieldValue::error("run max function error: empty data")
    );
    assert!(w.to_agg_maps().is_empty());
}

#[test]
fn test_sum_over_all_null_column() {
    let stmt = parse("SELECT sum(a), avg(a), count(a) FROM demo GROUP BY TUMBLINGWINDOW(ss, 10)");
    let fv = functions();
    let w = WindowTuples::new(
        vec![
            Box::new(demo_tuple(json!({"b": 1}))),
            Box::new(demo_tuple(json!({"a": null}))),
        ],
        None,
    );
    assert_eq!(eval_group(&stmt.fields[0].expr, &w, &fv), FieldValue::Null);
    assert_eq!(eval_group(&stmt.fields[1].expr, &w, &fv), FieldValue::Integer(0));
    assert_eq!(eval_group(&stmt.fields[2].expr, &w, &fv), FieldValue::Integer(0));
}
