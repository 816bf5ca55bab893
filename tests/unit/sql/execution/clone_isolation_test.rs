// Window clones handed to concurrent branches must not share computed state
use crate::unit::common::*;
use rillstream::rill::sql::execution::collection::{Collection, WindowRange, WindowTuples};

fn window() -> WindowTuples {
    WindowTuples::new(
        vec![
            Box::new(tuple_at("demo", json!({"t": 10}), 1_000)),
            Box::new(tuple_at("demo", json!({"t": 20}), 2_000)),
            Box::new(tuple_at("demo", json!({"t": 40}), 3_000)),
        ],
        Some(WindowRange::new(0, 10_000, 10_000)),
    )
}

/// Evaluate the single projection of `sql` over `w` and store it on the clone under `col`.
fn project(mut w: WindowTuples, sql: &str, col: &str) -> WindowTuples {
    let stmt = parse(sql);
    let fv = FunctionValuer::with_resolver(Arc::new(FunctionResolver::new()));
    let v = eval_group(&stmt.fields[0].expr, &w, &fv);
    w.set(col, v);
    w.range_set(&mut |i, row| {
        row.set("branch", FieldValue::from(col));
        row.set("idx", FieldValue::Integer(i as i64));
        Ok(true)
    })
    .unwrap();
    w
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_branches_do_not_see_each_other() {
    let original = window();

    let left = original.clone();
    let right = original.clone();
    let sum_branch = tokio::task::spawn_blocking(move || {
        project(left, "SELECT sum(t) AS total FROM demo GROUP BY TUMBLINGWINDOW(ss, 10)", "total")
    });
    let avg_branch = tokio::task::spawn_blocking(move || {
        project(right, "SELECT avg(t) AS mean FROM demo GROUP BY TUMBLINGWINDOW(ss, 10)", "mean")
    });
    let summed = sum_branch.await.unwrap();
    let averaged = avg_branch.await.unwrap();

    assert_eq!(summed.value("total", ""), Some(FieldValue::Integer(70)));
    assert_eq!(summed.value("mean", ""), None);
    assert_eq!(averaged.value("mean", ""), Some(FieldValue::Integer(23)));
    assert_eq!(averaged.value("total", ""), None);

    let left_rows = summed.to_row_maps();
    let right_rows = averaged.to_row_maps();
    assert_eq!(left_rows[2]["branch"], FieldValue::from("total"));
    assert_eq!(right_rows[2]["branch"], FieldValue::from("mean"));

    // the source window is untouched
    assert_eq!(original.value("total", ""), None);
    assert_eq!(original.value("mean", ""), None);
    for row in original.to_row_maps() {
        assert!(!row.contains_key("branch"));
        assert!(!row.contains_key("idx"));
    }
    assert_eq!(original.len(), 3);
}

#[tokio::test]
async fn test_boxed_collection_clone_is_independent() {
    let original: Box<dyn Collection> = Box::new(window());
    let mut copy = original.clone_collection();

    let handle = tokio::spawn(async move {
        copy.filter(&[2, 0]);
        copy.range_set(&mut |_, row| {
            row.set("t", FieldValue::Integer(0));
            Ok(true)
        })
        .unwrap();
        copy
    });
    let copy = handle.await.unwrap();

    assert_eq!(copy.len(), 2);
    assert!(copy
        .to_row_maps()
        .iter()
        .all(|m| m["t"] == FieldValue::Integer(0)));

    let maps = original.to_row_maps();
    assert_eq!(maps.len(), 3);
    assert_eq!(maps[0]["t"], FieldValue::Integer(10));
    assert_eq!(maps[2]["t"], FieldValue::Integer(40));
}

#[test]
fn test_shared_message_is_not_copied_on_clone() {
    let t = demo_tuple(json!({"a": 1}));
    let copy = t.clone();
    assert!(Arc::ptr_eq(&t.message, &copy.message));
    copy.set("a", FieldValue::Integer(2));
    assert_eq!(t.value("a", ""), Some(FieldValue::Integer(1)));
    assert_eq!(copy.value("a", ""), Some(FieldValue::Integer(2)));
}
