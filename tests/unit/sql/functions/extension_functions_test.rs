// User-supplied function sets plugged into the parser and runtime
use crate::unit::common::*;
use rillstream::rill::sql::ast::FuncType;
use rillstream::rill::sql::error::SqlResult;
use rillstream::rill::sql::execution::functions::{FuncCallContext, Function, FunctionRegister};
use std::sync::atomic::{AtomicUsize, Ordering};

/// `inc()` returns how many times it has run.
struct Inc {
    calls: Arc<AtomicUsize>,
}

impl Function for Inc {
    fn func_type(&self) -> FuncType {
        FuncType::Scalar
    }

    fn validate(&self, args: &[Expr]) -> SqlResult<()> {
        if args.is_empty() {
            Ok(())
        } else {
            Err(SqlError::validation_error("inc takes no arguments"))
        }
    }

    fn exec(&self, _ctx: &FuncCallContext<'_>, _args: &[FieldValue]) -> FieldValue {
        FieldValue::Integer(self.calls.fetch_add(1, Ordering::SeqCst) as i64 + 1)
    }
}

/// `running_total(x)` sums its argument per call site.
struct RunningTotal;

impl Function for RunningTotal {
    fn func_type(&self) -> FuncType {
        FuncType::Scalar
    }

    fn validate(&self, args: &[Expr]) -> SqlResult<()> {
        match args.len() {
            1 => Ok(()),
            n => Err(SqlError::validation_error(format!(
                "running_total expects 1 argument but got {}",
                n
            ))),
        }
    }

    fn exec(&self, ctx: &FuncCallContext<'_>, args: &[FieldValue]) -> FieldValue {
        let add = args.first().and_then(FieldValue::to_i64).unwrap_or(0);
        let total = ctx
            .get_state("total")
            .and_then(|v| v.to_i64())
            .unwrap_or(0)
            + add;
        ctx.put_state("total", FieldValue::Integer(total));
        FieldValue::Integer(total)
    }
}

struct TestFunctions {
    calls: Arc<AtomicUsize>,
}

impl FunctionRegister for TestFunctions {
    fn has_function(&self, name: &str) -> bool {
        self.conv_name(name).is_some()
    }

    fn function(&self, name: &str) -> Option<Arc<dyn Function>> {
        match self.conv_name(name)?.as_str() {
            "inc" => Some(Arc::new(Inc {
                calls: Arc::clone(&self.calls),
            })),
            "running_total" => Some(Arc::new(RunningTotal)),
            _ => None,
        }
    }

    fn conv_name(&self, name: &str) -> Option<String> {
        let lower = name.to_lowercase();
        matches!(lower.as_str(), "inc" | "running_total").then_some(lower)
    }
}

fn setup() -> (StreamingSqlParser, FunctionValuer, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let register = TestFunctions {
        calls: Arc::clone(&calls),
    };
    let resolver = Arc::new(FunctionResolver::with_register(Arc::new(register)));
    let parser = StreamingSqlParser::with_resolver(EngineConfig::default(), Arc::clone(&resolver));
    let functions = FunctionValuer::with_resolver(resolver);
    (parser, functions, calls)
}

#[test]
fn test_alias_reference_runs_function_once_per_row() {
    let (parser, functions, calls) = setup();
    let stmt = parser.parse("SELECT inc() AS a, a + 1 FROM demo").unwrap();
    let row = demo_tuple(json!({}));

    let first = eval_row(&stmt.fields[1].expr, &row, &functions);
    let second = eval_row(&stmt.fields[1].expr, &row, &functions);
    assert_eq!(first, FieldValue::Integer(2));
    assert_eq!(second, first);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // a fresh row evaluates the alias again
    let next = demo_tuple(json!({}));
    assert_eq!(eval_row(&stmt.fields[1].expr, &next, &functions), FieldValue::Integer(3));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_extension_names_are_case_insensitive() {
    let (parser, functions, _) = setup();
    let stmt = parser.parse("SELECT RUNNING_TOTAL(n) AS t FROM demo").unwrap();
    let out: Vec<FieldValue> = [1, 2, 3]
        .iter()
        .map(|n| eval_row(&stmt.fields[0].expr, &demo_tuple(json!({ "n": n })), &functions))
        .collect();
    assert_eq!(
        out,
        vec![FieldValue::Integer(1), FieldValue::Integer(3), FieldValue::Integer(6)]
    );
}

#[test]
fn test_call_sites_keep_separate_state() {
    let (parser, functions, _) = setup();
    let stmt = parser
        .parse("SELECT running_total(n), running_total(n * 10) FROM demo")
        .unwrap();
    let mut last = Vec::new();
    for n in [1, 2] {
        let row = demo_tuple(json!({ "n": n }));
        last = stmt
            .fields
            .iter()
            .map(|f| eval_row(&f.expr, &row, &functions))
            .collect();
    }
    assert_eq!(last, vec![FieldValue::Integer(3), FieldValue::Integer(30)]);
}

#[test]
fn test_extension_validation_runs_at_parse_time() {
    let (parser, _, _) = setup();
    let err = parser.parse("SELECT inc(1) FROM demo").unwrap_err();
    assert_eq!(err.message(), "inc takes no arguments");
}

#[test]
fn test_unknown_function_without_register() {
    let err = StreamingSqlParser::new()
        .parse("SELECT inc() FROM demo")
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "function inc not found");

    let (parser, _, _) = setup();
    assert!(parser.parse("SELECT dec() FROM demo").unwrap_err().is_not_found());
}

#[test]
fn test_builtins_take_precedence() {
    let (parser, functions, _) = setup();
    let stmt = parser.parse("SELECT lower(s) FROM demo").unwrap();
    let row = demo_tuple(json!({"s": "ABC"}));
    assert_eq!(eval_row(&stmt.fields[0].expr, &row, &functions), FieldValue::from("abc"));
}
