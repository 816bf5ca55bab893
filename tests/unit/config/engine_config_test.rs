// Loading engine configuration and its effect on parsing and evaluation
use crate::unit::common::*;
use rillstream::rill::config::{
    ConfigError, ENV_DEFAULT_FIELD_PREFIX, ENV_IGNORE_CASE, ENV_INTEGER_FLOAT_DIVISION,
};
use std::collections::HashMap;
use std::fs;

#[test]
fn test_load_from_yaml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engine.yaml");
    fs::write(
        &path,
        "ignore_case: false\ninteger_float_division: true\ndefault_field_prefix: \"col_\"\n",
    )
    .unwrap();

    let config = EngineConfig::from_yaml_file(&path).unwrap();
    assert!(!config.ignore_case);
    assert!(config.integer_float_division);
    assert_eq!(config.default_field_prefix, "col_");
    assert!(!config.allow_aggregate_in_where);
}

#[test]
fn test_missing_file_and_bad_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.yaml");
    match EngineConfig::from_yaml_file(&missing) {
        Err(ConfigError::IoError { file, .. }) => assert_eq!(file, missing),
        other => panic!("Expected IO error, got {:?}", other),
    }

    let bad = EngineConfig::from_yaml_str("ignore_case: [1, 2]");
    assert!(matches!(bad, Err(ConfigError::ParseError(_))));

    assert_eq!(EngineConfig::from_yaml_str("   ").unwrap(), EngineConfig::default());
}

#[test]
fn test_overrides_on_top_of_file() {
    let base = EngineConfig::from_yaml_str("default_field_prefix: \"f_\"\n").unwrap();
    let env: HashMap<&str, &str> = [
        (ENV_INTEGER_FLOAT_DIVISION, "yes"),
        (ENV_IGNORE_CASE, "0"),
    ]
    .into_iter()
    .collect();
    let config = base
        .with_overrides(|key| env.get(key).map(|v| v.to_string()))
        .unwrap();
    assert!(config.integer_float_division);
    assert!(!config.ignore_case);
    assert_eq!(config.default_field_prefix, "f_");
}

#[test]
fn test_invalid_override_values() {
    let err = EngineConfig::default()
        .with_overrides(|key| (key == ENV_INTEGER_FLOAT_DIVISION).then(|| "sometimes".to_string()))
        .unwrap_err();
    match err {
        ConfigError::InvalidValue { key, value } => {
            assert_eq!(key, ENV_INTEGER_FLOAT_DIVISION);
            assert_eq!(value, "sometimes");
        }
        other => panic!("Expected invalid value, got {:?}", other),
    }
    assert_eq!(
        err_string(ENV_DEFAULT_FIELD_PREFIX, ""),
        "Invalid value '' for RILL_DEFAULT_FIELD_PREFIX"
    );
}

fn err_string(key: &'static str, value: &'static str) -> String {
    EngineConfig::default()
        .with_overrides(|k| (k == key).then(|| value.to_string()))
        .unwrap_err()
        .to_string()
}

#[test]
fn test_field_prefix_reaches_parser() {
    let config = EngineConfig {
        default_field_prefix: "col_".to_string(),
        ..EngineConfig::default()
    };
    let parser = StreamingSqlParser::with_config(config);
    let stmt = parser.parse("SELECT a + 1, abs(b) FROM demo").unwrap();
    assert_eq!(stmt.fields[0].name, "col_0");
    assert_eq!(stmt.fields[1].name, "abs");
    assert_eq!(parser.config().default_field_prefix, "col_");
}

#[test]
fn test_config_drives_evaluation() {
    let config = EngineConfig::from_yaml_str("integer_float_division: true\nignore_case: false\n").unwrap();
    let parser = StreamingSqlParser::with_config(config.clone());
    let stmt = parser.parse("SELECT A / b, s->X FROM demo").unwrap();
    let row = demo_tuple(json!({"A": 1, "b": 4, "s": {"x": 1}}));
    let functions = FunctionValuer::with_resolver(Arc::clone(parser.resolver()));
    let chain = MultiValuer::new(vec![&row, &functions]);
    let ev = ValuerEval::with_config(&chain, &config);
    assert_eq!(ev.eval(&stmt.fields[0].expr), FieldValue::Float(0.25));
    // navigation follows the configured key matching
    assert_eq!(ev.eval(&stmt.fields[1].expr), FieldValue::Null);
}
