use super::connection::OracleConnectOptions;
use super::statement::{NullKind, cancel_with, classify_oracle_error, column_kinds};
use chrono::NaiveDate;
use orabatch_core::{BatchError, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[test]
fn test_user_cancel_maps_to_cancelled() {
    let err = classify_oracle_error("ORA-01013: user requested cancel of current operation");
    assert!(matches!(err, BatchError::Cancelled));
    assert!(err.is_execution_failure());
}

#[test]
fn test_other_errors_map_to_query() {
    let err = classify_oracle_error(
        "ORA-00001: unique constraint (APP.ACCOUNTS_PK) violated",
    );
    match err {
        BatchError::Query(msg) => {
            assert!(msg.starts_with("Oracle error: "));
            assert!(msg.contains("ORA-00001"));
        }
        other => panic!("expected query error, got {other:?}"),
    }
}

#[test]
fn test_connect_options_default_to_autocommit() {
    let options = OracleConnectOptions::new("scott", "tiger", "//localhost:1521/FREEPDB1");
    assert!(options.autocommit);
    assert_eq!(options.connect_string, "//localhost:1521/FREEPDB1");
}

#[test]
fn test_connect_options_debug_redacts_password() {
    let options = OracleConnectOptions::new("scott", "tiger", "//localhost/XE");
    let rendered = format!("{:?}", options);
    assert!(rendered.contains("scott"));
    assert!(!rendered.contains("tiger"));
}

#[test]
fn test_every_cancel_breaks_the_running_call() {
    let cancelled = AtomicBool::new(false);
    let breaks = AtomicUsize::new(0);
    let count_break = || {
        breaks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    };

    cancel_with(&cancelled, count_break);
    cancel_with(&cancelled, count_break);

    assert!(cancelled.load(Ordering::SeqCst));
    assert_eq!(breaks.load(Ordering::SeqCst), 2);
}

#[test]
fn test_null_takes_kind_of_later_value_in_column() {
    let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    let rows = vec![
        vec![Some(Value::Null), None, Some(Value::String("a".into()))],
        vec![Some(Value::Date(date)), Some(Value::Int32(4)), Some(Value::Null)],
    ];

    assert_eq!(
        column_kinds(&rows),
        vec![NullKind::Date, NullKind::Number, NullKind::Varchar]
    );
}

#[test]
fn test_all_null_column_binds_as_text() {
    let rows = vec![vec![None, Some(Value::Float64(1.5))], vec![Some(Value::Null), None]];

    assert_eq!(column_kinds(&rows), vec![NullKind::Varchar, NullKind::BinaryDouble]);
    assert!(column_kinds(&[]).is_empty());
}

#[test]
fn test_value_kinds() {
    assert_eq!(NullKind::of(&Value::Bool(true)), NullKind::Number);
    assert_eq!(NullKind::of(&Value::Bytes(vec![1])), NullKind::Raw);
    assert_eq!(NullKind::of(&Value::Decimal("1.10".into())), NullKind::Varchar);
    assert_eq!(
        NullKind::of(&Value::DateTimeUtc(chrono::Utc::now())),
        NullKind::TimestampTz
    );
}
