#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::Write;

use courier::config;
use courier_common::Message;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp config");
    file.write_all(content.as_bytes()).expect("write temp config");
    file
}

#[test]
fn test_explicit_path_is_found() {
    let file = write_config("()");

    let found = config::find_config_file(Some(file.path())).unwrap();
    assert_eq!(found.as_deref(), Some(file.path()));
}

#[test]
fn test_explicit_missing_path_errors() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.ron");

    let err = config::find_config_file(Some(&missing)).unwrap_err();
    assert!(err.to_string().contains("non-existent"));
}

#[test]
fn test_empty_config_uses_defaults() {
    let file = write_config("()");

    let courier = config::load(Some(file.path())).unwrap();
    let dispatch = courier.dispatch_config();

    assert_eq!(dispatch.rate_limit, 5);
    assert_eq!(dispatch.retry.max_attempts, 3);
    assert_eq!(dispatch.providers.len(), 2);
    assert!(courier.check().is_ok());
}

#[test]
fn test_full_config() {
    let file = write_config(
        r#"(
            dispatch: (
                rate_limit: 2,
                retry: (max_attempts: 2, base_delay_ms: 10),
                circuit_breaker: (failure_threshold: 1, cooldown_ms: 100),
                providers: [
                    (name: "Primary", failure_rate: 0.0, latency_ms: 5),
                    (name: "Secondary"),
                ],
            ),
        )"#,
    );

    let courier = config::load(Some(file.path())).unwrap();
    let dispatch = courier.dispatch_config();

    assert_eq!(dispatch.rate_limit, 2);
    assert_eq!(dispatch.retry.max_attempts, 2);
    assert_eq!(dispatch.retry.base_delay_ms, 10);
    assert_eq!(dispatch.circuit_breaker.failure_threshold, 1);

    let names: Vec<_> = dispatch.providers.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Primary", "Secondary"]);
    assert!((dispatch.providers[1].failure_rate - 0.3).abs() < f64::EPSILON);
}

#[test]
fn test_invalid_ron_errors() {
    let file = write_config("(dispatch: (rate_limit: \"many\"))");

    let err = config::load_from(file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config"));
}

#[test]
fn test_check_reports_invalid_values() {
    let file = write_config("(dispatch: (providers: []))");

    let courier = config::load(Some(file.path())).unwrap();
    assert!(courier.check().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_send_with_loaded_config() {
    let file = write_config(
        r#"(dispatch: (providers: [(name: "Primary", failure_rate: 0.0, latency_ms: 5)]))"#,
    );
    let courier = config::load(Some(file.path())).unwrap();

    let (entries, summary) = courier
        .send(Message::new("unit@test.com", "Hello", ""), 1)
        .await
        .unwrap();

    assert_eq!(summary.sent, 1);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].message(), "Sent via Primary");
    assert!(entries[0].to_string().ends_with("unit@test.com-Hello: Sent via Primary"));
}
