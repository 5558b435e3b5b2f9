use super::*;
use cronwatch_protocols::{SessionTarget, WakeMode};
use serde_json::json;

fn request(payload: serde_json::Value) -> JobRunRequest {
    JobRunRequest {
        job_id: "job-1".into(),
        job_name: "nightly-backup".into(),
        session_target: SessionTarget::Main,
        wake_mode: WakeMode::Now,
        payload,
    }
}

fn runner() -> ShellJobRunner {
    ShellJobRunner::new("sh", Duration::from_secs(10))
}

#[tokio::test]
async fn test_shell_success_returns_stdout() {
    let summary = runner()
        .run(request(json!({"command": "echo hello"})))
        .await
        .unwrap();
    assert_eq!(summary.as_deref(), Some("hello"));
}

#[tokio::test]
async fn test_shell_silent_success() {
    let summary = runner().run(request(json!({"command": "true"}))).await.unwrap();
    assert!(summary.is_none());
}

#[tokio::test]
async fn test_shell_failure_uses_stderr() {
    let err = runner()
        .run(request(json!({"command": "echo 'Service Unreachable' >&2; exit 3"})))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Service Unreachable");
}

#[tokio::test]
async fn test_shell_failure_without_stderr() {
    let err = runner()
        .run(request(json!({"command": "exit 7"})))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("exit code 7"));
}

#[tokio::test]
async fn test_shell_sees_job_env_and_cwd() {
    let dir = tempfile::TempDir::new().unwrap();
    let cwd = dir.path().to_string_lossy().to_string();
    let summary = runner()
        .run(request(json!({
            "command": "echo \"$CRONWATCH_JOB_NAME\"; pwd",
            "cwd": cwd,
        })))
        .await
        .unwrap()
        .unwrap();
    assert!(summary.starts_with("nightly-backup"));
    let canonical = dir.path().canonicalize().unwrap();
    let file_name = canonical.file_name().unwrap().to_string_lossy().to_string();
    assert!(summary.contains(&file_name));
}

#[tokio::test]
async fn test_shell_timeout() {
    let runner = ShellJobRunner::new("sh", Duration::from_millis(100));
    let err = runner
        .run(request(json!({"command": "sleep 5"})))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("timed out"));
}

#[tokio::test]
async fn test_invalid_payload() {
    let err = runner()
        .run(request(json!({"script": "true"})))
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::InvalidPayload(_)));
}

#[test]
fn test_summarize_keeps_tail() {
    let long = format!("{}END", "x".repeat(SUMMARY_LIMIT * 2));
    let summary = summarize(&long).unwrap();
    assert_eq!(summary.chars().count(), SUMMARY_LIMIT);
    assert!(summary.ends_with("END"));
    assert!(summarize("  \n ").is_none());
}

#[test]
fn test_service_config_from_file_config() {
    let config = cronwatch_config::ConfigLoader::load_str(
        r#"
        [scheduler]
        tick_interval_ms = 250
        failure_alert_throttle_ms = 60000
        stop_grace_ms = 1000
        "#,
    )
    .unwrap();

    let service = service_config(&config);
    assert_eq!(service.tick_interval, Duration::from_millis(250));
    assert_eq!(service.escalation, EscalationPolicy::new(60_000));
    assert_eq!(service.escalation.threshold(), 3);
    assert_eq!(service.stop_grace, Duration::from_secs(1));
}

#[tokio::test]
async fn test_log_capabilities_never_fail() {
    let metadata = AlertMetadata {
        job_id: "j".into(),
        job_name: "n".into(),
        consecutive_failures: 3,
        last_error: "e".into(),
    };
    assert!(LogEventSink.emit("Alert", &metadata).await.is_ok());
    LogHeartbeat.request_wake_now();
}
