//! Unit tests for the external program runner.
//!
//! These tests drive real processes through `sh`, so they only run on Unix.

#![cfg(unix)]

use wyoming_handle_external::runner::run_command;
use wyoming_handle_external::AppError;

fn sh(script: &str) -> Vec<String> {
    vec!["sh".into(), "-c".into(), script.into()]
}

#[tokio::test]
async fn input_reaches_program_stdin() {
    let output = run_command(&["cat".to_owned()], "turn on the lights").await.unwrap();

    assert!(output.success());
    assert_eq!(output.stdout_text(), "turn on the lights");
    assert!(output.stderr.is_empty());
}

#[tokio::test]
async fn empty_input_is_closed_immediately() {
    let output = run_command(&sh("wc -c | tr -d ' '"), "").await.unwrap();

    assert!(output.success());
    assert_eq!(output.stdout_text().trim(), "0");
}

#[tokio::test]
async fn multibyte_input_is_sent_as_utf8() {
    let output = run_command(&sh("wc -c | tr -d ' '"), "héllo").await.unwrap();

    assert_eq!(output.stdout_text().trim(), "6");
}

#[tokio::test]
async fn stdout_and_stderr_are_captured_separately() {
    let output = run_command(&sh("printf FAIL; printf err >&2; exit 1"), "x").await.unwrap();

    assert_eq!(output.exit_code, Some(1));
    assert!(!output.success());
    assert_eq!(output.stdout_text(), "FAIL");
    assert_eq!(output.stderr_text(), "err");
}

#[tokio::test]
async fn exit_code_is_reported() {
    let output = run_command(&sh("exit 7"), "").await.unwrap();

    assert_eq!(output.exit_code, Some(7));
}

#[tokio::test]
async fn signal_termination_has_no_exit_code() {
    let output = run_command(&sh("kill -9 $$"), "").await.unwrap();

    assert_eq!(output.exit_code, None);
    assert!(!output.success());
}

#[tokio::test]
async fn program_ignoring_input_still_completes() {
    let input = "x".repeat(1024 * 1024);

    let output = run_command(&sh("printf OK"), &input).await.unwrap();

    assert!(output.success());
    assert_eq!(output.stdout_text(), "OK");
}

#[tokio::test]
async fn large_input_and_output_do_not_deadlock() {
    let input = "y".repeat(4 * 1024 * 1024);

    let output = tokio::time::timeout(
        std::time::Duration::from_secs(30),
        run_command(&["cat".to_owned()], &input),
    )
    .await
    .expect("runner must not deadlock")
    .unwrap();

    assert_eq!(output.stdout.len(), input.len());
}

#[tokio::test]
async fn full_stderr_pipe_does_not_deadlock() {
    let output = tokio::time::timeout(
        std::time::Duration::from_secs(30),
        run_command(&sh("head -c 1000000 /dev/zero >&2; printf done"), "input"),
    )
    .await
    .expect("runner must not deadlock")
    .unwrap();

    assert_eq!(output.stderr.len(), 1_000_000);
    assert_eq!(output.stdout_text(), "done");
}

#[tokio::test]
async fn invalid_utf8_output_is_decoded_lossily() {
    let output = run_command(&sh("printf 'ok\\377'"), "").await.unwrap();

    assert_eq!(output.stdout, b"ok\xff");
    assert_eq!(output.stdout_text(), "ok\u{FFFD}");
}

#[tokio::test]
async fn missing_program_is_a_launch_error() {
    let err = run_command(&["/nonexistent/handle-intent".to_owned()], "hi")
        .await
        .expect_err("program does not exist");

    assert!(matches!(err, AppError::Launch(_)));
}

#[tokio::test]
async fn non_executable_program_is_a_launch_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("not-executable");
    std::fs::write(&path, "#!/bin/sh\necho hi\n").unwrap();

    let err = run_command(&[path.display().to_string()], "hi")
        .await
        .expect_err("permission denied");

    assert!(matches!(err, AppError::Launch(_)));
}

#[tokio::test]
async fn empty_command_is_a_launch_error() {
    let err = run_command(&[], "hi").await.expect_err("empty command");

    assert!(matches!(err, AppError::Launch(ref msg) if msg.contains("empty")));
}

#[tokio::test]
async fn arguments_are_passed_without_a_shell() {
    let command = vec!["printf".to_owned(), "%s|".to_owned(), "a b".to_owned(), "$HOME".to_owned()];

    let output = run_command(&command, "").await.unwrap();

    assert_eq!(output.stdout_text(), "a b|$HOME|");
}
