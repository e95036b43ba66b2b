use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn run_cli(args: &[&str], cwd: &Path, env: &[(&str, &str)]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_judge"));
    command.args(args).current_dir(cwd).env_clear();
    for (key, value) in env {
        command.env(key, value);
    }
    command.output().expect("judge should run")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn missing_credentials_fail_before_any_session_starts() {
    let temp = TempDir::new().expect("tempdir should create");
    let output = run_cli(&["-s", "feature/x", "-t", "main"], temp.path(), &[]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = stderr(&output);
    assert!(stderr.starts_with("error: no model provider credentials found"), "{stderr}");
    assert!(stderr.contains("ANTHROPIC_API_KEY"));
    assert!(output.stdout.is_empty());
}

#[test]
fn explicit_provider_without_its_key_is_a_configuration_error() {
    let temp = TempDir::new().expect("tempdir should create");
    let output = run_cli(
        &["-s", "feature/x", "-t", "main", "--provider", "openai"],
        temp.path(),
        &[("ANTHROPIC_API_KEY", "an-key")],
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("OPENAI_API_KEY is not set"));
}

#[test]
fn unreadable_repository_is_reported() {
    let temp = TempDir::new().expect("tempdir should create");
    let missing = temp.path().join("missing");
    let output = run_cli(
        &[
            "-s",
            "feature/x",
            "-t",
            "main",
            "-r",
            missing.to_str().expect("utf8 path"),
        ],
        temp.path(),
        &[("OPENAI_API_KEY", "oa-key")],
    );

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("cannot open repository"));
}

#[test]
fn source_and_target_are_required() {
    let temp = TempDir::new().expect("tempdir should create");
    let output = run_cli(&["-t", "main"], temp.path(), &[]);

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("--source"));
}

#[test]
fn unknown_provider_is_rejected_by_the_parser() {
    let temp = TempDir::new().expect("tempdir should create");
    let output = run_cli(
        &["-s", "a", "-t", "b", "-p", "gemini"],
        temp.path(),
        &[],
    );

    assert_eq!(output.status.code(), Some(2));
    let stderr = stderr(&output);
    assert!(stderr.contains("anthropic"));
    assert!(stderr.contains("openrouter"));
}
