//! Host command execution for storage backends.

use crate::error::BackendError;
use tokio::process::Command;
use tracing::debug;

/// Run a program to completion and return its stdout.
///
/// The child is killed if the returned future is dropped, so callers can
/// bound it with `tokio::time::timeout`.
pub async fn run(program: &str, args: &[&str]) -> Result<String, BackendError> {
    debug!("Running {} {}", program, args.join(" "));

    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| BackendError::Spawn { program: program.to_string(), source: e })?;

    if !output.status.success() {
        return Err(BackendError::CommandFailed {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let out = run("echo", &["hello"]).await.unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_reports_failure() {
        let err = run("false", &[]).await.unwrap_err();
        assert!(matches!(err, BackendError::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn test_run_reports_missing_program() {
        let err = run("definitely-not-a-real-program-xyz", &[]).await.unwrap_err();
        assert!(matches!(err, BackendError::Spawn { .. }));
    }
}
