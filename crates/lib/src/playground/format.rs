//! Snippet formatting: wrap into a runnable `main` and run it through goimports.
//! goimports is executed directly (no shell); the program is passed on stdin.

use crate::playground::PlaygroundError;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Wrap a snippet into a minimal Go program.
pub fn wrap_snippet(snippet: &str) -> String {
    format!("package main\n\nfunc main() {{\n\t{}\n}}", snippet)
}

/// Run `binary` (goimports or a compatible formatter) with `program` on stdin and return stdout.
/// On failure stderr is included in the error.
pub async fn run_formatter(binary: &str, program: &str) -> Result<String, PlaygroundError> {
    let mut child = Command::new(binary)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| PlaygroundError::Format(format!("exec {} failed: {}", binary, e)))?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(program.as_bytes())
            .await
            .map_err(|e| PlaygroundError::Format(format!("writing to {}: {}", binary, e)))?;
    }
    let output = child
        .wait_with_output()
        .await
        .map_err(|e| PlaygroundError::Format(format!("waiting for {}: {}", binary, e)))?;
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if output.status.success() {
        log::debug!("code formatted:\n{}", stdout);
        return Ok(stdout);
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut msg = stdout;
    if !stderr.is_empty() {
        if !msg.is_empty() {
            msg.push('\n');
        }
        msg.push_str(&stderr);
    }
    Err(PlaygroundError::Format(format!("exit {}: {}", output.status, msg.trim_end())))
}
