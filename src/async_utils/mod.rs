//! Asynchronous utilities for use with Tokio.
//!
//! Most of the slow work in this program is either an external command
//! (poppler, tesseract, model pipelines) or CPU-bound image work. The helpers
//! here keep both off the async executor's threads.

use std::process::Output;

use tokio::{
    fs::File,
    io::{AsyncWrite, AsyncWriteExt as _, BufWriter},
    process::Command,
};

use crate::{cpu_limit::with_cpu_semaphore, prelude::*};

/// Run an external command to completion while holding a CPU permit, and
/// fail if it exits unsuccessfully.
#[instrument(level = "debug", skip_all, fields(command = command_name))]
pub async fn run_command(command_name: &str, cmd: &mut Command) -> Result<Output> {
    let output = with_cpu_semaphore(|| async {
        cmd.output()
            .await
            .with_context(|| format!("failed to run {}", command_name))
    })
    .await?;
    check_for_command_failure(command_name, &output)?;
    Ok(output)
}

/// Report any command failures, and include any error output.
///
/// The output of standard error and standard output will be logged at
/// appropriate levels. Poppler prints recoverable syntax warnings on stderr
/// for many real-world PDFs, so only the exit status decides failure.
pub fn check_for_command_failure(command_name: &str, output: &Output) -> Result<()> {
    let stderr = String::from_utf8_lossy(&output.stderr);
    trace!(
        command_name = command_name,
        bytes = output.stdout.len(),
        "Standard output from command"
    );
    if !stderr.trim().is_empty() {
        debug!(
            command_name = command_name,
            output = %stderr,
            "Standard error from command",
        );
    }

    if output.status.success() {
        Ok(())
    } else if let Some(exit_code) = output.status.code() {
        Err(anyhow!(
            "{} failed with exit code {} and error output:\n{}",
            command_name,
            exit_code,
            stderr,
        ))
    } else {
        Err(anyhow!(
            "{} failed with error output:\n{}",
            command_name,
            stderr,
        ))
    }
}

/// Can we start `program` at all? Used to decide whether an optional external
/// engine is installed.
pub async fn command_is_available(program: &str, version_arg: &str) -> bool {
    Command::new(program)
        .arg(version_arg)
        .output()
        .await
        .is_ok()
}

/// Wrapper around [`tokio::task::spawn_blocking`] that propagates panics from
/// the background task.
pub async fn spawn_blocking_propagating_panics<F, T>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(value) => value,
        Err(err) => std::panic::resume_unwind(err.into_panic()),
    }
}

/// Create a writer for either a file or standard output.
async fn create_writer(
    path: Option<&Path>,
) -> Result<Box<dyn AsyncWrite + Unpin + Send + Sync + 'static>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .await
                .with_context(|| format!("Failed to create file at path: {:?}", path))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(tokio::io::stdout())),
    }
}

/// Write a value as pretty-printed JSON to either standard output or a file.
pub async fn write_json_output<T: Serialize>(path: Option<&Path>, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(create_writer(path).await?);
    let json = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
    writer
        .write_all(json.as_bytes())
        .await
        .context("Failed to write JSON to output")?;
    writer
        .write_all(b"\n")
        .await
        .context("Failed to write newline to output")?;
    writer.flush().await.context("Failed to flush output")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_commands_are_unavailable() {
        assert!(!command_is_available("definitely-not-a-real-command-xyz", "-v").await);
    }

    #[tokio::test]
    async fn blocking_work_returns_its_value() {
        let v = spawn_blocking_propagating_panics(|| 6 * 7).await;
        assert_eq!(v, 42);
    }

    #[tokio::test]
    async fn write_json_output_writes_a_file() -> Result<()> {
        let dir = tempfile::TempDir::with_prefix("json-output")?;
        let path = dir.path().join("out.json");
        write_json_output(Some(&path), &serde_json::json!({ "pages": 2 })).await?;
        let text = std::fs::read_to_string(&path)?;
        assert!(text.contains("\"pages\": 2"));
        Ok(())
    }
}
