//! External program runner.
//!
//! Spawns the configured command with piped stdio, feeds it the transcript
//! text, and captures its output:
//! - The input write and both output drains run concurrently, so a program
//!   that fills its stdout or stderr pipe before reading stdin cannot
//!   deadlock the runner.
//! - stdin is closed after the write, so a program reading to EOF sees the
//!   end of input even when the transcript is empty.
//! - `kill_on_drop(true)` reaps the child if the runner future is dropped.
//!
//! No timeout is applied and failed runs are not retried.

use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

use crate::{AppError, Result};

/// Captured result of one program run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Raw bytes written to stdout.
    pub stdout: Vec<u8>,
    /// Raw bytes written to stderr.
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    /// Whether the program exited with code 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout decoded as UTF-8, with invalid sequences replaced.
    #[must_use]
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// stderr decoded as UTF-8, with invalid sequences replaced.
    #[must_use]
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Run `command` with `input` on its stdin and wait for it to exit.
///
/// `command[0]` is the program; the remaining elements are its arguments.
/// No shell is involved.
///
/// # Errors
///
/// - [`AppError::Launch`]: the command is empty or the OS refused to start
///   the program (not found, permission denied, ...).
/// - [`AppError::Io`]: a pipe failed while the program was running.
pub async fn run_command(command: &[String], input: &str) -> Result<ProcessOutput> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| AppError::Launch("command is empty".into()))?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| AppError::Launch(format!("failed to spawn {program}: {err}")))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| AppError::Launch("failed to capture program stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::Launch("failed to capture program stdout".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::Launch("failed to capture program stderr".into()))?;

    let write_input = async move {
        let result = stdin.write_all(input.as_bytes()).await;
        // Dropping the handle closes the pipe and signals EOF.
        drop(stdin);
        result
    };

    let (written, stdout, stderr) =
        tokio::join!(write_input, drain(stdout), drain(stderr));

    match written {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => {
            debug!(%program, "program exited without reading all of its input");
        }
        Err(err) => {
            return Err(AppError::Io(format!("failed to write program stdin: {err}")));
        }
    }
    let stdout = stdout.map_err(|err| AppError::Io(format!("failed to read program stdout: {err}")))?;
    let stderr = stderr.map_err(|err| AppError::Io(format!("failed to read program stderr: {err}")))?;

    let status = child
        .wait()
        .await
        .map_err(|err| AppError::Io(format!("failed to wait for program: {err}")))?;

    Ok(ProcessOutput {
        exit_code: status.code(),
        stdout,
        stderr,
    })
}

async fn drain<R: AsyncRead + Unpin>(mut stream: R) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    Ok(buf)
}
