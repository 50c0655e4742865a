//! Child-process transport: newline-delimited JSON over stdin/stdout.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use super::Transport;
use crate::error::{Error, Result};

/// Maximum size of one message (1MB).
pub const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// How long a server gets to exit on its own after stdin is closed.
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// A server running as a child process.
pub struct ChildProcess {
    command: String,
    process: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    /// Bytes of a line not yet terminated; kept across cancelled reads.
    pending: Vec<u8>,
    closed: bool,
}

impl ChildProcess {
    /// Spawn `program` with `args`, piping stdin/stdout and inheriting stderr.
    pub fn spawn(program: &str, args: &[String]) -> Result<Self> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut process = cmd.spawn().map_err(|source| Error::Spawn {
            command: program.to_string(),
            source,
        })?;

        // Dropping `process` on the error paths below kills it.
        let stdin = process.stdin.take().ok_or_else(|| Error::Spawn {
            command: program.to_string(),
            source: std::io::Error::other("failed to capture stdin"),
        })?;
        let stdout = process.stdout.take().ok_or_else(|| Error::Spawn {
            command: program.to_string(),
            source: std::io::Error::other("failed to capture stdout"),
        })?;

        debug!(command = program, pid = process.id(), "spawned server");

        Ok(Self {
            command: program.to_string(),
            process,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            pending: Vec::new(),
            closed: false,
        })
    }

    /// Check if the server process is still running.
    pub fn is_running(&mut self) -> bool {
        matches!(self.process.try_wait(), Ok(None))
    }
}

impl Transport for ChildProcess {
    async fn send(&mut self, frame: String) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or(Error::ServerExited)?;
        stdin.write_all(frame.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<String> {
        loop {
            let bytes_read = self.stdout.read_until(b'\n', &mut self.pending).await?;
            if bytes_read == 0 {
                return Err(Error::ServerExited);
            }

            if self.pending.len() > MAX_OUTPUT_SIZE {
                let size = self.pending.len();
                self.pending.clear();
                return Err(Error::OutputTooLarge {
                    size,
                    max: MAX_OUTPUT_SIZE,
                });
            }

            if self.pending.last() != Some(&b'\n') {
                // EOF in the middle of a line.
                return Err(Error::ServerExited);
            }

            let line = std::mem::take(&mut self.pending);
            let line = String::from_utf8_lossy(&line).trim().to_string();
            if !line.is_empty() {
                return Ok(line);
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // Closing stdin asks a well-behaved server to exit.
        drop(self.stdin.take());

        match tokio::time::timeout(EXIT_GRACE, self.process.wait()).await {
            Ok(Ok(status)) => {
                debug!(command = %self.command, %status, "server exited");
            }
            Ok(Err(e)) => warn!(command = %self.command, "waiting for server failed: {e}"),
            Err(_) => {
                debug!(command = %self.command, "server did not exit, killing it");
                self.process.kill().await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_missing_program_fails() {
        let err = ChildProcess::spawn("definitely-not-a-real-program-4711", &[])
            .err()
            .unwrap();
        assert!(matches!(err, Error::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn echoes_lines_through_cat() {
        let mut child = ChildProcess::spawn("cat", &[]).unwrap();
        child.send(r#"{"jsonrpc":"2.0"}"#.to_string()).await.unwrap();
        assert_eq!(child.receive().await.unwrap(), r#"{"jsonrpc":"2.0"}"#);
        child.close().await.unwrap();
        assert!(!child.is_running());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exited_server_is_reported() {
        let mut child = ChildProcess::spawn("true", &[]).unwrap();
        assert!(matches!(child.receive().await, Err(Error::ServerExited)));
        child.close().await.unwrap();
    }
}
