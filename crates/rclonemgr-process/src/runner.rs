//! tokio-based process runner
//!
//! Implements [`IProcessRunner`] with `tokio::process`. Only the selected
//! output stream is captured; the other one is discarded for rclone (its
//! stdout is empty with `-v`) and inherited otherwise so diagnostics of
//! followers like journalctl still reach the daemon's own log.

use std::process::Stdio;

use rclonemgr_core::ports::{
    IProcessRunner, IRunningProcess, OutputStream, ProcessError, ProcessExit, ProcessSpec,
};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::debug;

type OutputReader = BufReader<Box<dyn AsyncRead + Send + Unpin>>;

/// Starts real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl IProcessRunner for TokioProcessRunner {
    #[tracing::instrument(skip(self), fields(command = %spec))]
    async fn spawn(&self, spec: &ProcessSpec) -> Result<Box<dyn IRunningProcess>, ProcessError> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        match spec.stream {
            OutputStream::Stdout => command.stdout(Stdio::piped()).stderr(Stdio::inherit()),
            OutputStream::Stderr => command.stdout(Stdio::null()).stderr(Stdio::piped()),
        };

        let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
            program: spec.program.clone(),
            source,
        })?;
        debug!(pid = ?child.id(), "Process started");

        let reader: Option<Box<dyn AsyncRead + Send + Unpin>> = match spec.stream {
            OutputStream::Stdout => child
                .stdout
                .take()
                .map(|s| Box::new(s) as Box<dyn AsyncRead + Send + Unpin>),
            OutputStream::Stderr => child
                .stderr
                .take()
                .map(|s| Box::new(s) as Box<dyn AsyncRead + Send + Unpin>),
        };
        let reader = reader.ok_or_else(|| ProcessError::Io {
            program: spec.program.clone(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "output stream was not captured"),
        })?;

        Ok(Box::new(TokioProcess {
            program: spec.program.clone(),
            child,
            output: BufReader::new(reader),
            buf: Vec::new(),
        }))
    }
}

struct TokioProcess {
    program: String,
    child: Child,
    output: OutputReader,
    buf: Vec<u8>,
}

impl TokioProcess {
    fn io_error(&self, source: std::io::Error) -> ProcessError {
        ProcessError::Io {
            program: self.program.clone(),
            source,
        }
    }
}

#[async_trait::async_trait]
impl IRunningProcess for TokioProcess {
    /// Lines that are not valid UTF-8 are decoded lossily
    async fn next_line(&mut self) -> Result<Option<String>, ProcessError> {
        self.buf.clear();
        match self.output.read_until(b'\n', &mut self.buf).await {
            Ok(0) => Ok(None),
            Ok(_) => {
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn wait(&mut self) -> Result<ProcessExit, ProcessError> {
        match self.child.wait().await {
            Ok(status) => Ok(ProcessExit {
                code: status.code(),
            }),
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn kill(&mut self) -> Result<(), ProcessError> {
        debug!(program = %self.program, pid = ?self.child.id(), "Killing process");
        match self.child.start_kill() {
            Ok(()) => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> ProcessSpec {
        ProcessSpec::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn test_reads_stdout_lines_in_order() {
        let runner = TokioProcessRunner::new();
        let mut process = runner.spawn(&sh("printf 'one\\ntwo\\n'; echo noise >&2")).await.unwrap();

        assert_eq!(process.next_line().await.unwrap().as_deref(), Some("one"));
        assert_eq!(process.next_line().await.unwrap().as_deref(), Some("two"));
        assert_eq!(process.next_line().await.unwrap(), None);
        assert!(process.wait().await.unwrap().success());
    }

    #[tokio::test]
    async fn test_reads_stderr_when_selected() {
        let runner = TokioProcessRunner::new();
        let spec = sh("echo out; echo err >&2").stream(OutputStream::Stderr);
        let mut process = runner.spawn(&spec).await.unwrap();

        assert_eq!(process.next_line().await.unwrap().as_deref(), Some("err"));
        assert_eq!(process.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_decoded_lossily() {
        let runner = TokioProcessRunner::new();
        let spec = sh("printf 'bad \\377 name: failed\\nok: Copied (server-side copy)\\n' >&2")
            .stream(OutputStream::Stderr);
        let mut process = runner.spawn(&spec).await.unwrap();

        assert_eq!(
            process.next_line().await.unwrap().as_deref(),
            Some("bad \u{FFFD} name: failed")
        );
        assert_eq!(
            process.next_line().await.unwrap().as_deref(),
            Some("ok: Copied (server-side copy)")
        );
        assert_eq!(process.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_last_line_without_newline() {
        let runner = TokioProcessRunner::new();
        let mut process = runner.spawn(&sh("printf 'one\\ntail'")).await.unwrap();

        assert_eq!(process.next_line().await.unwrap().as_deref(), Some("one"));
        assert_eq!(process.next_line().await.unwrap().as_deref(), Some("tail"));
        assert_eq!(process.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reports_exit_code() {
        let runner = TokioProcessRunner::new();
        let mut process = runner.spawn(&sh("exit 3")).await.unwrap();

        assert_eq!(process.next_line().await.unwrap(), None);
        assert_eq!(process.wait().await.unwrap(), ProcessExit { code: Some(3) });
    }

    #[tokio::test]
    async fn test_missing_program_is_a_spawn_error() {
        let runner = TokioProcessRunner::new();
        let result = runner
            .spawn(&ProcessSpec::new("/nonexistent/rclonemgr-test-binary"))
            .await;

        assert!(matches!(result, Err(ProcessError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_kill_terminates_process() {
        let runner = TokioProcessRunner::new();
        let mut process = runner.spawn(&ProcessSpec::new("sleep").arg("30")).await.unwrap();

        process.kill().await.unwrap();
        let status = process.wait().await.unwrap();
        assert_eq!(status.code, None);
    }
}
