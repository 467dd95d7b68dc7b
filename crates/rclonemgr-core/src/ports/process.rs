//! Process execution port (driven/secondary port)
//!
//! rclone and journalctl are long-running subprocesses whose output is read
//! line by line. This port reduces them to four operations (spawn, next line,
//! wait, kill) so the orchestrator and the log monitor can be driven by a fake
//! that replays canned output in tests.

use std::fmt;

use thiserror::Error;

/// Which output stream of the child is read line by line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    /// rclone writes its `-v` diagnostics here
    Stderr,
}

/// A command to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub stream: OutputStream,
}

impl ProcessSpec {
    /// Creates a spec that streams stdout
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stream: OutputStream::Stdout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stream(mut self, stream: OutputStream) -> Self {
        self.stream = stream;
        self
    }
}

impl fmt::Display for ProcessSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// How a child process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code, `None` if the process was killed by a signal
    pub code: Option<i32>,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit status {code}"),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// Errors raised while running an external process
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The process could not be started at all
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading output, waiting or killing failed
    #[error("I/O error while running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Port trait for starting external processes
#[async_trait::async_trait]
pub trait IProcessRunner: Send + Sync {
    /// Starts `spec` and returns a handle to its selected output stream
    async fn spawn(&self, spec: &ProcessSpec) -> Result<Box<dyn IRunningProcess>, ProcessError>;
}

/// A started process whose output is consumed line by line
#[async_trait::async_trait]
pub trait IRunningProcess: Send {
    /// Next line of output without its trailing newline, `None` at end of stream
    async fn next_line(&mut self) -> Result<Option<String>, ProcessError>;

    /// Waits for the process to exit
    async fn wait(&mut self) -> Result<ProcessExit, ProcessError>;

    /// Requests termination; the process may still be releasing resources when this returns
    async fn kill(&mut self) -> Result<(), ProcessError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_builder_and_display() {
        let spec = ProcessSpec::new("rclone")
            .arg("copy")
            .args(["a:x", "b:y"])
            .stream(OutputStream::Stderr);
        assert_eq!(spec.args, vec!["copy", "a:x", "b:y"]);
        assert_eq!(spec.stream, OutputStream::Stderr);
        assert_eq!(spec.to_string(), "rclone copy a:x b:y");
    }

    #[test]
    fn test_exit_status() {
        assert!(ProcessExit { code: Some(0) }.success());
        assert!(!ProcessExit { code: Some(1) }.success());
        assert!(!ProcessExit { code: None }.success());
        assert_eq!(ProcessExit { code: Some(3) }.to_string(), "exit status 3");
    }
}
