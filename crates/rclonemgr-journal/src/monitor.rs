//! journald follower for one drive
//!
//! Runs `journalctl --output=json --follow` for the drive's rclone unit and
//! turns each line into a [`LogEntry`]. Entries and errors are delivered on
//! separate bounded channels, in the order journalctl printed them.
//!
//! ## Lifecycle
//!
//! ```text
//! Starting ──spawn ok──► Streaming ──EOF / cancel / read error──► Stopped
//!     │
//!     └──spawn failed──────────────────────────────────────────► Stopped
//! ```
//!
//! Both channels close once the monitor is stopped.

use std::sync::Arc;

use rclonemgr_core::config::JournalConfig;
use rclonemgr_core::domain::{unit_name, LogEntry};
use rclonemgr_core::ports::{IProcessRunner, IRunningProcess, ProcessError, ProcessExit, ProcessSpec};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Where the monitor is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Starting,
    Streaming,
    Stopped,
}

/// Problems reported on the monitor's error channel
#[derive(Debug, Error)]
pub enum MonitorError {
    /// journalctl could not be started; the monitor stops
    #[error("failed to start journal reader: {0}")]
    Spawn(#[source] ProcessError),

    /// One line was not valid journal JSON; the monitor keeps going
    #[error("failed to decode journal line: {source}")]
    Decode {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    /// Reading journalctl's output failed; the monitor stops
    #[error("failed to read journal: {0}")]
    Read(#[source] ProcessError),

    /// journalctl ended with a failure status
    #[error("journal reader exited with {0}")]
    Exited(ProcessExit),
}

/// Receiving ends of a running monitor
pub struct MonitorHandle {
    pub entries: mpsc::Receiver<LogEntry>,
    pub errors: mpsc::Receiver<MonitorError>,
    pub state: watch::Receiver<MonitorState>,
    pub task: JoinHandle<()>,
}

/// Starts journal followers
pub struct LogMonitor {
    runner: Arc<dyn IProcessRunner>,
    config: JournalConfig,
}

impl LogMonitor {
    pub fn new(runner: Arc<dyn IProcessRunner>, config: JournalConfig) -> Self {
        Self { runner, config }
    }

    /// `journalctl --output=json --follow --user --since=now --unit=rclone@<drive>.service`
    pub fn command(&self, drive_name: &str) -> ProcessSpec {
        ProcessSpec::new(&self.config.binary).args([
            "--output=json".to_string(),
            "--follow".to_string(),
            "--user".to_string(),
            "--since=now".to_string(),
            format!("--unit={}", unit_name(drive_name)),
        ])
    }

    /// Starts following the journal of `drive_name` on a new task
    ///
    /// The follower runs until journalctl exits or `cancel` fires; on
    /// cancellation the child process is killed.
    pub fn start(&self, drive_name: &str, cancel: CancellationToken) -> MonitorHandle {
        let capacity = self.config.channel_capacity.max(1);
        let (entries_tx, entries) = mpsc::channel(capacity);
        let (errors_tx, errors) = mpsc::channel(capacity);
        let (state_tx, state) = watch::channel(MonitorState::Starting);

        let follower = Follower {
            runner: Arc::clone(&self.runner),
            spec: self.command(drive_name),
            drive_name: drive_name.to_string(),
            entries: entries_tx,
            errors: errors_tx,
            state: state_tx,
            cancel,
        };
        let task = tokio::spawn(follower.run());

        MonitorHandle {
            entries,
            errors,
            state,
            task,
        }
    }
}

/// What ended one read step
enum Step {
    Continue,
    Stop,
}

struct Follower {
    runner: Arc<dyn IProcessRunner>,
    spec: ProcessSpec,
    drive_name: String,
    entries: mpsc::Sender<LogEntry>,
    errors: mpsc::Sender<MonitorError>,
    state: watch::Sender<MonitorState>,
    cancel: CancellationToken,
}

impl Follower {
    async fn run(self) {
        info!(drive = %self.drive_name, command = %self.spec, "Starting journal reader");

        match self.runner.spawn(&self.spec).await {
            Ok(mut process) => {
                self.state.send_replace(MonitorState::Streaming);
                self.stream(process.as_mut()).await;
            }
            Err(e) => {
                error!(drive = %self.drive_name, error = %e, "Failed to start journal reader");
                self.report(MonitorError::Spawn(e)).await;
            }
        }

        self.state.send_replace(MonitorState::Stopped);
        info!(drive = %self.drive_name, "Journal reader stopped");
    }

    async fn stream(&self, process: &mut dyn IRunningProcess) {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                line = process.next_line() => Some(line),
            };

            let step = match next {
                None => {
                    debug!(drive = %self.drive_name, "Journal reader cancelled");
                    Step::Stop
                }
                Some(Ok(Some(line))) => self.deliver(line).await,
                Some(Ok(None)) => {
                    self.finish(process).await;
                    return;
                }
                Some(Err(e)) => {
                    self.report(MonitorError::Read(e)).await;
                    Step::Stop
                }
            };

            if let Step::Stop = step {
                if let Err(e) = process.kill().await {
                    warn!(error = %e, "Failed to stop journal reader");
                }
                if let Err(e) = process.wait().await {
                    debug!(error = %e, "Failed to reap journal reader");
                }
                return;
            }
        }
    }

    async fn deliver(&self, line: String) -> Step {
        let entry = match LogEntry::from_json_line(&line) {
            Ok(entry) => entry,
            Err(source) => {
                warn!(drive = %self.drive_name, error = %source, "Undecodable journal line");
                self.report(MonitorError::Decode { line, source }).await;
                return Step::Continue;
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Step::Stop,
            sent = self.entries.send(entry) => match sent {
                Ok(()) => Step::Continue,
                Err(_) => {
                    debug!(drive = %self.drive_name, "Entry consumer went away");
                    Step::Stop
                }
            },
        }
    }

    /// journalctl closed its output; report a failure status
    async fn finish(&self, process: &mut dyn IRunningProcess) {
        match process.wait().await {
            Ok(status) if status.success() => {
                debug!(drive = %self.drive_name, "Journal reader finished");
            }
            Ok(status) => {
                error!(drive = %self.drive_name, %status, "Journal reader exited");
                self.report(MonitorError::Exited(status)).await;
            }
            Err(e) => self.report(MonitorError::Read(e)).await,
        }
    }

    async fn report(&self, err: MonitorError) {
        // nobody listening for errors is not a reason to stop reading
        if self.errors.send(err).await.is_err() {
            debug!(drive = %self.drive_name, "Error consumer went away");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rclonemgr_core::testing::{FakeProcessRunner, FakeScript};

    fn journal_line(message: &str) -> String {
        serde_json::json!({
            "MESSAGE": message,
            "__REALTIME_TIMESTAMP": "1700000000000000",
            "PRIORITY": "3",
            "_SYSTEMD_UNIT": "rclone@team.service",
        })
        .to_string()
    }

    fn monitor(runner: Arc<FakeProcessRunner>) -> LogMonitor {
        LogMonitor::new(runner, JournalConfig::default())
    }

    #[test]
    fn test_command() {
        let runner = Arc::new(FakeProcessRunner::new([]));
        let spec = monitor(runner).command("team");
        assert_eq!(spec.program, "journalctl");
        assert_eq!(
            spec.args,
            vec![
                "--output=json",
                "--follow",
                "--user",
                "--since=now",
                "--unit=rclone@team.service"
            ]
        );
    }

    #[tokio::test]
    async fn test_entries_arrive_in_order() {
        let runner = Arc::new(FakeProcessRunner::new([FakeScript::lines([
            journal_line("first"),
            journal_line("second"),
            journal_line("third"),
        ])]));
        let mut handle = monitor(runner).start("team", CancellationToken::new());

        let mut messages = Vec::new();
        while let Some(entry) = handle.entries.recv().await {
            messages.push(entry.message);
        }
        assert_eq!(messages, vec!["first", "second", "third"]);
        assert!(handle.errors.recv().await.is_none());
        assert_eq!(*handle.state.borrow(), MonitorState::Stopped);
    }

    #[tokio::test]
    async fn test_decode_error_does_not_stop_stream() {
        let runner = Arc::new(FakeProcessRunner::new([FakeScript::lines([
            journal_line("before"),
            "{not json".to_string(),
            journal_line("after"),
        ])]));
        let mut handle = monitor(runner).start("team", CancellationToken::new());

        assert_eq!(handle.entries.recv().await.unwrap().message, "before");
        assert_eq!(handle.entries.recv().await.unwrap().message, "after");
        assert!(handle.entries.recv().await.is_none());

        match handle.errors.recv().await {
            Some(MonitorError::Decode { line, .. }) => assert_eq!(line, "{not json"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_spawn_failure_reports_once_and_stops() {
        let runner = Arc::new(FakeProcessRunner::failing());
        let mut handle = monitor(runner).start("team", CancellationToken::new());

        assert!(matches!(handle.errors.recv().await, Some(MonitorError::Spawn(_))));
        assert!(handle.errors.recv().await.is_none());
        assert!(handle.entries.recv().await.is_none());
        handle.task.await.unwrap();
        assert_eq!(*handle.state.borrow(), MonitorState::Stopped);
    }

    #[tokio::test]
    async fn test_failed_exit_is_reported() {
        let runner = Arc::new(FakeProcessRunner::new([
            FakeScript::lines([journal_line("only")]).exit_code(1),
        ]));
        let mut handle = monitor(runner).start("team", CancellationToken::new());

        assert_eq!(handle.entries.recv().await.unwrap().message, "only");
        assert!(matches!(
            handle.errors.recv().await,
            Some(MonitorError::Exited(ProcessExit { code: Some(1) }))
        ));
    }

    #[tokio::test]
    async fn test_cancellation_kills_reader() {
        let runner = Arc::new(FakeProcessRunner::new([
            FakeScript::lines([journal_line("live")]).hang(),
        ]));
        let cancel = CancellationToken::new();
        let mut handle = monitor(runner.clone()).start("team", cancel.clone());

        assert_eq!(handle.entries.recv().await.unwrap().message, "live");
        assert_eq!(*handle.state.borrow(), MonitorState::Streaming);

        cancel.cancel();
        handle
            .state
            .wait_for(|state| *state == MonitorState::Stopped)
            .await
            .unwrap();
        assert_eq!(runner.kill_count(), 1);
        assert!(handle.entries.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_reads_nothing() {
        let runner = Arc::new(FakeProcessRunner::new([FakeScript::lines([journal_line("x")])]));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut handle = monitor(runner.clone()).start("team", cancel);

        assert!(handle.entries.recv().await.is_none());
        assert_eq!(runner.kill_count(), 1);
    }
}
