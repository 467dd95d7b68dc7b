//! In-memory port implementations for tests
//!
//! [`FakeProcessRunner`] replays scripted output instead of starting real
//! processes, and [`FakeDesktop`] records every dialog it is asked to show
//! while answering pickers with preset responses. [`FakeUnitManager`] and
//! [`FakeRemoteConfig`] keep unit states and remotes in memory.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::domain::Drive;
use crate::ports::{
    CancelCallback, DialogError, IDesktop, IProcessRunner, IProgressHandle, IRemoteConfig,
    IRunningProcess, IUnitManager, ProcessError, ProcessExit, ProcessSpec, RemoteCredentials,
    UnitStatus,
};

/// Output and exit code of one fake process
#[derive(Debug, Clone, Default)]
pub struct FakeScript {
    pub lines: Vec<String>,
    pub exit_code: i32,
    /// Keep the stream open after the last line until the process is killed
    pub hang: bool,
}

impl FakeScript {
    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    pub fn hang(mut self) -> Self {
        self.hang = true;
        self
    }
}

/// Called from `wait()` with the zero-based index of the process
pub type ExitHook = Arc<dyn Fn(usize) + Send + Sync>;

/// Process runner that hands out scripted processes in spawn order
#[derive(Default)]
pub struct FakeProcessRunner {
    scripts: Mutex<VecDeque<FakeScript>>,
    spawned: Mutex<Vec<ProcessSpec>>,
    kills: Arc<AtomicUsize>,
    fail_spawn: bool,
    exit_hook: Mutex<Option<ExitHook>>,
}

impl FakeProcessRunner {
    pub fn new(scripts: impl IntoIterator<Item = FakeScript>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            ..Self::default()
        }
    }

    /// A runner whose every spawn fails with `NotFound`
    pub fn failing() -> Self {
        Self {
            fail_spawn: true,
            ..Self::default()
        }
    }

    pub fn on_exit(&self, hook: ExitHook) {
        *self.exit_hook.lock().unwrap() = Some(hook);
    }

    /// Every spec passed to `spawn`, including failed ones
    pub fn spawned(&self) -> Vec<ProcessSpec> {
        self.spawned.lock().unwrap().clone()
    }

    pub fn kill_count(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IProcessRunner for FakeProcessRunner {
    async fn spawn(&self, spec: &ProcessSpec) -> Result<Box<dyn IRunningProcess>, ProcessError> {
        let index = {
            let mut spawned = self.spawned.lock().unwrap();
            spawned.push(spec.clone());
            spawned.len() - 1
        };

        if self.fail_spawn {
            return Err(ProcessError::Spawn {
                program: spec.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such program"),
            });
        }

        let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        Ok(Box::new(FakeProcess {
            index,
            lines: script.lines.into(),
            exit_code: script.exit_code,
            hang: script.hang,
            killed: CancellationToken::new(),
            kills: Arc::clone(&self.kills),
            exit_hook: self.exit_hook.lock().unwrap().clone(),
        }))
    }
}

struct FakeProcess {
    index: usize,
    lines: VecDeque<String>,
    exit_code: i32,
    hang: bool,
    killed: CancellationToken,
    kills: Arc<AtomicUsize>,
    exit_hook: Option<ExitHook>,
}

#[async_trait::async_trait]
impl IRunningProcess for FakeProcess {
    async fn next_line(&mut self) -> Result<Option<String>, ProcessError> {
        if self.killed.is_cancelled() {
            return Ok(None);
        }
        if let Some(line) = self.lines.pop_front() {
            return Ok(Some(line));
        }
        if self.hang {
            self.killed.cancelled().await;
        }
        Ok(None)
    }

    async fn wait(&mut self) -> Result<ProcessExit, ProcessError> {
        if let Some(hook) = &self.exit_hook {
            hook(self.index);
        }
        if self.killed.is_cancelled() {
            return Ok(ProcessExit { code: None });
        }
        Ok(ProcessExit {
            code: Some(self.exit_code),
        })
    }

    async fn kill(&mut self) -> Result<(), ProcessError> {
        self.kills.fetch_add(1, Ordering::SeqCst);
        self.killed.cancel();
        Ok(())
    }
}

/// A dialog interaction recorded by [`FakeDesktop`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogCall {
    Error { title: String, message: String },
    Info { title: String, message: String },
    PickDirectory { title: String },
    PickSaveFile { suggested_name: String },
    Progress { title: String, text: String },
    Percent(u8),
    ProgressClosed,
}

/// Desktop that records dialogs and answers pickers with preset responses
pub struct FakeDesktop {
    calls: Arc<Mutex<Vec<DialogCall>>>,
    directory: Mutex<Result<Option<PathBuf>, DialogError>>,
    save_file: Mutex<Result<Option<PathBuf>, DialogError>>,
    cancel_callback: Arc<Mutex<Option<CancelCallback>>>,
}

impl Default for FakeDesktop {
    fn default() -> Self {
        Self {
            calls: Arc::default(),
            directory: Mutex::new(Ok(None)),
            save_file: Mutex::new(Ok(None)),
            cancel_callback: Arc::default(),
        }
    }
}

impl FakeDesktop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer_directory(self, answer: Result<Option<PathBuf>, DialogError>) -> Self {
        *self.directory.lock().unwrap() = answer;
        self
    }

    pub fn answer_save_file(self, answer: Result<Option<PathBuf>, DialogError>) -> Self {
        *self.save_file.lock().unwrap() = answer;
        self
    }

    pub fn calls(&self) -> Vec<DialogCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Percentages pushed to progress dialogs, in order
    pub fn percents(&self) -> Vec<u8> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                DialogCall::Percent(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                DialogCall::Error { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn infos(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                DialogCall::Info { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    /// Simulates the user pressing "Cancel" on the open progress dialog
    pub fn cancel_progress(&self) {
        if let Some(callback) = self.cancel_callback.lock().unwrap().take() {
            callback();
        }
    }

    fn record(&self, call: DialogCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl IDesktop for FakeDesktop {
    async fn show_error(&self, title: &str, message: &str) -> Result<(), DialogError> {
        self.record(DialogCall::Error {
            title: title.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }

    async fn show_info(&self, title: &str, message: &str) -> Result<(), DialogError> {
        self.record(DialogCall::Info {
            title: title.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }

    async fn pick_directory(&self, title: &str) -> Result<Option<PathBuf>, DialogError> {
        self.record(DialogCall::PickDirectory {
            title: title.to_string(),
        });
        self.directory.lock().unwrap().clone()
    }

    async fn pick_save_file(
        &self,
        _title: &str,
        _text: &str,
        suggested_name: &str,
    ) -> Result<Option<PathBuf>, DialogError> {
        self.record(DialogCall::PickSaveFile {
            suggested_name: suggested_name.to_string(),
        });
        self.save_file.lock().unwrap().clone()
    }

    async fn show_progress(
        &self,
        title: &str,
        text: &str,
    ) -> Result<Box<dyn IProgressHandle>, DialogError> {
        self.record(DialogCall::Progress {
            title: title.to_string(),
            text: text.to_string(),
        });
        Ok(Box::new(FakeProgress {
            calls: Arc::clone(&self.calls),
            cancel_callback: Arc::clone(&self.cancel_callback),
        }))
    }
}

struct FakeProgress {
    calls: Arc<Mutex<Vec<DialogCall>>>,
    cancel_callback: Arc<Mutex<Option<CancelCallback>>>,
}

#[async_trait::async_trait]
impl IProgressHandle for FakeProgress {
    async fn set_percent(&mut self, percent: u8) -> Result<(), DialogError> {
        self.calls.lock().unwrap().push(DialogCall::Percent(percent));
        Ok(())
    }

    fn on_cancelled(&mut self, callback: CancelCallback) {
        *self.cancel_callback.lock().unwrap() = Some(callback);
    }

    async fn close(self: Box<Self>) -> Result<(), DialogError> {
        self.calls.lock().unwrap().push(DialogCall::ProgressClosed);
        Ok(())
    }
}

/// Unit manager holding unit states in memory
///
/// Unknown units report `inactive`. Every operation is recorded as
/// `"<op> <unit>"` (or `"reload"`), including the ones made to fail.
#[derive(Default)]
pub struct FakeUnitManager {
    states: Mutex<BTreeMap<String, String>>,
    failing: Mutex<BTreeSet<String>>,
    log: Mutex<Vec<String>>,
}

impl FakeUnitManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(self, unit: &str, state: &str) -> Self {
        self.states
            .lock()
            .unwrap()
            .insert(unit.to_string(), state.to_string());
        self
    }

    /// Makes every start, stop, enable and disable of `unit` fail
    pub fn failing_unit(self, unit: &str) -> Self {
        self.failing.lock().unwrap().insert(unit.to_string());
        self
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn state(&self, unit: &str) -> String {
        self.states
            .lock()
            .unwrap()
            .get(unit)
            .cloned()
            .unwrap_or_else(|| "inactive".to_string())
    }

    fn apply(&self, op: &str, unit: &str, state: Option<&str>) -> anyhow::Result<()> {
        self.log.lock().unwrap().push(format!("{op} {unit}"));
        if self.failing.lock().unwrap().contains(unit) {
            anyhow::bail!("Failed to {op} service {unit:?}");
        }
        if let Some(state) = state {
            self.states
                .lock()
                .unwrap()
                .insert(unit.to_string(), state.to_string());
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl IUnitManager for FakeUnitManager {
    async fn start(&self, unit: &str) -> anyhow::Result<()> {
        self.apply("start", unit, Some("active"))
    }

    async fn stop(&self, unit: &str) -> anyhow::Result<()> {
        self.apply("stop", unit, Some("inactive"))
    }

    async fn status(&self, units: &[String]) -> anyhow::Result<Vec<UnitStatus>> {
        Ok(units
            .iter()
            .map(|unit| UnitStatus {
                name: unit.clone(),
                active_state: self.state(unit),
            })
            .collect())
    }

    async fn enable(&self, unit: &str) -> anyhow::Result<()> {
        self.apply("enable", unit, None)
    }

    async fn disable(&self, unit: &str) -> anyhow::Result<()> {
        self.apply("disable", unit, None)
    }

    async fn reload(&self) -> anyhow::Result<()> {
        self.log.lock().unwrap().push("reload".to_string());
        Ok(())
    }
}

/// Remote configuration holding remote names in memory
#[derive(Default)]
pub struct FakeRemoteConfig {
    remotes: Mutex<BTreeSet<String>>,
    fail_listing: bool,
}

impl FakeRemoteConfig {
    pub fn new<I, S>(remotes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            remotes: Mutex::new(remotes.into_iter().map(Into::into).collect()),
            fail_listing: false,
        }
    }

    /// A remote configuration that cannot be listed
    pub fn failing() -> Self {
        Self {
            fail_listing: true,
            ..Self::default()
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.remotes.lock().unwrap().iter().cloned().collect()
    }
}

#[async_trait::async_trait]
impl IRemoteConfig for FakeRemoteConfig {
    async fn remote_names(&self) -> anyhow::Result<Vec<String>> {
        if self.fail_listing {
            anyhow::bail!("rclone listremotes failed");
        }
        Ok(self.names())
    }

    async fn create_or_delete_remote(
        &self,
        drive: &Drive,
        _credentials: &RemoteCredentials,
    ) -> anyhow::Result<()> {
        let mut remotes = self.remotes.lock().unwrap();
        if drive.enabled {
            remotes.insert(drive.drive_name());
        } else {
            remotes.remove(&drive.drive_name());
        }
        Ok(())
    }
}
