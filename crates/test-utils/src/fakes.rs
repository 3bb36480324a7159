#![allow(dead_code)]

//! In-memory stand-ins for the process and notification backends.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use devloop::config::Config;
use devloop::errors::{DevloopError, Result};
use devloop::exec::{BoxFuture, BuildOutcome, Builder, Supervisor};
use devloop::report::{LineKind, Reporter};
use devloop::watch::FileSystemWatcher;
use notify::event::{CreateKind, DataChange, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind};

/// A fake builder that:
/// - pops scripted outcomes (then keeps succeeding)
/// - optionally takes a while, like a real compiler
/// - counts invocations.
#[derive(Default)]
pub struct FakeBuilder {
    script: Mutex<VecDeque<BuildOutcome>>,
    delay: Duration,
    builds: Mutex<usize>,
}

impl FakeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcomes(outcomes: impl IntoIterator<Item = BuildOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn builds(&self) -> usize {
        *self.builds.lock().unwrap()
    }
}

impl Builder for FakeBuilder {
    fn build(&self) -> BoxFuture<'_, BuildOutcome> {
        Box::pin(async move {
            *self.builds.lock().unwrap() += 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(BuildOutcome::Success)
        })
    }
}

/// Records what the orchestrator asked of the supervisor.
///
/// `running` tracks the generation that would currently be alive, so tests
/// can check a failed build leaves it untouched.
#[derive(Default)]
pub struct FakeSupervisor {
    state: Mutex<SupervisorState>,
    fail_start: bool,
}

#[derive(Debug, Default, Clone)]
pub struct SupervisorState {
    pub restarts: Vec<String>,
    pub stops: usize,
    pub running: Option<usize>,
}

impl FakeSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `restart` fails as if the artifact could not be spawned.
    pub fn failing() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state.lock().unwrap().clone()
    }

    pub fn restarts(&self) -> usize {
        self.state.lock().unwrap().restarts.len()
    }
}

impl Supervisor for FakeSupervisor {
    fn restart<'a>(&'a self, artifact: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.running = None;
            if self.fail_start {
                return Err(DevloopError::Spawn {
                    program: artifact.to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
            state.restarts.push(artifact.to_string());
            state.running = Some(state.restarts.len());
            Ok(())
        })
    }

    fn stop(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.stops += 1;
            state.running = None;
        })
    }
}

/// One call on a [`RecordingReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reported {
    Banner,
    BuildStarted,
    BuildLine(LineKind, String),
    BuildFailed(Option<i32>),
    Restarted,
    StartFailed(String),
    Warning(String),
    Stopping,
    Stopped,
}

/// Reporter that keeps everything in memory.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<Reported>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Reported> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, wanted: &Reported) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| *event == wanted)
            .count()
    }

    pub fn build_lines(&self) -> Vec<(LineKind, String)> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                Reported::BuildLine(kind, line) => Some((*kind, line.clone())),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: Reported) {
        self.events.lock().unwrap().push(event);
    }
}

impl Reporter for RecordingReporter {
    fn banner(&self, _config: &Config) {
        self.push(Reported::Banner);
    }

    fn build_started(&self) {
        self.push(Reported::BuildStarted);
    }

    fn build_line(&self, kind: LineKind, line: &str) {
        self.push(Reported::BuildLine(kind, line.to_string()));
    }

    fn build_failed(&self, code: Option<i32>) {
        self.push(Reported::BuildFailed(code));
    }

    fn restarted(&self, _elapsed: Duration) {
        self.push(Reported::Restarted);
    }

    fn start_failed(&self, err: &DevloopError) {
        self.push(Reported::StartFailed(err.to_string()));
    }

    fn warning(&self, message: &str) {
        self.push(Reported::Warning(message.to_string()));
    }

    fn stopping(&self) {
        self.push(Reported::Stopping);
    }

    fn stopped(&self) {
        self.push(Reported::Stopped);
    }
}

/// Backend that accepts (or refuses) subscriptions and records them.
/// Events are injected by the test through the matching `WatchSinks`.
#[derive(Debug, Clone, Default)]
pub struct FakeWatcher {
    subscribed: Arc<Mutex<Vec<PathBuf>>>,
    refused: Arc<Mutex<HashSet<PathBuf>>>,
}

impl FakeWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refuse(&self, dir: impl Into<PathBuf>) {
        self.refused.lock().unwrap().insert(dir.into());
    }

    pub fn subscriptions(&self) -> Vec<PathBuf> {
        self.subscribed.lock().unwrap().clone()
    }

    pub fn is_subscribed(&self, dir: &Path) -> bool {
        self.subscribed.lock().unwrap().iter().any(|d| d == dir)
    }

    /// How many times `dir` has been subscribed, resubscriptions included.
    pub fn subscription_count(&self, dir: &Path) -> usize {
        self.subscribed.lock().unwrap().iter().filter(|d| *d == dir).count()
    }
}

impl FileSystemWatcher for FakeWatcher {
    fn subscribe(&mut self, dir: &Path) -> Result<()> {
        if self.refused.lock().unwrap().contains(dir) {
            return Err(DevloopError::Watch(notify::Error::path_not_found()));
        }
        self.subscribed.lock().unwrap().push(dir.to_path_buf());
        Ok(())
    }
}

/// Content write, as inotify reports it.
pub fn write_event(path: impl Into<PathBuf>) -> Event {
    Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content))).add_path(path.into())
}

pub fn create_file_event(path: impl Into<PathBuf>) -> Event {
    Event::new(EventKind::Create(CreateKind::File)).add_path(path.into())
}

pub fn create_dir_event(path: impl Into<PathBuf>) -> Event {
    Event::new(EventKind::Create(CreateKind::Folder)).add_path(path.into())
}

pub fn remove_dir_event(path: impl Into<PathBuf>) -> Event {
    Event::new(EventKind::Remove(RemoveKind::Folder)).add_path(path.into())
}

/// A rename whose source lies outside every watched directory.
pub fn moved_in_event(to: impl Into<PathBuf>) -> Event {
    Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To))).add_path(to.into())
}

/// A rename with both ends watched, reported as one `[from, to]` event.
pub fn rename_event(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Event {
    Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
        .add_path(from.into())
        .add_path(to.into())
}
