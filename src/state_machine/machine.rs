use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use super::task::{Task, TaskKind};
use crate::analysis::{InputWriter, JsonInputWriter};
use crate::cluster::ClusterClient;
use crate::config::CloudSolveConfig;
use crate::error::{CloudSolveError, Result};
use crate::events::{Event, EventSink, Level, Report};
use crate::poller::StatusPoller;
use crate::tasks;

/// Tunables a machine needs from the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineOptions {
    pub poll_interval: Duration,
    pub min_error_threshold: f64,
    pub signup_url: Option<String>,
}

impl Default for MachineOptions {
    fn default() -> Self {
        Self::from(&CloudSolveConfig::default())
    }
}

impl From<&CloudSolveConfig> for MachineOptions {
    fn from(config: &CloudSolveConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            min_error_threshold: config.min_error_threshold,
            signup_url: config.signup_url.clone(),
        }
    }
}

/// What one call to [`Machine::start`] did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub task: TaskKind,
    pub failed: bool,
    pub report: Report,
}

/// Runs one task at a time for a document/working-directory pair.
///
/// The synchronous part of a task runs inside `start().await` on the
/// caller's task. Submit and AuthCheck may also start the machine's single
/// [`StatusPoller`], which keeps running after `start` returns until the
/// cluster is idle, a status call fails, or the machine is shut down.
pub struct Machine {
    name: String,
    directory: PathBuf,
    client: ClusterClient,
    sink: Arc<dyn EventSink>,
    writer: Arc<dyn InputWriter>,
    poller: StatusPoller,
    options: MachineOptions,
    target: Mutex<Option<Task>>,
    state: Mutex<Option<TaskKind>>,
    report: Mutex<Report>,
    failed: AtomicBool,
    running: AtomicBool,
    aborted: AtomicBool,
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Machine {
    pub fn new(
        name: impl Into<String>,
        directory: impl Into<PathBuf>,
        client: ClusterClient,
        sink: Arc<dyn EventSink>,
        options: MachineOptions,
    ) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
            client,
            sink,
            writer: Arc::new(JsonInputWriter),
            poller: StatusPoller::new(options.poll_interval),
            options,
            target: Mutex::new(None),
            state: Mutex::new(None),
            report: Mutex::new(Report::default()),
            failed: AtomicBool::new(false),
            running: AtomicBool::new(false),
            aborted: AtomicBool::new(false),
        }
    }

    /// Replaces the input writer used by Prepare.
    pub fn with_writer(mut self, writer: Arc<dyn InputWriter>) -> Self {
        self.writer = writer;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn client(&self) -> &ClusterClient {
        &self.client
    }

    pub fn poller(&self) -> &StatusPoller {
        &self.poller
    }

    pub fn options(&self) -> &MachineOptions {
        &self.options
    }

    pub(crate) fn writer(&self) -> &dyn InputWriter {
        self.writer.as_ref()
    }

    pub fn set_target(&self, task: Task) {
        *self.target.lock() = Some(task);
    }

    pub fn target(&self) -> Option<TaskKind> {
        self.target.lock().as_ref().map(Task::kind)
    }

    /// The task most recently entered.
    pub fn state(&self) -> Option<TaskKind> {
        *self.state.lock()
    }

    pub fn failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn report(&self) -> Report {
        self.report.lock().clone()
    }

    /// Runs the current target to completion.
    ///
    /// Fails with [`CloudSolveError::MachineBusy`] while another run is in
    /// progress and with [`CloudSolveError::NoTarget`] if nothing was set.
    /// Task failures are not errors: they end up in the returned summary.
    pub async fn start(&self) -> Result<RunSummary> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CloudSolveError::MachineBusy);
        }
        let _running = RunningGuard(&self.running);

        let task = self.target.lock().clone().ok_or(CloudSolveError::NoTarget)?;
        let kind = task.kind();

        *self.state.lock() = Some(kind);
        self.failed.store(false, Ordering::Release);
        self.aborted.store(false, Ordering::Release);
        self.report.lock().clear();

        tracing::info!(task = %kind, directory = %self.directory.display(), "task started");
        self.sink.emit(Event::Started(kind));

        match task {
            Task::Prepare(analysis) => tasks::prepare::run(self, analysis),
            Task::Submit => tasks::submit::run(self).await,
            Task::Fetch => tasks::fetch::run(self).await,
            Task::Results { job_id } => tasks::results::run(self, job_id).await,
            Task::Cancel { job_id } => {
                tasks::mutate::run(self, tasks::mutate::Mutation::Cancel, job_id).await
            }
            Task::Remove { job_id } => {
                tasks::mutate::run(self, tasks::mutate::Mutation::Remove, job_id).await
            }
            Task::AuthCheck => tasks::auth::check(self).await,
            Task::Auth { email, password } => tasks::auth::toggle(self, email, password).await,
        }

        let failed = self.failed();
        tracing::info!(task = %kind, failed, "task finished");
        self.sink.emit(Event::Stopped { task: kind, failed });

        Ok(RunSummary {
            task: kind,
            failed,
            report: self.report(),
        })
    }

    /// Asks the running task to stop at its next checkpoint. In-flight
    /// requests are not interrupted.
    pub fn abort(&self) {
        if self.is_running() {
            tracing::info!("abort requested");
            self.aborted.store(true, Ordering::Release);
        }
    }

    /// Stops the status poller. Called before the machine is discarded.
    pub fn shutdown(&self) {
        self.poller.stop();
    }

    pub(crate) fn emit(&self, event: Event) {
        self.sink.emit(event);
    }

    fn line(&self, level: Level, line: String) {
        self.report.lock().push(level, line.clone());
        self.sink.emit(match level {
            Level::Status => Event::Status(line),
            Level::Warning => Event::Warning(line),
            Level::Error => Event::Error(line),
        });
    }

    pub(crate) fn status(&self, line: impl Into<String>) {
        self.line(Level::Status, line.into());
    }

    pub(crate) fn warning(&self, line: impl Into<String>) {
        self.line(Level::Warning, line.into());
    }

    pub(crate) fn error(&self, line: impl Into<String>) {
        self.line(Level::Error, line.into());
    }

    pub(crate) fn fail(&self) {
        self.failed.store(true, Ordering::Release);
    }

    /// Reports and fails the run if `abort` was requested.
    pub(crate) fn check_abort(&self) -> bool {
        if self.aborted.load(Ordering::Acquire) {
            self.error("Aborted.\n");
            self.fail();
            return true;
        }
        false
    }

    pub(crate) fn start_poller(&self) -> bool {
        self.poller.start(self.client.clone(), Arc::clone(&self.sink))
    }

    pub(crate) fn auth_guidance(&self) -> String {
        match &self.options.signup_url {
            Some(url) => format!(
                "Please, authenticate yourself.\n\nIf you don't have an account yet, please sign up at {url}\n"
            ),
            None => "Please, authenticate yourself.\n".to_string(),
        }
    }
}

impl Drop for Machine {
    fn drop(&mut self) {
        self.poller.stop();
    }
}
