//! Everything the engine tells its caller goes through an [`EventSink`].
//!
//! The sink is called from the task running on the caller's side and from
//! the status poller task, so implementations must be `Send + Sync` and
//! must not block.

use std::fmt;
use std::path::PathBuf;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::cluster::JobEntry;
use crate::state_machine::TaskKind;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Status(String),
    Warning(String),
    Error(String),
    /// Refreshed job list for the caller's display.
    JobsFinished(Vec<JobEntry>),
    /// The caller should prompt for login.
    NeedAuth,
    /// Outcome of AuthCheck/Auth.
    Authenticated(bool),
    /// Line produced by the background status poller.
    SolverStatus(String),
    /// Upload accepted; full job identifier.
    Submitted { job_id: String },
    /// Results downloaded and unpacked into `path`.
    ResultsSaved { job_id: String, path: PathBuf },
    Started(TaskKind),
    Stopped { task: TaskKind, failed: bool },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Forwards events over an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: Event) {
        // A closed receiver means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn contains(&self, wanted: &Event) -> bool {
        self.events.lock().iter().any(|e| e == wanted)
    }

    /// All status, warning and error text joined, for substring assertions.
    pub fn text(&self) -> String {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Event::Status(s) | Event::Warning(s) | Event::Error(s) | Event::SolverStatus(s) => {
                    Some(s.as_str())
                }
                _ => None,
            })
            .collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: Event) {
        self.events.lock().push(event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Status,
    Warning,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Status => write!(f, "status"),
            Level::Warning => write!(f, "warning"),
            Level::Error => write!(f, "error"),
        }
    }
}

/// Lines emitted during one run of the machine, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    lines: Vec<(Level, String)>,
}

impl Report {
    pub fn push(&mut self, level: Level, line: impl Into<String>) {
        self.lines.push((level, line.into()));
    }

    pub fn lines(&self) -> &[(Level, String)] {
        &self.lines
    }

    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.by_level(Level::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.by_level(Level::Warning)
    }

    fn by_level(&self, level: Level) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .filter(move |(l, _)| *l == level)
            .map(|(_, s)| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_sink_delivers_across_tasks() {
        let (sink, mut rx) = ChannelSink::new();
        let handle = tokio::spawn(async move {
            sink.emit(Event::SolverStatus("tick".into()));
        });
        handle.await.unwrap();
        assert_eq!(rx.recv().await, Some(Event::SolverStatus("tick".into())));
        // Sender dropped with the task.
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn channel_sink_ignores_closed_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.emit(Event::NeedAuth);
    }

    #[test]
    fn memory_sink_text_joins_lines() {
        let sink = MemorySink::new();
        sink.emit(Event::Status("a".into()));
        sink.emit(Event::NeedAuth);
        sink.emit(Event::Error("b".into()));
        assert_eq!(sink.text(), "ab");
        assert!(sink.contains(&Event::NeedAuth));
        assert_eq!(sink.take().len(), 3);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn report_filters_by_level() {
        let mut report = Report::default();
        report.push(Level::Status, "ok");
        report.push(Level::Warning, "careful");
        report.push(Level::Error, "broken");
        assert_eq!(report.errors().collect::<Vec<_>>(), ["broken"]);
        assert_eq!(report.warnings().collect::<Vec<_>>(), ["careful"]);
        report.clear();
        assert!(report.is_empty());
    }
}
