//! Background cluster status polling.
//!
//! The cluster has no push channel, so progress is observed by calling
//! `checkin/` on an interval until nothing is processing or queued. A
//! [`StatusPoller`] runs at most one such loop at a time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::{Notify, watch};

use crate::cluster::{ClusterClient, ClusterCounts, short_id};
use crate::events::{Event, EventSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Running,
}

/// Handle to the single status loop of a machine. Clones share the loop.
#[derive(Clone)]
pub struct StatusPoller {
    inner: Arc<Inner>,
}

struct Inner {
    state: watch::Sender<PollerState>,
    do_check: AtomicBool,
    wake: Notify,
    interval: Duration,
}

// Flips the state back to idle when the loop task ends, even on panic.
struct IdleOnDrop(Arc<Inner>);

impl Drop for IdleOnDrop {
    fn drop(&mut self) {
        self.0.do_check.store(false, Ordering::Release);
        self.0.state.send_replace(PollerState::Idle);
    }
}

impl StatusPoller {
    pub fn new(interval: Duration) -> Self {
        let (state, _) = watch::channel(PollerState::Idle);
        Self {
            inner: Arc::new(Inner {
                state,
                do_check: AtomicBool::new(false),
                wake: Notify::new(),
                interval,
            }),
        }
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    pub fn state(&self) -> PollerState {
        *self.inner.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == PollerState::Running
    }

    /// The loop's continuation flag.
    pub fn is_checking(&self) -> bool {
        self.inner.do_check.load(Ordering::Acquire)
    }

    /// Spawns the polling loop on the current tokio runtime unless one is
    /// already alive. Returns `true` when a new loop was started.
    pub fn start(&self, client: ClusterClient, sink: Arc<dyn EventSink>) -> bool {
        let claimed = self.inner.state.send_if_modified(|state| match state {
            PollerState::Idle => {
                *state = PollerState::Running;
                true
            }
            PollerState::Running => false,
        });
        if !claimed {
            tracing::debug!("status poller already running");
            return false;
        }

        self.inner.do_check.store(true, Ordering::Release);
        let guard = IdleOnDrop(Arc::clone(&self.inner));
        tokio::spawn(async move {
            tracing::debug!("status poller started");
            poll_until_idle(&guard.0, &client, sink.as_ref()).await;
            tracing::debug!("status poller stopped");
            drop(guard);
        });
        true
    }

    /// Clears the continuation flag and wakes the loop if it is sleeping.
    /// An in-flight status request is allowed to finish.
    pub fn stop(&self) {
        self.inner.do_check.store(false, Ordering::Release);
        // No stored permit: a later loop must not inherit this wake-up.
        self.inner.wake.notify_waiters();
    }

    /// Resolves once no loop is alive.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.state.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|s| *s == PollerState::Idle).await;
    }
}

async fn poll_until_idle(inner: &Inner, client: &ClusterClient, sink: &dyn EventSink) {
    while inner.do_check.load(Ordering::Acquire) {
        match client.checkin().await {
            Ok(counts) => {
                let (msg, keep_going) = solver_status(&counts, Local::now());
                sink.emit(Event::SolverStatus(msg));
                if !keep_going {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!("status poll failed: {e}");
                break;
            }
        }

        let notified = inner.wake.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        // A stop issued during the request above is only visible through the flag.
        if !inner.do_check.load(Ordering::Acquire) {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(inner.interval) => {}
            _ = notified => {}
        }
    }
    inner.do_check.store(false, Ordering::Release);
}

/// Turns one `checkin/` payload into a timestamped status line and whether
/// polling should continue.
pub fn solver_status(counts: &ClusterCounts, now: DateTime<Local>) -> (String, bool) {
    let ts = now.format("[%Y-%m-%d %H:%M:%S]");

    if counts.is_idle() {
        return (format!("{ts} No job is being processed or queued\n"), false);
    }

    let mut msg = String::new();
    if let Some(id) = &counts.is_processed {
        msg.push_str(&format!("{ts} Job {} is being processed\n", short_id(id)));
    }
    if let Some(slot) = &counts.next_queue {
        msg.push_str(&format!(
            "{ts} Job {} is at position {} in the queue\n",
            short_id(&slot.job_id),
            slot.position
        ));
    }
    if msg.is_empty() {
        msg = format!(
            "{ts} {} job(s) processing, {} job(s) queued\n",
            counts.processing, counts.queued
        );
    }
    (msg, true)
}
