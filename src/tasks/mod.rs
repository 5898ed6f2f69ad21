//! Per-task logic run by [`Machine::start`](crate::state_machine::Machine::start).
//!
//! Each task reports through the machine's `status`/`warning`/`error`
//! helpers and calls `fail()` to mark the run failed; none of them return
//! errors, so the machine is always callable again afterwards.

pub(crate) mod auth;
pub(crate) mod fetch;
pub(crate) mod mutate;
pub(crate) mod prepare;
pub(crate) mod results;
pub(crate) mod submit;

use crate::cluster::{ClusterCounts, short_id};
use crate::events::Event;
use crate::state_machine::Machine;

/// Human-readable completed/processing/queued summary.
pub fn checkin_summary(counts: &ClusterCounts) -> String {
    let mut msg = format!(
        "    {} job(s) have been completed\n    {} job(s) being processed\n    {} job(s) are queued\n\n",
        counts.completed, counts.processing, counts.queued
    );
    if let Some(slot) = &counts.next_queue {
        msg.push_str(&format!(
            "The first pending job in the queue is at position: {} (ID: {})\n",
            slot.position,
            short_id(&slot.job_id)
        ));
    }
    msg
}

/// Auth failures tell the caller to log in; the run is marked failed.
pub(crate) fn report_auth_required(machine: &Machine) {
    machine.status(machine.auth_guidance());
    machine.emit(Event::NeedAuth);
    machine.fail();
}

/// Re-reads cluster status and the job list after a mutating call so the
/// caller's view stays current. Problems here are reported but do not fail
/// the run: the mutation itself already succeeded.
pub(crate) async fn refresh_view(machine: &Machine, what: &str) {
    match machine.client().checkin().await {
        Ok(counts) => machine.status(format!("Cluster status:\n{}", checkin_summary(&counts))),
        Err(e) => machine.warning(format!("Cluster status unavailable: {e}\n")),
    }

    match machine.client().fetch_jobs().await {
        Ok(jobs) => machine.emit(Event::JobsFinished(jobs)),
        Err(e) => {
            machine.warning(format!("{what} failed: {e}\n"));
            machine.emit(Event::JobsFinished(Vec::new()));
            if e.needs_auth() {
                machine.emit(Event::NeedAuth);
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::QueueSlot;

    #[test]
    fn summary_lists_counts_and_next_in_queue() {
        let counts = ClusterCounts {
            completed: 3,
            processing: 1,
            queued: 2,
            is_processed: None,
            next_queue: Some(QueueSlot {
                job_id: "0123456789".into(),
                position: 1,
            }),
        };
        let msg = checkin_summary(&counts);
        assert!(msg.contains("3 job(s) have been completed"));
        assert!(msg.contains("1 job(s) being processed"));
        assert!(msg.contains("2 job(s) are queued"));
        assert!(msg.contains("position: 1 (ID: 01234567)"));
    }
}
