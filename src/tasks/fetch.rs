use super::checkin_summary;
use crate::cluster::{ClusterCounts, JobEntry, JobStatus};
use crate::events::Event;
use crate::state_machine::Machine;

/// Lists the user's jobs. Any failure leaves the caller with an empty list
/// and a login prompt.
pub(crate) async fn run(machine: &Machine) {
    match machine.client().fetch_jobs().await {
        Ok(jobs) => {
            machine.status(format!("Fetch jobs report:\n\n{}", checkin_summary(&tally(&jobs))));
            machine.emit(Event::JobsFinished(jobs));
        }
        Err(e) => {
            if e.needs_auth() {
                machine.status(machine.auth_guidance());
            } else {
                machine.error(format!("Fetching jobs failed: {e}\n"));
            }
            machine.fail();
            machine.emit(Event::JobsFinished(Vec::new()));
            machine.emit(Event::NeedAuth);
        }
    }
}

fn tally(jobs: &[JobEntry]) -> ClusterCounts {
    let mut counts = ClusterCounts::default();
    for job in jobs {
        match job.status {
            JobStatus::Completed => counts.completed += 1,
            JobStatus::Processing => counts.processing += 1,
            JobStatus::Queued => counts.queued += 1,
            JobStatus::Other(_) => {}
        }
    }
    counts
}
