use super::{refresh_view, report_auth_required};
use crate::archive::{build_archive, collect_inputs};
use crate::cluster::short_id;
use crate::events::Event;
use crate::state_machine::Machine;

pub(crate) async fn run(machine: &Machine) {
    let archive = match collect_inputs(machine.directory())
        .and_then(|files| build_archive(machine.name(), &files))
    {
        Ok(archive) => archive,
        Err(e) => {
            machine.error(format!("Packing the job archive failed: {e}\n"));
            machine.fail();
            return;
        }
    };

    if archive.is_empty() {
        machine.error("Nothing to submit... Your job cannot be submitted.\n");
        machine.fail();
        return;
    }

    let mut listing = format!("{} files were added to the job archive.\n", archive.entries().len());
    for (i, entry) in archive.entries().iter().enumerate() {
        listing.push_str(&format!("    {} {entry}\n", i + 1));
    }
    machine.status(listing);
    for skipped in archive.skipped() {
        machine.warning(format!(
            "{} was left out: another file with the same name is already in the archive.\n",
            skipped.display()
        ));
    }

    if machine.check_abort() {
        return;
    }

    let job_id = match machine.client().upload(&archive).await {
        Ok(job_id) => job_id,
        Err(e) if e.needs_auth() => {
            report_auth_required(machine);
            return;
        }
        Err(e) => {
            machine.error(format!("Upload failed: {e}\n"));
            machine.fail();
            return;
        }
    };

    tracing::info!(job = short_id(&job_id), "job submitted");
    machine.status(format!(
        "Your job has successfully been submitted.\n    Job ID: {}\n\n",
        short_id(&job_id)
    ));
    machine.emit(Event::Submitted { job_id });

    if machine.check_abort() {
        return;
    }

    machine.start_poller();
    refresh_view(machine, "Fetching jobs").await;
}
