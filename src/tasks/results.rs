use std::path::Path;

use super::report_auth_required;
use crate::archive::{extract_archive, result_file_name, save_response};
use crate::cluster::{ClientError, disposition_filename, short_id};
use crate::error::{CloudSolveError, Result};
use crate::events::Event;
use crate::state_machine::Machine;

pub(crate) async fn run(machine: &Machine, job_id: Option<String>) {
    let Some(job_id) = job_id else {
        machine.status("Please, fetch and select a job before pulling.\n");
        return;
    };

    machine.status(format!(
        "Downloading Job {}... This may take a little while.\nThank you for your patience.\n\n",
        short_id(&job_id)
    ));

    match download(machine, &job_id).await {
        Ok(folder) => {
            machine.status(format!(
                "Result files downloaded successfully in {}\n",
                folder.display()
            ));
            machine.emit(Event::ResultsSaved {
                job_id,
                path: folder,
            });
        }
        Err(CloudSolveError::Client(ClientError::NotReady(msg))) => {
            machine.status(format!("{msg}\n"));
        }
        Err(CloudSolveError::Client(e)) if e.needs_auth() => report_auth_required(machine),
        Err(e) => {
            machine.error(format!("Error downloading result: {e}\n"));
            machine.fail();
        }
    }
}

/// Streams the result archive next to the inputs and unpacks it into a
/// folder named after the archive. Returns that folder.
async fn download(machine: &Machine, job_id: &str) -> Result<std::path::PathBuf> {
    let response = machine.client().download(job_id).await?;
    let suggested = disposition_filename(response.headers());

    let directory = machine.directory();
    let file_name = result_file_name(directory, suggested.as_deref())?;
    let archive = directory.join(&file_name);
    let bytes = save_response(response, &archive).await?;
    tracing::debug!(file = %archive.display(), bytes, "result archive saved");

    let folder = directory.join(stem(&file_name));
    let entries = extract_archive(&archive, &folder)?;
    tracing::debug!(entries, folder = %folder.display(), "result archive extracted");

    // Only the unpacked copy is kept.
    if let Err(e) = tokio::fs::remove_file(&archive).await {
        tracing::warn!("could not remove {}: {e}", archive.display());
    }
    Ok(folder)
}

fn stem(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string())
}
