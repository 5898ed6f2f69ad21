mod cli;
mod ui;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Command};
use cloudsolve::analysis::Analysis;
use cloudsolve::cluster::{ClusterClient, short_id};
use cloudsolve::config::CloudSolveConfig;
use cloudsolve::events::ChannelSink;
use cloudsolve::session::{FileTokenStore, TokenStore};
use cloudsolve::state_machine::{Machine, MachineOptions, Task};
use ui::EventPrinter;

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("cloudsolve=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

/// Asks before a destructive call unless `--yes` was given or there is no
/// job to act on (the machine reports that case itself).
async fn confirmed(action: &str, job_id: Option<&str>, yes: bool) -> anyhow::Result<bool> {
    let Some(job_id) = job_id else {
        return Ok(true);
    };
    if yes {
        return Ok(true);
    }
    let question = format!("{action} job {}?", short_id(job_id));
    let answer = tokio::task::spawn_blocking(move || ui::confirm(&question)).await??;
    Ok(answer)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => CloudSolveConfig::load_from(path)?,
        None => CloudSolveConfig::load()?,
    };
    tracing::debug!(base_url = %config.base_url, "configuration loaded");

    let (task, watch) = match &cli.command {
        Command::Prepare { analysis } => {
            let analysis = Analysis::load(analysis)
                .with_context(|| format!("loading analysis {}", analysis.display()))?;
            (Task::Prepare(analysis), false)
        }
        Command::Submit { watch } => (Task::Submit, *watch),
        Command::Jobs => (Task::Fetch, false),
        Command::Pull { job_id } => (
            Task::Results {
                job_id: job_id.clone(),
            },
            false,
        ),
        Command::Cancel { job_id, yes } => {
            if !confirmed("Cancel", job_id.as_deref(), *yes).await? {
                println!("Nothing was cancelled.");
                return Ok(ExitCode::SUCCESS);
            }
            (
                Task::Cancel {
                    job_id: job_id.clone(),
                },
                false,
            )
        }
        Command::Remove { job_id, yes } => {
            if !confirmed("Remove", job_id.as_deref(), *yes).await? {
                println!("Nothing was removed.");
                return Ok(ExitCode::SUCCESS);
            }
            (
                Task::Remove {
                    job_id: job_id.clone(),
                },
                false,
            )
        }
        Command::Status { watch } => (Task::AuthCheck, *watch),
        Command::Auth { email, password } => (
            Task::Auth {
                email: email.clone(),
                password: password.clone(),
            },
            false,
        ),
    };

    let tokens: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(config.token_path()));
    let client = ClusterClient::from_config(&config, tokens)?;

    let (sink, mut events) = ChannelSink::new();
    let printer = tokio::spawn(async move {
        let mut printer = EventPrinter::new();
        while let Some(event) = events.recv().await {
            printer.handle(&event);
        }
    });

    let machine = Arc::new(Machine::new(
        cli.document_name(),
        cli.dir.clone(),
        client,
        Arc::new(sink),
        MachineOptions::from(&config),
    ));
    machine.set_target(task);

    let mut run = {
        let machine = Arc::clone(&machine);
        tokio::spawn(async move { machine.start().await })
    };
    let finished = tokio::select! {
        joined = &mut run => Some(joined),
        _ = tokio::signal::ctrl_c() => None,
    };
    let summary = match finished {
        Some(joined) => joined??,
        None => {
            machine.abort();
            run.await??
        }
    };

    if watch && !summary.failed && machine.poller().is_running() {
        tokio::select! {
            _ = machine.poller().wait_idle() => {}
            _ = tokio::signal::ctrl_c() => tracing::debug!("watch interrupted"),
        }
    }

    machine.shutdown();
    if tokio::time::timeout(config.request_timeout(), machine.poller().wait_idle())
        .await
        .is_err()
    {
        tracing::warn!("status poller still busy at exit");
    }
    drop(machine);
    // Every sender is gone once the machine and its poller are; let the
    // printer drain what is left.
    if tokio::time::timeout(Duration::from_secs(2), printer).await.is_err() {
        tracing::warn!("event printer did not finish");
    }

    Ok(if summary.failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
