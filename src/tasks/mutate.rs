use super::{refresh_view, report_auth_required};
use crate::cluster::short_id;
use crate::state_machine::Machine;

/// The two destructive job operations. Both are already confirmed by the
/// time they get here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mutation {
    Cancel,
    Remove,
}

impl Mutation {
    fn verb(self) -> &'static str {
        match self {
            Mutation::Cancel => "cancel",
            Mutation::Remove => "remove",
        }
    }

    fn past(self) -> &'static str {
        match self {
            Mutation::Cancel => "cancelled",
            Mutation::Remove => "removed",
        }
    }

    fn gerund(self) -> &'static str {
        match self {
            Mutation::Cancel => "Cancelling",
            Mutation::Remove => "Removing",
        }
    }
}

pub(crate) async fn run(machine: &Machine, mutation: Mutation, job_id: Option<String>) {
    let Some(job_id) = job_id else {
        machine.status(format!(
            "Please, fetch and select a job to {} it.\n",
            mutation.verb()
        ));
        return;
    };

    let result = match mutation {
        Mutation::Cancel => machine.client().cancel(&job_id).await,
        Mutation::Remove => machine.client().remove(&job_id).await,
    };

    match result {
        Ok(message) => {
            tracing::info!(job = short_id(&job_id), action = mutation.verb(), "job updated");
            let message = message.unwrap_or_else(|| {
                format!("Job {} {}.", short_id(&job_id), mutation.past())
            });
            machine.status(format!("{}\n\n", message.trim_end()));
            if machine.check_abort() {
                return;
            }
            refresh_view(machine, "Refreshing jobs").await;
        }
        Err(e) if e.needs_auth() => report_auth_required(machine),
        Err(e) => {
            machine.error(format!("{} job may have failed: {e}\n", mutation.gerund()));
            machine.fail();
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::events::Event;
    use crate::state_machine::Task;
    use crate::tasks::testing::{counts, harness, jobs};

    async fn mount_refresh(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/checkin/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(counts(0, 1)))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/fetch/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jobs()))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn without_selection_nothing_is_sent() {
        let server = MockServer::start().await;
        let h = harness(&server, true);

        h.machine.set_target(Task::Cancel { job_id: None });
        assert!(!h.machine.start().await.unwrap().failed);
        h.machine.set_target(Task::Remove { job_id: None });
        assert!(!h.machine.start().await.unwrap().failed);

        let text = h.sink.text();
        assert!(text.contains("select a job to cancel it."));
        assert!(text.contains("select a job to remove it."));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancel_reports_message_and_refreshes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cancel/abc123def4567890/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"message": "Job cancelled."})),
            )
            .expect(1)
            .mount(&server)
            .await;
        mount_refresh(&server).await;
        let h = harness(&server, true);
        h.machine.set_target(Task::Cancel {
            job_id: Some("abc123def4567890".into()),
        });

        let summary = h.machine.start().await.unwrap();
        assert!(!summary.failed);
        let text = h.sink.text();
        assert!(text.contains("Job cancelled.\n"));
        assert!(text.contains("1 job(s) are queued"));
        assert!(h.sink.events().iter().any(|e| matches!(e, Event::JobsFinished(j) if !j.is_empty())));
    }

    #[tokio::test]
    async fn remove_without_message_uses_default() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/remove/abc123def4567890/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;
        mount_refresh(&server).await;
        let h = harness(&server, true);
        h.machine.set_target(Task::Remove {
            job_id: Some("abc123def4567890".into()),
        });

        assert!(!h.machine.start().await.unwrap().failed);
        assert!(h.sink.text().contains("Job abc123de removed."));
    }

    #[tokio::test]
    async fn server_error_is_reported_as_possible_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/remove/j/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let h = harness(&server, true);
        h.machine.set_target(Task::Remove {
            job_id: Some("j".into()),
        });

        let summary = h.machine.start().await.unwrap();
        assert!(summary.failed);
        assert!(h.sink.text().contains("Removing job may have failed: 404 Not Found"));
    }

    #[tokio::test]
    async fn expired_session_asks_for_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cancel/j/"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let h = harness(&server, true);
        h.machine.set_target(Task::Cancel {
            job_id: Some("j".into()),
        });

        let summary = h.machine.start().await.unwrap();
        assert!(summary.failed);
        assert!(h.sink.contains(&Event::NeedAuth));
        // No refresh after a failed mutation.
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }
}
