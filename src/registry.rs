//! One [`Machine`] per open document.
//!
//! A machine is bound to the working directory it was created with. Asking
//! for a document with a different directory retires the old machine
//! (stopping its status poller) and builds a fresh one.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::analysis::{InputWriter, JsonInputWriter};
use crate::cluster::ClusterClient;
use crate::events::EventSink;
use crate::state_machine::{Machine, MachineOptions};

pub struct MachineRegistry {
    client: ClusterClient,
    sink: Arc<dyn EventSink>,
    writer: Arc<dyn InputWriter>,
    options: MachineOptions,
    machines: Mutex<HashMap<String, Arc<Machine>>>,
}

impl MachineRegistry {
    pub fn new(client: ClusterClient, sink: Arc<dyn EventSink>, options: MachineOptions) -> Self {
        Self {
            client,
            sink,
            writer: Arc::new(JsonInputWriter),
            options,
            machines: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_writer(mut self, writer: Arc<dyn InputWriter>) -> Self {
        self.writer = writer;
        self
    }

    /// Returns the document's machine, creating or replacing it as needed.
    pub fn machine_for(&self, document: &str, directory: &Path) -> Arc<Machine> {
        let mut machines = self.machines.lock();
        if let Some(machine) = machines.get(document) {
            if machine.directory() == directory {
                return Arc::clone(machine);
            }
            tracing::debug!(
                document,
                from = %machine.directory().display(),
                to = %directory.display(),
                "working directory changed, replacing machine"
            );
            machine.shutdown();
        }

        let machine = Arc::new(
            Machine::new(
                document,
                directory,
                self.client.clone(),
                Arc::clone(&self.sink),
                self.options.clone(),
            )
            .with_writer(Arc::clone(&self.writer)),
        );
        machines.insert(document.to_string(), Arc::clone(&machine));
        machine
    }

    /// Shuts the document's machine down and forgets it.
    pub fn close(&self, document: &str) -> bool {
        match self.machines.lock().remove(document) {
            Some(machine) => {
                machine.shutdown();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.machines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.lock().is_empty()
    }
}

impl Drop for MachineRegistry {
    fn drop(&mut self) {
        for machine in self.machines.get_mut().values() {
            machine.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use crate::session::{MemoryTokenStore, Session, TokenStore};
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn registry(server: &MockServer) -> MachineRegistry {
        let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::with_session(
            Session::new(Some("tok".into()), Some("ref".into())).unwrap(),
        ));
        let client = ClusterClient::new(server.uri(), tokens).unwrap();
        let options = MachineOptions {
            poll_interval: Duration::from_secs(60),
            ..MachineOptions::default()
        };
        MachineRegistry::new(client, Arc::new(MemorySink::new()), options)
    }

    #[tokio::test]
    async fn same_directory_reuses_machine() {
        let server = MockServer::start().await;
        let registry = registry(&server);
        let dir = tempfile::tempdir().unwrap();

        let a = registry.machine_for("bracket", dir.path());
        let b = registry.machine_for("bracket", dir.path());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);

        let other = registry.machine_for("beam", dir.path());
        assert!(!Arc::ptr_eq(&a, &other));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn directory_change_stops_old_poller() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/checkin/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "completed": 0, "processing": 1, "queued": 0
            })))
            .mount(&server)
            .await;
        let registry = registry(&server);
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();

        let old = registry.machine_for("bracket", first.path());
        assert!(old.start_poller());
        assert!(old.poller().is_running());

        let new = registry.machine_for("bracket", second.path());
        assert!(!Arc::ptr_eq(&old, &new));
        assert_eq!(new.directory(), second.path());

        tokio::time::timeout(Duration::from_secs(5), old.poller().wait_idle())
            .await
            .unwrap();
        assert!(!new.poller().is_running());
    }

    #[tokio::test]
    async fn close_forgets_the_document() {
        let server = MockServer::start().await;
        let registry = registry(&server);
        let dir = tempfile::tempdir().unwrap();

        let first = registry.machine_for("bracket", dir.path());
        assert!(registry.close("bracket"));
        assert!(!registry.close("bracket"));
        assert!(registry.is_empty());

        let again = registry.machine_for("bracket", dir.path());
        assert!(!Arc::ptr_eq(&first, &again));
    }
}
