use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::Analysis;

/// The fixed set of tasks a [`Machine`](super::Machine) can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    Prepare,
    Solve,
    Fetch,
    Results,
    Cancel,
    Remove,
    AuthCheck,
    Auth,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Prepare => write!(f, "PREPARE"),
            TaskKind::Solve => write!(f, "SOLVE"),
            TaskKind::Fetch => write!(f, "FETCH"),
            TaskKind::Results => write!(f, "RESULTS"),
            TaskKind::Cancel => write!(f, "CANCEL"),
            TaskKind::Remove => write!(f, "REMOVE"),
            TaskKind::AuthCheck => write!(f, "AUTHCHECK"),
            TaskKind::Auth => write!(f, "AUTH"),
        }
    }
}

/// A task together with its own parameters.
///
/// Cancel and Remove are destructive; the machine runs them as soon as they
/// are started, so any confirmation must happen before `set_target`.
#[derive(Clone, PartialEq)]
pub enum Task {
    Prepare(Analysis),
    Submit,
    Fetch,
    Results { job_id: Option<String> },
    Cancel { job_id: Option<String> },
    Remove { job_id: Option<String> },
    AuthCheck,
    Auth {
        email: Option<String>,
        password: Option<String>,
    },
}

impl Task {
    pub fn kind(&self) -> TaskKind {
        match self {
            Task::Prepare(_) => TaskKind::Prepare,
            Task::Submit => TaskKind::Solve,
            Task::Fetch => TaskKind::Fetch,
            Task::Results { .. } => TaskKind::Results,
            Task::Cancel { .. } => TaskKind::Cancel,
            Task::Remove { .. } => TaskKind::Remove,
            Task::AuthCheck => TaskKind::AuthCheck,
            Task::Auth { .. } => TaskKind::Auth,
        }
    }

    pub fn login(email: impl Into<String>, password: impl Into<String>) -> Self {
        Task::Auth {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Prepare(a) => f.debug_tuple("Prepare").field(&a.name).finish(),
            Task::Submit => write!(f, "Submit"),
            Task::Fetch => write!(f, "Fetch"),
            Task::Results { job_id } => f.debug_struct("Results").field("job_id", job_id).finish(),
            Task::Cancel { job_id } => f.debug_struct("Cancel").field("job_id", job_id).finish(),
            Task::Remove { job_id } => f.debug_struct("Remove").field("job_id", job_id).finish(),
            Task::AuthCheck => write!(f, "AuthCheck"),
            Task::Auth { email, password } => f
                .debug_struct("Auth")
                .field("email", email)
                .field("password", &password.as_ref().map(|_| "<redacted>"))
                .finish(),
        }
    }
}
