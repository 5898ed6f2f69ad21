use thiserror::Error;

pub use crate::cluster::ClientError;

#[derive(Debug, Error)]
pub enum CloudSolveError {
    #[error("A task is already running on this machine")]
    MachineBusy,

    #[error("No target task set. Call `set_target` before `start`.")]
    NoTarget,

    #[error("Cluster error: {0}")]
    Client(#[from] ClientError),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T, E = CloudSolveError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_error_converts() {
        let err: CloudSolveError = ClientError::Unauthorized.into();
        assert!(matches!(err, CloudSolveError::Client(ClientError::Unauthorized)));
        assert!(err.to_string().starts_with("Cluster error:"));
    }

    #[test]
    fn busy_display() {
        assert_eq!(
            CloudSolveError::MachineBusy.to_string(),
            "A task is already running on this machine"
        );
    }
}
