pub mod client;
pub mod error;
pub mod types;

pub use client::{ClusterClient, disposition_filename};
pub use error::ClientError;
pub use types::{ClusterCounts, JobEntry, JobStatus, QueueSlot, TokenResponse, short_id};
