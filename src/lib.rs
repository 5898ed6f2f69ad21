//! Client-side orchestration of jobs on a remote analysis cluster.
//!
//! A [`Machine`](state_machine::Machine) runs one [`Task`](state_machine::Task)
//! at a time against a working directory: prepare solver input, submit it,
//! list jobs, pull results, cancel or remove jobs, and manage the login
//! session. Progress is reported through an [`EventSink`](events::EventSink);
//! after a submission a background [`StatusPoller`](poller::StatusPoller)
//! keeps reporting cluster status until the queue drains.

pub mod analysis;
pub mod archive;
pub mod cluster;
pub mod config;
pub mod error;
pub mod events;
pub mod poller;
pub mod registry;
pub mod session;
pub mod state_machine;
pub mod tasks;
