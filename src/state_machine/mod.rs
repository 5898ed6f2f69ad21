mod machine;
mod task;

pub use machine::{Machine, MachineOptions, RunSummary};
pub use task::{Task, TaskKind};
