//! Optimization run pipeline and autopilot.
//!
//! - [`orchestrator::Orchestrator`] sequences the analysis modules for one run.
//! - [`queue::QueueService`] owns the apply protocol for autopilot queue items.
//! - [`monitor::RevertMonitor`] rolls back applied changes whose traffic drops.
//! - [`sweeper::StaleRunSweeper`] fails runs that outlived their budget.
//!
//! All I/O goes through the collaborator traits in [`store`]; [`postgres`]
//! backs them with the database and [`memory`] keeps them in process.

pub mod completion;
pub mod config;
pub mod error;
pub mod memory;
pub mod modules;
pub mod monitor;
pub mod orchestrator;
pub mod postgres;
pub mod queue;
pub mod ranks;
pub mod store;
pub mod sweeper;

pub use config::{CompletionConfig, EngineConfig};
pub use error::PipelineError;
pub use orchestrator::Orchestrator;
pub use queue::{ApplyOutcome, QueueService};
pub use store::Collaborators;
