//! Autopilot event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`AutopilotEvent`]: the event envelope published by runs and the queue.
//! - [`EventLogger`]: background consumer that writes every event to the log.

pub mod bus;
pub mod logger;

pub use bus::{AutopilotEvent, EventBus};
pub use logger::EventLogger;
