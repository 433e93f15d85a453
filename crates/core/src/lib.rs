//! Pure domain logic for the optimization autopilot.
//!
//! Nothing in this crate performs I/O. Every threshold, state machine and
//! classification used by the pipeline lives here so it can be tested in
//! isolation.

pub mod alert;
pub mod autopilot;
pub mod decay;
pub mod error;
pub mod freshness;
pub mod queue;
pub mod ranking;
pub mod recommendation;
pub mod run;
pub mod types;
