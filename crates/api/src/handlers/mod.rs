pub mod alerts;
pub mod autopilot;
pub mod optimize;
pub mod recommendations;
pub mod runs;
