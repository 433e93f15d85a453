//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts where the entity is created
//!   from outside the repository
//! - A `Deserialize` update DTO (all `Option` fields) for patches

pub mod alert;
pub mod autopilot;
pub mod content_change;
pub mod recommendation;
pub mod run;
pub mod site;
