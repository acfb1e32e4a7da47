//! Domain model for the Classworks session engine.
//!
//! This crate holds the persistent world state (groups, classrooms,
//! schedules), the subject policies, and the traits through which the engine
//! talks to the host simulation. The tick-driven machinery lives in the
//! `orchestrator` crate.

pub mod domain;
pub mod error;
pub mod settings;

pub use domain::*;
pub use error::{CoreError, Result};
pub use settings::Settings;
