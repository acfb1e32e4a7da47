//! Notification surface for the Classworks engine.
//!
//! This crate provides the event bus and event types the engine uses to
//! surface session lifecycle changes, warnings and completion notices to
//! whatever UI or log sink the host attaches.

mod bus;
mod types;

pub use bus::EventBus;
pub use types::*;
