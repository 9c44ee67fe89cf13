//! Domain module
//!
//! Ticket state, SLA arithmetic and the workflow rule model. Nothing here
//! performs I/O.

pub mod aggregates;
pub mod value_objects;
pub mod events;
pub mod sla;
pub mod rules;
pub mod notification;

pub use aggregates::*;
pub use value_objects::*;
pub use events::*;
