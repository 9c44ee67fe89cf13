//! Infrastructure layer
//!
//! Adapters for the outbound ports.

pub mod clock;
pub mod notifiers;
pub mod persistence;
pub mod selector;

pub use clock::{ManualClock, SystemClock};
pub use notifiers::{RecordingNotifier, TracingNotifier};
pub use persistence::{InMemoryDirectory, InMemoryNotificationLog, InMemoryTicketRepository};
pub use selector::{FirstAvailableSelector, RandomAgentSelector};
