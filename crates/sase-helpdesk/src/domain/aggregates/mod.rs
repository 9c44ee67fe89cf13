//! Aggregates
pub mod ticket;
pub mod user;
pub use ticket::{Ticket, TicketSla, InternalNote};
pub use user::User;
