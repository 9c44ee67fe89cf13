//! Inbound ports (Use case traits)
//!
//! The interactive ticket-mutation boundary. Only `VersionConflict`,
//! `NotFound`, `Unauthorized`, `InvalidTransition` and validation failures
//! reach a caller through here.

use async_trait::async_trait;

use crate::application::dto::{CreateTicketCommand, TicketView, UpdateTicketCommand};
use crate::domain::aggregates::Ticket;
use crate::domain::value_objects::{Actor, TicketId};
use crate::Result;

#[async_trait]
pub trait TicketUseCases: Send + Sync {
    /// Create a ticket and run `ticket_created` rules
    async fn create_ticket(&self, command: CreateTicketCommand, actor: &Actor) -> Result<Ticket>;

    /// Apply an optimistic-locked update and run the matching rules
    async fn update_ticket(&self, command: UpdateTicketCommand, actor: &Actor) -> Result<Ticket>;

    /// Append an internal note (agents and admins only)
    async fn add_internal_note(
        &self,
        ticket_id: &TicketId,
        expected_version: u64,
        text: String,
        actor: &Actor,
    ) -> Result<Ticket>;

    /// Get a ticket with its derived SLA fields
    async fn get_ticket(&self, ticket_id: &TicketId) -> Result<TicketView>;
}
