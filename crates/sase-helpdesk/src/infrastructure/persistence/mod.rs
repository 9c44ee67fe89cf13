//! In-memory store implementations used by the daemon and tests

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::domain::aggregates::{Ticket, User};
use crate::domain::notification::NotificationKind;
use crate::domain::value_objects::{Role, TicketId, UserId};
use crate::ports::outbound::{Directory, NotificationLog, RepositoryError, TicketFilter, TicketRepository};

/// In-memory ticket store with compare-and-swap saves
#[derive(Default)]
pub struct InMemoryTicketRepository {
    tickets: RwLock<HashMap<String, Ticket>>,
}

impl InMemoryTicketRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tickets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.read().is_empty()
    }
}

#[async_trait]
impl TicketRepository for InMemoryTicketRepository {
    async fn find_matching(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, RepositoryError> {
        let tickets = self.tickets.read();
        let mut found: Vec<Ticket> = tickets.values().filter(|t| filter.matches(t)).cloned().collect();
        found.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().as_str().cmp(b.id().as_str()))
        });
        Ok(found)
    }

    async fn get(&self, id: &TicketId) -> Result<Option<Ticket>, RepositoryError> {
        Ok(self.tickets.read().get(id.as_str()).cloned())
    }

    async fn insert(&self, ticket: &Ticket) -> Result<Ticket, RepositoryError> {
        let mut tickets = self.tickets.write();
        if tickets.contains_key(ticket.id().as_str()) {
            return Err(RepositoryError::Duplicate(ticket.id().to_string()));
        }

        let mut stored = ticket.clone();
        stored.take_events();
        tickets.insert(stored.id().to_string(), stored.clone());
        Ok(stored)
    }

    async fn save(&self, ticket: &Ticket, expected_version: u64) -> Result<Ticket, RepositoryError> {
        let mut tickets = self.tickets.write();
        let current = tickets
            .get(ticket.id().as_str())
            .ok_or_else(|| RepositoryError::NotFound(format!("ticket {}", ticket.id())))?;

        if current.version() != expected_version {
            return Err(RepositoryError::VersionConflict {
                ticket_id: ticket.id().to_string(),
                expected: expected_version,
                actual: current.version(),
            });
        }

        let stored = ticket.clone().committed(expected_version);
        tickets.insert(stored.id().to_string(), stored.clone());
        Ok(stored)
    }
}

/// Last-fired timestamps keyed by ticket and notification kind
#[derive(Default)]
pub struct InMemoryNotificationLog {
    entries: DashMap<(String, NotificationKind), DateTime<Utc>>,
}

impl InMemoryNotificationLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationLog for InMemoryNotificationLog {
    async fn last_sent(
        &self,
        ticket_id: &TicketId,
        kind: NotificationKind,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        Ok(self.entries.get(&(ticket_id.to_string(), kind)).map(|at| *at))
    }

    async fn record(&self, ticket_id: &TicketId, kind: NotificationKind, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        self.entries.insert((ticket_id.to_string(), kind), at);
        Ok(())
    }
}

/// Static user directory
#[derive(Default)]
pub struct InMemoryDirectory {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: Vec<User>) -> Self {
        let directory = Self::new();
        for user in users {
            directory.upsert(user);
        }
        directory
    }

    pub fn upsert(&self, user: User) {
        self.users.write().insert(user.id.to_string(), user);
    }

    fn sorted(&self, keep: impl Fn(&User) -> bool) -> Vec<User> {
        let mut found: Vec<User> = self.users.read().values().filter(|u| keep(u)).cloned().collect();
        found.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        found
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn find_active_agents_by_specialization(&self, tag: &str) -> Result<Vec<User>, RepositoryError> {
        Ok(self.sorted(|u| u.is_active && u.role == Role::Agent && u.specializes_in(tag)))
    }

    async fn find_active_admins(&self) -> Result<Vec<User>, RepositoryError> {
        Ok(self.sorted(|u| u.is_active && u.role == Role::Admin))
    }

    async fn find_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.read().get(id.as_str()).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Priority;

    fn ticket() -> Ticket {
        Ticket::create("Slow wifi", UserId::from_string("cust-1"), "technical", Priority::Low, Utc::now())
    }

    #[tokio::test]
    async fn test_save_is_compare_and_swap() {
        let repo = InMemoryTicketRepository::new();
        let stored = repo.insert(&ticket()).await.unwrap();
        assert!(stored.pending_events().is_empty());

        let mut first = stored.clone();
        first.add_tag("a", Utc::now());
        let saved = repo.save(&first, 0).await.unwrap();
        assert_eq!(saved.version(), 1);

        let mut stale = stored.clone();
        stale.add_tag("b", Utc::now());
        let err = repo.save(&stale, 0).await.unwrap_err();
        assert!(matches!(err, RepositoryError::VersionConflict { expected: 0, actual: 1, .. }));

        let current = repo.get(stored.id()).await.unwrap().unwrap();
        assert_eq!(current.tags(), ["a".to_string()]);
    }

    #[tokio::test]
    async fn test_duplicate_insert_and_missing_save() {
        let repo = InMemoryTicketRepository::new();
        assert!(repo.is_empty());
        let t = ticket();
        repo.insert(&t).await.unwrap();
        assert!(matches!(repo.insert(&t).await, Err(RepositoryError::Duplicate(_))));

        let unknown = ticket();
        assert!(matches!(repo.save(&unknown, 0).await, Err(RepositoryError::NotFound(_))));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_directory_filters_inactive_and_roles() {
        let directory = InMemoryDirectory::with_users(vec![
            User::new("agent-1", "Ann", Role::Agent).with_specialization("technical"),
            User::new("agent-2", "Ben", Role::Agent).with_specialization("technical").inactive(),
            User::new("agent-3", "Cat", Role::Agent).with_specialization("billing"),
            User::new("admin-1", "Dee", Role::Admin).with_specialization("technical"),
        ]);

        let techs = directory.find_active_agents_by_specialization("technical").await.unwrap();
        assert_eq!(techs.len(), 1);
        assert_eq!(techs[0].id, UserId::from_string("agent-1"));
        assert_eq!(directory.find_active_admins().await.unwrap().len(), 1);
    }
}
