//! Helpdesk value objects
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::HelpdeskError;

/// Ticket identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(String);

impl TicketId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User identifier (customers, agents and admins share one id space)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Priority::Low, Priority::Medium, Priority::High, Priority::Urgent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Urgent => 3,
        }
    }

    /// Unrecognised labels map to medium.
    pub fn parse_or_default(label: &str) -> Self {
        label.parse().unwrap_or_default()
    }
}

impl FromStr for Priority {
    type Err = HelpdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(HelpdeskError::Validation(format!("unknown priority '{}'", other))),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
    Cancelled,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Statuses the monitor and escalation scans work on.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Open | Self::InProgress)
    }

    /// No further SLA computation happens in these states.
    pub fn is_sla_complete(&self) -> bool {
        matches!(self, Self::Resolved | Self::Closed | Self::Cancelled)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Cancelled)
    }
}

impl FromStr for TicketStatus {
    type Err = HelpdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "in_progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            "closed" => Ok(Self::Closed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(HelpdeskError::Validation(format!("unknown status '{}'", other))),
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Customer,
    Agent,
    Admin,
}

impl Role {
    /// Agents and admins may read and write internal notes.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Self::Agent | Self::Admin)
    }
}

/// Author of an internal note. Escalations are written by the system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteAuthor {
    System,
    User(UserId),
}

/// Authority a mutation is performed under.
///
/// Scheduler-originated work runs as [`Actor::System`] and bypasses the
/// per-ticket modification check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Actor {
    System,
    User { id: UserId, role: Role },
}

impl Actor {
    pub fn user(id: impl Into<String>, role: Role) -> Self {
        Self::User { id: UserId::from_string(id), role }
    }

    pub fn note_author(&self) -> NoteAuthor {
        match self {
            Self::System => NoteAuthor::System,
            Self::User { id, .. } => NoteAuthor::User(id.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_parse_defaults_to_medium() {
        assert_eq!(Priority::parse_or_default("URGENT"), Priority::Urgent);
        assert_eq!(Priority::parse_or_default("critical"), Priority::Medium);
        assert_eq!(Priority::parse_or_default(""), Priority::Medium);
    }

    #[test]
    fn test_status_serde_names() {
        let json = serde_json::to_string(&TicketStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        assert_eq!("in_progress".parse::<TicketStatus>().unwrap(), TicketStatus::InProgress);
    }

    #[test]
    fn test_sla_complete_states() {
        assert!(TicketStatus::Resolved.is_sla_complete());
        assert!(TicketStatus::Cancelled.is_sla_complete());
        assert!(!TicketStatus::InProgress.is_sla_complete());
        assert!(!TicketStatus::Resolved.is_terminal());
    }
}
