//! Workflow rule model
//!
//! Rules are plain data: a trigger, a conjunction of field conditions and a
//! list of typed actions. They serialize to JSON so the surrounding system
//! can persist and edit them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::aggregates::Ticket;
use crate::domain::value_objects::{Priority, TicketStatus, UserId};
use crate::HelpdeskError;

/// Lifecycle event a rule reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    TicketCreated,
    TicketUpdated,
    StatusChanged,
    TicketAssigned,
    PriorityChanged,
    TicketResolved,
    TicketEscalated,
    ScheduledSweep,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TicketCreated => "ticket_created",
            Self::TicketUpdated => "ticket_updated",
            Self::StatusChanged => "status_changed",
            Self::TicketAssigned => "ticket_assigned",
            Self::PriorityChanged => "priority_changed",
            Self::TicketResolved => "ticket_resolved",
            Self::TicketEscalated => "ticket_escalated",
            Self::ScheduledSweep => "scheduled_sweep",
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketField {
    Status,
    Priority,
    Category,
    AssignedTo,
    CreatedBy,
    Tags,
    /// Compared as days elapsed since creation.
    CreatedAt,
    /// Compared as days elapsed since the last update.
    UpdatedAt,
    /// Compared as days elapsed since resolution.
    ResolvedAt,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: TicketField,
    pub operator: Operator,
    pub value: Value,
}

/// A ticket field resolved for comparison.
#[derive(Clone, Debug, PartialEq)]
enum FieldValue {
    Text(String),
    Number(f64),
    List(Vec<String>),
    Null,
}

/// Elapsed time as fractional days (hours / 24), not calendar days.
pub fn days_since(then: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let hours = (now - then).num_milliseconds() as f64 / 3_600_000.0;
    hours / 24.0
}

impl Condition {
    pub fn new(field: TicketField, operator: Operator, value: impl Into<Value>) -> Self {
        Self { field, operator, value: value.into() }
    }

    pub fn equals(field: TicketField, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Equals, value)
    }

    pub fn evaluate(&self, ticket: &Ticket, now: DateTime<Utc>) -> bool {
        let actual = resolve(self.field, ticket, now);
        match self.operator {
            Operator::Equals => matches_value(self.field, &actual, &self.value),
            Operator::NotEquals => !matches_value(self.field, &actual, &self.value),
            Operator::GreaterThan => compare(self.field, &actual, &self.value)
                .map_or(false, |o| o == std::cmp::Ordering::Greater),
            Operator::LessThan => compare(self.field, &actual, &self.value)
                .map_or(false, |o| o == std::cmp::Ordering::Less),
        }
    }

    fn validate(&self) -> Result<(), HelpdeskError> {
        if matches!(self.operator, Operator::GreaterThan | Operator::LessThan) {
            let numeric = self.value.is_number();
            let priority = self.field == TicketField::Priority
                && self.value.as_str().map_or(false, |s| s.parse::<Priority>().is_ok());
            if !numeric && !priority {
                return Err(HelpdeskError::Validation(format!(
                    "{:?} on {:?} needs a numeric value",
                    self.operator, self.field
                )));
            }
        }
        Ok(())
    }
}

fn resolve(field: TicketField, ticket: &Ticket, now: DateTime<Utc>) -> FieldValue {
    match field {
        TicketField::Status => FieldValue::Text(ticket.status().as_str().to_string()),
        TicketField::Priority => FieldValue::Text(ticket.priority().as_str().to_string()),
        TicketField::Category => FieldValue::Text(ticket.category().to_string()),
        TicketField::AssignedTo => ticket
            .assigned_to()
            .map_or(FieldValue::Null, |a| FieldValue::Text(a.to_string())),
        TicketField::CreatedBy => FieldValue::Text(ticket.created_by().to_string()),
        TicketField::Tags => FieldValue::List(ticket.tags().to_vec()),
        TicketField::CreatedAt => FieldValue::Number(days_since(ticket.created_at(), now)),
        TicketField::UpdatedAt => FieldValue::Number(days_since(ticket.updated_at(), now)),
        TicketField::ResolvedAt => ticket
            .sla()
            .resolved_at
            .map_or(FieldValue::Null, |r| FieldValue::Number(days_since(r, now))),
    }
}

/// Status and priority names match case-insensitively; other text is exact.
fn matches_value(field: TicketField, actual: &FieldValue, expected: &Value) -> bool {
    match (actual, expected) {
        (FieldValue::Null, Value::Null) => true,
        (FieldValue::Text(a), Value::String(e)) if matches!(field, TicketField::Status | TicketField::Priority) => {
            a.eq_ignore_ascii_case(e)
        }
        (FieldValue::Text(a), Value::String(e)) => a == e,
        (FieldValue::Number(a), Value::Number(e)) => e.as_f64().map_or(false, |e| *a == e),
        (FieldValue::List(items), Value::String(e)) => items.iter().any(|i| i == e),
        _ => false,
    }
}

fn compare(field: TicketField, actual: &FieldValue, expected: &Value) -> Option<std::cmp::Ordering> {
    match actual {
        FieldValue::Number(a) => a.partial_cmp(&expected.as_f64()?),
        FieldValue::Text(a) if field == TicketField::Priority => {
            let a = a.parse::<Priority>().ok()?;
            let e = expected.as_str()?.parse::<Priority>().ok()?;
            Some(a.rank().cmp(&e.rank()))
        }
        _ => None,
    }
}

/// Who receives an assignment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentTarget {
    Agent(UserId),
    /// A randomly selected active agent with this specialization.
    Specialist(String),
}

/// Who receives a workflow notification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyTarget {
    Creator,
    Assignee,
    User(UserId),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    AssignToAgent { agent: AgentTarget },
    ChangePriority { value: Priority },
    ChangeStatus { value: TicketStatus },
    AddTag { value: String },
    SendNotification { recipient: NotifyTarget, title: String, message: String },
    EscalateToAdmin,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub trigger: Trigger,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Rule {
    pub fn new(name: impl Into<String>, trigger: Trigger) -> Self {
        Self {
            name: name.into(),
            trigger,
            conditions: vec![],
            actions: vec![],
            enabled: true,
        }
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn then(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Conjunction over the conditions, stopping at the first false one.
    pub fn matches(&self, ticket: &Ticket, now: DateTime<Utc>) -> bool {
        self.conditions.iter().all(|c| c.evaluate(ticket, now))
    }

    pub fn validate(&self) -> Result<(), HelpdeskError> {
        if self.name.trim().is_empty() {
            return Err(HelpdeskError::Validation("rule name is empty".into()));
        }
        if self.actions.is_empty() {
            return Err(HelpdeskError::Validation(format!("rule '{}' has no actions", self.name)));
        }
        self.conditions.iter().try_for_each(Condition::validate)
    }
}

/// Fills `{{ticket_id}}`, `{{title}}`, `{{priority}}`, `{{status}}` and
/// `{{category}}` placeholders.
pub fn render_template(template: &str, ticket: &Ticket) -> String {
    template
        .replace("{{ticket_id}}", ticket.id().as_str())
        .replace("{{title}}", ticket.title())
        .replace("{{priority}}", ticket.priority().as_str())
        .replace("{{status}}", ticket.status().as_str())
        .replace("{{category}}", ticket.category())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T09:00:00Z").unwrap().with_timezone(&Utc)
    }

    fn ticket() -> Ticket {
        Ticket::create("VPN down", UserId::from_string("cust-1"), "technical", Priority::High, t0())
    }

    #[test]
    fn test_equality_conditions() {
        let t = ticket();
        let now = t0();
        assert!(Condition::equals(TicketField::Category, "technical").evaluate(&t, now));
        assert!(Condition::equals(TicketField::Priority, "HIGH").evaluate(&t, now));
        assert!(Condition::equals(TicketField::AssignedTo, Value::Null).evaluate(&t, now));
        assert!(Condition::new(TicketField::Status, Operator::NotEquals, "closed").evaluate(&t, now));
        assert!(!Condition::equals(TicketField::Category, "billing").evaluate(&t, now));
    }

    #[test]
    fn test_user_ids_compare_exactly() {
        let mut t = ticket();
        t.assign(UserId::from_string("agent-1"), t0());
        let now = t0();
        assert!(Condition::equals(TicketField::AssignedTo, "agent-1").evaluate(&t, now));
        assert!(!Condition::equals(TicketField::AssignedTo, "AGENT-1").evaluate(&t, now));
        assert!(!Condition::equals(TicketField::CreatedBy, "Cust-1").evaluate(&t, now));
        assert!(Condition::new(TicketField::CreatedBy, Operator::NotEquals, "CUST-1").evaluate(&t, now));
        assert!(!Condition::equals(TicketField::Category, "Technical").evaluate(&t, now));
        assert!(Condition::equals(TicketField::Status, "OPEN").evaluate(&t, now));
    }

    #[test]
    fn test_elapsed_days_comparison() {
        let t = ticket();
        let now = t0() + Duration::hours(36);
        assert!(Condition::new(TicketField::CreatedAt, Operator::GreaterThan, 1).evaluate(&t, now));
        assert!(Condition::new(TicketField::CreatedAt, Operator::LessThan, 1.6).evaluate(&t, now));
        assert!(!Condition::new(TicketField::CreatedAt, Operator::GreaterThan, 1.5).evaluate(&t, now));
    }

    #[test]
    fn test_resolved_at_null_never_compares() {
        let t = ticket();
        let cond = Condition::new(TicketField::ResolvedAt, Operator::GreaterThan, 0);
        assert!(!cond.evaluate(&t, t0() + Duration::days(30)));
    }

    #[test]
    fn test_priority_ordering() {
        let t = ticket();
        assert!(Condition::new(TicketField::Priority, Operator::GreaterThan, "medium").evaluate(&t, t0()));
        assert!(Condition::new(TicketField::Priority, Operator::LessThan, "urgent").evaluate(&t, t0()));
    }

    #[test]
    fn test_rule_validation() {
        let empty = Rule::new("noop", Trigger::TicketCreated);
        assert!(empty.validate().is_err());

        let bad_operand = Rule::new("bad", Trigger::TicketCreated)
            .when(Condition::new(TicketField::CreatedAt, Operator::GreaterThan, "soon"))
            .then(Action::EscalateToAdmin);
        assert!(bad_operand.validate().is_err());

        let ok = Rule::new("ok", Trigger::TicketCreated)
            .when(Condition::new(TicketField::CreatedAt, Operator::GreaterThan, 2))
            .then(Action::EscalateToAdmin);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_rule_json_shape() {
        let raw = json!({
            "name": "tag-vip",
            "trigger": "ticket_created",
            "conditions": [{ "field": "category", "operator": "equals", "value": "billing" }],
            "actions": [
                { "type": "add_tag", "value": "finance" },
                { "type": "assign_to_agent", "agent": { "specialist": "billing" } },
                { "type": "send_notification", "recipient": "creator", "title": "Hi", "message": "{{title}}" },
                { "type": "escalate_to_admin" }
            ]
        });
        let rule: Rule = serde_json::from_value(raw).unwrap();
        assert!(rule.enabled);
        assert_eq!(rule.actions.len(), 4);
        assert_eq!(rule.actions[1], Action::AssignToAgent { agent: AgentTarget::Specialist("billing".into()) });
    }

    #[test]
    fn test_render_template() {
        let t = ticket();
        let text = render_template("[{{priority}}] {{title}} is {{status}}", &t);
        assert_eq!(text, "[high] VPN down is open");
    }
}
