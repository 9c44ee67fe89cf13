//! Directory user entity
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{Role, UserId};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub specializations: Vec<String>,
    pub is_active: bool,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        let id = id.into();
        Self {
            email: format!("{}@example.com", id),
            id: UserId::from_string(id),
            name: name.into(),
            role,
            specializations: vec![],
            is_active: true,
        }
    }

    pub fn with_specialization(mut self, tag: impl Into<String>) -> Self {
        self.specializations.push(tag.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn specializes_in(&self, tag: &str) -> bool {
        self.specializations.iter().any(|s| s == tag)
    }
}
