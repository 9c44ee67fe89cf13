//! Helpdesk configuration

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::aggregates::User;
use crate::domain::sla::SlaPolicy;
use crate::HelpdeskError;

pub const CONFIG_ENV: &str = "HELPDESK_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/opensase/helpdesk.json";

/// Upper bound on every configured interval, window and age: one leap year.
pub const MAX_CONFIG_HOURS: i64 = 366 * 24;
const MAX_CONFIG_MINS: i64 = MAX_CONFIG_HOURS * 60;
const MAX_CONFIG_SECS: u64 = MAX_CONFIG_MINS as u64 * 60;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HelpdeskConfig {
    pub sla_check_interval_secs: u64,
    pub escalation_check_interval_secs: u64,
    pub workflow_sweep_interval_secs: u64,

    /// Warning scan covers tickets due in `[now + start, now + end]`.
    pub warning_window_start_mins: i64,
    pub warning_window_end_mins: i64,
    pub warning_dedup_mins: i64,
    pub breach_dedup_mins: i64,

    /// Lead time for the read-side `warning` classification.
    pub warning_lead_hours: i64,

    pub unassigned_stale_hours: i64,
    pub high_priority_stale_hours: i64,

    pub notify_timeout_secs: u64,

    pub auto_close_grace_days: u32,

    /// Ticket category to agent specialization for auto-assignment.
    pub specialist_routes: BTreeMap<String, String>,

    /// Directory entries for the in-memory directory adapter.
    pub users: Vec<User>,
}

impl Default for HelpdeskConfig {
    fn default() -> Self {
        Self {
            sla_check_interval_secs: 15 * 60,
            escalation_check_interval_secs: 60 * 60,
            workflow_sweep_interval_secs: 24 * 60 * 60,
            warning_window_start_mins: 60,
            warning_window_end_mins: 120,
            warning_dedup_mins: 60,
            breach_dedup_mins: 120,
            warning_lead_hours: 24,
            unassigned_stale_hours: 24,
            high_priority_stale_hours: 4,
            notify_timeout_secs: 10,
            auto_close_grace_days: 7,
            specialist_routes: [("technical", "technical"), ("billing", "billing")]
                .into_iter()
                .map(|(category, tag)| (category.to_string(), tag.to_string()))
                .collect(),
            users: Vec::new(),
        }
    }
}

impl HelpdeskConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn load(path: &str) -> Result<Self, HelpdeskError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HelpdeskError::Config(format!("{}: {}", path, e)))?;
        serde_json::from_str(&content).map_err(|e| HelpdeskError::Config(format!("{}: {}", path, e)))
    }

    /// Load from `$HELPDESK_CONFIG`, falling back to defaults when the file
    /// cannot be read.
    pub fn from_env() -> Self {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "config not loaded, using defaults");
            Self::default()
        })
    }

    pub fn validate(&self) -> Result<(), HelpdeskError> {
        let intervals = [
            ("sla_check_interval_secs", self.sla_check_interval_secs),
            ("escalation_check_interval_secs", self.escalation_check_interval_secs),
            ("workflow_sweep_interval_secs", self.workflow_sweep_interval_secs),
            ("notify_timeout_secs", self.notify_timeout_secs),
        ];
        for (name, secs) in intervals {
            if secs == 0 || secs > MAX_CONFIG_SECS {
                return Err(HelpdeskError::Config(format!("{} must be in 1..={}", name, MAX_CONFIG_SECS)));
            }
        }

        if self.warning_window_start_mins < 0 || self.warning_window_start_mins >= self.warning_window_end_mins {
            return Err(HelpdeskError::Config(format!(
                "warning window [{}, {}] minutes is empty",
                self.warning_window_start_mins, self.warning_window_end_mins
            )));
        }

        let minute_fields = [
            ("warning_window_end_mins", self.warning_window_end_mins),
            ("warning_dedup_mins", self.warning_dedup_mins),
            ("breach_dedup_mins", self.breach_dedup_mins),
        ];
        let hour_fields = [
            ("warning_lead_hours", self.warning_lead_hours),
            ("unassigned_stale_hours", self.unassigned_stale_hours),
            ("high_priority_stale_hours", self.high_priority_stale_hours),
        ];
        for (name, value, max) in minute_fields
            .into_iter()
            .map(|(n, v)| (n, v, MAX_CONFIG_MINS))
            .chain(hour_fields.into_iter().map(|(n, v)| (n, v, MAX_CONFIG_HOURS)))
        {
            if !(0..=max).contains(&value) {
                return Err(HelpdeskError::Config(format!("{} must be in 0..={}", name, max)));
            }
        }

        if i64::from(self.auto_close_grace_days) * 24 > MAX_CONFIG_HOURS {
            return Err(HelpdeskError::Config(format!(
                "auto_close_grace_days must be at most {}",
                MAX_CONFIG_HOURS / 24
            )));
        }

        Ok(())
    }

    pub fn sla_policy(&self) -> SlaPolicy {
        SlaPolicy::new(hours(self.warning_lead_hours))
    }

    pub fn sla_check_interval(&self) -> std::time::Duration {
        seconds(self.sla_check_interval_secs)
    }

    pub fn escalation_check_interval(&self) -> std::time::Duration {
        seconds(self.escalation_check_interval_secs)
    }

    pub fn workflow_sweep_interval(&self) -> std::time::Duration {
        seconds(self.workflow_sweep_interval_secs)
    }

    pub fn notify_timeout(&self) -> std::time::Duration {
        seconds(self.notify_timeout_secs)
    }

    pub fn warning_window(&self) -> (chrono::Duration, chrono::Duration) {
        (minutes(self.warning_window_start_mins), minutes(self.warning_window_end_mins))
    }

    pub fn warning_dedup(&self) -> chrono::Duration {
        minutes(self.warning_dedup_mins)
    }

    pub fn breach_dedup(&self) -> chrono::Duration {
        minutes(self.breach_dedup_mins)
    }

    pub fn unassigned_stale(&self) -> chrono::Duration {
        hours(self.unassigned_stale_hours)
    }

    pub fn high_priority_stale(&self) -> chrono::Duration {
        hours(self.high_priority_stale_hours)
    }
}

// Clamped to the validated range; chrono panics past it.

fn seconds(value: u64) -> std::time::Duration {
    std::time::Duration::from_secs(value.min(MAX_CONFIG_SECS))
}

fn minutes(value: i64) -> chrono::Duration {
    chrono::Duration::minutes(value.clamp(-MAX_CONFIG_MINS, MAX_CONFIG_MINS))
}

fn hours(value: i64) -> chrono::Duration {
    chrono::Duration::hours(value.clamp(-MAX_CONFIG_HOURS, MAX_CONFIG_HOURS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = HelpdeskConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sla_check_interval().as_secs(), 900);
        assert_eq!(config.specialist_routes.get("billing").map(String::as_str), Some("billing"));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: HelpdeskConfig =
            serde_json::from_str(r#"{ "breach_dedup_mins": 30, "specialist_routes": { "network": "netops" } }"#)
                .unwrap();
        assert_eq!(config.breach_dedup_mins, 30);
        assert_eq!(config.warning_dedup_mins, 60);
        assert_eq!(config.specialist_routes.len(), 1);
    }

    #[test]
    fn test_validation() {
        let empty_window = HelpdeskConfig { warning_window_start_mins: 120, ..HelpdeskConfig::default() };
        assert!(matches!(empty_window.validate(), Err(HelpdeskError::Config(_))));

        let no_interval = HelpdeskConfig { sla_check_interval_secs: 0, ..HelpdeskConfig::default() };
        assert!(no_interval.validate().is_err());
    }

    #[test]
    fn test_oversized_durations_are_rejected() {
        let huge_window = HelpdeskConfig { warning_window_end_mins: 1 << 50, ..HelpdeskConfig::default() };
        assert!(matches!(huge_window.validate(), Err(HelpdeskError::Config(_))));
        let (_, end) = huge_window.warning_window();
        assert_eq!(end, chrono::Duration::minutes(MAX_CONFIG_HOURS * 60));

        let huge_stale = HelpdeskConfig { unassigned_stale_hours: i64::MAX, ..HelpdeskConfig::default() };
        assert!(huge_stale.validate().is_err());
        assert_eq!(huge_stale.unassigned_stale(), chrono::Duration::hours(MAX_CONFIG_HOURS));

        let huge_interval = HelpdeskConfig { sla_check_interval_secs: u64::MAX, ..HelpdeskConfig::default() };
        assert!(huge_interval.validate().is_err());

        let huge_grace = HelpdeskConfig { auto_close_grace_days: u32::MAX, ..HelpdeskConfig::default() };
        assert!(huge_grace.validate().is_err());

        let year = HelpdeskConfig { breach_dedup_mins: MAX_CONFIG_HOURS * 60, ..HelpdeskConfig::default() };
        assert!(year.validate().is_ok());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        assert!(matches!(
            HelpdeskConfig::load("/nonexistent/helpdesk.json"),
            Err(HelpdeskError::Config(_))
        ));
    }
}
