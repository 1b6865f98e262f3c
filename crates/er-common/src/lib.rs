//! Shared building blocks for the event registration services.
//!
//! - Logging bootstrap (`tracing` + `tracing-subscriber`)
//! - Health report types returned by the probe endpoints

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use utoipa::ToSchema;

pub mod logging;

pub use logging::{init_logging, LogFormat};

// ============================================================================
// Health Types
// ============================================================================

/// Overall service health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    /// All dependencies reachable
    Up,
    /// Running, but a dependency failed its check
    Degraded,
}

/// Result of checking one dependency (datastore, identity provider, ...)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHealth {
    pub name: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentHealth {
    pub fn healthy(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            healthy: true,
            message: None,
        }
    }

    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            healthy: false,
            message: Some(message.into()),
        }
    }
}

/// Detailed health report
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub version: String,
    pub checked_at: DateTime<Utc>,
    pub components: Vec<ComponentHealth>,
}

impl HealthReport {
    /// Build a report; the status is degraded as soon as one component is unhealthy.
    pub fn from_components(version: impl Into<String>, components: Vec<ComponentHealth>) -> Self {
        let status = if components.iter().all(|c| c.healthy) {
            HealthStatus::Up
        } else {
            HealthStatus::Degraded
        };

        Self {
            status,
            version: version.into(),
            checked_at: Utc::now(),
            components,
        }
    }

    pub fn is_up(&self) -> bool {
        self.status == HealthStatus::Up
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("Logging error: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, CommonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_up_when_all_healthy() {
        let report = HealthReport::from_components(
            "0.1.0",
            vec![ComponentHealth::healthy("datastore")],
        );
        assert!(report.is_up());
    }

    #[test]
    fn test_report_degraded_when_one_unhealthy() {
        let report = HealthReport::from_components(
            "0.1.0",
            vec![
                ComponentHealth::healthy("identity"),
                ComponentHealth::unhealthy("datastore", "connection refused"),
            ],
        );
        assert_eq!(report.status, HealthStatus::Degraded);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "DEGRADED");
        assert_eq!(json["components"][1]["message"], "connection refused");
    }
}
