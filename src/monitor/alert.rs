//! Monitor alerts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Alert category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    /// Latency or memory pressure
    Performance,
    /// Failed operations
    Error,
    /// Poor compression ratio
    Threshold,
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertType::Performance => write!(f, "performance"),
            AlertType::Error => write!(f, "error"),
            AlertType::Threshold => write!(f, "threshold"),
        }
    }
}

/// Alert severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Informational
    Low,
    /// Worth a look
    Medium,
    /// Needs attention
    High,
    /// Needs attention now
    Critical,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Low => write!(f, "low"),
            AlertSeverity::Medium => write!(f, "medium"),
            AlertSeverity::High => write!(f, "high"),
            AlertSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// A raised alert. Only `resolved` ever changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionAlert {
    /// Alert id
    pub id: Uuid,
    /// Category
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    /// Severity
    pub severity: AlertSeverity,
    /// Human-readable description
    pub message: String,
    /// When the alert was raised
    pub timestamp: DateTime<Utc>,
    /// Set by `resolve_alert`
    pub resolved: bool,
    /// Measurements behind the alert
    pub data: Option<serde_json::Value>,
}

impl CompressionAlert {
    /// Create an unresolved alert stamped now
    pub fn new(alert_type: AlertType, severity: AlertSeverity, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_type,
            severity,
            message: message.into(),
            timestamp: Utc::now(),
            resolved: false,
            data: None,
        }
    }

    /// Attach measurements
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}
