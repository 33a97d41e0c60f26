use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only liveness record. Not read back by the core (only by the periodic
/// email-summary collaborator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    pub id: Uuid,
    pub timestamp_utc: DateTime<Utc>,
    pub detail: String,
}

impl Heartbeat {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp_utc: Utc::now(),
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Warning,
    Error,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorSeverity::Warning => "warning",
            ErrorSeverity::Error => "error",
            ErrorSeverity::Critical => "critical",
        }
    }
}

impl std::str::FromStr for ErrorSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "warning" => Ok(ErrorSeverity::Warning),
            "error" => Ok(ErrorSeverity::Error),
            "critical" => Ok(ErrorSeverity::Critical),
            other => Err(format!("unknown error severity: {other}")),
        }
    }
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only audit record of a fatal/runtime/data error (§7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLog {
    pub id: Uuid,
    pub timestamp_utc: DateTime<Utc>,
    pub severity: ErrorSeverity,
    pub component: String,
    pub message: String,
}

impl ErrorLog {
    pub fn new(severity: ErrorSeverity, component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp_utc: Utc::now(),
            severity,
            component: component.into(),
            message: message.into(),
        }
    }
}
