use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no staff available: roster is empty")]
    NoStaffAvailable,

    #[error("state store unavailable at {}: {reason}", path.display())]
    StoreUnavailable { path: PathBuf, reason: String },

    #[error("mail transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("ticket {message_id} failed: {reason}")]
    Ticket { message_id: String, reason: String },

    #[error("invalid risk level '{0}': must be normal, urgent, critical or SLA_BREACH")]
    InvalidRiskLevel(String),

    #[error("watchdog entry not found: {0}")]
    EntryNotFound(String),

    #[error("invalid message file {}: {reason}", path.display())]
    InvalidMessage { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DispatchError {
    /// Short machine-readable failure kind used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::NoStaffAvailable => "no_staff_available",
            DispatchError::StoreUnavailable { .. } => "store_unavailable",
            DispatchError::TransportUnavailable(_) => "transport_unavailable",
            DispatchError::Ticket { .. } => "ticket_failure",
            DispatchError::InvalidRiskLevel(_) => "invalid_risk_level",
            DispatchError::EntryNotFound(_) => "entry_not_found",
            DispatchError::InvalidMessage { .. } => "invalid_message",
            DispatchError::Io(_) => "io",
            DispatchError::Yaml(_) => "yaml",
            DispatchError::Json(_) => "json",
        }
    }

    pub(crate) fn store(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        DispatchError::StoreUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
