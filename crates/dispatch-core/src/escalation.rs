//! Manager escalations raised by the SLA watchdog.
//!
//! Layout:
//!   .dispatch/escalations.log   human-readable, append-only block per breach
//!
//! Delivery goes through [`EscalationNotifier`] so the watchdog never knows
//! whether a breach ends up in a log file, a mailbox or a test recorder.

use crate::error::{DispatchError, Result};
use crate::io;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escalation {
    pub manager: String,
    pub message_id: String,
    pub subject: String,
    pub original_assignee: String,
    pub new_assignee: String,
    pub risk_reason: String,
    pub elapsed_minutes: i64,
    /// Count after this escalation (first breach is 1).
    pub escalation_count: u32,
    pub raised_at: DateTime<Utc>,
}

impl Escalation {
    /// True when the breach could not be handed to someone new.
    pub fn kept_assignee(&self) -> bool {
        self.original_assignee == self.new_assignee
    }

    /// One block of `escalations.log`.
    pub fn render(&self) -> String {
        let stamp = self.raised_at.with_timezone(&Local).format("%Y-%m-%dT%H:%M:%S");
        format!(
            "[{stamp}] ESCALATION\n  \
             Manager: {}\n  \
             Subject: {}\n  \
             Original Assignee: {}\n  \
             New Assignee: {}\n  \
             Risk Type: {}\n  \
             Time Elapsed: {} minutes\n  \
             Escalation Count: {}\n\
             {}\n",
            self.manager,
            self.subject,
            self.original_assignee,
            self.new_assignee,
            self.risk_reason,
            self.elapsed_minutes,
            self.escalation_count,
            "-".repeat(50),
        )
    }
}

pub trait EscalationNotifier {
    fn notify(&mut self, escalation: &Escalation) -> Result<()>;
}

// ---------------------------------------------------------------------------
// File sink
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EscalationLog {
    path: PathBuf,
}

impl EscalationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full log text, empty when nothing has been escalated yet.
    pub fn read(&self) -> Result<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl EscalationNotifier for EscalationLog {
    fn notify(&mut self, escalation: &Escalation) -> Result<()> {
        io::append_text(&self.path, &escalation.render())
            .map_err(|e| DispatchError::store(&self.path, e))?;
        tracing::warn!(
            message_id = %escalation.message_id,
            manager = %escalation.manager,
            new_assignee = %escalation.new_assignee,
            escalation_count = escalation.escalation_count,
            "escalated SLA breach"
        );
        Ok(())
    }
}

/// Keeps every escalation in memory. Used by tests and `--json` reporting.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    pub sent: Vec<Escalation>,
}

impl EscalationNotifier for RecordingNotifier {
    fn notify(&mut self, escalation: &Escalation) -> Result<()> {
        self.sent.push(escalation.clone());
        Ok(())
    }
}
