//! SLA watchdog: open risk tickets and the breach/escalation loop.
//!
//! Layout:
//!   .dispatch/urgent_watchdog.json   `{ message_id: entry, ... }`
//!
//! Entries are created when an urgent or critical ticket is forwarded, mutated
//! in place on every breach, and removed only when the assignee's reply is
//! observed (or an operator resolves them). A breach never drops an entry.

use crate::assign::RoundRobin;
use crate::audit::{AuditLog, AuditRecord, AuditTag};
use crate::classifier::RiskLevel;
use crate::error::{DispatchError, Result};
use crate::escalation::{Escalation, EscalationNotifier};
use crate::filter::ReplyMarkers;
use crate::roster::StaffRoster;
use crate::store::JsonStore;
use crate::ticket::truncate_chars;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// WatchdogEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchdogEntry {
    /// Filled from the table key on load.
    #[serde(skip)]
    pub message_id: String,
    pub subject: String,
    pub assigned_to: String,
    pub sender: String,
    #[serde(alias = "risk_type")]
    pub risk_reason: String,
    #[serde(default = "default_risk_level")]
    pub risk_level: RiskLevel,
    #[serde(alias = "timestamp")]
    pub opened_at: DateTime<Utc>,
    #[serde(default)]
    pub escalation_count: u32,
}

fn default_risk_level() -> RiskLevel {
    RiskLevel::Urgent
}

impl WatchdogEntry {
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        now - self.opened_at
    }

    /// Strictly greater than the limit; exactly at the limit is still in budget.
    pub fn is_breached(&self, now: DateTime<Utc>, sla: Duration) -> bool {
        self.elapsed(now) > sla
    }
}

// ---------------------------------------------------------------------------
// WatchdogTable
// ---------------------------------------------------------------------------

/// Ordered `message_id -> entry` map. The id lives only in the key on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WatchdogTable {
    entries: BTreeMap<String, WatchdogEntry>,
}

impl<'de> Deserialize<'de> for WatchdogTable {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut entries = BTreeMap::<String, WatchdogEntry>::deserialize(deserializer)?;
        for (id, entry) in entries.iter_mut() {
            entry.message_id = id.clone();
        }
        Ok(Self { entries })
    }
}

impl WatchdogTable {
    pub fn insert(&mut self, entry: WatchdogEntry) -> Option<WatchdogEntry> {
        self.entries.insert(entry.message_id.clone(), entry)
    }

    pub fn remove(&mut self, message_id: &str) -> Option<WatchdogEntry> {
        self.entries.remove(message_id)
    }

    pub fn get(&self, message_id: &str) -> Option<&WatchdogEntry> {
        self.entries.get(message_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WatchdogEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Watchdog
// ---------------------------------------------------------------------------

/// Collaborators a scan needs besides the table itself.
pub struct ScanContext<'a> {
    pub round_robin: &'a mut RoundRobin,
    pub roster: &'a StaffRoster,
    pub notifier: &'a mut dyn EscalationNotifier,
    pub audit: &'a AuditLog,
    pub manager: &'a str,
}

pub struct Watchdog {
    store: JsonStore<WatchdogTable>,
    table: WatchdogTable,
    sla: Duration,
    subject_chars: usize,
    dirty: bool,
}

impl Watchdog {
    pub fn open(path: impl Into<PathBuf>, sla: Duration, subject_chars: usize) -> Self {
        let store = JsonStore::new(path);
        let table = store.load();
        Self {
            store,
            table,
            sla,
            subject_chars,
            dirty: false,
        }
    }

    pub fn sla(&self) -> Duration {
        self.sla
    }

    pub fn table(&self) -> &WatchdogTable {
        &self.table
    }

    pub fn entries(&self) -> impl Iterator<Item = &WatchdogEntry> {
        self.table.iter()
    }

    pub fn get(&self, message_id: &str) -> Option<&WatchdogEntry> {
        self.table.get(message_id)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Start tracking a freshly assigned risk ticket. The subject is stored
    /// truncated and the escalation count starts at zero.
    #[allow(clippy::too_many_arguments)]
    pub fn register(
        &mut self,
        message_id: &str,
        subject: &str,
        assigned_to: &str,
        sender: &str,
        risk_level: RiskLevel,
        risk_reason: &str,
        now: DateTime<Utc>,
    ) {
        let entry = WatchdogEntry {
            message_id: message_id.to_string(),
            subject: truncate_chars(subject, self.subject_chars),
            assigned_to: assigned_to.to_string(),
            sender: sender.to_string(),
            risk_reason: risk_reason.to_string(),
            risk_level,
            opened_at: now,
            escalation_count: 0,
        };
        tracing::warn!(
            message_id,
            assigned_to,
            risk = %risk_level,
            "added to watchdog"
        );
        self.table.insert(entry);
        self.persist();
    }

    /// Operator removal by id.
    pub fn resolve(&mut self, message_id: &str) -> Result<WatchdogEntry> {
        let entry = self
            .table
            .remove(message_id)
            .ok_or_else(|| DispatchError::EntryNotFound(message_id.to_string()))?;
        self.persist();
        Ok(entry)
    }

    /// Close the entry an internal reply answers: the entry with the reply's
    /// own id, otherwise the entry assigned to the replying sender whose core
    /// subject equals the reply's. A stored subject cut at `subject_chars`
    /// only has to be a prefix of the reply's core subject.
    pub fn resolve_reply(
        &mut self,
        reply_id: &str,
        sender: &str,
        subject: &str,
        markers: &ReplyMarkers,
    ) -> Option<WatchdogEntry> {
        let key = if self.table.get(reply_id).is_some() {
            Some(reply_id.to_string())
        } else {
            let core = markers.core_subject(subject);
            self.table
                .iter()
                .filter(|e| e.assigned_to.eq_ignore_ascii_case(sender))
                .find(|e| {
                    let stored = markers.core_subject(&e.subject);
                    if stored.is_empty() {
                        false
                    } else if e.subject.chars().count() >= self.subject_chars {
                        core.starts_with(&stored)
                    } else {
                        core == stored
                    }
                })
                .map(|e| e.message_id.clone())
        };

        let entry = self.table.remove(&key?)?;
        tracing::info!(message_id = %entry.message_id, sender, "removed from watchdog");
        self.persist();
        Some(entry)
    }

    /// Reassign and escalate every entry whose SLA has elapsed.
    ///
    /// Each breach consumes a round-robin slot, notifies the manager, resets
    /// the entry's timer to `now`, bumps its escalation count and writes an
    /// `SLA_BREACH` audit row under the previous assignee. With no staff on
    /// the roster the entry keeps its assignee and everything else still
    /// happens. The table is saved once at the end.
    pub fn scan_and_escalate(
        &mut self,
        now: DateTime<Utc>,
        ctx: &mut ScanContext<'_>,
    ) -> Vec<Escalation> {
        let breached: Vec<String> = self
            .table
            .iter()
            .filter(|e| e.is_breached(now, self.sla))
            .map(|e| e.message_id.clone())
            .collect();

        let mut actions = Vec::with_capacity(breached.len());
        for id in breached {
            let Some(entry) = self.table.entries.get_mut(&id) else {
                continue;
            };
            actions.push(escalate_entry(entry, now, ctx));
        }

        if !actions.is_empty() {
            self.persist();
        }
        actions
    }

    /// Re-read the table from disk so resolutions made by another process
    /// (the operator CLI) are seen. Unsaved in-memory changes win over the
    /// file, and an unreadable file keeps the current table.
    pub fn reload(&mut self) {
        if self.dirty {
            tracing::warn!(
                entries = self.table.len(),
                "watchdog table has unsaved changes, not reloading"
            );
            return;
        }
        match self.store.try_load() {
            Ok(table) => self.table = table.unwrap_or_default(),
            Err(e) => tracing::warn!(
                kind = e.kind(),
                error = %e,
                entries = self.table.len(),
                "failed to reload watchdog table, keeping previous"
            ),
        }
    }

    /// Retry a save that failed earlier.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.store.save(&self.table)?;
        self.dirty = false;
        Ok(())
    }

    fn persist(&mut self) {
        match self.store.save(&self.table) {
            Ok(()) => self.dirty = false,
            Err(e) => {
                tracing::warn!(
                    kind = e.kind(),
                    error = %e,
                    entries = self.table.len(),
                    "failed to save watchdog table, continuing in memory"
                );
                self.dirty = true;
            }
        }
    }
}

fn escalate_entry(
    entry: &mut WatchdogEntry,
    now: DateTime<Utc>,
    ctx: &mut ScanContext<'_>,
) -> Escalation {
    let elapsed_minutes = entry.elapsed(now).num_minutes();
    let original = entry.assigned_to.clone();

    tracing::error!(
        message_id = %entry.message_id,
        subject = %truncate_chars(&entry.subject, 50),
        elapsed_minutes,
        "SLA breach"
    );

    let new_assignee = match ctx.round_robin.next_assignee(ctx.roster) {
        Ok(who) => {
            if who != original {
                tracing::warn!(from = %original, to = %who, "reassigning breached ticket");
            }
            who
        }
        Err(e) => {
            tracing::warn!(
                message_id = %entry.message_id,
                kind = e.kind(),
                "no staff to reassign breached ticket, keeping current assignee"
            );
            original.clone()
        }
    };

    let escalation = Escalation {
        manager: ctx.manager.to_string(),
        message_id: entry.message_id.clone(),
        subject: entry.subject.clone(),
        original_assignee: original.clone(),
        new_assignee: new_assignee.clone(),
        risk_reason: entry.risk_reason.clone(),
        elapsed_minutes,
        escalation_count: entry.escalation_count + 1,
        raised_at: now,
    };

    if let Err(e) = ctx.notifier.notify(&escalation) {
        tracing::error!(
            message_id = %entry.message_id,
            kind = e.kind(),
            error = %e,
            "failed to notify manager of SLA breach"
        );
    }

    entry.opened_at = now;
    entry.assigned_to = new_assignee;
    entry.escalation_count += 1;

    let record = AuditRecord::new(
        &now,
        format!("[SLA_FAIL] {}", truncate_chars(&entry.subject, 50)),
        original,
        entry.sender.clone(),
        AuditTag::SlaBreach,
    );
    if let Err(e) = ctx.audit.append(&record) {
        tracing::warn!(
            message_id = %entry.message_id,
            kind = e.kind(),
            error = %e,
            "failed to write SLA audit row"
        );
    }

    escalation
}
