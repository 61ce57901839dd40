//! Dispatch orchestrator: one polling cycle over the inbox, then the SLA scan.
//!
//! Per ticket:
//!
//! ```text
//! received -> [internal reply: tag COMPLETED, resolve watchdog entry, file]
//! received -> classified -> assigned -> forwarded -> {risk: watchdog} -> [tagged, audited, filed]
//! ```
//!
//! Every ticket is handled inside its own error boundary. A failure is logged
//! with the ticket id, subject prefix and failure kind, recorded in the
//! [`CycleReport`], and the loop moves on. A message that failed before it was
//! marked read stays unread and is retried on the next cycle. Filing moves the
//! message before marking it read, so a failed move is retried too.
//!
//! A retried message that was already forwarded or closed is only re-filed,
//! never forwarded a second time. It is recognised by a `[COMPLETED: ...]`
//! subject, by an `[Assigned: ...]` subject from a non-staff sender, or by an
//! earlier attempt in this process that got past the forward.

use crate::assign::RoundRobin;
use crate::audit::{AuditLog, AuditRecord, COMPLETED_ASSIGNEE};
use crate::classifier::{RiskClassifier, RiskLevel, RiskVerdict};
use crate::config::Config;
use crate::error::{DispatchError, Result};
use crate::escalation::{Escalation, EscalationLog, EscalationNotifier};
use crate::paths;
use crate::roster::StaffRoster;
use crate::ticket::Ticket;
use crate::transport::{InboundMessage, Mailbox};
use crate::watchdog::{ScanContext, Watchdog};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TicketOutcome {
    /// A staff reply was recognised and filed.
    Closed {
        message_id: String,
        sender: String,
        /// Watchdog entry the reply resolved, if any.
        resolved: Option<String>,
    },
    /// A new ticket was forwarded to `assignee`.
    Assigned {
        message_id: String,
        assignee: String,
        level: RiskLevel,
        reason: String,
        watched: bool,
    },
    /// Left unread for the next cycle because nobody is on the roster.
    Skipped { message_id: String, reason: String },
    /// Handled on an earlier cycle but not filed; only the filing was retried.
    Refiled { message_id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketFailure {
    pub message_id: String,
    pub subject: String,
    pub kind: &'static str,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub outcomes: Vec<TicketOutcome>,
    pub failures: Vec<TicketFailure>,
    pub escalations: Vec<Escalation>,
    /// Set when the inbound pass was skipped because the mailbox was unreachable.
    pub transport_error: Option<String>,
}

impl CycleReport {
    pub fn assigned(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TicketOutcome::Assigned { .. }))
            .count()
    }

    pub fn closed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TicketOutcome::Closed { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TicketOutcome::Skipped { .. }))
            .count()
    }

    pub fn refiled(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TicketOutcome::Refiled { .. }))
            .count()
    }

    pub fn is_idle(&self) -> bool {
        self.outcomes.is_empty() && self.failures.is_empty() && self.escalations.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct Dispatcher<N = EscalationLog> {
    root: PathBuf,
    config: Config,
    classifier: RiskClassifier,
    roster: StaffRoster,
    round_robin: RoundRobin,
    watchdog: Watchdog,
    audit: AuditLog,
    notifier: N,
    /// Forwarded tickets whose subject tag was not written yet, keyed by id.
    unfiled: BTreeMap<String, AuditRecord>,
}

impl Dispatcher<EscalationLog> {
    /// Load config and state from a dispatch root. Escalations go to
    /// `.dispatch/escalations.log`.
    pub fn open(root: &Path) -> Result<Self> {
        let config = Config::load(root)?;
        let notifier = EscalationLog::new(paths::escalations_path(root));
        Ok(Self::with_notifier(root, config, notifier))
    }
}

impl<N: EscalationNotifier> Dispatcher<N> {
    pub fn with_notifier(root: &Path, config: Config, notifier: N) -> Self {
        let classifier = RiskClassifier::new(&config.rules);
        let round_robin = RoundRobin::open(paths::roster_state_path(root));
        let watchdog = Watchdog::open(
            paths::watchdog_path(root),
            config.sla_limit(),
            config.watchdog_subject_chars,
        );
        let mut dispatcher = Self {
            root: root.to_path_buf(),
            classifier,
            roster: StaffRoster::default(),
            round_robin,
            watchdog,
            audit: AuditLog::new(paths::audit_path(root)),
            notifier,
            config,
            unfiled: BTreeMap::new(),
        };
        dispatcher.reload_roster();
        dispatcher
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn roster(&self) -> &StaffRoster {
        &self.roster
    }

    pub fn round_robin(&self) -> &RoundRobin {
        &self.round_robin
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    pub fn watchdog_mut(&mut self) -> &mut Watchdog {
        &mut self.watchdog
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn classify(&self, ticket: &Ticket) -> RiskVerdict {
        self.classifier
            .classify(&ticket.subject, &ticket.body_excerpt, ticket.high_importance)
    }

    /// Re-read `staff.txt`. An unreadable file keeps the roster from the
    /// previous cycle.
    pub fn reload_roster(&mut self) {
        let path = paths::staff_path(&self.root);
        match StaffRoster::load(&path) {
            Ok(roster) => {
                if roster.is_empty() {
                    tracing::warn!(path = %path.display(), "staff roster is empty");
                }
                self.roster = roster;
            }
            Err(e) => tracing::warn!(
                path = %path.display(),
                kind = e.kind(),
                error = %e,
                staff = self.roster.len(),
                "failed to read staff roster, keeping previous"
            ),
        }
    }

    /// One full cycle: re-save state left dirty by the previous cycle, reload
    /// the roster and watchdog table, process every unread message, then scan
    /// the watchdog.
    pub fn run_cycle<M: Mailbox>(&mut self, mailbox: &mut M, now: DateTime<Utc>) -> CycleReport {
        self.flush_state();
        self.reload_roster();
        self.watchdog.reload();

        let mut report = CycleReport::default();
        match mailbox.fetch_unread() {
            Ok(messages) => {
                for mut msg in messages {
                    self.process_into(&mut msg, now, &mut report);
                }
            }
            Err(e) => {
                tracing::error!(
                    kind = e.kind(),
                    error = %e,
                    "mailbox unavailable, skipping inbound pass"
                );
                report.transport_error = Some(e.to_string());
            }
        }

        report.escalations = self.scan(now);

        if !report.is_idle() {
            tracing::info!(
                assigned = report.assigned(),
                closed = report.closed(),
                skipped = report.skipped(),
                refiled = report.refiled(),
                failed = report.failures.len(),
                escalated = report.escalations.len(),
                "cycle complete"
            );
        }
        report
    }

    /// Handle a single message. Errors are returned, not logged.
    pub fn process_message<Msg: InboundMessage>(
        &mut self,
        msg: &mut Msg,
        now: DateTime<Utc>,
    ) -> Result<TicketOutcome> {
        let ticket = Ticket::from_message(msg, self.config.body_excerpt_chars);
        self.handle(&ticket, msg, now)
    }

    /// Run only the SLA pass.
    pub fn scan(&mut self, now: DateTime<Utc>) -> Vec<Escalation> {
        let mut ctx = ScanContext {
            round_robin: &mut self.round_robin,
            roster: &self.roster,
            notifier: &mut self.notifier,
            audit: &self.audit,
            manager: &self.config.manager,
        };
        self.watchdog.scan_and_escalate(now, &mut ctx)
    }

    /// Retry saves that failed during an earlier cycle.
    pub fn flush_state(&mut self) {
        if let Err(e) = self.round_robin.flush() {
            tracing::warn!(kind = e.kind(), error = %e, "roster state still unsaved");
        }
        if let Err(e) = self.watchdog.flush() {
            tracing::warn!(kind = e.kind(), error = %e, "watchdog table still unsaved");
        }
    }

    fn process_into<Msg: InboundMessage>(
        &mut self,
        msg: &mut Msg,
        now: DateTime<Utc>,
        report: &mut CycleReport,
    ) {
        let ticket = Ticket::from_message(msg, self.config.body_excerpt_chars);
        match self.handle(&ticket, msg, now) {
            Ok(outcome) => report.outcomes.push(outcome),
            Err(DispatchError::NoStaffAvailable) => {
                tracing::error!(
                    message_id = %ticket.message_id,
                    subject = %ticket.subject_prefix(),
                    kind = DispatchError::NoStaffAvailable.kind(),
                    "no staff available, leaving ticket unread"
                );
                report.outcomes.push(TicketOutcome::Skipped {
                    message_id: ticket.message_id.clone(),
                    reason: DispatchError::NoStaffAvailable.to_string(),
                });
            }
            Err(e) => {
                tracing::error!(
                    message_id = %ticket.message_id,
                    subject = %ticket.subject_prefix(),
                    kind = e.kind(),
                    error = %e,
                    "failed to process ticket"
                );
                report.failures.push(TicketFailure {
                    message_id: ticket.message_id.clone(),
                    subject: ticket.subject_prefix(),
                    kind: e.kind(),
                    error: e.to_string(),
                });
            }
        }
    }

    fn handle<Msg: InboundMessage>(
        &mut self,
        ticket: &Ticket,
        msg: &mut Msg,
        now: DateTime<Utc>,
    ) -> Result<TicketOutcome> {
        if self.was_dispatched(ticket) {
            return self.refile(ticket, msg);
        }
        if self
            .config
            .filter
            .is_internal_reply(&ticket.sender, &ticket.subject, &self.roster)
        {
            self.close_reply(ticket, msg, now)
        } else {
            self.assign_new(ticket, msg, now)
        }
    }

    fn close_reply<Msg: InboundMessage>(
        &mut self,
        ticket: &Ticket,
        msg: &mut Msg,
        now: DateTime<Utc>,
    ) -> Result<TicketOutcome> {
        let tagged = format!("[COMPLETED: {}] {}", ticket.sender, ticket.subject);
        msg.rename_subject(&tagged)?;

        let resolved = self
            .watchdog
            .resolve_reply(
                &ticket.message_id,
                &ticket.sender,
                &ticket.subject,
                &self.config.filter,
            )
            .map(|entry| entry.message_id);

        self.record(AuditRecord::new(
            &now,
            tagged,
            COMPLETED_ASSIGNEE,
            ticket.sender.clone(),
            RiskLevel::Normal,
        ));

        msg.move_to(&self.config.processed_folder)?;
        msg.mark_read()?;

        tracing::info!(
            message_id = %ticket.message_id,
            sender = %ticket.sender,
            subject = %ticket.subject_prefix(),
            "closed internal reply"
        );
        Ok(TicketOutcome::Closed {
            message_id: ticket.message_id.clone(),
            sender: ticket.sender.clone(),
            resolved,
        })
    }

    fn assign_new<Msg: InboundMessage>(
        &mut self,
        ticket: &Ticket,
        msg: &mut Msg,
        now: DateTime<Utc>,
    ) -> Result<TicketOutcome> {
        let verdict = self.classify(ticket);
        if verdict.level.is_risk() {
            tracing::warn!(
                message_id = %ticket.message_id,
                level = %verdict.level,
                reason = %verdict.reason,
                "risk detected"
            );
        }

        let assignee = self.round_robin.next_assignee(&self.roster)?;
        msg.forward(&assignee, &forward_banner(&verdict, &assignee, self.config.sla_minutes))?;

        let watched = verdict.level.is_risk();
        if watched {
            self.watchdog.register(
                &ticket.message_id,
                &ticket.subject,
                &assignee,
                &ticket.sender,
                verdict.level,
                &verdict.reason,
                now,
            );
        }

        let tagged = assigned_subject(&assignee, verdict.level, &ticket.subject);
        let record = AuditRecord::new(
            &now,
            tagged.clone(),
            assignee.clone(),
            ticket.sender.clone(),
            verdict.level,
        );
        self.unfiled.insert(ticket.message_id.clone(), record.clone());
        msg.rename_subject(&tagged)?;
        self.unfiled.remove(&ticket.message_id);
        self.record(record);
        msg.move_to(&self.config.processed_folder)?;
        msg.mark_read()?;

        tracing::info!(
            message_id = %ticket.message_id,
            assignee = %assignee,
            level = %verdict.level,
            subject = %ticket.subject_prefix(),
            "assigned ticket"
        );
        Ok(TicketOutcome::Assigned {
            message_id: ticket.message_id.clone(),
            assignee,
            level: verdict.level,
            reason: verdict.reason,
            watched,
        })
    }

    fn was_dispatched(&self, ticket: &Ticket) -> bool {
        if self.unfiled.contains_key(&ticket.message_id) {
            return true;
        }
        let subject = ticket.subject.trim_start().to_lowercase();
        subject.starts_with("[completed:")
            || (subject.starts_with("[assigned:") && !self.roster.contains(&ticket.sender))
    }

    /// Finish filing a ticket an earlier attempt already forwarded or closed.
    fn refile<Msg: InboundMessage>(
        &mut self,
        ticket: &Ticket,
        msg: &mut Msg,
    ) -> Result<TicketOutcome> {
        if let Some(record) = self.unfiled.get(&ticket.message_id).cloned() {
            msg.rename_subject(&record.subject)?;
            self.unfiled.remove(&ticket.message_id);
            self.record(record);
        }
        msg.move_to(&self.config.processed_folder)?;
        msg.mark_read()?;

        tracing::info!(
            message_id = %ticket.message_id,
            subject = %ticket.subject_prefix(),
            "filed previously dispatched ticket"
        );
        Ok(TicketOutcome::Refiled {
            message_id: ticket.message_id.clone(),
        })
    }

    fn record(&self, record: AuditRecord) {
        if let Err(e) = self.audit.append(&record) {
            tracing::warn!(
                kind = e.kind(),
                error = %e,
                subject = %crate::ticket::truncate_chars(&record.subject, 50),
                "failed to write audit row"
            );
        }
    }
}

/// Text placed above the original body of a forwarded ticket.
pub fn forward_banner(verdict: &RiskVerdict, assignee: &str, sla_minutes: u32) -> String {
    if verdict.level.is_risk() {
        let rule = "━".repeat(60);
        format!(
            "{rule}\n🚨 {} RISK TICKET 🚨\nReason: {}\nSLA: {sla_minutes} MINUTES\n{rule}\n\n",
            verdict.level.as_str().to_uppercase(),
            verdict.reason,
        )
    } else {
        format!("--- AUTO-ASSIGNED TO {assignee} ---\n\n")
    }
}

/// `[Assigned: <staff>] [<LEVEL>] <subject>`, level omitted for normal tickets.
pub fn assigned_subject(assignee: &str, level: RiskLevel, subject: &str) -> String {
    if level.is_risk() {
        format!(
            "[Assigned: {assignee}] [{}] {subject}",
            level.as_str().to_uppercase()
        )
    } else {
        format!("[Assigned: {assignee}] {subject}")
    }
}
