//! Append-only audit log (`daily_stats.csv`).
//!
//! The dashboard reads this file as its only data source, so the header and
//! column order are fixed:
//!
//! ```text
//! Date,Time,Subject,Assigned To,Sender,Risk Level
//! ```
//!
//! One row is written per assignment, per internal-reply closure and per SLA
//! failure. Fields are quoted only when needed; embedded newlines are folded
//! into spaces so every record stays on one line.

use crate::classifier::RiskLevel;
use crate::error::{DispatchError, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

pub const HEADER: [&str; 6] = ["Date", "Time", "Subject", "Assigned To", "Sender", "Risk Level"];

/// `Assigned To` value written for internal-reply closures.
pub const COMPLETED_ASSIGNEE: &str = "completed";
/// Closure marker used by older tooling; read as a completion too.
const LEGACY_COMPLETED_ASSIGNEE: &str = "staff-reply";

// ---------------------------------------------------------------------------
// AuditTag
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AuditTag {
    Risk(RiskLevel),
    SlaBreach,
}

impl fmt::Display for AuditTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditTag::Risk(level) => f.write_str(level.as_str()),
            AuditTag::SlaBreach => f.write_str("SLA_BREACH"),
        }
    }
}

impl std::str::FromStr for AuditTag {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("sla_breach") {
            return Ok(AuditTag::SlaBreach);
        }
        s.parse().map(AuditTag::Risk)
    }
}

impl From<RiskLevel> for AuditTag {
    fn from(level: RiskLevel) -> Self {
        AuditTag::Risk(level)
    }
}

// ---------------------------------------------------------------------------
// AuditRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub subject: String,
    pub assigned_to: String,
    pub sender: String,
    pub risk: AuditTag,
}

impl AuditRecord {
    pub fn new<Tz: TimeZone>(
        at: &DateTime<Tz>,
        subject: impl Into<String>,
        assigned_to: impl Into<String>,
        sender: impl Into<String>,
        risk: impl Into<AuditTag>,
    ) -> Self {
        let local = at.with_timezone(&Local);
        Self {
            date: local.date_naive(),
            time: local.time().with_nanosecond(0).unwrap_or_else(|| local.time()),
            subject: subject.into(),
            assigned_to: assigned_to.into(),
            sender: sender.into(),
            risk: risk.into(),
        }
    }

    pub fn is_completion(&self) -> bool {
        self.assigned_to.eq_ignore_ascii_case(COMPLETED_ASSIGNEE)
            || self.assigned_to.eq_ignore_ascii_case(LEGACY_COMPLETED_ASSIGNEE)
    }

    pub fn to_csv_line(&self) -> String {
        let fields = [
            self.date.format("%Y-%m-%d").to_string(),
            self.time.format("%H:%M:%S").to_string(),
            self.subject.clone(),
            self.assigned_to.clone(),
            self.sender.clone(),
            self.risk.to_string(),
        ];
        let quoted: Vec<String> = fields.iter().map(|f| quote_field(f)).collect();
        format!("{}\n", quoted.join(","))
    }

    /// Parse one data row. Rows written before the risk column existed carry
    /// five fields and read as `normal`.
    pub fn from_fields(fields: &[String]) -> Option<Self> {
        if fields.len() < 5 {
            return None;
        }
        let risk = match fields.get(5) {
            Some(raw) if !raw.trim().is_empty() => raw.parse().ok()?,
            _ => AuditTag::Risk(RiskLevel::Normal),
        };
        Some(Self {
            date: parse_date(&fields[0])?,
            time: NaiveTime::parse_from_str(fields[1].trim(), "%H:%M:%S").ok()?,
            subject: fields[2].clone(),
            assigned_to: fields[3].trim().to_lowercase(),
            sender: fields[4].trim().to_string(),
            risk,
        })
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .ok()
}

// ---------------------------------------------------------------------------
// CSV helpers
// ---------------------------------------------------------------------------

/// Quote a field if it contains a comma, quote or line break.
pub fn quote_field(value: &str) -> String {
    let value = value.replace(['\r', '\n'], " ");
    if value.contains(',') || value.contains('"') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value
    }
}

/// Split one CSV line into fields. Returns None on an unclosed quote.
pub fn parse_line(line: &str) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            ('"', true) => in_quotes = false,
            ('"', false) if field.is_empty() => in_quotes = true,
            (',', false) => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    if in_quotes {
        return None;
    }
    fields.push(field);
    Some(fields)
}

// ---------------------------------------------------------------------------
// AuditLog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row, writing the header first if the file is new.
    pub fn append(&self, record: &AuditRecord) -> Result<()> {
        let needs_header = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);
        let mut text = String::new();
        if needs_header {
            text.push_str(&HEADER.join(","));
            text.push('\n');
        }
        text.push_str(&record.to_csv_line());
        crate::io::append_text(&self.path, &text)
            .map_err(|e| DispatchError::store(&self.path, e))
    }

    /// Every parseable row. Rows that fail to parse are skipped.
    pub fn read_all(&self) -> Result<Vec<AuditRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&self.path)?;
        let mut records = Vec::new();
        for (n, line) in text.lines().enumerate() {
            if n == 0 && line.starts_with("Date,") {
                continue;
            }
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(line).and_then(|f| AuditRecord::from_fields(&f)) {
                Some(r) => records.push(r),
                None => tracing::debug!(line = n + 1, "skipping malformed audit row"),
            }
        }
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Summary (dashboard read contract)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditSummary {
    pub date: NaiveDate,
    pub total_rows: usize,
    pub assignments: usize,
    pub completions: usize,
    pub sla_breaches: usize,
    pub urgent: usize,
    pub critical: usize,
    /// Assignments per staff member, by address.
    pub load: BTreeMap<String, usize>,
    /// `100 - (max - min) / max * 100` over per-staff load; 100 when idle.
    pub balance_score: f64,
}

impl AuditSummary {
    pub fn for_date(records: &[AuditRecord], date: NaiveDate) -> Self {
        let day: Vec<&AuditRecord> = records.iter().filter(|r| r.date == date).collect();

        let mut load: BTreeMap<String, usize> = BTreeMap::new();
        let mut summary = Self {
            date,
            total_rows: day.len(),
            assignments: 0,
            completions: 0,
            sla_breaches: 0,
            urgent: 0,
            critical: 0,
            load: BTreeMap::new(),
            balance_score: 100.0,
        };

        for r in day {
            match r.risk {
                AuditTag::SlaBreach => summary.sla_breaches += 1,
                _ if r.is_completion() => summary.completions += 1,
                AuditTag::Risk(level) => {
                    summary.assignments += 1;
                    *load.entry(r.assigned_to.clone()).or_insert(0) += 1;
                    match level {
                        RiskLevel::Urgent => summary.urgent += 1,
                        RiskLevel::Critical => summary.critical += 1,
                        RiskLevel::Normal => {}
                    }
                }
            }
        }

        if let (Some(max), Some(min)) = (load.values().max(), load.values().min()) {
            if *max > 0 {
                summary.balance_score = 100.0 - ((*max - *min) as f64 / *max as f64 * 100.0);
            }
        }
        summary.load = load;
        summary
    }
}
