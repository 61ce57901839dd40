//! Rule-based risk classification of inbound tickets.
//!
//! Three word sets drive the verdict: destructive **actions**, clinical
//! **context** nouns, and **urgency** words. Rules are evaluated in a fixed
//! order and the first one that fires wins:
//!
//! 1. high-importance flag            → critical
//! 2. action + context                → critical
//! 3. urgency + action                → critical
//! 4. urgency alone                   → urgent
//! 5. action alone                    → urgent
//! 6. anything else                   → normal
//!
//! Matching is per word: the text is split into tokens and a rule word of five
//! or more characters matches any token that starts with it, so `cancel` finds
//! `cancellation` and `merge` finds `merger`. Shorter words (`ct`, `mri`,
//! `stat`, `now`) match a token equal to them or equal to them plus a plain
//! inflection (`scans`, `exams`), which keeps `contact` and `status` out.
//! Entries containing a space match as phrases.

use crate::error::DispatchError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Rule words shorter than this only match whole tokens.
const PREFIX_MATCH_MIN_CHARS: usize = 5;

/// Suffixes accepted after a short rule word, so "scans" matches "scan".
const INFLECTIONS: &[&str] = &["s", "es", "d", "ed", "ing", "ly"];

// ---------------------------------------------------------------------------
// RiskLevel / RiskVerdict
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Normal,
    Urgent,
    Critical,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Normal => "normal",
            RiskLevel::Urgent => "urgent",
            RiskLevel::Critical => "critical",
        }
    }

    /// Urgent and critical tickets are tracked by the SLA watchdog.
    pub fn is_risk(self) -> bool {
        self != RiskLevel::Normal
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(RiskLevel::Normal),
            "urgent" => Ok(RiskLevel::Urgent),
            "critical" => Ok(RiskLevel::Critical),
            _ => Err(DispatchError::InvalidRiskLevel(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskVerdict {
    pub level: RiskLevel,
    /// Names the rule and words that fired; empty for normal.
    pub reason: String,
}

impl RiskVerdict {
    pub fn normal() -> Self {
        Self {
            level: RiskLevel::Normal,
            reason: String::new(),
        }
    }

    fn new(level: RiskLevel, reason: String) -> Self {
        Self { level, reason }
    }
}

// ---------------------------------------------------------------------------
// RiskRules (configuration data)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRules {
    #[serde(default = "default_actions")]
    pub actions: BTreeSet<String>,
    #[serde(default = "default_context")]
    pub context: BTreeSet<String>,
    #[serde(default = "default_urgency")]
    pub urgency: BTreeSet<String>,
}

fn word_set(words: &[&str]) -> BTreeSet<String> {
    words.iter().map(|w| w.to_string()).collect()
}

fn default_actions() -> BTreeSet<String> {
    word_set(&[
        "delete", "deletion", "remove", "unlink", "purge", "erase", "destroy", "cancel", "void",
        "nullify", "terminate", "merge", "merging", "merged", "split", "splitting", "combine",
        "duplicate", "dedupe", "dedup",
    ])
}

fn default_context() -> BTreeSet<String> {
    word_set(&[
        "patient", "scan", "accession", "study", "exam", "report", "imaging", "dicom", "mri",
        "ct", "ultrasound", "xray", "x-ray", "record", "data", "file", "prior", "comparison",
    ])
}

fn default_urgency() -> BTreeSet<String> {
    word_set(&[
        "stat",
        "asap",
        "urgent",
        "emergency",
        "critical",
        "immediate",
        "now",
        "rush",
        "priority",
        "life-threatening",
        "code",
    ])
}

impl Default for RiskRules {
    fn default() -> Self {
        Self {
            actions: default_actions(),
            context: default_context(),
            urgency: default_urgency(),
        }
    }
}

impl RiskRules {
    pub fn named_sets(&self) -> [(&'static str, &BTreeSet<String>); 3] {
        [
            ("actions", &self.actions),
            ("context", &self.context),
            ("urgency", &self.urgency),
        ]
    }
}

// ---------------------------------------------------------------------------
// RiskClassifier
// ---------------------------------------------------------------------------

/// Pure, total classifier over a normalised copy of the rule sets.
#[derive(Debug, Clone)]
pub struct RiskClassifier {
    actions: Vec<String>,
    context: Vec<String>,
    urgency: Vec<String>,
}

impl Default for RiskClassifier {
    fn default() -> Self {
        Self::new(&RiskRules::default())
    }
}

impl RiskClassifier {
    pub fn new(rules: &RiskRules) -> Self {
        Self {
            actions: normalise(&rules.actions),
            context: normalise(&rules.context),
            urgency: normalise(&rules.urgency),
        }
    }

    pub fn classify(&self, subject: &str, body: &str, high_importance: bool) -> RiskVerdict {
        if high_importance {
            return RiskVerdict::new(RiskLevel::Critical, "importance flag".to_string());
        }

        let text = format!("{subject} {body}").to_lowercase();
        let tokens = tokenize(&text);

        let action = first_match(&self.actions, &text, &tokens);
        let context = first_match(&self.context, &text, &tokens);
        let urgency = first_match(&self.urgency, &text, &tokens);

        match (action, context, urgency) {
            (Some(a), Some(c), _) => {
                RiskVerdict::new(RiskLevel::Critical, format!("Action+Context: {a}+{c}"))
            }
            (Some(a), None, Some(u)) => {
                RiskVerdict::new(RiskLevel::Critical, format!("Urgency+Action: {u}+{a}"))
            }
            (None, _, Some(u)) => RiskVerdict::new(RiskLevel::Urgent, format!("Urgency: {u}")),
            (Some(a), None, None) => RiskVerdict::new(RiskLevel::Urgent, format!("Action: {a}")),
            (None, _, None) => RiskVerdict::normal(),
        }
    }
}

fn normalise(words: &BTreeSet<String>) -> Vec<String> {
    let set: BTreeSet<String> = words
        .iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();
    set.into_iter().collect()
}

fn tokenize(text: &str) -> Vec<&str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .map(|t| t.trim_matches('-'))
        .filter(|t| !t.is_empty())
        .collect()
}

fn token_matches(token: &str, word: &str) -> bool {
    match token.strip_prefix(word) {
        Some("") => true,
        Some(_) if word.chars().count() >= PREFIX_MATCH_MIN_CHARS => true,
        Some(rest) => INFLECTIONS.contains(&rest),
        None => false,
    }
}

fn first_match<'w>(words: &'w [String], text: &str, tokens: &[&str]) -> Option<&'w str> {
    words
        .iter()
        .find(|word| {
            if word.contains(' ') {
                text.contains(word.as_str())
            } else {
                tokens.iter().any(|t| token_matches(t, word))
            }
        })
        .map(String::as_str)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(subject: &str, body: &str, flag: bool) -> RiskVerdict {
        RiskClassifier::default().classify(subject, body, flag)
    }

    #[test]
    fn importance_flag_wins_over_everything() {
        let v = classify("Scan report attached", "", true);
        assert_eq!(v.level, RiskLevel::Critical);
        assert_eq!(v.reason, "importance flag");
    }

    #[test]
    fn action_with_context_is_critical() {
        let v = classify("STAT delete patient record", "", false);
        assert_eq!(v.level, RiskLevel::Critical);
        assert!(v.reason.starts_with("Action+Context"));
        assert!(v.reason.contains("delete"));
        assert!(v.reason.contains("patient"));
    }

    #[test]
    fn urgency_with_action_beats_urgency_alone() {
        let v = classify("ASAP please cancel", "the booking for tomorrow", false);
        assert_eq!(v.level, RiskLevel::Critical);
        assert_eq!(v.reason, "Urgency+Action: asap+cancel");
    }

    #[test]
    fn urgency_alone_is_urgent() {
        let v = classify("URGENT: please advise", "", false);
        assert_eq!(v.level, RiskLevel::Urgent);
        assert_eq!(v.reason, "Urgency: urgent");
    }

    #[test]
    fn action_alone_is_urgent() {
        let v = classify("Please remove me from the list", "", false);
        assert_eq!(v.level, RiskLevel::Urgent);
        assert_eq!(v.reason, "Action: remove");
    }

    #[test]
    fn context_alone_is_normal() {
        let v = classify("Scan report attached", "", false);
        assert_eq!(v, RiskVerdict::normal());
    }

    #[test]
    fn empty_text_is_normal() {
        assert_eq!(classify("", "", false), RiskVerdict::normal());
    }

    #[test]
    fn body_participates_in_matching() {
        let v = classify("Question", "could you merge the two exams", false);
        assert_eq!(v.level, RiskLevel::Critical);
        assert!(v.reason.contains("merge"));
    }

    #[test]
    fn plural_and_past_tense_forms_match() {
        let v = classify("Please delete these records", "", false);
        assert_eq!(v.level, RiskLevel::Critical);
        let v = classify("Exam was deleted by mistake", "", false);
        assert_eq!(v.level, RiskLevel::Critical);
    }

    #[test]
    fn derived_forms_of_long_words_match() {
        let v = classify("Cancellation of patient scan", "", false);
        assert_eq!(v.level, RiskLevel::Critical);
        assert_eq!(v.reason, "Action+Context: cancel+patient");

        let v = classify("Patient study cancelled", "", false);
        assert_eq!(v.level, RiskLevel::Critical);
        assert!(v.reason.contains("cancel"));

        let v = classify("Accidental merger of patient records", "", false);
        assert_eq!(v.level, RiskLevel::Critical);
        assert!(v.reason.contains("merge"));
    }

    #[test]
    fn words_inside_other_words_do_not_match() {
        // "status" must not read as "stat", "contact" must not read as "ct".
        assert_eq!(
            classify("Status of my contact details", "I know", false),
            RiskVerdict::normal()
        );
    }

    #[test]
    fn hyphenated_words_match() {
        let v = classify("Life-threatening finding on x-ray", "", false);
        assert_eq!(v.level, RiskLevel::Urgent);
        assert_eq!(v.reason, "Urgency: life-threatening");
    }

    #[test]
    fn unicode_text_is_handled() {
        let v = classify("Ärztlicher Bericht 🚑: bitte prüfen", "данные пациента", false);
        assert_eq!(v.level, RiskLevel::Normal);
    }

    #[test]
    fn custom_rules_are_respected() {
        let rules = RiskRules {
            actions: word_set(&["archive"]),
            context: word_set(&["invoice"]),
            urgency: word_set(&["today"]),
        };
        let c = RiskClassifier::new(&rules);
        assert_eq!(
            c.classify("Archive invoice", "", false).level,
            RiskLevel::Critical
        );
        assert_eq!(
            c.classify("delete patient record", "", false).level,
            RiskLevel::Normal
        );
    }

    #[test]
    fn phrase_entries_match_as_phrases() {
        let rules = RiskRules {
            urgency: word_set(&["right away"]),
            ..RiskRules::default()
        };
        let c = RiskClassifier::new(&rules);
        assert_eq!(
            c.classify("Need this right away", "", false).level,
            RiskLevel::Urgent
        );
    }

    #[test]
    fn risk_level_parses_case_insensitively() {
        assert_eq!("CRITICAL".parse::<RiskLevel>().unwrap(), RiskLevel::Critical);
        assert!("severe".parse::<RiskLevel>().is_err());
    }
}
