//! Smart filter: tells a staff member's reply apart from a new ticket.
//!
//! A message is an internal reply only when BOTH hold:
//! - the sender is on the roster, and
//! - the subject starts with a reply prefix or carries one of our own tags.
//!
//! A staff member opening a fresh ticket therefore still gets it dispatched,
//! and a tagged reply without `RE:` is still recognised.

use crate::roster::StaffRoster;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyMarkers {
    #[serde(default = "default_reply_prefixes")]
    pub reply_prefixes: Vec<String>,
    #[serde(default = "default_tag_markers")]
    pub tag_markers: Vec<String>,
}

fn default_reply_prefixes() -> Vec<String> {
    ["re:", "fw:", "fwd:", "accepted:", "declined:"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_tag_markers() -> Vec<String> {
    ["[assigned:", "[completed:"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ReplyMarkers {
    fn default() -> Self {
        Self {
            reply_prefixes: default_reply_prefixes(),
            tag_markers: default_tag_markers(),
        }
    }
}

impl ReplyMarkers {
    pub fn is_internal_reply(&self, sender: &str, subject: &str, roster: &StaffRoster) -> bool {
        roster.contains(sender) && (self.has_reply_prefix(subject) || self.has_tag(subject))
    }

    pub fn has_reply_prefix(&self, subject: &str) -> bool {
        let subject = subject.trim().to_lowercase();
        self.reply_prefixes
            .iter()
            .any(|p| subject.starts_with(&p.to_lowercase()))
    }

    pub fn has_tag(&self, subject: &str) -> bool {
        let subject = subject.to_lowercase();
        self.tag_markers
            .iter()
            .any(|m| subject.contains(&m.to_lowercase()))
    }

    /// The subject with reply prefixes and dispatcher tags removed, lower-cased
    /// and whitespace-collapsed. A reply and the ticket it answers share the
    /// same core subject.
    pub fn core_subject(&self, subject: &str) -> String {
        let untagged = tag_re().replace_all(subject, " ");
        let mut rest = untagged.trim().to_lowercase();
        loop {
            let stripped = self
                .reply_prefixes
                .iter()
                .find_map(|p| rest.strip_prefix(&p.to_lowercase()).map(str::to_string));
            match stripped {
                Some(s) => rest = s.trim_start().to_string(),
                None => break,
            }
        }
        rest.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Convenience wrapper using the default markers.
pub fn is_internal_reply(sender: &str, subject: &str, roster: &StaffRoster) -> bool {
    ReplyMarkers::default().is_internal_reply(sender, subject, roster)
}

static TAG_RE: OnceLock<Regex> = OnceLock::new();

fn tag_re() -> &'static Regex {
    TAG_RE.get_or_init(|| {
        Regex::new(r"(?i)\[(assigned|completed):[^\]]*\]|\[(normal|urgent|critical|sla_fail)\]")
            .unwrap()
    })
}
