use crate::transport::InboundMessage;
use serde::Serialize;

/// Per-message view the dispatcher works from. Never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ticket {
    pub message_id: String,
    pub subject: String,
    pub sender: String,
    pub body_excerpt: String,
    pub high_importance: bool,
}

impl Ticket {
    /// Read a message, substituting defaults for anything the backend could
    /// not provide: sender `unknown`, empty subject/body, and an id derived
    /// from subject and sender.
    pub fn from_message<M: InboundMessage>(msg: &M, body_excerpt_chars: usize) -> Self {
        let sender = msg
            .sender()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        let subject = msg.subject().map(|s| s.trim().to_string()).unwrap_or_default();
        let body = msg.body().unwrap_or_default();
        let message_id = msg
            .message_id()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| fallback_id(&subject, &sender));

        Self {
            message_id,
            body_excerpt: truncate_chars(&body, body_excerpt_chars),
            subject,
            sender,
            high_importance: msg.high_importance(),
        }
    }

    /// First 50 characters of the subject, for log lines.
    pub fn subject_prefix(&self) -> String {
        truncate_chars(&self.subject, 50)
    }
}

/// Truncate on a character boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Deterministic id for messages the backend could not identify (FNV-1a).
fn fallback_id(subject: &str, sender: &str) -> String {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in subject.bytes().chain(sender.bytes()) {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    format!("gen-{hash:016x}")
}
