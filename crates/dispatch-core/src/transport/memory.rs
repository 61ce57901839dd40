//! In-process mailbox. Handy for embedding and for exercising the dispatcher
//! without a mail server; failures can be injected per message.

use super::{ForwardedMessage, InboundMessage, Mailbox};
use crate::error::{DispatchError, Result};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredMessage {
    pub message_id: Option<String>,
    pub sender: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub high_importance: bool,
    pub unread: bool,
    pub folder: String,
}

impl StoredMessage {
    pub fn new(id: &str, sender: &str, subject: &str, body: &str) -> Self {
        Self {
            message_id: Some(id.to_string()),
            sender: Some(sender.to_string()),
            subject: Some(subject.to_string()),
            body: Some(body.to_string()),
            high_importance: false,
            unread: true,
            folder: crate::paths::INBOX_FOLDER.to_string(),
        }
    }

    pub fn important(mut self) -> Self {
        self.high_importance = true;
        self
    }
}

#[derive(Debug, Default)]
struct MailState {
    messages: Vec<StoredMessage>,
    outbox: Vec<ForwardedMessage>,
    failing: HashSet<String>,
    failing_once: HashSet<(String, String)>,
    unreachable: bool,
}

#[derive(Debug, Clone)]
pub struct MemoryMailbox {
    on_behalf_of: String,
    state: Arc<Mutex<MailState>>,
}

impl MemoryMailbox {
    pub fn new(on_behalf_of: impl Into<String>) -> Self {
        Self {
            on_behalf_of: on_behalf_of.into(),
            state: Arc::default(),
        }
    }

    pub fn deliver(&self, message: StoredMessage) {
        lock(&self.state).messages.push(message);
    }

    /// Make every operation on message `id` fail.
    pub fn fail_message(&self, id: &str) {
        lock(&self.state).failing.insert(id.to_string());
    }

    /// Make the next `op` (`forward`, `rename`, `mark_read`, `move`) on
    /// message `id` fail once.
    pub fn fail_once(&self, id: &str, op: &str) {
        lock(&self.state)
            .failing_once
            .insert((id.to_string(), op.to_string()));
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        lock(&self.state).unreachable = unreachable;
    }

    pub fn outbox(&self) -> Vec<ForwardedMessage> {
        lock(&self.state).outbox.clone()
    }

    pub fn messages(&self) -> Vec<StoredMessage> {
        lock(&self.state).messages.clone()
    }

    pub fn folder_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for m in &lock(&self.state).messages {
            *counts.entry(m.folder.clone()).or_insert(0) += 1;
        }
        counts
    }
}

impl Mailbox for MemoryMailbox {
    type Message = MemoryMessage;

    fn fetch_unread(&mut self) -> Result<Vec<MemoryMessage>> {
        let state = lock(&self.state);
        if state.unreachable {
            return Err(DispatchError::TransportUnavailable(
                "memory mailbox marked unreachable".to_string(),
            ));
        }
        Ok(state
            .messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.unread && m.folder == crate::paths::INBOX_FOLDER)
            .map(|(slot, _)| MemoryMessage {
                slot,
                on_behalf_of: self.on_behalf_of.clone(),
                state: Arc::clone(&self.state),
            })
            .collect())
    }
}

#[derive(Debug)]
pub struct MemoryMessage {
    slot: usize,
    on_behalf_of: String,
    state: Arc<Mutex<MailState>>,
}

impl MemoryMessage {
    fn read<T>(&self, f: impl FnOnce(&StoredMessage) -> T) -> T {
        f(&lock(&self.state).messages[self.slot])
    }

    fn write(&mut self, op: &str, f: impl FnOnce(&mut MailState, usize)) -> Result<()> {
        let mut state = lock(&self.state);
        let id = state.messages[self.slot].message_id.clone().unwrap_or_default();
        let one_shot = state.failing_once.remove(&(id.clone(), op.to_string()));
        if one_shot || state.failing.contains(&id) {
            return Err(DispatchError::Ticket {
                message_id: id,
                reason: format!("{op} rejected by mailbox"),
            });
        }
        f(&mut state, self.slot);
        Ok(())
    }
}

impl InboundMessage for MemoryMessage {
    fn message_id(&self) -> Option<String> {
        self.read(|m| m.message_id.clone())
    }

    fn sender(&self) -> Option<String> {
        self.read(|m| m.sender.clone())
    }

    fn subject(&self) -> Option<String> {
        self.read(|m| m.subject.clone())
    }

    fn body(&self) -> Option<String> {
        self.read(|m| m.body.clone())
    }

    fn high_importance(&self) -> bool {
        self.read(|m| m.high_importance)
    }

    fn forward(&mut self, to: &str, banner: &str) -> Result<()> {
        let on_behalf_of = self.on_behalf_of.clone();
        self.write("forward", |state, slot| {
            let m = &state.messages[slot];
            let fwd = ForwardedMessage {
                to: to.to_string(),
                on_behalf_of,
                subject: format!("FW: {}", m.subject.clone().unwrap_or_default()),
                body: format!("{banner}{}", m.body.clone().unwrap_or_default()),
                original_id: m.message_id.clone().unwrap_or_default(),
            };
            state.outbox.push(fwd);
        })
    }

    fn rename_subject(&mut self, subject: &str) -> Result<()> {
        self.write("rename", |state, slot| {
            state.messages[slot].subject = Some(subject.to_string());
        })
    }

    fn mark_read(&mut self) -> Result<()> {
        self.write("mark_read", |state, slot| {
            state.messages[slot].unread = false;
        })
    }

    fn move_to(&mut self, folder: &str) -> Result<()> {
        self.write("move", |state, slot| {
            state.messages[slot].folder = folder.to_string();
        })
    }
}

// A poisoned lock only means another test thread panicked mid-update; the
// data is still the best view we have.
fn lock(state: &Mutex<MailState>) -> MutexGuard<'_, MailState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_returns_unread_inbox_in_delivery_order() {
        let mut mb = MemoryMailbox::new("desk");
        mb.deliver(StoredMessage::new("1", "a@x", "first", ""));
        mb.deliver(StoredMessage::new("2", "b@x", "second", ""));
        let msgs = mb.fetch_unread().unwrap();
        let ids: Vec<_> = msgs.iter().map(|m| m.message_id().unwrap()).collect();
        assert_eq!(ids, ["1", "2"]);
    }

    #[test]
    fn handled_messages_leave_the_unread_set() {
        let mut mb = MemoryMailbox::new("desk");
        mb.deliver(StoredMessage::new("1", "a@x", "first", "body"));
        let mut msg = mb.fetch_unread().unwrap().remove(0);
        msg.forward("staff@x", "BANNER\n").unwrap();
        msg.mark_read().unwrap();
        msg.move_to("Done").unwrap();

        assert!(mb.fetch_unread().unwrap().is_empty());
        let out = mb.outbox();
        assert_eq!(out[0].to, "staff@x");
        assert_eq!(out[0].body, "BANNER\nbody");
        assert_eq!(mb.folder_counts().get("Done"), Some(&1));
    }

    #[test]
    fn injected_failure_surfaces_as_ticket_error() {
        let mut mb = MemoryMailbox::new("desk");
        mb.deliver(StoredMessage::new("bad", "a@x", "s", ""));
        mb.fail_message("bad");
        let mut msg = mb.fetch_unread().unwrap().remove(0);
        assert!(matches!(
            msg.forward("x", ""),
            Err(DispatchError::Ticket { .. })
        ));
    }

    #[test]
    fn one_shot_failure_hits_only_that_operation() {
        let mut mb = MemoryMailbox::new("desk");
        mb.deliver(StoredMessage::new("m1", "a@x", "s", ""));
        mb.fail_once("m1", "move");
        let mut msg = mb.fetch_unread().unwrap().remove(0);
        msg.forward("x", "").unwrap();
        msg.mark_read().unwrap();
        assert!(msg.move_to("Done").is_err());
        msg.move_to("Done").unwrap();
        assert_eq!(mb.folder_counts().get("Done"), Some(&1));
    }

    #[test]
    fn unreachable_mailbox_is_transport_error() {
        let mut mb = MemoryMailbox::new("desk");
        mb.set_unreachable(true);
        assert!(matches!(
            mb.fetch_unread(),
            Err(DispatchError::TransportUnavailable(_))
        ));
    }
}
