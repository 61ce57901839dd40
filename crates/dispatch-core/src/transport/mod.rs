//! Mail transport contract.
//!
//! The dispatcher never manages a mailbox connection itself. It asks a
//! [`Mailbox`] for the currently unread messages, in delivery order, and
//! drives each one through the operations on [`InboundMessage`].
//!
//! Accessors return `Option` because real backends routinely fail to expose
//! a field; the dispatcher substitutes safe defaults (see [`crate::ticket`]).

pub mod memory;
pub mod spool;

pub use memory::MemoryMailbox;
pub use spool::SpoolMailbox;

use crate::error::Result;

pub trait Mailbox {
    type Message: InboundMessage;

    /// All unread messages in delivery order. An `Err` means the backend is
    /// unreachable (`TransportUnavailable`) and the inbound pass is skipped.
    fn fetch_unread(&mut self) -> Result<Vec<Self::Message>>;
}

pub trait InboundMessage {
    fn message_id(&self) -> Option<String>;
    fn sender(&self) -> Option<String>;
    fn subject(&self) -> Option<String>;
    fn body(&self) -> Option<String>;
    fn high_importance(&self) -> bool;

    /// Forward to `to`, with `banner` placed above the original body.
    fn forward(&mut self, to: &str, banner: &str) -> Result<()>;
    fn rename_subject(&mut self, subject: &str) -> Result<()>;
    fn mark_read(&mut self) -> Result<()>;
    fn move_to(&mut self, folder: &str) -> Result<()>;
}

/// A message delivered by [`InboundMessage::forward`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ForwardedMessage {
    pub to: String,
    pub on_behalf_of: String,
    pub subject: String,
    pub body: String,
    pub original_id: String,
}
