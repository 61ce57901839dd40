//! Directory-backed mailbox.
//!
//! Layout under the mailbox directory:
//!   inbox/<name>.yaml    one message per file, delivered in file-name order
//!   outbox/<uuid>.yaml   forwarded copies
//!   <folder>/<name>.yaml where `move_to` files handled messages
//!
//! A message file that fails to parse is skipped with a warning so one bad
//! drop does not block the rest of the inbox.

use super::{ForwardedMessage, InboundMessage, Mailbox};
use crate::error::{DispatchError, Result};
use crate::io;
use crate::paths::{INBOX_FOLDER, OUTBOX_FOLDER};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpoolRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default)]
    pub high_importance: bool,
    #[serde(default = "default_unread")]
    pub unread: bool,
}

fn default_unread() -> bool {
    true
}

pub struct SpoolMailbox {
    dir: PathBuf,
    on_behalf_of: String,
}

impl SpoolMailbox {
    pub fn new(dir: impl Into<PathBuf>, on_behalf_of: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            on_behalf_of: on_behalf_of.into(),
        }
    }

    pub fn folder(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Drop a new message into the inbox. Returns the file written.
    pub fn deliver(&self, name: &str, record: &SpoolRecord) -> Result<PathBuf> {
        let path = self.folder(INBOX_FOLDER).join(format!("{name}.yaml"));
        io::atomic_write(&path, serde_yaml::to_string(record)?.as_bytes())?;
        Ok(path)
    }

    /// Forwarded messages currently in the outbox, oldest file name first.
    pub fn outbox(&self) -> Result<Vec<ForwardedMessage>> {
        let mut out = Vec::new();
        for path in yaml_files(&self.folder(OUTBOX_FOLDER))? {
            let data = std::fs::read_to_string(&path)?;
            out.push(serde_yaml::from_str(&data)?);
        }
        Ok(out)
    }
}

impl Mailbox for SpoolMailbox {
    type Message = SpoolMessage;

    fn fetch_unread(&mut self) -> Result<Vec<SpoolMessage>> {
        let inbox = self.folder(INBOX_FOLDER);
        let files = yaml_files(&inbox).map_err(|e| {
            DispatchError::TransportUnavailable(format!("cannot read {}: {e}", inbox.display()))
        })?;

        let mut messages = Vec::new();
        for path in files {
            match SpoolMessage::open(&path, &self.dir, &self.on_behalf_of) {
                Ok(msg) if msg.record.unread => messages.push(msg),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable message file");
                }
            }
        }
        Ok(messages)
    }
}

fn yaml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yaml") | Some("yml")
                )
        })
        .collect();
    files.sort();
    Ok(files)
}

pub struct SpoolMessage {
    path: PathBuf,
    mailbox_dir: PathBuf,
    on_behalf_of: String,
    record: SpoolRecord,
}

impl SpoolMessage {
    fn open(path: &Path, mailbox_dir: &Path, on_behalf_of: &str) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let record = serde_yaml::from_str(&data).map_err(|e| DispatchError::InvalidMessage {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            mailbox_dir: mailbox_dir.to_path_buf(),
            on_behalf_of: on_behalf_of.to_string(),
            record,
        })
    }

    fn rewrite(&self) -> Result<()> {
        io::atomic_write(&self.path, serde_yaml::to_string(&self.record)?.as_bytes())
    }

    fn file_stem(&self) -> Option<String> {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
    }
}

impl InboundMessage for SpoolMessage {
    fn message_id(&self) -> Option<String> {
        self.record.message_id.clone().or_else(|| self.file_stem())
    }

    fn sender(&self) -> Option<String> {
        self.record.sender.clone()
    }

    fn subject(&self) -> Option<String> {
        self.record.subject.clone()
    }

    fn body(&self) -> Option<String> {
        self.record.body.clone()
    }

    fn high_importance(&self) -> bool {
        self.record.high_importance
    }

    fn forward(&mut self, to: &str, banner: &str) -> Result<()> {
        let fwd = ForwardedMessage {
            to: to.to_string(),
            on_behalf_of: self.on_behalf_of.clone(),
            subject: format!("FW: {}", self.record.subject.as_deref().unwrap_or_default()),
            body: format!("{banner}{}", self.record.body.as_deref().unwrap_or_default()),
            original_id: self.message_id().unwrap_or_default(),
        };
        // Time-ordered names keep the outbox listing in send order.
        let name = format!(
            "{}-{}.yaml",
            chrono::Utc::now().format("%Y%m%d%H%M%S%6f"),
            uuid::Uuid::new_v4().simple()
        );
        let path = self.mailbox_dir.join(OUTBOX_FOLDER).join(name);
        io::atomic_write(&path, serde_yaml::to_string(&fwd)?.as_bytes())
    }

    fn rename_subject(&mut self, subject: &str) -> Result<()> {
        self.record.subject = Some(subject.to_string());
        self.rewrite()
    }

    fn mark_read(&mut self) -> Result<()> {
        self.record.unread = false;
        self.rewrite()
    }

    fn move_to(&mut self, folder: &str) -> Result<()> {
        let dest_dir = self.mailbox_dir.join(folder);
        io::ensure_dir(&dest_dir)?;
        let name = self
            .path
            .file_name()
            .ok_or_else(|| DispatchError::InvalidMessage {
                path: self.path.clone(),
                reason: "message path has no file name".to_string(),
            })?;
        let dest = dest_dir.join(name);
        std::fs::rename(&self.path, &dest)?;
        self.path = dest;
        Ok(())
    }
}
