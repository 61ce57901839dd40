use crate::error::{DispatchError, Result};
use serde::Serialize;
use std::path::Path;

/// Ordered, de-duplicated, lower-cased list of staff addresses.
///
/// Loaded fresh at the start of every cycle so edits to `staff.txt` apply on
/// the next run. An empty roster is valid; assignment reports
/// [`DispatchError::NoStaffAvailable`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StaffRoster {
    members: Vec<String>,
}

impl StaffRoster {
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut roster = StaffRoster::default();
        for m in members {
            roster.push(m.as_ref());
        }
        roster
    }

    /// Parse the newline-delimited roster format. Blank lines and lines
    /// starting with `#` are ignored.
    pub fn parse(text: &str) -> Self {
        Self::new(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#')),
        )
    }

    /// Load the roster file. A missing file is an empty roster.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(StaffRoster::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| DispatchError::store(path, e))?;
        Ok(Self::parse(&text))
    }

    fn push(&mut self, member: &str) {
        let member = member.trim().to_lowercase();
        if !member.is_empty() && !self.members.contains(&member) {
            self.members.push(member);
        }
    }

    pub fn contains(&self, sender: &str) -> bool {
        let sender = sender.trim().to_lowercase();
        self.members.iter().any(|m| *m == sender)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.members.get(index).map(String::as_str)
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
