//! Round-robin assignment engine.
//!
//! The engine owns the in-memory [`RosterState`] and is the only writer of
//! `roster_state.json`. Every successful assignment advances the cursor and
//! saves it atomically. A failed save is logged, the in-memory cursor keeps
//! going, and the next successful save re-synchronises the file.

use crate::error::Result;
use crate::roster::StaffRoster;
use crate::state::RosterState;
use crate::store::{JsonStore, LoadOutcome};
use std::path::PathBuf;

pub struct RoundRobin {
    store: JsonStore<RosterState>,
    state: RosterState,
    dirty: bool,
}

impl RoundRobin {
    /// Open the engine on `path`, starting from zero when the file is absent
    /// or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let store = JsonStore::new(path);
        let (state, outcome) = store.load_with_outcome();
        if outcome == LoadOutcome::Missing {
            tracing::info!(path = %store.path().display(), "no roster state yet, starting at index 0");
        }
        Self {
            store,
            state,
            dirty: false,
        }
    }

    pub fn state(&self) -> RosterState {
        self.state
    }

    /// True when the last save failed and the file lags behind memory.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Return `roster[current_index % len]` and persist the advanced cursor.
    pub fn next_assignee(&mut self, roster: &StaffRoster) -> Result<String> {
        let who = self.state.advance(roster)?;
        self.persist();
        Ok(who)
    }

    /// Retry a save that failed earlier. No-op when the file is current.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.store.save(&self.state)?;
        self.dirty = false;
        Ok(())
    }

    fn persist(&mut self) {
        match self.store.save(&self.state) {
            Ok(()) => self.dirty = false,
            Err(e) => {
                tracing::warn!(
                    kind = e.kind(),
                    error = %e,
                    current_index = self.state.current_index,
                    "failed to save roster state, continuing in memory"
                );
                self.dirty = true;
            }
        }
    }
}
