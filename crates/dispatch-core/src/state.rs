use crate::error::{DispatchError, Result};
use crate::roster::StaffRoster;
use serde::{Deserialize, Serialize};

/// Persisted round-robin cursor.
///
/// `current_index` only ever grows; the assignee is
/// `roster[current_index % roster.len()]`, so roster edits between cycles
/// shift who is next without resetting fairness counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterState {
    #[serde(default)]
    pub current_index: u64,
    #[serde(default)]
    pub total_processed: u64,
}

impl RosterState {
    /// Who the next call to [`advance`](Self::advance) would return.
    pub fn peek<'r>(&self, roster: &'r StaffRoster) -> Result<&'r str> {
        if roster.is_empty() {
            return Err(DispatchError::NoStaffAvailable);
        }
        let idx = (self.current_index % roster.len() as u64) as usize;
        roster.get(idx).ok_or(DispatchError::NoStaffAvailable)
    }

    /// Pick the next assignee and move the cursor forward by one.
    /// An empty roster leaves the state untouched.
    pub fn advance(&mut self, roster: &StaffRoster) -> Result<String> {
        let who = self.peek(roster)?.to_string();
        self.current_index = self.current_index.checked_add(1).unwrap_or_else(|| {
            tracing::warn!("round-robin index overflowed, restarting from zero");
            0
        });
        self.total_processed = self.total_processed.saturating_add(1);
        Ok(who)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_walks_roster_in_order() {
        let roster = StaffRoster::new(["a@x", "b@x", "c@x"]);
        let mut state = RosterState::default();
        let picks: Vec<String> = (0..5).map(|_| state.advance(&roster).unwrap()).collect();
        assert_eq!(picks, ["a@x", "b@x", "c@x", "a@x", "b@x"]);
        assert_eq!(state.current_index, 5);
        assert_eq!(state.total_processed, 5);
    }

    #[test]
    fn advance_starts_from_persisted_index() {
        let roster = StaffRoster::new(["a@x", "b@x", "c@x"]);
        let mut state = RosterState {
            current_index: 7,
            total_processed: 7,
        };
        assert_eq!(state.advance(&roster).unwrap(), "b@x");
    }

    #[test]
    fn empty_roster_is_no_staff_and_does_not_advance() {
        let mut state = RosterState::default();
        let err = state.advance(&StaffRoster::default()).unwrap_err();
        assert!(matches!(err, DispatchError::NoStaffAvailable));
        assert_eq!(state, RosterState::default());
    }

    #[test]
    fn index_at_max_wraps_instead_of_overflowing() {
        let roster = StaffRoster::new(["a@x", "b@x"]);
        let mut state = RosterState {
            current_index: u64::MAX,
            total_processed: u64::MAX,
        };
        // u64::MAX is odd, so the pick is the second staff member.
        assert_eq!(state.advance(&roster).unwrap(), "b@x");
        assert_eq!(state.current_index, 0);
        assert_eq!(state.total_processed, u64::MAX);
        assert_eq!(state.advance(&roster).unwrap(), "a@x");
    }

    #[test]
    fn older_files_without_total_still_parse() {
        let state: RosterState = serde_json::from_str(r#"{"current_index": 4}"#).unwrap();
        assert_eq!(state.current_index, 4);
        assert_eq!(state.total_processed, 0);
    }
}
