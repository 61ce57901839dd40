use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// File layout constants
// ---------------------------------------------------------------------------

pub const DISPATCH_DIR: &str = ".dispatch";
pub const MAILBOX_DIR: &str = ".dispatch/mailbox";

pub const CONFIG_FILE: &str = ".dispatch/config.yaml";
pub const ROSTER_STATE_FILE: &str = ".dispatch/roster_state.json";
pub const WATCHDOG_FILE: &str = ".dispatch/urgent_watchdog.json";
pub const ESCALATIONS_FILE: &str = ".dispatch/escalations.log";

/// Read by the dashboard; these two stay at the root.
pub const STAFF_FILE: &str = "staff.txt";
pub const AUDIT_FILE: &str = "daily_stats.csv";

pub const INBOX_FOLDER: &str = "inbox";
pub const OUTBOX_FOLDER: &str = "outbox";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn dispatch_dir(root: &Path) -> PathBuf {
    root.join(DISPATCH_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn roster_state_path(root: &Path) -> PathBuf {
    root.join(ROSTER_STATE_FILE)
}

pub fn watchdog_path(root: &Path) -> PathBuf {
    root.join(WATCHDOG_FILE)
}

pub fn escalations_path(root: &Path) -> PathBuf {
    root.join(ESCALATIONS_FILE)
}

pub fn staff_path(root: &Path) -> PathBuf {
    root.join(STAFF_FILE)
}

pub fn audit_path(root: &Path) -> PathBuf {
    root.join(AUDIT_FILE)
}

pub fn mailbox_dir(root: &Path) -> PathBuf {
    root.join(MAILBOX_DIR)
}

pub fn mailbox_folder(root: &Path, folder: &str) -> PathBuf {
    mailbox_dir(root).join(folder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_files_live_under_dispatch_dir() {
        let root = Path::new("/srv/helpdesk");
        assert!(roster_state_path(root).starts_with(dispatch_dir(root)));
        assert!(watchdog_path(root).starts_with(dispatch_dir(root)));
        assert_eq!(staff_path(root), PathBuf::from("/srv/helpdesk/staff.txt"));
    }

    #[test]
    fn mailbox_folder_nests_under_mailbox_dir() {
        let root = Path::new("/srv/helpdesk");
        assert_eq!(
            mailbox_folder(root, "Done"),
            PathBuf::from("/srv/helpdesk/.dispatch/mailbox/Done")
        );
    }
}
