#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn dispatch(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("dispatch").unwrap();
    cmd.current_dir(dir.path())
        .env("DISPATCH_ROOT", dir.path())
        .env_remove("RUST_LOG");
    cmd
}

fn init_with_staff(dir: &TempDir, staff: &str) {
    dispatch(dir).arg("init").assert().success();
    std::fs::write(dir.path().join("staff.txt"), staff).unwrap();
}

fn drop_message(dir: &TempDir, name: &str, yaml: &str) {
    let inbox = dir.path().join(".dispatch/mailbox/inbox");
    std::fs::create_dir_all(&inbox).unwrap();
    std::fs::write(inbox.join(format!("{name}.yaml")), yaml).unwrap();
}

fn json_output(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&out).unwrap()
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// dispatch init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_directory_tree() {
    let dir = TempDir::new().unwrap();
    dispatch(&dir).arg("init").assert().success();

    assert!(dir.path().join(".dispatch/config.yaml").exists());
    assert!(dir.path().join(".dispatch/roster_state.json").exists());
    assert!(dir.path().join(".dispatch/urgent_watchdog.json").exists());
    assert!(dir.path().join(".dispatch/mailbox/inbox").is_dir());
    assert!(dir.path().join(".dispatch/mailbox/outbox").is_dir());
    assert!(dir.path().join(".dispatch/mailbox/Done").is_dir());
    assert!(dir.path().join("staff.txt").exists());
}

#[test]
fn init_is_idempotent_and_keeps_staff() {
    let dir = TempDir::new().unwrap();
    init_with_staff(&dir, "alice@x\n");
    dispatch(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists:  staff.txt"));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("staff.txt")).unwrap(),
        "alice@x\n"
    );
}

// ---------------------------------------------------------------------------
// dispatch classify
// ---------------------------------------------------------------------------

#[test]
fn classify_reports_critical_with_reason() {
    let dir = TempDir::new().unwrap();
    let v = json_output(dispatch(&dir).args(["--json", "classify", "STAT delete patient record"]));
    assert_eq!(v["level"], "critical");
    assert!(v["reason"].as_str().unwrap().contains("delete"));
}

#[test]
fn classify_plain_text_is_normal() {
    let dir = TempDir::new().unwrap();
    dispatch(&dir)
        .args(["classify", "Scan report attached"])
        .assert()
        .success()
        .stdout(predicate::str::contains("level:  normal"));
}

#[test]
fn classify_importance_flag() {
    let dir = TempDir::new().unwrap();
    dispatch(&dir)
        .args(["classify", "hello", "--high-importance"])
        .assert()
        .success()
        .stdout(predicate::str::contains("critical"))
        .stdout(predicate::str::contains("importance flag"));
}

// ---------------------------------------------------------------------------
// dispatch once
// ---------------------------------------------------------------------------

#[test]
fn once_assigns_spooled_message() {
    let dir = TempDir::new().unwrap();
    init_with_staff(&dir, "alice@x\nbob@x\n");
    drop_message(
        &dir,
        "001",
        "message_id: m1\nsender: Ward@Hospital\nsubject: Printer jammed\nbody: tray 2\n",
    );

    let v = json_output(dispatch(&dir).args(["--json", "once"]));
    assert_eq!(v["outcomes"][0]["outcome"], "assigned");
    assert_eq!(v["outcomes"][0]["assignee"], "alice@x");

    let mailbox = dir.path().join(".dispatch/mailbox");
    assert_eq!(count_files(&mailbox.join("inbox")), 0);
    assert_eq!(count_files(&mailbox.join("outbox")), 1);
    assert_eq!(count_files(&mailbox.join("Done")), 1);

    let audit = std::fs::read_to_string(dir.path().join("daily_stats.csv")).unwrap();
    assert!(audit.starts_with("Date,Time,Subject,Assigned To,Sender,Risk Level\n"));
    assert!(audit.contains("[Assigned: alice@x] Printer jammed,alice@x,ward@hospital,normal"));
}

#[test]
fn once_escalates_breached_ticket() {
    let dir = TempDir::new().unwrap();
    init_with_staff(&dir, "alice@x\nbob@x\n");
    drop_message(
        &dir,
        "001",
        "message_id: m1\nsender: ward@x\nsubject: URGENT monitor offline\n",
    );

    dispatch(&dir)
        .args(["once", "--at", "2026-03-14T09:00:00Z"])
        .assert()
        .success()
        .stdout(predicate::str::contains("assigned  m1 -> alice@x [urgent]"));

    let v = json_output(dispatch(&dir).args(["--json", "once", "--at", "2026-03-14T09:25:00Z"]));
    let esc = &v["escalations"][0];
    assert_eq!(esc["original_assignee"], "alice@x");
    assert_eq!(esc["new_assignee"], "bob@x");
    assert_eq!(esc["elapsed_minutes"], 25);
    assert_eq!(esc["escalation_count"], 1);

    let log = std::fs::read_to_string(dir.path().join(".dispatch/escalations.log")).unwrap();
    assert!(log.contains("Manager: manager@example.com"));

    // Timer was reset at 09:25, so a scan at the same instant is a no-op.
    let v = json_output(dispatch(&dir).args(["--json", "once", "--at", "2026-03-14T09:25:00Z"]));
    assert_eq!(v["escalations"].as_array().unwrap().len(), 0);
}

#[test]
fn once_rejects_bad_timestamp() {
    let dir = TempDir::new().unwrap();
    init_with_staff(&dir, "alice@x\n");
    dispatch(&dir)
        .args(["once", "--at", "yesterday"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --at timestamp"));
}

#[test]
fn once_refuses_invalid_config() {
    let dir = TempDir::new().unwrap();
    init_with_staff(&dir, "alice@x\n");
    std::fs::write(
        dir.path().join(".dispatch/config.yaml"),
        "check_interval_seconds: 0\n",
    )
    .unwrap();
    dispatch(&dir)
        .arg("once")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config"));
}

// ---------------------------------------------------------------------------
// dispatch state / watchdog / stats
// ---------------------------------------------------------------------------

#[test]
fn state_shows_next_assignee() {
    let dir = TempDir::new().unwrap();
    init_with_staff(&dir, "alice@x\nbob@x\n");
    std::fs::write(
        dir.path().join(".dispatch/roster_state.json"),
        r#"{"current_index": 3, "total_processed": 3}"#,
    )
    .unwrap();

    let v = json_output(dispatch(&dir).args(["--json", "state"]));
    assert_eq!(v["next_assignee"], "bob@x");
    assert_eq!(v["current_index"], 3);
    assert_eq!(v["staff"].as_array().unwrap().len(), 2);
}

#[test]
fn watchdog_list_and_resolve() {
    let dir = TempDir::new().unwrap();
    init_with_staff(&dir, "alice@x\n");
    drop_message(&dir, "001", "message_id: m1\nsender: ward@x\nsubject: stat bloods\n");
    dispatch(&dir).arg("once").assert().success();

    let v = json_output(dispatch(&dir).args(["--json", "watchdog", "list"]));
    assert_eq!(v[0]["message_id"], "m1");
    assert_eq!(v[0]["assigned_to"], "alice@x");
    assert_eq!(v[0]["breached"], false);

    dispatch(&dir)
        .args(["watchdog", "resolve", "m1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("resolved m1"));
    dispatch(&dir)
        .args(["watchdog", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No open risk tickets."));
}

#[test]
fn watchdog_resolve_unknown_fails() {
    let dir = TempDir::new().unwrap();
    init_with_staff(&dir, "alice@x\n");
    dispatch(&dir)
        .args(["watchdog", "resolve", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("watchdog entry not found: nope"));
}

#[test]
fn stats_summarises_day() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("daily_stats.csv"),
        "Date,Time,Subject,Assigned To,Sender,Risk Level\n\
         2026-03-14,09:00:00,a,alice@x,w@x,normal\n\
         2026-03-14,09:05:00,b,bob@x,w@x,critical\n\
         2026-03-14,09:30:00,[SLA_FAIL] b,bob@x,w@x,SLA_BREACH\n\
         2026-03-15,09:00:00,c,alice@x,w@x,normal\n",
    )
    .unwrap();

    let v = json_output(dispatch(&dir).args(["--json", "stats", "--date", "2026-03-14"]));
    assert_eq!(v["assignments"], 2);
    assert_eq!(v["sla_breaches"], 1);
    assert_eq!(v["critical"], 1);
    assert_eq!(v["load"]["alice@x"], 1);
    assert_eq!(v["balance_score"], 100.0);
}

// ---------------------------------------------------------------------------
// dispatch config
// ---------------------------------------------------------------------------

#[test]
fn config_validate_clean_defaults() {
    let dir = TempDir::new().unwrap();
    dispatch(&dir).arg("init").assert().success();
    dispatch(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));
}

#[test]
fn config_validate_reports_errors() {
    let dir = TempDir::new().unwrap();
    dispatch(&dir).arg("init").assert().success();
    std::fs::write(dir.path().join(".dispatch/config.yaml"), "sla_minutes: 0\n").unwrap();
    dispatch(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error] sla_minutes is 0"));
}
