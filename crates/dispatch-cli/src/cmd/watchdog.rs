use crate::output::{print_json, print_table};
use anyhow::Context;
use chrono::Utc;
use clap::Subcommand;
use dispatch_core::{config::Config, paths, ticket::truncate_chars, watchdog::Watchdog};
use serde::Serialize;
use std::path::Path;

#[derive(Subcommand)]
pub enum WatchdogSubcommand {
    /// List open risk tickets with elapsed time
    List,

    /// Stop tracking a ticket (e.g. it was handled outside the mailbox)
    Resolve {
        /// Message id of the entry
        id: String,
    },
}

pub fn run(root: &Path, subcommand: WatchdogSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let mut watchdog = Watchdog::open(
        paths::watchdog_path(root),
        config.sla_limit(),
        config.watchdog_subject_chars,
    );

    match subcommand {
        WatchdogSubcommand::List => list(&watchdog, json),
        WatchdogSubcommand::Resolve { id } => {
            let entry = watchdog.resolve(&id)?;
            watchdog.flush().context("failed to save watchdog table")?;
            if json {
                print_json(&serde_json::json!({
                    "resolved": entry.message_id,
                    "assigned_to": entry.assigned_to,
                    "escalation_count": entry.escalation_count,
                }))?;
            } else {
                println!("resolved {} (was assigned to {})", entry.message_id, entry.assigned_to);
            }
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct EntryView<'a> {
    message_id: &'a str,
    subject: &'a str,
    assigned_to: &'a str,
    risk_level: String,
    risk_reason: &'a str,
    elapsed_minutes: i64,
    escalation_count: u32,
    breached: bool,
}

fn list(watchdog: &Watchdog, json: bool) -> anyhow::Result<()> {
    let now = Utc::now();
    let views: Vec<EntryView> = watchdog
        .entries()
        .map(|e| EntryView {
            message_id: &e.message_id,
            subject: &e.subject,
            assigned_to: &e.assigned_to,
            risk_level: e.risk_level.to_string(),
            risk_reason: &e.risk_reason,
            elapsed_minutes: e.elapsed(now).num_minutes(),
            escalation_count: e.escalation_count,
            breached: e.is_breached(now, watchdog.sla()),
        })
        .collect();

    if json {
        return print_json(&views);
    }
    if views.is_empty() {
        println!("No open risk tickets.");
        return Ok(());
    }

    let rows = views
        .iter()
        .map(|v| {
            vec![
                v.message_id.to_string(),
                v.assigned_to.to_string(),
                v.risk_level.clone(),
                if v.breached {
                    format!("{}m BREACHED", v.elapsed_minutes)
                } else {
                    format!("{}m", v.elapsed_minutes)
                },
                v.escalation_count.to_string(),
                truncate_chars(v.subject, 50),
            ]
        })
        .collect();
    print_table(
        &["ID", "ASSIGNED", "RISK", "ELAPSED", "ESCALATIONS", "SUBJECT"],
        rows,
    );
    Ok(())
}
