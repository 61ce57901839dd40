use crate::output::print_json;
use anyhow::Context;
use dispatch_core::{
    config::Config,
    paths,
    roster::StaffRoster,
    state::RosterState,
    store::JsonStore,
    watchdog::WatchdogTable,
};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct StateOutput<'a> {
    staff: &'a [String],
    current_index: u64,
    total_processed: u64,
    next_assignee: Option<&'a str>,
    open_watchdog_entries: usize,
}

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let roster = StaffRoster::load(&paths::staff_path(root)).context("failed to read staff.txt")?;
    let state = JsonStore::<RosterState>::new(paths::roster_state_path(root)).load();
    let watchdog = JsonStore::<WatchdogTable>::new(paths::watchdog_path(root)).load();

    let out = StateOutput {
        staff: roster.members(),
        current_index: state.current_index,
        total_processed: state.total_processed,
        next_assignee: state.peek(&roster).ok(),
        open_watchdog_entries: watchdog.len(),
    };

    if json {
        return print_json(&out);
    }

    println!("Mailbox:         {}", config.mailbox);
    println!("Manager:         {}", config.manager);
    println!("SLA:             {} minutes", config.sla_minutes);
    println!("Staff ({}):", roster.len());
    if roster.is_empty() {
        println!("  (none: add addresses to {})", paths::STAFF_FILE);
    }
    for (i, member) in roster.members().iter().enumerate() {
        let marker = if Some(member.as_str()) == out.next_assignee {
            "→"
        } else {
            " "
        };
        println!("  {marker} {}. {member}", i + 1);
    }
    println!("Current index:   {}", out.current_index);
    println!("Total processed: {}", out.total_processed);
    println!("Next assignee:   {}", out.next_assignee.unwrap_or("-"));
    println!("Open risk tickets: {}", out.open_watchdog_entries);
    Ok(())
}
