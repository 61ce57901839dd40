use crate::output::print_json;
use anyhow::Context;
use chrono::{DateTime, Utc};
use dispatch_core::config::WarnLevel;
use dispatch_core::transport::SpoolMailbox;
use dispatch_core::{paths, CycleReport, Dispatcher, TicketOutcome};
use std::path::Path;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

/// Run a cycle immediately and then once per interval until Ctrl-C. A cycle
/// in progress always completes before shutdown.
pub fn run(root: &Path) -> anyhow::Result<()> {
    let mut dispatcher = open(root)?;
    let config = dispatcher.config().clone();
    let mut mailbox = SpoolMailbox::new(paths::mailbox_dir(root), &config.mailbox);
    let period = Duration::from_secs(config.check_interval_seconds);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        tracing::info!(
            root = %root.display(),
            mailbox = %config.mailbox,
            staff = dispatcher.roster().len(),
            sla_minutes = config.sla_minutes,
            interval_seconds = config.check_interval_seconds,
            "dispatcher started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    dispatcher.run_cycle(&mut mailbox, Utc::now());
                }
                res = &mut shutdown => {
                    if let Err(e) = res {
                        tracing::error!(error = %e, "failed to listen for Ctrl-C");
                    }
                    break;
                }
            }
        }

        dispatcher.flush_state();
        tracing::info!("dispatcher stopped");
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// once
// ---------------------------------------------------------------------------

pub fn once(root: &Path, at: Option<&str>, json: bool) -> anyhow::Result<()> {
    let now = match at {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("invalid --at timestamp '{raw}'"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    let mut dispatcher = open(root)?;
    let mut mailbox = SpoolMailbox::new(paths::mailbox_dir(root), &dispatcher.config().mailbox);
    let report = dispatcher.run_cycle(&mut mailbox, now);

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }
    Ok(())
}

fn open(root: &Path) -> anyhow::Result<Dispatcher> {
    let dispatcher = Dispatcher::open(root).context("failed to load config")?;
    let errors: Vec<String> = dispatcher
        .config()
        .validate()
        .into_iter()
        .filter(|w| w.level == WarnLevel::Error)
        .map(|w| w.message)
        .collect();
    if !errors.is_empty() {
        anyhow::bail!("invalid config: {}", errors.join("; "));
    }
    Ok(dispatcher)
}

fn print_report(report: &CycleReport) {
    if let Some(err) = &report.transport_error {
        println!("mailbox unavailable: {err}");
    }
    for outcome in &report.outcomes {
        match outcome {
            TicketOutcome::Assigned {
                message_id,
                assignee,
                level,
                ..
            } => println!("assigned  {message_id} -> {assignee} [{level}]"),
            TicketOutcome::Closed {
                message_id,
                sender,
                resolved,
            } => match resolved {
                Some(id) => println!("closed    {message_id} by {sender} (resolved {id})"),
                None => println!("closed    {message_id} by {sender}"),
            },
            TicketOutcome::Skipped { message_id, reason } => {
                println!("skipped   {message_id}: {reason}")
            }
            TicketOutcome::Refiled { message_id } => println!("refiled   {message_id}"),
        }
    }
    for f in &report.failures {
        println!("failed    {} [{}]: {}", f.message_id, f.kind, f.error);
    }
    for e in &report.escalations {
        println!(
            "escalated {} after {}m: {} -> {} (count {})",
            e.message_id, e.elapsed_minutes, e.original_assignee, e.new_assignee, e.escalation_count
        );
    }
    if report.is_idle() && report.transport_error.is_none() {
        println!("nothing to do");
    }
}
