use crate::output::{print_json, print_table};
use anyhow::Context;
use chrono::{Local, NaiveDate};
use dispatch_core::audit::{AuditLog, AuditSummary};
use dispatch_core::paths;
use std::path::Path;

pub fn run(root: &Path, date: Option<&str>, json: bool) -> anyhow::Result<()> {
    let date = match date {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .with_context(|| format!("invalid --date '{raw}', expected YYYY-MM-DD"))?,
        None => Local::now().date_naive(),
    };

    let log = AuditLog::new(paths::audit_path(root));
    let records = log
        .read_all()
        .with_context(|| format!("failed to read {}", log.path().display()))?;
    let summary = AuditSummary::for_date(&records, date);

    if json {
        return print_json(&summary);
    }

    println!("Date:          {}", summary.date);
    println!("Rows:          {}", summary.total_rows);
    println!("Assigned:      {}", summary.assignments);
    println!("Completed:     {}", summary.completions);
    println!("SLA breaches:  {}", summary.sla_breaches);
    println!("Urgent:        {}", summary.urgent);
    println!("Critical:      {}", summary.critical);
    println!("Balance score: {:.1}", summary.balance_score);

    if !summary.load.is_empty() {
        println!();
        let rows = summary
            .load
            .iter()
            .map(|(who, n)| vec![who.clone(), n.to_string()])
            .collect();
        print_table(&["STAFF", "TICKETS"], rows);
    }
    Ok(())
}
