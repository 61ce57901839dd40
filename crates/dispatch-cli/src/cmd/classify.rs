use crate::output::print_json;
use anyhow::Context;
use dispatch_core::classifier::RiskClassifier;
use dispatch_core::config::Config;
use std::path::Path;

pub fn run(
    root: &Path,
    subject: &str,
    body: &str,
    high_importance: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let verdict = RiskClassifier::new(&config.rules).classify(subject, body, high_importance);

    if json {
        print_json(&verdict)?;
    } else {
        println!("level:  {}", verdict.level);
        if !verdict.reason.is_empty() {
            println!("reason: {}", verdict.reason);
        }
    }
    Ok(())
}
