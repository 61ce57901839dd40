use anyhow::Context;
use dispatch_core::{
    config::Config,
    io, paths,
    state::RosterState,
    store::JsonStore,
    watchdog::WatchdogTable,
};
use std::path::Path;

const STAFF_TEMPLATE: &str = "\
# One staff address per line. Blank lines and lines starting with '#' are ignored.
# Tickets are assigned in this order, round-robin.
";

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing dispatcher in: {}", root.display());

    // 1. Config first: the processed folder name decides the mailbox layout.
    let config_path = paths::config_path(root);
    let config = if config_path.exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
        Config::load(root).context("failed to load config.yaml")?
    } else {
        let cfg = Config::default();
        cfg.save(root).context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
        cfg
    };

    // 2. Spool mailbox folders
    for folder in [
        paths::INBOX_FOLDER,
        paths::OUTBOX_FOLDER,
        config.processed_folder.as_str(),
    ] {
        let p = paths::mailbox_folder(root, folder);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }
    println!("  ready:   {}/", paths::MAILBOX_DIR);

    // 3. Staff roster
    report(
        paths::STAFF_FILE,
        io::write_if_missing(&paths::staff_path(root), STAFF_TEMPLATE.as_bytes())
            .context("failed to write staff.txt")?,
    );

    // 4. State files
    let roster_state: JsonStore<RosterState> = JsonStore::new(paths::roster_state_path(root));
    report(
        paths::ROSTER_STATE_FILE,
        save_if_missing(&roster_state).context("failed to write roster state")?,
    );
    let watchdog: JsonStore<WatchdogTable> = JsonStore::new(paths::watchdog_path(root));
    report(
        paths::WATCHDOG_FILE,
        save_if_missing(&watchdog).context("failed to write watchdog table")?,
    );

    println!("\nDispatcher initialized.");
    println!("Next: add staff to {} and run `dispatch run`.", paths::STAFF_FILE);
    Ok(())
}

fn save_if_missing<T>(store: &JsonStore<T>) -> dispatch_core::Result<bool>
where
    T: serde::Serialize + serde::de::DeserializeOwned + Default,
{
    if store.path().exists() {
        return Ok(false);
    }
    store.save(&T::default())?;
    Ok(true)
}

fn report(name: &str, created: bool) {
    if created {
        println!("  created: {name}");
    } else {
        println!("  exists:  {name}");
    }
}
