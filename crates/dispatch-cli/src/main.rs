mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, watchdog::WatchdogSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "dispatch",
    about = "Helpdesk dispatcher: round-robin assignment, risk triage and SLA escalation",
    version,
    propagate_version = true
)]
struct Cli {
    /// Dispatch root (default: nearest ancestor containing .dispatch/)
    #[arg(long, global = true, env = "DISPATCH_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create config, staff file, state files and mailbox folders
    Init,

    /// Poll the mailbox and scan the watchdog until Ctrl-C
    Run,

    /// Run a single cycle and print what it did
    Once {
        /// Cycle time as RFC 3339 (default: now)
        #[arg(long)]
        at: Option<String>,
    },

    /// Classify a subject and body without dispatching anything
    Classify {
        subject: String,

        #[arg(long, default_value = "")]
        body: String,

        /// Treat the message as flagged high importance
        #[arg(long)]
        high_importance: bool,
    },

    /// Show roster, round-robin position and next assignee
    State,

    /// Inspect or resolve open risk tickets
    Watchdog {
        #[command(subcommand)]
        subcommand: WatchdogSubcommand,
    },

    /// Summarise the audit log for one day
    Stats {
        /// Day as YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
    },

    /// Validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run | Commands::Once { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Run => cmd::run::run(&root),
        Commands::Once { at } => cmd::run::once(&root, at.as_deref(), cli.json),
        Commands::Classify {
            subject,
            body,
            high_importance,
        } => cmd::classify::run(&root, &subject, &body, high_importance, cli.json),
        Commands::State => cmd::state::run(&root, cli.json),
        Commands::Watchdog { subcommand } => cmd::watchdog::run(&root, subcommand, cli.json),
        Commands::Stats { date } => cmd::stats::run(&root, date.as_deref(), cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
