use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "cradle", version, about = "Cradle care-event engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Feeding and sleep predictions from an event file
    Predict {
        #[command(subcommand)]
        action: commands::predict::PredictAction,
    },
    /// Open sleep entry inspection
    Stale {
        #[command(subcommand)]
        action: commands::stale::StaleAction,
    },
    /// Wall-clock helpers
    Clock {
        #[command(subcommand)]
        action: commands::clock::ClockAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Notification preferences
    Prefs {
        #[command(subcommand)]
        action: commands::prefs::PrefsAction,
    },
    /// Reminder slot state
    Reminders {
        #[command(subcommand)]
        action: commands::reminders::RemindersAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CRADLE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Predict { action } => commands::predict::run(action),
        Commands::Stale { action } => commands::stale::run(action),
        Commands::Clock { action } => commands::clock::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Prefs { action } => commands::prefs::run(action),
        Commands::Reminders { action } => commands::reminders::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
