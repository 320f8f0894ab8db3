use std::path::PathBuf;

use clap::Subcommand;
use cradle_core::{Config, StaleSleepGuard};

use super::{load_records, resolve_now};

#[derive(Subcommand)]
pub enum StaleAction {
    /// Which open sleep to resume and which to auto-close
    Check {
        /// JSON file with an array of care event records (only sleeps are inspected)
        #[arg(long)]
        events: PathBuf,
        /// Evaluate at this RFC 3339 instant instead of now
        #[arg(long)]
        now: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: StaleAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        StaleAction::Check { events, now, json } => {
            let now = resolve_now(now.as_deref())?;
            let records = load_records(&events)?;
            let config = Config::load_or_default();
            let guard = StaleSleepGuard::with_max_open_hours(config.stale.max_open_sleep_hours);
            let resume = guard.resolve(&records, now);

            if json {
                println!("{}", serde_json::to_string_pretty(&resume)?);
                return Ok(());
            }

            match &resume.resume {
                Some(entry) => println!("Resume: {} (started {})", entry.id, entry.start_time),
                None => println!("Resume: none"),
            }
            for close in &resume.auto_close {
                match close.end {
                    Some(end) => println!("Auto-close: {} at {}", close.id, end.to_rfc3339()),
                    None => println!("Auto-close: {} (unparsable start)", close.id),
                }
            }
        }
    }
    Ok(())
}
