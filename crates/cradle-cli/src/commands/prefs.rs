use std::sync::Arc;

use clap::{Subcommand, ValueEnum};
use cradle_core::clock::parse_clock_time;
use cradle_core::{Database, NotificationPreferenceStore, ReminderFamily};

#[derive(Clone, Copy, ValueEnum)]
pub enum Family {
    Sleep,
    Feeding,
    Partner,
}

impl From<Family> for ReminderFamily {
    fn from(family: Family) -> Self {
        match family {
            Family::Sleep => ReminderFamily::SleepWindow,
            Family::Feeding => ReminderFamily::FeedingDue,
            Family::Partner => ReminderFamily::PartnerActivity,
        }
    }
}

#[derive(Subcommand)]
pub enum PrefsAction {
    /// Show current notification preferences
    Show,
    /// Turn a reminder family on
    Enable { family: Family },
    /// Turn a reminder family off
    Disable { family: Family },
    /// Configure quiet hours
    Quiet {
        /// Quiet hours start (HH:MM)
        #[arg(long)]
        start: Option<String>,
        /// Quiet hours end (HH:MM)
        #[arg(long)]
        end: Option<String>,
        /// Disable quiet hours
        #[arg(long)]
        off: bool,
    },
}

pub fn run(action: PrefsAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = NotificationPreferenceStore::new(Arc::new(Database::open()?));

    match action {
        PrefsAction::Show => {
            println!("{}", serde_json::to_string_pretty(&store.load())?);
        }
        PrefsAction::Enable { family } => {
            store.set_enabled(family.into(), true)?;
            println!("ok");
        }
        PrefsAction::Disable { family } => {
            store.set_enabled(family.into(), false)?;
            println!("ok");
        }
        PrefsAction::Quiet { start, end, off } => {
            for value in [&start, &end].into_iter().flatten() {
                if parse_clock_time(value).is_none() {
                    return Err(format!("invalid clock time: {value}").into());
                }
            }
            let prefs = store.update(|p| {
                p.quiet_hours.enabled = !off;
                if let Some(start) = start {
                    p.quiet_hours.start = start;
                }
                if let Some(end) = end {
                    p.quiet_hours.end = end;
                }
            })?;
            println!("{}", serde_json::to_string_pretty(&prefs.quiet_hours)?);
        }
    }
    Ok(())
}
