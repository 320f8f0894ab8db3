use clap::Subcommand;
use cradle_core::reminders::{schedule_key_storage_key, FEEDING_DUE_ID, SLEEP_WINDOW_ID};
use cradle_core::{Database, KeyValueStore};

#[derive(Subcommand)]
pub enum RemindersAction {
    /// Show the window each reminder slot last scheduled for
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Forget recorded schedule keys so the next update reschedules
    Reset,
}

pub fn run(action: RemindersAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        RemindersAction::Status { json } => {
            let mut slots = serde_json::Map::new();
            for identifier in [SLEEP_WINDOW_ID, FEEDING_DUE_ID] {
                let key = db.get(&schedule_key_storage_key(identifier))?;
                slots.insert(identifier.to_string(), serde_json::json!(key));
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&slots)?);
            } else {
                for (identifier, key) in &slots {
                    println!("{identifier}: {}", key.as_str().unwrap_or("none"));
                }
            }
        }
        RemindersAction::Reset => {
            let keys = db.keys_with_prefix("reminder.")?;
            for key in &keys {
                db.remove(key)?;
            }
            println!("cleared {} schedule key(s)", keys.len());
        }
    }
    Ok(())
}
