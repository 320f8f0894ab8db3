use std::path::PathBuf;

use clap::Subcommand;
use cradle_core::prediction::parse_birth_date;
use cradle_core::{
    CareEvent, Config, FeedingIntervalPredictor, SleepWindowPredictor, WakeWindowPredictor,
};

use super::{load_records, resolve_now};

#[derive(Subcommand)]
pub enum PredictAction {
    /// Next feeding time
    Feeding {
        /// Birth date (YYYY-MM-DD)
        #[arg(long)]
        birth_date: String,
        /// JSON file with an array of event records
        #[arg(long)]
        events: PathBuf,
        /// Evaluate at this RFC 3339 instant instead of now
        #[arg(long)]
        now: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Next recommended sleep window
    Sleep {
        /// Birth date (YYYY-MM-DD)
        #[arg(long)]
        birth_date: String,
        /// JSON file with an array of event records
        #[arg(long)]
        events: PathBuf,
        /// Evaluate at this RFC 3339 instant instead of now
        #[arg(long)]
        now: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: PredictAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        PredictAction::Feeding {
            birth_date,
            events,
            now,
            json,
        } => {
            check_birth_date(&birth_date)?;
            let now = resolve_now(now.as_deref())?;
            let events = parse_events(&events)?;
            let predictor =
                FeedingIntervalPredictor::with_model(Config::load_or_default().feeding_model());
            let prediction = predictor.predict(&birth_date, &events, now);

            if json {
                println!("{}", serde_json::to_string_pretty(&prediction)?);
            } else if let Some(p) = prediction {
                println!("Next feeding: {}", p.next_feeding_time.to_rfc3339());
                println!(
                    "Interval:     {} min ({})",
                    p.interval_minutes,
                    if p.is_personalized { "personalized" } else { "age baseline" }
                );
                println!("Confidence:   {:.2}", p.confidence);
            } else {
                println!("No feeding prediction available");
            }
        }
        PredictAction::Sleep {
            birth_date,
            events,
            now,
            json,
        } => {
            check_birth_date(&birth_date)?;
            let now = resolve_now(now.as_deref())?;
            let events = parse_events(&events)?;
            let prediction = WakeWindowPredictor::default().predict(&birth_date, &events, now);

            if json {
                println!("{}", serde_json::to_string_pretty(&prediction)?);
            } else if let Some(p) = prediction {
                println!("Sleep window: {}", p.recommended_start.to_rfc3339());
                println!("Confidence:   {:.2}", p.confidence);
            } else {
                println!("No sleep window prediction available");
            }
        }
    }
    Ok(())
}

fn check_birth_date(value: &str) -> Result<(), Box<dyn std::error::Error>> {
    if parse_birth_date(value).is_none() {
        return Err(format!("invalid birth date: {value}").into());
    }
    Ok(())
}

fn parse_events(path: &std::path::Path) -> Result<Vec<CareEvent>, Box<dyn std::error::Error>> {
    let records = load_records(path)?;
    Ok(records
        .iter()
        .filter_map(|r| match r.parse() {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!(id = %r.id, "skipping record: {e}");
                None
            }
        })
        .collect())
}
