use chrono::NaiveDate;
use clap::Subcommand;
use cradle_core::clock::{format_clock_time, parse_clock_time, NightWindow};

#[derive(Subcommand)]
pub enum ClockAction {
    /// Night window starting on a date
    NightWindow {
        /// Day the window starts (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        /// Window start (HH:MM)
        #[arg(long, default_value = "22:00")]
        start: String,
        /// Window end (HH:MM); earlier than start means the next day
        #[arg(long, default_value = "06:00")]
        end: String,
        #[arg(long)]
        json: bool,
    },
    /// Normalize an HH:MM time to minutes since midnight
    Minutes {
        /// Time (HH:MM)
        time: String,
    },
}

pub fn run(action: ClockAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ClockAction::NightWindow {
            date,
            start,
            end,
            json,
        } => {
            let day = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .map_err(|_| format!("invalid date: {date}"))?;
            let window = NightWindow::parse_for_day(day, &start, &end)
                .ok_or_else(|| format!("invalid window: {start}-{end}"))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&window)?);
            } else {
                println!("Start: {}", window.start.to_rfc3339());
                println!("End:   {}", window.end.to_rfc3339());
                println!("Length: {} min", window.duration_minutes());
            }
        }
        ClockAction::Minutes { time } => {
            let minutes =
                parse_clock_time(&time).ok_or_else(|| format!("invalid clock time: {time}"))?;
            println!("{minutes} ({})", format_clock_time(minutes));
        }
    }
    Ok(())
}
