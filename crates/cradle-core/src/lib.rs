//! Cradle core library.
//!
//! Predicts the next feeding and sleep window from a logged care history,
//! keeps the matching local reminders in sync, repairs abandoned open sleeps
//! and runs one shared partner-activity poll for every interested screen.

pub mod clock;
pub mod engine;
pub mod error;
pub mod events;
pub mod polling;
pub mod prediction;
pub mod preferences;
pub mod reminders;
pub mod stale;
pub mod storage;

pub use engine::{CareEngine, CareEventStore, SleepRefresh};
pub use error::{ConfigError, CoreError, DatabaseError, ReminderError, ValidationError};
pub use events::{CareEvent, CareEventKind, CareEventRecord};
pub use polling::{
    AppLifecycle, Connectivity, PartnerActivitySource, PartnerUpdate, PollingCoordinator,
    PollingSnapshot, Subscription, SubscriptionToken,
};
pub use prediction::{
    FeedingIntervalPredictor, FeedingPrediction, SleepWindowPrediction, SleepWindowPredictor,
    WakeWindowPredictor,
};
pub use preferences::{NotificationPreferenceStore, NotificationPreferences, ReminderFamily};
pub use reminders::{
    FeedingReminderScheduler, ReminderOutcome, ReminderService, ScheduledReminder,
    SleepReminderScheduler,
};
pub use stale::{StaleSleepGuard, TrackingResume};
pub use storage::{Config, Database, KeyValueStore, MemoryStore};
