//! Polling coordinator actor.
//!
//! All coordinator state lives in one task. Observers, the interval timer
//! and finished polls talk to it through a single command queue, so there
//! is no shared mutable state to lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{
    AppLifecycle, Connectivity, PartnerActivitySource, PartnerUpdate, SubscriptionToken,
};
use crate::error::CoreError;
use crate::storage::PollingConfig;

enum Command {
    Start {
        token: SubscriptionToken,
        updates: mpsc::UnboundedSender<PartnerUpdate>,
    },
    Stop {
        token: SubscriptionToken,
    },
    Tick,
    PollNow,
    Lifecycle(AppLifecycle),
    /// `None` when the poll task died before producing a result.
    PollFinished(Option<Result<u32, CoreError>>),
    Snapshot(oneshot::Sender<PollingSnapshot>),
}

/// Point-in-time view of the coordinator, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollingSnapshot {
    pub subscriber_count: usize,
    pub timer_active: bool,
    pub in_flight: bool,
    pub last_unread_count: Option<u32>,
    pub lifecycle: AppLifecycle,
    pub consecutive_failures: u32,
    pub connectivity: Connectivity,
}

/// Handle to the process-wide partner polling coordinator.
///
/// Construct once at startup and hand clones to every observer.
#[derive(Clone)]
pub struct PollingCoordinator {
    commands: mpsc::UnboundedSender<Command>,
}

impl PollingCoordinator {
    /// Spawn the coordinator task. Must be called inside a tokio runtime.
    pub fn new(source: Arc<dyn PartnerActivitySource>, config: &PollingConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = Actor {
            source,
            period: Duration::from_secs(config.interval_secs.max(1)),
            degraded_after: config.degraded_after_failures.max(1),
            commands: tx.downgrade(),
            subscribers: HashMap::new(),
            timer: None,
            in_flight: false,
            last_unread_count: None,
            lifecycle: AppLifecycle::Active,
            consecutive_failures: 0,
            connectivity: Connectivity::Healthy,
        };
        tokio::spawn(actor.run(rx));
        Self { commands: tx }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("polling coordinator has shut down");
        }
    }

    /// Register a new observer and return its subscription.
    ///
    /// Dropping the subscription stops polling for it.
    pub fn subscribe(&self) -> Subscription {
        let token = SubscriptionToken::new();
        let updates = self.start_polling(token);
        Subscription {
            token,
            updates,
            coordinator: self.clone(),
        }
    }

    /// Add `token` to the subscriber set.
    ///
    /// The first subscriber starts the timer and one immediate poll. If
    /// `token` is already subscribed nothing changes and the returned
    /// receiver is closed.
    pub fn start_polling(&self, token: SubscriptionToken) -> mpsc::UnboundedReceiver<PartnerUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.send(Command::Start { token, updates: tx });
        rx
    }

    /// Remove `token`. The last one out stops the timer.
    pub fn stop_polling(&self, token: SubscriptionToken) {
        self.send(Command::Stop { token });
    }

    pub fn set_lifecycle(&self, lifecycle: AppLifecycle) {
        self.send(Command::Lifecycle(lifecycle));
    }

    /// Request an out-of-band poll. Dropped if one is already running or
    /// nobody is subscribed.
    pub fn poll_now(&self) {
        self.send(Command::PollNow);
    }

    pub async fn snapshot(&self) -> Option<PollingSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx));
        rx.await.ok()
    }
}

/// One observer's view of the shared poll.
pub struct Subscription {
    token: SubscriptionToken,
    updates: mpsc::UnboundedReceiver<PartnerUpdate>,
    coordinator: PollingCoordinator,
}

impl Subscription {
    pub fn token(&self) -> SubscriptionToken {
        self.token
    }

    pub async fn recv(&mut self) -> Option<PartnerUpdate> {
        self.updates.recv().await
    }

    pub fn try_recv(&mut self) -> Option<PartnerUpdate> {
        self.updates.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.coordinator.stop_polling(self.token);
    }
}

// ── Actor ───────────────────────────────────────────────────────────

struct Actor {
    source: Arc<dyn PartnerActivitySource>,
    period: Duration,
    degraded_after: u32,
    commands: mpsc::WeakUnboundedSender<Command>,
    subscribers: HashMap<SubscriptionToken, mpsc::UnboundedSender<PartnerUpdate>>,
    timer: Option<JoinHandle<()>>,
    in_flight: bool,
    last_unread_count: Option<u32>,
    lifecycle: AppLifecycle,
    consecutive_failures: u32,
    connectivity: Connectivity,
}

impl Actor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            self.handle(command);
        }
        self.stop_timer();
        debug!("polling coordinator stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Start { token, updates } => self.add_subscriber(token, updates),
            Command::Stop { token } => self.remove_subscriber(token),
            Command::Tick => {
                if self.subscribers.is_empty() {
                    return;
                }
                if !self.lifecycle.allows_polling() {
                    debug!(lifecycle = ?self.lifecycle, "skipping poll tick");
                    return;
                }
                self.trigger_poll();
            }
            Command::PollNow => {
                if !self.subscribers.is_empty() {
                    self.trigger_poll();
                }
            }
            Command::Lifecycle(next) => {
                let previous = std::mem::replace(&mut self.lifecycle, next);
                debug!(?previous, ?next, "lifecycle changed");
                if next == AppLifecycle::Active
                    && previous != AppLifecycle::Active
                    && !self.subscribers.is_empty()
                {
                    self.trigger_poll();
                }
            }
            Command::PollFinished(result) => self.finish_poll(result),
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn snapshot(&self) -> PollingSnapshot {
        PollingSnapshot {
            subscriber_count: self.subscribers.len(),
            timer_active: self.timer.is_some(),
            in_flight: self.in_flight,
            last_unread_count: self.last_unread_count,
            lifecycle: self.lifecycle,
            consecutive_failures: self.consecutive_failures,
            connectivity: self.connectivity,
        }
    }

    fn add_subscriber(
        &mut self,
        token: SubscriptionToken,
        updates: mpsc::UnboundedSender<PartnerUpdate>,
    ) {
        if self.subscribers.contains_key(&token) {
            debug!(%token, "already subscribed");
            return;
        }
        self.subscribers.insert(token, updates);
        if self.timer.is_none() {
            info!(period_secs = self.period.as_secs(), "partner polling started");
            self.timer = self.spawn_timer();
            if self.lifecycle.allows_polling() {
                self.trigger_poll();
            }
        }
    }

    fn remove_subscriber(&mut self, token: SubscriptionToken) {
        if self.subscribers.remove(&token).is_some() && self.subscribers.is_empty() {
            self.stop_timer();
            info!("partner polling idle");
        }
    }

    fn spawn_timer(&self) -> Option<JoinHandle<()>> {
        let commands = self.commands.upgrade()?;
        let period = self.period;
        Some(tokio::spawn(async move {
            let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                if commands.send(Command::Tick).is_err() {
                    break;
                }
            }
        }))
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn trigger_poll(&mut self) {
        if self.in_flight {
            debug!("poll already in flight, dropping trigger");
            return;
        }
        let Some(commands) = self.commands.upgrade() else {
            return;
        };
        self.in_flight = true;
        let source = self.source.clone();
        tokio::spawn(async move {
            let mut guard = InFlightGuard {
                commands,
                result: None,
            };
            guard.result = Some(poll_once(source.as_ref()).await);
        });
    }

    fn finish_poll(&mut self, result: Option<Result<u32, CoreError>>) {
        self.in_flight = false;
        match result {
            Some(Ok(unread_count)) => {
                self.consecutive_failures = 0;
                self.connectivity = Connectivity::Healthy;
                self.last_unread_count = Some(unread_count);
                self.broadcast(PartnerUpdate {
                    unread_count,
                    connectivity: Connectivity::Healthy,
                    at: Utc::now(),
                });
            }
            Some(Err(e)) => {
                warn!("partner poll failed: {e}");
                self.record_failure();
            }
            None => {
                warn!("partner poll aborted");
                self.record_failure();
            }
        }
    }

    fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures >= self.degraded_after
            && self.connectivity == Connectivity::Healthy
        {
            self.connectivity = Connectivity::Degraded;
            warn!(
                failures = self.consecutive_failures,
                "partner connectivity degraded"
            );
            self.broadcast(PartnerUpdate {
                unread_count: self.last_unread_count.unwrap_or(0),
                connectivity: Connectivity::Degraded,
                at: Utc::now(),
            });
        }
    }

    fn broadcast(&mut self, update: PartnerUpdate) {
        self.subscribers
            .retain(|_, tx| tx.send(update.clone()).is_ok());
        if self.subscribers.is_empty() && self.timer.is_some() {
            self.stop_timer();
            info!("partner polling idle");
        }
    }
}

/// Reports the poll result to the actor however the poll task ends,
/// including by panic.
struct InFlightGuard {
    commands: mpsc::UnboundedSender<Command>,
    result: Option<Result<u32, CoreError>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::PollFinished(self.result.take()));
    }
}

async fn poll_once(source: &dyn PartnerActivitySource) -> Result<u32, CoreError> {
    let new_items = source.fetch_new_partner_activity().await?;
    if new_items > 0 {
        debug!(new_items, "new partner activity");
    }
    source.fetch_unread_count().await
}
