use crate::configuration::WatcherSettings;
use crate::domain::{Subscription, UserId};
use crate::subscription_store::SubscriptionStore;
use crate::telegram_client::NotificationSink;
use crate::watcher::detector::{Decision, evaluate, format_invalidation_notice};
use crate::watcher::fetcher::{FetchResult, StatusFetcher};
use crate::watcher::gate::WatchGate;
use futures::{FutureExt, StreamExt, stream};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollOutcome {
    Unchanged,
    Unreachable,
    Notified { delivered: bool },
    Invalidated,
    Failed,
}

/// Counters for one pass over all watched subscriptions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub polled: usize,
    pub notified: usize,
    pub delivered: usize,
    pub invalidated: usize,
    pub unreachable: usize,
    pub failed: usize,
}

impl TickReport {
    fn record(&mut self, outcome: PollOutcome) {
        self.polled += 1;
        match outcome {
            PollOutcome::Unchanged => {}
            PollOutcome::Unreachable => self.unreachable += 1,
            PollOutcome::Notified { delivered } => {
                self.notified += 1;
                if delivered {
                    self.delivered += 1;
                }
            }
            PollOutcome::Invalidated => self.invalidated += 1,
            PollOutcome::Failed => self.failed += 1,
        }
    }
}

/// Polls every watched subscription on a fixed interval and notifies users
/// about new builds.
///
/// The subscription list is re-read from the store on every tick, so users
/// registered or removed while the loop runs are picked up on the next tick.
/// A tick is awaited to completion before the next one is scheduled and at
/// most `max_in_flight` status endpoints are polled at once.
pub struct Watcher {
    store: Arc<dyn SubscriptionStore>,
    sink: Arc<dyn NotificationSink>,
    fetcher: StatusFetcher,
    gate: WatchGate,
    interval: Duration,
    max_in_flight: usize,
}

impl Watcher {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        sink: Arc<dyn NotificationSink>,
        fetcher: StatusFetcher,
        gate: WatchGate,
        settings: &WatcherSettings,
    ) -> Self {
        Self {
            store,
            sink,
            fetcher,
            gate,
            interval: settings.interval(),
            max_in_flight: settings.max_in_flight.max(1),
        }
    }

    pub fn gate(&self) -> &WatchGate {
        &self.gate
    }

    /// Allows notifications to be delivered again.
    pub fn start(&self) {
        self.gate.open();
        info!("Notifications enabled");
    }

    /// Suppresses delivery. Polling and persistence keep running.
    pub fn stop(&self) {
        self.gate.close();
        info!("Notifications suppressed");
    }

    /// Runs ticks until `shutdown` is cancelled.
    ///
    /// A tick in progress at cancellation is dropped together with its
    /// in-flight fetches.
    #[instrument(skip_all, fields(interval = ?self.interval))]
    pub async fn watch(&self, shutdown: CancellationToken) {
        info!("Starting build status watcher");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                report = self.tick() => {
                    info!(
                        polled = report.polled,
                        notified = report.notified,
                        delivered = report.delivered,
                        invalidated = report.invalidated,
                        unreachable = report.unreachable,
                        failed = report.failed,
                        "Tick completed. Waiting for next interval..."
                    );
                }
            }
        }

        info!("Build status watcher stopped");
    }

    /// Polls every watched subscription once.
    pub async fn tick(&self) -> TickReport {
        let subscriptions = match self.store.list_watched().await {
            Ok(subscriptions) => subscriptions,
            Err(e) => {
                error!("Failed to load watched subscriptions: {}", e);
                return TickReport::default();
            }
        };
        debug!("Polling {} subscriptions", subscriptions.len());

        let watched = subscriptions.into_iter().filter(|s| s.watching);
        let outcomes: Vec<PollOutcome> = stream::iter(watched)
            .map(|subscription| {
                let user_id = subscription.user_id;
                AssertUnwindSafe(self.poll(subscription))
                    .catch_unwind()
                    .map(move |result| {
                        result.unwrap_or_else(|_| {
                            error!(%user_id, "Polling panicked");
                            PollOutcome::Failed
                        })
                    })
            })
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await;

        let mut report = TickReport::default();
        for outcome in outcomes {
            report.record(outcome);
        }
        report
    }

    #[instrument(skip_all, fields(user_id = %subscription.user_id))]
    async fn poll(&self, subscription: Subscription) -> PollOutcome {
        let fetch = self.fetcher.fetch(&subscription.status_url).await;

        match evaluate(&subscription, &fetch) {
            Decision::NoOp => match fetch {
                FetchResult::Unreachable(reason) => {
                    warn!("Status endpoint {} unreachable: {}", subscription.status_url, reason);
                    PollOutcome::Unreachable
                }
                _ => PollOutcome::Unchanged,
            },
            Decision::Notify {
                message,
                prev_build,
                curr_build,
            } => {
                if let Err(e) = self
                    .store
                    .update_build(subscription.user_id, prev_build, curr_build)
                    .await
                {
                    error!("Failed to persist build #{}: {}", curr_build, e);
                    return PollOutcome::Failed;
                }
                info!("Build changed from {:?} to {}", prev_build, curr_build);
                let delivered = self.deliver(subscription.user_id, &message).await;
                PollOutcome::Notified { delivered }
            }
            Decision::Invalidate => {
                if let FetchResult::Invalid(reason) = &fetch {
                    warn!("Status endpoint {} is invalid: {}", subscription.status_url, reason);
                }
                if let Err(e) = self.store.set_watching(subscription.user_id, false).await {
                    error!("Failed to stop watching {}: {}", subscription.status_url, e);
                    return PollOutcome::Failed;
                }
                let notice = format_invalidation_notice(&subscription.source_url);
                self.deliver(subscription.user_id, &notice).await;
                PollOutcome::Invalidated
            }
        }
    }

    async fn deliver(&self, user_id: UserId, text: &str) -> bool {
        if !self.gate.is_open() {
            debug!("Notifications are stopped, message for {} dropped", user_id);
            return false;
        }
        match self.sink.send(user_id, text).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to notify {}: {}", user_id, e);
                false
            }
        }
    }
}

/// Runs [`Watcher::watch`] on its own task.
pub fn spawn_watcher(watcher: Arc<Watcher>, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move { watcher.watch(shutdown).await })
}
