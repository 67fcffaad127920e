//! The 1 Hz sampling driver.
//!
//! One task owns the tick: it asks the foreground probe for the current
//! application, feeds the sample to the shared [`Tracker`], persists pending
//! changes through the debounced [`Persister`], and hands alerts to the
//! notifier. Probe and notifier calls run on the blocking pool under a
//! timeout so a stalled collaborator costs at most one tick. Ticks that
//! overrun are skipped rather than queued.
//!
//! The tracker sits behind a mutex so a host can read live totals, edit
//! rules or request a reset from another task; the lock is never held
//! across an await point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::persist::{Persister, UsageStore};
use crate::rules::{Alert, Notification};
use crate::tracker::Tracker;
use crate::types::ApplicationIdentity;

/// A tracker shared between the sampling loop and its host.
pub type SharedTracker = Arc<Mutex<Tracker>>;

/// Locks a shared tracker, recovering the state if a holder panicked.
pub fn lock_tracker(tracker: &SharedTracker) -> MutexGuard<'_, Tracker> {
    tracker.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Reports which application holds the foreground.
pub trait ForegroundProbe: Send + Sync + 'static {
    /// The current foreground application, or `None` if indeterminate.
    fn foreground(&self) -> Option<ApplicationIdentity>;
}

/// Notification delivery errors.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The delivery mechanism could not be started.
    #[error("failed to launch notifier: {0}")]
    Launch(#[from] std::io::Error),

    /// The delivery mechanism reported failure.
    #[error("notification rejected: {0}")]
    Rejected(String),
}

/// Delivers alerts to the user.
pub trait Notifier: Send + Sync + 'static {
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Drives a [`Tracker`] from a [`ForegroundProbe`] until cancelled.
pub struct SamplingLoop<P, N, S> {
    tracker: SharedTracker,
    probe: Arc<P>,
    notifier: Arc<N>,
    persister: Persister<S>,
    probe_in_flight: Arc<AtomicBool>,
    interval: Duration,
    timeout: Duration,
}

impl<P: ForegroundProbe, N: Notifier, S: UsageStore> SamplingLoop<P, N, S> {
    /// Creates a loop over `tracker`, using its configuration for timing.
    pub fn new(tracker: SharedTracker, probe: P, notifier: N, store: S) -> Self {
        let config = lock_tracker(&tracker).config().clone();
        Self {
            persister: Persister::new(
                store,
                config.persist_interval_ms,
                config.history_retention_days,
            ),
            tracker,
            probe: Arc::new(probe),
            notifier: Arc::new(notifier),
            probe_in_flight: Arc::new(AtomicBool::new(false)),
            interval: Duration::from_millis(config.sample_interval_ms.max(1)),
            timeout: Duration::from_millis(config.collaborator_timeout_ms),
        }
    }

    /// Samples until `cancel` fires, then flushes the in-flight session and
    /// persists everything. Returns the store.
    ///
    /// Time between the last tick and cancellation is attributed at stop;
    /// time after it is lost.
    pub async fn run(mut self, cancel: CancellationToken) -> S {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(interval = ?self.interval, "sampling loop started");

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                () = cancel.cancelled() => break,
            }
        }

        self.stop().await;
        tracing::info!("sampling loop stopped");
        self.persister.into_store()
    }

    async fn tick(&mut self) {
        let identity = self.probe_foreground().await;
        let now = Utc::now();
        let alerts = {
            let mut tracker = lock_tracker(&self.tracker);
            let alerts = tracker.tick(identity.as_ref(), now);
            self.persister.persist_if_due(&mut tracker, now);
            alerts
        };
        for alert in alerts {
            self.dispatch(&alert, now).await;
        }
    }

    async fn probe_foreground(&self) -> Option<ApplicationIdentity> {
        if self.probe_in_flight.swap(true, Ordering::AcqRel) {
            tracing::debug!("previous foreground probe still running, skipping tick");
            return None;
        }
        let probe = Arc::clone(&self.probe);
        let in_flight = Arc::clone(&self.probe_in_flight);
        let task = tokio::task::spawn_blocking(move || {
            let identity = probe.foreground();
            in_flight.store(false, Ordering::Release);
            identity
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(identity)) => identity,
            Ok(Err(err)) => {
                self.probe_in_flight.store(false, Ordering::Release);
                tracing::warn!(error = %err, "foreground probe failed");
                None
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "foreground probe timed out");
                None
            }
        }
    }

    async fn dispatch(&self, alert: &Alert, now: DateTime<Utc>) {
        let notification = alert.to_notification(now);
        let notifier = Arc::clone(&self.notifier);
        let task = tokio::task::spawn_blocking(move || {
            let result = notifier.deliver(&notification);
            (notification, result)
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok((notification, result))) => log_delivery(&notification, alert, result),
            Ok(Err(err)) => tracing::warn!(error = %err, app = %alert.app_name, "notifier failed"),
            Err(_) => tracing::warn!(app = %alert.app_name, "notification delivery timed out"),
        }
    }

    async fn stop(&mut self) {
        let now = Utc::now();
        let alerts = {
            let mut tracker = lock_tracker(&self.tracker);
            let alerts = tracker.stop(now);
            if !self.persister.persist_now(&mut tracker, now) {
                tracing::warn!("final persistence failed, today's latest usage may be lost");
            }
            alerts
        };
        for alert in alerts {
            self.dispatch(&alert, now).await;
        }
    }
}

fn log_delivery(notification: &Notification, alert: &Alert, result: Result<(), NotifyError>) {
    match result {
        Ok(()) => tracing::info!(
            app = %alert.app_name,
            duration_ms = alert.duration_ms,
            correlation_id = %notification.correlation_id,
            "notification sent"
        ),
        Err(err) => tracing::warn!(
            error = %err,
            app = %alert.app_name,
            correlation_id = %notification.correlation_id,
            "notification delivery failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    use crate::config::TrackerConfig;
    use crate::persist::tests::MemoryStore;

    struct FixedProbe {
        name: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl ForegroundProbe for FixedProbe {
        fn foreground(&self) -> Option<ApplicationIdentity> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.name
                .map(|name| ApplicationIdentity::new(name, "org.example", 99))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Notification>>,
    }

    impl Notifier for RecordingNotifier {
        fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.sent
                .lock()
                .unwrap()
                .push(notification.clone());
            Ok(())
        }
    }

    impl Notifier for Arc<RecordingNotifier> {
        fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.as_ref().deliver(notification)
        }
    }

    fn fast_config() -> TrackerConfig {
        TrackerConfig {
            sample_interval_ms: 10,
            min_session_ms: 0,
            rule_check_interval_ms: 0,
            persist_interval_ms: 0,
            ..TrackerConfig::default()
        }
    }

    /// Alternates focus between two applications on every sample.
    #[derive(Default)]
    struct Alternating(AtomicUsize);

    impl ForegroundProbe for Arc<Alternating> {
        fn foreground(&self) -> Option<ApplicationIdentity> {
            let name = if self.0.fetch_add(1, Ordering::Relaxed) % 2 == 0 {
                "Chat"
            } else {
                "Editor"
            };
            Some(ApplicationIdentity::new(name, "org.example", 99))
        }
    }

    /// Blocks past the collaborator timeout, tracking overlapping calls.
    #[derive(Default)]
    struct StalledForeground {
        calls: AtomicUsize,
        running: AtomicUsize,
        max_running: AtomicUsize,
    }

    impl ForegroundProbe for Arc<StalledForeground> {
        fn foreground(&self) -> Option<ApplicationIdentity> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(running, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(60));
            self.running.fetch_sub(1, Ordering::SeqCst);
            Some(ApplicationIdentity::new("Editor", "org.example", 99))
        }
    }

    /// Blocks past the collaborator timeout on every delivery.
    #[derive(Default)]
    struct StalledNotifier {
        attempts: AtomicUsize,
    }

    impl Notifier for Arc<StalledNotifier> {
        fn deliver(&self, _notification: &Notification) -> Result<(), NotifyError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        }
    }

    fn short_timeout_config() -> TrackerConfig {
        TrackerConfig {
            collaborator_timeout_ms: 20,
            ..fast_config()
        }
    }

    async fn run_for<P: ForegroundProbe, N: Notifier>(
        tracker: &SharedTracker,
        probe: P,
        notifier: N,
        millis: u64,
    ) -> MemoryStore {
        let cancel = CancellationToken::new();
        let sampling = SamplingLoop::new(Arc::clone(tracker), probe, notifier, MemoryStore::default());
        let handle = tokio::spawn(sampling.run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(millis)).await;
        cancel.cancel();
        handle.await.unwrap()
    }

    #[tokio::test]
    async fn attributes_focused_app_and_persists_on_stop() {
        let tracker: SharedTracker = Arc::new(Mutex::new(Tracker::new(fast_config(), Utc::now())));
        let probe = FixedProbe {
            name: Some("Editor"),
            calls: AtomicUsize::new(0),
        };

        let store = run_for(&tracker, probe, Arc::<RecordingNotifier>::default(), 80).await;

        let tracker = lock_tracker(&tracker);
        assert!(tracker.active().is_none());
        let today = store.today.unwrap();
        assert!(today.record.duration_ms("Editor") > 0);
        assert_eq!(today.record, tracker.today_snapshot().record);
    }

    #[tokio::test]
    async fn unavailable_probe_leaves_tracker_idle() {
        let tracker: SharedTracker = Arc::new(Mutex::new(Tracker::new(fast_config(), Utc::now())));
        let probe = FixedProbe {
            name: None,
            calls: AtomicUsize::new(0),
        };

        let store = run_for(&tracker, probe, Arc::<RecordingNotifier>::default(), 50).await;

        assert!(lock_tracker(&tracker).today_snapshot().record.is_empty());
        assert!(store.today.is_none_or(|today| today.record.is_empty()));
    }

    #[tokio::test]
    async fn delivers_alert_once() {
        let tracker: SharedTracker = Arc::new(Mutex::new(Tracker::new(fast_config(), Utc::now())));
        lock_tracker(&tracker).add_rule("editor", 1, None).unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let probe = FixedProbe {
            name: Some("Editor"),
            calls: AtomicUsize::new(0),
        };

        let store = run_for(&tracker, probe, Arc::clone(&notifier), 120).await;

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].category, crate::rules::ALERT_CATEGORY);
        assert!(sent[0].body.contains("on editor"));
        assert_eq!(store.rules.len(), 1);
    }

    #[tokio::test]
    async fn stalled_foreground_lookup_never_overlaps() {
        let tracker: SharedTracker =
            Arc::new(Mutex::new(Tracker::new(short_timeout_config(), Utc::now())));
        let foreground = Arc::new(StalledForeground::default());

        let started = std::time::Instant::now();
        let notifier = Arc::<RecordingNotifier>::default();
        let store = run_for(&tracker, Arc::clone(&foreground), notifier, 250).await;

        assert_eq!(foreground.max_running.load(Ordering::SeqCst), 1);
        assert!(foreground.calls.load(Ordering::SeqCst) >= 2);
        assert!(started.elapsed() < Duration::from_millis(1_000));
        // Every answer arrived after the timeout, so nothing was attributed.
        assert!(store.today.is_none_or(|today| today.record.is_empty()));
    }

    #[tokio::test]
    async fn stalled_notifier_does_not_block_attribution() {
        let tracker: SharedTracker =
            Arc::new(Mutex::new(Tracker::new(short_timeout_config(), Utc::now())));
        {
            let mut tracker = lock_tracker(&tracker);
            tracker.add_rule("Chat", 1, None).unwrap();
            tracker.add_rule("Editor", 1, None).unwrap();
        }
        let foreground = Arc::new(Alternating::default());
        let notifier = Arc::new(StalledNotifier::default());

        let store = run_for(&tracker, Arc::clone(&foreground), Arc::clone(&notifier), 250).await;

        assert_eq!(notifier.attempts.load(Ordering::SeqCst), 2);
        assert!(foreground.0.load(Ordering::Relaxed) > 4);
        let today = store.today.unwrap();
        assert!(today.record.duration_ms("Chat") > 0);
        assert!(today.record.duration_ms("Editor") > 0);
    }

    #[tokio::test]
    async fn shutdown_alert_delivery_is_bounded() {
        let config = TrackerConfig {
            rule_check_interval_ms: 60_000,
            ..short_timeout_config()
        };
        let tracker: SharedTracker = Arc::new(Mutex::new(Tracker::new(config, Utc::now())));
        lock_tracker(&tracker).add_rule("Editor", 50, None).unwrap();
        let foreground = FixedProbe {
            name: Some("Editor"),
            calls: AtomicUsize::new(0),
        };
        let notifier = Arc::new(StalledNotifier::default());

        let cancel = CancellationToken::new();
        let sampling = SamplingLoop::new(
            Arc::clone(&tracker),
            foreground,
            Arc::clone(&notifier),
            MemoryStore::default(),
        );
        let handle = tokio::spawn(sampling.run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(notifier.attempts.load(Ordering::SeqCst), 0);

        let stopping = std::time::Instant::now();
        cancel.cancel();
        let store = handle.await.unwrap();

        assert!(stopping.elapsed() < Duration::from_millis(200));
        assert_eq!(notifier.attempts.load(Ordering::SeqCst), 1);
        assert!(store.today.unwrap().record.duration_ms("Editor") >= 50);
    }
}
