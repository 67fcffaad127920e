//! Run command: the foreground tracking loop.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

use ft_core::{SamplingLoop, SharedTracker, Tracker, UsageStore, load_state, lock_tracker};

use super::util::format_duration;
use crate::Config;
use crate::desktop::{NotifySendNotifier, XdotoolProbe};

/// Tracks the desktop until Ctrl-C.
///
/// Everything runs on one thread, so sampling, persistence and the SIGUSR1
/// reset handler never interleave mid-tick.
pub fn run<S: UsageStore>(store: S, config: &Config) -> Result<()> {
    let tracker = restore(&store, config);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let signals = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let sampling = SamplingLoop::new(
            Arc::clone(&tracker),
            XdotoolProbe::default(),
            NotifySendNotifier,
            store,
        );
        let (_store, signals) = tokio::join!(
            sampling.run(cancel.clone()),
            watch_signals(&tracker, cancel)
        );
        signals
    });

    tracing::info!(
        total = %format_duration(lock_tracker(&tracker).total_today_ms(Utc::now())),
        "tracking stopped"
    );
    signals
}

fn restore<S: UsageStore>(store: &S, config: &Config) -> SharedTracker {
    let tracker = Tracker::restore(config.tracker.clone(), load_state(store), Utc::now());
    tracing::info!(
        day = %tracker.day(),
        archived_days = tracker.history().len(),
        rules = tracker.rules().len(),
        "tracker restored"
    );
    Arc::new(Mutex::new(tracker))
}

/// Archives today's usage and starts over.
fn reset_usage(tracker: &SharedTracker) {
    let archived = lock_tracker(tracker).reset(Utc::now());
    tracing::info!(archived = ?archived.map(|record| record.date), "usage reset");
}

/// Stops on Ctrl-C and resets on SIGUSR1. Cancels `cancel` on exit,
/// including when a handler cannot be installed.
async fn watch_signals(tracker: &SharedTracker, cancel: CancellationToken) -> Result<()> {
    let result = handle_signals(tracker, &cancel).await;
    cancel.cancel();
    result
}

async fn handle_signals(tracker: &SharedTracker, cancel: &CancellationToken) -> Result<()> {
    let mut reset = signal(SignalKind::user_defined1()).context("failed to listen for SIGUSR1")?;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for Ctrl-C")?;
                tracing::info!("interrupt received, stopping");
                return Ok(());
            }
            _ = reset.recv() => reset_usage(tracker),
            () = cancel.cancelled() => return Ok(()),
        }
    }
}
