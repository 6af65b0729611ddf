//! Periodic registry refresh on a background thread.
//!
//! Each tick fetches a snapshot and merges it. A failed fetch is logged and
//! the registry keeps its prior state until the next tick; nothing is
//! retried early.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::Serialize;

use crate::boundary::Enumerator;
use crate::logging::event_names;
use crate::registry::{RefreshReport, SharedRegistry};

/// Counters reported when the poller stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollerStats {
    pub ticks: u64,
    pub failures: u64,
    pub added: u64,
    pub removed: u64,
}

impl PollerStats {
    fn record(&mut self, report: &RefreshReport) {
        self.ticks += 1;
        self.added += report.added.len() as u64;
        self.removed += report.removed.len() as u64;
    }
}

/// Called after every successful tick that changed membership.
pub type ChangeHook = Box<dyn Fn(&RefreshReport) + Send>;

/// Handle to the running refresh thread.
pub struct Poller {
    stop: Option<mpsc::Sender<()>>,
    thread: Option<thread::JoinHandle<PollerStats>>,
}

impl Poller {
    /// Start refreshing `registry` from `enumerator` every `interval`.
    ///
    /// The first refresh happens immediately.
    pub fn start<E: Enumerator + ?Sized + 'static>(
        registry: SharedRegistry,
        enumerator: Arc<E>,
        interval: Duration,
        max_records: usize,
        on_change: Option<ChangeHook>,
    ) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("sc-poller".to_string())
            .spawn(move || {
                tracing::debug!(
                    target: event_names::POLLER_STARTED,
                    interval_ms = interval.as_millis() as u64,
                    "refresh poller started"
                );
                let mut stats = PollerStats::default();
                loop {
                    tick(
                        &registry,
                        enumerator.as_ref(),
                        max_records,
                        on_change.as_ref(),
                        &mut stats,
                    );
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        // Stop requested or handle dropped.
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::debug!(
                    target: event_names::POLLER_STOPPED,
                    ticks = stats.ticks,
                    failures = stats.failures,
                    "refresh poller stopped"
                );
                stats
            })?;

        Ok(Poller {
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    /// Stop the thread and wait for it. Returns the tick counters.
    pub fn stop(mut self) -> PollerStats {
        self.shutdown()
    }

    fn shutdown(&mut self) -> PollerStats {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        match self.thread.take() {
            Some(thread) => thread.join().unwrap_or_default(),
            None => PollerStats::default(),
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn tick<E: Enumerator + ?Sized>(
    registry: &SharedRegistry,
    enumerator: &E,
    max_records: usize,
    on_change: Option<&ChangeHook>,
    stats: &mut PollerStats,
) {
    match registry.refresh_from(enumerator, max_records) {
        Ok(report) => {
            stats.record(&report);
            if !report.is_unchanged() {
                tracing::debug!(
                    target: event_names::REGISTRY_REFRESHED,
                    added = report.added.len(),
                    removed = report.removed.len(),
                    skipped_blank = report.skipped_blank,
                    "client membership changed"
                );
                if let Some(hook) = on_change {
                    hook(&report);
                }
            }
        }
        Err(err) => {
            stats.ticks += 1;
            stats.failures += 1;
            tracing::warn!(
                target: event_names::REGISTRY_REFRESH_FAILED,
                error = %err,
                "refresh failed; keeping previous client list"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::EnumerationError;
    use crate::mock_boundary::MockBoundary;
    use sc_common::{ClientId, ClientRecord};
    use std::time::Instant;

    fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn first_tick_is_immediate() {
        let mock = Arc::new(MockBoundary::new().with_clients(vec![ClientRecord::new(1, "alice")]));
        let registry = SharedRegistry::new();
        let poller = Poller::start(
            registry.clone(),
            mock.clone(),
            Duration::from_secs(60),
            64,
            None,
        )
        .unwrap();

        assert!(wait_until(Duration::from_secs(2), || registry.len() == 1));
        let stats = poller.stop();
        assert_eq!(stats.ticks, 1);
        assert_eq!(stats.added, 1);
    }

    #[test]
    fn follows_membership_and_survives_failures() {
        let mock = Arc::new(MockBoundary::new().with_clients(vec![
            ClientRecord::new(1, "alice"),
            ClientRecord::new(2, "bob"),
        ]));
        let registry = SharedRegistry::new();
        let poller = Poller::start(
            registry.clone(),
            mock.clone(),
            Duration::from_millis(10),
            64,
            None,
        )
        .unwrap();

        assert!(wait_until(Duration::from_secs(2), || registry.len() == 2));
        registry.set_selected(ClientId(2), false).unwrap();

        mock.fail_next_enumeration(EnumerationError::NullRecordPointer);
        let before = mock.enumeration_count();
        assert!(wait_until(Duration::from_secs(2), || mock.enumeration_count()
            > before + 2));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.selected_names(), vec!["alice"]);

        mock.set_clients(vec![ClientRecord::new(1, "alice")]);
        assert!(wait_until(Duration::from_secs(2), || registry.len() == 1));

        let stats = poller.stop();
        assert!(stats.failures >= 1);
        assert_eq!(stats.removed, 1);
    }

    #[test]
    fn change_hook_sees_reports() {
        let mock = Arc::new(MockBoundary::new().with_clients(vec![ClientRecord::new(9, "zed")]));
        let registry = SharedRegistry::new();
        let (tx, rx) = mpsc::channel();
        let hook: ChangeHook = Box::new(move |report: &RefreshReport| {
            let _ = tx.send(report.clone());
        });

        let poller = Poller::start(
            registry,
            mock,
            Duration::from_millis(10),
            64,
            Some(hook),
        )
        .unwrap();

        let report = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(report.added, vec![ClientId(9)]);
        // Unchanged ticks do not fire the hook.
        assert!(rx.recv_timeout(Duration::from_millis(60)).is_err());
        drop(poller);
    }
}
