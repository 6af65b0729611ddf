//! Poller ticks and operator refreshes running against one registry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use sc_common::{ClientId, ClientRecord};
use sc_core::boundary::{EnumerationError, Enumerator};
use sc_core::poller::Poller;
use sc_core::registry::SharedRegistry;

/// Serves whatever client list the test last installed, slowly enough
/// for refreshes to interleave.
struct LiveList {
    current: Mutex<Vec<ClientRecord>>,
}

impl LiveList {
    fn new(records: Vec<ClientRecord>) -> Arc<Self> {
        Arc::new(LiveList {
            current: Mutex::new(records),
        })
    }

    fn install(&self, records: Vec<ClientRecord>) {
        *self.current.lock().unwrap() = records;
    }
}

impl Enumerator for LiveList {
    fn enumerate(&self, _max: usize) -> Result<Vec<ClientRecord>, EnumerationError> {
        let snapshot = self.current.lock().unwrap().clone();
        thread::sleep(Duration::from_millis(1));
        Ok(snapshot)
    }
}

fn batch(ids: std::ops::RangeInclusive<i32>) -> Vec<ClientRecord> {
    ids.map(|id| ClientRecord::new(id, format!("client-{id}")))
        .collect()
}

#[test]
fn deselection_of_live_client_survives_poller_and_manual_refreshes() {
    let list = LiveList::new(vec![
        ClientRecord::new(1, "alice"),
        ClientRecord::new(2, "bob"),
    ]);
    let registry = SharedRegistry::new();
    registry.refresh_from(list.as_ref(), 16).unwrap();
    registry.set_selected(ClientId(2), false).unwrap();

    let poller = Poller::start(
        registry.clone(),
        Arc::clone(&list),
        Duration::from_millis(1),
        16,
        None,
    )
    .unwrap();

    for _ in 0..50 {
        registry.refresh_from(list.as_ref(), 16).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.selected_names(), vec!["alice"]);
    }

    let stats = poller.stop();
    assert!(stats.ticks >= 1);
    assert_eq!(stats.failures, 0);
    assert_eq!(stats.removed, 0);
    assert_eq!(registry.selected_names(), vec!["alice"]);
}

#[test]
fn readers_see_whole_snapshots_while_membership_flips() {
    let first = batch(1..=40);
    let second = batch(41..=80);
    let list = LiveList::new(first.clone());
    let registry = SharedRegistry::new();
    registry.refresh_from(list.as_ref(), 128).unwrap();

    let poller = Poller::start(
        registry.clone(),
        Arc::clone(&list),
        Duration::from_millis(1),
        128,
        None,
    )
    .unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..3)
        .map(|_| {
            let registry = registry.clone();
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut observed = 0usize;
                while !done.load(Ordering::SeqCst) {
                    let ids: Vec<i32> = registry.clients().iter().map(|c| c.id().0).collect();
                    assert_eq!(ids.len(), 40, "partial collection observed: {ids:?}");
                    let low = ids.iter().all(|&id| id <= 40);
                    let high = ids.iter().all(|&id| id > 40);
                    assert!(low || high, "mixed collection observed: {ids:?}");
                    observed += 1;
                }
                observed
            })
        })
        .collect();

    for round in 0..30 {
        let next = if round % 2 == 0 { &second } else { &first };
        list.install(next.clone());
        registry.refresh_from(list.as_ref(), 128).unwrap();
    }

    done.store(true, Ordering::SeqCst);
    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }
    let stats = poller.stop();
    assert_eq!(stats.failures, 0);

    // Last install was `first`; every client in it is freshly selected or kept.
    registry.refresh_from(list.as_ref(), 128).unwrap();
    let ids: Vec<i32> = registry.clients().iter().map(|c| c.id().0).collect();
    assert_eq!(ids, (1..=40).collect::<Vec<_>>());
}
