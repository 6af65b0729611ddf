//! Client registry: reconciles enumerator snapshots with operator selection.
//!
//! Clients are keyed by [`ClientId`]. A refresh keeps every tracked client
//! whose id is still live (selection untouched), drops the rest, and adds
//! newly seen non-blank clients as selected. The display label is never used
//! for identity.
//!
//! A tracked id that reappears under a different name is treated as a new
//! client: the old entry is removed and a fresh, selected one added. The
//! registry cannot tell a renamed process from a new one reusing the id.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sc_common::{ClientId, ClientRecord};
use serde::Serialize;
use thiserror::Error;

use crate::boundary::{EnumerationError, Enumerator};
use crate::logging::event_names;

/// A client the registry is tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedClient {
    pub record: ClientRecord,
    pub selected: bool,
}

impl TrackedClient {
    fn new(record: ClientRecord) -> Self {
        TrackedClient {
            record,
            selected: true,
        }
    }

    pub fn id(&self) -> ClientId {
        self.record.id
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn display_label(&self) -> String {
        self.record.display_label()
    }
}

/// What one refresh changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    /// Ids that started being tracked, in snapshot order.
    pub added: Vec<ClientId>,
    /// Ids that stopped being tracked, in former creation order.
    pub removed: Vec<ClientId>,
    /// Snapshot records ignored for having a blank name.
    pub skipped_blank: usize,
}

impl RefreshReport {
    /// True when membership did not change.
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("client {id} is not tracked")]
    UnknownClient { id: ClientId },
}

impl From<RegistryError> for sc_common::Error {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownClient { id } => sc_common::Error::UnknownClient { id: id.0 },
        }
    }
}

/// Tracked clients in creation order.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    clients: Vec<TrackedClient>,
    index: HashMap<ClientId, usize>,
    generation: u64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one snapshot into the tracked set.
    ///
    /// The next collection is built aside and swapped in, so the registry is
    /// never observed half-merged. When a snapshot lists an id more than
    /// once, the first record wins.
    pub fn refresh(&mut self, snapshot: &[ClientRecord]) -> RefreshReport {
        let mut live: HashMap<ClientId, &ClientRecord> = HashMap::with_capacity(snapshot.len());
        for record in snapshot {
            live.entry(record.id).or_insert(record);
        }

        let mut report = RefreshReport::default();
        let mut next: Vec<TrackedClient> = Vec::with_capacity(snapshot.len());

        for client in &self.clients {
            match live.get(&client.id()) {
                Some(record) if record.name == client.record.name => next.push(client.clone()),
                _ => report.removed.push(client.id()),
            }
        }

        let kept: HashSet<ClientId> = next.iter().map(TrackedClient::id).collect();
        let mut seen: HashSet<ClientId> = HashSet::with_capacity(snapshot.len());
        for record in snapshot {
            // Only the first record for an id is considered.
            if !seen.insert(record.id) || kept.contains(&record.id) {
                continue;
            }
            if record.has_blank_name() {
                report.skipped_blank += 1;
                continue;
            }
            report.added.push(record.id);
            next.push(TrackedClient::new(record.clone()));
        }

        self.index = next
            .iter()
            .enumerate()
            .map(|(pos, client)| (client.id(), pos))
            .collect();
        self.clients = next;
        self.generation += 1;

        for id in &report.removed {
            tracing::debug!(
                target: event_names::REGISTRY_CLIENT_REMOVED,
                client_id = id.0,
                "client left the snapshot"
            );
        }
        for id in &report.added {
            tracing::debug!(
                target: event_names::REGISTRY_CLIENT_ADDED,
                client_id = id.0,
                "tracking new client"
            );
        }

        report
    }

    /// Fetch a snapshot and merge it. On error nothing changes.
    pub fn refresh_from(
        &mut self,
        enumerator: &(impl Enumerator + ?Sized),
        max_records: usize,
    ) -> Result<RefreshReport, EnumerationError> {
        let snapshot = enumerator.enumerate(max_records)?;
        Ok(self.refresh(&snapshot))
    }

    /// Number of snapshots merged so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn set_selected(&mut self, id: ClientId, selected: bool) -> Result<(), RegistryError> {
        let client = self.get_mut(id)?;
        client.selected = selected;
        Ok(())
    }

    /// Flip selection; returns the new state.
    pub fn toggle(&mut self, id: ClientId) -> Result<bool, RegistryError> {
        let client = self.get_mut(id)?;
        client.selected = !client.selected;
        Ok(client.selected)
    }

    /// Select every tracked client. Returns how many changed.
    pub fn select_all(&mut self) -> usize {
        self.set_all(true)
    }

    /// Deselect every tracked client. Returns how many changed.
    pub fn deselect_all(&mut self) -> usize {
        self.set_all(false)
    }

    fn set_all(&mut self, selected: bool) -> usize {
        let mut changed = 0;
        for client in &mut self.clients {
            if client.selected != selected {
                client.selected = selected;
                changed += 1;
            }
        }
        changed
    }

    /// Names of the selected clients, in creation order.
    pub fn selected_names(&self) -> Vec<String> {
        self.clients
            .iter()
            .filter(|c| c.selected)
            .map(|c| c.record.name.clone())
            .collect()
    }

    pub fn get(&self, id: ClientId) -> Option<&TrackedClient> {
        self.index.get(&id).map(|&pos| &self.clients[pos])
    }

    fn get_mut(&mut self, id: ClientId) -> Result<&mut TrackedClient, RegistryError> {
        match self.index.get(&id) {
            Some(&pos) => Ok(&mut self.clients[pos]),
            None => Err(RegistryError::UnknownClient { id }),
        }
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.index.contains_key(&id)
    }

    /// Tracked clients in creation order.
    pub fn clients(&self) -> &[TrackedClient] {
        &self.clients
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn selected_count(&self) -> usize {
        self.clients.iter().filter(|c| c.selected).count()
    }
}

/// Registry handle shared between the poller and the operator.
///
/// Every operation takes the state lock, so a reader sees the collection
/// either before or after a refresh. Fetch-and-merge cycles additionally
/// hold the fetch lock across the enumerator call: at most one enumeration
/// is in flight, and readers are never blocked behind one.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<Mutex<ClientRegistry>>,
    fetch: Arc<Mutex<()>>,
}

impl SharedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Refresh swaps the collection whole, so a poisoned lock still guards
    // a consistent registry.
    fn lock(&self) -> MutexGuard<'_, ClientRegistry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn refresh(&self, snapshot: &[ClientRecord]) -> RefreshReport {
        self.lock().refresh(snapshot)
    }

    /// Fetch a snapshot under the fetch lock, then merge it.
    ///
    /// A snapshot is dropped unmerged, with an empty report, when another
    /// refresh landed while it was being fetched. Merging it would roll the
    /// collection back to an older view of the clients.
    pub fn refresh_from(
        &self,
        enumerator: &(impl Enumerator + ?Sized),
        max_records: usize,
    ) -> Result<RefreshReport, EnumerationError> {
        let _fetching = self.fetch.lock().unwrap_or_else(PoisonError::into_inner);
        let started_at = self.lock().generation();
        let snapshot = enumerator.enumerate(max_records)?;

        let mut registry = self.lock();
        if registry.generation() != started_at {
            tracing::debug!(
                target: event_names::REGISTRY_SNAPSHOT_STALE,
                records = snapshot.len(),
                "newer refresh landed during fetch; snapshot dropped"
            );
            return Ok(RefreshReport::default());
        }
        Ok(registry.refresh(&snapshot))
    }

    pub fn set_selected(&self, id: ClientId, selected: bool) -> Result<(), RegistryError> {
        self.lock().set_selected(id, selected)
    }

    pub fn toggle(&self, id: ClientId) -> Result<bool, RegistryError> {
        self.lock().toggle(id)
    }

    pub fn select_all(&self) -> usize {
        self.lock().select_all()
    }

    pub fn deselect_all(&self) -> usize {
        self.lock().deselect_all()
    }

    pub fn selected_names(&self) -> Vec<String> {
        self.lock().selected_names()
    }

    /// Copy of the tracked clients.
    pub fn clients(&self) -> Vec<TrackedClient> {
        self.lock().clients().to_vec()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
