//! Bookkeeping for live computations.
//!
//! Three independent locks, none ever held together:
//!
//! - [`MapRegistry`]: live map computations keyed by source pixel.
//! - [`PathRegistry`]: live path computations keyed by id.
//! - [`MapHandoff`]: the most recently completed map, which path
//!   computations in ready mode read from.
//!
//! Superseding (cancel the old entries, insert the new one) happens inside
//! one critical section, so a reader never sees an empty registry between
//! the two halves.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cancellation::CancellationToken;
use crate::map::{DistanceMap, MapComputation};
use crate::types::{ComputationId, GridPoint};

#[derive(Debug, Default)]
struct LiveMaps {
    floor: u64,
    by_source: HashMap<GridPoint, Arc<MapComputation>>,
}

/// Live map computations, keyed by source pixel.
///
/// Every registration carries the session epoch it was started under.
/// The registry remembers the newest epoch it has seen and refuses older
/// ones, so a computation started just before a reset or a new source
/// cannot displace the one started after it.
#[derive(Debug, Default)]
pub(crate) struct MapRegistry {
    live: Mutex<LiveMaps>,
}

impl MapRegistry {
    /// Cancel every live map and register `map` in its place.
    ///
    /// Returns `false`, registering nothing, if `epoch` is older than a
    /// previous registration or cancellation.
    pub(crate) fn supersede(&self, map: Arc<MapComputation>, epoch: u64) -> bool {
        let mut live = self.live.lock();
        if epoch < live.floor {
            return false;
        }
        live.floor = epoch;
        for (_, old) in live.by_source.drain() {
            old.cancel();
        }
        live.by_source.insert(map.source(), map);
        true
    }

    /// Cancel every live map and refuse registrations older than `epoch`.
    pub(crate) fn cancel_all(&self, epoch: u64) {
        let mut live = self.live.lock();
        live.floor = live.floor.max(epoch);
        for (_, old) in live.by_source.drain() {
            old.cancel();
        }
    }

    /// Cancel the map from `source`, if any, and refuse registrations
    /// older than `epoch`.
    pub(crate) fn cancel_source(&self, source: GridPoint, epoch: u64) {
        let mut live = self.live.lock();
        live.floor = live.floor.max(epoch);
        if let Some(old) = live.by_source.remove(&source) {
            old.cancel();
        }
    }

    /// Remove the entry for `source` if it still belongs to `id`.
    pub(crate) fn unregister(&self, source: GridPoint, id: ComputationId) {
        let mut live = self.live.lock();
        if live.by_source.get(&source).is_some_and(|m| m.id() == id) {
            live.by_source.remove(&source);
        }
    }

    pub(crate) fn get(&self, source: GridPoint) -> Option<Arc<MapComputation>> {
        self.live.lock().by_source.get(&source).cloned()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.live.lock().by_source.is_empty()
    }
}

/// What a live path computation is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PathKind {
    /// Follows the pointer; superseded by the next move.
    Preview,
    /// Commits a segment; only a reset or a new source cancels it.
    Finalize,
}

#[derive(Debug)]
struct PathEntry {
    token: CancellationToken,
    kind: PathKind,
}

#[derive(Debug, Default)]
struct LivePaths {
    floor: u64,
    by_id: HashMap<ComputationId, PathEntry>,
}

/// Live path computations, keyed by id. Epochs work as in
/// [`MapRegistry`].
#[derive(Debug, Default)]
pub(crate) struct PathRegistry {
    live: Mutex<LivePaths>,
}

impl PathRegistry {
    /// Register a path computation. Any registration cancels every live
    /// preview; finalizations are left alone.
    ///
    /// Returns `false`, registering nothing, if `epoch` is stale.
    pub(crate) fn register(
        &self,
        id: ComputationId,
        token: CancellationToken,
        kind: PathKind,
        epoch: u64,
    ) -> bool {
        let mut live = self.live.lock();
        if epoch < live.floor {
            return false;
        }
        Self::drop_previews(&mut live.by_id);
        live.by_id.insert(id, PathEntry { token, kind });
        true
    }

    pub(crate) fn cancel_previews(&self) {
        Self::drop_previews(&mut self.live.lock().by_id);
    }

    /// Cancel everything and refuse registrations older than `epoch`.
    pub(crate) fn cancel_all(&self, epoch: u64) {
        let mut live = self.live.lock();
        live.floor = live.floor.max(epoch);
        for (_, entry) in live.by_id.drain() {
            entry.token.cancel();
        }
    }

    pub(crate) fn unregister(&self, id: ComputationId) {
        self.live.lock().by_id.remove(&id);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.live.lock().by_id.is_empty()
    }

    fn drop_previews(by_id: &mut HashMap<ComputationId, PathEntry>) {
        by_id.retain(|_, entry| {
            if entry.kind == PathKind::Preview {
                entry.token.cancel();
                false
            } else {
                true
            }
        });
    }
}

/// The active predecessor table: the last map that finished uncancelled.
#[derive(Debug, Default)]
pub(crate) struct MapHandoff {
    current: Mutex<Option<Arc<DistanceMap>>>,
}

impl MapHandoff {
    /// Publish a finished map unless `token` was cancelled. The token is
    /// checked under the handoff lock, so a cancel that happens-before a
    /// later [`clear`](Self::clear) can never be overtaken by a stale
    /// publication.
    pub(crate) fn publish(&self, map: Arc<DistanceMap>, token: &CancellationToken) -> bool {
        let mut current = self.current.lock();
        if token.is_cancelled() {
            return false;
        }
        *current = Some(map);
        true
    }

    /// The published map if it was computed from `source`.
    pub(crate) fn current_for(&self, source: GridPoint) -> Option<Arc<DistanceMap>> {
        self.current
            .lock()
            .as_ref()
            .filter(|m| m.source() == source)
            .cloned()
    }

    pub(crate) fn clear(&self) {
        *self.current.lock() = None;
    }
}
