//! Single-source shortest-path map computation.
//!
//! A [`MapComputation`] runs a Dijkstra-style search from one source pixel
//! over the whole grid and ends with a [`DistanceMap`]: distance,
//! predecessor and visited tables for every node the search settled.
//!
//! # Frontier selection
//!
//! There is no priority queue. Each iteration scans the whole distance
//! table for the unvisited node with the smallest finite tentative
//! distance, breaking ties by the lowest index. That is O(V) per step and
//! O(V²) per source, which is fine for interactive grids of a few hundred
//! pixels per side and makes the settle order fully deterministic.
//!
//! # Sharing with path computations
//!
//! The tables sit behind one mutex that the search takes once per
//! iteration. Path computations that cannot wait for the whole map probe
//! it between iterations: once their target is settled its predecessor
//! chain is final, so a copy of the partial table is enough to backtrack.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::backtrack::backtrack;
use crate::cancellation::CancellationToken;
use crate::connectivity::{ConnectivityKind, NeighborPolicy};
use crate::grid::CostGrid;
use crate::types::{ComputationId, Dimensions, GridPoint, Path, TracerConfig, TracerError};

/// Completed search result for one source.
///
/// Immutable once built; shared between the session and path
/// computations through an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMap {
    dimensions: Dimensions,
    source: GridPoint,
    dist: Vec<f64>,
    prev: Vec<Option<usize>>,
    visited: Vec<bool>,
    settle_order: Vec<usize>,
}

impl DistanceMap {
    /// The pixel the search started from.
    #[must_use]
    pub const fn source(&self) -> GridPoint {
        self.source
    }

    /// Grid dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Cost of the cheapest path to `p`, or `None` if the search never
    /// settled it (or `p` is off-grid).
    #[must_use]
    pub fn distance(&self, p: GridPoint) -> Option<f64> {
        self.is_visited(p)
            .then(|| self.dist[self.dimensions.index_of(p)])
    }

    /// Returns `true` if the search settled `p`.
    #[must_use]
    pub fn is_visited(&self, p: GridPoint) -> bool {
        self.dimensions.contains(p) && self.visited[self.dimensions.index_of(p)]
    }

    /// The pixel `p` is reached from on its cheapest path.
    #[must_use]
    pub fn predecessor(&self, p: GridPoint) -> Option<GridPoint> {
        if !self.dimensions.contains(p) {
            return None;
        }
        self.prev[self.dimensions.index_of(p)].map(|i| self.dimensions.point_at(i))
    }

    /// Pixels in the order the search settled them. The source is first.
    pub fn settle_order(&self) -> impl Iterator<Item = GridPoint> + '_ {
        self.settle_order
            .iter()
            .map(|&i| self.dimensions.point_at(i))
    }

    /// Number of settled pixels.
    #[must_use]
    pub fn settled_count(&self) -> usize {
        self.settle_order.len()
    }

    /// Reconstruct the cheapest path from the source to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`TracerError::OutOfBounds`] for an off-grid target and
    /// [`TracerError::Unreachable`] if the search never settled it.
    pub fn path_to(&self, target: GridPoint) -> Result<Path, TracerError> {
        if !self.dimensions.contains(target) {
            return Err(TracerError::OutOfBounds {
                x: target.x,
                y: target.y,
            });
        }
        self.backtrack(target, &CancellationToken::new())
    }

    pub(crate) fn backtrack(
        &self,
        target: GridPoint,
        token: &CancellationToken,
    ) -> Result<Path, TracerError> {
        backtrack(
            &self.prev,
            self.dimensions,
            self.dimensions.index_of(self.source),
            self.dimensions.index_of(target),
            token,
        )
    }
}

/// Mutable tables of a search in progress.
#[derive(Debug)]
struct SearchTables {
    dist: Vec<f64>,
    prev: Vec<Option<usize>>,
    visited: Vec<bool>,
    settle_order: Vec<usize>,
}

impl SearchTables {
    fn new(len: usize, source: usize) -> Self {
        let mut dist = vec![f64::INFINITY; len];
        dist[source] = 0.0;
        Self {
            dist,
            prev: vec![None; len],
            visited: vec![false; len],
            settle_order: Vec::new(),
        }
    }

    fn relax(&mut self, from: usize, to: usize, candidate: f64) {
        if !self.visited[to] && candidate < self.dist[to] {
            self.dist[to] = candidate;
            self.prev[to] = Some(from);
        }
    }

    fn settle(&mut self, index: usize) {
        self.visited[index] = true;
        self.settle_order.push(index);
    }

    /// Unvisited node with the smallest finite distance; the first index
    /// wins ties.
    fn next_frontier(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (index, (&d, &visited)) in self.dist.iter().zip(&self.visited).enumerate() {
            if visited || !d.is_finite() {
                continue;
            }
            if best.is_none_or(|(_, best_d)| d < best_d) {
                best = Some((index, d));
            }
        }
        best.map(|(index, _)| index)
    }

    fn into_map(self, dimensions: Dimensions, source: GridPoint) -> DistanceMap {
        DistanceMap {
            dimensions,
            source,
            dist: self.dist,
            prev: self.prev,
            visited: self.visited,
            settle_order: self.settle_order,
        }
    }
}

#[derive(Debug)]
enum MapPhase {
    Running(SearchTables),
    Finished(Arc<DistanceMap>),
    Abandoned,
}

/// What a waiting path computation learns from probing a map.
#[derive(Debug)]
pub(crate) enum TargetProbe {
    /// The target is settled; backtrack over this predecessor snapshot.
    Settled(PredecessorSnapshot),
    /// Not settled yet; wait for more progress.
    Pending,
    /// The search finished without reaching the target.
    Unreachable,
    /// The search was cancelled.
    Abandoned,
}

/// A private copy of a predecessor table.
#[derive(Debug)]
pub(crate) enum PredecessorSnapshot {
    /// Copied from a search still in progress.
    Partial {
        prev: Vec<Option<usize>>,
        dimensions: Dimensions,
        source: usize,
    },
    /// The finished, immutable map.
    Complete(Arc<DistanceMap>),
}

impl PredecessorSnapshot {
    pub(crate) fn backtrack(
        &self,
        target: GridPoint,
        token: &CancellationToken,
    ) -> Result<Path, TracerError> {
        match self {
            Self::Partial {
                prev,
                dimensions,
                source,
            } => {
                let target = dimensions.index_of(target);
                backtrack(prev, *dimensions, *source, target, token)
            }
            Self::Complete(map) => map.backtrack(target, token),
        }
    }
}

/// How a search ended.
#[derive(Debug)]
pub enum MapOutcome {
    /// Frontier exhausted; the map is complete.
    Completed(Arc<DistanceMap>),
    /// The token fired before the search finished.
    Cancelled,
}

/// One search from one source pixel.
#[derive(Debug)]
pub struct MapComputation {
    id: ComputationId,
    source: GridPoint,
    dimensions: Dimensions,
    connectivity: ConnectivityKind,
    alpha: f64,
    relaxation_delay: Duration,
    phase: Mutex<MapPhase>,
    token: CancellationToken,
}

impl MapComputation {
    /// Prepare a search from `source` over a grid of `dimensions`.
    ///
    /// # Errors
    ///
    /// Returns [`TracerError::OutOfBounds`] if `source` is off-grid.
    pub fn new(
        id: ComputationId,
        source: GridPoint,
        dimensions: Dimensions,
        config: &TracerConfig,
    ) -> Result<Self, TracerError> {
        if !dimensions.contains(source) {
            return Err(TracerError::OutOfBounds {
                x: source.x,
                y: source.y,
            });
        }
        let tables = SearchTables::new(dimensions.len(), dimensions.index_of(source));
        Ok(Self {
            id,
            source,
            dimensions,
            connectivity: config.connectivity,
            alpha: config.alpha,
            relaxation_delay: config.relaxation_delay,
            phase: Mutex::new(MapPhase::Running(tables)),
            token: CancellationToken::new(),
        })
    }

    #[must_use]
    pub const fn id(&self) -> ComputationId {
        self.id
    }

    #[must_use]
    pub const fn source(&self) -> GridPoint {
        self.source
    }

    /// The token this search polls.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Ask the search to stop at its next iteration.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Run the search to completion on the calling thread.
    ///
    /// `on_settle` runs after each node is settled, outside the table
    /// lock. The grid must have the dimensions this computation was
    /// created with.
    pub fn run(&self, grid: &CostGrid, mut on_settle: impl FnMut()) -> MapOutcome {
        debug_assert_eq!(grid.dimensions(), self.dimensions);
        let source_row = self.source.y;
        let mut neighbors = Vec::with_capacity(8);
        let mut current = Some(self.dimensions.index_of(self.source));

        while let Some(index) = current {
            if self.token.is_cancelled() {
                *self.phase.lock() = MapPhase::Abandoned;
                return MapOutcome::Cancelled;
            }
            if !self.relaxation_delay.is_zero() {
                std::thread::sleep(self.relaxation_delay);
            }

            neighbors.clear();
            self.connectivity.neighbors(
                self.dimensions,
                source_row,
                self.dimensions.point_at(index),
                &mut neighbors,
            );

            {
                let mut phase = self.phase.lock();
                let MapPhase::Running(tables) = &mut *phase else {
                    return MapOutcome::Cancelled;
                };
                let base = tables.dist[index];
                for &n in &neighbors {
                    tables.relax(index, n, base + grid.edge_cost(n, self.alpha));
                }
                tables.settle(index);
                current = tables.next_frontier();
            }
            on_settle();
        }

        let mut phase = self.phase.lock();
        if self.token.is_cancelled() {
            *phase = MapPhase::Abandoned;
            return MapOutcome::Cancelled;
        }
        let MapPhase::Running(tables) = std::mem::replace(&mut *phase, MapPhase::Abandoned) else {
            return MapOutcome::Cancelled;
        };
        let map = Arc::new(tables.into_map(self.dimensions, self.source));
        *phase = MapPhase::Finished(Arc::clone(&map));
        MapOutcome::Completed(map)
    }

    /// Check whether `target` is settled, copying the predecessor table
    /// if it is.
    pub(crate) fn probe(&self, target: GridPoint) -> TargetProbe {
        let target_index = self.dimensions.index_of(target);
        let phase = self.phase.lock();
        match &*phase {
            MapPhase::Running(tables) if tables.visited[target_index] => {
                TargetProbe::Settled(PredecessorSnapshot::Partial {
                    prev: tables.prev.clone(),
                    dimensions: self.dimensions,
                    source: self.dimensions.index_of(self.source),
                })
            }
            MapPhase::Running(_) => TargetProbe::Pending,
            MapPhase::Finished(map) if map.is_visited(target) => {
                TargetProbe::Settled(PredecessorSnapshot::Complete(Arc::clone(map)))
            }
            MapPhase::Finished(_) => TargetProbe::Unreachable,
            MapPhase::Abandoned => TargetProbe::Abandoned,
        }
    }
}

/// Run a complete search from `source` on the calling thread.
///
/// # Errors
///
/// Returns [`TracerError::InvalidConfig`] for an invalid configuration
/// and [`TracerError::OutOfBounds`] for an off-grid source.
pub fn compute_map(
    grid: &CostGrid,
    config: &TracerConfig,
    source: GridPoint,
) -> Result<Arc<DistanceMap>, TracerError> {
    config.validate()?;
    let computation = MapComputation::new(ComputationId(0), source, grid.dimensions(), config)?;
    match computation.run(grid, || {}) {
        MapOutcome::Completed(map) => Ok(map),
        MapOutcome::Cancelled => Err(TracerError::Cancelled),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn uniform(width: u32, height: u32, value: f64) -> CostGrid {
        CostGrid::new(width, height, vec![value; (width * height) as usize]).unwrap()
    }

    fn config(alpha: f64) -> TracerConfig {
        TracerConfig {
            alpha,
            ..TracerConfig::default()
        }
    }

    #[test]
    fn source_is_settled_first_at_distance_zero() {
        let grid = uniform(4, 3, 5.0);
        let source = GridPoint::new(2, 1);
        let map = compute_map(&grid, &config(1.0), source).unwrap();
        assert_eq!(map.settle_order().next(), Some(source));
        assert_eq!(map.distance(source), Some(0.0));
        assert_eq!(map.predecessor(source), None);
    }

    #[test]
    fn every_pixel_is_settled_exactly_once() {
        let grid = uniform(5, 4, 1.0);
        let map = compute_map(&grid, &config(1.0), GridPoint::new(0, 0)).unwrap();
        assert_eq!(map.settled_count(), 20);
        let mut order: Vec<_> = map.settle_order().collect();
        order.sort_unstable();
        order.dedup();
        assert_eq!(order.len(), 20);
    }

    #[test]
    fn uniform_grid_distance_counts_chebyshev_steps() {
        // 5x5, intensity 10, alpha 1: each step costs 10 / 11.
        let grid = uniform(5, 5, 10.0);
        let map = compute_map(&grid, &config(1.0), GridPoint::new(0, 0)).unwrap();
        let step = 10.0 / 11.0;
        let d = map.distance(GridPoint::new(4, 4)).unwrap();
        assert!((d - 4.0 * step).abs() < 1e-9, "got {d}");
        let d = map.distance(GridPoint::new(4, 1)).unwrap();
        assert!((d - 4.0 * step).abs() < 1e-9, "got {d}");
    }

    #[test]
    fn equal_distances_settle_in_index_order() {
        let grid = uniform(3, 3, 1.0);
        let map = compute_map(&grid, &config(1.0), GridPoint::new(1, 1)).unwrap();
        let order: Vec<_> = map.settle_order().collect();
        // All eight neighbors tie; they come out in row-major order.
        assert_eq!(
            &order[1..],
            &[
                GridPoint::new(0, 0),
                GridPoint::new(1, 0),
                GridPoint::new(2, 0),
                GridPoint::new(0, 1),
                GridPoint::new(2, 1),
                GridPoint::new(0, 2),
                GridPoint::new(1, 2),
                GridPoint::new(2, 2),
            ]
        );
    }

    #[test]
    fn path_prefers_bright_pixels() {
        // A bright column at x = 2 on a dark background.
        let mut intensities = vec![1.0; 25];
        for y in 0..5 {
            intensities[y * 5 + 2] = 100.0;
        }
        let grid = CostGrid::new(5, 5, intensities).unwrap();
        let map = compute_map(&grid, &config(1.0), GridPoint::new(2, 0)).unwrap();
        let path = map.path_to(GridPoint::new(2, 4)).unwrap();
        assert!(path.points().iter().all(|p| p.x == 2));
    }

    #[test]
    fn path_to_off_grid_target_is_rejected() {
        let grid = uniform(3, 3, 1.0);
        let map = compute_map(&grid, &config(1.0), GridPoint::new(0, 0)).unwrap();
        assert!(matches!(
            map.path_to(GridPoint::new(3, 0)),
            Err(TracerError::OutOfBounds { x: 3, y: 0 })
        ));
    }

    #[test]
    fn off_grid_source_is_rejected() {
        let grid = uniform(3, 3, 1.0);
        assert!(matches!(
            compute_map(&grid, &config(1.0), GridPoint::new(0, 3)),
            Err(TracerError::OutOfBounds { x: 0, y: 3 })
        ));
    }

    #[test]
    fn cancelled_search_stops_and_is_abandoned() {
        let grid = uniform(6, 6, 1.0);
        let computation = MapComputation::new(
            ComputationId(7),
            GridPoint::new(0, 0),
            grid.dimensions(),
            &config(1.0),
        )
        .unwrap();
        let mut settled = 0;
        let outcome = computation.run(&grid, || {
            settled += 1;
            if settled == 3 {
                computation.cancel();
            }
        });
        assert!(matches!(outcome, MapOutcome::Cancelled));
        assert_eq!(settled, 3);
        assert!(matches!(
            computation.probe(GridPoint::new(5, 5)),
            TargetProbe::Abandoned
        ));
    }

    #[test]
    fn probe_reports_partial_progress() {
        let grid = uniform(6, 1, 1.0);
        let computation = MapComputation::new(
            ComputationId(1),
            GridPoint::new(0, 0),
            grid.dimensions(),
            &config(1.0),
        )
        .unwrap();
        let mut probes = Vec::new();
        let outcome = computation.run(&grid, || {
            probes.push(matches!(
                computation.probe(GridPoint::new(2, 0)),
                TargetProbe::Settled(_)
            ));
        });
        assert!(matches!(outcome, MapOutcome::Completed(_)));
        // (2, 0) is the third node settled on a 6x1 strip from the left end.
        assert_eq!(probes, vec![false, false, true, true, true, true]);

        let TargetProbe::Settled(snapshot) = computation.probe(GridPoint::new(5, 0)) else {
            unreachable!("a finished map has settled every pixel");
        };
        let path = snapshot
            .backtrack(GridPoint::new(5, 0), &CancellationToken::new())
            .unwrap();
        assert_eq!(path.len(), 6);
    }
}
