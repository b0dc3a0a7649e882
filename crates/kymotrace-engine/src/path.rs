//! Path computations: backtracking against a finished or running map.
//!
//! A path request names a source and a target. If the map for that source
//! has already been handed off, the request backtracks over it straight
//! away (ready mode). Otherwise it waits on the session's visit signal and
//! re-resolves the live map for its source on every wakeup, backtracking
//! over a private snapshot as soon as the target is settled (waiting
//! mode). It never waits for the whole map just to answer one target.

use crate::cancellation::CancellationToken;
use crate::map::{DistanceMap, TargetProbe};
use crate::registry::{MapHandoff, MapRegistry};
use crate::signal::VisitSignal;
use crate::types::{GridPoint, Path, TracerError};

/// How a path request will be answered, decided when it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PathMode {
    /// The source's map is complete.
    Ready,
    /// The source's map is still running.
    Waiting,
}

/// The shared state a path request reads from.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MapSources<'a> {
    pub(crate) maps: &'a MapRegistry,
    pub(crate) handoff: &'a MapHandoff,
    pub(crate) signal: &'a VisitSignal,
}

impl MapSources<'_> {
    pub(crate) fn mode_for(&self, source: GridPoint) -> PathMode {
        if self.handoff.current_for(source).is_some() {
            PathMode::Ready
        } else {
            PathMode::Waiting
        }
    }

    /// Reconstruct the path from `source` to `target`, blocking until the
    /// target is settled if the map is still running.
    ///
    /// # Errors
    ///
    /// [`TracerError::Cancelled`] if `token` fires or the map for `source`
    /// is abandoned; [`TracerError::Unreachable`] if the map finishes
    /// without settling `target`.
    pub(crate) fn resolve(
        &self,
        source: GridPoint,
        target: GridPoint,
        token: &CancellationToken,
    ) -> Result<Path, TracerError> {
        if let Some(map) = self.handoff.current_for(source) {
            return Self::from_finished(&map, target, token);
        }

        loop {
            if token.is_cancelled() {
                return Err(TracerError::Cancelled);
            }
            let seen = self.signal.generation();

            let Some(map) = self.maps.get(source) else {
                // The map left the registry: it either handed off its
                // result or was cancelled.
                return match self.handoff.current_for(source) {
                    Some(map) => Self::from_finished(&map, target, token),
                    None => Err(TracerError::Cancelled),
                };
            };

            match map.probe(target) {
                TargetProbe::Settled(snapshot) => return snapshot.backtrack(target, token),
                TargetProbe::Unreachable => {
                    return Err(TracerError::Unreachable {
                        x: target.x,
                        y: target.y,
                    });
                }
                TargetProbe::Abandoned => return Err(TracerError::Cancelled),
                TargetProbe::Pending => {}
            }
            drop(map);

            self.signal.wait_past(seen);
        }
    }

    fn from_finished(
        map: &DistanceMap,
        target: GridPoint,
        token: &CancellationToken,
    ) -> Result<Path, TracerError> {
        if !map.is_visited(target) {
            return Err(TracerError::Unreachable {
                x: target.x,
                y: target.y,
            });
        }
        map.backtrack(target, token)
    }
}
