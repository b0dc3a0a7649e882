//! kymotrace-engine: interactive minimal-cost path tracing (sans-IO).
//!
//! Traces the brightest route between two pixels of an intensity image,
//! such as a kymograph or a maximum projection of a time-lapse:
//!
//! 1. A [`CostGrid`] snapshots the image intensities.
//! 2. A map computation runs a Dijkstra-style search from a source pixel,
//!    with edge cost `max_intensity / (intensity(destination) + alpha)`.
//! 3. A path computation backtracks the predecessor table to a target.
//!
//! [`trace_path`] does all three synchronously. [`TracingSession`] does
//! them interactively: maps and paths run on background threads, pointer
//! moves get live previews while the map is still running, and superseded
//! work is cancelled cooperatively.
//!
//! This crate has **no I/O dependencies**. Images come in as byte slices
//! or decoded buffers; file access lives in `kymotrace-bench`.

pub mod backtrack;
pub mod cancellation;
pub mod clock;
pub mod connectivity;
pub mod downsample;
pub mod grid;
pub mod map;
mod path;
pub mod profile;
pub mod publish;
mod registry;
pub mod session;
mod signal;
pub mod types;

pub use cancellation::CancellationToken;
pub use clock::{Clock, ManualClock, SystemClock};
pub use connectivity::{ConnectivityKind, NeighborPolicy};
pub use downsample::DownsampleFilter;
pub use grid::CostGrid;
pub use map::{DistanceMap, MapComputation, MapOutcome, compute_map};
pub use profile::{intensity_profile, path_cost};
pub use publish::{ChannelListener, ListenerId, PathEvent, PathEventKind, PathListener};
pub use session::{DrawingState, PointerEvent, TracingSession, Transition};
pub use types::{
    ComputationId, Dimensions, GridPoint, Path, Point, TracedPath, TracerConfig, TracerError,
    TracingMode,
};

/// Trace the cheapest path from `source` to `target` on the calling
/// thread.
///
/// Runs a full map computation from `source`, backtracks to `target`, and
/// returns the path with its cost. Use [`compute_map`] instead when many
/// targets share one source.
///
/// # Errors
///
/// Returns [`TracerError::InvalidConfig`] for an invalid configuration.
/// Returns [`TracerError::OutOfBounds`] if `source` or `target` is
/// off-grid.
/// Returns [`TracerError::Unreachable`] if the search never reaches
/// `target`.
pub fn trace_path(
    grid: &CostGrid,
    config: &TracerConfig,
    source: GridPoint,
    target: GridPoint,
) -> Result<TracedPath, TracerError> {
    if !grid.dimensions().contains(target) {
        return Err(TracerError::OutOfBounds {
            x: target.x,
            y: target.y,
        });
    }
    let map = compute_map(grid, config, source)?;
    let path = map.path_to(target)?;
    let cost = map.distance(target).ok_or(TracerError::Unreachable {
        x: target.x,
        y: target.y,
    })?;
    Ok(TracedPath { path, cost })
}
