//! Path reconstruction from a predecessor table.
//!
//! Walks `prev` from the target back to the source and reverses the
//! result. The walk is pure: callers take a snapshot of the table under
//! whatever lock guards it and backtrack after releasing it.

use crate::cancellation::CancellationToken;
use crate::types::{Dimensions, Path, TracerError};

/// Reconstruct the source-to-target path from a predecessor table.
///
/// `prev[i]` is the node `i` was reached from, or `None` for the source
/// and for nodes the search never touched. The token is polled once per
/// step.
///
/// # Errors
///
/// Returns [`TracerError::Cancelled`] if the token fires mid-walk, and
/// [`TracerError::Unreachable`] if the chain from `target` never reaches
/// `source` (the target was not settled when the snapshot was taken).
pub fn backtrack(
    prev: &[Option<usize>],
    dimensions: Dimensions,
    source: usize,
    target: usize,
    token: &CancellationToken,
) -> Result<Path, TracerError> {
    let unreachable = || {
        let p = dimensions.point_at(target);
        TracerError::Unreachable { x: p.x, y: p.y }
    };

    let mut indices = vec![target];
    let mut index = target;
    while index != source {
        if token.is_cancelled() {
            return Err(TracerError::Cancelled);
        }
        index = prev.get(index).copied().flatten().ok_or_else(unreachable)?;
        indices.push(index);
        // A simple path never revisits a node.
        if indices.len() > prev.len() {
            return Err(unreachable());
        }
    }

    indices.reverse();
    let points = indices
        .into_iter()
        .map(|i| dimensions.point_at(i))
        .collect();
    Ok(Path::new(points))
}
