//! Measurements along a traced path.

use crate::grid::CostGrid;
use crate::types::Path;

/// Intensity of every pixel along `path`, in order. Off-grid points are
/// skipped.
#[must_use]
pub fn intensity_profile(grid: &CostGrid, path: &Path) -> Vec<f64> {
    path.points()
        .iter()
        .filter_map(|&p| grid.intensity_at(p))
        .collect()
}

/// Sum of edge costs along `path`.
///
/// The source pixel is not entered, so it contributes nothing; a
/// single-point path costs zero. For a path reconstructed from a map this
/// equals the map's distance to the target.
#[must_use]
pub fn path_cost(grid: &CostGrid, alpha: f64, path: &Path) -> f64 {
    let dimensions = grid.dimensions();
    path.points()
        .iter()
        .skip(1)
        .filter(|&&p| dimensions.contains(p))
        .map(|&p| grid.edge_cost(dimensions.index_of(p), alpha))
        .sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::GridPoint;

    #[test]
    fn profile_follows_path_order() {
        let grid = CostGrid::new(3, 1, vec![1.0, 2.0, 3.0]).unwrap();
        let path = Path::new(vec![GridPoint::new(2, 0), GridPoint::new(1, 0)]);
        assert_eq!(intensity_profile(&grid, &path), vec![3.0, 2.0]);
    }

    #[test]
    fn cost_skips_the_source_pixel() {
        let grid = CostGrid::new(3, 1, vec![0.0, 4.0, 9.0]).unwrap();
        let path = Path::new(vec![
            GridPoint::new(0, 0),
            GridPoint::new(1, 0),
            GridPoint::new(2, 0),
        ]);
        let expected = 9.0 / 5.0 + 9.0 / 10.0;
        assert!((path_cost(&grid, 1.0, &path) - expected).abs() < 1e-12);
        assert!(path_cost(&grid, 1.0, &Path::new(vec![GridPoint::new(0, 0)])).abs() < f64::EPSILON);
    }
}
