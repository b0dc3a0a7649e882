//! Neighbor generation: which pixels a node may expand to.
//!
//! This module defines the [`NeighborPolicy`] trait for pluggable
//! neighborhood rules and the [`ConnectivityKind`] enum for selecting one
//! at runtime, so the map computation itself never branches on the rule.
//!
//! Every step has unit length regardless of direction; only the
//! destination pixel's intensity contributes to its cost.

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, GridPoint};

/// Selects which neighborhood rule the search uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectivityKind {
    /// Full 8-connected neighborhood, clipped at the grid edges.
    #[default]
    Bidirectional,

    /// Monotonic in the row axis.
    ///
    /// A node below the source row expands to its left and right
    /// neighbors and to the three pixels of the next row further from
    /// the source; a node above the source row mirrors that. The source
    /// row itself is fully 8-connected so the search can seed both
    /// directions. Every path therefore moves away from the source row
    /// and never comes back, which is what a kymograph's time axis
    /// requires.
    Directional,
}

/// Trait for neighborhood rules.
pub trait NeighborPolicy {
    /// Append the row-major indices of every pixel reachable in one step
    /// from `from` to `out`, in ascending index order.
    ///
    /// `source_row` is the row of the search's source pixel.
    fn neighbors(
        &self,
        dimensions: Dimensions,
        source_row: u32,
        from: GridPoint,
        out: &mut Vec<usize>,
    );

    /// Returns `true` if a single step from `from` to `to` is allowed.
    fn allows_step(&self, source_row: u32, from: GridPoint, to: GridPoint) -> bool;
}

impl ConnectivityKind {
    /// Row offsets a node on `row` may step to.
    const fn row_steps(self, source_row: u32, row: u32) -> &'static [i64] {
        match self {
            Self::Bidirectional => &[-1, 0, 1],
            Self::Directional => {
                if row > source_row {
                    &[0, 1]
                } else if row < source_row {
                    &[-1, 0]
                } else {
                    &[-1, 0, 1]
                }
            }
        }
    }
}

impl NeighborPolicy for ConnectivityKind {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn neighbors(
        &self,
        dimensions: Dimensions,
        source_row: u32,
        from: GridPoint,
        out: &mut Vec<usize>,
    ) {
        let width = i64::from(dimensions.width);
        let height = i64::from(dimensions.height);
        let (fx, fy) = (i64::from(from.x), i64::from(from.y));

        for &dy in self.row_steps(source_row, from.y) {
            let y = fy + dy;
            if !(0..height).contains(&y) {
                continue;
            }
            for dx in -1..=1 {
                let x = fx + dx;
                if (dx == 0 && dy == 0) || !(0..width).contains(&x) {
                    continue;
                }
                out.push((y * width + x) as usize);
            }
        }
    }

    fn allows_step(&self, source_row: u32, from: GridPoint, to: GridPoint) -> bool {
        if !from.is_adjacent(to) {
            return false;
        }
        let dy = i64::from(to.y) - i64::from(from.y);
        self.row_steps(source_row, from.y).contains(&dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIMS: Dimensions = Dimensions {
        width: 4,
        height: 4,
    };

    fn neighbors_of(kind: ConnectivityKind, source_row: u32, p: GridPoint) -> Vec<GridPoint> {
        let mut out = Vec::new();
        kind.neighbors(DIMS, source_row, p, &mut out);
        out.into_iter().map(|i| DIMS.point_at(i)).collect()
    }

    #[test]
    fn default_is_bidirectional() {
        assert_eq!(ConnectivityKind::default(), ConnectivityKind::Bidirectional);
    }

    #[test]
    fn interior_node_has_eight_neighbors() {
        let n = neighbors_of(ConnectivityKind::Bidirectional, 0, GridPoint::new(1, 1));
        assert_eq!(n.len(), 8);
        assert!(!n.contains(&GridPoint::new(1, 1)));
    }

    #[test]
    fn corner_node_is_clipped() {
        let n = neighbors_of(ConnectivityKind::Bidirectional, 0, GridPoint::new(0, 0));
        assert_eq!(
            n,
            vec![
                GridPoint::new(1, 0),
                GridPoint::new(0, 1),
                GridPoint::new(1, 1),
            ]
        );
        let n = neighbors_of(ConnectivityKind::Bidirectional, 0, GridPoint::new(3, 3));
        assert_eq!(n.len(), 3);
    }

    #[test]
    fn neighbors_are_in_ascending_index_order() {
        let mut out = Vec::new();
        ConnectivityKind::Bidirectional.neighbors(DIMS, 0, GridPoint::new(2, 2), &mut out);
        let mut sorted = out.clone();
        sorted.sort_unstable();
        assert_eq!(out, sorted);
    }

    #[test]
    fn row_steps_evaluate_at_compile_time() {
        const BELOW: &[i64] = ConnectivityKind::Directional.row_steps(1, 2);
        const ABOVE: &[i64] = ConnectivityKind::Directional.row_steps(2, 1);
        const ON: &[i64] = ConnectivityKind::Directional.row_steps(3, 3);
        assert_eq!(BELOW, &[0, 1]);
        assert_eq!(ABOVE, &[-1, 0]);
        assert_eq!(ON, &[-1, 0, 1]);
        assert_eq!(ConnectivityKind::Bidirectional.row_steps(0, 9), &[-1, 0, 1]);
    }

    #[test]
    fn directional_below_source_moves_down_only() {
        let n = neighbors_of(ConnectivityKind::Directional, 1, GridPoint::new(1, 2));
        assert_eq!(
            n,
            vec![
                GridPoint::new(0, 2),
                GridPoint::new(2, 2),
                GridPoint::new(0, 3),
                GridPoint::new(1, 3),
                GridPoint::new(2, 3),
            ]
        );
    }

    #[test]
    fn directional_above_source_moves_up_only() {
        let n = neighbors_of(ConnectivityKind::Directional, 2, GridPoint::new(1, 1));
        assert!(n.iter().all(|p| p.y <= 1));
        assert_eq!(n.len(), 5);
    }

    #[test]
    fn directional_source_row_is_fully_connected() {
        let n = neighbors_of(ConnectivityKind::Directional, 1, GridPoint::new(1, 1));
        assert_eq!(n.len(), 8);
    }

    #[test]
    fn allows_step_matches_neighbors() {
        for kind in [ConnectivityKind::Bidirectional, ConnectivityKind::Directional] {
            for source_row in 0..DIMS.height {
                for from_index in 0..DIMS.len() {
                    let from = DIMS.point_at(from_index);
                    let n = neighbors_of(kind, source_row, from);
                    for to_index in 0..DIMS.len() {
                        let to = DIMS.point_at(to_index);
                        assert_eq!(
                            kind.allows_step(source_row, from, to),
                            n.contains(&to),
                            "{kind:?} source_row={source_row} {from} -> {to}"
                        );
                    }
                }
            }
        }
    }
}
