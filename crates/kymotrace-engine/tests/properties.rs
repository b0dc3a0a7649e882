//! Property tests for map and path computations on small random grids.

#![allow(clippy::unwrap_used)]

use kymotrace_engine::{
    ConnectivityKind, CostGrid, GridPoint, NeighborPolicy, TracerConfig, compute_map, path_cost,
    trace_path,
};
use proptest::prelude::*;

/// A random grid plus a source and a target on it.
#[derive(Debug, Clone)]
struct Case {
    grid: CostGrid,
    source: GridPoint,
    target: GridPoint,
}

fn case_strategy() -> impl Strategy<Value = Case> {
    (1u32..9, 1u32..9).prop_flat_map(|(width, height)| {
        (
            prop::collection::vec(0.0f64..255.0, (width * height) as usize),
            0..width,
            0..height,
            0..width,
            0..height,
        )
            .prop_map(move |(intensities, sx, sy, tx, ty)| Case {
                grid: CostGrid::new(width, height, intensities).unwrap(),
                source: GridPoint::new(sx, sy),
                target: GridPoint::new(tx, ty),
            })
    })
}

fn connectivity_strategy() -> impl Strategy<Value = ConnectivityKind> {
    prop_oneof![
        Just(ConnectivityKind::Bidirectional),
        Just(ConnectivityKind::Directional),
    ]
}

fn config(connectivity: ConnectivityKind, alpha: f64) -> TracerConfig {
    TracerConfig {
        alpha,
        connectivity,
        ..TracerConfig::default()
    }
}

proptest! {
    /// The source is settled first, at distance zero, and every pixel is
    /// settled in non-decreasing distance order.
    #[test]
    fn source_settles_first_and_order_is_monotone(
        case in case_strategy(),
        connectivity in connectivity_strategy(),
        alpha in 0.01f64..10.0,
    ) {
        let map = compute_map(&case.grid, &config(connectivity, alpha), case.source).unwrap();
        let order: Vec<_> = map.settle_order().collect();
        prop_assert_eq!(order.first().copied(), Some(case.source));
        prop_assert_eq!(map.distance(case.source), Some(0.0));
        // The grid is connected under both policies.
        prop_assert_eq!(order.len(), case.grid.dimensions().len());

        let distances: Vec<f64> = order.iter().map(|&p| map.distance(p).unwrap()).collect();
        for pair in distances.windows(2) {
            prop_assert!(pair[0] <= pair[1], "settled out of order: {:?}", pair);
        }
    }

    /// Paths run from source to target through allowed steps only, and
    /// their summed edge cost is the map's distance.
    #[test]
    fn path_is_valid_and_optimal(
        case in case_strategy(),
        connectivity in connectivity_strategy(),
        alpha in 0.01f64..10.0,
    ) {
        let config = config(connectivity, alpha);
        let map = compute_map(&case.grid, &config, case.source).unwrap();
        let path = map.path_to(case.target).unwrap();

        prop_assert_eq!(path.first(), Some(case.source));
        prop_assert_eq!(path.last(), Some(case.target));
        for step in path.points().windows(2) {
            prop_assert!(
                connectivity.allows_step(case.source.y, step[0], step[1]),
                "{:?} step {} -> {} not allowed",
                connectivity,
                step[0],
                step[1]
            );
        }

        let expected = map.distance(case.target).unwrap();
        let cost = path_cost(&case.grid, alpha, &path);
        prop_assert!(
            (cost - expected).abs() <= 1e-9 * expected.max(1.0),
            "path cost {} != distance {}",
            cost,
            expected
        );
    }

    /// Directional paths never turn back toward the source row.
    #[test]
    fn directional_paths_are_monotone(case in case_strategy()) {
        let traced = trace_path(
            &case.grid,
            &config(ConnectivityKind::Directional, 1.0),
            case.source,
            case.target,
        )
        .unwrap();
        let rows: Vec<u32> = traced.path.points().iter().map(|p| p.y).collect();
        let non_decreasing = rows.windows(2).all(|w| w[0] <= w[1]);
        let non_increasing = rows.windows(2).all(|w| w[0] >= w[1]);
        prop_assert!(non_decreasing || non_increasing, "rows {:?}", rows);
    }

    /// Asking twice gives the same answer.
    #[test]
    fn tracing_is_idempotent(
        case in case_strategy(),
        connectivity in connectivity_strategy(),
    ) {
        let config = config(connectivity, TracerConfig::DEFAULT_ALPHA);
        let first = trace_path(&case.grid, &config, case.source, case.target).unwrap();
        let second = trace_path(&case.grid, &config, case.source, case.target).unwrap();
        prop_assert_eq!(first, second);

        let map = compute_map(&case.grid, &config, case.source).unwrap();
        prop_assert_eq!(
            map.path_to(case.target).unwrap(),
            map.path_to(case.target).unwrap()
        );
    }
}
