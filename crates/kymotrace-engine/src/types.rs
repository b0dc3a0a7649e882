//! Shared types for the kymotrace tracing engine.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connectivity::ConnectivityKind;

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// A pointer position in image coordinates, as delivered by a viewer.
///
/// Pointer positions are continuous; they are rounded to the nearest
/// pixel with [`Point::to_grid`] before they reach the search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Round to the nearest pixel, halves up, or `None` if that pixel
    /// lies outside a grid of the given dimensions (or the position is
    /// not finite).
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_grid(self, dimensions: Dimensions) -> Option<GridPoint> {
        let x = (self.x + 0.5).floor();
        let y = (self.y + 0.5).floor();
        // Written so that NaN falls through to `None`.
        let inside = x >= 0.0
            && y >= 0.0
            && x < f64::from(dimensions.width)
            && y < f64::from(dimensions.height);
        inside.then(|| GridPoint::new(x as u32, y as u32))
    }
}

impl From<GridPoint> for Point {
    fn from(p: GridPoint) -> Self {
        Self::new(f64::from(p.x), f64::from(p.y))
    }
}

/// A pixel coordinate on the cost grid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GridPoint {
    /// Column index.
    pub x: u32,
    /// Row index.
    pub y: u32,
}

impl GridPoint {
    /// Create a new grid point.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Returns `true` if `other` is one of the eight pixels surrounding
    /// `self` (Chebyshev distance of exactly one).
    #[must_use]
    pub const fn is_adjacent(self, other: Self) -> bool {
        let dx = self.x.abs_diff(other.x);
        let dy = self.y.abs_diff(other.y);
        dx <= 1 && dy <= 1 && (dx + dy) > 0
    }
}

impl fmt::Display for GridPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Grid dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Total number of pixels.
    #[must_use]
    pub const fn len(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Returns `true` if either axis is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns `true` if `p` lies on the grid.
    #[must_use]
    pub const fn contains(self, p: GridPoint) -> bool {
        p.x < self.width && p.y < self.height
    }

    /// Row-major index of `p`. The caller guarantees `contains(p)`.
    #[must_use]
    pub const fn index_of(self, p: GridPoint) -> usize {
        p.y as usize * self.width as usize + p.x as usize
    }

    /// Inverse of [`index_of`](Self::index_of).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn point_at(self, index: usize) -> GridPoint {
        let width = self.width as usize;
        GridPoint::new((index % width) as u32, (index / width) as u32)
    }
}

/// An ordered sequence of pixels from a source to a target, inclusive.
///
/// Paths are immutable once constructed. Everything handed to callers
/// or listeners is an owned copy, so no one ever observes a buffer that
/// is still being written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path(Vec<GridPoint>);

impl Path {
    /// Create a path from an ordered list of pixels.
    #[must_use]
    pub const fn new(points: Vec<GridPoint>) -> Self {
        Self(points)
    }

    /// An empty path, carried by reset events.
    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Returns `true` if the path has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of pixels in the path.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// The source pixel, if any.
    #[must_use]
    pub fn first(&self) -> Option<GridPoint> {
        self.0.first().copied()
    }

    /// The target pixel, if any.
    #[must_use]
    pub fn last(&self) -> Option<GridPoint> {
        self.0.last().copied()
    }

    /// All pixels in source-to-target order.
    #[must_use]
    pub fn points(&self) -> &[GridPoint] {
        &self.0
    }

    /// Consumes the path and returns the underlying pixels.
    #[must_use]
    pub fn into_points(self) -> Vec<GridPoint> {
        self.0
    }
}

/// Identity of one background computation (map, path, or reset).
///
/// Listeners receive it with every event so they can tell which
/// computation produced a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComputationId(pub u64);

impl fmt::Display for ComputationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How clicks are turned into finalized segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TracingMode {
    /// One source, one target. A third click starts over from a new
    /// source and the finalized list only ever holds the last path.
    Single,

    /// Multi-segment tracing: each target click finalizes a segment and
    /// chains a new source at that target. A double-click ends the chain.
    #[default]
    Chained,
}

/// Configuration for a tracing session.
///
/// Construct with struct-update syntax over [`TracerConfig::default`]
/// and let [`TracingSession::new`](crate::TracingSession::new) validate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracerConfig {
    /// Regularization added to every intensity before it divides the
    /// maximum intensity. Must be finite and strictly positive.
    ///
    /// Small values make the path hug bright structures; large values
    /// flatten the cost landscape toward shortest-in-pixels paths.
    pub alpha: f64,

    /// Which pixels a node may expand to.
    pub connectivity: ConnectivityKind,

    /// Single path or chained multi-segment tracing.
    pub mode: TracingMode,

    /// Two target clicks count as a double-click when the second lands
    /// strictly less than this long after the first.
    #[serde(with = "duration_serde")]
    pub double_click_window: Duration,

    /// Pause inserted before every relaxation step of a map
    /// computation. Zero in normal use; non-zero values slow the search
    /// down for demonstrations and for exercising cancellation.
    #[serde(with = "duration_serde")]
    pub relaxation_delay: Duration,
}

impl TracerConfig {
    /// Default regularization constant.
    pub const DEFAULT_ALPHA: f64 = 1e-4;

    /// Default double-click window.
    pub const DEFAULT_DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(1000);

    /// Check the configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns [`TracerError::InvalidConfig`] if `alpha` is not finite and
    /// strictly positive, or if the double-click window is zero.
    pub fn validate(&self) -> Result<(), TracerError> {
        if !self.alpha.is_finite() || self.alpha <= 0.0 {
            return Err(TracerError::InvalidConfig(format!(
                "alpha must be finite and positive, got {}",
                self.alpha
            )));
        }
        if self.double_click_window.is_zero() {
            return Err(TracerError::InvalidConfig(
                "double_click_window must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            alpha: Self::DEFAULT_ALPHA,
            connectivity: ConnectivityKind::default(),
            mode: TracingMode::default(),
            double_click_window: Self::DEFAULT_DOUBLE_CLICK_WINDOW,
            relaxation_delay: Duration::ZERO,
        }
    }
}

/// A path together with its accumulated cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracedPath {
    /// Pixels from source to target.
    pub path: Path,
    /// Sum of edge costs along the path (equals the map's distance to
    /// the target).
    pub cost: f64,
}

/// Errors produced by the tracing engine.
#[derive(Debug, thiserror::Error)]
pub enum TracerError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Tracer configuration is invalid.
    #[error("invalid tracer configuration: {0}")]
    InvalidConfig(String),

    /// The intensity grid cannot be traced over.
    #[error("invalid intensity grid: {0}")]
    InvalidGrid(String),

    /// A coordinate lies outside the grid.
    #[error("point ({x}, {y}) is outside the grid")]
    OutOfBounds {
        /// Requested column.
        x: u32,
        /// Requested row.
        y: u32,
    },

    /// The search finished without ever reaching the target.
    #[error("point ({x}, {y}) is not reachable from the source")]
    Unreachable {
        /// Target column.
        x: u32,
        /// Target row.
        y: u32,
    },

    /// The computation was superseded before it could finish.
    #[error("computation cancelled")]
    Cancelled,

    /// A background thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),
}
