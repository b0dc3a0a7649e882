//! Resampling filters for [`CostGrid::decode`](crate::CostGrid::decode).
//!
//! The map computation is quadratic in the pixel count, so large images
//! are reduced until the longest axis matches the requested working
//! resolution before a grid is built from them.

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

/// Resampling filter used when downsampling.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality,
/// with a `None` variant to skip downsampling entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DownsampleFilter {
    /// Disabled: skip downsampling regardless of image size.
    None,
    /// Nearest-neighbor: fastest, keeps single-pixel tracks crisp.
    Nearest,
    /// Bilinear interpolation: fast, decent quality.
    #[default]
    Triangle,
    /// Bicubic (Catmull-Rom): moderate speed, good quality.
    CatmullRom,
    /// Gaussian: moderate speed, smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: slowest, sharpest.
    Lanczos3,
}

impl DownsampleFilter {
    /// Convert to the `image` crate's `FilterType`.
    ///
    /// Returns `Option::None` for [`DownsampleFilter::None`] since
    /// there is no corresponding resampling filter.
    pub(crate) const fn to_image_filter(self) -> Option<FilterType> {
        match self {
            Self::None => Option::None,
            Self::Nearest => Some(FilterType::Nearest),
            Self::Triangle => Some(FilterType::Triangle),
            Self::CatmullRom => Some(FilterType::CatmullRom),
            Self::Gaussian => Some(FilterType::Gaussian),
            Self::Lanczos3 => Some(FilterType::Lanczos3),
        }
    }
}
