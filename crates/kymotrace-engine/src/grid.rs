//! The cost grid: an immutable snapshot of pixel intensities.
//!
//! A session copies the image it traces over once, at construction, and
//! never looks at the live buffer again. Edge costs are derived from the
//! snapshot and its maximum intensity:
//!
//! ```text
//! cost(u -> v) = max_intensity / (intensity(v) + alpha)
//! ```
//!
//! Only the destination pixel matters, so brighter pixels are cheaper to
//! enter and the graph is directed even though adjacency is symmetric.

use image::{GrayImage, ImageBuffer, Luma};

use crate::downsample::DownsampleFilter;
use crate::types::{Dimensions, GridPoint, TracerError};

/// Immutable row-major intensity field plus its maximum.
#[derive(Debug, Clone, PartialEq)]
pub struct CostGrid {
    dimensions: Dimensions,
    intensities: Vec<f64>,
    max_intensity: f64,
}

impl CostGrid {
    /// Default longest-axis size for [`decode`](Self::decode) callers that
    /// downsample.
    pub const DEFAULT_WORKING_RESOLUTION: u32 = 256;

    /// Default filter for [`decode`](Self::decode) callers that
    /// downsample.
    pub const DEFAULT_DOWNSAMPLE_FILTER: DownsampleFilter = DownsampleFilter::Triangle;

    /// Build a grid from row-major intensities.
    ///
    /// # Errors
    ///
    /// Returns [`TracerError::InvalidGrid`] if either dimension is zero,
    /// if `intensities.len() != width * height`, or if any intensity is
    /// negative or not finite (either would break the non-negative edge
    /// costs the search relies on).
    pub fn new(width: u32, height: u32, intensities: Vec<f64>) -> Result<Self, TracerError> {
        let dimensions = Dimensions { width, height };
        if dimensions.is_empty() {
            return Err(TracerError::InvalidGrid(format!(
                "grid must be non-empty, got {width}x{height}"
            )));
        }
        if intensities.len() != dimensions.len() {
            return Err(TracerError::InvalidGrid(format!(
                "expected {} intensities for a {width}x{height} grid, got {}",
                dimensions.len(),
                intensities.len()
            )));
        }
        if let Some(index) = intensities.iter().position(|v| !v.is_finite() || *v < 0.0) {
            let p = dimensions.point_at(index);
            return Err(TracerError::InvalidGrid(format!(
                "intensity at {p} must be finite and non-negative, got {}",
                intensities[index]
            )));
        }

        let max_intensity = intensities.iter().copied().fold(0.0, f64::max);
        Ok(Self {
            dimensions,
            intensities,
            max_intensity,
        })
    }

    /// Build a grid from an 8-bit grayscale image.
    ///
    /// # Errors
    ///
    /// Returns [`TracerError::InvalidGrid`] for an empty image.
    pub fn from_gray_image(image: &GrayImage) -> Result<Self, TracerError> {
        let intensities = image.pixels().map(|p| f64::from(p.0[0])).collect();
        Self::new(image.width(), image.height(), intensities)
    }

    /// Build a grid from a 16-bit grayscale image (the usual bit depth of
    /// microscopy data).
    ///
    /// # Errors
    ///
    /// Returns [`TracerError::InvalidGrid`] for an empty image.
    pub fn from_luma16(image: &ImageBuffer<Luma<u16>, Vec<u16>>) -> Result<Self, TracerError> {
        let intensities = image.pixels().map(|p| f64::from(p.0[0])).collect();
        Self::new(image.width(), image.height(), intensities)
    }

    /// Decode raw image bytes (PNG, JPEG, BMP, WebP), convert to 16-bit
    /// luminance, and optionally downsample so the longest axis is at
    /// most `working_resolution` pixels.
    ///
    /// # Errors
    ///
    /// Returns [`TracerError::EmptyInput`] if `bytes` is empty.
    /// Returns [`TracerError::ImageDecode`] if the image format is
    /// unrecognized or the data is corrupt.
    pub fn decode(
        bytes: &[u8],
        working_resolution: Option<u32>,
        filter: DownsampleFilter,
    ) -> Result<Self, TracerError> {
        if bytes.is_empty() {
            return Err(TracerError::EmptyInput);
        }

        let mut img = image::load_from_memory(bytes)?;
        if let (Some(max_dimension), Some(resample)) =
            (working_resolution, filter.to_image_filter())
            && img.width().max(img.height()) > max_dimension
        {
            // Keeps the aspect ratio.
            img = img.resize(max_dimension, max_dimension, resample);
        }
        Self::from_luma16(&img.to_luma16())
    }

    /// Grid dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Largest intensity on the grid (zero for an all-black grid).
    #[must_use]
    pub const fn max_intensity(&self) -> f64 {
        self.max_intensity
    }

    /// All intensities, row-major.
    #[must_use]
    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    /// Intensity of the pixel at `p`, or `None` off-grid.
    #[must_use]
    pub fn intensity_at(&self, p: GridPoint) -> Option<f64> {
        self.dimensions
            .contains(p)
            .then(|| self.intensities[self.dimensions.index_of(p)])
    }

    /// Cost of stepping onto the pixel at row-major index `to`.
    #[must_use]
    pub fn edge_cost(&self, to: usize, alpha: f64) -> f64 {
        self.max_intensity / (self.intensities[to] + alpha)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn max_intensity_is_computed_once() {
        let grid = CostGrid::new(2, 2, vec![1.0, 7.0, 3.0, 0.0]).unwrap();
        assert!((grid.max_intensity() - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn edge_cost_depends_on_destination_only() {
        let grid = CostGrid::new(2, 1, vec![10.0, 4.0]).unwrap();
        assert!((grid.edge_cost(1, 1.0) - 2.0).abs() < f64::EPSILON);
        assert!((grid.edge_cost(0, 1.0) - 10.0 / 11.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_empty_grid() {
        assert!(matches!(
            CostGrid::new(0, 3, vec![]),
            Err(TracerError::InvalidGrid(_))
        ));
    }

    #[test]
    fn rejects_length_mismatch() {
        assert!(matches!(
            CostGrid::new(2, 2, vec![1.0; 3]),
            Err(TracerError::InvalidGrid(_))
        ));
    }

    #[test]
    fn rejects_negative_and_non_finite_intensities() {
        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                CostGrid::new(2, 1, vec![1.0, bad]),
                Err(TracerError::InvalidGrid(_))
            ));
        }
    }

    #[test]
    fn intensity_at_off_grid_is_none() {
        let grid = CostGrid::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(grid.intensity_at(GridPoint::new(1, 1)), Some(4.0));
        assert_eq!(grid.intensity_at(GridPoint::new(2, 0)), None);
    }

    #[test]
    fn from_gray_image_copies_pixels() {
        let mut img = GrayImage::new(3, 2);
        img.put_pixel(2, 1, Luma([200]));
        let grid = CostGrid::from_gray_image(&img).unwrap();
        assert_eq!(size(&grid), (3, 2));
        assert_eq!(grid.intensity_at(GridPoint::new(2, 1)), Some(200.0));
        assert!((grid.max_intensity() - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn default_filter_matches_downsample_default() {
        assert_eq!(
            CostGrid::DEFAULT_DOWNSAMPLE_FILTER,
            DownsampleFilter::default()
        );
    }

    #[test]
    fn decode_empty_input() {
        assert!(matches!(
            CostGrid::decode(&[], None, DownsampleFilter::None),
            Err(TracerError::EmptyInput)
        ));
    }

    #[test]
    fn decode_corrupt_input() {
        assert!(matches!(
            CostGrid::decode(&[0xFF, 0xFE, 0x00], None, DownsampleFilter::None),
            Err(TracerError::ImageDecode(_))
        ));
    }

    fn size(grid: &CostGrid) -> (u32, u32) {
        let d = grid.dimensions();
        (d.width, d.height)
    }

    fn png(img: &GrayImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::L8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn decode_keeps_images_already_within_the_working_resolution() {
        let buf = png(&GrayImage::from_pixel(100, 80, Luma([90])));
        let grid = CostGrid::decode(&buf, Some(256), DownsampleFilter::Triangle).unwrap();
        assert_eq!(size(&grid), (100, 80));
    }

    #[test]
    fn decode_shrinks_the_long_axis_of_a_tall_kymograph() {
        let buf = png(&GrayImage::from_pixel(30, 120, Luma([90])));
        let grid = CostGrid::decode(&buf, Some(20), DownsampleFilter::Nearest).unwrap();
        assert_eq!(size(&grid), (5, 20));
    }

    #[test]
    fn decode_with_no_filter_never_resizes() {
        let buf = png(&GrayImage::from_pixel(64, 48, Luma([90])));
        let grid = CostGrid::decode(&buf, Some(16), DownsampleFilter::None).unwrap();
        assert_eq!(size(&grid), (64, 48));
    }

    #[test]
    fn decode_png_and_downsample() {
        let img = GrayImage::from_fn(40, 20, |x, _| Luma([if x < 20 { 0 } else { 255 }]));
        let buf = png(&img);

        let full = CostGrid::decode(&buf, None, DownsampleFilter::Nearest).unwrap();
        assert_eq!(size(&full), (40, 20));
        // 8-bit white widens to the full 16-bit range.
        assert!((full.max_intensity() - 65535.0).abs() < f64::EPSILON);

        let small = CostGrid::decode(&buf, Some(10), DownsampleFilter::Nearest).unwrap();
        assert_eq!(size(&small), (10, 5));
    }
}
