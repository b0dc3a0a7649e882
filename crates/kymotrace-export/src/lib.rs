//! kymotrace-export: Pure format serializers (sans-IO)
//!
//! Converts traced paths into output formats. Currently supports an SVG
//! overlay sized to the traced image.

pub mod svg;

pub use svg::{SvgMetadata, build_path_data, to_svg};
