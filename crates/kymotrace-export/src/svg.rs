//! SVG overlay serializer.
//!
//! Converts traced paths into an SVG string sized to the traced image,
//! so the document can be laid over it pixel for pixel. Each path becomes
//! a `<path>` element with `M` (move to) and `L` (line to) commands
//! through the pixel centres.
//!
//! Finalized segments and the current (temporary) path are drawn in
//! different colours and grouped under `<g id="finalized">` and
//! `<g id="current">`.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Description, Element, Group, Path as SvgPath, Title};
use svg::node::{Node, Text, Value};

use kymotrace_engine::{Dimensions, Path};

/// Stroke colour of finalized segments.
const FINALIZED_STROKE: &str = "#e4572e";
/// Stroke colour of the current temporary path.
const CURRENT_STROKE: &str = "#29a0b1";

/// Metadata to embed in the SVG document.
///
/// All fields are optional. Text values are XML-escaped by the `svg`
/// crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Emitted as `<title>`. Typically the source image file stem.
    pub title: Option<&'a str>,

    /// Emitted as `<desc>`. Typically the tracer parameters in
    /// human-readable form.
    pub description: Option<&'a str>,

    /// Serialized tracer configuration, emitted inside `<metadata>` in a
    /// namespaced `<kymotrace:config>` element so exported files carry
    /// machine-readable settings.
    pub config_json: Option<&'a str>,
}

/// Build an SVG path `d` attribute string through the centres of the
/// pixels of `path`.
///
/// Returns an empty string for paths with fewer than 2 points.
///
/// # Examples
///
/// ```
/// use kymotrace_engine::{GridPoint, Path};
/// use kymotrace_export::build_path_data;
///
/// let path = Path::new(vec![GridPoint::new(0, 0), GridPoint::new(1, 2)]);
/// assert_eq!(build_path_data(&path), "M0.5,0.5 L1.5,2.5");
/// ```
#[must_use]
pub fn build_path_data(path: &Path) -> String {
    let points = path.points();
    if points.len() < 2 {
        return String::new();
    }

    let centre = |p: &kymotrace_engine::GridPoint| (f64::from(p.x) + 0.5, f64::from(p.y) + 0.5);
    let mut data = Data::new().move_to(centre(&points[0]));
    for p in &points[1..] {
        data = data.line_to(centre(p));
    }
    String::from(Value::from(data))
}

fn path_group<'p>(id: &str, stroke: &str, paths: impl IntoIterator<Item = &'p Path>) -> Group {
    let mut group = Group::new()
        .set("id", id)
        .set("fill", "none")
        .set("stroke", stroke)
        .set("stroke-width", 1)
        .set("stroke-linejoin", "round");
    for path in paths {
        let d = build_path_data(path);
        if d.is_empty() {
            continue;
        }
        group = group.add(SvgPath::new().set("d", d));
    }
    group
}

/// Serialize traced paths into an SVG overlay.
///
/// `dimensions` sets `width`, `height` and `viewBox` so one user unit is
/// one pixel of the traced grid. Paths with fewer than 2 points are
/// skipped.
#[must_use]
pub fn to_svg(
    current: Option<&Path>,
    finalized: &[Path],
    dimensions: Dimensions,
    metadata: &SvgMetadata<'_>,
) -> String {
    let w = dimensions.width;
    let h = dimensions.height;
    let mut doc = Document::new()
        .set("width", w)
        .set("height", h)
        .set("viewBox", (0, 0, w, h));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }

    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    if let Some(config_json) = metadata.config_json {
        let mut config_el = Element::new("kymotrace:config");
        config_el.assign("xmlns:kymotrace", "urn:kymotrace:config:1");
        config_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(config_el);
        doc = doc.add(metadata_el);
    }

    doc = doc.add(path_group("finalized", FINALIZED_STROKE, finalized));
    if let Some(current) = current {
        doc = doc.add(path_group("current", CURRENT_STROKE, [current]));
    }

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}
