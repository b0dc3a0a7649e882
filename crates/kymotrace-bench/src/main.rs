//! kymotrace-bench: CLI tool for replaying tracing sessions on an image.
//!
//! Loads an image, builds a cost grid, replays a scripted click sequence
//! through a live [`TracingSession`], and prints a per-segment report.
//! Useful for:
//!
//! - Comparing bidirectional and directional connectivity on a kymograph
//! - Tuning `alpha` against the brightness of the structures being traced
//! - Measuring how long map computations take at a given working
//!   resolution
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin kymotrace-bench -- [OPTIONS] --click X,Y --click X,Y <IMAGE_PATH>
//! ```
//!
//! Click coordinates are in working-grid pixels (after downsampling).

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use kymotrace_engine::{
    ChannelListener, ConnectivityKind, CostGrid, DownsampleFilter, GridPoint, ManualClock,
    PathEventKind, Point, TracerConfig, TracingMode, TracingSession, Transition,
    intensity_profile, path_cost,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Replay tracing sessions on an image and report the traced segments.
///
/// The first click picks the source; every further click is a target.
/// Clicks are spaced past the double-click window unless `--finish` asks
/// for a closing double-click on the last one.
#[derive(Parser)]
#[command(name = "kymotrace-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Click position as `X,Y` in working-grid pixels. Repeat for each
    /// click.
    #[arg(long = "click", value_name = "X,Y", value_parser = parse_point, required = true)]
    clicks: Vec<Point>,

    /// Regularization constant added to every intensity.
    #[arg(long, default_value_t = TracerConfig::DEFAULT_ALPHA)]
    alpha: f64,

    /// Only trace paths that move away from the source row.
    #[arg(long)]
    directional: bool,

    /// Tracing mode.
    #[arg(long, value_enum, default_value_t = Mode::Chained)]
    mode: Mode,

    /// Double-click on the last click to end the chain.
    #[arg(long)]
    finish: bool,

    /// Pause before every relaxation step, in milliseconds.
    #[arg(long, default_value_t = 0)]
    relaxation_delay_ms: u64,

    /// Working resolution (max dimension in pixels after downsampling).
    #[arg(long, default_value_t = CostGrid::DEFAULT_WORKING_RESOLUTION, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    working_resolution: u32,

    /// Downsample filter.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_FILTER)]
    downsample_filter: Filter,

    /// Seconds to wait for each click's computations before giving up.
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,

    /// Write an SVG overlay of the traced segments to file.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Output the report as JSON instead of human-readable text.
    #[arg(long)]
    json: bool,

    /// Full tracer config as a JSON string.
    ///
    /// When provided, `--alpha`, `--directional`, `--mode` and
    /// `--relaxation-delay-ms` are ignored. The JSON must be a valid
    /// `TracerConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    /// Log engine activity at debug level (`RUST_LOG` overrides).
    #[arg(short, long)]
    verbose: bool,
}

/// Tracing mode selection.
#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// One source, one target.
    Single,
    /// Each target chains into the next source.
    Chained,
}

/// Downsample resampling filter selection.
#[derive(Clone, Copy, ValueEnum)]
enum Filter {
    /// Disabled: skip downsampling regardless of image size.
    Disabled,
    /// Nearest-neighbor (fastest, keeps thin tracks crisp).
    Nearest,
    /// Bilinear interpolation (fast, decent quality).
    Triangle,
    /// Bicubic Catmull-Rom (moderate, good quality).
    CatmullRom,
    /// Gaussian (moderate, smooth).
    Gaussian,
    /// Lanczos with 3 lobes (slowest, sharpest).
    Lanczos3,
}

/// Maps a [`DownsampleFilter`] to the local CLI [`Filter`] enum.
const fn filter_from_engine(f: DownsampleFilter) -> Filter {
    match f {
        DownsampleFilter::None => Filter::Disabled,
        DownsampleFilter::Nearest => Filter::Nearest,
        DownsampleFilter::Triangle => Filter::Triangle,
        DownsampleFilter::CatmullRom => Filter::CatmullRom,
        DownsampleFilter::Gaussian => Filter::Gaussian,
        DownsampleFilter::Lanczos3 => Filter::Lanczos3,
    }
}

/// The CLI default filter, derived from [`CostGrid::DEFAULT_DOWNSAMPLE_FILTER`]
/// so the two cannot silently diverge.
const CLI_DEFAULT_FILTER: Filter = filter_from_engine(CostGrid::DEFAULT_DOWNSAMPLE_FILTER);

const fn filter_to_engine(f: Filter) -> DownsampleFilter {
    match f {
        Filter::Disabled => DownsampleFilter::None,
        Filter::Nearest => DownsampleFilter::Nearest,
        Filter::Triangle => DownsampleFilter::Triangle,
        Filter::CatmullRom => DownsampleFilter::CatmullRom,
        Filter::Gaussian => DownsampleFilter::Gaussian,
        Filter::Lanczos3 => DownsampleFilter::Lanczos3,
    }
}

fn parse_point(s: &str) -> Result<Point, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got {s:?}"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid coordinate {v:?}: {e}"))
    };
    Ok(Point::new(parse(x)?, parse(y)?))
}

/// Build a [`TracerConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual tracer flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<TracerConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(TracerConfig {
        alpha: cli.alpha,
        connectivity: if cli.directional {
            ConnectivityKind::Directional
        } else {
            ConnectivityKind::Bidirectional
        },
        mode: match cli.mode {
            Mode::Single => TracingMode::Single,
            Mode::Chained => TracingMode::Chained,
        },
        relaxation_delay: Duration::from_millis(cli.relaxation_delay_ms),
        ..TracerConfig::default()
    })
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// One replayed click.
#[derive(Debug, Serialize)]
struct ClickReport {
    x: f64,
    y: f64,
    transition: String,
    /// Time until the session went idle, in milliseconds.
    settle_ms: f64,
}

/// One finalized segment.
#[derive(Debug, Serialize)]
struct SegmentReport {
    source: GridPoint,
    target: GridPoint,
    points: usize,
    cost: f64,
    intensity_min: f64,
    intensity_mean: f64,
    intensity_max: f64,
}

#[derive(Debug, Serialize)]
struct Report {
    width: u32,
    height: u32,
    config: TracerConfig,
    clicks: Vec<ClickReport>,
    segments: Vec<SegmentReport>,
    final_events: usize,
}

impl Report {
    fn human(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        let _ = writeln!(out, "Grid: {}x{}", self.width, self.height);
        let _ = writeln!(out, "{}", "=".repeat(60));
        let _ = writeln!(out, "{:<16} {:<28} {:>12}", "Click", "Transition", "Settle (ms)");
        let _ = writeln!(out, "{}", "-".repeat(60));
        for c in &self.clicks {
            let _ = writeln!(
                out,
                "{:<16} {:<28} {:>12.3}",
                format!("({}, {})", c.x, c.y),
                c.transition,
                c.settle_ms
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:<4} {:<12} {:<12} {:>7} {:>12} {:>10} {:>10} {:>10}",
            "#", "Source", "Target", "Points", "Cost", "I min", "I mean", "I max"
        );
        let _ = writeln!(out, "{}", "-".repeat(84));
        for (i, s) in self.segments.iter().enumerate() {
            let _ = writeln!(
                out,
                "{:<4} {:<12} {:<12} {:>7} {:>12.4} {:>10.1} {:>10.1} {:>10.1}",
                i + 1,
                s.source.to_string(),
                s.target.to_string(),
                s.points,
                s.cost,
                s.intensity_min,
                s.intensity_mean,
                s.intensity_max
            );
        }
        let _ = write!(out, "Final events received: {}", self.final_events);
        out
    }
}

#[allow(clippy::cast_precision_loss)]
fn segment_report(
    grid: &CostGrid,
    alpha: f64,
    path: &kymotrace_engine::Path,
) -> Option<SegmentReport> {
    let profile = intensity_profile(grid, path);
    if profile.is_empty() {
        return None;
    }
    Some(SegmentReport {
        source: path.first()?,
        target: path.last()?,
        points: path.len(),
        cost: path_cost(grid, alpha, path),
        intensity_min: profile.iter().copied().fold(f64::INFINITY, f64::min),
        intensity_mean: profile.iter().sum::<f64>() / profile.len() as f64,
        intensity_max: profile.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    let decode_started = Instant::now();
    let grid = match CostGrid::decode(
        &image_bytes,
        Some(cli.working_resolution),
        filter_to_engine(cli.downsample_filter),
    ) {
        Ok(grid) => grid,
        Err(e) => {
            eprintln!("Error loading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };
    let dimensions = grid.dimensions();
    tracing::info!(
        image = %cli.image_path.display(),
        bytes = image_bytes.len(),
        width = dimensions.width,
        height = dimensions.height,
        elapsed_ms = decode_started.elapsed().as_secs_f64() * 1000.0,
        "image loaded"
    );

    let clock = Arc::new(ManualClock::new());
    let session = match TracingSession::with_clock(grid, config.clone(), clock.clone()) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error starting session: {e}");
            return ExitCode::FAILURE;
        }
    };
    let (listener, events) = ChannelListener::channel();
    session.add_listener(listener);

    let timeout = Duration::from_secs(cli.timeout_secs);
    let spacing = config.double_click_window + Duration::from_millis(1);
    let mut script: Vec<Point> = cli.clicks.clone();
    if cli.finish
        && let Some(&last) = cli.clicks.last()
    {
        script.push(last);
    }

    let mut clicks = Vec::with_capacity(script.len());
    for (i, &point) in script.iter().enumerate() {
        let closing = cli.finish && i == script.len() - 1;
        if i > 0 && !closing {
            clock.advance(spacing);
        }

        let started = Instant::now();
        let transition = match session.click(point) {
            Ok(t) => t,
            Err(e) => {
                eprintln!("Error replaying click ({}, {}): {e}", point.x, point.y);
                return ExitCode::FAILURE;
            }
        };
        if transition == Transition::Ignored {
            tracing::warn!(x = point.x, y = point.y, "click ignored");
        }
        if !session.wait_until_idle(timeout) {
            eprintln!(
                "Timed out after {}s waiting for click ({}, {})",
                cli.timeout_secs, point.x, point.y
            );
            return ExitCode::FAILURE;
        }
        let settle = started.elapsed();
        tracing::info!(
            x = point.x,
            y = point.y,
            ?transition,
            settle_ms = settle.as_secs_f64() * 1000.0,
            "click replayed"
        );
        clicks.push(ClickReport {
            x: point.x,
            y: point.y,
            transition: format!("{transition:?}"),
            settle_ms: settle.as_secs_f64() * 1000.0,
        });
    }

    let finalized = session.finalized_paths();
    let segments: Vec<SegmentReport> = finalized
        .iter()
        .filter_map(|path| segment_report(session.grid(), config.alpha, path))
        .collect();
    // Listener delivery is asynchronous; give stragglers a moment.
    let final_events = std::iter::from_fn(|| events.recv_timeout(Duration::from_millis(100)).ok())
        .filter(|e| e.kind == PathEventKind::Final)
        .count();

    let report = Report {
        width: dimensions.width,
        height: dimensions.height,
        config: config.clone(),
        clicks,
        segments,
        final_events,
    };

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing report: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("{}", report.human());
    }

    if let Some(ref svg_path) = cli.svg {
        let title = cli
            .image_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("kymotrace");
        let desc = format!(
            "alpha={} connectivity={:?} mode={:?}",
            config.alpha, config.connectivity, config.mode
        );
        let config_json = serde_json::to_string(&config).ok();
        let metadata = kymotrace_export::SvgMetadata {
            title: Some(title),
            description: Some(&desc),
            config_json: config_json.as_deref(),
        };
        let svg = kymotrace_export::to_svg(
            session.current_path().as_ref(),
            &finalized,
            dimensions,
            &metadata,
        );
        match std::fs::write(svg_path, &svg) {
            Ok(()) => {
                eprintln!("SVG written to {} ({} bytes)", svg_path.display(), svg.len());
            }
            Err(e) => {
                eprintln!("Error writing SVG to {}: {e}", svg_path.display());
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
