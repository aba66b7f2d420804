//! Visualization tools for labeled scans.
//!
//! Static rendering goes through plotters into PNG files: a 2×2 panel figure
//! (3D scatter, top view, side view, per-label intensity histograms) and a
//! label distribution bar chart. Interactive viewing is handled by
//! [`viewer`] through Rerun.

pub mod palette;
pub mod viewer;

use std::collections::HashSet;
use std::ops::Range;
use std::path::{Path, PathBuf};

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::config::{PlotConfig, ToolConfig};
use crate::core::loaders::LabeledScan;
use crate::core::transforms::{filter_by_labels, subsample_scan, unique_labels, AxisRange};
use crate::processors::analysis::{group_thousands, LabelReport};

use palette::LabelPalette;
use viewer::{label_layers, view_labeled_scan, LabelLayer, ViewerSink};

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("Empty scan: nothing to render")]
    EmptyScan,

    #[error("Viewer error: {0}")]
    Viewer(#[from] rerun::RecordingStreamError),
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Target of a render call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Renderer {
    /// Write the 2×2 panel figure to a PNG file.
    Panels(PathBuf),
    /// Send the scan to the interactive viewer.
    Viewer(ViewerSink),
}

/// Render a scan colored by label.
pub fn render(scan: &LabeledScan, renderer: &Renderer, config: &ToolConfig) -> Result<()> {
    match renderer {
        Renderer::Panels(path) => plot_label_panels(path, scan, &config.plot),
        Renderer::Viewer(sink) => view_labeled_scan(scan, sink, &config.viewer),
    }
}

/// Render only the points whose label is in `targets`.
///
/// Returns `Ok(false)` without rendering anything if no point carries one of
/// the requested labels.
pub fn render_labels(
    scan: &LabeledScan,
    targets: &HashSet<u32>,
    renderer: &Renderer,
    config: &ToolConfig,
) -> Result<bool> {
    let subset = filter_by_labels(scan, targets);

    if subset.is_empty() {
        let mut requested: Vec<u32> = targets.iter().copied().collect();
        requested.sort_unstable();
        println!("No points found for labels {:?}", requested);
        return Ok(false);
    }

    log::info!(
        "kept {} of {} points for labels {:?}",
        subset.len(),
        scan.len(),
        unique_labels(&subset.labels)
    );

    render(&subset, renderer, config)?;
    Ok(true)
}

/// Plot a labeled scan as a 2×2 panel figure and save it as PNG.
///
/// Panels: 3D scatter, top view (x, y), side view (x, z) and overlaid
/// per-label intensity histograms. Scatter panels draw at most
/// `config.max_points` points; histograms always use every point.
pub fn plot_label_panels(output_path: &Path, scan: &LabeledScan, config: &PlotConfig) -> Result<()> {
    if scan.is_empty() {
        return Err(VisualizationError::EmptyScan);
    }

    ensure_output_dir(output_path)?;

    let palette = LabelPalette::for_labels(&unique_labels(&scan.labels));

    let (shown, stride) = subsample_scan(scan, config.max_points);
    if stride > 1 {
        log::info!(
            "drawing {} of {} points in scatter panels",
            shown.len(),
            scan.len()
        );
    }
    let layers = label_layers(&shown, &palette);

    let x_range = padded_range(AxisRange::of(&shown.x));
    let y_range = padded_range(AxisRange::of(&shown.y));
    let z_range = padded_range(AxisRange::of(&shown.z));

    let root = BitMapBackend::new(output_path, (config.width, config.height)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let panels = root.split_evenly((2, 2));

    draw_scatter_3d(
        &panels[0],
        &layers,
        (x_range.clone(), y_range.clone(), z_range.clone()),
        config.point_size,
    )?;

    let (top_x, top_y) = equal_aspect(x_range.clone(), y_range);
    draw_projection(
        &panels[1],
        "Top view (X-Y)",
        &layers,
        (top_x, top_y),
        |p| (p[0], p[1]),
        config.point_size,
    )?;

    let (side_x, side_z) = equal_aspect(x_range, z_range);
    draw_projection(
        &panels[2],
        "Side view (X-Z)",
        &layers,
        (side_x, side_z),
        |p| (p[0], p[2]),
        config.point_size,
    )?;

    draw_intensity_histograms(&panels[3], scan, &palette, config.histogram_bins)?;

    root.present()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    log::info!("saved label panels to {}", output_path.display());
    Ok(())
}

/// Plot the per-label point counts as a bar chart and save it as PNG.
///
/// Each bar is drawn in its label's palette color with the count printed
/// above it.
pub fn plot_label_distribution(
    output_path: &Path,
    report: &LabelReport,
    config: &PlotConfig,
) -> Result<()> {
    if report.counts.is_empty() {
        return Err(VisualizationError::EmptyScan);
    }

    ensure_output_dir(output_path)?;

    let labels: Vec<u32> = report.counts.iter().map(|c| c.label).collect();
    let palette = LabelPalette::for_labels(&labels);
    let n = labels.len();
    let max_count = report.max_count() as f64;
    let top = max_count * 1.1;

    let root = BitMapBackend::new(output_path, (config.width, config.height / 2 + 200))
        .into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Label distribution", ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d((0usize..n).into_segmented(), 0f64..top)
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let label_of = |v: &SegmentValue<usize>| match v {
        SegmentValue::CenterOf(i) | SegmentValue::Exact(i) => labels
            .get(*i)
            .map(|l| l.to_string())
            .unwrap_or_default(),
        SegmentValue::Last => String::new(),
    };
    let count_of = |v: &f64| group_thousands(*v as usize);

    chart
        .configure_mesh()
        .disable_x_mesh()
        .light_line_style(BLACK.mix(0.3))
        .x_labels(n)
        .x_label_formatter(&label_of)
        .y_label_formatter(&count_of)
        .x_desc("Label")
        .y_desc("Points")
        .draw()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .draw_series(report.counts.iter().enumerate().map(|(i, row)| {
            let [r, g, b] = palette.color_of(row.label);
            let mut bar = Rectangle::new(
                [
                    (SegmentValue::Exact(i), 0.0),
                    (SegmentValue::Exact(i + 1), row.count as f64),
                ],
                RGBColor(r, g, b).filled(),
            );
            bar.set_margin(0, 0, 6, 6);
            bar
        }))
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let text_style = TextStyle::from(("sans-serif", 14).into_font())
        .pos(Pos::new(HPos::Center, VPos::Bottom));

    chart
        .draw_series(report.counts.iter().enumerate().map(|(i, row)| {
            Text::new(
                group_thousands(row.count),
                (
                    SegmentValue::CenterOf(i),
                    row.count as f64 + max_count * 0.01,
                ),
                text_style.clone(),
            )
        }))
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    root.present()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    log::info!("saved label distribution chart to {}", output_path.display());
    Ok(())
}

fn ensure_output_dir(output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn rgb(color: [u8; 3]) -> RGBColor {
    RGBColor(color[0], color[1], color[2])
}

/// 3D scatter with the vertical axis carrying z.
fn draw_scatter_3d<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    layers: &[LabelLayer],
    (x_range, y_range, z_range): (Range<f32>, Range<f32>, Range<f32>),
    point_size: u32,
) -> Result<()> {
    let mut chart = ChartBuilder::on(area)
        .caption("3D view", ("sans-serif", 20))
        .margin(10)
        .build_cartesian_3d(x_range, z_range, y_range)
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart.with_projection(|mut pb| {
        pb.yaw = 0.6;
        pb.pitch = 0.35;
        pb.scale = 0.85;
        pb.into_matrix()
    });

    chart
        .configure_axes()
        .light_grid_style(BLACK.mix(0.1))
        .max_light_lines(3)
        .draw()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    for layer in layers {
        let color = rgb(layer.color);
        chart
            .draw_series(
                layer
                    .positions
                    .iter()
                    .map(|p| Circle::new((p[0], p[2], p[1]), point_size, color.filled())),
            )
            .map_err(|e| VisualizationError::PlottingError(e.to_string()))?
            .label(format!("Label {}", layer.label))
            .legend(move |(x, y)| Circle::new((x, y), 4, color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    Ok(())
}

/// 2D scatter of one projection of every label layer.
fn draw_projection<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    caption: &str,
    layers: &[LabelLayer],
    (h_range, v_range): (Range<f32>, Range<f32>),
    project: impl Fn(&[f32; 3]) -> (f32, f32),
    point_size: u32,
) -> Result<()> {
    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(h_range, v_range)
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .draw()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    for layer in layers {
        let color = rgb(layer.color);
        chart
            .draw_series(layer.positions.iter().map(|p| {
                let (h, v) = project(p);
                Circle::new((h, v), point_size, color.filled())
            }))
            .map_err(|e| VisualizationError::PlottingError(e.to_string()))?
            .label(format!("Label {}", layer.label))
            .legend(move |(x, y)| Circle::new((x, y), 4, color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    Ok(())
}

/// Overlaid intensity histograms, one per label.
///
/// Every label is binned over the scan-wide intensity range so bars line up
/// across labels.
fn draw_intensity_histograms<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    scan: &LabeledScan,
    palette: &LabelPalette,
    bins: usize,
) -> Result<()> {
    let bins = bins.max(1);
    let range = AxisRange::of(&scan.intensity).unwrap_or(AxisRange { min: 0.0, max: 1.0 });
    let (lo, hi) = if range.span() > f32::EPSILON {
        (range.min, range.max)
    } else {
        (range.min - 0.5, range.max + 0.5)
    };
    let width = (hi - lo) / bins as f32;

    let histograms: Vec<(u32, Vec<usize>)> = palette
        .iter()
        .map(|(label, _)| {
            let values: Vec<f32> = (0..scan.len())
                .filter(|&i| scan.labels[i] == label)
                .map(|i| scan.intensity[i])
                .collect();
            (label, bin_counts(&values, lo, hi, bins))
        })
        .collect();

    let tallest = histograms
        .iter()
        .flat_map(|(_, counts)| counts.iter().copied())
        .max()
        .unwrap_or(0)
        .max(1);

    let mut chart = ChartBuilder::on(area)
        .caption("Intensity by label", ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(lo..hi, 0f32..(tallest as f32 * 1.1))
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Intensity")
        .y_desc("Points")
        .draw()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    for (label, counts) in &histograms {
        let color = rgb(palette.color_of(*label));
        chart
            .draw_series(counts.iter().enumerate().filter(|(_, c)| **c > 0).map(|(b, &c)| {
                let x0 = lo + b as f32 * width;
                Rectangle::new([(x0, 0.0), (x0 + width, c as f32)], color.mix(0.7).filled())
            }))
            .map_err(|e| VisualizationError::PlottingError(e.to_string()))?
            .label(format!("Label {}", label))
            .legend(move |(x, y)| Circle::new((x, y), 4, color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    Ok(())
}

/// Count finite `values` into `bins` equal-width bins over `[lo, hi]`.
///
/// The last bin is closed so `hi` itself lands in it.
fn bin_counts(values: &[f32], lo: f32, hi: f32, bins: usize) -> Vec<usize> {
    let mut counts = vec![0usize; bins];
    let span = hi - lo;

    for &v in values.iter().filter(|v| v.is_finite()) {
        let slot = if span > 0.0 {
            (((v - lo) / span) * bins as f32).floor().max(0.0) as usize
        } else {
            0
        };
        counts[slot.min(bins - 1)] += 1;
    }

    counts
}

/// Axis range padded by 5% on each side; a degenerate range is widened by 1.
fn padded_range(range: Option<AxisRange>) -> Range<f32> {
    let Some(range) = range else {
        return -1.0..1.0;
    };

    let (mut min, mut max) = (range.min, range.max);
    if (max - min).abs() < f32::EPSILON {
        min -= 1.0;
        max += 1.0;
    }

    let padding = (max - min) * 0.05;
    (min - padding)..(max + padding)
}

/// Grow the shorter of two ranges around its center so both have equal span.
fn equal_aspect(a: Range<f32>, b: Range<f32>) -> (Range<f32>, Range<f32>) {
    let span = (a.end - a.start).max(b.end - b.start);
    let widen = |r: Range<f32>| {
        let center = (r.start + r.end) / 2.0;
        (center - span / 2.0)..(center + span / 2.0)
    };
    (widen(a), widen(b))
}
