//! Command-line interface for the LiDAR bin tools.

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PlyFormat;
use crate::core::loaders::{load_bin, LabeledScan};
use crate::ToolConfig;

#[derive(Parser)]
#[command(name = "lidar-bin-tools")]
#[command(about = "Convert, copy and visualize labeled LiDAR .bin point dumps", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert every .bin file in a directory to PLY + raw label files
    Convert {
        /// Directory containing .bin files
        input_dir: PathBuf,
        /// Output directory for PLY files
        ply_dir: PathBuf,
        /// Output directory for label files
        label_dir: PathBuf,
        /// Write ASCII PLY instead of binary
        #[arg(long)]
        ascii: bool,
    },

    /// Copy a .bin file to a new path, re-encoding every point record
    Copy {
        /// Source .bin file
        input: PathBuf,
        /// Destination path
        output: PathBuf,
    },

    /// Print point count, coordinate ranges and distinct labels
    Summary {
        /// Input .bin file
        bin_file: PathBuf,
    },

    /// Count points per label and plot the distribution (PNG)
    Analyze {
        /// Input .bin file
        bin_file: PathBuf,
        /// Output PNG path (defaults to <stem>_labels.png next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also write the per-label table as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Plot 3D, top, side and intensity panels colored by label (PNG)
    Plot {
        /// Input .bin file
        bin_file: PathBuf,
        /// Output PNG path (defaults to <stem>_panels.png next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Only plot these labels (comma separated)
        #[arg(short, long, value_delimiter = ',')]
        labels: Vec<u32>,
        /// Marker radius in pixels
        #[arg(long)]
        point_size: Option<u32>,
    },

    /// Open the scan in the interactive Rerun viewer
    View {
        /// Input .bin file
        bin_file: PathBuf,
        /// Only show these labels (comma separated)
        #[arg(short, long, value_delimiter = ',')]
        labels: Vec<u32>,
        /// Save an .rrd recording instead of spawning the viewer
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Label analysis, summary, panel plot and interactive view in one go
    Inspect {
        /// Input .bin file
        bin_file: PathBuf,
        /// Directory for the PNG outputs (defaults to the input's directory)
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Skip the interactive viewer
        #[arg(long)]
        no_view: bool,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Create a progress bar for per-file batch work
fn create_progress_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_message(message.to_string());
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match ToolConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                ToolConfig::default()
            }
        },
        None => ToolConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Convert { input_dir, ply_dir, label_dir, ascii } => {
            cmd_convert(&input_dir, &ply_dir, &label_dir, ascii, &config);
        }
        Commands::Copy { input, output } => {
            cmd_copy(&input, &output, &config);
        }
        Commands::Summary { bin_file } => {
            cmd_summary(&bin_file, &config);
        }
        Commands::Analyze { bin_file, output, csv } => {
            cmd_analyze(&bin_file, output, csv, &config);
        }
        Commands::Plot { bin_file, output, labels, point_size } => {
            cmd_plot(&bin_file, output, &labels, point_size, &config);
        }
        Commands::View { bin_file, labels, save } => {
            cmd_view(&bin_file, &labels, save, &config);
        }
        Commands::Inspect { bin_file, out_dir, no_view } => {
            cmd_inspect(&bin_file, out_dir, no_view, &config);
        }
    }
}

/// `<dir of input>/<stem><suffix>`
fn sibling_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "scan".to_string());
    input.with_file_name(format!("{}{}", stem, suffix))
}

/// Decode a `.bin` file behind a spinner, exiting the process on failure.
fn load_scan_or_exit(bin_file: &Path, config: &ToolConfig) -> LabeledScan {
    let spinner = create_spinner("Loading point records...");
    let result = load_bin(bin_file, config.decode.trailing_bytes);
    spinner.finish_and_clear();

    match result {
        Ok(scan) => {
            info!("Loaded {} points from {}", scan.len(), bin_file.display());
            scan
        }
        Err(e) => {
            error!("Failed to load {}: {}", bin_file.display(), e);
            std::process::exit(1);
        }
    }
}

fn cmd_convert(input_dir: &Path, ply_dir: &Path, label_dir: &Path, ascii: bool, config: &ToolConfig) {
    use crate::processors::convert;

    let start = Instant::now();

    let mut config = config.clone();
    if ascii {
        config.convert.ply_format = PlyFormat::Ascii;
    }

    println!("Converting .{} files...", config.convert.extension);
    println!("Input directory: {}", input_dir.display());
    println!("PLY directory: {}", ply_dir.display());
    println!("Label directory: {}", label_dir.display());

    let progress = create_progress_bar("Converting");

    match convert::convert_directory(input_dir, ply_dir, label_dir, &config, &progress) {
        Ok(converted) => {
            progress.finish_and_clear();

            let total_points: usize = converted.iter().map(|c| c.points).sum();
            print_summary(
                "Conversion Complete",
                &[
                    ("Input directory", input_dir.display().to_string()),
                    ("Files converted", converted.len().to_string()),
                    ("Total points", total_points.to_string()),
                    ("PLY format", format!("{:?}", config.convert.ply_format)),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            progress.abandon();
            error!("Conversion failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_copy(input: &Path, output: &Path, config: &ToolConfig) {
    use crate::processors::copy;

    let start = Instant::now();
    let spinner = create_spinner("Copying point records...");

    match copy::copy_bin(input, output, config.decode.trailing_bytes) {
        Ok(points) => {
            spinner.finish_and_clear();
            println!("Copied {} -> {}", input.display(), output.display());

            print_summary(
                "Copy Complete",
                &[
                    ("Input file", input.display().to_string()),
                    ("Output file", output.display().to_string()),
                    ("Points copied", points.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Copy failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_summary(bin_file: &Path, config: &ToolConfig) {
    use crate::processors::analysis;

    let scan = load_scan_or_exit(bin_file, config);
    println!("{}", analysis::summary_of(&scan));
}

fn cmd_analyze(bin_file: &Path, output: Option<PathBuf>, csv: Option<PathBuf>, config: &ToolConfig) {
    let start = Instant::now();

    let output_path = output.unwrap_or_else(|| sibling_path(bin_file, "_labels.png"));
    let scan = load_scan_or_exit(bin_file, config);

    match analyze_scan(&scan, &output_path, csv.as_deref(), config) {
        Ok(report) => {
            print_summary(
                "Label Analysis Complete",
                &[
                    ("Input file", bin_file.display().to_string()),
                    ("Output PNG", output_path.display().to_string()),
                    ("Points", report.total.to_string()),
                    ("Distinct labels", report.counts.len().to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            error!("Label analysis failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Print the label table, plot the bar chart and optionally export CSV.
fn analyze_scan(
    scan: &LabeledScan,
    chart_path: &Path,
    csv_path: Option<&Path>,
    config: &ToolConfig,
) -> anyhow::Result<crate::processors::LabelReport> {
    use crate::core::writers::write_label_counts_csv;
    use crate::processors::analysis::LabelReport;
    use crate::visualization;

    let report = LabelReport::from_scan(scan);
    print!("{}", report);

    let spinner = create_spinner("Plotting label distribution...");
    let plotted = visualization::plot_label_distribution(chart_path, &report, &config.plot);
    spinner.finish_and_clear();
    plotted.with_context(|| format!("Failed to plot {}", chart_path.display()))?;

    if let Some(csv_path) = csv_path {
        write_label_counts_csv(csv_path, &report.counts)?;
        info!("Wrote label table to {}", csv_path.display());
    }

    Ok(report)
}

fn cmd_plot(
    bin_file: &Path,
    output: Option<PathBuf>,
    labels: &[u32],
    point_size: Option<u32>,
    config: &ToolConfig,
) {
    use crate::visualization::Renderer;

    let start = Instant::now();

    let mut config = config.clone();
    if let Some(size) = point_size {
        config.plot.point_size = size;
    }

    let output_path = output.unwrap_or_else(|| sibling_path(bin_file, "_panels.png"));
    let scan = load_scan_or_exit(bin_file, &config);

    println!("Plotting label panels...");
    println!("Input: {}", bin_file.display());
    println!("Output: {}", output_path.display());

    let spinner = create_spinner("Rendering panels...");
    let result = render_subset(&scan, labels, &Renderer::Panels(output_path.clone()), &config);
    spinner.finish_and_clear();

    match result {
        Ok(true) => {
            print_summary(
                "Plot Complete",
                &[
                    ("Input file", bin_file.display().to_string()),
                    ("Output PNG", output_path.display().to_string()),
                    ("Points in scan", scan.len().to_string()),
                    ("Max points plotted", config.plot.max_points.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Ok(false) => {}
        Err(e) => {
            error!("Plot failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_view(bin_file: &Path, labels: &[u32], save: Option<PathBuf>, config: &ToolConfig) {
    use crate::visualization::viewer::ViewerSink;
    use crate::visualization::Renderer;

    let scan = load_scan_or_exit(bin_file, config);

    let sink = match save {
        Some(path) => ViewerSink::Save(path),
        None => ViewerSink::Spawn,
    };

    print_viewer_help(&sink);

    match render_subset(&scan, labels, &Renderer::Viewer(sink), config) {
        Ok(_) => {}
        Err(e) => {
            error!("Viewer failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_inspect(bin_file: &Path, out_dir: Option<PathBuf>, no_view: bool, config: &ToolConfig) {
    let start = Instant::now();

    match inspect_scan(bin_file, out_dir, no_view, config) {
        Ok(()) => {
            println!("Done in {:.2?}", start.elapsed());
        }
        Err(e) => {
            error!("Inspection failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Label analysis, summary, panel plot, then the interactive view.
fn inspect_scan(
    bin_file: &Path,
    out_dir: Option<PathBuf>,
    no_view: bool,
    config: &ToolConfig,
) -> anyhow::Result<()> {
    use crate::processors::analysis;
    use crate::visualization::viewer::{view_labeled_scan, ViewerSink};
    use crate::visualization::plot_label_panels;

    let scan = load_bin(bin_file, config.decode.trailing_bytes)
        .with_context(|| format!("Failed to load {}", bin_file.display()))?;

    let stem = bin_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "scan".to_string());
    let out_dir = out_dir.unwrap_or_else(|| {
        bin_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    });

    let chart_path = out_dir.join(format!("{}_labels.png", stem));
    analyze_scan(&scan, &chart_path, None, config)?;

    println!("{}", analysis::summary_of(&scan));

    let panels_path = out_dir.join(format!("{}_panels.png", stem));
    let spinner = create_spinner("Rendering panels...");
    let plotted = plot_label_panels(&panels_path, &scan, &config.plot);
    spinner.finish_and_clear();
    plotted.with_context(|| format!("Failed to plot {}", panels_path.display()))?;
    println!("Saved {} and {}", chart_path.display(), panels_path.display());

    if no_view {
        return Ok(());
    }

    print_viewer_help(&ViewerSink::Spawn);
    view_labeled_scan(&scan, &ViewerSink::Spawn, &config.viewer)
        .context("Failed to open the viewer")?;

    Ok(())
}

/// Render the whole scan, or only `labels` when any are given.
fn render_subset(
    scan: &LabeledScan,
    labels: &[u32],
    renderer: &crate::visualization::Renderer,
    config: &ToolConfig,
) -> crate::visualization::Result<bool> {
    use crate::visualization;

    if labels.is_empty() {
        visualization::render(scan, renderer, config)?;
        return Ok(true);
    }

    let targets: HashSet<u32> = labels.iter().copied().collect();
    visualization::render_labels(scan, &targets, renderer, config)
}

fn print_viewer_help(sink: &crate::visualization::viewer::ViewerSink) {
    use crate::visualization::viewer::ViewerSink;

    match sink {
        ViewerSink::Spawn => {
            println!("Opening the Rerun viewer...");
            println!("  drag to rotate, scroll to zoom, toggle labels in the entity list");
            println!("  close the viewer window to quit");
        }
        ViewerSink::Save(path) => {
            println!("Saving recording to {}", path.display());
            println!("  open it later with: rerun {}", path.display());
        }
    }
}
