//! Data writers for PLY, raw label, point record and CSV formats.
//!
//! This module provides functions for writing decoded scans to:
//! - PLY (Polygon File Format), binary little-endian or ASCII, with RGB colors
//! - Raw label files (headerless little-endian u32 arrays)
//! - Point record dumps (5 little-endian f32 per point)
//! - CSV tables of per-label point counts

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use super::loaders::{LabeledScan, PointCloud};
use super::transforms::LabelCount;
use crate::config::PlyFormat;

/// Default color for points when no colors are specified (light gray).
const DEFAULT_COLOR: [u8; 3] = [180, 180, 180];

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Point cloud colors do not line up with its coordinates.
    #[error("array length mismatch: cloud has {points} points, colors has {colors} elements")]
    LengthMismatch { points: usize, colors: usize },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Creates a buffered writer for the given path.
fn create_buffered_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(BufWriter::with_capacity(64 * 1024, file))
}

/// Maps an IO error during writing to a [`WriteError::WriteFile`] for `path`.
fn write_failed(path: &Path) -> impl Fn(std::io::Error) -> WriteError + '_ {
    move |source| WriteError::WriteFile {
        path: path.display().to_string(),
        source,
    }
}

/// Write point cloud to a PLY file with RGB colors.
///
/// The header declares one vertex element with float `x`, `y`, `z` and uchar
/// `red`, `green`, `blue` properties. If the point cloud has no colors, a
/// default light gray (180, 180, 180) is used.
///
/// # Arguments
///
/// * `path` - Output file path (parent directories will be created if needed)
/// * `cloud` - Point cloud data with coordinates and optional colors
/// * `format` - Binary little-endian or ASCII body
///
/// # Errors
///
/// Returns an error if:
/// - The cloud's color array does not match its point count
/// - Parent directories cannot be created
/// - File cannot be created or written to
///
/// # Example
///
/// ```no_run
/// use lidar_bin_tools::config::PlyFormat;
/// use lidar_bin_tools::core::loaders::PointCloud;
/// use lidar_bin_tools::core::writers::write_ply;
/// use std::path::Path;
///
/// let cloud = PointCloud::default();
/// write_ply(Path::new("output.ply"), &cloud, PlyFormat::Binary).unwrap();
/// ```
pub fn write_ply(path: &Path, cloud: &PointCloud, format: PlyFormat) -> Result<()> {
    let num_points = cloud.len();
    if let Some(colors) = &cloud.colors {
        if colors.len() != num_points {
            return Err(WriteError::LengthMismatch {
                points: num_points,
                colors: colors.len(),
            });
        }
    }

    ensure_parent_dirs(path)?;
    let mut writer = create_buffered_writer(path)?;
    let err = write_failed(path);

    let format_line = match format {
        PlyFormat::Binary => "binary_little_endian",
        PlyFormat::Ascii => "ascii",
    };

    write!(
        writer,
        "ply\nformat {} 1.0\nelement vertex {}\n\
         property float x\nproperty float y\nproperty float z\n\
         property uchar red\nproperty uchar green\nproperty uchar blue\nend_header\n",
        format_line, num_points
    )
    .map_err(&err)?;

    for i in 0..num_points {
        let [r, g, b] = cloud
            .colors
            .as_ref()
            .map(|c| c[i])
            .unwrap_or(DEFAULT_COLOR);

        match format {
            PlyFormat::Ascii => {
                writeln!(
                    writer,
                    "{:.6} {:.6} {:.6} {} {} {}",
                    cloud.x[i], cloud.y[i], cloud.z[i], r, g, b
                )
                .map_err(&err)?;
            }
            PlyFormat::Binary => {
                let mut vertex = [0u8; 15];
                vertex[0..4].copy_from_slice(&cloud.x[i].to_le_bytes());
                vertex[4..8].copy_from_slice(&cloud.y[i].to_le_bytes());
                vertex[8..12].copy_from_slice(&cloud.z[i].to_le_bytes());
                vertex[12..15].copy_from_slice(&[r, g, b]);
                writer.write_all(&vertex).map_err(&err)?;
            }
        }
    }

    writer.flush().map_err(&err)?;

    Ok(())
}

/// Write labels as a raw little-endian u32 array without a header.
///
/// The i-th value belongs to the i-th vertex of the paired point cloud.
pub fn write_label_file(path: &Path, labels: &[u32]) -> Result<()> {
    ensure_parent_dirs(path)?;
    let mut writer = create_buffered_writer(path)?;
    let err = write_failed(path);

    for label in labels {
        writer.write_all(&label.to_le_bytes()).map_err(&err)?;
    }

    writer.flush().map_err(&err)?;

    Ok(())
}

/// Write a scan back out as 5 little-endian f32 per point.
///
/// The label field is written from [`LabeledScan::raw_labels`], so a scan
/// decoded from a file re-encodes to the same bytes.
pub fn write_bin(path: &Path, scan: &LabeledScan) -> Result<()> {
    ensure_parent_dirs(path)?;
    let mut writer = create_buffered_writer(path)?;
    let err = write_failed(path);

    for i in 0..scan.len() {
        for value in scan.record(i) {
            writer.write_all(&value.to_le_bytes()).map_err(&err)?;
        }
    }

    writer.flush().map_err(&err)?;

    Ok(())
}

/// Write per-label counts to CSV.
///
/// Creates a CSV file with headers "label,count,percentage", one row per
/// label in the order given.
pub fn write_label_counts_csv(path: &Path, counts: &[LabelCount]) -> Result<()> {
    ensure_parent_dirs(path)?;

    let buf_writer = create_buffered_writer(path)?;
    let mut csv_writer = csv::Writer::from_writer(buf_writer);

    let path_str = path.display().to_string();

    csv_writer
        .write_record(["label", "count", "percentage"])
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for row in counts {
        csv_writer
            .write_record(&[
                row.label.to_string(),
                row.count.to_string(),
                format!("{:.2}", row.percentage),
            ])
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}
