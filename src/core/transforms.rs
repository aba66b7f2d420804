//! Per-point transforms over decoded scans.
//!
//! This module provides intensity normalization, grayscale color mapping,
//! label statistics, label-subset filtering and subsampling. Element-wise
//! maps are parallelized using Rayon.

use std::collections::{BTreeMap, HashSet};

use rayon::prelude::*;

use super::loaders::{LabeledScan, PointCloud};

/// Offset added to the intensity range so a constant array does not divide by zero.
pub const DEFAULT_EPSILON: f32 = 1e-5;

/// Minimum and maximum of one coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisRange {
    pub min: f32,
    pub max: f32,
}

impl AxisRange {
    /// Computes the range of `values`, or `None` if there are no finite values.
    pub fn of(values: &[f32]) -> Option<Self> {
        let (min, max) = values
            .iter()
            .filter(|v| v.is_finite())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        (min <= max).then_some(Self { min, max })
    }

    /// Returns `max - min`.
    #[inline]
    pub fn span(&self) -> f32 {
        self.max - self.min
    }
}

/// Point count for one label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelCount {
    pub label: u32,
    pub count: usize,
    /// Share of all points, in percent.
    pub percentage: f64,
}

/// Rescale intensity linearly using the array's own min and max.
///
/// Computes `(v - min) / (max - min + epsilon)` for every value. No clamping
/// is applied; a constant array maps to all zeros.
///
/// # Arguments
///
/// * `values` - Raw intensity values
/// * `epsilon` - Offset added to the range before dividing
///
/// # Returns
///
/// Normalized values in the same order, each in `[0, 1)` for finite input.
pub fn normalize_intensity(values: &[f32], epsilon: f32) -> Vec<f32> {
    let Some(range) = AxisRange::of(values) else {
        return vec![0.0; values.len()];
    };

    let denom = range.span() + epsilon;
    values
        .par_iter()
        .map(|&v| (v - range.min) / denom)
        .collect()
}

/// Map normalized values to grayscale RGB colors.
///
/// Each value in `[0, 1]` is scaled to `0..=255`, rounded and repeated on
/// all three channels. Out-of-range values are clamped.
pub fn grayscale_colors(normalized: &[f32]) -> Vec<[u8; 3]> {
    normalized
        .par_iter()
        .map(|&v| {
            let level = (v * 255.0).round().clamp(0.0, 255.0) as u8;
            [level, level, level]
        })
        .collect()
}

/// Build the intensity-shaded point cloud written by the converter.
pub fn intensity_cloud(scan: &LabeledScan, epsilon: f32) -> PointCloud {
    let normalized = normalize_intensity(&scan.intensity, epsilon);
    let colors = grayscale_colors(&normalized);

    PointCloud::from_xyz_colors(scan.x.clone(), scan.y.clone(), scan.z.clone(), colors)
}

/// Distinct label values in ascending order.
pub fn unique_labels(labels: &[u32]) -> Vec<u32> {
    let mut unique = labels.to_vec();
    unique.sort_unstable();
    unique.dedup();
    unique
}

/// Count points per distinct label, ascending by label.
///
/// Percentages are relative to `labels.len()`; an empty input yields an
/// empty table.
pub fn label_distribution(labels: &[u32]) -> Vec<LabelCount> {
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for &label in labels {
        *counts.entry(label).or_insert(0) += 1;
    }

    let total = labels.len() as f64;
    counts
        .into_iter()
        .map(|(label, count)| LabelCount {
            label,
            count,
            percentage: count as f64 / total * 100.0,
        })
        .collect()
}

/// Keep only the points whose label is in `targets`, preserving order.
pub fn filter_by_labels(scan: &LabeledScan, targets: &HashSet<u32>) -> LabeledScan {
    let keep: Vec<usize> = (0..scan.len())
        .filter(|&i| targets.contains(&scan.labels[i]))
        .collect();

    select(scan, &keep)
}

/// Copy the points at `indices` (in the order given) into a new scan.
fn select(scan: &LabeledScan, indices: &[usize]) -> LabeledScan {
    let mut out = LabeledScan::with_capacity(indices.len());
    for &i in indices {
        out.push_record(scan.record(i));
    }
    out
}

/// Randomly subsample a scan to a maximum number of points.
///
/// If the scan has `max_points` points or fewer it is returned unchanged with
/// stride factor 1. Kept points stay in their original order.
///
/// # Returns
///
/// Tuple of (subsampled_scan, stride_factor) where stride_factor is the
/// approximate reduction ratio (ceiling of n/max_points)
pub fn subsample_scan(scan: &LabeledScan, max_points: usize) -> (LabeledScan, usize) {
    let n = scan.len();

    if n <= max_points {
        return (scan.clone(), 1);
    }

    let stride_factor = n.div_ceil(max_points.max(1));

    let mut indices: Vec<usize> = (0..n).collect();

    // Partial Fisher-Yates with a fixed-seed LCG so plots are reproducible.
    let mut state: u64 = 12345;
    for i in 0..max_points {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let j = i + ((state >> 33) as usize) % (n - i);
        indices.swap(i, j);
    }

    indices.truncate(max_points);
    indices.sort_unstable();

    (select(scan, &indices), stride_factor)
}
