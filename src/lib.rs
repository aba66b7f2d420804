//! Tools for labeled LiDAR point dumps.
//!
//! A `.bin` dump is a flat little-endian array of 5 × f32 per point
//! (x, y, z, intensity, label). This crate provides tools for:
//! - Converting directories of dumps into grayscale PLY clouds plus raw label files
//! - Copying a dump to a new path
//! - Summarizing coordinates and per-label point counts
//! - Rendering label-colored PNG panels, distribution charts and an interactive Rerun view
//!
//! # Example
//!
//! ```no_run
//! use lidar_bin_tools::config::TrailingBytes;
//! use lidar_bin_tools::core::loaders::load_bin;
//! use lidar_bin_tools::processors::summary_of;
//!
//! let scan = load_bin("000000.bin", TrailingBytes::Error).unwrap();
//! println!("{}", summary_of(&scan));
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{ConvertConfig, DecodeConfig, PlotConfig, ToolConfig, ViewerConfig};
pub use core::loaders::{LabeledScan, PointCloud};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
