//! Core data types and I/O operations.

pub mod loaders;
pub mod transforms;
pub mod writers;

pub use loaders::{LabeledScan, PointCloud};
pub use writers::{write_bin, write_label_file, write_ply, WriteError};
