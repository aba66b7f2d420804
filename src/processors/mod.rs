//! Data processing modules.

pub mod analysis;
pub mod convert;
pub mod copy;

// Re-export key types for convenience
pub use analysis::{group_thousands, summary_of, LabelReport, ScanSummary};
pub use convert::{convert_directory, convert_single_bin, find_bin_files, ConvertError, ConvertedFile};
pub use copy::copy_bin;
