//! Configuration types for the LiDAR bin tools.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// What to do with a file whose length is not a multiple of the record stride.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailingBytes {
    /// Refuse to decode the file.
    #[default]
    Error,
    /// Drop the partial trailing record and keep going.
    Truncate,
}

/// Encoding used for PLY output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlyFormat {
    #[default]
    Binary,
    Ascii,
}

/// Configuration for decoding `.bin` point records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecodeConfig {
    /// Policy for files with a partial trailing record
    #[serde(default)]
    pub trailing_bytes: TrailingBytes,
}

/// Configuration for the bin → PLY/label converter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Offset added to the intensity range before dividing
    #[serde(default = "default_epsilon")]
    pub epsilon: f32,

    /// File extension (without dot) of the inputs to convert
    #[serde(default = "default_extension")]
    pub extension: String,

    /// PLY encoding for the written point clouds
    #[serde(default)]
    pub ply_format: PlyFormat,
}

fn default_epsilon() -> f32 {
    1e-5
}

fn default_extension() -> String {
    "bin".to_string()
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            epsilon: default_epsilon(),
            extension: default_extension(),
            ply_format: PlyFormat::default(),
        }
    }
}

/// Configuration for PNG rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotConfig {
    /// Image width in pixels
    #[serde(default = "default_plot_width")]
    pub width: u32,

    /// Image height in pixels
    #[serde(default = "default_plot_height")]
    pub height: u32,

    /// Marker radius in pixels
    #[serde(default = "default_point_size")]
    pub point_size: u32,

    /// Number of bins in the intensity histogram
    #[serde(default = "default_histogram_bins")]
    pub histogram_bins: usize,

    /// Maximum number of points drawn per panel
    #[serde(default = "default_plot_max_points")]
    pub max_points: usize,
}

fn default_plot_width() -> u32 {
    1500
}

fn default_plot_height() -> u32 {
    1200
}

fn default_point_size() -> u32 {
    1
}

fn default_histogram_bins() -> usize {
    50
}

fn default_plot_max_points() -> usize {
    1_000_000
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: default_plot_width(),
            height: default_plot_height(),
            point_size: default_point_size(),
            histogram_bins: default_histogram_bins(),
            max_points: default_plot_max_points(),
        }
    }
}

/// Configuration for the interactive Rerun viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerConfig {
    /// Application id the recording is registered under
    #[serde(default = "default_application_id")]
    pub application_id: String,

    /// Entity path the per-label point layers are logged under
    #[serde(default = "default_entity_root")]
    pub entity_root: String,

    /// Point radius in scene units
    #[serde(default = "default_point_radius")]
    pub point_radius: f32,
}

fn default_application_id() -> String {
    "lidar_bin_tools".to_string()
}

fn default_entity_root() -> String {
    "lidar_point_cloud".to_string()
}

fn default_point_radius() -> f32 {
    0.05
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            application_id: default_application_id(),
            entity_root: default_entity_root(),
            point_radius: default_point_radius(),
        }
    }
}

/// Top-level configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolConfig {
    #[serde(default)]
    pub decode: DecodeConfig,

    #[serde(default)]
    pub convert: ConvertConfig,

    #[serde(default)]
    pub plot: PlotConfig,

    #[serde(default)]
    pub viewer: ViewerConfig,
}

impl ToolConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: ToolConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_tool_config() {
        let config = ToolConfig::default();
        assert_eq!(config.decode.trailing_bytes, TrailingBytes::Error);
        assert_eq!(config.convert.extension, "bin");
        assert_eq!(config.convert.ply_format, PlyFormat::Binary);
        assert!((config.convert.epsilon - 1e-5).abs() < f32::EPSILON);
        assert_eq!(config.plot.histogram_bins, 50);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "decode:\n  trailing_bytes: truncate\nplot:\n  width: 800\n";
        let config: ToolConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.decode.trailing_bytes, TrailingBytes::Truncate);
        assert_eq!(config.plot.width, 800);
        assert_eq!(config.plot.height, 1200);
        assert_eq!(config.viewer.application_id, "lidar_bin_tools");
    }

    #[test]
    fn test_yaml_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tools.yaml");

        let mut config = ToolConfig::default();
        config.convert.ply_format = PlyFormat::Ascii;
        config.to_yaml(&path).unwrap();

        let loaded = ToolConfig::from_yaml(&path).unwrap();
        assert_eq!(loaded.convert.ply_format, PlyFormat::Ascii);
    }
}
