//! Interactive 3D viewing of labeled scans through Rerun.

use std::path::PathBuf;

use crate::config::ViewerConfig;
use crate::core::loaders::LabeledScan;
use crate::core::transforms::unique_labels;

use super::palette::LabelPalette;
use super::{Result, VisualizationError};

/// Where the recording is sent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewerSink {
    /// Start a new Rerun Viewer process and stream to it.
    #[default]
    Spawn,
    /// Write an `.rrd` recording to open later.
    Save(PathBuf),
}

/// Points of one label with the color they are drawn in.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelLayer {
    pub label: u32,
    pub color: [u8; 3],
    pub positions: Vec<[f32; 3]>,
}

/// Split a scan into one layer per distinct label, ascending by label.
///
/// Points keep their relative order within each layer.
pub fn label_layers(scan: &LabeledScan, palette: &LabelPalette) -> Vec<LabelLayer> {
    let mut layers: Vec<LabelLayer> = palette
        .iter()
        .map(|(label, color)| LabelLayer {
            label,
            color,
            positions: Vec::new(),
        })
        .collect();

    for i in 0..scan.len() {
        let label = scan.labels[i];
        if let Ok(slot) = layers.binary_search_by_key(&label, |l| l.label) {
            layers[slot].positions.push([scan.x[i], scan.y[i], scan.z[i]]);
        }
    }

    layers.retain(|l| !l.positions.is_empty());
    layers
}

/// Show a labeled scan in the Rerun viewer.
///
/// Each label is logged as its own entity under `config.entity_root`, so the
/// viewer's blueprint panel lists and toggles labels individually. Returns
/// once every layer has been flushed to the sink.
pub fn view_labeled_scan(scan: &LabeledScan, sink: &ViewerSink, config: &ViewerConfig) -> Result<()> {
    if scan.is_empty() {
        return Err(VisualizationError::EmptyScan);
    }

    let palette = LabelPalette::for_labels(&unique_labels(&scan.labels));
    let layers = label_layers(scan, &palette);

    let builder = rerun::RecordingStreamBuilder::new(config.application_id.as_str());
    let rec = match sink {
        ViewerSink::Spawn => builder.spawn()?,
        ViewerSink::Save(path) => builder.save(path)?,
    };

    for layer in &layers {
        let [r, g, b] = layer.color;
        let positions = layer
            .positions
            .iter()
            .map(|&[x, y, z]| rerun::Position3D::new(x, y, z));
        let colors = vec![rerun::Color::from_rgb(r, g, b); layer.positions.len()];

        rec.log(
            format!("{}/label_{}", config.entity_root, layer.label),
            &rerun::Points3D::new(positions)
                .with_colors(colors)
                .with_radii([config.point_radius]),
        )?;

        log::debug!("label {}: logged {} points", layer.label, layer.positions.len());
    }

    rec.flush_blocking();
    log::info!(
        "sent {} points in {} label layers to the viewer",
        scan.len(),
        layers.len()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visualization::palette::TAB20;

    #[test]
    fn test_label_layers() {
        let scan = LabeledScan::from_records(&[
            [0.0, 0.0, 0.0, 5.0, 1.0],
            [1.0, 1.0, 1.0, 10.0, 2.0],
            [2.0, 2.0, 2.0, 15.0, 1.0],
        ]);
        let palette = LabelPalette::for_labels(&[1, 2]);

        let layers = label_layers(&scan, &palette);

        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].label, 1);
        assert_eq!(layers[0].color, TAB20[0]);
        assert_eq!(layers[0].positions, vec![[0.0, 0.0, 0.0], [2.0, 2.0, 2.0]]);
        assert_eq!(layers[1].positions, vec![[1.0, 1.0, 1.0]]);
    }

    #[test]
    fn test_label_layers_skip_labels_without_points() {
        let scan = LabeledScan::from_records(&[[0.0, 0.0, 0.0, 1.0, 4.0]]);
        let palette = LabelPalette::for_labels(&[3, 4]);

        let layers = label_layers(&scan, &palette);

        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].label, 4);
    }

    #[test]
    fn test_view_empty_scan_is_rejected() {
        let result = view_labeled_scan(
            &LabeledScan::new(),
            &ViewerSink::Spawn,
            &ViewerConfig::default(),
        );
        assert!(matches!(result, Err(VisualizationError::EmptyScan)));
    }
}
