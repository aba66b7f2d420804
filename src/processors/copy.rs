//! Copy a point record dump to a new path.

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::TrailingBytes;
use crate::core::loaders::load_bin;
use crate::core::writers::write_bin;

/// Decode `input` as point records and write them unchanged to `output`.
///
/// Parent directories of `output` are created. For any file accepted by the
/// decoder the output bytes equal the input bytes.
///
/// # Returns
///
/// The number of points copied.
pub fn copy_bin(input: &Path, output: &Path, policy: TrailingBytes) -> Result<usize> {
    let scan = load_bin(input, policy)
        .with_context(|| format!("Failed to decode {}", input.display()))?;

    write_bin(output, &scan)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    log::info!(
        "copied {} points: {} -> {}",
        scan.len(),
        input.display(),
        output.display()
    );

    Ok(scan.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_copy_bin_is_byte_exact() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("simulated_output.bin");
        let output = temp_dir.path().join("renamed").join("001401.bin");

        let bytes: Vec<u8> = (0..4)
            .flat_map(|i| {
                [i as f32 * 1.5, -(i as f32), 0.25, 40.0 + i as f32, (i % 2) as f32]
            })
            .flat_map(|v| v.to_le_bytes())
            .collect();
        fs::write(&input, &bytes).unwrap();

        let points = copy_bin(&input, &output, TrailingBytes::Error).unwrap();

        assert_eq!(points, 4);
        assert_eq!(fs::read(&output).unwrap(), bytes);
    }

    #[test]
    fn test_copy_bin_rejects_malformed_length() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("bad.bin");
        let output = temp_dir.path().join("out.bin");
        fs::write(&input, [0u8; 30]).unwrap();

        assert!(copy_bin(&input, &output, TrailingBytes::Error).is_err());
        assert!(!output.exists());
    }

    #[test]
    fn test_copy_bin_missing_input() {
        let temp_dir = TempDir::new().unwrap();
        let result = copy_bin(
            &temp_dir.path().join("missing.bin"),
            &temp_dir.path().join("out.bin"),
            TrailingBytes::Error,
        );
        assert!(result.is_err());
    }
}
