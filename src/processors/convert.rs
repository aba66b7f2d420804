//! Batch conversion of `.bin` dumps into PLY point clouds and raw label files.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use thiserror::Error;

use crate::config::ToolConfig;
use crate::core::loaders::load_bin;
use crate::core::transforms::intensity_cloud;
use crate::core::writers::{write_label_file, write_ply};

/// Errors that can occur during batch conversion.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Input directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to list directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Input file has no usable name: {0}")]
    InvalidFileName(PathBuf),
}

/// Files written for one converted input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedFile {
    pub source: PathBuf,
    pub ply_path: PathBuf,
    pub label_path: PathBuf,
    pub points: usize,
}

/// List the files in `dir` whose name ends in `.{extension}`, sorted by name.
///
/// # Errors
///
/// Returns an error if `dir` does not exist or cannot be listed.
pub fn find_bin_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ConvertError::DirectoryNotFound(dir.to_path_buf()).into());
    }

    let suffix = format!(".{}", extension);
    let entries = fs::read_dir(dir).map_err(|source| ConvertError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.ends_with(&suffix))
                .unwrap_or(false)
        })
        .collect();

    files.sort();
    Ok(files)
}

/// Convert a single `.bin` file into `<stem>.ply` and `<stem>.label`.
///
/// Intensity is normalized by the file's own min and max and written as a
/// grayscale color; labels are written as raw u32 in point order.
///
/// # Arguments
///
/// * `input` - Path to the `.bin` file
/// * `ply_dir` - Output directory for the PLY file
/// * `label_dir` - Output directory for the label file
/// * `config` - Tool configuration (decode policy, epsilon, PLY encoding)
pub fn convert_single_bin(
    input: &Path,
    ply_dir: &Path,
    label_dir: &Path,
    config: &ToolConfig,
) -> Result<ConvertedFile> {
    let stem = input
        .file_stem()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConvertError::InvalidFileName(input.to_path_buf()))?
        .to_string_lossy()
        .into_owned();

    let scan = load_bin(input, config.decode.trailing_bytes)
        .with_context(|| format!("Failed to decode {}", input.display()))?;

    let cloud = intensity_cloud(&scan, config.convert.epsilon);

    let ply_path = ply_dir.join(format!("{}.ply", stem));
    write_ply(&ply_path, &cloud, config.convert.ply_format)?;

    let label_path = label_dir.join(format!("{}.label", stem));
    write_label_file(&label_path, &scan.labels)?;

    Ok(ConvertedFile {
        source: input.to_path_buf(),
        ply_path,
        label_path,
        points: scan.len(),
    })
}

/// Convert every `.bin` file in `input_dir`.
///
/// Output directories are created before the input directory is listed.
/// Files are processed one at a time in name order and the first failure
/// aborts the batch. One line per converted file is printed above `progress`.
pub fn convert_directory(
    input_dir: &Path,
    ply_dir: &Path,
    label_dir: &Path,
    config: &ToolConfig,
    progress: &ProgressBar,
) -> Result<Vec<ConvertedFile>> {
    for dir in [ply_dir, label_dir] {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }

    let inputs = find_bin_files(input_dir, &config.convert.extension)?;
    log::info!(
        "{}: {} .{} files to convert",
        input_dir.display(),
        inputs.len(),
        config.convert.extension
    );

    progress.set_length(inputs.len() as u64);

    let mut converted = Vec::with_capacity(inputs.len());
    for input in &inputs {
        let outcome = convert_single_bin(input, ply_dir, label_dir, config)?;

        let name = input.file_name().unwrap_or_default().to_string_lossy();
        let stem = input.file_stem().unwrap_or_default().to_string_lossy();
        progress.suspend(|| {
            println!("Processed {} -> {}.ply + {}.label", name, stem, stem);
        });
        log::debug!("{}: {} points", name, outcome.points);
        progress.inc(1);

        converted.push(outcome);
    }

    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PlyFormat, TrailingBytes};
    use crate::core::loaders::{load_label_file, load_ply};
    use std::io::Write;
    use tempfile::TempDir;

    fn create_bin(dir: &Path, name: &str, records: &[[f32; 5]]) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        for record in records {
            for value in record {
                file.write_all(&value.to_le_bytes()).unwrap();
            }
        }
        path
    }

    fn example_records() -> Vec<[f32; 5]> {
        vec![
            [0.0, 0.0, 0.0, 5.0, 1.0],
            [1.0, 1.0, 1.0, 10.0, 2.0],
            [2.0, 2.0, 2.0, 15.0, 1.0],
        ]
    }

    #[test]
    fn test_find_bin_files() {
        let temp_dir = TempDir::new().unwrap();
        create_bin(temp_dir.path(), "b.bin", &[]);
        create_bin(temp_dir.path(), "a.bin", &[]);
        create_bin(temp_dir.path(), "notes.txt", &[]);
        create_bin(temp_dir.path(), "upper.BIN", &[]);
        fs::create_dir(temp_dir.path().join("dir.bin")).unwrap();

        let files = find_bin_files(temp_dir.path(), "bin").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["a.bin", "b.bin"]);
    }

    #[test]
    fn test_find_bin_files_missing_dir() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");

        let err = find_bin_files(&missing, "bin").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConvertError>(),
            Some(ConvertError::DirectoryNotFound(_))
        ));
    }

    #[test]
    fn test_convert_single_bin() {
        let temp_dir = TempDir::new().unwrap();
        let input = create_bin(temp_dir.path(), "000001.bin", &example_records());
        let ply_dir = temp_dir.path().join("ply");
        let label_dir = temp_dir.path().join("label");

        let outcome =
            convert_single_bin(&input, &ply_dir, &label_dir, &ToolConfig::default()).unwrap();

        assert_eq!(outcome.points, 3);
        assert_eq!(outcome.ply_path, ply_dir.join("000001.ply"));
        assert_eq!(outcome.label_path, label_dir.join("000001.label"));

        let labels = load_label_file(&outcome.label_path).unwrap();
        assert_eq!(labels, vec![1, 2, 1]);

        let cloud = load_ply(&outcome.ply_path).unwrap();
        assert_eq!(cloud.len(), labels.len());
        assert_eq!(cloud.x, vec![0.0, 1.0, 2.0]);

        let colors = cloud.colors.unwrap();
        assert_eq!(colors[0], [0, 0, 0]);
        assert_eq!(colors[1], [128, 128, 128]);
        assert_eq!(colors[2], [255, 255, 255]);
    }

    #[test]
    fn test_convert_single_bin_ascii_ply() {
        let temp_dir = TempDir::new().unwrap();
        let input = create_bin(temp_dir.path(), "scan.bin", &example_records());

        let mut config = ToolConfig::default();
        config.convert.ply_format = PlyFormat::Ascii;

        let outcome =
            convert_single_bin(&input, temp_dir.path(), temp_dir.path(), &config).unwrap();

        let content = fs::read_to_string(&outcome.ply_path).unwrap();
        assert!(content.starts_with("ply\nformat ascii 1.0\nelement vertex 3\n"));
    }

    #[test]
    fn test_convert_constant_intensity() {
        let temp_dir = TempDir::new().unwrap();
        let input = create_bin(
            temp_dir.path(),
            "flat.bin",
            &[[0.0, 0.0, 0.0, 7.0, 0.0], [1.0, 0.0, 0.0, 7.0, 3.0]],
        );

        let outcome = convert_single_bin(
            &input,
            temp_dir.path(),
            temp_dir.path(),
            &ToolConfig::default(),
        )
        .unwrap();

        let cloud = load_ply(&outcome.ply_path).unwrap();
        assert_eq!(cloud.colors.unwrap(), vec![[0, 0, 0]; 2]);
    }

    #[test]
    fn test_convert_directory() {
        let temp_dir = TempDir::new().unwrap();
        let input_dir = temp_dir.path().join("bins");
        fs::create_dir(&input_dir).unwrap();
        create_bin(&input_dir, "001.bin", &example_records());
        create_bin(&input_dir, "002.bin", &example_records()[..1]);
        create_bin(&input_dir, "readme.md", &[]);

        let ply_dir = temp_dir.path().join("out").join("ply");
        let label_dir = temp_dir.path().join("out").join("label");

        let converted = convert_directory(
            &input_dir,
            &ply_dir,
            &label_dir,
            &ToolConfig::default(),
            &ProgressBar::hidden(),
        )
        .unwrap();

        assert_eq!(converted.len(), 2);
        assert_eq!(converted[1].points, 1);
        assert!(ply_dir.join("001.ply").exists());
        assert!(label_dir.join("002.label").exists());
        assert!(!ply_dir.join("readme.ply").exists());
    }

    #[test]
    fn test_convert_directory_aborts_on_malformed_file() {
        let temp_dir = TempDir::new().unwrap();
        let input_dir = temp_dir.path().join("bins");
        fs::create_dir(&input_dir).unwrap();
        create_bin(&input_dir, "001.bin", &example_records());
        fs::write(input_dir.join("002.bin"), [0u8; 7]).unwrap();
        create_bin(&input_dir, "003.bin", &example_records());

        let ply_dir = temp_dir.path().join("ply");
        let label_dir = temp_dir.path().join("label");

        let result = convert_directory(
            &input_dir,
            &ply_dir,
            &label_dir,
            &ToolConfig::default(),
            &ProgressBar::hidden(),
        );

        assert!(result.is_err());
        assert!(ply_dir.join("001.ply").exists());
        assert!(!ply_dir.join("003.ply").exists());
    }

    #[test]
    fn test_convert_directory_missing_input_creates_outputs() {
        let temp_dir = TempDir::new().unwrap();
        let ply_dir = temp_dir.path().join("out").join("ply");
        let label_dir = temp_dir.path().join("out").join("label");

        let result = convert_directory(
            &temp_dir.path().join("missing"),
            &ply_dir,
            &label_dir,
            &ToolConfig::default(),
            &ProgressBar::hidden(),
        );

        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConvertError>(),
            Some(ConvertError::DirectoryNotFound(_))
        ));
        assert!(ply_dir.is_dir());
        assert!(label_dir.is_dir());
    }

    #[test]
    fn test_convert_truncate_policy() {
        let temp_dir = TempDir::new().unwrap();
        let input = create_bin(temp_dir.path(), "scan.bin", &example_records());
        let mut bytes = fs::read(&input).unwrap();
        bytes.extend_from_slice(&[9, 9]);
        fs::write(&input, bytes).unwrap();

        let mut config = ToolConfig::default();
        config.decode.trailing_bytes = TrailingBytes::Truncate;

        let outcome =
            convert_single_bin(&input, temp_dir.path(), temp_dir.path(), &config).unwrap();
        assert_eq!(outcome.points, 3);
    }
}
