//! Data loaders for LiDAR `.bin` dumps, PLY point clouds and raw label files.
//!
//! This module provides parsers for:
//! - Binary point record dumps (5 little-endian f32 per point: x, y, z, intensity, label)
//! - PLY point cloud files, ASCII or binary little-endian (with optional RGB colors)
//! - Raw label files (headerless little-endian u32 arrays)

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::TrailingBytes;

/// Number of f32 fields in one point record.
pub const RECORD_FIELDS: usize = 5;

/// Size in bytes of one point record.
pub const RECORD_BYTES: usize = RECORD_FIELDS * std::mem::size_of::<f32>();

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{len} bytes is not a multiple of the {stride}-byte point record")]
    MalformedLength { len: usize, stride: usize },

    #[error("'{path}': {len} bytes is not a multiple of the {stride}-byte point record")]
    MalformedFile {
        path: PathBuf,
        len: usize,
        stride: usize,
    },

    #[error("{len} bytes is not a multiple of 4 in label file '{path}'")]
    MalformedLabels { len: usize, path: PathBuf },

    #[error("Invalid PLY file: {0}")]
    InvalidPly(String),

    #[error("Missing required columns: {0}")]
    MissingColumns(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Decoded point records in structure-of-arrays layout.
///
/// All vectors always have the same length. `raw_labels` keeps the label
/// field exactly as stored so a scan re-encodes to identical bytes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledScan {
    pub x: Vec<f32>,
    pub y: Vec<f32>,
    pub z: Vec<f32>,
    pub intensity: Vec<f32>,
    /// Label field cast to an unsigned class id.
    pub labels: Vec<u32>,
    /// Label field as stored in the file.
    pub raw_labels: Vec<f32>,
}

impl LabeledScan {
    /// Creates a new empty scan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new scan with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            z: Vec::with_capacity(capacity),
            intensity: Vec::with_capacity(capacity),
            labels: Vec::with_capacity(capacity),
            raw_labels: Vec::with_capacity(capacity),
        }
    }

    /// Builds a scan from `[x, y, z, intensity, label]` rows.
    pub fn from_records(records: &[[f32; RECORD_FIELDS]]) -> Self {
        let mut scan = Self::with_capacity(records.len());
        for record in records {
            scan.push_record(*record);
        }
        scan
    }

    /// Returns the number of points in the scan.
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Returns true if the scan holds no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Appends one record.
    #[inline]
    pub fn push_record(&mut self, record: [f32; RECORD_FIELDS]) {
        let [x, y, z, intensity, label] = record;
        self.x.push(x);
        self.y.push(y);
        self.z.push(z);
        self.intensity.push(intensity);
        self.labels.push(label as u32);
        self.raw_labels.push(label);
    }

    /// Returns the record at `index` as stored.
    #[inline]
    pub fn record(&self, index: usize) -> [f32; RECORD_FIELDS] {
        [
            self.x[index],
            self.y[index],
            self.z[index],
            self.intensity[index],
            self.raw_labels[index],
        ]
    }
}

/// Container for 3D point cloud data.
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    /// X coordinates of all points.
    pub x: Vec<f32>,
    /// Y coordinates of all points.
    pub y: Vec<f32>,
    /// Z coordinates of all points.
    pub z: Vec<f32>,
    /// Optional RGB colors for each point.
    pub colors: Option<Vec<[u8; 3]>>,
}

impl PointCloud {
    /// Creates a new empty point cloud.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new point cloud from coordinate vectors with colors.
    pub fn from_xyz_colors(x: Vec<f32>, y: Vec<f32>, z: Vec<f32>, colors: Vec<[u8; 3]>) -> Self {
        Self {
            x,
            y,
            z,
            colors: Some(colors),
        }
    }

    /// Returns the number of points in the cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Returns true if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Decode a byte buffer of point records.
///
/// With [`TrailingBytes::Error`] a buffer whose length is not a multiple of
/// [`RECORD_BYTES`] is rejected; with [`TrailingBytes::Truncate`] the partial
/// trailing record is dropped.
pub fn decode_records(bytes: &[u8], policy: TrailingBytes) -> Result<LabeledScan> {
    let remainder = bytes.len() % RECORD_BYTES;
    if remainder != 0 {
        match policy {
            TrailingBytes::Error => {
                return Err(LoaderError::MalformedLength {
                    len: bytes.len(),
                    stride: RECORD_BYTES,
                })
            }
            TrailingBytes::Truncate => {
                log::warn!(
                    "dropping {} trailing bytes ({} is not a multiple of {})",
                    remainder,
                    bytes.len(),
                    RECORD_BYTES
                );
            }
        }
    }

    let chunks = bytes.chunks_exact(RECORD_BYTES);
    let mut scan = LabeledScan::with_capacity(chunks.len());

    for chunk in chunks {
        let mut record = [0f32; RECORD_FIELDS];
        for (field, raw) in record.iter_mut().zip(chunk.chunks_exact(4)) {
            *field = f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        }
        scan.push_record(record);
    }

    Ok(scan)
}

/// Load point records from a `.bin` file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, or if its length is not a
/// multiple of the record size and `policy` is [`TrailingBytes::Error`].
pub fn load_bin<P: AsRef<Path>>(path: P, policy: TrailingBytes) -> Result<LabeledScan> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| LoaderError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let scan = decode_records(&bytes, policy).map_err(|e| match e {
        LoaderError::MalformedLength { len, stride } => LoaderError::MalformedFile {
            path: path.to_path_buf(),
            len,
            stride,
        },
        other => other,
    })?;

    log::debug!("{}: decoded {} points", path.display(), scan.len());
    Ok(scan)
}

/// Load a headerless little-endian u32 label file.
pub fn load_label_file<P: AsRef<Path>>(path: P) -> Result<Vec<u32>> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| LoaderError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    if bytes.len() % 4 != 0 {
        return Err(LoaderError::MalformedLabels {
            len: bytes.len(),
            path: path.to_path_buf(),
        });
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// PLY body encodings understood by [`load_ply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlyEncoding {
    Ascii,
    BinaryLittleEndian,
}

/// Scalar property type as declared in the PLY header.
#[derive(Debug, Clone, Copy)]
enum PlyScalar {
    Uchar,
    Int,
    Uint,
    Float,
    Double,
}

impl PlyScalar {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "uchar" | "uint8" => Some(Self::Uchar),
            "int" | "int32" => Some(Self::Int),
            "uint" | "uint32" => Some(Self::Uint),
            "float" | "float32" => Some(Self::Float),
            "double" | "float64" => Some(Self::Double),
            _ => None,
        }
    }

    fn byte_size(self) -> usize {
        match self {
            Self::Uchar => 1,
            Self::Int | Self::Uint | Self::Float => 4,
            Self::Double => 8,
        }
    }

    fn read_le(self, bytes: &[u8]) -> f64 {
        match self {
            Self::Uchar => bytes[0] as f64,
            Self::Int => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            Self::Uint => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            Self::Float => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            Self::Double => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&bytes[..8]);
                f64::from_le_bytes(raw)
            }
        }
    }
}

struct PlyHeader {
    encoding: PlyEncoding,
    vertex_count: usize,
    properties: Vec<(String, PlyScalar)>,
    body_offset: usize,
}

fn parse_ply_header(data: &[u8]) -> Result<PlyHeader> {
    let marker = b"end_header";
    let marker_pos = data
        .windows(marker.len())
        .position(|w| w == marker)
        .ok_or_else(|| LoaderError::InvalidPly("Missing end_header".to_string()))?;

    // Body starts after the newline that terminates end_header.
    let body_offset = data[marker_pos..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|p| marker_pos + p + 1)
        .unwrap_or(data.len());

    let header_text = std::str::from_utf8(&data[..marker_pos])
        .map_err(|_| LoaderError::InvalidPly("Header is not valid UTF-8".to_string()))?;

    let mut lines = header_text.lines();
    if lines.next().map(str::trim) != Some("ply") {
        return Err(LoaderError::InvalidPly("Missing ply magic".to_string()));
    }

    let mut encoding = None;
    let mut vertex_count = None;
    let mut properties = Vec::new();
    let mut in_vertex = false;

    for line in lines {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            ["format", "ascii", ..] => encoding = Some(PlyEncoding::Ascii),
            ["format", "binary_little_endian", ..] => {
                encoding = Some(PlyEncoding::BinaryLittleEndian)
            }
            ["format", other, ..] => {
                return Err(LoaderError::InvalidPly(format!(
                    "Unsupported format: {}",
                    other
                )))
            }
            ["element", "vertex", count] => {
                in_vertex = true;
                vertex_count = Some(count.parse::<usize>().map_err(|_| {
                    LoaderError::InvalidPly(format!("Invalid vertex count: {}", count))
                })?);
            }
            ["element", ..] => in_vertex = false,
            ["property", "list", ..] if in_vertex => {
                return Err(LoaderError::InvalidPly(
                    "List properties on vertices are not supported".to_string(),
                ))
            }
            ["property", ty, name] if in_vertex => {
                let scalar = PlyScalar::parse(ty).ok_or_else(|| {
                    LoaderError::InvalidPly(format!("Unsupported property type: {}", ty))
                })?;
                properties.push((name.to_string(), scalar));
            }
            _ => {}
        }
    }

    Ok(PlyHeader {
        encoding: encoding
            .ok_or_else(|| LoaderError::InvalidPly("No format line in header".to_string()))?,
        vertex_count: vertex_count
            .ok_or_else(|| LoaderError::InvalidPly("No vertex count in header".to_string()))?,
        properties,
        body_offset,
    })
}

/// Load a point cloud from a PLY file.
///
/// Supports ASCII and binary little-endian PLY files with vertex elements containing:
/// - Required: x, y, z properties
/// - Optional: red, green, blue color properties
///
/// # Errors
///
/// Returns an error if the file is not a valid PLY or lacks required properties.
pub fn load_ply<P: AsRef<Path>>(path: P) -> Result<PointCloud> {
    let path = path.as_ref();
    let data = fs::read(path).map_err(|source| LoaderError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let header = parse_ply_header(&data)?;

    let prop_idx: HashMap<&str, usize> = header
        .properties
        .iter()
        .enumerate()
        .map(|(i, (name, _))| (name.as_str(), i))
        .collect();

    let column = |name: &str| {
        prop_idx
            .get(name)
            .copied()
            .ok_or_else(|| LoaderError::MissingColumns(name.to_string()))
    };
    let (x_idx, y_idx, z_idx) = (column("x")?, column("y")?, column("z")?);

    let color_idx = match (prop_idx.get("red"), prop_idx.get("green"), prop_idx.get("blue")) {
        (Some(&r), Some(&g), Some(&b)) => Some((r, g, b)),
        _ => None,
    };

    let n = header.vertex_count;
    let body = &data[header.body_offset..];
    let stride: usize = header.properties.iter().map(|(_, t)| t.byte_size()).sum();

    // The declared count is untrusted; size buffers by what the body can hold.
    let capacity = match header.encoding {
        PlyEncoding::Ascii => n.min(body.iter().filter(|&&b| b == b'\n').count() + 1),
        PlyEncoding::BinaryLittleEndian => {
            let needed = stride.checked_mul(n).ok_or_else(|| {
                LoaderError::InvalidPly(format!("Vertex count {} is too large", n))
            })?;
            if body.len() < needed {
                return Err(LoaderError::InvalidPly(format!(
                    "Expected {} vertices, found {}",
                    n,
                    body.len() / stride.max(1)
                )));
            }
            n
        }
    };

    let mut cloud = PointCloud {
        x: Vec::with_capacity(capacity),
        y: Vec::with_capacity(capacity),
        z: Vec::with_capacity(capacity),
        colors: color_idx.map(|_| Vec::with_capacity(capacity)),
    };

    let mut push_vertex = |values: &[f64]| {
        cloud.x.push(values[x_idx] as f32);
        cloud.y.push(values[y_idx] as f32);
        cloud.z.push(values[z_idx] as f32);
        if let (Some((r, g, b)), Some(colors)) = (color_idx, cloud.colors.as_mut()) {
            colors.push([values[r] as u8, values[g] as u8, values[b] as u8]);
        }
    };

    let mut values = vec![0f64; header.properties.len()];

    match header.encoding {
        PlyEncoding::Ascii => {
            let text = std::str::from_utf8(body)
                .map_err(|_| LoaderError::InvalidPly("Body is not valid UTF-8".to_string()))?;
            let mut rows = text.lines().filter(|l| !l.trim().is_empty());

            for vertex in 0..n {
                let row = rows.next().ok_or_else(|| {
                    LoaderError::InvalidPly(format!("Expected {} vertices, found {}", n, vertex))
                })?;
                let fields: Vec<&str> = row.split_whitespace().collect();
                if fields.len() < values.len() {
                    return Err(LoaderError::ParseError(format!(
                        "Vertex {} has {} values, expected {}",
                        vertex,
                        fields.len(),
                        values.len()
                    )));
                }
                for (value, field) in values.iter_mut().zip(&fields) {
                    *value = field.parse().map_err(|_| {
                        LoaderError::ParseError(format!("Invalid value: {}", field))
                    })?;
                }
                push_vertex(&values);
            }
        }
        PlyEncoding::BinaryLittleEndian => {
            for vertex in body.chunks_exact(stride).take(n) {
                let mut offset = 0;
                for (value, (_, scalar)) in values.iter_mut().zip(&header.properties) {
                    *value = scalar.read_le(&vertex[offset..]);
                    offset += scalar.byte_size();
                }
                push_vertex(&values);
            }
        }
    }

    Ok(cloud)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn encode(records: &[[f32; RECORD_FIELDS]]) -> Vec<u8> {
        records
            .iter()
            .flat_map(|r| r.iter().flat_map(|v| v.to_le_bytes()))
            .collect()
    }

    fn sample_records() -> Vec<[f32; RECORD_FIELDS]> {
        vec![
            [0.0, 0.0, 0.0, 5.0, 1.0],
            [1.0, 1.0, 1.0, 10.0, 2.0],
            [2.0, 2.0, 2.0, 15.0, 1.0],
        ]
    }

    #[test]
    fn test_decode_records() -> Result<()> {
        let bytes = encode(&sample_records());
        assert_eq!(bytes.len(), 3 * RECORD_BYTES);

        let scan = decode_records(&bytes, TrailingBytes::Error)?;
        assert_eq!(scan.len(), 3);
        assert_eq!(scan.x, vec![0.0, 1.0, 2.0]);
        assert_eq!(scan.intensity, vec![5.0, 10.0, 15.0]);
        assert_eq!(scan.labels, vec![1, 2, 1]);
        assert_eq!(scan.record(1), [1.0, 1.0, 1.0, 10.0, 2.0]);

        Ok(())
    }

    #[test]
    fn test_decode_empty_buffer() -> Result<()> {
        let scan = decode_records(&[], TrailingBytes::Error)?;
        assert!(scan.is_empty());
        Ok(())
    }

    #[test]
    fn test_decode_malformed_length_errors() {
        let mut bytes = encode(&sample_records());
        bytes.extend_from_slice(&[0, 0, 0]);

        match decode_records(&bytes, TrailingBytes::Error) {
            Err(LoaderError::MalformedLength { len, stride }) => {
                assert_eq!(len, 63);
                assert_eq!(stride, 20);
            }
            other => panic!("Expected MalformedLength, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_malformed_length_truncates() -> Result<()> {
        let mut bytes = encode(&sample_records());
        bytes.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7]);

        let scan = decode_records(&bytes, TrailingBytes::Truncate)?;
        assert_eq!(scan.len(), 3);
        Ok(())
    }

    #[test]
    fn test_label_cast_saturates() {
        let scan = LabeledScan::from_records(&[
            [0.0, 0.0, 0.0, 0.0, -3.0],
            [0.0, 0.0, 0.0, 0.0, 7.9],
            [0.0, 0.0, 0.0, 0.0, f32::NAN],
        ]);
        assert_eq!(scan.labels, vec![0, 7, 0]);
    }

    #[test]
    fn test_load_bin_reports_path() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 21]).unwrap();
        file.flush().unwrap();

        let err = load_bin(file.path(), TrailingBytes::Error).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("21 bytes"));
        assert!(message.contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_load_bin_missing_file() {
        let result = load_bin("/definitely/not/here.bin", TrailingBytes::Error);
        assert!(matches!(result, Err(LoaderError::Read { .. })));
    }

    #[test]
    fn test_load_label_file() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        for label in [1u32, 2, 1] {
            file.write_all(&label.to_le_bytes()).unwrap();
        }
        file.flush().unwrap();

        assert_eq!(load_label_file(file.path())?, vec![1, 2, 1]);
        Ok(())
    }

    #[test]
    fn test_load_ascii_ply() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "ply").unwrap();
        writeln!(file, "format ascii 1.0").unwrap();
        writeln!(file, "element vertex 2").unwrap();
        writeln!(file, "property float x").unwrap();
        writeln!(file, "property float y").unwrap();
        writeln!(file, "property float z").unwrap();
        writeln!(file, "property uchar red").unwrap();
        writeln!(file, "property uchar green").unwrap();
        writeln!(file, "property uchar blue").unwrap();
        writeln!(file, "end_header").unwrap();
        writeln!(file, "1.0 2.0 3.0 255 0 0").unwrap();
        writeln!(file, "4.0 5.0 6.0 0 255 0").unwrap();
        file.flush().unwrap();

        let cloud = load_ply(file.path())?;
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.x[0], 1.0);
        assert_eq!(cloud.y[1], 5.0);

        let colors = cloud.colors.unwrap();
        assert_eq!(colors[0], [255, 0, 0]);
        assert_eq!(colors[1], [0, 255, 0]);

        Ok(())
    }

    #[test]
    fn test_load_binary_ply_with_doubles() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "ply\nformat binary_little_endian 1.0\nelement vertex 1\n\
             property double x\nproperty double y\nproperty double z\nend_header\n"
        )
        .unwrap();
        for v in [1.5f64, -2.0, 3.25] {
            file.write_all(&v.to_le_bytes()).unwrap();
        }
        file.flush().unwrap();

        let cloud = load_ply(file.path())?;
        assert_eq!(cloud.len(), 1);
        assert_eq!((cloud.x[0], cloud.y[0], cloud.z[0]), (1.5, -2.0, 3.25));
        assert!(cloud.colors.is_none());

        Ok(())
    }

    #[test]
    fn test_load_ply_missing_columns() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "ply\nformat ascii 1.0\nelement vertex 1\nproperty float x\nend_header\n1.0\n"
        )
        .unwrap();
        file.flush().unwrap();

        assert!(matches!(
            load_ply(file.path()),
            Err(LoaderError::MissingColumns(_))
        ));
    }

    #[test]
    fn test_load_binary_ply_with_oversized_vertex_count() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "ply\nformat binary_little_endian 1.0\nelement vertex 4611686018427387904\n\
             property float x\nproperty float y\nproperty float z\nend_header\n"
        )
        .unwrap();
        file.flush().unwrap();

        assert!(matches!(
            load_ply(file.path()),
            Err(LoaderError::InvalidPly(_))
        ));
    }

    #[test]
    fn test_load_ascii_ply_with_oversized_vertex_count() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "ply\nformat ascii 1.0\nelement vertex 4611686018427387904\n\
             property float x\nproperty float y\nproperty float z\nend_header\n1 2 3\n"
        )
        .unwrap();
        file.flush().unwrap();

        assert!(matches!(
            load_ply(file.path()),
            Err(LoaderError::InvalidPly(_))
        ));
    }
}
