//! Categorical colors for semantic labels.
//!
//! Up to 20 distinct labels are colored from the tab20 palette, sampled the
//! way an evenly spaced colormap lookup picks entries. Every label past the
//! twentieth gets its own generated color instead of reusing a palette entry.

/// The 20-entry tab20 categorical palette.
pub const TAB20: [[u8; 3]; 20] = [
    [31, 119, 180],
    [174, 199, 232],
    [255, 127, 14],
    [255, 187, 120],
    [44, 160, 44],
    [152, 223, 138],
    [214, 39, 40],
    [255, 152, 150],
    [148, 103, 189],
    [197, 176, 213],
    [140, 86, 75],
    [196, 156, 148],
    [227, 119, 194],
    [247, 182, 210],
    [127, 127, 127],
    [199, 199, 199],
    [188, 189, 34],
    [219, 219, 141],
    [23, 190, 207],
    [158, 218, 229],
];

/// Color for labels not present in a palette (light gray).
pub const UNKNOWN_LABEL_COLOR: [u8; 3] = [180, 180, 180];

/// Golden-ratio conjugate used to spread generated hues.
const GOLDEN_RATIO_CONJUGATE: f32 = 0.618_034;

/// Label → color assignment for one set of distinct labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelPalette {
    /// (label, color) pairs, ascending by label.
    entries: Vec<(u32, [u8; 3])>,
}

impl LabelPalette {
    /// Assign colors to `labels`, which must be distinct and ascending.
    pub fn for_labels(labels: &[u32]) -> Self {
        let n = labels.len();
        let entries = labels
            .iter()
            .enumerate()
            .map(|(i, &label)| (label, palette_color(i, n)))
            .collect();
        Self { entries }
    }

    /// Color assigned to `label`.
    pub fn color_of(&self, label: u32) -> [u8; 3] {
        self.entries
            .binary_search_by_key(&label, |&(l, _)| l)
            .map(|i| self.entries[i].1)
            .unwrap_or(UNKNOWN_LABEL_COLOR)
    }

    /// (label, color) pairs in ascending label order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, [u8; 3])> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Color for the `index`-th of `count` distinct labels.
fn palette_color(index: usize, count: usize) -> [u8; 3] {
    let last = TAB20.len() - 1;
    if count <= TAB20.len() {
        // Evenly spaced positions in [0, 1] mapped onto the 20 entries.
        let slot = if count <= 1 {
            0
        } else {
            (index * TAB20.len() / (count - 1)).min(last)
        };
        TAB20[slot]
    } else if index < TAB20.len() {
        TAB20[index]
    } else {
        generated_color(index - TAB20.len())
    }
}

/// Distinct color for the `n`-th label beyond the fixed palette.
fn generated_color(n: usize) -> [u8; 3] {
    let hue = ((n + 1) as f32 * GOLDEN_RATIO_CONJUGATE).fract();
    let value = if n % 2 == 0 { 0.85 } else { 0.65 };
    hsv_to_rgb(hue, 0.7, value)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [u8; 3] {
    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    let (r, g, b) = match sector as i32 % 6 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    let to_u8 = |c: f32| (c * 255.0).round().clamp(0.0, 255.0) as u8;
    [to_u8(r), to_u8(g), to_u8(b)]
}
