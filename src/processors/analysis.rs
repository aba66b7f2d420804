//! Scan summaries and label distribution reports.

use std::fmt;

use crate::core::loaders::LabeledScan;
use crate::core::transforms::{label_distribution, unique_labels, AxisRange, LabelCount};

/// Point count, coordinate ranges and distinct labels of one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSummary {
    pub points: usize,
    pub x: Option<AxisRange>,
    pub y: Option<AxisRange>,
    pub z: Option<AxisRange>,
    /// Distinct labels, ascending.
    pub labels: Vec<u32>,
}

/// Summarize a decoded scan.
pub fn summary_of(scan: &LabeledScan) -> ScanSummary {
    ScanSummary {
        points: scan.len(),
        x: AxisRange::of(&scan.x),
        y: AxisRange::of(&scan.y),
        z: AxisRange::of(&scan.z),
        labels: unique_labels(&scan.labels),
    }
}

fn fmt_range(range: &Option<AxisRange>) -> String {
    match range {
        Some(r) => format!("{:.2} ~ {:.2}", r.min, r.max),
        None => "n/a".to_string(),
    }
}

impl fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Points: {}", self.points)?;
        writeln!(
            f,
            "Coordinate range: X({}), Y({}), Z({})",
            fmt_range(&self.x),
            fmt_range(&self.y),
            fmt_range(&self.z)
        )?;
        write!(f, "Labels: {:?}", self.labels)
    }
}

/// Per-label point counts with their share of the scan.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelReport {
    pub total: usize,
    pub counts: Vec<LabelCount>,
}

impl LabelReport {
    /// Count points per distinct label, ascending by label.
    pub fn from_scan(scan: &LabeledScan) -> Self {
        Self {
            total: scan.len(),
            counts: label_distribution(&scan.labels),
        }
    }

    /// Largest per-label count, 0 for an empty scan.
    pub fn max_count(&self) -> usize {
        self.counts.iter().map(|c| c.count).max().unwrap_or(0)
    }
}

impl fmt::Display for LabelReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Label analysis ===")?;
        for row in &self.counts {
            writeln!(
                f,
                "Label {}: {} points ({:.2}%)",
                row.label,
                group_thousands(row.count),
                row.percentage
            )?;
        }
        Ok(())
    }
}

/// Format an integer with `,` thousands separators.
pub fn group_thousands(value: usize) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_scan() -> LabeledScan {
        LabeledScan::from_records(&[
            [0.0, 0.0, 0.0, 5.0, 1.0],
            [1.0, 1.0, 1.0, 10.0, 2.0],
            [2.0, 2.0, 2.0, 15.0, 1.0],
        ])
    }

    #[test]
    fn test_summary_of() {
        let summary = summary_of(&sample_scan());

        assert_eq!(summary.points, 3);
        assert_eq!(summary.x, Some(AxisRange { min: 0.0, max: 2.0 }));
        assert_eq!(summary.z.unwrap().max, 2.0);
        assert_eq!(summary.labels, vec![1, 2]);

        let text = summary.to_string();
        assert!(text.contains("Points: 3"));
        assert!(text.contains("X(0.00 ~ 2.00)"));
        assert!(text.contains("[1, 2]"));
    }

    #[test]
    fn test_summary_of_empty_scan() {
        let summary = summary_of(&LabeledScan::new());

        assert_eq!(summary.points, 0);
        assert!(summary.x.is_none());
        assert!(summary.to_string().contains("X(n/a)"));
    }

    #[test]
    fn test_label_report() {
        let report = LabelReport::from_scan(&sample_scan());

        assert_eq!(report.total, 3);
        assert_eq!(report.max_count(), 2);

        let text = report.to_string();
        assert!(text.contains("Label 1: 2 points (66.67%)"));
        assert!(text.contains("Label 2: 1 points (33.33%)"));
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }
}
