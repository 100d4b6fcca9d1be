//! Customer segmentation types

use serde::{Deserialize, Serialize};

/// Rank-derived segment label
///
/// Labels follow the monetary rank of a cluster within one run; they carry
/// no identity across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentLabel {
    High,
    UpperMid,
    Mid,
    LowerMid,
    Low,
}

impl SegmentLabel {
    pub const MAX_SEGMENTS: usize = 5;

    /// Labels for `k` segments, ordered from highest to lowest monetary rank
    pub fn vocabulary(k: usize) -> Option<&'static [SegmentLabel]> {
        use SegmentLabel::*;
        match k {
            1 => Some(&[High]),
            2 => Some(&[High, Low]),
            3 => Some(&[High, Mid, Low]),
            4 => Some(&[High, UpperMid, LowerMid, Low]),
            5 => Some(&[High, UpperMid, Mid, LowerMid, Low]),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SegmentLabel::High => "high",
            SegmentLabel::UpperMid => "upper_mid",
            SegmentLabel::Mid => "mid",
            SegmentLabel::LowerMid => "lower_mid",
            SegmentLabel::Low => "low",
        }
    }

    /// Human-readable segment name, e.g. "High Customers"
    pub fn display_name(self) -> &'static str {
        match self {
            SegmentLabel::High => "High Customers",
            SegmentLabel::UpperMid => "Upper-Mid Customers",
            SegmentLabel::Mid => "Mid Customers",
            SegmentLabel::LowerMid => "Lower-Mid Customers",
            SegmentLabel::Low => "Low Customers",
        }
    }
}

impl std::fmt::Display for SegmentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate statistics for one value tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentLabel,
    pub name: String,
    pub customer_count: u64,
    pub total_revenue: f64,
    /// total_revenue / customer_count, 0 for an empty segment
    pub avg_order_value: f64,
    pub avg_frequency: f64,
    /// At most three category names, highest spend first
    pub top_categories: Vec<String>,
}

impl Segment {
    pub fn empty(id: SegmentLabel) -> Self {
        Self {
            id,
            name: id.display_name().to_string(),
            customer_count: 0,
            total_revenue: 0.0,
            avg_order_value: 0.0,
            avg_frequency: 0.0,
            top_categories: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.customer_count == 0
    }
}

/// Per-customer feature row returned as a preview sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerPoint {
    pub customer_id: String,
    /// Days between the customer's last order and the latest order in the dataset
    pub recency: i64,
    pub monetary: f64,
    pub frequency: u64,
    pub segment: SegmentLabel,
}

/// Output of one segmentation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationResult {
    /// Exactly one entry per requested cluster, highest rank first
    pub segments: Vec<Segment>,
    pub preview: Vec<CustomerPoint>,
    #[serde(default)]
    pub reports: Vec<String>,
    pub customer_count: u64,
}

impl SegmentationResult {
    pub fn segment(&self, label: SegmentLabel) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_sizes() {
        for k in 1..=SegmentLabel::MAX_SEGMENTS {
            let labels = SegmentLabel::vocabulary(k).unwrap();
            assert_eq!(labels.len(), k);
            assert_eq!(labels[0], SegmentLabel::High);
        }
        assert!(SegmentLabel::vocabulary(0).is_none());
        assert!(SegmentLabel::vocabulary(6).is_none());
    }

    #[test]
    fn test_label_serialization() {
        let json = serde_json::to_value(SegmentLabel::UpperMid).unwrap();
        assert_eq!(json, serde_json::json!("upper_mid"));
    }

    #[test]
    fn test_empty_segment() {
        let segment = Segment::empty(SegmentLabel::Low);
        assert!(segment.is_empty());
        assert_eq!(segment.name, "Low Customers");
        assert_eq!(segment.avg_order_value, 0.0);
        assert!(segment.top_categories.is_empty());
    }
}
