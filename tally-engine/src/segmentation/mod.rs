//! Segmentation Engine
//!
//! Groups customers into value tiers from their purchase history.
//!
//! Each customer is reduced to recency (days since their last order, relative
//! to the latest order in the dataset) and monetary value (sum of sales). The
//! clustering strategy groups the min-max-scaled features; groups are then
//! ranked by mean monetary value and labelled from the fixed vocabulary for
//! the requested cluster count. Labels follow rank, never cluster index.

mod kmeans;

pub use kmeans::KMeans;

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use tally_core::domain::sales::SalesRecord;
use tally_core::domain::segment::{CustomerPoint, Segment, SegmentLabel, SegmentationResult};

use crate::error::{EngineError, Result};

/// Pluggable clustering over the (recency, monetary) feature space
pub trait ClusteringStrategy: Send + Sync {
    /// Assign every point to a group in `0..k`
    ///
    /// Must return exactly one index per point. Groups may be left empty,
    /// for example when there are fewer points than groups.
    fn assign(&self, points: &[[f64; 2]], k: usize) -> Result<Vec<usize>>;
}

pub struct SegmentationEngine {
    strategy: Box<dyn ClusteringStrategy>,
}

impl Default for SegmentationEngine {
    fn default() -> Self {
        Self::new(KMeans::default())
    }
}

#[derive(Debug, Default)]
struct CustomerHistory {
    last_order: Option<NaiveDate>,
    monetary: f64,
    frequency: u64,
    category_spend: HashMap<String, f64>,
}

impl SegmentationEngine {
    pub fn new(strategy: impl ClusteringStrategy + 'static) -> Self {
        Self {
            strategy: Box::new(strategy),
        }
    }

    /// Segment customers into `n_clusters` rank-labelled tiers
    ///
    /// Always returns exactly `n_clusters` segments, highest rank first;
    /// tiers without members are zero-filled.
    pub fn segment(
        &self,
        records: &[SalesRecord],
        n_clusters: usize,
        max_preview_size: usize,
        include_reports: bool,
    ) -> Result<SegmentationResult> {
        let labels = SegmentLabel::vocabulary(n_clusters).ok_or_else(|| {
            EngineError::Validation(format!(
                "n_clusters must be between 1 and {} (got {})",
                SegmentLabel::MAX_SEGMENTS,
                n_clusters
            ))
        })?;

        if records.is_empty() {
            return Err(EngineError::NoData(
                "No sales data available for clustering".to_string(),
            ));
        }

        check_required_fields(records)?;

        let customers = collect_histories(records);
        if customers.is_empty() {
            return Err(EngineError::NoData(
                "No complete sales records available for clustering".to_string(),
            ));
        }

        let latest = customers
            .values()
            .filter_map(|c| c.last_order)
            .max()
            .ok_or_else(|| EngineError::NoData("No dated orders".to_string()))?;

        let ids: Vec<&String> = customers.keys().collect();
        let features: Vec<(i64, f64)> = customers
            .values()
            .map(|c| {
                let recency = c
                    .last_order
                    .map(|d| (latest - d).num_days())
                    .unwrap_or_default();
                (recency, c.monetary)
            })
            .collect();

        let points = scale(&features);
        let assignments = self.strategy.assign(&points, n_clusters)?;
        if assignments.len() != points.len() || assignments.iter().any(|&c| c >= n_clusters) {
            return Err(EngineError::Strategy(format!(
                "Clustering returned {} assignments for {} customers",
                assignments.len(),
                points.len()
            )));
        }

        let cluster_labels = rank_labels(&assignments, &features, labels);

        let mut segments: Vec<Segment> = labels.iter().map(|&l| Segment::empty(l)).collect();
        let mut spend: Vec<HashMap<&str, f64>> = vec![HashMap::new(); labels.len()];
        let mut preview = Vec::new();

        for (i, (id, history)) in customers.iter().enumerate() {
            let label = cluster_labels[assignments[i]];
            let slot = labels
                .iter()
                .position(|&l| l == label)
                .unwrap_or(labels.len() - 1);

            let segment = &mut segments[slot];
            segment.customer_count += 1;
            segment.total_revenue += history.monetary;
            segment.avg_frequency += history.frequency as f64;
            for (category, amount) in &history.category_spend {
                *spend[slot].entry(category.as_str()).or_default() += amount;
            }

            if preview.len() < max_preview_size {
                preview.push(CustomerPoint {
                    customer_id: (*id).clone(),
                    recency: features[i].0,
                    monetary: history.monetary,
                    frequency: history.frequency,
                    segment: label,
                });
            }
        }

        for (segment, categories) in segments.iter_mut().zip(spend) {
            if segment.customer_count > 0 {
                let n = segment.customer_count as f64;
                segment.avg_order_value = segment.total_revenue / n;
                segment.avg_frequency /= n;
            }
            segment.top_categories = top_categories(categories);
        }

        let reports = if include_reports {
            segments
                .iter()
                .filter(|s| !s.is_empty())
                .map(render_report)
                .collect()
        } else {
            Vec::new()
        };

        tracing::info!(
            "Clustered {} customers into {} segments",
            ids.len(),
            n_clusters
        );

        Ok(SegmentationResult {
            segments,
            preview,
            reports,
            customer_count: ids.len() as u64,
        })
    }
}

/// Fail when a required field is absent from every record
///
/// Individual incomplete rows are skipped later; a field that no row carries
/// means the dataset has the wrong shape.
fn check_required_fields(records: &[SalesRecord]) -> Result<()> {
    let mut missing = Vec::new();
    if records
        .iter()
        .all(|r| r.customer_id.as_deref().is_none_or(str::is_empty))
    {
        missing.push("customer_id");
    }
    if records.iter().all(|r| r.order_date.is_none()) {
        missing.push("order_date");
    }
    if records.iter().all(|r| r.sales.is_none()) {
        missing.push("sales");
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(EngineError::Validation(format!(
            "Required fields missing in sales data: {}",
            missing.join(", ")
        )))
    }
}

fn collect_histories(records: &[SalesRecord]) -> BTreeMap<String, CustomerHistory> {
    let mut customers: BTreeMap<String, CustomerHistory> = BTreeMap::new();
    let mut skipped = 0;

    for record in records {
        let (Some(id), Some(date), Some(sales)) =
            (record.customer_id.as_ref(), record.order_date, record.sales)
        else {
            skipped += 1;
            continue;
        };
        if id.is_empty() {
            skipped += 1;
            continue;
        }

        let history = customers.entry(id.clone()).or_default();
        history.last_order = history.last_order.max(Some(date));
        history.monetary += sales;
        history.frequency += 1;
        if let Some(category) = &record.category {
            *history.category_spend.entry(category.clone()).or_default() += sales;
        }
    }

    if skipped > 0 {
        tracing::warn!("Skipped {} incomplete sales records", skipped);
    }

    customers
}

/// Min-max scale both features into [0, 1]
fn scale(features: &[(i64, f64)]) -> Vec<[f64; 2]> {
    let bounds = |values: Vec<f64>| {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (min, max)
    };
    let (r_min, r_max) = bounds(features.iter().map(|f| f.0 as f64).collect());
    let (m_min, m_max) = bounds(features.iter().map(|f| f.1).collect());

    let norm = |v: f64, min: f64, max: f64| {
        if max > min { (v - min) / (max - min) } else { 0.0 }
    };

    features
        .iter()
        .map(|&(r, m)| [norm(r as f64, r_min, r_max), norm(m, m_min, m_max)])
        .collect()
}

/// Map cluster index to label by descending mean monetary value
///
/// Empty clusters rank below every populated one.
fn rank_labels(
    assignments: &[usize],
    features: &[(i64, f64)],
    labels: &[SegmentLabel],
) -> Vec<SegmentLabel> {
    let k = labels.len();
    let mut sums = vec![0.0_f64; k];
    let mut counts = vec![0_usize; k];
    for (&cluster, feature) in assignments.iter().zip(features) {
        sums[cluster] += feature.1;
        counts[cluster] += 1;
    }

    let mean = |c: usize| {
        if counts[c] == 0 {
            f64::NEG_INFINITY
        } else {
            sums[c] / counts[c] as f64
        }
    };

    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&a, &b| mean(b).total_cmp(&mean(a)).then(a.cmp(&b)));

    let mut by_cluster = vec![labels[k - 1]; k];
    for (rank, cluster) in order.into_iter().enumerate() {
        by_cluster[cluster] = labels[rank];
    }
    by_cluster
}

fn top_categories(spend: HashMap<&str, f64>) -> Vec<String> {
    let mut ranked: Vec<(&str, f64)> = spend.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(3)
        .map(|(name, _)| name.to_string())
        .collect()
}

fn render_report(segment: &Segment) -> String {
    let categories = if segment.top_categories.is_empty() {
        "none recorded".to_string()
    } else {
        segment.top_categories.join(", ")
    };
    format!(
        "{}: {} customers, ${:.2} revenue, top categories: {}.",
        segment.name, segment.customer_count, segment.total_revenue, categories
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    /// 50 records over three customers with clearly different spend
    fn three_customer_dataset() -> Vec<SalesRecord> {
        (0..50)
            .map(|i| {
                let (id, amount, category) = match i % 5 {
                    0 | 1 => ("big", 900.0, "Technology"),
                    2 | 3 => ("medium", 120.0, "Furniture"),
                    _ => ("small", 15.0, "Office Supplies"),
                };
                SalesRecord::new(id, date(1 + (i % 28) as u32), amount).with_category(category)
            })
            .collect()
    }

    /// Puts every point in the group given by a fixed table
    struct FixedAssignment(Vec<usize>);

    impl ClusteringStrategy for FixedAssignment {
        fn assign(&self, _points: &[[f64; 2]], _k: usize) -> Result<Vec<usize>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_end_to_end_three_customers_two_clusters() {
        let engine = SegmentationEngine::default();
        let result = engine
            .segment(&three_customer_dataset(), 2, 50, true)
            .unwrap();

        assert_eq!(result.segments.len(), 2);
        let total: u64 = result.segments.iter().map(|s| s.customer_count).sum();
        assert_eq!(total, 3);
        assert_eq!(result.customer_count, 3);

        let non_empty = result.segments.iter().filter(|s| !s.is_empty()).count();
        assert_eq!(result.reports.len(), non_empty);
    }

    #[test]
    fn test_k_segments_even_with_fewer_customers() {
        let records = vec![
            SalesRecord::new("a", date(1), 10.0),
            SalesRecord::new("b", date(2), 500.0),
        ];
        let result = SegmentationEngine::default()
            .segment(&records, 5, 10, true)
            .unwrap();

        assert_eq!(result.segments.len(), 5);
        let empty: Vec<&Segment> = result.segments.iter().filter(|s| s.is_empty()).collect();
        assert_eq!(empty.len(), 3);
        for segment in empty {
            assert_eq!(segment.avg_order_value, 0.0);
            assert!(segment.top_categories.is_empty());
        }
        assert_eq!(result.segments[0].id, SegmentLabel::High);
        assert_eq!(result.segments[0].total_revenue, 500.0);
        assert_eq!(result.reports.len(), 2);
    }

    #[test]
    fn test_labels_follow_rank_not_cluster_index() {
        let records = vec![
            SalesRecord::new("a", date(1), 10.0),
            SalesRecord::new("b", date(2), 1000.0),
            SalesRecord::new("c", date(3), 100.0),
        ];

        let first = SegmentationEngine::new(FixedAssignment(vec![0, 1, 2]))
            .segment(&records, 3, 10, false)
            .unwrap();
        let permuted = SegmentationEngine::new(FixedAssignment(vec![2, 0, 1]))
            .segment(&records, 3, 10, false)
            .unwrap();

        assert_eq!(first.segments, permuted.segments);
        let high = first.segment(SegmentLabel::High).unwrap();
        assert_eq!(high.total_revenue, 1000.0);
        let labels: Vec<SegmentLabel> = first.preview.iter().map(|p| p.segment).collect();
        assert_eq!(
            labels,
            vec![SegmentLabel::Low, SegmentLabel::High, SegmentLabel::Mid]
        );
    }

    #[test]
    fn test_segment_statistics() {
        let records = vec![
            SalesRecord::new("a", date(1), 100.0).with_category("Furniture"),
            SalesRecord::new("a", date(5), 300.0).with_category("Technology"),
            SalesRecord::new("b", date(10), 20.0).with_category("Office Supplies"),
        ];
        let result = SegmentationEngine::new(FixedAssignment(vec![0, 1]))
            .segment(&records, 2, 10, true)
            .unwrap();

        let high = result.segment(SegmentLabel::High).unwrap();
        assert_eq!(high.customer_count, 1);
        assert_eq!(high.avg_order_value, 400.0);
        assert_eq!(high.avg_frequency, 2.0);
        assert_eq!(high.top_categories, vec!["Technology", "Furniture"]);

        let point = result.preview.iter().find(|p| p.customer_id == "a").unwrap();
        assert_eq!(point.recency, 5);
        assert_eq!(
            result.reports[0],
            "High Customers: 1 customers, $400.00 revenue, top categories: Technology, Furniture."
        );
    }

    #[test]
    fn test_preview_is_capped() {
        let result = SegmentationEngine::default()
            .segment(&three_customer_dataset(), 3, 2, false)
            .unwrap();
        assert_eq!(result.preview.len(), 2);
        assert!(result.reports.is_empty());
    }

    #[test]
    fn test_missing_required_field_is_validation_error() {
        let records = vec![SalesRecord {
            customer_id: Some("a".to_string()),
            sales: Some(10.0),
            ..Default::default()
        }];
        let err = SegmentationEngine::default()
            .segment(&records, 3, 10, true)
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(msg) if msg.contains("order_date")));
    }

    #[test]
    fn test_empty_input_is_no_data() {
        let err = SegmentationEngine::default()
            .segment(&[], 3, 10, true)
            .unwrap_err();
        assert!(err.is_no_data());
    }

    #[test]
    fn test_invalid_cluster_count() {
        let err = SegmentationEngine::default()
            .segment(&three_customer_dataset(), 0, 10, true)
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_strategy_with_wrong_shape_is_rejected() {
        let err = SegmentationEngine::new(FixedAssignment(vec![0]))
            .segment(&three_customer_dataset(), 2, 10, true)
            .unwrap_err();
        assert!(matches!(err, EngineError::Strategy(_)));
    }
}
