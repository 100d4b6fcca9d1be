//! Price Optimization Engine
//!
//! Two layers:
//! - a decision table keyed by segment label (high +5%, low -5%, others hold)
//! - a per-product grid search over [0.8, 1.2] x current price, scored by a
//!   pluggable demand model

use chrono::NaiveDate;
use std::collections::BTreeMap;
use tally_core::domain::pricing::{
    PriceOptimizationResult, PriceRecommendation, ProductAggregate, ProductPriceSuggestion,
};
use tally_core::domain::sales::SalesRecord;
use tally_core::domain::segment::{Segment, SegmentLabel};

use crate::error::{EngineError, Result};

/// Predicts units sold at a candidate price
pub trait DemandModel: Send + Sync {
    fn predict_quantity(&self, product: &ProductAggregate, price: f64) -> f64;
}

/// q(p) = q0 * (p / p0)^-elasticity, anchored at the observed price and volume
#[derive(Debug, Clone)]
pub struct ConstantElasticity {
    pub elasticity: f64,
}

impl Default for ConstantElasticity {
    fn default() -> Self {
        Self { elasticity: 1.2 }
    }
}

impl DemandModel for ConstantElasticity {
    fn predict_quantity(&self, product: &ProductAggregate, price: f64) -> f64 {
        if product.unit_price <= 0.0 || price <= 0.0 {
            return 0.0;
        }
        product.total_quantity * (price / product.unit_price).powf(-self.elasticity)
    }
}

/// Symmetric price grid around the current price
#[derive(Debug, Clone)]
pub struct PriceGridSearch {
    pub lower: f64,
    pub upper: f64,
    pub points: usize,
    /// Minimum revenue gain, as a fraction, for a suggestion to be kept
    pub min_revenue_gain: f64,
}

impl Default for PriceGridSearch {
    fn default() -> Self {
        Self {
            lower: 0.8,
            upper: 1.2,
            points: 10,
            min_revenue_gain: 0.05,
        }
    }
}

impl PriceGridSearch {
    fn grid(&self, price: f64) -> Vec<f64> {
        match self.points {
            0 => Vec::new(),
            1 => vec![price],
            n => {
                let step = (self.upper - self.lower) / (n - 1) as f64;
                (0..n)
                    .map(|i| price * (self.lower + step * i as f64))
                    .collect()
            }
        }
    }

    /// Best grid price for one product, if it beats current revenue enough
    pub fn search(
        &self,
        product: &ProductAggregate,
        model: &dyn DemandModel,
    ) -> Option<ProductPriceSuggestion> {
        if product.total_sales <= 0.0 || product.unit_price <= 0.0 {
            return None;
        }

        let (best_price, best_revenue) = self
            .grid(product.unit_price)
            .into_iter()
            .map(|price| (price, model.predict_quantity(product, price) * price))
            .max_by(|a, b| a.1.total_cmp(&b.1))?;

        let impact = (best_revenue - product.total_sales) / product.total_sales;
        (impact > self.min_revenue_gain).then(|| ProductPriceSuggestion {
            product: product.product.clone(),
            current_price: product.unit_price,
            suggested_price: best_price,
            revenue_impact_pct: impact * 100.0,
        })
    }
}

/// Aggregate sales per product
///
/// Unit price is the mean list price of each order line:
/// sales / (quantity * (1 - discount)). Lines without a product, quantity
/// or amount are ignored, as are lines whose price cannot be computed.
pub fn build_product_aggregates(records: &[SalesRecord]) -> Vec<ProductAggregate> {
    #[derive(Default)]
    struct Acc {
        category: Option<String>,
        sales: f64,
        quantity: f64,
        price_sum: f64,
        orders: u64,
    }

    let mut products: BTreeMap<&str, Acc> = BTreeMap::new();
    for record in records {
        let (Some(product), Some(sales), Some(quantity)) =
            (record.product.as_deref(), record.sales, record.quantity)
        else {
            continue;
        };
        let discount = record.discount.unwrap_or(0.0);
        let denominator = quantity * (1.0 - discount);
        if denominator <= 0.0 {
            continue;
        }

        let acc = products.entry(product).or_default();
        if acc.category.is_none() {
            acc.category = record.category.clone();
        }
        acc.sales += sales;
        acc.quantity += quantity;
        acc.price_sum += sales / denominator;
        acc.orders += 1;
    }

    products
        .into_iter()
        .map(|(product, acc)| ProductAggregate {
            product: product.to_string(),
            category: acc.category,
            total_sales: acc.sales,
            total_quantity: acc.quantity,
            unit_price: acc.price_sum / acc.orders as f64,
            order_count: acc.orders,
        })
        .collect()
}

/// Pricing decision for one segment label
pub fn segment_pricing(label: SegmentLabel) -> (f64, &'static str) {
    match label {
        SegmentLabel::High => (1.05, "Increase price by 5% for high-value customers"),
        SegmentLabel::Low => (0.95, "Decrease price by 5% for low-value customers"),
        _ => (1.0, "Maintain current pricing for mid-value customers"),
    }
}

pub struct PricingEngine {
    grid: PriceGridSearch,
    model: Box<dyn DemandModel>,
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::new(PriceGridSearch::default(), ConstantElasticity::default())
    }
}

impl PricingEngine {
    pub fn new(grid: PriceGridSearch, model: impl DemandModel + 'static) -> Self {
        Self {
            grid,
            model: Box::new(model),
        }
    }

    /// Price recommendations per segment and per product
    ///
    /// Without any populated segment there is nothing to price against and
    /// the result is `NoData`.
    pub fn optimize(
        &self,
        products: &[ProductAggregate],
        segments: &[Segment],
        as_of: NaiveDate,
    ) -> Result<PriceOptimizationResult> {
        let recommendations: Vec<PriceRecommendation> = segments
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| {
                let (price_adjustment, strategy) = segment_pricing(s.id);
                PriceRecommendation {
                    segment_id: s.id,
                    customer_count: s.customer_count,
                    avg_order_value: s.avg_order_value,
                    price_adjustment,
                    strategy: strategy.to_string(),
                }
            })
            .collect();

        if recommendations.is_empty() {
            return Err(EngineError::NoData(
                "No segmentation data available for price optimization".to_string(),
            ));
        }

        let product_suggestions: Vec<ProductPriceSuggestion> = products
            .iter()
            .filter_map(|p| self.grid.search(p, self.model.as_ref()))
            .collect();

        let report = render_report(as_of, &product_suggestions, products.len());

        tracing::info!(
            "Price optimization: {} segment recommendations, {} of {} products optimized",
            recommendations.len(),
            product_suggestions.len(),
            products.len()
        );

        Ok(PriceOptimizationResult {
            recommendations,
            product_suggestions,
            products_analyzed: products.len(),
            report,
        })
    }
}

fn render_report(
    as_of: NaiveDate,
    suggestions: &[ProductPriceSuggestion],
    analyzed: usize,
) -> String {
    let base = format!(
        "Price Optimization - {}\nOptimized {} of {} products. ",
        as_of.format("%Y-%m-%d"),
        suggestions.len(),
        analyzed
    );
    match suggestions.first() {
        None => base + "No changes suggested.",
        Some(example) => format!(
            "{}Example: {} from ${:.2} to ${:.2} (+{:.2}%).",
            base,
            example.product,
            example.current_price,
            example.suggested_price,
            example.revenue_impact_pct
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn segment(label: SegmentLabel, customers: u64) -> Segment {
        Segment {
            customer_count: customers,
            total_revenue: 100.0 * customers as f64,
            avg_order_value: 100.0,
            ..Segment::empty(label)
        }
    }

    #[test]
    fn test_decision_table() {
        let segments = vec![
            segment(SegmentLabel::High, 2),
            segment(SegmentLabel::Mid, 3),
            segment(SegmentLabel::Low, 4),
        ];
        let result = PricingEngine::default()
            .optimize(&[], &segments, as_of())
            .unwrap();

        assert_eq!(result.recommendations.len(), 3);
        assert_eq!(
            result.recommendation(SegmentLabel::High).unwrap().price_adjustment,
            1.05
        );
        assert_eq!(
            result.recommendation(SegmentLabel::Mid).unwrap().price_adjustment,
            1.0
        );
        assert_eq!(
            result.recommendation(SegmentLabel::Low).unwrap().price_adjustment,
            0.95
        );
        assert!(result.report.ends_with("Optimized 0 of 0 products. No changes suggested."));
    }

    #[test]
    fn test_empty_segments_are_skipped() {
        let segments = vec![segment(SegmentLabel::High, 1), Segment::empty(SegmentLabel::Low)];
        let result = PricingEngine::default()
            .optimize(&[], &segments, as_of())
            .unwrap();
        assert_eq!(result.recommendations.len(), 1);
    }

    #[test]
    fn test_no_segments_is_no_data() {
        let err = PricingEngine::default()
            .optimize(&[], &[Segment::empty(SegmentLabel::High)], as_of())
            .unwrap_err();
        assert!(err.is_no_data());
    }

    #[test]
    fn test_product_aggregates() {
        let date = as_of();
        let records = vec![
            SalesRecord::new("a", date, 80.0)
                .with_category("Furniture")
                .with_product("Chair", 2.0, 0.2),
            SalesRecord::new("b", date, 100.0).with_product("Chair", 2.0, 0.0),
            SalesRecord::new("c", date, 10.0),
        ];
        let products = build_product_aggregates(&records);

        assert_eq!(products.len(), 1);
        let chair = &products[0];
        assert_eq!(chair.total_sales, 180.0);
        assert_eq!(chair.total_quantity, 4.0);
        assert_eq!(chair.order_count, 2);
        assert!((chair.unit_price - 50.0).abs() < 1e-9);
        assert_eq!(chair.category.as_deref(), Some("Furniture"));
    }

    #[test]
    fn test_grid_search_prefers_lower_price_for_discounted_product() {
        // Sold at a 20% discount: list-price revenue at the observed volume
        // is well above realized sales, so a cheaper list price pays off.
        let product = ProductAggregate {
            product: "Desk".to_string(),
            category: None,
            total_sales: 800.0,
            total_quantity: 10.0,
            unit_price: 100.0,
            order_count: 5,
        };
        let suggestion = PriceGridSearch::default()
            .search(&product, &ConstantElasticity::default())
            .unwrap();

        assert!((suggestion.suggested_price - 80.0).abs() < 1e-9);
        assert!(suggestion.revenue_impact_pct > 5.0);
    }

    #[test]
    fn test_grid_search_keeps_price_when_gain_is_small() {
        let product = ProductAggregate {
            product: "Lamp".to_string(),
            category: None,
            total_sales: 1000.0,
            total_quantity: 10.0,
            unit_price: 100.0,
            order_count: 10,
        };
        assert!(
            PriceGridSearch::default()
                .search(&product, &ConstantElasticity::default())
                .is_none()
        );
    }

    #[test]
    fn test_report_mentions_example_product() {
        let segments = vec![segment(SegmentLabel::High, 1)];
        let products = vec![ProductAggregate {
            product: "Desk".to_string(),
            category: None,
            total_sales: 800.0,
            total_quantity: 10.0,
            unit_price: 100.0,
            order_count: 5,
        }];
        let result = PricingEngine::default()
            .optimize(&products, &segments, as_of())
            .unwrap();

        assert!(result.report.starts_with(
            "Price Optimization - 2024-06-01\nOptimized 1 of 1 products. \
             Example: Desk from $100.00 to $80.00"
        ));
    }
}
