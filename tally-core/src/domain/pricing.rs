//! Price optimization types

use serde::{Deserialize, Serialize};

use crate::domain::segment::SegmentLabel;

/// Per-segment pricing decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecommendation {
    pub segment_id: SegmentLabel,
    pub customer_count: u64,
    pub avg_order_value: f64,
    /// Multiplier applied to the current price (1.05 = +5%)
    pub price_adjustment: f64,
    pub strategy: String,
}

/// Sales aggregated per product, the input of the price-grid search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAggregate {
    pub product: String,
    pub category: Option<String>,
    pub total_sales: f64,
    pub total_quantity: f64,
    /// Mean net unit price
    pub unit_price: f64,
    pub order_count: u64,
}

/// A product whose best grid price beats the current revenue by the threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPriceSuggestion {
    pub product: String,
    pub current_price: f64,
    pub suggested_price: f64,
    pub revenue_impact_pct: f64,
}

/// Output of one price-optimization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceOptimizationResult {
    pub recommendations: Vec<PriceRecommendation>,
    #[serde(default)]
    pub product_suggestions: Vec<ProductPriceSuggestion>,
    #[serde(default)]
    pub products_analyzed: usize,
    /// Narrative summary consumed by the trigger and dispatch stages
    pub report: String,
}

impl PriceOptimizationResult {
    pub fn recommendation(&self, label: SegmentLabel) -> Option<&PriceRecommendation> {
        self.recommendations.iter().find(|r| r.segment_id == label)
    }
}
