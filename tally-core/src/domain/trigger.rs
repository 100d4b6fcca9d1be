//! Threshold trigger types

use serde::{Deserialize, Serialize};

use crate::domain::cashflow::{CashFlowBucket, Granularity};
use crate::domain::segment::{Segment, SegmentLabel};

/// Alert condition kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    HighValueSegment,
    LowCashFlow,
    CustomerBehaviorIncrease,
    CustomerBehaviorDecrease,
    SaleSpike,
    SaleLoss,
    PriceOptimization,
}

impl TriggerType {
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerType::HighValueSegment => "high_value_segment",
            TriggerType::LowCashFlow => "low_cash_flow",
            TriggerType::CustomerBehaviorIncrease => "customer_behavior_increase",
            TriggerType::CustomerBehaviorDecrease => "customer_behavior_decrease",
            TriggerType::SaleSpike => "sale_spike",
            TriggerType::SaleLoss => "sale_loss",
            TriggerType::PriceOptimization => "price_optimization",
        }
    }
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fired alert condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub trigger_type: TriggerType,
    /// Human-readable explanation including magnitude
    pub context: String,
    pub value: f64,
    pub threshold: f64,
    /// Baseline value for delta rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_id: Option<SegmentLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
}

/// The inputs a threshold check evaluated
///
/// Persisted alongside the triggers so that the next check can use them as
/// its historical baseline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerSnapshot {
    pub segments: Vec<Segment>,
    pub cashflow: Vec<CashFlowBucket>,
    #[serde(default)]
    pub cashflow_granularity: Option<Granularity>,
}

/// Payload of a threshold-check row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdReport {
    pub triggers: Vec<Trigger>,
    pub inputs: TriggerSnapshot,
    /// Whether a historical baseline was available for delta rules
    pub baseline_used: bool,
}
