//! Cash-flow rollup types

use serde::{Deserialize, Serialize};

/// Time-bucket size of a cash-flow rollup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Granularity {
    /// Priority order used when picking the series that supplies totals
    pub const ALL: [Granularity; 4] = [
        Granularity::Weekly,
        Granularity::Monthly,
        Granularity::Quarterly,
        Granularity::Yearly,
    ];

    /// Trailing window length, relative to the latest record date
    pub fn window_days(self) -> i64 {
        match self {
            Granularity::Weekly => 7,
            Granularity::Monthly => 30,
            Granularity::Quarterly => 90,
            Granularity::Yearly => 365,
        }
    }

    /// Bucket labels for this granularity; weekly buckets are relabelled by
    /// the weekday each one covers
    pub fn periods(self) -> &'static [&'static str] {
        match self {
            Granularity::Weekly => &["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"],
            Granularity::Monthly => &["Week 1", "Week 2", "Week 3", "Week 4", "Week 5"],
            Granularity::Quarterly => &["Month 1", "Month 2", "Month 3"],
            Granularity::Yearly => &["Q1", "Q2", "Q3", "Q4"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
            Granularity::Quarterly => "quarterly",
            Granularity::Yearly => "yearly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Granularity::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which granularities a cash-flow run computes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GranularitySelection {
    #[default]
    All,
    Only(Granularity),
}

impl GranularitySelection {
    pub fn granularities(self) -> Vec<Granularity> {
        match self {
            GranularitySelection::All => Granularity::ALL.to_vec(),
            GranularitySelection::Only(granularity) => vec![granularity],
        }
    }
}

impl TryFrom<String> for GranularitySelection {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().eq_ignore_ascii_case("all") {
            return Ok(GranularitySelection::All);
        }
        Granularity::parse(&value)
            .map(GranularitySelection::Only)
            .ok_or_else(|| {
                format!(
                    "Invalid granularity '{}' (expected weekly, monthly, quarterly, yearly or all)",
                    value
                )
            })
    }
}

impl From<GranularitySelection> for String {
    fn from(selection: GranularitySelection) -> Self {
        match selection {
            GranularitySelection::All => "all".to_string(),
            GranularitySelection::Only(granularity) => granularity.as_str().to_string(),
        }
    }
}

/// One time-bucketed rollup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowBucket {
    pub period: String,
    pub sales: f64,
    pub profit: f64,
    pub expenses: f64,
}

impl CashFlowBucket {
    pub fn zero(period: &str) -> Self {
        Self {
            period: period.to_string(),
            sales: 0.0,
            profit: 0.0,
            expenses: 0.0,
        }
    }

    /// Net cash position of the bucket
    pub fn net(&self) -> f64 {
        self.sales - self.expenses
    }
}

/// Buckets for one granularity
///
/// Buckets run oldest to newest; the last one holds the latest order date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowSeries {
    pub granularity: Granularity,
    pub buckets: Vec<CashFlowBucket>,
}

impl CashFlowSeries {
    pub fn total_sales(&self) -> f64 {
        self.buckets.iter().map(|b| b.sales).sum()
    }

    pub fn total_profit(&self) -> f64 {
        self.buckets.iter().map(|b| b.profit).sum()
    }

    pub fn has_data(&self) -> bool {
        self.buckets.iter().any(|b| b.sales != 0.0)
    }
}

/// Direction of the most recent bucket-over-bucket change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Growing,
    Declining,
    Stable,
}

/// Aggregated rollup over one or more granularities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowResult {
    pub series: Vec<CashFlowSeries>,
    pub total_sales: f64,
    pub total_profit: f64,
    /// Profit as a percentage of sales
    pub profit_margin: f64,
    pub trend: Trend,
}

impl CashFlowResult {
    pub fn series(&self, granularity: Granularity) -> Option<&CashFlowSeries> {
        self.series.iter().find(|s| s.granularity == granularity)
    }
}

/// Payload of a per-granularity cash-flow row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowSnapshot {
    pub granularity: Granularity,
    pub buckets: Vec<CashFlowBucket>,
    pub total_sales: f64,
    pub total_profit: f64,
    pub profit_margin: f64,
    pub trend: Trend,
}

/// Per-granularity line of the cash-flow summary row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GranularitySummary {
    pub granularity: Granularity,
    pub data_points: usize,
    pub total_sales: f64,
    pub total_profit: f64,
}

/// Payload of the cash-flow summary row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowSummary {
    pub granularities_processed: Vec<Granularity>,
    pub detailed_results: Vec<GranularitySummary>,
    pub total_records_saved: usize,
    pub total_sales: f64,
    pub total_profit: f64,
    pub profit_margin: f64,
    pub trend: Trend,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_parsing() {
        let all: GranularitySelection = serde_json::from_value(serde_json::json!("all")).unwrap();
        assert_eq!(all, GranularitySelection::All);
        assert_eq!(all.granularities().len(), 4);

        let weekly: GranularitySelection =
            serde_json::from_value(serde_json::json!("Weekly")).unwrap();
        assert_eq!(weekly, GranularitySelection::Only(Granularity::Weekly));

        let invalid = serde_json::from_value::<GranularitySelection>(serde_json::json!("daily"));
        assert!(invalid.is_err());
    }

    #[test]
    fn test_period_sets_are_complete() {
        assert_eq!(Granularity::Weekly.periods().len(), 7);
        assert_eq!(Granularity::Monthly.periods().len(), 5);
        assert_eq!(Granularity::Quarterly.periods().len(), 3);
        assert_eq!(Granularity::Yearly.periods().len(), 4);
    }

    #[test]
    fn test_bucket_net() {
        let bucket = CashFlowBucket {
            period: "Mon".to_string(),
            sales: 100.0,
            profit: 30.0,
            expenses: 70.0,
        };
        assert_eq!(bucket.net(), 30.0);
    }
}
