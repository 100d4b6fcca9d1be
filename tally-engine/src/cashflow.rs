//! Cash-Flow Rollup Engine
//!
//! Buckets sales into trailing windows for each granularity, relative to the
//! latest order date in the dataset:
//!
//! | Granularity | Window   | Buckets            | Bucket span |
//! |-------------|----------|--------------------|-------------|
//! | weekly      | 7 days   | one per weekday    | 1 day       |
//! | monthly     | 30 days  | Week 1 .. Week 5   | 7 days      |
//! | quarterly   | 90 days  | Month 1 .. Month 3 | 30 days     |
//! | yearly      | 365 days | Q1 .. Q4           | 365 / 4     |
//!
//! Buckets run oldest to newest, so the last bucket always holds the latest
//! date and the one before it is the prior period. Weekly buckets are
//! labelled with the weekday they cover, which means the labels rotate to
//! end on the latest date's weekday. Buckets without data are zero-filled so
//! every series is complete.

use chrono::{Datelike, Duration, NaiveDate};
use tally_core::domain::cashflow::{
    CashFlowBucket, CashFlowResult, CashFlowSeries, Granularity, GranularitySelection, Trend,
};
use tally_core::domain::sales::SalesRecord;

use crate::error::{EngineError, Result};

/// Bucket-over-bucket change (percent) below which the trend is stable
const TREND_BAND_PCT: f64 = 5.0;

/// A dated sales amount, the only input a rollup needs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatedAmount {
    pub date: NaiveDate,
    pub sales: f64,
}

/// Produces one complete, ordered series for a granularity
pub trait CashFlowStrategy: Send + Sync {
    fn rollup(
        &self,
        amounts: &[DatedAmount],
        latest: NaiveDate,
        granularity: Granularity,
    ) -> CashFlowSeries;
}

/// Splits every bucket's sales by a fixed cost ratio
#[derive(Debug, Clone)]
pub struct FixedRatioRollup {
    /// Share of sales booked as expenses; the remainder is profit
    pub expense_ratio: f64,
}

impl Default for FixedRatioRollup {
    fn default() -> Self {
        Self { expense_ratio: 0.7 }
    }
}

impl CashFlowStrategy for FixedRatioRollup {
    fn rollup(
        &self,
        amounts: &[DatedAmount],
        latest: NaiveDate,
        granularity: Granularity,
    ) -> CashFlowSeries {
        let periods = labels(latest, granularity);
        let mut sales = vec![0.0_f64; periods.len()];

        for amount in amounts {
            let age = (latest - amount.date).num_days();
            if age < 0 || age >= granularity.window_days() {
                continue;
            }
            sales[periods.len() - 1 - periods_back(age, granularity)] += amount.sales;
        }

        let buckets = periods
            .into_iter()
            .zip(sales)
            .map(|(period, sales)| {
                let expenses = sales * self.expense_ratio;
                CashFlowBucket {
                    period,
                    sales,
                    profit: sales - expenses,
                    expenses,
                }
            })
            .collect();

        CashFlowSeries {
            granularity,
            buckets,
        }
    }
}

/// How many buckets before the latest one a record of the given age lands in
///
/// `age` must lie inside the granularity's window.
fn periods_back(age: i64, granularity: Granularity) -> usize {
    let back = match granularity {
        Granularity::Weekly => age,
        Granularity::Monthly => age / 7,
        Granularity::Quarterly => age / 30,
        Granularity::Yearly => age * 4 / granularity.window_days(),
    };
    back as usize
}

/// Bucket labels, oldest first
fn labels(latest: NaiveDate, granularity: Granularity) -> Vec<String> {
    let periods = granularity.periods();
    match granularity {
        Granularity::Weekly => (0..periods.len())
            .rev()
            .map(|back| {
                let day = latest - Duration::days(back as i64);
                periods[day.weekday().num_days_from_monday() as usize].to_string()
            })
            .collect(),
        _ => periods.iter().map(|p| p.to_string()).collect(),
    }
}

pub struct CashFlowEngine {
    strategy: Box<dyn CashFlowStrategy>,
}

impl Default for CashFlowEngine {
    fn default() -> Self {
        Self::new(FixedRatioRollup::default())
    }
}

impl CashFlowEngine {
    pub fn new(strategy: impl CashFlowStrategy + 'static) -> Self {
        Self {
            strategy: Box::new(strategy),
        }
    }

    /// Roll up sales for every selected granularity
    ///
    /// Records without a date or amount are skipped. Totals and trend come
    /// from the first series, in weekly -> yearly order, that has data.
    pub fn rollup(
        &self,
        records: &[SalesRecord],
        selection: GranularitySelection,
    ) -> Result<CashFlowResult> {
        let amounts: Vec<DatedAmount> = records
            .iter()
            .filter_map(|r| match (r.order_date, r.sales) {
                (Some(date), Some(sales)) => Some(DatedAmount { date, sales }),
                _ => None,
            })
            .collect();

        let skipped = records.len() - amounts.len();
        if skipped > 0 {
            tracing::debug!("Skipped {} records without a date or amount", skipped);
        }

        let latest = amounts
            .iter()
            .map(|a| a.date)
            .max()
            .ok_or_else(|| EngineError::NoData("No valid sales data available".to_string()))?;

        let series: Vec<CashFlowSeries> = selection
            .granularities()
            .into_iter()
            .map(|g| self.strategy.rollup(&amounts, latest, g))
            .collect();

        let primary = Granularity::ALL
            .iter()
            .filter_map(|&g| series.iter().find(|s| s.granularity == g))
            .find(|s| s.has_data());

        let (total_sales, total_profit, trend) = match primary {
            Some(s) => (s.total_sales(), s.total_profit(), trend(&s.buckets)),
            None => (0.0, 0.0, Trend::Stable),
        };

        tracing::info!(
            "Cash-flow rollup over {} records as of {}: {} series, total sales {:.2}",
            amounts.len(),
            latest,
            series.len(),
            total_sales
        );

        Ok(CashFlowResult {
            series,
            total_sales,
            total_profit,
            profit_margin: margin(total_sales, total_profit),
            trend,
        })
    }
}

/// Profit as a percentage of sales, 0 when there are no sales
pub fn margin(sales: f64, profit: f64) -> f64 {
    if sales > 0.0 { profit / sales * 100.0 } else { 0.0 }
}

/// Classify the change between the last two buckets
pub fn trend(buckets: &[CashFlowBucket]) -> Trend {
    let [.., previous, last] = buckets else {
        return Trend::Stable;
    };

    if previous.sales == 0.0 {
        return if last.sales > 0.0 {
            Trend::Growing
        } else {
            Trend::Stable
        };
    }

    let change = (last.sales - previous.sales) / previous.sales * 100.0;
    if change > TREND_BAND_PCT {
        Trend::Growing
    } else if change < -TREND_BAND_PCT {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(date: NaiveDate, sales: f64) -> SalesRecord {
        SalesRecord::new("c1", date, sales)
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_weekly_is_complete_and_balanced() {
        // 2024-06-05 is a Wednesday
        let records = vec![
            record(ymd(2024, 6, 5), 100.0),
            record(ymd(2024, 6, 3), 50.0),
            record(ymd(2024, 5, 20), 999.0),
        ];
        let result = CashFlowEngine::default()
            .rollup(&records, GranularitySelection::Only(Granularity::Weekly))
            .unwrap();

        let weekly = result.series(Granularity::Weekly).unwrap();
        let periods: Vec<&str> = weekly.buckets.iter().map(|b| b.period.as_str()).collect();
        assert_eq!(periods, vec!["Thu", "Fri", "Sat", "Sun", "Mon", "Tue", "Wed"]);
        assert_eq!(weekly.buckets[4].sales, 50.0);
        assert_eq!(weekly.buckets[5].sales, 0.0);
        assert_eq!(weekly.buckets[6].sales, 100.0);

        let sales: f64 = weekly.buckets.iter().map(|b| b.sales).sum();
        let profit: f64 = weekly.buckets.iter().map(|b| b.profit).sum();
        let expenses: f64 = weekly.buckets.iter().map(|b| b.expenses).sum();
        assert!((profit + expenses - sales).abs() < 1e-9);
        assert!((result.total_sales - 150.0).abs() < 1e-9);
        assert!((result.profit_margin - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_granularities() {
        let records = vec![
            record(ymd(2024, 3, 30), 40.0),
            record(ymd(2024, 2, 10), 60.0),
            record(ymd(2023, 11, 1), 10.0),
        ];
        let result = CashFlowEngine::default()
            .rollup(&records, GranularitySelection::All)
            .unwrap();

        assert_eq!(result.series.len(), 4);

        let monthly = result.series(Granularity::Monthly).unwrap();
        assert_eq!(monthly.buckets.len(), 5);
        assert_eq!(monthly.buckets[4].sales, 40.0);

        let quarterly = result.series(Granularity::Quarterly).unwrap();
        assert_eq!(quarterly.buckets[1].sales, 60.0);
        assert_eq!(quarterly.buckets[2].sales, 40.0);

        // November is 150 days back, one quarter before the newest
        let yearly = result.series(Granularity::Yearly).unwrap();
        assert_eq!(yearly.buckets[2].sales, 10.0);
        assert_eq!(yearly.buckets[3].sales, 100.0);

        // weekly has the March 30 order, so totals come from it
        assert_eq!(result.total_sales, 40.0);
    }

    #[test]
    fn test_latest_period_is_last_bucket() {
        let records = vec![
            record(ymd(2024, 6, 3), 10000.0),
            record(ymd(2024, 6, 10), 30000.0),
            record(ymd(2024, 5, 25), 8000.0),
            record(ymd(2024, 5, 30), 8000.0),
        ];
        let result = CashFlowEngine::default()
            .rollup(&records, GranularitySelection::Only(Granularity::Monthly))
            .unwrap();

        let monthly = result.series(Granularity::Monthly).unwrap();
        let sales: Vec<f64> = monthly.buckets.iter().map(|b| b.sales).collect();
        assert_eq!(sales, vec![0.0, 0.0, 8000.0, 18000.0, 30000.0]);
        assert_eq!(monthly.buckets[4].period, "Week 5");
        assert_eq!(result.trend, Trend::Growing);
    }

    #[test]
    fn test_quarterly_months_do_not_merge() {
        let records = vec![
            record(ymd(2024, 3, 20), 111.0),
            record(ymd(2024, 6, 15), 222.0),
        ];
        let result = CashFlowEngine::default()
            .rollup(
                &records,
                GranularitySelection::Only(Granularity::Quarterly),
            )
            .unwrap();

        let quarterly = result.series(Granularity::Quarterly).unwrap();
        let sales: Vec<f64> = quarterly.buckets.iter().map(|b| b.sales).collect();
        assert_eq!(sales, vec![111.0, 0.0, 222.0]);
    }

    #[test]
    fn test_totals_fall_through_to_first_series_with_data() {
        let records = vec![record(ymd(2024, 3, 30), 40.0)];
        let result = CashFlowEngine::default()
            .rollup(
                &records,
                GranularitySelection::Only(Granularity::Quarterly),
            )
            .unwrap();
        assert_eq!(result.total_sales, 40.0);
    }

    #[test]
    fn test_no_usable_records_is_no_data() {
        let records = vec![SalesRecord {
            customer_id: Some("c1".to_string()),
            sales: Some(10.0),
            ..Default::default()
        }];
        let err = CashFlowEngine::default()
            .rollup(&records, GranularitySelection::All)
            .unwrap_err();
        assert!(err.is_no_data());
    }

    #[test]
    fn test_trend_band() {
        let bucket = |sales| CashFlowBucket {
            period: "p".to_string(),
            sales,
            profit: 0.0,
            expenses: 0.0,
        };
        assert_eq!(trend(&[bucket(100.0), bucket(110.0)]), Trend::Growing);
        assert_eq!(trend(&[bucket(100.0), bucket(90.0)]), Trend::Declining);
        assert_eq!(trend(&[bucket(100.0), bucket(103.0)]), Trend::Stable);
        assert_eq!(trend(&[bucket(0.0), bucket(0.0)]), Trend::Stable);
        assert_eq!(trend(&[bucket(10.0)]), Trend::Stable);
    }
}
