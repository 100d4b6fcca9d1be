//! Threshold/Trigger Engine
//!
//! Compares the current segmentation and cash-flow snapshot against fixed
//! thresholds and against the previous snapshot. Every rule is independent;
//! any number may fire in one evaluation, and none firing is a valid result.
//!
//! Delta rules need a baseline. When it is absent, or cannot support the
//! comparison, the rule is skipped rather than reported as an error.

use tally_core::domain::cashflow::CashFlowBucket;
use tally_core::domain::segment::{Segment, SegmentLabel};
use tally_core::domain::trigger::{Trigger, TriggerType};

/// Rule thresholds
#[derive(Debug, Clone)]
pub struct ThresholdConfig {
    /// Average order value above which a segment is flagged
    pub high_value_aov: f64,
    /// Period revenue below which cash flow is flagged
    pub low_cash_flow: f64,
    /// High-segment customer count change, in percent
    pub behavior_change_pct: f64,
    /// Period-over-period net change, in percent
    pub sales_change_pct: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            high_value_aov: 1000.0,
            low_cash_flow: 5000.0,
            behavior_change_pct: 10.0,
            sales_change_pct: 10.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ThresholdEngine {
    config: ThresholdConfig,
}

impl ThresholdEngine {
    pub fn new(config: ThresholdConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(
        &self,
        current_segments: &[Segment],
        current_cashflow: &[CashFlowBucket],
        historical_segments: Option<&[Segment]>,
        historical_cashflow: Option<&[CashFlowBucket]>,
        price_narrative: Option<&str>,
    ) -> Vec<Trigger> {
        let mut triggers = Vec::new();

        self.high_value_segments(current_segments, &mut triggers);
        self.low_cash_flow(current_cashflow, &mut triggers);
        if let Some(trigger) = self.customer_behavior(current_segments, historical_segments) {
            triggers.push(trigger);
        }
        if let Some(trigger) = self.sales_change(current_cashflow, historical_cashflow) {
            triggers.push(trigger);
        }
        if let Some(narrative) = price_narrative.filter(|n| !n.trim().is_empty()) {
            triggers.push(Trigger {
                trigger_type: TriggerType::PriceOptimization,
                context: narrative.to_string(),
                value: 0.0,
                threshold: 0.0,
                previous: None,
                segment_id: None,
                period: None,
            });
        }

        tracing::info!("Threshold check fired {} triggers", triggers.len());
        triggers
    }

    fn high_value_segments(&self, segments: &[Segment], out: &mut Vec<Trigger>) {
        let threshold = self.config.high_value_aov;
        for segment in segments.iter().filter(|s| s.avg_order_value > threshold) {
            out.push(Trigger {
                trigger_type: TriggerType::HighValueSegment,
                context: format!(
                    "{} average order value ${:.2} exceeds ${:.2}",
                    segment.name, segment.avg_order_value, threshold
                ),
                value: segment.avg_order_value,
                threshold,
                previous: None,
                segment_id: Some(segment.id),
                period: None,
            });
        }
    }

    fn low_cash_flow(&self, buckets: &[CashFlowBucket], out: &mut Vec<Trigger>) {
        let threshold = self.config.low_cash_flow;
        for bucket in buckets.iter().filter(|b| b.sales < threshold) {
            out.push(Trigger {
                trigger_type: TriggerType::LowCashFlow,
                context: format!(
                    "Revenue for {} is ${:.2}, below ${:.2}",
                    bucket.period, bucket.sales, threshold
                ),
                value: bucket.sales,
                threshold,
                previous: None,
                segment_id: None,
                period: Some(bucket.period.clone()),
            });
        }
    }

    /// High-segment customer count versus the baseline
    fn customer_behavior(
        &self,
        current: &[Segment],
        historical: Option<&[Segment]>,
    ) -> Option<Trigger> {
        let high = |segments: &[Segment]| {
            segments
                .iter()
                .find(|s| s.id == SegmentLabel::High)
                .map(|s| s.customer_count as f64)
        };

        let now = high(current)?;
        let before = high(historical?)?;
        if before <= 0.0 {
            return None;
        }

        let change = (now - before) / before * 100.0;
        let threshold = self.config.behavior_change_pct;
        let (trigger_type, direction) = if change > threshold {
            (TriggerType::CustomerBehaviorIncrease, "increased")
        } else if -change > threshold {
            (TriggerType::CustomerBehaviorDecrease, "decreased")
        } else {
            return None;
        };

        Some(Trigger {
            trigger_type,
            context: format!(
                "High-value customers {} by {:.2}% ({} to {})",
                direction,
                change.abs(),
                before,
                now
            ),
            value: change.abs(),
            threshold,
            previous: Some(before),
            segment_id: Some(SegmentLabel::High),
            period: None,
        })
    }

    /// Net value of the latest period versus the one before it
    ///
    /// With a single current bucket, the last baseline bucket stands in for
    /// the prior period.
    fn sales_change(
        &self,
        current: &[CashFlowBucket],
        historical: Option<&[CashFlowBucket]>,
    ) -> Option<Trigger> {
        let (last, prior) = match current {
            [.., prior, last] => (last, prior),
            [last] => (last, historical?.last()?),
            [] => return None,
        };

        let before = prior.net();
        if before == 0.0 {
            return None;
        }

        let change = (last.net() - before) / before.abs() * 100.0;
        let threshold = self.config.sales_change_pct;
        let (trigger_type, direction) = if change > threshold {
            (TriggerType::SaleSpike, "rose")
        } else if -change > threshold {
            (TriggerType::SaleLoss, "fell")
        } else {
            return None;
        };

        Some(Trigger {
            trigger_type,
            context: format!(
                "Net cash flow for {} {} by {:.2}% ({:.2} to {:.2})",
                last.period,
                direction,
                change.abs(),
                before,
                last.net()
            ),
            value: change.abs(),
            threshold,
            previous: Some(before),
            segment_id: None,
            period: Some(last.period.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cashflow::CashFlowEngine;
    use chrono::NaiveDate;
    use tally_core::domain::cashflow::{Granularity, GranularitySelection};
    use tally_core::domain::sales::SalesRecord;

    fn high(customers: u64, aov: f64) -> Segment {
        Segment {
            customer_count: customers,
            avg_order_value: aov,
            ..Segment::empty(SegmentLabel::High)
        }
    }

    fn bucket(period: &str, sales: f64) -> CashFlowBucket {
        CashFlowBucket {
            period: period.to_string(),
            sales,
            profit: sales * 0.3,
            expenses: sales * 0.7,
        }
    }

    fn fired(triggers: &[Trigger], kind: TriggerType) -> Vec<&Trigger> {
        triggers.iter().filter(|t| t.trigger_type == kind).collect()
    }

    #[test]
    fn test_high_customer_decrease_fires() {
        let engine = ThresholdEngine::default();
        let current = [high(100, 50.0)];
        let historical = [high(120, 50.0)];
        let triggers = engine.evaluate(&current, &[], Some(historical.as_slice()), None, None);

        let decrease = fired(&triggers, TriggerType::CustomerBehaviorDecrease);
        assert_eq!(decrease.len(), 1);
        assert!((decrease[0].value - 16.666_666).abs() < 1e-3);
        assert_eq!(decrease[0].previous, Some(120.0));
        assert!(decrease[0].context.contains("16.67%"));
    }

    #[test]
    fn test_small_decrease_does_not_fire() {
        let engine = ThresholdEngine::default();
        let current = [high(115, 50.0)];
        let historical = [high(120, 50.0)];
        let triggers = engine.evaluate(&current, &[], Some(historical.as_slice()), None, None);
        assert!(triggers.is_empty());
    }

    #[test]
    fn test_increase_fires() {
        let engine = ThresholdEngine::default();
        let triggers = engine.evaluate(
            &[high(150, 50.0)],
            &[],
            Some([high(100, 50.0)].as_slice()),
            None,
            None,
        );
        assert_eq!(fired(&triggers, TriggerType::CustomerBehaviorIncrease).len(), 1);
    }

    #[test]
    fn test_behavior_rule_skipped_without_baseline() {
        let engine = ThresholdEngine::default();
        assert!(engine.evaluate(&[high(10, 50.0)], &[], None, None, None).is_empty());
        assert!(
            engine
                .evaluate(&[high(10, 50.0)], &[], Some([high(0, 0.0)].as_slice()), None, None)
                .is_empty()
        );
    }

    #[test]
    fn test_static_thresholds() {
        let engine = ThresholdEngine::default();
        let triggers = engine.evaluate(
            &[high(3, 1500.0)],
            &[bucket("Week 1", 6000.0), bucket("Week 2", 6100.0), bucket("Week 3", 4000.0)],
            None,
            None,
            None,
        );

        let high_value = fired(&triggers, TriggerType::HighValueSegment);
        assert_eq!(high_value.len(), 1);
        assert_eq!(high_value[0].segment_id, Some(SegmentLabel::High));

        let low = fired(&triggers, TriggerType::LowCashFlow);
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].period.as_deref(), Some("Week 3"));
    }

    #[test]
    fn test_sale_spike_and_loss() {
        let engine = ThresholdEngine::default();

        let spike = engine.evaluate(
            &[],
            &[bucket("Q1", 10000.0), bucket("Q2", 12000.0)],
            None,
            None,
            None,
        );
        assert_eq!(fired(&spike, TriggerType::SaleSpike).len(), 1);

        let loss = engine.evaluate(
            &[],
            &[bucket("Q1", 10000.0), bucket("Q2", 8000.0)],
            None,
            None,
            None,
        );
        let loss = fired(&loss, TriggerType::SaleLoss);
        assert_eq!(loss.len(), 1);
        assert_eq!(loss[0].period.as_deref(), Some("Q2"));
        assert!((loss[0].value - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_sale_change_guards_zero_prior() {
        let engine = ThresholdEngine::default();
        let triggers = engine.evaluate(
            &[],
            &[bucket("Mon", 0.0), bucket("Tue", 9000.0)],
            None,
            None,
            None,
        );
        assert!(fired(&triggers, TriggerType::SaleSpike).is_empty());
    }

    #[test]
    fn test_single_bucket_uses_baseline() {
        let engine = ThresholdEngine::default();
        let historical = [bucket("Q4", 10000.0)];
        let triggers = engine.evaluate(
            &[],
            &[bucket("Q1", 20000.0)],
            None,
            Some(historical.as_slice()),
            None,
        );
        assert_eq!(fired(&triggers, TriggerType::SaleSpike).len(), 1);
    }

    #[test]
    fn test_spike_in_latest_week_of_rollup() {
        let date = |m, d| NaiveDate::from_ymd_opt(2024, m, d).unwrap();
        let records = vec![
            SalesRecord::new("c1", date(6, 3), 10000.0),
            SalesRecord::new("c2", date(6, 10), 30000.0),
            SalesRecord::new("c3", date(5, 25), 8000.0),
            SalesRecord::new("c4", date(5, 30), 8000.0),
        ];
        let rollup = CashFlowEngine::default()
            .rollup(&records, GranularitySelection::Only(Granularity::Monthly))
            .unwrap();
        let monthly = rollup.series(Granularity::Monthly).unwrap();

        let triggers = ThresholdEngine::default().evaluate(&[], &monthly.buckets, None, None, None);

        let spike = fired(&triggers, TriggerType::SaleSpike);
        assert_eq!(spike.len(), 1);
        assert_eq!(spike[0].period.as_deref(), Some("Week 5"));
        assert!((spike[0].value - 66.666_666).abs() < 1e-3);
        assert!(fired(&triggers, TriggerType::SaleLoss).is_empty());
    }

    #[test]
    fn test_price_narrative_always_fires() {
        let engine = ThresholdEngine::default();
        let triggers = engine.evaluate(&[], &[], None, None, Some("Optimized 0 of 3 products."));
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].trigger_type, TriggerType::PriceOptimization);
    }
}
