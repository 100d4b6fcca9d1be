//! Notification derivation
//!
//! Every trigger becomes one notification. Type and priority follow a fixed
//! mapping from the trigger type; alert-like triggers are `automation` and
//! get an "Alert:" title.

use chrono::{DateTime, Utc};
use tally_core::domain::notification::{Notification, NotificationKind, Priority};
use tally_core::domain::trigger::{Trigger, TriggerType};
use uuid::Uuid;

/// Notification type, priority and base title for a trigger type
pub fn classify(trigger_type: TriggerType) -> (NotificationKind, Priority, &'static str) {
    use NotificationKind::*;
    match trigger_type {
        TriggerType::LowCashFlow => (Automation, Priority::High, "Low Cash Flow"),
        TriggerType::CustomerBehaviorDecrease => {
            (Automation, Priority::High, "High-Value Customer Loss")
        }
        TriggerType::SaleLoss => (Automation, Priority::High, "Sales Drop"),
        TriggerType::CustomerBehaviorIncrease => {
            (Info, Priority::Medium, "High-Value Customer Growth")
        }
        TriggerType::SaleSpike => (Info, Priority::Medium, "Sales Spike"),
        TriggerType::HighValueSegment => (Info, Priority::Medium, "High-Value Segment"),
        TriggerType::PriceOptimization => {
            (Info, Priority::Low, "New Price Optimization Available")
        }
    }
}

pub fn notify(triggers: &[Trigger], now: DateTime<Utc>) -> Vec<Notification> {
    triggers
        .iter()
        .map(|trigger| {
            let (kind, priority, title) = classify(trigger.trigger_type);
            let title = match kind {
                NotificationKind::Automation => format!("Alert: {}", title),
                NotificationKind::Info => title.to_string(),
            };
            Notification {
                id: Uuid::new_v4(),
                title,
                message: trigger.context.clone(),
                kind,
                priority,
                trigger_type: trigger.trigger_type,
                read: false,
                timestamp: now,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trigger(trigger_type: TriggerType) -> Trigger {
        Trigger {
            trigger_type,
            context: format!("{} fired", trigger_type),
            value: 1.0,
            threshold: 1.0,
            previous: None,
            segment_id: None,
            period: None,
        }
    }

    #[test]
    fn test_mapping() {
        let triggers = vec![
            trigger(TriggerType::LowCashFlow),
            trigger(TriggerType::SaleSpike),
            trigger(TriggerType::PriceOptimization),
        ];
        let notifications = notify(&triggers, Utc::now());

        assert_eq!(notifications.len(), 3);
        assert_eq!(notifications[0].kind, NotificationKind::Automation);
        assert_eq!(notifications[0].priority, Priority::High);
        assert_eq!(notifications[0].title, "Alert: Low Cash Flow");
        assert_eq!(notifications[0].message, "low_cash_flow fired");

        assert_eq!(notifications[1].kind, NotificationKind::Info);
        assert_eq!(notifications[1].priority, Priority::Medium);
        assert_eq!(notifications[2].priority, Priority::Low);
        assert!(notifications.iter().all(|n| !n.read));
    }

    #[test]
    fn test_alert_types_are_automation() {
        for kind in [
            TriggerType::LowCashFlow,
            TriggerType::CustomerBehaviorDecrease,
            TriggerType::SaleLoss,
        ] {
            assert_eq!(classify(kind).0, NotificationKind::Automation);
        }
        for kind in [
            TriggerType::CustomerBehaviorIncrease,
            TriggerType::SaleSpike,
            TriggerType::HighValueSegment,
            TriggerType::PriceOptimization,
        ] {
            assert_eq!(classify(kind).0, NotificationKind::Info);
        }
    }

    #[test]
    fn test_no_triggers() {
        assert!(notify(&[], Utc::now()).is_empty());
    }
}
