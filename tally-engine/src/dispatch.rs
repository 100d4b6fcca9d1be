//! Dispatch Engine
//!
//! Renders one message per populated segment from a per-label template,
//! plus one admin message per `automation` notification, and hands each to
//! a [`MessageTransport`]. Individual send failures and unknown recipients
//! are counted, never propagated.

use async_trait::async_trait;
use std::collections::HashMap;
use tally_core::domain::notification::{
    DispatchReport, Notification, NotificationKind, OutboundMessage,
};
use tally_core::domain::segment::{Segment, SegmentLabel};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Send failed: {0}")]
pub struct TransportError(pub String);

/// Delivers rendered messages
///
/// Retry policy, if any, belongs to the transport.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError>;
}

/// Subject and body template for a segment tier
#[derive(Debug, Clone)]
pub struct MessageTemplate {
    pub subject: &'static str,
    pub greeting: &'static str,
}

impl MessageTemplate {
    /// Template for a label; labels without their own template use the low one
    pub fn for_label(label: SegmentLabel) -> Self {
        match label {
            SegmentLabel::High => Self {
                subject: "Welcome to our VIP Experience",
                greeting: "Dear High-Value Customer,\n\nThank you for your significant contributions!",
            },
            SegmentLabel::Mid => Self {
                subject: "This Week's Best Offers",
                greeting: "Dear Mid-Value Customer,\n\nWe appreciate your support!",
            },
            _ => Self {
                subject: "48-Hour Flash Sale - Up to 60% Off",
                greeting: "Dear Customer,\n\nWe're here to help you grow!",
            },
        }
    }

    pub fn render(&self, segment: &Segment, report: &str, price_report: &str) -> String {
        format!(
            "{}\nYour segment report: {}\nSegment stats: {} customers, ${:.2} revenue, top categories: {}.\n{}\nBest regards,\nCustomer Success Team",
            self.greeting,
            report,
            segment.customer_count,
            segment.total_revenue,
            segment.top_categories.join(", "),
            price_report
        )
    }
}

/// Everything a dispatch run reads
#[derive(Debug, Clone, Copy)]
pub struct DispatchInput<'a> {
    pub segments: &'a [Segment],
    pub reports: &'a [String],
    pub price_report: Option<&'a str>,
    pub notifications: &'a [Notification],
    /// Segment label -> address
    pub recipients: &'a HashMap<String, String>,
    pub admin: &'a str,
}

/// Address for a segment label, falling back to `<label>@example.com`
pub fn recipient_for(recipients: &HashMap<String, String>, label: SegmentLabel) -> String {
    recipients
        .get(label.as_str())
        .cloned()
        .unwrap_or_else(|| format!("{}@example.com", label.as_str()))
}

/// Render every outbound message without sending anything
pub fn render_messages(input: &DispatchInput<'_>) -> Vec<OutboundMessage> {
    let price_report = input
        .price_report
        .unwrap_or("No price optimization data available.");

    let mut messages: Vec<OutboundMessage> = input
        .segments
        .iter()
        .filter(|s| !s.is_empty())
        .map(|segment| {
            let report = input
                .reports
                .iter()
                .find(|r| r.starts_with(&segment.name))
                .map(String::as_str)
                .unwrap_or("No report available");
            let template = MessageTemplate::for_label(segment.id);
            OutboundMessage {
                to: recipient_for(input.recipients, segment.id),
                subject: template.subject.to_string(),
                body: template.render(segment, report, price_report),
            }
        })
        .collect();

    messages.extend(
        input
            .notifications
            .iter()
            .filter(|n| n.kind == NotificationKind::Automation)
            .map(|n| OutboundMessage {
                to: input.admin.to_string(),
                subject: n.title.clone(),
                body: n.message.clone(),
            }),
    );

    messages
}

/// Render and send every message, counting successes and failures
pub async fn dispatch(
    transport: &dyn MessageTransport,
    input: &DispatchInput<'_>,
) -> DispatchReport {
    let mut report = DispatchReport::default();

    for message in render_messages(input) {
        match transport.send(&message).await {
            Ok(()) => {
                report.sent_count += 1;
                report.messages.push(message);
            }
            Err(e) => {
                tracing::warn!("Failed to send '{}' to {}: {}", message.subject, message.to, e);
                report.failed_count += 1;
            }
        }
    }

    tracing::info!(
        "Dispatch finished: {} sent, {} failed",
        report.sent_count,
        report.failed_count
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;
    use tally_core::domain::notification::Priority;
    use tally_core::domain::trigger::TriggerType;
    use uuid::Uuid;

    /// Records sent messages; fails for one address
    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<OutboundMessage>>,
        reject: Option<String>,
    }

    #[async_trait]
    impl MessageTransport for RecordingTransport {
        async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
            if self.reject.as_deref() == Some(message.to.as_str()) {
                return Err(TransportError("mailbox unavailable".to_string()));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn segment(label: SegmentLabel, customers: u64) -> Segment {
        Segment {
            customer_count: customers,
            total_revenue: 250.0,
            top_categories: vec!["Technology".to_string()],
            ..Segment::empty(label)
        }
    }

    fn notification(kind: NotificationKind) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            title: "Alert: Low Cash Flow".to_string(),
            message: "Revenue for Mon is $0.00".to_string(),
            kind,
            priority: Priority::High,
            trigger_type: TriggerType::LowCashFlow,
            read: false,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_dispatch_per_segment_and_admin_alerts() {
        let segments = vec![
            segment(SegmentLabel::High, 2),
            segment(SegmentLabel::Mid, 0),
            segment(SegmentLabel::Low, 5),
        ];
        let reports = vec!["High Customers: 2 customers".to_string()];
        let notifications = vec![
            notification(NotificationKind::Automation),
            notification(NotificationKind::Info),
        ];
        let recipients = HashMap::from([("high".to_string(), "vip@shop.test".to_string())]);
        let transport = RecordingTransport::default();

        let report = dispatch(
            &transport,
            &DispatchInput {
                segments: &segments,
                reports: &reports,
                price_report: Some("Optimized 1 of 4 products."),
                notifications: &notifications,
                recipients: &recipients,
                admin: "admin@example.com",
            },
        )
        .await;

        assert_eq!(report.sent_count, 3);
        assert_eq!(report.failed_count, 0);

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].to, "vip@shop.test");
        assert_eq!(sent[0].subject, "Welcome to our VIP Experience");
        assert!(sent[0].body.contains("High Customers: 2 customers"));
        assert!(sent[0].body.contains("Optimized 1 of 4 products."));

        assert_eq!(sent[1].to, "low@example.com");
        assert!(sent[1].body.contains("No report available"));

        assert_eq!(sent[2].to, "admin@example.com");
        assert_eq!(sent[2].subject, "Alert: Low Cash Flow");
    }

    #[tokio::test]
    async fn test_failed_send_is_counted() {
        let segments = vec![segment(SegmentLabel::High, 1), segment(SegmentLabel::Low, 1)];
        let transport = RecordingTransport {
            reject: Some("high@example.com".to_string()),
            ..Default::default()
        };
        let recipients = HashMap::new();

        let report = dispatch(
            &transport,
            &DispatchInput {
                segments: &segments,
                reports: &[],
                price_report: None,
                notifications: &[],
                recipients: &recipients,
                admin: "admin@example.com",
            },
        )
        .await;

        assert_eq!(report.sent_count, 1);
        assert_eq!(report.failed_count, 1);
        assert_eq!(report.messages.len(), 1);
    }

    #[test]
    fn test_unknown_labels_use_low_template() {
        assert_eq!(
            MessageTemplate::for_label(SegmentLabel::UpperMid).subject,
            MessageTemplate::for_label(SegmentLabel::Low).subject
        );
    }
}
