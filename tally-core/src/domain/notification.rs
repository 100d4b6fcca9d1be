//! Notification and dispatch types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::trigger::TriggerType;

/// Notification category shown to operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Alert or escalation that needs action
    Automation,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// A notification derived from a trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub priority: Priority,
    pub trigger_type: TriggerType,
    /// The only field that changes after creation
    pub read: bool,
    pub timestamp: DateTime<Utc>,
}

/// Payload of a notification row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationBatch {
    pub notifications: Vec<Notification>,
}

/// A rendered message handed to the messaging transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Payload of a dispatch row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub sent_count: usize,
    pub failed_count: usize,
    pub messages: Vec<OutboundMessage>,
}
