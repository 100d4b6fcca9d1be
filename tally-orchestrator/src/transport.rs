//! Messaging transport
//!
//! The service records outbound messages through tracing instead of
//! delivering them; a mail transport would implement the same trait.

use async_trait::async_trait;
use tally_core::domain::notification::OutboundMessage;
use tally_engine::dispatch::{MessageTransport, TransportError};

pub struct LogTransport;

#[async_trait]
impl MessageTransport for LogTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        if !message.to.contains('@') {
            return Err(TransportError(format!("Invalid recipient '{}'", message.to)));
        }

        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "Outbound message ({} bytes)",
            message.body.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(to: &str) -> OutboundMessage {
        OutboundMessage {
            to: to.to_string(),
            subject: "Hello".to_string(),
            body: "Body".to_string(),
        }
    }

    #[tokio::test]
    async fn test_log_transport() {
        assert!(LogTransport.send(&message("high@example.com")).await.is_ok());
        assert!(LogTransport.send(&message("not-an-address")).await.is_err());
    }
}
