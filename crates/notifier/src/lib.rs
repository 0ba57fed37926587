//! Kafka-backed notification dispatcher.
//!
//! Every notification becomes one JSON message on the configured topic, keyed by
//! the recipient so a recipient's messages stay in order within a partition.
//! Delivery to email or push is left to the consumers of that topic.

use std::time::Duration;

use anyhow::{Context, Result};
use app_config::AppConfig;
use async_trait::async_trait;
use model::{Notification, NotificationEvent};
use rdkafka::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use serde::Serialize;
use service::Notifier;
use tracing::{debug, info};
use uuid::Uuid;

/// Wire shape of a notification message.
#[derive(Debug, Serialize)]
struct NotificationMessage<'a> {
    recipient_id: Uuid,
    email: Option<&'a str>,
    event_type: NotificationEvent,
    payload: &'a serde_json::Value,
}

impl<'a> From<&'a Notification> for NotificationMessage<'a> {
    fn from(notification: &'a Notification) -> Self {
        Self {
            recipient_id: notification.recipient_id,
            email: notification.email.as_deref(),
            event_type: notification.event_type,
            payload: &notification.payload,
        }
    }
}

fn encode(notification: &Notification) -> Result<String> {
    serde_json::to_string(&NotificationMessage::from(notification))
        .context("Failed to serialize notification to JSON")
}

pub struct KafkaNotifier {
    producer: FutureProducer,
    topic: String,
    send_timeout: Duration,
}

impl KafkaNotifier {
    /// Creates the producer for the configured brokers and topic.
    ///
    /// # Errors
    /// Returns an error if the Kafka client cannot be created.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.kafka_brokers.join(","))
            .set("message.timeout.ms", "5000")
            .create()
            .context("Failed to create Kafka producer")?;

        info!(topic = %config.kafka_notification_topic, "Kafka notifier initialized");

        Ok(Self {
            producer,
            topic: config.kafka_notification_topic.clone(),
            send_timeout: Duration::from_secs(5),
        })
    }
}

#[async_trait]
impl Notifier for KafkaNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        let data = encode(notification)?;
        let key = notification.recipient_id.to_string();
        let record = FutureRecord::to(&self.topic).key(&key).payload(&data);

        self.producer
            .send(record, self.send_timeout)
            .await
            .map_err(|(kafka_err, _)| anyhow::anyhow!("Kafka error: {kafka_err}"))
            .context("Failed to publish notification")?;

        debug!(
            recipient_id = %notification.recipient_id,
            event_type = notification.event_type.as_str(),
            "Notification published"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_message_carries_recipient_event_and_payload() {
        let recipient_id = Uuid::new_v4();
        let notification = Notification {
            recipient_id,
            email: Some("rider@example.com".to_string()),
            event_type: NotificationEvent::DeliveryAssigned,
            payload: json!({ "cash_amount": 9500 }),
        };

        let message: Value = serde_json::from_str(&encode(&notification).unwrap()).unwrap();
        assert_eq!(message["recipient_id"], recipient_id.to_string());
        assert_eq!(message["email"], "rider@example.com");
        assert_eq!(message["event_type"], "delivery_assigned");
        assert_eq!(message["payload"]["cash_amount"], 9500);
    }

    #[test]
    fn test_missing_email_is_null() {
        let notification = Notification {
            recipient_id: Uuid::nil(),
            email: None,
            event_type: NotificationEvent::OrderStatusChanged,
            payload: Value::Null,
        };
        let message: Value = serde_json::from_str(&encode(&notification).unwrap()).unwrap();
        assert!(message["email"].is_null());
    }
}
