use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde_json::json;
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

use ridepool_domain::{NotificationKind, Notifier};

/// Kafka-backed notification sink. One topic, keyed by recipient so a
/// consumer can fan out per user.
#[derive(Clone)]
pub struct EventNotifier {
    producer: FutureProducer,
    topic: String,
}

impl EventNotifier {
    pub fn new(brokers: &str, topic: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for EventNotifier {
    async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        payload: &serde_json::Value,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let key = user_id.to_string();
        let envelope = json!({
            "recipient": user_id,
            "kind": kind,
            "payload": payload,
        })
        .to_string();

        let record = FutureRecord::to(&self.topic).key(&key).payload(&envelope);

        match self
            .producer
            .send(record, Timeout::After(Duration::from_secs(0)))
            .await
        {
            Ok(delivery) => {
                info!(
                    "Sent {} notification for {}: partition {} offset {}",
                    kind.as_str(),
                    key,
                    delivery.partition,
                    delivery.offset
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send notification to {}: {}", self.topic, e);
                Err(Box::new(e))
            }
        }
    }
}
