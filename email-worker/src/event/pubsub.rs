//! Google Cloud Pub/Sub "message published" payload.
//!
//! Reference: https://cloud.google.com/eventarc/docs/cloudevents#pubsub

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// CloudEvent type emitted by Eventarc for Pub/Sub deliveries.
pub const PUBSUB_MESSAGE_PUBLISHED: &str = "google.cloud.pubsub.topic.v1.messagePublished";

/// Body of a Pub/Sub-relayed CloudEvent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PubSubPayload {
    /// Subscription the message was delivered through.
    #[serde(default)]
    pub subscription: String,
    #[serde(default)]
    pub message: PubSubMessage,
}

/// A single Pub/Sub message.
///
/// Reference: https://cloud.google.com/pubsub/docs/reference/rest/v1/PubsubMessage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubSubMessage {
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub publish_time: String,
    /// Message body, base64 encoded on the wire.
    #[serde(default, with = "base64_bytes")]
    pub data: Vec<u8>,
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        STANDARD.decode(encoded.trim()).map_err(de::Error::custom)
    }
}
