//! Payload extraction from an inbound event.
//!
//! The same pipeline serves direct invocations, where the event body is the
//! send request itself, and Pub/Sub relayed deliveries, where the request
//! sits base64-encoded inside `message.data`.

use tracing::debug;

use super::types::SendRequest;
use crate::error::DecodeError;
use crate::event::{Event, PubSubPayload, PUBSUB_MESSAGE_PUBLISHED};

/// Decode the [`SendRequest`] carried by `event`.
pub fn extract<E: Event>(event: &E) -> Result<SendRequest, DecodeError> {
    if event.event_type() == PUBSUB_MESSAGE_PUBLISHED {
        let payload: PubSubPayload = event.data_as()?;

        debug!(
            subscription = %payload.subscription,
            pubsub_message_id = %payload.message.message_id,
            data_length = payload.message.data.len(),
            "pubsub_payload_unwrapped"
        );

        if payload.message.data.is_empty() {
            return Err(DecodeError::MissingData);
        }
        return Ok(serde_json::from_slice(&payload.message.data)?);
    }

    event.data_as()
}

#[cfg(test)]
mod tests {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde_json::json;

    use super::*;
    use crate::event::CloudEvent;

    fn pubsub_event(inner: &[u8]) -> CloudEvent {
        CloudEvent::new("evt", "//pubsub", PUBSUB_MESSAGE_PUBLISHED)
            .with_json_data(&json!({
                "subscription": "projects/p/subscriptions/s",
                "message": {
                    "attributes": {"app": "tests"},
                    "messageId": "123",
                    "publishTime": "2023-09-27T18:21:16.418Z",
                    "data": STANDARD.encode(inner),
                }
            }))
            .unwrap()
    }

    #[test]
    fn test_extract_direct() {
        let event = CloudEvent::new("evt", "//tests", "example.type")
            .with_json_data(&json!({
                "sender": "a@x.com",
                "subject": "Hi",
                "body": "Hello",
                "to": ["b@y.com"]
            }))
            .unwrap();

        let request = extract(&event).unwrap();

        assert_eq!(request.sender, "a@x.com");
        assert_eq!(request.to.as_slice(), ["b@y.com"]);
    }

    #[test]
    fn test_extract_pubsub() {
        let event = pubsub_event(br#"{"sender":"a@x.com","subject":"Hi","to":"b@y.com"}"#);

        let request = extract(&event).unwrap();

        assert_eq!(request.sender, "a@x.com");
        assert_eq!(request.subject, "Hi");
        assert_eq!(request.to.as_slice(), ["b@y.com"]);
    }

    #[test]
    fn test_extract_pubsub_inner_not_json() {
        let event = pubsub_event(b"definitely not json");
        assert!(matches!(extract(&event), Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_extract_pubsub_without_data() {
        let event = CloudEvent::new("evt", "//pubsub", PUBSUB_MESSAGE_PUBLISHED)
            .with_json_data(&json!({"subscription": "s", "message": {}}))
            .unwrap();
        assert!(matches!(extract(&event), Err(DecodeError::MissingData)));
    }

    #[test]
    fn test_extract_bad_recipient_shape() {
        let event = CloudEvent::new("evt", "//tests", "example.type")
            .with_json_data(&json!({"sender": "a@x.com", "to": {"oops": true}}))
            .unwrap();
        assert!(matches!(extract(&event), Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_extract_without_data() {
        let event = CloudEvent::new("evt", "//tests", "example.type");
        assert!(matches!(extract(&event), Err(DecodeError::MissingData)));
    }
}
