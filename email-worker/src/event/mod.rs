//! Inbound event abstraction.
//!
//! The pipeline only needs two things from an event: its type tag, and a way
//! to decode its body into a structured value. [`CloudEvent`] is the concrete
//! event received over HTTP; tests can supply their own [`Event`] impls.

pub mod cloudevent;
pub mod pubsub;

use serde::de::DeserializeOwned;

use crate::error::DecodeError;

pub use cloudevent::{CloudEvent, CloudEventError};
pub use pubsub::{PubSubMessage, PubSubPayload, PUBSUB_MESSAGE_PUBLISHED};

/// An event envelope: a type tag plus an opaque body.
pub trait Event {
    /// The event's declared type, e.g. [`PUBSUB_MESSAGE_PUBLISHED`].
    fn event_type(&self) -> &str;

    /// Decode the event body as JSON. Unknown fields are ignored.
    fn data_as<T: DeserializeOwned>(&self) -> Result<T, DecodeError>;
}
