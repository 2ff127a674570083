//! Minimal CloudEvents 1.0 model with HTTP binary and structured decoding.
//!
//! Reference: https://github.com/cloudevents/spec/blob/v1.0.2/cloudevents/bindings/http-protocol-binding.md

use axum::http::{header::CONTENT_TYPE, HeaderMap};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::Event;
use crate::error::DecodeError;

/// Only CloudEvents spec version accepted.
pub const SPEC_VERSION: &str = "1.0";

/// Media type of a structured-mode CloudEvent.
pub const STRUCTURED_CONTENT_TYPE: &str = "application/cloudevents+json";

/// Failure to read a CloudEvent off an HTTP request.
#[derive(Debug, Error)]
pub enum CloudEventError {
    #[error("missing required attribute {0:?}")]
    MissingAttribute(&'static str),

    #[error("unsupported specversion {0:?}")]
    UnsupportedSpecVersion(String),

    #[error("malformed structured event: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid data_base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// A received CloudEvent. `data` holds the raw event body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudEvent {
    pub id: String,
    pub source: String,
    pub spec_version: String,
    pub event_type: String,
    pub data_content_type: Option<String>,
    pub subject: Option<String>,
    pub time: Option<String>,
    pub data: Option<Vec<u8>>,
}

impl CloudEvent {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            spec_version: SPEC_VERSION.to_string(),
            event_type: event_type.into(),
            data_content_type: None,
            subject: None,
            time: None,
            data: None,
        }
    }

    /// Attach a JSON body.
    pub fn with_json_data<T: Serialize>(mut self, data: &T) -> Result<Self, serde_json::Error> {
        self.data = Some(serde_json::to_vec(data)?);
        self.data_content_type = Some("application/json".to_string());
        Ok(self)
    }

    /// Decode a binary-mode event: attributes in `ce-*` headers, data in the body.
    pub fn from_binary(headers: &HeaderMap, body: &[u8]) -> Result<Self, CloudEventError> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let required = |name: &'static str| {
            header(name)
                .filter(|v| !v.is_empty())
                .ok_or(CloudEventError::MissingAttribute(name))
        };

        let spec_version = required("ce-specversion")?;
        check_spec_version(&spec_version)?;

        Ok(Self {
            id: required("ce-id")?,
            source: required("ce-source")?,
            spec_version,
            event_type: required("ce-type")?,
            data_content_type: header(CONTENT_TYPE.as_str()),
            subject: header("ce-subject"),
            time: header("ce-time"),
            data: (!body.is_empty()).then(|| body.to_vec()),
        })
    }

    /// Decode a structured-mode event: the whole body is a JSON CloudEvent.
    pub fn from_structured(body: &[u8]) -> Result<Self, CloudEventError> {
        let raw: StructuredEvent = serde_json::from_slice(body)?;

        let spec_version = raw
            .specversion
            .ok_or(CloudEventError::MissingAttribute("specversion"))?;
        check_spec_version(&spec_version)?;

        let data = match (raw.data, raw.data_base64) {
            (_, Some(encoded)) => Some(STANDARD.decode(encoded)?),
            (Some(Value::Null), None) | (None, None) => None,
            (Some(Value::String(text)), None) if !is_json(raw.datacontenttype.as_deref()) => {
                Some(text.into_bytes())
            }
            (Some(value), None) => Some(serde_json::to_vec(&value)?),
        };

        Ok(Self {
            id: non_empty(raw.id, "id")?,
            source: non_empty(raw.source, "source")?,
            spec_version,
            event_type: non_empty(raw.r#type, "type")?,
            data_content_type: raw.datacontenttype,
            subject: raw.subject,
            time: raw.time,
            data,
        })
    }

    /// Decode either HTTP content mode, chosen by the request content type.
    pub fn from_http(headers: &HeaderMap, body: &[u8]) -> Result<Self, CloudEventError> {
        let structured = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with(STRUCTURED_CONTENT_TYPE))
            .unwrap_or(false);

        if structured {
            Self::from_structured(body)
        } else {
            Self::from_binary(headers, body)
        }
    }

    /// Headers carrying this event's attributes in binary mode.
    pub fn binary_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("ce-specversion", self.spec_version.clone()),
            ("ce-id", self.id.clone()),
            ("ce-source", self.source.clone()),
            ("ce-type", self.event_type.clone()),
        ];
        if let Some(subject) = &self.subject {
            headers.push(("ce-subject", subject.clone()));
        }
        if let Some(time) = &self.time {
            headers.push(("ce-time", time.clone()));
        }
        if let Some(content_type) = &self.data_content_type {
            headers.push(("content-type", content_type.clone()));
        }
        headers
    }
}

impl Event for CloudEvent {
    fn event_type(&self) -> &str {
        &self.event_type
    }

    fn data_as<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        let data = self
            .data
            .as_deref()
            .filter(|d| !d.is_empty())
            .ok_or(DecodeError::MissingData)?;
        Ok(serde_json::from_slice(data)?)
    }
}

#[derive(Deserialize)]
struct StructuredEvent {
    specversion: Option<String>,
    id: Option<String>,
    source: Option<String>,
    r#type: Option<String>,
    datacontenttype: Option<String>,
    subject: Option<String>,
    time: Option<String>,
    data: Option<Value>,
    data_base64: Option<String>,
}

fn check_spec_version(version: &str) -> Result<(), CloudEventError> {
    if version == SPEC_VERSION {
        Ok(())
    } else {
        Err(CloudEventError::UnsupportedSpecVersion(version.to_string()))
    }
}

fn non_empty(value: Option<String>, name: &'static str) -> Result<String, CloudEventError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(CloudEventError::MissingAttribute(name))
}

fn is_json(content_type: Option<&str>) -> bool {
    match content_type {
        None => true,
        Some(ct) => {
            let ct = ct.split(';').next().unwrap_or("").trim();
            ct == "application/json" || ct.ends_with("+json") || ct == "text/json"
        }
    }
}
