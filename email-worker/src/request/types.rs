//! Wire and pipeline types for a single email.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::recipients::Recipients;

/// Decoded request describing one email to send.
///
/// Field names match the JSON wire format. Missing fields decode to empty
/// values and are rejected later by validation rather than by the decoder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendRequest {
    /// Who the email is from, e.g. `no-reply@example.com`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub sender: String,
    /// Subject line.
    #[serde(default, deserialize_with = "null_as_default")]
    pub subject: String,
    /// Inline template source for the HTML body. Takes precedence over
    /// `template` when both are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Storage key of a template to use as the body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Variables bound into the body template.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Map::is_empty"
    )]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub to: Recipients,
    #[serde(default, skip_serializing_if = "Recipients::is_empty")]
    pub cc: Recipients,
    #[serde(default, skip_serializing_if = "Recipients::is_empty")]
    pub bcc: Recipients,
}

impl SendRequest {
    /// Inline body, if present and non-empty.
    pub fn inline_body(&self) -> Option<&str> {
        self.body.as_deref().filter(|b| !b.is_empty())
    }

    /// Template key, if present and non-empty.
    pub fn template_name(&self) -> Option<&str> {
        self.template.as_deref().filter(|t| !t.is_empty())
    }
}

/// Decode `null` the same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Fully rendered email handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub sender: String,
    pub subject: String,
    /// Rendered HTML body.
    pub body: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
}

impl RenderedMessage {
    pub fn new(request: SendRequest, body: String) -> Self {
        Self {
            sender: request.sender,
            subject: request.subject,
            body,
            to: request.to.into_vec(),
            cc: request.cc.into_vec(),
            bcc: request.bcc.into_vec(),
        }
    }
}
