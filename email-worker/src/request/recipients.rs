//! Flexible decoding of `to`/`cc`/`bcc` fields.
//!
//! Producers send recipients either as a bare string or as an array of
//! strings. Both shapes are normalized here into an ordered [`Recipients`]
//! list so nothing downstream has to care which one arrived.

use std::fmt;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::DecodeError;

/// Raw shape of a recipient field before normalization.
#[derive(Debug, PartialEq, Eq)]
enum RecipientField {
    Empty,
    Single(String),
    Many(Vec<String>),
}

impl From<RecipientField> for Recipients {
    fn from(field: RecipientField) -> Self {
        match field {
            RecipientField::Empty => Recipients::default(),
            RecipientField::Single(address) => Recipients(vec![address]),
            RecipientField::Many(addresses) => Recipients(addresses),
        }
    }
}

/// Ordered list of recipient addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recipients(Vec<String>);

impl Recipients {
    pub fn new(addresses: Vec<String>) -> Self {
        Self(addresses)
    }

    /// Parse a raw JSON fragment. Blank input yields an empty list.
    pub fn parse(raw: &str) -> Result<Self, DecodeError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(raw)?)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for Recipients {
    fn from(addresses: Vec<String>) -> Self {
        Self(addresses)
    }
}

impl From<&str> for Recipients {
    fn from(address: &str) -> Self {
        Self(vec![address.to_string()])
    }
}

impl<'a> IntoIterator for &'a Recipients {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Recipients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

struct RecipientFieldVisitor;

impl<'de> Visitor<'de> for RecipientFieldVisitor {
    type Value = RecipientField;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a string or an array of strings")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(RecipientField::Empty)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(RecipientField::Empty)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Ok(RecipientField::Single(value.to_string()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<Self::Value, E> {
        Ok(RecipientField::Single(value))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut addresses = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(address) = seq.next_element::<String>()? {
            addresses.push(address);
        }
        Ok(RecipientField::Many(addresses))
    }
}

impl<'de> Deserialize<'de> for Recipients {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer
            .deserialize_any(RecipientFieldVisitor)
            .map(Recipients::from)
    }
}

impl Serialize for Recipients {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}
