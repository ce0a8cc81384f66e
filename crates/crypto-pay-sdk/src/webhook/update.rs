//! Update payload types.
//!
//! An inbound body decodes to a [`ParsedUpdate`]: a JSON object with a
//! mandatory `update_type` discriminant and an open set of event fields.
//! Classification against [`RecognizedUpdateTypes`] yields an [`Update`],
//! whose recognized variants carry an [`EventRecord`] with the discriminant
//! stripped.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::WebhookError;

/// Name of the routing field carried by every update.
pub const UPDATE_TYPE_FIELD: &str = "update_type";

/// Wire name of an update type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdateType(String);

impl UpdateType {
    /// An invoice was paid.
    pub const INVOICE_PAID: &'static str = "invoice_paid";

    /// Create an update type from its wire name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The `invoice_paid` update type.
    pub fn invoice_paid() -> Self {
        Self::new(Self::INVOICE_PAID)
    }

    /// Wire name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UpdateType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for UpdateType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Allow-list of update types this client dispatches.
///
/// Anything outside the list is dropped silently so that update types the
/// platform introduces later never break an older client.
///
/// # Examples
///
/// ```
/// use crypto_pay_sdk::RecognizedUpdateTypes;
///
/// let types = RecognizedUpdateTypes::default().with("invoice_expired");
/// assert!(types.contains("invoice_paid"));
/// assert!(types.contains("invoice_expired"));
/// assert!(!types.contains("check_activated"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizedUpdateTypes {
    types: BTreeSet<UpdateType>,
}

impl RecognizedUpdateTypes {
    /// An allow-list with no entries.
    pub fn empty() -> Self {
        Self {
            types: BTreeSet::new(),
        }
    }

    /// Add an update type to the list.
    pub fn with(mut self, update_type: impl Into<UpdateType>) -> Self {
        self.types.insert(update_type.into());
        self
    }

    /// Check if an update type is recognized.
    pub fn contains(&self, update_type: &str) -> bool {
        self.types.iter().any(|t| t.as_str() == update_type)
    }

    /// Iterate over the recognized types.
    pub fn iter(&self) -> impl Iterator<Item = &UpdateType> {
        self.types.iter()
    }
}

impl Default for RecognizedUpdateTypes {
    fn default() -> Self {
        Self::empty().with(UpdateType::invoice_paid())
    }
}

impl<T: Into<UpdateType>> FromIterator<T> for RecognizedUpdateTypes {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            types: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Update body decoded from the raw request bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedUpdate {
    fields: Map<String, Value>,
}

impl ParsedUpdate {
    /// Decode a raw body.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::MalformedBody` if the body is not valid JSON or
    /// is valid JSON but not an object.
    pub fn from_slice(raw_body: &[u8]) -> Result<Self, WebhookError> {
        let value: Value =
            serde_json::from_slice(raw_body).map_err(|e| WebhookError::MalformedBody {
                message: e.to_string(),
            })?;

        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(WebhookError::MalformedBody {
                message: format!("expected a JSON object, got {}", json_kind(&other)),
            }),
        }
    }

    /// Wrap an already decoded object.
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Declared update type, if present and a string.
    pub fn update_type(&self) -> Option<&str> {
        self.fields.get(UPDATE_TYPE_FIELD).and_then(Value::as_str)
    }

    /// All fields, including `update_type`.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Classify against an allow-list.
    ///
    /// Recognized updates lose their `update_type` field; anything else
    /// becomes [`Update::Unrecognized`].
    pub fn classify(mut self, recognized: &RecognizedUpdateTypes) -> Update {
        let update_type = match self.update_type() {
            Some(t) if recognized.contains(t) => UpdateType::new(t),
            other => {
                return Update::Unrecognized {
                    update_type: other.map(str::to_string),
                };
            }
        };

        self.fields.remove(UPDATE_TYPE_FIELD);
        let record = EventRecord::new(update_type, self.fields);

        if record.update_type().as_str() == UpdateType::INVOICE_PAID {
            Update::InvoicePaid(record)
        } else {
            Update::Other(record)
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Classified update.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// An invoice was paid.
    InvoicePaid(EventRecord),

    /// A type added to the allow-list by the application.
    Other(EventRecord),

    /// Not on the allow-list; dropped without dispatch.
    Unrecognized { update_type: Option<String> },
}

impl Update {
    /// Event record for recognized updates.
    pub fn record(&self) -> Option<&EventRecord> {
        match self {
            Self::InvoicePaid(record) | Self::Other(record) => Some(record),
            Self::Unrecognized { .. } => None,
        }
    }

    /// Consume the update, returning the event record if recognized.
    pub fn into_record(self) -> Option<EventRecord> {
        match self {
            Self::InvoicePaid(record) | Self::Other(record) => Some(record),
            Self::Unrecognized { .. } => None,
        }
    }
}

/// Update payload delivered to subscribers, without the `update_type` field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    #[serde(skip)]
    update_type: UpdateType,

    #[serde(flatten)]
    payload: Map<String, Value>,
}

impl EventRecord {
    /// Create a record. Any `update_type` key in the payload is removed.
    pub fn new(update_type: UpdateType, mut payload: Map<String, Value>) -> Self {
        payload.remove(UPDATE_TYPE_FIELD);
        Self {
            update_type,
            payload,
        }
    }

    /// Type this record was delivered under.
    pub fn update_type(&self) -> &UpdateType {
        &self.update_type
    }

    /// Event-specific fields.
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Deserialize the payload into an application type.
    ///
    /// # Errors
    ///
    /// Returns the serde error if the payload does not match `T`.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(Value::Object(self.payload.clone()))
    }
}

#[cfg(test)]
#[path = "update_tests.rs"]
mod tests;
