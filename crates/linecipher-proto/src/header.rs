//! Named-field packet header.
//!
//! Headers are small JSON objects. Field order on the wire is the sorted key
//! order, so encoding is deterministic for a given set of fields.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{ProtocolError, Result};

/// Ordered set of named header fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Header {
    fields: Map<String, Value>,
}

impl Header {
    /// Maximum encoded header size (bounded by the u16 length prefix)
    pub const MAX_SIZE: usize = u16::MAX as usize;

    /// Create an empty header.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the header carries no fields.
    ///
    /// Outer line envelopes must have an empty header.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Raw field value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Field as an unsigned 32-bit integer. `None` if absent, not an integer,
    /// or out of range.
    #[must_use]
    pub fn get_u32(&self, name: &str) -> Option<u32> {
        self.fields.get(name).and_then(Value::as_u64).and_then(|v| u32::try_from(v).ok())
    }

    /// Field as a string. `None` if absent or not a string.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Set a field, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Set an unsigned 32-bit integer field.
    pub fn set_u32(&mut self, name: impl Into<String>, value: u32) {
        self.set(name, value);
    }

    /// Set a string field.
    pub fn set_str(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.set(name, Value::String(value.into()));
    }

    /// Remove a field, returning its previous value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// Iterate over fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Encode the header. An empty header encodes to zero bytes.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::HeaderTooLarge` if the JSON form exceeds
    ///   [`Header::MAX_SIZE`]
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.fields.is_empty() {
            return Ok(Vec::new());
        }

        let bytes = serde_json::to_vec(&self.fields)
            .map_err(|e| ProtocolError::InvalidHeader(e.to_string()))?;

        if bytes.len() > Self::MAX_SIZE {
            return Err(ProtocolError::HeaderTooLarge { size: bytes.len(), max: Self::MAX_SIZE });
        }

        Ok(bytes)
    }

    /// Decode a header. Zero bytes decode to an empty header.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidHeader` if the bytes are not a JSON object
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Ok(Self::new());
        }

        let fields: Map<String, Value> = serde_json::from_slice(bytes)
            .map_err(|e| ProtocolError::InvalidHeader(e.to_string()))?;

        Ok(Self { fields })
    }
}

impl<'a> IntoIterator for &'a Header {
    type Item = (&'a String, &'a Value);
    type IntoIter = serde_json::map::Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
