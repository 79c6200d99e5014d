//! Session attribute storage.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::SessionError;
use crate::Result;

/// Key/value attributes of the current session.
///
/// Encoded as a JSON object. An empty payload decodes to an empty set, so
/// "no session" and "empty session" look the same to callers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    values: BTreeMap<String, Value>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing any existing one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Get a value. Absent and `null` keys are an error; guard with
    /// [`has`](Self::has).
    pub fn get(&self, key: &str) -> Result<&Value> {
        self.values
            .get(key)
            .filter(|v| !v.is_null())
            .ok_or_else(|| SessionError::AttributeNotFound(key.to_string()))
    }

    /// A key holding JSON `null` counts as unset.
    pub fn has(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(|v| !v.is_null())
    }

    /// Append to a sequence-valued attribute, creating it when absent.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let entry = self
            .values
            .entry(key.clone())
            .or_insert_with(|| Value::Array(Vec::new()));
        if entry.is_null() {
            *entry = Value::Array(Vec::new());
        }
        match entry {
            Value::Array(items) => {
                items.push(value.into());
                Ok(())
            }
            _ => Err(SessionError::NotASequence(key)),
        }
    }

    /// Remove a value, returning it.
    pub fn forget(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    /// Serialize into a session record payload.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.values)?)
    }

    /// Parse a session record payload.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Self::default());
        }
        Ok(Self {
            values: serde_json::from_slice(data)?,
        })
    }
}
