//! Locating the result payload inside a response envelope.
//!
//! The remote API renamed its result fields over time, so one endpoint may
//! answer with `data` while an older deployment answers with `document`.
//! Each envelope type lists its candidate fields in priority order.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{OutlineError, Result};
use crate::models::canonicalize_keys;

pub const COLLECTION_LIST_FIELDS: &[&str] = &["data", "collections"];
pub const COLLECTION_FIELDS: &[&str] = &["data", "collection"];
pub const DOCUMENT_FIELDS: &[&str] = &["data", "document"];
pub const SEARCH_RESULT_FIELDS: &[&str] = &["data"];
pub const REVISION_LIST_FIELDS: &[&str] = &["data", "revisions"];
pub const REVISION_FIELDS: &[&str] = &["data", "revision"];

/// A parsed response body together with its raw text for diagnostics.
#[derive(Debug, Clone)]
pub struct Envelope {
    fields: Map<String, Value>,
    raw: String,
}

impl Envelope {
    pub fn parse(body: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(fields)) => Ok(Self {
                fields,
                raw: body.to_string(),
            }),
            _ => Err(OutlineError::deserialization(body)),
        }
    }

    /// First non-null field from `candidates`, matched ASCII case-insensitively.
    pub fn single<T: DeserializeOwned>(&self, candidates: &[&str]) -> Result<Option<T>> {
        for candidate in candidates {
            if let Some(value) = self.lookup(candidate) {
                return self.decode(value).map(Some);
            }
        }
        Ok(None)
    }

    /// List form of [`Envelope::single`]. Absent everywhere means empty.
    pub fn list<T: DeserializeOwned>(&self, candidates: &[&str]) -> Result<Vec<T>> {
        Ok(self.single(candidates)?.unwrap_or_default())
    }

    /// Like [`Envelope::list`], except an empty list also falls through to the
    /// next alias. Revision listings use this.
    pub fn first_non_empty_list<T: DeserializeOwned>(&self, candidates: &[&str]) -> Result<Vec<T>> {
        for candidate in candidates {
            let Some(value) = self.lookup(candidate) else {
                continue;
            };
            let items: Vec<T> = self.decode(value)?;
            if !items.is_empty() {
                return Ok(items);
            }
        }
        Ok(Vec::new())
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|value| !value.is_null()).or_else(|| {
            self.fields
                .iter()
                .find(|(key, value)| key.eq_ignore_ascii_case(name) && !value.is_null())
                .map(|(_, value)| value)
        })
    }

    /// Entity property names are matched case-insensitively as well.
    fn decode<T: DeserializeOwned>(&self, value: &Value) -> Result<T> {
        T::deserialize(canonicalize_keys(value.clone()))
            .map_err(|_| OutlineError::deserialization(&self.raw))
    }
}
