use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use super::day_key::DayKey;
use super::domain::{BusinessId, RequestId};

/// Field map held by every record in the document store.
pub type Document = Map<String, Value>;

const BUSINESSES: &str = "businesses";
const VERIFICATION_REQUESTS: &str = "verification_requests";
const VERIFICATION_AUDIT: &str = "verification_audit";

/// Slash-separated address of a record in the hierarchical document store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath(Vec<String>);

impl DocumentPath {
    pub fn business(business_id: &BusinessId) -> Self {
        Self(vec![BUSINESSES.to_string(), business_id.0.clone()])
    }

    pub fn verification_request(business_id: &BusinessId, req_id: &RequestId) -> Self {
        Self::business(business_id).child(VERIFICATION_REQUESTS, &req_id.0)
    }

    pub fn verification_audit(business_id: &BusinessId, req_id: &RequestId) -> Self {
        Self::business(business_id).child(VERIFICATION_AUDIT, &req_id.0)
    }

    pub fn daily_metric(business_id: &BusinessId, day: &DayKey) -> Self {
        Self::business(business_id)
            .child("metrics", "daily")
            .child("days", &day.key())
    }

    fn child(mut self, collection: &str, id: &str) -> Self {
        self.0.push(collection.to_string());
        self.0.push(id.to_string());
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Name of the collection holding this record.
    pub fn collection(&self) -> Option<&str> {
        let len = self.0.len();
        if len < 2 {
            return None;
        }
        self.0.get(len - 2).map(String::as_str)
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// Single field operation inside a merge patch.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchValue {
    Set(Value),
    Increment(i64),
}

/// Partial update applied on top of whatever the record already holds.
///
/// Fields absent from the patch are preserved. Nested objects merge recursively, so
/// writing `{"checks": {"a": true}}` does not drop a stored `checks.b`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergePatch {
    fields: BTreeMap<String, PatchValue>,
}

impl MergePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields
            .insert(field.into(), PatchValue::Set(value.into()));
        self
    }

    pub fn increment(mut self, field: impl Into<String>, by: i64) -> Self {
        self.fields.insert(field.into(), PatchValue::Increment(by));
        self
    }

    pub fn get(&self, field: &str) -> Option<&PatchValue> {
        self.fields.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &PatchValue)> {
        self.fields.iter()
    }

    pub fn apply_to(&self, document: &mut Document) {
        for (field, operation) in &self.fields {
            match operation {
                PatchValue::Set(value) => match document.get_mut(field) {
                    Some(existing) => merge_value(existing, value),
                    None => {
                        document.insert(field.clone(), value.clone());
                    }
                },
                PatchValue::Increment(by) => {
                    let next = match document.get(field) {
                        Some(Value::Number(current)) => match current.as_i64() {
                            Some(current) => Value::from(current.saturating_add(*by)),
                            None => Value::from(current.as_f64().unwrap_or(0.0) + *by as f64),
                        },
                        _ => Value::from(*by),
                    };
                    document.insert(field.clone(), next);
                }
            }
        }
    }
}

fn merge_value(target: &mut Value, incoming: &Value) {
    match (target, incoming) {
        (Value::Object(existing), Value::Object(update)) => {
            for (key, value) in update {
                match existing.get_mut(key) {
                    Some(slot) => merge_value(slot, value),
                    None => {
                        existing.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}

/// Timestamp representation written into records.
pub fn timestamp(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Point reads and merge writes against the document database.
pub trait DocumentStore: Send + Sync {
    fn get(&self, path: &DocumentPath) -> Result<Option<Document>, StoreError>;

    fn merge(&self, path: &DocumentPath, patch: &MergePatch) -> Result<(), StoreError>;

    /// Writes `document` only when no record exists at `path`, atomically.
    /// Returns `false` without writing when the record is already there.
    fn create(&self, path: &DocumentPath, document: &Document) -> Result<bool, StoreError>;

    /// Applies `patch` only while `guard_field` is absent from the record, atomically.
    /// Returns `false` without writing when the field is already set.
    fn merge_unless_set(
        &self,
        path: &DocumentPath,
        guard_field: &str,
        patch: &MergePatch,
    ) -> Result<bool, StoreError>;
}

/// Error enumeration for document store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),
}
