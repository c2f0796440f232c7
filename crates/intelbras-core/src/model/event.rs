// ── Access record domain types ──

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::coordinator::ACCESS_EVENT_TYPE;

/// A single field value from the record log.
///
/// Known-numeric fields are stored as integers; everything else, and
/// numeric fields the device filled with garbage, stay text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Text(String),
}

impl FieldValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Int(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

/// One `records[i]` block, fields in the order the device emitted them.
///
/// The field set is open: unknown fields are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventRecord {
    fields: IndexMap<String, FieldValue>,
}

impl EventRecord {
    pub fn new(fields: IndexMap<String, FieldValue>) -> Self {
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &IndexMap<String, FieldValue> {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn rec_no(&self) -> Option<i64> {
        self.get("RecNo").and_then(FieldValue::as_int)
    }

    /// `CreateTime`, epoch seconds.
    pub fn create_time(&self) -> Option<i64> {
        self.get("CreateTime").and_then(FieldValue::as_int)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.create_time()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    pub fn door(&self) -> Option<i64> {
        self.get("Door").and_then(FieldValue::as_int)
    }

    /// Entry method code (card, password, fingerprint, remote...).
    pub fn method(&self) -> Option<i64> {
        self.get("Method").and_then(FieldValue::as_int)
    }

    pub fn user_id(&self) -> Option<&FieldValue> {
        self.get("UserID")
    }

    /// Event type tag (`Type` field, e.g. `Entry`).
    pub fn event_type(&self) -> Option<&str> {
        self.get("Type").and_then(FieldValue::as_text)
    }

    pub fn signature(&self) -> EventSignature {
        EventSignature {
            rec_no: self.get("RecNo").cloned(),
            create_time: self.get("CreateTime").cloned(),
            door: self.get("Door").cloned(),
            method: self.get("Method").cloned(),
            user_id: self.get("UserID").cloned(),
        }
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for EventRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Identity of an access record for duplicate detection:
/// (record number, creation time, door, method, user id).
///
/// Missing fields participate as `None`, so two records that both lack a
/// field still compare equal on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventSignature {
    pub rec_no: Option<FieldValue>,
    pub create_time: Option<FieldValue>,
    pub door: Option<FieldValue>,
    pub method: Option<FieldValue>,
    pub user_id: Option<FieldValue>,
}

/// A newly observed access record, as published to hosts.
///
/// Serializes flat: `{"device_id": .., "event_type": .., "RecNo": .., ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent {
    pub device_id: String,
    pub event_type: String,
    #[serde(flatten)]
    pub record: EventRecord,
}

impl AccessEvent {
    pub fn new(device_id: impl Into<String>, record: EventRecord) -> Self {
        Self {
            device_id: device_id.into(),
            event_type: ACCESS_EVENT_TYPE.into(),
            record,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn sample() -> EventRecord {
        [
            ("RecNo", FieldValue::Int(12)),
            ("CreateTime", FieldValue::Int(1_700_000_000)),
            ("Door", FieldValue::Int(0)),
            ("Method", FieldValue::Int(1)),
            ("UserID", FieldValue::from("42")),
            ("Type", FieldValue::from("Entry")),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn accessors_read_known_fields() {
        let record = sample();
        assert_eq!(record.rec_no(), Some(12));
        assert_eq!(record.door(), Some(0));
        assert_eq!(record.method(), Some(1));
        assert_eq!(record.user_id(), Some(&FieldValue::from("42")));
        assert_eq!(record.event_type(), Some("Entry"));
        assert_eq!(
            record.created_at().unwrap().to_rfc3339(),
            "2023-11-14T22:13:20+00:00"
        );
    }

    #[test]
    fn signature_ignores_non_identity_fields() {
        let mut other: EventRecord = sample()
            .fields()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        other.fields.insert("Status".into(), FieldValue::Int(1));
        assert_eq!(sample().signature(), other.signature());

        other.fields.insert("RecNo".into(), FieldValue::Int(13));
        assert_ne!(sample().signature(), other.signature());
    }

    #[test]
    fn access_event_serializes_flat() {
        let event = AccessEvent::new("door-1", sample());
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "device_id": "door-1",
                "event_type": ACCESS_EVENT_TYPE,
                "RecNo": 12,
                "CreateTime": 1_700_000_000,
                "Door": 0,
                "Method": 1,
                "UserID": "42",
                "Type": "Entry",
            })
        );
    }
}
