//! Extended-JSON projection of values and documents.
//!
//! The networked backend stores documents as JSONB and the CLI prints them,
//! so both need a lossless-enough JSON form:
//!
//! | Value | JSON |
//! |-------|------|
//! | `Id` | string (textual form) |
//! | `Bytes` | `{"$binary": "<base64>"}` |
//! | `Timestamp` | `{"$date": "<RFC 3339, microseconds, Z>"}` |
//! | everything else | the natural JSON type |
//!
//! Ids deliberately project to plain strings: an id and its textual form
//! are equal for queries, so the stored form does not need to tell them
//! apart.

use crate::document::Document;
use crate::error::{StoreError, StoreResult};
use crate::value::Value;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value as Json};

const BINARY_KEY: &str = "$binary";
const DATE_KEY: &str = "$date";

/// Converts a value to its JSON form.
pub fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Integer(n) => Json::from(*n),
        Value::Text(s) => Json::String(s.clone()),
        Value::Id(id) => Json::String(id.to_string()),
        Value::Bytes(b) => tagged(BINARY_KEY, STANDARD.encode(b)),
        Value::Timestamp(t) => tagged(DATE_KEY, t.to_rfc3339_opts(SecondsFormat::Micros, true)),
        Value::Array(items) => Json::Array(items.iter().map(value_to_json).collect()),
        Value::Map(fields) => Json::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        ),
    }
}

fn tagged(key: &str, payload: String) -> Json {
    let mut map = Map::with_capacity(1);
    map.insert(key.to_string(), Json::String(payload));
    Json::Object(map)
}

/// Converts JSON back to a value.
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] for floating point numbers and for
/// malformed `$binary`/`$date` payloads.
pub fn value_from_json(json: &Json) -> StoreResult<Value> {
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => Value::Integer(n.as_i64().ok_or_else(|| {
            StoreError::Serialization(format!("unsupported non-integer number {n}"))
        })?),
        Json::String(s) => Value::Text(s.clone()),
        Json::Array(items) => Value::Array(
            items
                .iter()
                .map(value_from_json)
                .collect::<StoreResult<_>>()?,
        ),
        Json::Object(map) => {
            if let Some(value) = untag(map)? {
                value
            } else {
                Value::Map(
                    map.iter()
                        .map(|(k, v)| Ok((k.clone(), value_from_json(v)?)))
                        .collect::<StoreResult<_>>()?,
                )
            }
        }
    })
}

fn untag(map: &Map<String, Json>) -> StoreResult<Option<Value>> {
    if map.len() != 1 {
        return Ok(None);
    }
    if let Some(Json::String(encoded)) = map.get(BINARY_KEY) {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| StoreError::Serialization(format!("invalid $binary payload: {e}")))?;
        return Ok(Some(Value::Bytes(bytes)));
    }
    if let Some(Json::String(text)) = map.get(DATE_KEY) {
        let parsed = DateTime::parse_from_rfc3339(text)
            .map_err(|e| StoreError::Serialization(format!("invalid $date payload: {e}")))?;
        return Ok(Some(Value::Timestamp(parsed.with_timezone(&Utc))));
    }
    Ok(None)
}

/// Converts a document to a JSON object.
pub fn document_to_json(doc: &Document) -> Json {
    Json::Object(
        doc.iter()
            .map(|(k, v)| (k.clone(), value_to_json(v)))
            .collect(),
    )
}

/// Converts a JSON object back to a document.
///
/// # Errors
///
/// Returns [`StoreError::Serialization`] if `json` is not an object or holds
/// an unsupported value.
pub fn document_from_json(json: &Json) -> StoreResult<Document> {
    let Json::Object(map) = json else {
        return Err(StoreError::Serialization(
            "stored document is not a JSON object".into(),
        ));
    };
    map.iter()
        .map(|(k, v)| Ok((k.clone(), value_from_json(v)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::DocumentId;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn bytes_and_dates_are_tagged() {
        let when = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let doc = Document::new()
            .with("password", b"$argon2id$abc".to_vec())
            .with("created_at", when);

        let encoded = document_to_json(&doc);
        assert_eq!(
            encoded,
            json!({
                "password": {"$binary": "JGFyZ29uMmlkJGFiYw=="},
                "created_at": {"$date": "2024-03-01T12:00:00.000000Z"},
            })
        );
        assert_eq!(document_from_json(&encoded).unwrap(), doc);
    }

    #[test]
    fn ids_project_to_text() {
        let id = DocumentId::new();
        let json = value_to_json(&Value::Id(id));
        assert_eq!(json, Json::String(id.to_string()));
        let back = value_from_json(&json).unwrap();
        assert!(back.matches(&Value::Id(id)));
    }

    #[test]
    fn floats_are_rejected() {
        assert!(value_from_json(&json!(1.5)).is_err());
    }

    #[test]
    fn non_object_document_is_rejected() {
        assert!(document_from_json(&json!([1, 2])).is_err());
    }

    #[test]
    fn ordinary_objects_stay_maps() {
        let value = value_from_json(&json!({"$binary": "AA==", "extra": 1})).unwrap();
        assert!(matches!(value, Value::Map(_)));
    }
}
