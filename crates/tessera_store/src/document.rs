//! Documents: field maps identified by their `_id` field.

use crate::id::DocumentId;
use crate::value::Value;
use std::collections::btree_map;
use std::collections::BTreeMap;

/// Name of the identity field.
pub const ID_FIELD: &str = "_id";

/// A document: a mapping from field name to [`Value`].
///
/// A document's identity is its [`ID_FIELD`] value, which is unique within
/// its collection. Stores hand out independent copies, so mutating a
/// returned document never changes stored state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    fields: BTreeMap<String, Value>,
}

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field, builder style.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Sets a field, returning the previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    /// Returns a field's value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns a mutable reference to a field's value.
    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.fields.get_mut(field)
    }

    /// Removes a field, returning its value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Returns true if the field is present (even when null).
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Returns a text field, if present and textual.
    pub fn get_text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_text)
    }

    /// Returns the identity value, if assigned.
    pub fn id(&self) -> Option<&Value> {
        self.get(ID_FIELD)
    }

    /// Returns the identity as text, normalising native ids.
    pub fn id_text(&self) -> Option<String> {
        self.id()
            .and_then(Value::as_text_like)
            .map(|text| text.into_owned())
    }

    /// Assigns a fresh [`DocumentId`] when the document has none.
    ///
    /// Returns the identity value the document ends up with.
    pub fn ensure_id(&mut self) -> Value {
        self.fields
            .entry(ID_FIELD.to_string())
            .or_insert_with(|| Value::Id(DocumentId::new()))
            .clone()
    }

    /// Iterates over fields in name order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.fields.iter()
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
