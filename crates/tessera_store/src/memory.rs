//! In-process fallback store.

use crate::collection::{BackendKind, Collection, DocumentStore};
use crate::document::{Document, ID_FIELD};
use crate::error::{StoreError, StoreResult};
use crate::query::{DeleteResult, Filter, FindOptions, InsertOneResult, Update, UpdateResult};
use crate::value::Value;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// An in-memory document store.
///
/// This store keeps every collection in process memory and is used when
/// the networked backend cannot be reached, and by tests. Its contents are
/// lost when the process exits.
///
/// # Thread Safety
///
/// Each collection serialises its operations behind a single mutex. No
/// operation is long-running, so callers never hold the lock for more than
/// one scan of the collection.
///
/// # Example
///
/// ```rust
/// use tessera_store::{DocumentStore, Document, Filter, MemoryStore};
///
/// let store = MemoryStore::new();
/// let users = store.collection("users").unwrap();
/// users.insert_one(Document::new().with("username", "alice")).unwrap();
/// let found = users.find_one(&Filter::new().eq("username", "alice")).unwrap();
/// assert!(found.is_some());
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Arc<MemoryCollection>>>,
    text_encoded: Arc<[String]>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            text_encoded: Arc::from(Vec::new()),
        }
    }
}

impl MemoryStore {
    /// Creates an empty store with no text-encoded fields.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `field` as text-encoded.
    ///
    /// Byte values written to a text-encoded field are stored as (lossy)
    /// UTF-8 text, in every collection of this store.
    #[must_use]
    pub fn text_encoded_field(mut self, field: impl Into<String>) -> Self {
        let mut fields = self.text_encoded.to_vec();
        fields.push(field.into());
        self.text_encoded = fields.into();
        self
    }

    /// Returns the concrete collection handle.
    pub fn memory_collection(&self, name: &str) -> Arc<MemoryCollection> {
        if let Some(existing) = self.collections.read().get(name) {
            return Arc::clone(existing);
        }
        let mut collections = self.collections.write();
        Arc::clone(collections.entry(name.to_string()).or_insert_with(|| {
            Arc::new(MemoryCollection::new(name, Arc::clone(&self.text_encoded)))
        }))
    }
}

impl DocumentStore for MemoryStore {
    fn collection(&self, name: &str) -> StoreResult<Arc<dyn Collection>> {
        if name.is_empty() {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.memory_collection(name))
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::Memory
    }
}

#[derive(Debug, Default)]
struct CollectionState {
    /// Documents in insertion order.
    docs: Vec<Document>,
    /// Fields carrying a unique index.
    unique: Vec<String>,
    /// Fields carrying a non-unique index. Kept only for introspection.
    indexed: Vec<String>,
}

impl CollectionState {
    fn position(&self, filter: &Filter) -> Option<usize> {
        self.docs.iter().position(|doc| filter.matches(doc))
    }

    /// Finds the first unique field of `doc` already held by another document.
    ///
    /// This is a linear scan per unique field and does not scale beyond a few
    /// thousand documents.
    fn conflicting_field(&self, doc: &Document, skip: Option<usize>) -> Option<&str> {
        std::iter::once(ID_FIELD)
            .chain(self.unique.iter().map(String::as_str))
            .find(|field| {
                let Some(candidate) = doc.get(field) else {
                    return false;
                };
                self.docs.iter().enumerate().any(|(i, existing)| {
                    Some(i) != skip
                        && existing
                            .get(field)
                            .is_some_and(|value| value.matches(candidate))
                })
            })
    }
}

/// A collection held by [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryCollection {
    name: String,
    text_encoded: Arc<[String]>,
    state: Mutex<CollectionState>,
}

impl MemoryCollection {
    fn new(name: &str, text_encoded: Arc<[String]>) -> Self {
        Self {
            name: name.to_string(),
            text_encoded,
            state: Mutex::new(CollectionState::default()),
        }
    }

    /// Returns the number of stored documents.
    pub fn len(&self) -> usize {
        self.state.lock().docs.len()
    }

    /// Returns true if the collection holds no documents.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the indexed fields and whether each is unique.
    pub fn indexes(&self) -> Vec<(String, bool)> {
        let state = self.state.lock();
        state
            .unique
            .iter()
            .map(|f| (f.clone(), true))
            .chain(state.indexed.iter().map(|f| (f.clone(), false)))
            .collect()
    }

    fn is_text_encoded(&self, field: &str) -> bool {
        self.text_encoded.iter().any(|f| f == field)
    }

    fn encode_value(&self, field: &str, value: Value) -> Value {
        match value {
            Value::Bytes(bytes) if self.is_text_encoded(field) => {
                tracing::trace!(collection = %self.name, field, "storing bytes as text");
                Value::Text(String::from_utf8_lossy(&bytes).into_owned())
            }
            other => other,
        }
    }

    fn encode_document(&self, doc: Document) -> Document {
        doc.into_iter()
            .map(|(field, value)| {
                let value = self.encode_value(&field, value);
                (field, value)
            })
            .collect()
    }

    /// Applies text encoding to filter values so byte queries still match.
    fn encode_filter(&self, filter: &Filter) -> Filter {
        filter
            .predicates()
            .iter()
            .fold(Filter::new(), |acc, (field, value)| {
                acc.eq(field.clone(), self.encode_value(field, value.clone()))
            })
    }

    fn encode_update(&self, update: &Update) -> Update {
        update
            .assignments()
            .iter()
            .fold(Update::new(), |acc, (field, value)| {
                acc.set(field.clone(), self.encode_value(field, value.clone()))
            })
    }
}

impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn insert_one(&self, doc: Document) -> StoreResult<InsertOneResult> {
        let mut doc = self.encode_document(doc);
        let inserted_id = doc.ensure_id();

        let mut state = self.state.lock();
        if let Some(field) = state.conflicting_field(&doc, None) {
            return Err(StoreError::duplicate_key(&self.name, field));
        }
        state.docs.push(doc);
        Ok(InsertOneResult { inserted_id })
    }

    fn find_one(&self, filter: &Filter) -> StoreResult<Option<Document>> {
        let filter = self.encode_filter(filter);
        let state = self.state.lock();
        Ok(state.position(&filter).map(|i| state.docs[i].clone()))
    }

    fn find_with(&self, filter: &Filter, options: &FindOptions) -> StoreResult<Vec<Document>> {
        let filter = self.encode_filter(filter);
        let matched: Vec<Document> = {
            let state = self.state.lock();
            state
                .docs
                .iter()
                .filter(|doc| filter.matches(doc))
                .cloned()
                .collect()
        };
        Ok(options.apply(matched))
    }

    fn update_one(&self, filter: &Filter, update: &Update) -> StoreResult<UpdateResult> {
        if update.assignments().iter().any(|(field, _)| field == ID_FIELD) {
            return Err(StoreError::InvalidName(ID_FIELD.to_string()));
        }
        let filter = self.encode_filter(filter);
        let update = self.encode_update(update);

        let mut state = self.state.lock();
        let Some(index) = state.position(&filter) else {
            return Ok(UpdateResult::default());
        };

        let mut updated = state.docs[index].clone();
        let changed = update.apply(&mut updated);
        if changed {
            if let Some(field) = state.conflicting_field(&updated, Some(index)) {
                return Err(StoreError::duplicate_key(&self.name, field));
            }
            state.docs[index] = updated;
        }

        Ok(UpdateResult {
            matched_count: 1,
            modified_count: u64::from(changed),
        })
    }

    fn delete_one(&self, filter: &Filter) -> StoreResult<DeleteResult> {
        let filter = self.encode_filter(filter);
        let mut state = self.state.lock();
        let deleted_count = match state.position(&filter) {
            Some(index) => {
                state.docs.remove(index);
                1
            }
            None => 0,
        };
        Ok(DeleteResult { deleted_count })
    }

    fn create_index(&self, field: &str, unique: bool) -> StoreResult<()> {
        if field.is_empty() {
            return Err(StoreError::InvalidName(field.to_string()));
        }
        let mut state = self.state.lock();
        let target = if unique {
            &mut state.unique
        } else {
            &mut state.indexed
        };
        if !target.iter().any(|f| f == field) {
            target.push(field.to_string());
        }
        Ok(())
    }

    fn count_documents(&self, filter: &Filter) -> StoreResult<u64> {
        let filter = self.encode_filter(filter);
        let state = self.state.lock();
        let count = state.docs.iter().filter(|doc| filter.matches(doc)).count();
        Ok(count as u64)
    }
}
