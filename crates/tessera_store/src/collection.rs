//! Backend-neutral collection and store traits.

use crate::document::Document;
use crate::error::StoreResult;
use crate::query::{
    DeleteResult, Filter, FindOptions, InsertOneResult, SortDirection, Update, UpdateResult,
};
use std::fmt;
use std::sync::Arc;

/// Which backend a store is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// The networked PostgreSQL backend.
    Postgres,
    /// The in-process fallback store.
    Memory,
}

impl BackendKind {
    /// Short lowercase name, used in logs and CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named set of documents.
///
/// Every backend implements the same operation set with the same
/// semantics, so code above this trait never needs to know which backend
/// is bound.
///
/// # Invariants
///
/// - `_id` is unique within the collection
/// - Fields declared unique through [`Collection::create_index`] never hold
///   the same value in two documents written after the declaration
/// - Documents returned by reads are independent copies
/// - Reads apply filter, sort, skip and limit in that order
pub trait Collection: Send + Sync {
    /// The collection name.
    fn name(&self) -> &str;

    /// Inserts a document, assigning an `_id` if it has none.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::DuplicateKey`] if a unique field (or the
    /// `_id`) collides with an existing document.
    fn insert_one(&self, doc: Document) -> StoreResult<InsertOneResult>;

    /// Returns the first document matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn find_one(&self, filter: &Filter) -> StoreResult<Option<Document>>;

    /// Runs the full filter → sort → skip → limit pipeline once.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn find_with(&self, filter: &Filter, options: &FindOptions) -> StoreResult<Vec<Document>>;

    /// Applies `$set` assignments to the first matching document.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::DuplicateKey`] if an assignment would
    /// break a unique index, [`crate::StoreError::InvalidName`] if it
    /// assigns `_id`, or a backend error.
    fn update_one(&self, filter: &Filter, update: &Update) -> StoreResult<UpdateResult>;

    /// Removes the first matching document.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn delete_one(&self, filter: &Filter) -> StoreResult<DeleteResult>;

    /// Declares an index on `field`.
    ///
    /// Unique indexes are checked by later writes only; existing documents
    /// are not validated.
    ///
    /// # Errors
    ///
    /// Returns an error if the field name is unusable or the backend fails.
    fn create_index(&self, field: &str, unique: bool) -> StoreResult<()>;

    /// Counts documents matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn count_documents(&self, filter: &Filter) -> StoreResult<u64>;
}

impl dyn Collection + '_ {
    /// Starts a cursor over documents matching `filter`.
    pub fn find(&self, filter: Filter) -> Cursor<'_> {
        Cursor::new(self, filter)
    }
}

/// A lazy, restartable query result.
///
/// Nothing runs until [`Cursor::fetch`] or [`Cursor::iter`]; each call
/// re-runs the pipeline against current state.
///
/// ```ignore
/// let latest = uploads
///     .find(Filter::new().eq("user_id", uid))
///     .sort("uploaded_at", -1)
///     .limit(10)
///     .fetch()?;
/// ```
pub struct Cursor<'a> {
    collection: &'a dyn Collection,
    filter: Filter,
    options: FindOptions,
}

impl<'a> Cursor<'a> {
    /// Creates a cursor with no ordering, skip or limit.
    pub fn new(collection: &'a dyn Collection, filter: Filter) -> Self {
        Self {
            collection,
            filter,
            options: FindOptions::default(),
        }
    }

    /// Sorts by `field`; `-1` is descending, anything else ascending.
    #[must_use]
    pub fn sort(mut self, field: impl Into<String>, direction: i32) -> Self {
        self.options.sort = Some((field.into(), SortDirection::from_i32(direction)));
        self
    }

    /// Drops the first `n` results.
    #[must_use]
    pub fn skip(mut self, n: usize) -> Self {
        self.options.skip = n;
        self
    }

    /// Returns at most `n` results; zero means unbounded.
    #[must_use]
    pub fn limit(mut self, n: usize) -> Self {
        self.options.limit = Some(n);
        self
    }

    /// The options accumulated so far.
    pub fn options(&self) -> &FindOptions {
        &self.options
    }

    /// Materialises the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn fetch(&self) -> StoreResult<Vec<Document>> {
        self.collection.find_with(&self.filter, &self.options)
    }

    /// Materialises the pipeline and iterates over the results.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn iter(&self) -> StoreResult<std::vec::IntoIter<Document>> {
        Ok(self.fetch()?.into_iter())
    }
}

impl fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("collection", &self.collection.name())
            .field("filter", &self.filter)
            .field("options", &self.options)
            .finish()
    }
}

/// A bound document store: a factory for named collections.
pub trait DocumentStore: Send + Sync {
    /// Returns a handle to the named collection, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::InvalidName`] if the backend cannot use
    /// the name, or a backend error.
    fn collection(&self, name: &str) -> StoreResult<Arc<dyn Collection>>;

    /// Which backend this store is.
    fn backend_kind(&self) -> BackendKind;
}
