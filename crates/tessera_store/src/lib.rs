//! # Tessera Store
//!
//! Backend-neutral document collections for Tessera.
//!
//! Everything above this crate talks to a [`DocumentStore`] and its
//! [`Collection`]s and never learns which backend is bound:
//!
//! - [`PostgresStore`] - the networked backend, preferred when reachable
//! - [`MemoryStore`] - the in-process fallback, also used by tests
//!
//! ## Backend Selection
//!
//! [`open`] tries the networked backend once, bounded by
//! [`StoreConfig::connect_timeout`], and binds the fallback store if the
//! server is unreachable. The choice is fixed for the lifetime of the
//! returned [`OpenedStore`].
//!
//! ## Query Semantics
//!
//! - Filters are conjunctions of field equalities
//! - A [`DocumentId`] equals its own textual form
//! - Reads apply filter, sort, skip and limit in that order
//! - Returned documents are independent copies
//!
//! ## Example
//!
//! ```rust
//! use tessera_store::{Document, DocumentStore, Filter, MemoryStore};
//!
//! let store = MemoryStore::new();
//! let uploads = store.collection("uploads").unwrap();
//! for at in [1, 3, 2] {
//!     uploads
//!         .insert_one(Document::new().with("uploaded_at", at))
//!         .unwrap();
//! }
//! let page = uploads
//!     .find(Filter::new())
//!     .sort("uploaded_at", -1)
//!     .skip(1)
//!     .limit(1)
//!     .fetch()
//!     .unwrap();
//! assert_eq!(page[0].get("uploaded_at").and_then(|v| v.as_integer()), Some(2));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod document;
mod error;
mod id;
pub mod json;
mod memory;
mod pg;
mod query;
mod select;
mod value;

pub use collection::{BackendKind, Collection, Cursor, DocumentStore};
pub use document::{Document, ID_FIELD};
pub use error::{StoreError, StoreResult};
pub use id::DocumentId;
pub use memory::{MemoryCollection, MemoryStore};
pub use pg::{validate_name, PostgresCollection, PostgresStore};
pub use query::{
    DeleteResult, Filter, FindOptions, InsertOneResult, SortDirection, Update, UpdateResult,
};
pub use select::{
    connect, open, redact_url, OpenedStore, StoreConfig, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_DATABASE_NAME, DEFAULT_DATABASE_URL,
};
pub use value::Value;
