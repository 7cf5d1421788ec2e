//! User records and the credential lifecycle.

use crate::credential::{hash_password, verify_password, Credential};
use crate::error::{AuthError, AuthResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tessera_store::{
    Collection, Document, DocumentId, DocumentStore, Filter, StoreError, Update, Value, ID_FIELD,
};

/// Name of the user collection.
pub const USERS_COLLECTION: &str = "users";

/// Stored field names.
pub mod fields {
    /// Unique login name.
    pub const USERNAME: &str = "username";
    /// Password credential.
    pub const PASSWORD: &str = "password";
    /// Optional email address.
    pub const EMAIL: &str = "email";
    /// Optional display name.
    pub const NAME: &str = "name";
    /// Creation time.
    pub const CREATED_AT: &str = "created_at";
    /// Time of the last successful login, or null.
    pub const LAST_LOGIN: &str = "last_login";
}

/// A user as returned to callers. Never carries the credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Textual form of the document id.
    pub id: String,
    /// Unique login name.
    pub username: String,
    /// Email address, if given.
    pub email: Option<String>,
    /// Display name, if given.
    pub name: Option<String>,
    /// Creation time; absent on records inserted without one.
    pub created_at: Option<DateTime<Utc>>,
    /// Time of the last successful login.
    pub last_login: Option<DateTime<Utc>>,
}

impl UserRecord {
    /// Builds a record from a stored document, ignoring the credential.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] if the id or username is missing.
    pub fn from_document(doc: &Document) -> AuthResult<Self> {
        let id = doc
            .id_text()
            .ok_or_else(|| StoreError::Serialization("user record has no textual _id".into()))?;
        let username = doc
            .get_text(fields::USERNAME)
            .ok_or_else(|| StoreError::Serialization(format!("user {id} has no username")))?
            .to_string();

        Ok(Self {
            id,
            username,
            email: doc.get_text(fields::EMAIL).map(str::to_string),
            name: doc.get_text(fields::NAME).map(str::to_string),
            created_at: timestamp(doc.get(fields::CREATED_AT)),
            last_login: timestamp(doc.get(fields::LAST_LOGIN)),
        })
    }
}

fn timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::Timestamp(t) => Some(*t),
        Value::Text(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        _ => None,
    }
}

/// Fields for a user inserted directly, bypassing password hashing.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    /// External id to use instead of a generated one.
    pub id: Option<&'a str>,
    /// Unique login name.
    pub username: &'a str,
    /// Credential to store as-is.
    pub credential: Credential,
    /// Optional email.
    pub email: Option<&'a str>,
    /// Optional display name.
    pub name: Option<&'a str>,
}

/// The user collection and the operations defined on it.
///
/// Works against any [`Collection`], so it behaves the same whichever
/// backend is bound.
#[derive(Clone)]
pub struct UserStore {
    users: Arc<dyn Collection>,
}

impl std::fmt::Debug for UserStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserStore")
            .field("collection", &self.users.name())
            .finish()
    }
}

impl UserStore {
    /// Opens the user collection and ensures its unique username index.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] if the collection or index cannot be
    /// created.
    pub fn open(store: &dyn DocumentStore) -> AuthResult<Self> {
        Self::with_collection(store.collection(USERS_COLLECTION)?)
    }

    /// Uses `users` as the user collection, ensuring its unique username
    /// index.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] if the index cannot be created.
    pub fn with_collection(users: Arc<dyn Collection>) -> AuthResult<Self> {
        users.create_index(fields::USERNAME, true)?;
        Ok(Self { users })
    }

    /// The underlying collection.
    pub fn collection(&self) -> &Arc<dyn Collection> {
        &self.users
    }

    /// Creates a user with a freshly hashed password.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidInput`] for an empty username or password
    /// - [`AuthError::DuplicateUsername`] if the username is taken
    /// - [`AuthError::Store`] if the backend fails
    pub fn create_user(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
        name: Option<&str>,
    ) -> AuthResult<UserRecord> {
        validate(username, password)?;

        if self.find_by_username(username)?.is_some() {
            tracing::info!(username, "registration rejected, username taken");
            return Err(AuthError::DuplicateUsername(username.to_string()));
        }

        self.insert(NewUser {
            id: None,
            username,
            credential: hash_password(password),
            email,
            name,
        })
    }

    /// Inserts a user with an already-built credential.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::DuplicateUsername`] if the username or id is
    /// taken, or [`AuthError::Store`] if the backend fails.
    pub fn insert(&self, user: NewUser<'_>) -> AuthResult<UserRecord> {
        let mut doc = Document::new()
            .with(fields::USERNAME, user.username)
            .with(fields::PASSWORD, user.credential.to_value())
            .with(fields::EMAIL, user.email)
            .with(fields::NAME, user.name)
            .with(fields::CREATED_AT, Utc::now())
            .with(fields::LAST_LOGIN, Value::Null);
        if let Some(id) = user.id {
            doc.set(ID_FIELD, id);
        }

        match self.users.insert_one(doc.clone()) {
            Ok(result) => {
                doc.set(ID_FIELD, result.inserted_id);
                tracing::info!(username = user.username, "user created");
                UserRecord::from_document(&doc)
            }
            Err(StoreError::DuplicateKey { field, .. }) => {
                tracing::info!(username = user.username, %field, "registration rejected, duplicate key");
                Err(AuthError::DuplicateUsername(user.username.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Checks a username and password.
    ///
    /// On success the user's `last_login` is updated; a failure to record
    /// it is logged and does not fail the login.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AuthenticationFailure`] for an unknown username
    /// or a wrong password, without saying which.
    pub fn authenticate_user(&self, username: &str, password: &str) -> AuthResult<UserRecord> {
        let Some(doc) = self.find_by_username(username)? else {
            tracing::info!(username, "login failed");
            tracing::debug!(username, "no such user");
            return Err(AuthError::AuthenticationFailure);
        };

        let verified = doc
            .get(fields::PASSWORD)
            .and_then(Credential::from_value)
            .is_some_and(|credential| verify_password(password, &credential));
        if !verified {
            tracing::info!(username, "login failed");
            tracing::debug!(username, "credential mismatch");
            return Err(AuthError::AuthenticationFailure);
        }

        let mut record = UserRecord::from_document(&doc)?;
        let now = Utc::now();
        let update = Update::new().set(fields::LAST_LOGIN, now);
        let id = doc.id().cloned().unwrap_or(Value::Null);
        match self.users.update_one(&Filter::by_id(id), &update) {
            Ok(_) => record.last_login = Some(now),
            Err(err) => {
                tracing::warn!(username, error = %err, "could not record last login");
            }
        }
        Ok(record)
    }

    /// Looks up a user by id.
    ///
    /// A textual document id is matched in its native form; anything else
    /// is used verbatim, which covers records inserted with external ids.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] if the backend fails.
    pub fn get_user_by_id(&self, id: &str) -> AuthResult<Option<UserRecord>> {
        let key = match DocumentId::parse(id) {
            Some(native) => Value::Id(native),
            None => Value::Text(id.to_string()),
        };
        self.users
            .find_one(&Filter::by_id(key))?
            .map(|doc| UserRecord::from_document(&doc))
            .transpose()
    }

    /// Counts stored users.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] if the backend fails.
    pub fn count(&self) -> AuthResult<u64> {
        Ok(self.users.count_documents(&Filter::new())?)
    }

    fn find_by_username(&self, username: &str) -> AuthResult<Option<Document>> {
        Ok(self
            .users
            .find_one(&Filter::new().eq(fields::USERNAME, username))?)
    }
}

fn validate(username: &str, password: &str) -> AuthResult<()> {
    if username.trim().is_empty() {
        return Err(AuthError::InvalidInput("username must not be empty".into()));
    }
    if password.is_empty() {
        return Err(AuthError::InvalidInput("password must not be empty".into()));
    }
    Ok(())
}
