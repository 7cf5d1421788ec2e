//! # Tessera Auth
//!
//! User credentials and stateless session tokens on top of
//! [`tessera_store`].
//!
//! ## Overview
//!
//! - [`UserStore`] registers users, checks passwords and looks users up
//! - [`SessionTokens`] issues and verifies HS256-signed tokens
//! - [`AuthService`] ties both to one bound store
//!
//! Passwords are stored as Argon2id hashes. Records written before hashing
//! was introduced may hold plaintext; both verify through
//! [`verify_password`].
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tessera_auth::{AuthConfig, AuthService};
//! use tessera_store::MemoryStore;
//!
//! let store = Arc::new(MemoryStore::new().text_encoded_field("password"));
//! let service = AuthService::new(store, &AuthConfig::new("secret")).unwrap();
//!
//! let session = service.register("alice", "pw1", None, None).unwrap();
//! let me = service.current_user(&session.token).unwrap();
//! assert_eq!(me.username, "alice");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
pub mod credential;
mod error;
pub mod fixtures;
mod service;
mod token;
pub mod users;

pub use config::{AuthConfig, Settings, DEFAULT_SECRET, DEFAULT_TOKEN_EXPIRY_HOURS};
pub use credential::{hash_password, try_hash_password, verify_password, Credential};
pub use error::{AuthError, AuthResult};
pub use service::{AuthService, AuthSession};
pub use token::{parse_bearer, Claims, SessionTokens, TokenState};
pub use users::{NewUser, UserRecord, UserStore};
