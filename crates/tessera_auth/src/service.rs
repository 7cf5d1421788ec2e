//! The authentication service.

use crate::config::{AuthConfig, Settings};
use crate::error::{AuthError, AuthResult};
use crate::fixtures;
use crate::token::{parse_bearer, SessionTokens};
use crate::users::{UserRecord, UserStore};
use serde::Serialize;
use std::sync::Arc;
use tessera_store::{BackendKind, DocumentStore, OpenedStore};

/// A user together with a freshly issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthSession {
    /// The authenticated user.
    pub user: UserRecord,
    /// A bearer token for that user.
    pub token: String,
}

/// Registration, login and token resolution over one bound store.
#[derive(Debug, Clone)]
pub struct AuthService {
    users: UserStore,
    tokens: SessionTokens,
    backend: BackendKind,
}

impl AuthService {
    /// Builds a service over an already-bound store.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] if the user collection or its unique
    /// username index cannot be created.
    pub fn new(store: Arc<dyn DocumentStore>, config: &AuthConfig) -> AuthResult<Self> {
        Ok(Self {
            users: UserStore::open(store.as_ref())?,
            tokens: SessionTokens::new(config),
            backend: store.backend_kind(),
        })
    }

    /// Binds a store from `settings` and builds the service.
    ///
    /// When the fallback store is bound and seeding is enabled, the fixture
    /// accounts are inserted before the service is returned.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] if binding fails for any reason other
    /// than an unreachable server.
    pub fn start(settings: &Settings) -> AuthResult<(Self, OpenedStore)> {
        let opened = tessera_store::open(&settings.store)?;
        let service = Self::new(Arc::clone(&opened.store), &settings.auth)?;
        if service.backend == BackendKind::Memory && settings.seed_fixtures {
            let seeded = fixtures::seed(&service.users);
            tracing::info!(seeded, "fixture accounts ready");
        }
        Ok((service, opened))
    }

    /// The user store.
    pub fn users(&self) -> &UserStore {
        &self.users
    }

    /// The token issuer.
    pub fn tokens(&self) -> &SessionTokens {
        &self.tokens
    }

    /// Which backend this service writes to.
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Creates a user and issues a token for them.
    ///
    /// # Errors
    ///
    /// See [`UserStore::create_user`]; signing can also fail with
    /// [`AuthError::Signing`].
    pub fn register(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
        name: Option<&str>,
    ) -> AuthResult<AuthSession> {
        let user = self.users.create_user(username, password, email, name)?;
        let token = self.tokens.issue(&user.id)?;
        Ok(AuthSession { user, token })
    }

    /// Authenticates a user and issues a token for them.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::AuthenticationFailure`] for bad credentials.
    pub fn login(&self, username: &str, password: &str) -> AuthResult<AuthSession> {
        let user = self.users.authenticate_user(username, password)?;
        let token = self.tokens.issue(&user.id)?;
        tracing::info!(username, "login succeeded");
        Ok(AuthSession { user, token })
    }

    /// Resolves a token to the user it was issued for.
    ///
    /// # Errors
    ///
    /// - [`AuthError::TokenExpired`] or [`AuthError::TokenInvalid`] if the
    ///   token does not verify
    /// - [`AuthError::UserNotFound`] if the user was removed after issue
    pub fn current_user(&self, token: &str) -> AuthResult<UserRecord> {
        let claims = self.tokens.verify(token)?;
        self.users
            .get_user_by_id(&claims.user_id)?
            .ok_or(AuthError::UserNotFound(claims.user_id))
    }

    /// Resolves an `Authorization` header value of the form `Bearer <token>`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenInvalid`] for a malformed header, otherwise
    /// as [`AuthService::current_user`].
    pub fn current_user_from_header(&self, header: &str) -> AuthResult<UserRecord> {
        self.current_user(parse_bearer(header)?)
    }
}
