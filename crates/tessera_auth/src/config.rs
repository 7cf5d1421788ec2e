//! Process configuration.

use crate::error::{AuthError, AuthResult};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tessera_store::StoreConfig;
use zeroize::Zeroizing;

/// Signing secret used when none is configured.
pub const DEFAULT_SECRET: &str = "your_jwt_secret_key";
/// Token lifetime used when none is configured.
pub const DEFAULT_TOKEN_EXPIRY_HOURS: u64 = 24;

/// Token signing configuration.
///
/// Read-only once the service is built.
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret. Zeroized on drop.
    pub secret: Zeroizing<Vec<u8>>,
    /// Hours a freshly issued token stays valid.
    pub token_expiry_hours: u64,
}

impl AuthConfig {
    /// Creates a configuration with the default expiry.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: Zeroizing::new(secret.into()),
            token_expiry_hours: DEFAULT_TOKEN_EXPIRY_HOURS,
        }
    }

    /// Replaces the signing secret.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.secret = Zeroizing::new(secret.into());
        self
    }

    /// Sets the token lifetime in hours.
    #[must_use]
    pub fn with_expiry_hours(mut self, hours: u64) -> Self {
        self.token_expiry_hours = hours;
        self
    }

    /// The token lifetime.
    pub fn token_expiry(&self) -> Duration {
        Duration::from_secs(self.token_expiry_hours.saturating_mul(3600))
    }

    /// Returns true if the built-in default secret is in use.
    pub fn uses_default_secret(&self) -> bool {
        self.secret.as_slice() == DEFAULT_SECRET.as_bytes()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SECRET)
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("token_expiry_hours", &self.token_expiry_hours)
            .finish()
    }
}

/// Everything needed to start the service.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Backend selection.
    pub store: StoreConfig,
    /// Token signing.
    pub auth: AuthConfig,
    /// Seed the fixture accounts when the fallback store is bound.
    pub seed_fixtures: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            auth: AuthConfig::default(),
            seed_fixtures: true,
        }
    }
}

impl Settings {
    /// Loads settings from the environment, after reading an optional
    /// `.env` file.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `JWT_SECRET` | `your_jwt_secret_key` |
    /// | `TOKEN_EXPIRATION` | `24` (hours) |
    /// | `DATABASE_URL` | `postgres://localhost:5432` |
    /// | `DB_NAME` | `tessera` |
    /// | `DB_CONNECT_TIMEOUT_SECS` | `5` |
    /// | `SEED_FIXTURES` | `true` |
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if a numeric or boolean variable does
    /// not parse.
    pub fn from_env() -> AuthResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads settings through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if a numeric or boolean value does not
    /// parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AuthResult<Self> {
        let mut settings = Self::default();

        if let Some(secret) = lookup("JWT_SECRET").filter(|s| !s.is_empty()) {
            settings.auth = settings.auth.with_secret(secret);
        }
        if let Some(hours) = parse_var::<u64>(&lookup, "TOKEN_EXPIRATION")? {
            settings.auth = settings.auth.with_expiry_hours(hours);
        }
        if let Some(url) = lookup("DATABASE_URL").filter(|s| !s.is_empty()) {
            settings.store = settings.store.with_database_url(url);
        }
        if let Some(name) = lookup("DB_NAME").filter(|s| !s.is_empty()) {
            settings.store = settings.store.with_database_name(name);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "DB_CONNECT_TIMEOUT_SECS")? {
            settings.store = settings
                .store
                .with_connect_timeout(Duration::from_secs(secs));
        }
        if let Some(raw) = lookup("SEED_FIXTURES").filter(|s| !s.trim().is_empty()) {
            settings.seed_fixtures = parse_bool(&raw).ok_or_else(|| {
                AuthError::Config(format!("SEED_FIXTURES: not a boolean: {raw:?}"))
            })?;
        }

        if settings.auth.uses_default_secret() {
            tracing::warn!("JWT_SECRET not set, tokens are signed with the built-in default secret");
        }
        Ok(settings)
    }

    /// Sets the store configuration.
    #[must_use]
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Sets the auth configuration.
    #[must_use]
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    /// Enables or disables fixture seeding.
    #[must_use]
    pub fn with_seed_fixtures(mut self, seed: bool) -> Self {
        self.seed_fixtures = seed;
        self
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> AuthResult<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key).filter(|s| !s.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| AuthError::Config(format!("{key}: {e}: {raw:?}"))),
        None => Ok(None),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert!(settings.auth.uses_default_secret());
        assert_eq!(settings.auth.token_expiry_hours, 24);
        assert_eq!(settings.store.database_url, "postgres://localhost:5432");
        assert_eq!(settings.store.database_name, "tessera");
        assert_eq!(settings.store.connect_timeout, Duration::from_secs(5));
        assert!(settings.seed_fixtures);
    }

    #[test]
    fn values_are_read() {
        let settings = Settings::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("TOKEN_EXPIRATION", "2"),
            ("DATABASE_URL", "postgres://db:5432"),
            ("DB_NAME", "fashion"),
            ("DB_CONNECT_TIMEOUT_SECS", "1"),
            ("SEED_FIXTURES", "off"),
        ]))
        .unwrap();
        assert_eq!(settings.auth.secret.as_slice(), b"s3cret");
        assert_eq!(settings.auth.token_expiry(), Duration::from_secs(7200));
        assert_eq!(settings.store.database_url, "postgres://db:5432");
        assert_eq!(settings.store.database_name, "fashion");
        assert_eq!(settings.store.connect_timeout, Duration::from_secs(1));
        assert!(!settings.seed_fixtures);
    }

    #[test]
    fn bad_numbers_are_config_errors() {
        let err = Settings::from_lookup(lookup(&[("TOKEN_EXPIRATION", "soon")])).unwrap_err();
        assert!(matches!(err, AuthError::Config(ref msg) if msg.contains("TOKEN_EXPIRATION")));
    }

    #[test]
    fn bad_booleans_are_config_errors() {
        let err = Settings::from_lookup(lookup(&[("SEED_FIXTURES", "maybe")])).unwrap_err();
        assert!(matches!(err, AuthError::Config(_)));
    }

    #[test]
    fn debug_redacts_secret() {
        let rendered = format!("{:?}", AuthConfig::new("hunter2"));
        assert!(!rendered.contains("hunter2"));
    }
}
