//! Password credentials.
//!
//! Passwords are hashed with Argon2id and stored as PHC strings. Older
//! records may instead hold the password in plaintext; both forms are
//! represented explicitly by [`Credential`] and verify through the same
//! [`verify_password`] entry point.

use crate::error::{AuthError, AuthResult};
use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use rand::RngCore;
use std::fmt;
use tessera_store::Value;

/// Prefix shared by every Argon2 PHC string.
pub const HASH_PREFIX: &str = "$argon2";

/// Argon2id memory cost in KiB.
pub const MEMORY_COST_KIB: u32 = 19_456;
/// Argon2id iteration count.
pub const TIME_COST: u32 = 2;
/// Argon2id lanes.
pub const PARALLELISM: u32 = 1;

const DIGEST_LEN: usize = 32;

/// A stored password credential.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// An Argon2 PHC string, as bytes.
    Hashed(Vec<u8>),
    /// A plaintext password from a record that predates hashing.
    Legacy(String),
}

impl Credential {
    /// Classifies a stored credential value.
    ///
    /// Bytes are always treated as hashed. Text is hashed when it carries
    /// the Argon2 prefix (a backend may have normalised the bytes to text)
    /// and legacy plaintext otherwise. Other value kinds are not
    /// credentials.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bytes(bytes) => Some(Self::Hashed(bytes.clone())),
            Value::Text(text) if text.starts_with(HASH_PREFIX) => {
                Some(Self::Hashed(text.as_bytes().to_vec()))
            }
            Value::Text(text) => Some(Self::Legacy(text.clone())),
            _ => None,
        }
    }

    /// The value to store for this credential.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Hashed(bytes) => Value::Bytes(bytes.clone()),
            Self::Legacy(plain) => Value::Text(plain.clone()),
        }
    }

    /// Returns true for hashed credentials.
    pub fn is_hashed(&self) -> bool {
        matches!(self, Self::Hashed(_))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hashed(_) => f.write_str("Credential::Hashed(..)"),
            Self::Legacy(_) => f.write_str("Credential::Legacy(..)"),
        }
    }
}

fn hasher() -> AuthResult<Argon2<'static>> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, None)
        .map_err(|e| AuthError::Signing(format!("invalid argon2 params: {e}")))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes `plain` with a fresh salt.
///
/// # Errors
///
/// Returns [`AuthError::Signing`] if the hashing primitive fails.
pub fn try_hash_password(plain: &str) -> AuthResult<Credential> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher()?
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| AuthError::Signing(format!("password hashing failed: {e}")))?;
    Ok(Credential::Hashed(hash.to_string().into_bytes()))
}

/// Hashes `plain`, never failing.
///
/// Two calls with the same input return different credentials. If the
/// hashing primitive fails, the result is a well-formed credential built
/// from fresh randomness that no password verifies against.
pub fn hash_password(plain: &str) -> Credential {
    match try_hash_password(plain) {
        Ok(credential) => credential,
        Err(err) => {
            tracing::error!(error = %err, "password hashing failed, storing unusable credential");
            unusable_credential()
        }
    }
}

/// A PHC string with random salt and digest.
pub fn unusable_credential() -> Credential {
    let salt = SaltString::generate(&mut OsRng);
    let mut digest = [0u8; DIGEST_LEN];
    rand::thread_rng().fill_bytes(&mut digest);
    let phc = format!(
        "$argon2id$v=19$m={MEMORY_COST_KIB},t={TIME_COST},p={PARALLELISM}${}${}",
        salt.as_str(),
        STANDARD_NO_PAD.encode(digest)
    );
    Credential::Hashed(phc.into_bytes())
}

/// Checks `plain` against a stored credential.
///
/// Legacy credentials compare by equality. Hashed credentials go through
/// Argon2 verification; if the stored bytes cannot be verified at all
/// (not UTF-8, not a PHC string, unsupported parameters) they are compared
/// as plaintext instead. Never panics.
pub fn verify_password(plain: &str, stored: &Credential) -> bool {
    match stored {
        Credential::Legacy(expected) => expected == plain,
        Credential::Hashed(bytes) => match verify_hashed(plain, bytes) {
            Ok(matched) => matched,
            Err(reason) => {
                tracing::debug!(%reason, "hashed verification unavailable, comparing as plaintext");
                bytes.as_slice() == plain.as_bytes()
            }
        },
    }
}

fn verify_hashed(plain: &str, bytes: &[u8]) -> Result<bool, String> {
    let text = std::str::from_utf8(bytes).map_err(|e| e.to_string())?;
    let parsed = PasswordHash::new(text).map_err(|e| e.to_string())?;
    match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e.to_string()),
    }
}
