//! Signed session tokens.
//!
//! ## Token Format
//!
//! Tokens are compact JWS strings, `header.claims.signature`, each part
//! base64url-encoded without padding:
//!
//! - header: `{"alg":"HS256","typ":"JWT"}`
//! - claims: `{"user_id": "<id>", "exp": <unix seconds>}`, where `exp`
//!   carries microseconds as a fractional part
//! - signature: HMAC-SHA256 over `header.claims`
//!
//! Tokens are never stored. A token is valid exactly when its signature
//! matches and `exp` has not passed.

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";
const TOKEN_TYPE: &str = "JWT";

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// The claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject user id.
    pub user_id: String,
    /// Expiry as Unix seconds, with a fractional part.
    pub exp: f64,
}

impl Claims {
    /// Expiry as a timestamp.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        if !self.exp.is_finite() {
            return None;
        }
        DateTime::from_timestamp_micros((self.exp * 1e6).round() as i64)
    }
}

/// Converts a timestamp to fractional Unix seconds.
fn numeric_date(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1e6
}

/// Outcome of inspecting a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenState {
    /// Signature matches and the token has not expired.
    Valid(Claims),
    /// Signature matches but `exp` has passed.
    Expired(Claims),
    /// Malformed, unsupported or wrongly signed.
    Invalid(String),
}

/// Issues and checks session tokens.
///
/// Holds only read-only configuration, so one instance can be shared
/// freely across threads.
#[derive(Clone)]
pub struct SessionTokens {
    secret: Zeroizing<Vec<u8>>,
    expiry_hours: u64,
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokens")
            .field("expiry_hours", &self.expiry_hours)
            .finish_non_exhaustive()
    }
}

impl SessionTokens {
    /// Creates an issuer from the auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            secret: config.secret.clone(),
            expiry_hours: config.token_expiry_hours,
        }
    }

    /// Issues a token for `user_id` that expires after the configured
    /// number of hours.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Signing`] if the token cannot be signed.
    pub fn issue(&self, user_id: &str) -> AuthResult<String> {
        let lifetime = self.expiry_hours.saturating_mul(3600) as f64;
        self.sign(&Claims {
            user_id: user_id.to_string(),
            exp: numeric_date(Utc::now()) + lifetime,
        })
    }

    /// Issues a token with an explicit expiry, which may be in the past.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Signing`] if the token cannot be signed.
    pub fn issue_with_expiry(
        &self,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> AuthResult<String> {
        self.sign(&Claims {
            user_id: user_id.to_string(),
            exp: numeric_date(expires_at),
        })
    }

    fn sign(&self, claims: &Claims) -> AuthResult<String> {
        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: TOKEN_TYPE.to_string(),
        };
        let header = serde_json::to_vec(&header).map_err(|e| AuthError::Signing(e.to_string()))?;
        let claims = serde_json::to_vec(claims).map_err(|e| AuthError::Signing(e.to_string()))?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(claims)
        );
        let signature = self.mac()?.chain_update(signing_input.as_bytes()).finalize();

        Ok(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature.into_bytes())
        ))
    }

    /// Classifies a token without failing.
    pub fn inspect(&self, token: &str) -> TokenState {
        self.inspect_at(token, Utc::now())
    }

    fn inspect_at(&self, token: &str, now: DateTime<Utc>) -> TokenState {
        let Some((signing_input, signature)) = token.rsplit_once('.') else {
            return TokenState::Invalid("expected three segments".into());
        };
        let Some((header, claims)) = signing_input.split_once('.') else {
            return TokenState::Invalid("expected three segments".into());
        };
        if claims.contains('.') {
            return TokenState::Invalid("expected three segments".into());
        }

        let header: Header = match decode_segment(header) {
            Ok(header) => header,
            Err(reason) => return TokenState::Invalid(format!("header: {reason}")),
        };
        if header.alg != ALGORITHM {
            return TokenState::Invalid(format!("unsupported algorithm {:?}", header.alg));
        }

        let Ok(signature) = URL_SAFE_NO_PAD.decode(signature) else {
            return TokenState::Invalid("signature is not base64url".into());
        };
        let verified = self.mac().map(|mac| {
            mac.chain_update(signing_input.as_bytes())
                .verify_slice(&signature)
                .is_ok()
        });
        match verified {
            Ok(true) => {}
            Ok(false) => return TokenState::Invalid("signature mismatch".into()),
            Err(err) => return TokenState::Invalid(err.to_string()),
        }

        let claims: Claims = match decode_segment(claims) {
            Ok(claims) => claims,
            Err(reason) => return TokenState::Invalid(format!("claims: {reason}")),
        };
        if !claims.exp.is_finite() {
            return TokenState::Invalid("claims: exp is not a number".into());
        }
        if claims.exp < numeric_date(now) {
            TokenState::Expired(claims)
        } else {
            TokenState::Valid(claims)
        }
    }

    /// Returns the claims of a valid token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenExpired`] or [`AuthError::TokenInvalid`].
    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        match self.inspect(token) {
            TokenState::Valid(claims) => Ok(claims),
            TokenState::Expired(claims) => {
                tracing::debug!(user_id = %claims.user_id, "token expired");
                Err(AuthError::TokenExpired)
            }
            TokenState::Invalid(reason) => {
                tracing::debug!(%reason, "token rejected");
                Err(AuthError::TokenInvalid(reason))
            }
        }
    }

    fn mac(&self) -> AuthResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret).map_err(|e| AuthError::Signing(e.to_string()))
    }
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, String> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| e.to_string())?;
    serde_json::from_slice(&bytes).map_err(|e| e.to_string())
}

/// Extracts the token from an `Authorization` header value.
///
/// The value must be exactly two whitespace-separated parts, the first of
/// which is `bearer` in any case.
///
/// # Errors
///
/// Returns [`AuthError::TokenInvalid`] for any other shape.
pub fn parse_bearer(header: &str) -> AuthResult<&str> {
    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(AuthError::TokenInvalid("malformed authorization header".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn tokens() -> SessionTokens {
        SessionTokens::new(&AuthConfig::new("test-secret-key-32-bytes-long!!"))
    }

    #[test]
    fn issue_and_verify() {
        let tokens = tokens();
        let token = tokens.issue("user-1").unwrap();
        assert_eq!(token.split('.').count(), 3);

        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.user_id, "user-1");
        let remaining = claims.exp - numeric_date(Utc::now());
        assert!(remaining > 23.0 * 3600.0 && remaining <= 24.0 * 3600.0);
    }

    #[test]
    fn header_is_standard() {
        let token = tokens().issue("u").unwrap();
        let header = token.split('.').next().unwrap();
        let decoded = URL_SAFE_NO_PAD.decode(header).unwrap();
        assert_eq!(decoded, br#"{"alg":"HS256","typ":"JWT"}"#);
    }

    #[test]
    fn past_expiry_is_expired() {
        let tokens = tokens();
        let past = Utc::now() - ChronoDuration::hours(1);
        let token = tokens.issue_with_expiry("user-1", past).unwrap();
        assert!(matches!(tokens.inspect(&token), TokenState::Expired(ref c) if c.user_id == "user-1"));
        assert!(matches!(tokens.verify(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let tokens = tokens();
        let now = Utc::now();
        let token = tokens.issue_with_expiry("u", now).unwrap();
        assert!(matches!(tokens.inspect_at(&token, now), TokenState::Valid(_)));
        let later = now + ChronoDuration::seconds(1);
        assert!(matches!(tokens.inspect_at(&token, later), TokenState::Expired(_)));
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let token = tokens().issue("u").unwrap();
        let other = SessionTokens::new(&AuthConfig::new("different"));
        assert!(matches!(other.verify(&token), Err(AuthError::TokenInvalid(_))));
    }

    #[test]
    fn tampered_claims_are_invalid() {
        let tokens = tokens();
        let token = tokens.issue("alice").unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(br#"{"user_id":"mallory","exp":99999999999}"#);
        parts[1] = &forged;
        let forged_token = parts.join(".");
        assert!(matches!(
            tokens.inspect(&forged_token),
            TokenState::Invalid(ref r) if r == "signature mismatch"
        ));
    }

    #[test]
    fn malformed_tokens_are_invalid() {
        let tokens = tokens();
        for bad in ["", "abc", "a.b", "a.b.c.d", "!!.??.**", "e30.e30.AAAA"] {
            assert!(
                matches!(tokens.inspect(bad), TokenState::Invalid(_)),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn other_algorithms_are_rejected() {
        let tokens = tokens();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let claims = URL_SAFE_NO_PAD.encode(br#"{"user_id":"u","exp":99999999999}"#);
        let token = format!("{header}.{claims}.");
        assert!(matches!(tokens.inspect(&token), TokenState::Invalid(_)));
    }

    #[test]
    fn reissued_tokens_differ() {
        let tokens = tokens();
        let a = tokens.issue("u").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = tokens.issue("u").unwrap();
        assert_ne!(a, b);
        assert_eq!(tokens.verify(&a).unwrap().user_id, tokens.verify(&b).unwrap().user_id);
    }

    #[test]
    fn expiry_keeps_microseconds() {
        let tokens = tokens();
        let at = DateTime::from_timestamp_micros(1_900_000_000_123_456).unwrap();
        let token = tokens.issue_with_expiry("u", at).unwrap();
        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.expires_at(), Some(at));
    }

    #[test]
    fn bearer_parsing() {
        assert_eq!(parse_bearer("Bearer abc").unwrap(), "abc");
        assert_eq!(parse_bearer("bearer abc").unwrap(), "abc");
        assert_eq!(parse_bearer("BEARER  abc").unwrap(), "abc");
        assert!(parse_bearer("Bearer").is_err());
        assert!(parse_bearer("Basic abc").is_err());
        assert!(parse_bearer("Bearer a b").is_err());
        assert!(parse_bearer("").is_err());
    }

    #[test]
    fn debug_hides_secret() {
        let rendered = format!("{:?}", tokens());
        assert!(!rendered.contains("test-secret"));
    }
}
