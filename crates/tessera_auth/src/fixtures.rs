//! Development accounts seeded into the fallback store.

use crate::credential::{try_hash_password, Credential};
use crate::error::AuthError;
use crate::users::{NewUser, UserStore};

/// A fixture account.
#[derive(Debug, Clone, Copy)]
pub struct Fixture {
    /// Fixed external id.
    pub id: &'static str,
    /// Login name.
    pub username: &'static str,
    /// Plaintext password.
    pub password: &'static str,
    /// Email address.
    pub email: &'static str,
    /// Display name.
    pub name: Option<&'static str>,
}

/// The accounts seeded when the fallback store is bound.
pub const FIXTURES: [Fixture; 2] = [
    Fixture {
        id: "test123",
        username: "test_user",
        password: "password123",
        email: "test@example.com",
        name: None,
    },
    Fixture {
        id: "guest123",
        username: "guest",
        password: "style123",
        email: "guest@example.com",
        name: Some("Guest User"),
    },
];

/// Inserts every fixture account, returning how many were added.
///
/// Accounts that already exist are skipped. If hashing fails the password
/// is stored as legacy plaintext so the account stays usable.
pub fn seed(users: &UserStore) -> usize {
    let mut inserted = 0;
    for fixture in &FIXTURES {
        let credential = try_hash_password(fixture.password).unwrap_or_else(|err| {
            tracing::warn!(username = fixture.username, error = %err, "storing fixture password unhashed");
            Credential::Legacy(fixture.password.to_string())
        });
        let user = NewUser {
            id: Some(fixture.id),
            username: fixture.username,
            credential,
            email: Some(fixture.email),
            name: fixture.name,
        };
        match users.insert(user) {
            Ok(_) => inserted += 1,
            Err(AuthError::DuplicateUsername(_)) => {
                tracing::debug!(username = fixture.username, "fixture already present");
            }
            Err(err) => {
                tracing::warn!(username = fixture.username, error = %err, "could not seed fixture");
            }
        }
    }
    inserted
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_store::MemoryStore;

    #[test]
    fn seeding_is_idempotent() {
        let store = MemoryStore::new().text_encoded_field("password");
        let users = UserStore::open(&store).unwrap();
        assert_eq!(seed(&users), 2);
        assert_eq!(seed(&users), 0);
        assert_eq!(users.count().unwrap(), 2);
    }

    #[test]
    fn fixtures_log_in() {
        let store = MemoryStore::new().text_encoded_field("password");
        let users = UserStore::open(&store).unwrap();
        seed(&users);
        for fixture in &FIXTURES {
            let record = users
                .authenticate_user(fixture.username, fixture.password)
                .unwrap();
            assert_eq!(record.id, fixture.id);
            assert_eq!(record.email.as_deref(), Some(fixture.email));
        }
    }
}
