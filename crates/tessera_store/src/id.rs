//! Document identifier.

use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Backend-assigned identifier for a document.
///
/// Document IDs are random 128-bit UUIDs that are:
/// - Unique within a collection
/// - Immutable once assigned
/// - Rendered as lowercase hyphenated text
///
/// A stored `DocumentId` compares equal to its own textual form in query
/// predicates, so callers may hold either representation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Creates a new random document ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a document ID from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Converts to a UUID.
    #[must_use]
    pub const fn to_uuid(&self) -> Uuid {
        self.0
    }

    /// Parses the textual form of a document ID.
    ///
    /// Returns `None` for anything that is not a UUID, such as the raw
    /// external identifiers carried by seeded fixture records.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        Uuid::parse_str(text).ok().map(Self)
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for DocumentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for DocumentId {
    fn from(uuid: Uuid) -> Self {
        Self::from_uuid(uuid)
    }
}

impl From<DocumentId> for Uuid {
    fn from(id: DocumentId) -> Self {
        id.to_uuid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_unique() {
        let id1 = DocumentId::new();
        let id2 = DocumentId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn display_parse_roundtrip() {
        let id = DocumentId::new();
        let text = id.to_string();
        assert_eq!(text.len(), 36);
        assert_eq!(DocumentId::parse(&text), Some(id));
        assert_eq!(text.parse::<DocumentId>().unwrap(), id);
    }

    #[test]
    fn parse_rejects_external_ids() {
        assert!(DocumentId::parse("test123").is_none());
        assert!(DocumentId::parse("").is_none());
    }

    #[test]
    fn uuid_conversion() {
        let uuid = Uuid::new_v4();
        let id = DocumentId::from_uuid(uuid);
        assert_eq!(id.to_uuid(), uuid);
        assert_eq!(Uuid::from(id), uuid);
    }
}
