//! Query, update and result types shared by every backend.

use crate::document::{Document, ID_FIELD};
use crate::value::Value;

/// A conjunction of field-equality predicates.
///
/// An empty filter matches every document. Equality follows
/// [`Value::matches`], so a native id and its textual form are
/// interchangeable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    predicates: Vec<(String, Value)>,
}

impl Filter {
    /// Creates a filter that matches everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter on the identity field.
    #[must_use]
    pub fn by_id(id: impl Into<Value>) -> Self {
        Self::new().eq(ID_FIELD, id)
    }

    /// Adds an equality predicate.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicates.push((field.into(), value.into()));
        self
    }

    /// Returns the predicates in insertion order.
    pub fn predicates(&self) -> &[(String, Value)] {
        &self.predicates
    }

    /// Returns true if the filter has no predicates.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Returns true if `doc` satisfies every predicate.
    ///
    /// A predicate on a field the document lacks never matches.
    pub fn matches(&self, doc: &Document) -> bool {
        self.predicates.iter().all(|(field, expected)| {
            doc.get(field)
                .is_some_and(|actual| actual.matches(expected))
        })
    }
}

/// A `$set` update: fields to overwrite on the matched document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Update {
    set: Vec<(String, Value)>,
}

impl Update {
    /// Creates an empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field assignment.
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.push((field.into(), value.into()));
        self
    }

    /// Returns the assignments in insertion order.
    pub fn assignments(&self) -> &[(String, Value)] {
        &self.set
    }

    /// Returns true if the update assigns nothing.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Applies the assignments to `doc`, returning true if anything changed.
    pub fn apply(&self, doc: &mut Document) -> bool {
        let mut changed = false;
        for (field, value) in &self.set {
            if doc.get(field) != Some(value) {
                doc.set(field.clone(), value.clone());
                changed = true;
            }
        }
        changed
    }
}

/// Sort direction for cursor ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

impl SortDirection {
    /// Maps the conventional `1`/`-1` direction flag.
    ///
    /// `-1` is descending; every other value is ascending.
    pub fn from_i32(direction: i32) -> Self {
        if direction == -1 {
            Self::Descending
        } else {
            Self::Ascending
        }
    }
}

/// Sort, skip and limit applied after filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Field and direction to sort by.
    pub sort: Option<(String, SortDirection)>,
    /// Number of leading results to drop.
    pub skip: usize,
    /// Maximum number of results; `None` or `Some(0)` means unbounded.
    pub limit: Option<usize>,
}

impl FindOptions {
    /// Effective limit, treating zero as unbounded.
    pub fn effective_limit(&self) -> Option<usize> {
        self.limit.filter(|&n| n > 0)
    }

    /// Runs sort → skip → limit over already-filtered documents.
    ///
    /// The sort is stable, so documents with equal (or absent) keys keep
    /// their incoming order. Absent fields sort as null.
    pub fn apply(&self, mut docs: Vec<Document>) -> Vec<Document> {
        if let Some((field, direction)) = &self.sort {
            let null = Value::Null;
            docs.sort_by(|a, b| {
                let ka = a.get(field).unwrap_or(&null);
                let kb = b.get(field).unwrap_or(&null);
                let ord = ka.cmp_natural(kb);
                match direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                }
            });
        }

        let iter = docs.into_iter().skip(self.skip);
        match self.effective_limit() {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}

/// Outcome of [`crate::Collection::insert_one`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertOneResult {
    /// The identity the stored document carries.
    pub inserted_id: Value,
}

/// Outcome of [`crate::Collection::update_one`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    /// Number of documents matched (0 or 1).
    pub matched_count: u64,
    /// Number of documents changed (0 or 1).
    pub modified_count: u64,
}

/// Outcome of [`crate::Collection::delete_one`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteResult {
    /// Number of documents removed (0 or 1).
    pub deleted_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::DocumentId;
    use proptest::prelude::*;

    fn docs_with(values: &[i64]) -> Vec<Document> {
        values
            .iter()
            .map(|v| Document::new().with("uploaded_at", *v))
            .collect()
    }

    fn keys(docs: &[Document]) -> Vec<i64> {
        docs.iter()
            .map(|d| d.get("uploaded_at").and_then(Value::as_integer).unwrap())
            .collect()
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::new().matches(&Document::new()));
    }

    #[test]
    fn filter_requires_field_presence() {
        let doc = Document::new().with("a", Value::Null);
        assert!(Filter::new().eq("a", Value::Null).matches(&doc));
        assert!(!Filter::new().eq("b", Value::Null).matches(&doc));
    }

    #[test]
    fn filter_by_id_accepts_text_form() {
        let id = DocumentId::new();
        let doc = Document::new().with(ID_FIELD, id);
        assert!(Filter::by_id(id.to_string()).matches(&doc));
    }

    #[test]
    fn filter_is_a_conjunction() {
        let doc = Document::new().with("user_id", "u1").with("category", "shoes");
        assert!(Filter::new()
            .eq("user_id", "u1")
            .eq("category", "shoes")
            .matches(&doc));
        assert!(!Filter::new()
            .eq("user_id", "u1")
            .eq("category", "hats")
            .matches(&doc));
    }

    #[test]
    fn update_reports_changes() {
        let mut doc = Document::new().with("last_login", Value::Null);
        let update = Update::new().set("last_login", 5);
        assert!(update.apply(&mut doc));
        assert!(!update.apply(&mut doc));
        assert_eq!(doc.get("last_login"), Some(&Value::Integer(5)));
    }

    #[test]
    fn sort_descending_then_skip_then_limit() {
        let options = FindOptions {
            sort: Some(("uploaded_at".into(), SortDirection::from_i32(-1))),
            skip: 1,
            limit: Some(1),
        };
        let result = options.apply(docs_with(&[1, 3, 2]));
        assert_eq!(keys(&result), vec![2]);
    }

    #[test]
    fn no_sort_keeps_insertion_order() {
        let options = FindOptions {
            skip: 1,
            ..FindOptions::default()
        };
        assert_eq!(keys(&options.apply(docs_with(&[5, 1, 9]))), vec![1, 9]);
    }

    #[test]
    fn zero_limit_is_unbounded() {
        let options = FindOptions {
            limit: Some(0),
            ..FindOptions::default()
        };
        assert_eq!(options.apply(docs_with(&[1, 2, 3])).len(), 3);
    }

    #[test]
    fn absent_sort_field_sorts_first_ascending() {
        let mut docs = docs_with(&[2]);
        docs.push(Document::new().with("other", 1));
        let options = FindOptions {
            sort: Some(("uploaded_at".into(), SortDirection::Ascending)),
            ..FindOptions::default()
        };
        let result = options.apply(docs);
        assert!(result[0].get("uploaded_at").is_none());
    }

    #[test]
    fn stable_sort_on_ties() {
        let docs: Vec<Document> = (0..4)
            .map(|i| Document::new().with("k", 1).with("seq", i))
            .collect();
        let options = FindOptions {
            sort: Some(("k".into(), SortDirection::Descending)),
            ..FindOptions::default()
        };
        let seqs: Vec<i64> = options
            .apply(docs)
            .iter()
            .map(|d| d.get("seq").and_then(Value::as_integer).unwrap())
            .collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
    }

    proptest! {
        #[test]
        fn pipeline_length_is_bounded(
            values in proptest::collection::vec(any::<i64>(), 0..40),
            skip in 0usize..50,
            limit in proptest::option::of(0usize..50),
        ) {
            let options = FindOptions {
                sort: Some(("uploaded_at".into(), SortDirection::Ascending)),
                skip,
                limit,
            };
            let result = options.apply(docs_with(&values));
            let available = values.len().saturating_sub(skip);
            let expected = match limit {
                Some(n) if n > 0 => available.min(n),
                _ => available,
            };
            prop_assert_eq!(result.len(), expected);

            let sorted = keys(&result);
            prop_assert!(sorted.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
