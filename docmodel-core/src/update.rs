//! Field mutations applied by the store.
//!
//! An [`Update`] is an ordered list of `$set`, `$unset` and `$inc` operations. Backends
//! either translate it to their native update language or apply it with
//! [`Update::apply`].
//!
//! ```ignore
//! use docmodel::update::Update;
//!
//! let update = Update::new()
//!     .set("author", "Jason")
//!     .set("isPublished", true);
//! ```

use bson::{Bson, Document as BsonDocument};
use std::collections::HashSet;

use crate::{
    document::ID_FIELD,
    error::{DocumentStoreError, DocumentStoreResult},
};

/// A single field mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    /// Sets the field to the value.
    Set(String, Bson),
    /// Removes the field.
    Unset(String),
    /// Adds the value to a numeric field; a missing field is set to the value.
    Inc(String, Bson),
}

impl UpdateOp {
    pub fn field(&self) -> &str {
        match self {
            UpdateOp::Set(field, _) | UpdateOp::Unset(field) | UpdateOp::Inc(field, _) => field,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    ops: Vec<UpdateOp>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.ops.push(UpdateOp::Set(field.into(), value.into()));
        self
    }

    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.ops.push(UpdateOp::Unset(field.into()));
        self
    }

    pub fn inc(mut self, field: impl Into<String>, amount: impl Into<Bson>) -> Self {
        self.ops.push(UpdateOp::Inc(field.into(), amount.into()));
        self
    }

    pub fn ops(&self) -> &[UpdateOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Rejects updates that no store should receive.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Query`] for an empty update, an empty or dotted field
    /// name, a mutation of `_id`, a field targeted more than once, or an `$inc` by a
    /// non-numeric amount.
    pub fn check(&self) -> DocumentStoreResult<()> {
        if self.ops.is_empty() {
            return Err(DocumentStoreError::Query("update contains no operations".into()));
        }

        let mut seen = HashSet::new();

        for op in &self.ops {
            match op.field() {
                "" => return Err(DocumentStoreError::Query("update field name is empty".into())),
                ID_FIELD => {
                    return Err(DocumentStoreError::Query(format!(
                        "field `{ID_FIELD}` is immutable and cannot be updated"
                    )));
                }
                field if field.contains('.') => {
                    return Err(DocumentStoreError::Query(format!(
                        "update field `{field}` is a dotted path; only top-level fields can be updated"
                    )));
                }
                field if !seen.insert(field) => {
                    return Err(DocumentStoreError::Query(format!(
                        "update targets field `{field}` more than once"
                    )));
                }
                _ => {}
            }

            if let UpdateOp::Inc(field, amount) = op {
                if !is_numeric(amount) {
                    return Err(DocumentStoreError::Query(format!(
                        "cannot increment `{field}` by a non-numeric amount"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Applies the mutations to `document` in order. Returns `true` if anything changed.
    ///
    /// # Errors
    ///
    /// Fails like [`Update::check`], and when `$inc` targets a non-numeric field or
    /// overflows a 64-bit integer.
    /// On error the document may be partially updated; callers apply to a copy.
    pub fn apply(&self, document: &mut BsonDocument) -> DocumentStoreResult<bool> {
        self.check()?;

        let mut changed = false;

        for op in &self.ops {
            match op {
                UpdateOp::Set(field, value) => {
                    if document.get(field) != Some(value) {
                        document.insert(field.clone(), value.clone());
                        changed = true;
                    }
                }
                UpdateOp::Unset(field) => {
                    changed |= document.remove(field).is_some();
                }
                UpdateOp::Inc(field, amount) => {
                    let next = match document.get(field) {
                        None => amount.clone(),
                        Some(current) => add(field, current, amount)?,
                    };

                    if document.get(field) != Some(&next) {
                        document.insert(field.clone(), next);
                        changed = true;
                    }
                }
            }
        }

        Ok(changed)
    }
}

fn is_numeric(value: &Bson) -> bool {
    matches!(value, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

fn add(field: &str, current: &Bson, amount: &Bson) -> DocumentStoreResult<Bson> {
    let overflow = || DocumentStoreError::Query(format!("incrementing `{field}` overflows a 64-bit integer"));

    match (current, amount) {
        (Bson::Int32(a), Bson::Int32(b)) => Ok(a
            .checked_add(*b)
            .map(Bson::Int32)
            .unwrap_or(Bson::Int64(*a as i64 + *b as i64))),
        (Bson::Int32(a), Bson::Int64(b)) => (*a as i64).checked_add(*b).map(Bson::Int64).ok_or_else(overflow),
        (Bson::Int64(a), Bson::Int32(b)) => a.checked_add(*b as i64).map(Bson::Int64).ok_or_else(overflow),
        (Bson::Int64(a), Bson::Int64(b)) => a.checked_add(*b).map(Bson::Int64).ok_or_else(overflow),
        (Bson::Double(a), Bson::Int32(b)) => Ok(Bson::Double(a + *b as f64)),
        (Bson::Double(a), Bson::Int64(b)) => Ok(Bson::Double(a + *b as f64)),
        (Bson::Int32(a), Bson::Double(b)) => Ok(Bson::Double(*a as f64 + b)),
        (Bson::Int64(a), Bson::Double(b)) => Ok(Bson::Double(*a as f64 + b)),
        (Bson::Double(a), Bson::Double(b)) => Ok(Bson::Double(a + b)),
        _ => Err(DocumentStoreError::Query(format!("cannot increment non-numeric field `{field}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn set_unset_and_inc() {
        let mut doc = doc! { "author": "Mosh", "price": 15, "tags": ["node"] };
        let update = Update::new()
            .set("author", "Jason")
            .unset("tags")
            .inc("price", 5)
            .inc("enrolled", 1);

        assert!(update.apply(&mut doc).unwrap());
        assert_eq!(doc, doc! { "author": "Jason", "price": 20, "enrolled": 1 });
    }

    #[test]
    fn setting_the_same_value_is_not_a_modification() {
        let mut doc = doc! { "isPublished": true };

        let changed = Update::new().set("isPublished", true).apply(&mut doc).unwrap();

        assert!(!changed);
    }

    #[test]
    fn identifiers_are_immutable() {
        let err = Update::new()
            .set("_id", "other")
            .check()
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::Query(_)));
    }

    #[test]
    fn empty_updates_are_rejected() {
        assert!(Update::new().check().is_err());
    }

    #[test]
    fn inc_requires_numbers() {
        let mut doc = doc! { "author": "Mosh" };

        assert!(Update::new().inc("author", 1).apply(&mut doc).is_err());
        assert!(Update::new().inc("price", "1").check().is_err());
    }

    #[test]
    fn int32_overflow_widens() {
        let mut doc = doc! { "n": i32::MAX };

        Update::new().inc("n", 1).apply(&mut doc).unwrap();

        assert_eq!(doc.get("n"), Some(&Bson::Int64(i32::MAX as i64 + 1)));
    }

    #[test]
    fn int64_overflow_is_an_error() {
        let mut doc = doc! { "n": i64::MAX };

        let err = Update::new().inc("n", 1i64).apply(&mut doc).unwrap_err();

        assert!(matches!(err, DocumentStoreError::Query(_)), "{err:?}");
        assert_eq!(doc.get("n"), Some(&Bson::Int64(i64::MAX)));

        let mut doc = doc! { "n": i64::MIN };
        assert!(Update::new().inc("n", -1).apply(&mut doc).is_err());
    }

    #[test]
    fn dotted_fields_are_rejected() {
        let err = Update::new().set("meta.level", "beginner").check().unwrap_err();

        assert!(matches!(err, DocumentStoreError::Query(_)));
    }

    #[test]
    fn each_field_is_targeted_once() {
        let update = Update::new().set("price", 10).inc("price", 5);

        assert!(matches!(update.check(), Err(DocumentStoreError::Query(_))));
        assert!(update.apply(&mut doc! { "price": 1 }).is_err());
    }
}
