//! Query construction and filtering API for document stores.
//!
//! This module provides query construction with filtering, sorting, skip/limit pagination
//! and projection, plus a visitor trait that backends implement to evaluate or translate
//! filter expressions.
//!
//! # Query Building
//!
//! ```ignore
//! use docmodel::query::{Filter, Query, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::eq("author", "Mosh").and(Filter::eq("isPublished", true)))
//!     .skip(0)
//!     .limit(10)
//!     .sort("name", SortDirection::Asc)
//!     .select(["name", "tags"])
//!     .build();
//! ```
//!
//! # Filter Expression API
//!
//! The [`Filter`] struct provides static constructors for filter expressions:
//!
//! - Comparison: `eq`, `ne`, `gt`, `gte`, `lt`, `lte`
//! - String: `starts_with`, `ends_with`, `contains`, `not_contains`
//! - Existence: `exists`, `not_exists`
//! - Array: `any_of`, `none_of`
//! - Logical: `and`, `or`
//! - Identity: `id`, `all`

use bson::{Bson, oid::ObjectId};

use crate::{document::ID_FIELD, error::DocumentStoreError, page::PaginationParams};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// Sort specification for query results.
#[derive(Debug, Clone)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to. Matches array fields containing the value.
    Eq,
    /// Not equal to. Matches documents missing the field.
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// String or array contains value.
    Contains,
    /// String or array does not contain value.
    NotContains,
    /// String starts with value.
    StartsWith,
    /// String ends with value.
    EndsWith,
    /// Field equals, or array field contains, any of the values.
    AnyOf,
    /// Field equals, and array field contains, none of the values.
    NoneOf,
}

/// A filter expression for querying documents.
///
/// Expressions can be combined using logical operators (`And`, `Or`, `Not`)
/// to build complex filter predicates. An empty `And` matches every document.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Logical NOT of an expression (inverts the result).
    Not(Box<Expr>),
    /// Checks if a field exists or doesn't exist.
    Exists(String, bool),
    /// Field comparison expression.
    Field {
        /// The field path to compare. Dots address embedded documents.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended
    /// to the list. Otherwise, a new AND expression is created.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    ///
    /// If this expression is already an OR, the other expression is appended
    /// to the list. Otherwise, a new OR expression is created.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    /// Negates this expression (logical NOT).
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Returns `true` if this expression matches every document.
    pub fn matches_all(&self) -> bool {
        matches!(self, Expr::And(list) if list.is_empty())
    }

    /// Rejects expressions no backend can evaluate: empty field names, empty `Or`
    /// lists, and operators given an operand of the wrong type.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Query`] describing the first malformed node.
    pub fn check(&self) -> Result<(), DocumentStoreError> {
        match self {
            Expr::And(list) => list.iter().try_for_each(Expr::check),
            Expr::Or(list) if list.is_empty() => {
                Err(DocumentStoreError::Query("`or` needs at least one expression".into()))
            }
            Expr::Or(list) => list.iter().try_for_each(Expr::check),
            Expr::Not(inner) => inner.check(),
            Expr::Exists(field, _) if field.is_empty() => {
                Err(DocumentStoreError::Query("filter field name is empty".into()))
            }
            Expr::Exists(..) => Ok(()),
            Expr::Field { field, .. } if field.is_empty() => {
                Err(DocumentStoreError::Query("filter field name is empty".into()))
            }
            Expr::Field { field, op: FieldOp::AnyOf | FieldOp::NoneOf, value } if !matches!(value, Bson::Array(_)) => {
                Err(DocumentStoreError::Query(format!("`any_of`/`none_of` on `{field}` needs an array of values")))
            }
            Expr::Field { field, op: FieldOp::StartsWith | FieldOp::EndsWith, value } if !matches!(value, Bson::String(_)) => {
                Err(DocumentStoreError::Query(format!("`starts_with`/`ends_with` on `{field}` needs a string")))
            }
            Expr::Field { .. } => Ok(()),
        }
    }
}

/// Which fields query results carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Only the listed fields, plus `_id`.
    Include(Vec<String>),
    /// Every field except the listed ones.
    Exclude(Vec<String>),
}

impl Projection {
    /// Returns `true` if `field` survives this projection.
    pub fn keeps(&self, field: &str) -> bool {
        match self {
            Projection::Include(fields) => field == ID_FIELD || fields.iter().any(|f| f == field),
            Projection::Exclude(fields) => !fields.iter().any(|f| f == field),
        }
    }
}

/// A structured query for retrieving and filtering documents.
///
/// This struct encapsulates filters, skip/limit, sort and projection
/// for document queries. Use [`QueryBuilder`] for ergonomic construction.
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// Optional filter expression to match documents.
    pub filter: Option<Expr>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Number of matching documents to skip, after sorting.
    pub skip: Option<usize>,
    /// Sort specification for results.
    pub sort: Option<Sort>,
    /// Fields to keep or drop in the results.
    pub projection: Option<Projection>,
}

impl Query {
    /// Creates a new empty query matching every document.
    pub fn new() -> Self {
        Query::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    /// Creates a query with only a filter.
    pub fn filtered(filter: Expr) -> Self {
        Query::builder().filter(filter).build()
    }
}

/// Helper struct for constructing filter expressions.
///
/// All methods accept field names and values as `Into<String>` and `Into<Bson>` for ergonomics.
///
/// # Example
///
/// ```ignore
/// use docmodel::query::Filter;
///
/// let expr = Filter::eq("author", "Mosh")
///     .and(Filter::eq("isPublished", true));
/// ```
pub struct Filter;

impl Filter {
    /// Matches the document with the given identifier.
    pub fn id(id: ObjectId) -> Expr {
        Expr::field(ID_FIELD.to_string(), FieldOp::Eq, Bson::ObjectId(id))
    }

    /// Matches every document.
    pub fn all() -> Expr {
        Expr::And(Vec::new())
    }

    /// Matches documents where the field equals the specified value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    /// Matches documents where the field does not equal the specified value.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    /// Matches documents where the string field starts with the specified value.
    pub fn starts_with(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::StartsWith, value.into())
    }

    /// Matches documents where the string field ends with the specified value.
    pub fn ends_with(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::EndsWith, value.into())
    }

    /// Matches documents where the field (string or array) contains the specified value.
    pub fn contains(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Contains, value.into())
    }

    /// Matches documents where the field (string or array) does not contain the specified value.
    pub fn not_contains(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::NotContains, value.into())
    }

    /// Matches documents where the field is present.
    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    /// Matches documents where the field is missing.
    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    /// Combines multiple expressions such that all must match for a document to be included.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    /// Combines multiple expressions such that any can match for a document to be included.
    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }

    /// Matches documents where the field equals (or the array field contains) any of the values.
    pub fn any_of(field: impl Into<String>, values: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::AnyOf, values.into())
    }

    /// Matches documents where the field equals (and the array field contains) none of the values.
    pub fn none_of(field: impl Into<String>, values: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::NoneOf, values.into())
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Sets the filter expression for this query.
    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Sets the number of documents to skip.
    pub fn skip(mut self, skip: usize) -> Self {
        self.query.skip = Some(skip);
        self
    }

    /// Sets skip and limit from 1-indexed page parameters.
    pub fn paginate(self, params: &PaginationParams) -> Self {
        self.skip(params.offset()).limit(params.per_page)
    }

    /// Sets the sort specification for the query results.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort = Some(Sort { field: field.into(), direction });
        self
    }

    /// Keeps only the listed fields (and `_id`) in the results.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.projection = Some(Projection::Include(fields.into_iter().map(Into::into).collect()));
        self
    }

    /// Drops the listed fields from the results.
    pub fn exclude<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.projection = Some(Projection::Exclude(fields.into_iter().map(Into::into).collect()));
        self
    }

    /// Builds and returns the final query.
    pub fn build(self) -> Query {
        self.query
    }
}

pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chained_and_flattens() {
        let expr = Filter::eq("author", "Mosh")
            .and(Filter::eq("isPublished", true))
            .and(Filter::gte("price", 10));

        match expr {
            Expr::And(list) => assert_eq!(list.len(), 3),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn paginate_converts_page_numbers_to_skip() {
        let query = Query::builder()
            .paginate(&PaginationParams::new(3, 10))
            .build();

        assert_eq!(query.skip, Some(20));
        assert_eq!(query.limit, Some(10));
    }

    #[test]
    fn include_projection_always_keeps_the_id() {
        let projection = Projection::Include(vec!["name".into(), "tags".into()]);

        assert!(projection.keeps("_id"));
        assert!(projection.keeps("tags"));
        assert!(!projection.keeps("price"));
    }

    #[test]
    fn check_rejects_malformed_filters() {
        assert!(Filter::all().check().is_ok());
        assert!(Filter::any_of("tags", vec!["a", "b"]).check().is_ok());
        assert!(Filter::eq("", 1).check().is_err());
        assert!(Filter::or(Vec::new()).check().is_err());
        assert!(Filter::any_of("tags", "a").check().is_err());
        assert!(Filter::eq("a", 1).and(Filter::exists("")).check().is_err());
    }
}
