//! Declarative document schemas and validation.
//!
//! A [`Schema`] is an ordered list of [`FieldSpec`]s. Each field declares a type,
//! whether it is required (always, never, or as a predicate over the rest of the
//! candidate document), value constraints, and an optional default.
//!
//! Validation works on the BSON form of a document and collects every violated
//! constraint rather than stopping at the first one.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::schema::{FieldSpec, FieldType, Schema};
//! use bson::Bson;
//!
//! let schema = Schema::builder("Course")
//!     .field(FieldSpec::string("name").required().min_length(5))
//!     .field(FieldSpec::string("category").required().one_of(["web", "mobile", "network"]))
//!     .field(FieldSpec::array("tags", FieldType::String))
//!     .field(FieldSpec::date("date").default_now())
//!     .field(FieldSpec::boolean("isPublished"))
//!     .field(
//!         FieldSpec::number("price")
//!             .required_when(|doc| matches!(doc.get("isPublished"), Some(Bson::Boolean(true))))
//!             .min(10.0)
//!             .max(200.0),
//!     )
//!     .build();
//! ```

use bson::{Bson, DateTime, Document as BsonDocument};
use std::{fmt, sync::Arc};

use crate::error::ValidationError;

type Predicate = Arc<dyn Fn(&BsonDocument) -> bool + Send + Sync>;
type ValueCheck = Arc<dyn Fn(&Bson, &BsonDocument) -> bool + Send + Sync>;

/// The type a field's value must have.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    /// Any of int32, int64 or double.
    Number,
    Boolean,
    Date,
    ObjectId,
    /// An array whose elements all have the given type.
    Array(Box<FieldType>),
    /// An embedded document.
    Document,
    /// No type constraint.
    Any,
}

impl FieldType {
    /// Returns `true` if `value` conforms to this type.
    pub fn matches(&self, value: &Bson) -> bool {
        match (self, value) {
            (FieldType::Any, _) => true,
            (FieldType::String, Bson::String(_)) => true,
            (FieldType::Number, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) => true,
            (FieldType::Boolean, Bson::Boolean(_)) => true,
            (FieldType::Date, Bson::DateTime(_)) => true,
            (FieldType::ObjectId, Bson::ObjectId(_)) => true,
            (FieldType::Document, Bson::Document(_)) => true,
            (FieldType::Array(inner), Bson::Array(items)) => items.iter().all(|item| inner.matches(item)),
            _ => false,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::String => write!(f, "String"),
            FieldType::Number => write!(f, "Number"),
            FieldType::Boolean => write!(f, "Boolean"),
            FieldType::Date => write!(f, "Date"),
            FieldType::ObjectId => write!(f, "ObjectId"),
            FieldType::Array(inner) => write!(f, "[{inner}]"),
            FieldType::Document => write!(f, "Document"),
            FieldType::Any => write!(f, "Any"),
        }
    }
}

/// Whether a field must be present.
#[derive(Clone, Default)]
pub enum Requirement {
    #[default]
    Optional,
    Required,
    /// Required when the predicate holds for the candidate document.
    RequiredWhen(Predicate),
}

impl Requirement {
    fn applies_to(&self, document: &BsonDocument) -> bool {
        match self {
            Requirement::Optional => false,
            Requirement::Required => true,
            Requirement::RequiredWhen(predicate) => predicate(document),
        }
    }
}

impl fmt::Debug for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Optional => write!(f, "Optional"),
            Requirement::Required => write!(f, "Required"),
            Requirement::RequiredWhen(_) => write!(f, "RequiredWhen(..)"),
        }
    }
}

/// Value filled in for an absent field when a document is created.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDefault {
    /// A fixed value.
    Value(Bson),
    /// The current time, taken separately for every created document.
    Now,
}

impl FieldDefault {
    fn resolve(&self) -> Bson {
        match self {
            FieldDefault::Value(value) => value.clone(),
            FieldDefault::Now => Bson::DateTime(DateTime::now()),
        }
    }
}

#[derive(Clone)]
struct CustomCheck {
    message: String,
    check: ValueCheck,
}

/// Declaration of a single field: its type, requiredness, constraints and default.
#[derive(Clone)]
pub struct FieldSpec {
    name: String,
    field_type: FieldType,
    requirement: Requirement,
    default: Option<FieldDefault>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    min: Option<f64>,
    max: Option<f64>,
    allowed: Option<Vec<String>>,
    custom: Vec<CustomCheck>,
}

impl FieldSpec {
    /// Declares an optional field of the given type.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            requirement: Requirement::Optional,
            default: None,
            min_length: None,
            max_length: None,
            min: None,
            max: None,
            allowed: None,
            custom: Vec::new(),
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Number)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Date)
    }

    pub fn object_id(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::ObjectId)
    }

    pub fn array(name: impl Into<String>, element: FieldType) -> Self {
        Self::new(name, FieldType::Array(Box::new(element)))
    }

    /// Returns the field path this spec validates.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Marks the field as always required.
    pub fn required(mut self) -> Self {
        self.requirement = Requirement::Required;
        self
    }

    /// Marks the field as required whenever `predicate` holds for the candidate document.
    ///
    /// The predicate sees the whole document being validated, so requiredness can depend
    /// on the value of other fields.
    pub fn required_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&BsonDocument) -> bool + Send + Sync + 'static,
    {
        self.requirement = Requirement::RequiredWhen(Arc::new(predicate));
        self
    }

    /// Minimum length, in characters, of a string value.
    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    /// Maximum length, in characters, of a string value.
    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    /// Inclusive lower bound of a numeric value.
    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    /// Inclusive upper bound of a numeric value.
    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    /// Restricts a string value to a fixed set.
    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Fills the field with `value` on creation when absent.
    pub fn default_value(mut self, value: impl Into<Bson>) -> Self {
        self.default = Some(FieldDefault::Value(value.into()));
        self
    }

    /// Fills the field with the creation time when absent.
    pub fn default_now(mut self) -> Self {
        self.default = Some(FieldDefault::Now);
        self
    }

    /// Adds a custom check. It receives the field value and the whole candidate document
    /// and reports `message` when it returns `false`.
    pub fn validate_with<F>(mut self, message: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Bson, &BsonDocument) -> bool + Send + Sync + 'static,
    {
        self.custom.push(CustomCheck { message: message.into(), check: Arc::new(check) });
        self
    }

    fn check(&self, document: &BsonDocument, violations: &mut Vec<Violation>) {
        let value = match lookup(document, &self.name) {
            Some(value) if !is_absent(value) => value,
            _ => {
                if self.requirement.applies_to(document) {
                    violations.push(self.violation(ViolationKind::Required));
                }
                return;
            }
        };

        if !self.field_type.matches(value) {
            violations.push(self.violation(ViolationKind::Type {
                expected: self.field_type.clone(),
                found: bson_type_name(value).to_string(),
            }));
            return;
        }

        if let Bson::String(text) = value {
            let length = text.chars().count();

            if let Some(min) = self.min_length.filter(|min| length < *min) {
                violations.push(self.violation(ViolationKind::MinLength { value: text.clone(), min }));
            }
            if let Some(max) = self.max_length.filter(|max| length > *max) {
                violations.push(self.violation(ViolationKind::MaxLength { value: text.clone(), max }));
            }
            if let Some(allowed) = &self.allowed {
                if !allowed.iter().any(|candidate| candidate == text) {
                    violations.push(self.violation(ViolationKind::Enum { value: text.clone() }));
                }
            }
        }

        if let Some(number) = as_number(value) {
            if let Some(min) = self.min.filter(|min| number < *min) {
                violations.push(self.violation(ViolationKind::Min { value: number, min }));
            }
            if let Some(max) = self.max.filter(|max| number > *max) {
                violations.push(self.violation(ViolationKind::Max { value: number, max }));
            }
        }

        for custom in &self.custom {
            if !(custom.check)(value, document) {
                violations.push(self.violation(ViolationKind::Custom(custom.message.clone())));
            }
        }
    }

    fn violation(&self, kind: ViolationKind) -> Violation {
        Violation { path: self.name.clone(), kind }
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .field("requirement", &self.requirement)
            .field("default", &self.default)
            .field("min_length", &self.min_length)
            .field("max_length", &self.max_length)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("allowed", &self.allowed)
            .field("custom", &self.custom.len())
            .finish()
    }
}

/// A single violated constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Path of the offending field.
    pub path: String,
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViolationKind {
    Required,
    Type { expected: FieldType, found: String },
    MinLength { value: String, min: usize },
    MaxLength { value: String, max: usize },
    Min { value: f64, min: f64 },
    Max { value: f64, max: f64 },
    Enum { value: String },
    Custom(String),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = &self.path;

        match &self.kind {
            ViolationKind::Required => write!(f, "Path `{path}` is required."),
            ViolationKind::Type { expected, found } => {
                write!(f, "Cast to {expected} failed for value of type {found} at path `{path}`.")
            }
            ViolationKind::MinLength { value, min } => write!(
                f,
                "Path `{path}` (`{value}`) is shorter than the minimum allowed length ({min})."
            ),
            ViolationKind::MaxLength { value, max } => write!(
                f,
                "Path `{path}` (`{value}`) is longer than the maximum allowed length ({max})."
            ),
            ViolationKind::Min { value, min } => {
                write!(f, "Path `{path}` ({value}) is less than minimum allowed value ({min}).")
            }
            ViolationKind::Max { value, max } => {
                write!(f, "Path `{path}` ({value}) is more than maximum allowed value ({max}).")
            }
            ViolationKind::Enum { value } => write!(f, "`{value}` is not a valid enum value for path `{path}`."),
            ViolationKind::Custom(message) => write!(f, "{message}"),
        }
    }
}

/// An ordered set of field declarations for one model.
#[derive(Debug, Clone)]
pub struct Schema {
    model: String,
    fields: Vec<FieldSpec>,
}

impl Schema {
    /// Starts a schema for the model called `model` (used in error messages).
    pub fn builder(model: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder { schema: Schema { model: model.into(), fields: Vec::new() } }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Checks `document` against every field declaration.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] listing every violated constraint, in declaration order.
    pub fn validate(&self, document: &BsonDocument) -> Result<(), ValidationError> {
        let mut violations = Vec::new();

        for field in &self.fields {
            field.check(document, &mut violations);
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { model: self.model.clone(), violations })
        }
    }

    /// Fills absent top-level fields that declare a default.
    pub fn apply_defaults(&self, document: &mut BsonDocument) {
        for field in &self.fields {
            let Some(default) = &field.default else {
                continue;
            };

            if document.get(&field.name).is_none_or(is_absent) {
                document.insert(field.name.clone(), default.resolve());
            }
        }
    }
}

pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    /// Appends a field declaration. Fields are validated in the order they are added.
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.schema.fields.push(field);
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

/// Resolves a dotted path (`"a.b.c"`) inside a document.
pub fn lookup<'a>(document: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

/// Numeric value of an int32, int64 or double.
pub fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

/// Short type name of a BSON value, for messages.
pub fn bson_type_name(value: &Bson) -> &'static str {
    match value {
        Bson::Double(_) | Bson::Int32(_) | Bson::Int64(_) | Bson::Decimal128(_) => "number",
        Bson::String(_) | Bson::Symbol(_) => "string",
        Bson::Array(_) => "array",
        Bson::Document(_) => "document",
        Bson::Boolean(_) => "boolean",
        Bson::Null | Bson::Undefined => "null",
        Bson::DateTime(_) => "date",
        Bson::ObjectId(_) => "objectId",
        _ => "other",
    }
}

// Missing, null and empty strings all count as "not provided".
fn is_absent(value: &Bson) -> bool {
    match value {
        Bson::Null | Bson::Undefined => true,
        Bson::String(text) => text.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn course_schema() -> Schema {
        Schema::builder("Course")
            .field(FieldSpec::string("name").required().min_length(5))
            .field(FieldSpec::string("category").required().one_of(["web", "mobile", "network"]))
            .field(FieldSpec::string("author"))
            .field(FieldSpec::array("tags", FieldType::String))
            .field(FieldSpec::date("date").default_now())
            .field(FieldSpec::boolean("isPublished"))
            .field(
                FieldSpec::number("price")
                    .required_when(|doc| matches!(doc.get("isPublished"), Some(Bson::Boolean(true))))
                    .min(10.0)
                    .max(200.0),
            )
            .build()
    }

    #[test]
    fn accepts_a_valid_published_course() {
        let doc = doc! {
            "name": "Redux Course",
            "category": "web",
            "tags": ["redux", "frontend"],
            "isPublished": true,
            "price": 15,
        };

        assert!(course_schema().validate(&doc).is_ok());
    }

    #[test]
    fn price_is_only_required_when_published() {
        let schema = course_schema();
        let unpublished = doc! { "name": "Node Course", "category": "web", "isPublished": false };
        let published = doc! { "name": "Node Course", "category": "web", "isPublished": true };

        assert!(schema.validate(&unpublished).is_ok());

        let err = schema.validate(&published).unwrap_err();
        assert_eq!(err.violations.len(), 1);
        assert_eq!(err.violations[0].path, "price");
        assert_eq!(err.violations[0].kind, ViolationKind::Required);
    }

    #[test]
    fn reports_every_violation_in_declaration_order() {
        let doc = doc! { "name": "abc", "category": "-", "isPublished": true, "price": 250.0 };

        let err = course_schema().validate(&doc).unwrap_err();
        let paths = err.violations.iter().map(|v| v.path.as_str()).collect::<Vec<_>>();

        assert_eq!(paths, vec!["name", "category", "price"]);
        assert_eq!(
            err.to_string(),
            "Course validation failed: \
             name: Path `name` (`abc`) is shorter than the minimum allowed length (5)., \
             category: `-` is not a valid enum value for path `category`., \
             price: Path `price` (250) is more than maximum allowed value (200)."
        );
    }

    #[test]
    fn empty_and_null_values_count_as_missing() {
        let doc = doc! { "name": "", "category": Bson::Null };

        let err = course_schema().validate(&doc).unwrap_err();

        assert!(err.violations.iter().all(|v| v.kind == ViolationKind::Required));
        assert!(err.has_violation("name"));
        assert!(err.has_violation("category"));
    }

    #[test]
    fn type_mismatch_skips_value_constraints() {
        let doc = doc! { "name": "Angular", "category": "web", "price": "cheap" };

        let err = course_schema().validate(&doc).unwrap_err();

        assert_eq!(err.violations.len(), 1);
        assert!(matches!(err.violations[0].kind, ViolationKind::Type { .. }));
    }

    #[test]
    fn array_elements_are_type_checked() {
        let doc = doc! { "name": "Angular", "category": "web", "tags": ["ok", 3] };

        let err = course_schema().validate(&doc).unwrap_err();

        assert!(err.has_violation("tags"));
    }

    #[test]
    fn custom_checks_see_the_whole_document() {
        let schema = Schema::builder("Course")
            .field(FieldSpec::array("tags", FieldType::String).validate_with(
                "A published course should have at least one tag.",
                |value, doc| {
                    let published = matches!(doc.get("isPublished"), Some(Bson::Boolean(true)));
                    !published || value.as_array().is_some_and(|tags| !tags.is_empty())
                },
            ))
            .build();

        assert!(schema.validate(&doc! { "tags": [], "isPublished": false }).is_ok());

        let err = schema.validate(&doc! { "tags": [], "isPublished": true }).unwrap_err();
        assert_eq!(err.violations[0].to_string(), "A published course should have at least one tag.");
    }

    #[test]
    fn defaults_fill_only_absent_fields() {
        let schema = Schema::builder("Course")
            .field(FieldSpec::date("date").default_now())
            .field(FieldSpec::boolean("isPublished").default_value(false))
            .build();
        let fixed = DateTime::from_millis(0);
        let mut doc = doc! { "date": fixed };

        schema.apply_defaults(&mut doc);

        assert_eq!(doc.get("date"), Some(&Bson::DateTime(fixed)));
        assert_eq!(doc.get("isPublished"), Some(&Bson::Boolean(false)));
    }

    #[test]
    fn now_default_is_taken_per_document() {
        let schema = Schema::builder("Course")
            .field(FieldSpec::date("date").default_now())
            .build();
        let mut first = doc! {};
        schema.apply_defaults(&mut first);
        std::thread::sleep(std::time::Duration::from_millis(5));
        let mut second = doc! {};
        schema.apply_defaults(&mut second);

        assert!(second.get_datetime("date").unwrap() > first.get_datetime("date").unwrap());
    }

    #[test]
    fn lookup_follows_dotted_paths() {
        let doc = doc! { "author": { "name": "Mosh" } };

        assert_eq!(lookup(&doc, "author.name"), Some(&Bson::String("Mosh".into())));
        assert_eq!(lookup(&doc, "author.age"), None);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Without a price on unpublished courses, validity is exactly the conjunction
            /// of the name, category and price-bounds rules.
            #[test]
            fn validity_matches_the_course_rules(
                name in "[a-zA-Z ]{0,10}",
                category in prop::sample::select(vec!["web", "mobile", "network", "desktop", "-"]),
                published in any::<bool>(),
                price in 0.0f64..300.0,
            ) {
                let mut doc = doc! { "name": name.clone(), "category": category, "isPublished": published };
                if published {
                    doc.insert("price", price);
                }

                let expected = name.chars().count() >= 5
                    && ["web", "mobile", "network"].contains(&category)
                    && (!published || (10.0..=200.0).contains(&price));

                prop_assert_eq!(course_schema().validate(&doc).is_ok(), expected);
            }
        }
    }
}
