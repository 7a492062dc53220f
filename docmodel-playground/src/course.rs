//! The `Course` document used throughout the playground.

use docmodel::{
    bson::{DateTime, Document as BsonDocument, oid::ObjectId},
    prelude::*,
};
use serde::{Deserialize, Serialize};

/// Categories a course may be filed under.
pub const CATEGORIES: [&str; 3] = ["web", "mobile", "network"];

pub const MIN_NAME_LENGTH: usize = 5;
pub const MIN_PRICE: f64 = 10.0;
pub const MAX_PRICE: f64 = 200.0;

/// A course offered on the platform.
///
/// Missing fields deserialise to their defaults so that projected results, which only
/// carry the selected fields, still load as a `Course`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Course {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime>,
    #[serde(rename = "isPublished")]
    pub is_published: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

impl Course {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            ..Self::default()
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn published(mut self) -> Self {
        self.is_published = true;
        self
    }
}

fn is_published(document: &BsonDocument) -> bool {
    document.get_bool("isPublished").unwrap_or(false)
}

impl Document for Course {
    fn id(&self) -> Option<&ObjectId> {
        self.id.as_ref()
    }

    fn collection_name() -> &'static str {
        "courses"
    }

    fn schema() -> Schema {
        Schema::builder("Course")
            .field(FieldSpec::string("name").required().min_length(MIN_NAME_LENGTH))
            .field(FieldSpec::string("category").required().one_of(CATEGORIES))
            .field(FieldSpec::string("author"))
            .field(FieldSpec::array("tags", FieldType::String))
            .field(FieldSpec::date("date").default_now())
            .field(FieldSpec::boolean("isPublished"))
            .field(
                FieldSpec::number("price")
                    .required_when(is_published)
                    .min(MIN_PRICE)
                    .max(MAX_PRICE),
            )
            .build()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn violations(course: &Course) -> Vec<String> {
        match course.validate() {
            Ok(()) => vec![],
            Err(e) => e
                .as_validation()
                .map(|v| v.violations.iter().map(|v| v.path.clone()).collect())
                .unwrap_or_default(),
        }
    }

    #[test]
    fn unpublished_courses_need_no_price() {
        assert!(Course::new("Node.js Course", "web").validate().is_ok());
    }

    #[test]
    fn published_courses_need_a_price() {
        let course = Course::new("Node.js Course", "web").published();
        assert_eq!(violations(&course), vec!["price"]);

        assert!(course.with_price(15.0).validate().is_ok());
    }

    #[test]
    fn every_broken_constraint_is_reported() {
        let course = Course::new("Node", "-").with_price(500.0);
        assert_eq!(violations(&course), vec!["name", "category", "price"]);
    }

    #[test]
    fn wire_names_follow_the_model() {
        let raw = Course::new("Redux Course", "web").published().to_document().unwrap();

        assert!(raw.contains_key("isPublished"));
        assert!(!raw.contains_key("_id"));
        assert!(!raw.contains_key("price"));
    }
}
