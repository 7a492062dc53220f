//! Course operations driven by the CLI, plus a walkthrough exercising all of them.

use docmodel::{
    bson::oid::ObjectId,
    prelude::*,
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;

use crate::course::Course;

/// Selection for [`list_courses`].
#[derive(Debug, Clone, Default)]
pub struct CourseListing {
    pub author: Option<String>,
    pub published: Option<bool>,
    pub page: PaginationParams,
    /// Restrict results to `name` and `tags` (plus `_id`).
    pub summary: bool,
}

/// Outcome of [`remove_course`].
#[derive(Debug, Clone, Serialize)]
pub struct Removal {
    pub deleted: u64,
    pub deleted_unpublished: u64,
    pub returned: Option<Course>,
}

/// One step of the walkthrough.
#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub name: &'static str,
    pub output: Value,
}

pub async fn create_course(store: &DynDocumentStore, course: Course) -> DocumentStoreResult<Course> {
    store.typed_collection::<Course>().create(course).await
}

pub async fn list_courses(store: &DynDocumentStore, listing: &CourseListing) -> DocumentStoreResult<Vec<Course>> {
    let mut filters = Vec::new();
    if let Some(author) = &listing.author {
        filters.push(Filter::eq("author", author.as_str()));
    }
    if let Some(published) = listing.published {
        filters.push(Filter::eq("isPublished", published));
    }

    let mut query = Query::builder()
        .filter(Filter::and(filters))
        .paginate(&listing.page)
        .sort("name", SortDirection::Asc);

    if listing.summary {
        query = query.select(["name", "tags"]);
    }

    store
        .typed_collection::<Course>()
        .find_many(query.build())
        .await
}

pub async fn show_course(store: &DynDocumentStore, id: &str) -> DocumentStoreResult<Option<Course>> {
    store.typed_collection::<Course>().find_by_id(id).await
}

/// Loads the course, changes it locally and saves it back through validation.
pub async fn publish_course(store: &DynDocumentStore, id: &str, author: &str) -> DocumentStoreResult<Option<Course>> {
    let author = author.to_string();

    store
        .typed_collection::<Course>()
        .update_in_place(id, move |course| {
            course.author = Some(author);
            course.is_published = true;
        })
        .await
}

/// Publishes every unpublished course in one store-side update.
pub async fn publish_all(store: &DynDocumentStore) -> DocumentStoreResult<UpdateResult> {
    store
        .typed_collection::<Course>()
        .update_by_filter(
            Filter::eq("isPublished", false),
            Update::new().set("isPublished", true),
        )
        .await
}

/// Assigns a new author and publishes, returning the updated course.
pub async fn reassign_course(store: &DynDocumentStore, id: &str, author: &str) -> DocumentStoreResult<Option<Course>> {
    store
        .typed_collection::<Course>()
        .update_and_return(
            id,
            Update::new()
                .set("author", author)
                .set("isPublished", true),
        )
        .await
}

/// Deletes the course, then every unpublished course, then asks for the course once more.
pub async fn remove_course(store: &DynDocumentStore, id: &str) -> DocumentStoreResult<Removal> {
    let courses = store.typed_collection::<Course>();
    let id = id.into_document_id()?;

    let deleted = courses.delete_one(Filter::id(id)).await?;
    let deleted_unpublished = courses.delete_many(Filter::eq("isPublished", false)).await?;
    let returned = courses.delete_and_return(id).await?;

    Ok(Removal { deleted, deleted_unpublished, returned })
}

fn to_value<T: Serialize>(value: &T) -> DocumentStoreResult<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Runs every course operation in turn against `store`.
///
/// A rejected course is part of the walkthrough, so its validation error is recorded as a
/// step rather than returned.
pub async fn demo(store: &DynDocumentStore) -> DocumentStoreResult<Vec<Step>> {
    let mut steps = Vec::new();

    let rejected = create_course(
        store,
        Course::new("Redux Course", "-")
            .with_author("Mosh Hamedani")
            .with_tags(["redux", "frontend"])
            .published()
            .with_price(15.0),
    )
    .await;
    steps.push(Step {
        name: "create rejected",
        output: match rejected {
            Err(DocumentStoreError::Validation(e)) => json!({ "error": e.to_string() }),
            other => to_value(&other?)?,
        },
    });

    let redux = create_course(
        store,
        Course::new("Redux Course", "web")
            .with_author("Mosh")
            .with_tags(["redux", "frontend"])
            .published()
            .with_price(15.0),
    )
    .await?;
    let node = create_course(
        store,
        Course::new("Node.js Course", "web")
            .with_author("Mosh")
            .with_tags(["node", "backend"]),
    )
    .await?;
    create_course(store, Course::new("Networking Basics", "network").with_author("Jason")).await?;
    steps.push(Step { name: "create", output: to_value(&redux)? });

    let listing = CourseListing {
        author: Some("Mosh".to_string()),
        published: Some(true),
        page: PaginationParams::new(1, 10),
        summary: true,
    };
    steps.push(Step { name: "list", output: to_value(&list_courses(store, &listing).await?)? });

    let node_id = hex(node.id);
    steps.push(Step {
        name: "publish",
        output: match publish_course(store, &node_id, "Another author").await {
            Err(DocumentStoreError::Validation(e)) => json!({ "error": e.to_string() }),
            other => to_value(&other?)?,
        },
    });

    let updated = publish_all(store).await?;
    steps.push(Step {
        name: "publish all",
        output: json!({ "matched": updated.matched_count, "modified": updated.modified_count }),
    });

    let redux_id = hex(redux.id);
    steps.push(Step { name: "reassign", output: to_value(&reassign_course(store, &redux_id, "Jason").await?)? });
    steps.push(Step { name: "remove", output: to_value(&remove_course(store, &redux_id).await?)? });

    info!(steps = steps.len(), "walkthrough finished");

    Ok(steps)
}

fn hex(id: Option<ObjectId>) -> String {
    id.map(|id| id.to_hex()).unwrap_or_default()
}
