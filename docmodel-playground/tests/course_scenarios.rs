use docmodel::{
    bson::{doc, oid::ObjectId},
    memory::InMemoryStore,
    prelude::*,
};
use docmodel_playground::{
    Course, PlaygroundConfig,
    course::CATEGORIES,
    logging::LogFormat,
    scenario::{self, CourseListing},
};
use proptest::prelude::*;
use std::io::Write;

async fn store() -> DynDocumentStore {
    docmodel::connect("memory://playground").await.unwrap()
}

fn redux() -> Course {
    Course::new("Redux Course", "web")
        .with_author("Mosh Hamedani")
        .with_tags(["redux", "frontend"])
        .published()
        .with_price(15.0)
}

#[tokio::test]
async fn created_courses_read_back_unchanged() {
    let store = store().await;
    let courses = store.typed_collection::<Course>();

    let created = courses.create(redux()).await.unwrap();
    assert!(created.id.is_some());
    assert!(created.date.is_some());

    let found = courses.find_by_id(created.id.unwrap()).await.unwrap().unwrap();
    assert_eq!(found, created);
    assert_eq!(Course { id: None, date: None, ..found }, redux());
}

#[tokio::test]
async fn invalid_courses_are_never_stored() {
    let store = store().await;
    let courses = store.typed_collection::<Course>();

    let err = courses
        .create(Course::new("Redux Course", "-").published().with_price(15.0))
        .await
        .unwrap_err();

    let validation = err.as_validation().unwrap();
    assert!(validation.has_violation("category"));
    assert_eq!(
        err.to_string(),
        "Course validation failed: category: `-` is not a valid enum value for path `category`."
    );

    assert_eq!(courses.count(Filter::all()).await.unwrap(), 0);
}

#[tokio::test]
async fn publishing_without_a_price_leaves_the_course_unchanged() {
    let store = store().await;
    let courses = store.typed_collection::<Course>();
    let course = courses.create(Course::new("Node.js Course", "web")).await.unwrap();
    let id = course.id.unwrap();

    let err = courses
        .update_in_place(id, |c| c.is_published = true)
        .await
        .unwrap_err();
    assert!(err.as_validation().unwrap().has_violation("price"));

    assert_eq!(courses.find_by_id(id).await.unwrap().unwrap(), course);

    let published = courses
        .update_in_place(id, |c| {
            c.is_published = true;
            c.price = Some(20.0);
        })
        .await
        .unwrap()
        .unwrap();
    assert!(published.is_published);
    assert_eq!(courses.find_by_id(id).await.unwrap().unwrap(), published);
}

#[tokio::test]
async fn updating_a_missing_course_is_not_an_error() {
    let store = store().await;
    let courses = store.typed_collection::<Course>();

    let missing = courses
        .update_in_place(ObjectId::new(), |c| c.is_published = true)
        .await
        .unwrap();

    assert!(missing.is_none());
}

#[tokio::test]
async fn deleted_courses_are_not_found() {
    let store = store().await;
    let courses = store.typed_collection::<Course>();
    let id = courses.create(redux()).await.unwrap().id.unwrap();

    assert_eq!(courses.delete_one(Filter::id(id)).await.unwrap(), 1);
    assert!(courses.find_by_id(id).await.unwrap().is_none());
    assert_eq!(courses.delete_one(Filter::id(id)).await.unwrap(), 0);
}

#[tokio::test]
async fn listing_pages_through_sorted_results() {
    let store = store().await;

    for i in (0..15).rev() {
        scenario::create_course(
            &store,
            Course::new(format!("Course {i:02}"), "web")
                .with_author("Mosh")
                .with_tags([format!("tag{i}")])
                .published()
                .with_price(10.0 + i as f64),
        )
        .await
        .unwrap();
    }
    scenario::create_course(&store, Course::new("Course by Jason", "mobile").with_author("Jason"))
        .await
        .unwrap();

    let mut listing = CourseListing {
        author: Some("Mosh".to_string()),
        published: Some(true),
        page: PaginationParams::new(1, 10),
        summary: true,
    };

    let first = scenario::list_courses(&store, &listing).await.unwrap();
    let names: Vec<_> = first.iter().map(|c| c.name.clone()).collect();
    let expected: Vec<_> = (0..10).map(|i| format!("Course {i:02}")).collect();
    assert_eq!(names, expected);

    // Projected fields only.
    assert!(first.iter().all(|c| c.id.is_some() && c.author.is_none() && c.price.is_none()));
    assert_eq!(first[0].tags, vec!["tag0"]);

    listing.page = PaginationParams::new(2, 10);
    assert_eq!(scenario::list_courses(&store, &listing).await.unwrap().len(), 5);
}

#[tokio::test]
async fn publishing_everything_updates_only_unpublished_courses() {
    let store = store().await;
    let courses = store.typed_collection::<Course>();

    courses.create(redux()).await.unwrap();
    courses.create(Course::new("Node.js Course", "web")).await.unwrap();
    courses.create(Course::new("Networking Basics", "network")).await.unwrap();

    let unpublished = courses.count(Filter::eq("isPublished", false)).await.unwrap();
    let result = scenario::publish_all(&store).await.unwrap();

    assert_eq!(result.matched_count, unpublished);
    assert_eq!(result.modified_count, unpublished);

    let remaining = courses
        .find_many(Query::filtered(Filter::eq("isPublished", false)))
        .await
        .unwrap();
    assert!(remaining.is_empty());

    // Filtered updates bypass the schema, so published courses may lack a price.
    let node = courses
        .find_many(Query::filtered(Filter::eq("name", "Node.js Course")))
        .await
        .unwrap()
        .remove(0);
    assert!(node.is_published);
    assert!(courses.validate(&node).is_err());
}

#[tokio::test]
async fn reassigning_returns_the_updated_course() {
    let store = store().await;
    let course = scenario::create_course(&store, Course::new("Node.js Course", "web")).await.unwrap();
    let id = course.id.unwrap().to_hex();

    let updated = scenario::reassign_course(&store, &id, "Jason").await.unwrap().unwrap();
    assert_eq!(updated.author.as_deref(), Some("Jason"));
    assert!(updated.is_published);
    assert_eq!(updated.date, course.date);

    assert!(scenario::reassign_course(&store, &ObjectId::new().to_hex(), "Jason").await.unwrap().is_none());
}

#[tokio::test]
async fn deleting_and_returning_yields_the_course_once() {
    let store = store().await;
    let courses = store.typed_collection::<Course>();
    let course = courses.create(redux()).await.unwrap();
    let id = course.id.unwrap();

    assert_eq!(courses.delete_and_return(id).await.unwrap(), Some(course));
    assert_eq!(courses.delete_and_return(id).await.unwrap(), None);
}

#[tokio::test]
async fn removing_deletes_the_course_and_unpublished_ones() {
    let store = store().await;
    let courses = store.typed_collection::<Course>();
    let course = courses.create(redux()).await.unwrap();
    courses.create(Course::new("Node.js Course", "web")).await.unwrap();
    courses.create(Course::new("Networking Basics", "network")).await.unwrap();

    let removal = scenario::remove_course(&store, &course.id.unwrap().to_hex()).await.unwrap();

    assert_eq!(removal.deleted, 1);
    assert_eq!(removal.deleted_unpublished, 2);
    assert!(removal.returned.is_none());
    assert_eq!(courses.count(Filter::all()).await.unwrap(), 0);
}

#[tokio::test]
async fn malformed_identifiers_are_query_errors() {
    let store = store().await;

    for result in [
        scenario::show_course(&store, "not-an-id").await.map(|_| ()),
        scenario::reassign_course(&store, "1234", "Jason").await.map(|_| ()),
        scenario::remove_course(&store, "").await.map(|_| ()),
    ] {
        assert!(matches!(result, Err(DocumentStoreError::Query(_))), "{result:?}");
    }
}

#[tokio::test]
async fn operations_fail_after_shutdown() {
    let backend = InMemoryStore::new();
    let store = DocumentStore::new(backend.clone()).into_dyn();
    store.typed_collection::<Course>().create(redux()).await.unwrap();

    store.shutdown().await.unwrap();

    let err = DocumentStore::new(backend)
        .typed_collection::<Course>()
        .count(Filter::all())
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::Connection(_)), "{err:?}");
}

#[tokio::test]
async fn updating_in_place_keeps_unmodelled_fields() {
    let backend = InMemoryStore::new();
    let id = ObjectId::new();
    backend
        .insert_documents(
            vec![doc! { "_id": id, "name": "Node.js Course", "category": "web", "__v": 0, "level": "beginner" }],
            "courses",
        )
        .await
        .unwrap();

    let store = DocumentStore::new(backend.clone());
    let courses = store.typed_collection::<Course>();

    let updated = courses
        .update_in_place(id, |c| c.author = Some("Jason".to_string()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.author.as_deref(), Some("Jason"));

    let stored = backend.get_documents(vec![id], "courses").await.unwrap().remove(0);
    assert_eq!(
        stored,
        doc! { "_id": id, "name": "Node.js Course", "category": "web", "__v": 0, "level": "beginner", "author": "Jason" }
    );

    courses.update_in_place(id, |c| c.author = None).await.unwrap();

    let stored = backend.get_documents(vec![id], "courses").await.unwrap().remove(0);
    assert!(!stored.contains_key("author"));
    assert_eq!(stored.get_str("level").unwrap(), "beginner");
}

#[tokio::test]
async fn saving_writes_validated_changes() {
    let store = store().await;
    let courses = store.typed_collection::<Course>();
    let course = courses.create(redux()).await.unwrap();

    let invalid = Course { name: "Node".to_string(), ..course.clone() };
    let err = courses.save(&invalid).await.unwrap_err();
    assert!(err.as_validation().unwrap().has_violation("name"));
    assert_eq!(courses.find_by_id(course.id.unwrap()).await.unwrap().unwrap(), course);

    let renamed = Course { name: "Redux Toolkit Course".to_string(), ..course.clone() };
    assert_eq!(courses.save(&renamed).await.unwrap(), Some(renamed.clone()));
    assert_eq!(courses.find_by_id(course.id.unwrap()).await.unwrap().unwrap(), renamed);

    let unknown = Course { id: Some(ObjectId::new()), ..course.clone() };
    assert_eq!(courses.save(&unknown).await.unwrap(), None);

    let err = courses.save(&redux()).await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::Query(_)), "{err:?}");
}

#[tokio::test]
async fn pages_report_their_neighbours() {
    let store = store().await;
    let courses = store.typed_collection::<Course>();

    for i in 0..15 {
        courses.create(Course::new(format!("Course {i:02}"), "web")).await.unwrap();
    }

    let query = Query::builder().sort("name", SortDirection::Asc).build();

    let second = courses.find_page(query.clone(), &PaginationParams::new(2, 6)).await.unwrap();
    assert_eq!(second.count, 15);
    assert_eq!(second.items.len(), 6);
    assert_eq!(second.items[0].name, "Course 06");
    assert_eq!(second.next_page, Some(3));
    assert_eq!(second.previous_page, Some(1));

    let last = courses.find_page(query.clone(), &PaginationParams::new(3, 6)).await.unwrap();
    assert_eq!(last.items.len(), 3);
    assert_eq!(last.next_page, None);

    let first = courses.find_page(query, &PaginationParams::new(1, 6)).await.unwrap();
    assert_eq!(first.previous_page, None);
    assert_eq!(first.next_page, Some(2));
}

#[tokio::test]
async fn deleting_by_id_removes_one_course() {
    let store = store().await;
    let courses = store.typed_collection::<Course>();
    let id = courses.create(redux()).await.unwrap().id.unwrap();
    courses.create(Course::new("Node.js Course", "web")).await.unwrap();

    assert_eq!(courses.delete_by_id(id.to_hex()).await.unwrap(), 1);
    assert_eq!(courses.delete_by_id(id).await.unwrap(), 0);
    assert_eq!(courses.count(Filter::all()).await.unwrap(), 1);

    assert!(matches!(courses.delete_by_id("nope").await, Err(DocumentStoreError::Query(_))));
}

#[tokio::test]
async fn excluded_fields_are_left_out() {
    let store = store().await;
    let courses = store.typed_collection::<Course>();
    courses.create(redux()).await.unwrap();

    let found = courses
        .find_many(Query::builder().exclude(["author", "tags"]).build())
        .await
        .unwrap()
        .remove(0);

    assert!(found.id.is_some());
    assert_eq!(found.name, "Redux Course");
    assert_eq!(found.price, Some(15.0));
    assert!(found.author.is_none());
    assert!(found.tags.is_empty());
}

#[tokio::test]
async fn the_walkthrough_runs_every_operation() {
    let store = store().await;

    let steps = scenario::demo(&store).await.unwrap();
    let names: Vec<_> = steps.iter().map(|s| s.name).collect();

    assert_eq!(
        names,
        ["create rejected", "create", "list", "publish", "publish all", "reassign", "remove"]
    );
    assert!(steps[0].output["error"].as_str().unwrap().contains("category"));
    assert!(steps[3].output["error"].as_str().unwrap().contains("price"));
    assert_eq!(steps[4].output["modified"], 2);
}

#[test]
fn config_files_are_loaded_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "uri = \"memory://playground\"\napp_name = \"tests\"\n\n[logging]\nlevel = \"debug\"\nformat = \"json\"").unwrap();

    let config = PlaygroundConfig::from_toml_file(file.path()).unwrap();

    assert_eq!(config.uri, "memory://playground");
    assert_eq!(config.app_name.as_deref(), Some("tests"));
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
fn missing_config_files_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = PlaygroundConfig::from_toml_file(dir.path().join("absent.toml")).unwrap_err();

    assert!(err.to_string().contains("absent.toml"));
}

proptest! {
    #[test]
    fn validation_accepts_exactly_the_documented_courses(
        name in "[a-zA-Z .]{0,12}",
        category in prop::sample::select(vec!["web", "mobile", "network", "desktop", ""]),
        is_published in any::<bool>(),
        price in prop::option::of(0.0f64..300.0),
    ) {
        let course = Course {
            name: name.clone(),
            category: category.to_string(),
            is_published,
            price,
            ..Course::default()
        };

        let expected = name.chars().count() >= 5
            && CATEGORIES.contains(&category)
            && match price {
                Some(price) => (10.0..=200.0).contains(&price),
                None => !is_published,
            };

        prop_assert_eq!(course.validate().is_ok(), expected);
    }
}
