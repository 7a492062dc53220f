use bson::{Bson, doc, oid::ObjectId};
use futures::TryStreamExt;

use docmodel_core::{
    backend::StoreBackend,
    error::DocumentStoreError,
    query::{Filter, Query, SortDirection},
    update::Update,
};
use docmodel_memory::InMemoryStore;

const COURSES: &str = "courses";

async fn seeded() -> (InMemoryStore, Vec<ObjectId>) {
    let store = InMemoryStore::named("tests");
    let ids = (0..3).map(|_| ObjectId::new()).collect::<Vec<_>>();

    store
        .insert_documents(
            vec![
                doc! { "_id": ids[0], "name": "Node.js Course", "author": "Mosh", "isPublished": true, "price": 15 },
                doc! { "_id": ids[1], "name": "Angular Course", "author": "Mosh", "isPublished": false },
                doc! { "_id": ids[2], "name": "React Course", "author": "Jason", "isPublished": false, "price": 25 },
            ],
            COURSES,
        )
        .await
        .unwrap();

    (store, ids)
}

async fn names(store: &InMemoryStore, query: Query) -> Vec<String> {
    store
        .query_documents(query, COURSES)
        .await
        .unwrap()
        .try_collect::<Vec<_>>()
        .await
        .unwrap()
        .into_iter()
        .map(|doc| doc.get_str("name").unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn duplicate_ids_are_rejected_without_partial_writes() {
    let (store, ids) = seeded().await;
    let fresh = ObjectId::new();

    let err = store
        .insert_documents(
            vec![doc! { "_id": fresh, "name": "Vue Course" }, doc! { "_id": ids[0], "name": "Dup" }],
            COURSES,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::DocumentAlreadyExists(..)));
    assert!(store.get_documents(vec![fresh], COURSES).await.unwrap().is_empty());
}

#[tokio::test]
async fn queries_keep_natural_order_and_sort_stably() {
    let (store, _) = seeded().await;

    assert_eq!(names(&store, Query::new()).await, ["Node.js Course", "Angular Course", "React Course"]);

    let by_author = Query::builder()
        .sort("author", SortDirection::Asc)
        .build();
    assert_eq!(names(&store, by_author).await, ["React Course", "Node.js Course", "Angular Course"]);

    // Missing prices sort first, as null
    let by_price = Query::builder()
        .sort("price", SortDirection::Asc)
        .skip(1)
        .limit(1)
        .build();
    assert_eq!(names(&store, by_price).await, ["Node.js Course"]);
}

#[tokio::test]
async fn projection_keeps_the_identifier() {
    let (store, ids) = seeded().await;

    let docs = store
        .query_documents(
            Query::builder()
                .filter(Filter::id(ids[2]))
                .select(["name"])
                .build(),
            COURSES,
        )
        .await
        .unwrap()
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    assert_eq!(docs, vec![doc! { "_id": ids[2], "name": "React Course" }]);
}

#[tokio::test]
async fn update_by_filter_counts_matched_and_modified() {
    let (store, _) = seeded().await;

    let result = store
        .update_documents(Filter::eq("author", "Mosh"), Update::new().set("isPublished", true), COURSES)
        .await
        .unwrap();

    assert_eq!(result.matched_count, 2);
    assert_eq!(result.modified_count, 1);
    assert_eq!(store.count_documents(Filter::eq("isPublished", false), COURSES).await.unwrap(), 1);
}

#[tokio::test]
async fn failing_update_changes_nothing() {
    let (store, _) = seeded().await;

    // Missing prices are set, numeric prices are incremented
    store
        .update_documents(Filter::all(), Update::new().inc("price", 1), COURSES)
        .await
        .unwrap();

    let err = store
        .update_documents(Filter::all(), Update::new().set("price", 10).inc("author", 1), COURSES)
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::Query(_)));

    let prices = store
        .query_documents(Query::builder().sort("price", SortDirection::Asc).build(), COURSES)
        .await
        .unwrap()
        .try_collect::<Vec<_>>()
        .await
        .unwrap()
        .into_iter()
        .map(|doc| doc.get("price").cloned().unwrap_or(Bson::Null))
        .collect::<Vec<_>>();
    assert_eq!(prices, vec![Bson::Int32(1), Bson::Int32(16), Bson::Int32(26)]);
}

#[tokio::test]
async fn integer_overflow_fails_without_writing() {
    let store = InMemoryStore::named("tests");
    let id = ObjectId::new();
    store
        .insert_documents(vec![doc! { "_id": id, "enrolled": i64::MAX }], COURSES)
        .await
        .unwrap();

    let err = store
        .update_documents(Filter::all(), Update::new().inc("enrolled", 1i64), COURSES)
        .await
        .unwrap_err();
    assert!(matches!(err, DocumentStoreError::Query(_)), "{err:?}");

    let stored = store.get_documents(vec![id], COURSES).await.unwrap().remove(0);
    assert_eq!(stored.get("enrolled"), Some(&Bson::Int64(i64::MAX)));

    // The lock is released after the failure.
    assert_eq!(store.count_documents(Filter::all(), COURSES).await.unwrap(), 1);
}

#[tokio::test]
async fn zero_limit_returns_nothing() {
    let (store, _) = seeded().await;

    assert!(names(&store, Query::builder().limit(0).build()).await.is_empty());
    assert_eq!(names(&store, Query::builder().skip(2).build()).await, ["React Course"]);
}

#[tokio::test]
async fn find_and_update_returns_the_new_state() {
    let (store, ids) = seeded().await;

    let updated = store
        .find_and_update(ids[1], Update::new().set("author", "Jason").unset("isPublished"), COURSES)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.get_str("author").unwrap(), "Jason");
    assert!(updated.get("isPublished").is_none());
    assert!(store.find_and_update(ObjectId::new(), Update::new().set("a", 1), COURSES).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_one_removes_the_first_match_only() {
    let (store, ids) = seeded().await;

    let deleted = store
        .delete_documents(Filter::eq("author", "Mosh"), false, COURSES)
        .await
        .unwrap();

    assert_eq!(deleted.deleted_count, 1);
    assert!(store.get_documents(vec![ids[0]], COURSES).await.unwrap().is_empty());
    assert_eq!(store.get_documents(vec![ids[1]], COURSES).await.unwrap().len(), 1);

    let deleted = store
        .delete_documents(Filter::all(), true, COURSES)
        .await
        .unwrap();
    assert_eq!(deleted.deleted_count, 2);
}

#[tokio::test]
async fn find_and_delete_returns_the_document_once() {
    let (store, ids) = seeded().await;

    let removed = store.find_and_delete(ids[0], COURSES).await.unwrap();
    assert_eq!(removed.unwrap().get_object_id("_id").unwrap(), ids[0]);
    assert!(store.find_and_delete(ids[0], COURSES).await.unwrap().is_none());
}

#[tokio::test]
async fn collections_are_listed_and_dropped() {
    let (store, _) = seeded().await;

    store.create_collection("authors").await.unwrap();
    assert_eq!(store.list_collections().await.unwrap(), ["authors", "courses"]);

    store.drop_collection("authors").await.unwrap();
    assert!(matches!(
        store.drop_collection("authors").await.unwrap_err(),
        DocumentStoreError::CollectionNotFound(_)
    ));
}

#[tokio::test]
async fn clones_fail_after_shutdown() {
    let (store, ids) = seeded().await;
    let other = store.clone();

    store.shutdown().await.unwrap();

    assert!(matches!(other.ping().await.unwrap_err(), DocumentStoreError::Connection(_)));
    assert!(matches!(
        other.get_documents(ids, COURSES).await.unwrap_err(),
        DocumentStoreError::Connection(_)
    ));
}
