//! Façade tests: command shapes, result shaping, error contracts

use super::*;
use crate::connection::mock::{MockStrategy, ok};
use crate::error::{ConnectionError, DataApiError};
use bson::{Bson, Document, doc};
use serde_json::{Value, json};

fn client_over(mock: &Arc<MockStrategy>) -> Client {
    let config = ConnectionConfig {
        base_url: "http://mock".to_string(),
        base_api_path: Some("v1".to_string()),
        keyspace: "ks".to_string(),
        token: "token".to_string(),
        ..ConnectionConfig::default()
    };
    Client::with_strategy(mock.clone(), config)
}

fn users(mock: &Arc<MockStrategy>) -> Collection {
    client_over(mock).collection("users")
}

// ===== Client =====

#[test]
fn test_connect_reads_uri() {
    let client = Client::connect(
        "http://localhost:8181/v1/testks?applicationToken=abc",
        ConnectOptions {
            use_http2: Some(false),
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(client.namespace(), "testks");
    assert_eq!(client.config().token, "abc");
    assert_eq!(client.config().base_api_path.as_deref(), Some("v1"));
    assert_eq!(client.default_db().namespace(), "testks");
    assert_eq!(client.db("other").namespace(), "other");
}

#[test]
fn test_connect_option_token_wins() {
    let client = Client::connect(
        "http://localhost:8181/testks?applicationToken=abc",
        ConnectOptions {
            token: Some("override".to_string()),
            use_http2: Some(false),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(client.config().token, "override");
}

#[test]
fn test_connect_requires_token() {
    let err = Client::connect("http://localhost:8181/testks", ConnectOptions::default())
        .unwrap_err();
    assert!(matches!(err, DataApiError::Config(_)));
}

#[tokio::test]
async fn test_close_fails_later_requests() {
    let mock = MockStrategy::replying(json!({ "status": { "count": 1 } }));
    let client = client_over(&mock);
    let collection = client.collection("users");

    client.close();
    assert!(client.is_closed());
    let err = collection.count_documents(doc! {}).await.unwrap_err();
    assert!(matches!(err, DataApiError::Connection(ConnectionError::Closed)));
    assert_eq!(mock.calls(), 0);
}

// ===== Db =====

#[tokio::test]
async fn test_create_collection_command() {
    let mock = MockStrategy::replying(json!({ "status": { "ok": 1 } }));
    let client = client_over(&mock);

    let created = client
        .create_collection(
            "vectors",
            CreateCollectionOptions {
                vector: Some(VectorOptions {
                    dimension: 2,
                    metric: VectorMetric::Cosine,
                    service: None,
                }),
                indexing: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(created.name(), "vectors");
    assert_eq!(mock.requests()[0].url, "http://mock/v1/ks");
    assert_eq!(
        mock.payloads()[0],
        json!({ "createCollection": {
            "name": "vectors",
            "options": { "vector": { "dimension": 2, "metric": "cosine" } }
        } })
    );
}

#[tokio::test]
async fn test_list_collections_full_info() {
    let mock = MockStrategy::replying(json!({ "status": { "collections": [
        { "name": "a", "options": {} },
        { "name": "b", "options": { "vector": { "dimension": 5, "metric": "cosine" } } }
    ] } }));
    let db = client_over(&mock).default_db();

    let infos = db.list_collections(false).await.unwrap();
    assert_eq!(infos.len(), 2);
    assert_eq!(infos[1].name, "b");
    assert_eq!(
        mock.payloads()[0],
        json!({ "findCollections": { "options": { "explain": true } } })
    );
}

#[tokio::test]
async fn test_namespace_commands_use_api_root() {
    let mock = MockStrategy::replying(json!({ "status": { "ok": 1 } }));
    let db = client_over(&mock).db("fresh");

    assert!(db.create_database().await.unwrap());
    assert!(db.drop_namespace().await.unwrap());

    let requests = mock.requests();
    assert_eq!(requests[0].url, "http://mock/v1");
    assert_eq!(requests[0].payload, json!({ "createNamespace": { "name": "fresh" } }));
    assert_eq!(requests[1].payload, json!({ "dropNamespace": { "name": "fresh" } }));
}

#[tokio::test]
async fn test_drop_uses_delete_collection() {
    let mock = MockStrategy::replying(json!({ "status": { "ok": 1 } }));
    assert!(users(&mock).drop().await.unwrap());

    assert_eq!(mock.requests()[0].url, "http://mock/v1/ks");
    assert_eq!(
        mock.payloads()[0],
        json!({ "deleteCollection": { "name": "users" } })
    );
}

#[tokio::test]
async fn test_options_of_missing_collection() {
    let mock = MockStrategy::replying(json!({ "status": { "collections": [
        { "name": "users", "options": { "indexing": { "deny": ["blob"] } } }
    ] } }));

    let options = users(&mock).options().await.unwrap();
    assert_eq!(options, doc! { "indexing": { "deny": ["blob"] } });

    let err = client_over(&mock)
        .collection("ghost")
        .options()
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Collection ghost not found");
}

// ===== Inserts =====

#[tokio::test]
async fn test_insert_one_generates_id() {
    let mock = MockStrategy::new(|_, payload| {
        let id = payload["insertOne"]["document"]["_id"].clone();
        Ok(ok(json!({ "status": { "insertedIds": [id] } })))
    });

    let result = users(&mock).insert_one(doc! { "name": "a" }).await.unwrap();

    let payloads = mock.payloads();
    let sent = &payloads[0]["insertOne"]["document"];
    assert_eq!(sent["name"], json!("a"));
    assert_eq!(Bson::String(sent["_id"].as_str().unwrap().to_string()), result.inserted_id);
    assert_eq!(mock.requests()[0].url, "http://mock/v1/ks/users");
}

#[tokio::test]
async fn test_insert_one_raises_server_error() {
    let mock = MockStrategy::replying(json!({
        "errors": [{ "message": "exists", "errorCode": "DOCUMENT_ALREADY_EXISTS" }]
    }));

    let err = users(&mock).insert_one(doc! { "_id": 1 }).await.unwrap_err();
    match err {
        DataApiError::Command(e) => assert_eq!(e.command_name(), "insertOne"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_insert_many_rejects_large_batches() {
    let mock = MockStrategy::replying(json!({}));
    let documents = (0..21).map(|i| doc! { "i": i }).collect();

    let err = users(&mock)
        .insert_many(documents, InsertManyOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DataApiError::Config(ConfigError::BatchTooLarge { max: 20, actual: 21 })
    ));
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn test_insert_many_success() {
    let mock = MockStrategy::replying(json!({ "status": { "insertedIds": ["a", "b"] } }));

    let result = users(&mock)
        .insert_many(
            vec![doc! { "_id": "a" }, doc! { "_id": "b" }],
            InsertManyOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(result.inserted_count, 2);
    assert_eq!(
        mock.payloads()[0]["insertMany"]["options"],
        json!({ "ordered": false })
    );
}

#[tokio::test]
async fn test_ordered_insert_many_reports_partial_progress() {
    let mock = MockStrategy::replying(json!({
        "status": { "insertedIds": ["a"] },
        "errors": [{ "message": "duplicate", "errorCode": "DOCUMENT_ALREADY_EXISTS" }]
    }));

    let err = users(&mock)
        .insert_many(
            vec![doc! { "_id": "a" }, doc! { "_id": "b" }, doc! { "_id": "c" }],
            InsertManyOptions {
                ordered: true,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    let DataApiError::InsertManyOrdered(failure) = err else {
        panic!("expected an ordered insert failure");
    };
    assert_eq!(failure.inserted_ids, vec![Bson::from("a")]);
    let failed: Vec<&Document> = failure.failed_inserts.iter().map(|f| &f.document).collect();
    assert_eq!(failed, vec![&doc! { "_id": "b" }, &doc! { "_id": "c" }]);
    assert_eq!(
        failure.failed_inserts[0].errors[0].error_code.as_deref(),
        Some("DOCUMENT_ALREADY_EXISTS")
    );
    assert_eq!(failure.source.command_name(), "insertMany");
}

#[tokio::test]
async fn test_ordered_insert_many_counts_duplicate_ids_once() {
    let mock = MockStrategy::replying(json!({
        "status": { "insertedIds": ["x", "y"] },
        "errors": [{ "message": "duplicate", "errorCode": "DOCUMENT_ALREADY_EXISTS" }]
    }));

    let err = users(&mock)
        .insert_many(
            vec![
                doc! { "_id": "x", "n": 1 },
                doc! { "_id": "x", "n": 2 },
                doc! { "_id": "y", "n": 3 },
            ],
            InsertManyOptions {
                ordered: true,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    let DataApiError::InsertManyOrdered(failure) = err else {
        panic!("expected an ordered insert failure");
    };
    assert_eq!(failure.inserted_ids, vec![Bson::from("x"), Bson::from("y")]);
    assert_eq!(failure.failed_inserts.len(), 1);
    assert_eq!(failure.failed_inserts[0].document, doc! { "_id": "x", "n": 2 });
}

// ===== Updates and deletes =====

#[tokio::test]
async fn test_upsert_update_pins_generated_id() {
    let mock = MockStrategy::replying(json!({
        "status": { "matchedCount": 0, "modifiedCount": 0, "upsertedId": "new" }
    }));

    let result = users(&mock)
        .update_one(
            doc! { "name": "a" },
            doc! { "$set": { "age": 3 } },
            UpdateOptions {
                upsert: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(result.upserted_id, Some(Bson::from("new")));
    assert_eq!(result.upserted_count, 1);

    let payloads = mock.payloads();
    let sent = &payloads[0]["updateOne"];
    assert!(sent["update"]["$setOnInsert"]["_id"].is_string());
    assert_eq!(sent["options"], json!({ "upsert": true }));
}

#[tokio::test]
async fn test_plain_update_leaves_update_alone() {
    let mock = MockStrategy::replying(json!({
        "status": { "matchedCount": 2, "modifiedCount": 1 }
    }));

    let result = users(&mock)
        .update_many(
            doc! {},
            doc! { "$set": { "seen": true } },
            UpdateOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(result.matched_count, 2);
    assert_eq!(result.modified_count, 1);
    assert_eq!(result.upserted_id, None);
    assert_eq!(
        mock.payloads()[0],
        json!({ "updateMany": { "filter": {}, "update": { "$set": { "seen": true } } } })
    );
}

#[tokio::test]
async fn test_update_many_with_more_data_fails() {
    let mock = MockStrategy::replying(json!({
        "status": { "matchedCount": 20, "modifiedCount": 20, "moreData": true }
    }));

    let err = users(&mock)
        .update_many(doc! {}, doc! { "$set": { "a": 1 } }, UpdateOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, DataApiError::Client(_)));
    assert_eq!(
        err.to_string(),
        "Command \"updateMany\" failed with the following error: \
         More than 20 records found for update by the server"
    );
}

#[tokio::test]
async fn test_delete_many_with_more_data_fails() {
    let mock = MockStrategy::replying(json!({
        "status": { "deletedCount": 20, "moreData": true }
    }));

    let err = users(&mock).delete_many(doc! {}).await.unwrap_err();
    assert!(matches!(err, DataApiError::Client(_)));
    assert_eq!(err.command(), Some(&doc! { "deleteMany": { "filter": {} } }));
}

#[tokio::test]
async fn test_delete_many_bulk_loops_until_done() {
    let mock = MockStrategy::new(|index, _| {
        let body = match index {
            0 | 1 => json!({ "status": { "deletedCount": 20, "moreData": true } }),
            _ => json!({ "status": { "deletedCount": 5 } }),
        };
        Ok(ok(body))
    });

    let result = users(&mock).delete_many_bulk(doc! { "a": 1 }).await.unwrap();
    assert_eq!(result.deleted_count, 45);
    assert_eq!(mock.calls(), 3);
}

#[tokio::test]
async fn test_delete_one_with_sort() {
    let mock = MockStrategy::replying(json!({ "status": { "deletedCount": 1 } }));

    let result = users(&mock)
        .delete_one(doc! {}, Some(doc! { "age": -1 }))
        .await
        .unwrap();

    assert_eq!(result.deleted_count, 1);
    assert_eq!(
        mock.payloads()[0],
        json!({ "deleteOne": { "filter": {}, "sort": { "age": -1 } } })
    );
}

// ===== Finds =====

#[tokio::test]
async fn test_find_one_command_shape() {
    let mock = MockStrategy::replying(json!({ "data": { "document": { "_id": "x" } } }));

    let found = users(&mock)
        .find_one(
            doc! { "_id": "x" },
            FindOneOptions {
                projection: Some(doc! {}),
                include_similarity: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(found, Some(doc! { "_id": "x" }));
    assert_eq!(
        mock.payloads()[0],
        json!({ "findOne": {
            "filter": { "_id": "x" },
            "options": { "includeSimilarity": true }
        } })
    );
}

#[tokio::test]
async fn test_find_one_without_match() {
    let mock = MockStrategy::replying(json!({ "data": { "document": null } }));
    let found = users(&mock).find_one(doc! {}, FindOneOptions::default()).await.unwrap();
    assert_eq!(found, None);
}

#[tokio::test]
async fn test_find_one_and_replace_upsert() {
    let mock = MockStrategy::replying(json!({ "data": { "document": { "_id": "k", "v": 2 } } }));

    let result = users(&mock)
        .find_one_and_replace(
            doc! { "v": 1 },
            doc! { "v": 2 },
            FindOneAndModifyOptions {
                upsert: true,
                return_document: Some(ReturnDocument::After),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(result.ok, 1);
    assert_eq!(result.value, Some(doc! { "_id": "k", "v": 2 }));

    let payloads = mock.payloads();
    let sent = &payloads[0]["findOneAndReplace"];
    assert!(sent["replacement"]["_id"].is_string());
    assert_eq!(
        sent["options"],
        json!({ "returnDocument": "after", "upsert": true })
    );
}

#[tokio::test]
async fn test_find_one_and_delete() {
    let mock = MockStrategy::replying(json!({ "data": { "document": { "_id": "gone" } } }));

    let result = users(&mock)
        .find_one_and_delete(
            doc! { "_id": "gone" },
            FindOneAndDeleteOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(result.value, Some(doc! { "_id": "gone" }));
    assert_eq!(
        mock.payloads()[0],
        json!({ "findOneAndDelete": { "filter": { "_id": "gone" } } })
    );
}

#[tokio::test]
async fn test_count_documents() {
    let mock = MockStrategy::replying(json!({ "status": { "count": 42 } }));
    assert_eq!(users(&mock).count_documents(doc! {}).await.unwrap(), 42);
}

#[tokio::test]
async fn test_find_is_lazy() {
    let mock = MockStrategy::replying(json!({ "data": { "documents": [] } }));
    let cursor = users(&mock).find(doc! {}, FindOptions::default());
    assert_eq!(cursor.state(), crate::cursor::CursorState::Uninitialized);
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn test_distinct_flattens_and_dedups() {
    let mock = MockStrategy::new(|index, _| {
        let page: Value = match index {
            0 => json!({
                "documents": [
                    { "tags": { "color": ["red", "blue"] } },
                    { "tags": { "color": "green" } },
                    { "tags": {} }
                ],
                "nextPageState": "p1"
            }),
            _ => json!({
                "documents": [
                    { "tags": { "color": "red" } },
                    { "tags": { "color": 1 } },
                    { "tags": { "color": 1 } }
                ]
            }),
        };
        Ok(ok(json!({ "data": page })))
    });

    let values = users(&mock).distinct("tags.color", doc! {}).await.unwrap();

    assert_eq!(values.len(), 4);
    assert_eq!(values[0], Bson::from("red"));
    assert_eq!(values[1], Bson::from("blue"));
    assert_eq!(values[2], Bson::from("green"));
    assert_eq!(
        mock.payloads()[0]["find"]["projection"],
        json!({ "_id": 0, "tags.color": 1 })
    );
}

#[test]
fn test_lookup_path_indexes_arrays() {
    let document = doc! { "a": [{ "b": 1 }, { "b": 2 }] };
    assert_eq!(
        collection_lookup(&document, "a.1.b"),
        Some(Bson::Int32(2))
    );
    assert_eq!(collection_lookup(&document, "a.b"), None);
    assert_eq!(collection_lookup(&document, "missing"), None);
}

fn collection_lookup(document: &Document, key: &str) -> Option<Bson> {
    let path: Vec<&str> = key.split('.').collect();
    collection::lookup_path(document, &path).cloned()
}
