//! Cursor tests: paging, lifecycle, configuration lock, mapping

use super::*;
use crate::connection::mock::{MockStrategy, ok};
use crate::error::DataApiError;
use bson::doc;
use futures::StreamExt;
use serde_json::{Value, json};

/// Pages of 3, 2 and 0 documents numbered from 0, linked by page tokens.
fn three_pages() -> Arc<MockStrategy> {
    MockStrategy::new(|index, _| {
        let page = match index {
            0 => json!({ "documents": [{ "n": 0 }, { "n": 1 }, { "n": 2 }], "nextPageState": "p1" }),
            1 => json!({ "documents": [{ "n": 3 }, { "n": 4 }], "nextPageState": "p2" }),
            _ => json!({ "documents": [], "nextPageState": null }),
        };
        Ok(ok(json!({ "data": page })))
    })
}

fn cursor(mock: &Arc<MockStrategy>) -> FindCursor {
    FindCursor::new(
        mock.collection_executor(),
        doc! { "kind": "x" },
        FindOptions::default(),
    )
}

fn numbers(docs: &[Document]) -> Vec<i32> {
    docs.iter().map(|d| d.get_i32("n").unwrap()).collect()
}

fn find_options(payload: &Value) -> Value {
    payload["find"]["options"].clone()
}

// ===== Paging =====

#[tokio::test]
async fn test_lazy_until_first_read() {
    let mock = three_pages();
    let cursor = cursor(&mock);
    assert_eq!(cursor.state(), CursorState::Uninitialized);
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn test_exhausts_all_pages_then_stays_closed() {
    let mock = three_pages();
    let mut cursor = cursor(&mock);

    let docs = cursor.to_array().await.unwrap();
    assert_eq!(numbers(&docs), vec![0, 1, 2, 3, 4]);
    assert_eq!(mock.calls(), 3);
    assert!(cursor.is_closed());

    assert!(cursor.next().await.unwrap().is_none());
    assert!(cursor.next().await.unwrap().is_none());
    assert_eq!(mock.calls(), 3);
}

#[tokio::test]
async fn test_page_tokens_and_first_page_skip() {
    let mock = three_pages();
    let mut cursor = cursor(&mock);
    cursor.skip(7).unwrap().include_similarity(true).unwrap();
    cursor.to_array().await.unwrap();

    let payloads = mock.payloads();
    assert_eq!(
        find_options(&payloads[0]),
        json!({ "limit": 1000, "skip": 7, "includeSimilarity": true })
    );
    assert_eq!(
        find_options(&payloads[1]),
        json!({ "limit": 1000, "pagingState": "p1", "includeSimilarity": true })
    );
    assert_eq!(
        find_options(&payloads[2]),
        json!({ "limit": 1000, "pagingState": "p2", "includeSimilarity": true })
    );
    assert_eq!(payloads[0]["find"]["filter"], json!({ "kind": "x" }));
}

#[tokio::test]
async fn test_limit_bounds_pages_and_results() {
    let mock = three_pages();
    let mut cursor = cursor(&mock);
    cursor.limit(4).unwrap();

    let docs = cursor.to_array().await.unwrap();
    assert_eq!(numbers(&docs), vec![0, 1, 2, 3]);
    // the remaining count reaches zero without another request
    assert_eq!(mock.calls(), 2);

    let payloads = mock.payloads();
    assert_eq!(find_options(&payloads[0])["limit"], json!(4));
    assert_eq!(find_options(&payloads[1])["limit"], json!(1));
}

#[tokio::test]
async fn test_batch_size_sets_page_request_limit() {
    let mock = three_pages();
    let mut cursor = cursor(&mock);
    cursor.batch_size(2).unwrap().limit(10).unwrap();

    cursor.next().await.unwrap();
    assert_eq!(find_options(&mock.payloads()[0])["limit"], json!(2));
    // the server sent three documents; all of them are kept
    assert_eq!(cursor.buffered_count(), 2);
}

#[tokio::test]
async fn test_oversized_pages_are_kept_without_limit() {
    let mock = MockStrategy::new(|index, _| {
        let page = match index {
            0 => {
                let docs: Vec<Value> = (0..20).map(|n| json!({ "n": n })).collect();
                json!({ "documents": docs, "nextPageState": "p1" })
            }
            _ => json!({
                "documents": [{ "n": 20 }, { "n": 21 }, { "n": 22 }],
                "nextPageState": null
            }),
        };
        Ok(ok(json!({ "data": page })))
    });
    let mut cursor = cursor(&mock);
    cursor.batch_size(5).unwrap();

    let docs = cursor.to_array().await.unwrap();
    assert_eq!(numbers(&docs), (0..23).collect::<Vec<_>>());
    assert_eq!(mock.calls(), 2);

    let payloads = mock.payloads();
    assert_eq!(find_options(&payloads[0]), json!({ "limit": 5 }));
    assert_eq!(
        find_options(&payloads[1]),
        json!({ "limit": 5, "pagingState": "p1" })
    );
}

#[tokio::test]
async fn test_limit_trims_oversized_page_and_ends() {
    let mock = MockStrategy::replying(json!({
        "data": {
            "documents": [{ "n": 0 }, { "n": 1 }, { "n": 2 }, { "n": 3 }],
            "nextPageState": "p1"
        }
    }));
    let mut cursor = cursor(&mock);
    cursor.limit(3).unwrap();

    let docs = cursor.to_array().await.unwrap();
    assert_eq!(numbers(&docs), vec![0, 1, 2]);
    assert_eq!(mock.calls(), 1);
    assert!(cursor.is_closed());
}

#[tokio::test]
async fn test_try_next_fetches_once() {
    let mock = MockStrategy::new(|index, _| {
        let page = match index {
            0 => json!({ "documents": [], "nextPageState": "p1" }),
            _ => json!({ "documents": [{ "n": 9 }], "nextPageState": null }),
        };
        Ok(ok(json!({ "data": page })))
    });
    let mut cursor = cursor(&mock);

    assert!(cursor.try_next().await.unwrap().is_none());
    assert_eq!(mock.calls(), 1);
    assert!(!cursor.is_closed());

    let doc = cursor.try_next().await.unwrap().unwrap();
    assert_eq!(doc.get_i32("n").unwrap(), 9);
    assert!(cursor.try_next().await.unwrap().is_none());
    assert!(cursor.is_closed());
}

#[tokio::test]
async fn test_has_next_does_not_consume() {
    let mock = three_pages();
    let mut cursor = cursor(&mock);

    assert!(cursor.has_next().await.unwrap());
    assert!(cursor.has_next().await.unwrap());
    assert_eq!(cursor.buffered_count(), 3);
    assert_eq!(cursor.next().await.unwrap().unwrap().get_i32("n").unwrap(), 0);
}

#[tokio::test]
async fn test_read_buffered_documents() {
    let mock = three_pages();
    let mut cursor = cursor(&mock);
    cursor.has_next().await.unwrap();

    let taken = cursor.read_buffered_documents(2);
    assert_eq!(numbers(&taken), vec![0, 1]);
    assert_eq!(cursor.buffered_count(), 1);
    assert!(cursor.read_buffered_documents(10).len() == 1);
}

// ===== Lifecycle =====

#[tokio::test]
async fn test_configuration_locked_after_first_fetch() {
    let mock = three_pages();
    let mut cursor = cursor(&mock);
    cursor.next().await.unwrap();

    let locked = |r: Result<&mut FindCursor>| {
        matches!(
            r.map(|_| ()),
            Err(DataApiError::Cursor(CursorError::AlreadyInitialized))
        )
    };
    assert!(locked(cursor.filter(doc! {})));
    assert!(locked(cursor.sort(doc! { "n": 1 })));
    assert!(locked(cursor.limit(1)));
    assert!(locked(cursor.skip(1)));
    assert!(locked(cursor.project(doc! { "n": 1 })));
    assert!(locked(cursor.batch_size(1)));
    assert!(locked(cursor.include_similarity(true)));
    assert!(matches!(
        cursor.map(|d| d).map(|_| ()),
        Err(DataApiError::Cursor(CursorError::AlreadyInitialized))
    ));
}

#[tokio::test]
async fn test_rewind_restarts_from_scratch() {
    let mock = three_pages();
    let mut cursor = cursor(&mock);
    cursor.limit(5).unwrap();
    cursor.to_array().await.unwrap();

    cursor.rewind();
    cursor.rewind();
    assert_eq!(cursor.state(), CursorState::Uninitialized);
    assert_eq!(cursor.buffered_count(), 0);
    // configuration is writable again
    cursor.limit(0).unwrap();

    let mock_calls_before = mock.calls();
    let docs = cursor.to_array().await.unwrap();
    assert_eq!(docs.len(), 5);
    assert!(mock.calls() > mock_calls_before);
    assert!(find_options(&mock.payloads()[mock_calls_before]).get("pagingState").is_none());
}

#[tokio::test]
async fn test_close_drops_buffer() {
    let mock = three_pages();
    let mut cursor = cursor(&mock);
    cursor.has_next().await.unwrap();

    cursor.close();
    assert!(cursor.is_closed());
    assert_eq!(cursor.buffered_count(), 0);
    assert!(cursor.next().await.unwrap().is_none());
    assert!(!cursor.has_next().await.unwrap());
}

#[tokio::test]
async fn test_fetch_error_closes_cursor() {
    let mock = MockStrategy::replying(json!({ "errors": [{ "message": "bad filter" }] }));
    let mut cursor = cursor(&mock);

    let err = cursor.next().await.unwrap_err();
    assert!(matches!(err, DataApiError::Command(_)));
    assert!(cursor.is_closed());
    assert!(cursor.next().await.unwrap().is_none());
}

#[tokio::test]
async fn test_clone_config_is_fresh() {
    let mock = three_pages();
    let mut cursor = cursor(&mock);
    cursor.sort(doc! { "n": -1 }).unwrap();
    cursor.next().await.unwrap();

    let mut copy = cursor.clone_config();
    assert_eq!(copy.state(), CursorState::Uninitialized);
    copy.next().await.unwrap();
    let last = mock.payloads().pop().unwrap();
    assert_eq!(last["find"]["sort"], json!({ "n": -1 }));
    assert!(find_options(&last).get("pagingState").is_none());
}

// ===== Mapping =====

#[tokio::test]
async fn test_mappings_compose_in_order() {
    let mock = three_pages();
    let cursor = cursor(&mock);

    let mut mapped = cursor
        .map(|d| d.get_i32("n").unwrap_or(-1))
        .unwrap()
        .map(|n| n * 10)
        .unwrap()
        .map(|n| format!("#{n}"))
        .unwrap();

    let out = mapped.to_array().await.unwrap();
    assert_eq!(out, vec!["#0", "#10", "#20", "#30", "#40"]);
}

#[tokio::test]
async fn test_mapped_none_is_not_end_of_sequence() {
    let mock = MockStrategy::replying(json!({
        "data": { "documents": [{ "n": 1 }, { "other": true }, { "n": 3 }] }
    }));
    let mut mapped = cursor(&mock).map(|d| d.get_i32("n").ok()).unwrap();

    assert_eq!(mapped.next().await.unwrap(), Some(Some(1)));
    assert_eq!(mapped.next().await.unwrap(), Some(None));
    assert_eq!(mapped.next().await.unwrap(), Some(Some(3)));
    assert_eq!(mapped.next().await.unwrap(), None);
}

#[tokio::test]
async fn test_failing_mapping_closes_cursor() {
    let mock = three_pages();
    let mut mapped = cursor(&mock)
        .try_map(|d| match d.get_i32("n") {
            Ok(1) => Err(CursorError::Mapping("odd one".to_string()).into()),
            Ok(n) => Ok(n),
            Err(e) => Err(CursorError::Mapping(e.to_string()).into()),
        })
        .unwrap();

    assert_eq!(mapped.next().await.unwrap(), Some(0));
    assert!(matches!(
        mapped.next().await,
        Err(DataApiError::Cursor(CursorError::Mapping(_)))
    ));
    assert!(mapped.is_closed());
}

// ===== Streaming =====

#[tokio::test]
async fn test_stream_yields_everything() {
    let mock = three_pages();
    let mut cursor = cursor(&mock);

    let docs: Vec<Document> = cursor
        .stream()
        .map(|r| r.unwrap())
        .collect()
        .await;
    assert_eq!(numbers(&docs), vec![0, 1, 2, 3, 4]);
    assert!(cursor.is_closed());
}

#[tokio::test]
async fn test_abandoned_stream_closes_cursor() {
    let mock = three_pages();
    let mut cursor = cursor(&mock);

    {
        let stream = cursor.stream();
        futures::pin_mut!(stream);
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.get_i32("n").unwrap(), 0);
    }

    assert!(cursor.is_closed());
    assert_eq!(mock.calls(), 1);
}

#[tokio::test]
async fn test_stream_dropped_before_polling_closes_cursor() {
    let mock = three_pages();
    let mut cursor = cursor(&mock);

    drop(cursor.stream());

    assert!(cursor.is_closed());
    assert_eq!(mock.calls(), 0);
}
