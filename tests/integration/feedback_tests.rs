//! Feedback API integration tests.
//!
//! Tests verify:
//! - Submission validation, sanitizing and persistence
//! - Listing order, limit and projection
//! - Storage failure mapping

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use feedback_box::error::StoreError;
use feedback_box::feedback::FeedbackType;
use feedback_box::{create_router, RateLimitPolicy};

use super::test_utils::{
    body_json, client_addr, get, post_feedback, post_feedback_from, submission, test_config,
    test_router, MockFeedbackStore,
};

/// Router whose write limiter will not get in the way of bulk inserts.
fn unlimited_router(store: MockFeedbackStore) -> axum::Router {
    let quota = RateLimitPolicy::new(1_000, Duration::from_secs(60));
    create_router(store, test_config().with_rate_limits(quota, quota))
}

// =============================================================================
// Submission
// =============================================================================

#[tokio::test]
async fn test_submit_success() {
    let store = MockFeedbackStore::new();
    let router = test_router(store.clone());

    let response = router
        .oneshot(post_feedback(submission("critique", "The canteen queue is too long")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Feedback saved successfully");
    assert!(body["id"].is_string());

    let records = store.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, body["id"].as_str().unwrap());
    assert_eq!(records[0].feedback.kind, FeedbackType::Critique);
    assert_eq!(records[0].feedback.feedback, "The canteen queue is too long");
}

#[tokio::test]
async fn test_submit_records_client_fields() {
    let store = MockFeedbackStore::new();
    let router = test_router(store.clone());

    let response = router
        .oneshot(post_feedback(submission("saran", "More benches in the yard")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let records = store.records().await;
    let client = &records[0].feedback.client;
    assert_eq!(client.address.as_deref(), Some("10.0.0.1"));
    assert_eq!(client.agent.as_deref(), Some("integration-test/1.0"));
}

#[tokio::test]
async fn test_alias_is_stored_as_canonical_type() {
    let store = MockFeedbackStore::new();
    let router = test_router(store.clone());

    let response = router
        .clone()
        .oneshot(post_feedback(submission("kritik", "Great initiative, thank you!")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = router.oneshot(get("/api/feedback")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"][0]["type"], "critique");
    assert_eq!(body["data"][0]["feedback"], "Great initiative, thank you!");
}

#[tokio::test]
async fn test_invalid_type_rejected_and_not_stored() {
    let store = MockFeedbackStore::new();
    let router = test_router(store.clone());

    let response = router
        .oneshot(post_feedback(submission("invalid", "hello there")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Invalid feedback type");
    assert_eq!(store.insert_calls(), 0);
    assert!(store.records().await.is_empty());
}

#[tokio::test]
async fn test_missing_fields_rejected() {
    let store = MockFeedbackStore::new();
    let router = test_router(store.clone());

    for body in [
        r#"{}"#.to_string(),
        r#"{"type":"saran"}"#.to_string(),
        r#"{"feedback":"no category given"}"#.to_string(),
        submission("invalid", ""),
    ] {
        let response = router.clone().oneshot(post_feedback(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["message"], "Type and feedback are required");
    }

    assert!(store.records().await.is_empty());
}

#[tokio::test]
async fn test_false_and_zero_fields_rejected_as_missing() {
    let store = MockFeedbackStore::new();
    let router = test_router(store.clone());

    for body in [
        r#"{"type":"saran","feedback":false}"#,
        r#"{"type":0,"feedback":"zero is not a category"}"#,
        r#"{"type":"kritik","feedback":0}"#,
    ] {
        let response = router.clone().oneshot(post_feedback(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["message"], "Type and feedback are required");
    }

    assert_eq!(store.insert_calls(), 0);
}

#[tokio::test]
async fn test_length_bounds_after_trim() {
    let store = MockFeedbackStore::new();
    let router = unlimited_router(store.clone());

    let too_short = "   abcd   ";
    let too_long = "a".repeat(501);
    let shortest = "abcde";
    let longest = "a".repeat(500);

    for (text, expected) in [
        (too_short.to_string(), StatusCode::BAD_REQUEST),
        (too_long, StatusCode::BAD_REQUEST),
        (shortest.to_string(), StatusCode::CREATED),
        (longest, StatusCode::CREATED),
    ] {
        let response = router
            .clone()
            .oneshot(post_feedback(submission("apresiasi", &text)))
            .await
            .unwrap();
        assert_eq!(response.status(), expected, "text of {} chars", text.len());
    }

    assert_eq!(store.records().await.len(), 2);
}

#[tokio::test]
async fn test_script_is_stripped_before_storage() {
    let store = MockFeedbackStore::new();
    let router = test_router(store.clone());

    let response = router
        .oneshot(post_feedback(submission(
            "saran",
            "<script>alert('x')</script>Please add more <b>plants</b>",
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let records = store.records().await;
    let stored = &records[0].feedback.feedback;
    assert_eq!(stored, "Please add more plants");
    assert!(!stored.contains('<'));
    assert!(!stored.contains('>'));
}

#[tokio::test]
async fn test_markup_only_feedback_rejected() {
    let store = MockFeedbackStore::new();
    let router = test_router(store.clone());

    let response = router
        .oneshot(post_feedback(submission(
            "saran",
            "<script>document.location='https://evil.test'</script>",
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Feedback must be between 5 and 500 characters");
    assert!(store.records().await.is_empty());
}

#[tokio::test]
async fn test_malformed_json_rejected() {
    let store = MockFeedbackStore::new();
    let router = test_router(store.clone());

    let response = router
        .oneshot(post_feedback(r#"{"type": "saran", "feedback": "#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Invalid JSON body");
    assert_eq!(store.insert_calls(), 0);
}

#[tokio::test]
async fn test_non_json_body_treated_as_empty() {
    let store = MockFeedbackStore::new();
    let router = test_router(store.clone());

    let request = Request::builder()
        .method("POST")
        .uri("/api/feedback")
        .header("content-type", "text/plain")
        .body(Body::from(submission("saran", "More benches please")))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Type and feedback are required");
}

// =============================================================================
// Listing
// =============================================================================

#[tokio::test]
async fn test_list_empty() {
    let router = test_router(MockFeedbackStore::new());

    let response = router.oneshot(get("/api/feedback")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"], serde_json::json!([]));
}

#[tokio::test]
async fn test_list_returns_newest_first_up_to_limit() {
    let store = MockFeedbackStore::new();
    let router = unlimited_router(store.clone());

    for i in 0..12 {
        let response = router
            .clone()
            .oneshot(post_feedback(submission("saran", &format!("Suggestion number {}", i))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = router.oneshot(get("/api/feedback")).await.unwrap();
    let body = body_json(response).await;
    let data = body["data"].as_array().unwrap();

    assert_eq!(data.len(), 10);
    assert_eq!(data[0]["feedback"], "Suggestion number 11");
    assert_eq!(data[9]["feedback"], "Suggestion number 2");

    let timestamps: Vec<&str> = data
        .iter()
        .map(|r| r["createdAt"].as_str().unwrap())
        .collect();
    let mut sorted = timestamps.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(timestamps, sorted);
}

#[tokio::test]
async fn test_list_returns_all_when_fewer_than_limit() {
    let store = MockFeedbackStore::new();
    let router = test_router(store.clone());

    for text in ["First piece of feedback", "Second piece of feedback"] {
        router
            .clone()
            .oneshot(post_feedback(submission("saran", text)))
            .await
            .unwrap();
    }

    let body = body_json(router.oneshot(get("/api/feedback")).await.unwrap()).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"][0]["feedback"], "Second piece of feedback");
}

#[tokio::test]
async fn test_list_respects_configured_limit() {
    let store = MockFeedbackStore::new();
    let quota = RateLimitPolicy::new(100, Duration::from_secs(60));
    let router = create_router(
        store.clone(),
        test_config().with_rate_limits(quota, quota).with_list_limit(3),
    );

    for i in 0..5 {
        router
            .clone()
            .oneshot(post_feedback(submission("saran", &format!("Entry number {}", i))))
            .await
            .unwrap();
    }

    let body = body_json(router.oneshot(get("/api/feedback")).await.unwrap()).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_list_never_exposes_client_fields() {
    let store = MockFeedbackStore::new();
    let router = test_router(store.clone());

    router
        .clone()
        .oneshot(post_feedback(submission("apresiasi", "Thanks for the new library")))
        .await
        .unwrap();
    assert!(store.records().await[0].feedback.client.address.is_some());

    let body = body_json(router.oneshot(get("/api/feedback")).await.unwrap()).await;
    let record = body["data"][0].as_object().unwrap();

    let mut keys: Vec<&str> = record.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["createdAt", "feedback", "id", "type"]);

    let raw = body.to_string();
    assert!(!raw.contains("10.0.0.1"));
    assert!(!raw.contains("integration-test"));
}

// =============================================================================
// Storage Failures
// =============================================================================

#[tokio::test]
async fn test_store_unavailable_maps_to_503() {
    let store = MockFeedbackStore::new();
    store
        .fail_with(StoreError::Unavailable("server selection timeout".into()))
        .await;
    let router = test_router(store.clone());

    let response = router
        .clone()
        .oneshot(post_feedback(submission("saran", "More benches please")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Database error occurred");

    let response = router.oneshot(get("/api/feedback")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_write_timeout_maps_to_503() {
    let store = MockFeedbackStore::new();
    store
        .fail_with(StoreError::WriteTimeout("waiting for replication".into()))
        .await;
    let router = test_router(store.clone());

    let response = router
        .oneshot(post_feedback(submission("saran", "More benches please")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(store.insert_calls(), 1);
}

#[tokio::test]
async fn test_internal_error_hidden_in_production() {
    let store = MockFeedbackStore::new();
    store
        .fail_with(StoreError::Other("E11000 duplicate key on host db-1".into()))
        .await;
    let router = create_router(
        store.clone(),
        test_config().with_environment("production", true),
    );

    let response = router
        .oneshot(post_feedback(submission("saran", "More benches please")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Internal server error");
}

#[tokio::test]
async fn test_internal_error_detail_in_development() {
    let store = MockFeedbackStore::new();
    store.fail_with(StoreError::Other("cursor killed".into())).await;
    let router = test_router(store.clone());

    let response = router.clone().oneshot(get("/api/feedback")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("cursor killed"));

    store.recover().await;
    let response = router.oneshot(get("/api/feedback")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_clients_submit_independently() {
    let store = MockFeedbackStore::new();
    let router = test_router(store.clone());

    for octet in [1, 2, 3] {
        let response = router
            .clone()
            .oneshot(post_feedback_from(
                submission("saran", "Shared idea from a client"),
                client_addr(octet),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let addresses: Vec<String> = store
        .records()
        .await
        .into_iter()
        .filter_map(|r| r.feedback.client.address)
        .collect();
    assert_eq!(addresses, vec!["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
}
