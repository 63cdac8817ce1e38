//! Security stage integration tests.
//!
//! Tests verify:
//! - CORS allow-list enforcement and response headers
//! - Request body size cap
//! - Hardening headers on every response, including rejections
//! - Unknown routes

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use tower::ServiceExt;

use super::test_utils::{
    body_json, client_addr, from_client, get, post_feedback, submission, test_router,
    MockFeedbackStore,
};

const ALLOWED_ORIGIN: &str = "http://localhost:3000";
const FOREIGN_ORIGIN: &str = "https://evil.example";

fn with_origin(mut request: Request<Body>, origin: &str) -> Request<Body> {
    request
        .headers_mut()
        .insert("origin", origin.parse().unwrap());
    request
}

fn assert_hardening_headers(response: &axum::response::Response) {
    let headers = response.headers();
    for name in [
        "content-security-policy",
        "cross-origin-embedder-policy",
        "cross-origin-opener-policy",
        "cross-origin-resource-policy",
        "origin-agent-cluster",
        "referrer-policy",
        "strict-transport-security",
        "x-content-type-options",
        "x-dns-prefetch-control",
        "x-download-options",
        "x-frame-options",
        "x-permitted-cross-domain-policies",
        "x-xss-protection",
    ] {
        assert!(headers.contains_key(name), "missing header {}", name);
    }
}

// =============================================================================
// CORS
// =============================================================================

#[tokio::test]
async fn test_foreign_origin_rejected() {
    let store = MockFeedbackStore::new();
    let router = test_router(store.clone());

    let request = with_origin(
        post_feedback(submission("saran", "Cross-site submission")),
        FOREIGN_ORIGIN,
    );
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(!response
        .headers()
        .contains_key("access-control-allow-origin"));
    assert_hardening_headers(&response);

    let body = body_json(response).await;
    assert_eq!(
        body,
        serde_json::json!({"success": false, "message": "Not allowed by CORS"})
    );
    assert_eq!(store.insert_calls(), 0);
}

#[tokio::test]
async fn test_allowed_origin_gets_cors_headers() {
    let router = test_router(MockFeedbackStore::new());

    let response = router
        .oneshot(with_origin(get("/api/feedback"), ALLOWED_ORIGIN))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(
        headers.get("access-control-allow-origin").unwrap(),
        ALLOWED_ORIGIN
    );
    assert_eq!(
        headers.get("access-control-allow-credentials").unwrap(),
        "true"
    );
    let exposed = headers
        .get("access-control-expose-headers")
        .unwrap()
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    assert!(exposed.contains("content-range"));
    assert!(exposed.contains("x-content-range"));
}

#[tokio::test]
async fn test_request_without_origin_passes() {
    let router = test_router(MockFeedbackStore::new());

    let response = router.oneshot(get("/api/feedback")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response
        .headers()
        .contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_preflight_from_allowed_origin() {
    let router = test_router(MockFeedbackStore::new());

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/feedback")
        .header("origin", ALLOWED_ORIGIN)
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert!(response.status().is_success());

    let methods = response
        .headers()
        .get("access-control-allow-methods")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(methods.contains("GET"));
    assert!(methods.contains("POST"));
    assert!(!methods.contains("DELETE"));
}

#[tokio::test]
async fn test_preflight_from_foreign_origin_rejected() {
    let router = test_router(MockFeedbackStore::new());

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/feedback")
        .header("origin", FOREIGN_ORIGIN)
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// =============================================================================
// Body Size Cap
// =============================================================================

#[tokio::test]
async fn test_oversized_body_rejected() {
    let store = MockFeedbackStore::new();
    let router = test_router(store.clone());

    let huge = "a".repeat(11 * 1024);
    let response = router
        .oneshot(post_feedback(submission("saran", &huge)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_hardening_headers(&response);
    let body = body_json(response).await;
    assert_eq!(
        body,
        serde_json::json!({"success": false, "message": "Request body too large"})
    );
    assert_eq!(store.insert_calls(), 0);
}

#[tokio::test]
async fn test_oversized_content_length_rejected() {
    let router = test_router(MockFeedbackStore::new());

    let request = Request::builder()
        .method("POST")
        .uri("/api/feedback")
        .header("content-type", "application/json")
        .header("content-length", "20000")
        .body(Body::from("{}"))
        .unwrap();

    let response = router
        .oneshot(from_client(request, client_addr(1)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_body_just_under_limit_accepted() {
    let router = test_router(MockFeedbackStore::new());

    // Valid length, padded with whitespace to just under 10 KiB
    let body = format!(
        "{}{}",
        submission("saran", "Padding test feedback"),
        " ".repeat(10 * 1024 - 100)
    );
    assert!(body.len() <= 10 * 1024);

    let response = router.oneshot(post_feedback(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_rejected_bodies_consume_no_quota() {
    let store = MockFeedbackStore::new();
    let router = test_router(store.clone());

    let huge = "a".repeat(11 * 1024);
    for _ in 0..10 {
        let response = router
            .clone()
            .oneshot(post_feedback(submission("saran", &huge)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    for _ in 0..10 {
        let request = with_origin(
            post_feedback(submission("saran", "Cross-site submission")),
            FOREIGN_ORIGIN,
        );
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    for i in 0..5 {
        let response = router
            .clone()
            .oneshot(post_feedback(submission("saran", &format!("Legit feedback {}", i))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}

// =============================================================================
// Hardening Headers
// =============================================================================

#[tokio::test]
async fn test_hardening_headers_on_success() {
    let router = test_router(MockFeedbackStore::new());

    let response = router.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_hardening_headers(&response);

    let headers = response.headers();
    assert_eq!(headers.get("x-frame-options").unwrap(), "SAMEORIGIN");
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("referrer-policy").unwrap(), "no-referrer");
    assert_eq!(
        headers.get("cross-origin-resource-policy").unwrap(),
        "cross-origin"
    );
    assert_eq!(headers.get("x-xss-protection").unwrap(), "0");

    let csp = headers
        .get("content-security-policy")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(csp.contains("default-src 'self'"));
    assert!(csp.contains(
        "connect-src 'self' https://kotaksaran-ketaqwaanman1jember.vercel.app http://localhost:3000"
    ));
}

#[tokio::test]
async fn test_hardening_headers_on_validation_error() {
    let router = test_router(MockFeedbackStore::new());

    let response = router
        .oneshot(post_feedback(submission("invalid", "hello there")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_hardening_headers(&response);
}

// =============================================================================
// Unknown Routes
// =============================================================================

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let router = test_router(MockFeedbackStore::new());

    let response = router.oneshot(get("/api/nothing-here")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_hardening_headers(&response);

    let body = body_json(response).await;
    assert_eq!(body, serde_json::json!({"success": false, "message": "Not found"}));
}

#[tokio::test]
async fn test_unsupported_method() {
    let router = test_router(MockFeedbackStore::new());

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/api/feedback")
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
