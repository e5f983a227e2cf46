use super::common::*;
use crate::workflows::verification::domain::{QueuedRequest, RequestId};
use crate::workflows::verification::events::INTAKE_SECRET_HEADER;
use crate::workflows::verification::router::{
    decision_router, intake_event_router, DECISION_ROUTE, REQUEST_CREATED_ROUTE,
};
use crate::workflows::verification::store::DocumentPath;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

fn decision_call(method: &str, authorization: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(DECISION_ROUTE)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).expect("serialize body")))
        .expect("build request")
}

fn decision_body(approve: bool) -> serde_json::Value {
    json!({ "businessId": "biz-100", "reqId": "req-1", "approve": approve })
}

#[tokio::test]
async fn non_post_is_rejected_before_store_access() {
    let store = Arc::new(MemoryStore::with_request(request_data()));
    let router = decision_router(Arc::new(decision_service(store.clone())));

    for method in ["GET", "PUT", "DELETE"] {
        let response = router
            .clone()
            .oneshot(decision_call(
                method,
                Some(&format!("Bearer {ADMIN_TOKEN}")),
                decision_body(true),
            ))
            .await
            .expect("router responds");

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(read_text_body(response).await, "Method not allowed");
    }
    assert_eq!(store.accesses(), 0);
}

#[tokio::test]
async fn precondition_failures_map_to_status_codes() {
    let store = Arc::new(MemoryStore::default());
    let router = decision_router(Arc::new(decision_service(store.clone())));
    let admin = format!("Bearer {ADMIN_TOKEN}");
    let member = format!("Bearer {MEMBER_TOKEN}");

    let cases = [
        (None, decision_body(true), StatusCode::UNAUTHORIZED, "Missing Authorization header"),
        (Some("Bearer "), decision_body(true), StatusCode::UNAUTHORIZED, "Missing token"),
        (Some("Bearer bogus"), decision_body(true), StatusCode::UNAUTHORIZED, "Invalid token"),
        (Some(member.as_str()), decision_body(true), StatusCode::FORBIDDEN, "Admin claim required"),
        (
            Some(admin.as_str()),
            json!({ "reqId": "req-1" }),
            StatusCode::BAD_REQUEST,
            "businessId and reqId required",
        ),
        (Some(admin.as_str()), decision_body(true), StatusCode::NOT_FOUND, "Request not found"),
    ];

    for (authorization, body, status, reason) in cases {
        let response = router
            .clone()
            .oneshot(decision_call("POST", authorization, body))
            .await
            .expect("router responds");
        assert_eq!(response.status(), status, "{reason}");
        assert_eq!(read_text_body(response).await, reason);
    }
    assert!(store.business().is_none());
}

#[tokio::test]
async fn approval_returns_ok_payload() {
    let store = Arc::new(MemoryStore::with_request(request_data()));
    let router = decision_router(Arc::new(decision_service(store.clone())));

    let response = router
        .oneshot(decision_call(
            "POST",
            Some(&format!("Bearer {ADMIN_TOKEN}")),
            decision_body(true),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        read_json_body(response).await,
        json!({ "ok": true, "approved": true })
    );
    assert_eq!(
        store.request().and_then(|request| request.get("status").cloned()),
        Some(json!("approved"))
    );
}

#[tokio::test]
async fn repeated_decision_returns_conflict() {
    let store = Arc::new(MemoryStore::with_request(request_data()));
    let router = decision_router(Arc::new(decision_service(store)));
    let admin = format!("Bearer {ADMIN_TOKEN}");

    let first = router
        .clone()
        .oneshot(decision_call("POST", Some(&admin), decision_body(false)))
        .await
        .expect("router responds");
    assert_eq!(first.status(), StatusCode::OK);

    let second = router
        .oneshot(decision_call("POST", Some(&admin), decision_body(true)))
        .await
        .expect("router responds");
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn store_outage_yields_internal_error_with_message() {
    let store = Arc::new(ReadOnlyStore(MemoryStore::with_request(request_data())));
    let router = decision_router(Arc::new(decision_service(store)));

    let response = router
        .oneshot(decision_call(
            "POST",
            Some(&format!("Bearer {ADMIN_TOKEN}")),
            decision_body(true),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        read_text_body(response).await,
        "document store unavailable: database offline"
    );
}

fn event_call(secret: Option<&str>, payload: &serde_json::Value) -> Request<Body> {
    let mut builder = Request::post(REQUEST_CREATED_ROUTE)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(secret) = secret {
        builder = builder.header(INTAKE_SECRET_HEADER, secret);
    }
    builder
        .body(Body::from(serde_json::to_vec(payload).expect("serialize")))
        .expect("build request")
}

fn created_payload() -> serde_json::Value {
    json!({ "businessId": "biz-100", "reqId": "req-1", "data": request_data() })
}

#[tokio::test]
async fn request_created_event_stores_record_and_queues_it() {
    let store = Arc::new(MemoryStore::default());
    let (gateway, mut queue) = gateway(store.clone(), 4);
    let router = intake_event_router(Arc::new(gateway));

    let accepted = router
        .oneshot(event_call(Some(INTAKE_SECRET), &created_payload()))
        .await
        .expect("router responds");

    assert_eq!(accepted.status(), StatusCode::ACCEPTED);
    assert_eq!(store.request(), Some(request_data()));
    let queued = queue.recv().await.expect("request queued");
    assert_eq!(
        queued,
        QueuedRequest {
            business_id: business_id(),
            req_id: req_id(),
        }
    );
}

#[tokio::test]
async fn unauthenticated_event_creates_nothing() {
    let store = Arc::new(MemoryStore::default());
    let (gateway, mut queue) = gateway(store.clone(), 4);
    let router = intake_event_router(Arc::new(gateway));

    for secret in [None, Some("guess")] {
        let response = router
            .clone()
            .oneshot(event_call(secret, &created_payload()))
            .await
            .expect("router responds");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    assert_eq!(store.accesses(), 0);
    assert!(queue.try_recv().is_err());
}

#[tokio::test]
async fn replayed_event_is_refused() {
    let store = Arc::new(MemoryStore::default());
    let (gateway, mut queue) = gateway(store.clone(), 4);
    let router = intake_event_router(Arc::new(gateway));

    let first = router
        .clone()
        .oneshot(event_call(Some(INTAKE_SECRET), &created_payload()))
        .await
        .expect("router responds");
    assert_eq!(first.status(), StatusCode::ACCEPTED);

    let mut altered = created_payload();
    altered["data"]["ownerName"] = json!("Someone Else");
    let replay = router
        .oneshot(event_call(Some(INTAKE_SECRET), &altered))
        .await
        .expect("router responds");

    assert_eq!(replay.status(), StatusCode::CONFLICT);
    assert_eq!(store.request(), Some(request_data()));
    assert!(queue.recv().await.is_some());
    assert!(queue.try_recv().is_err(), "replay must not be queued");
}

#[tokio::test]
async fn event_identifiers_are_validated_like_decisions() {
    let store = Arc::new(MemoryStore::default());
    let (gateway, _queue) = gateway(store.clone(), 4);
    let router = intake_event_router(Arc::new(gateway));

    let payload = json!({ "businessId": "biz-100/verification_requests", "reqId": "req-1" });
    let response = router
        .clone()
        .oneshot(event_call(Some(INTAKE_SECRET), &payload))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        read_json_body(response).await,
        json!({ "error": "businessId and reqId must not contain '/'" })
    );

    let response = router
        .oneshot(
            Request::post(REQUEST_CREATED_ROUTE)
                .header(INTAKE_SECRET_HEADER, INTAKE_SECRET)
                .body(Body::from("not json"))
                .expect("build request"),
        )
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.accesses(), 0);
}

#[tokio::test]
async fn full_or_stopped_queue_leaves_no_record_behind() {
    let store = Arc::new(MemoryStore::default());
    let (gateway, queue) = gateway(store.clone(), 1);
    let router = intake_event_router(Arc::new(gateway));

    let accepted = router
        .clone()
        .oneshot(event_call(Some(INTAKE_SECRET), &created_payload()))
        .await
        .expect("router responds");
    assert_eq!(accepted.status(), StatusCode::ACCEPTED);

    let other = json!({ "businessId": "biz-100", "reqId": "req-2", "data": request_data() });
    let full = router
        .clone()
        .oneshot(event_call(Some(INTAKE_SECRET), &other))
        .await
        .expect("router responds");
    assert_eq!(full.status(), StatusCode::SERVICE_UNAVAILABLE);

    drop(queue);
    let stopped = router
        .oneshot(event_call(Some(INTAKE_SECRET), &other))
        .await
        .expect("router responds");
    assert_eq!(stopped.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        read_json_body(stopped).await,
        json!({ "error": "intake worker stopped" })
    );

    let second = DocumentPath::verification_request(&business_id(), &RequestId("req-2".to_string()));
    assert!(store.document(&second).is_none());
}
