//! HTTP review endpoints, driven in-process against a router built over a
//! `MemStore` — no socket, no real server startup.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use recon::{
    apply_correction, build_router, ContextElement, EngineConfig, MemStore, ResolutionStatus,
    ServerConfig, ServerState, Store,
};
use serde_json::Value;
use tower::ServiceExt;

fn elem(key: &str, value: &str) -> ContextElement {
    ContextElement::new(key, value)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn seeded_state() -> (Arc<MemStore>, Arc<ServerState<MemStore>>, u64) {
    let store = Arc::new(MemStore::new());
    let config = EngineConfig::default();
    apply_correction(
        &*store,
        &config,
        "Acme Corp",
        &[elem("country", "US").important(true)],
        0,
        &[],
    )
    .unwrap();

    let occ_id = store.transaction(|txn| txn.list_occurrences_by_scope(1)).unwrap()[0].id;
    let resolution_id = store
        .transaction(|txn| txn.list_resolutions_by_occurrence(occ_id))
        .unwrap()[0]
        .id;

    let state = Arc::new(ServerState::new(
        Arc::clone(&store),
        ServerConfig::default(),
        EngineConfig::default(),
    ));
    (store, state, resolution_id)
}

#[tokio::test]
async fn list_corrections_returns_seeded_resolution() {
    let (_store, state, _resolution_id) = seeded_state();
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/corrections/?scope_id=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["resolutions"].as_array().unwrap().len(), 1);
    assert_eq!(json["stats"]["total"], 1);
}

#[tokio::test]
async fn get_edit_view_includes_related_resolutions() {
    let (_store, state, resolution_id) = seeded_state();
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/corrections/{resolution_id}/edit/"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["resolution"]["id"], resolution_id);
    assert_eq!(json["related_resolutions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn get_edit_view_for_unknown_id_is_404() {
    let (_store, state, _resolution_id) = seeded_state();
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/corrections/999999/edit/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn post_approve_redirects_and_persists() {
    let (store, state, resolution_id) = seeded_state();
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/corrections/{resolution_id}/edit/"))
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from("action=approve"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let row = store
        .transaction(|txn| txn.get_resolution(resolution_id))
        .unwrap()
        .unwrap();
    assert_eq!(row.status, ResolutionStatus::Approved);
    assert!(row.manual);
}

#[tokio::test]
async fn post_unknown_action_is_bad_request() {
    let (_store, state, resolution_id) = seeded_state();
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/corrections/{resolution_id}/edit/"))
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from("action=bogus"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn post_change_status_to_invalid_is_sticky() {
    let (store, state, resolution_id) = seeded_state();
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/corrections/{resolution_id}/edit/"))
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from("action=change_status&status=9"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let row = store
        .transaction(|txn| txn.get_resolution(resolution_id))
        .unwrap()
        .unwrap();
    assert_eq!(row.status, ResolutionStatus::Invalid);
}

#[tokio::test]
async fn post_delete_removes_the_row() {
    let (store, state, resolution_id) = seeded_state();
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/corrections/{resolution_id}/edit/"))
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from("action=delete"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let row = store.transaction(|txn| txn.get_resolution(resolution_id)).unwrap();
    assert!(row.is_none());
}

#[tokio::test]
async fn post_approve_on_unknown_id_is_404() {
    let (_store, state, _resolution_id) = seeded_state();
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/corrections/999999/edit/")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from("action=approve"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
