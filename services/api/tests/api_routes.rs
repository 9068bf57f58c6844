//! Router-level tests against a file-backed store and a model that is always down.

use api_lib::adapters::JsonFileStore;
use api_lib::gateway::{AiGateway, FALLBACK_CHAT_SUMMARY};
use api_lib::web::{self, AppState};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use medscan_core::ports::{GenerativeModel, ModelRequest, PortError, PortResult};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

struct DownModel;

#[async_trait]
impl GenerativeModel for DownModel {
    async fn generate(&self, _request: ModelRequest) -> PortResult<String> {
        Err(PortError::Unexpected("connection refused".to_string()))
    }
}

fn app() -> (TempDir, Router) {
    let dir = tempfile::tempdir().unwrap();
    let kv = Arc::new(JsonFileStore::open(dir.path()).unwrap());
    let state = AppState::new(kv, None, AiGateway::with_model(Arc::new(DownModel)));
    (dir, web::router(Arc::new(state)))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    send_as(app, None, method, uri, body).await
}

/// Like `send`, signed in as `user` when one is given.
async fn send_as(
    app: &Router,
    user: Option<&str>,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

fn json_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

#[tokio::test]
async fn chat_turn_survives_a_model_outage() {
    let (_dir, app) = app();

    let (status, body) = send(&app, "POST", "/sessions", None).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = json_body(&body)["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/sessions/{}/messages", id),
        Some(json!({ "text": "I have a fever and headache" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let session = json_body(&body);
    let messages = session["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["text"], FALLBACK_CHAT_SUMMARY);
    assert_eq!(messages[1]["structuredResponse"]["confidenceScore"].as_f64(), Some(0.0));

    let (status, body) = send(&app, "GET", &format!("/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["messages"].as_array().unwrap().len(), 2);

    let (_, body) = send(&app, "GET", "/sessions/active", None).await;
    assert_eq!(json_body(&body)["id"], id.as_str());

    let (status, body) = send(&app, "GET", &format!("/sessions/{}/share", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json_body(&body)["text"].as_str().unwrap().starts_with("Update on my health:"));
}

#[tokio::test]
async fn empty_message_is_a_bad_request() {
    let (_dir, app) = app();
    let (status, _) = send(
        &app,
        "POST",
        "/sessions/6f9619ff-8b86-d011-b42d-00c04fc964ff/messages",
        Some(json!({ "text": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let (_dir, app) = app();
    let (status, _) = send(&app, "GET", "/sessions/6f9619ff-8b86-d011-b42d-00c04fc964ff", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleted_session_disappears_from_the_list() {
    let (_dir, app) = app();
    let (_, body) = send(&app, "GET", "/sessions/active", None).await;
    let session = json_body(&body);
    let id = session["id"].as_str().unwrap().to_string();

    let (status, _) = send(&app, "PUT", &format!("/sessions/{}", id), Some(session)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, "GET", "/sessions", None).await;
    assert_eq!(json_body(&body).as_array().unwrap().len(), 1);

    let (status, _) = send(&app, "DELETE", &format!("/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = send(&app, "GET", "/sessions", None).await;
    assert!(json_body(&body).as_array().unwrap().is_empty());
}

#[tokio::test]
async fn report_failure_surfaces_as_bad_gateway() {
    let (_dir, app) = app();

    let (status, _) = send(&app, "POST", "/reports", Some(json!({ "clinicalContext": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        "/reports",
        Some(json!({ "clinicalContext": "Chest pain on exertion" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(String::from_utf8(body).unwrap().starts_with("Failed to analyze data"));
}

#[tokio::test]
async fn places_search_degrades_to_an_empty_list() {
    let (_dir, app) = app();

    let (status, body) = send(
        &app,
        "POST",
        "/places/search",
        Some(json!({ "location": { "kind": "coordinates", "lat": 18.52, "lng": 73.85 } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(json_body(&body)["places"].as_array().unwrap().is_empty());

    let (status, _) = send(
        &app,
        "POST",
        "/places/search",
        Some(json!({ "location": { "kind": "manual", "query": " " } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn contacts_feed_family_messages() {
    let (_dir, app) = app();

    let (status, _) = send(&app, "POST", "/contacts", Some(json!({ "name": "Ravi", "phone": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        "/contacts",
        Some(json!({ "name": "Ravi", "phone": "+91 98765 43210", "language": "Hindi" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let contact = json_body(&body);
    assert_eq!(contact["relation"], "Family");
    let contact_id = contact["id"].clone();

    let (status, _) = send(
        &app,
        "POST",
        "/family-messages",
        Some(json!({ "summary": "Mild fever.", "contactIds": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        "/family-messages",
        Some(json!({ "summary": "Mild fever.", "patientName": "Asha", "contactIds": [contact_id] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let message = &json_body(&body)["messages"][0];
    assert_eq!(
        message["message"],
        "Hi, this is an update about Asha. Mild fever. I will keep you posted."
    );
    assert_eq!(message["links"]["tel"], "tel:+919876543210");
}

#[tokio::test]
async fn blank_family_summary_uses_the_default_note() {
    let (_dir, app) = app();
    let (_, body) = send(
        &app,
        "POST",
        "/contacts",
        Some(json!({ "name": "Ravi", "phone": "123", "language": "English" })),
    )
    .await;
    let contact_id = json_body(&body)["id"].clone();

    let (status, body) = send(
        &app,
        "POST",
        "/family-messages",
        Some(json!({ "summary": "   ", "patientName": "Asha", "contactIds": [contact_id] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json_body(&body)["messages"][0]["message"],
        "Hi, this is an update about Asha. I am feeling unwell and wanted to let you know. I will keep you posted."
    );
}

#[tokio::test]
async fn callers_only_see_their_own_sessions_and_contacts() {
    let (_dir, app) = app();
    let alice = "6f1c2a7e-3b1d-4c55-9a0e-1f2b3c4d5e6f";
    let bob = "0d9e8f7a-6b5c-4d3e-8f1a-2b3c4d5e6f70";

    let (_, body) = send_as(&app, Some(alice), "POST", "/sessions", None).await;
    let session_id = json_body(&body)["id"].as_str().unwrap().to_string();
    let (status, _) = send_as(
        &app,
        Some(alice),
        "POST",
        &format!("/sessions/{}/messages", session_id),
        Some(json!({ "text": "Private symptoms" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send_as(
        &app,
        Some(alice),
        "POST",
        "/contacts",
        Some(json!({ "name": "Priya", "phone": "+91 90000 00000" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    for user in [Some(bob), None] {
        let (_, body) = send_as(&app, user, "GET", "/sessions", None).await;
        assert_eq!(json_body(&body), json!([]));
        let (status, _) = send_as(&app, user, "GET", &format!("/sessions/{}", session_id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, body) = send_as(&app, user, "GET", "/contacts", None).await;
        assert_eq!(json_body(&body), json!([]));
        let (_, body) = send_as(&app, user, "GET", "/sessions/active", None).await;
        assert_ne!(json_body(&body)["id"], session_id.as_str());
    }

    // Another caller's delete does not reach Alice's data.
    let (status, _) = send_as(&app, Some(bob), "DELETE", &format!("/sessions/{}", session_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send_as(&app, Some(alice), "GET", "/sessions", None).await;
    assert_eq!(json_body(&body).as_array().unwrap().len(), 1);
    let (_, body) = send_as(&app, Some(alice), "GET", "/sessions/active", None).await;
    assert_eq!(json_body(&body)["id"], session_id.as_str());
    let (_, body) = send_as(&app, Some(alice), "GET", "/contacts", None).await;
    assert_eq!(json_body(&body)[0]["name"], "Priya");
}

#[tokio::test]
async fn guest_profile_round_trips() {
    let (_dir, app) = app();

    let (status, _) = send(&app, "GET", "/profile", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "PUT",
        "/profile",
        Some(json!({ "full_name": "Asha", "allergies": "Penicillin" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", "/profile", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["allergies"], "Penicillin");
}

#[tokio::test]
async fn malformed_user_header_is_rejected() {
    let (_dir, app) = app();
    let request = Request::builder()
        .uri("/profile")
        .header("x-user-id", "not-a-uuid")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn report_exports_as_pdf_and_json() {
    let (_dir, app) = app();
    let payload = json!({
        "reportId": "rep-0badf00d",
        "generatedAt": "2024-02-29T10:00:00Z",
        "patient": { "name": "Asha" },
        "riskLevel": "emergency",
        "clinicalSummary": "Crushing chest pain.",
        "possibleCauses": [],
        "suggestedMedicines": [],
        "recommendedActions": ["Call emergency services"],
        "redFlags": [],
        "disclaimer": "Informational only.",
        "generatedBy": "MedScan AI - Clinical Report"
    });

    let request = Request::builder()
        .method("POST")
        .uri("/reports/export/pdf")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"MedScan_Report_Asha.pdf\""
    );

    let (status, body) = send(&app, "POST", "/reports/export/json", Some(payload.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["reportId"], "rep-0badf00d");
}

#[tokio::test]
async fn openapi_document_lists_the_routes() {
    let (_dir, app) = app();
    let (status, body) = send(&app, "GET", "/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    let doc = json_body(&body);
    assert!(doc["paths"]["/sessions/{id}/messages"].is_object());
    assert!(doc["paths"]["/family-messages"].is_object());
    assert!(doc["paths"]["/sessions/{id}"]["put"]["requestBody"].is_object());
    assert_eq!(doc["components"]["schemas"]["SessionBody"]["type"], "object");
}
