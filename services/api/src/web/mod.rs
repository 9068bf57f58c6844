pub mod consultation;
pub mod family;
pub mod middleware;
pub mod rest;
pub mod state;

pub use middleware::resolve_identity;
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use rest::*;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Requests carry inline images, so the body limit sits above axum's default.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Builds the full API router. CORS is left to the binary.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/sessions", post(create_session_handler).get(list_sessions_handler))
        .route("/sessions/history", get(session_history_handler))
        .route("/sessions/active", get(active_session_handler))
        .route(
            "/sessions/{id}",
            get(get_session_handler)
                .put(save_session_handler)
                .delete(delete_session_handler),
        )
        .route("/sessions/{id}/messages", post(send_message_handler))
        .route("/sessions/{id}/share", get(share_session_handler))
        .route("/sessions/{id}/export/pdf", get(export_session_pdf_handler))
        .route("/reports", post(generate_report_handler))
        .route("/reports/export/pdf", post(export_report_pdf_handler))
        .route("/reports/export/json", post(export_report_json_handler))
        .route("/places/search", post(search_places_handler))
        .route("/contacts", get(list_contacts_handler).post(save_contact_handler))
        .route("/contacts/{id}", axum::routing::delete(delete_contact_handler))
        .route("/family-messages", post(family_messages_handler))
        .route("/profile", get(get_profile_handler).put(save_profile_handler))
        .route("/api-docs/openapi.json", get(openapi_handler))
        .layer(axum_middleware::from_fn(resolve_identity))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
