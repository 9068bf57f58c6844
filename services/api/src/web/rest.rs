//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::export::{export_report_json, export_report_pdf, export_session_pdf, ExportFile};
use crate::gateway::{GatewayError, ReportRequest};
use crate::profile::Identity;
use crate::web::consultation::{run_chat_turn, share_summary, ChatTurn, TurnError};
use crate::web::family::{compose_family_messages, FamilyMessage, ShareLinks};
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use chrono::Utc;
use medscan_core::domain::{
    CarePlace, ChatSession, Contact, HealthProfile, InlineImage, PatientDetails, PlaceFilter,
    ReportPayload, SearchLocation,
};
use medscan_core::store::contacts::ContactError;
use medscan_core::validation::{validate_report_input, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

type HandlerError = (StatusCode, String);

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_session_handler,
        list_sessions_handler,
        session_history_handler,
        active_session_handler,
        get_session_handler,
        save_session_handler,
        delete_session_handler,
        send_message_handler,
        share_session_handler,
        export_session_pdf_handler,
        generate_report_handler,
        export_report_pdf_handler,
        export_report_json_handler,
        search_places_handler,
        list_contacts_handler,
        save_contact_handler,
        delete_contact_handler,
        family_messages_handler,
        get_profile_handler,
        save_profile_handler,
    ),
    components(
        schemas(
            SessionBody,
            ReportBody,
            ContactBody,
            ProfileBody,
            ImageUpload,
            ChatTurnRequest,
            ShareSummaryResponse,
            GenerateReportRequest,
            PlaceSearchRequest,
            PlaceSearchResponse,
            FamilyMessageRequest,
            FamilyMessageResponse,
            FamilyMessage,
            ShareLinks,
        )
    ),
    tags(
        (name = "MedScan API", description = "Consultations, reports, care places and family updates.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Request and Response Structs
//=========================================================================================

/// An image sent inline as base64, optionally as a full `data:` URL.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageUpload {
    pub mime_type: String,
    pub data: String,
}

impl ImageUpload {
    fn decode(&self) -> Result<InlineImage, HandlerError> {
        let payload = match self.data.split_once(";base64,") {
            Some((_, payload)) => payload,
            None => self.data.as_str(),
        };
        let data = BASE64_STANDARD
            .decode(payload.trim())
            .map_err(|e| bad_request(format!("Image is not valid base64: {}", e)))?;
        Ok(InlineImage {
            mime_type: self.mime_type.clone(),
            data,
        })
    }
}

fn decode_image(upload: Option<&ImageUpload>) -> Result<Option<InlineImage>, HandlerError> {
    upload.map(ImageUpload::decode).transpose()
}

/// A stored session as sent back by the client.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct SessionBody(pub ChatSession);

/// A previously generated report, sent back for export.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct ReportBody(pub ReportPayload);

#[derive(Debug, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct ContactBody(pub Contact);

#[derive(Debug, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct ProfileBody(pub HealthProfile);

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnRequest {
    #[serde(default)]
    pub text: String,
    pub image: Option<ImageUpload>,
    #[schema(value_type = Option<Object>)]
    pub patient: Option<PatientDetails>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ShareSummaryResponse {
    pub text: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateReportRequest {
    #[serde(default)]
    #[schema(value_type = Object)]
    pub patient: PatientDetails,
    #[serde(default)]
    pub clinical_context: String,
    pub image: Option<ImageUpload>,
}

fn default_radius_km() -> f64 {
    5.0
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlaceSearchRequest {
    #[schema(value_type = Object)]
    pub location: SearchLocation,
    #[serde(default)]
    #[schema(value_type = String)]
    pub filter: PlaceFilter,
    #[serde(default = "default_radius_km")]
    pub radius_km: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlaceSearchResponse {
    #[schema(value_type = Vec<Object>)]
    pub places: Vec<CarePlace>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMessageRequest {
    /// Blank summaries are replaced with a generic "feeling unwell" note.
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub patient_name: String,
    pub contact_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FamilyMessageResponse {
    pub messages: Vec<FamilyMessage>,
}

//=========================================================================================
// Error Mapping
//=========================================================================================

fn bad_request(message: impl Display) -> HandlerError {
    (StatusCode::BAD_REQUEST, message.to_string())
}

fn not_found(message: &str) -> HandlerError {
    (StatusCode::NOT_FOUND, message.to_string())
}

fn internal(context: &str, e: impl Display) -> HandlerError {
    error!("{}: {}", context, e);
    (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
}

fn download(file: ExportFile) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.file_name),
            ),
        ],
        file.bytes,
    )
}

//=========================================================================================
// Session Handlers
//=========================================================================================

/// Start a new consultation. The session is not stored until its first save or message.
#[utoipa::path(
    post,
    path = "/sessions",
    responses((status = 201, description = "A fresh, unsaved session"))
)]
pub async fn create_session_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::CREATED, Json(state.sessions.create_session()))
}

/// List stored sessions, most recently updated first.
#[utoipa::path(get, path = "/sessions", responses((status = 200, description = "Stored sessions")))]
pub async fn list_sessions_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Json<Vec<ChatSession>> {
    Json(state.sessions_for(identity).list_sessions())
}

/// Sessions grouped into Today, Yesterday and Earlier.
#[utoipa::path(
    get,
    path = "/sessions/history",
    responses((status = 200, description = "Sessions grouped by day"))
)]
pub async fn session_history_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> impl IntoResponse {
    Json(state.sessions_for(identity).group_by_date(Utc::now()))
}

/// The session to resume: the active one, the newest one, or a fresh one.
#[utoipa::path(
    get,
    path = "/sessions/active",
    responses((status = 200, description = "The session to resume"))
)]
pub async fn active_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Json<ChatSession> {
    Json(state.sessions_for(identity).last_active_or_new())
}

#[utoipa::path(
    get,
    path = "/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "The session"),
        (status = 404, description = "No such session")
    )
)]
pub async fn get_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Json<ChatSession>, HandlerError> {
    state
        .sessions_for(identity)
        .get_session(id)
        .map(Json)
        .ok_or_else(|| not_found("Session not found"))
}

/// Store the client's working copy of a session and make it the active one.
#[utoipa::path(
    put,
    path = "/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = SessionBody,
    responses(
        (status = 200, description = "Saved"),
        (status = 400, description = "Body id does not match the path")
    )
)]
pub async fn save_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(SessionBody(mut session)): Json<SessionBody>,
) -> Result<Json<ChatSession>, HandlerError> {
    if session.id != id {
        return Err(bad_request("Session id does not match the path"));
    }
    session.touch();
    state
        .sessions_for(identity)
        .save_session(&session)
        .map_err(|e| internal("Failed to save session", e))?;
    Ok(Json(session))
}

#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses((status = 204, description = "Deleted"))
)]
pub async fn delete_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HandlerError> {
    state
        .sessions_for(identity)
        .delete_session(id)
        .map_err(|e| internal("Failed to delete session", e))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Send a chat message. Always answers, falling back to a safe reply when the model is unavailable.
#[utoipa::path(
    post,
    path = "/sessions/{id}/messages",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = ChatTurnRequest,
    responses(
        (status = 200, description = "The updated session"),
        (status = 400, description = "Empty message without an image"),
        (status = 404, description = "The session was deleted before the reply arrived")
    )
)]
pub async fn send_message_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(request): Json<ChatTurnRequest>,
) -> Result<Json<ChatSession>, HandlerError> {
    let turn = ChatTurn {
        image: decode_image(request.image.as_ref())?,
        text: request.text,
        patient: request.patient,
    };
    match run_chat_turn(&state, identity, id, turn).await {
        Ok(session) => Ok(Json(session)),
        Err(TurnError::Invalid(e)) => Err(bad_request(e)),
        Err(TurnError::Storage(e)) => Err(internal("Failed to save session", e)),
        Err(e @ TurnError::SessionDeleted(_)) => Err((StatusCode::NOT_FOUND, e.to_string())),
    }
}

#[utoipa::path(
    get,
    path = "/sessions/{id}/share",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Share text", body = ShareSummaryResponse),
        (status = 404, description = "No session or no reply yet")
    )
)]
pub async fn share_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<Json<ShareSummaryResponse>, HandlerError> {
    let session = state
        .sessions_for(identity)
        .get_session(id)
        .ok_or_else(|| not_found("Session not found"))?;
    let text = share_summary(&session).ok_or_else(|| not_found("No reply to share yet"))?;
    Ok(Json(ShareSummaryResponse { text }))
}

/// Download the session as a report PDF, or as a transcript before the first structured reply.
#[utoipa::path(
    get,
    path = "/sessions/{id}/export/pdf",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "PDF document"),
        (status = 404, description = "No such session")
    )
)]
pub async fn export_session_pdf_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let session = state
        .sessions_for(identity)
        .get_session(id)
        .ok_or_else(|| not_found("Session not found"))?;
    let file = export_session_pdf(&session).map_err(|e| internal("Failed to export session", e))?;
    Ok(download(file))
}

//=========================================================================================
// Report Handlers
//=========================================================================================

/// Generate a structured report. Fails with 502 when the model cannot produce one.
#[utoipa::path(
    post,
    path = "/reports",
    request_body = GenerateReportRequest,
    responses(
        (status = 200, description = "The report payload"),
        (status = 400, description = "Neither symptoms nor an image were provided"),
        (status = 502, description = "Report generation failed")
    )
)]
pub async fn generate_report_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<GenerateReportRequest>,
) -> Result<Json<ReportPayload>, HandlerError> {
    let image = decode_image(request.image.as_ref())?;
    validate_report_input(&request.clinical_context, image.is_some()).map_err(bad_request)?;

    let report_request = ReportRequest {
        patient: request.patient,
        clinical_context: request.clinical_context,
        image,
        health_context: state.profiles.context_block(identity).await,
    };

    match state.gateway.generate_report(report_request).await {
        Ok(payload) => {
            info!("Generated report {}", payload.report_id);
            Ok(Json(payload))
        }
        Err(e) => {
            if e == GatewayError::AccessDenied {
                warn!("Report generation rejected by the model provider");
            }
            Err((StatusCode::BAD_GATEWAY, e.to_string()))
        }
    }
}

#[utoipa::path(
    post,
    path = "/reports/export/pdf",
    request_body = ReportBody,
    responses((status = 200, description = "PDF document"))
)]
pub async fn export_report_pdf_handler(
    Json(ReportBody(payload)): Json<ReportBody>,
) -> Result<impl IntoResponse, HandlerError> {
    let file = export_report_pdf(&payload).map_err(|e| internal("Failed to export report", e))?;
    Ok(download(file))
}

#[utoipa::path(
    post,
    path = "/reports/export/json",
    request_body = ReportBody,
    responses((status = 200, description = "The payload as a JSON file"))
)]
pub async fn export_report_json_handler(
    Json(ReportBody(payload)): Json<ReportBody>,
) -> Result<impl IntoResponse, HandlerError> {
    let file = export_report_json(&payload).map_err(|e| internal("Failed to export report", e))?;
    Ok(download(file))
}

//=========================================================================================
// Care Place Handlers
//=========================================================================================

/// Find hospitals and pharmacies nearby. An unavailable model yields an empty list.
#[utoipa::path(
    post,
    path = "/places/search",
    request_body = PlaceSearchRequest,
    responses(
        (status = 200, description = "Ranked places", body = PlaceSearchResponse),
        (status = 400, description = "No location given")
    )
)]
pub async fn search_places_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PlaceSearchRequest>,
) -> Result<Json<PlaceSearchResponse>, HandlerError> {
    if let SearchLocation::Manual { query } = &request.location {
        if query.trim().is_empty() {
            return Err(bad_request(ValidationError::MissingLocation));
        }
    }
    let radius_km = if request.radius_km > 0.0 {
        request.radius_km
    } else {
        default_radius_km()
    };

    let places = state
        .gateway
        .find_nearby_places(&request.location, request.filter, radius_km)
        .await;
    Ok(Json(PlaceSearchResponse { places }))
}

//=========================================================================================
// Contact and Family Message Handlers
//=========================================================================================

#[utoipa::path(get, path = "/contacts", responses((status = 200, description = "Saved contacts")))]
pub async fn list_contacts_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Json<Vec<Contact>> {
    Json(state.contacts_for(identity).list())
}

/// Add or update a contact. Name and phone are required.
#[utoipa::path(
    post,
    path = "/contacts",
    request_body = ContactBody,
    responses(
        (status = 200, description = "The stored contact"),
        (status = 400, description = "Name or phone missing")
    )
)]
pub async fn save_contact_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(ContactBody(contact)): Json<ContactBody>,
) -> Result<Json<Contact>, HandlerError> {
    match state.contacts_for(identity).save(contact) {
        Ok(saved) => Ok(Json(saved)),
        Err(ContactError::Invalid(e)) => Err(bad_request(e)),
        Err(ContactError::Storage(e)) => Err(internal("Failed to save contact", e)),
    }
}

#[utoipa::path(
    delete,
    path = "/contacts/{id}",
    params(("id" = Uuid, Path, description = "Contact id")),
    responses((status = 204, description = "Deleted"))
)]
pub async fn delete_contact_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HandlerError> {
    state
        .contacts_for(identity)
        .delete(id)
        .map_err(|e| internal("Failed to delete contact", e))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Prepare a family update for each selected contact in their language.
#[utoipa::path(
    post,
    path = "/family-messages",
    request_body = FamilyMessageRequest,
    responses(
        (status = 200, description = "One message per contact", body = FamilyMessageResponse),
        (status = 400, description = "No recipients selected")
    )
)]
pub async fn family_messages_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<FamilyMessageRequest>,
) -> Result<Json<FamilyMessageResponse>, HandlerError> {
    let book = state.contacts_for(identity);
    let contacts: Vec<Contact> = request
        .contact_ids
        .iter()
        .filter_map(|id| book.get(*id))
        .collect();
    if contacts.is_empty() {
        return Err(bad_request(ValidationError::NoRecipients));
    }

    let patient_name = match request.patient_name.trim() {
        "" => "me",
        name => name,
    };
    let messages =
        compose_family_messages(&state.gateway, &request.summary, patient_name, &contacts).await;
    Ok(Json(FamilyMessageResponse { messages }))
}

//=========================================================================================
// Profile Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "The caller's health profile"),
        (status = 404, description = "No profile saved yet")
    )
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<HealthProfile>, HandlerError> {
    state
        .profiles
        .load(identity)
        .await
        .map(Json)
        .ok_or_else(|| not_found("No profile saved yet"))
}

#[utoipa::path(
    put,
    path = "/profile",
    request_body = ProfileBody,
    responses((status = 200, description = "The stored profile"))
)]
pub async fn save_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(ProfileBody(profile)): Json<ProfileBody>,
) -> Result<Json<HealthProfile>, HandlerError> {
    state
        .profiles
        .save(identity, profile)
        .await
        .map(Json)
        .map_err(|e| internal("Failed to save profile", e))
}

/// Serves the OpenAPI document.
pub async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
