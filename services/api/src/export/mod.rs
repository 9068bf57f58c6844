//! services/api/src/export/mod.rs
//!
//! Report export: the printable layout, PDF rendering, JSON download and the
//! mapping from a chat session to a report.

pub mod layout;
pub mod pdf;

pub use layout::ReportLayout;
pub use pdf::render_pdf;

use chrono::Utc;
use medscan_core::domain::{ChatSession, PossibleCause, ReportPatient, ReportPayload};

pub const CHAT_REPORT_GENERATED_BY: &str = "MedScan AI - Clinical Chat";
pub const CHAT_REPORT_DISCLAIMER: &str = "This report is based on a chat consultation with MedScan AI. \
It is not a replacement for professional medical advice.";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("PDF rendering failed: {0}")]
    Pdf(String),
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// A rendered download.
#[derive(Debug, Clone)]
pub struct ExportFile {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Collapses runs of non-alphanumeric characters into single underscores.
fn file_safe(name: &str, fallback: &str) -> String {
    let mut cleaned = String::new();
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            cleaned.push(c);
        } else if !cleaned.is_empty() && !cleaned.ends_with('_') {
            cleaned.push('_');
        }
    }
    let cleaned = cleaned.trim_end_matches('_');
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}

pub fn report_pdf_file_name(payload: &ReportPayload) -> String {
    format!("MedScan_Report_{}.pdf", file_safe(&payload.patient.name, "Patient"))
}

pub fn report_json_file_name(payload: &ReportPayload) -> String {
    format!(
        "MedScan_Report_{}_{}.json",
        payload.generated_at.format("%Y%m%d"),
        file_safe(&payload.patient.name, "Anon")
    )
}

pub fn chat_pdf_file_name(session: &ChatSession) -> String {
    format!("MedScan_Chat_{}.pdf", session.id.simple())
}

pub fn export_report_pdf(payload: &ReportPayload) -> Result<ExportFile, ExportError> {
    Ok(ExportFile {
        file_name: report_pdf_file_name(payload),
        content_type: "application/pdf",
        bytes: render_pdf(&ReportLayout::from_payload(payload))?,
    })
}

/// Pretty-printed payload, loadable again as a `ReportPayload`.
pub fn export_report_json(payload: &ReportPayload) -> Result<ExportFile, ExportError> {
    Ok(ExportFile {
        file_name: report_json_file_name(payload),
        content_type: "application/json",
        bytes: serde_json::to_vec_pretty(payload)?,
    })
}

/// Builds a report from the newest structured answer in the session, if any.
pub fn report_from_session(session: &ChatSession) -> Option<ReportPayload> {
    let response = session.latest_structured_response()?;
    let id = session.id.simple().to_string();
    let suffix = &id[id.len().saturating_sub(6)..];
    let patient = &session.patient_summary;

    let mut payload = ReportPayload {
        report_id: format!("chat-rep-{}", suffix),
        generated_at: Utc::now(),
        patient: ReportPatient {
            name: if patient.name.trim().is_empty() {
                "Patient".to_string()
            } else {
                patient.name.clone()
            },
            age_years: patient.age_years,
            sex: Some(patient.sex),
        },
        risk_level: response.risk_level,
        clinical_summary: response.summary.clone(),
        possible_causes: response
            .differential_diagnosis
            .iter()
            .map(|d| PossibleCause {
                name: d.condition.clone(),
                confidence: Some(format!("{}%", d.confidence)),
            })
            .collect(),
        suggested_medicines: response.suggested_medications.clone(),
        recommended_actions: response.recommended_actions.clone(),
        red_flags: response.red_flags.clone(),
        disclaimer: CHAT_REPORT_DISCLAIMER.to_string(),
        generated_by: CHAT_REPORT_GENERATED_BY.to_string(),
    };
    payload.enforce_risk_gate();
    Some(payload)
}

/// The session as a report PDF, or as a transcript when no structured answer exists yet.
pub fn export_session_pdf(session: &ChatSession) -> Result<ExportFile, ExportError> {
    let layout = match report_from_session(session) {
        Some(payload) => ReportLayout::from_payload(&payload),
        None => ReportLayout::transcript(session),
    };
    Ok(ExportFile {
        file_name: chat_pdf_file_name(session),
        content_type: "application/pdf",
        bytes: render_pdf(&layout)?,
    })
}
