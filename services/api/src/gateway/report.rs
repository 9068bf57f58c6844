//! services/api/src/gateway/report.rs
//!
//! Full medical report generation.

use super::parse::parse_json;
use super::prompts::{report_prompt, report_schema, REPORT_SYSTEM_INSTRUCTION};
use super::{AiGateway, GatewayError};
use chrono::{DateTime, Utc};
use medscan_core::domain::{
    InlineImage, PatientDetails, PossibleCause, ReportPatient, ReportPayload, RiskLevel,
    SuggestedMedicine,
};
use medscan_core::ports::{ModelRequest, PortError};
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const REPORT_GENERATED_BY: &str = "MedScan AI - Clinical Report";

pub const DEFAULT_DISCLAIMER: &str = "This report is generated by AI for informational purposes only. \
It does not constitute a medical diagnosis or prescription. Always consult a qualified healthcare \
professional for medical advice, diagnosis, or treatment.";

const REPORT_TEMPERATURE: f32 = 0.4;

/// Everything needed to generate one report.
#[derive(Debug, Clone, Default)]
pub struct ReportRequest {
    pub patient: PatientDetails,
    pub clinical_context: String,
    pub image: Option<InlineImage>,
    /// Rendered health-profile block, appended to the prompt when present.
    pub health_context: Option<String>,
}

/// The report as the model returns it, before the gateway fills in the rest.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportDraft {
    #[serde(default)]
    report_id: Option<String>,
    #[serde(default)]
    generated_at: Option<String>,
    #[serde(default)]
    risk_level: RiskLevel,
    clinical_summary: String,
    #[serde(default)]
    possible_causes: Vec<PossibleCause>,
    #[serde(default)]
    suggested_medicines: Vec<SuggestedMedicine>,
    #[serde(default)]
    recommended_actions: Vec<String>,
    #[serde(default)]
    red_flags: Vec<String>,
    #[serde(default)]
    disclaimer: Option<String>,
}

fn new_report_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("rep-{}", &id[..8])
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ReportDraft {
    fn into_payload(self, patient: &PatientDetails) -> ReportPayload {
        let generated_at = self
            .generated_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|at| at.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        let mut payload = ReportPayload {
            report_id: non_blank(self.report_id).unwrap_or_else(new_report_id),
            generated_at,
            patient: ReportPatient {
                name: patient.name.trim().to_string(),
                age_years: patient.age_years,
                sex: Some(patient.sex),
            },
            risk_level: self.risk_level,
            clinical_summary: self.clinical_summary.trim().to_string(),
            possible_causes: self.possible_causes,
            suggested_medicines: self.suggested_medicines,
            recommended_actions: self.recommended_actions,
            red_flags: self.red_flags,
            disclaimer: non_blank(self.disclaimer).unwrap_or_else(|| DEFAULT_DISCLAIMER.to_string()),
            generated_by: REPORT_GENERATED_BY.to_string(),
        };
        // The model is told not to suggest medicines in an emergency; check anyway.
        payload.enforce_risk_gate();
        payload
    }
}

impl AiGateway {
    /// Generates a full report. Any failure is surfaced; there is no retry.
    pub async fn generate_report(&self, request: ReportRequest) -> Result<ReportPayload, GatewayError> {
        let model_request = ModelRequest {
            system_instruction: REPORT_SYSTEM_INSTRUCTION.to_string(),
            prompt: report_prompt(
                &request.patient,
                &request.clinical_context,
                request.health_context.as_deref(),
            ),
            image: request.image,
            response_schema: Some(report_schema()),
            temperature: REPORT_TEMPERATURE,
        };

        let raw = self.report_model.generate(model_request).await.map_err(|e| {
            error!("Report generation failed: {}", e);
            match e {
                PortError::AccessDenied(_) => GatewayError::AccessDenied,
                _ => GatewayError::ReportUnavailable,
            }
        })?;

        let draft: ReportDraft = parse_json(&raw).map_err(|e| {
            warn!("Report reply did not match the expected shape: {}", e);
            GatewayError::ReportUnavailable
        })?;
        if draft.clinical_summary.trim().is_empty() {
            warn!("Report reply had an empty clinical summary.");
            return Err(GatewayError::ReportUnavailable);
        }

        let payload = draft.into_payload(&request.patient);
        info!(
            "Generated report {} (risk: {}, {} causes)",
            payload.report_id,
            payload.risk_level.label(),
            payload.possible_causes.len()
        );
        Ok(payload)
    }
}
