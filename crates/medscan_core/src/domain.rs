//! crates/medscan_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! Field names serialize in camelCase so the browser client and the
//! key-value store share one wire shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title given to every freshly created session until the first user message renames it.
pub const DEFAULT_SESSION_TITLE: &str = "New Consultation";

const SESSION_TITLE_MAX_CHARS: usize = 40;

//=========================================================================================
// Patient Details
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgeGroup {
    Infant,
    Child,
    Teen,
    #[default]
    Adult,
    Senior,
}

impl AgeGroup {
    pub fn label(&self) -> &'static str {
        match self {
            AgeGroup::Infant => "Infant (0-2)",
            AgeGroup::Child => "Child (3-12)",
            AgeGroup::Teen => "Teen (13-18)",
            AgeGroup::Adult => "Adult (19-64)",
            AgeGroup::Senior => "Senior (65+)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    #[default]
    Male,
    Female,
    Other,
}

impl Sex {
    pub fn label(&self) -> &'static str {
        match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
            Sex::Other => "Other / Not specified",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SymptomType {
    External,
    Internal,
    Musculoskeletal,
    Neurological,
    Respiratory,
    Gastrointestinal,
    #[default]
    Other,
}

impl SymptomType {
    pub fn label(&self) -> &'static str {
        match self {
            SymptomType::External => "External injury / skin wound",
            SymptomType::Internal => "Internal / organ related",
            SymptomType::Musculoskeletal => "Musculoskeletal / bone / joint",
            SymptomType::Neurological => "Neurological",
            SymptomType::Respiratory => "Respiratory / chest",
            SymptomType::Gastrointestinal => "Abdominal / gastrointestinal",
            SymptomType::Other => "Other / unsure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Duration {
    Hours,
    #[default]
    Days,
    Weeks,
    Months,
    Chronic,
}

impl Duration {
    pub fn label(&self) -> &'static str {
        match self {
            Duration::Hours => "Hours",
            Duration::Days => "Days",
            Duration::Weeks => "Weeks",
            Duration::Months => "Months",
            Duration::Chronic => "Chronic / long-term",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PainSeverity {
    None,
    #[default]
    Mild,
    Moderate,
    Severe,
    Extreme,
}

impl PainSeverity {
    pub fn label(&self) -> &'static str {
        match self {
            PainSeverity::None => "0 - No pain",
            PainSeverity::Mild => "1-3 - Mild",
            PainSeverity::Moderate => "4-6 - Moderate",
            PainSeverity::Severe => "7-8 - Severe",
            PainSeverity::Extreme => "9-10 - Extreme",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReportFocus {
    Radiology,
    Diagnosis,
    Treatment,
    #[default]
    Layman,
    Combined,
}

impl ReportFocus {
    pub fn label(&self) -> &'static str {
        match self {
            ReportFocus::Radiology => "Detailed radiology-style report only",
            ReportFocus::Diagnosis => "Diagnosis + differential diagnosis",
            ReportFocus::Treatment => "Step-by-step treatment guidance (general advice)",
            ReportFocus::Layman => "Simple explanation in layman language",
            ReportFocus::Combined => "Combination of professional report + simple explanation",
        }
    }
}

/// The facts a patient enters in the intake form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PatientDetails {
    pub name: String,
    pub age_years: Option<u32>,
    pub age_group: AgeGroup,
    pub sex: Sex,
    pub symptom_type: SymptomType,
    pub duration: Duration,
    pub pain_severity: PainSeverity,
    pub report_focus: ReportFocus,
}

//=========================================================================================
// Structured AI Responses
//=========================================================================================

/// Coarse triage category. Medicines are never shown under `Emergency`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    #[default]
    Moderate,
    Emergency,
}

impl RiskLevel {
    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::Emergency => "emergency",
        }
    }
}

/// One candidate condition in a differential diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Differential {
    pub condition: String,
    #[serde(default)]
    pub reasoning: String,
    /// 0-100.
    #[serde(default)]
    pub confidence: f64,
}

/// An over-the-counter suggestion. Models sometimes answer with a bare
/// name instead of an object, so both shapes deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedMedicine {
    pub name: String,
    pub form: String,
    pub dose: String,
    pub frequency: String,
    pub timing: String,
}

impl<'de> Deserialize<'de> for SuggestedMedicine {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase", default)]
        #[derive(Default)]
        struct Full {
            name: String,
            form: String,
            dose: String,
            frequency: String,
            timing: String,
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Shape {
            Name(String),
            Full(Full),
        }

        Ok(match Shape::deserialize(deserializer)? {
            Shape::Name(name) => SuggestedMedicine {
                name,
                ..SuggestedMedicine::default()
            },
            Shape::Full(full) => SuggestedMedicine {
                name: full.name,
                form: full.form,
                dose: full.dose,
                frequency: full.frequency,
                timing: full.timing,
            },
        })
    }
}

/// The parsed JSON result of a single chat turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredAIResponse {
    pub summary: String,
    #[serde(default)]
    pub risk_level: RiskLevel,
    pub differential_diagnosis: Vec<Differential>,
    pub recommended_actions: Vec<String>,
    #[serde(default)]
    pub suggested_medications: Vec<SuggestedMedicine>,
    #[serde(default)]
    pub red_flags: Vec<String>,
    /// Overall confidence, 0-100.
    pub confidence_score: f64,
}

impl StructuredAIResponse {
    /// Drops any medicine suggestion when the triage level is an emergency.
    pub fn enforce_risk_gate(&mut self) {
        if self.risk_level == RiskLevel::Emergency {
            self.suggested_medications.clear();
        }
    }
}

/// Patient block printed at the top of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportPatient {
    pub name: String,
    pub age_years: Option<u32>,
    pub sex: Option<Sex>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PossibleCause {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
}

/// The canonical shape of a full medical report, used both for rendering and export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    pub report_id: String,
    pub generated_at: DateTime<Utc>,
    pub patient: ReportPatient,
    pub risk_level: RiskLevel,
    pub clinical_summary: String,
    pub possible_causes: Vec<PossibleCause>,
    pub suggested_medicines: Vec<SuggestedMedicine>,
    pub recommended_actions: Vec<String>,
    pub red_flags: Vec<String>,
    pub disclaimer: String,
    pub generated_by: String,
}

impl ReportPayload {
    /// Drops any medicine suggestion when the triage level is an emergency.
    pub fn enforce_risk_gate(&mut self) {
        if self.risk_level == RiskLevel::Emergency {
            self.suggested_medicines.clear();
        }
    }
}

//=========================================================================================
// Chat Sessions
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(alias = "model")]
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single, immutable entry in a session transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_response: Option<StructuredAIResponse>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>, attachments: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::User,
            text: text.into(),
            timestamp: Utc::now(),
            attachments,
            structured_response: None,
        }
    }

    /// An assistant reply whose display text is the structured summary.
    pub fn assistant(response: StructuredAIResponse) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: Role::Assistant,
            text: response.summary.clone(),
            timestamp: Utc::now(),
            attachments: Vec::new(),
            structured_response: Some(response),
        }
    }
}

/// One continuous consultation thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: Uuid,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub messages: Vec<ChatMessage>,
    pub patient_summary: PatientDetails,
}

impl ChatSession {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: DEFAULT_SESSION_TITLE.to_string(),
            start_time: now,
            last_updated: now,
            messages: Vec::new(),
            patient_summary: PatientDetails::default(),
        }
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    /// Appends a message, renaming a still-untitled session after the first user message.
    pub fn push_message(&mut self, message: ChatMessage) {
        if message.role == Role::User
            && self.title == DEFAULT_SESSION_TITLE
            && !message.text.trim().is_empty()
        {
            self.title = message
                .text
                .trim()
                .chars()
                .take(SESSION_TITLE_MAX_CHARS)
                .collect();
        }
        self.messages.push(message);
        self.touch();
    }

    /// The structured response of the most recent assistant turn, if any.
    pub fn latest_structured_response(&self) -> Option<&StructuredAIResponse> {
        self.messages
            .iter()
            .rev()
            .filter(|m| m.role == Role::Assistant)
            .find_map(|m| m.structured_response.as_ref())
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

//=========================================================================================
// Care Places
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PlaceType {
    Hospital,
    Pharmacy,
    Clinic,
    #[default]
    #[serde(other)]
    Other,
}

/// Which kinds of places a search should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PlaceFilter {
    Hospital,
    Pharmacy,
    #[default]
    Both,
}

impl PlaceFilter {
    pub fn describe(&self) -> &'static str {
        match self {
            PlaceFilter::Hospital => "hospitals and clinics",
            PlaceFilter::Pharmacy => "pharmacies",
            PlaceFilter::Both => "hospitals, clinics and pharmacies",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Either a device position or a location typed by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum SearchLocation {
    Coordinates { lat: f64, lng: f64 },
    Manual { query: String },
}

/// A care facility returned by a place search. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarePlace {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub place_type: PlaceType,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub distance_km: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_ratings_total: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_open_now: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening_hours: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_maps_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    /// 0-100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_score: Option<f64>,
    #[serde(default)]
    pub is_top_recommendation: bool,
}

//=========================================================================================
// Contacts and Profiles
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Language {
    #[default]
    English,
    Hindi,
    Marathi,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "Hindi",
            Language::Marathi => "Marathi",
        }
    }
}

/// A family member or friend who can receive health updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub relation: String,
    pub phone: String,
    #[serde(default)]
    pub language: Language,
}

/// Background health information used to personalise prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HealthProfile {
    pub full_name: String,
    pub age_group: String,
    pub gender: String,
    pub conditions: Vec<String>,
    pub allergies: String,
    pub medications: String,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub blood_group: String,
    pub preferred_language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

//=========================================================================================
// Model Attachments
//=========================================================================================

/// Raw image bytes sent inline with a model request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(risk_level: RiskLevel) -> StructuredAIResponse {
        StructuredAIResponse {
            summary: "Likely a viral infection.".to_string(),
            risk_level,
            differential_diagnosis: vec![],
            recommended_actions: vec!["Rest".to_string()],
            suggested_medications: vec![SuggestedMedicine {
                name: "Paracetamol".to_string(),
                ..SuggestedMedicine::default()
            }],
            red_flags: vec![],
            confidence_score: 70.0,
        }
    }

    #[test]
    fn risk_gate_clears_medicines_only_for_emergencies() {
        let mut emergency = response(RiskLevel::Emergency);
        emergency.enforce_risk_gate();
        assert!(emergency.suggested_medications.is_empty());

        let mut low = response(RiskLevel::Low);
        low.enforce_risk_gate();
        assert_eq!(low.suggested_medications.len(), 1);
    }

    #[test]
    fn medicines_accept_bare_names_and_objects() {
        let parsed: Vec<SuggestedMedicine> = serde_json::from_str(
            r#"["Ibuprofen", {"name": "ORS", "form": "sachet", "dose": "1", "frequency": "daily", "timing": "after meals"}]"#,
        )
        .unwrap();
        assert_eq!(parsed[0].name, "Ibuprofen");
        assert!(parsed[0].form.is_empty());
        assert_eq!(parsed[1].timing, "after meals");
    }

    #[test]
    fn legacy_model_role_reads_as_assistant() {
        let role: Role = serde_json::from_str("\"model\"").unwrap();
        assert_eq!(role, Role::Assistant);
        assert_eq!(serde_json::to_string(&role).unwrap(), "\"assistant\"");
    }

    #[test]
    fn first_user_message_titles_the_session() {
        let mut session = ChatSession::new();
        session.push_message(ChatMessage::user(
            "I have had a sharp pain in my lower back since yesterday morning",
            vec![],
        ));
        assert_eq!(session.title.chars().count(), 40);
        assert!(session.title.starts_with("I have had a sharp pain"));

        session.push_message(ChatMessage::user("Second message", vec![]));
        assert!(session.title.starts_with("I have had"));
    }

    #[test]
    fn missing_risk_level_defaults_to_moderate() {
        let parsed: StructuredAIResponse = serde_json::from_str(
            r#"{"summary": "ok", "differentialDiagnosis": [], "recommendedActions": [], "confidenceScore": 40}"#,
        )
        .unwrap();
        assert_eq!(parsed.risk_level, RiskLevel::Moderate);
        assert!(parsed.suggested_medications.is_empty());
    }
}
