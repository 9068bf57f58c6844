//! services/api/src/gateway/prompts.rs
//!
//! Prompt text and response schemas for every model call.

use medscan_core::domain::{ChatSession, Language, PatientDetails, PlaceFilter, SearchLocation};
use serde_json::{json, Value};

pub const REPORT_SYSTEM_INSTRUCTION: &str = "You are a helpful, safety-conscious medical AI assistant. \
You provide information for educational and informational purposes only. You are not a doctor.";

pub const CHAT_SYSTEM_INSTRUCTION: &str = "You are an AI Clinical Assistant. Provide a helpful, accurate, \
and safe medical response. Return your answer strictly as a JSON object adhering to the schema. \
Do not provide specific prescription dosages. Do not diagnose definitively. \
If the situation may be an emergency, set riskLevel to \"emergency\" and leave suggestedMedications empty.";

pub const PLACES_SYSTEM_INSTRUCTION: &str = "You are a local healthcare directory assistant. \
You only list real, currently operating facilities and you never invent phone numbers or addresses.";

pub const MESSAGE_SYSTEM_INSTRUCTION: &str = "You write short, calm health updates that a patient can \
send to their family. Never add medical facts that are not in the summary.";

const REPORT_TEMPLATE: &str = r#"You are an expert medical consultant and senior radiologist AI. Analyze the provided patient details, clinical context, and optional medical imaging to produce a structured medical report.

--- PATIENT DETAILS ---
- Name: {name}
- Age: {age}
- Sex: {sex}
- Symptom Type: {symptom_type}
- Duration: {duration}
- Pain Severity: {pain_severity}

--- CLINICAL CONTEXT ---
{clinical_context}

--- REQUESTED OUTPUT FOCUS ---
{report_focus}
{health_context}
--- INSTRUCTIONS ---
1. If an image is provided, act as a radiologist and describe the findings in the clinical summary.
2. Classify the overall risk as "low", "moderate" or "emergency".
3. List possible causes ordered by likelihood, each with a short confidence such as "70%".
4. Suggest only over-the-counter medicines with form, dose, frequency and timing. If the risk is "emergency", suggest NO medicines.
5. Give home-care actions and red-flag warnings that mean the patient must see a doctor.
6. Use cautious medical language ("suggests", "is consistent with"). NEVER claim certainty.
7. End with a safety disclaimer."#;

const PLACES_TEMPLATE: &str = r#"Find {what} within {radius} km of {location}.

For each place return: name, type ("Hospital", "Pharmacy", "Clinic" or "Other"), address, distanceKm,
rating, userRatingsTotal, isOpenNow, openingHours, phoneNumber, googleMapsUrl, coordinates {lat, lng},
a one-sentence summary, and a priorityScore from 0 to 100 reflecting how suitable the place is for urgent care
(open now, distance, emergency services, rating). Mark the single best option with isTopRecommendation = true.
Return at most 10 places as {"places": [...]}."#;

const FAMILY_MESSAGE_TEMPLATE: &str = r#"Write a short WhatsApp message in {language} that {name} can send to their family.

Medical summary:
{summary}

Rules:
- Warm, reassuring, plain words; at most 4 sentences.
- Keep every medical fact from the summary, add none.
- Reply with the message text only, no quotes or explanations."#;

/// Substitutes `{key}` placeholders in a single pass, so text coming from the
/// user is never scanned for placeholders. Unknown braces are kept as written.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut filled = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        filled.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let hit = values.iter().find_map(|(key, value)| {
            let after = tail.strip_prefix(key)?.strip_prefix('}')?;
            Some((*value, after))
        });
        match hit {
            Some((value, after)) => {
                filled.push_str(value);
                rest = after;
            }
            None => {
                filled.push('{');
                rest = tail;
            }
        }
    }
    filled.push_str(rest);
    filled
}

pub fn report_prompt(
    patient: &PatientDetails,
    clinical_context: &str,
    health_context: Option<&str>,
) -> String {
    let name = if patient.name.trim().is_empty() {
        "Not provided"
    } else {
        patient.name.trim()
    };
    let age = match patient.age_years {
        Some(years) => format!("{} years ({})", years, patient.age_group.label()),
        None => patient.age_group.label().to_string(),
    };
    let clinical_context = if clinical_context.trim().is_empty() {
        "No additional context provided."
    } else {
        clinical_context.trim()
    };

    fill_template(
        REPORT_TEMPLATE,
        &[
            ("name", name),
            ("age", age.as_str()),
            ("sex", patient.sex.label()),
            ("symptom_type", patient.symptom_type.label()),
            ("duration", patient.duration.label()),
            ("pain_severity", patient.pain_severity.label()),
            ("report_focus", patient.report_focus.label()),
            ("health_context", health_context.unwrap_or_default()),
            ("clinical_context", clinical_context),
        ],
    )
}

/// Serializes the patient snapshot and transcript ahead of the new user query.
pub fn chat_prompt(session: &ChatSession, user_message: &str, health_context: Option<&str>) -> String {
    let profile = serde_json::to_string(&session.patient_summary).unwrap_or_default();
    let history = session
        .messages
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str().to_uppercase(), m.text))
        .collect::<Vec<_>>()
        .join("\n");

    let mut prompt = format!(
        "Patient Profile: {}\n\nHistory of present conversation:\n{}\n\nCurrent User Query: {}\n",
        profile, history, user_message
    );
    if let Some(context) = health_context {
        prompt.push_str(context);
    }
    prompt
}

pub fn places_prompt(location: &SearchLocation, filter: PlaceFilter, radius_km: f64) -> String {
    let location = match location {
        SearchLocation::Coordinates { lat, lng } => {
            format!("latitude {:.5}, longitude {:.5}", lat, lng)
        }
        SearchLocation::Manual { query } => format!("\"{}\"", query.trim()),
    };
    let radius = format!("{}", radius_km);
    fill_template(
        PLACES_TEMPLATE,
        &[
            ("what", filter.describe()),
            ("radius", radius.as_str()),
            ("location", location.as_str()),
        ],
    )
}

pub fn family_message_prompt(summary: &str, patient_name: &str, language: Language) -> String {
    fill_template(
        FAMILY_MESSAGE_TEMPLATE,
        &[
            ("language", language.as_str()),
            ("name", patient_name),
            ("summary", summary),
        ],
    )
}

//=========================================================================================
// Response Schemas
//=========================================================================================

fn string_array() -> Value {
    json!({ "type": "array", "items": { "type": "string" } })
}

fn medicine_array() -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "form": { "type": "string" },
                "dose": { "type": "string" },
                "frequency": { "type": "string" },
                "timing": { "type": "string" }
            },
            "required": ["name", "form", "dose", "frequency", "timing"]
        }
    })
}

fn risk_level() -> Value {
    json!({ "type": "string", "enum": ["low", "moderate", "emergency"] })
}

pub fn report_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "riskLevel": risk_level(),
            "clinicalSummary": { "type": "string" },
            "possibleCauses": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "confidence": { "type": "string" }
                    },
                    "required": ["name"]
                }
            },
            "suggestedMedicines": medicine_array(),
            "recommendedActions": string_array(),
            "redFlags": string_array(),
            "disclaimer": { "type": "string" }
        },
        "required": ["riskLevel", "clinicalSummary", "possibleCauses", "suggestedMedicines", "recommendedActions", "redFlags"]
    })
}

pub fn chat_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "summary": {
                "type": "string",
                "description": "Main conversational text response (human friendly, 2-3 sentences max)"
            },
            "riskLevel": risk_level(),
            "differentialDiagnosis": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "condition": { "type": "string" },
                        "reasoning": { "type": "string" },
                        "confidence": { "type": "number", "description": "0-100 score" }
                    },
                    "required": ["condition", "reasoning", "confidence"]
                }
            },
            "recommendedActions": string_array(),
            "suggestedMedications": medicine_array(),
            "redFlags": string_array(),
            "confidenceScore": { "type": "number", "description": "Overall confidence 0-100" }
        },
        "required": ["summary", "differentialDiagnosis", "recommendedActions", "confidenceScore"]
    })
}

pub fn places_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "places": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "type": { "type": "string", "enum": ["Hospital", "Pharmacy", "Clinic", "Other"] },
                        "address": { "type": "string" },
                        "distanceKm": { "type": "number" },
                        "rating": { "type": "number" },
                        "userRatingsTotal": { "type": "integer" },
                        "isOpenNow": { "type": "boolean" },
                        "openingHours": { "type": "string" },
                        "phoneNumber": { "type": "string" },
                        "googleMapsUrl": { "type": "string" },
                        "summary": { "type": "string" },
                        "coordinates": {
                            "type": "object",
                            "properties": { "lat": { "type": "number" }, "lng": { "type": "number" } }
                        },
                        "priorityScore": { "type": "number" },
                        "isTopRecommendation": { "type": "boolean" }
                    },
                    "required": ["name", "type", "address", "distanceKm"]
                }
            }
        },
        "required": ["places"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use medscan_core::domain::{ChatMessage, PainSeverity};

    #[test]
    fn report_prompt_fills_every_placeholder() {
        let patient = PatientDetails {
            name: "Meera".to_string(),
            age_years: Some(34),
            pain_severity: PainSeverity::Severe,
            ..PatientDetails::default()
        };
        let prompt = report_prompt(&patient, "Swollen ankle after a fall", Some("\nPROFILE BLOCK\n"));

        assert!(prompt.contains("Name: Meera"));
        assert!(prompt.contains("34 years (Adult (19-64))"));
        assert!(prompt.contains("7-8 - Severe"));
        assert!(prompt.contains("Swollen ankle after a fall"));
        assert!(prompt.contains("PROFILE BLOCK"));
        assert!(!prompt.contains('{'));
    }

    #[test]
    fn placeholders_in_user_text_are_left_alone() {
        let patient = PatientDetails {
            name: "{clinical_context}".to_string(),
            ..PatientDetails::default()
        };
        let prompt = report_prompt(&patient, "Dizzy since {duration}", Some("Allergies: {name}"));

        assert!(prompt.contains("- Name: {clinical_context}\n"));
        assert_eq!(prompt.matches("Dizzy since {duration}").count(), 1);
        assert!(prompt.contains("Allergies: {name}"));
    }

    #[test]
    fn places_template_keeps_its_literal_braces() {
        let prompt = places_prompt(
            &SearchLocation::Coordinates { lat: 18.5, lng: 73.8 },
            PlaceFilter::Both,
            3.0,
        );
        assert!(prompt.contains("coordinates {lat, lng}"));
        assert!(prompt.contains(r#"{"places": [...]}"#));
    }

    #[test]
    fn chat_prompt_lists_history_in_order() {
        let mut session = ChatSession::new();
        session.push_message(ChatMessage::user("My throat hurts", vec![]));
        let prompt = chat_prompt(&session, "Now I also have a fever", None);

        assert!(prompt.contains("USER: My throat hurts"));
        assert!(prompt.ends_with("Current User Query: Now I also have a fever\n"));
        assert!(prompt.contains("\"painSeverity\":\"mild\""));
    }

    #[test]
    fn places_prompt_describes_location_and_radius() {
        let prompt = places_prompt(
            &SearchLocation::Manual { query: " Pune station ".to_string() },
            PlaceFilter::Pharmacy,
            5.0,
        );
        assert!(prompt.starts_with("Find pharmacies within 5 km of \"Pune station\"."));
    }
}
