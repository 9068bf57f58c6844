//! services/api/src/gateway/chat.rs
//!
//! One structured turn of the clinical chat.

use super::parse::parse_json;
use super::prompts::{chat_prompt, chat_schema, CHAT_SYSTEM_INSTRUCTION};
use super::AiGateway;
use medscan_core::domain::{ChatSession, InlineImage, RiskLevel, StructuredAIResponse};
use medscan_core::ports::ModelRequest;
use tracing::{info, warn};

pub const FALLBACK_CHAT_SUMMARY: &str = "I'm having trouble connecting to the medical knowledge base \
right now. Please try again or seek professional care if urgent.";

const CHAT_TEMPERATURE: f32 = 0.2;

/// The safe reply used whenever a chat turn cannot be completed.
pub fn fallback_chat_response() -> StructuredAIResponse {
    StructuredAIResponse {
        summary: FALLBACK_CHAT_SUMMARY.to_string(),
        risk_level: RiskLevel::Moderate,
        differential_diagnosis: Vec::new(),
        recommended_actions: vec!["Consult a doctor".to_string(), "Try again later".to_string()],
        suggested_medications: Vec::new(),
        red_flags: Vec::new(),
        confidence_score: 0.0,
    }
}

fn reconcile(mut response: StructuredAIResponse) -> Option<StructuredAIResponse> {
    if response.summary.trim().is_empty() {
        return None;
    }
    response.confidence_score = response.confidence_score.clamp(0.0, 100.0);
    for differential in &mut response.differential_diagnosis {
        differential.confidence = differential.confidence.clamp(0.0, 100.0);
    }
    response.enforce_risk_gate();
    Some(response)
}

impl AiGateway {
    /// Answers a chat turn. Never fails: outages and unreadable replies yield
    /// [`fallback_chat_response`].
    pub async fn chat(
        &self,
        session: &ChatSession,
        user_message: &str,
        image: Option<InlineImage>,
        health_context: Option<&str>,
    ) -> StructuredAIResponse {
        let request = ModelRequest {
            system_instruction: CHAT_SYSTEM_INSTRUCTION.to_string(),
            prompt: chat_prompt(session, user_message, health_context),
            image,
            response_schema: Some(chat_schema()),
            temperature: CHAT_TEMPERATURE,
        };

        let raw = match self.chat_model.generate(request).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Chat model unavailable for session {}: {}", session.id, e);
                return fallback_chat_response();
            }
        };

        match parse_json::<StructuredAIResponse>(&raw).ok().and_then(reconcile) {
            Some(response) => {
                info!(
                    "Chat turn answered for session {} (risk: {}, confidence: {})",
                    session.id,
                    response.risk_level.label(),
                    response.confidence_score
                );
                response
            }
            None => {
                warn!("Chat reply for session {} was not a usable structured response.", session.id);
                fallback_chat_response()
            }
        }
    }
}
