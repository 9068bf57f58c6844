//! services/api/src/gateway/family.rs
//!
//! Family update messages in the recipient's language.

use super::prompts::{family_message_prompt, MESSAGE_SYSTEM_INSTRUCTION};
use super::AiGateway;
use medscan_core::domain::Language;
use medscan_core::ports::ModelRequest;
use tracing::warn;

const MESSAGE_TEMPERATURE: f32 = 0.5;

/// The message shared when translation is unavailable. Always embeds the raw summary.
pub fn fallback_family_message(summary: &str, patient_name: &str) -> String {
    format!(
        "Hi, this is an update about {}. {} I will keep you posted.",
        patient_name,
        summary.trim()
    )
}

impl AiGateway {
    /// Rewrites the summary as a family update in `language`. Never fails.
    pub async fn translate_family_message(
        &self,
        summary: &str,
        patient_name: &str,
        language: Language,
    ) -> String {
        let request = ModelRequest {
            system_instruction: MESSAGE_SYSTEM_INSTRUCTION.to_string(),
            prompt: family_message_prompt(summary, patient_name, language),
            image: None,
            response_schema: None,
            temperature: MESSAGE_TEMPERATURE,
        };

        match self.message_model.generate(request).await {
            Ok(text) => {
                let text = text.trim().trim_matches('"').trim();
                if text.is_empty() {
                    fallback_family_message(summary, patient_name)
                } else {
                    text.to_string()
                }
            }
            Err(e) => {
                warn!("Family message generation failed ({}): {}", language.as_str(), e);
                fallback_family_message(summary, patient_name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::ScriptedModel;
    use std::sync::Arc;

    #[tokio::test]
    async fn outage_falls_back_to_the_template() {
        let gateway = AiGateway::with_model(Arc::new(ScriptedModel::failing()));
        let message = gateway
            .translate_family_message("Mild fever, resting at home.", "Anil", Language::Hindi)
            .await;
        assert_eq!(
            message,
            "Hi, this is an update about Anil. Mild fever, resting at home. I will keep you posted."
        );
    }

    #[tokio::test]
    async fn model_text_is_trimmed_of_quotes() {
        let model = Arc::new(ScriptedModel::replying("  \"नमस्ते, मैं ठीक हूँ।\"\n"));
        let gateway = AiGateway::with_model(model.clone());
        let message = gateway
            .translate_family_message("I am fine.", "Anil", Language::Hindi)
            .await;
        assert_eq!(message, "नमस्ते, मैं ठीक हूँ।");
        assert!(model.last_request().prompt.contains("in Hindi"));
        assert!(model.last_request().response_schema.is_none());
    }
}
