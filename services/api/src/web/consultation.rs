//! services/api/src/web/consultation.rs
//!
//! One chat turn end to end: validate, record the user message, ask the
//! gateway, record the answer, persist.

use crate::profile::Identity;
use crate::web::state::AppState;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use medscan_core::domain::{ChatMessage, ChatSession, InlineImage, PatientDetails, Role};
use medscan_core::ports::PortError;
use medscan_core::validation::{validate_chat_input, ValidationError};
use tracing::info;
use uuid::Uuid;

const IMAGE_ONLY_QUERY: &str = "Please analyze the attached image.";

/// A user's chat input as received from the client.
#[derive(Debug, Clone, Default)]
pub struct ChatTurn {
    pub text: String,
    pub image: Option<InlineImage>,
    /// Replaces the session's patient snapshot before the turn runs.
    pub patient: Option<PatientDetails>,
}

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] PortError),
    #[error("Session {0} was deleted before the reply arrived")]
    SessionDeleted(Uuid),
}

fn attachment_reference(image: &InlineImage) -> String {
    format!(
        "data:{};base64,{}",
        image.mime_type,
        BASE64_STANDARD.encode(&image.data)
    )
}

/// Runs one turn against the caller's stored session, or a fresh one under
/// `session_id` when nothing is stored yet. The user message is saved before
/// the model is called, so it survives even if the reply never arrives. The
/// reply is appended to whatever is stored by then, and dropped if the session
/// was deleted in the meantime.
pub async fn run_chat_turn(
    state: &AppState,
    identity: Identity,
    session_id: Uuid,
    turn: ChatTurn,
) -> Result<ChatSession, TurnError> {
    validate_chat_input(&turn.text, turn.image.is_some())?;
    let sessions = state.sessions_for(identity);

    let text = turn.text.trim();
    let attachments = turn.image.iter().map(attachment_reference).collect();
    // The model sees the transcript as it stood before this query.
    let mut history = None;
    sessions.update_or_create(session_id, |session| {
        if let Some(patient) = turn.patient {
            session.patient_summary = patient;
        }
        history = Some(session.clone());
        session.push_message(ChatMessage::user(text, attachments));
    })?;
    let history = history.unwrap_or_else(ChatSession::new);

    let query = if text.is_empty() { IMAGE_ONLY_QUERY } else { text };
    let health_context = state.profiles.context_block(identity).await;
    let response = state
        .gateway
        .chat(&history, query, turn.image, health_context.as_deref())
        .await;

    let Some(session) = sessions.append_messages(session_id, vec![ChatMessage::assistant(response)])?
    else {
        info!("Session {} was deleted mid-turn, dropping the reply", session_id);
        return Err(TurnError::SessionDeleted(session_id));
    };
    info!(
        "Chat turn complete for session {} ({} messages)",
        session.id,
        session.messages.len()
    );
    Ok(session)
}

/// The shareable update built from the latest assistant message.
pub fn share_summary(session: &ChatSession) -> Option<String> {
    let last = session
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant)?;
    Some(format!(
        "Update on my health:\nI consulted the Clinical AI.\nSummary: \"{}\"\n\nI will keep you posted.",
        last.text
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::ScriptedModel;
    use crate::gateway::{AiGateway, FALLBACK_CHAT_SUMMARY};
    use async_trait::async_trait;
    use medscan_core::ports::{GenerativeModel, KeyValueStore, ModelRequest, PortResult};
    use medscan_core::store::{InMemoryStore, SessionStore};
    use std::sync::Arc;

    /// Deletes the session while the reply is being generated.
    struct DeletingModel {
        sessions: SessionStore,
        target: Uuid,
    }

    #[async_trait]
    impl GenerativeModel for DeletingModel {
        async fn generate(&self, _request: ModelRequest) -> PortResult<String> {
            self.sessions.delete_session(self.target)?;
            Ok(r#"{"summary":"Too late.","riskLevel":"low","differentialDiagnosis":[],"recommendedActions":[],"confidenceScore":40}"#.to_string())
        }
    }

    fn state_with(model: Arc<ScriptedModel>) -> AppState {
        AppState::new(
            Arc::new(InMemoryStore::new()),
            None,
            AiGateway::with_model(model),
        )
    }

    fn turn(text: &str) -> ChatTurn {
        ChatTurn {
            text: text.to_string(),
            ..ChatTurn::default()
        }
    }

    #[tokio::test]
    async fn model_outage_still_completes_the_turn() {
        let state = state_with(Arc::new(ScriptedModel::failing()));
        let session_id = state.sessions.create_session().id;

        let session = run_chat_turn(&state, Identity::Guest, session_id, turn("I have a fever and headache"))
            .await
            .unwrap();

        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.title, "I have a fever and headache");
        let reply = &session.messages[1];
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.text, FALLBACK_CHAT_SUMMARY);
        assert_eq!(reply.structured_response.as_ref().unwrap().confidence_score, 0.0);
        assert_eq!(state.sessions.get_session(session_id), Some(session));
    }

    #[tokio::test]
    async fn empty_input_is_rejected_before_anything_is_saved() {
        let model = Arc::new(ScriptedModel::failing());
        let state = state_with(model.clone());
        let session_id = Uuid::new_v4();

        let result = run_chat_turn(&state, Identity::Guest, session_id, turn("   ")).await;

        assert!(matches!(result, Err(TurnError::Invalid(ValidationError::EmptyMessage))));
        assert!(state.sessions.get_session(session_id).is_none());
        assert!(model.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn prompt_history_excludes_the_current_query() {
        let model = Arc::new(ScriptedModel::replying(
            r#"{"summary":"Rest and fluids.","riskLevel":"low","differentialDiagnosis":[],"recommendedActions":[],"confidenceScore":55}"#,
        ));
        let state = state_with(model.clone());
        let session_id = Uuid::new_v4();

        run_chat_turn(&state, Identity::Guest, session_id, turn("Sore throat"))
            .await
            .unwrap();
        let prompt = model.last_request().prompt;

        assert!(!prompt.contains("USER: Sore throat"));
        assert!(prompt.contains("Current User Query: Sore throat"));

        run_chat_turn(&state, Identity::Guest, session_id, turn("Now a cough too"))
            .await
            .unwrap();
        let prompt = model.last_request().prompt;

        assert!(prompt.contains("USER: Sore throat"));
        assert!(prompt.contains("ASSISTANT: Rest and fluids."));
    }

    #[tokio::test]
    async fn image_only_turn_records_an_attachment() {
        let state = state_with(Arc::new(ScriptedModel::failing()));
        let image = InlineImage {
            mime_type: "image/png".to_string(),
            data: vec![1, 2, 3],
        };

        let session = run_chat_turn(
            &state,
            Identity::Guest,
            Uuid::new_v4(),
            ChatTurn {
                image: Some(image),
                ..ChatTurn::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(session.messages[0].attachments, vec!["data:image/png;base64,AQID"]);
    }

    #[tokio::test]
    async fn reply_for_a_deleted_session_is_dropped() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
        let session_id = Uuid::new_v4();
        let model = DeletingModel {
            sessions: SessionStore::new(kv.clone()),
            target: session_id,
        };
        let state = AppState::new(kv, None, AiGateway::with_model(Arc::new(model)));

        let result = run_chat_turn(&state, Identity::Guest, session_id, turn("Chest tightness")).await;

        assert!(matches!(result, Err(TurnError::SessionDeleted(id)) if id == session_id));
        assert!(state.sessions.list_sessions().is_empty());
        assert_eq!(state.sessions.active_session_id(), None);
    }

    #[tokio::test]
    async fn signed_in_turns_stay_out_of_the_guest_history() {
        let state = state_with(Arc::new(ScriptedModel::failing()));
        let user = Identity::User(Uuid::new_v4());
        let session_id = Uuid::new_v4();

        run_chat_turn(&state, user, session_id, turn("Rash on my arm"))
            .await
            .unwrap();

        assert!(state.sessions.get_session(session_id).is_none());
        assert_eq!(state.sessions_for(user).list_sessions().len(), 1);
    }

    #[test]
    fn share_summary_quotes_the_latest_reply() {
        let mut session = ChatSession::new();
        assert!(share_summary(&session).is_none());

        session.push_message(ChatMessage::user("hi", vec![]));
        let mut reply = crate::gateway::fallback_chat_response();
        reply.summary = "Likely a cold.".to_string();
        session.push_message(ChatMessage::assistant(reply));

        assert_eq!(
            share_summary(&session).unwrap(),
            "Update on my health:\nI consulted the Clinical AI.\nSummary: \"Likely a cold.\"\n\nI will keep you posted."
        );
    }
}
