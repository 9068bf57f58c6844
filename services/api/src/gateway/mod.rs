//! services/api/src/gateway/mod.rs
//!
//! The AI Gateway: turns domain requests into prompts, calls the hosted model
//! once, and reconciles the reply into typed results.
//!
//! Report generation is a hard stop and surfaces its failure. Chat, place search
//! and family messages always hand back something usable.

pub mod chat;
pub mod family;
pub mod parse;
pub mod places;
pub mod prompts;
pub mod report;

pub use chat::{fallback_chat_response, FALLBACK_CHAT_SUMMARY};
pub use family::fallback_family_message;
pub use report::ReportRequest;

use medscan_core::ports::GenerativeModel;
use std::sync::Arc;

/// User-facing failures of report generation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("Access denied. The API key may be invalid or lacks permission for this model.")]
    AccessDenied,
    #[error("Failed to analyze data. Please check your connection and try again.")]
    ReportUnavailable,
}

/// Stateless: each call carries its own prompt and yields its own independent result.
#[derive(Clone)]
pub struct AiGateway {
    report_model: Arc<dyn GenerativeModel>,
    chat_model: Arc<dyn GenerativeModel>,
    places_model: Arc<dyn GenerativeModel>,
    message_model: Arc<dyn GenerativeModel>,
}

impl AiGateway {
    pub fn new(
        report_model: Arc<dyn GenerativeModel>,
        chat_model: Arc<dyn GenerativeModel>,
        places_model: Arc<dyn GenerativeModel>,
        message_model: Arc<dyn GenerativeModel>,
    ) -> Self {
        Self {
            report_model,
            chat_model,
            places_model,
            message_model,
        }
    }

    /// Routes every operation to the same model.
    pub fn with_model(model: Arc<dyn GenerativeModel>) -> Self {
        Self::new(model.clone(), model.clone(), model.clone(), model)
    }
}
