//! crates/medscan_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like storage or AI vendors.

use crate::domain::{HealthProfile, InlineImage};
use async_trait::async_trait;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Access denied: {0}")]
    AccessDenied(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// String key-value storage, the server-side stand-in for browser local storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> PortResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> PortResult<()>;

    fn remove(&self, key: &str) -> PortResult<()>;
}

/// A single request to the hosted generative model.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system_instruction: String,
    pub prompt: String,
    pub image: Option<InlineImage>,
    /// JSON schema the reply must follow. `None` asks for free text.
    pub response_schema: Option<serde_json::Value>,
    pub temperature: f32,
}

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Sends one request and returns the raw text of the reply.
    async fn generate(&self, request: ModelRequest) -> PortResult<String>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get_profile(&self, user_id: Uuid) -> PortResult<Option<HealthProfile>>;

    /// Inserts the profile or replaces the existing row for `user_id`.
    async fn upsert_profile(&self, user_id: Uuid, profile: &HealthProfile) -> PortResult<()>;
}
