pub mod domain;
pub mod ports;
pub mod store;
pub mod validation;

pub use domain::{
    CarePlace, ChatMessage, ChatSession, Contact, HealthProfile, InlineImage, PatientDetails,
    ReportPayload, RiskLevel, Role, StructuredAIResponse,
};
pub use ports::{
    GenerativeModel, KeyValueStore, ModelRequest, PortError, PortResult, ProfileRepository,
};
pub use store::{ContactBook, InMemoryStore, SessionStore};
pub use validation::ValidationError;
