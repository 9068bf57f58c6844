//! crates/medscan_core/src/validation.rs
//!
//! Checks applied to user input before any request is issued.

use crate::domain::Contact;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Name and Phone Number are required.")]
    ContactIncomplete,
    #[error("Type a message or attach an image.")]
    EmptyMessage,
    #[error("Describe the symptoms or attach an image before generating a report.")]
    EmptyReportRequest,
    #[error("Enter a location or allow location access.")]
    MissingLocation,
    #[error("Select at least one contact.")]
    NoRecipients,
}

pub const DEFAULT_RELATION: &str = "Family";

/// Trims the contact's fields and fills in the default relation.
pub fn normalize_contact(mut contact: Contact) -> Result<Contact, ValidationError> {
    contact.name = contact.name.trim().to_string();
    contact.phone = contact.phone.trim().to_string();
    if contact.name.is_empty() || contact.phone.is_empty() {
        return Err(ValidationError::ContactIncomplete);
    }
    contact.relation = match contact.relation.trim() {
        "" => DEFAULT_RELATION.to_string(),
        relation => relation.to_string(),
    };
    Ok(contact)
}

pub fn validate_chat_input(text: &str, has_image: bool) -> Result<(), ValidationError> {
    if text.trim().is_empty() && !has_image {
        return Err(ValidationError::EmptyMessage);
    }
    Ok(())
}

pub fn validate_report_input(clinical_context: &str, has_image: bool) -> Result<(), ValidationError> {
    if clinical_context.trim().is_empty() && !has_image {
        return Err(ValidationError::EmptyReportRequest);
    }
    Ok(())
}
