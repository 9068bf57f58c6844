//! services/api/src/web/family.rs
//!
//! Family updates: one generated message per contact language, plus ready-made
//! WhatsApp, SMS and phone links for each recipient.

use crate::gateway::AiGateway;
use medscan_core::domain::{Contact, Language};
use serde::Serialize;
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

/// Sent when the user leaves the summary blank.
pub const DEFAULT_FAMILY_SUMMARY: &str = "I am feeling unwell and wanted to let you know.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ShareLinks {
    pub whatsapp: String,
    pub sms: String,
    pub tel: String,
}

/// The message prepared for one contact.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMessage {
    pub contact_id: Uuid,
    pub name: String,
    pub relation: String,
    #[schema(value_type = String)]
    pub language: Language,
    pub message: String,
    pub links: ShareLinks,
}

/// Keeps the digits and a leading plus sign.
pub fn dialable_phone(phone: &str) -> String {
    let trimmed = phone.trim();
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if trimmed.starts_with('+') {
        format!("+{}", digits)
    } else {
        digits
    }
}

/// Percent-encodes everything except the URI-component unreserved set.
pub fn encode_uri_component(text: &str) -> String {
    let mut encoded = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => encoded.push(byte as char),
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

pub fn share_links(phone: &str, message: &str) -> ShareLinks {
    let phone = dialable_phone(phone);
    let text = encode_uri_component(message);
    ShareLinks {
        whatsapp: format!("https://wa.me/{}?text={}", phone.trim_start_matches('+'), text),
        sms: format!("sms:{}?body={}", phone, text),
        tel: format!("tel:{}", phone),
    }
}

/// Generates one message per distinct language and fans it out to the contacts.
pub async fn compose_family_messages(
    gateway: &AiGateway,
    summary: &str,
    patient_name: &str,
    contacts: &[Contact],
) -> Vec<FamilyMessage> {
    let summary = match summary.trim() {
        "" => DEFAULT_FAMILY_SUMMARY,
        summary => summary,
    };
    let mut by_language: HashMap<Language, String> = HashMap::new();
    for contact in contacts {
        if !by_language.contains_key(&contact.language) {
            let message = gateway
                .translate_family_message(summary, patient_name, contact.language)
                .await;
            by_language.insert(contact.language, message);
        }
    }

    contacts
        .iter()
        .filter_map(|contact| {
            let message = by_language.get(&contact.language)?.clone();
            Some(FamilyMessage {
                contact_id: contact.id,
                name: contact.name.clone(),
                relation: contact.relation.clone(),
                language: contact.language,
                links: share_links(&contact.phone, &message),
                message,
            })
        })
        .collect()
}
