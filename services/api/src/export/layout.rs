//! services/api/src/export/layout.rs
//!
//! The fixed seven-section report layout, as plain data. Rendering to PDF is a
//! separate step so the content can be checked without parsing PDF bytes.

use medscan_core::domain::{ChatSession, ReportPayload, RiskLevel};

pub const REPORT_TITLE: &str = "Medical Summary Report";
pub const TRANSCRIPT_TITLE: &str = "Consultation Transcript";

pub const EMERGENCY_MEDICINE_NOTICE: &str =
    "Medicines omitted due to emergency risk. Please consult a doctor immediately.";
pub const NO_MEDICINES_TEXT: &str = "No specific medicines suggested for this condition.";
pub const NO_CAUSES_TEXT: &str = "No specific causes identified.";
pub const NO_ACTIONS_TEXT: &str = "Rest and hydration recommended.";
pub const NO_RED_FLAGS_TEXT: &str = "If symptoms persist or worsen, consult a doctor.";

const TRANSCRIPT_PREVIEW_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// A labelled value such as "Name: Asha".
    Field { label: String, value: String },
    Paragraph(String),
    Bullet(String),
    /// A bullet printed in the warning colour.
    Warning(String),
    Table {
        header: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    /// Italic, highlighted text that replaces a section's normal content.
    Notice(String),
    /// Italic placeholder for an empty section.
    Placeholder(String),
    /// Small print.
    FinePrint(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutSection {
    pub heading: String,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportLayout {
    pub title: String,
    pub subtitle: String,
    pub sections: Vec<LayoutSection>,
}

impl ReportLayout {
    pub fn from_payload(payload: &ReportPayload) -> Self {
        let patient = &payload.patient;
        let name = if patient.name.trim().is_empty() {
            "Anonymous".to_string()
        } else {
            patient.name.clone()
        };
        let age = patient
            .age_years
            .map(|years| format!("{} years", years))
            .unwrap_or_else(|| "Not specified".to_string());
        let sex = patient
            .sex
            .map(|sex| sex.label().to_string())
            .unwrap_or_else(|| "Not specified".to_string());

        let patient_info = LayoutSection {
            heading: "1. Patient Information".to_string(),
            blocks: vec![
                field("Name", name),
                field("Age", age),
                field("Sex", sex),
                field("Risk Level", payload.risk_level.label().to_uppercase()),
                field("Report ID", payload.report_id.clone()),
            ],
        };

        let symptoms = LayoutSection {
            heading: "2. Reported Symptoms".to_string(),
            blocks: vec![Block::Paragraph(payload.clinical_summary.clone())],
        };

        let causes = LayoutSection {
            heading: "3. Possible Causes".to_string(),
            blocks: if payload.possible_causes.is_empty() {
                vec![Block::Placeholder(NO_CAUSES_TEXT.to_string())]
            } else {
                payload
                    .possible_causes
                    .iter()
                    .map(|cause| match &cause.confidence {
                        Some(confidence) => Block::Bullet(format!("{} - {}", cause.name, confidence)),
                        None => Block::Bullet(cause.name.clone()),
                    })
                    .collect()
            },
        };

        let medicines = LayoutSection {
            heading: "4. Suggested Medicines (OTC Only)".to_string(),
            blocks: if payload.risk_level == RiskLevel::Emergency {
                vec![Block::Notice(EMERGENCY_MEDICINE_NOTICE.to_string())]
            } else if payload.suggested_medicines.is_empty() {
                vec![Block::Placeholder(NO_MEDICINES_TEXT.to_string())]
            } else {
                vec![Block::Table {
                    header: vec!["Medicine".to_string(), "Dosage".to_string(), "Timing".to_string()],
                    rows: payload
                        .suggested_medicines
                        .iter()
                        .map(|med| {
                            vec![
                                join_non_empty(&med.name, &med.form, " (", ")"),
                                join_non_empty(&med.dose, &med.frequency, " - ", ""),
                                med.timing.clone(),
                            ]
                        })
                        .collect(),
                }]
            },
        };

        let home_care = LayoutSection {
            heading: "5. Home Care Advice".to_string(),
            blocks: bullets_or(&payload.recommended_actions, NO_ACTIONS_TEXT, Block::Bullet),
        };

        let red_flags = LayoutSection {
            heading: "6. When to See a Doctor".to_string(),
            blocks: bullets_or(&payload.red_flags, NO_RED_FLAGS_TEXT, Block::Warning),
        };

        let disclaimer = LayoutSection {
            heading: "7. Medical Disclaimer".to_string(),
            blocks: vec![
                Block::FinePrint(payload.disclaimer.clone()),
                Block::FinePrint(format!("Generated by {}", payload.generated_by)),
            ],
        };

        Self {
            title: REPORT_TITLE.to_string(),
            subtitle: format!("Generated: {}", payload.generated_at.format("%d %b %Y")),
            sections: vec![
                patient_info,
                symptoms,
                causes,
                medicines,
                home_care,
                red_flags,
                disclaimer,
            ],
        }
    }

    /// A plain transcript for sessions that have no structured response to report on.
    pub fn transcript(session: &ChatSession) -> Self {
        let blocks = if session.messages.is_empty() {
            vec![Block::Placeholder("No messages in this consultation yet.".to_string())]
        } else {
            session
                .messages
                .iter()
                .map(|m| {
                    let preview: String = m.text.chars().take(TRANSCRIPT_PREVIEW_CHARS).collect();
                    let ellipsis = if m.text.chars().count() > TRANSCRIPT_PREVIEW_CHARS {
                        "..."
                    } else {
                        ""
                    };
                    Block::Paragraph(format!(
                        "{} ({}): {}{}",
                        m.role.as_str().to_uppercase(),
                        m.timestamp.format("%H:%M:%S"),
                        preview,
                        ellipsis
                    ))
                })
                .collect()
        };

        Self {
            title: TRANSCRIPT_TITLE.to_string(),
            subtitle: format!("Started: {}", session.start_time.format("%d %b %Y %H:%M")),
            sections: vec![LayoutSection {
                heading: session.title.clone(),
                blocks,
            }],
        }
    }

    pub fn section(&self, heading_prefix: &str) -> Option<&LayoutSection> {
        self.sections
            .iter()
            .find(|s| s.heading.starts_with(heading_prefix))
    }
}

fn field(label: &str, value: String) -> Block {
    Block::Field {
        label: label.to_string(),
        value,
    }
}

fn bullets_or(items: &[String], placeholder: &str, make: fn(String) -> Block) -> Vec<Block> {
    if items.is_empty() {
        vec![Block::Placeholder(placeholder.to_string())]
    } else {
        items.iter().cloned().map(make).collect()
    }
}

fn join_non_empty(first: &str, second: &str, open: &str, close: &str) -> String {
    if second.trim().is_empty() {
        first.to_string()
    } else {
        format!("{}{}{}{}", first, open, second, close)
    }
}

/// Greedy word wrap to at most `max_chars` characters per line.
/// Words longer than a line are split.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_chars {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                lines.push(word.drain(..max_chars).collect());
            }
            let word: String = word.into_iter().collect();
            if word.is_empty() {
                continue;
            }
            let needed = if current.is_empty() {
                word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };
            if needed > max_chars && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}
