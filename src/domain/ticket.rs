use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::rich_text::{RichTextNode, is_rich_text};
use crate::error::{AppError, AppResult};

/// Custom field most Jira Cloud sites use for acceptance criteria.
pub const DEFAULT_ACCEPTANCE_FIELD: &str = "customfield_10014";

const DEFAULT_PRIORITY: &str = "Medium";
const DEFAULT_STATUS: &str = "Unknown";

static TICKET_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]+-[0-9]+$").expect("ticket id pattern"));
static AC_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)acceptance criteria:?\s*").expect("AC label pattern"));
static AC_SHORT_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bac:\s*").expect("AC short label pattern"));
static GIVEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bgiven\b").expect("given pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub key: String,
    pub summary: String,
    pub description: String,
    pub priority: String,
    pub status: String,
    pub assignee: Option<String>,
    pub labels: BTreeSet<String>,
    pub acceptance_criteria: String,
}

pub fn sanitize_ticket_id(input: &str) -> String {
    input.trim().to_uppercase()
}

pub fn is_valid_ticket_id(id: &str) -> bool {
    TICKET_ID.is_match(id)
}

pub fn parse_ticket_id(input: &str) -> AppResult<String> {
    let id = sanitize_ticket_id(input);
    if is_valid_ticket_id(&id) {
        Ok(id)
    } else {
        Err(AppError::InvalidTicketId(input.trim().to_string()))
    }
}

/// Only a missing `key` is an error; every other field has a default.
pub fn normalize(payload: &Value, acceptance_field: &str) -> AppResult<Ticket> {
    let key = payload
        .get("key")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| AppError::MalformedTicket("payload has no ticket key".to_string()))?;

    let null = Value::Null;
    let fields = payload.get("fields").unwrap_or(&null);
    let raw_description = fields.get("description").unwrap_or(&null);
    let description = flatten_description(raw_description);

    let acceptance_criteria = match fields.get(acceptance_field) {
        Some(value) if is_present(value) => flatten_description(value),
        _ => extract_acceptance_criteria(&description),
    };

    let labels = fields
        .get("labels")
        .and_then(Value::as_array)
        .map(|labels| {
            labels
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(Ticket {
        key: key.to_string(),
        summary: string_at(fields, &["summary"]).unwrap_or_default(),
        description,
        priority: string_at(fields, &["priority", "name"])
            .unwrap_or_else(|| DEFAULT_PRIORITY.to_string()),
        status: string_at(fields, &["status", "name"])
            .unwrap_or_else(|| DEFAULT_STATUS.to_string()),
        assignee: string_at(fields, &["assignee", "displayName"]),
        labels,
        acceptance_criteria,
    })
}

/// Non-string, non-document values are kept as their JSON text.
pub fn flatten_description(value: &Value) -> String {
    match value {
        Value::Null | Value::Bool(false) => String::new(),
        Value::String(text) => text.clone(),
        value if is_rich_text(value) => RichTextNode::from_value(value).flatten(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Labelled matches stop at a blank line or at a new line starting with a
/// letter; a `Given` block stops at a blank line.
pub fn extract_acceptance_criteria(text: &str) -> String {
    for label in [&*AC_LABEL, &*AC_SHORT_LABEL] {
        if let Some(found) = label.find(text) {
            return labelled_section(&text[found.end()..]).trim().to_string();
        }
    }

    if let Some(found) = GIVEN.find(text) {
        let rest = &text[found.start()..];
        let end = rest.find("\n\n").unwrap_or(rest.len());
        return rest[..end].trim().to_string();
    }

    String::new()
}

fn labelled_section(rest: &str) -> &str {
    let bytes = rest.as_bytes();
    let mut idx = 0;
    while let Some(offset) = rest[idx..].find('\n') {
        let newline = idx + offset;
        match bytes.get(newline + 1) {
            Some(b'\n') => return &rest[..newline],
            Some(next) if next.is_ascii_alphabetic() => return &rest[..newline],
            _ => idx = newline + 1,
        }
    }
    rest
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Number(_) => true,
    }
}

fn string_at(value: &Value, path: &[&str]) -> Option<String> {
    path.iter()
        .try_fold(value, |current, segment| current.get(segment))
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn payload(fields: Value) -> Value {
        json!({"key": "QA-7", "fields": fields})
    }

    #[test]
    fn normalizes_full_payload() {
        let raw = payload(json!({
            "summary": "Password reset",
            "description": "Users can reset their password.",
            "priority": {"name": "High"},
            "status": {"name": "In Progress"},
            "assignee": {"displayName": "Sam Doe"},
            "labels": ["auth", "web", "auth"],
            "customfield_10014": "Reset email arrives within a minute"
        }));

        let ticket = normalize(&raw, DEFAULT_ACCEPTANCE_FIELD).unwrap();
        assert_eq!(ticket.key, "QA-7");
        assert_eq!(ticket.summary, "Password reset");
        assert_eq!(ticket.priority, "High");
        assert_eq!(ticket.status, "In Progress");
        assert_eq!(ticket.assignee.as_deref(), Some("Sam Doe"));
        assert_eq!(ticket.labels.len(), 2);
        assert_eq!(ticket.acceptance_criteria, "Reset email arrives within a minute");
    }

    #[test]
    fn missing_optional_fields_use_defaults() {
        let ticket = normalize(&json!({"key": "QA-1"}), DEFAULT_ACCEPTANCE_FIELD).unwrap();
        assert_eq!(ticket.summary, "");
        assert_eq!(ticket.description, "");
        assert_eq!(ticket.priority, "Medium");
        assert_eq!(ticket.status, "Unknown");
        assert_eq!(ticket.assignee, None);
        assert!(ticket.labels.is_empty());
        assert_eq!(ticket.acceptance_criteria, "");
    }

    #[test]
    fn missing_key_is_malformed() {
        let err = normalize(&json!({"fields": {"summary": "x"}}), DEFAULT_ACCEPTANCE_FIELD)
            .unwrap_err();
        assert!(matches!(err, AppError::MalformedTicket(_)));
    }

    #[test]
    fn flattens_rich_text_description() {
        let raw = payload(json!({
            "description": {
                "type": "doc",
                "version": 1,
                "content": [{"type": "paragraph", "content": [
                    {"type": "text", "text": "Acceptance Criteria: "},
                    {"type": "text", "text": "user sees a banner"}
                ]}]
            }
        }));

        let ticket = normalize(&raw, DEFAULT_ACCEPTANCE_FIELD).unwrap();
        assert_eq!(ticket.description, "Acceptance Criteria: user sees a banner");
        assert_eq!(ticket.acceptance_criteria, "user sees a banner");
    }

    #[test]
    fn unknown_description_shape_is_serialized() {
        assert_eq!(flatten_description(&json!({"kind": "odd"})), r#"{"kind":"odd"}"#);
        assert_eq!(flatten_description(&json!(42)), "42");
    }

    #[test]
    fn empty_custom_field_falls_back_to_description() {
        for empty in [json!(""), json!(null), json!([]), json!(false)] {
            let raw = payload(json!({
                "description": "AC: totals add up\n\nNotes follow",
                "customfield_10014": empty
            }));
            let ticket = normalize(&raw, DEFAULT_ACCEPTANCE_FIELD).unwrap();
            assert_eq!(ticket.acceptance_criteria, "totals add up");
        }
    }

    #[test]
    fn whitespace_custom_field_is_kept_verbatim() {
        let raw = payload(json!({
            "description": "AC: totals add up",
            "customfield_10014": "   "
        }));
        let ticket = normalize(&raw, DEFAULT_ACCEPTANCE_FIELD).unwrap();
        assert_eq!(ticket.acceptance_criteria, "   ");
    }

    #[test]
    fn labelled_criteria_stop_at_capitalised_line() {
        let text = "Intro\nAcceptance Criteria:\n- one\n- two\nNotes: later";
        assert_eq!(extract_acceptance_criteria(text), "- one\n- two");
    }

    #[test]
    fn labelled_criteria_stop_at_blank_line() {
        let text = "acceptance criteria - cart keeps items\n- after refresh\n\nmore";
        assert_eq!(
            extract_acceptance_criteria(text),
            "- cart keeps items\n- after refresh"
        );
    }

    #[test]
    fn given_block_is_kept_whole() {
        let text = "Context line\n\nGiven a saved cart\nWhen I log in\nThen items remain\n\nEnd";
        assert_eq!(
            extract_acceptance_criteria(text),
            "Given a saved cart\nWhen I log in\nThen items remain"
        );
    }

    #[test]
    fn no_pattern_yields_empty_string() {
        for text in ["", "Just a plain description.", "Go back to the page\n\nthen stop"] {
            assert_eq!(extract_acceptance_criteria(text), "");
        }
    }

    #[test]
    fn validates_ticket_ids() {
        assert_eq!(parse_ticket_id("  qa-12 ").unwrap(), "QA-12");
        assert!(is_valid_ticket_id("PROJ-1"));
        assert!(!is_valid_ticket_id("PROJ1"));
        assert!(!is_valid_ticket_id("PROJ-"));
        assert!(matches!(
            parse_ticket_id("12-PROJ"),
            Err(AppError::InvalidTicketId(_))
        ));
    }

    #[test]
    fn ticket_ids_need_ascii_digits() {
        assert!(!is_valid_ticket_id("QA-\u{661}\u{662}"));
        assert!(matches!(
            parse_ticket_id("qa-\u{661}\u{662}"),
            Err(AppError::InvalidTicketId(_))
        ));
        assert!(!is_valid_ticket_id("QA-\u{ff11}"));
    }
}
