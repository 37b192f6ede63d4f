use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const MAX_PDF_BYTES: usize = 5 * 1024 * 1024;

const PDF_MAGIC: &[u8; 4] = b"%PDF";

static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank run pattern"));

// Checked in order; the first one is loose enough to catch most lines.
static HEADER_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"^(?:[0-9]+\.\s*)?[A-Za-z0-9_]+").expect("titled section pattern"),
        Regex::new(r"^[A-Z][A-Z\s]+$").expect("upper-case header pattern"),
        Regex::new(r"(?i)^(?:Test\s+[A-Za-z0-9_]+|Scenario|Step|Description)")
            .expect("keyword header pattern"),
    ]
});

/// Not idempotent: a second pass re-wraps `##` lines.
pub fn structure(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let cleaned = BLANK_RUNS.replace_all(&unified, "\n\n");

    cleaned
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            if is_header(line) {
                format!("\n## {line}\n")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_header(line: &str) -> bool {
    HEADER_PATTERNS.iter().any(|pattern| pattern.is_match(line))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PdfValidation {
    fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    fn rejected(reason: &str) -> Self {
        Self {
            valid: false,
            error: Some(reason.to_string()),
        }
    }
}

pub fn validate_pdf(bytes: &[u8]) -> PdfValidation {
    if bytes.len() < PDF_MAGIC.len() || &bytes[..PDF_MAGIC.len()] != PDF_MAGIC {
        return PdfValidation::rejected("Invalid PDF file format");
    }
    if bytes.len() > MAX_PDF_BYTES {
        return PdfValidation::rejected("PDF file too large (max 5MB)");
    }
    PdfValidation::ok()
}

pub const DEFAULT_TEMPLATE_NAME: &str = "Default Test Plan Template";

pub const DEFAULT_TEMPLATE: &str = "# Test Plan Template

## 1. Overview
- **Ticket ID:** {{TICKET_ID}}
- **Summary:** {{SUMMARY}}
- **Priority:** {{PRIORITY}}

## 2. Test Scope
### In Scope
- Feature functionality as per acceptance criteria
- UI/UX validation
- Edge cases

### Out of Scope
- Performance testing
- Security testing (unless specified)

## 3. Test Scenarios
{{TEST_SCENARIOS}}

## 4. Test Cases
| ID | Description | Steps | Expected Result | Priority |
|----|-------------|-------|-----------------|----------|
{{TEST_CASES}}

## 5. Acceptance Criteria Validation
{{AC_VALIDATION}}

## 6. Risks & Mitigations
| Risk | Impact | Mitigation |
|------|--------|------------|
{{RISKS}}
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_headers_and_keeps_content() {
        let text = "TEST PLAN\r\n\r\n\r\n\r\n- bullet item\r\n1. Introduction\n(see appendix)";
        assert_eq!(
            structure(text),
            "\n## TEST PLAN\n\n- bullet item\n\n## 1. Introduction\n\n(see appendix)"
        );
    }

    #[test]
    fn ordinary_sentences_count_as_headers() {
        let out = structure("The system shall respond quickly.");
        assert_eq!(out, "\n## The system shall respond quickly.\n");
    }

    #[test]
    fn non_ascii_numbering_is_not_a_header() {
        assert_eq!(structure("\u{661}. intro"), "\u{661}. intro");
        assert!(is_header("1. intro"));
    }

    #[test]
    fn punctuation_led_lines_stay_content() {
        assert_eq!(structure("  * note\n\n> quote  "), "* note\n> quote");
    }

    #[test]
    fn blank_input_gives_empty_output() {
        assert_eq!(structure(""), "");
        assert_eq!(structure(" \r\n\n\t\n"), "");
    }

    #[test]
    fn header_patterns_match_keywords_and_caps() {
        assert!(is_header("scenario: checkout"));
        assert!(is_header("Test Case 4"));
        assert!(is_header("OVERVIEW"));
        assert!(!is_header("- step one"));
    }

    #[test]
    fn accepts_minimal_pdf_header() {
        assert_eq!(validate_pdf(b"%PDF"), PdfValidation::ok());
    }

    #[test]
    fn rejects_wrong_magic() {
        let result = validate_pdf(b"%PDE-1.7");
        assert!(!result.valid);
        assert_eq!(result.error.as_deref(), Some("Invalid PDF file format"));
        assert!(!validate_pdf(b"%P").valid);
    }

    #[test]
    fn rejects_oversized_pdf() {
        let mut bytes = b"%PDF".to_vec();
        bytes.resize(6 * 1024 * 1024, b'%');
        let result = validate_pdf(&bytes);
        assert!(!result.valid);
        assert_eq!(result.error.as_deref(), Some("PDF file too large (max 5MB)"));
    }

    #[test]
    fn accepts_exactly_five_mib() {
        let mut bytes = b"%PDF".to_vec();
        bytes.resize(MAX_PDF_BYTES, 0);
        assert!(validate_pdf(&bytes).valid);
    }
}
