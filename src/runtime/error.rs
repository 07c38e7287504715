//! Errors raised by generated parsers
//!
//! A failed parse is an expected outcome, not a defect: the parser reports
//! the furthest position it reached together with every expectation
//! recorded there. Expectations are de-duplicated and sorted by
//! description so messages are deterministic.
//!
//! # Example Output
//!
//! ```text
//! Expected "c" but "x" found.
//! Expected "a", [0-9] or end of input but "?" found.
//! ```

use super::location::Location;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// What kind of construct an expectation describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectationKind {
    /// A literal string
    Literal,
    /// A character class
    Class,
    /// Any character
    Any,
    /// A regular expression
    Regex,
    /// Inline code that failed
    Code,
    /// A named rule or an action-reported expectation
    Other,
    /// The end of input
    End,
}

/// One thing the parser expected at the failure position
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Expectation {
    /// Expectation kind
    #[serde(rename = "type")]
    pub kind: ExpectationKind,
    /// Raw value (literal text, class source, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Human-readable description used in messages
    pub description: String,
}

impl Expectation {
    /// Expectation of a literal string
    pub fn literal(value: &str) -> Self {
        Self {
            kind: ExpectationKind::Literal,
            value: Some(value.to_string()),
            description: format!("\"{}\"", escape(value)),
        }
    }

    /// Expectation of a character class
    pub fn class(raw: &str) -> Self {
        Self {
            kind: ExpectationKind::Class,
            value: Some(raw.to_string()),
            description: raw.to_string(),
        }
    }

    /// Expectation of a regular expression
    pub fn regex(raw: &str) -> Self {
        Self {
            kind: ExpectationKind::Regex,
            value: Some(raw.to_string()),
            description: raw.to_string(),
        }
    }

    /// Expectation of inline code succeeding
    pub fn code(code: &str) -> Self {
        Self {
            kind: ExpectationKind::Code,
            value: Some(code.to_string()),
            description: code.to_string(),
        }
    }

    /// Expectation of any character
    pub fn any() -> Self {
        Self {
            kind: ExpectationKind::Any,
            value: None,
            description: "any character".to_string(),
        }
    }

    /// Expectation described by name only
    pub fn other(description: impl Into<String>) -> Self {
        Self {
            kind: ExpectationKind::Other,
            value: None,
            description: description.into(),
        }
    }

    /// Expectation of the end of input
    pub fn end() -> Self {
        Self {
            kind: ExpectationKind::End,
            value: None,
            description: "end of input".to_string(),
        }
    }
}

/// A syntax error from a generated parser
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{message}")]
pub struct SyntaxError {
    /// Rendered message
    pub message: String,
    /// Sorted, de-duplicated expectations (empty for custom errors)
    pub expected: Vec<Expectation>,
    /// Text found at the failure position (`None` at end of input)
    pub found: Option<String>,
    /// Where the failure happened
    pub location: Location,
}

impl SyntaxError {
    /// Build an error from expectations, rendering the standard message
    pub fn expected(
        mut expected: Vec<Expectation>,
        found: Option<String>,
        location: Location,
    ) -> Self {
        cleanup_expected(&mut expected);
        let message = build_message(&expected, found.as_deref());
        Self {
            message,
            expected,
            found,
            location,
        }
    }

    /// Build an error with a custom message and no expectations
    pub fn custom(message: impl Into<String>, found: Option<String>, location: Location) -> Self {
        Self {
            message: message.into(),
            expected: Vec::new(),
            found,
            location,
        }
    }

    /// Descriptions of the expectations, in order
    pub fn expected_descriptions(&self) -> Vec<&str> {
        self.expected.iter().map(|e| e.description.as_str()).collect()
    }
}

/// Errors surfaced by `parse`
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseFailure {
    /// The input does not match the grammar
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// The requested start rule is not a configured starter
    #[error("Can't start parsing from rule \"{0}\".")]
    UnknownStartRule(String),

    /// The program calls an action that no handler provides
    #[error("no handler bound for action {index} ({code})")]
    UnboundAction {
        /// Index into the action pool
        index: usize,
        /// Code of the action
        code: String,
    },
}

impl ParseFailure {
    /// The syntax error, if this is one
    pub fn as_syntax(&self) -> Option<&SyntaxError> {
        match self {
            ParseFailure::Syntax(e) => Some(e),
            _ => None,
        }
    }
}

/// Sort by description and drop duplicates
fn cleanup_expected(expected: &mut Vec<Expectation>) {
    expected.sort_by(|a, b| {
        a.description
            .cmp(&b.description)
            .then_with(|| a.kind.cmp(&b.kind))
            .then_with(|| a.value.cmp(&b.value))
    });
    expected.dedup();
}

fn build_message(expected: &[Expectation], found: Option<&str>) -> String {
    let descriptions: Vec<&str> = expected.iter().map(|e| e.description.as_str()).collect();

    let found_desc = match found {
        Some(text) if !text.is_empty() => format!("\"{}\"", escape(text)),
        _ => "end of input".to_string(),
    };

    let expected_desc = match descriptions.split_last() {
        // Only predicates failed
        None => return format!("Unexpected {}.", found_desc),
        Some((last, [])) => (*last).to_string(),
        Some((last, init)) => format!("{} or {}", init.join(", "), last),
    };

    format!("Expected {} but {} found.", expected_desc, found_desc)
}

/// Escape text for inclusion in a double-quoted message
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\x08' => out.push_str("\\b"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\x0C' => out.push_str("\\f"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 || ((c as u32) >= 0x80 && (c as u32) <= 0xFF) => {
                out.push_str(&format!("\\x{:02X}", c as u32));
            }
            c if (c as u32) > 0xFF && (c as u32) <= 0xFFFF => {
                out.push_str(&format!("\\u{:04X}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

impl fmt::Display for ExpectationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExpectationKind::Literal => "literal",
            ExpectationKind::Class => "class",
            ExpectationKind::Any => "any",
            ExpectationKind::Regex => "regex",
            ExpectationKind::Code => "code",
            ExpectationKind::Other => "other",
            ExpectationKind::End => "end",
        };
        write!(f, "{}", name)
    }
}
