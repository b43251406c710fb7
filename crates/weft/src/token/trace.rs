//! Source code traces for error messages.
//!
//! Tokens already carry their line and column, so tracing a token is just a matter of
//!     cutting the right line out of the template source.
//! A [SourceCodeTrace] owns everything it needs, so errors holding one can outlive
//!     the template they came from.

use super::Token;

/// A token trace
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceCodeTrace {
    /// Name of the template the token came from.
    pub origin: String,
    /// Content of the line this token came from.
    pub line_content: String,
    /// Number of the line within the template, starting at 1.
    pub line_number: usize,
    /// Index within the line that the token starts, in characters.
    pub index: usize,
    /// Value of the token, or the offending snippet.
    pub value: String,
}

impl SourceCodeTrace {
    /// Build a trace for a snippet at the provided position.
    ///
    /// Positions outside the source produce a trace with an empty line.
    pub fn new<O: Into<String>, V: Into<String>>(
        origin: O,
        source: &str,
        line: u32,
        column: u32,
        value: V,
    ) -> SourceCodeTrace {
        let line_content = source
            .lines()
            .nth((line as usize).saturating_sub(1))
            .unwrap_or("")
            .to_string();
        let mut value: String = value.into();
        // Multi-line snippets are cut to the part on the first line.
        if let Some(i) = value.find('\n') {
            value.truncate(i);
        }
        SourceCodeTrace {
            origin: origin.into(),
            line_content,
            line_number: line as usize,
            index: (column as usize).saturating_sub(1),
            value,
        }
    }

    pub fn for_token<O: Into<String>>(origin: O, source: &str, token: &Token) -> SourceCodeTrace {
        SourceCodeTrace::new(origin, source, token.line, token.column, token.text.clone())
    }

    /// A trace pointing at the end of the source.
    pub fn end_of_input<O: Into<String>>(origin: O, source: &str) -> SourceCodeTrace {
        let line_number = std::cmp::max(1, source.lines().count());
        let line_content = source.lines().last().unwrap_or("").to_string();
        let index = line_content.chars().count();
        SourceCodeTrace {
            origin: origin.into(),
            line_content,
            line_number,
            index,
            value: " ".into(),
        }
    }
}
