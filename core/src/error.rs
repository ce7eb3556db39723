//! Error types for turning a grammar string into a compiled grammar.
//!
//! Lexing and parsing fail fast with a single positioned error. Both are
//! author-time problems, so [`SpecError`] exists mainly for callers that go
//! from string to [`CompiledGrammar`](crate::CompiledGrammar) in one step and
//! want to render the failure against the source.

use thiserror::Error;

use crate::grammar::GrammarError;
use crate::lexer::LexError;

/// Any failure while compiling a grammar string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    /// The string is lexically malformed.
    #[error(transparent)]
    Lex(#[from] LexError),
    /// The tokens do not form a supported grammar.
    #[error(transparent)]
    Grammar(#[from] GrammarError),
}

impl SpecError {
    /// Byte offset in the grammar string where the problem was detected.
    pub fn pos(&self) -> usize {
        match self {
            Self::Lex(err) => err.pos,
            Self::Grammar(err) => err.pos,
        }
    }

    /// Renders a caret display of the error against `input`.
    pub fn render(&self, input: &str) -> String {
        match self {
            Self::Lex(err) => err.render(input),
            Self::Grammar(err) => err.render(input),
        }
    }
}

/// Convenience alias for results with [`SpecError`].
pub type Result<T> = std::result::Result<T, SpecError>;

/// Three-line caret display: header, the input, and a caret under `pos`.
///
/// Tabs before the caret are preserved so the caret lines up in terminals
/// that expand them.
pub(crate) fn caret_display(input: &str, pos: usize, message: &str) -> String {
    let prefix = input.get(..pos).unwrap_or(input);
    let indent: String = prefix
        .chars()
        .map(|c| if c == '\t' { '\t' } else { ' ' })
        .collect();
    format!("parse error at position {pos}:\n{input}\n{indent}^ {message}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::LexErrorReason;

    #[test]
    fn test_caret_display_points_at_offset() {
        let rendered = caret_display("<ARG>..x", 7, "bad ellipsis");
        assert_eq!(
            rendered,
            "parse error at position 7:\n<ARG>..x\n       ^ bad ellipsis"
        );
    }

    #[test]
    fn test_caret_display_keeps_tabs() {
        let rendered = caret_display("\t-", 2, "missing name");
        assert!(rendered.ends_with("\n\t ^ missing name"));
    }

    #[test]
    fn test_spec_error_exposes_position() {
        let err = SpecError::from(LexError::new(3, LexErrorReason::UnexpectedInput));
        assert_eq!(err.pos(), 3);
        assert_eq!(err.to_string(), "lex error at position 3: unexpected input");
    }
}
