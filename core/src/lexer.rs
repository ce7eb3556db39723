//! Tokenizer for the usage-grammar mini-language.
//!
//! The scan is purely linear: no recursion and no delimiter stack. Nesting
//! is not checked here at all; [`crate::grammar`] owns every structural
//! rule. Where a construct is recognizable with a single character of
//! lookahead and produces one discrete token (`...`, `=<value>`, `<name>`),
//! the lexer validates it fully.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::error::caret_display;

/// Token categories produced by [`tokenize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// `<arg>`
    Arg,
    /// `(`
    OpenGroup,
    /// `)`
    CloseGroup,
    /// `[`
    OpenOptional,
    /// `]`
    CloseOptional,
    /// `|`
    Choice,
    /// `...`
    Ellipsis,
    /// `-a`
    ShortOpt,
    /// `--force`
    LongOpt,
    /// `-rm`, text without the dash
    FoldedShortOptSeq,
    /// `=<value>`
    OptionValuePlaceholder,
    /// `--`
    DoubleDash,
}

/// A token with its text and the byte offset it started at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub pos: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, pos: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            pos,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}('{}')@{}", self.kind, self.text, self.pos)
    }
}

/// Why a grammar string failed to tokenize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LexErrorReason {
    #[error("unexpected end of usage, was expecting rest of ellipsis")]
    IncompleteEllipsis,
    #[error("ellipsis must be composed of three subsequent periods")]
    MalformedEllipsis,
    #[error("unexpected end of usage, was expecting an option name")]
    MissingOptionName,
    #[error("was expecting a long option name")]
    MissingLongOptionName,
    #[error("cannot have dashes in middle of a short opt group")]
    DashInShortOptGroup,
    #[error("unexpected end of usage, was expecting '=<'")]
    IncompleteOptionValue,
    #[error("only valid occurrence of '=' is in '=<value>'")]
    StrayEquals,
    #[error("unclosed option value")]
    UnclosedOptionValue,
    #[error("was expecting an option value")]
    EmptyOptionValue,
    #[error("only [-_A-Za-z0-9] are permissible in arg names")]
    IllegalArgNameChar,
    #[error("was expecting an arg name")]
    EmptyArgName,
    #[error("unclosed arg declaration")]
    UnclosedArg,
    #[error("unexpected input")]
    UnexpectedInput,
}

/// Lexical error with the exact byte offset where it was detected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("lex error at position {pos}: {reason}")]
pub struct LexError {
    pub pos: usize,
    pub reason: LexErrorReason,
}

impl LexError {
    pub fn new(pos: usize, reason: LexErrorReason) -> Self {
        Self { pos, reason }
    }

    /// Renders the error caret-style against the source it came from.
    ///
    /// # Examples
    ///
    /// ```
    /// use argspec_core::tokenize;
    ///
    /// let err = tokenize("<ARG>..").unwrap_err();
    /// assert_eq!(
    ///     err.render("<ARG>.."),
    ///     "parse error at position 7:\n<ARG>..\n       ^ unexpected end of usage, was expecting rest of ellipsis"
    /// );
    /// ```
    pub fn render(&self, input: &str) -> String {
        caret_display(input, self.pos, &self.reason.to_string())
    }
}

/// Transforms a usage grammar into a flat token sequence.
///
/// This does not check that groups are balanced; see
/// [`parse`](crate::grammar::parse).
///
/// # Examples
///
/// ```
/// use argspec_core::{tokenize, TokenKind};
///
/// let tokens = tokenize("[-d|--rm] <IMAGE>").unwrap();
/// let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
/// assert_eq!(
///     kinds,
///     vec![
///         TokenKind::OpenOptional,
///         TokenKind::ShortOpt,
///         TokenKind::Choice,
///         TokenKind::LongOpt,
///         TokenKind::CloseOptional,
///         TokenKind::Arg,
///     ]
/// );
/// assert_eq!(tokens[5].pos, 10);
/// ```
pub fn tokenize(usage: &str) -> Result<Vec<Token>, LexError> {
    let mut scanner = Scanner::new(usage);
    scanner.run()?;
    debug!(
        usage,
        tokens = scanner.tokens.len(),
        "Tokenized usage grammar"
    );
    Ok(scanner.tokens)
}

struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn fail<T>(&self, reason: LexErrorReason) -> Result<T, LexError> {
        Err(LexError::new(self.pos, reason))
    }

    fn single(&mut self, kind: TokenKind, text: &'static str) {
        self.tokens.push(Token::new(kind, text, self.pos));
        self.pos += 1;
    }

    fn run(&mut self) -> Result<(), LexError> {
        while let Some(c) = self.peek() {
            match c {
                b' ' | b'\t' => self.pos += 1,
                b'[' => self.single(TokenKind::OpenOptional, "["),
                b']' => self.single(TokenKind::CloseOptional, "]"),
                b'(' => self.single(TokenKind::OpenGroup, "("),
                b')' => self.single(TokenKind::CloseGroup, ")"),
                b'|' => self.single(TokenKind::Choice, "|"),
                b'.' => self.ellipsis()?,
                b'-' => self.option()?,
                b'=' => self.option_value()?,
                b'<' => self.arg()?,
                _ => return self.fail(LexErrorReason::UnexpectedInput),
            }
        }
        Ok(())
    }

    fn ellipsis(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        self.pos += 1;
        for _ in 0..2 {
            match self.peek() {
                None => return self.fail(LexErrorReason::IncompleteEllipsis),
                Some(b'.') => self.pos += 1,
                Some(_) => return self.fail(LexErrorReason::MalformedEllipsis),
            }
        }
        self.tokens.push(Token::new(TokenKind::Ellipsis, "...", start));
        Ok(())
    }

    fn option(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        self.pos += 1;
        match self.peek() {
            None => self.fail(LexErrorReason::MissingOptionName),
            Some(c) if is_letter(c) => {
                while self.peek().is_some_and(is_letter) {
                    self.pos += 1;
                }
                let token = if self.pos - start > 2 {
                    Token::new(
                        TokenKind::FoldedShortOptSeq,
                        &self.src[start + 1..self.pos],
                        start,
                    )
                } else {
                    Token::new(TokenKind::ShortOpt, &self.src[start..self.pos], start)
                };
                if self.peek() == Some(b'-') {
                    return self.fail(LexErrorReason::DashInShortOptGroup);
                }
                self.tokens.push(token);
                Ok(())
            }
            Some(b'-') => {
                self.pos += 1;
                if self.eof() || self.peek().is_some_and(ends_double_dash) {
                    self.tokens.push(Token::new(TokenKind::DoubleDash, "--", start));
                    return Ok(());
                }
                let name_start = self.pos;
                while self
                    .peek()
                    .is_some_and(|c| is_name_char(c, self.pos == name_start))
                {
                    self.pos += 1;
                }
                if self.pos == name_start {
                    return self.fail(LexErrorReason::MissingLongOptionName);
                }
                self.tokens.push(Token::new(
                    TokenKind::LongOpt,
                    &self.src[start..self.pos],
                    start,
                ));
                Ok(())
            }
            Some(_) => self.fail(LexErrorReason::UnexpectedInput),
        }
    }

    fn option_value(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        self.pos += 1;
        match self.peek() {
            None => return self.fail(LexErrorReason::IncompleteOptionValue),
            Some(b'<') => {}
            Some(_) => return self.fail(LexErrorReason::StrayEquals),
        }
        let open = self.pos;
        let Some(offset) = self.bytes[open + 1..].iter().position(|&b| b == b'>') else {
            self.pos = self.bytes.len();
            return self.fail(LexErrorReason::UnclosedOptionValue);
        };
        let close = open + 1 + offset;
        if close == open + 1 {
            self.pos = close;
            return self.fail(LexErrorReason::EmptyOptionValue);
        }
        self.pos = close + 1;
        self.tokens.push(Token::new(
            TokenKind::OptionValuePlaceholder,
            &self.src[start..self.pos],
            start,
        ));
        Ok(())
    }

    fn arg(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek() {
                None => return self.fail(LexErrorReason::UnclosedArg),
                Some(b'>') => break,
                Some(c) if is_name_char(c, self.pos == start + 1) => self.pos += 1,
                Some(_) => return self.fail(LexErrorReason::IllegalArgNameChar),
            }
        }
        if self.pos == start + 1 {
            return self.fail(LexErrorReason::EmptyArgName);
        }
        self.pos += 1;
        self.tokens.push(Token::new(TokenKind::Arg, &self.src[start..self.pos], start));
        Ok(())
    }
}

/// `--` stands alone when followed by whitespace, a `|` or a closing
/// delimiter, so canonical forms such as `[--]` tokenize again.
fn ends_double_dash(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b']' | b')' | b'|')
}

pub(crate) fn is_letter(c: u8) -> bool {
    c.is_ascii_alphabetic()
}

/// Characters allowed in long option and positional names.
pub(crate) fn is_name_char(c: u8, first: bool) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || (!first && c == b'-')
}
