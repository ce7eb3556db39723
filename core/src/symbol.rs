//! Symbol references shared by the grammar tree, compiled conditions, and
//! presence facts.
//!
//! A [`Symbol`] is always rendered in the literal notation a user would see
//! in a usage line (`-a`, `--rm`, `<IMAGE>`, `--`), so diagnostics can embed
//! it verbatim.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lexer::{is_letter, is_name_char};

/// One option, positional argument, or the `--` terminator.
///
/// # Examples
///
/// ```
/// use argspec_core::Symbol;
///
/// let image: Symbol = "<IMAGE>".parse().unwrap();
/// assert_eq!(image, Symbol::Positional("IMAGE".into()));
/// assert_eq!(image.to_string(), "<IMAGE>");
///
/// assert_eq!("-a".parse::<Symbol>().unwrap(), Symbol::Short('a'));
/// assert_eq!("--rm".parse::<Symbol>().unwrap().to_string(), "--rm");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Symbol {
    /// Positional argument, stored without the angle brackets.
    Positional(String),
    /// Single-letter option (`-v`).
    Short(char),
    /// Long option, stored without the leading dashes.
    Long(String),
    /// The literal `--` terminator.
    DoubleDash,
}

impl Symbol {
    /// Returns `true` for short and long options.
    pub fn is_option(&self) -> bool {
        matches!(self, Self::Short(_) | Self::Long(_))
    }

    pub fn is_positional(&self) -> bool {
        matches!(self, Self::Positional(_))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positional(name) => write!(f, "<{name}>"),
            Self::Short(c) => write!(f, "-{c}"),
            Self::Long(name) => write!(f, "--{name}"),
            Self::DoubleDash => f.write_str("--"),
        }
    }
}

/// Error returned when a string is not valid symbol notation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid symbol notation: '{0}'")]
pub struct SymbolParseError(pub String);

impl FromStr for Symbol {
    type Err = SymbolParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SymbolParseError(s.to_string());
        let bytes = s.as_bytes();

        if s == "--" {
            return Ok(Self::DoubleDash);
        }

        if let Some(name) = s.strip_prefix("--") {
            let valid = !name.is_empty()
                && name
                    .bytes()
                    .enumerate()
                    .all(|(idx, b)| is_name_char(b, idx == 0));
            return if valid {
                Ok(Self::Long(name.to_string()))
            } else {
                Err(invalid())
            };
        }

        if bytes.len() == 2 && bytes[0] == b'-' && is_letter(bytes[1]) {
            return Ok(Self::Short(char::from(bytes[1])));
        }

        if let Some(name) = s.strip_prefix('<').and_then(|rest| rest.strip_suffix('>')) {
            let valid = !name.is_empty()
                && name
                    .bytes()
                    .enumerate()
                    .all(|(idx, b)| is_name_char(b, idx == 0));
            return if valid {
                Ok(Self::Positional(name.to_string()))
            } else {
                Err(invalid())
            };
        }

        Err(invalid())
    }
}

impl TryFrom<String> for Symbol {
    type Error = SymbolParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_notation_round_trips_every_kind() {
        for notation in ["<IMAGE>", "<arg_1>", "-X", "--sig-proxy", "--"] {
            let symbol: Symbol = notation.parse().expect("valid notation");
            assert_eq!(symbol.to_string(), notation);
        }
    }

    #[test]
    fn test_symbol_rejects_malformed_notation() {
        for notation in ["", "-", "-1", "-ab", "---x", "<>", "<-x>", "x"] {
            assert!(
                notation.parse::<Symbol>().is_err(),
                "'{notation}' should be rejected"
            );
        }
    }

    #[test]
    fn test_symbol_serializes_as_notation() {
        let json = serde_json::to_string(&Symbol::Long("rm".into())).unwrap();
        assert_eq!(json, "\"--rm\"");
        let back: Symbol = serde_json::from_str("\"<FILE>\"").unwrap();
        assert_eq!(back, Symbol::Positional("FILE".into()));
    }
}
