//! Usage-grammar recognition for command-line invocations.
//!
//! A usage grammar such as `[-d|--rm] <IMAGE> [<COMMAND> [<ARG>...]]` goes
//! through four stages:
//!
//! - [`tokenize`]: a linear scan into [`Token`]s with byte offsets.
//! - [`parse`]: recursive descent into a [`GrammarNode`] tree that rejects
//!   unbalanced groups and misplaced repetition.
//! - [`compile`]: per-symbol [`SatisfactionCondition`]s relating each leaf to
//!   its immediate context only.
//! - [`recognize`]: evaluation against [`PresenceFacts`], producing ordered
//!   [`Diagnostic`]s. An empty list means the invocation is accepted.
//!
//! Raw argv is split by [`ArgsSpool`] and turned into facts by
//! [`PresenceFacts::from_spool`]. Commands with several usage forms pick
//! one through [`ModeGuard`]s (see [`Command::recognize`]).
//!
//! # Example
//!
//! ```
//! use argspec_core::*;
//!
//! let compiled = compile_cached("[-a -b -c]").unwrap();
//! let spool = ArgsSpool::parse(["-b"]);
//! let facts = PresenceFacts::from_spool(&spool, &compiled);
//!
//! let messages: Vec<String> = recognize(&compiled, &facts)
//!     .into_iter()
//!     .map(|d| d.message)
//!     .collect();
//! assert_eq!(
//!     messages,
//!     vec![
//!         "When '-b' is present, '-a' is required",
//!         "When '-b' is present, '-c' is required",
//!     ]
//! );
//! ```

mod cache;
mod compile;
mod error;
mod facts;
mod grammar;
mod lexer;
mod modes;
mod recognize;
mod spool;
mod symbol;

pub use cache::{cached_grammars, compile_cached};
pub use compile::{
    AlternativeTest, CompiledGrammar, CompoundDescriptor, ConditionKind, GuardPhrasing,
    PositionalSlot, SatisfactionCondition, SymbolEntry, Target, compile,
};
pub use error::{Result, SpecError};
pub use facts::PresenceFacts;
pub use grammar::{GrammarError, GrammarErrorReason, GrammarNode, Leaf, LeafSymbol, parse};
pub use lexer::{LexError, LexErrorReason, Token, TokenKind, tokenize};
pub use modes::{Command, CommandMode, ModeError, ModeGuard, Recognition, select_mode};
pub use recognize::{
    Diagnostic, DiagnosticKind, ModeContext, RecognitionOptions, Recognizer, recognize,
    recognize_with,
};
pub use spool::ArgsSpool;
pub use symbol::{Symbol, SymbolParseError};
