//! Grammar tree and the recursive-descent parser that builds it.
//!
//! The tokenizer does not validate nesting, so every structural rule lives
//! here: balanced groups, non-degenerate choices, value placeholders
//! attached to options, and repetition only at the edges of a sequence.
//!
//! ```text
//! sequence     := term*
//! term         := leaf ('=<v>')? | '[' alternatives ']' | '(' alternatives ')'
//!                 followed by an optional '...'
//! alternatives := sequence ('|' sequence)*
//! ```

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::error::caret_display;
use crate::lexer::{Token, TokenKind};
use crate::symbol::Symbol;

/// The symbol a [`Leaf`] references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LeafSymbol {
    Single(Symbol),
    /// Bundled short options such as `-rm`. Each member is independently
    /// optional with respect to the others.
    Folded(Vec<Symbol>),
}

impl LeafSymbol {
    /// Every atomic symbol this leaf stands for, in source order.
    pub fn symbols(&self) -> &[Symbol] {
        match self {
            Self::Single(symbol) => std::slice::from_ref(symbol),
            Self::Folded(symbols) => symbols,
        }
    }

    pub fn is_folded(&self) -> bool {
        matches!(self, Self::Folded(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Leaf {
    pub symbol: LeafSymbol,
    /// Placeholder name from `--opt=<name>`, without the brackets.
    pub value: Option<String>,
    /// Byte offset of the leaf in the grammar string.
    pub pos: usize,
}

/// Grammar tree node.
///
/// The set of shapes is closed; every consumer matches exhaustively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GrammarNode {
    /// All children must hold, in order.
    Sequence(Vec<GrammarNode>),
    /// The body need not hold.
    Optional(Box<GrammarNode>),
    /// Exactly one alternative should hold when `exclusive`.
    Choice {
        alternatives: Vec<GrammarNode>,
        exclusive: bool,
    },
    /// Zero or more occurrences of the body.
    Repeated(Box<GrammarNode>),
    Leaf(Leaf),
}

impl GrammarNode {
    /// Every leaf below this node, in source order.
    pub fn leaves(&self) -> Vec<&Leaf> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Leaf>) {
        match self {
            Self::Sequence(children) => children.iter().for_each(|c| c.collect_leaves(out)),
            Self::Choice { alternatives, .. } => {
                alternatives.iter().for_each(|a| a.collect_leaves(out))
            }
            Self::Optional(body) | Self::Repeated(body) => body.collect_leaves(out),
            Self::Leaf(leaf) => out.push(leaf),
        }
    }

    /// Every atomic symbol below this node, in source order.
    pub fn symbols(&self) -> Vec<&Symbol> {
        self.leaves()
            .into_iter()
            .flat_map(|leaf| leaf.symbol.symbols())
            .collect()
    }

    /// Offset of the first leaf below this node.
    pub fn first_pos(&self) -> Option<usize> {
        self.leaves().first().map(|leaf| leaf.pos)
    }

    pub fn contains_repeated(&self) -> bool {
        match self {
            Self::Repeated(_) => true,
            Self::Sequence(children) => children.iter().any(Self::contains_repeated),
            Self::Choice { alternatives, .. } => alternatives.iter().any(Self::contains_repeated),
            Self::Optional(body) => body.contains_repeated(),
            Self::Leaf(_) => false,
        }
    }

    pub fn contains_positional(&self) -> bool {
        self.symbols().iter().any(|symbol| symbol.is_positional())
    }
}

impl fmt::Display for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.symbol {
            LeafSymbol::Single(symbol) => write!(f, "{symbol}")?,
            LeafSymbol::Folded(symbols) => {
                f.write_str("-")?;
                for symbol in symbols {
                    if let Symbol::Short(c) = symbol {
                        write!(f, "{c}")?;
                    }
                }
            }
        }
        if let Some(value) = &self.value {
            write!(f, "=<{value}>")?;
        }
        Ok(())
    }
}

/// Canonical usage notation, e.g. `[-d|--rm] <IMAGE> [<ARG>...]`.
impl fmt::Display for GrammarNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequence(children) => write_joined(f, children, " "),
            Self::Optional(body) => match body.as_ref() {
                Self::Choice { alternatives, .. } => {
                    f.write_str("[")?;
                    write_joined(f, alternatives, "|")?;
                    f.write_str("]")
                }
                other => write!(f, "[{other}]"),
            },
            Self::Choice { alternatives, .. } => {
                f.write_str("(")?;
                write_joined(f, alternatives, "|")?;
                f.write_str(")")
            }
            Self::Repeated(body) => write!(f, "{body}..."),
            Self::Leaf(leaf) => write!(f, "{leaf}"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, nodes: &[GrammarNode], sep: &str) -> fmt::Result {
    for (idx, node) in nodes.iter().enumerate() {
        if idx > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{node}")?;
    }
    Ok(())
}

/// Why a token sequence is not a supported grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GrammarErrorReason {
    #[error("unclosed optional group, expecting ']'")]
    UnclosedOptional,
    #[error("unclosed choice group, expecting ')'")]
    UnclosedGroup,
    #[error("unexpected '{0}' without a matching opening delimiter")]
    UnexpectedClose(char),
    #[error("expecting '{expected}' but found '{found}'")]
    MismatchedClose { expected: char, found: char },
    #[error("empty group")]
    EmptyGroup,
    #[error("empty alternative in choice group")]
    EmptyAlternative,
    #[error("choice group requires at least two alternatives")]
    SingleAlternative,
    #[error("ellipsis must follow a term")]
    DanglingEllipsis,
    #[error("repeated term cannot contain another repetition")]
    NestedRepetition,
    #[error("repetition is only supported as the first or last term of a sequence")]
    InteriorRepetition,
    #[error("option value placeholder must directly follow an option")]
    MisplacedOptionValue,
    #[error("at most one repeated positional is supported per sequence")]
    MultipleRepeatedPositionals,
    #[error("optional or repeated positionals must come last in their sequence")]
    InteriorOptionalPositional,
    #[error("every alternative of a choice must bind the same positionals")]
    ChoicePositionalMismatch,
}

/// Structural error with the offset of the offending (or unclosed) token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("grammar error at position {pos}: {reason}")]
pub struct GrammarError {
    pub pos: usize,
    pub reason: GrammarErrorReason,
}

impl GrammarError {
    pub fn new(pos: usize, reason: GrammarErrorReason) -> Self {
        Self { pos, reason }
    }

    /// Renders the error caret-style against the grammar string.
    pub fn render(&self, input: &str) -> String {
        caret_display(input, self.pos, &self.reason.to_string())
    }
}

type Result<T> = std::result::Result<T, GrammarError>;

/// Parses a token sequence into a root [`GrammarNode::Sequence`].
///
/// Alternatives at the root (`-a | -b`) become a single choice inside the
/// root sequence. An empty token sequence is an empty root sequence.
///
/// # Examples
///
/// ```
/// use argspec_core::{parse, tokenize};
///
/// let tokens = tokenize("[-R [-H | -L | -P]]").unwrap();
/// let tree = parse(&tokens).unwrap();
/// assert_eq!(tree.to_string(), "[-R [-H|-L|-P]]");
///
/// let err = parse(&tokenize("<a> <b>... <c>").unwrap()).unwrap_err();
/// assert_eq!(err.pos, 7);
/// ```
pub fn parse(tokens: &[Token]) -> Result<GrammarNode> {
    let mut parser = GrammarParser { tokens, idx: 0 };
    let root = parser.root()?;
    debug!(grammar = %root, "Parsed usage grammar");
    Ok(root)
}

struct Alternative {
    children: Vec<GrammarNode>,
    pos: usize,
}

struct GrammarParser<'t> {
    tokens: &'t [Token],
    idx: usize,
}

impl<'t> GrammarParser<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.idx)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|token| token.kind)
    }

    fn bump(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.idx)?;
        self.idx += 1;
        Some(token)
    }

    /// Offset used for errors detected at the current token or at the end.
    fn here(&self) -> usize {
        match self.peek() {
            Some(token) => token.pos,
            None => self
                .tokens
                .last()
                .map_or(0, |token| token.pos + token.text.len()),
        }
    }

    fn root(&mut self) -> Result<GrammarNode> {
        let mut alternatives = self.alternatives()?;

        if let Some(token) = self.peek() {
            let close = if token.kind == TokenKind::CloseOptional {
                ']'
            } else {
                ')'
            };
            return Err(GrammarError::new(
                token.pos,
                GrammarErrorReason::UnexpectedClose(close),
            ));
        }

        if alternatives.len() == 1 {
            let only = alternatives.remove(0);
            return Ok(GrammarNode::Sequence(only.children));
        }

        let choice = build_choice(alternatives)?;
        Ok(GrammarNode::Sequence(vec![choice]))
    }

    fn alternatives(&mut self) -> Result<Vec<Alternative>> {
        let mut out = Vec::new();
        loop {
            let pos = self.here();
            let children = self.sequence()?;
            out.push(Alternative { children, pos });
            if self.peek_kind() == Some(TokenKind::Choice) {
                self.bump();
            } else {
                return Ok(out);
            }
        }
    }

    fn sequence(&mut self) -> Result<Vec<GrammarNode>> {
        let mut children = Vec::new();
        // Offset of the ellipsis for each repeated child.
        let mut repeat_at = Vec::new();

        while let Some(kind) = self.peek_kind() {
            if matches!(
                kind,
                TokenKind::CloseOptional | TokenKind::CloseGroup | TokenKind::Choice
            ) {
                break;
            }
            let (node, ellipsis) = self.term()?;
            children.push(node);
            repeat_at.push(ellipsis);
        }

        let last = children.len().saturating_sub(1);
        for (idx, ellipsis) in repeat_at.iter().enumerate() {
            match ellipsis {
                Some(pos) if idx != 0 && idx != last => {
                    return Err(GrammarError::new(
                        *pos,
                        GrammarErrorReason::InteriorRepetition,
                    ));
                }
                _ => {}
            }
        }

        Ok(children)
    }

    /// Parses one term and its optional trailing ellipsis, returning the
    /// ellipsis offset when the term is repeated.
    fn term(&mut self) -> Result<(GrammarNode, Option<usize>)> {
        let Some(token) = self.bump() else {
            return Err(GrammarError::new(
                self.here(),
                GrammarErrorReason::DanglingEllipsis,
            ));
        };

        let node = match token.kind {
            TokenKind::Arg => {
                let name = &token.text[1..token.text.len() - 1];
                self.leaf(token, Symbol::Positional(name.to_string()))
            }
            TokenKind::ShortOpt => {
                // Token text is always `-c`.
                let letter = char::from(token.text.as_bytes()[1]);
                let mut node = self.leaf(token, Symbol::Short(letter));
                self.attach_value(&mut node);
                node
            }
            TokenKind::LongOpt => {
                let mut node = self.leaf(token, Symbol::Long(token.text[2..].to_string()));
                self.attach_value(&mut node);
                node
            }
            TokenKind::FoldedShortOptSeq => GrammarNode::Leaf(Leaf {
                symbol: LeafSymbol::Folded(token.text.chars().map(Symbol::Short).collect()),
                value: None,
                pos: token.pos,
            }),
            TokenKind::DoubleDash => self.leaf(token, Symbol::DoubleDash),
            TokenKind::OpenOptional => self.group(token, TokenKind::CloseOptional)?,
            TokenKind::OpenGroup => self.group(token, TokenKind::CloseGroup)?,
            TokenKind::OptionValuePlaceholder => {
                return Err(GrammarError::new(
                    token.pos,
                    GrammarErrorReason::MisplacedOptionValue,
                ));
            }
            TokenKind::Ellipsis => {
                return Err(GrammarError::new(
                    token.pos,
                    GrammarErrorReason::DanglingEllipsis,
                ));
            }
            TokenKind::CloseOptional | TokenKind::CloseGroup | TokenKind::Choice => {
                let close = match token.kind {
                    TokenKind::CloseOptional => ']',
                    TokenKind::CloseGroup => ')',
                    _ => '|',
                };
                return Err(GrammarError::new(
                    token.pos,
                    GrammarErrorReason::UnexpectedClose(close),
                ));
            }
        };

        if self.peek_kind() != Some(TokenKind::Ellipsis) {
            return Ok((node, None));
        }
        let ellipsis = self.here();
        self.bump();
        if node.contains_repeated() || self.peek_kind() == Some(TokenKind::Ellipsis) {
            return Err(GrammarError::new(
                if node.contains_repeated() {
                    ellipsis
                } else {
                    self.here()
                },
                GrammarErrorReason::NestedRepetition,
            ));
        }
        Ok((GrammarNode::Repeated(Box::new(node)), Some(ellipsis)))
    }

    fn leaf(&self, token: &Token, symbol: Symbol) -> GrammarNode {
        GrammarNode::Leaf(Leaf {
            symbol: LeafSymbol::Single(symbol),
            value: None,
            pos: token.pos,
        })
    }

    fn attach_value(&mut self, node: &mut GrammarNode) {
        if self.peek_kind() != Some(TokenKind::OptionValuePlaceholder) {
            return;
        }
        let Some(token) = self.bump() else {
            return;
        };
        if let GrammarNode::Leaf(leaf) = node {
            // Token text is `=<name>`.
            leaf.value = Some(token.text[2..token.text.len() - 1].to_string());
        }
    }

    fn group(&mut self, open: &Token, close: TokenKind) -> Result<GrammarNode> {
        let alternatives = self.alternatives()?;

        let (expected, unclosed) = if close == TokenKind::CloseOptional {
            (']', GrammarErrorReason::UnclosedOptional)
        } else {
            (')', GrammarErrorReason::UnclosedGroup)
        };
        match self.peek() {
            None => return Err(GrammarError::new(open.pos, unclosed)),
            Some(token) if token.kind != close => {
                let found = if expected == ']' { ')' } else { ']' };
                return Err(GrammarError::new(
                    token.pos,
                    GrammarErrorReason::MismatchedClose { expected, found },
                ));
            }
            Some(_) => {
                self.bump();
            }
        }

        if alternatives.len() == 1 {
            if alternatives[0].children.is_empty() {
                return Err(GrammarError::new(open.pos, GrammarErrorReason::EmptyGroup));
            }
            if close == TokenKind::CloseGroup {
                return Err(GrammarError::new(
                    open.pos,
                    GrammarErrorReason::SingleAlternative,
                ));
            }
        }

        let body = if alternatives.len() == 1 {
            let mut alternatives = alternatives;
            GrammarNode::Sequence(alternatives.remove(0).children)
        } else {
            build_choice(alternatives)?
        };

        if close == TokenKind::CloseOptional {
            Ok(GrammarNode::Optional(Box::new(body)))
        } else {
            Ok(body)
        }
    }
}

fn build_choice(alternatives: Vec<Alternative>) -> Result<GrammarNode> {
    if let Some(empty) = alternatives.iter().find(|alt| alt.children.is_empty()) {
        return Err(GrammarError::new(
            empty.pos,
            GrammarErrorReason::EmptyAlternative,
        ));
    }
    Ok(GrammarNode::Choice {
        alternatives: alternatives
            .into_iter()
            .map(|alt| GrammarNode::Sequence(alt.children))
            .collect(),
        exclusive: true,
    })
}
