//! Constraint compiler: grammar tree to per-symbol satisfaction conditions.
//!
//! Conditions only ever relate a leaf to its immediate syntactic context.
//! A doubly nested leaf depends on its parent guard and never on the
//! grandparent, and an n-ary choice compiles into pairwise conflicts.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::error::SpecError;
use crate::grammar::{self, GrammarError, GrammarErrorReason, GrammarNode, Leaf, LeafSymbol};
use crate::lexer;
use crate::symbol::Symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardPhrasing {
    /// "'-H' is only valid when '-R' is present"
    OnlyValid,
    /// "'-b' is only an option when '-a' is present"
    OnlyAnOption,
}

impl GuardPhrasing {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OnlyValid => "only valid",
            Self::OnlyAnOption => "only an option",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    RequiredIf,
    ConflictsWith,
    OnlyValidIf { phrasing: GuardPhrasing },
}

/// How one alternative of a compound choice is judged satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlternativeTest {
    /// Every required leaf of the alternative is present.
    AllOf(Vec<Symbol>),
    /// The alternative has no required leaf; any one of its symbols will do.
    AnyOf(Vec<Symbol>),
}

impl AlternativeTest {
    fn holds(&self, present: impl Fn(&Symbol) -> bool) -> bool {
        match self {
            Self::AllOf(symbols) => symbols.iter().all(present),
            Self::AnyOf(symbols) => symbols.iter().any(present),
        }
    }
}

/// A whole choice group used as one side of a condition, e.g. `(-a|-b)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompoundDescriptor {
    /// Canonical notation of the choice group.
    pub notation: String,
    pub alternatives: Vec<AlternativeTest>,
}

impl CompoundDescriptor {
    fn of_choice(choice: &GrammarNode, alternatives: &[GrammarNode]) -> Self {
        Self {
            notation: choice.to_string(),
            alternatives: alternatives.iter().map(alternative_test).collect(),
        }
    }

    /// A folded leaf such as `-rm`: any one of its letters will do.
    fn of_folded(leaf: &Leaf) -> Self {
        Self {
            notation: leaf.to_string(),
            alternatives: vec![AlternativeTest::AnyOf(leaf.symbol.symbols().to_vec())],
        }
    }

    /// A choice group is satisfied when at least one alternative holds.
    pub fn is_satisfied(&self, present: impl Fn(&Symbol) -> bool) -> bool {
        self.alternatives.iter().any(|alt| alt.holds(&present))
    }
}

fn alternative_test(alternative: &GrammarNode) -> AlternativeTest {
    let required: Vec<Symbol> = match alternative {
        GrammarNode::Sequence(children) => children
            .iter()
            .filter_map(direct_single_symbol)
            .cloned()
            .collect(),
        other => direct_single_symbol(other).cloned().into_iter().collect(),
    };
    if required.is_empty() {
        AlternativeTest::AnyOf(alternative.symbols().into_iter().cloned().collect())
    } else {
        AlternativeTest::AllOf(required)
    }
}

/// The other side of a condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Unconditional: the subject alone decides.
    None,
    Symbol(Symbol),
    Compound(CompoundDescriptor),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("always"),
            Self::Symbol(symbol) => write!(f, "{symbol}"),
            Self::Compound(compound) => f.write_str(&compound.notation),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SatisfactionCondition {
    pub subject: Symbol,
    pub kind: ConditionKind,
    pub other: Target,
    /// Set for requirements of the grammar itself, outside every optional,
    /// choice and repetition.
    pub unconditional: bool,
}

impl SatisfactionCondition {
    /// Unconditional conditions are evaluated even when the subject is
    /// absent.
    pub fn is_unconditional(&self) -> bool {
        self.unconditional
    }
}

impl fmt::Display for SatisfactionCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ConditionKind::RequiredIf => write!(f, "RequiredIf({})", self.other),
            ConditionKind::ConflictsWith => write!(f, "ConflictsWith({})", self.other),
            ConditionKind::OnlyValidIf { phrasing } => {
                write!(f, "OnlyValidIf({}, {})", self.other, phrasing.as_str())
            }
        }
    }
}

/// One declared symbol and its conditions in compile order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolEntry {
    pub symbol: Symbol,
    pub conditions: Vec<SatisfactionCondition>,
}

/// A positional symbol in declaration order, used to bind bare words.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionalSlot {
    pub symbol: Symbol,
    pub repeated: bool,
}

/// Immutable result of compiling one grammar.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledGrammar {
    spec: String,
    tree: GrammarNode,
    entries: Vec<SymbolEntry>,
    positionals: Vec<PositionalSlot>,
    #[serde(skip)]
    index: HashMap<Symbol, usize>,
}

impl CompiledGrammar {
    /// Tokenizes, parses and compiles a grammar string in one step.
    ///
    /// # Examples
    ///
    /// ```
    /// use argspec_core::{CompiledGrammar, Symbol};
    ///
    /// let compiled = CompiledGrammar::from_spec("[-a | -b | -c]").unwrap();
    /// let conflicts = compiled.conditions_for(&Symbol::Short('a'));
    /// assert_eq!(conflicts.len(), 2);
    /// ```
    pub fn from_spec(spec: &str) -> Result<Self, SpecError> {
        let tokens = lexer::tokenize(spec)?;
        let tree = grammar::parse(&tokens)?;
        let mut compiled = compile(tree)?;
        compiled.spec = spec.to_string();
        Ok(compiled)
    }

    /// The grammar string this was compiled from.
    pub fn spec(&self) -> &str {
        &self.spec
    }

    pub fn tree(&self) -> &GrammarNode {
        &self.tree
    }

    /// Declared symbols in declaration order.
    pub fn entries(&self) -> &[SymbolEntry] {
        &self.entries
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.entries.iter().map(|entry| &entry.symbol)
    }

    pub fn positionals(&self) -> &[PositionalSlot] {
        &self.positionals
    }

    /// Declaration index of `symbol`, if the grammar declares it.
    pub fn position(&self, symbol: &Symbol) -> Option<usize> {
        self.index.get(symbol).copied()
    }

    pub fn declares(&self, symbol: &Symbol) -> bool {
        self.index.contains_key(symbol)
    }

    pub fn conditions_for(&self, symbol: &Symbol) -> &[SatisfactionCondition] {
        match self.position(symbol) {
            Some(idx) => &self.entries[idx].conditions,
            None => &[],
        }
    }

    pub fn condition_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.conditions.len()).sum()
    }
}

/// Compiles a parsed grammar tree.
///
/// Fails when a sequence mixes positional arities the binder cannot
/// resolve (two repeated positionals, or an optional positional that is not
/// last).
pub fn compile(tree: GrammarNode) -> Result<CompiledGrammar, GrammarError> {
    let mut compiler = Compiler::default();
    for symbol in tree.symbols() {
        if !compiler.index.contains_key(symbol) {
            compiler.index.insert(symbol.clone(), compiler.entries.len());
            compiler.entries.push(SymbolEntry {
                symbol: symbol.clone(),
                conditions: Vec::new(),
            });
        }
    }

    let root = Scope {
        required: true,
        guards: Vec::new(),
        phrasing: GuardPhrasing::OnlyAnOption,
        shared: Vec::new(),
    };
    compiler.walk(&tree, false, &root)?;

    let mut positionals = Vec::new();
    collect_positionals(&tree, false, &mut positionals);

    let compiled = CompiledGrammar {
        spec: tree.to_string(),
        tree,
        entries: compiler.entries,
        positionals,
        index: compiler.index,
    };
    debug!(
        spec = %compiled.spec,
        symbols = compiled.entries.len(),
        conditions = compiled.condition_count(),
        "Compiled usage grammar"
    );
    Ok(compiled)
}

/// Immediate context of the nodes being walked.
#[derive(Debug, Clone)]
struct Scope {
    /// Outside every optional, choice and repetition.
    required: bool,
    guards: Vec<Target>,
    phrasing: GuardPhrasing,
    /// Symbols the enclosing choice declares in more than one alternative.
    shared: Vec<Symbol>,
}

#[derive(Default)]
struct Compiler {
    entries: Vec<SymbolEntry>,
    index: HashMap<Symbol, usize>,
}

impl Compiler {
    fn attach(&mut self, subject: &Symbol, kind: ConditionKind, other: Target) {
        let unconditional = kind == ConditionKind::RequiredIf && other == Target::None;
        self.push(SatisfactionCondition {
            subject: subject.clone(),
            kind,
            other,
            unconditional,
        });
    }

    /// An unconditional requirement on a whole group, keyed on its first
    /// symbol.
    fn require_group(&mut self, first: &Symbol, compound: CompoundDescriptor) {
        self.push(SatisfactionCondition {
            subject: first.clone(),
            kind: ConditionKind::RequiredIf,
            other: Target::Compound(compound),
            unconditional: true,
        });
    }

    fn push(&mut self, condition: SatisfactionCondition) {
        let Some(&idx) = self.index.get(&condition.subject) else {
            return;
        };
        let conditions = &mut self.entries[idx].conditions;
        if !conditions.contains(&condition) {
            conditions.push(condition);
        }
    }

    /// `grouped` marks a sequence that is an optional body or a choice
    /// alternative.
    fn walk(
        &mut self,
        node: &GrammarNode,
        grouped: bool,
        scope: &Scope,
    ) -> Result<(), GrammarError> {
        match node {
            GrammarNode::Sequence(children) => self.sequence(children, grouped, scope),
            GrammarNode::Leaf(leaf) => {
                self.leaf(leaf, scope);
                Ok(())
            }
            GrammarNode::Optional(body) => {
                let inner = Scope {
                    required: false,
                    ..scope.clone()
                };
                self.walk(body, true, &inner)
            }
            GrammarNode::Choice {
                alternatives,
                exclusive,
            } => self.choice(node, alternatives, *exclusive, scope),
            GrammarNode::Repeated(body) => {
                let inner = Scope {
                    required: false,
                    ..scope.clone()
                };
                self.walk(body, grouped, &inner)
            }
        }
    }

    fn sequence(
        &mut self,
        children: &[GrammarNode],
        grouped: bool,
        scope: &Scope,
    ) -> Result<(), GrammarError> {
        check_positional_arity(children)?;

        let direct: Vec<&Symbol> = children.iter().filter_map(direct_single_symbol).collect();
        if grouped && direct.len() >= 2 {
            for subject in direct.iter().filter(|s| !scope.shared.contains(s)) {
                for other in direct.iter().filter(|other| other != &subject) {
                    self.attach(
                        subject,
                        ConditionKind::RequiredIf,
                        Target::Symbol((*other).clone()),
                    );
                }
            }
        }

        let nested_guards = if grouped {
            guards_of(children)
        } else {
            Vec::new()
        };
        // A bare choice next to direct leaves depends on them, and they
        // require the choice in turn.
        let choice_scope = (grouped && !direct.is_empty()).then(|| Scope {
            required: false,
            guards: direct
                .iter()
                .map(|symbol| Target::Symbol((*symbol).clone()))
                .collect(),
            phrasing: GuardPhrasing::OnlyValid,
            shared: Vec::new(),
        });

        for child in children {
            let (node, repeated) = match child {
                GrammarNode::Repeated(body) => (body.as_ref(), true),
                other => (other, false),
            };
            match (node, &choice_scope) {
                (GrammarNode::Optional(body), _) => {
                    let inner = Scope {
                        required: false,
                        guards: nested_guards.clone(),
                        phrasing: match body.as_ref() {
                            GrammarNode::Choice { .. } => GuardPhrasing::OnlyValid,
                            _ => GuardPhrasing::OnlyAnOption,
                        },
                        shared: Vec::new(),
                    };
                    self.walk(body, true, &inner)?;
                }
                (GrammarNode::Choice { alternatives, .. }, Some(inner)) => {
                    let compound = CompoundDescriptor::of_choice(node, alternatives);
                    for subject in &direct {
                        self.attach(
                            subject,
                            ConditionKind::RequiredIf,
                            Target::Compound(compound.clone()),
                        );
                    }
                    self.walk(node, grouped, inner)?;
                }
                (other, _) if repeated => {
                    let inner = Scope {
                        required: false,
                        ..scope.clone()
                    };
                    self.walk(other, grouped, &inner)?;
                }
                (other, _) => self.walk(other, grouped, scope)?,
            }
        }
        Ok(())
    }

    fn leaf(&mut self, leaf: &Leaf, scope: &Scope) {
        if scope.required {
            match &leaf.symbol {
                LeafSymbol::Single(symbol) => {
                    self.attach(symbol, ConditionKind::RequiredIf, Target::None);
                }
                LeafSymbol::Folded(symbols) => {
                    if let Some(first) = symbols.first() {
                        self.require_group(first, CompoundDescriptor::of_folded(leaf));
                    }
                }
            }
        }
        for symbol in leaf.symbol.symbols() {
            for guard in &scope.guards {
                if matches!(guard, Target::Symbol(g) if g == symbol) {
                    continue;
                }
                self.attach(
                    symbol,
                    ConditionKind::OnlyValidIf {
                        phrasing: scope.phrasing,
                    },
                    guard.clone(),
                );
            }
        }
    }

    fn choice(
        &mut self,
        node: &GrammarNode,
        alternatives: &[GrammarNode],
        exclusive: bool,
        scope: &Scope,
    ) -> Result<(), GrammarError> {
        check_choice_positionals(alternatives)?;

        if scope.required {
            if let Some(first) = node.symbols().first() {
                let compound = CompoundDescriptor::of_choice(node, alternatives);
                self.require_group(first, compound);
            }
        }

        let shared = shared_symbols(alternatives);
        if exclusive {
            for (i, left) in alternatives.iter().enumerate() {
                for right in &alternatives[i + 1..] {
                    let right_symbols = right.symbols();
                    for a in left.symbols().into_iter().filter(|a| !shared.contains(a)) {
                        let others = right_symbols.iter().copied();
                        for b in others.filter(|b| !shared.contains(b)) {
                            self.attach(
                                a,
                                ConditionKind::ConflictsWith,
                                Target::Symbol(b.clone()),
                            );
                            self.attach(
                                b,
                                ConditionKind::ConflictsWith,
                                Target::Symbol(a.clone()),
                            );
                        }
                    }
                }
            }
        }

        let inner = Scope {
            required: false,
            shared,
            ..scope.clone()
        };
        for alternative in alternatives {
            self.walk(alternative, true, &inner)?;
        }
        Ok(())
    }
}

/// Symbols declared by more than one alternative, in declaration order.
/// They hold whichever alternative is taken, so they neither conflict nor
/// require their siblings.
fn shared_symbols(alternatives: &[GrammarNode]) -> Vec<Symbol> {
    let mut shared: Vec<Symbol> = Vec::new();
    for (i, alternative) in alternatives.iter().enumerate() {
        for symbol in alternative.symbols() {
            let elsewhere = alternatives
                .iter()
                .enumerate()
                .any(|(j, other)| j != i && other.symbols().contains(&symbol));
            if elsewhere && !shared.contains(symbol) {
                shared.push(symbol.clone());
            }
        }
    }
    shared
}

/// The symbol of a non-folded leaf that is a direct element of a sequence.
fn direct_single_symbol(node: &GrammarNode) -> Option<&Symbol> {
    match node {
        GrammarNode::Leaf(Leaf {
            symbol: LeafSymbol::Single(symbol),
            ..
        }) => Some(symbol),
        _ => None,
    }
}

/// Guards for optionals nested directly in `children`: each direct leaf, or
/// the first direct choice when there are none.
fn guards_of(children: &[GrammarNode]) -> Vec<Target> {
    let leaves: Vec<Target> = children
        .iter()
        .filter_map(direct_single_symbol)
        .map(|symbol| Target::Symbol(symbol.clone()))
        .collect();
    if !leaves.is_empty() {
        return leaves;
    }
    children
        .iter()
        .find_map(|child| match child {
            GrammarNode::Choice { alternatives, .. } => Some(Target::Compound(
                CompoundDescriptor::of_choice(child, alternatives),
            )),
            _ => None,
        })
        .into_iter()
        .collect()
}

/// Ordered from the easiest to bind to the hardest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Arity {
    Required,
    Optional,
    Repeated,
}

/// The loosest arity of any positional under `node`, if it binds any.
fn positional_arity(node: &GrammarNode) -> Option<Arity> {
    match node {
        GrammarNode::Leaf(leaf) => leaf
            .symbol
            .symbols()
            .iter()
            .any(Symbol::is_positional)
            .then_some(Arity::Required),
        GrammarNode::Optional(body) => positional_arity(body).map(|_| Arity::Optional),
        GrammarNode::Repeated(body) => positional_arity(body).map(|_| Arity::Repeated),
        GrammarNode::Sequence(children) => children.iter().filter_map(positional_arity).max(),
        GrammarNode::Choice { alternatives, .. } => {
            alternatives.iter().filter_map(positional_arity).max()
        }
    }
}

fn first_positional_pos(node: &GrammarNode) -> Option<usize> {
    node.leaves()
        .into_iter()
        .find(|leaf| leaf.symbol.symbols().iter().any(Symbol::is_positional))
        .map(|leaf| leaf.pos)
}

/// Every alternative of a choice must bind the same positionals, so words
/// bind to the same slots whichever alternative the user picked.
fn check_choice_positionals(alternatives: &[GrammarNode]) -> Result<(), GrammarError> {
    let bound = |alternative: &GrammarNode| -> BTreeSet<Symbol> {
        alternative
            .symbols()
            .into_iter()
            .filter(|symbol| symbol.is_positional())
            .cloned()
            .collect()
    };
    let Some((first, rest)) = alternatives.split_first() else {
        return Ok(());
    };
    let expected = bound(first);
    if rest.iter().all(|alternative| bound(alternative) == expected) {
        return Ok(());
    }
    let pos = alternatives
        .iter()
        .find_map(first_positional_pos)
        .unwrap_or_default();
    Err(GrammarError::new(
        pos,
        GrammarErrorReason::ChoicePositionalMismatch,
    ))
}

fn check_positional_arity(children: &[GrammarNode]) -> Result<(), GrammarError> {
    let elements: Vec<(Arity, usize)> = children
        .iter()
        .filter_map(|child| Some((positional_arity(child)?, first_positional_pos(child)?)))
        .collect();

    let has_optional = elements.iter().any(|(arity, _)| *arity == Arity::Optional);
    let last = elements.len().saturating_sub(1);
    let mut repeated_seen = false;

    for (idx, &(arity, pos)) in elements.iter().enumerate() {
        if arity == Arity::Repeated {
            if repeated_seen {
                return Err(GrammarError::new(
                    pos,
                    GrammarErrorReason::MultipleRepeatedPositionals,
                ));
            }
            repeated_seen = true;
        }
        if arity == Arity::Required || idx == last {
            continue;
        }
        let leading_repeated = arity == Arity::Repeated && idx == 0 && !has_optional;
        if !leading_repeated {
            return Err(GrammarError::new(
                pos,
                GrammarErrorReason::InteriorOptionalPositional,
            ));
        }
    }
    Ok(())
}

fn collect_positionals(node: &GrammarNode, repeated: bool, out: &mut Vec<PositionalSlot>) {
    match node {
        GrammarNode::Sequence(children) => children
            .iter()
            .for_each(|child| collect_positionals(child, repeated, out)),
        GrammarNode::Choice { alternatives, .. } => alternatives
            .iter()
            .for_each(|alt| collect_positionals(alt, repeated, out)),
        GrammarNode::Optional(body) => collect_positionals(body, repeated, out),
        GrammarNode::Repeated(body) => collect_positionals(body, true, out),
        GrammarNode::Leaf(leaf) => {
            for symbol in leaf.symbol.symbols().iter().filter(|s| s.is_positional()) {
                if !out.iter().any(|slot| &slot.symbol == symbol) {
                    out.push(PositionalSlot {
                        symbol: symbol.clone(),
                        repeated,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled(spec: &str) -> CompiledGrammar {
        CompiledGrammar::from_spec(spec).expect("spec should compile")
    }

    fn sym(notation: &str) -> Symbol {
        notation.parse().expect("valid symbol")
    }

    fn kinds_against(compiled: &CompiledGrammar, subject: &str) -> Vec<(ConditionKind, String)> {
        compiled
            .conditions_for(&sym(subject))
            .iter()
            .map(|c| (c.kind, c.other.to_string()))
            .collect()
    }

    fn count_conflicts(compiled: &CompiledGrammar) -> usize {
        compiled
            .entries()
            .iter()
            .flat_map(|entry| &entry.conditions)
            .filter(|c| c.kind == ConditionKind::ConflictsWith)
            .count()
    }

    #[test]
    fn test_exclusive_choice_compiles_mirrored_pairs() {
        // C(n, 2) unordered pairs, each mirrored.
        for (spec, pairs) in [("(-a|-b)", 1), ("(-a|-b|-c)", 3), ("(-a|-b|-c|-d)", 6)] {
            assert_eq!(count_conflicts(&compiled(spec)), pairs * 2, "spec: {spec}");
        }
    }

    #[test]
    fn test_optional_sequence_requires_siblings() {
        let compiled = compiled("[-a -b -c]");
        assert_eq!(
            kinds_against(&compiled, "-b"),
            vec![
                (ConditionKind::RequiredIf, "-a".to_string()),
                (ConditionKind::RequiredIf, "-c".to_string()),
            ]
        );
    }

    #[test]
    fn test_nested_optional_guard_is_one_level() {
        let compiled = compiled("[-a [-b [-c]]]");
        let only_option = ConditionKind::OnlyValidIf {
            phrasing: GuardPhrasing::OnlyAnOption,
        };
        assert_eq!(kinds_against(&compiled, "-b"), vec![(only_option, "-a".into())]);
        assert_eq!(kinds_against(&compiled, "-c"), vec![(only_option, "-b".into())]);
    }

    #[test]
    fn test_optional_choice_uses_only_valid_phrasing() {
        let compiled = compiled("[-R [-H | -L | -P]]");
        let conditions = compiled.conditions_for(&sym("-H"));
        assert!(conditions.iter().any(|c| c.kind
            == ConditionKind::OnlyValidIf {
                phrasing: GuardPhrasing::OnlyValid
            }
            && c.other == Target::Symbol(sym("-R"))));
        assert!(compiled.conditions_for(&sym("-R")).is_empty());
    }

    #[test]
    fn test_choice_guard_becomes_compound_descriptor() {
        let compiled = compiled("[(-a|-b) [-c]]");
        let conditions = compiled.conditions_for(&sym("-c"));
        assert_eq!(conditions.len(), 1);
        let Target::Compound(compound) = &conditions[0].other else {
            panic!("expected a compound guard, got {:?}", conditions[0].other);
        };
        assert_eq!(compound.notation, "(-a|-b)");
        assert!(compound.is_satisfied(|s| *s == sym("-b")));
        assert!(!compound.is_satisfied(|s| *s == sym("-c")));
    }

    #[test]
    fn test_root_leaves_are_unconditionally_required() {
        let compiled = compiled("[-d|--rm] <IMAGE> [<COMMAND> [<ARG>...]]");
        let image = compiled.conditions_for(&sym("<IMAGE>"));
        assert_eq!(image.len(), 1);
        assert!(image[0].is_unconditional());
        assert!(compiled.conditions_for(&sym("<COMMAND>")).is_empty());
        assert_eq!(
            kinds_against(&compiled, "<ARG>"),
            vec![(
                ConditionKind::OnlyValidIf {
                    phrasing: GuardPhrasing::OnlyAnOption
                },
                "<COMMAND>".to_string()
            )]
        );
    }

    #[test]
    fn test_repeated_terms_are_never_required() {
        let compiled = compiled("-v... <SRC> <FILE>...");
        assert!(compiled.conditions_for(&sym("-v")).is_empty());
        assert!(compiled.conditions_for(&sym("<FILE>")).is_empty());
        assert!(compiled.conditions_for(&sym("<SRC>"))[0].is_unconditional());
    }

    #[test]
    fn test_required_root_choice_attaches_compound_to_first_leaf() {
        let compiled = compiled("(-a | -b) <X>");
        let first = compiled.conditions_for(&sym("-a"));
        assert!(first.iter().any(|c| c.is_unconditional()
            && matches!(&c.other, Target::Compound(d) if d.notation == "(-a|-b)")));
        assert!(!compiled.conditions_for(&sym("-b")).iter().any(|c| c.is_unconditional()));
    }

    #[test]
    fn test_bare_choice_in_optional_body_depends_on_siblings() {
        let compiled = compiled("[-a (-b|-c)]");
        let required = compiled.conditions_for(&sym("-a"));
        assert_eq!(required.len(), 1);
        assert_eq!(required[0].kind, ConditionKind::RequiredIf);
        assert!(!required[0].is_unconditional());
        assert!(matches!(&required[0].other, Target::Compound(d) if d.notation == "(-b|-c)"));

        let only_valid = ConditionKind::OnlyValidIf {
            phrasing: GuardPhrasing::OnlyValid,
        };
        assert_eq!(
            kinds_against(&compiled, "-b"),
            vec![
                (ConditionKind::ConflictsWith, "-c".to_string()),
                (only_valid, "-a".to_string()),
            ]
        );
    }

    #[test]
    fn test_symbols_shared_by_alternatives_never_conflict() {
        let compiled = compiled("(-x <FILE> | -y <FILE>)");
        assert_eq!(count_conflicts(&compiled), 2);
        assert!(compiled.conditions_for(&sym("<FILE>")).is_empty());
        assert_eq!(
            kinds_against(&compiled, "-y"),
            vec![
                (ConditionKind::ConflictsWith, "-x".to_string()),
                (ConditionKind::RequiredIf, "<FILE>".to_string()),
            ]
        );
    }

    #[test]
    fn test_folded_options_are_never_paired() {
        let compiled = compiled("[-rm -x]");
        assert!(compiled.conditions_for(&sym("-r")).is_empty());
        assert!(compiled.conditions_for(&sym("-x")).is_empty());
    }

    #[test]
    fn test_required_folded_leaf_needs_any_one_letter() {
        let compiled = compiled("-rm <X>");
        let first = compiled.conditions_for(&sym("-r"));
        assert_eq!(first.len(), 1);
        assert!(first[0].is_unconditional());
        let Target::Compound(compound) = &first[0].other else {
            panic!("expected a compound requirement, got {:?}", first[0].other);
        };
        assert_eq!(compound.notation, "-rm");
        assert!(compound.is_satisfied(|s| *s == sym("-m")));
        assert!(!compound.is_satisfied(|s| *s == sym("<X>")));
        assert!(compiled.conditions_for(&sym("-m")).is_empty());
    }

    #[test]
    fn test_symbols_keep_declaration_order() {
        let compiled = compiled("-b [-a] <F> --");
        let symbols: Vec<String> = compiled.symbols().map(Symbol::to_string).collect();
        assert_eq!(symbols, vec!["-b", "-a", "<F>", "--"]);
        assert_eq!(compiled.position(&sym("<F>")), Some(2));
    }

    #[test]
    fn test_positional_arity_policy() {
        assert!(CompiledGrammar::from_spec("<SRC>... <DST>").is_ok());
        assert!(CompiledGrammar::from_spec("<A> [<B>]").is_ok());
        assert!(CompiledGrammar::from_spec("(-x <A> | -y <A>) <B>").is_ok());
        let cases = [
            ("<a>... <b>...", 7, GrammarErrorReason::MultipleRepeatedPositionals),
            ("[<a>] <b>", 1, GrammarErrorReason::InteriorOptionalPositional),
            ("<a>... [<b>]", 0, GrammarErrorReason::InteriorOptionalPositional),
            ("<A> (<B>... | -x) <C>", 5, GrammarErrorReason::InteriorOptionalPositional),
            ("(-x <A> | -y <B>)", 4, GrammarErrorReason::ChoicePositionalMismatch),
            ("[-x <A> | -y]", 4, GrammarErrorReason::ChoicePositionalMismatch),
            ("[-v (-x <A> | <B>)]", 8, GrammarErrorReason::ChoicePositionalMismatch),
        ];
        for (spec, pos, reason) in cases {
            assert_eq!(
                CompiledGrammar::from_spec(spec).unwrap_err(),
                SpecError::Grammar(GrammarError::new(pos, reason)),
                "spec: {spec}"
            );
        }
    }

    #[test]
    fn test_positional_slots_mark_repetition() {
        let compiled = compiled("<SRC>... <DST>");
        assert_eq!(
            compiled.positionals(),
            &[
                PositionalSlot {
                    symbol: sym("<SRC>"),
                    repeated: true
                },
                PositionalSlot {
                    symbol: sym("<DST>"),
                    repeated: false
                },
            ]
        );
    }
}
