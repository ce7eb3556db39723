//! Recognition engine: evaluates compiled conditions against presence facts.
//!
//! Recognition never fails. It returns every violated condition, ordered by
//! the declaring symbol and then by compile order, and an empty list means
//! the invocation is accepted.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::compile::{CompiledGrammar, ConditionKind, SatisfactionCondition, Target};
use crate::facts::PresenceFacts;
use crate::symbol::Symbol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Required,
    Conflict,
    OnlyValid,
    UnrecognizedOption,
    SurplusArgument,
    NoMatchingMode,
    AmbiguousMode,
}

/// One user-facing violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    /// `(symbol index, condition index)` for condition failures. Extra
    /// checks sort after every declared symbol.
    pub order_key: (usize, usize),
}

impl Diagnostic {
    pub fn new(
        kind: DiagnosticKind,
        message: impl Into<String>,
        order_key: (usize, usize),
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            order_key,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Checks beyond the compiled conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionOptions {
    /// Report options the grammar does not declare.
    pub reject_unknown_options: bool,
    /// Report positional words no declared positional accepted.
    pub reject_surplus_positionals: bool,
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self {
            reject_unknown_options: true,
            reject_surplus_positionals: true,
        }
    }
}

impl RecognitionOptions {
    /// Only the compiled conditions are evaluated.
    pub fn conditions_only() -> Self {
        Self {
            reject_unknown_options: false,
            reject_surplus_positionals: false,
        }
    }
}

/// Which mode of a multi-mode command a recognition runs in, used to
/// prefix constraint messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeContext {
    pub command: String,
    pub mode: String,
    /// How the mode was picked, e.g. `'-d' existing`.
    pub indicated_by: Option<String>,
}

impl ModeContext {
    fn prefix(&self) -> String {
        match &self.indicated_by {
            Some(desc) => format!(
                "When using '{}' in {} style (indicated by {desc}), ",
                self.command, self.mode
            ),
            None => format!("When using '{}' in {} style, ", self.command, self.mode),
        }
    }
}

/// Evaluates only the compiled conditions.
///
/// # Examples
///
/// ```
/// use argspec_core::{recognize, CompiledGrammar, PresenceFacts, Symbol};
///
/// let compiled = CompiledGrammar::from_spec("(-a | -b)").unwrap();
/// let facts = PresenceFacts::with_present([Symbol::Short('a'), Symbol::Short('b')]);
/// let diagnostics = recognize(&compiled, &facts);
/// assert_eq!(diagnostics.len(), 1);
/// assert_eq!(
///     diagnostics[0].message,
///     "When '-a' is present, '-b' is conflicting and not allowed"
/// );
/// ```
pub fn recognize(compiled: &CompiledGrammar, facts: &PresenceFacts) -> Vec<Diagnostic> {
    Recognizer::new(compiled)
        .with_options(RecognitionOptions::conditions_only())
        .run(facts)
}

/// Evaluates the compiled conditions, then the checks enabled in `options`.
pub fn recognize_with(
    compiled: &CompiledGrammar,
    facts: &PresenceFacts,
    options: &RecognitionOptions,
) -> Vec<Diagnostic> {
    Recognizer::new(compiled).with_options(*options).run(facts)
}

/// Configurable recognition against one compiled grammar.
#[derive(Debug, Clone)]
pub struct Recognizer<'a> {
    compiled: &'a CompiledGrammar,
    options: RecognitionOptions,
    context: Option<&'a ModeContext>,
}

/// A failed condition before it is rendered.
struct Violation {
    kind: DiagnosticKind,
    /// Subject clause of the "When 'S' is present, ..." form.
    when_present: Option<String>,
    main: String,
}

impl<'a> Recognizer<'a> {
    pub fn new(compiled: &'a CompiledGrammar) -> Self {
        Self {
            compiled,
            options: RecognitionOptions::default(),
            context: None,
        }
    }

    pub fn with_options(mut self, options: RecognitionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn in_mode(mut self, context: &'a ModeContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn run(&self, facts: &PresenceFacts) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        for (symbol_idx, entry) in self.compiled.entries().iter().enumerate() {
            let present = facts.is_present(&entry.symbol);
            for (condition_idx, condition) in entry.conditions.iter().enumerate() {
                if !present && !condition.is_unconditional() {
                    continue;
                }
                if let Some(violation) = self.evaluate(condition, present, facts) {
                    diagnostics.push(Diagnostic::new(
                        violation.kind,
                        self.render(&violation),
                        (symbol_idx, condition_idx),
                    ));
                }
            }
        }

        let tail = self.compiled.entries().len();
        if self.options.reject_unknown_options {
            let unknown = facts
                .present()
                .filter(|symbol| symbol.is_option() && !self.compiled.declares(symbol));
            for (idx, symbol) in unknown.enumerate() {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::UnrecognizedOption,
                    format!("'{symbol}' is not a recognized option"),
                    (tail, idx),
                ));
            }
        }
        if self.options.reject_surplus_positionals {
            for (idx, word) in facts.surplus().iter().enumerate() {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::SurplusArgument,
                    format!("unexpected argument '{word}'"),
                    (tail + 1, idx),
                ));
            }
        }

        debug!(
            spec = self.compiled.spec(),
            diagnostics = diagnostics.len(),
            "Recognized invocation"
        );
        diagnostics
    }

    fn evaluate(
        &self,
        condition: &SatisfactionCondition,
        present: bool,
        facts: &PresenceFacts,
    ) -> Option<Violation> {
        let subject = &condition.subject;
        let holds = |symbol: &Symbol| facts.is_present(symbol);

        match (condition.kind, &condition.other) {
            (ConditionKind::RequiredIf, Target::None) => (!present).then(|| Violation {
                kind: DiagnosticKind::Required,
                when_present: None,
                main: format!("'{subject}' is required"),
            }),
            (ConditionKind::RequiredIf, Target::Compound(compound)) => {
                (!compound.is_satisfied(holds)).then(|| Violation {
                    kind: DiagnosticKind::Required,
                    when_present: (!condition.is_unconditional()).then(|| subject.to_string()),
                    main: format!("'{}' is required", compound.notation),
                })
            }
            (ConditionKind::RequiredIf, Target::Symbol(other)) => {
                (!facts.is_present(other)).then(|| Violation {
                    kind: DiagnosticKind::Required,
                    when_present: Some(subject.to_string()),
                    main: format!("'{other}' is required"),
                })
            }
            (ConditionKind::ConflictsWith, Target::Symbol(other)) => {
                // Mirrored conflicts compile both ways; only the direction
                // whose subject is declared first reports.
                let reports = self.compiled.position(subject) < self.compiled.position(other);
                (reports && facts.is_present(other)).then(|| Violation {
                    kind: DiagnosticKind::Conflict,
                    when_present: Some(subject.to_string()),
                    main: format!("'{other}' is conflicting and not allowed"),
                })
            }
            (ConditionKind::ConflictsWith, _) => None,
            (ConditionKind::OnlyValidIf { phrasing }, Target::Symbol(guard)) => {
                (!facts.is_present(guard)).then(|| Violation {
                    kind: DiagnosticKind::OnlyValid,
                    when_present: None,
                    main: format!(
                        "'{subject}' is {} when '{guard}' is present",
                        phrasing.as_str()
                    ),
                })
            }
            (ConditionKind::OnlyValidIf { phrasing }, Target::Compound(compound)) => {
                (!compound.is_satisfied(holds)).then(|| Violation {
                    kind: DiagnosticKind::OnlyValid,
                    when_present: None,
                    main: format!(
                        "'{subject}' is {} when '{}' is satisfied",
                        phrasing.as_str(),
                        compound.notation
                    ),
                })
            }
            (ConditionKind::OnlyValidIf { .. }, Target::None) => None,
        }
    }

    fn render(&self, violation: &Violation) -> String {
        match (self.context, &violation.when_present) {
            (None, None) => violation.main.clone(),
            (None, Some(subject)) => format!("When '{subject}' is present, {}", violation.main),
            (Some(context), None) => format!("{}{}", context.prefix(), violation.main),
            (Some(context), Some(subject)) => format!(
                "{}and '{subject}' is present, {}",
                context.prefix(),
                violation.main
            ),
        }
    }
}
