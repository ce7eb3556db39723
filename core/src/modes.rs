//! Command modes: one command, several grammars, picked by option guards.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::cache::compile_cached;
use crate::error::SpecError;
use crate::facts::PresenceFacts;
use crate::recognize::{Diagnostic, DiagnosticKind, ModeContext, RecognitionOptions, Recognizer};
use crate::spool::ArgsSpool;
use crate::symbol::Symbol;

/// Predicate over option facts that selects a mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeGuard {
    #[default]
    Always,
    OptionExists(Symbol),
    OneOf(Vec<Symbol>),
    AllOf(Vec<Symbol>),
}

impl ModeGuard {
    pub fn matches(&self, facts: &PresenceFacts) -> bool {
        match self {
            Self::Always => true,
            Self::OptionExists(symbol) => facts.is_present(symbol),
            Self::OneOf(symbols) => symbols.iter().any(|s| facts.is_present(s)),
            Self::AllOf(symbols) => symbols.iter().all(|s| facts.is_present(s)),
        }
    }

    /// Human description, e.g. `'-d' or '-D' existing`. `None` for
    /// [`ModeGuard::Always`].
    pub fn describe(&self) -> Option<String> {
        let join = |symbols: &[Symbol], sep: &str| {
            symbols
                .iter()
                .map(|s| format!("'{s}'"))
                .collect::<Vec<_>>()
                .join(sep)
        };
        match self {
            Self::Always => None,
            Self::OptionExists(symbol) => Some(format!("'{symbol}' existing")),
            Self::OneOf(symbols) => Some(format!("{} existing", join(symbols, " or "))),
            Self::AllOf(symbols) => Some(format!("{} existing", join(symbols, " and "))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMode {
    pub name: String,
    /// Usage grammar for this mode.
    pub spec: String,
    #[serde(default)]
    pub guard: ModeGuard,
    /// Overrides the guard description in mode-context messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indicated_by: Option<String>,
}

impl CommandMode {
    pub fn new(name: impl Into<String>, spec: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spec: spec.into(),
            guard: ModeGuard::Always,
            indicated_by: None,
        }
    }

    pub fn with_guard(mut self, guard: ModeGuard) -> Self {
        self.guard = guard;
        self
    }

    fn context(&self, command: &str) -> ModeContext {
        ModeContext {
            command: command.to_string(),
            mode: self.name.clone(),
            indicated_by: self.indicated_by.clone().or_else(|| self.guard.describe()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    pub modes: Vec<CommandMode>,
}

/// Outcome of recognizing one invocation of a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recognition {
    pub command: String,
    /// The selected mode, or `None` when selection failed.
    pub mode: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Recognition {
    pub fn is_accepted(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Mode selection failure. Selection never falls back on declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModeError {
    #[error("no matching mode; available modes: {}", .available.join(", "))]
    NoMatchingMode { available: Vec<String> },
    #[error("ambiguous specification: modes {} all match", .matched.join(", "))]
    Ambiguous { matched: Vec<String> },
}

impl From<ModeError> for Diagnostic {
    fn from(err: ModeError) -> Self {
        let kind = match err {
            ModeError::NoMatchingMode { .. } => DiagnosticKind::NoMatchingMode,
            ModeError::Ambiguous { .. } => DiagnosticKind::AmbiguousMode,
        };
        Diagnostic::new(kind, err.to_string(), (0, 0))
    }
}

/// Picks the single mode whose guard holds against `facts`.
pub fn select_mode<'m>(
    modes: &'m [CommandMode],
    facts: &PresenceFacts,
) -> Result<&'m CommandMode, ModeError> {
    let matched: Vec<&CommandMode> = modes.iter().filter(|m| m.guard.matches(facts)).collect();
    match matched.as_slice() {
        [only] => Ok(*only),
        [] => Err(ModeError::NoMatchingMode {
            available: modes.iter().map(|m| m.name.clone()).collect(),
        }),
        several => Err(ModeError::Ambiguous {
            matched: several.iter().map(|m| m.name.clone()).collect(),
        }),
    }
}

impl Command {
    pub fn new(name: impl Into<String>, modes: Vec<CommandMode>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            modes,
        }
    }

    /// Whether `name` is this command's name or one of its aliases.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|alias| alias == name)
    }

    /// Selects a mode, then recognizes `spool` against its grammar.
    ///
    /// Mode selection failures come back as diagnostics. Only a grammar
    /// that does not compile is an error.
    ///
    /// # Examples
    ///
    /// ```
    /// use argspec_core::{ArgsSpool, Command, CommandMode, ModeGuard, RecognitionOptions};
    ///
    /// let branch = Command::new(
    ///     "branch",
    ///     vec![
    ///         CommandMode::new("list", "[-l] [-a|-r]")
    ///             .with_guard(ModeGuard::OptionExists("-l".parse().unwrap())),
    ///         CommandMode::new("delete", "(-d | -D) <BRANCH>")
    ///             .with_guard(ModeGuard::OneOf(vec!["-d".parse().unwrap(), "-D".parse().unwrap()])),
    ///     ],
    /// );
    /// let spool = ArgsSpool::parse(["-d", "topic"]);
    /// let outcome = branch.recognize(&spool, &RecognitionOptions::default()).unwrap();
    /// assert_eq!(outcome.mode.as_deref(), Some("delete"));
    /// assert!(outcome.is_accepted());
    /// ```
    pub fn recognize(
        &self,
        spool: &ArgsSpool,
        options: &RecognitionOptions,
    ) -> Result<Recognition, SpecError> {
        let option_facts = PresenceFacts::from_options(spool);
        let mode = match select_mode(&self.modes, &option_facts) {
            Ok(mode) => mode,
            Err(err) => {
                debug!(command = %self.name, error = %err, "Mode selection failed");
                return Ok(Recognition {
                    command: self.name.clone(),
                    mode: None,
                    diagnostics: vec![err.into()],
                });
            }
        };
        debug!(command = %self.name, mode = %mode.name, "Selected command mode");

        let compiled = compile_cached(&mode.spec)?;
        let facts = PresenceFacts::from_spool(spool, &compiled);
        let recognizer = Recognizer::new(&compiled).with_options(*options);
        let context = mode.context(&self.name);
        let diagnostics = if self.modes.len() > 1 {
            recognizer.in_mode(&context).run(&facts)
        } else {
            recognizer.run(&facts)
        };

        Ok(Recognition {
            command: self.name.clone(),
            mode: Some(mode.name.clone()),
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(notation: &str) -> Symbol {
        notation.parse().expect("valid symbol")
    }

    fn branch() -> Command {
        Command::new(
            "branch",
            vec![
                CommandMode::new("list", "[-l] [-a|-r]")
                    .with_guard(ModeGuard::OptionExists(sym("-l"))),
                CommandMode::new("delete", "(-d | -D) [-f -r] <BRANCH>")
                    .with_guard(ModeGuard::OneOf(vec![sym("-d"), sym("-D")])),
            ],
        )
    }

    #[test]
    fn test_select_mode_requires_exactly_one_match() {
        let command = branch();
        let facts = PresenceFacts::with_present([sym("-l")]);
        assert_eq!(select_mode(&command.modes, &facts).unwrap().name, "list");

        let none = select_mode(&command.modes, &PresenceFacts::new()).unwrap_err();
        assert_eq!(
            none,
            ModeError::NoMatchingMode {
                available: vec!["list".into(), "delete".into()]
            }
        );

        let both = PresenceFacts::with_present([sym("-l"), sym("-D")]);
        assert_eq!(
            select_mode(&command.modes, &both).unwrap_err().to_string(),
            "ambiguous specification: modes list, delete all match"
        );
    }

    #[test]
    fn test_single_unguarded_mode_always_matches() {
        let modes = vec![CommandMode::new("default", "<IMAGE>")];
        assert!(select_mode(&modes, &PresenceFacts::new()).is_ok());
    }

    #[test]
    fn test_guard_descriptions() {
        assert_eq!(ModeGuard::Always.describe(), None);
        assert_eq!(
            ModeGuard::OneOf(vec![sym("-d"), sym("-D")]).describe().as_deref(),
            Some("'-d' or '-D' existing")
        );
        assert_eq!(
            ModeGuard::AllOf(vec![sym("-a"), sym("--b")]).describe().as_deref(),
            Some("'-a' and '--b' existing")
        );
    }

    #[test]
    fn test_command_recognize_uses_mode_context() {
        let spool = ArgsSpool::parse(["-d", "-f", "topic"]);
        let outcome = branch()
            .recognize(&spool, &RecognitionOptions::default())
            .unwrap();
        assert_eq!(outcome.mode.as_deref(), Some("delete"));
        assert_eq!(
            outcome.diagnostics[0].message,
            "When using 'branch' in delete style (indicated by '-d' or '-D' existing), and '-f' is present, '-r' is required"
        );
    }

    #[test]
    fn test_command_recognize_reports_mode_failure_as_diagnostic() {
        let outcome = branch()
            .recognize(&ArgsSpool::parse(["topic"]), &RecognitionOptions::default())
            .unwrap();
        assert_eq!(outcome.mode, None);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::NoMatchingMode);
    }

    #[test]
    fn test_mode_guard_deserializes_from_tagged_map() {
        let guard: ModeGuard = serde_json::from_str(r#"{"one_of": ["-d", "-D"]}"#).unwrap();
        assert_eq!(guard, ModeGuard::OneOf(vec![sym("-d"), sym("-D")]));
        let mode: CommandMode =
            serde_json::from_str(r#"{"name": "default", "spec": "<X>"}"#).unwrap();
        assert_eq!(mode.guard, ModeGuard::Always);
    }
}
