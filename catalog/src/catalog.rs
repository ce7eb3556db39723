//! Command catalog: the commands a tool accepts and their usage grammars.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1.0"
//! commands:
//!   - name: docker-run
//!     aliases: [run]
//!     modes:
//!       - name: default
//!         spec: "[-d|--rm] <IMAGE> [<COMMAND> [<ARG>...]]"
//!   - name: branch
//!     modes:
//!       - name: list
//!         spec: "[-l] [-a|-r]"
//!         guard: { option_exists: "-l" }
//!       - name: delete
//!         spec: "(-d | -D) <BRANCH>..."
//!         guard: { one_of: ["-d", "-D"] }
//!         indicated_by: "'-d' or '-D' existing"
//! recognition:
//!   reject_unknown_options: true
//!   reject_surplus_positionals: true
//! ```

use std::collections::HashSet;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use argspec_core::{
    ArgsSpool, Command, ModeGuard, Recognition, RecognitionOptions, compile_cached,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CatalogError, Result};

/// Top-level catalog file.
///
/// # Examples
///
/// ```
/// use argspec_catalog::Catalog;
///
/// let catalog = Catalog::from_yaml_str(r#"
/// version: "1.0"
/// commands:
///   - name: cp
///     modes:
///       - name: default
///         spec: "[-r] <SRC> <DST>"
/// "#).unwrap();
///
/// let outcome = catalog.recognize("cp", ["-r", "src", "dest"]).unwrap();
/// assert!(outcome.is_accepted());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Catalog format version (e.g., `"1.0"`).
    pub version: String,
    pub commands: Vec<Command>,
    /// Checks applied on top of each grammar's compiled conditions.
    #[serde(default)]
    pub recognition: RecognitionOptions,
}

impl Catalog {
    /// Loads and validates a catalog, picking JSON for `.json` files and
    /// YAML otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](CatalogError::IoError) if the file cannot be
    /// read, a parse error for malformed content, or the first validation
    /// failure (see [`Catalog::validate`]).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let catalog: Self = if is_json(path) {
            serde_json::from_reader(reader)?
        } else {
            serde_yaml::from_reader(reader)?
        };
        catalog.validate()?;
        debug!(
            path = %path.display(),
            commands = catalog.commands.len(),
            "Loaded command catalog"
        );
        Ok(catalog)
    }

    /// Parses and validates a YAML catalog.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let catalog: Self = serde_yaml::from_str(yaml)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parses and validates a JSON catalog.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let catalog: Self = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Saves the catalog, as JSON for `.json` paths and YAML otherwise.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        if is_json(path) {
            serde_json::to_writer_pretty(writer, self)?;
        } else {
            serde_yaml::to_writer(writer, self)?;
        }
        Ok(())
    }

    /// Checks the catalog for author errors.
    ///
    /// Every mode's grammar is compiled (and memoized), so a catalog that
    /// validates never fails to compile during recognition.
    pub fn validate(&self) -> Result<()> {
        if self.version.trim().is_empty() {
            return Err(invalid("version must not be empty"));
        }

        let mut names = HashSet::new();
        for command in &self.commands {
            if command.name.trim().is_empty() {
                return Err(invalid("command name must not be empty"));
            }
            for name in std::iter::once(&command.name).chain(&command.aliases) {
                if name.trim().is_empty() {
                    return Err(invalid(format!("command '{}' has an empty alias", command.name)));
                }
                if !names.insert(name.as_str()) {
                    return Err(invalid(format!("duplicate command name or alias '{name}'")));
                }
            }
            self.validate_modes(command)?;
        }
        Ok(())
    }

    fn validate_modes(&self, command: &Command) -> Result<()> {
        if command.modes.is_empty() {
            return Err(invalid(format!("command '{}' has no modes", command.name)));
        }

        let mut modes = HashSet::new();
        for mode in &command.modes {
            if !modes.insert(mode.name.as_str()) {
                return Err(invalid(format!(
                    "command '{}' declares mode '{}' twice",
                    command.name, mode.name
                )));
            }
            if command.modes.len() > 1 && mode.guard == ModeGuard::Always {
                return Err(invalid(format!(
                    "mode '{}' of '{}' needs a guard (the command has several modes)",
                    mode.name, command.name
                )));
            }
            compile_cached(&mode.spec).map_err(|source| CatalogError::InvalidSpec {
                command: command.name.clone(),
                mode: mode.name.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Finds a command by name or alias.
    pub fn find(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|command| command.answers_to(name))
    }

    /// Recognizes `args` (without the command name) against `command`.
    pub fn recognize<I, S>(&self, command: &str, args: I) -> Result<Recognition>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let found = self
            .find(command)
            .ok_or_else(|| CatalogError::UnknownCommand(command.to_string()))?;
        let spool = ArgsSpool::parse(args);
        Ok(found.recognize(&spool, &self.recognition)?)
    }
}

fn invalid(message: impl Into<String>) -> CatalogError {
    CatalogError::InvalidCatalog(message.into())
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
