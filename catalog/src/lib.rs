//! Command catalogs for argspec.
//!
//! A catalog names the commands a tool accepts, their aliases, and one or
//! more usage grammars per command (see [`argspec_core::CommandMode`]). It
//! is loaded from YAML or JSON and validated up front, so grammar errors
//! surface at startup rather than on the first invocation.
//!
//! # Quick start
//!
//! ```no_run
//! use argspec_catalog::Catalog;
//!
//! let catalog = Catalog::load("commands.yml").unwrap();
//! let outcome = catalog.recognize("branch", ["-d", "topic"]).unwrap();
//! for diagnostic in &outcome.diagnostics {
//!     eprintln!("{}", diagnostic.message);
//! }
//! ```

mod catalog;
mod error;

pub use catalog::Catalog;
pub use error::{CatalogError, Result};
