//! Process-wide memo of compiled grammars keyed by grammar string.
//!
//! Entries are never evicted; the set of grammars a process recognizes
//! against is fixed by its command catalog.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use tracing::debug;

use crate::compile::CompiledGrammar;
use crate::error::Result;

static COMPILED: LazyLock<RwLock<HashMap<String, Arc<CompiledGrammar>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Returns the compiled grammar for `spec`, compiling it on first use.
///
/// Compilation errors are not cached; every call with a broken grammar
/// reports the error again.
pub fn compile_cached(spec: &str) -> Result<Arc<CompiledGrammar>> {
    {
        let cache = COMPILED.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(compiled) = cache.get(spec) {
            debug!(spec, "Compiled grammar cache hit");
            return Ok(Arc::clone(compiled));
        }
    }

    let compiled = Arc::new(CompiledGrammar::from_spec(spec)?);
    debug!(spec, "Compiled grammar cache miss");

    let mut cache = COMPILED.write().unwrap_or_else(PoisonError::into_inner);
    // Another thread may have compiled the same grammar meanwhile.
    let entry = cache.entry(spec.to_string()).or_insert(compiled);
    Ok(Arc::clone(entry))
}

/// Number of grammars currently memoized.
pub fn cached_grammars() -> usize {
    COMPILED
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_cached_returns_shared_instance() {
        let first = compile_cached("[-x [-y]] <cache-test>").unwrap();
        let second = compile_cached("[-x [-y]] <cache-test>").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cached_grammars() >= 1);
    }

    #[test]
    fn test_compile_cached_does_not_memoize_errors() {
        assert!(compile_cached("[-x").is_err());
        assert!(compile_cached("[-x").is_err());
    }
}
