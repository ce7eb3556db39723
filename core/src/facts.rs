//! Presence facts: the boolean/occurrence view of one invocation.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::compile::CompiledGrammar;
use crate::spool::ArgsSpool;
use crate::symbol::Symbol;

/// Occurrence counts per symbol, plus positional words no slot accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PresenceFacts {
    counts: BTreeMap<Symbol, usize>,
    /// Words bound to each positional symbol, in argv order.
    bindings: BTreeMap<Symbol, Vec<String>>,
    surplus: Vec<String>,
}

impl PresenceFacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds facts where each listed symbol occurred once.
    pub fn with_present<I>(symbols: I) -> Self
    where
        I: IntoIterator<Item = Symbol>,
    {
        let mut facts = Self::new();
        for symbol in symbols {
            facts.record(symbol, 1);
        }
        facts
    }

    /// Adds `count` occurrences of `symbol`.
    pub fn record(&mut self, symbol: Symbol, count: usize) {
        if count > 0 {
            *self.counts.entry(symbol).or_default() += count;
        }
    }

    pub fn count(&self, symbol: &Symbol) -> usize {
        self.counts.get(symbol).copied().unwrap_or(0)
    }

    pub fn is_present(&self, symbol: &Symbol) -> bool {
        self.count(symbol) > 0
    }

    /// Every present symbol, in symbol order.
    pub fn present(&self) -> impl Iterator<Item = &Symbol> {
        self.counts.keys()
    }

    pub fn bindings(&self) -> &BTreeMap<Symbol, Vec<String>> {
        &self.bindings
    }

    /// Positional words that no declared positional accepted.
    pub fn surplus(&self) -> &[String] {
        &self.surplus
    }

    /// Option and terminator facts only, with no positional binding.
    ///
    /// Mode guards are judged on this view, before a mode (and therefore a
    /// positional layout) has been chosen.
    pub fn from_options(spool: &ArgsSpool) -> Self {
        let mut facts = Self::new();
        for (&letter, &count) in &spool.short_opts {
            facts.record(Symbol::Short(letter), count);
        }
        for (name, values) in &spool.long_opts {
            facts.record(Symbol::Long(name.clone()), values.len());
        }
        if spool.terminated {
            facts.record(Symbol::DoubleDash, 1);
        }
        facts
    }

    /// Full facts for `spool` against a compiled grammar, binding bare
    /// words to its positional symbols.
    ///
    /// With a leading repeated positional, the trailing positionals take
    /// words from the end first and the repeated slot keeps the rest.
    /// Otherwise slots are filled in declaration order and a repeated slot
    /// absorbs everything left. Words no slot accepts are surplus.
    ///
    /// # Examples
    ///
    /// ```
    /// use argspec_core::{ArgsSpool, CompiledGrammar, PresenceFacts, Symbol};
    ///
    /// let compiled = CompiledGrammar::from_spec("<SRC>... <DST>").unwrap();
    /// let spool = ArgsSpool::parse(["a", "b", "c"]);
    /// let facts = PresenceFacts::from_spool(&spool, &compiled);
    /// assert_eq!(facts.count(&Symbol::Positional("SRC".into())), 2);
    /// assert_eq!(facts.count(&Symbol::Positional("DST".into())), 1);
    /// ```
    pub fn from_spool(spool: &ArgsSpool, compiled: &CompiledGrammar) -> Self {
        let mut facts = Self::from_options(spool);
        let mut words: Vec<&str> = spool.words().collect();
        let slots = compiled.positionals();

        match slots.split_first() {
            Some((lead, rest)) if lead.repeated => {
                for slot in rest.iter().rev() {
                    let Some(word) = words.pop() else {
                        break;
                    };
                    facts.bind(&slot.symbol, vec![word]);
                }
                facts.bind(&lead.symbol, words);
            }
            _ => {
                let mut remaining = words.into_iter();
                for slot in slots {
                    if slot.repeated {
                        facts.bind(&slot.symbol, remaining.by_ref().collect());
                    } else if let Some(word) = remaining.next() {
                        facts.bind(&slot.symbol, vec![word]);
                    }
                }
                facts.surplus = remaining.map(str::to_string).collect();
            }
        }
        facts
    }

    fn bind(&mut self, symbol: &Symbol, words: Vec<&str>) {
        if words.is_empty() {
            return;
        }
        self.record(symbol.clone(), words.len());
        self.bindings
            .entry(symbol.clone())
            .or_default()
            .extend(words.into_iter().map(str::to_string));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positional(name: &str) -> Symbol {
        Symbol::Positional(name.to_string())
    }

    fn facts_for(spec: &str, args: &[&str]) -> PresenceFacts {
        let compiled = CompiledGrammar::from_spec(spec).expect("spec should compile");
        PresenceFacts::from_spool(&ArgsSpool::parse(args), &compiled)
    }

    #[test]
    fn test_from_options_counts_shorts_longs_and_terminator() {
        let spool = ArgsSpool::parse(["-vv", "--rm", "--rm", "--", "x"]);
        let facts = PresenceFacts::from_options(&spool);
        assert_eq!(facts.count(&Symbol::Short('v')), 2);
        assert_eq!(facts.count(&Symbol::Long("rm".into())), 2);
        assert!(facts.is_present(&Symbol::DoubleDash));
        assert!(!facts.is_present(&positional("x")));
    }

    #[test]
    fn test_from_spool_fills_slots_greedily() {
        let facts = facts_for("<IMAGE> [<COMMAND> [<ARG>...]]", &["ubuntu", "ls", "-l", "/tmp"]);
        assert_eq!(facts.count(&positional("IMAGE")), 1);
        assert_eq!(facts.count(&positional("COMMAND")), 1);
        assert_eq!(facts.count(&positional("ARG")), 1);
        assert_eq!(facts.bindings()[&positional("ARG")], ["/tmp"]);
        assert!(facts.surplus().is_empty());
    }

    #[test]
    fn test_from_spool_binds_trailing_slots_from_the_end() {
        let facts = facts_for("<SRC>... <DIR> <DST>", &["a", "b", "c", "d"]);
        assert_eq!(facts.bindings()[&positional("SRC")], ["a", "b"]);
        assert_eq!(facts.bindings()[&positional("DIR")], ["c"]);
        assert_eq!(facts.bindings()[&positional("DST")], ["d"]);
    }

    #[test]
    fn test_from_spool_leaves_missing_slots_absent() {
        let facts = facts_for("<SRC>... <DST>", &[]);
        assert!(!facts.is_present(&positional("SRC")));
        assert!(!facts.is_present(&positional("DST")));
    }

    #[test]
    fn test_from_spool_reports_surplus_words() {
        let facts = facts_for("<A> [<B>]", &["1", "2", "3", "4"]);
        assert_eq!(facts.surplus(), ["3", "4"]);
    }

    #[test]
    fn test_from_spool_binds_post_terminator_words() {
        let facts = facts_for("<A> [--] [<B>]", &["--", "-x"]);
        assert!(facts.is_present(&Symbol::DoubleDash));
        assert_eq!(facts.bindings()[&positional("A")], ["-x"]);
        assert!(!facts.is_present(&Symbol::Short('x')));
    }
}
