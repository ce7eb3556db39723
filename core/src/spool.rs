//! Raw argv split into the buckets recognition works from.

use std::collections::BTreeMap;

use serde::Serialize;

/// One pass over raw process arguments.
///
/// Values are kept so callers can retrieve them, but recognition only looks
/// at presence and occurrence counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArgsSpool {
    /// Bare words before any `--` terminator.
    pub positional: Vec<String>,
    /// Words after the `--` terminator, never treated as options.
    pub after_terminator: Vec<String>,
    /// Whether a `--` terminator was seen.
    pub terminated: bool,
    /// Occurrence count per short option letter.
    pub short_opts: BTreeMap<char, usize>,
    /// Values per long option, one entry per occurrence (`""` for a bare
    /// `--flag`).
    pub long_opts: BTreeMap<String, Vec<String>>,
}

impl ArgsSpool {
    /// Splits `args` (without the program name).
    ///
    /// # Examples
    ///
    /// ```
    /// use argspec_core::ArgsSpool;
    ///
    /// let spool = ArgsSpool::parse(["-vv", "--name=x", "--name", "file", "--", "-q"]);
    /// assert_eq!(spool.short_opts[&'v'], 2);
    /// assert_eq!(spool.long_opts["name"], vec!["x".to_string(), String::new()]);
    /// assert_eq!(spool.positional, vec!["file".to_string()]);
    /// assert_eq!(spool.after_terminator, vec!["-q".to_string()]);
    /// ```
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut spool = Self::default();
        for arg in args {
            let arg = arg.as_ref();
            if spool.terminated {
                spool.after_terminator.push(arg.to_string());
            } else if arg == "--" {
                spool.terminated = true;
            } else if let Some(long) = arg.strip_prefix("--") {
                let (key, value) = long.split_once('=').unwrap_or((long, ""));
                spool
                    .long_opts
                    .entry(key.to_string())
                    .or_default()
                    .push(value.to_string());
            } else if let Some(shorts) = arg.strip_prefix('-').filter(|rest| !rest.is_empty()) {
                // `-p=value` counts only the letters before `=`.
                let letters = shorts.split_once('=').map_or(shorts, |(letters, _)| letters);
                for c in letters.chars() {
                    *spool.short_opts.entry(c).or_default() += 1;
                }
            } else {
                spool.positional.push(arg.to_string());
            }
        }
        spool
    }

    /// Bare words followed by post-terminator words, in order.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.positional
            .iter()
            .chain(&self.after_terminator)
            .map(String::as_str)
    }

    pub fn short_count(&self, letter: char) -> usize {
        self.short_opts.get(&letter).copied().unwrap_or(0)
    }

    /// All values recorded for `--name`, in order.
    pub fn long_values(&self, name: &str) -> &[String] {
        match self.long_opts.get(name) {
            Some(values) => values,
            None => &[],
        }
    }
}
