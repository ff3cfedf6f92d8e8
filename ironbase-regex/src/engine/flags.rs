//! Match flags (`i`, `m`, `s`, `x`) and the merge of the two places they can
//! come from: the flags embedded in a regex literal and the separate `options`
//! argument.

use crate::error::{RegexError, Result, ENGINE_OP};
use std::fmt;

/// Resolved per-match flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FlagSet {
    /// `i`
    pub case_insensitive: bool,
    /// `m`: `^` and `$` match at line boundaries
    pub multi_line: bool,
    /// `s`: `.` also matches the line terminator
    pub dot_all: bool,
    /// `x`: whitespace and `#` comments are ignored outside classes
    pub extended: bool,
}

impl FlagSet {
    /// Parse an options string. Only `i`, `m`, `s` and `x` are accepted, case
    /// sensitively; repeating a flag is allowed.
    pub fn parse(options: &str) -> Result<Self> {
        let mut flags = FlagSet::default();
        for flag in options.chars() {
            match flag {
                'i' => flags.case_insensitive = true,
                'm' => flags.multi_line = true,
                's' => flags.dot_all = true,
                'x' => flags.extended = true,
                other => {
                    return Err(RegexError::InvalidOptionFlag {
                        op: ENGINE_OP,
                        flag: other,
                    })
                }
            }
        }
        Ok(flags)
    }

    pub fn is_empty(&self) -> bool {
        *self == FlagSet::default()
    }
}

impl fmt::Display for FlagSet {
    /// Canonical `imsx` ordering
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (set, flag) in [
            (self.case_insensitive, 'i'),
            (self.multi_line, 'm'),
            (self.dot_all, 's'),
            (self.extended, 'x'),
        ] {
            if set {
                write!(f, "{}", flag)?;
            }
        }
        Ok(())
    }
}

/// Merge literal-embedded flags with the `options` argument.
///
/// `literal_flags` is `Some` only for a regex literal; `options` is `Some`
/// whenever the argument was supplied at all (an explicit null counts as `""`).
/// A literal that carries flags may not be combined with any `options`
/// argument, even an empty one. Returns the options text to compile with.
pub fn resolve_flags<'a>(literal_flags: Option<&'a str>, options: Option<&'a str>) -> Result<&'a str> {
    match (literal_flags, options) {
        (Some(flags), Some(_)) if !flags.is_empty() => {
            Err(RegexError::OptionsConflict { op: ENGINE_OP })
        }
        (_, Some(options)) => Ok(options),
        (Some(flags), None) => Ok(flags),
        (None, None) => Ok(""),
    }
}
