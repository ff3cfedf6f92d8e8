//! Leading `(*NAME)` / `(*NAME=value)` start-option directives.
//!
//! Directives are stripped from the front of the pattern before the rest is
//! handed to the translator. Only a run of directives at offset 0 is
//! recognised; `(*` anywhere later is rejected by the translator.

use crate::error::{RegexError, Result};

/// Line terminator convention selected by `(*CR)`, `(*LF)`, ...
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Newline {
    #[default]
    Lf,
    Cr,
    CrLf,
    AnyCrLf,
    Any,
    Nul,
}

/// Engine-wide options collected from the directive prefix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOptions {
    /// `(*UTF)` / `(*UTF8)`. Patterns are always matched by codepoint, so this
    /// is recorded but changes nothing.
    pub utf: bool,
    /// `(*UCP)`: Unicode semantics for `\d`, `\w`, `\s`, `\b` and POSIX classes
    pub ucp: bool,
    /// Last newline directive wins
    pub newline: Option<Newline>,
    /// Smallest `(*LIMIT_MATCH=n)`
    pub match_limit: Option<u64>,
    /// Smallest `(*LIMIT_DEPTH=n)` / `(*LIMIT_RECURSION=n)`; bounds the
    /// backtrack stack
    pub depth_limit: Option<u64>,
    /// `(*NOTEMPTY)`
    pub not_empty: bool,
    /// `(*NOTEMPTY_ATSTART)`
    pub not_empty_at_start: bool,
}

impl StartOptions {
    pub fn newline(&self) -> Newline {
        self.newline.unwrap_or_default()
    }
}

/// Split `pattern` into its directive prefix and the remaining pattern body.
pub fn parse_start_options(pattern: &str) -> Result<(StartOptions, &str)> {
    let mut options = StartOptions::default();
    let mut rest = pattern;

    while let Some(after) = rest.strip_prefix("(*") {
        let close = after
            .find(')')
            .ok_or_else(|| RegexError::parse("unterminated (* directive"))?;
        apply_directive(&mut options, &after[..close])?;
        rest = &after[close + 1..];
    }

    Ok((options, rest))
}

fn apply_directive(options: &mut StartOptions, directive: &str) -> Result<()> {
    if let Some((name, value)) = directive.split_once('=') {
        let limit = parse_limit(name, value)?;
        let slot = match name {
            "LIMIT_MATCH" => &mut options.match_limit,
            "LIMIT_DEPTH" | "LIMIT_RECURSION" => &mut options.depth_limit,
            // Validated, but the backtrack stack is already bounded by LIMIT_DEPTH
            "LIMIT_HEAP" => return Ok(()),
            _ => return Err(unknown(directive)),
        };
        *slot = Some(slot.map_or(limit, |current| current.min(limit)));
        return Ok(());
    }

    match directive {
        "UTF" | "UTF8" => options.utf = true,
        "UCP" => options.ucp = true,
        "CR" => options.newline = Some(Newline::Cr),
        "LF" => options.newline = Some(Newline::Lf),
        "CRLF" => options.newline = Some(Newline::CrLf),
        "ANYCRLF" => options.newline = Some(Newline::AnyCrLf),
        "ANY" => options.newline = Some(Newline::Any),
        "NUL" => options.newline = Some(Newline::Nul),
        "NOTEMPTY" => options.not_empty = true,
        "NOTEMPTY_ATSTART" => options.not_empty_at_start = true,
        // Optimisation switches with no observable effect here
        "NO_AUTO_POSSESS" | "NO_DOTSTAR_ANCHOR" | "NO_JIT" | "NO_START_OPT" | "BSR_ANYCRLF"
        | "BSR_UNICODE" => {}
        _ => return Err(unknown(directive)),
    }
    Ok(())
}

fn parse_limit(name: &str, value: &str) -> Result<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RegexError::parse(format!(
            "(*{}=...) requires an unsigned integer, found '{}'",
            name, value
        )));
    }
    value
        .parse::<u32>()
        .map(u64::from)
        .map_err(|_| RegexError::parse(format!("(*{}={}) is out of range", name, value)))
}

fn unknown(directive: &str) -> RegexError {
    RegexError::parse(format!("(*VERB) not recognized or malformed: (*{})", directive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_no_directives() {
        let (options, rest) = parse_start_options("abc(*UCP)").unwrap();
        assert_eq!(options, StartOptions::default());
        assert_eq!(rest, "abc(*UCP)");
    }

    #[test]
    fn test_concatenated_directives() {
        let (options, rest) = parse_start_options("(*UTF)(*UCP)(*CR)(*LIMIT_MATCH=5)x").unwrap();
        assert!(options.utf);
        assert!(options.ucp);
        assert_eq!(options.newline(), Newline::Cr);
        assert_eq!(options.match_limit, Some(5));
        assert_eq!(rest, "x");
    }

    #[test]
    fn test_smallest_limit_wins() {
        let (options, _) = parse_start_options("(*LIMIT_MATCH=9)(*LIMIT_MATCH=3)(*LIMIT_MATCH=7)").unwrap();
        assert_eq!(options.match_limit, Some(3));
    }

    #[test]
    fn test_recursion_is_depth_alias() {
        let (options, _) = parse_start_options("(*LIMIT_RECURSION=10)a").unwrap();
        assert_eq!(options.depth_limit, Some(10));
    }

    #[test]
    fn test_heap_limit_is_validated_only() {
        let (options, rest) = parse_start_options("(*LIMIT_HEAP=10)a").unwrap();
        assert_eq!(options, StartOptions::default());
        assert_eq!(rest, "a");
        assert!(parse_start_options("(*LIMIT_HEAP=x)a").is_err());
    }

    #[test]
    fn test_unknown_directive() {
        let err = parse_start_options("(*BOGUS)a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FailedToParseRegex);
    }

    #[test]
    fn test_bad_limit_value() {
        assert!(parse_start_options("(*LIMIT_MATCH=)a").is_err());
        assert!(parse_start_options("(*LIMIT_MATCH=-1)a").is_err());
        assert!(parse_start_options("(*LIMIT_MATCH=99999999999)a").is_err());
    }

    #[test]
    fn test_unterminated() {
        assert!(parse_start_options("(*UCP").is_err());
    }
}
