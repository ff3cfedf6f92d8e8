//! Pattern compilation and matching.
//!
//! Compiling is a pipeline: embedded NUL checks, flag parsing, the
//! `(*DIRECTIVE)` prefix, translation of PCRE-only syntax, parsing with
//! `regex-syntax` and finally lowering to a [`Program`] that the backtracking
//! executor runs under a step budget.

mod backtrack;
mod captures;
pub mod directive;
pub mod flags;
mod program;
mod translate;

pub use backtrack::MatchError;
pub use captures::Captures;
pub use directive::{Newline, StartOptions};
pub use flags::{resolve_flags, FlagSet};

use crate::config::RegexConfig;
use crate::error::{RegexError, Result, ENGINE_OP};
use crate::{log_debug, log_warn};
use backtrack::{Backtracker, ExecConfig};
use program::Program;
use regex_syntax::ParserBuilder;

/// Reject NUL bytes in the pattern or options text. NUL is legal in the
/// subject and can be written in a pattern as `\0` or `\x00`.
pub fn check_embedded_nul(pattern: &str, options: &str) -> Result<()> {
    if pattern.contains('\0') {
        return Err(RegexError::EmbeddedNulInPattern { op: ENGINE_OP });
    }
    if options.contains('\0') {
        return Err(RegexError::EmbeddedNulInOptions { op: ENGINE_OP });
    }
    Ok(())
}

/// The parser's message without the rewritten pattern it quotes
fn syntax_error(err: &regex_syntax::Error) -> String {
    match err {
        regex_syntax::Error::Parse(err) => err.kind().to_string(),
        regex_syntax::Error::Translate(err) => err.kind().to_string(),
        _ => err.to_string(),
    }
}

/// An immutable compiled pattern
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    options: String,
    flags: FlagSet,
    start: StartOptions,
    program: Program,
    captures_len: usize,
    exec: ExecConfig,
}

impl Pattern {
    /// Compile `source` with an options string of `i`, `m`, `s`, `x` flags
    pub fn new(source: &str, options: &str) -> Result<Pattern> {
        Self::with_config(source, options, &RegexConfig::default())
    }

    pub fn with_config(source: &str, options: &str, config: &RegexConfig) -> Result<Pattern> {
        check_embedded_nul(source, options)?;
        let flags = FlagSet::parse(options)?;
        let (start, body) = directive::parse_start_options(source)?;
        let translated = translate::translate(body, flags.extended, &start)?;

        let mut builder = ParserBuilder::new();
        builder
            .case_insensitive(flags.case_insensitive)
            .multi_line(flags.multi_line)
            .dot_matches_new_line(flags.dot_all)
            .unicode(true)
            .utf8(true)
            .nest_limit(config.nest_limit);
        match start.newline() {
            Newline::Lf => {}
            Newline::Cr => {
                builder.line_terminator(b'\r');
            }
            Newline::Nul => {
                builder.line_terminator(0);
            }
            // Only the CRLF pair ends a line. The translator rewrites `.`
            // and the executor handles the anchors.
            Newline::CrLf => {}
            Newline::AnyCrLf | Newline::Any => {
                builder.crlf(true);
            }
        }
        let hir = builder
            .build()
            .parse(&translated)
            .map_err(|err| RegexError::parse(syntax_error(&err)))?;

        let program = Program::compile(&hir, config.max_program_len)?;
        let captures_len = program.captures;

        let match_limit = start
            .match_limit
            .map_or(config.match_limit, |limit| limit.min(config.match_limit));
        let exec = ExecConfig {
            match_limit,
            charge_starts: start.match_limit.is_some(),
            depth_limit: start.depth_limit,
            newline: start.newline(),
            not_empty: start.not_empty,
            not_empty_at_start: start.not_empty_at_start,
        };

        log_debug!(
            "compiled /{}/{} into {} instructions ({} groups, match limit {})",
            source,
            flags,
            program.insts.len(),
            captures_len,
            match_limit
        );

        Ok(Pattern {
            source: source.to_string(),
            options: options.to_string(),
            flags,
            start,
            program,
            captures_len,
            exec,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The options text the pattern was compiled with
    pub fn options(&self) -> &str {
        &self.options
    }

    pub fn flags(&self) -> FlagSet {
        self.flags
    }

    pub fn start_options(&self) -> &StartOptions {
        &self.start
    }

    /// Number of explicit capturing groups
    pub fn captures_len(&self) -> usize {
        self.captures_len
    }

    /// Effective step budget for one search
    pub fn match_limit(&self) -> u64 {
        self.exec.match_limit
    }

    /// Leftmost match starting at or after byte offset `start`. Exceeding the
    /// step budget is reported as an error.
    pub fn try_find_at<'h>(
        &self,
        haystack: &'h str,
        start: usize,
    ) -> std::result::Result<Option<Captures<'h>>, MatchError> {
        if start > haystack.len() || !haystack.is_char_boundary(start) {
            return Ok(None);
        }
        let slots = Backtracker::new(&self.program, self.exec, haystack).search(start)?;
        Ok(slots.map(|slots| Captures::new(haystack, slots)))
    }

    /// Like [`try_find_at`](Self::try_find_at), but a search cut off by the
    /// step budget is a miss.
    pub fn find_at<'h>(&self, haystack: &'h str, start: usize) -> Option<Captures<'h>> {
        match self.try_find_at(haystack, start) {
            Ok(found) => found,
            Err(err) => {
                log_warn!("/{}/{}: {}, treating as no match", self.source, self.flags, err);
                None
            }
        }
    }

    pub fn find<'h>(&self, haystack: &'h str) -> Option<Captures<'h>> {
        self.find_at(haystack, 0)
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.find(haystack).is_some()
    }

    /// Successive non-overlapping matches, left to right. After an empty
    /// match the scan resumes one codepoint further on.
    pub fn find_iter<'p, 'h>(&'p self, haystack: &'h str) -> FindIter<'p, 'h> {
        FindIter {
            pattern: self,
            haystack,
            next: Some(0),
        }
    }
}

/// Iterator returned by [`Pattern::find_iter`]
pub struct FindIter<'p, 'h> {
    pattern: &'p Pattern,
    haystack: &'h str,
    next: Option<usize>,
}

impl<'p, 'h> Iterator for FindIter<'p, 'h> {
    type Item = Captures<'h>;

    fn next(&mut self) -> Option<Captures<'h>> {
        let start = self.next?;
        let Some(caps) = self.pattern.find_at(self.haystack, start) else {
            self.next = None;
            return None;
        };

        let end = caps.end();
        self.next = if end > caps.start() {
            Some(end)
        } else {
            self.haystack[end..]
                .chars()
                .next()
                .map(|c| end + c.len_utf8())
        };
        Some(caps)
    }
}
