//! Classical backtracking executor with an explicit stack and a step budget.
//!
//! One step is charged each time a thread resumes from the stack, which is
//! once per backtrack into an alternative. Threads started at each candidate
//! start position are charged too when the pattern set `(*LIMIT_MATCH=n)`.
//! When the budget (or the optional stack depth limit) runs out the search
//! stops with [`MatchError::LimitExceeded`].
//!
//! Assertion and atomic group bodies run as nested searches on the same
//! stack. Once a body has matched its alternatives are discarded.

use super::directive::Newline;
use super::program::{Inst, Program};
use regex_syntax::hir::Look;
use std::cmp::Ordering;
use std::fmt;

/// A search that could not run to completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchError {
    LimitExceeded { steps: u64 },
}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchError::LimitExceeded { steps } => {
                write!(f, "match limit exceeded after {} steps", steps)
            }
        }
    }
}

impl std::error::Error for MatchError {}

/// Search-time settings derived from the pattern
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExecConfig {
    pub match_limit: u64,
    /// Charge one step per start position tried
    pub charge_starts: bool,
    pub depth_limit: Option<u64>,
    pub newline: Newline,
    pub not_empty: bool,
    pub not_empty_at_start: bool,
}

enum Frame {
    Step { pc: usize, at: usize },
    Restore { slot: usize, old: Option<usize> },
}

/// How a thread stopped
enum Outcome {
    Fail,
    Match,
    /// Reached the end of an assertion body at the given offset
    LookEnd(usize),
}

pub(crate) struct Backtracker<'a> {
    prog: &'a Program,
    config: ExecConfig,
    haystack: &'a str,
    bytes: &'a [u8],
    search_start: usize,
    stack: Vec<Frame>,
    slots: Vec<Option<usize>>,
    steps: u64,
}

impl<'a> Backtracker<'a> {
    pub fn new(prog: &'a Program, config: ExecConfig, haystack: &'a str) -> Self {
        Backtracker {
            prog,
            config,
            haystack,
            bytes: haystack.as_bytes(),
            search_start: 0,
            stack: Vec::new(),
            slots: vec![None; prog.slots + prog.marks],
            steps: 0,
        }
    }

    /// Leftmost match starting at or after byte offset `start`, which must be a
    /// char boundary. Returns the capture slots of the match.
    pub fn search(mut self, start: usize) -> Result<Option<Vec<Option<usize>>>, MatchError> {
        self.search_start = start;
        let mut at = start;
        loop {
            if self.run(at)? {
                self.slots.truncate(self.prog.slots);
                return Ok(Some(self.slots));
            }
            if self.prog.anchored || at >= self.bytes.len() {
                return Ok(None);
            }
            at += self.haystack[at..].chars().next().map_or(1, char::len_utf8);
        }
    }

    fn charge(&mut self) -> Result<(), MatchError> {
        self.steps += 1;
        if self.steps > self.config.match_limit {
            return Err(MatchError::LimitExceeded { steps: self.steps });
        }
        Ok(())
    }

    fn run(&mut self, start: usize) -> Result<bool, MatchError> {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.stack.clear();
        self.stack.push(Frame::Step { pc: 0, at: start });

        let mut charge = self.config.charge_starts;
        while let Some(frame) = self.stack.pop() {
            match frame {
                Frame::Restore { slot, old } => self.slots[slot] = old,
                Frame::Step { pc, at } => {
                    if charge {
                        self.charge()?;
                    }
                    charge = true;
                    if let Outcome::Match = self.step(pc, at)? {
                        return Ok(true);
                    }
                }
            }
        }
        Ok(false)
    }

    /// Run one thread until it matches, fails or leaves an assertion body
    fn step(&mut self, mut pc: usize, mut at: usize) -> Result<Outcome, MatchError> {
        let prog = self.prog;
        loop {
            match &prog.insts[pc] {
                Inst::Match => {
                    return Ok(if self.accept(at) {
                        Outcome::Match
                    } else {
                        Outcome::Fail
                    })
                }
                Inst::Literal(bytes) => {
                    if !self.bytes[at..].starts_with(bytes) {
                        return Ok(Outcome::Fail);
                    }
                    at += bytes.len();
                }
                Inst::Class(ranges) => match self.haystack[at..].chars().next() {
                    Some(c) if class_contains(ranges, c) => at += c.len_utf8(),
                    _ => return Ok(Outcome::Fail),
                },
                Inst::ByteClass(ranges) => match self.bytes.get(at) {
                    Some(&b) if ranges.iter().any(|&(lo, hi)| lo <= b && b <= hi) => at += 1,
                    _ => return Ok(Outcome::Fail),
                },
                Inst::Look(look) => {
                    if !self.look_matches(*look, at) {
                        return Ok(Outcome::Fail);
                    }
                }
                Inst::Dollar => {
                    if !self.is_final_end(at) {
                        return Ok(Outcome::Fail);
                    }
                }
                Inst::DotCrlf => match self.haystack[at..].chars().next() {
                    Some('\r') if self.bytes.get(at + 1) == Some(&b'\n') => {
                        return Ok(Outcome::Fail)
                    }
                    Some(c) => at += c.len_utf8(),
                    None => return Ok(Outcome::Fail),
                },
                Inst::Backref { group, caseless } => match self.backref_len(*group, *caseless, at) {
                    Some(len) => at += len,
                    None => return Ok(Outcome::Fail),
                },
                Inst::LookAround {
                    ahead,
                    negate,
                    min,
                    max,
                    next,
                } => {
                    // Negative assertions never leave captures behind
                    let keep = !negate;
                    let found = if *ahead {
                        self.assert_body(pc + 1, at, None, keep)?.is_some()
                    } else {
                        self.assert_behind(pc + 1, at, *min, *max, keep)?
                    };
                    if found == *negate {
                        return Ok(Outcome::Fail);
                    }
                    pc = *next;
                    continue;
                }
                Inst::Atomic { next } => match self.assert_body(pc + 1, at, None, true)? {
                    Some(end) => {
                        at = end;
                        pc = *next;
                        continue;
                    }
                    None => return Ok(Outcome::Fail),
                },
                Inst::LookEnd => return Ok(Outcome::LookEnd(at)),
                Inst::Save(slot) => self.save(*slot, at)?,
                Inst::Mark(mark) => self.save(prog.slots + mark, at)?,
                Inst::Progress(mark) => {
                    if self.slots[prog.slots + mark] == Some(at) {
                        pc += 2;
                        continue;
                    }
                }
                Inst::Split { prefer, other } => {
                    self.push(Frame::Step { pc: *other, at })?;
                    pc = *prefer;
                    continue;
                }
                Inst::Jump(target) => {
                    pc = *target;
                    continue;
                }
            }
            pc += 1;
        }
    }

    /// Run the body at `pc` from `at` as a nested search and return where its
    /// first match ends. A body that must finish at `end` keeps backtracking
    /// until it does. With `keep`, captures set by the body survive and are
    /// undone on backtrack.
    fn assert_body(
        &mut self,
        pc: usize,
        at: usize,
        end: Option<usize>,
        keep: bool,
    ) -> Result<Option<usize>, MatchError> {
        let base = self.stack.len();
        let saved = self.slots.clone();
        self.push(Frame::Step { pc, at })?;

        let mut found = None;
        while self.stack.len() > base {
            let Some(frame) = self.stack.pop() else {
                break;
            };
            match frame {
                Frame::Restore { slot, old } => self.slots[slot] = old,
                Frame::Step { pc, at } => {
                    self.charge()?;
                    if let Outcome::LookEnd(reached) = self.step(pc, at)? {
                        if end.map_or(true, |end| end == reached) {
                            found = Some(reached);
                            break;
                        }
                    }
                }
            }
        }

        self.stack.truncate(base);
        if found.is_some() && keep {
            for (slot, old) in saved.into_iter().enumerate() {
                if self.slots[slot] != old {
                    self.push(Frame::Restore { slot, old })?;
                }
            }
        } else {
            self.slots = saved;
        }
        Ok(found)
    }

    /// Try the lookbehind body from each start `min..=max` codepoints back
    fn assert_behind(
        &mut self,
        pc: usize,
        at: usize,
        min: usize,
        max: usize,
        keep: bool,
    ) -> Result<bool, MatchError> {
        for back in min..=max {
            let Some(start) = self.chars_back(at, back) else {
                break;
            };
            if self.assert_body(pc, start, Some(at), keep)?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn chars_back(&self, at: usize, count: usize) -> Option<usize> {
        if count == 0 {
            return Some(at);
        }
        self.haystack[..at]
            .char_indices()
            .rev()
            .nth(count - 1)
            .map(|(i, _)| i)
    }

    /// Byte length of the text at `at` that repeats `group`
    fn backref_len(&self, group: usize, caseless: bool, at: usize) -> Option<usize> {
        let start = self.slots[2 * group]?;
        let end = self.slots[2 * group + 1]?;
        if start > end {
            return None;
        }
        let captured = &self.haystack[start..end];
        let rest = &self.haystack[at..];
        if !caseless {
            return rest.starts_with(captured).then_some(captured.len());
        }

        let mut len = 0;
        let mut rest_chars = rest.chars();
        for want in captured.chars() {
            let got = rest_chars.next()?;
            if got != want && !got.to_lowercase().eq(want.to_lowercase()) {
                return None;
            }
            len += got.len_utf8();
        }
        Some(len)
    }

    fn save(&mut self, slot: usize, at: usize) -> Result<(), MatchError> {
        self.push(Frame::Restore {
            slot,
            old: self.slots[slot],
        })?;
        self.slots[slot] = Some(at);
        Ok(())
    }

    fn push(&mut self, frame: Frame) -> Result<(), MatchError> {
        if let Some(depth) = self.config.depth_limit {
            if self.stack.len() as u64 >= depth {
                return Err(MatchError::LimitExceeded { steps: self.steps });
            }
        }
        self.stack.push(frame);
        Ok(())
    }

    fn accept(&self, at: usize) -> bool {
        let empty = self.slots[0] == Some(at);
        if empty && self.config.not_empty {
            return false;
        }
        !(empty && self.config.not_empty_at_start && at == self.search_start)
    }

    fn look_matches(&self, look: Look, at: usize) -> bool {
        match look {
            Look::Start => at == 0,
            Look::End => at == self.bytes.len(),
            Look::StartLF | Look::StartCRLF => self.is_line_start(at),
            Look::EndLF | Look::EndCRLF => self.is_line_end(at),
            Look::WordAscii => self.word_ascii_before(at) != self.word_ascii_after(at),
            Look::WordAsciiNegate => self.word_ascii_before(at) == self.word_ascii_after(at),
            Look::WordUnicode => self.word_before(at) != self.word_after(at),
            Look::WordUnicodeNegate => self.word_before(at) == self.word_after(at),
            Look::WordStartAscii => !self.word_ascii_before(at) && self.word_ascii_after(at),
            Look::WordEndAscii => self.word_ascii_before(at) && !self.word_ascii_after(at),
            Look::WordStartUnicode => !self.word_before(at) && self.word_after(at),
            Look::WordEndUnicode => self.word_before(at) && !self.word_after(at),
            Look::WordStartHalfAscii => !self.word_ascii_before(at),
            Look::WordEndHalfAscii => !self.word_ascii_after(at),
            Look::WordStartHalfUnicode => !self.word_before(at),
            Look::WordEndHalfUnicode => !self.word_after(at),
        }
    }

    /// Multi-line `^`: the start, or just after a newline that does not end
    /// the haystack
    fn is_line_start(&self, at: usize) -> bool {
        let bytes = self.bytes;
        if at == 0 {
            return true;
        }
        if at == bytes.len() {
            return false;
        }
        match self.config.newline {
            Newline::Lf => bytes[at - 1] == b'\n',
            Newline::Cr => bytes[at - 1] == b'\r',
            Newline::Nul => bytes[at - 1] == 0,
            Newline::CrLf => bytes[..at].ends_with(b"\r\n"),
            Newline::AnyCrLf | Newline::Any => {
                bytes[at - 1] == b'\n' || (bytes[at - 1] == b'\r' && bytes[at] != b'\n')
            }
        }
    }

    /// Multi-line `$`: the end, or just before a newline
    fn is_line_end(&self, at: usize) -> bool {
        let bytes = self.bytes;
        if at == bytes.len() {
            return true;
        }
        match self.config.newline {
            Newline::Lf => bytes[at] == b'\n',
            Newline::Cr => bytes[at] == b'\r',
            Newline::Nul => bytes[at] == 0,
            Newline::CrLf => bytes[at..].starts_with(b"\r\n"),
            Newline::AnyCrLf | Newline::Any => {
                bytes[at] == b'\r' || (bytes[at] == b'\n' && (at == 0 || bytes[at - 1] != b'\r'))
            }
        }
    }

    /// `$` outside multi-line mode: the end, or before a final newline
    fn is_final_end(&self, at: usize) -> bool {
        let rest = &self.bytes[at..];
        rest.is_empty()
            || match self.config.newline {
                Newline::Lf => rest == b"\n",
                Newline::Cr => rest == b"\r",
                Newline::Nul => rest == b"\0",
                Newline::CrLf => rest == b"\r\n",
                Newline::AnyCrLf | Newline::Any => matches!(rest, b"\n" | b"\r" | b"\r\n"),
            }
    }

    fn word_ascii_before(&self, at: usize) -> bool {
        at > 0 && is_word_byte(self.bytes[at - 1])
    }

    fn word_ascii_after(&self, at: usize) -> bool {
        self.bytes.get(at).map_or(false, |&b| is_word_byte(b))
    }

    fn word_before(&self, at: usize) -> bool {
        self.haystack[..at]
            .chars()
            .next_back()
            .map_or(false, regex_syntax::is_word_character)
    }

    fn word_after(&self, at: usize) -> bool {
        self.haystack[at..]
            .chars()
            .next()
            .map_or(false, regex_syntax::is_word_character)
    }
}

fn is_word_byte(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric()
}

fn class_contains(ranges: &[(char, char)], c: char) -> bool {
    ranges
        .binary_search_by(|&(lo, hi)| {
            if hi < c {
                Ordering::Less
            } else if lo > c {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        })
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(match_limit: u64) -> ExecConfig {
        ExecConfig {
            match_limit,
            charge_starts: true,
            depth_limit: None,
            newline: Newline::Lf,
            not_empty: false,
            not_empty_at_start: false,
        }
    }

    fn program(pattern: &str) -> Program {
        let hir = regex_syntax::parse(pattern).unwrap();
        Program::compile(&hir, 100_000).unwrap()
    }

    fn find(pattern: &str, haystack: &str) -> Option<Vec<Option<usize>>> {
        let prog = program(pattern);
        Backtracker::new(&prog, config(1_000_000), haystack)
            .search(0)
            .unwrap()
    }

    #[test]
    fn test_leftmost_first() {
        assert_eq!(find("mp", "Simple Example"), Some(vec![Some(2), Some(4)]));
        assert_eq!(find("a|ab", "ab"), Some(vec![Some(0), Some(1)]));
    }

    #[test]
    fn test_captures_and_unmatched_group() {
        let slots = find("(a)|(b)", "b").unwrap();
        assert_eq!(slots, vec![Some(0), Some(1), None, None, Some(0), Some(1)]);
    }

    #[test]
    fn test_backtracking_restores_captures() {
        // First alternative captures then fails; its slot must be rolled back
        let slots = find("(?:(a)x|ay)", "ay").unwrap();
        assert_eq!(slots, vec![Some(0), Some(2), None, None]);
    }

    #[test]
    fn test_lazy_and_greedy() {
        assert_eq!(find("a+?", "aaa"), Some(vec![Some(0), Some(1)]));
        assert_eq!(find("a+", "aaa"), Some(vec![Some(0), Some(3)]));
        assert_eq!(find("a{2,3}", "aaaa"), Some(vec![Some(0), Some(3)]));
    }

    #[test]
    fn test_empty_loop_terminates() {
        assert_eq!(find("(a*)*b", "aab"), Some(vec![Some(0), Some(3), Some(2), Some(2)]));
        assert_eq!(find("(?:)*", "x"), Some(vec![Some(0), Some(0)]));
    }

    #[test]
    fn test_multibyte_class() {
        assert_eq!(find(r"\p{Hangul}+", "ab 한국어"), Some(vec![Some(3), Some(12)]));
    }

    #[test]
    fn test_step_limit() {
        let prog = program("fé");
        // Match begins at the third start position
        let haystack = "cafétéria";
        assert!(Backtracker::new(&prog, config(1), haystack).search(0).is_err());
        assert!(Backtracker::new(&prog, config(2), haystack).search(0).is_err());
        assert_eq!(
            Backtracker::new(&prog, config(3), haystack).search(0).unwrap(),
            Some(vec![Some(2), Some(5)])
        );
    }

    #[test]
    fn test_start_positions_free_without_directive() {
        let prog = program("b");
        let haystack = format!("{}b", "a".repeat(1000));
        let mut cfg = config(10);
        cfg.charge_starts = false;
        assert_eq!(
            Backtracker::new(&prog, cfg, &haystack).search(0).unwrap(),
            Some(vec![Some(1000), Some(1001)])
        );
        assert!(Backtracker::new(&prog, config(10), &haystack).search(0).is_err());
    }

    #[test]
    fn test_lookahead_keeps_captures() {
        let slots = find("(?P<__ib0_la>(a))a", "aa").unwrap();
        assert_eq!(slots, vec![Some(0), Some(1), Some(0), Some(1)]);
        // A failed negative body leaves nothing behind
        let slots = find("(?P<__ib0_nla>(b))(a)", "a").unwrap();
        assert_eq!(slots, vec![Some(0), Some(1), None, None, Some(0), Some(1)]);
    }

    #[test]
    fn test_lookbehind_must_end_at_position() {
        assert_eq!(find("(?P<__ib0_lb>ab|b)c", "abc"), Some(vec![Some(2), Some(3)]));
        assert_eq!(find("(?P<__ib0_nlb>a)b", "abcb"), Some(vec![Some(3), Some(4)]));
        assert_eq!(find("(?P<__ib0_lb>é)x", "éx"), Some(vec![Some(2), Some(3)]));
    }

    #[test]
    fn test_atomic_group_does_not_give_back() {
        assert_eq!(find("(?P<__ib0_atomic>a+)a", "aaa"), None);
        assert_eq!(find("(?P<__ib0_atomic>a+)b", "aab"), Some(vec![Some(0), Some(3)]));
        // Alternatives inside the body are dropped once it matched
        assert_eq!(find("(?P<__ib0_atomic>a|ab)c", "abc"), None);
    }

    #[test]
    fn test_backref_unset_group_fails() {
        assert_eq!(find("(?:(a)|b)(?P<__ib0_ref1>k)", "b"), None);
        assert_eq!(find("(a|b)(?P<__ib0_ref1>k)", "abb"), Some(vec![Some(1), Some(3), Some(1), Some(2)]));
    }

    #[test]
    fn test_caseless_backref() {
        assert_eq!(find("(?i)(é)(?P<__ib0_ref1>k)", "éÉ"), Some(vec![Some(0), Some(4), Some(0), Some(2)]));
        assert_eq!(find("(é)(?P<__ib0_ref1>k)", "éÉ"), None);
    }

    #[test]
    fn test_catastrophic_pattern_is_cut_off() {
        let prog = program("(a+)+b");
        let haystack = "a".repeat(40);
        let result = Backtracker::new(&prog, config(10_000), &haystack).search(0);
        assert!(matches!(result, Err(MatchError::LimitExceeded { .. })));
    }

    #[test]
    fn test_not_empty() {
        let prog = program("a*");
        let mut cfg = config(1000);
        cfg.not_empty = true;
        assert_eq!(
            Backtracker::new(&prog, cfg, "baa").search(0).unwrap(),
            Some(vec![Some(1), Some(3)])
        );
    }

    #[test]
    fn test_cr_newline_multiline() {
        let prog = program("(?m)^b");
        let mut cfg = config(1000);
        cfg.newline = Newline::Cr;
        assert_eq!(
            Backtracker::new(&prog, cfg, "a\rb").search(0).unwrap(),
            Some(vec![Some(2), Some(3)])
        );
        assert_eq!(Backtracker::new(&prog, cfg, "a\nb").search(0).unwrap(), None);
    }
}
