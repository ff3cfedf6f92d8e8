//! Compilation of a `regex-syntax` HIR into a flat instruction program for the
//! backtracking executor.

use super::translate::Synthetic;
use crate::error::{RegexError, Result};
use regex_syntax::hir::{Capture, Class, Hir, HirKind, Look, Repetition};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Inst {
    Match,
    /// UTF-8 bytes that must appear verbatim
    Literal(Box<[u8]>),
    /// One codepoint within any of the sorted, non-overlapping ranges
    Class(Box<[(char, char)]>),
    /// One byte within any of the ranges
    ByteClass(Box<[(u8, u8)]>),
    Look(Look),
    /// `$` outside multi-line mode: the end, or just before a newline that
    /// ends the haystack
    Dollar,
    /// `.` under `(*CRLF)`: any codepoint except a CR that starts a CRLF pair
    DotCrlf,
    /// The text last captured by `group`. Fails while the group is unset.
    Backref { group: usize, caseless: bool },
    /// Assertion whose body runs from the next instruction up to its
    /// `LookEnd`; matching resumes at `next`. A lookbehind body spans
    /// `min..=max` codepoints.
    LookAround {
        ahead: bool,
        negate: bool,
        min: usize,
        max: usize,
        next: usize,
    },
    /// Atomic group: the body runs from the next instruction up to its
    /// `LookEnd` and its first match is final. Matching resumes at `next`.
    Atomic { next: usize },
    LookEnd,
    /// Record the current position in a capture slot
    Save(usize),
    /// Try `prefer` first, `other` on backtrack
    Split { prefer: usize, other: usize },
    Jump(usize),
    /// Record the current position in a loop mark
    Mark(usize),
    /// Leave the loop (skip the following `Jump`) when the iteration that
    /// began at the matching `Mark` consumed nothing
    Progress(usize),
}

/// A compiled pattern body
#[derive(Debug, Clone)]
pub(crate) struct Program {
    pub insts: Vec<Inst>,
    /// Groups written in the pattern, reserved groups excluded
    pub captures: usize,
    /// Capture slots, two per group including the implicit group 0
    pub slots: usize,
    /// Loop marks, stored after the capture slots
    pub marks: usize,
    /// True when every match must begin at the start of the haystack
    pub anchored: bool,
}

impl Program {
    /// Compile `hir` into at most `max_len` instructions.
    pub fn compile(hir: &Hir, max_len: usize) -> Result<Program> {
        let mut groups = Groups::default();
        groups.collect(hir);
        let mut compiler = Compiler {
            insts: Vec::new(),
            marks: 0,
            max_len,
            groups,
            lookaround: false,
        };
        compiler.push(Inst::Save(0))?;
        compiler.c(hir)?;
        compiler.push(Inst::Save(1))?;
        compiler.push(Inst::Match)?;

        // An assertion can hold `^` without anchoring the match itself
        let anchored =
            !compiler.lookaround && hir.properties().look_set_prefix().contains(Look::Start);
        let captures = compiler.groups.count;
        Ok(Program {
            insts: compiler.insts,
            captures,
            slots: 2 * (captures + 1),
            marks: compiler.marks,
            anchored,
        })
    }
}

/// Numbering of the pattern's own groups. `regex-syntax` also numbers the
/// reserved groups, which take no capture slots.
#[derive(Default)]
struct Groups {
    /// Group number by HIR capture index
    numbers: HashMap<u32, usize>,
    names: HashMap<String, usize>,
    count: usize,
}

impl Groups {
    fn collect(&mut self, hir: &Hir) {
        match hir.kind() {
            HirKind::Capture(capture) => {
                if synthetic(capture).is_none() {
                    self.count += 1;
                    self.numbers.insert(capture.index, self.count);
                    if let Some(name) = capture.name.as_deref() {
                        self.names.insert(name.to_string(), self.count);
                    }
                }
                self.collect(&capture.sub);
            }
            HirKind::Concat(subs) | HirKind::Alternation(subs) => {
                subs.iter().for_each(|sub| self.collect(sub));
            }
            HirKind::Repetition(rep) => self.collect(&rep.sub),
            _ => {}
        }
    }
}

fn synthetic(capture: &Capture) -> Option<Synthetic> {
    capture.name.as_deref().and_then(Synthetic::parse)
}

struct Compiler {
    insts: Vec<Inst>,
    marks: usize,
    max_len: usize,
    groups: Groups,
    lookaround: bool,
}

impl Compiler {
    fn pc(&self) -> usize {
        self.insts.len()
    }

    fn push(&mut self, inst: Inst) -> Result<usize> {
        if self.insts.len() >= self.max_len {
            return Err(RegexError::parse(format!(
                "compiled pattern exceeds {} instructions",
                self.max_len
            )));
        }
        self.insts.push(inst);
        Ok(self.insts.len() - 1)
    }

    fn patch_split(&mut self, at: usize, prefer: usize, other: usize) {
        self.insts[at] = Inst::Split { prefer, other };
    }

    fn patch_jump(&mut self, at: usize, target: usize) {
        self.insts[at] = Inst::Jump(target);
    }

    fn c(&mut self, hir: &Hir) -> Result<()> {
        match hir.kind() {
            HirKind::Empty => {}
            HirKind::Literal(literal) => {
                self.push(Inst::Literal(literal.0.clone()))?;
            }
            HirKind::Class(Class::Unicode(class)) => {
                let ranges = class.ranges().iter().map(|r| (r.start(), r.end())).collect();
                self.push(Inst::Class(ranges))?;
            }
            HirKind::Class(Class::Bytes(class)) => {
                let ranges = class.ranges().iter().map(|r| (r.start(), r.end())).collect();
                self.push(Inst::ByteClass(ranges))?;
            }
            HirKind::Look(look) => {
                self.push(Inst::Look(*look))?;
            }
            HirKind::Capture(capture) => match synthetic(capture) {
                Some(synthetic) => self.c_synthetic(synthetic, &capture.sub)?,
                None => {
                    let number = self.groups.numbers.get(&capture.index).copied().unwrap_or(0);
                    let slot = 2 * number;
                    self.push(Inst::Save(slot))?;
                    self.c(&capture.sub)?;
                    self.push(Inst::Save(slot + 1))?;
                }
            },
            HirKind::Concat(subs) => {
                for sub in subs {
                    self.c(sub)?;
                }
            }
            HirKind::Alternation(subs) => self.c_alternation(subs)?,
            HirKind::Repetition(rep) => self.c_repetition(rep)?,
        }
        Ok(())
    }

    fn c_synthetic(&mut self, synthetic: Synthetic, sub: &Hir) -> Result<()> {
        match synthetic {
            Synthetic::Dollar => match sub.kind() {
                HirKind::Look(Look::End) => {
                    self.push(Inst::Dollar)?;
                }
                // Multi-line `$` is an ordinary line-end assertion
                _ => self.c(sub)?,
            },
            Synthetic::Dot => match sub.kind() {
                HirKind::Class(Class::Unicode(class))
                    if !class.ranges().iter().any(|r| r.start() <= '\n' && '\n' <= r.end()) =>
                {
                    self.push(Inst::DotCrlf)?;
                }
                // `s` mode: any codepoint
                _ => self.c(sub)?,
            },
            Synthetic::Backref(group) => self.c_backref(group, sub)?,
            Synthetic::NamedBackref(name) => {
                let group = self.groups.names.get(&name).copied().ok_or_else(|| {
                    RegexError::parse(format!("reference to non-existent subpattern '{}'", name))
                })?;
                self.c_backref(group, sub)?;
            }
            Synthetic::Look { ahead, negate } => self.c_look(ahead, negate, sub)?,
            Synthetic::Atomic => {
                let at = self.push(Inst::LookEnd)?;
                self.c(sub)?;
                self.push(Inst::LookEnd)?;
                let next = self.pc();
                self.insts[at] = Inst::Atomic { next };
            }
        }
        Ok(())
    }

    fn c_backref(&mut self, group: usize, sub: &Hir) -> Result<()> {
        if group == 0 || group > self.groups.count {
            return Err(RegexError::parse(format!(
                "reference to non-existent subpattern {}",
                group
            )));
        }
        // The reserved group wraps `k`, which case folding turns into a class
        let caseless = !matches!(sub.kind(), HirKind::Literal(_));
        self.push(Inst::Backref { group, caseless })?;
        Ok(())
    }

    fn c_look(&mut self, ahead: bool, negate: bool, body: &Hir) -> Result<()> {
        self.lookaround = true;
        let (min, max) = if ahead {
            (0, 0)
        } else {
            char_len(body).ok_or_else(|| {
                RegexError::parse("lookbehind assertion is not fixed length")
            })?
        };
        let at = self.push(Inst::LookEnd)?;
        self.c(body)?;
        self.push(Inst::LookEnd)?;
        let next = self.pc();
        self.insts[at] = Inst::LookAround {
            ahead,
            negate,
            min,
            max,
            next,
        };
        Ok(())
    }

    fn c_alternation(&mut self, subs: &[Hir]) -> Result<()> {
        let mut jumps = Vec::with_capacity(subs.len());
        for (i, sub) in subs.iter().enumerate() {
            if i + 1 == subs.len() {
                self.c(sub)?;
                break;
            }
            let split = self.push(Inst::Split { prefer: 0, other: 0 })?;
            self.c(sub)?;
            jumps.push(self.push(Inst::Jump(0))?);
            let next = self.pc();
            self.patch_split(split, split + 1, next);
        }
        let end = self.pc();
        for jump in jumps {
            self.patch_jump(jump, end);
        }
        Ok(())
    }

    fn c_repetition(&mut self, rep: &Repetition) -> Result<()> {
        for _ in 0..rep.min {
            self.c(&rep.sub)?;
        }

        match rep.max {
            None => {
                // An iteration that matches the empty string exits the loop
                // instead of repeating. The exit is right after the Jump.
                let mark = self.marks;
                self.marks += 1;
                let split = self.push(Inst::Split { prefer: 0, other: 0 })?;
                self.push(Inst::Mark(mark))?;
                self.c(&rep.sub)?;
                self.push(Inst::Progress(mark))?;
                self.push(Inst::Jump(split))?;
                let exit = self.pc();
                self.patch_branch(split, split + 1, exit, rep.greedy);
            }
            Some(max) => {
                let mut splits = Vec::new();
                for _ in rep.min..max {
                    splits.push(self.push(Inst::Split { prefer: 0, other: 0 })?);
                    self.c(&rep.sub)?;
                }
                let exit = self.pc();
                for split in splits {
                    self.patch_branch(split, split + 1, exit, rep.greedy);
                }
            }
        }
        Ok(())
    }

    /// Split between repeating (`body`) and moving on (`exit`)
    fn patch_branch(&mut self, at: usize, body: usize, exit: usize, greedy: bool) {
        if greedy {
            self.patch_split(at, body, exit);
        } else {
            self.patch_split(at, exit, body);
        }
    }
}

/// Bounds on the number of codepoints `hir` can match, `None` if unbounded
fn char_len(hir: &Hir) -> Option<(usize, usize)> {
    match hir.kind() {
        HirKind::Empty | HirKind::Look(_) => Some((0, 0)),
        HirKind::Literal(literal) => {
            let n = String::from_utf8_lossy(&literal.0).chars().count();
            Some((n, n))
        }
        HirKind::Class(_) => Some((1, 1)),
        HirKind::Capture(capture) => match synthetic(capture) {
            Some(Synthetic::Dollar) | Some(Synthetic::Look { .. }) => Some((0, 0)),
            Some(Synthetic::Dot) => Some((1, 1)),
            Some(Synthetic::Atomic) | None => char_len(&capture.sub),
            Some(Synthetic::Backref(_)) | Some(Synthetic::NamedBackref(_)) => None,
        },
        HirKind::Concat(subs) => subs.iter().try_fold((0usize, 0usize), |(lo, hi), sub| {
            let (sub_lo, sub_hi) = char_len(sub)?;
            Some((lo + sub_lo, hi.checked_add(sub_hi)?))
        }),
        HirKind::Alternation(subs) => {
            let mut bounds: Option<(usize, usize)> = None;
            for sub in subs {
                let (lo, hi) = char_len(sub)?;
                bounds = Some(bounds.map_or((lo, hi), |(a, b)| (a.min(lo), b.max(hi))));
            }
            bounds
        }
        HirKind::Repetition(rep) => {
            let (lo, hi) = char_len(&rep.sub)?;
            let max = rep.max? as usize;
            Some((lo.saturating_mul(rep.min as usize), hi.checked_mul(max)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn try_compile(pattern: &str) -> Result<Program> {
        let hir = regex_syntax::parse(pattern).unwrap();
        Program::compile(&hir, 10_000)
    }

    fn compile(pattern: &str) -> Program {
        try_compile(pattern).unwrap()
    }

    #[test]
    fn test_literal_program() {
        let prog = compile("ab");
        assert_eq!(
            prog.insts,
            vec![
                Inst::Save(0),
                Inst::Literal(b"ab".to_vec().into_boxed_slice()),
                Inst::Save(1),
                Inst::Match,
            ]
        );
        assert_eq!(prog.slots, 2);
        assert!(!prog.anchored);
    }

    #[test]
    fn test_capture_slots() {
        let prog = compile("(a)(?:b)(c(d))");
        assert_eq!(prog.slots, 2 * 4);
        assert!(prog.insts.contains(&Inst::Save(6)));
        assert!(prog.insts.contains(&Inst::Save(7)));
    }

    #[test]
    fn test_star_allocates_mark() {
        let prog = compile("a*b+");
        assert_eq!(prog.marks, 2);
    }

    #[test]
    fn test_anchored() {
        assert!(compile(r"\Afoo").anchored);
        assert!(compile("^foo").anchored);
        assert!(!compile("(?m)^foo").anchored);
    }

    #[test]
    fn test_program_size_limit() {
        let hir = regex_syntax::parse("a{100}").unwrap();
        assert!(Program::compile(&hir, 50).is_err());
    }

    #[test]
    fn test_reserved_groups_take_no_slots() {
        let prog = compile("(a)(?P<__ib0_la>b)(c)(?P<__ib1_eol>$)");
        assert_eq!(prog.captures, 2);
        assert_eq!(prog.slots, 6);
        assert!(prog.insts.contains(&Inst::Save(4)));
        assert!(!prog.insts.contains(&Inst::Save(6)));
        assert!(prog.insts.contains(&Inst::Dollar));
        assert!(prog.insts.contains(&Inst::LookEnd));
    }

    #[test]
    fn test_multi_line_dollar_stays_a_look() {
        let prog = compile("(?m)a(?P<__ib0_eol>$)");
        assert!(prog.insts.contains(&Inst::Look(Look::EndLF)));
        assert!(!prog.insts.contains(&Inst::Dollar));
    }

    #[test]
    fn test_backref_case_sensitivity() {
        let prog = compile("(a)(?P<__ib0_ref1>k)");
        assert!(prog.insts.contains(&Inst::Backref { group: 1, caseless: false }));
        let prog = compile("(?i)(a)(?P<__ib0_ref1>k)");
        assert!(prog.insts.contains(&Inst::Backref { group: 1, caseless: true }));
        let prog = compile("(?<x>a)(?P<__ib0_named_x>k)");
        assert!(prog.insts.contains(&Inst::Backref { group: 1, caseless: false }));
    }

    #[test]
    fn test_backref_to_missing_group() {
        assert!(try_compile("(a)(?P<__ib0_ref2>k)").is_err());
        assert!(try_compile("(?P<__ib0_named_y>k)").is_err());
    }

    #[test]
    fn test_lookbehind_bounds() {
        let prog = compile("(?P<__ib0_lb>ab|c)x");
        assert!(matches!(
            prog.insts[1],
            Inst::LookAround { ahead: false, negate: false, min: 1, max: 2, .. }
        ));
        assert!(try_compile("(?P<__ib0_lb>a+)x").is_err());
    }

    #[test]
    fn test_atomic_group() {
        let prog = compile("(?P<__ib0_atomic>a+)b");
        assert_eq!(prog.insts[1], Inst::Atomic { next: prog.insts.len() - 3 });
        assert_eq!(prog.captures, 0);
    }

    #[test]
    fn test_assertion_does_not_anchor() {
        assert!(!compile("(?P<__ib0_nla>^)a").anchored);
    }
}
