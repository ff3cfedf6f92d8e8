//! Rewrites a PCRE-flavoured pattern body into the dialect understood by
//! `regex-syntax`.
//!
//! The rewrite is a single left-to-right scan that tracks escapes and
//! character classes. It handles:
//!
//! - free-spacing (`x`): unescaped whitespace and `#` comments outside classes
//!   are dropped, `(?#...)` comments are always dropped
//! - ASCII-only `\d \w \s \b` (and negations) unless `(*UCP)` is set, and
//!   Unicode POSIX classes when it is
//! - `\0nn` octal, `\e`, `\Q...\E` quoting
//! - PCRE class literals that `regex-syntax` would read as syntax (`[`, `&`, `~`
//!   inside a class, `]` first in a class)
//! - rejection of `(*` after the directive prefix
//!
//! Constructs `regex-syntax` has no syntax for (`$` before a final newline,
//! the `(*CRLF)` dot, backreferences, lookaround and atomic groups) are
//! written as capture groups with reserved names, which the program compiler
//! recognises. See [`Synthetic`].

use super::directive::{Newline, StartOptions};
use crate::error::{RegexError, Result};

const ASCII_DIGIT: &str = "0-9";
const ASCII_WORD: &str = "0-9A-Za-z_";
const ASCII_SPACE: &str = r"\t\n\x0B\x0C\r ";

/// Group names starting with this prefix are reserved for [`Synthetic`] groups
const RESERVED_PREFIX: &str = "__ib";

/// A construct carried through `regex-syntax` as a reserved capture group
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Synthetic {
    /// `$` or `\Z`. The group wraps the `regex-syntax` anchor, which is
    /// `\z` unless multi-line mode was in effect.
    Dollar,
    /// `.` under `(*CRLF)`. The group wraps `.` to capture the `s` flag.
    Dot,
    /// The group wraps the assertion body
    Look { ahead: bool, negate: bool },
    /// `(?>...)` and possessive quantifiers. The group wraps the body.
    Atomic,
    /// The group wraps `k`, which is a class when case-insensitive
    Backref(usize),
    NamedBackref(String),
}

impl Synthetic {
    fn tag(&self) -> String {
        match self {
            Synthetic::Dollar => "eol".to_string(),
            Synthetic::Dot => "dot".to_string(),
            Synthetic::Atomic => "atomic".to_string(),
            Synthetic::Look { ahead, negate } => {
                let dir = if *ahead { "la" } else { "lb" };
                if *negate {
                    format!("n{}", dir)
                } else {
                    dir.to_string()
                }
            }
            Synthetic::Backref(group) => format!("ref{}", group),
            Synthetic::NamedBackref(name) => format!("named_{}", name),
        }
    }

    /// Recognise a reserved group name written by the translator
    pub fn parse(name: &str) -> Option<Synthetic> {
        let rest = name.strip_prefix(RESERVED_PREFIX)?;
        let (serial, tag) = rest.split_once('_')?;
        if serial.is_empty() || !serial.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let synthetic = match tag {
            "eol" => Synthetic::Dollar,
            "dot" => Synthetic::Dot,
            "atomic" => Synthetic::Atomic,
            "la" => Synthetic::Look { ahead: true, negate: false },
            "nla" => Synthetic::Look { ahead: true, negate: true },
            "lb" => Synthetic::Look { ahead: false, negate: false },
            "nlb" => Synthetic::Look { ahead: false, negate: true },
            _ => {
                if let Some(name) = tag.strip_prefix("named_") {
                    Synthetic::NamedBackref(name.to_string())
                } else {
                    Synthetic::Backref(tag.strip_prefix("ref")?.parse().ok()?)
                }
            }
        };
        Some(synthetic)
    }
}

/// Translate a pattern body. `extended` is the `x` flag; `(*UCP)` and the
/// newline convention come from the start options.
pub fn translate(pattern: &str, extended: bool, start: &StartOptions) -> Result<String> {
    Translator {
        chars: pattern.chars().collect(),
        pos: 0,
        out: String::with_capacity(pattern.len() + 8),
        extended,
        ucp: start.ucp,
        crlf_dot: start.newline() == Newline::CrLf,
        groups: 0,
        serial: 0,
        atom: None,
        open: Vec::new(),
        unfolded: String::new(),
    }
    .run()
}

struct Translator {
    chars: Vec<char>,
    pos: usize,
    out: String,
    extended: bool,
    ucp: bool,
    crlf_dot: bool,
    /// Capturing groups opened so far
    groups: usize,
    /// Counter keeping reserved group names unique
    serial: usize,
    /// Output offset where the last complete atom begins
    atom: Option<usize>,
    /// Output offsets of the groups still open
    open: Vec<usize>,
    /// ASCII `\w` / `\W` items of the class being translated
    unfolded: String,
}

impl Translator {
    fn run(mut self) -> Result<String> {
        while let Some(c) = self.peek(0) {
            match c {
                '\\' => {
                    self.atom = Some(self.out.len());
                    self.escape(false)?
                }
                '[' => {
                    self.atom = Some(self.out.len());
                    self.class()?
                }
                '(' if self.peek(1) == Some('*') => {
                    return Err(RegexError::parse(
                        "(*VERB) start options are only allowed at the start of the pattern",
                    ));
                }
                '(' => self.group()?,
                ')' => {
                    self.pos += 1;
                    self.atom = self.open.pop();
                    self.out.push(')');
                }
                '|' => {
                    self.pos += 1;
                    self.atom = None;
                    self.out.push('|');
                }
                '*' | '+' | '?' => self.quantifier(1),
                '{' => match self.counted_len() {
                    Some(len) => self.quantifier(len),
                    // Not a repetition, so the brace is a literal
                    None => {
                        self.pos += 1;
                        self.atom = Some(self.out.len());
                        self.out.push_str(r"\{");
                    }
                },
                '$' => {
                    self.pos += 1;
                    self.atom = Some(self.out.len());
                    self.wrapped(Synthetic::Dollar, "$");
                }
                '.' if self.crlf_dot => {
                    self.pos += 1;
                    self.atom = Some(self.out.len());
                    self.wrapped(Synthetic::Dot, ".");
                }
                '#' if self.extended => self.skip_line_comment(),
                c if self.extended && is_pattern_whitespace(c) => self.pos += 1,
                c => {
                    self.pos += 1;
                    self.atom = Some(self.out.len());
                    self.out.push(c);
                }
            }
        }
        Ok(self.out)
    }

    /// Length of `{n}`, `{n,}` or `{n,m}` at `self.pos`
    fn counted_len(&self) -> Option<usize> {
        let mut len = 1;
        let digits = |from: usize| {
            (from..)
                .take_while(|&i| self.peek(i).map_or(false, |c| c.is_ascii_digit()))
                .count()
        };
        let min = digits(len);
        if min == 0 {
            return None;
        }
        len += min;
        if self.peek(len) == Some(',') {
            len += 1;
            len += digits(len);
        }
        (self.peek(len) == Some('}')).then_some(len + 1)
    }

    /// Copy a quantifier of `len` chars and its lazy or possessive suffix. A
    /// possessive quantifier becomes an atomic group around the last atom.
    fn quantifier(&mut self, len: usize) {
        self.out.extend(&self.chars[self.pos..self.pos + len]);
        self.pos += len;
        match self.peek(0) {
            Some('?') => {
                self.pos += 1;
                self.out.push('?');
            }
            Some('+') => {
                self.pos += 1;
                if let Some(start) = self.atom {
                    let open = self.synthetic_open(Synthetic::Atomic);
                    self.out.insert_str(start, &open);
                    self.out.push(')');
                }
            }
            _ => {}
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn looking_at(&self, text: &str) -> bool {
        text.chars().enumerate().all(|(i, c)| self.peek(i) == Some(c))
    }

    fn synthetic_open(&mut self, synthetic: Synthetic) -> String {
        let open = format!("(?P<{}{}_{}>", RESERVED_PREFIX, self.serial, synthetic.tag());
        self.serial += 1;
        open
    }

    /// Open a reserved group; the caller writes its body and closing paren
    fn open_synthetic(&mut self, synthetic: Synthetic) {
        let open = self.synthetic_open(synthetic);
        self.out.push_str(&open);
    }

    fn wrapped(&mut self, synthetic: Synthetic, body: &str) {
        self.open_synthetic(synthetic);
        self.out.push_str(body);
        self.out.push(')');
    }

    /// Group opening at `self.pos` (a `(`)
    fn group(&mut self) -> Result<()> {
        if self.peek(1) != Some('?') {
            self.groups += 1;
            self.pos += 1;
            self.open.push(self.out.len());
            self.out.push('(');
            return Ok(());
        }

        if self.looking_at("(?#") {
            return self.skip_comment_group();
        }
        if self.looking_at("(?P=") {
            self.pos += 4;
            let name = self.group_name(')')?;
            self.atom = Some(self.out.len());
            self.wrapped(Synthetic::NamedBackref(name), "k");
            return Ok(());
        }

        self.open.push(self.out.len());
        let reserved = [
            ("(?=", Synthetic::Look { ahead: true, negate: false }),
            ("(?!", Synthetic::Look { ahead: true, negate: true }),
            ("(?<=", Synthetic::Look { ahead: false, negate: false }),
            ("(?<!", Synthetic::Look { ahead: false, negate: true }),
            ("(?>", Synthetic::Atomic),
        ];
        for (open, synthetic) in reserved {
            if self.looking_at(open) {
                self.pos += open.chars().count();
                self.open_synthetic(synthetic);
                return Ok(());
            }
        }

        for open in ["(?<", "(?P<"] {
            if self.looking_at(open) {
                let name_start = self.pos + open.chars().count();
                let name: String = self.chars[name_start..].iter().take_while(|&&c| c != '>').collect();
                if name.starts_with(RESERVED_PREFIX) {
                    return Err(RegexError::parse(format!("group name '{}' is reserved", name)));
                }
                self.groups += 1;
                break;
            }
        }
        self.pos += 2;
        self.out.push_str("(?");
        Ok(())
    }

    /// Group name up to `close`, which is consumed
    fn group_name(&mut self, close: char) -> Result<String> {
        let end = self.chars[self.pos..]
            .iter()
            .position(|&c| c == close)
            .ok_or_else(|| RegexError::parse(format!("missing {} after group name", close)))?;
        let name: String = self.chars[self.pos..self.pos + end].iter().collect();
        self.pos += end + 1;
        let valid = name
            .chars()
            .next()
            .map_or(false, |c| c == '_' || c.is_ascii_alphabetic())
            && name.chars().all(|c| c == '_' || c.is_ascii_alphanumeric());
        if !valid {
            return Err(RegexError::parse(format!("invalid group name '{}'", name)));
        }
        Ok(name)
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek(0) {
            self.pos += 1;
            if c == '\n' {
                break;
            }
        }
    }

    fn skip_comment_group(&mut self) -> Result<()> {
        let close = self.chars[self.pos..]
            .iter()
            .position(|&c| c == ')')
            .ok_or_else(|| RegexError::parse("missing ) after (?# comment"))?;
        self.pos += close + 1;
        Ok(())
    }

    fn digits(&mut self, radix: u32, max: usize) -> Option<u32> {
        let mut value = None;
        for _ in 0..max {
            let Some(d) = self.peek(0).and_then(|c| c.to_digit(radix)) else {
                break;
            };
            value = Some(value.unwrap_or(0u32).saturating_mul(radix).saturating_add(d));
            self.pos += 1;
        }
        value
    }

    fn push_codepoint(&mut self, value: u32) -> Result<()> {
        if char::from_u32(value).is_none() {
            return Err(RegexError::parse(format!("character code point {:X} is invalid", value)));
        }
        self.out.push_str(&format!(r"\x{{{:X}}}", value));
        Ok(())
    }

    fn backref(&mut self, group: usize) {
        self.wrapped(Synthetic::Backref(group), "k");
    }

    /// `\1`..`\9...` outside a class: a backreference when below 10 or when
    /// that many groups are already open, otherwise octal
    fn numbered_escape(&mut self, first: char) -> Result<()> {
        let digits_start = self.pos - 1;
        self.pos = digits_start;
        let number = self.digits(10, 10).unwrap_or(0) as usize;
        if number < 10 || first == '8' || first == '9' || number <= self.groups {
            self.backref(number);
            return Ok(());
        }
        self.pos = digits_start;
        let value = self.digits(8, 3).unwrap_or(0);
        self.push_codepoint(value)
    }

    /// `\g{N}`, `\g{-N}`, `\gN`, `\g{name}`
    fn g_escape(&mut self) -> Result<()> {
        let braced = self.peek(0) == Some('{');
        let text = if braced {
            self.pos += 1;
            let end = self.chars[self.pos..]
                .iter()
                .position(|&c| c == '}')
                .ok_or_else(|| RegexError::parse(r"\g is not followed by a braced, angle-bracketed, or quoted name/number"))?;
            let text: String = self.chars[self.pos..self.pos + end].iter().collect();
            self.pos += end + 1;
            text
        } else {
            let start = self.pos;
            if self.peek(0) == Some('-') {
                self.pos += 1;
            }
            self.digits(10, 10);
            self.chars[start..self.pos].iter().collect()
        };

        if let Some(relative) = text.strip_prefix('-') {
            let back: usize = relative
                .parse()
                .map_err(|_| RegexError::parse(format!(r"invalid \g reference '{}'", text)))?;
            let group = (self.groups + 1).checked_sub(back).filter(|_| back > 0).unwrap_or(0);
            self.backref(group);
        } else if let Ok(group) = text.parse::<usize>() {
            self.backref(group);
        } else if braced && !text.is_empty() {
            let name = text;
            self.wrapped(Synthetic::NamedBackref(name), "k");
        } else {
            return Err(RegexError::parse(
                r"\g is not followed by a braced, angle-bracketed, or quoted name/number",
            ));
        }
        Ok(())
    }

    /// `\k<name>`, `\k'name'`, `\k{name}`
    fn k_escape(&mut self) -> Result<()> {
        let close = match self.peek(0) {
            Some('<') => '>',
            Some('\'') => '\'',
            Some('{') => '}',
            _ => {
                return Err(RegexError::parse(
                    r"\k is not followed by a braced, angle-bracketed, or quoted name",
                ))
            }
        };
        self.pos += 1;
        let name = self.group_name(close)?;
        self.wrapped(Synthetic::NamedBackref(name), "k");
        Ok(())
    }

    /// Escape at `self.pos` (a backslash)
    fn escape(&mut self, in_class: bool) -> Result<()> {
        let next = self
            .peek(1)
            .ok_or_else(|| RegexError::parse("\\ at end of pattern"))?;
        self.pos += 2;

        match next {
            // Case folding would add U+212A and U+017F to ASCII \w, so the set
            // is written with `i` switched off
            'w' | 'W' if !self.ucp => {
                let negated = next == 'W';
                if in_class {
                    if negated {
                        self.unfolded.push_str(&format!("[^{}]", ASCII_WORD));
                    } else {
                        self.unfolded.push_str(ASCII_WORD);
                    }
                } else {
                    let caret = if negated { "^" } else { "" };
                    self.out.push_str(&format!("(?-i:[{}{}])", caret, ASCII_WORD));
                }
            }
            'd' | 'D' | 's' | 'S' if !self.ucp => {
                let set = match next.to_ascii_lowercase() {
                    'd' => ASCII_DIGIT,
                    _ => ASCII_SPACE,
                };
                let negated = next.is_ascii_uppercase();
                match (in_class, negated) {
                    (true, false) => self.out.push_str(set),
                    _ => {
                        self.out.push('[');
                        if negated {
                            self.out.push('^');
                        }
                        self.out.push_str(set);
                        self.out.push(']');
                    }
                }
            }
            // Backspace inside a class, word boundary outside
            'b' if in_class => self.out.push_str(r"\x08"),
            'b' if !self.ucp => self.out.push_str(r"(?-u:\b)"),
            '0' => {
                let value = self.digits(8, 2).unwrap_or(0);
                self.push_codepoint(value)?;
            }
            '1'..='7' if in_class => {
                self.pos -= 1;
                let value = self.digits(8, 3).unwrap_or(0);
                self.push_codepoint(value)?;
            }
            '8' | '9' if in_class => self.out.push(next),
            '1'..='9' => self.numbered_escape(next)?,
            'g' if !in_class => self.g_escape()?,
            'k' if !in_class => self.k_escape()?,
            'Z' if !in_class => self.wrapped(Synthetic::Dollar, r"\z"),
            'e' => self.out.push_str(r"\x1B"),
            'Q' => self.quoted(),
            // A stray \E outside \Q...\E is ignored
            'E' => {}
            other => {
                self.out.push('\\');
                self.out.push(other);
            }
        }
        Ok(())
    }

    /// `\Q...\E`: everything up to `\E` (or the end) is literal
    fn quoted(&mut self) {
        let mut literal = String::new();
        while let Some(c) = self.peek(0) {
            if c == '\\' && self.peek(1) == Some('E') {
                self.pos += 2;
                break;
            }
            literal.push(c);
            self.pos += 1;
        }
        self.out.push_str(&regex_syntax::escape(&literal));
    }

    /// Character class starting at `self.pos` (a `[`)
    fn class(&mut self) -> Result<()> {
        let outer = std::mem::take(&mut self.out);
        self.unfolded.clear();
        self.pos += 1;
        let negated = self.peek(0) == Some('^');
        if negated {
            self.pos += 1;
        }
        // A `]` right after the opening bracket is a literal
        if self.peek(0) == Some(']') {
            self.pos += 1;
            self.out.push_str(r"\]");
        }

        loop {
            let c = self
                .peek(0)
                .ok_or_else(|| RegexError::parse("missing terminating ] for character class"))?;
            match c {
                ']' => {
                    self.pos += 1;
                    break;
                }
                '\\' => self.escape(true)?,
                '[' if self.peek(1) == Some(':') => self.posix_class()?,
                '[' | '&' | '~' => {
                    self.pos += 1;
                    self.out.push('\\');
                    self.out.push(c);
                }
                c => {
                    self.pos += 1;
                    self.out.push(c);
                }
            }
        }

        let items = std::mem::replace(&mut self.out, outer);
        let unfolded = std::mem::take(&mut self.unfolded);
        self.emit_class(negated, &items, &unfolded);
        Ok(())
    }

    /// Write a class whose ASCII word items must not be case-folded. Those
    /// go in a `(?-i:...)` class next to the ordinary items.
    fn emit_class(&mut self, negated: bool, items: &str, unfolded: &str) {
        let caret = if negated { "^" } else { "" };
        // The leading caret was consumed, so one left at the front is a literal
        let items = match items.strip_prefix('^') {
            Some(rest) => format!(r"\^{}", rest),
            None => items.to_string(),
        };
        if unfolded.is_empty() {
            self.out.push_str(&format!("[{}{}]", caret, items));
            return;
        }
        let words = format!("(?-i:[{}{}])", caret, unfolded);
        if items.is_empty() {
            self.out.push_str(&words);
        } else if negated {
            // Outside both sets: not an ordinary item, and outside the words
            self.out.push_str("(?:");
            self.open_synthetic(Synthetic::Look { ahead: true, negate: true });
            self.out.push_str(&format!("[{}])", items));
            self.out.push_str(&words);
            self.out.push(')');
        } else {
            self.out.push_str(&format!("(?:[{}]|{})", items, words));
        }
    }

    /// `[:name:]` or `[:^name:]` inside a class
    fn posix_class(&mut self) -> Result<()> {
        let body_start = self.pos + 2;
        let end = (body_start..self.chars.len().saturating_sub(1))
            .find(|&i| self.chars[i] == ':' && self.chars[i + 1] == ']');
        let Some(end) = end else {
            // Not a POSIX class after all; the bracket is a literal
            self.pos += 1;
            self.out.push_str(r"\[");
            return Ok(());
        };

        let body: String = self.chars[body_start..end].iter().collect();
        self.pos = end + 2;
        let (negated, name) = match body.strip_prefix('^') {
            Some(name) => (true, name),
            None => (false, body.as_str()),
        };

        match self.ucp.then(|| unicode_posix(name)).flatten() {
            Some(set) if negated => {
                self.out.push_str("[^");
                self.out.push_str(set);
                self.out.push(']');
            }
            Some(set) => self.out.push_str(set),
            None => {
                self.out.push_str("[:");
                self.out.push_str(&body);
                self.out.push_str(":]");
            }
        }
        Ok(())
    }
}

/// Unicode replacements for POSIX classes under `(*UCP)`, as class contents.
/// Classes without a Unicode meaning keep their ASCII definition.
fn unicode_posix(name: &str) -> Option<&'static str> {
    let set = match name {
        "alpha" => r"\p{L}",
        "lower" => r"\p{Ll}",
        "upper" => r"\p{Lu}",
        "digit" => r"\p{Nd}",
        "alnum" => r"\p{L}\p{N}",
        "space" => r"\s",
        "word" => r"\w",
        "cntrl" => r"\p{Cc}",
        "blank" => r"\p{Zs}\t",
        _ => return None,
    };
    Some(set)
}

/// Characters skipped in free-spacing mode
fn is_pattern_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0B' | '\x0C' | '\r')
}
