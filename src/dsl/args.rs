//! Argument-list splitting for action calls.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::util::is_quoted;

/// Nesting-aware scanner state shared by the splitting helpers.
#[derive(Default)]
struct Depth {
    quote: Option<char>,
    escaped: bool,
    paren: usize,
    brace: usize,
    bracket: usize,
}

impl Depth {
    /// Feed one character; returns true when it sits at top level outside
    /// any quote or bracket pair.
    fn feed(&mut self, ch: char) -> bool {
        if self.escaped {
            self.escaped = false;
            return false;
        }
        if ch == '\\' {
            self.escaped = true;
            return false;
        }
        if ch == '"' || ch == '\'' {
            match self.quote {
                Some(q) if q == ch => self.quote = None,
                None => self.quote = Some(ch),
                Some(_) => {}
            }
            return false;
        }
        if self.quote.is_some() {
            return false;
        }
        match ch {
            '(' => self.paren += 1,
            ')' => self.paren = self.paren.saturating_sub(1),
            '{' => self.brace += 1,
            '}' => self.brace = self.brace.saturating_sub(1),
            '[' => self.bracket += 1,
            ']' => self.bracket = self.bracket.saturating_sub(1),
            _ => return self.paren == 0 && self.brace == 0 && self.bracket == 0,
        }
        false
    }
}

/// Split on top-level commas. Quotes, escapes and `()`/`{}`/`[]` nesting
/// are respected; empty pieces are dropped.
pub fn split_args(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut buf = String::new();
    let mut depth = Depth::default();
    for ch in text.chars() {
        if depth.feed(ch) && ch == ',' {
            let piece = buf.trim();
            if !piece.is_empty() {
                parts.push(piece.to_string());
            }
            buf.clear();
            continue;
        }
        buf.push(ch);
    }
    let piece = buf.trim();
    if !piece.is_empty() {
        parts.push(piece.to_string());
    }
    parts
}

/// Split `key=value` at the first top-level `=`.
pub fn split_top_level_eq(token: &str) -> Option<(&str, &str)> {
    let mut depth = Depth::default();
    for (i, ch) in token.char_indices() {
        if depth.feed(ch) && ch == '=' {
            let (key, rest) = token.split_at(i);
            return Some((key, rest.get(1..).unwrap_or_default()));
        }
    }
    None
}

/// Whether the parenthesis at byte `open` closes on the last character of
/// `text` (so `f(1) + g(2)` is not a single call).
pub fn closes_at_end(text: &str, open: usize) -> bool {
    let Some(tail) = text.get(open..) else { return false };
    if !tail.starts_with('(') {
        return false;
    }
    let mut depth = Depth::default();
    for (i, ch) in tail.char_indices() {
        depth.feed(ch);
        if ch == ')' && depth.quote.is_none() && depth.paren == 0 {
            return i + ch.len_utf8() == tail.len();
        }
    }
    false
}

fn is_double_quoted(value: &str) -> bool {
    let v = value.trim();
    v.len() >= 2 && v.starts_with('"') && v.ends_with('"')
}

fn strip_double_quotes(value: &str) -> &str {
    let v = value.trim();
    if is_double_quoted(v) {
        v.get(1..v.len() - 1).unwrap_or(v)
    } else {
        v
    }
}

/// Position of one argument within a call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgSlot {
    Positional(usize),
    Keyword(String),
}

/// Call arguments split into keyword and positional parts, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallArgs {
    pub keyword: IndexMap<String, String>,
    pub positional: Vec<String>,
    /// Arguments written as string literals. Their text is data, never a
    /// call or a wrapper.
    pub literals: HashSet<ArgSlot>,
}

impl CallArgs {
    /// A fully quoted token is always positional, even when it contains `=`.
    /// Double quotes around values are removed; single quotes are kept on
    /// unquoted-looking positional values so wrappers see them.
    pub fn parse(text: &str) -> Self {
        let mut args = Self::default();
        for piece in split_args(text) {
            if is_quoted(&piece) {
                args.literals.insert(ArgSlot::Positional(args.positional.len()));
                args.positional.push(crate::util::unquote(&piece).to_string());
                continue;
            }
            match split_top_level_eq(&piece) {
                Some((key, value)) => {
                    let key = key.trim().to_string();
                    if is_double_quoted(value) {
                        args.literals.insert(ArgSlot::Keyword(key.clone()));
                    } else {
                        args.literals.remove(&ArgSlot::Keyword(key.clone()));
                    }
                    args.keyword.insert(key, strip_double_quotes(value).to_string());
                }
                None => args.positional.push(strip_double_quotes(&piece).to_string()),
            }
        }
        args
    }

    pub fn is_literal(&self, slot: &ArgSlot) -> bool {
        self.literals.contains(slot)
    }

    /// Builder used for compiler-generated placements.
    pub fn kw(mut self, key: &str, value: impl Into<String>) -> Self {
        self.keyword.insert(key.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keyword.is_empty() && self.positional.is_empty()
    }
}
