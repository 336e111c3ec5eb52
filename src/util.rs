//! Text normalization shared by the catalog, registry and resolvers.
//!
//! Host labels arrive with colour codes, non-breaking spaces, stray control
//! characters and occasionally cp1251 bytes decoded as Latin-1. Every lookup
//! key goes through [`norm_key`] or [`norm_ident`] so all of that is
//! invisible to matching.

use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Compile a pattern written into the source. Only for string literals
/// covered by tests; user-supplied patterns must go through `Regex::new`.
#[allow(clippy::expect_used)]
pub(crate) fn static_regex(pattern: &'static str) -> Regex {
    Regex::new(pattern).expect("static pattern compiles")
}

/// Remove `§x` colour codes and control characters, and repair cp1251
/// mojibake (`àáâ…` → `абв…`).
pub fn strip_colors(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{a7}' {
            chars.next();
            continue;
        }
        if ch.is_control() {
            continue;
        }
        out.push(repair_mojibake(ch));
    }
    out
}

fn repair_mojibake(ch: char) -> char {
    match ch {
        '\u{b8}' => 'ё',
        // à..ÿ map one-to-one onto а..я, skipping ÷ (U+F7), which has no
        // letter counterpart in the cp1251 lowercase block.
        'à'..='ö' | 'ø'..='ÿ' => {
            let offset = u32::from(ch) - u32::from('à');
            let offset = if ch >= 'ø' { offset - 1 } else { offset };
            char::from_u32(u32::from('а') + offset).unwrap_or(ch)
        }
        other => other,
    }
}

/// Fold diacritics: NFKD then drop combining marks.
pub fn fold_diacritics(text: &str) -> String {
    text.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Normalized lookup key for labels: colours stripped, diacritics folded,
/// whitespace collapsed, lowercased.
pub fn norm_key(text: &str) -> String {
    let cleaned = fold_diacritics(&strip_colors(text).replace('\u{a0}', " "));
    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Normalized identifier: like [`norm_key`] but also ignores spaces,
/// underscores and dashes, so `all_players`, `All Players` and
/// `allplayers` compare equal.
pub fn norm_ident(text: &str) -> String {
    fold_diacritics(&strip_colors(text))
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-' && *c != '\\')
        .collect()
}

/// Strip one layer of matching single or double quotes.
pub fn unquote(text: &str) -> &str {
    let s = text.trim();
    for q in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return s.get(1..s.len() - 1).unwrap_or(s);
        }
    }
    s
}

/// Whether `text` is wrapped in a matching pair of quotes.
pub fn is_quoted(text: &str) -> bool {
    let s = text.trim();
    s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_colour_codes_and_controls() {
        assert_eq!(strip_colors("\u{a7}aПривет\u{a7}r\u{1}!"), "Привет!");
    }

    #[test]
    fn repairs_cp1251_mojibake() {
        // "Массив" as cp1251 bytes read back as Latin-1, lowercase part only
        assert_eq!(strip_colors("Màññèâ"), "Массив");
        assert_eq!(strip_colors("\u{b8}æ"), "ёж");
    }

    #[test]
    fn norm_key_ignores_case_space_and_diacritics() {
        assert_eq!(norm_key("  Действие\u{a0}  ИГРОКА "), "действие игрока");
        assert_eq!(norm_key("Café"), norm_key("cafe"));
    }

    #[test]
    fn norm_ident_drops_separators() {
        assert_eq!(norm_ident("All_Players"), "allplayers");
        assert_eq!(norm_ident("без разделения"), norm_ident("без_разделения"));
    }

    #[test]
    fn unquote_strips_one_layer() {
        assert_eq!(unquote("\"hi\""), "hi");
        assert_eq!(unquote("'a b'"), "a b");
        assert_eq!(unquote("plain"), "plain");
        assert!(is_quoted(" \"x\" "));
        assert!(!is_quoted("\"x"));
    }
}
