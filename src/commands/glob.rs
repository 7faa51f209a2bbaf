//! Glob to regular expression translation for `KEYS`.
//!
//! Clients send Redis-style globs; the storage engine only accepts regular
//! expressions. Supported glob syntax:
//!
//! - `*` matches any sequence, including an empty one
//! - `?` matches exactly one character
//! - `[ae]`, `[a-z]` match one character from the class; `[!a]` or `[^a]` negate it
//! - `\x` matches `x` literally
//!
//! Everything else matches itself. An unterminated `[` is taken literally.

use std::iter::Peekable;
use std::str::Chars;

/// Translates a glob into an anchored regular expression.
///
/// # Example
///
/// ```
/// use linekv::commands::glob_to_regex;
///
/// assert_eq!(glob_to_regex("user:*"), "^user:.*$");
/// assert_eq!(glob_to_regex("h?llo"), "^h.llo$");
/// ```
pub fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() * 2 + 2);
    out.push('^');

    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '\\' => push_literal(&mut out, chars.next().unwrap_or('\\')),
            '[' => match translate_class(&mut chars) {
                Some(class) => out.push_str(&class),
                None => push_literal(&mut out, '['),
            },
            c => push_literal(&mut out, c),
        }
    }

    out.push('$');
    out
}

fn push_literal(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}

/// Characters that carry meaning inside a regex class and must be escaped.
fn is_class_special(c: char) -> bool {
    matches!(c, '[' | ']' | '\\' | '&' | '~' | '^')
}

fn push_class_char(class: &mut String, c: char) {
    if is_class_special(c) {
        class.push('\\');
    }
    class.push(c);
}

/// Translates the class following an opening `[`.
///
/// Advances `chars` past the closing `]` on success; leaves it untouched and
/// returns `None` if the class is never closed.
fn translate_class(chars: &mut Peekable<Chars<'_>>) -> Option<String> {
    let mut lookahead = chars.clone();
    let mut class = String::from("[");

    if matches!(lookahead.peek(), Some('!') | Some('^')) {
        lookahead.next();
        class.push('^');
    }

    let mut empty = true;
    loop {
        match lookahead.next()? {
            ']' if !empty => {
                class.push(']');
                *chars = lookahead;
                return Some(class);
            }
            '\\' => push_class_char(&mut class, lookahead.next()?),
            c => push_class_char(&mut class, c),
        }
        empty = false;
    }
}
