//! Declaration extraction from a single migration script.
//!
//! A version script identifies itself with a module-level `revision` binding
//! and names what it revises with a `down_revision` binding. Both appear in
//! several equivalent spellings in the wild:
//!
//! ```text
//! revision = "a1b2c3d4e5f6"
//! revision: str = 'a1b2c3d4e5f6'
//! down_revision = None
//! down_revision: str | None = "8f3e1a2b9c4d"
//! down_revision = ('a1b2c3d4e5f6', '0c9d8e7f6a5b')
//! ```
//!
//! Extraction is line-oriented and deliberately permissive: a script without
//! a revision binding is simply not a migration, and an unrecognized
//! `down_revision` expression degrades to "no parents" rather than an error.
//! A malformed script must never abort a whole-directory scan.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::trace;

use crate::graph::Revision;

/// Parse one migration script into a [`Revision`].
///
/// Returns `None` when the text carries no revision declaration (or the
/// declared identifier is empty) — the blob does not describe a migration
/// and is skipped, not treated as a failure. This function never errors.
///
/// # Arguments
/// * `text` - Raw script contents
/// * `source` - Originating path, carried through for display only
pub fn parse_script(text: &str, source: &Path) -> Option<Revision> {
    let id_rhs = first_binding(text, revision_line())?;
    let id = interpret_identifier(&id_rhs);
    if id.is_empty() {
        return None;
    }

    let down_revisions = first_binding(text, down_revision_line())
        .map(|rhs| interpret_parents(&rhs))
        .unwrap_or_default();

    Some(Revision::new(id, down_revisions, source))
}

/// Normalized right-hand side of the first line matching `pattern`.
fn first_binding(text: &str, pattern: &Regex) -> Option<String> {
    text.lines()
        .find_map(|line| pattern.captures(line))
        .map(|caps| normalize(&caps[1]))
}

/// Normalize a right-hand-side value before interpretation: drop a trailing
/// inline comment (first unescaped `#` outside quotes), collapse whitespace
/// runs to single spaces, and trim. Idempotent.
fn normalize(raw: &str) -> String {
    let uncommented = strip_inline_comment(raw);
    let mut out = String::with_capacity(uncommented.len());
    let mut pending_space = false;
    for ch in uncommented.chars() {
        if ch.is_whitespace() {
            pending_space = true;
        } else {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(ch);
        }
    }
    out
}

/// Truncate at the first `#` that is neither escaped nor inside a quoted
/// string.
fn strip_inline_comment(raw: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, ch) in raw.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '\'' | '"' => match quote {
                Some(open) if open == ch => quote = None,
                Some(_) => {}
                None => quote = Some(ch),
            },
            '#' if quote.is_none() => return &raw[..i],
            _ => {}
        }
    }
    raw
}

/// Interpret the identifier right-hand side.
///
/// A quoted literal spanning the whole value unwraps verbatim (inner
/// whitespace is kept, not re-trimmed). Anything else falls back to the
/// normalized text with stray leading/trailing quote characters stripped.
fn interpret_identifier(value: &str) -> String {
    if let Some(inner) = unwrap_quoted(value) {
        return inner.to_string();
    }
    value.trim_matches(|c| c == '\'' || c == '"').to_string()
}

/// Ordered interpretation rules for the `down_revision` right-hand side.
/// The first rule to produce a value wins; a new literal spelling is a new
/// row here, not another branch in a conditional chain.
const PARENT_RULES: &[(&str, fn(&str) -> Option<Vec<String>>)] = &[
    ("none-literal", parents_from_none),
    ("quoted-literal", parents_from_quoted),
    ("sequence-literal", parents_from_sequence),
    ("bare-token", parents_from_bare_token),
];

/// Interpret the parent right-hand side; unmatched expressions degrade to an
/// empty list (the revision is treated as a base, never an error).
fn interpret_parents(value: &str) -> Vec<String> {
    for (rule, interpret) in PARENT_RULES {
        if let Some(parents) = interpret(value) {
            trace!(rule, count = parents.len(), "matched parent declaration");
            return parents;
        }
    }
    Vec::new()
}

/// Textual `None`/`null`, case-insensitive.
fn parents_from_none(value: &str) -> Option<Vec<String>> {
    (value.eq_ignore_ascii_case("none") || value.eq_ignore_ascii_case("null")).then(Vec::new)
}

/// A single quoted literal spanning the whole value.
fn parents_from_quoted(value: &str) -> Option<Vec<String>> {
    unwrap_quoted(value).map(|inner| vec![inner.to_string()])
}

/// A parenthesized or bracketed sequence containing at least one quoted
/// token. Tokens are kept in order of appearance; per-node deduplication
/// happens later in [`Revision::new`].
fn parents_from_sequence(value: &str) -> Option<Vec<String>> {
    let inner = value
        .strip_prefix('(')
        .and_then(|v| v.strip_suffix(')'))
        .or_else(|| value.strip_prefix('[').and_then(|v| v.strip_suffix(']')))?;

    let tokens: Vec<String> = quoted_token()
        .captures_iter(inner)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect();

    if tokens.is_empty() {
        None
    } else {
        Some(tokens)
    }
}

/// A bare alphanumeric/underscore token with no quotes or brackets.
fn parents_from_bare_token(value: &str) -> Option<Vec<String>> {
    let is_token =
        !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    is_token.then(|| vec![value.to_string()])
}

/// Inner text of a quoted literal spanning the whole value, if any.
fn unwrap_quoted(value: &str) -> Option<&str> {
    quoted_value()
        .captures(value)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str())
}

/// Line pattern for the `revision` binding, optionally type-annotated.
fn revision_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*revision(?:\s*:[^=]*)?\s*=\s*(.+)$").expect("revision pattern compiles")
    })
}

/// Line pattern for the `down_revision` binding, optionally type-annotated.
fn down_revision_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*down_revision(?:\s*:[^=]*)?\s*=\s*(.+)$")
            .expect("down_revision pattern compiles")
    })
}

/// A quoted literal spanning an entire value.
fn quoted_value() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^'([^']*)'$|^"([^"]*)"$"#).expect("quoted pattern compiles"))
}

/// Quoted tokens inside a sequence literal.
fn quoted_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"'([^']*)'|"([^"]*)""#).expect("token pattern compiles"))
}
