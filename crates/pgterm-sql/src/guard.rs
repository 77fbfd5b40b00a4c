//! Confirmation gate for unfiltered mutations.
//!
//! An `UPDATE` or `DELETE` with no `WHERE` after its verb touches every row of
//! the table. Such statements are held until a [`Prompter`] confirms them.
//!
//! The check is a token scan, not a parse. String literals are skipped,
//! including `E'...'` escape strings and `$$`/`$tag$` dollar-quoted bodies.
//! Quoted identifiers and comments are skipped too, so
//! `DELETE FROM t -- where id = 1` still counts as unfiltered. Known gaps:
//! - a `WHERE` inside a subquery of an unfiltered `UPDATE ... SET x = (...)`
//!   counts as a filter
//! - data-modifying CTEs (`WITH d AS (DELETE FROM t) ...`) are not inspected

use std::fmt;
use std::io;

use crate::error::QUERY_CANCELLED;

/// Source of interactive confirmations.
pub trait Prompter {
    /// Ask a yes/no question. `Ok(true)` means the operator agreed.
    fn confirm(&mut self, message: &str) -> io::Result<bool>;
}

impl<F> Prompter for F
where
    F: FnMut(&str) -> io::Result<bool>,
{
    fn confirm(&mut self, message: &str) -> io::Result<bool> {
        self(message)
    }
}

/// Prompter that answers every question the same way without asking.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Prompter for FixedAnswer {
    fn confirm(&mut self, _message: &str) -> io::Result<bool> {
        Ok(self.0)
    }
}

/// A mutation verb the guard watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Update,
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationKind::Update => f.write_str("UPDATE"),
            MutationKind::Delete => f.write_str("DELETE"),
        }
    }
}

/// What a scan of the statement found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inspection {
    Safe,
    Unfiltered(MutationKind),
}

/// Outcome of the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Proceed,
    Abort(String),
}

/// Scan `sql` for an `UPDATE`/`DELETE` statement without `WHERE`.
///
/// Each `;`-separated statement is checked on its own; the first unfiltered
/// one decides.
pub fn inspect(sql: &str) -> Inspection {
    for segment in tokenize(sql).split(|t| t == ";") {
        let words: Vec<&str> = segment
            .iter()
            .filter_map(|t| t.strip_prefix(WORD_MARK))
            .collect();

        let kind = match words.first().map(|w| w.to_ascii_uppercase()) {
            Some(w) if w == "UPDATE" => MutationKind::Update,
            Some(w) if w == "DELETE" => MutationKind::Delete,
            _ => continue,
        };
        if !words[1..].iter().any(|w| w.eq_ignore_ascii_case("WHERE")) {
            return Inspection::Unfiltered(kind);
        }
    }
    Inspection::Safe
}

/// Decide whether `sql` may be dispatched, asking `prompter` when needed.
///
/// A prompter that fails to answer counts as a refusal.
pub fn evaluate(sql: &str, prompter: &mut dyn Prompter) -> GuardDecision {
    let Inspection::Unfiltered(kind) = inspect(sql) else {
        return GuardDecision::Proceed;
    };

    let message = format!("{kind} without a WHERE clause affects every row. Continue?");
    match prompter.confirm(&message) {
        Ok(true) => {
            tracing::info!(%kind, "Unfiltered mutation confirmed");
            GuardDecision::Proceed
        }
        Ok(false) => {
            tracing::warn!(%kind, "Unfiltered mutation declined");
            GuardDecision::Abort(QUERY_CANCELLED.to_string())
        }
        Err(e) => {
            tracing::warn!(%kind, error = %e, "Confirmation failed, treating as declined");
            GuardDecision::Abort(QUERY_CANCELLED.to_string())
        }
    }
}

/// Marks bare words so they can be told apart from punctuation tokens.
const WORD_MARK: char = '\u{0}';

/// Split into bare words and `;` separators, dropping literals and comments.
fn tokenize(sql: &str) -> Vec<String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut i = 0;

    let flush = |word: &mut String, tokens: &mut Vec<String>| {
        if !word.is_empty() {
            tokens.push(format!("{WORD_MARK}{word}"));
            word.clear();
        }
    };

    while i < chars.len() {
        let c = chars[i];
        match c {
            // `E'...'` takes backslash escapes; the `E` is part of the literal.
            '\'' if word.eq_ignore_ascii_case("e") => {
                word.clear();
                i = skip_escaped_literal(&chars, i + 1);
                tokens.push(String::from("literal"));
            }
            '\'' | '"' => {
                flush(&mut word, &mut tokens);
                i = skip_quoted(&chars, i + 1, c);
                tokens.push(String::from("literal"));
            }
            // `$1` parameters and `$` inside identifiers stay part of a word.
            '$' if word.is_empty() => match dollar_delimiter_len(&chars, i) {
                Some(len) => {
                    i = skip_past(&chars, i + len, &chars[i..i + len]);
                    tokens.push(String::from("literal"));
                }
                None => {
                    word.push(c);
                    i += 1;
                }
            },
            '-' if chars.get(i + 1) == Some(&'-') => {
                flush(&mut word, &mut tokens);
                i = skip_past(&chars, i + 2, &['\n']);
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                flush(&mut word, &mut tokens);
                i = skip_past(&chars, i + 2, &['*', '/']);
            }
            ';' => {
                flush(&mut word, &mut tokens);
                tokens.push(String::from(";"));
                i += 1;
            }
            c if c.is_whitespace() || "(),=<>!+*/-".contains(c) => {
                flush(&mut word, &mut tokens);
                i += 1;
            }
            c => {
                word.push(c);
                i += 1;
            }
        }
    }
    flush(&mut word, &mut tokens);
    tokens
}

/// Index just past the first `end` at or after `from`, or the end of input.
fn skip_past(chars: &[char], from: usize, end: &[char]) -> usize {
    (from..chars.len())
        .find(|&j| chars[j..].starts_with(end))
        .map_or(chars.len(), |j| j + end.len())
}

/// Doubled quotes inside a literal close and reopen it, so the first match
/// is enough.
fn skip_quoted(chars: &[char], from: usize, quote: char) -> usize {
    skip_past(chars, from, &[quote])
}

fn skip_escaped_literal(chars: &[char], from: usize) -> usize {
    let mut j = from;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            '\'' if chars.get(j + 1) == Some(&'\'') => j += 2,
            '\'' => return j + 1,
            _ => j += 1,
        }
    }
    chars.len()
}

/// Length of a `$$` or `$tag$` opening delimiter starting at `start`.
fn dollar_delimiter_len(chars: &[char], start: usize) -> Option<usize> {
    let tag_len = chars[start + 1..]
        .iter()
        .take_while(|c| c.is_alphanumeric() || **c == '_')
        .count();
    let closing = start + 1 + tag_len;
    let starts_with_digit = chars.get(start + 1).is_some_and(|c| c.is_ascii_digit());
    (chars.get(closing) == Some(&'$') && !starts_with_digit).then_some(tag_len + 2)
}
