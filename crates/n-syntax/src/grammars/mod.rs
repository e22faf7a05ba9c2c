//! Built-in grammar definitions.
//!
//! Each module returns a [`GrammarDef`](crate::grammar::GrammarDef); the
//! compiled grammars are cached by [`Grammar::builtin`](crate::Grammar::builtin).
//!
//! Writing rules with "longest match wins" in mind: body rules inside a
//! multi-line construct must stop *before* the closing delimiter
//! (`[^*]+` rather than `.*`), otherwise they out-match the closer.

pub mod css;
pub mod javascript;
pub mod json;
pub mod markdown;
pub mod markup;
pub mod python;

use crate::grammar::{RuleDef, StateDef, rule};
use crate::kind::TokenKind;

/// Runs of whitespace. Not needed for correctness (fallback covers it) but
/// saves one rule scan per blank.
pub(crate) fn whitespace() -> RuleDef {
    rule(r"\s+", TokenKind::Plain)
}

/// The state entered after `def` / `class` / `function`: the next
/// identifier is the defined name, anything else returns to `default`.
pub(crate) fn definition_name(name: &'static str, ident: &str) -> StateDef {
    StateDef::new(
        name,
        TokenKind::Plain,
        vec![
            rule(r"[ \t]+", TokenKind::Plain),
            rule(ident, TokenKind::Function).goto("default"),
            rule(r"[^ \t]", TokenKind::Punctuation).goto("default"),
        ],
    )
}

/// A `/* ... */` comment state that returns to `back` when closed.
pub(crate) fn block_comment(name: &'static str, back: &'static str) -> StateDef {
    StateDef::new(
        name,
        TokenKind::Comment,
        vec![
            rule(r"\*/", TokenKind::Comment).goto(back),
            rule(r"[^*]+", TokenKind::Comment),
        ],
    )
}
