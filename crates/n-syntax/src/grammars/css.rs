//! CSS (and the plain-CSS subset of SCSS / Less).
//!
//! Three contexts: selectors, a declaration block, and a property value.
//! Comments get one state per context so closing them returns to the right
//! place. Nested blocks (`@media { a { } }`) are not tracked.

use crate::grammar::{GrammarDef, RuleDef, StateDef, rule, words};
use crate::grammars::{block_comment, whitespace};
use crate::kind::TokenKind::{
    Attribute, Builtin, Comment, Function, Identifier, Keyword, Number, Operator, Plain,
    Punctuation, String, Tag,
};
use crate::language::Language;

const VALUE_KEYWORDS: &[&str] = &["inherit", "initial", "unset", "revert", "auto", "none"];

#[must_use]
pub fn definition() -> GrammarDef {
    GrammarDef {
        language: Language::Css,
        states: vec![
            StateDef::new(
                "default",
                Plain,
                vec![
                    whitespace(),
                    rule(r"/\*", Comment).goto("comment_default"),
                    rule(r"@[\w-]+", Keyword),
                    rule(r"[.#]?[A-Za-z_-][\w-]*", Tag),
                    rule(r"::?[\w-]+", Builtin),
                    rule(r"\[[^\]]*\]", Attribute),
                    rule(r"\{", Punctuation).goto("block"),
                    rule(r"[,>+~*]", Operator),
                    string(),
                ],
            ),
            StateDef::new(
                "block",
                Plain,
                vec![
                    whitespace(),
                    rule(r"/\*", Comment).goto("comment_block"),
                    rule(r"-?[A-Za-z_-][\w-]*", Attribute),
                    rule(":", Punctuation).goto("value"),
                    rule(r"\}", Punctuation).goto("default"),
                    rule(r"[;{]", Punctuation),
                ],
            ),
            StateDef::new(
                "value",
                Plain,
                vec![
                    whitespace(),
                    rule(r"/\*", Comment).goto("comment_value"),
                    rule(";", Punctuation).goto("block"),
                    rule(r"\}", Punctuation).goto("default"),
                    rule(r"#[0-9a-fA-F]{3,8}\b", Number),
                    rule(r"-?(?:\d+\.?\d*|\.\d+)(?:%|[A-Za-z]+)?", Number),
                    string(),
                    rule(r"(?i)!\s*important\b", Keyword),
                    rule(words(VALUE_KEYWORDS), Keyword),
                    rule(r"-?[A-Za-z_][\w-]*\(", Function),
                    rule(r"-?[A-Za-z_][\w-]*", Identifier),
                    rule(r"[,/()]", Punctuation),
                    rule(r"[-+*]", Operator),
                ],
            ),
            block_comment("comment_default", "default"),
            block_comment("comment_block", "block"),
            block_comment("comment_value", "value"),
        ],
    }
}

fn string() -> RuleDef {
    rule(r#""(?:[^"\\]|\\.)*"?|'(?:[^'\\]|\\.)*'?"#, String)
}
