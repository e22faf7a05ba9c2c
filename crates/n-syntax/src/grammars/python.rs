//! Python.
//!
//! Triple-quoted strings are the only construct that spans lines; each
//! quote style gets its own state so `'''` does not close `"""`.

use crate::grammar::{GrammarDef, StateDef, rule, words};
use crate::grammars::{definition_name, whitespace};
use crate::kind::TokenKind::{
    Builtin, Comment, Decorator, Identifier, Keyword, Number, Operator, Plain, Punctuation, String,
};
use crate::language::Language;

const KEYWORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "continue", "del", "elif", "else",
    "except", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda",
    "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
    "True", "False", "None", "self",
];

const BUILTINS: &[&str] = &[
    "abs", "all", "any", "bin", "bool", "chr", "dict", "dir", "enumerate", "eval", "filter",
    "float", "frozenset", "getattr", "globals", "hasattr", "hash", "hex", "id", "input", "int",
    "isinstance", "issubclass", "iter", "len", "list", "locals", "map", "max", "min", "next",
    "object", "oct", "open", "ord", "pow", "print", "property", "range", "repr", "reversed",
    "round", "set", "setattr", "slice", "sorted", "str", "sum", "super", "tuple", "type",
    "vars", "zip", "__import__",
];

const PREFIX: &str = "[rRbBuUfF]{0,2}";

#[must_use]
pub fn definition() -> GrammarDef {
    GrammarDef {
        language: Language::Python,
        states: vec![
            StateDef::new(
                "default",
                Plain,
                vec![
                    whitespace(),
                    rule("#.*", Comment),
                    rule(format!(r#"{PREFIX}""""#), String).goto("triple_double"),
                    rule(format!("{PREFIX}'''"), String).goto("triple_single"),
                    rule(format!(r#"{PREFIX}"(?:[^"\\]|\\.)*"?"#), String),
                    rule(format!(r"{PREFIX}'(?:[^'\\]|\\.)*'?"), String),
                    rule(r"@[\w.]+", Decorator),
                    rule(r"\b(?:def|class)\b", Keyword).goto("name"),
                    rule(words(KEYWORDS), Keyword),
                    rule(words(BUILTINS), Builtin),
                    rule(r"\b0[xX][0-9a-fA-F_]+\b", Number),
                    rule(r"\b0[oO][0-7_]+\b|\b0[bB][01_]+\b", Number),
                    rule(r"\b\d[\d_]*(?:\.[\d_]*)?(?:[eE][+-]?\d+)?[jJ]?", Number),
                    rule(r"\.\d[\d_]*(?:[eE][+-]?\d+)?", Number),
                    rule(r"[^\W\d]\w*", Identifier),
                    rule(r"->|:=|\*\*=?|//=?|<<=?|>>=?|[-+*/%@&|^~<>!=]=?", Operator),
                    rule(r"[()\[\]{},:;.]", Punctuation),
                ],
            ),
            definition_name("name", r"[^\W\d]\w*"),
            triple_quoted("triple_double", "\""),
            triple_quoted("triple_single", "'"),
        ],
    }
}

/// Body of a triple-quoted string with quote character `q`.
fn triple_quoted(name: &'static str, q: &str) -> StateDef {
    StateDef::new(
        name,
        String,
        vec![
            rule(format!("{q}{q}{q}"), String).goto("default"),
            rule(format!(r"[^{q}\\]+"), String),
            rule(r"\\.", String),
        ],
    )
}
