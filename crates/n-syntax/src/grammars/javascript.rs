//! JavaScript (and, loosely, TypeScript / JSX).
//!
//! Block comments and template literals span lines. `${...}` inside a
//! template is left as string text; tracking the nesting would need a stack.

use crate::grammar::{GrammarDef, StateDef, rule, words};
use crate::grammars::{block_comment, definition_name, whitespace};
use crate::kind::TokenKind::{
    Builtin, Comment, Identifier, Keyword, Number, Operator, Plain, Punctuation, String,
};
use crate::language::Language;

const KEYWORDS: &[&str] = &[
    "async", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "export", "extends", "false", "finally", "for", "from",
    "if", "import", "in", "instanceof", "let", "new", "null", "of", "return", "static",
    "super", "switch", "this", "throw", "true", "try", "typeof", "undefined", "var", "void",
    "while", "with", "yield",
];

const BUILTINS: &[&str] = &[
    "Array", "Boolean", "Date", "Error", "Function", "JSON", "Map", "Math", "Number", "Object",
    "Promise", "RegExp", "Set", "String", "Symbol", "console", "document", "window",
    "setTimeout", "setInterval", "clearTimeout", "clearInterval",
];

const IDENT: &str = r"[A-Za-z_$][\w$]*";

#[must_use]
pub fn definition() -> GrammarDef {
    GrammarDef {
        language: Language::JavaScript,
        states: vec![
            StateDef::new(
                "default",
                Plain,
                vec![
                    whitespace(),
                    rule("//.*", Comment),
                    rule(r"/\*", Comment).goto("comment"),
                    rule(r#""(?:[^"\\]|\\.)*"?"#, String),
                    rule(r"'(?:[^'\\]|\\.)*'?", String),
                    rule("`", String).goto("template"),
                    rule(r"\bfunction\b\*?", Keyword).goto("name"),
                    rule(words(KEYWORDS), Keyword),
                    rule(words(BUILTINS), Builtin),
                    rule(r"\b0[xX][0-9a-fA-F_]+n?\b|\b0[bB][01_]+n?\b|\b0[oO][0-7_]+n?\b", Number),
                    rule(r"\b\d[\d_]*(?:\.[\d_]*)?(?:[eE][+-]?\d+)?n?", Number),
                    rule(r"\.\d[\d_]*(?:[eE][+-]?\d+)?", Number),
                    rule(IDENT, Identifier),
                    rule(r"=>|\.\.\.|\?\?=?|\?\.|/=?|[-+*%&|^!<>=~?]+", Operator),
                    rule(r"[()\[\]{},:;.]", Punctuation),
                ],
            ),
            definition_name("name", IDENT),
            block_comment("comment", "default"),
            StateDef::new(
                "template",
                String,
                vec![
                    rule("`", String).goto("default"),
                    rule(r"[^`\\]+", String),
                    rule(r"\\.", String),
                ],
            ),
        ],
    }
}
