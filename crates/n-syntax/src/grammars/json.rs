//! JSON. Single state: nothing in JSON spans a line.
//!
//! Object keys are told apart from string values by the `:` that follows,
//! which needs no lookahead since the pattern can include it.

use crate::grammar::{GrammarDef, StateDef, rule};
use crate::grammars::whitespace;
use crate::kind::TokenKind::{Attribute, Keyword, Number, Plain, Punctuation, String};
use crate::language::Language;

#[must_use]
pub fn definition() -> GrammarDef {
    GrammarDef {
        language: Language::Json,
        states: vec![StateDef::new(
            "default",
            Plain,
            vec![
                whitespace(),
                rule(r#""(?:[^"\\]|\\.)*"\s*:"#, Attribute),
                rule(r#""(?:[^"\\]|\\.)*"?"#, String),
                rule(r"\b(?:true|false|null)\b", Keyword),
                rule(r"-?\b\d+(?:\.\d+)?(?:[eE][+-]?\d+)?\b", Number),
                rule(r"[{}\[\],]", Punctuation),
            ],
        )],
    }
}

#[cfg(test)]
mod tests {
    use crate::grammars::test_util::{classify, kind_of};
    use crate::kind::TokenKind;
    use crate::language::Language::Json;
    use crate::tokenizer::LineState;

    #[test]
    fn keys_values_literals() {
        let line = r#"{"name": "n", "count": -1.5e3, "ok": true, "x": null}"#;
        assert_eq!(kind_of(Json, line, r#""name":"#), Some(TokenKind::Attribute));
        assert_eq!(kind_of(Json, line, r#""n""#), Some(TokenKind::String));
        assert_eq!(kind_of(Json, line, "-1.5e3"), Some(TokenKind::Number));
        assert_eq!(kind_of(Json, line, "true"), Some(TokenKind::Keyword));
        assert_eq!(kind_of(Json, line, "null"), Some(TokenKind::Keyword));
    }

    #[test]
    fn escaped_quote_stays_in_string() {
        let (pairs, exit) = classify(Json, r#"["a\"b", 1]"#, LineState::INITIAL);
        assert!(exit.is_initial());
        assert!(pairs.contains(&(r#""a\"b""#.to_string(), TokenKind::String)));
    }
}
