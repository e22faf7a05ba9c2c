//! Markdown (CommonMark-ish).
//!
//! Fenced code blocks are the one multi-line construct; everything else is
//! decided per line. `^` anchors at the start of the line because the
//! tokenizer matches against the whole line with a start offset.

use crate::grammar::{GrammarDef, StateDef, rule};
use crate::kind::TokenKind::{Code, Comment, Emphasis, Heading, Link, Plain, Punctuation};
use crate::language::Language;

#[must_use]
pub fn definition() -> GrammarDef {
    GrammarDef {
        language: Language::Markdown,
        states: vec![
            StateDef::new(
                "default",
                Plain,
                vec![
                    rule(r"^#{1,6}(?:\s.*)?$", Heading),
                    rule(r"^\s*(?:```|~~~).*", Code).goto("fence"),
                    rule(r"^>.*", Comment),
                    rule(r"^\s*(?:[-*+]|\d+[.)])\s", Punctuation),
                    rule(r"^(?:\*\s*){3,}$|^(?:-\s*){3,}$", Punctuation),
                    rule(r"`[^`]+`", Code),
                    rule(r"\*\*[^*]+\*\*|__[^_]+__", Emphasis),
                    rule(r"\*[^*\s][^*]*\*|_[^_\s][^_]*_", Emphasis),
                    rule(r"!?\[[^\]]*\]\([^)]*\)", Link),
                    rule(r"<https?://[^>\s]+>", Link),
                    rule(r"[^`*_!\[<\s]+|\s+", Plain),
                ],
            ),
            StateDef::new(
                "fence",
                Code,
                vec![
                    rule(r"^\s*(?:```|~~~)\s*$", Code).goto("default"),
                    rule(".+", Code),
                ],
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use crate::grammars::test_util::{classify, exits, kind_of};
    use crate::kind::TokenKind;
    use crate::language::Language::Markdown;
    use crate::tokenizer::LineState;

    #[test]
    fn heading_is_whole_line() {
        let (pairs, _) = classify(Markdown, "## Title *here*", LineState::INITIAL);
        assert_eq!(pairs, vec![("## Title *here*".to_string(), TokenKind::Heading)]);
    }

    #[test]
    fn hash_without_space_is_text() {
        assert_ne!(kind_of(Markdown, "#tag", "#tag"), Some(TokenKind::Heading));
    }

    #[test]
    fn inline_spans() {
        let line = "Use `cargo` and **bold** or _it_ [docs](http://x).";
        assert_eq!(kind_of(Markdown, line, "`cargo`"), Some(TokenKind::Code));
        assert_eq!(kind_of(Markdown, line, "**bold**"), Some(TokenKind::Emphasis));
        assert_eq!(kind_of(Markdown, line, "_it_"), Some(TokenKind::Emphasis));
        assert_eq!(kind_of(Markdown, line, "[docs](http://x)"), Some(TokenKind::Link));
    }

    #[test]
    fn list_marker_and_quote() {
        assert_eq!(kind_of(Markdown, "- item", "- "), Some(TokenKind::Punctuation));
        assert_eq!(kind_of(Markdown, "> quoted", "> quoted"), Some(TokenKind::Comment));
    }

    #[test]
    fn fence_spans_lines() {
        let states = exits(Markdown, &["```rust", "# not a heading", "```", "# heading"]);
        assert!(!states[0].is_initial());
        assert_eq!(states[1], states[0]);
        assert!(states[2].is_initial());

        let (pairs, _) = classify(Markdown, "# not a heading", states[0]);
        assert_eq!(pairs, vec![("# not a heading".to_string(), TokenKind::Code)]);
    }
}
