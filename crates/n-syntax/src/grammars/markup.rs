//! HTML and XML.
//!
//! Both share one state layout: text, comments, and the inside of a tag
//! (which may span lines, as may a quoted attribute value). XML adds CDATA
//! sections and `<? ... ?>` declarations; HTML adds `<!DOCTYPE>` and
//! character entities.

use crate::grammar::{GrammarDef, RuleDef, StateDef, rule};
use crate::grammars::whitespace;
use crate::kind::TokenKind::{
    Attribute, Builtin, Code, Comment, Keyword, Operator, Plain, Punctuation, String, Tag,
};
use crate::language::Language;

#[must_use]
pub fn html() -> GrammarDef {
    GrammarDef {
        language: Language::Html,
        states: states(&[
            rule(r"(?i)<!DOCTYPE[^>]*>", Keyword),
            rule(r"&(?:#[0-9]+|#[xX][0-9a-fA-F]+|\w+);", Builtin),
        ]),
    }
}

#[must_use]
pub fn xml() -> GrammarDef {
    let mut states = states(&[
        rule(r"<!\[CDATA\[", Code).goto("cdata"),
        rule(r"<\?[\w:-]*", Keyword).goto("declaration"),
        rule(r"&(?:#[0-9]+|#[xX][0-9a-fA-F]+|\w+);", Builtin),
    ]);
    states.push(StateDef::new(
        "cdata",
        Code,
        vec![rule(r"\]\]>", Code).goto("default"), rule(r"[^\]]+", Code)],
    ));
    states.push(StateDef::new(
        "declaration",
        Plain,
        vec![
            rule(r"\?>", Keyword).goto("default"),
            whitespace(),
            rule(r"[\w:.-]+", Attribute),
            rule("=", Operator),
            rule(r#""[^"]*"|'[^']*'"#, String),
        ],
    ));
    GrammarDef {
        language: Language::Xml,
        states,
    }
}

/// The shared states. `extra` rules are tried in the text state alongside
/// the common ones.
fn states(extra: &[RuleDef]) -> Vec<StateDef> {
    let mut text = vec![
        rule("<!--", Comment).goto("comment"),
        rule(r"</?[A-Za-z_][\w:.-]*", Tag).goto("tag"),
        rule(r"[^<&]+", Plain),
    ];
    text.extend_from_slice(extra);

    vec![
        StateDef::new("default", Plain, text),
        StateDef::new(
            "comment",
            Comment,
            vec![rule("-->", Comment).goto("default"), rule("[^-]+", Comment)],
        ),
        StateDef::new(
            "tag",
            Plain,
            vec![
                rule("/?>", Tag).goto("default"),
                whitespace(),
                rule(r"[A-Za-z_:@][\w:.-]*", Attribute),
                rule("=", Operator),
                rule("\"", String).goto("double_quoted"),
                rule("'", String).goto("single_quoted"),
                rule(r#"[^\s>/="']+"#, String),
                rule("/", Punctuation),
            ],
        ),
        StateDef::new(
            "double_quoted",
            String,
            vec![rule("\"", String).goto("tag"), rule("[^\"]+", String)],
        ),
        StateDef::new(
            "single_quoted",
            String,
            vec![rule("'", String).goto("tag"), rule("[^']+", String)],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use crate::grammars::test_util::{classify, exits, kind_of};
    use crate::kind::TokenKind;
    use crate::language::Language::{Html, Xml};
    use crate::tokenizer::LineState;

    #[test]
    fn tags_attributes_values() {
        let line = r#"<a href="/x" target='_blank'>link</a>"#;
        assert_eq!(kind_of(Html, line, "<a"), Some(TokenKind::Tag));
        assert_eq!(kind_of(Html, line, "href"), Some(TokenKind::Attribute));
        assert_eq!(kind_of(Html, line, r#""/x""#), Some(TokenKind::String));
        assert_eq!(kind_of(Html, line, "'_blank'"), Some(TokenKind::String));
        assert_eq!(kind_of(Html, line, "link"), Some(TokenKind::Plain));
        assert_eq!(kind_of(Html, line, "</a>"), Some(TokenKind::Tag));
    }

    #[test]
    fn doctype_and_entity() {
        assert_eq!(
            kind_of(Html, "<!doctype html>", "<!doctype html>"),
            Some(TokenKind::Keyword)
        );
        assert_eq!(kind_of(Html, "a &amp; b", "&amp;"), Some(TokenKind::Builtin));
    }

    #[test]
    fn comment_spans_lines() {
        let states = exits(Html, &["<!-- start", "- still -", "end --> <p>"]);
        assert!(!states[0].is_initial());
        assert_eq!(states[0], states[1]);
        assert!(states[2].is_initial());
    }

    #[test]
    fn tag_spans_lines() {
        let states = exits(Html, &["<div", "  class=\"a", "b\">"]);
        assert!(!states[0].is_initial());
        assert_ne!(states[1], states[0]); // inside the quoted value
        assert!(states[2].is_initial());

        let (pairs, _) = classify(Html, "  class=\"a", states[0]);
        assert!(pairs.contains(&("class".to_string(), TokenKind::Attribute)));
    }

    #[test]
    fn xml_cdata_and_declaration() {
        let line = r#"<?xml version="1.0"?><![CDATA[ <raw> ]]>"#;
        let (pairs, exit) = classify(Xml, line, LineState::INITIAL);
        assert!(exit.is_initial());
        assert!(pairs.contains(&("<?xml".to_string(), TokenKind::Keyword)));
        assert!(pairs.contains(&("version".to_string(), TokenKind::Attribute)));
        assert!(pairs.contains(&("<![CDATA[ <raw> ]]>".to_string(), TokenKind::Code)));
    }

    #[test]
    fn xml_cdata_spans_lines() {
        let states = exits(Xml, &["<![CDATA[", "x < y", "]]>"]);
        assert!(!states[0].is_initial());
        assert_eq!(states[0], states[1]);
        assert!(states[2].is_initial());
    }
}
