//! Token kinds — the syntax categories a span of text can belong to.
//!
//! The set is closed on purpose: the shell maps each kind to a style, and
//! grammars may only emit kinds listed here.

use std::fmt;

/// Syntax category of a token span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Text with no special meaning (and everything in the `plain` language).
    Plain,
    Keyword,
    /// Built-in functions, types, and well-known globals.
    Builtin,
    Identifier,
    String,
    Comment,
    Number,
    Operator,
    Punctuation,
    /// Name in a function or class definition.
    Function,
    /// Python `@decorator`.
    Decorator,
    /// Markup tag names and CSS selectors.
    Tag,
    /// Markup attributes and CSS properties.
    Attribute,
    /// Markdown headings.
    Heading,
    /// Markdown bold / italic.
    Emphasis,
    /// Inline code, fenced code blocks, CDATA sections.
    Code,
    /// Markdown links and images.
    Link,
}

impl TokenKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 17] = [
        Self::Plain,
        Self::Keyword,
        Self::Builtin,
        Self::Identifier,
        Self::String,
        Self::Comment,
        Self::Number,
        Self::Operator,
        Self::Punctuation,
        Self::Function,
        Self::Decorator,
        Self::Tag,
        Self::Attribute,
        Self::Heading,
        Self::Emphasis,
        Self::Code,
        Self::Link,
    ];

    /// Lowercase name used in logs and in the driver's output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Keyword => "keyword",
            Self::Builtin => "builtin",
            Self::Identifier => "identifier",
            Self::String => "string",
            Self::Comment => "comment",
            Self::Number => "number",
            Self::Operator => "operator",
            Self::Punctuation => "punctuation",
            Self::Function => "function",
            Self::Decorator => "decorator",
            Self::Tag => "tag",
            Self::Attribute => "attribute",
            Self::Heading => "heading",
            Self::Emphasis => "emphasis",
            Self::Code => "code",
            Self::Link => "link",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
