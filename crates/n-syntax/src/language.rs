//! Languages and file-type detection.
//!
//! Detection is by extension only — content sniffing (shebangs, `<?xml`
//! prologues) is left to the caller, who can always force a language.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

/// A language the highlighter knows how to tokenize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    /// No grammar: every line is a single plain span.
    #[default]
    Plain,
    Python,
    JavaScript,
    Html,
    Css,
    Json,
    Xml,
    Markdown,
}

/// Returned by [`Language::from_str`] for an unrecognized name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown language: {0}")]
pub struct UnknownLanguage(pub String);

impl Language {
    /// All languages, `Plain` first.
    pub const ALL: [Self; 8] = [
        Self::Plain,
        Self::Python,
        Self::JavaScript,
        Self::Html,
        Self::Css,
        Self::Json,
        Self::Xml,
        Self::Markdown,
    ];

    /// Canonical lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::Html => "html",
            Self::Css => "css",
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Markdown => "markdown",
        }
    }

    /// File extensions (without the dot) mapped to this language.
    #[must_use]
    pub const fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Plain => &["txt", "text", "log"],
            Self::Python => &["py", "pyw", "pyx"],
            Self::JavaScript => &["js", "jsx", "ts", "tsx", "mjs", "cjs"],
            Self::Html => &["html", "htm", "xhtml"],
            Self::Css => &["css", "scss", "sass", "less"],
            Self::Json => &["json", "jsonl"],
            Self::Xml => &["xml", "xsl", "xsd", "svg"],
            Self::Markdown => &["md", "markdown", "mdown", "mkd"],
        }
    }

    /// Detect a language from an extension, case-insensitively. Unknown
    /// extensions map to `Plain`.
    #[must_use]
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|lang| lang.extensions().contains(&ext.as_str()))
            .unwrap_or(Self::Plain)
    }

    /// Detect a language from a path's extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(Self::Plain, Self::from_extension)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = UnknownLanguage;

    /// Accepts canonical names and a few common aliases (`py`, `js`, `md`,
    /// `text`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "plain" | "text" | "none" => Ok(Self::Plain),
            "python" | "py" => Ok(Self::Python),
            "javascript" | "js" | "typescript" | "ts" => Ok(Self::JavaScript),
            "html" | "htm" => Ok(Self::Html),
            "css" => Ok(Self::Css),
            "json" => Ok(Self::Json),
            "xml" => Ok(Self::Xml),
            "markdown" | "md" => Ok(Self::Markdown),
            _ => Err(UnknownLanguage(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_from_extension() {
        assert_eq!(Language::from_extension("py"), Language::Python);
        assert_eq!(Language::from_extension("TSX"), Language::JavaScript);
        assert_eq!(Language::from_extension(".scss"), Language::Css);
        assert_eq!(Language::from_extension("mkd"), Language::Markdown);
        assert_eq!(Language::from_extension("rs"), Language::Plain);
    }

    #[test]
    fn detect_from_path() {
        assert_eq!(Language::from_path(Path::new("/a/b/index.HTML")), Language::Html);
        assert_eq!(Language::from_path(Path::new("data.jsonl")), Language::Json);
        assert_eq!(Language::from_path(Path::new("Makefile")), Language::Plain);
    }

    #[test]
    fn parse_names_and_aliases() {
        assert_eq!("Python".parse::<Language>(), Ok(Language::Python));
        assert_eq!("md".parse::<Language>(), Ok(Language::Markdown));
        assert_eq!("text".parse::<Language>(), Ok(Language::Plain));
        assert_eq!(
            "cobol".parse::<Language>(),
            Err(UnknownLanguage("cobol".to_string()))
        );
    }

    #[test]
    fn name_roundtrips_through_parse() {
        for lang in Language::ALL {
            assert_eq!(lang.name().parse::<Language>(), Ok(lang));
        }
    }

    #[test]
    fn extensions_do_not_overlap() {
        let mut all: Vec<&str> = Language::ALL
            .iter()
            .flat_map(|lang| lang.extensions().iter().copied())
            .collect();
        let total = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), total);
    }
}
