//! Declarative grammars.
//!
//! A grammar is a small state machine. Each state holds an ordered list of
//! rules; a rule is `{pattern, kind, next state}`. Tokenizing a line walks it
//! left to right, and at each position every rule of the current state is
//! tried as an **anchored** match. Each state compiles its rules into one
//! multi-pattern regex that reports which rules match at a position, so
//! only those are run to measure their length:
//!
//! - the **longest** match wins;
//! - on equal length, the **earliest** rule wins;
//! - if nothing matches, one character is emitted with the state's fallback
//!   kind.
//!
//! States are what carry context across line boundaries — "inside a block
//! comment", "inside a triple-quoted string". A grammar author writes a
//! [`GrammarDef`] with states referenced by name; [`Grammar::compile`]
//! resolves names to indices and compiles every pattern once.
//!
//! There is no state stack. A construct that needs to "return" to different
//! contexts (CSS comments inside a rule block vs. at top level) gets one
//! state per context instead.

use std::sync::LazyLock;

use regex_automata::MatchKind;
use regex_automata::meta::Regex;
use thiserror::Error;

use crate::grammars;
use crate::kind::TokenKind;
use crate::language::Language;

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// One rule of a grammar state, before compilation.
#[derive(Debug, Clone)]
pub struct RuleDef {
    pub pattern: String,
    pub kind: TokenKind,
    /// State to switch to after this rule matches. `None` stays put.
    pub next: Option<&'static str>,
}

impl RuleDef {
    /// Switch to `state` after this rule matches.
    #[must_use]
    pub const fn goto(mut self, state: &'static str) -> Self {
        self.next = Some(state);
        self
    }
}

/// Shorthand for a rule that stays in the current state.
#[must_use]
pub fn rule(pattern: impl Into<String>, kind: TokenKind) -> RuleDef {
    RuleDef {
        pattern: pattern.into(),
        kind,
        next: None,
    }
}

/// Build a pattern matching any of `words` as a whole word.
#[must_use]
pub fn words(words: &[&str]) -> String {
    format!(r"\b(?:{})\b", words.join("|"))
}

/// A named state and its rules.
#[derive(Debug, Clone)]
pub struct StateDef {
    pub name: &'static str,
    /// Kind for characters no rule matches.
    pub fallback: TokenKind,
    pub rules: Vec<RuleDef>,
}

impl StateDef {
    #[must_use]
    pub const fn new(name: &'static str, fallback: TokenKind, rules: Vec<RuleDef>) -> Self {
        Self {
            name,
            fallback,
            rules,
        }
    }
}

/// A complete grammar definition. The first state is the initial state.
#[derive(Debug, Clone)]
pub struct GrammarDef {
    pub language: Language,
    pub states: Vec<StateDef>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("{language} grammar has no states")]
    NoStates { language: Language },

    #[error("{language} grammar has {count} states, more than a line state can hold")]
    TooManyStates { language: Language, count: usize },

    #[error("{language} grammar: state `{from}` refers to unknown state `{to}`")]
    UnknownState {
        language: Language,
        from: &'static str,
        to: &'static str,
    },

    #[error("{language} grammar: bad pattern `{pattern}` in state `{state}`: {message}")]
    Pattern {
        language: Language,
        state: &'static str,
        pattern: String,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Compiled grammar
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub(crate) struct Rule {
    pub(crate) regex: Regex,
    pub(crate) kind: TokenKind,
    pub(crate) next: Option<u8>,
}

#[derive(Debug)]
pub(crate) struct State {
    pub(crate) name: &'static str,
    pub(crate) fallback: TokenKind,
    pub(crate) rules: Vec<Rule>,
    /// All rules as one regex; pattern `i` is `rules[i]`.
    pub(crate) matcher: Regex,
}

/// A compiled grammar, ready to tokenize lines.
#[derive(Debug)]
pub struct Grammar {
    language: Language,
    pub(crate) states: Vec<State>,
    /// Rule count of the largest state.
    pub(crate) max_rules: usize,
}

impl Grammar {
    /// Compile a definition: resolve state names and build every regex.
    ///
    /// # Errors
    ///
    /// Fails on an empty definition, a reference to an undefined state, or a
    /// pattern the regex engine rejects.
    pub fn compile(def: GrammarDef) -> Result<Self, GrammarError> {
        let language = def.language;
        if def.states.is_empty() {
            return Err(GrammarError::NoStates { language });
        }
        if def.states.len() > usize::from(u8::MAX) + 1 {
            return Err(GrammarError::TooManyStates {
                language,
                count: def.states.len(),
            });
        }

        let index_of = |name: &str| def.states.iter().position(|s| s.name == name);

        let mut states = Vec::with_capacity(def.states.len());
        for state in &def.states {
            let mut rules = Vec::with_capacity(state.rules.len());
            for r in &state.rules {
                let next = match r.next {
                    None => None,
                    Some(to) => {
                        let idx = index_of(to).ok_or(GrammarError::UnknownState {
                            language,
                            from: state.name,
                            to,
                        })?;
                        // Bounded by the TooManyStates check above.
                        Some(u8::try_from(idx).unwrap_or(u8::MAX))
                    }
                };
                let regex = Regex::new(&r.pattern).map_err(|e| GrammarError::Pattern {
                    language,
                    state: state.name,
                    pattern: r.pattern.clone(),
                    message: e.to_string(),
                })?;
                rules.push(Rule {
                    regex,
                    kind: r.kind,
                    next,
                });
            }
            let patterns: Vec<&str> = state.rules.iter().map(|r| r.pattern.as_str()).collect();
            let matcher = Regex::builder()
                .configure(Regex::config().match_kind(MatchKind::All))
                .build_many(&patterns[..])
                .map_err(|e| {
                    let pattern = e
                        .pattern()
                        .and_then(|id| patterns.get(id.as_usize()))
                        .map_or_else(|| patterns.join(" | "), |p| (*p).to_owned());
                    GrammarError::Pattern {
                        language,
                        state: state.name,
                        pattern,
                        message: e.to_string(),
                    }
                })?;
            states.push(State {
                name: state.name,
                fallback: state.fallback,
                rules,
                matcher,
            });
        }

        let max_rules = states.iter().map(|s| s.rules.len()).max().unwrap_or(0);
        Ok(Self {
            language,
            states,
            max_rules,
        })
    }

    /// The built-in grammar for `language`, compiled on first use.
    ///
    /// Returns `None` for [`Language::Plain`], and for a built-in grammar
    /// that failed to compile (logged once).
    #[must_use]
    pub fn builtin(language: Language) -> Option<&'static Self> {
        static PYTHON: LazyLock<Option<Grammar>> =
            LazyLock::new(|| load(grammars::python::definition()));
        static JAVASCRIPT: LazyLock<Option<Grammar>> =
            LazyLock::new(|| load(grammars::javascript::definition()));
        static HTML: LazyLock<Option<Grammar>> =
            LazyLock::new(|| load(grammars::markup::html()));
        static CSS: LazyLock<Option<Grammar>> =
            LazyLock::new(|| load(grammars::css::definition()));
        static JSON: LazyLock<Option<Grammar>> =
            LazyLock::new(|| load(grammars::json::definition()));
        static XML: LazyLock<Option<Grammar>> =
            LazyLock::new(|| load(grammars::markup::xml()));
        static MARKDOWN: LazyLock<Option<Grammar>> =
            LazyLock::new(|| load(grammars::markdown::definition()));

        let cell = match language {
            Language::Plain => return None,
            Language::Python => &PYTHON,
            Language::JavaScript => &JAVASCRIPT,
            Language::Html => &HTML,
            Language::Css => &CSS,
            Language::Json => &JSON,
            Language::Xml => &XML,
            Language::Markdown => &MARKDOWN,
        };
        cell.as_ref()
    }

    /// The language this grammar tokenizes.
    #[inline]
    #[must_use]
    pub const fn language(&self) -> Language {
        self.language
    }

    /// Number of states.
    #[inline]
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Name of a state, for logging. `None` if out of range.
    #[must_use]
    pub fn state_name(&self, index: usize) -> Option<&'static str> {
        self.states.get(index).map(|s| s.name)
    }
}

fn load(def: GrammarDef) -> Option<Grammar> {
    match Grammar::compile(def) {
        Ok(grammar) => Some(grammar),
        Err(e) => {
            log::error!("built-in grammar failed to compile, falling back to plain: {e}");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
