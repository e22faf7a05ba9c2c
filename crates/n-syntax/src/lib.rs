//! # n-syntax — Syntax grammars for n-notepad
//!
//! Line-oriented, state-carrying tokenization for the languages the editor
//! highlights:
//!
//! - **[`kind`]** — `TokenKind`, the fixed set of syntax categories
//! - **[`language`]** — `Language` and file-extension detection
//! - **[`grammar`]** — declarative rule sets compiled into a `Grammar`
//! - **[`tokenizer`]** — `LineState`, `Token`, and the per-line tokenizer
//! - **[`grammars`]** — the built-in grammar definitions
//!
//! This crate knows nothing about buffers or edits. The incremental cache
//! that decides *which* lines to re-tokenize lives in `n-editor`.

pub mod grammar;
pub mod grammars;
pub mod kind;
pub mod language;
pub mod tokenizer;

pub use grammar::{Grammar, GrammarError};
pub use kind::TokenKind;
pub use language::Language;
pub use tokenizer::{LineState, LineTokens, Token};
