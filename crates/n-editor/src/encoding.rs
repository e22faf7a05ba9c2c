//! Text encodings at the load/save boundary.
//!
//! Inside the engine text is always a Rust `String`. Encodings only matter
//! when bytes come in from disk ([`decode`]) or go back out ([`encode`]); a
//! document's encoding is fixed when it is loaded and checked again on save.
//!
//! Detection on load:
//!
//! - a UTF-16 byte order mark selects UTF-16 (either byte order);
//! - otherwise valid UTF-8 is accepted, tagged [`Encoding::Ascii`] when every
//!   byte is ASCII (a UTF-8 BOM is dropped);
//! - anything else is rejected, naming the encoding `chardetng` guesses so
//!   the shell can tell the user what the file probably is.
//!
//! UTF-16 is always written little-endian with a BOM.

use std::fmt;
use std::str::FromStr;

use chardetng::EncodingDetector;
use encoding_rs::{UTF_16BE, UTF_16LE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::position::Position;

/// The encodings a document can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Encoding {
    #[default]
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "utf-16")]
    Utf16,
    #[serde(rename = "ascii")]
    Ascii,
}

impl Encoding {
    pub const ALL: [Self; 3] = [Self::Utf8, Self::Utf16, Self::Ascii];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Utf16 => "utf-16",
            Self::Ascii => "ascii",
        }
    }

    /// True when `ch` can be written in this encoding.
    #[must_use]
    pub const fn can_represent(self, ch: char) -> bool {
        match self {
            Self::Utf8 | Self::Utf16 => true,
            Self::Ascii => ch.is_ascii(),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Encoding {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "utf-16" | "utf16" | "utf-16le" => Ok(Self::Utf16),
            "ascii" | "us-ascii" => Ok(Self::Ascii),
            _ => Err(EncodingError::Unknown(s.to_string())),
        }
    }
}

/// How to treat characters the target encoding cannot hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveMode {
    /// Refuse to write, reporting the first offending character.
    #[default]
    Strict,
    /// Write `?` in its place (the user confirmed a lossy save).
    Lossy,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("file is not valid UTF-8 or UTF-16 (detected {guess})")]
    Undecodable { guess: &'static str },

    #[error("{ch:?} at {pos} cannot be written as {encoding}")]
    Unrepresentable {
        encoding: Encoding,
        pos: Position,
        ch: char,
    },

    #[error("unknown encoding `{0}` (expected utf-8, utf-16 or ascii)")]
    Unknown(String),
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode file bytes, detecting the encoding. Empty input takes `default`.
///
/// # Errors
///
/// [`EncodingError::Undecodable`] when the bytes are neither UTF-16 with a
/// BOM nor valid UTF-8.
pub fn decode(bytes: &[u8], default: Encoding) -> Result<(String, Encoding), EncodingError> {
    if bytes.is_empty() {
        return Ok((String::new(), default));
    }

    if let Some((enc, bom_len)) = encoding_rs::Encoding::for_bom(bytes) {
        let body = &bytes[bom_len..];
        if enc == UTF_16LE || enc == UTF_16BE {
            return enc
                .decode_without_bom_handling_and_without_replacement(body)
                .map(|text| (text.into_owned(), Encoding::Utf16))
                .ok_or(EncodingError::Undecodable { guess: enc.name() });
        }
        // UTF-8 BOM: fall through with it stripped.
        return decode_utf8(body);
    }

    decode_utf8(bytes)
}

fn decode_utf8(bytes: &[u8]) -> Result<(String, Encoding), EncodingError> {
    match std::str::from_utf8(bytes) {
        Ok(text) => {
            let enc = if text.is_ascii() && !text.is_empty() {
                Encoding::Ascii
            } else {
                Encoding::Utf8
            };
            Ok((text.to_string(), enc))
        }
        Err(_) => {
            let mut detector = EncodingDetector::new();
            detector.feed(bytes, true);
            let guess = detector.guess(None, true).name();
            Err(EncodingError::Undecodable { guess })
        }
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode `text` for writing.
///
/// `text` may already carry its on-disk line endings; positions in errors
/// treat `\r\n`, `\r` and `\n` each as one line break.
///
/// # Errors
///
/// In [`SaveMode::Strict`], [`EncodingError::Unrepresentable`] for the first
/// character `encoding` cannot hold.
pub fn encode(text: &str, encoding: Encoding, mode: SaveMode) -> Result<Vec<u8>, EncodingError> {
    if mode == SaveMode::Strict {
        check(text, encoding)?;
    }
    Ok(match encoding {
        Encoding::Utf8 => text.as_bytes().to_vec(),
        Encoding::Ascii => text
            .chars()
            .map(|ch| if ch.is_ascii() { ch as u8 } else { b'?' })
            .collect(),
        Encoding::Utf16 => {
            let mut out = Vec::with_capacity(2 + text.len() * 2);
            out.extend_from_slice(&[0xFF, 0xFE]);
            for unit in text.encode_utf16() {
                out.extend_from_slice(&unit.to_le_bytes());
            }
            out
        }
    })
}

/// Verify every character of `text` fits `encoding`.
///
/// # Errors
///
/// [`EncodingError::Unrepresentable`] for the first one that does not.
pub fn check(text: &str, encoding: Encoding) -> Result<(), EncodingError> {
    let mut pos = Position::ZERO;
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' | '\n' => {
                if ch == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                pos = Position::new(pos.line + 1, 0);
            }
            _ if !encoding.can_represent(ch) => {
                return Err(EncodingError::Unrepresentable { encoding, pos, ch });
            }
            _ => pos.col += 1,
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // -- decode ---------------------------------------------------------------

    #[test]
    fn ascii_file_is_tagged_ascii() {
        assert_eq!(decode(b"plain\n", Encoding::Utf8).unwrap(), ("plain\n".to_string(), Encoding::Ascii));
    }

    #[test]
    fn utf8_file_is_tagged_utf8() {
        let (text, enc) = decode("café".as_bytes(), Encoding::Ascii).unwrap();
        assert_eq!(text, "café");
        assert_eq!(enc, Encoding::Utf8);
    }

    #[test]
    fn empty_file_takes_default() {
        assert_eq!(decode(b"", Encoding::Utf16).unwrap().1, Encoding::Utf16);
    }

    #[test]
    fn utf8_bom_is_dropped() {
        let (text, enc) = decode(b"\xEF\xBB\xBFhi \xC3\xA9", Encoding::Utf8).unwrap();
        assert_eq!(text, "hi é");
        assert_eq!(enc, Encoding::Utf8);
    }

    #[test]
    fn utf16_le_and_be_by_bom() {
        let le = [0xFF, 0xFE, b'h', 0, b'i', 0];
        assert_eq!(decode(&le, Encoding::Utf8).unwrap(), ("hi".to_string(), Encoding::Utf16));

        let be = [0xFE, 0xFF, 0, b'h', 0, b'i'];
        assert_eq!(decode(&be, Encoding::Utf8).unwrap(), ("hi".to_string(), Encoding::Utf16));
    }

    #[test]
    fn truncated_utf16_is_undecodable() {
        let odd = [0xFF, 0xFE, b'h'];
        assert!(matches!(decode(&odd, Encoding::Utf8), Err(EncodingError::Undecodable { .. })));
    }

    #[test]
    fn latin1_bytes_are_rejected_with_a_guess() {
        let err = decode(b"caf\xE9 cr\xE8me br\xFBl\xE9e", Encoding::Utf8).unwrap_err();
        let EncodingError::Undecodable { guess } = err else {
            panic!("expected Undecodable, got {err:?}");
        };
        assert!(!guess.is_empty());
        assert_ne!(guess, "UTF-8");
    }

    // -- encode ---------------------------------------------------------------

    #[test]
    fn utf16_is_written_le_with_bom() {
        let bytes = encode("hé", Encoding::Utf16, SaveMode::Strict).unwrap();
        assert_eq!(bytes, vec![0xFF, 0xFE, b'h', 0, 0xE9, 0]);
        assert_eq!(decode(&bytes, Encoding::Utf8).unwrap().0, "hé");
    }

    #[test]
    fn ascii_rejects_non_ascii_with_position() {
        let err = encode("ok\r\nno é", Encoding::Ascii, SaveMode::Strict).unwrap_err();
        assert_eq!(
            err,
            EncodingError::Unrepresentable {
                encoding: Encoding::Ascii,
                pos: Position::new(1, 3),
                ch: 'é',
            }
        );
    }

    #[test]
    fn lossy_ascii_substitutes() {
        assert_eq!(encode("a€b", Encoding::Ascii, SaveMode::Lossy).unwrap(), b"a?b".to_vec());
    }

    #[test]
    fn utf8_is_always_representable() {
        assert_eq!(encode("😀", Encoding::Utf8, SaveMode::Strict).unwrap(), "😀".as_bytes());
    }

    // -- names ----------------------------------------------------------------

    #[test]
    fn parse_names() {
        assert_eq!("UTF-8".parse::<Encoding>().unwrap(), Encoding::Utf8);
        assert_eq!("utf_16".parse::<Encoding>().unwrap(), Encoding::Utf16);
        assert_eq!("ascii".parse::<Encoding>().unwrap(), Encoding::Ascii);
        assert!("latin-1".parse::<Encoding>().is_err());
        for enc in Encoding::ALL {
            assert_eq!(enc.name().parse::<Encoding>().unwrap(), enc);
        }
    }

    #[test]
    fn serde_uses_names() {
        assert_eq!(serde_json::to_string(&Encoding::Utf16).unwrap(), r#""utf-16""#);
        assert_eq!(serde_json::from_str::<Encoding>(r#""ascii""#).unwrap(), Encoding::Ascii);
    }
}
