//! Ordered trial decoding.
//!
//! Inputs come in one of a handful of known encodings, so each is tried in a
//! fixed order and the first clean result that also parses wins. Single-byte
//! decoders accept any input, so "clean" means no malformed sequences, no
//! U+FFFD and no C1 control characters.

use std::borrow::Cow;
use std::fmt;

use encoding_rs::{ISO_8859_2, UTF_8, WINDOWS_1252};

use crate::error::DecodeError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    Utf8,
    Latin1,
    Windows1252,
    Latin2,
}

pub const TRIAL_ORDER: [TextEncoding; 4] = [
    TextEncoding::Utf8,
    TextEncoding::Latin1,
    TextEncoding::Windows1252,
    TextEncoding::Latin2,
];

impl TextEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Latin1 => "iso-8859-1",
            Self::Windows1252 => "windows-1252",
            Self::Latin2 => "iso-8859-2",
        }
    }

    /// Decode without replacement. `None` if the bytes are not valid in this
    /// encoding or decode to characters that never occur in real input.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        let text = match self {
            Self::Utf8 => {
                let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                UTF_8.decode_without_bom_handling_and_without_replacement(bytes)?
            }
            Self::Latin1 => encoding_rs::mem::decode_latin1(bytes),
            Self::Windows1252 => {
                WINDOWS_1252.decode_without_bom_handling_and_without_replacement(bytes)?
            }
            Self::Latin2 => ISO_8859_2.decode_without_bom_handling_and_without_replacement(bytes)?,
        };
        is_clean(&text).then_some(text)
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn is_clean(text: &str) -> bool {
    !text
        .chars()
        .any(|c| c == '\u{FFFD}' || ('\u{80}'..='\u{9F}').contains(&c))
}

/// First clean decoding in trial order.
pub fn decode(bytes: &[u8]) -> Result<(String, TextEncoding), DecodeError> {
    decode_with(bytes, |text| Ok(text.to_string()))
}

/// Decode and parse in one step. An encoding only wins if `parse` accepts its
/// text; otherwise the next encoding is tried.
pub fn decode_with<T, F>(bytes: &[u8], mut parse: F) -> Result<(T, TextEncoding), DecodeError>
where
    F: FnMut(&str) -> Result<T, String>,
{
    let mut attempts = Vec::with_capacity(TRIAL_ORDER.len());
    for encoding in TRIAL_ORDER {
        let Some(text) = encoding.decode(bytes) else {
            attempts.push((encoding, "invalid byte sequence".to_string()));
            continue;
        };
        match parse(&text) {
            Ok(value) => return Ok((value, encoding)),
            Err(why) => attempts.push((encoding, why)),
        }
    }
    Err(DecodeError { attempts })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_first() {
        let (text, enc) = decode("Bârlad".as_bytes()).unwrap();
        assert_eq!(text, "Bârlad");
        assert_eq!(enc, TextEncoding::Utf8);
    }

    #[test]
    fn utf8_bom_is_stripped() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"{}");
        let (text, enc) = decode(&bytes).unwrap();
        assert_eq!(text, "{}");
        assert_eq!(enc, TextEncoding::Utf8);
    }

    #[test]
    fn latin1_fallback() {
        // "Bârlad" in ISO-8859-1
        let bytes = b"B\xE2rlad";
        let (text, enc) = decode(bytes).unwrap();
        assert_eq!(text, "Bârlad");
        assert_eq!(enc, TextEncoding::Latin1);
    }

    #[test]
    fn windows1252_when_latin1_yields_c1() {
        // 0x80 is the euro sign in windows-1252 and a C1 control in latin-1
        let bytes = b"cost \x80 5, \x9Atefan";
        let (text, enc) = decode(bytes).unwrap();
        assert_eq!(text, "cost € 5, štefan");
        assert_eq!(enc, TextEncoding::Windows1252);
    }

    #[test]
    fn parse_failure_moves_to_next_encoding() {
        let mut seen = Vec::new();
        let result = decode_with(b"B\xE2rlad", |text| {
            seen.push(text.to_string());
            if text.contains('â') {
                Err("no".to_string())
            } else {
                Ok(())
            }
        });
        // utf-8 is invalid, latin-1 and windows-1252 both give 'â', latin-2 gives 'â' too
        assert!(result.is_err());
        assert_eq!(seen.len(), 3);
        let err = result.unwrap_err();
        assert_eq!(err.attempts.len(), 4);
        assert_eq!(err.attempts[0].0, TextEncoding::Utf8);
        assert!(err.to_string().contains("utf-8: invalid byte sequence"));
    }

    #[test]
    fn undefined_bytes_exhaust_the_list() {
        // 0x81 is unassigned in windows-1252 and C1 everywhere else
        let err = decode(b"a\x81b").unwrap_err();
        assert_eq!(err.attempts.len(), 4);
    }
}
