//! Charset decoding for payloads and RFC 2047 encoded-words

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use encoding_rs::Encoding;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::fmt::Write as _;
use std::sync::LazyLock;

use crate::config::BinaryFallback;

/// Charset tag used for payloads that no charset could decode
pub const EIGHT_BIT: &str = "8bit";

/// Placeholder emitted instead of undecodable payloads
pub const BINARY_SUPPRESSED: &str = "[Binary data suppressed]\n";

/// Pattern for one RFC 2047 encoded-word (`=?charset?Q?data?=`)
const ENCODED_WORD_PATTERN: &str = r"=\?([^?\s]+)\?([QqBb])\?([^?\s]+)\?=";

static ENCODED_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ENCODED_WORD_PATTERN).unwrap());

/// Text recovered from a payload together with the charset that worked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub charset: String,
}

/// Decode `payload` as `charset`, failing on any invalid sequence.
///
/// `us-ascii` only accepts 7-bit input; encoding_rs would otherwise treat it
/// as windows-1252 and never fail.
#[must_use]
pub fn decode_strict(payload: &[u8], charset: &str) -> Option<String> {
    let label = charset.trim().to_ascii_lowercase();
    match label.as_str() {
        "us-ascii" | "ascii" | "7bit" => {
            if payload.is_ascii() {
                String::from_utf8(payload.to_vec()).ok()
            } else {
                None
            }
        }
        "utf-8" | "utf8" => std::str::from_utf8(payload).ok().map(str::to_owned),
        _ => Encoding::for_label_no_replacement(label.as_bytes())?
            .decode_without_bom_handling_and_without_replacement(payload)
            .map(Cow::into_owned),
    }
}

/// Decode a text payload, trying the declared charset first and then each
/// entry of `priority` not equal to it.
#[must_use]
pub fn decode_text(
    payload: &[u8],
    declared: Option<&str>,
    priority: &[String],
    fallback: BinaryFallback,
) -> DecodedText {
    let mut charsets: Vec<&str> = Vec::with_capacity(priority.len() + 1);
    if let Some(declared) = declared.filter(|c| !c.trim().is_empty()) {
        charsets.push(declared);
    }
    for charset in priority {
        if !charsets.iter().any(|c| c.eq_ignore_ascii_case(charset)) {
            charsets.push(charset);
        }
    }

    for charset in charsets {
        if let Some(text) = decode_strict(payload, charset) {
            return DecodedText {
                text,
                charset: charset.to_ascii_lowercase(),
            };
        }
    }

    match fallback {
        BinaryFallback::Raw => DecodedText {
            text: String::from_utf8_lossy(payload).into_owned(),
            charset: EIGHT_BIT.into(),
        },
        BinaryFallback::Suppress => DecodedText {
            text: BINARY_SUPPRESSED.into(),
            charset: "utf-8".into(),
        },
    }
}

/// Encode text back into the bytes of `charset`, used when handing armored
/// blocks to a crypto backend. Unknown charsets and `8bit` fall back to UTF-8.
#[must_use]
pub fn encode_text(text: &str, charset: &str) -> Vec<u8> {
    match Encoding::for_label_no_replacement(charset.trim().as_bytes()) {
        Some(encoding) => encoding.encode(text).0.into_owned(),
        None => text.as_bytes().to_vec(),
    }
}

/// Decode header bytes with the first charset in `order` that accepts them
#[must_use]
pub fn decode_header_bytes(data: &[u8], order: &[String]) -> String {
    order
        .iter()
        .find_map(|charset| decode_strict(data, charset))
        .unwrap_or_else(|| String::from_utf8_lossy(data).into_owned())
}

/// Replace every well-formed encoded-word in `s` with its decoded text.
/// Words that fail to decode are left untouched.
#[must_use]
pub fn decode_encoded_words(s: &str) -> String {
    ENCODED_WORD
        .replace_all(s, |caps: &Captures<'_>| {
            decode_word(&caps[1], &caps[2], &caps[3]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn decode_word(charset: &str, how: &str, data: &str) -> Option<String> {
    let bytes = if how.eq_ignore_ascii_case("b") {
        STANDARD
            .decode(data)
            .or_else(|_| STANDARD_NO_PAD.decode(data.trim_end_matches('=')))
            .ok()?
    } else {
        q_decode(data.as_bytes())
    };
    decode_strict(&bytes, charset)
}

fn q_decode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'_' => out.push(b' '),
            b'=' => {
                let hex = data
                    .get(i + 1..i + 3)
                    .filter(|h| h.iter().all(u8::is_ascii_hexdigit))
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                if let Some(byte) = hex {
                    out.push(byte);
                    i += 3;
                    continue;
                }
                out.push(b'=');
            }
            b => out.push(b),
        }
        i += 1;
    }
    out
}

/// Encode `s` as a UTF-8 `Q` encoded-word body: spaces become `_`, anything
/// outside printable ASCII (and `=`, `?`, `_`) becomes `=XX`.
#[must_use]
pub fn q_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b' ' => out.push('_'),
            0x21..=0x7e if !matches!(byte, b'=' | b'?' | b'_') => out.push(char::from(byte)),
            _ => {
                let _ = write!(out, "={byte:02X}");
            }
        }
    }
    out
}
