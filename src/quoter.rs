//! Percent encoding and decoding.
//!
//! Decoding here is strict: an incomplete or non-hex escape sequence is an
//! error, not pass-through. The matcher relies on that to disqualify a
//! candidate instead of surfacing garbage param values.

use std::borrow::Cow;
use std::fmt;

use once_cell::sync::Lazy;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Malformed percent-encoding in a decoded string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeError;

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("malformed percent-encoded sequence")
    }
}

impl std::error::Error for DecodeError {}

/// Bytes escaped when encoding a single param value; the complement of JS
/// `encodeURIComponent`'s unreserved set.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'!')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Bytes escaped when encoding a multi-segment (splat) value; [`COMPONENT`]
/// minus URI reserved punctuation, so embedded `/` separators survive. The
/// complement of JS `encodeURI`'s untouched set.
const PATH: &AsciiSet = &COMPONENT
    .remove(b';')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b',')
    .remove(b'#');

/// Reserved bytes that stay encoded when decoding a whole path (the set JS
/// `decodeURI` refuses to decode).
const URI_RESERVED: &[u8] = b";/?:@&=+$,#";

static NO_PROTECTED: [u8; 16] = [0; 16];

static URI_PROTECTED: Lazy<[u8; 16]> = Lazy::new(|| {
    let mut table = [0; 16];
    for &ch in URI_RESERVED {
        set_bit(&mut table, ch);
    }
    table
});

/// Percent-encodes `value` for use as a single path part.
pub(crate) fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Percent-encodes `value` for use as a multi-part path fragment, keeping
/// `/` and other URI punctuation intact.
pub(crate) fn encode_path(value: &str) -> String {
    utf8_percent_encode(value, PATH).to_string()
}

/// Fully percent-decodes `value`, `%2F` included.
pub(crate) fn decode(value: &str) -> Result<Cow<'_, str>, DecodeError> {
    decode_protected(value, &NO_PROTECTED)
}

/// Percent-decodes `value` while leaving URI reserved punctuation encoded.
pub(crate) fn decode_uri(value: &str) -> Result<Cow<'_, str>, DecodeError> {
    decode_protected(value, &URI_PROTECTED)
}

fn decode_protected<'a>(
    value: &'a str,
    protected_table: &[u8; 16],
) -> Result<Cow<'a, str>, DecodeError> {
    if !value.contains('%') {
        return Ok(Cow::Borrowed(value));
    }

    let bytes = value.as_bytes();
    let mut buf = Vec::with_capacity(bytes.len());
    let mut idx = 0;

    while idx < bytes.len() {
        if bytes[idx] == b'%' {
            let pair = match (bytes.get(idx + 1), bytes.get(idx + 2)) {
                (Some(&hi), Some(&lo)) => hex_pair_to_char(hi, lo),
                _ => None,
            };
            let ch = pair.ok_or(DecodeError)?;

            if ch < 128 && bit_at(protected_table, ch) {
                buf.extend_from_slice(&bytes[idx..idx + 3]);
            } else {
                buf.push(ch);
            }

            idx += 3;
        } else {
            buf.push(bytes[idx]);
            idx += 1;
        }
    }

    String::from_utf8(buf)
        .map(Cow::Owned)
        .map_err(|_| DecodeError)
}

/// Decode a ASCII hex-encoded pair to an integer.
///
/// Returns `None` if either portion of the decoded pair does not evaluate to a valid hex value.
#[inline(always)]
fn hex_pair_to_char(d1: u8, d2: u8) -> Option<u8> {
    let d_high = char::from(d1).to_digit(16)?;
    let d_low = char::from(d2).to_digit(16)?;

    // left shift high nibble by 4 bits
    Some((d_high as u8) << 4 | (d_low as u8))
}

fn set_bit(array: &mut [u8; 16], ch: u8) {
    array[(ch >> 3) as usize] |= 0b1 << (ch & 0b111)
}

fn bit_at(array: &[u8; 16], ch: u8) -> bool {
    array[(ch >> 3) as usize] & (0b1 << (ch & 0b111)) != 0
}
