//! Reversible obfuscation for gated lesson content.
//!
//! Payloads are base64-encoded bytes XOR-ed with a cycled key. XOR is
//! self-inverse, so `decode(encode(text, key), key) == text` for every text
//! and non-empty key. This hides content at rest and nothing more: anyone
//! holding the payload and a guessed key can recover the text. It is not a
//! security boundary.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

/// Prefix marking a field as an obfuscation payload.
pub const ENCODED_MARKER: &str = "ENC:";

/// Fixed sentinel shown in place of a field that failed to decode.
pub const UNAVAILABLE_TEXT: &str = "[content unavailable]";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CodecError {
    #[error("obfuscation key must not be empty")]
    EmptyKey,

    #[error("payload is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("decoded bytes are not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

fn xor_with_key(data: &[u8], key: &[u8]) -> Vec<u8> {
    data.iter()
        .zip(key.iter().cycle())
        .map(|(byte, key_byte)| byte ^ key_byte)
        .collect()
}

/// Obfuscate `text` with `key`, returning the base64 payload (no marker).
///
/// # Errors
///
/// Returns `CodecError::EmptyKey` for an empty key.
pub fn encode(text: &str, key: &str) -> Result<String, CodecError> {
    if key.is_empty() {
        return Err(CodecError::EmptyKey);
    }
    Ok(STANDARD.encode(xor_with_key(text.as_bytes(), key.as_bytes())))
}

/// Recover the plaintext from a base64 payload (no marker).
///
/// # Errors
///
/// Returns `CodecError` for an empty key, malformed base64, or a byte
/// sequence that is not UTF-8 after unmasking.
pub fn decode(payload: &str, key: &str) -> Result<String, CodecError> {
    if key.is_empty() {
        return Err(CodecError::EmptyKey);
    }
    let bytes = STANDARD.decode(payload)?;
    Ok(String::from_utf8(xor_with_key(&bytes, key.as_bytes()))?)
}

/// Decode a lesson field if it carries the encoded marker.
///
/// Unmarked fields pass through unchanged. A marked field that fails to
/// decode never crashes the session: it yields [`UNAVAILABLE_TEXT`] and a
/// diagnostic is logged.
#[must_use]
pub fn decode_field(field: &str, key: &str) -> String {
    let Some(payload) = field.strip_prefix(ENCODED_MARKER) else {
        return field.to_string();
    };
    match decode(payload, key) {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(error = %err, "failed to decode obfuscated field");
            UNAVAILABLE_TEXT.to_string()
        }
    }
}

/// Encode a lesson field, adding the marker. Already-marked or empty fields
/// are returned unchanged, so the operation is idempotent.
///
/// # Errors
///
/// Returns `CodecError::EmptyKey` for an empty key.
pub fn encode_field(field: &str, key: &str) -> Result<String, CodecError> {
    if field.is_empty() || field.starts_with(ENCODED_MARKER) {
        return Ok(field.to_string());
    }
    Ok(format!("{ENCODED_MARKER}{}", encode(field, key)?))
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_is_exact() {
        let samples = [
            ("hello", "k"),
            ("", "pinegood888"),
            ("多字节内容 with mixed text", "pinegood888"),
            ("line\nbreaks\tand symbols //@!", "密钥"),
        ];
        for (text, key) in samples {
            let encoded = encode(text, key).unwrap();
            assert_eq!(decode(&encoded, key).unwrap(), text);
        }
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(matches!(encode("x", ""), Err(CodecError::EmptyKey)));
        assert!(matches!(decode("eA==", ""), Err(CodecError::EmptyKey)));
    }

    #[test]
    fn unmarked_field_passes_through() {
        assert_eq!(decode_field("plain text", "key"), "plain text");
    }

    #[test]
    fn marked_field_decodes() {
        let payload = encode_field("secret body", "pinegood888").unwrap();
        assert!(payload.starts_with(ENCODED_MARKER));
        assert_eq!(decode_field(&payload, "pinegood888"), "secret body");
    }

    #[test]
    fn malformed_payload_yields_sentinel() {
        assert_eq!(decode_field("ENC:%%%not-base64%%%", "key"), UNAVAILABLE_TEXT);
    }

    #[test]
    fn wrong_key_non_utf8_yields_sentinel() {
        // XOR with a different key usually produces invalid UTF-8 for
        // multi-byte plaintext.
        let payload = encode_field("多字节内容多字节内容", "pinegood888").unwrap();
        assert_eq!(decode_field(&payload, "zzzzzzzz"), UNAVAILABLE_TEXT);
    }

    #[test]
    fn missing_key_yields_sentinel() {
        let payload = encode_field("secret", "pinegood888").unwrap();
        assert_eq!(decode_field(&payload, ""), UNAVAILABLE_TEXT);
    }

    #[test]
    fn encode_field_is_idempotent() {
        let once = encode_field("secret", "k").unwrap();
        let twice = encode_field(&once, "k").unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn encode_field_keeps_empty_fields_empty() {
        assert_eq!(encode_field("", "k").unwrap(), "");
    }
}
