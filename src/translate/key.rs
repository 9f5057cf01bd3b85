//! Cache key derivation.
//! Key: standard base64 of the raw UTF-8 bytes, optionally namespaced by a prefix.
//! Reversible and injective; no case, whitespace or unicode normalization.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Derive the cache key for `text` under `prefix` (may be empty).
pub fn derive_key(prefix: &str, text: &str) -> String {
    let encoded = STANDARD.encode(text.as_bytes());
    if prefix.is_empty() {
        return encoded;
    }
    let mut key = String::with_capacity(prefix.len() + encoded.len());
    key.push_str(prefix);
    key.push_str(&encoded);
    key
}

/// Recover the original text from a key produced by [`derive_key`] with the same prefix.
/// Returns None if the key does not carry the prefix or is not valid base64 UTF-8.
#[cfg(test)]
pub(crate) fn decode_key(prefix: &str, key: &str) -> Option<String> {
    let encoded = key.strip_prefix(prefix)?;
    let bytes = STANDARD.decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}
