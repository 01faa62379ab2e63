//! Percent-encoding for values placed in HTTP request lines.
//!
//! Encodes a fixed table of reserved and unsafe ASCII characters; everything
//! else, including non-ASCII text, passes through untouched. Applying
//! [`encode`] twice double-encodes.

/// Characters replaced by `%XX`, besides `%` itself.
pub const RESERVED: &str = " !\"#$&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Percent-encode `text`.
///
/// ```
/// assert_eq!(esp_at_protocol::url::encode("a b%c"), "a%20b%25c");
/// ```
pub fn encode(text: &str) -> String {
    let mut encoded = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '%' || RESERVED.contains(c) {
            encoded.push_str(&format!("%{:02X}", c as u32));
        } else {
            encoded.push(c);
        }
    }
    encoded
}
