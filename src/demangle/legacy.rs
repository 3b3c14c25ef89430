//! Fallback normalization for names that are not Swift ABI manglings.
//!
//! `demangle_symbol` falls back to this module whenever its input carries
//! neither a `$s`/`$S` mangling prefix. Rather than
//! failing the whole call, it composes two cheap normalizers so a caller
//! walking a symbol table still gets *something* readable back for the
//! Objective-C, C, and pre-Swift-4 (`_T`-prefixed) symbols mixed into real
//! binaries alongside Swift ones.

/// Strip the legacy Swift mangling prefix (`_T`, `_TF`, `_TtC`, ...) down to
/// its first embedded module/type identifier, best-effort. Full legacy
/// grammar support is out of scope for this crate (see `DESIGN.md`); this
/// exists only so legacy-mangled names don't come out looking like raw
/// mangled garbage.
fn strip_legacy_prefix(text: &str) -> &str {
    let mut s = text;
    for prefix in ["_TtC", "_TtV", "_TtO", "_TF", "_Tt", "_T"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest;
            break;
        }
    }
    s.trim_start_matches(|c: char| c.is_ascii_digit())
}

/// Decode a plain, dot-separated identifier (the shape most C/Objective-C
/// symbols already have once a leading underscore is stripped).
fn normalize_plain(text: &str) -> String {
    text.trim_start_matches('_').replace("__", ".")
}

/// Best-effort normalization for a symbol this crate did not recognize as a
/// Swift ABI mangling.
pub fn normalize_identifier(text: &str) -> String {
    let stripped = strip_legacy_prefix(text);
    if stripped.len() != text.len() {
        normalize_plain(stripped)
    } else {
        normalize_plain(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_known_legacy_prefixes() {
        assert_eq!(strip_legacy_prefix("_TtC4App3Foo"), "App3Foo");
        assert_eq!(strip_legacy_prefix("plain_name"), "plain_name");
    }

    #[test]
    fn normalizes_double_underscore_as_a_dot() {
        assert_eq!(normalize_identifier("_foo__bar"), "foo.bar");
    }
}
