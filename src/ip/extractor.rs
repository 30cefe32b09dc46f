use once_cell::sync::Lazy;
use regex::Regex;

// Alternatives are ordered so the longer IPv6 shapes win: middle `::` has to
// come before trailing `::`, otherwise `2001:db8::1` stops at `2001:db8::`.
// The middle form takes every group after the `::`, not just the first one.
static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?x)
        \b
        (
            (?:[0-9]{1,3}\.){3}[0-9]{1,3}                 # IPv4
            |
            (?:[a-fA-F0-9]{1,4}:){7}[a-fA-F0-9]{1,4}      # IPv6, all 8 groups
            |
            (?:[a-fA-F0-9]{1,4}:){1,6}(?::[a-fA-F0-9]{1,4}){1,6}  # IPv6, :: in the middle
            |
            (?:[a-fA-F0-9]{1,4}:){1,7}:                   # IPv6, trailing ::
        )
        \b
        ",
    )
    .unwrap()
});

/// Every address-shaped substring of `text`, in order of appearance.
///
/// This is a lexical filter: duplicates are kept and numerically invalid shapes
/// such as `999.1.1.1` are returned. Run the results through
/// [`super::validate`] when strict validity matters.
pub fn extract(text: &str) -> Vec<String> {
    ADDRESS_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}
