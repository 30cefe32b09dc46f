use std::net::IpAddr;

/// Returns `true` iff `candidate` is a syntactically valid IPv4 or IPv6 address.
///
/// Accepts dotted-decimal IPv4 and colon-hex IPv6, including `::` compression.
/// Surrounding whitespace, CIDR suffixes and zone ids are rejected.
pub fn validate(candidate: &str) -> bool {
    candidate.parse::<IpAddr>().is_ok()
}

/// Canonical text form of a valid address, `None` otherwise.
///
/// IPv6 is rendered lower-case with the longest zero run compressed, so
/// `2001:DB8:0:0:0:0:0:1` and `2001:db8::1` map to the same string.
pub fn canonicalize(candidate: &str) -> Option<String> {
    candidate.parse::<IpAddr>().ok().map(|ip| ip.to_string())
}
