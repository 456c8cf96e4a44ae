/// Check that `s` is a non-empty string of ASCII letters, digits and underscores.
///
/// Layer names, workspace names and attribute keys all go through this
/// check. Anything else is rejected rather than escaped, whatever naming the
/// upstream server itself would accept.
pub fn is_valid_identifier(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}
