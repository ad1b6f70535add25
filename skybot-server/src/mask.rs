/// Mask a secret (password, access token) suitable for use in logs.
pub fn secret(value: &str) -> String {
    const DEFAULT_MASK: &str = "************";
    if value.len() < 8 || !value.is_char_boundary(4) {
        DEFAULT_MASK.to_string()
    } else {
        format!("{}{}", &value[0..4], DEFAULT_MASK)
    }
}

/// Mask an `Authorization` header value, keeping only the scheme.
pub fn authorization(value: &str) -> String {
    match value.split_once(' ') {
        Some((scheme, credentials)) => format!("{} {}", scheme, secret(credentials)),
        None => secret(value),
    }
}
