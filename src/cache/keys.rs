// Cache key construction.
// Builds deterministic keys from a platform name and request parameters.

/// Build a cache key such as `tiktok:someone:123,456`.
///
/// Case is preserved; adapters lowercase identifiers their platform treats as
/// case-insensitive before calling this.
pub fn cache_key(platform: &str, parts: &[&str]) -> String {
    let mut key = String::from(platform);
    for part in parts {
        key.push(':');
        key.push_str(&sanitize_part(part));
    }
    key
}

/// Sanitize a key component.
/// Replaces the separator and whitespace so components cannot bleed into each other.
fn sanitize_part(part: &str) -> String {
    part.trim()
        .chars()
        .map(|c| match c {
            ':' | '/' | '\\' => '_',
            c if c.is_whitespace() => '_',
            _ => c,
        })
        .collect()
}
