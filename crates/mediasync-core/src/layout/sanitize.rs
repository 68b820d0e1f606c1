//! Filename component sanitization.

/// Longest single substituted value. Whole file names are capped separately
/// in the layout, since a template can join several values into one name.
pub const COMPONENT_MAX: usize = 200;

/// Longest file name most filesystems accept, in bytes.
pub const NAME_MAX: usize = 255;

/// Longest prefix of `value` of at most `max` bytes, cut on a char boundary.
pub fn truncate_bytes(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut take = max;
    while take > 0 && !value.is_char_boundary(take) {
        take -= 1;
    }
    &value[..take]
}

/// Sanitizes a catalog value (artist, title) for use as one path component.
///
/// - Replaces NUL, `/`, `\` and control characters with `-`
/// - Trims leading/trailing whitespace and dots
/// - Limits length to `COMPONENT_MAX` bytes on a char boundary
pub fn sanitize_component(value: &str) -> String {
    let replaced: String = value
        .chars()
        .map(|c| {
            if c == '\0' || c == '/' || c == '\\' || c.is_control() {
                '-'
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim_matches(|c: char| c.is_whitespace() || c == '.');

    truncate_bytes(trimmed, COMPONENT_MAX).trim_end().to_string()
}
