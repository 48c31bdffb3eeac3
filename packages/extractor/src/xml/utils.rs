//! Helpers for raw input positions and markup text.

/// 1-based line number of a byte offset in the input.
///
/// # Examples
/// ```
/// use record_extractor::xml::line_at;
///
/// let text = "<a>\n<b/>\n</a>";
/// assert_eq!(line_at(text, 0), 1);
/// assert_eq!(line_at(text, 4), 2);
/// assert_eq!(line_at(text, 1000), 3);
/// ```
pub fn line_at(input: &str, offset: usize) -> usize {
    let end = offset.min(input.len());
    input.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
}

/// Escape a value for use inside a double-quoted attribute.
pub fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
