//! HTML escaping.

use std::borrow::Cow;

/// Escape `&`, `<`, `>` and `"` so the text is safe inside element content
/// and double-quoted attribute values.
#[inline]
pub fn escape_html(text: &str) -> Cow<'_, str> {
    htmlize::escape_attribute(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_markup() {
        assert_eq!(escape_html("<b>"), "&lt;b&gt;");
        assert_eq!(escape_html(r#"a & "b""#), "a &amp; &quot;b&quot;");
    }
}
