//! Plain-text helpers for the rich-text fragments stored in reports.

use once_cell::sync::Lazy;
use regex::Regex;

static BLOCK_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<\s*(br\s*/?|/p|/div|/li|/h[1-6]|/tr)\s*>").unwrap());
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\r\f]+").unwrap());
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n+").unwrap());

/// Marker appended to truncated text.
pub const ELLIPSIS: &str = "...";

/// Reduces an HTML fragment to readable text: tags dropped, block ends kept as line breaks,
/// common entities decoded and whitespace collapsed.
pub fn html_to_text(html: &str) -> String {
    let with_breaks = BLOCK_BREAK.replace_all(html, "\n");
    let stripped = TAG.replace_all(&with_breaks, "");
    let decoded = decode_entities(&stripped);
    let collapsed = SPACES.replace_all(&decoded, " ");
    let lines: Vec<&str> = collapsed.lines().map(str::trim).collect();
    let joined = lines.join("\n");
    BLANK_LINES.replace_all(&joined, "\n").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Truncates to at most `max_chars` characters, appending [`ELLIPSIS`] when anything was cut.
/// Returns the text and whether it was truncated.
pub fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    if text.chars().count() <= max_chars {
        return (text.to_string(), false);
    }
    let cut: String = text.chars().take(max_chars).collect();
    (format!("{}{}", cut.trim_end(), ELLIPSIS), true)
}

/// Escapes text for inclusion in HTML element content or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text() {
        let html = "<p>Revenue grew <strong>12%</strong></p><p>Margins &amp; cash flow</p>";
        assert_eq!(html_to_text(html), "Revenue grew 12%\nMargins & cash flow");
        assert_eq!(html_to_text("plain"), "plain");
        assert_eq!(html_to_text(""), "");
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        let (short, cut) = truncate_chars("abc", 5);
        assert_eq!(short, "abc");
        assert!(!cut);

        let (long, cut) = truncate_chars("été été", 3);
        assert_eq!(long, "été...");
        assert!(cut);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<a href=\"x\">R&D</a>"),
            "&lt;a href=&quot;x&quot;&gt;R&amp;D&lt;/a&gt;"
        );
    }
}
