//! Text helpers for model output and scraped markup.

use once_cell::sync::Lazy;
use regex::Regex;

static FENCE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"```html\s*").expect("valid regex"));
static FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```\s*").expect("valid regex"));
static DOCUMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)(<!DOCTYPE html>.*?</html>|<html\b[^>]*>.*?</html>)").expect("valid regex")
});
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static STYLE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("valid regex"));
static SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("valid regex"));
static INLINE_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\S\n]+").expect("valid regex"));
static SPACE_BEFORE_NEWLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r" *\n").expect("valid regex"));
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Marker appended to text cut by [`truncate`].
pub const TRUNCATION_MARKER: &str = "\n...[truncated]...";

/// Extracts the HTML document from model output.
///
/// Markdown code fences are dropped first. When a complete document is
/// present it is returned alone; otherwise the trimmed text is returned.
pub fn clean_html_output(content: &str) -> String {
    let content = FENCE_OPEN.replace_all(content, "");
    let content = FENCE.replace_all(&content, "");
    match DOCUMENT.find(&content) {
        Some(document) => document.as_str().to_string(),
        None => content.trim().to_string(),
    }
}

/// Removes tags and collapses all whitespace to single spaces.
pub fn collapse_html(html: &str) -> String {
    let text = TAG.replace_all(html, "");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Converts an HTML page to readable plain text, keeping paragraph breaks.
pub fn strip_tags(html: &str) -> String {
    let text = STYLE_BLOCK.replace_all(html, "");
    let text = SCRIPT_BLOCK.replace_all(&text, "");
    let text = TAG.replace_all(&text, " ");
    let text = INLINE_SPACE.replace_all(&text, " ");
    let text = SPACE_BEFORE_NEWLINE.replace_all(&text, "\n");
    let text = BLANK_LINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Cuts `text` to at most `max_chars` characters, marking the cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{TRUNCATION_MARKER}", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Inserts `footer` before `</body>`, or appends it when the document has no
/// body end tag.
pub fn append_footer(html: &str, footer: &str) -> String {
    if footer.is_empty() {
        return html.to_string();
    }
    if html.contains("</body>") {
        html.replace("</body>", &format!("{footer}</body>"))
    } else {
        format!("{html}{footer}")
    }
}
