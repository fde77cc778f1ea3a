use scraper::ElementRef;
use unicode_normalization::UnicodeNormalization;

pub fn extract_text(node: ElementRef) -> String {
    node.text().collect::<String>()
}

/// Turns non-breaking spaces into regular ones.
pub fn normalize_nbsp(text: &str) -> String {
    text.replace('\u{a0}', " ")
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// NFKD-normalizes `text` and drops whatever is still not ASCII, so accented
/// letters fall back to their base letter.
pub fn to_ascii(text: &str) -> String {
    text.nfkd().filter(char::is_ascii).collect()
}
