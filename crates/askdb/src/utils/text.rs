#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whitespace-normalized prefix of `text` with `...` appended when cut.
#[must_use]
pub fn derive_excerpt(text: &str, max_chars: usize) -> String {
    let normalized = normalize_whitespace(text);
    if normalized.chars().count() <= max_chars {
        return normalized;
    }

    let mut excerpt = String::with_capacity(max_chars + 3);
    excerpt.extend(normalized.chars().take(max_chars));
    excerpt.push_str("...");
    excerpt
}
