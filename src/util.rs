/// Truncate a string to at most `max_bytes`, never splitting a character.
pub fn truncate_string(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut truncated = String::new();
    for ch in text.chars() {
        if truncated.len() + ch.len_utf8() > max_bytes {
            break;
        }
        truncated.push(ch);
    }
    truncated
}

/// Number of lines in a content payload, as counted against the plan caps.
/// Empty content counts as zero lines.
pub fn count_lines(text: &str) -> usize {
    text.lines().count()
}
