//! Defensive JSON extraction from model output. Providers wrap JSON in
//! prose or code fences often enough that strict parsing is a liability.

/// Slice out the outermost JSON object: first `{` to last `}`.
pub fn json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Find the first JSON array of numbers in the text and parse it.
/// Tolerates surrounding prose; rejects arrays containing non-numbers.
pub fn number_array(text: &str) -> Option<Vec<f32>> {
    let start = text.find('[')?;
    let end = text[start..].find(']')? + start;
    let inner = &text[start + 1..end];
    let trimmed = inner.trim();
    if trimmed.is_empty() {
        return Some(Vec::new());
    }
    trimmed
        .split(',')
        .map(|s| s.trim().parse::<f32>().ok())
        .collect()
}
