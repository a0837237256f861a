use chrono::{DateTime, Utc};

/// Short display date for note cards, e.g. `Mar 2, 2024`.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%b %-d, %Y").to_string()
}

/// First `max_chars` characters of `content` with whitespace runs collapsed.
pub(crate) fn preview(content: &str, max_chars: usize) -> String {
    let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let mut out: String = collapsed.chars().take(max_chars).collect();
    out.truncate(out.trim_end().len());
    out.push('…');
    out
}
