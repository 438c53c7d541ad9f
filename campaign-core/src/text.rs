//! Helpers for picking structured data out of generated prose.

use serde_json::Value;
use std::ops::Range;

/// Find the first JSON object embedded in `text`.
///
/// A fenced ```` ```json ```` block wins if present; otherwise every `{` is
/// tried in order until one starts a complete object. Returns the object and
/// the byte range it occupied (including the fence, when fenced).
pub(crate) fn extract_json_object(text: &str) -> Option<(Value, Range<usize>)> {
    if let Some(found) = extract_fenced(text, "json") {
        return Some(found);
    }

    text.char_indices()
        .filter(|(_, c)| *c == '{')
        .find_map(|(start, _)| parse_object_at(text, start))
}

/// Extract a fenced block tagged `tag` whose body is a JSON object.
pub(crate) fn extract_fenced(text: &str, tag: &str) -> Option<(Value, Range<usize>)> {
    let opener = format!("```{tag}");
    let fence_start = text.find(&opener)?;
    let body_start = fence_start + opener.len();
    let body_len = text[body_start..].find("```")?;
    let body_end = body_start + body_len;
    let value: Value = serde_json::from_str(text[body_start..body_end].trim()).ok()?;
    value
        .is_object()
        .then_some((value, fence_start..body_end + 3))
}

/// Remove every fenced block tagged `tag`, returning the remaining text and
/// the trimmed body of each block. An unclosed fence runs to the end.
pub(crate) fn take_fenced(text: &str, tag: &str) -> (String, Vec<String>) {
    let opener = format!("```{tag}");
    let mut kept = String::with_capacity(text.len());
    let mut bodies = Vec::new();
    let mut rest = text;

    while let Some(fence_start) = rest.find(&opener) {
        kept.push_str(&rest[..fence_start]);
        let body = &rest[fence_start + opener.len()..];
        match body.find("```") {
            Some(len) => {
                bodies.push(body[..len].trim().to_string());
                rest = &body[len + 3..];
            }
            None => {
                bodies.push(body.trim().to_string());
                rest = "";
            }
        }
    }
    kept.push_str(rest);
    (kept, bodies)
}

fn parse_object_at(text: &str, start: usize) -> Option<(Value, Range<usize>)> {
    let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
    match stream.next() {
        Some(Ok(value)) if value.is_object() => {
            let end = start + stream.byte_offset();
            Some((value, start..end))
        }
        _ => None,
    }
}

/// Truncate to at most `max_chars` characters, appending an ellipsis when cut.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{}...", truncated.trim_end())
}

/// Collapse runs of blank lines and trim the ends.
pub(crate) fn tidy(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.trim().lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim_end().to_string()
}
