//! Message content handling.
//!
//! Message content is opaque to the controller. A [`ContentCodec`] supplies
//! the two things the controller needs from it: the attachment references
//! to declare on publish, and a short text preview for tooling.

use serde_json::Value;

/// Interprets opaque message content.
pub trait ContentCodec: Send + Sync {
    /// Attachment references to send alongside the content.
    fn attachments(&self, content: &Value) -> Vec<String>;

    /// Plain-text preview, at most `max_chars` characters.
    fn preview(&self, content: &Value, max_chars: usize) -> String;
}

/// Codec for plain-text content.
///
/// Strings are their own preview; `{"txt": ...}` objects preview their text
/// field and declare the `ref` of every entry in `att`. Anything else
/// previews as compact JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextCodec;

impl ContentCodec for PlainTextCodec {
    fn attachments(&self, content: &Value) -> Vec<String> {
        content
            .get("att")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("ref").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn preview(&self, content: &Value, max_chars: usize) -> String {
        let text = match content {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => match other.get("txt").and_then(Value::as_str) {
                Some(txt) => txt.to_string(),
                None => other.to_string(),
            },
        };
        truncate(&text, max_chars)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_string_has_no_attachments() {
        let codec = PlainTextCodec;
        assert!(codec.attachments(&json!("hello")).is_empty());
        assert_eq!(codec.preview(&json!("hello"), 10), "hello");
    }

    #[test]
    fn object_attachments_are_declared() {
        let codec = PlainTextCodec;
        let content = json!({
            "txt": "see file",
            "att": [{"ref": "/v0/file/s/abc.png"}, {"name": "inline"}]
        });

        assert_eq!(codec.attachments(&content), vec!["/v0/file/s/abc.png"]);
        assert_eq!(codec.preview(&content, 20), "see file");
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let codec = PlainTextCodec;
        assert_eq!(codec.preview(&json!("héllo wörld"), 5), "héllo…");
        assert_eq!(codec.preview(&json!(null), 5), "");
    }

    #[test]
    fn unknown_shapes_preview_as_json() {
        let codec = PlainTextCodec;
        assert_eq!(codec.preview(&json!([1, 2]), 40), "[1,2]");
    }
}
