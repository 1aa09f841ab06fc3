use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Store layout: flat tags, or tags with a parent reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVariant {
    Legacy,
    Hierarchical,
}

impl SchemaVariant {
    pub fn tag_table(self) -> &'static str {
        match self {
            SchemaVariant::Legacy => "bf_tag",
            SchemaVariant::Hierarchical => "bf_tag_v2",
        }
    }
}

impl fmt::Display for SchemaVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaVariant::Legacy => f.write_str("legacy"),
            SchemaVariant::Hierarchical => f.write_str("hierarchical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct FileRecord {
    pub id: i64,
    #[sqlx(rename = "name")]
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TagRecord {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, FromRow)]
pub struct Association {
    pub file_id: i64,
    pub tag_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct NoteRecord {
    pub file_id: i64,
    #[sqlx(rename = "note")]
    pub text: String,
    pub origin: Option<String>,
}

impl NoteRecord {
    /// Structured origin if present, otherwise the one embedded in the text.
    pub fn resolved_origin(&self) -> Option<String> {
        self.origin
            .clone()
            .or_else(|| parse_origin_marker(&self.text))
    }
}

/// Reads the trailing `Origin:` marker of a note.
///
/// The marker is the last `Origin:` in the text; its value runs to the next
/// line break or the end of the text. Empty values yield `None`.
pub fn parse_origin_marker(text: &str) -> Option<String> {
    const MARKER: &str = "Origin:";
    let start = text.rfind(MARKER)? + MARKER.len();
    let rest = &text[start..];
    let end = rest.find(|c: char| c == '\r' || c == '\n').unwrap_or(rest.len());
    let value = rest[..end].trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub files: i64,
    pub tags: usize,
    pub associations: usize,
    pub notes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_marker_at_end_of_text() {
        let text = "Title:x\r\nNo Comment\r\n\r\nOrigin:https://example.invalid/artworks/1";
        assert_eq!(
            parse_origin_marker(text).as_deref(),
            Some("https://example.invalid/artworks/1")
        );
    }

    #[test]
    fn origin_marker_stops_at_line_break() {
        assert_eq!(
            parse_origin_marker("Origin:abc\r\ntrailing").as_deref(),
            Some("abc")
        );
        assert_eq!(parse_origin_marker("no marker here"), None);
        assert_eq!(parse_origin_marker("Origin:\r\n"), None);
    }

    #[test]
    fn structured_origin_wins() {
        let note = NoteRecord {
            file_id: 1,
            text: "Origin:embedded".into(),
            origin: Some("structured".into()),
        };
        assert_eq!(note.resolved_origin().as_deref(), Some("structured"));
    }
}
