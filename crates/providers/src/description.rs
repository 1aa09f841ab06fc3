use crate::{DescriptionRecord, ProviderError};
use regex::Regex;

/// Renders a description into the fixed note layout.
///
/// Single quotes are doubled to match the asset store's escaping convention.
pub fn format_description(record: &DescriptionRecord) -> String {
    let mut note = format!(
        "Title:{}\r\nArtist:{}\r\nUID:{}\r\nBookmark:{}\r\n",
        record.title, record.author, record.author_id, record.popularity_count
    );
    if record.comment.is_empty() {
        note.push_str("No Comment\r\n");
    } else {
        note.push_str("Comment:\r\n");
        note.push_str(&record.comment);
    }
    note.replace('\'', "''")
}

/// Drops a trailing `@handle` (ASCII or full-width) from an artist name.
pub fn clean_artist_name(name: &str) -> String {
    let ascii = cut_at_last(name, '@');
    cut_at_last(&ascii, '＠')
}

fn cut_at_last(name: &str, marker: char) -> String {
    if let Some(pos) = name.rfind(marker) {
        let before = name[..pos].chars().count();
        let after = name[pos + marker.len_utf8()..].chars().count();
        if before >= 2 && after >= 2 {
            return name[..pos].to_string();
        }
    }
    name.to_string()
}

/// Turns an HTML comment body into plain text with `[url]` markers.
#[derive(Debug, Clone)]
pub struct HtmlCleaner {
    line_break: Regex,
    link: Regex,
    tag: Regex,
    jump_link: Regex,
}

impl HtmlCleaner {
    pub fn new() -> Result<Self, ProviderError> {
        let compile =
            |pattern: &str| Regex::new(pattern).map_err(|e| ProviderError::Parse(e.to_string()));
        Ok(Self {
            line_break: compile(r"(?i)<br\s*/?>")?,
            link: compile(r#"(?i)<a\s+href="([^"]+)"[^>]*>"#)?,
            tag: compile(r"<[^>]+>")?,
            jump_link: compile(r"\[url\]/jump\.php[^\]]*\[/url\]\r\n")?,
        })
    }

    pub fn clean(&self, html: &str) -> String {
        let text = self.line_break.replace_all(html, "\r\n");
        let text = self.link.replace_all(&text, "[url]$1[/url]\r\n");
        let text = self.tag.replace_all(&text, "");
        self.jump_link.replace_all(&text, "").into_owned()
    }
}
