use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferKind {
    Tags,
    Associations,
    Notes,
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BufferKind::Tags => "tags",
            BufferKind::Associations => "associations",
            BufferKind::Notes => "notes",
        })
    }
}

/// Rows waiting to be persisted in one batch.
#[derive(Debug)]
pub struct WriteBuffer<T> {
    rows: Vec<T>,
    threshold: usize,
}

impl<T> WriteBuffer<T> {
    pub fn new(threshold: usize) -> Self {
        Self {
            rows: Vec::new(),
            threshold,
        }
    }

    pub fn push(&mut self, row: T) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// An empty buffer is never ready, even when forced.
    pub fn ready(&self, force: bool) -> bool {
        !self.rows.is_empty() && (force || self.rows.len() >= self.threshold)
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}
