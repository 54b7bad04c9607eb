use std::fmt;

use serde::Serialize;

use crate::pivot::PivotTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Note,
    Warning,
    Error,
}

/// A diagnostic addressed to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub severity: Severity,
    pub text: String,
}

impl Message {
    pub fn note(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Note,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            text: text.into(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{tag}: {}", self.text)
    }
}

/// Receives finished tables and diagnostics.  A submitted table belongs to
/// the sink; the producer never touches it again.
pub trait OutputSink {
    fn submit(&mut self, table: PivotTable);
    fn message(&mut self, message: Message);
}

/// Keeps everything it is given, in order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub tables: Vec<PivotTable>,
    pub messages: Vec<Message>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tables whose title is exactly `title`.
    pub fn tables_titled<'a>(&'a self, title: &'a str) -> impl Iterator<Item = &'a PivotTable> {
        self.tables.iter().filter(move |t| t.title == title)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Message> {
        self.messages
            .iter()
            .filter(|m| m.severity == Severity::Warning)
    }
}

impl OutputSink for CollectingSink {
    fn submit(&mut self, table: PivotTable) {
        self.tables.push(table);
    }

    fn message(&mut self, message: Message) {
        self.messages.push(message);
    }
}
