//! Message sink used by commands, plugins and the error reporter.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
    Debug,
}

/// User-facing output and interaction.
///
/// Implementations are pure side-effecting sinks; nothing in the runtime
/// reads state back from them except through `confirm` and `prompt`.
pub trait Ui: Send + Sync {
    fn info(&self, message: &str);
    fn success(&self, message: &str);
    fn warning(&self, message: &str);
    fn error(&self, message: &str);
    fn debug(&self, message: &str);

    fn confirm(&self, prompt: &str) -> bool;
    fn prompt(&self, message: &str) -> String;

    /// Render rows under a title. The default lays out padded columns
    /// through `info`.
    fn table(&self, title: &str, headers: &[&str], rows: &[Vec<String>]) {
        for line in render_table(title, headers, rows) {
            self.info(&line);
        }
    }
}

/// Plain text table layout shared by the default `Ui::table`.
pub fn render_table(title: &str, headers: &[&str], rows: &[Vec<String>]) -> Vec<String> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            let len = cell.chars().count();
            match widths.get_mut(i) {
                Some(w) => *w = (*w).max(len),
                None => widths.push(len),
            }
        }
    }

    let fmt_row = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:<width$}", c, width = widths.get(i).copied().unwrap_or(0)))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = Vec::with_capacity(rows.len() + 3);
    if !title.is_empty() {
        out.push(title.to_string());
    }
    out.push(fmt_row(headers.to_vec()));
    out.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in rows {
        out.push(fmt_row(row.iter().map(String::as_str).collect()));
    }
    out
}

// ---------------------------------------------------------------------------
// Captured sink
// ---------------------------------------------------------------------------

/// A `Ui` that records every message. Used in tests and for non-interactive
/// embedding where output is collected rather than printed.
#[derive(Default)]
pub struct CapturedUi {
    messages: Mutex<Vec<(MessageLevel, String)>>,
    answers: Mutex<VecDeque<String>>,
}

impl CapturedUi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next `prompt` or `confirm` call.
    pub fn push_answer(&self, answer: impl Into<String>) {
        self.answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(answer.into());
    }

    pub fn messages(&self) -> Vec<(MessageLevel, String)> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn messages_at(&self, level: MessageLevel) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }

    /// True if any recorded message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.messages().iter().any(|(_, m)| m.contains(needle))
    }

    pub fn clear(&self) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn record(&self, level: MessageLevel, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, message.to_string()));
    }

    fn next_answer(&self) -> Option<String> {
        self.answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

impl Ui for CapturedUi {
    fn info(&self, message: &str) {
        self.record(MessageLevel::Info, message);
    }

    fn success(&self, message: &str) {
        self.record(MessageLevel::Success, message);
    }

    fn warning(&self, message: &str) {
        self.record(MessageLevel::Warning, message);
    }

    fn error(&self, message: &str) {
        self.record(MessageLevel::Error, message);
    }

    fn debug(&self, message: &str) {
        self.record(MessageLevel::Debug, message);
    }

    fn confirm(&self, prompt: &str) -> bool {
        self.record(MessageLevel::Info, prompt);
        self.next_answer()
            .map(|a| matches!(a.trim().to_ascii_lowercase().as_str(), "y" | "yes" | "true"))
            .unwrap_or(false)
    }

    fn prompt(&self, message: &str) -> String {
        self.record(MessageLevel::Info, message);
        self.next_answer().unwrap_or_default()
    }
}
