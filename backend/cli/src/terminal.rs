//! Terminal message sink: ANSI-styled notes on stdout, errors on stderr,
//! interactive confirm/prompt over stdin.

use std::io::{BufRead, Write};

use shellforge_core::Ui;

// ---------------------------------------------------------------------------
// ANSI Color/Style helpers
// ---------------------------------------------------------------------------

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";

/// Check if the terminal supports color output.
pub fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
        && (std::env::var("COLORTERM").is_ok()
            || std::env::var("TERM")
                .map(|t| t != "dumb")
                .unwrap_or(false))
}

/// Strip ANSI escape codes from a string.
pub fn strip_ansi(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

// ---------------------------------------------------------------------------
// Table rendering
// ---------------------------------------------------------------------------

/// Lay out a titled table. Widths ignore escape codes so styled cells line up.
pub fn render_table(title: &str, headers: &[&str], rows: &[Vec<String>], color: bool) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| strip_ansi(h).chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            let w = strip_ansi(cell).chars().count();
            match widths.get_mut(i) {
                Some(width) => *width = (*width).max(w),
                None => widths.push(w),
            }
        }
    }

    let pad = |s: &str, width: usize| {
        let visible = strip_ansi(s).chars().count();
        format!("{s}{}", " ".repeat(width.saturating_sub(visible)))
    };
    let (bold, dim, reset) = if color { (BOLD, DIM, RESET) } else { ("", "", "") };

    let mut out = String::new();
    if !title.is_empty() {
        out.push_str(&format!("{bold}{title}{reset}\n"));
    }
    let header_cells: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(i, w)| pad(headers.get(i).copied().unwrap_or(""), *w))
        .collect();
    out.push_str(&format!("{bold}  {}{reset}\n", header_cells.join("  ").trim_end()));

    let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&format!("{dim}  {}{reset}\n", sep.join("  ")));

    if rows.is_empty() {
        out.push_str(&format!("{dim}  (none){reset}\n"));
    }
    for row in rows {
        let cells: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, w)| pad(row.get(i).map(String::as_str).unwrap_or(""), *w))
            .collect();
        out.push_str(&format!("  {}\n", cells.join("  ").trim_end()));
    }
    out
}

// ---------------------------------------------------------------------------
// Ui implementation
// ---------------------------------------------------------------------------

pub struct TerminalUi {
    color: bool,
    debug: bool,
}

impl TerminalUi {
    pub fn new(debug: bool) -> Self {
        Self {
            color: supports_color(),
            debug,
        }
    }

    fn note(&self, symbol: &str, style: &str, plain: &str, msg: &str) -> String {
        if self.color {
            format!("{style}{BOLD}{symbol}{RESET} {msg}")
        } else {
            format!("{plain}{msg}")
        }
    }

    fn read_line(&self, prompt: &str) -> String {
        print!("{prompt}");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        if std::io::stdin().lock().read_line(&mut line).is_err() {
            return String::new();
        }
        line.trim_end_matches(['\r', '\n']).to_string()
    }
}

impl Ui for TerminalUi {
    fn info(&self, message: &str) {
        println!("{message}");
    }

    fn success(&self, message: &str) {
        println!("{}", self.note("✓", GREEN, "OK: ", message));
    }

    fn warning(&self, message: &str) {
        println!("{}", self.note("⚠", YELLOW, "WARN: ", message));
    }

    fn error(&self, message: &str) {
        eprintln!("{}", self.note("✗", RED, "ERROR: ", message));
    }

    fn debug(&self, message: &str) {
        if self.debug {
            println!("{}", self.note("·", CYAN, "DEBUG: ", message));
        }
    }

    fn confirm(&self, prompt: &str) -> bool {
        let answer = self.read_line(&format!("{prompt} [y/N] "));
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }

    fn prompt(&self, message: &str) -> String {
        self.read_line(&format!("{message} "))
    }

    fn table(&self, title: &str, headers: &[&str], rows: &[Vec<String>]) {
        print!("{}", render_table(title, headers, rows, self.color));
        let _ = std::io::stdout().flush();
    }
}
