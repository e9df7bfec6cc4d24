// ============================================================================
// src/ui.rs – Console output for the acctdb command line
// ============================================================================

use anyhow::{Context, Result};
use console::Style;
use serde::Serialize;

/// Styled human output, or JSON documents when `json` is set.
/// `quiet` drops everything but errors and requested data.
#[derive(Debug, Clone, Copy, Default)]
pub struct UX {
    pub quiet: bool,
    pub json: bool,
}

impl UX {
    pub fn new(quiet: bool, json: bool) -> Self {
        Self { quiet, json }
    }

    fn chatty(&self) -> bool {
        !self.quiet && !self.json
    }

    pub fn note(&self, msg: &str) {
        if self.chatty() {
            println!("  {}", Style::new().dim().apply_to(msg));
        }
    }

    pub fn success(&self, msg: &str) {
        if self.chatty() {
            println!("{} {msg}", Style::new().green().bold().apply_to("✔"));
        }
    }

    pub fn warn(&self, msg: &str) {
        if !self.json {
            eprintln!("{} {msg}", Style::new().yellow().bold().apply_to("!"));
        }
    }

    pub fn error(&self, msg: &str) {
        eprintln!("{} {msg}", Style::new().red().bold().apply_to("✘"));
    }

    /// Aligned key/value block under a bold title.
    pub fn data_panel(&self, title: &str, rows: &[(&str, String)]) {
        let width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        let key = Style::new().dim();
        println!("{}", Style::new().bold().apply_to(title));
        for (k, v) in rows {
            println!("  {}  {v}", key.apply_to(format!("{k:<width$}")));
        }
    }

    /// One row per line, as printed by the tables themselves.
    pub fn rows<T: std::fmt::Display>(&self, rows: &[T]) {
        for row in rows {
            println!("{row}");
        }
    }

    pub fn emit_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let text = serde_json::to_string_pretty(value).context("serialize JSON output")?;
        println!("{text}");
        Ok(())
    }
}
