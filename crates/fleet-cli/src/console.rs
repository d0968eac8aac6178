//! CLI console utilities

use colored::*;
use serde::Serialize;

/// Formatted terminal output; switches to JSON on stdout with `--json`
pub struct CliConsole {
    verbose: bool,
    json: bool,
}

impl CliConsole {
    pub const fn new(verbose: bool, json: bool) -> Self {
        Self { verbose, json }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.verbose && !self.json {
            println!("{} {}", "ℹ".blue().bold(), message);
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if !self.json {
            println!("{} {}", "✓".green().bold(), message.green());
        }
    }

    /// Print a warning message
    pub fn warn(&self, message: &str) {
        if !self.json {
            println!("{} {}", "⚠".yellow().bold(), message.yellow());
        }
    }

    /// Print a header
    pub fn print_header(&self, title: &str) {
        if self.json {
            return;
        }
        println!();
        println!("{}", title.bold().underline());
        println!("{}", "=".repeat(title.len()).dimmed());
    }

    /// Print an aligned `key: value` row
    pub fn field(&self, key: &str, value: impl std::fmt::Display) {
        if !self.json {
            println!("  {:<18} {}", format!("{}:", key).dimmed(), value);
        }
    }

    /// Print `value` as pretty JSON when requested, otherwise run `human`
    pub fn render<T: Serialize>(&self, value: &T, human: impl FnOnce(&T)) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            human(value);
        }
        Ok(())
    }
}
