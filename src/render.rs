//! Terminal output.
//!
//! Status lines go to stderr so stdout carries only the enhanced prompt and
//! the listings the user asked for.

use crate::history::HistoryEntry;
use crossterm::style::Stylize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::time::Duration;

/// Turn off ANSI styling when stdout is not a terminal.
pub fn init() {
    if !atty::is(atty::Stream::Stdout) {
        crossterm::style::force_color_output(false);
    }
}

pub fn success(message: &str) {
    eprintln!("{} {}", "✔".green(), message);
}

pub fn warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow(), message);
}

pub fn error(message: &str) {
    eprintln!("{} {}", "✖ Error:".red().bold(), message.red());
}

pub fn info(message: &str) {
    eprintln!("{}", message.blue().bold());
}

/// A titled block with a rule above and below.
pub fn panel(title: &str, body: &str) {
    let width = title.chars().count() + 8;
    println!("{}", format!("── {} ──", title).bold());
    println!("{}", body.trim_end());
    println!("{}", "─".repeat(width).dark_grey());
}

/// Two-column table of model names.
pub fn models_table(models: &[String]) {
    if models.is_empty() {
        warning("No Ollama models found. Download one with: enhance --download-model <name>");
        return;
    }
    println!("{}", "Available Ollama Models".bold());
    for (i, model) in models.iter().enumerate() {
        println!("  {:>2}. {}", i + 1, model.as_str().cyan());
    }
}

/// Property table for one history entry.
pub fn history_details(entry: &HistoryEntry) {
    let rows = [
        ("Date", entry.timestamp.format("%Y-%m-%d %H:%M").to_string()),
        ("Original Prompt", entry.result.original_prompt.clone()),
        ("Enhanced Prompt", entry.result.enhanced_prompt.clone()),
        ("Style", entry.result.style.to_string()),
        ("Model", entry.result.model_name.clone()),
    ];
    println!("{}", "History Details".bold().green());
    for (property, value) in rows {
        let mut lines = value.lines();
        let label = format!("{:<16}", property);
        println!("{} {}", label.cyan(), lines.next().unwrap_or("").magenta());
        for line in lines {
            println!("{:<16} {}", "", line.magenta());
        }
    }
}

/// Colored unified diff.
pub fn diff(lines: &[String]) {
    if lines.is_empty() {
        info("No differences between the original and enhanced prompt.");
        return;
    }
    println!("\n{}", "↔ Diff View".yellow().bold());
    for line in lines {
        if line.starts_with("+++") || line.starts_with("---") {
            println!("{}", line.as_str().bold());
        } else if line.starts_with('+') {
            println!("{}", line.as_str().green());
        } else if line.starts_with('-') {
            println!("{}", line.as_str().red());
        } else if line.starts_with('@') {
            println!("{}", line.as_str().dark_grey());
        } else {
            println!("{}", line);
        }
    }
}

/// Ticking spinner on stderr.
pub fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Shows a spinner until the first fragment arrives, then echoes fragments
/// as they stream in.
pub struct StreamPrinter {
    spinner: Option<ProgressBar>,
    header: String,
    printed: bool,
}

impl StreamPrinter {
    pub fn start(message: &str, header: &str) -> Self {
        Self {
            spinner: Some(spinner(message)),
            header: header.to_string(),
            printed: false,
        }
    }

    pub fn fragment(&mut self, text: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
            println!("\n{}", self.header.as_str().magenta().bold());
        }
        print!("{}", text);
        let _ = io::stdout().flush();
        self.printed = true;
    }

    /// End the stream display.
    pub fn finish(mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
        if self.printed {
            println!("\n");
        }
    }
}

impl Drop for StreamPrinter {
    fn drop(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

/// Progress bar for model pulls.
pub fn pull_progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} {msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({eta})")
    {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}
