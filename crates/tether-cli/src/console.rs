//! CLI console utilities

use colored::*;
use std::io::{self, Write};
use tether_core::{
    PermissionDecision, PermissionRequest, StateChange, StreamingStats, ToolCall, ToolStatus,
};

/// Which stream the last delta came from, so sections get a label once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Thinking,
    Content,
}

/// CLI console for formatted output
pub struct CliConsole {
    verbose: bool,
    section: parking_lot::Mutex<Section>,
}

impl CliConsole {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            section: parking_lot::Mutex::new(Section::None),
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.verbose {
            self.break_line();
            println!("{} {}", "ℹ".blue().bold(), message);
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        self.break_line();
        println!("{} {}", "✓".green().bold(), message.green());
    }

    /// Print a warning message
    pub fn warn(&self, message: &str) {
        self.break_line();
        println!("{} {}", "⚠".yellow().bold(), message.yellow());
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        self.break_line();
        eprintln!("{} {}", "✗".red().bold(), message.red());
    }

    pub fn thinking(&self, delta: &str) {
        self.enter(Section::Thinking, "thinking".dimmed().italic());
        print!("{}", delta.dimmed());
        flush();
    }

    pub fn content(&self, delta: &str) {
        self.enter(Section::Content, "response".bold());
        print!("{}", delta);
        flush();
    }

    pub fn state(&self, change: &StateChange) {
        if !self.verbose {
            return;
        }
        self.break_line();
        let line = format!("{} → {}", change.from, change.to);
        match &change.message {
            Some(message) => println!("{} {} ({})", "•".blue(), line.dimmed(), message),
            None => println!("{} {}", "•".blue(), line.dimmed()),
        }
    }

    pub fn tool(&self, call: &ToolCall) {
        self.break_line();
        let status = match call.status {
            ToolStatus::Pending => "pending".dimmed(),
            ToolStatus::Running => "running".cyan(),
            ToolStatus::Completed => "completed".green(),
            ToolStatus::Error => "error".red(),
        };
        let mut line = format!("{} {} [{}]", "⚙".cyan().bold(), call.name.bold(), status);
        if let Some(duration) = call.duration() {
            line.push_str(&format!(" {}ms", duration.as_millis()));
        }
        println!("{}", line);
        if self.verbose {
            if let Some(result) = &call.result {
                println!("  {}", result.dimmed());
            }
        }
        if let Some(error) = &call.error {
            println!("  {}", error.red());
        }
    }

    /// Show a permission request, with the answer when one was given
    pub fn permission(&self, request: &PermissionRequest, decision: Option<PermissionDecision>) {
        self.break_line();
        let verdict = match decision {
            Some(PermissionDecision::Granted) => "granted".green(),
            Some(PermissionDecision::Denied) => "denied".red(),
            None => "pending".yellow(),
        };
        println!(
            "{} {} wants to {} {} [{}]",
            "?".magenta().bold(),
            request.tool_name.bold(),
            request.action,
            request.path,
            verdict
        );
        if !request.description.is_empty() {
            println!("  {}", request.description.dimmed());
        }
    }

    pub fn print_stats(&self, stats: &StreamingStats) {
        self.break_line();
        println!("{}", "-".repeat(50).dimmed());
        println!(
            "{} messages, {} events, {} tools, {} permission requests",
            stats.messages_sent,
            stats.events_received,
            stats.tools_executed,
            stats.permissions_requested
        );
        if stats.duplicates_skipped > 0 {
            println!("{} replayed events skipped", stats.duplicates_skipped);
        }
        if stats.total_processing_time_ms > 0 {
            println!("processing time: {}ms", stats.total_processing_time_ms);
        }
    }

    fn enter(&self, section: Section, label: ColoredString) {
        let mut current = self.section.lock();
        if *current != section {
            if *current != Section::None {
                println!();
            }
            println!("{}", label);
            *current = section;
        }
    }

    /// End a streamed section before printing a full line
    fn break_line(&self) {
        let mut current = self.section.lock();
        if *current != Section::None {
            println!();
            *current = Section::None;
        }
    }
}

fn flush() {
    let _ = io::stdout().flush();
}
