//! Terminal output for the CLI.

use console::Style;
use tracing::error;

use edulms_sync_core::outcome::Outcome;
use edulms_sync_core::report::{MessageLevel, Reporter};

/// Shows inline messages on stdout as they are emitted. Error reports are
/// logged; the runner persists them.
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn log_error(&self, title: &str, message: &str) {
        error!(title, "{message}");
    }

    fn message(&self, text: &str, level: MessageLevel) {
        match level {
            MessageLevel::Info => println!("{}", success(text)),
            MessageLevel::Alert => println!("{}", warn(text)),
        }
    }
}

pub fn success(msg: &str) -> String {
    format!("{} {}", Style::new().green().apply_to("✓"), msg)
}

pub fn failure(msg: &str) -> String {
    format!("{} {}", Style::new().red().apply_to("✗"), msg)
}

pub fn warn(msg: &str) -> String {
    format!("{} {}", Style::new().yellow().apply_to("⚠"), msg)
}

pub fn header(msg: &str) -> String {
    Style::new().bold().apply_to(msg).to_string()
}

pub fn dim(msg: &str) -> String {
    Style::new().dim().apply_to(msg).to_string()
}

/// Print what a handler run did, one line per mutation and skipped item.
pub fn print_outcome(outcome: &Outcome) {
    let line = outcome.summary();
    match outcome {
        Outcome::Completed { .. } => println!("{}", success(&line)),
        Outcome::Partial { .. } => println!("{}", warn(&line)),
        Outcome::Aborted { .. } => println!("{}", failure(&line)),
    }

    for mutation in outcome.applied() {
        println!("    {mutation}");
    }
    for skipped in outcome.skipped() {
        println!("    {}", dim(&format!("skipped '{}': unknown course", skipped.item)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_styled_lines_keep_text() {
        assert!(success("done").ends_with("done"));
        assert!(warn("careful").ends_with("careful"));
        assert!(failure("broken").ends_with("broken"));
        assert!(header("Audit").contains("Audit"));
    }
}
