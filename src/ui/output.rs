//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Output is formatted consistently and respects the quiet flag. Results
//! go to stdout; warnings, errors and debug chatter go to stderr so that
//! `repoinit parse` output can be piped.

use std::fmt::Display;

use crate::engine::{ApplyReport, Change};

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print a debug message (only in debug mode).
pub fn debug(message: impl Display, verbosity: Verbosity) {
    if verbosity == Verbosity::Debug {
        eprintln!("[debug] {}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// Format a list of items.
pub fn format_list<T: Display>(items: &[T], prefix: &str) -> String {
    items
        .iter()
        .map(|item| format!("{}{}", prefix, item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One line per operation, e.g. `  created    create service user svc`.
pub fn format_report(report: &ApplyReport) -> String {
    let lines: Vec<String> = report
        .outcomes
        .iter()
        .map(|o| format!("{:<10} {}", o.change.to_string(), o.description))
        .collect();
    format_list(&lines, "  ")
}

/// Closing summary line for an applied batch.
pub fn format_summary(report: &ApplyReport) -> String {
    let count = |change: Change| {
        report
            .outcomes
            .iter()
            .filter(|o| o.change == change)
            .count()
    };
    format!(
        "{} operations: {} created, {} updated, {} removed, {} unchanged",
        report.outcomes.len(),
        count(Change::Created),
        count(Change::Updated),
        count(Change::Removed),
        count(Change::Unchanged)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Outcome;

    #[test]
    fn verbosity_flags() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Debug);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
    }

    #[test]
    fn report_lines() {
        let report = ApplyReport {
            outcomes: vec![
                Outcome {
                    index: 0,
                    description: "create service user svc".into(),
                    change: Change::Created,
                },
                Outcome {
                    index: 1,
                    description: "create path /a".into(),
                    change: Change::Unchanged,
                },
            ],
        };
        let text = format_report(&report);
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with("  created "));
        assert_eq!(
            format_summary(&report),
            "2 operations: 1 created, 0 updated, 0 removed, 1 unchanged"
        );
    }
}
