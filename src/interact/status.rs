//! Short status lines shown to the operator

use std::sync::Mutex;

use colored::Colorize;

/// Sink for one-line progress and failure messages.
pub trait StatusReporter: Send + Sync {
    /// Reports progress, e.g. `MFA verified!`.
    fn success(&self, message: &str);

    /// Reports a failure.
    fn failure(&self, message: &str);
}

/// Prints green success lines to stdout and red failure lines to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalReporter;

impl StatusReporter for TerminalReporter {
    fn success(&self, message: &str) {
        println!("{}", message.green());
    }

    fn failure(&self, message: &str) {
        eprintln!("{}", message.red());
    }
}

/// A reported line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Success line
    Success(String),
    /// Failure line
    Failure(String),
}

/// Keeps reported lines in memory.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    lines: Mutex<Vec<Line>>,
}

impl RecordingReporter {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines reported so far.
    pub fn lines(&self) -> Vec<Line> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Success messages reported so far.
    pub fn successes(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|l| match l {
                Line::Success(m) => Some(m),
                Line::Failure(_) => None,
            })
            .collect()
    }

    fn push(&self, line: Line) {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(line);
    }
}

impl StatusReporter for RecordingReporter {
    fn success(&self, message: &str) {
        self.push(Line::Success(message.to_string()));
    }

    fn failure(&self, message: &str) {
        self.push(Line::Failure(message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_reporter_keeps_order() {
        let reporter = RecordingReporter::new();
        reporter.success("MFA challenge sent!");
        reporter.failure("MFA rejected!");
        reporter.success("MFA verified!");

        assert_eq!(
            reporter.lines(),
            vec![
                Line::Success("MFA challenge sent!".to_string()),
                Line::Failure("MFA rejected!".to_string()),
                Line::Success("MFA verified!".to_string()),
            ]
        );
        assert_eq!(
            reporter.successes(),
            vec!["MFA challenge sent!", "MFA verified!"]
        );
    }
}
