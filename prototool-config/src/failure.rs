use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

/// Severity of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A single diagnostic tied to a source location.
///
/// Failures are values, not errors: lint, format, break, and compile all
/// report their findings as sorted failure lists and leave flow control to
/// the dispatcher.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub path: String,
    pub line: u32,
    pub column: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    pub message: String,
    pub severity: Severity,
}

impl Failure {
    pub fn new(
        path: impl Into<String>,
        line: u32,
        column: u32,
        message: impl Into<String>,
    ) -> Failure {
        Failure {
            path: path.into(),
            line,
            column,
            rule_id: None,
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn with_rule(mut self, rule_id: impl Into<String>) -> Failure {
        self.rule_id = Some(rule_id.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Failure {
        self.severity = severity;
        self
    }

    /// Stable sort key: (path, line, column, rule_id, message).
    fn sort_key(&self) -> (&str, u32, u32, Option<&str>, &str) {
        (
            &self.path,
            self.line,
            self.column,
            self.rule_id.as_deref(),
            &self.message,
        )
    }

    /// Sorts and deduplicates failures in place under the stable key.
    pub fn sort(failures: &mut Vec<Failure>) {
        failures.sort();
        failures.dedup();
    }
}

impl PartialOrd for Failure {
    fn partial_cmp(&self, other: &Failure) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Failure {
    fn cmp(&self, other: &Failure) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rule_id {
            Some(id) => write!(
                f,
                "{}:{}:{}:{}: {}",
                self.path, self.line, self.column, id, self.message
            ),
            None => write!(f, "{}:{}:{}: {}", self.path, self.line, self.column, self.message),
        }
    }
}
