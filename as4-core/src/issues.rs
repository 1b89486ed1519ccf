//! Accumulated validation findings
//!
//! Validators never stop at the first problem; they append to an
//! [`ErrorList`] owned by the caller, which decides what to do with it.

use crate::signal::Severity;
use serde::Serialize;
use std::fmt;

/// A single validation finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub severity: Severity,
    /// Path of the offending field, e.g. `PMode[p1].Leg1.Security.X509SignatureAlgorithm`
    pub field: String,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.field, self.message)
    }
}

/// Ordered list of findings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorList {
    issues: Vec<Issue>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn failure(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.push(Issue {
            severity: Severity::Failure,
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.push(Issue {
            severity: Severity::Warning,
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn extend(&mut self, other: ErrorList) {
        self.issues.extend(other.issues);
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter()
    }

    pub fn has_failures(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Failure)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Failure)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    pub fn into_vec(self) -> Vec<Issue> {
        self.issues
    }
}

impl IntoIterator for ErrorList {
    type Item = Issue;
    type IntoIter = std::vec::IntoIter<Issue>;

    fn into_iter(self) -> Self::IntoIter {
        self.issues.into_iter()
    }
}
