//! File-level violations and validation reports
//!
//! Architecture: Rich Domain Models - a `Violation` is the report-facing form of a migration
//! diagnostic once it has been tied to a file on disk
//! - Violations know whether they block a build and whether an automated fix exists
//! - ValidationReport is the aggregate root collecting violations across many files
//! - Error types for every layer of the crate live here as well

use crate::syntax::SyntaxError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Severity levels for migration violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational messages and suggestions
    Info,
    /// Advisory findings with an automated remedy, e.g. a missing marker
    Warning,
    /// Findings that break migration ordering, e.g. a malformed version number
    Error,
}

impl Severity {
    /// Whether this severity level should cause validation to fail
    pub fn is_blocking(self) -> bool {
        matches!(self, Self::Error)
    }

    /// Convert to string for display
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A migration rule violation found in a specific file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    /// Diagnostic id of the rule that fired (`FM_Missing`, `FM_Invalid`)
    pub rule_id: String,
    /// Severity level of this violation
    pub severity: Severity,
    /// File path where the violation was found
    pub file_path: PathBuf,
    /// Line number (1-indexed) where the violation occurs
    pub line_number: Option<u32>,
    /// Column number (1-indexed) where the violation starts
    pub column_number: Option<u32>,
    /// Rendered diagnostic message
    pub message: String,
    /// Source line the violation points at
    pub context: Option<String>,
    /// Suggested remedy, present when an automated fix exists
    pub suggested_fix: Option<String>,
    /// Whether `migration-guard fix` can repair this violation
    #[serde(default)]
    pub fixable: bool,
    /// When this violation was detected
    pub detected_at: DateTime<Utc>,
}

impl Violation {
    /// Create a new violation
    pub fn new(
        rule_id: impl Into<String>,
        severity: Severity,
        file_path: PathBuf,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            severity,
            file_path,
            line_number: None,
            column_number: None,
            message: message.into(),
            context: None,
            suggested_fix: None,
            fixable: false,
            detected_at: Utc::now(),
        }
    }

    /// Set line and column position
    pub fn with_position(mut self, line: u32, column: u32) -> Self {
        self.line_number = Some(line);
        self.column_number = Some(column);
        self
    }

    /// Add source code context
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Attach the title of the automated fix that repairs this violation
    pub fn with_fix(mut self, title: impl Into<String>) -> Self {
        self.suggested_fix = Some(title.into());
        self.fixable = true;
        self
    }

    /// Whether this violation is blocking (prevents commits/builds)
    pub fn is_blocking(&self) -> bool {
        self.severity.is_blocking()
    }

    /// Format violation for display
    pub fn format_display(&self) -> String {
        let location = match (self.line_number, self.column_number) {
            (Some(line), Some(col)) => format!(":{line}:{col}"),
            (Some(line), None) => format!(":{line}"),
            _ => String::new(),
        };

        format!(
            "{}{} [{}] {}: {}",
            self.file_path.display(),
            location,
            self.severity,
            self.rule_id,
            self.message
        )
    }
}

/// Summary statistics for a validation report
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationSummary {
    /// Total number of files analyzed
    pub total_files: usize,
    /// Number of violations by severity level
    pub violations_by_severity: ViolationCounts,
    /// Number of violations an automated fix can repair
    pub fixable: usize,
    /// Total execution time in milliseconds
    pub execution_time_ms: u64,
    /// Timestamp when validation was performed
    pub validated_at: DateTime<Utc>,
}

/// Count of violations by severity level
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViolationCounts {
    pub error: usize,
    pub warning: usize,
    pub info: usize,
}

impl ViolationCounts {
    /// Total number of violations across all severities
    pub fn total(&self) -> usize {
        self.error + self.warning + self.info
    }

    /// Whether there are any blocking violations
    pub fn has_blocking(&self) -> bool {
        self.error > 0
    }

    /// Add a violation to the counts
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Error => self.error += 1,
            Severity::Warning => self.warning += 1,
            Severity::Info => self.info += 1,
        }
    }
}

/// Complete validation report containing all violations and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// All violations found during validation
    pub violations: Vec<Violation>,
    /// Summary statistics
    pub summary: ValidationSummary,
    /// Fingerprint of the configuration used for this validation
    pub config_fingerprint: Option<String>,
}

impl ValidationReport {
    /// Create a new empty validation report
    pub fn new() -> Self {
        Self {
            violations: Vec::new(),
            summary: ValidationSummary {
                validated_at: Utc::now(),
                ..Default::default()
            },
            config_fingerprint: None,
        }
    }

    /// Add a violation to the report
    pub fn add_violation(&mut self, violation: Violation) {
        self.summary.violations_by_severity.add(violation.severity);
        if violation.fixable {
            self.summary.fixable += 1;
        }
        self.violations.push(violation);
    }

    /// Whether the report contains any violations
    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    /// Whether the report contains blocking violations (errors)
    pub fn has_errors(&self) -> bool {
        self.summary.violations_by_severity.has_blocking()
    }

    /// Get violations of a specific severity
    pub fn violations_by_severity(&self, severity: Severity) -> impl Iterator<Item = &Violation> {
        self.violations
            .iter()
            .filter(move |v| v.severity == severity)
    }

    /// Get violations raised by one rule
    pub fn violations_for_rule<'a>(&'a self, rule_id: &'a str) -> impl Iterator<Item = &'a Violation> {
        self.violations.iter().filter(move |v| v.rule_id == rule_id)
    }

    /// Set the number of files analyzed
    pub fn set_files_analyzed(&mut self, count: usize) {
        self.summary.total_files = count;
    }

    /// Set the execution time
    pub fn set_execution_time(&mut self, duration_ms: u64) {
        self.summary.execution_time_ms = duration_ms;
    }

    /// Set the configuration fingerprint
    pub fn set_config_fingerprint(&mut self, fingerprint: impl Into<String>) {
        self.config_fingerprint = Some(fingerprint.into());
    }

    /// Merge another report into this one
    pub fn merge(&mut self, other: ValidationReport) {
        for violation in other.violations {
            self.add_violation(violation);
        }
        self.summary.total_files += other.summary.total_files;
    }

    /// Sort violations by file path and position for consistent output
    pub fn sort_violations(&mut self) {
        self.violations.sort_by(|a, b| {
            a.file_path
                .cmp(&b.file_path)
                .then_with(|| a.line_number.unwrap_or(0).cmp(&b.line_number.unwrap_or(0)))
                .then_with(|| a.column_number.unwrap_or(0).cmp(&b.column_number.unwrap_or(0)))
                .then_with(|| a.rule_id.cmp(&b.rule_id))
        });
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Error types that can occur while checking or fixing migrations
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    /// Configuration file could not be loaded or parsed
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// File could not be read or accessed
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// A path filter pattern failed to compile
    #[error("Pattern error: {message}")]
    Pattern { message: String },

    /// Analysis failed for a specific file
    #[error("Analysis error in {file}: {message}")]
    Analysis { file: String, message: String },

    /// Source text could not be turned into a syntax tree
    #[error("Syntax error: {source}")]
    Syntax {
        #[from]
        source: SyntaxError,
    },

    /// An automated fix could not be applied
    #[error("Fix error in {file}: {message}")]
    Fix { file: String, message: String },

    /// Validation operation failed
    #[error("Validation error: {message}")]
    Validation { message: String },
}

impl GuardError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a pattern error
    pub fn pattern(message: impl Into<String>) -> Self {
        Self::Pattern {
            message: message.into(),
        }
    }

    /// Create an analysis error
    pub fn analysis(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Analysis {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Create a fix error
    pub fn fix(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fix {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Result type for migration-guard operations
pub type GuardResult<T> = Result<T, GuardError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_violation_creation() {
        let violation = Violation::new(
            "FM_Invalid",
            Severity::Error,
            PathBuf::from("Migrations/AddUsers.cs"),
            "The migration number abc should be yyyyMMddHHmm",
        );

        assert_eq!(violation.rule_id, "FM_Invalid");
        assert_eq!(violation.severity, Severity::Error);
        assert_eq!(violation.file_path, Path::new("Migrations/AddUsers.cs"));
        assert!(violation.is_blocking());
        assert!(!violation.fixable);
    }

    #[test]
    fn test_violation_with_fix() {
        let violation = Violation::new(
            "FM_Missing",
            Severity::Warning,
            PathBuf::from("Migrations/AddUsers.cs"),
            "The migration attribute is missing",
        )
        .with_position(7, 5)
        .with_context("public class AddUsers : Migration")
        .with_fix("Generate Migration Number");

        assert_eq!(violation.line_number, Some(7));
        assert_eq!(violation.column_number, Some(5));
        assert!(violation.fixable);
        assert_eq!(violation.suggested_fix.as_deref(), Some("Generate Migration Number"));
        assert!(!violation.is_blocking());
        assert_eq!(
            violation.format_display(),
            "Migrations/AddUsers.cs:7:5 [warning] FM_Missing: The migration attribute is missing"
        );
    }

    #[test]
    fn test_validation_report() {
        let mut report = ValidationReport::new();

        report.add_violation(Violation::new(
            "FM_Invalid",
            Severity::Error,
            PathBuf::from("b.cs"),
            "Error message",
        ));
        report.add_violation(
            Violation::new("FM_Missing", Severity::Warning, PathBuf::from("a.cs"), "Missing")
                .with_fix("Generate Migration Number"),
        );

        assert!(report.has_violations());
        assert!(report.has_errors());
        assert_eq!(report.summary.violations_by_severity.total(), 2);
        assert_eq!(report.summary.violations_by_severity.error, 1);
        assert_eq!(report.summary.violations_by_severity.warning, 1);
        assert_eq!(report.summary.fixable, 1);
        assert_eq!(report.violations_for_rule("FM_Missing").count(), 1);

        report.sort_violations();
        assert_eq!(report.violations[0].file_path, Path::new("a.cs"));
    }

    #[test]
    fn test_report_merge() {
        let mut first = ValidationReport::new();
        first.set_files_analyzed(2);
        let mut second = ValidationReport::new();
        second.set_files_analyzed(3);
        second.add_violation(Violation::new(
            "FM_Missing",
            Severity::Warning,
            PathBuf::from("c.cs"),
            "Missing",
        ));

        first.merge(second);

        assert_eq!(first.summary.total_files, 5);
        assert_eq!(first.violations.len(), 1);
        assert!(!first.has_errors());
    }
}
