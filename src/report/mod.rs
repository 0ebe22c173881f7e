//! Report generation with multiple output formats
//!
//! CDD Principle: Anti-Corruption Layer - Formatters translate domain objects to external formats
//! - ValidationReport (domain) is converted to various external representations
//! - Each formatter encapsulates the rules for its specific output format
//! - Rule metadata for SARIF comes from the diagnostic descriptors

use crate::domain::violations::{GuardError, GuardResult, Severity, ValidationReport, Violation};
use crate::domain::DiagnosticKind;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

const TOOL_NAME: &str = "migration-guard";

/// Supported output formats for validation reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable format with colors and context
    Human,
    /// JSON format for programmatic consumption
    Json,
    /// JUnit XML format for CI/CD integration
    Junit,
    /// SARIF format for code scanning tools
    Sarif,
    /// GitHub Actions format for workflow annotations
    GitHub,
}

impl OutputFormat {
    /// Get all available format names
    pub fn all_formats() -> &'static [&'static str] {
        &["human", "json", "junit", "sarif", "github"]
    }
}

impl FromStr for OutputFormat {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            "junit" => Ok(Self::Junit),
            "sarif" => Ok(Self::Sarif),
            "github" => Ok(Self::GitHub),
            other => Err(GuardError::validation(format!(
                "Unknown output format '{other}'. Available: {}",
                Self::all_formats().join(", ")
            ))),
        }
    }
}

/// Options for customizing report output
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Whether to use colored output (for human format)
    pub use_colors: bool,
    /// Whether to show the offending source line
    pub show_context: bool,
    /// Whether to show available fixes
    pub show_suggestions: bool,
    /// Maximum number of violations to include
    pub max_violations: Option<usize>,
    /// Minimum severity level to include
    pub min_severity: Option<Severity>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            use_colors: true,
            show_context: true,
            show_suggestions: true,
            max_violations: None,
            min_severity: None,
        }
    }
}

/// Main report formatter that dispatches to specific formatters
#[derive(Debug, Clone, Default)]
pub struct ReportFormatter {
    options: ReportOptions,
}

impl ReportFormatter {
    /// Create a new report formatter with options
    pub fn new(options: ReportOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ReportOptions {
        &self.options
    }

    /// Format a validation report in the specified format
    pub fn format_report(&self, report: &ValidationReport, format: OutputFormat) -> GuardResult<String> {
        let filtered_violations = self.filter_violations(&report.violations);

        match format {
            OutputFormat::Human => Ok(self.format_human(report, &filtered_violations)),
            OutputFormat::Json => self.format_json(report, &filtered_violations),
            OutputFormat::Junit => Ok(self.format_junit(report, &filtered_violations)),
            OutputFormat::Sarif => self.format_sarif(&filtered_violations),
            OutputFormat::GitHub => Ok(self.format_github(&filtered_violations)),
        }
    }

    /// Write a formatted report to a writer
    pub fn write_report<W: Write>(
        &self,
        report: &ValidationReport,
        format: OutputFormat,
        mut writer: W,
    ) -> GuardResult<()> {
        let formatted = self.format_report(report, format)?;
        writer.write_all(formatted.as_bytes())?;
        Ok(())
    }

    /// Filter violations based on report options
    fn filter_violations<'a>(&self, violations: &'a [Violation]) -> Vec<&'a Violation> {
        let mut filtered: Vec<&Violation> = violations
            .iter()
            .filter(|v| self.options.min_severity.map_or(true, |min| v.severity >= min))
            .collect();

        if let Some(max) = self.options.max_violations {
            filtered.truncate(max);
        }

        filtered
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.options.use_colors {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    /// Format report in human-readable format
    fn format_human(&self, report: &ValidationReport, violations: &[&Violation]) -> String {
        let mut output = String::new();

        if violations.is_empty() {
            output.push_str(&format!("✅ {}\n", self.paint("32", "No migration violations found")));
        } else {
            let (icon, color) = if report.has_errors() { ("❌", "31") } else { ("⚠️", "33") };
            output.push_str(&format!("{icon} {}\n\n", self.paint(color, "Migration Violations Found")));

            // Group violations by file
            let mut by_file: BTreeMap<&Path, Vec<&Violation>> = BTreeMap::new();
            for violation in violations {
                by_file.entry(&violation.file_path).or_default().push(violation);
            }

            for (file_path, file_violations) in by_file {
                output.push_str(&format!("📁 {}\n", file_path.display()));

                for violation in file_violations {
                    let severity_color = match violation.severity {
                        Severity::Error => "31",
                        Severity::Warning => "33",
                        Severity::Info => "36",
                    };

                    let position = match (violation.line_number, violation.column_number) {
                        (Some(line), Some(col)) => format!("{line}:{col}"),
                        (Some(line), None) => line.to_string(),
                        _ => "?".to_string(),
                    };

                    output.push_str(&format!(
                        "  {} [{}] {}\n",
                        self.paint("2", &format!("{position}:{}", violation.rule_id)),
                        self.paint(severity_color, violation.severity.as_str()),
                        violation.message
                    ));

                    if self.options.show_context {
                        if let Some(context) = &violation.context {
                            output.push_str(&format!("    {}\n", self.paint("2", &format!("│ {context}"))));
                        }
                    }

                    if self.options.show_suggestions {
                        if let Some(suggestion) = &violation.suggested_fix {
                            let hint = format!("💡 {suggestion} (run `{TOOL_NAME} fix`)");
                            output.push_str(&format!("    {}\n", self.paint("32", &hint)));
                        }
                    }

                    output.push('\n');
                }
            }
        }

        output.push_str(&self.format_summary(report));
        output
    }

    /// Format report in JSON format
    fn format_json(&self, report: &ValidationReport, violations: &[&Violation]) -> GuardResult<String> {
        let json_violations: Vec<JsonValue> = violations
            .iter()
            .map(|v| {
                serde_json::json!({
                    "rule_id": v.rule_id,
                    "severity": v.severity.as_str(),
                    "file_path": v.file_path.display().to_string(),
                    "line_number": v.line_number,
                    "column_number": v.column_number,
                    "message": v.message,
                    "context": v.context,
                    "suggested_fix": v.suggested_fix,
                    "fixable": v.fixable,
                    "detected_at": v.detected_at.to_rfc3339()
                })
            })
            .collect();

        let json_report = serde_json::json!({
            "violations": json_violations,
            "summary": {
                "total_files": report.summary.total_files,
                "violations_by_severity": {
                    "error": report.summary.violations_by_severity.error,
                    "warning": report.summary.violations_by_severity.warning,
                    "info": report.summary.violations_by_severity.info
                },
                "fixable": report.summary.fixable,
                "execution_time_ms": report.summary.execution_time_ms,
                "validated_at": report.summary.validated_at.to_rfc3339()
            },
            "config_fingerprint": report.config_fingerprint
        });

        serde_json::to_string_pretty(&json_report)
            .map_err(|e| GuardError::config(format!("JSON serialization failed: {e}")))
    }

    /// Format report in JUnit XML format
    fn format_junit(&self, report: &ValidationReport, violations: &[&Violation]) -> String {
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");

        let failures = violations.iter().filter(|v| v.is_blocking()).count();
        let execution_time = (report.summary.execution_time_ms as f64) / 1000.0;

        xml.push_str(&format!(
            "<testsuite name=\"{TOOL_NAME}\" tests=\"{}\" failures=\"{failures}\" errors=\"0\" time=\"{execution_time:.3}\">\n",
            violations.len()
        ));

        for violation in violations {
            xml.push_str(&format!(
                "  <testcase classname=\"{}\" name=\"{}\">\n",
                violation.rule_id,
                escape_xml(&violation.file_path.display().to_string())
            ));

            if violation.is_blocking() {
                xml.push_str(&format!(
                    "    <failure message=\"{}\">\n",
                    escape_xml(&violation.message)
                ));
                xml.push_str(&format!(
                    "      File: {}:{}:{}\n",
                    escape_xml(&violation.file_path.display().to_string()),
                    violation.line_number.unwrap_or(0),
                    violation.column_number.unwrap_or(0)
                ));
                if let Some(context) = &violation.context {
                    xml.push_str(&format!("      Context: {}\n", escape_xml(context)));
                }
                xml.push_str("    </failure>\n");
            }

            xml.push_str("  </testcase>\n");
        }

        xml.push_str("</testsuite>\n");
        xml
    }

    /// Format report in SARIF format
    fn format_sarif(&self, violations: &[&Violation]) -> GuardResult<String> {
        let rules: Vec<JsonValue> = DiagnosticKind::ALL
            .iter()
            .map(|kind| {
                let descriptor = kind.descriptor();
                serde_json::json!({
                    "id": descriptor.id,
                    "name": descriptor.title,
                    "shortDescription": { "text": descriptor.title },
                    "fullDescription": { "text": descriptor.description },
                    "defaultConfiguration": { "level": sarif_level(descriptor.default_severity) },
                    "properties": { "category": descriptor.category }
                })
            })
            .collect();

        let sarif_results: Vec<JsonValue> = violations
            .iter()
            .map(|v| {
                serde_json::json!({
                    "ruleId": v.rule_id,
                    "level": sarif_level(v.severity),
                    "message": {
                        "text": v.message
                    },
                    "locations": [{
                        "physicalLocation": {
                            "artifactLocation": {
                                "uri": v.file_path.display().to_string()
                            },
                            "region": {
                                "startLine": v.line_number.unwrap_or(1),
                                "startColumn": v.column_number.unwrap_or(1)
                            },
                            "contextRegion": v.context.as_ref().map(|c| serde_json::json!({
                                "snippet": {
                                    "text": c
                                }
                            }))
                        }
                    }]
                })
            })
            .collect();

        let sarif_report = serde_json::json!({
            "version": "2.1.0",
            "$schema": "https://json.schemastore.org/sarif-2.1.0.json",
            "runs": [{
                "tool": {
                    "driver": {
                        "name": TOOL_NAME,
                        "version": env!("CARGO_PKG_VERSION"),
                        "rules": rules
                    }
                },
                "results": sarif_results
            }]
        });

        serde_json::to_string_pretty(&sarif_report)
            .map_err(|e| GuardError::config(format!("SARIF serialization failed: {e}")))
    }

    /// Format report for GitHub Actions
    fn format_github(&self, violations: &[&Violation]) -> String {
        let mut output = String::new();

        for violation in violations {
            let level = match violation.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
                Severity::Info => "notice",
            };

            let position = match (violation.line_number, violation.column_number) {
                (Some(line), Some(col)) => format!(",line={line},col={col}"),
                (Some(line), None) => format!(",line={line}"),
                _ => String::new(),
            };

            output.push_str(&format!(
                "::{level} file={}{position},title={}::{}\n",
                violation.file_path.display(),
                violation.rule_id,
                violation.message
            ));
        }

        output
    }

    /// Format the summary section
    fn format_summary(&self, report: &ValidationReport) -> String {
        let counts = &report.summary.violations_by_severity;
        let execution_time = (report.summary.execution_time_ms as f64) / 1000.0;
        let mut summary = format!("📊 {} ", self.paint("1", "Summary:"));

        if counts.total() == 0 {
            summary.push_str(&format!(
                "{} in {} files ({:.1}s)\n",
                self.paint("32", "0 violations"),
                report.summary.total_files,
                execution_time
            ));
            return summary;
        }

        let plural = |n: usize| if n == 1 { "" } else { "s" };
        let mut parts = Vec::new();
        if counts.error > 0 {
            parts.push(self.paint("31", &format!("{} error{}", counts.error, plural(counts.error))));
        }
        if counts.warning > 0 {
            parts.push(self.paint("33", &format!("{} warning{}", counts.warning, plural(counts.warning))));
        }
        if counts.info > 0 {
            parts.push(self.paint("36", &format!("{} info", counts.info)));
        }

        summary.push_str(&format!(
            "{} in {} files ({:.1}s)\n",
            parts.join(", "),
            report.summary.total_files,
            execution_time
        ));
        if report.summary.fixable > 0 {
            summary.push_str(&format!(
                "   {} fixable with `{TOOL_NAME} fix`\n",
                report.summary.fixable
            ));
        }

        summary
    }
}

fn sarif_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info => "note",
    }
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
