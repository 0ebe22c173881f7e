//! Migration Guard - static checks and automated fixes for versioned database migrations
//!
//! Architecture: Clean Architecture - Library interface serves as the application layer
//! - Pure domain logic (rules, timestamps, diagnostics) separated from infrastructure concerns
//! - The syntax model, walker and fix synthesizer form the analysis core
//! - `MigrationGuard` offers validate and fix workflows over files and directories

pub mod analyzer;
pub mod config;
pub mod domain;
pub mod fix;
pub mod report;
pub mod rules;
pub mod syntax;

// Re-export main types for convenient access
pub use domain::violations::{
    GuardError, GuardResult, Severity, ValidationReport, ValidationSummary, Violation,
};
pub use domain::{Clock, Diagnostic, DiagnosticKind, FixedClock, SystemClock, TimestampToken};

pub use config::{ConfigBuilder, GuardConfig};

pub use analyzer::{analyze, AnalysisOptions, Analyzer, RuleStats};

pub use fix::{fix, BatchFix, FixError, FixSynthesizer};

pub use report::{OutputFormat, ReportFormatter, ReportOptions};

pub use rules::RuleSet;

pub use syntax::{parse, SyntaxTree};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Main entry point providing high-level validate and fix operations
pub struct MigrationGuard {
    analyzer: Analyzer,
    synthesizer: FixSynthesizer,
    report_formatter: ReportFormatter,
}

/// Options for validation workflows
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Output format for results
    pub output_format: OutputFormat,
    /// Report options
    pub report_options: ReportOptions,
    /// Analysis options
    pub analysis_options: AnalysisOptions,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Human,
            report_options: ReportOptions::default(),
            analysis_options: AnalysisOptions::default(),
        }
    }
}

/// Options for fix workflows
#[derive(Debug, Clone, Default)]
pub struct FixOptions {
    /// Compute fixes without writing files
    pub dry_run: bool,
    /// File selection, shared with validation
    pub analysis_options: AnalysisOptions,
}

/// Outcome of fixing one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFix {
    pub file_path: PathBuf,
    /// Number of `[Migration]` markers generated
    pub markers_added: usize,
    /// Diagnostics whose fix could not be applied, rendered for display
    pub failures: Vec<String>,
    /// Whether the fixed source was written back
    pub written: bool,
}

impl FileFix {
    fn unchanged(file_path: &Path) -> Self {
        Self {
            file_path: file_path.to_path_buf(),
            markers_added: 0,
            failures: Vec::new(),
            written: false,
        }
    }

    pub fn is_changed(&self) -> bool {
        self.markers_added > 0
    }
}

impl MigrationGuard {
    /// Create a guard with the given configuration
    pub fn new_with_config(config: GuardConfig) -> GuardResult<Self> {
        let analyzer = Analyzer::new(config)?;

        Ok(Self {
            analyzer,
            synthesizer: FixSynthesizer::new(),
            report_formatter: ReportFormatter::default(),
        })
    }

    /// Create a guard with default configuration
    pub fn new() -> GuardResult<Self> {
        Self::new_with_config(GuardConfig::default())
    }

    /// Create a guard loading configuration from file
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> GuardResult<Self> {
        let config = GuardConfig::load_from_file(path)?;
        Self::new_with_config(config)
    }

    /// Use `clock` for generated migration numbers
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.synthesizer = FixSynthesizer::with_clock(clock);
        self
    }

    /// Set custom report formatter
    pub fn with_report_formatter(mut self, formatter: ReportFormatter) -> Self {
        self.report_formatter = formatter;
        self
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    /// Validate files and directories with default options
    pub async fn validate<P: AsRef<Path>>(&self, paths: Vec<P>) -> GuardResult<ValidationReport> {
        self.validate_with_options(paths, &ValidationOptions::default())
            .await
    }

    /// Validate files with custom options
    pub async fn validate_with_options<P: AsRef<Path>>(
        &self,
        paths: Vec<P>,
        options: &ValidationOptions,
    ) -> GuardResult<ValidationReport> {
        let paths: Vec<PathBuf> = paths.iter().map(|p| p.as_ref().to_path_buf()).collect();
        self.analyzer
            .analyze_paths(&paths, &options.analysis_options)
    }

    /// Validate a single file
    pub fn validate_file<P: AsRef<Path>>(&self, file_path: P) -> GuardResult<ValidationReport> {
        let violations = self.analyzer.analyze_file(file_path)?;

        let mut report = ValidationReport::new();
        for violation in violations {
            report.add_violation(violation);
        }
        report.set_files_analyzed(1);
        report.set_config_fingerprint(self.analyzer.config_fingerprint());

        Ok(report)
    }

    /// Validate entire directory tree
    pub fn validate_directory<P: AsRef<Path>>(
        &self,
        root: P,
        options: &AnalysisOptions,
    ) -> GuardResult<ValidationReport> {
        self.analyzer.analyze_directory(root, options)
    }

    /// Generate migration numbers for every unmarked migration class in one file
    pub fn fix_file<P: AsRef<Path>>(&self, file_path: P, dry_run: bool) -> GuardResult<FileFix> {
        let file_path = file_path.as_ref();
        let content = fs::read_to_string(file_path)?;

        let Some((tree, diagnostics)) = self.analyzer.csharp().diagnose(&content) else {
            debug!("Skipping {}: not parseable as C#", file_path.display());
            return Ok(FileFix::unchanged(file_path));
        };

        let batch = self.synthesizer.fix_all(&tree, &diagnostics);
        let failures: Vec<String> = batch
            .failures
            .iter()
            .map(|failure| {
                let location = failure.diagnostic.location;
                format!("{}:{}: {}", location.line, location.column, failure.error)
            })
            .collect();
        for failure in &failures {
            warn!("Could not fix {}:{}", file_path.display(), failure);
        }

        let mut result = FileFix {
            file_path: file_path.to_path_buf(),
            markers_added: batch.edits.len(),
            failures,
            written: false,
        };

        if batch.is_changed() && !dry_run {
            fs::write(file_path, &batch.source).map_err(|e| {
                GuardError::fix(
                    file_path.display().to_string(),
                    format!("Failed to write fixed source: {e}"),
                )
            })?;
            result.written = true;
            info!(
                "Added {} migration number{} to {}",
                result.markers_added,
                if result.markers_added == 1 { "" } else { "s" },
                file_path.display()
            );
        }

        Ok(result)
    }

    /// Fix every C# file under `paths`, returning only the files with something to report
    pub fn fix_paths<P: AsRef<Path>>(
        &self,
        paths: &[P],
        options: &FixOptions,
    ) -> GuardResult<Vec<FileFix>> {
        let files = self.analyzer.collect_files(paths, &options.analysis_options)?;
        let mut results = Vec::new();

        for file_path in files {
            let result = match self.fix_file(&file_path, options.dry_run) {
                Ok(result) => result,
                Err(e) => {
                    if options.analysis_options.fail_fast {
                        return Err(e);
                    }
                    warn!("Failed to fix {}: {}", file_path.display(), e);
                    continue;
                }
            };
            if result.is_changed() || !result.failures.is_empty() {
                results.push(result);
            }
        }

        Ok(results)
    }

    /// Format a validation report for output
    pub fn format_report(&self, report: &ValidationReport, format: OutputFormat) -> GuardResult<String> {
        self.report_formatter.format_report(report, format)
    }

    /// Get statistics about the configured rules
    pub fn rule_statistics(&self) -> RuleStats {
        self.analyzer.rule_stats()
    }
}

/// Convenience function to create a guard with default settings
pub fn create_guard() -> GuardResult<MigrationGuard> {
    MigrationGuard::new()
}

/// Convenience function to validate files with default settings
pub async fn validate_files<P: AsRef<Path>>(files: Vec<P>) -> GuardResult<ValidationReport> {
    let guard = MigrationGuard::new()?;
    guard.validate(files).await
}

/// Convenience function to validate a directory with default settings
pub fn validate_directory<P: AsRef<Path>>(directory: P) -> GuardResult<ValidationReport> {
    let guard = MigrationGuard::new()?;
    guard.validate_directory(directory, &AnalysisOptions::default())
}
