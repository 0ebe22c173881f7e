//! Main analysis orchestrator for migration-guard
//!
//! CDD Principle: Domain Services - Analyzer orchestrates validation workflows
//! - Coordinates path filtering, C# parsing, rule dispatch and result aggregation
//! - Provides clean interface for validating single files or directory trees
//! - Handles parallel processing and error recovery gracefully

pub mod csharp;
pub mod path_filter;
pub mod walker;

pub use csharp::CSharpAnalyzer;
pub use path_filter::PathFilter;
pub use walker::{analyze, Walker};

use crate::config::GuardConfig;
use crate::domain::violations::{GuardError, GuardResult, ValidationReport, Violation};
use crate::domain::DiagnosticKind;
use crate::rules::RuleSet;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Main analyzer that orchestrates the entire validation process
pub struct Analyzer {
    /// Configuration for this analysis
    config: GuardConfig,
    /// Path filter for determining which files to analyze
    path_filter: PathFilter,
    /// C#-specific analyzer running the configured rules
    csharp_analyzer: CSharpAnalyzer,
}

/// Options for customizing analysis behavior
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Whether to use parallel processing
    pub parallel: bool,
    /// Maximum number of files to analyze
    pub max_files: Option<usize>,
    /// Whether to continue on errors or fail fast
    pub fail_fast: bool,
    /// Additional paths to exclude
    pub exclude_patterns: Vec<String>,
    /// Whether to ignore .migrationguardignore files
    pub ignore_ignore_files: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            max_files: None,
            fail_fast: false,
            exclude_patterns: Vec::new(),
            ignore_ignore_files: false,
        }
    }
}

impl Analyzer {
    /// Create a new analyzer with the given configuration
    pub fn new(config: GuardConfig) -> GuardResult<Self> {
        config.validate()?;

        let path_filter = PathFilter::new(
            config.paths.patterns.clone(),
            config.paths.ignore_file.clone(),
        )
        .map_err(|e| GuardError::config(format!("Failed to create path filter: {e}")))?;

        let csharp_analyzer = CSharpAnalyzer::new(RuleSet::from_config(&config));

        Ok(Self {
            config,
            path_filter,
            csharp_analyzer,
        })
    }

    /// Create an analyzer with default configuration
    pub fn with_defaults() -> GuardResult<Self> {
        Self::new(GuardConfig::default())
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn csharp(&self) -> &CSharpAnalyzer {
        &self.csharp_analyzer
    }

    /// Analyze a single file and return violations
    pub fn analyze_file<P: AsRef<Path>>(&self, file_path: P) -> GuardResult<Vec<Violation>> {
        let file_path = file_path.as_ref();

        if !self.csharp_analyzer.handles_file(file_path)
            || !self.path_filter.should_analyze(file_path)?
        {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(file_path).map_err(|e| {
            GuardError::analysis(
                file_path.display().to_string(),
                format!("Failed to read file: {e}"),
            )
        })?;

        self.csharp_analyzer
            .analyze(file_path, &content)
            .map_err(|e| {
                GuardError::analysis(
                    file_path.display().to_string(),
                    format!("C# analysis failed: {e}"),
                )
            })
    }

    /// Resolve input paths into the C# files an analysis would visit
    pub fn collect_files<P: AsRef<Path>>(
        &self,
        paths: &[P],
        options: &AnalysisOptions,
    ) -> GuardResult<Vec<PathBuf>> {
        let mut filter = if options.ignore_ignore_files {
            self.path_filter.clone().without_ignore_files()
        } else {
            self.path_filter.clone()
        };
        for pattern in &options.exclude_patterns {
            filter.add_pattern(pattern.clone())?;
        }

        let mut files = Vec::new();
        for path in paths {
            let path = path.as_ref();

            if path.is_file() {
                if self.csharp_analyzer.handles_file(path) && filter.should_analyze(path)? {
                    files.push(path.to_path_buf());
                }
            } else if path.is_dir() {
                files.extend(
                    filter
                        .find_files(path)?
                        .into_iter()
                        .filter(|file| self.csharp_analyzer.handles_file(file)),
                );
            } else {
                tracing::warn!("Path does not exist: {}", path.display());
            }
        }

        if let Some(max_files) = options.max_files {
            files.truncate(max_files);
        }

        Ok(files)
    }

    /// Analyze multiple files and return a complete validation report
    pub fn analyze_paths<P: AsRef<Path>>(
        &self,
        paths: &[P],
        options: &AnalysisOptions,
    ) -> GuardResult<ValidationReport> {
        let start_time = Instant::now();
        let mut report = ValidationReport::new();

        let files_to_analyze = self.collect_files(paths, options)?;
        let total_files = files_to_analyze.len();

        let violations = if options.parallel && files_to_analyze.len() > 1 {
            self.analyze_files_parallel(&files_to_analyze, options)?
        } else {
            self.analyze_files_sequential(&files_to_analyze, options)?
        };

        for violation in violations {
            report.add_violation(violation);
        }

        report.set_files_analyzed(total_files);
        report.set_execution_time(start_time.elapsed().as_millis() as u64);
        report.set_config_fingerprint(self.config.fingerprint());
        report.sort_violations();

        Ok(report)
    }

    /// Analyze files sequentially
    fn analyze_files_sequential(
        &self,
        files: &[PathBuf],
        options: &AnalysisOptions,
    ) -> GuardResult<Vec<Violation>> {
        let mut all_violations = Vec::new();

        for file_path in files {
            match self.analyze_file(file_path) {
                Ok(violations) => all_violations.extend(violations),
                Err(e) => {
                    if options.fail_fast {
                        return Err(e);
                    }
                    tracing::warn!("Failed to analyze {}: {}", file_path.display(), e);
                }
            }
        }

        Ok(all_violations)
    }

    /// Analyze files in parallel
    fn analyze_files_parallel(
        &self,
        files: &[PathBuf],
        options: &AnalysisOptions,
    ) -> GuardResult<Vec<Violation>> {
        let results: Vec<(&PathBuf, GuardResult<Vec<Violation>>)> = files
            .par_iter()
            .map(|file_path| (file_path, self.analyze_file(file_path)))
            .collect();

        let mut violations = Vec::new();
        for (file_path, result) in results {
            match result {
                Ok(file_violations) => violations.extend(file_violations),
                Err(e) => {
                    if options.fail_fast {
                        return Err(e);
                    }
                    tracing::warn!("Failed to analyze {}: {}", file_path.display(), e);
                }
            }
        }

        Ok(violations)
    }

    /// Analyze a directory tree and return a validation report
    pub fn analyze_directory<P: AsRef<Path>>(
        &self,
        root: P,
        options: &AnalysisOptions,
    ) -> GuardResult<ValidationReport> {
        self.analyze_paths(&[root.as_ref()], options)
    }

    /// Get configuration fingerprint
    pub fn config_fingerprint(&self) -> String {
        self.config.fingerprint()
    }

    /// Get statistics about the configured rules
    pub fn rule_stats(&self) -> RuleStats {
        let mut stats = RuleStats::default();
        let rules = self.csharp_analyzer.rules();

        for kind in DiagnosticKind::ALL {
            if rules.is_enabled(kind) {
                stats.enabled_rules += 1;
                if kind.is_fixable() {
                    stats.fixable_rules += 1;
                }
            } else {
                stats.disabled_rules += 1;
            }
        }

        stats
    }
}

/// Statistics about configured rules
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RuleStats {
    pub enabled_rules: usize,
    pub disabled_rules: usize,
    /// Enabled rules with an automated fix
    pub fixable_rules: usize,
}

impl RuleStats {
    pub fn total_rules(&self) -> usize {
        self.enabled_rules + self.disabled_rules
    }
}

/// Trait for language-specific file analyzers
pub trait FileAnalyzer {
    /// Analyze a file and return violations
    fn analyze(&self, file_path: &Path, content: &str) -> GuardResult<Vec<Violation>>;

    /// Check if this analyzer handles the given file type
    fn handles_file(&self, file_path: &Path) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use std::fs;
    use tempfile::TempDir;

    const MISSING: &str = "public class AddUsers : Migration\n{\n}\n";
    const INVALID: &str = "[Migration(\"abc\")]\npublic class AddRoles : Migration\n{\n}\n";
    const VALID: &str = "[Migration(202401011530)]\npublic class AddTeams : Migration\n{\n}\n";

    #[test]
    fn test_analyzer_creation() {
        let analyzer = Analyzer::with_defaults().unwrap();
        let stats = analyzer.rule_stats();

        assert_eq!(stats.enabled_rules, 2);
        assert_eq!(stats.fixable_rules, 1);
        assert_eq!(stats.total_rules(), 2);
    }

    #[test]
    fn test_single_file_analysis() -> GuardResult<()> {
        let temp_dir = TempDir::new()?;
        let file_path = temp_dir.path().join("AddUsers.cs");
        fs::write(&file_path, MISSING)?;

        let analyzer = Analyzer::with_defaults()?;
        let violations = analyzer.analyze_file(&file_path)?;

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule_id, "FM_Missing");
        assert_eq!(violations[0].file_path, file_path);
        Ok(())
    }

    #[test]
    fn test_non_csharp_files_are_ignored() -> GuardResult<()> {
        let temp_dir = TempDir::new()?;
        let file_path = temp_dir.path().join("notes.txt");
        fs::write(&file_path, MISSING)?;

        let analyzer = Analyzer::with_defaults()?;
        assert!(analyzer.analyze_file(&file_path)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_directory_analysis() -> GuardResult<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();

        fs::create_dir_all(root.join("Migrations"))?;
        fs::create_dir_all(root.join("obj/Debug"))?;
        fs::write(root.join("Migrations/AddUsers.cs"), MISSING)?;
        fs::write(root.join("Migrations/AddRoles.cs"), INVALID)?;
        fs::write(root.join("Migrations/AddTeams.cs"), VALID)?;
        fs::write(root.join("obj/Debug/Copy.cs"), MISSING)?; // Should be excluded

        let analyzer = Analyzer::with_defaults()?;
        let report = analyzer.analyze_directory(root, &AnalysisOptions::default())?;

        assert_eq!(report.summary.total_files, 3);
        assert_eq!(report.violations.len(), 2);
        assert!(report.has_errors());
        assert_eq!(report.summary.fixable, 1);
        assert!(report.config_fingerprint.is_some());

        // sorted by path: AddRoles before AddUsers
        assert_eq!(report.violations[0].rule_id, "FM_Invalid");
        assert_eq!(report.violations[1].rule_id, "FM_Missing");
        Ok(())
    }

    #[test]
    fn test_parallel_and_sequential_agree() -> GuardResult<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        for i in 0..8 {
            fs::write(root.join(format!("M{i}.cs")), MISSING)?;
        }

        let analyzer = Analyzer::with_defaults()?;
        let parallel = analyzer.analyze_directory(root, &AnalysisOptions::default())?;
        let sequential = analyzer.analyze_directory(
            root,
            &AnalysisOptions {
                parallel: false,
                ..Default::default()
            },
        )?;

        assert_eq!(parallel.violations.len(), 8);
        let files = |report: &ValidationReport| -> Vec<PathBuf> {
            report.violations.iter().map(|v| v.file_path.clone()).collect()
        };
        assert_eq!(files(&parallel), files(&sequential));
        Ok(())
    }

    #[test]
    fn test_analysis_options() -> GuardResult<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();

        fs::create_dir_all(root.join("Legacy"))?;
        fs::write(root.join("A.cs"), MISSING)?;
        fs::write(root.join("B.cs"), MISSING)?;
        fs::write(root.join("Legacy/C.cs"), MISSING)?;

        let analyzer = Analyzer::with_defaults()?;

        let limited = analyzer.analyze_directory(
            root,
            &AnalysisOptions {
                max_files: Some(1),
                ..Default::default()
            },
        )?;
        assert_eq!(limited.summary.total_files, 1);

        let excluded = analyzer.analyze_directory(
            root,
            &AnalysisOptions {
                exclude_patterns: vec!["Legacy/".to_string()],
                ..Default::default()
            },
        )?;
        assert_eq!(excluded.summary.total_files, 2);
        Ok(())
    }

    #[test]
    fn test_ignore_file_can_be_bypassed() -> GuardResult<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        fs::write(root.join(".migrationguardignore"), "Old.cs\n")?;
        fs::write(root.join("Old.cs"), MISSING)?;
        fs::write(root.join("New.cs"), MISSING)?;

        let analyzer = Analyzer::with_defaults()?;
        let honoured = analyzer.analyze_directory(root, &AnalysisOptions::default())?;
        let bypassed = analyzer.analyze_directory(
            root,
            &AnalysisOptions {
                ignore_ignore_files: true,
                ..Default::default()
            },
        )?;

        assert_eq!(honoured.summary.total_files, 1);
        assert_eq!(bypassed.summary.total_files, 2);
        Ok(())
    }

    #[test]
    fn test_disabled_rule_is_not_reported() -> GuardResult<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        fs::write(root.join("AddUsers.cs"), MISSING)?;
        fs::write(root.join("AddRoles.cs"), INVALID)?;

        let config = ConfigBuilder::new()
            .rule_enabled(DiagnosticKind::Missing, false)
            .build()?;
        let analyzer = Analyzer::new(config)?;
        let report = analyzer.analyze_directory(root, &AnalysisOptions::default())?;

        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].rule_id, "FM_Invalid");
        assert_eq!(analyzer.rule_stats().disabled_rules, 1);
        Ok(())
    }
}
