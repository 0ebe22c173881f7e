//! Path filtering using .gitignore-style patterns
//!
//! Architectural Principle: Service Layer - PathFilter decides which C# files are checked
//! - Patterns apply in order; a later `!pattern` re-includes what an earlier one excluded
//! - Directory patterns (`obj/`) exclude everything below a matching directory
//! - `.migrationguardignore` files are honoured in every ancestor directory

use crate::domain::violations::{GuardError, GuardResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Default name of per-directory ignore files
pub const DEFAULT_IGNORE_FILE: &str = ".migrationguardignore";

/// Manages path filtering using .gitignore-style patterns
#[derive(Debug, Clone)]
pub struct PathFilter {
    /// Include/exclude patterns
    patterns: Vec<FilterPattern>,
    /// Name of ignore files to process, if any
    ignore_filename: Option<String>,
}

/// A single path filter pattern
#[derive(Debug, Clone)]
struct FilterPattern {
    /// The glob, without `!`, leading `/` or trailing `/`
    pattern: glob::Pattern,
    /// Whether this is an include pattern (starts with !)
    is_include: bool,
    /// Trailing `/`: matches directories and everything below them
    directory_only: bool,
    /// Contains a `/`: matched against the whole path instead of the file name
    anchored: bool,
    /// Original pattern string for debugging
    original: String,
}

impl FilterPattern {
    fn parse(raw: &str) -> Result<Self, glob::PatternError> {
        let (is_include, rest) = match raw.strip_prefix('!') {
            Some(stripped) => (true, stripped),
            None => (false, raw),
        };
        let directory_only = rest.ends_with('/');
        let trimmed = rest.trim_end_matches('/');
        let anchored = trimmed.contains('/');
        let trimmed = trimmed.strip_prefix('/').unwrap_or(trimmed);

        Ok(Self {
            pattern: glob::Pattern::new(trimmed)?,
            is_include,
            directory_only,
            anchored,
            original: raw.to_string(),
        })
    }

    /// Whether the pattern matches `path`, given as relative to the pattern's base
    fn matches(&self, path: &Path, is_dir: bool) -> bool {
        if self.directory_only {
            // the path itself when it is a directory, otherwise any directory above it
            let mut candidates = path.ancestors().skip(usize::from(!is_dir));
            return candidates.any(|dir| !dir.as_os_str().is_empty() && self.matches_one(dir));
        }
        self.matches_one(path)
    }

    fn matches_one(&self, path: &Path) -> bool {
        if self.anchored {
            self.pattern.matches_path(path)
        } else {
            path.file_name()
                .map(|name| self.pattern.matches(&name.to_string_lossy()))
                .unwrap_or(false)
        }
    }
}

impl PathFilter {
    /// Create a new path filter with the given patterns
    pub fn new(patterns: Vec<String>, ignore_filename: Option<String>) -> GuardResult<Self> {
        let patterns = patterns
            .iter()
            .map(|raw| {
                FilterPattern::parse(raw)
                    .map_err(|e| GuardError::pattern(format!("Invalid pattern '{raw}': {e}")))
            })
            .collect::<GuardResult<Vec<_>>>()?;

        Ok(Self {
            patterns,
            ignore_filename: ignore_filename.filter(|name| !name.is_empty()),
        })
    }

    /// Create a default path filter with sensible exclusions
    pub fn with_defaults() -> GuardResult<Self> {
        Self::new(
            vec![
                "bin/".to_string(),
                "obj/".to_string(),
                ".git/".to_string(),
                "*.g.cs".to_string(),
            ],
            Some(DEFAULT_IGNORE_FILE.to_string()),
        )
    }

    /// Stop reading per-directory ignore files
    pub fn without_ignore_files(mut self) -> Self {
        self.ignore_filename = None;
        self
    }

    /// Check if a file should be analyzed based on all patterns and ignore files
    pub fn should_analyze<P: AsRef<Path>>(&self, path: P) -> GuardResult<bool> {
        let path = path.as_ref();
        let is_dir = path.is_dir();

        // Apply patterns in order (like .gitignore)
        let mut should_include = true;
        for pattern in &self.patterns {
            if pattern.matches(path, is_dir) {
                should_include = pattern.is_include;
            }
        }

        if !should_include {
            return Ok(false);
        }

        if self.ignore_filename.is_some() && self.is_ignored_by_files(path, is_dir)? {
            return Ok(false);
        }

        Ok(true)
    }

    /// Check if path is ignored by ignore files in any ancestor directory
    fn is_ignored_by_files(&self, path: &Path, is_dir: bool) -> GuardResult<bool> {
        let Some(ignore_filename) = &self.ignore_filename else {
            return Ok(false);
        };

        // Outermost ignore file first, so nearer files override farther ones
        let mut directories: Vec<&Path> = path.ancestors().skip(1).collect();
        directories.reverse();

        let mut is_ignored = false;
        for dir in directories {
            let ignore_file = dir.join(ignore_filename);
            if !ignore_file.is_file() {
                continue;
            }

            let Ok(relative_path) = path.strip_prefix(dir) else {
                continue;
            };
            for pattern in self.load_ignore_file(&ignore_file)? {
                if pattern.matches(relative_path, is_dir) {
                    is_ignored = !pattern.is_include;
                }
            }
        }

        Ok(is_ignored)
    }

    /// Load patterns from an ignore file
    fn load_ignore_file(&self, path: &Path) -> GuardResult<Vec<FilterPattern>> {
        let content = fs::read_to_string(path).map_err(|e| {
            GuardError::config(format!(
                "Failed to read ignore file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let mut patterns = Vec::new();
        for line in content.lines() {
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match FilterPattern::parse(line) {
                Ok(pattern) => patterns.push(pattern),
                Err(e) => {
                    // Skip invalid patterns rather than failing the whole run
                    warn!("Invalid pattern '{}' in {}: {}", line, path.display(), e);
                }
            }
        }

        Ok(patterns)
    }

    /// Get all files that should be analyzed in a directory tree
    pub fn find_files<P: AsRef<Path>>(&self, root: P) -> GuardResult<Vec<PathBuf>> {
        let root = root.as_ref();
        let mut files = Vec::new();

        let mut walker = WalkDir::new(root).follow_links(false).sort_by_file_name().into_iter();
        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };
            let path = entry.path();

            if entry.file_type().is_dir() {
                // prune excluded directories instead of visiting every file below them
                if entry.depth() > 0 && !self.should_analyze(path)? {
                    walker.skip_current_dir();
                }
                continue;
            }

            if entry.file_type().is_file() && self.should_analyze(path)? {
                files.push(path.to_path_buf());
            }
        }

        Ok(files)
    }

    /// Filter a list of paths to only those that should be analyzed
    pub fn filter_paths<P: AsRef<Path>>(&self, paths: &[P]) -> GuardResult<Vec<PathBuf>> {
        let mut filtered = Vec::new();

        for path in paths {
            if self.should_analyze(path)? {
                filtered.push(path.as_ref().to_path_buf());
            }
        }

        Ok(filtered)
    }

    /// Add a pattern to the filter
    pub fn add_pattern(&mut self, pattern: String) -> GuardResult<()> {
        let parsed = FilterPattern::parse(&pattern)
            .map_err(|e| GuardError::pattern(format!("Invalid pattern '{pattern}': {e}")))?;
        self.patterns.push(parsed);
        Ok(())
    }

    /// Get debug information about patterns and their matches
    pub fn debug_patterns<P: AsRef<Path>>(&self, path: P) -> Vec<String> {
        let path = path.as_ref();
        let is_dir = path.is_dir();

        self.patterns
            .iter()
            .enumerate()
            .map(|(i, pattern)| {
                format!(
                    "Pattern {}: {} -> {}",
                    i,
                    pattern.original,
                    if pattern.matches(path, is_dir) { "MATCH" } else { "no match" }
                )
            })
            .collect()
    }
}
