//! Configuration loading and management for migration-guard
//!
//! Architecture: Anti-Corruption Layer - Configuration translates external YAML formats
//! - Raw YAML structures are converted to clean domain objects
//! - Default configurations are embedded in the domain, not infrastructure
//! - Rule toggles and severity overrides are resolved into a `RuleSet` by the rules module

use crate::domain::violations::{GuardError, GuardResult, Severity};
use crate::domain::DiagnosticKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Configuration versions this build understands
const SUPPORTED_VERSIONS: [&str; 1] = ["1.0"];

/// Main configuration structure for migration-guard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Configuration format version
    pub version: String,
    /// Path filtering configuration
    pub paths: PathConfig,
    /// Per-rule settings
    #[serde(default)]
    pub rules: RulesConfig,
}

/// Path filtering configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathConfig {
    /// Include/exclude patterns (gitignore-style)
    pub patterns: Vec<String>,
    /// Optional .migrationguardignore file name
    pub ignore_file: Option<String>,
}

/// Settings for both migration rules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RulesConfig {
    /// `FM_Missing`: migration classes without a `[Migration]` marker
    #[serde(default)]
    pub missing_marker: RuleConfig,
    /// `FM_Invalid`: markers whose version is not `yyyyMMddHHmm`
    #[serde(default)]
    pub invalid_marker_format: RuleConfig,
}

/// Toggle and severity override for one rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Whether this rule is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Severity override (uses the rule's default if not specified)
    #[serde(default)]
    pub severity: Option<Severity>,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            severity: None,
        }
    }
}

impl RulesConfig {
    pub fn get(&self, kind: DiagnosticKind) -> &RuleConfig {
        match kind {
            DiagnosticKind::Missing => &self.missing_marker,
            DiagnosticKind::InvalidFormat => &self.invalid_marker_format,
        }
    }

    pub fn get_mut(&mut self, kind: DiagnosticKind) -> &mut RuleConfig {
        match kind {
            DiagnosticKind::Missing => &mut self.missing_marker,
            DiagnosticKind::InvalidFormat => &mut self.invalid_marker_format,
        }
    }
}

impl GuardConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> GuardResult<Self> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            GuardError::config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = serde_yaml::from_str(&contents).map_err(|e| {
            GuardError::config(format!(
                "Failed to parse config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from string content
    pub fn load_from_str(content: &str) -> GuardResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| GuardError::config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Get default configuration: every rule on, default severities
    pub fn with_defaults() -> Self {
        Self {
            version: "1.0".to_string(),
            paths: PathConfig {
                patterns: vec![
                    // Build output and tooling directories never hold migrations
                    "bin/".to_string(),
                    "obj/".to_string(),
                    ".git/".to_string(),
                    "*.g.cs".to_string(),
                    "*.Designer.cs".to_string(),
                ],
                ignore_file: Some(".migrationguardignore".to_string()),
            },
            rules: RulesConfig::default(),
        }
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> GuardResult<()> {
        if !SUPPORTED_VERSIONS.contains(&self.version.as_str()) {
            return Err(GuardError::config(format!(
                "Unsupported configuration version: {}. Supported versions: {}",
                self.version,
                SUPPORTED_VERSIONS.join(", ")
            )));
        }

        for pattern in &self.paths.patterns {
            let glob_part = pattern.strip_prefix('!').unwrap_or(pattern);
            let glob_part = glob_part.trim_end_matches('/');
            if glob_part.trim().is_empty() {
                return Err(GuardError::config("Empty path pattern in 'paths.patterns'"));
            }
            glob::Pattern::new(glob_part.strip_prefix('/').unwrap_or(glob_part)).map_err(|e| {
                GuardError::config(format!("Invalid path pattern '{pattern}': {e}"))
            })?;
        }

        if let Some(ignore_file) = &self.paths.ignore_file {
            if ignore_file.trim().is_empty() {
                return Err(GuardError::config("'paths.ignore_file' must not be empty"));
            }
        }

        Ok(())
    }

    /// Effective severity for a rule (override or the descriptor default)
    pub fn effective_severity(&self, kind: DiagnosticKind) -> Severity {
        self.rules
            .get(kind)
            .severity
            .unwrap_or(kind.descriptor().default_severity)
    }

    /// Whether a rule is switched on
    pub fn is_enabled(&self, kind: DiagnosticKind) -> bool {
        self.rules.get(kind).enabled
    }

    /// Kinds of every enabled rule, in id order
    pub fn enabled_rules(&self) -> impl Iterator<Item = DiagnosticKind> + '_ {
        DiagnosticKind::ALL
            .into_iter()
            .filter(move |kind| self.is_enabled(*kind))
    }

    /// Convert to JSON for serialization
    pub fn to_json(&self) -> GuardResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| GuardError::config(format!("Failed to serialize config: {e}")))
    }

    /// Convert to YAML, the format `load_from_str` reads
    pub fn to_yaml(&self) -> GuardResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| GuardError::config(format!("Failed to serialize config: {e}")))
    }

    /// Create a fingerprint of the configuration for reports
    pub fn fingerprint(&self) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();

        self.version.hash(&mut hasher);
        self.paths.patterns.len().hash(&mut hasher);
        for pattern in &self.paths.patterns {
            pattern.hash(&mut hasher);
        }
        self.paths.ignore_file.hash(&mut hasher);

        for kind in DiagnosticKind::ALL {
            kind.id().hash(&mut hasher);
            self.rules.get(kind).hash(&mut hasher);
        }

        format!("{:x}", hasher.finish())
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn default_true() -> bool {
    true
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: GuardConfig,
}

impl ConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: GuardConfig::default(),
        }
    }

    /// Add a path pattern
    pub fn add_path_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.paths.patterns.push(pattern.into());
        self
    }

    /// Set the ignore file name
    pub fn ignore_file(mut self, filename: impl Into<String>) -> Self {
        self.config.paths.ignore_file = Some(filename.into());
        self
    }

    /// Turn a rule on or off
    pub fn rule_enabled(mut self, kind: DiagnosticKind, enabled: bool) -> Self {
        self.config.rules.get_mut(kind).enabled = enabled;
        self
    }

    /// Override the severity a rule reports with
    pub fn rule_severity(mut self, kind: DiagnosticKind, severity: Severity) -> Self {
        self.config.rules.get_mut(kind).severity = Some(severity);
        self
    }

    /// Build the final configuration
    pub fn build(self) -> GuardResult<GuardConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
