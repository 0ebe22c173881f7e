//! Migration Guard CLI - Command-line interface for migration checks and fixes
//!
//! CDD Principle: Application Layer - CLI coordinates user interactions with domain services
//! - Translates user commands to domain operations
//! - Handles external concerns like file I/O, process exit codes, and terminal output
//! - Provides clean separation between user interface and business logic

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use migration_guard::config::GuardConfig;
use migration_guard::domain::diagnostics::explanation;
use migration_guard::{
    AnalysisOptions, DiagnosticKind, FixOptions, MigrationGuard, OutputFormat, ReportFormatter,
    ReportOptions, Severity, ValidationOptions,
};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

/// Configuration files looked up in the working directory, in order
const DEFAULT_CONFIG_FILES: [&str; 3] = [
    "migration_guard.yaml",
    "migration_guard.yml",
    ".migration_guard.yaml",
];

/// Migration Guard - checks for versioned database migrations
#[derive(Parser)]
#[command(name = "migration-guard")]
#[command(version)]
#[command(about = "Checks that migration classes carry a well-formed [Migration] version number")]
#[command(long_about = "Migration Guard analyzes C# sources for FluentMigrator-style migrations. It reports \
migration classes without a [Migration] attribute (FM_Missing) and markers whose version is not a \
yyyyMMddHHmm timestamp (FM_Invalid), and can generate missing version numbers.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check files for migration violations
    Check {
        /// Paths to analyze (files or directories)
        paths: Vec<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormatArg,

        /// Minimum severity level to report
        #[arg(short, long, value_enum)]
        severity: Option<SeverityArg>,

        /// Maximum number of violations to report
        #[arg(long)]
        max_violations: Option<usize>,

        /// Additional exclude patterns
        #[arg(long, action = clap::ArgAction::Append)]
        exclude: Vec<String>,

        /// Ignore .migrationguardignore files
        #[arg(long)]
        no_ignore: bool,

        /// Disable parallel processing
        #[arg(long)]
        no_parallel: bool,

        /// Fail on first error
        #[arg(long)]
        fail_fast: bool,
    },

    /// Generate migration numbers for migration classes that lack one
    Fix {
        /// Paths to fix (files or directories)
        paths: Vec<PathBuf>,

        /// Show what would change without writing files
        #[arg(long)]
        dry_run: bool,

        /// Additional exclude patterns
        #[arg(long, action = clap::ArgAction::Append)]
        exclude: Vec<String>,

        /// Ignore .migrationguardignore files
        #[arg(long)]
        no_ignore: bool,
    },

    /// List available rules
    Rules {
        /// Show only enabled rules
        #[arg(long)]
        enabled_only: bool,
    },

    /// Explain what a specific rule does
    Explain {
        /// Rule ID to explain
        rule_id: String,
    },

    /// Validate configuration file
    ValidateConfig {
        /// Configuration file to validate
        config_file: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, ValueEnum, PartialEq)]
enum OutputFormatArg {
    Human,
    Json,
    Junit,
    Sarif,
    Github,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Junit => OutputFormat::Junit,
            OutputFormatArg::Sarif => OutputFormat::Sarif,
            OutputFormatArg::Github => OutputFormat::GitHub,
        }
    }
}

#[derive(Copy, Clone, ValueEnum)]
enum SeverityArg {
    Info,
    Warning,
    Error,
}

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Info => Severity::Info,
            SeverityArg::Warning => Severity::Warning,
            SeverityArg::Error => Severity::Error,
        }
    }
}

/// Options of the `check` command
struct CheckArgs {
    paths: Vec<PathBuf>,
    format: OutputFormatArg,
    severity: Option<SeverityArg>,
    max_violations: Option<usize>,
    exclude: Vec<String>,
    no_ignore: bool,
    no_parallel: bool,
    fail_fast: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);
    if cli.no_color {
        colored::control::set_override(false);
    }

    match run_command(cli).await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            process::exit(1);
        }
    }
}

async fn run_command(cli: Cli) -> anyhow::Result<i32> {
    let use_colors = !cli.no_color;

    match cli.command {
        Commands::Check {
            paths,
            format,
            severity,
            max_violations,
            exclude,
            no_ignore,
            no_parallel,
            fail_fast,
        } => {
            let args = CheckArgs {
                paths,
                format,
                severity,
                max_violations,
                exclude,
                no_ignore,
                no_parallel,
                fail_fast,
            };
            run_check(cli.config, args, use_colors).await
        }
        Commands::Fix {
            paths,
            dry_run,
            exclude,
            no_ignore,
        } => run_fix(cli.config, paths, dry_run, exclude, no_ignore),
        Commands::Rules { enabled_only } => run_list_rules(cli.config, enabled_only),
        Commands::Explain { rule_id } => Ok(run_explain(&rule_id)),
        Commands::ValidateConfig { config_file } => Ok(run_validate_config(config_file.or(cli.config))),
    }
}

/// Load the explicit config file, else the first default one present, else defaults
fn load_config(config_path: Option<PathBuf>) -> anyhow::Result<GuardConfig> {
    if let Some(path) = config_path {
        return GuardConfig::load_from_file(&path)
            .with_context(|| format!("loading configuration from {}", path.display()));
    }

    for name in DEFAULT_CONFIG_FILES {
        if Path::new(name).exists() {
            tracing::debug!("Using configuration file {}", name);
            return GuardConfig::load_from_file(name)
                .with_context(|| format!("loading configuration from {name}"));
        }
    }

    Ok(GuardConfig::default())
}

fn default_paths(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    if paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        paths
    }
}

async fn run_check(config_path: Option<PathBuf>, args: CheckArgs, use_colors: bool) -> anyhow::Result<i32> {
    let config = load_config(config_path)?;

    let report_options = ReportOptions {
        use_colors,
        max_violations: args.max_violations,
        min_severity: args.severity.map(Into::into),
        ..Default::default()
    };
    let guard = MigrationGuard::new_with_config(config)?
        .with_report_formatter(ReportFormatter::new(report_options.clone()));

    let validation_options = ValidationOptions {
        output_format: args.format.into(),
        report_options,
        analysis_options: AnalysisOptions {
            parallel: !args.no_parallel,
            fail_fast: args.fail_fast,
            exclude_patterns: args.exclude,
            ignore_ignore_files: args.no_ignore,
            ..Default::default()
        },
    };

    let report = guard
        .validate_with_options(default_paths(args.paths), &validation_options)
        .await?;

    let formatted = guard.format_report(&report, validation_options.output_format)?;
    println!("{formatted}");

    Ok(if report.has_errors() { 1 } else { 0 })
}

fn run_fix(
    config_path: Option<PathBuf>,
    paths: Vec<PathBuf>,
    dry_run: bool,
    exclude: Vec<String>,
    no_ignore: bool,
) -> anyhow::Result<i32> {
    let config = load_config(config_path)?;
    let guard = MigrationGuard::new_with_config(config)?;

    let options = FixOptions {
        dry_run,
        analysis_options: AnalysisOptions {
            parallel: false,
            exclude_patterns: exclude,
            ignore_ignore_files: no_ignore,
            ..Default::default()
        },
    };

    let results = guard
        .fix_paths(&default_paths(paths), &options)
        .context("generating migration numbers")?;

    let mut markers = 0;
    let mut failed = 0;
    for result in &results {
        if result.is_changed() {
            markers += result.markers_added;
            let verb = if dry_run { "would add" } else { "added" };
            println!(
                "{} {} {} migration number{}",
                "✔".green(),
                result.file_path.display(),
                verb,
                if result.markers_added == 1 { "" } else { "s" }
            );
        }
        for failure in &result.failures {
            failed += 1;
            println!("{} {}:{}", "✘".red(), result.file_path.display(), failure);
        }
    }

    if markers == 0 && failed == 0 {
        println!("{}", "✅ Nothing to fix".green());
    } else {
        let summary = format!(
            "📊 {markers} migration number{} {}, {failed} could not be fixed",
            if markers == 1 { "" } else { "s" },
            if dry_run { "to generate" } else { "generated" }
        );
        println!("{}", summary.bold());
    }

    Ok(if failed > 0 { 1 } else { 0 })
}

fn run_list_rules(config_path: Option<PathBuf>, enabled_only: bool) -> anyhow::Result<i32> {
    let config = load_config(config_path)?;

    println!("{}", "📋 Available rules".bold());
    println!();

    for kind in DiagnosticKind::ALL {
        let enabled = config.is_enabled(kind);
        if enabled_only && !enabled {
            continue;
        }

        let descriptor = kind.descriptor();
        let status = if enabled { "✅" } else { "❌" };
        let fix = descriptor
            .fix_title
            .map(|title| format!(" (fix: {title})"))
            .unwrap_or_default();

        println!(
            "  {status} {} [{}] - {}{fix}",
            descriptor.id.bold(),
            config.effective_severity(kind).as_str(),
            descriptor.title
        );
    }

    Ok(0)
}

fn run_explain(rule_id: &str) -> i32 {
    let Some(kind) = DiagnosticKind::from_id(rule_id) else {
        eprintln!("❌ Rule '{rule_id}' not found");
        println!();
        println!("Available rules:");
        for kind in DiagnosticKind::ALL {
            println!("  - {}", kind.id());
        }
        return 1;
    };

    let descriptor = kind.descriptor();
    println!("📖 Rule: {}", descriptor.id.bold());
    println!("📂 Category: {}", descriptor.category);
    println!("⚠️ Severity: {}", descriptor.default_severity);
    if let Some(title) = descriptor.fix_title {
        println!("🔧 Fix: {title}");
    }
    println!();
    println!("📝 Description:");
    println!("   {}", descriptor.description);
    println!();
    println!("🔎 Details:");
    println!("   {}", explanation(kind));

    0
}

fn run_validate_config(config_path: Option<PathBuf>) -> i32 {
    let config_path = config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILES[0]));

    println!("Validating configuration: {}", config_path.display());

    match GuardConfig::load_from_file(&config_path) {
        Ok(config) => {
            println!("{}", "✅ Configuration is valid".green());
            println!("📊 Configuration summary:");
            println!(
                "  Rules: {} total, {} enabled",
                DiagnosticKind::ALL.len(),
                config.enabled_rules().count()
            );
            println!("  Path patterns: {}", config.paths.patterns.len());
            if let Some(ignore_file) = &config.paths.ignore_file {
                println!("  Ignore file: {ignore_file}");
            }
            println!("  Fingerprint: {}", config.fingerprint());
            0
        }
        Err(e) => {
            eprintln!("{} {}", "❌ Configuration validation failed:".red(), e);
            1
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
