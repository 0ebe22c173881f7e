//! C# migration analysis over parsed declaration trees
//!
//! Code Quality Principle: Specialized Analysis Services - the C# analyzer owns the language
//! - Implements FileAnalyzer trait for clean polymorphism
//! - Parses a file, walks the tree with the configured rules
//! - Translates diagnostics into report-facing violations

use crate::analyzer::walker::Walker;
use crate::analyzer::FileAnalyzer;
use crate::domain::violations::{GuardResult, Violation};
use crate::domain::Diagnostic;
use crate::rules::RuleSet;
use crate::syntax::{parse, SyntaxTree};
use std::path::Path;

/// Analyzer for `.cs` source files
#[derive(Debug, Clone, Default)]
pub struct CSharpAnalyzer {
    walker: Walker,
}

impl CSharpAnalyzer {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            walker: Walker::new(rules),
        }
    }

    pub fn rules(&self) -> &RuleSet {
        self.walker.rules()
    }

    /// Parse and walk a file, keeping the tree for callers that go on to fix it
    pub fn diagnose(&self, content: &str) -> Option<(SyntaxTree, Vec<Diagnostic>)> {
        match parse(content) {
            Ok(tree) => {
                let diagnostics = self.walker.walk(&tree);
                Some((tree, diagnostics))
            }
            Err(e) => {
                tracing::debug!("Failed to parse C# source: {}", e);
                None
            }
        }
    }
}

/// Report-facing form of a diagnostic raised in `file_path`
pub fn to_violation(file_path: &Path, tree: &SyntaxTree, diagnostic: &Diagnostic) -> Violation {
    let location = diagnostic.location;
    let mut violation = Violation::new(
        diagnostic.id(),
        diagnostic.severity,
        file_path.to_path_buf(),
        diagnostic.message(),
    )
    .with_position(location.line, location.column);

    if let Some(line) = tree.line_text(location.line) {
        violation = violation.with_context(line.trim());
    }
    if let Some(title) = diagnostic.descriptor().fix_title {
        violation = violation.with_fix(title);
    }
    violation
}

impl FileAnalyzer for CSharpAnalyzer {
    fn analyze(&self, file_path: &Path, content: &str) -> GuardResult<Vec<Violation>> {
        // Unparseable files cannot be checked; they are skipped, not reported
        let Some((tree, diagnostics)) = self.diagnose(content) else {
            tracing::debug!("Skipping {}: not parseable as C#", file_path.display());
            return Ok(Vec::new());
        };

        Ok(diagnostics
            .iter()
            .map(|diagnostic| to_violation(file_path, &tree, diagnostic))
            .collect())
    }

    fn handles_file(&self, file_path: &Path) -> bool {
        file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("cs"))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Severity;

    #[test]
    fn test_handles_only_csharp_files() {
        let analyzer = CSharpAnalyzer::default();

        assert!(analyzer.handles_file(Path::new("Migrations/AddUsers.cs")));
        assert!(analyzer.handles_file(Path::new("Legacy.CS")));
        assert!(!analyzer.handles_file(Path::new("README.md")));
        assert!(!analyzer.handles_file(Path::new("Makefile")));
    }

    #[test]
    fn test_violations_carry_position_context_and_fix() -> GuardResult<()> {
        let content = "namespace App\n{\n    public class AddUsers : Migration { }\n\n    [Migration(\"abc\")]\n    public class AddRoles : Migration { }\n}\n";
        let violations =
            CSharpAnalyzer::default().analyze(Path::new("Migrations.cs"), content)?;

        assert_eq!(violations.len(), 2);

        let missing = &violations[0];
        assert_eq!(missing.rule_id, "FM_Missing");
        assert_eq!(missing.severity, Severity::Warning);
        assert_eq!(missing.line_number, Some(3));
        assert_eq!(missing.column_number, Some(5));
        assert_eq!(
            missing.context.as_deref(),
            Some("public class AddUsers : Migration { }")
        );
        assert!(missing.fixable);
        assert_eq!(missing.suggested_fix.as_deref(), Some("Generate Migration Number"));

        let invalid = &violations[1];
        assert_eq!(invalid.rule_id, "FM_Invalid");
        assert_eq!(invalid.severity, Severity::Error);
        assert_eq!(
            invalid.message,
            "The migration number \"abc\" should be yyyyMMddHHmm"
        );
        assert!(!invalid.fixable);
        Ok(())
    }

    #[test]
    fn test_unparseable_file_is_skipped() -> GuardResult<()> {
        let violations = CSharpAnalyzer::default()
            .analyze(Path::new("Broken.cs"), "class A : Migration { /* never closed")?;
        assert!(violations.is_empty());
        Ok(())
    }
}
