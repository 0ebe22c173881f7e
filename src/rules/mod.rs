//! The two migration rules
//!
//! Architecture: Domain Services - stateless checks over immutable syntax
//! - Each check inspects exactly one node and returns at most one diagnostic
//! - Nodes of the wrong shape are simply not applicable; checks never fail
//! - Which rules run, and at what severity, is decided by the `RuleSet`

use crate::config::GuardConfig;
use crate::domain::catalog;
use crate::domain::{Diagnostic, DiagnosticKind, Severity, TimestampToken};
use crate::syntax::ast::{Attribute, TypeDeclaration};
use crate::syntax::{SyntaxNode, SyntaxTree};
use tracing::debug;

/// Toggle and severity for one rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleSetting {
    pub enabled: bool,
    pub severity: Severity,
}

/// The rules to run and how they report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    missing_marker: RuleSetting,
    invalid_marker_format: RuleSetting,
}

impl RuleSet {
    /// Both rules on, at their default severities
    pub fn new() -> Self {
        let setting = |kind: DiagnosticKind| RuleSetting {
            enabled: true,
            severity: kind.descriptor().default_severity,
        };
        Self {
            missing_marker: setting(DiagnosticKind::Missing),
            invalid_marker_format: setting(DiagnosticKind::InvalidFormat),
        }
    }

    pub fn from_config(config: &GuardConfig) -> Self {
        let setting = |kind: DiagnosticKind| RuleSetting {
            enabled: config.is_enabled(kind),
            severity: config.effective_severity(kind),
        };
        Self {
            missing_marker: setting(DiagnosticKind::Missing),
            invalid_marker_format: setting(DiagnosticKind::InvalidFormat),
        }
    }

    pub fn setting(&self, kind: DiagnosticKind) -> RuleSetting {
        match kind {
            DiagnosticKind::Missing => self.missing_marker,
            DiagnosticKind::InvalidFormat => self.invalid_marker_format,
        }
    }

    pub fn is_enabled(&self, kind: DiagnosticKind) -> bool {
        self.setting(kind).enabled
    }

    /// `FM_Missing` for a class that derives from `Migration` without a marker
    pub fn check_missing_marker(&self, tree: &SyntaxTree, node: &SyntaxNode) -> Option<Diagnostic> {
        let setting = self.missing_marker;
        if !setting.enabled {
            return None;
        }

        let class = TypeDeclaration::cast(node).filter(TypeDeclaration::is_class)?;
        if !class.base_types().any(catalog::is_migration_base) {
            return None;
        }

        let has_marker = class
            .attributes()
            .any(|attribute| attribute.name().is_some_and(catalog::is_marker));
        if has_marker {
            return None;
        }

        let span = node.span();
        debug!(
            class = class.name().unwrap_or("<anonymous>"),
            %span,
            "migration class has no marker"
        );
        Some(Diagnostic::new(
            DiagnosticKind::Missing,
            setting.severity,
            span,
            tree.location(span.start),
        ))
    }

    /// `FM_Invalid` for a marker whose first argument is not a `yyyyMMddHHmm` timestamp
    pub fn check_marker_format(&self, tree: &SyntaxTree, node: &SyntaxNode) -> Option<Diagnostic> {
        let setting = self.invalid_marker_format;
        if !setting.enabled {
            return None;
        }

        let attribute = Attribute::cast(node)?;
        if !attribute.name().is_some_and(catalog::is_marker) {
            return None;
        }

        let argument = attribute.arguments().next()?;
        let text = argument.expression_text();
        if let Err(error) = TimestampToken::parse(text) {
            let span = argument.syntax().span();
            debug!(%error, %span, "marker version rejected");
            return Some(
                Diagnostic::new(
                    DiagnosticKind::InvalidFormat,
                    setting.severity,
                    span,
                    tree.location(span.start),
                )
                .with_param(text),
            );
        }

        None
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use crate::syntax::{parse, SyntaxKind};

    fn first_of_kind(tree: &SyntaxTree, kind: SyntaxKind) -> SyntaxNode {
        tree.preorder()
            .map(|(_, node)| node)
            .find(|node| node.kind() == kind)
            .cloned()
            .unwrap()
    }

    fn check_class(source: &str) -> Option<Diagnostic> {
        let tree = parse(source).unwrap();
        let class = first_of_kind(&tree, SyntaxKind::ClassDeclaration);
        RuleSet::new().check_missing_marker(&tree, &class)
    }

    fn check_attribute(source: &str) -> Option<Diagnostic> {
        let tree = parse(source).unwrap();
        let attribute = first_of_kind(&tree, SyntaxKind::Attribute);
        RuleSet::new().check_marker_format(&tree, &attribute)
    }

    #[test]
    fn test_missing_marker_fires_on_bare_migration() {
        let source = "namespace N\n{\n    public class AddUsers : Migration { }\n}";
        let diagnostic = check_class(source).unwrap();

        assert_eq!(diagnostic.id(), "FM_Missing");
        assert_eq!(diagnostic.severity, Severity::Warning);
        assert!(diagnostic.params.is_empty());
        assert_eq!(diagnostic.location.line, 3);
        assert_eq!(diagnostic.location.column, 5);
    }

    #[test]
    fn test_missing_marker_ignores_marked_and_unrelated_classes() {
        assert!(check_class("[Migration(202401011530)] class A : Migration {}").is_none());
        // a malformed marker still counts as present
        assert!(check_class("[Migration(\"abc\")] class A : Migration {}").is_none());
        assert!(check_class("[Tags(\"x\")] [Migration] class A : Migration {}").is_none());
        assert!(check_class("class A : BaseController {}").is_none());
        assert!(check_class("class A {}").is_none());
    }

    #[test]
    fn test_missing_marker_uses_exact_names() {
        assert!(check_class("class A : FluentMigrator.Migration {}").is_none());
        assert!(check_class("[MigrationAttribute(202401011530)] class A : Migration {}").is_some());
        assert!(check_class("[FluentMigrator.Migration(202401011530)] class A : Migration {}").is_some());
    }

    #[test]
    fn test_generic_attribute_is_not_the_marker() {
        assert!(check_class("[Migration<int>(202401011530)] class A : Migration {}").is_some());
        assert!(check_attribute("[Migration<int>(1)] class A {}").is_none());
    }

    #[test]
    fn test_missing_marker_only_checks_classes() {
        let tree = parse("struct S : Migration {}").unwrap();
        let node = first_of_kind(&tree, SyntaxKind::StructDeclaration);
        assert!(RuleSet::new().check_missing_marker(&tree, &node).is_none());
    }

    #[test]
    fn test_marker_format_accepts_valid_timestamp() {
        assert!(check_attribute("[Migration(202401011530)] class A {}").is_none());
        assert!(check_attribute("[Migration(202401011530, \"Add users\")] class A {}").is_none());
    }

    #[test]
    fn test_marker_format_rejects_invalid_text() {
        let diagnostic = check_attribute("[Migration(\"abc\")] class A {}").unwrap();

        assert_eq!(diagnostic.id(), "FM_Invalid");
        assert_eq!(diagnostic.severity, Severity::Error);
        assert_eq!(diagnostic.params, vec!["\"abc\"".to_string()]);
        assert_eq!(
            diagnostic.message(),
            "The migration number \"abc\" should be yyyyMMddHHmm"
        );
        assert_eq!(diagnostic.location.column, 12);
    }

    #[test]
    fn test_marker_format_rejects_impossible_dates_and_suffixes() {
        assert!(check_attribute("[Migration(202402301200)] class A {}").is_some());
        assert!(check_attribute("[Migration(202401011560)] class A {}").is_some());
        assert!(check_attribute("[Migration(202401011530L)] class A {}").is_some());
        assert!(check_attribute("[Migration(20240101153)] class A {}").is_some());
    }

    #[test]
    fn test_marker_format_reads_named_first_argument() {
        let diagnostic = check_attribute("[Migration(version: 1)] class A {}").unwrap();
        assert_eq!(diagnostic.params, vec!["1".to_string()]);
        assert!(check_attribute("[Migration(version: 202401011530)] class A {}").is_none());
    }

    #[test]
    fn test_marker_format_rejects_missing_first_argument() {
        let diagnostic = check_attribute("[Migration(, 202401011530)] class A {}").unwrap();

        assert_eq!(diagnostic.params, vec![String::new()]);
        assert_eq!(diagnostic.location.column, 12);
    }

    #[test]
    fn test_marker_format_not_applicable() {
        assert!(check_attribute("[Migration] class A {}").is_none());
        assert!(check_attribute("[Migration()] class A {}").is_none());
        assert!(check_attribute("[Obsolete(\"abc\")] class A {}").is_none());
    }

    #[test]
    fn test_disabled_rules_never_fire() {
        let config = ConfigBuilder::new()
            .rule_enabled(DiagnosticKind::Missing, false)
            .rule_enabled(DiagnosticKind::InvalidFormat, false)
            .build()
            .unwrap();
        let rules = RuleSet::from_config(&config);

        let tree = parse("[Migration(\"abc\")] class A : Migration {} class B : Migration {}").unwrap();
        for (_, node) in tree.preorder() {
            assert!(rules.check_missing_marker(&tree, node).is_none());
            assert!(rules.check_marker_format(&tree, node).is_none());
        }
    }

    #[test]
    fn test_severity_override() {
        let config = ConfigBuilder::new()
            .rule_severity(DiagnosticKind::Missing, Severity::Error)
            .build()
            .unwrap();
        let rules = RuleSet::from_config(&config);

        let tree = parse("class B : Migration {}").unwrap();
        let class = first_of_kind(&tree, SyntaxKind::ClassDeclaration);
        let diagnostic = rules.check_missing_marker(&tree, &class).unwrap();
        assert_eq!(diagnostic.severity, Severity::Error);
    }
}
