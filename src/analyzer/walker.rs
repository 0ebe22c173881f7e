//! Tree walker dispatching syntax nodes to the migration rules
//!
//! Handlers are registered per node kind in a static table. The walk is an explicit-stack
//! pre-order traversal, so deeply nested namespaces cannot overflow the call stack, and it does
//! not descend below nodes that cannot contain a class declaration or an attribute.

use crate::domain::Diagnostic;
use crate::rules::RuleSet;
use crate::syntax::{SyntaxKind, SyntaxNode, SyntaxTree};

/// A rule entry point for one node kind
pub type Handler = fn(&RuleSet, &SyntaxTree, &SyntaxNode) -> Option<Diagnostic>;

/// Node kinds the rules subscribe to
pub static DISPATCH: [(SyntaxKind, Handler); 2] = [
    (SyntaxKind::ClassDeclaration, RuleSet::check_missing_marker),
    (SyntaxKind::Attribute, RuleSet::check_marker_format),
];

fn handler_for(kind: SyntaxKind) -> Option<Handler> {
    DISPATCH
        .iter()
        .find(|(registered, _)| *registered == kind)
        .map(|(_, handler)| *handler)
}

/// Runs a rule set over whole trees
#[derive(Debug, Clone, Default)]
pub struct Walker {
    rules: RuleSet,
}

impl Walker {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Every diagnostic in the tree, in pre-order of the nodes that raised them
    pub fn walk(&self, tree: &SyntaxTree) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let mut stack = vec![tree.root()];

        while let Some(node) = stack.pop() {
            let kind = node.kind();
            if let Some(handler) = handler_for(kind) {
                diagnostics.extend(handler(&self.rules, tree, node));
            }

            // attributes are reached through their list; nothing below an attribute matters
            if kind.may_contain_declarations() {
                stack.extend(node.children().iter().rev());
            }
        }

        diagnostics
    }
}

/// Analyze a tree with both rules at their default severities
pub fn analyze(tree: &SyntaxTree) -> Vec<Diagnostic> {
    Walker::default().walk(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DiagnosticKind;
    use crate::syntax::parse;

    fn ids(source: &str) -> Vec<&'static str> {
        analyze(&parse(source).unwrap())
            .iter()
            .map(Diagnostic::id)
            .collect()
    }

    #[test]
    fn test_valid_migration_is_clean() {
        assert!(ids("[Migration(202401011530)] public class A : Migration { }").is_empty());
    }

    #[test]
    fn test_missing_marker_reported_once() {
        assert_eq!(ids("public class A : Migration { }"), vec!["FM_Missing"]);
    }

    #[test]
    fn test_invalid_marker_reported_without_missing() {
        assert_eq!(ids("[Migration(\"abc\")] class A : Migration { }"), vec!["FM_Invalid"]);
    }

    #[test]
    fn test_generic_marker_does_not_count() {
        assert_eq!(ids("[Migration<int>(1)] class A : Migration {}"), vec!["FM_Missing"]);
    }

    #[test]
    fn test_missing_first_argument_is_invalid() {
        assert_eq!(ids("[Migration(, 202401011530)] class A : Migration {}"), vec!["FM_Invalid"]);
    }

    #[test]
    fn test_unrelated_class_is_ignored() {
        assert!(ids("class A : BaseController { }").is_empty());
    }

    #[test]
    fn test_reports_every_violation_in_source_order() {
        let source = r#"
namespace App.Migrations
{
    public class First : Migration { }

    [Migration(20240101)]
    public class Second : Migration
    {
        public class Nested : Migration { }
    }

    public class Plain { [Migration(123)] public void Up() { } }
}
"#;
        let diagnostics = analyze(&parse(source).unwrap());
        let summary: Vec<(DiagnosticKind, u32)> = diagnostics
            .iter()
            .map(|d| (d.kind, d.location.line))
            .collect();

        assert_eq!(
            summary,
            vec![
                (DiagnosticKind::Missing, 4),
                (DiagnosticKind::InvalidFormat, 6),
                (DiagnosticKind::Missing, 9),
                (DiagnosticKind::InvalidFormat, 12),
            ]
        );
    }

    #[test]
    fn test_deeply_nested_namespaces() {
        let depth = 200;
        let mut source = String::new();
        for i in 0..depth {
            source.push_str(&format!("namespace N{i} {{ "));
        }
        source.push_str("class Deep : Migration { }");
        source.push_str(&"} ".repeat(depth));

        assert_eq!(ids(&source), vec!["FM_Missing"]);
    }
}
