//! "Generate Migration Number" fix
//!
//! Architecture: Pure Transformation - a fix reads one tree and returns another
//! - The marker `[Migration(<now>)]` is appended after the declaration's existing attribute lists
//! - The declaration is swapped in with `SyntaxTree::replace`; the input tree is never touched
//! - A matching `TextEdit` renders the same change into the source text
//! - Batch fixing plans every diagnostic against the original tree and applies edits last to first

use crate::domain::catalog;
use crate::domain::diagnostics::GENERATE_MIGRATION_NUMBER;
use crate::domain::{Clock, Diagnostic, DiagnosticKind, SystemClock, TimestampError, TimestampToken};
use crate::syntax::ast::{make, TypeDeclaration};
use crate::syntax::{parse, Span, SyntaxError, SyntaxTree};
use std::sync::Arc;
use tracing::{debug, warn};

/// Why a fix could not be produced
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FixError {
    #[error("fix not applicable: {reason}")]
    NotApplicable { reason: String },

    #[error("no automated fix exists for {id}")]
    Unsupported { id: String },

    #[error("cannot generate a migration number: {0}")]
    Timestamp(#[from] TimestampError),

    #[error("cannot rewrite the syntax tree: {0}")]
    Syntax(#[from] SyntaxError),
}

impl FixError {
    fn not_applicable(reason: impl Into<String>) -> Self {
        Self::NotApplicable {
            reason: reason.into(),
        }
    }
}

/// Replace `span` of the source with `text`; an empty span is a pure insertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub span: Span,
    pub text: String,
}

impl TextEdit {
    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self {
            span: Span::empty(at),
            text: text.into(),
        }
    }

    /// `None` when the span is out of range or splits a character
    pub fn apply(&self, source: &str) -> Option<String> {
        let before = source.get(..self.span.start)?;
        let after = source.get(self.span.end..)?;

        let mut output = String::with_capacity(source.len() + self.text.len());
        output.push_str(before);
        output.push_str(&self.text);
        output.push_str(after);
        Some(output)
    }
}

/// Result of planning one fix
#[derive(Debug, Clone)]
pub struct AppliedFix {
    /// The rewritten tree
    pub tree: SyntaxTree,
    /// Source edit producing the same change; `None` when the declaration already had a marker
    pub edit: Option<TextEdit>,
}

/// A diagnostic whose fix could not be planned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixFailure {
    pub diagnostic: Diagnostic,
    pub error: FixError,
}

/// Result of fixing every diagnostic of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFix {
    /// Source with every edit applied
    pub source: String,
    /// Applied edits, ordered by position
    pub edits: Vec<TextEdit>,
    pub failures: Vec<FixFailure>,
}

impl BatchFix {
    pub fn is_changed(&self) -> bool {
        !self.edits.is_empty()
    }

    /// Parse the fixed source
    pub fn tree(&self) -> Result<SyntaxTree, SyntaxError> {
        parse(&self.source)
    }
}

/// Builds "Generate Migration Number" fixes
#[derive(Debug, Clone)]
pub struct FixSynthesizer {
    clock: Arc<dyn Clock>,
}

impl FixSynthesizer {
    /// Synthesizer reading the local wall clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Title shown for the fix
    pub fn title(&self) -> &'static str {
        GENERATE_MIGRATION_NUMBER
    }

    /// Tree with a fresh marker on the declaration `diagnostic` points at
    pub fn fix(&self, tree: &SyntaxTree, diagnostic: &Diagnostic) -> Result<SyntaxTree, FixError> {
        self.plan(tree, diagnostic).map(|applied| applied.tree)
    }

    /// Like [`fix`](Self::fix), also returning the equivalent source edit
    pub fn plan(&self, tree: &SyntaxTree, diagnostic: &Diagnostic) -> Result<AppliedFix, FixError> {
        if !diagnostic.kind.is_fixable() {
            return Err(FixError::Unsupported {
                id: diagnostic.id().to_string(),
            });
        }

        let span = diagnostic.span;
        let covering = tree.covering_path(span.start).ok_or_else(|| {
            FixError::not_applicable(format!("span {span} lies outside the source"))
        })?;
        let path = tree
            .find_ancestor(&covering, |node| node.kind().is_type_declaration())
            .ok_or_else(|| FixError::not_applicable(format!("no type declaration at {span}")))?;
        let node = tree
            .node_at(&path)
            .ok_or_else(|| FixError::not_applicable(format!("no node at {path}")))?;
        if node.span() != span {
            return Err(FixError::not_applicable(format!(
                "diagnostic span {span} does not match declaration span {}",
                node.span()
            )));
        }
        let declaration = TypeDeclaration::cast(node)
            .ok_or_else(|| FixError::not_applicable(format!("no type declaration at {span}")))?;

        let already_marked = declaration
            .attributes()
            .any(|attribute| attribute.name().is_some_and(catalog::is_marker));
        if already_marked {
            debug!(%span, "declaration already carries a marker");
            return Ok(AppliedFix {
                tree: tree.clone(),
                edit: None,
            });
        }

        let token = TimestampToken::from_datetime(self.clock.now())?;
        let (at, text) = marker_insertion(tree, &declaration, &token);

        let marker = make::single_attribute_list(catalog::MARKER_ATTRIBUTE, &token.to_string(), at);
        let rewritten = tree.replace(&path, declaration.with_attribute_list(marker))?;

        debug!(
            class = declaration.name().unwrap_or("<anonymous>"),
            %token,
            "generated migration number"
        );
        Ok(AppliedFix {
            tree: rewritten,
            edit: Some(TextEdit::insert(at, text)),
        })
    }

    /// Fix every fixable diagnostic of one tree in a single pass
    pub fn fix_all(&self, tree: &SyntaxTree, diagnostics: &[Diagnostic]) -> BatchFix {
        let mut edits = Vec::new();
        let mut failures = Vec::new();

        for diagnostic in diagnostics.iter().filter(|d| d.kind == DiagnosticKind::Missing) {
            match self.plan(tree, diagnostic) {
                Ok(AppliedFix {
                    edit: Some(edit), ..
                }) => edits.push(edit),
                Ok(_) => {}
                Err(error) => failures.push(FixFailure {
                    diagnostic: diagnostic.clone(),
                    error,
                }),
            }
        }

        edits.sort_by_key(|edit| edit.span.start);
        edits.dedup_by_key(|edit| edit.span.start);

        // last to first, so earlier offsets stay valid
        let mut source = tree.source().to_string();
        for edit in edits.iter().rev() {
            match edit.apply(&source) {
                Some(edited) => source = edited,
                None => warn!(span = %edit.span, "skipping edit outside the source"),
            }
        }

        BatchFix {
            source,
            edits,
            failures,
        }
    }
}

impl Default for FixSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply the fix for one diagnostic using the system clock
pub fn fix(tree: &SyntaxTree, diagnostic: &Diagnostic) -> Result<SyntaxTree, FixError> {
    FixSynthesizer::new().fix(tree, diagnostic)
}

/// Offset and text that add the marker to the source
fn marker_insertion(
    tree: &SyntaxTree,
    declaration: &TypeDeclaration<'_>,
    token: &TimestampToken,
) -> (usize, String) {
    let rendered = format!("[{}({token})]", catalog::MARKER_ATTRIBUTE);
    let source = tree.source();

    match declaration.attribute_lists().last().map(|list| list.syntax().span()) {
        Some(last) => {
            let at = last.end;
            let own_line = source[at..]
                .chars()
                .take_while(|c| c.is_whitespace())
                .any(|c| c == '\n');
            if own_line {
                let indent = leading_whitespace(line_prefix(tree, last.start));
                let newline = line_terminator(source, at);
                (at, format!("{newline}{indent}{rendered}"))
            } else {
                (at, format!(" {rendered}"))
            }
        }
        None => {
            let at = declaration.syntax().span().start;
            let prefix = line_prefix(tree, at);
            if prefix.trim().is_empty() {
                let newline = line_terminator(source, at);
                (at, format!("{rendered}{newline}{prefix}"))
            } else {
                (at, format!("{rendered} "))
            }
        }
    }
}

/// Line terminator to write at `at`: CRLF when the line there, or the first line, uses it
fn line_terminator(source: &str, at: usize) -> &'static str {
    let ends_with_cr = |newline: usize| source[..newline].ends_with('\r');
    let here = source
        .get(at..)
        .and_then(|rest| rest.find('\n'))
        .map(|offset| at + offset);

    if here.into_iter().chain(source.find('\n')).any(ends_with_cr) {
        "\r\n"
    } else {
        "\n"
    }
}

/// Text between the start of `offset`'s line and `offset`
fn line_prefix(tree: &SyntaxTree, offset: usize) -> &str {
    let line_start = tree
        .line_index()
        .line_start(tree.location(offset).line)
        .unwrap_or(0);
    &tree.source()[line_start..offset]
}

fn leading_whitespace(text: &str) -> &str {
    &text[..text.len() - text.trim_start().len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::walker::analyze;
    use crate::domain::FixedClock;
    use crate::syntax::SyntaxKind;
    use chrono::NaiveDate;

    fn synthesizer() -> FixSynthesizer {
        let token = TimestampToken::parse("202401011530").unwrap();
        FixSynthesizer::with_clock(Arc::new(FixedClock::at(token)))
    }

    fn missing(tree: &SyntaxTree) -> Vec<Diagnostic> {
        analyze(tree)
            .into_iter()
            .filter(|d| d.kind == DiagnosticKind::Missing)
            .collect()
    }

    fn class_at(tree: &SyntaxTree, index: usize) -> TypeDeclaration<'_> {
        let node = tree
            .preorder()
            .map(|(_, node)| node)
            .filter(|node| node.kind() == SyntaxKind::ClassDeclaration)
            .nth(index)
            .unwrap();
        TypeDeclaration::cast(node).unwrap()
    }

    #[test]
    fn test_fix_appends_marker_to_tree() {
        let tree = parse("namespace App\n{\n    public class AddUsers : Migration\n    {\n    }\n}\n").unwrap();
        let diagnostic = missing(&tree).remove(0);

        let fixed = synthesizer().fix(&tree, &diagnostic).unwrap();

        let class = class_at(&fixed, 0);
        let lists: Vec<String> = class.attribute_lists().map(|l| l.render()).collect();
        assert_eq!(lists, vec!["[Migration(202401011530)]"]);
        assert!(analyze(&fixed).is_empty());

        // the input tree is untouched
        assert_eq!(class_at(&tree, 0).attribute_lists().count(), 0);
        assert_eq!(missing(&tree).len(), 1);
    }

    #[test]
    fn test_fix_keeps_existing_attribute_lists_in_order() {
        let tree = parse("[Tags(\"users\")]\n[Profile(\"dev\")]\npublic class AddUsers : Migration { }").unwrap();
        let diagnostic = missing(&tree).remove(0);

        let fixed = synthesizer().fix(&tree, &diagnostic).unwrap();
        let class = class_at(&fixed, 0);

        assert_eq!(class.attribute_lists().count(), 3);
        let names: Vec<_> = class.attributes().filter_map(|a| a.name()).collect();
        assert_eq!(names, vec!["Tags", "Profile", "Migration"]);
        assert_eq!(class.name(), Some("AddUsers"));
        assert_eq!(class.base_types().collect::<Vec<_>>(), vec!["Migration"]);
    }

    #[test]
    fn test_fix_shares_unrelated_subtrees() {
        let tree = parse("class Other {}\nclass AddUsers : Migration {}").unwrap();
        let diagnostic = missing(&tree).remove(0);

        let fixed = synthesizer().fix(&tree, &diagnostic).unwrap();

        assert!(tree.root().children()[0].ptr_eq(&fixed.root().children()[0]));
        assert!(!tree.root().children()[1].ptr_eq(&fixed.root().children()[1]));
    }

    #[test]
    fn test_plan_edit_before_bare_declaration() {
        let source = "namespace App\n{\n    public class AddUsers : Migration\n    {\n    }\n}\n";
        let tree = parse(source).unwrap();
        let diagnostic = missing(&tree).remove(0);

        let edit = synthesizer().plan(&tree, &diagnostic).unwrap().edit.unwrap();

        assert_eq!(
            edit.apply(source).unwrap(),
            "namespace App\n{\n    [Migration(202401011530)]\n    public class AddUsers : Migration\n    {\n    }\n}\n"
        );
    }

    #[test]
    fn test_plan_edit_after_last_attribute_list() {
        let source = "    [Tags(\"x\")]\n    public class A : Migration { }\n";
        let tree = parse(source).unwrap();
        let diagnostic = missing(&tree).remove(0);

        let edit = synthesizer().plan(&tree, &diagnostic).unwrap().edit.unwrap();

        assert_eq!(
            edit.apply(source).unwrap(),
            "    [Tags(\"x\")]\n    [Migration(202401011530)]\n    public class A : Migration { }\n"
        );
    }

    #[test]
    fn test_plan_edit_keeps_crlf_line_endings() {
        let source = "    [Tags(\"x\")]\r\n    public class A : Migration { }\r\n";
        let tree = parse(source).unwrap();
        let diagnostic = missing(&tree).remove(0);

        let edit = synthesizer().plan(&tree, &diagnostic).unwrap().edit.unwrap();

        assert_eq!(
            edit.apply(source).unwrap(),
            "    [Tags(\"x\")]\r\n    [Migration(202401011530)]\r\n    public class A : Migration { }\r\n"
        );
    }

    #[test]
    fn test_fix_all_in_crlf_file_writes_no_bare_newlines() {
        let source = "namespace App\r\n{\r\n    [Tags(\"x\")]\r\n    public class A : Migration { }\r\n    public class B : Migration { }\r\n}\r\n";
        let tree = parse(source).unwrap();

        let batch = synthesizer().fix_all(&tree, &analyze(&tree));

        assert_eq!(batch.edits.len(), 2);
        assert_eq!(
            batch.source,
            "namespace App\r\n{\r\n    [Tags(\"x\")]\r\n    [Migration(202401011530)]\r\n    public class A : Migration { }\r\n    [Migration(202401011530)]\r\n    public class B : Migration { }\r\n}\r\n"
        );
        let bare_newlines = batch
            .source
            .match_indices('\n')
            .filter(|(at, _)| !batch.source[..*at].ends_with('\r'))
            .count();
        assert_eq!(bare_newlines, 0);
    }

    #[test]
    fn test_text_edit_rejects_spans_outside_the_source() {
        let source = "class Ä {}";

        assert_eq!(
            TextEdit::insert(0, "[X] ").apply(source).as_deref(),
            Some("[X] class Ä {}")
        );
        assert_eq!(TextEdit::insert(42, "x").apply(source), None);
        // byte 7 is inside the two-byte `Ä`
        assert_eq!(TextEdit::insert(7, "x").apply(source), None);
        let past_end = TextEdit {
            span: Span::new(0, 20),
            text: String::new(),
        };
        assert_eq!(past_end.apply(source), None);
    }

    #[test]
    fn test_plan_edit_on_shared_line() {
        let source = "[Tags(\"x\")] public class A : Migration { }";
        let tree = parse(source).unwrap();
        let diagnostic = missing(&tree).remove(0);

        let edit = synthesizer().plan(&tree, &diagnostic).unwrap().edit.unwrap();

        assert_eq!(
            edit.apply(source).unwrap(),
            "[Tags(\"x\")] [Migration(202401011530)] public class A : Migration { }"
        );
    }

    #[test]
    fn test_fix_is_idempotent_on_marked_declaration() {
        let tree = parse("public class AddUsers : Migration { }").unwrap();
        let diagnostic = missing(&tree).remove(0);
        let synthesizer = synthesizer();

        let once = synthesizer.fix(&tree, &diagnostic).unwrap();
        let twice = synthesizer.plan(&once, &diagnostic).unwrap();

        assert!(twice.edit.is_none());
        assert!(twice.tree.root().ptr_eq(once.root()));
    }

    #[test]
    fn test_fix_rejects_unfixable_and_stale_diagnostics() {
        let tree = parse("[Migration(\"abc\")] class A : Migration { }").unwrap();
        let invalid = analyze(&tree).remove(0);
        assert_eq!(
            synthesizer().fix(&tree, &invalid).unwrap_err(),
            FixError::Unsupported {
                id: "FM_Invalid".to_string()
            }
        );

        let original = parse("class Unrelated {}\n\n\nclass AddUsers : Migration { }").unwrap();
        let stale = missing(&original).remove(0);
        let other = parse("class Short {}").unwrap();
        assert!(matches!(
            synthesizer().fix(&other, &stale),
            Err(FixError::NotApplicable { .. })
        ));

        let no_type = parse("using System;\n").unwrap();
        let mut misplaced = stale.clone();
        misplaced.span = Span::new(2, 4);
        assert!(matches!(
            synthesizer().fix(&no_type, &misplaced),
            Err(FixError::NotApplicable { .. })
        ));
    }

    #[test]
    fn test_fix_reports_unrepresentable_clock() {
        let far_future = NaiveDate::from_ymd_opt(10_000, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let synthesizer = FixSynthesizer::with_clock(Arc::new(FixedClock(far_future)));

        let tree = parse("class A : Migration { }").unwrap();
        let diagnostic = missing(&tree).remove(0);

        assert!(matches!(
            synthesizer.fix(&tree, &diagnostic),
            Err(FixError::Timestamp(TimestampError::YearOutOfRange { year: 10_000 }))
        ));
    }

    #[test]
    fn test_fix_all_marks_every_class_and_reanalyzes_clean() {
        let source = "class A : Migration {} class B : Migration {}\nnamespace N\n{\n    [Tags(\"x\")]\n    class C : Migration\n    {\n        class D : Migration {}\n    }\n}\n";
        let tree = parse(source).unwrap();
        let diagnostics = analyze(&tree);
        assert_eq!(diagnostics.len(), 4);

        let batch = synthesizer().fix_all(&tree, &diagnostics);

        assert!(batch.is_changed());
        assert_eq!(batch.edits.len(), 4);
        assert!(batch.failures.is_empty());
        assert_eq!(batch.source.matches("[Migration(202401011530)]").count(), 4);
        assert!(batch
            .source
            .starts_with("[Migration(202401011530)]\nclass A : Migration {} [Migration(202401011530)] class B"));
        assert!(batch
            .source
            .contains("    [Tags(\"x\")]\n    [Migration(202401011530)]\n    class C : Migration"));
        assert!(analyze(&batch.tree().unwrap()).is_empty());
    }

    #[test]
    fn test_fix_all_collects_failures_without_aborting() {
        let tree = parse("class A : Migration {}").unwrap();
        let mut diagnostics = analyze(&tree);
        let mut stale = diagnostics[0].clone();
        stale.span = Span::new(500, 510);
        diagnostics.push(stale);

        let batch = synthesizer().fix_all(&tree, &diagnostics);

        assert_eq!(batch.edits.len(), 1);
        assert_eq!(batch.failures.len(), 1);
        assert!(matches!(
            batch.failures[0].error,
            FixError::NotApplicable { .. }
        ));
    }

    #[test]
    fn test_title() {
        assert_eq!(synthesizer().title(), "Generate Migration Number");
    }
}
