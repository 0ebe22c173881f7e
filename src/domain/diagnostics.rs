//! Rule diagnostics and their stable descriptors
//!
//! Diagnostic ids are part of the public surface (reports, configuration, CI annotations).
//! Never rename an id; add new kinds instead.

use crate::domain::timestamp::TIMESTAMP_PATTERN;
use crate::domain::violations::Severity;
use crate::syntax::{Location, Span};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Title of the automated fix for a missing marker
pub const GENERATE_MIGRATION_NUMBER: &str = "Generate Migration Number";

/// Category every migration rule reports under
pub const CATEGORY: &str = "Migrations";

/// Which rule produced a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A migration class without a `[Migration]` marker
    Missing,
    /// A `[Migration]` marker whose first argument is not a valid timestamp
    InvalidFormat,
}

/// Static metadata describing a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticDescriptor {
    pub id: &'static str,
    pub title: &'static str,
    /// Message with `{0}`, `{1}`... placeholders for the diagnostic's parameters
    pub message_format: &'static str,
    pub description: &'static str,
    pub category: &'static str,
    pub default_severity: Severity,
    /// Title of the automated fix, when one exists
    pub fix_title: Option<&'static str>,
}

static MISSING: DiagnosticDescriptor = DiagnosticDescriptor {
    id: "FM_Missing",
    title: "Missing migration attribute",
    message_format: "The migration attribute is missing",
    description: "Migration attribute is missing but can be generated",
    category: CATEGORY,
    default_severity: Severity::Warning,
    fix_title: Some(GENERATE_MIGRATION_NUMBER),
};

static INVALID_FORMAT: DiagnosticDescriptor = DiagnosticDescriptor {
    id: "FM_Invalid",
    title: "The migration number has incorrect format",
    message_format: "The migration number {0} should be yyyyMMddHHmm",
    description: "The migration number has to be of specific format",
    category: CATEGORY,
    default_severity: Severity::Error,
    fix_title: None,
};

impl DiagnosticKind {
    /// Every kind, in id order
    pub const ALL: [DiagnosticKind; 2] = [DiagnosticKind::Missing, DiagnosticKind::InvalidFormat];

    pub fn descriptor(self) -> &'static DiagnosticDescriptor {
        match self {
            Self::Missing => &MISSING,
            Self::InvalidFormat => &INVALID_FORMAT,
        }
    }

    pub fn id(self) -> &'static str {
        self.descriptor().id
    }

    /// Look a kind up by its diagnostic id
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    pub fn is_fixable(self) -> bool {
        self.descriptor().fix_title.is_some()
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A rule violation found in one syntax tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    /// Byte range of the node the diagnostic is anchored at
    pub span: Span,
    /// Start of `span` as line and column
    pub location: Location,
    /// Values substituted into the descriptor's message format
    pub params: Vec<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, severity: Severity, span: Span, location: Location) -> Self {
        Self {
            kind,
            severity,
            span,
            location,
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, param: impl Into<String>) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn id(&self) -> &'static str {
        self.kind.id()
    }

    pub fn descriptor(&self) -> &'static DiagnosticDescriptor {
        self.kind.descriptor()
    }

    /// Render the descriptor's message with this diagnostic's parameters
    pub fn message(&self) -> String {
        render_message(self.descriptor().message_format, &self.params)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} [{}] {}: {}",
            self.location.line,
            self.location.column,
            self.severity,
            self.id(),
            self.message()
        )
    }
}

/// Substitute `{n}` placeholders; unknown indices are left as written
fn render_message(format: &str, params: &[String]) -> String {
    let mut rendered = format.to_string();
    for (index, param) in params.iter().enumerate() {
        rendered = rendered.replace(&format!("{{{index}}}"), param);
    }
    rendered
}

/// Longer explanation for `migration-guard explain`
pub fn explanation(kind: DiagnosticKind) -> String {
    match kind {
        DiagnosticKind::Missing => format!(
            "A class listing `Migration` in its base types must carry a [Migration(<version>)] \
             attribute. The fix appends one whose version is the current local time as {TIMESTAMP_PATTERN}."
        ),
        DiagnosticKind::InvalidFormat => format!(
            "The first argument of a [Migration] attribute must be exactly twelve digits forming a \
             valid {TIMESTAMP_PATTERN} date and time, e.g. 202401011530."
        ),
    }
}
