//! Immutable syntax trees for C# declarations
//!
//! Architecture: Persistent Data Structure - trees are never edited in place
//! - `SyntaxNode` is an `Arc`-shared node; cloning a node or a tree is cheap
//! - Nodes are addressed by `NodePath` (child indices from the root)
//! - `SyntaxTree::replace` copies only the path from the root to the replaced node and shares
//!   every other subtree with the original tree

pub mod ast;
pub mod lexer;
pub mod parser;

pub use parser::parse;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Errors raised while lexing, parsing or rewriting a tree
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyntaxError {
    #[error("unterminated block comment starting at byte {offset}")]
    UnterminatedComment { offset: usize },

    #[error("unterminated literal starting at byte {offset}")]
    UnterminatedLiteral { offset: usize },

    #[error("no node at path {path}")]
    InvalidPath { path: String },
}

/// Half-open byte range `[start, end)` into the source text
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {start} after end {end}");
        Self { start, end }
    }

    /// Zero-width span, used for synthesized nodes at their insertion point
    pub fn empty(at: usize) -> Self {
        Self { start: at, end: at }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    /// Smallest span covering both
    pub fn cover(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// 1-based line and column; columns count characters, not bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

/// Byte offsets of line starts, for offset → line/column conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { line_starts }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Location of a byte offset; offsets past the end clamp to the end
    pub fn location(&self, text: &str, offset: usize) -> Location {
        let offset = offset.min(text.len());
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let line_start = self.line_starts[line - 1];
        let column = text
            .get(line_start..offset)
            .map(|prefix| prefix.chars().count())
            .unwrap_or(offset - line_start);

        Location {
            line: line as u32,
            column: column as u32 + 1,
        }
    }

    /// Byte offset where a 1-based line starts
    pub fn line_start(&self, line: u32) -> Option<usize> {
        let index = (line as usize).checked_sub(1)?;
        self.line_starts.get(index).copied()
    }

    /// Text of a 1-based line without its line terminator
    pub fn line_text<'a>(&self, text: &'a str, line: u32) -> Option<&'a str> {
        let start = self.line_start(line)?;
        let end = self
            .line_starts
            .get(line as usize)
            .copied()
            .unwrap_or(text.len());
        text.get(start..end)
            .map(|l| l.trim_end_matches('\n').trim_end_matches('\r'))
    }
}

/// The node shapes the declaration parser produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SyntaxKind {
    CompilationUnit,
    NamespaceDeclaration,
    ClassDeclaration,
    StructDeclaration,
    InterfaceDeclaration,
    RecordDeclaration,
    /// Any other member; kept only to carry its attribute lists
    MemberDeclaration,
    AttributeList,
    Attribute,
    AttributeArgumentList,
    AttributeArgument,
    BaseList,
    BaseType,
    IdentifierName,
    Expression,
}

impl SyntaxKind {
    pub fn is_type_declaration(self) -> bool {
        matches!(
            self,
            Self::ClassDeclaration
                | Self::StructDeclaration
                | Self::InterfaceDeclaration
                | Self::RecordDeclaration
        )
    }

    /// Whether a node of this kind can have attributes or type declarations below it
    pub fn may_contain_declarations(self) -> bool {
        matches!(
            self,
            Self::CompilationUnit
                | Self::NamespaceDeclaration
                | Self::ClassDeclaration
                | Self::StructDeclaration
                | Self::InterfaceDeclaration
                | Self::RecordDeclaration
                | Self::MemberDeclaration
                | Self::AttributeList
        )
    }
}

#[derive(Debug, PartialEq, Eq)]
struct NodeData {
    kind: SyntaxKind,
    span: Span,
    text: Option<Box<str>>,
    children: Vec<SyntaxNode>,
}

/// An immutable, cheaply clonable syntax node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxNode(Arc<NodeData>);

impl SyntaxNode {
    /// Interior node
    pub fn new(kind: SyntaxKind, span: Span, children: Vec<SyntaxNode>) -> Self {
        Self(Arc::new(NodeData {
            kind,
            span,
            text: None,
            children,
        }))
    }

    /// Leaf node carrying verbatim source text
    pub fn leaf(kind: SyntaxKind, span: Span, text: impl Into<Box<str>>) -> Self {
        Self(Arc::new(NodeData {
            kind,
            span,
            text: Some(text.into()),
            children: Vec::new(),
        }))
    }

    /// Interior node with an extra text slot (attribute targets, argument separators)
    pub fn with_text(
        kind: SyntaxKind,
        span: Span,
        text: Option<Box<str>>,
        children: Vec<SyntaxNode>,
    ) -> Self {
        Self(Arc::new(NodeData {
            kind,
            span,
            text,
            children,
        }))
    }

    pub fn kind(&self) -> SyntaxKind {
        self.0.kind
    }

    pub fn span(&self) -> Span {
        self.0.span
    }

    pub fn text(&self) -> Option<&str> {
        self.0.text.as_deref()
    }

    pub fn children(&self) -> &[SyntaxNode] {
        &self.0.children
    }

    pub fn children_of_kind(&self, kind: SyntaxKind) -> impl Iterator<Item = &SyntaxNode> {
        self.0.children.iter().filter(move |c| c.kind() == kind)
    }

    pub fn first_child_of_kind(&self, kind: SyntaxKind) -> Option<&SyntaxNode> {
        self.children_of_kind(kind).next()
    }

    /// Copy of this node with a new child list
    pub fn with_children(&self, children: Vec<SyntaxNode>) -> SyntaxNode {
        Self(Arc::new(NodeData {
            kind: self.0.kind,
            span: self.0.span,
            text: self.0.text.clone(),
            children,
        }))
    }

    /// Whether both handles point at the same shared node
    pub fn ptr_eq(&self, other: &SyntaxNode) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Number of nodes in this subtree
    pub fn subtree_size(&self) -> usize {
        1 + self.children().iter().map(SyntaxNode::subtree_size).sum::<usize>()
    }
}

/// Address of a node: child indices walked from the root
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.0.split_last()?;
        Some(Self(rest.to_vec()))
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("/")?;
        let parts: Vec<String> = self.0.iter().map(usize::to_string).collect();
        f.write_str(&parts.join("/"))
    }
}

/// A parsed source file: root node plus the text its spans point into
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    root: SyntaxNode,
    source: Arc<str>,
    line_index: Arc<LineIndex>,
}

impl SyntaxTree {
    pub fn new(root: SyntaxNode, source: impl Into<Arc<str>>) -> Self {
        let source = source.into();
        let line_index = Arc::new(LineIndex::new(&source));
        Self {
            root,
            source,
            line_index,
        }
    }

    pub fn root(&self) -> &SyntaxNode {
        &self.root
    }

    /// Original source text; spans of every node, rewritten or not, index into it
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    pub fn location(&self, offset: usize) -> Location {
        self.line_index.location(&self.source, offset)
    }

    pub fn line_text(&self, line: u32) -> Option<&str> {
        self.line_index.line_text(&self.source, line)
    }

    /// Source text under a span, if the span lies within the source
    pub fn slice(&self, span: Span) -> Option<&str> {
        self.source.get(span.start..span.end)
    }

    pub fn node_at(&self, path: &NodePath) -> Option<&SyntaxNode> {
        path.indices()
            .iter()
            .try_fold(&self.root, |node, &index| node.children().get(index))
    }

    /// Path of the deepest node whose span contains `offset`
    pub fn covering_path(&self, offset: usize) -> Option<NodePath> {
        if !self.root.span().contains(offset) {
            return None;
        }

        let mut path = NodePath::root();
        let mut node = &self.root;
        while let Some((index, child)) = node
            .children()
            .iter()
            .enumerate()
            .find(|(_, child)| child.span().contains(offset))
        {
            path = path.child(index);
            node = child;
        }
        Some(path)
    }

    /// Nearest ancestor-or-self of `path` satisfying `predicate`
    pub fn find_ancestor(
        &self,
        path: &NodePath,
        predicate: impl Fn(&SyntaxNode) -> bool,
    ) -> Option<NodePath> {
        let mut current = Some(path.clone());
        while let Some(candidate) = current {
            if self.node_at(&candidate).is_some_and(&predicate) {
                return Some(candidate);
            }
            current = candidate.parent();
        }
        None
    }

    /// New tree with the node at `path` swapped for `replacement`
    pub fn replace(&self, path: &NodePath, replacement: SyntaxNode) -> Result<SyntaxTree, SyntaxError> {
        let root = replace_at(&self.root, path.indices(), replacement).ok_or_else(|| {
            SyntaxError::InvalidPath {
                path: path.to_string(),
            }
        })?;

        Ok(Self {
            root,
            source: Arc::clone(&self.source),
            line_index: Arc::clone(&self.line_index),
        })
    }

    /// Pre-order traversal of every node with its path
    pub fn preorder(&self) -> Preorder<'_> {
        Preorder {
            stack: vec![(NodePath::root(), &self.root)],
        }
    }
}

fn replace_at(node: &SyntaxNode, indices: &[usize], replacement: SyntaxNode) -> Option<SyntaxNode> {
    let Some((&index, rest)) = indices.split_first() else {
        return Some(replacement);
    };

    let child = node.children().get(index)?;
    let new_child = replace_at(child, rest, replacement)?;
    let mut children = node.children().to_vec();
    children[index] = new_child;
    Some(node.with_children(children))
}

/// Iterator returned by [`SyntaxTree::preorder`]
pub struct Preorder<'a> {
    stack: Vec<(NodePath, &'a SyntaxNode)>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = (NodePath, &'a SyntaxNode);

    fn next(&mut self) -> Option<Self::Item> {
        let (path, node) = self.stack.pop()?;
        for (index, child) in node.children().iter().enumerate().rev() {
            self.stack.push((path.child(index), child));
        }
        Some((path, node))
    }
}
