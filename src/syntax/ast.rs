//! Typed views over `SyntaxNode`s and factories for synthesized nodes
//!
//! Views borrow a node and expose its parts by name; they never own or change it. Rewrites go
//! through `with_*` methods that return fresh nodes for `SyntaxTree::replace`.

use super::{Span, SyntaxKind, SyntaxNode};

/// Any of class, struct, interface or record declaration
#[derive(Debug, Clone, Copy)]
pub struct TypeDeclaration<'a>(&'a SyntaxNode);

impl<'a> TypeDeclaration<'a> {
    pub fn cast(node: &'a SyntaxNode) -> Option<Self> {
        node.kind().is_type_declaration().then_some(Self(node))
    }

    pub fn syntax(&self) -> &'a SyntaxNode {
        self.0
    }

    pub fn is_class(&self) -> bool {
        self.0.kind() == SyntaxKind::ClassDeclaration
    }

    pub fn name(&self) -> Option<&'a str> {
        self.0
            .first_child_of_kind(SyntaxKind::IdentifierName)
            .and_then(SyntaxNode::text)
    }

    pub fn attribute_lists(&self) -> impl Iterator<Item = AttributeList<'a>> {
        self.0
            .children_of_kind(SyntaxKind::AttributeList)
            .map(AttributeList)
    }

    /// Attributes of every attribute list, in source order
    pub fn attributes(&self) -> impl Iterator<Item = Attribute<'a>> {
        self.attribute_lists().flat_map(|list| list.attributes())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes().any(|attribute| attribute.name() == Some(name))
    }

    pub fn base_list(&self) -> Option<BaseList<'a>> {
        self.0.first_child_of_kind(SyntaxKind::BaseList).map(BaseList)
    }

    /// Verbatim text of each base type, in source order
    pub fn base_types(&self) -> impl Iterator<Item = &'a str> {
        self.base_list().into_iter().flat_map(|list| list.types())
    }

    /// Nested type declarations
    pub fn members(&self) -> impl Iterator<Item = TypeDeclaration<'a>> {
        self.0.children().iter().filter_map(TypeDeclaration::cast)
    }

    /// Copy of the declaration with `list` appended after its existing attribute lists
    pub fn with_attribute_list(&self, list: SyntaxNode) -> SyntaxNode {
        let insert_at = self
            .0
            .children()
            .iter()
            .rposition(|child| child.kind() == SyntaxKind::AttributeList)
            .map(|index| index + 1)
            .unwrap_or(0);

        let mut children = self.0.children().to_vec();
        children.insert(insert_at, list);
        self.0.with_children(children)
    }
}

/// `[target: A, B(...)]`
#[derive(Debug, Clone, Copy)]
pub struct AttributeList<'a>(&'a SyntaxNode);

impl<'a> AttributeList<'a> {
    pub fn cast(node: &'a SyntaxNode) -> Option<Self> {
        (node.kind() == SyntaxKind::AttributeList).then_some(Self(node))
    }

    pub fn syntax(&self) -> &'a SyntaxNode {
        self.0
    }

    /// `assembly`, `return`, ... when the list has an explicit target
    pub fn target(&self) -> Option<&'a str> {
        self.0.text()
    }

    pub fn attributes(&self) -> impl Iterator<Item = Attribute<'a>> {
        self.0.children_of_kind(SyntaxKind::Attribute).map(Attribute)
    }

    /// Source form of the list, e.g. `[Migration(202401011530)]`
    pub fn render(&self) -> String {
        let attributes: Vec<String> = self.attributes().map(|a| a.render()).collect();
        match self.target() {
            Some(target) => format!("[{target}: {}]", attributes.join(", ")),
            None => format!("[{}]", attributes.join(", ")),
        }
    }
}

/// A single attribute application
#[derive(Debug, Clone, Copy)]
pub struct Attribute<'a>(&'a SyntaxNode);

impl<'a> Attribute<'a> {
    pub fn cast(node: &'a SyntaxNode) -> Option<Self> {
        (node.kind() == SyntaxKind::Attribute).then_some(Self(node))
    }

    pub fn syntax(&self) -> &'a SyntaxNode {
        self.0
    }

    /// Name exactly as written, e.g. `Migration` or `FluentMigrator.Migration`
    pub fn name(&self) -> Option<&'a str> {
        self.0
            .first_child_of_kind(SyntaxKind::IdentifierName)
            .and_then(SyntaxNode::text)
    }

    /// `None` when the attribute has no parentheses at all
    pub fn argument_list(&self) -> Option<&'a SyntaxNode> {
        self.0.first_child_of_kind(SyntaxKind::AttributeArgumentList)
    }

    pub fn arguments(&self) -> impl Iterator<Item = AttributeArgument<'a>> {
        self.argument_list()
            .into_iter()
            .flat_map(|list| list.children_of_kind(SyntaxKind::AttributeArgument))
            .map(AttributeArgument)
    }

    pub fn render(&self) -> String {
        let name = self.name().unwrap_or_default();
        match self.argument_list() {
            Some(_) => {
                let arguments: Vec<String> = self.arguments().map(|a| a.render()).collect();
                format!("{name}({})", arguments.join(", "))
            }
            None => name.to_string(),
        }
    }
}

/// One argument of an attribute, positional or named
#[derive(Debug, Clone, Copy)]
pub struct AttributeArgument<'a>(&'a SyntaxNode);

impl<'a> AttributeArgument<'a> {
    pub fn syntax(&self) -> &'a SyntaxNode {
        self.0
    }

    /// Name of a `name: value` or `Name = value` argument
    pub fn name(&self) -> Option<&'a str> {
        self.0
            .first_child_of_kind(SyntaxKind::IdentifierName)
            .and_then(SyntaxNode::text)
    }

    pub fn expression(&self) -> Option<&'a SyntaxNode> {
        self.0.first_child_of_kind(SyntaxKind::Expression)
    }

    /// Verbatim expression text, without the argument name
    pub fn expression_text(&self) -> &'a str {
        self.expression()
            .and_then(SyntaxNode::text)
            .unwrap_or_default()
    }

    pub fn render(&self) -> String {
        match (self.name(), self.0.text()) {
            (Some(name), Some(":")) => format!("{name}: {}", self.expression_text()),
            (Some(name), _) => format!("{name} = {}", self.expression_text()),
            (None, _) => self.expression_text().to_string(),
        }
    }
}

/// `: A, B<T>`
#[derive(Debug, Clone, Copy)]
pub struct BaseList<'a>(&'a SyntaxNode);

impl<'a> BaseList<'a> {
    pub fn types(&self) -> impl Iterator<Item = &'a str> {
        self.0
            .children_of_kind(SyntaxKind::BaseType)
            .filter_map(SyntaxNode::text)
    }
}

/// Constructors for nodes that do not come from source text
pub mod make {
    use super::*;

    pub fn identifier(name: &str, span: Span) -> SyntaxNode {
        SyntaxNode::leaf(SyntaxKind::IdentifierName, span, name)
    }

    pub fn expression(text: &str, span: Span) -> SyntaxNode {
        SyntaxNode::leaf(SyntaxKind::Expression, span, text)
    }

    pub fn positional_argument(expression: SyntaxNode) -> SyntaxNode {
        let span = expression.span();
        SyntaxNode::new(SyntaxKind::AttributeArgument, span, vec![expression])
    }

    pub fn argument_list(arguments: Vec<SyntaxNode>, span: Span) -> SyntaxNode {
        SyntaxNode::new(SyntaxKind::AttributeArgumentList, span, arguments)
    }

    pub fn attribute(name: &str, arguments: Option<Vec<SyntaxNode>>, span: Span) -> SyntaxNode {
        let mut children = vec![identifier(name, span)];
        if let Some(arguments) = arguments {
            children.push(argument_list(arguments, span));
        }
        SyntaxNode::new(SyntaxKind::Attribute, span, children)
    }

    pub fn attribute_list(attributes: Vec<SyntaxNode>, span: Span) -> SyntaxNode {
        SyntaxNode::new(SyntaxKind::AttributeList, span, attributes)
    }

    /// `[name(literal)]` with every node anchored at the empty span `at`
    pub fn single_attribute_list(name: &str, literal: &str, at: usize) -> SyntaxNode {
        let span = Span::empty(at);
        let argument = positional_argument(expression(literal, span));
        attribute_list(vec![attribute(name, Some(vec![argument]), span)], span)
    }
}
