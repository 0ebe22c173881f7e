//! Tolerant recursive-descent parser for C# declarations
//!
//! Only the declaration skeleton is modelled: namespaces, type declarations, their attribute
//! lists and base lists. Member bodies are skipped by brace matching. Malformed input never
//! fails the parse; the parser recovers at the next `;`, `}` or end of file.

use super::lexer::{tokenize, Token, TokenKind};
use super::{Span, SyntaxError, SyntaxKind, SyntaxNode, SyntaxTree};

const MODIFIERS: &[&str] = &[
    "public",
    "private",
    "protected",
    "internal",
    "file",
    "static",
    "abstract",
    "sealed",
    "partial",
    "unsafe",
    "new",
    "readonly",
    "ref",
    "extern",
    "virtual",
    "override",
    "async",
    "volatile",
    "const",
    "required",
];

/// Parse C# source into a syntax tree
pub fn parse(source: &str) -> Result<SyntaxTree, SyntaxError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        last_end: 0,
    };

    let members = parser.members(false);
    let root = SyntaxNode::new(
        SyntaxKind::CompilationUnit,
        Span::new(0, source.len()),
        members,
    );
    Ok(SyntaxTree::new(root, source))
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    /// End offset of the last consumed token
    last_end: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_text(&self) -> Option<&'a str> {
        self.nth_text(0)
    }

    fn nth_text(&self, n: usize) -> Option<&'a str> {
        let source = self.source;
        self.tokens.get(self.pos + n).map(|t| t.text(source))
    }

    fn at(&self, text: &str) -> bool {
        self.peek_text() == Some(text)
    }

    fn at_ident(&self) -> bool {
        self.peek().is_some_and(|t| t.kind == TokenKind::Ident)
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.peek()?;
        self.pos += 1;
        self.last_end = token.span.end;
        Some(token)
    }

    fn eat(&mut self, text: &str) -> bool {
        if self.at(text) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Start offset of the token at `index`, or the current end when past the last token
    fn offset_of(&self, index: usize) -> usize {
        self.tokens
            .get(index)
            .map(|t| t.span.start)
            .unwrap_or(self.last_end)
    }

    /// Members until end of file, or until the closing `}` of the enclosing body
    fn members(&mut self, in_body: bool) -> Vec<SyntaxNode> {
        let mut members = Vec::new();
        loop {
            match self.peek_text() {
                None => break,
                Some("}") if in_body => break,
                _ => {}
            }

            let before = self.pos;
            if let Some(member) = self.member(in_body) {
                members.push(member);
            }
            if self.pos == before {
                self.bump();
            }
        }
        members
    }

    fn member(&mut self, in_body: bool) -> Option<SyntaxNode> {
        let start_index = self.pos;
        let mut attribute_lists = Vec::new();

        while self.at("[") {
            let list = self.attribute_list();
            let global = matches!(list.text(), Some("assembly") | Some("module"));
            if global && attribute_lists.is_empty() {
                return Some(list);
            }
            attribute_lists.push(list);
        }

        while self.peek_text().is_some_and(|t| MODIFIERS.contains(&t)) {
            self.bump();
        }

        let start = self.offset_of(start_index);
        match self.peek_text() {
            Some("namespace") => Some(self.namespace(start, attribute_lists, in_body)),
            Some("class") => Some(self.type_declaration(SyntaxKind::ClassDeclaration, start, attribute_lists)),
            Some("struct") => Some(self.type_declaration(SyntaxKind::StructDeclaration, start, attribute_lists)),
            Some("interface") => {
                Some(self.type_declaration(SyntaxKind::InterfaceDeclaration, start, attribute_lists))
            }
            Some("record") if self.is_record_declaration() => {
                Some(self.type_declaration(SyntaxKind::RecordDeclaration, start, attribute_lists))
            }
            _ => {
                self.skip_member();
                if attribute_lists.is_empty() {
                    None
                } else {
                    let span = Span::new(start, self.last_end.max(start));
                    Some(SyntaxNode::new(
                        SyntaxKind::MemberDeclaration,
                        span,
                        attribute_lists,
                    ))
                }
            }
        }
    }

    fn is_record_declaration(&self) -> bool {
        let next_is_name = self
            .tokens
            .get(self.pos + 1)
            .is_some_and(|t| t.kind == TokenKind::Ident);
        next_is_name || matches!(self.nth_text(1), Some("class") | Some("struct"))
    }

    fn namespace(&mut self, start: usize, attribute_lists: Vec<SyntaxNode>, in_body: bool) -> SyntaxNode {
        self.bump();
        let mut children = attribute_lists;
        if let Some(name) = self.qualified_name() {
            children.push(name);
        }

        if self.eat("{") {
            children.extend(self.members(true));
            self.eat("}");
        } else if self.eat(";") {
            // file-scoped: every following member belongs to the namespace
            children.extend(self.members(in_body));
        }

        SyntaxNode::new(
            SyntaxKind::NamespaceDeclaration,
            Span::new(start, self.last_end.max(start)),
            children,
        )
    }

    fn type_declaration(
        &mut self,
        kind: SyntaxKind,
        start: usize,
        attribute_lists: Vec<SyntaxNode>,
    ) -> SyntaxNode {
        // keyword, plus `class`/`struct` after `record`
        self.bump();
        if kind == SyntaxKind::RecordDeclaration && (self.at("class") || self.at("struct")) {
            self.bump();
        }

        let mut children = attribute_lists;
        if self.at_ident() {
            if let Some(token) = self.bump() {
                children.push(SyntaxNode::leaf(
                    SyntaxKind::IdentifierName,
                    token.span,
                    token.text(self.source),
                ));
            }
        }

        if self.at("<") {
            self.skip_balanced("<", ">");
        }
        if self.at("(") {
            self.skip_balanced("(", ")");
        }
        if self.at(":") {
            children.push(self.base_list());
        }

        // constraint clauses
        while !self.at_eof() && !self.at("{") && !self.at(";") && !self.at("}") {
            self.bump();
        }

        if self.eat("{") {
            children.extend(self.members(true));
            self.eat("}");
            self.eat(";");
        } else {
            self.eat(";");
        }

        SyntaxNode::new(kind, Span::new(start, self.last_end.max(start)), children)
    }

    fn base_list(&mut self) -> SyntaxNode {
        let start = self.bump().map(|t| t.span.start).unwrap_or(self.last_end);
        let mut types = Vec::new();
        let mut current: Option<Span> = None;
        let mut depth = 0usize;

        while let Some(token) = self.peek() {
            let text = token.text(self.source);
            if depth == 0 {
                if matches!(text, "{" | ";" | "}") || (text == "where" && token.kind == TokenKind::Ident) {
                    break;
                }
                if text == "," {
                    if let Some(span) = current.take() {
                        types.push(self.base_type(span));
                    }
                    self.bump();
                    continue;
                }
            }

            match text {
                "<" | "(" | "[" => depth += 1,
                ">" | ")" | "]" => depth = depth.saturating_sub(1),
                _ => {}
            }
            current = Some(match current {
                Some(span) => span.cover(token.span),
                None => token.span,
            });
            self.bump();
        }
        if let Some(span) = current {
            types.push(self.base_type(span));
        }

        SyntaxNode::new(
            SyntaxKind::BaseList,
            Span::new(start, self.last_end.max(start)),
            types,
        )
    }

    fn base_type(&self, span: Span) -> SyntaxNode {
        SyntaxNode::leaf(
            SyntaxKind::BaseType,
            span,
            &self.source[span.start..span.end],
        )
    }

    /// `A.B::C` as one identifier leaf
    fn qualified_name(&mut self) -> Option<SyntaxNode> {
        if !self.at_ident() {
            return None;
        }

        let first = self.bump()?.span;
        let mut span = first;
        while (self.at(".") || self.at("::"))
            && self
                .tokens
                .get(self.pos + 1)
                .is_some_and(|t| t.kind == TokenKind::Ident)
        {
            self.bump();
            if let Some(token) = self.bump() {
                span = span.cover(token.span);
            }
        }

        Some(SyntaxNode::leaf(
            SyntaxKind::IdentifierName,
            span,
            &self.source[span.start..span.end],
        ))
    }

    fn attribute_list(&mut self) -> SyntaxNode {
        let start = self.bump().map(|t| t.span.start).unwrap_or(self.last_end);

        let mut target = None;
        if self.at_ident() && self.nth_text(1) == Some(":") {
            target = self.peek_text().map(Box::from);
            self.bump();
            self.bump();
        }

        let mut attributes = Vec::new();
        while !self.at_eof() && !self.at("]") {
            match self.attribute() {
                Some(attribute) => attributes.push(attribute),
                None => break,
            }
            if !self.eat(",") {
                break;
            }
        }

        // recover from anything the attribute grammar did not consume
        while !self.at_eof() && !self.at("]") {
            self.bump();
        }
        self.eat("]");

        SyntaxNode::with_text(
            SyntaxKind::AttributeList,
            Span::new(start, self.last_end.max(start)),
            target,
            attributes,
        )
    }

    fn attribute(&mut self) -> Option<SyntaxNode> {
        let mut name = self.qualified_name()?;
        let start = name.span().start;
        if self.at("<") {
            // type arguments belong to the name text: `Migration<int>` is not `Migration`
            self.skip_balanced("<", ">");
            let span = Span::new(start, self.last_end.max(start));
            name = SyntaxNode::leaf(
                SyntaxKind::IdentifierName,
                span,
                &self.source[span.start..span.end],
            );
        }

        let mut children = vec![name];
        if self.at("(") {
            children.push(self.argument_list());
        }

        Some(SyntaxNode::new(
            SyntaxKind::Attribute,
            Span::new(start, self.last_end.max(start)),
            children,
        ))
    }

    fn argument_list(&mut self) -> SyntaxNode {
        let start = self.bump().map(|t| t.span.start).unwrap_or(self.last_end);
        let mut arguments = Vec::new();

        while !self.at_eof() && !self.at(")") {
            let first = self.pos;
            let mut depth = 0usize;
            while let Some(text) = self.peek_text() {
                if depth == 0 && (text == "," || text == ")") {
                    break;
                }
                match text {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => depth = depth.saturating_sub(1),
                    _ => {}
                }
                self.bump();
            }

            if self.pos > first {
                arguments.push(self.argument(first, self.pos));
            } else if self.at(",") {
                arguments.push(self.missing_argument());
            }
            if !self.eat(",") {
                break;
            }
        }
        self.eat(")");

        SyntaxNode::new(
            SyntaxKind::AttributeArgumentList,
            Span::new(start, self.last_end.max(start)),
            arguments,
        )
    }

    /// Argument made of tokens `[first, end)`
    fn argument(&self, first: usize, end: usize) -> SyntaxNode {
        let tokens = &self.tokens[first..end];
        let span = tokens[0].span.cover(tokens[tokens.len() - 1].span);

        let named = tokens.len() >= 3
            && tokens[0].kind == TokenKind::Ident
            && matches!(tokens[1].text(self.source), "=" | ":");

        let (name, separator, expression_tokens) = if named {
            let name = SyntaxNode::leaf(
                SyntaxKind::IdentifierName,
                tokens[0].span,
                tokens[0].text(self.source),
            );
            (Some(name), Some(Box::from(tokens[1].text(self.source))), &tokens[2..])
        } else {
            (None, None, tokens)
        };

        let expression_span =
            expression_tokens[0].span.cover(expression_tokens[expression_tokens.len() - 1].span);
        let expression = SyntaxNode::leaf(
            SyntaxKind::Expression,
            expression_span,
            &self.source[expression_span.start..expression_span.end],
        );

        let mut children: Vec<SyntaxNode> = name.into_iter().collect();
        children.push(expression);
        SyntaxNode::with_text(SyntaxKind::AttributeArgument, span, separator, children)
    }

    /// Empty argument before a `,`, e.g. the first one in `(, 1)`; it keeps its position
    fn missing_argument(&self) -> SyntaxNode {
        let at = self
            .tokens
            .get(self.pos)
            .map_or(self.last_end, |token| token.span.start);
        let span = Span::empty(at);
        let expression = SyntaxNode::leaf(SyntaxKind::Expression, span, "");
        SyntaxNode::new(SyntaxKind::AttributeArgument, span, vec![expression])
    }

    /// Consume an `open ... close` group, counting nested pairs
    fn skip_balanced(&mut self, open: &str, close: &str) {
        let mut depth = 0usize;
        while let Some(text) = self.peek_text() {
            self.bump();
            if text == open {
                depth += 1;
            } else if text == close {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return;
                }
            }
        }
    }

    /// Skip a member the rules do not look at; stops before a closing `}` of the container
    /// and before stray closers
    fn skip_member(&mut self) {
        loop {
            match self.peek_text() {
                None | Some("}") | Some(")") | Some("]") => break,
                Some(";") => {
                    self.bump();
                    break;
                }
                Some("{") => {
                    self.skip_balanced("{", "}");
                    // property initializers and lambda fields continue after the block
                    if self.eat(";") || !(self.at("=") || self.at("=>")) {
                        break;
                    }
                }
                Some("(") => self.skip_balanced("(", ")"),
                Some("[") => self.skip_balanced("[", "]"),
                Some(_) => {
                    self.bump();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::ast::TypeDeclaration;

    fn kinds(node: &SyntaxNode) -> Vec<SyntaxKind> {
        node.children().iter().map(SyntaxNode::kind).collect()
    }

    fn type_names(source: &str) -> Vec<String> {
        let tree = parse(source).unwrap();
        tree.preorder()
            .filter_map(|(_, node)| TypeDeclaration::cast(node))
            .filter_map(|t| t.name().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_class_with_attributes_and_bases() {
        let source = "[Migration(202401011530)]\npublic class AddUsers : Migration\n{\n    public override void Up() { }\n}\n";
        let tree = parse(source).unwrap();

        let class = &tree.root().children()[0];
        assert_eq!(class.kind(), SyntaxKind::ClassDeclaration);
        assert_eq!(class.span().start, 0);
        assert_eq!(tree.slice(class.span()).unwrap().chars().last(), Some('}'));
        assert_eq!(
            kinds(class),
            vec![
                SyntaxKind::AttributeList,
                SyntaxKind::IdentifierName,
                SyntaxKind::BaseList
            ]
        );

        let list = &class.children()[0];
        assert_eq!(tree.slice(list.span()), Some("[Migration(202401011530)]"));
        let argument = &list.children()[0].children()[1].children()[0];
        assert_eq!(argument.kind(), SyntaxKind::AttributeArgument);
        assert_eq!(tree.slice(argument.span()), Some("202401011530"));
    }

    #[test]
    fn test_declaration_span_starts_at_modifiers_without_attributes() {
        let source = "namespace N {\n    internal sealed class A : Migration { }\n}";
        let tree = parse(source).unwrap();

        let namespace = &tree.root().children()[0];
        assert_eq!(namespace.kind(), SyntaxKind::NamespaceDeclaration);
        let class = namespace.children_of_kind(SyntaxKind::ClassDeclaration).next().unwrap();
        assert_eq!(tree.slice(class.span()), Some("internal sealed class A : Migration { }"));
    }

    #[test]
    fn test_file_scoped_namespace_owns_following_members() {
        let source = "using FluentMigrator;\nnamespace App.Migrations;\n\nclass A : Migration {}\nclass B {}\n";
        let tree = parse(source).unwrap();

        assert_eq!(kinds(tree.root()), vec![SyntaxKind::NamespaceDeclaration]);
        let namespace = &tree.root().children()[0];
        assert_eq!(namespace.children()[0].text(), Some("App.Migrations"));
        assert_eq!(type_names(source), vec!["A", "B"]);
    }

    #[test]
    fn test_nested_types_records_and_generics() {
        let source = r#"
namespace Outer { namespace Inner {
    public partial class Host<T> where T : class, new()
    {
        private readonly int _x = 1;
        public string Name { get; set; } = "{";
        public record Entry(int Id) : Base<Entry>;
        public record struct Point(int X, int Y);
        class Step : Migration { void Up() { if (true) { } } }
    }
    struct S : IComparable<S>, IEquatable<S> { }
    interface IMarker { }
}}
"#;
        assert_eq!(
            type_names(source),
            vec!["Host", "Entry", "Point", "Step", "S", "IMarker"]
        );

        let tree = parse(source).unwrap();
        let s = tree
            .preorder()
            .filter_map(|(_, n)| TypeDeclaration::cast(n))
            .find(|t| t.name() == Some("S"))
            .unwrap();
        assert_eq!(
            s.base_types().collect::<Vec<_>>(),
            vec!["IComparable<S>", "IEquatable<S>"]
        );
    }

    #[test]
    fn test_base_list_stops_at_where_clause() {
        let tree = parse("class A<T> : Migration where T : new() { }").unwrap();
        let class = TypeDeclaration::cast(&tree.root().children()[0]).unwrap();
        assert_eq!(class.base_types().collect::<Vec<_>>(), vec!["Migration"]);
    }

    #[test]
    fn test_attributes_on_members_are_kept() {
        let source = "class A {\n    [Migration(\"bad\")]\n    public void Up() { }\n    public int X;\n}";
        let tree = parse(source).unwrap();

        let class = &tree.root().children()[0];
        let member = class
            .first_child_of_kind(SyntaxKind::MemberDeclaration)
            .unwrap();
        assert_eq!(kinds(member), vec![SyntaxKind::AttributeList]);
        assert_eq!(
            class.children_of_kind(SyntaxKind::MemberDeclaration).count(),
            1
        );
    }

    #[test]
    fn test_assembly_attributes_stand_alone() {
        let source = "[assembly: InternalsVisibleTo(\"Tests\")]\nnamespace N { }";
        let tree = parse(source).unwrap();

        assert_eq!(
            kinds(tree.root()),
            vec![SyntaxKind::AttributeList, SyntaxKind::NamespaceDeclaration]
        );
        assert_eq!(tree.root().children()[0].text(), Some("assembly"));
    }

    #[test]
    fn test_qualified_and_named_attribute_arguments() {
        let source = "[FluentMigrator.Migration(version: 1, Description = \"a, b\"), Tags(\"x\")] class A {}";
        let tree = parse(source).unwrap();
        let class = TypeDeclaration::cast(&tree.root().children()[0]).unwrap();
        let attributes: Vec<_> = class.attributes().collect();

        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes[0].name(), Some("FluentMigrator.Migration"));
        let arguments: Vec<_> = attributes[0].arguments().collect();
        assert_eq!(arguments.len(), 2);
        assert_eq!(arguments[1].expression_text(), "\"a, b\"");
    }

    #[test]
    fn test_attribute_without_and_with_empty_arguments() {
        let tree = parse("[Migration] [Migration()] class A {}").unwrap();
        let class = TypeDeclaration::cast(&tree.root().children()[0]).unwrap();
        let attributes: Vec<_> = class.attributes().collect();

        assert!(attributes[0].argument_list().is_none());
        assert!(attributes[1].argument_list().is_some());
        assert_eq!(attributes[1].arguments().count(), 0);
    }

    #[test]
    fn test_generic_attribute_name_keeps_type_arguments() {
        let tree = parse("[Migration<int>(1)] class A {}").unwrap();
        let class = TypeDeclaration::cast(&tree.root().children()[0]).unwrap();
        let attribute = class.attributes().next().unwrap();

        assert_eq!(attribute.name(), Some("Migration<int>"));
        assert_eq!(attribute.arguments().next().unwrap().expression_text(), "1");
    }

    #[test]
    fn test_missing_argument_keeps_its_position() {
        let source = "[Migration(, 202401011530)] class A {}";
        let tree = parse(source).unwrap();
        let class = TypeDeclaration::cast(&tree.root().children()[0]).unwrap();
        let arguments: Vec<_> = class.attributes().next().unwrap().arguments().collect();

        assert_eq!(arguments.len(), 2);
        assert_eq!(arguments[0].expression_text(), "");
        assert_eq!(arguments[0].syntax().span(), Span::empty(11));
        assert_eq!(arguments[1].expression_text(), "202401011530");
    }

    #[test]
    fn test_braces_in_comments_and_strings_do_not_confuse_nesting() {
        let source = "class A {\n    // }\n    string s = \"}\";\n    /* { */\n}\nclass B : Migration {}";
        assert_eq!(type_names(source), vec!["A", "B"]);
    }

    #[test]
    fn test_unbalanced_input_is_tolerated() {
        let tree = parse("class A : Migration {\n    void Up() {\n").unwrap();
        let class = TypeDeclaration::cast(&tree.root().children()[0]).unwrap();
        assert_eq!(class.name(), Some("A"));
        assert_eq!(class.base_types().collect::<Vec<_>>(), vec!["Migration"]);

        let tree = parse("} ] ) class B {}").unwrap();
        assert_eq!(tree.root().children().len(), 1);
    }

    #[test]
    fn test_lexer_errors_propagate() {
        assert!(matches!(
            parse("class A { string s = \"open\n }"),
            Err(SyntaxError::UnterminatedLiteral { .. })
        ));
    }
}
