//! Stencil template parser.
//!
//! Builds the AST from the tokenizer's flat token stream by recursive
//! descent. Each block directive parses its own children until it meets its
//! closer, so an `@else` always belongs to the innermost open `@if` and a
//! nested `@if` never steals its parent's `@endif`.
//!
//! Structural problems are collected as [`CompilerError`]s and the parser
//! recovers the way the renderer expects when running leniently: unclosed
//! `@if`/`@foreach`/`@section` blocks run to end of content, an unclosed
//! `@error` is dropped with its children spliced into the parent, and stray
//! closers stay in the output as text.

use stencil_carton::String;
use stencil_relief::ast::*;
use stencil_relief::errors::{CompilerError, ErrorCode};
use stencil_relief::options::ParserOptions;

use crate::expression::{parse_expression, parse_foreach_header, try_parse_arguments};
use crate::tokenizer::{DirectiveKind, Span, Token, Tokenized, Tokenizer};

/// Why a run of children stopped
#[derive(Debug, Clone, Copy)]
struct Stop {
    kind: DirectiveKind,
    span: Span,
}

/// Parser context for building the AST
pub struct Parser<'a> {
    /// Source code
    source: &'a str,
    tokenized: Tokenized,
    /// Next token to consume
    pos: usize,
    /// Errors collected during parsing
    errors: Vec<CompilerError>,
}

impl<'a> Parser<'a> {
    /// Create a new parser
    pub fn new(source: &'a str) -> Self {
        Self::with_options(source, &ParserOptions::default())
    }

    /// Create a new parser with options
    pub fn with_options(source: &'a str, options: &ParserOptions) -> Self {
        let tokenized = Tokenizer::with_options(source, options).tokenize();
        let errors = tokenized
            .errors
            .iter()
            .map(|(code, span)| CompilerError::new(*code, Some(loc_of(&tokenized, *span))))
            .collect();
        Self {
            source,
            tokenized,
            pos: 0,
            errors,
        }
    }

    /// Parse the source and return the AST
    pub fn parse(mut self) -> (RootNode, Vec<CompilerError>) {
        let (children, _) = self.parse_children(&[]);
        let loc = self.create_loc(Span::new(0, self.source.len()));
        (RootNode::new(children, loc), self.errors)
    }

    /// Calculate a source location from a span
    fn create_loc(&self, span: Span) -> SourceLocation {
        loc_of(&self.tokenized, span)
    }

    fn error(&mut self, code: ErrorCode, span: Span, detail: &str) {
        let loc = self.create_loc(span);
        self.errors
            .push(CompilerError::with_detail(code, Some(loc), detail));
    }

    fn next_token(&mut self) -> Option<Token> {
        let token = self.tokenized.tokens.get(self.pos).copied();
        self.pos += 1;
        token
    }

    /// Parse nodes until one of `terminators` (consumed and returned) or end
    /// of input.
    fn parse_children(&mut self, terminators: &[DirectiveKind]) -> (Vec<Node>, Option<Stop>) {
        let mut nodes = Vec::new();

        while let Some(token) = self.next_token() {
            match token {
                Token::Text(span) => push_text(&mut nodes, span.slice(self.source), self.create_loc(span)),
                Token::Interpolation {
                    escape,
                    content,
                    span,
                } => nodes.push(Node::Interpolation(InterpolationNode {
                    expr: parse_expression(content.slice(self.source)),
                    escape,
                    loc: self.create_loc(span),
                })),
                Token::Directive { kind, args, span } => {
                    if terminators.contains(&kind) {
                        return (nodes, Some(Stop { kind, span }));
                    }
                    self.on_directive(&mut nodes, kind, args, span);
                }
            }
        }

        (nodes, None)
    }

    fn on_directive(
        &mut self,
        nodes: &mut Vec<Node>,
        kind: DirectiveKind,
        args: Option<Span>,
        span: Span,
    ) {
        let args_src = args.map_or("", |args| args.slice(self.source));
        let loc = self.create_loc(span);

        match kind {
            DirectiveKind::If => nodes.push(self.parse_if(args_src, span)),
            DirectiveKind::ForEach => nodes.push(self.parse_foreach(args_src, span)),
            DirectiveKind::Error => self.parse_error(nodes, args_src, span),
            DirectiveKind::Section => {
                if let Some(section) = self.parse_section(args_src, span) {
                    nodes.push(section);
                }
            }
            DirectiveKind::Extends => match first_string_arg(args_src) {
                Some(layout) => nodes.push(Node::Extends(ExtendsNode { layout, loc })),
                None => self.error(ErrorCode::MissingDirectiveArgs, span, kind.name()),
            },
            DirectiveKind::Include => nodes.push(Node::Include(IncludeNode {
                view: parse_expression(args_src),
                loc,
            })),
            DirectiveKind::Yield => {
                let mut args = split_args(args_src).into_iter();
                nodes.push(Node::Yield(YieldNode {
                    name: args.next().unwrap_or_else(|| parse_expression(args_src)),
                    default: args.next(),
                    loc,
                }));
            }
            DirectiveKind::Csrf => nodes.push(Node::Csrf(CsrfNode { loc })),
            DirectiveKind::Asset | DirectiveKind::Vite => nodes.push(Node::Asset(AssetNode {
                kind: if kind == DirectiveKind::Asset {
                    AssetKind::Asset
                } else {
                    AssetKind::Vite
                },
                paths: parse_expression(args_src),
                loc,
            })),
            // Stray-section cleanup
            DirectiveKind::EndSection => {}
            DirectiveKind::Else
            | DirectiveKind::EndIf
            | DirectiveKind::EndForEach
            | DirectiveKind::EndError => {
                self.error(ErrorCode::UnexpectedCloser, span, kind.name());
                push_text(nodes, span.slice(self.source), loc);
            }
        }
    }

    fn parse_if(&mut self, condition: &str, open: Span) -> Node {
        let condition = parse_expression(condition);
        let (consequent, mut stop) = self.parse_children(&[DirectiveKind::Else, DirectiveKind::EndIf]);

        let mut alternate = None;
        while let Some(Stop {
            kind: DirectiveKind::Else,
            span,
        }) = stop
        {
            if alternate.is_some() {
                self.error(ErrorCode::DuplicateElse, span, "@else");
            }
            let (children, next) = self.parse_children(&[DirectiveKind::Else, DirectiveKind::EndIf]);
            alternate.get_or_insert_with(Vec::new).extend(children);
            stop = next;
        }

        let end = self.close_block(stop, open, DirectiveKind::If);
        Node::If(Box::new(IfNode {
            condition,
            consequent,
            alternate,
            loc: self.create_loc(Span::new(open.start, end)),
        }))
    }

    fn parse_foreach(&mut self, header: &str, open: Span) -> Node {
        let (source, key, item) = match parse_foreach_header(header) {
            Ok(header) => (header.source, header.key, header.item),
            Err(err) => {
                self.error(ErrorCode::InvalidForeachHeader, open, &err.to_string());
                (
                    Expr::Invalid {
                        source: header.trim().into(),
                    },
                    None,
                    String::default(),
                )
            }
        };

        let (body, stop) = self.parse_children(&[DirectiveKind::EndForEach]);
        let end = self.close_block(stop, open, DirectiveKind::ForEach);
        Node::ForEach(Box::new(ForEachNode {
            source,
            key,
            item,
            body,
            loc: self.create_loc(Span::new(open.start, end)),
        }))
    }

    fn parse_error(&mut self, nodes: &mut Vec<Node>, field: &str, open: Span) {
        let field = parse_expression(field);
        let (body, stop) = self.parse_children(&[DirectiveKind::EndError]);

        let Some(close) = stop else {
            // Unclosed: drop the header, keep its content
            self.error(ErrorCode::UnclosedBlock, open, "@error");
            for node in body {
                match node {
                    Node::Text(text) => push_text(nodes, &text.content, text.loc),
                    other => nodes.push(other),
                }
            }
            return;
        };

        // Inline form: `@error('f') text @enderror` on one line, padded by
        // whitespace on both sides
        let inner = &self.source[open.end..close.span.start];
        let padded = inner.starts_with([' ', '\t']) && inner.ends_with([' ', '\t']);
        let inline = padded && !inner.contains('\n') && !body.iter().any(Node::is_block);
        nodes.push(Node::Error(Box::new(ErrorNode {
            field,
            body,
            inline,
            loc: self.create_loc(Span::new(open.start, close.span.end)),
        })));
    }

    fn parse_section(&mut self, args: &str, open: Span) -> Option<Node> {
        let mut parsed = split_args(args).into_iter();
        let Some(name) = parsed.next().as_ref().and_then(static_name) else {
            self.error(ErrorCode::MissingDirectiveArgs, open, "@section");
            return None;
        };

        if let Some(value) = parsed.next() {
            return Some(Node::Section(Box::new(SectionNode {
                name,
                body: SectionBody::Inline(value),
                loc: self.create_loc(open),
            })));
        }

        let (body, stop) = self.parse_children(&[DirectiveKind::EndSection]);
        let end = self.close_block(stop, open, DirectiveKind::Section);
        Some(Node::Section(Box::new(SectionNode {
            name,
            body: SectionBody::Block(body),
            loc: self.create_loc(Span::new(open.start, end)),
        })))
    }

    /// Report an unclosed block and return the end offset of the block.
    fn close_block(&mut self, stop: Option<Stop>, open: Span, kind: DirectiveKind) -> usize {
        match stop {
            Some(stop) => stop.span.end,
            None => {
                self.error(ErrorCode::UnclosedBlock, open, kind.name());
                self.source.len()
            }
        }
    }
}

fn loc_of(tokenized: &Tokenized, span: Span) -> SourceLocation {
    SourceLocation::new(tokenized.get_pos(span.start), tokenized.get_pos(span.end))
}

/// Append text, merging with a preceding text node.
fn push_text(nodes: &mut Vec<Node>, text: &str, loc: SourceLocation) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Text(last)) = nodes.last_mut() {
        if last.loc.end.offset == loc.start.offset {
            last.content.push_str(text);
            last.loc.end = loc.end;
            return;
        }
    }
    nodes.push(Node::Text(TextNode {
        content: text.into(),
        loc,
    }));
}

fn split_args(src: &str) -> Vec<Expr> {
    try_parse_arguments(src).unwrap_or_else(|_| vec![parse_expression(src)])
}

/// A name given as a string literal or a bare word.
fn static_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Literal { value } => value.as_str().map(String::from),
        Expr::Variable(var) if var.accessors.is_empty() => Some(var.name.clone()),
        _ => None,
    }
}

fn first_string_arg(src: &str) -> Option<String> {
    split_args(src).first().and_then(static_name)
}

/// Parse a template with default options
pub fn parse(source: &str) -> (RootNode, Vec<CompilerError>) {
    Parser::new(source).parse()
}

/// Parse a template with custom options
pub fn parse_with_options(source: &str, options: &ParserOptions) -> (RootNode, Vec<CompilerError>) {
    Parser::with_options(source, options).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Vec<Node> {
        let (root, errors) = parse(source);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        root.children
    }

    #[test]
    fn test_parse_text() {
        let nodes = parse_ok("hello world");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].as_text(), Some("hello world"));
    }

    #[test]
    fn test_parse_interpolation() {
        let nodes = parse_ok("Hi {{ $name }}!{!! $bio !!}");
        assert_eq!(nodes.len(), 4);
        let Node::Interpolation(raw) = &nodes[1] else {
            panic!("expected interpolation");
        };
        assert!(!raw.escape);
        let Node::Interpolation(escaped) = &nodes[3] else {
            panic!("expected interpolation");
        };
        assert!(escaped.escape);
    }

    #[test]
    fn test_parse_if_else() {
        let nodes = parse_ok("@if($a) yes @else no @endif");
        let Node::If(if_node) = &nodes[0] else {
            panic!("expected if");
        };
        assert_eq!(if_node.consequent[0].as_text(), Some(" yes "));
        assert_eq!(
            if_node.alternate.as_ref().unwrap()[0].as_text(),
            Some(" no ")
        );
        assert_eq!(if_node.loc.start.offset, 0);
        assert_eq!(if_node.loc.end.offset, 27);
    }

    #[test]
    fn test_nested_if_keeps_else_at_its_depth() {
        let nodes = parse_ok("@if($o)@if($i)Both@endif@else Outer@endif");
        let Node::If(outer) = &nodes[0] else {
            panic!("expected if");
        };
        assert!(matches!(outer.consequent[0], Node::If(_)));
        let Node::If(inner) = &outer.consequent[0] else {
            unreachable!()
        };
        assert!(inner.alternate.is_none());
        assert_eq!(
            outer.alternate.as_ref().unwrap()[0].as_text(),
            Some(" Outer")
        );
    }

    #[test]
    fn test_parse_foreach() {
        let nodes = parse_ok("@foreach($users as $id => $user){{ $user }}@endforeach");
        let Node::ForEach(each) = &nodes[0] else {
            panic!("expected foreach");
        };
        assert_eq!(each.key.as_deref(), Some("id"));
        assert_eq!(each.item, "user");
        assert_eq!(each.body.len(), 1);
    }

    #[test]
    fn test_parse_error_inline_and_block() {
        let nodes = parse_ok("@error('email') {{ $message }} @enderror");
        let Node::Error(inline) = &nodes[0] else {
            panic!("expected error");
        };
        assert!(inline.inline);

        let nodes = parse_ok("@error('email')\n<p>{{ $message }}</p>\n@enderror");
        let Node::Error(block) = &nodes[0] else {
            panic!("expected error");
        };
        assert!(!block.inline);
    }

    #[test]
    fn test_parse_error_unpadded_is_block() {
        let nodes = parse_ok("@error('email'){{ $message }}@enderror");
        let Node::Error(node) = &nodes[0] else {
            panic!("expected error");
        };
        assert!(!node.inline);
    }

    #[test]
    fn test_parse_error_with_nested_block_is_not_inline() {
        let nodes = parse_ok("@error('a') @if($x)x@endif @enderror");
        let Node::Error(node) = &nodes[0] else {
            panic!("expected error");
        };
        assert!(!node.inline);
    }

    #[test]
    fn test_parse_sections_and_extends() {
        let nodes = parse_ok(
            "@extends('layouts.app')@section('title', 'Home')@section('content')<p>Hi</p>@endsection",
        );
        let Node::Extends(extends) = &nodes[0] else {
            panic!("expected extends");
        };
        assert_eq!(extends.layout, "layouts.app");
        let Node::Section(title) = &nodes[1] else {
            panic!("expected section");
        };
        assert_eq!(title.name, "title");
        assert!(matches!(title.body, SectionBody::Inline(_)));
        let Node::Section(content) = &nodes[2] else {
            panic!("expected section");
        };
        assert!(matches!(&content.body, SectionBody::Block(body) if body.len() == 1));
    }

    #[test]
    fn test_parse_yield_with_default() {
        let nodes = parse_ok("@yield('title', 'Untitled')");
        let Node::Yield(node) = &nodes[0] else {
            panic!("expected yield");
        };
        assert_eq!(node.name.as_str_literal(), Some("title"));
        assert_eq!(
            node.default.as_ref().and_then(Expr::as_str_literal),
            Some("Untitled")
        );
    }

    #[test]
    fn test_unclosed_if_runs_to_end() {
        let (root, errors) = parse("@if($a) tail");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::UnclosedBlock);
        let Node::If(node) = &root.children[0] else {
            panic!("expected if");
        };
        assert_eq!(node.consequent[0].as_text(), Some(" tail"));
    }

    #[test]
    fn test_unclosed_error_is_spliced() {
        let (root, errors) = parse("a@error('x') b");
        assert_eq!(errors[0].code, ErrorCode::UnclosedBlock);
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[1].as_text(), Some(" b"));
    }

    #[test]
    fn test_stray_closer_kept_as_text() {
        let (root, errors) = parse("a @endif b");
        assert_eq!(errors[0].code, ErrorCode::UnexpectedCloser);
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].as_text(), Some("a @endif b"));
    }

    #[test]
    fn test_stray_endsection_removed() {
        let (root, errors) = parse("a@endsection b");
        assert!(errors.is_empty());
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].as_text(), Some("a"));
        assert_eq!(root.children[1].as_text(), Some(" b"));
    }

    #[test]
    fn test_duplicate_else() {
        let (_, errors) = parse("@if($a)1@else 2@else 3@endif");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::DuplicateElse);
    }

    #[test]
    fn test_invalid_foreach_header() {
        let (root, errors) = parse("@foreach($items)x@endforeach");
        assert_eq!(errors[0].code, ErrorCode::InvalidForeachHeader);
        assert!(matches!(&root.children[0], Node::ForEach(each) if matches!(each.source, Expr::Invalid { .. })));
    }

    #[test]
    fn test_error_locations() {
        let (_, errors) = parse("line one\n  @endforeach");
        let loc = errors[0].loc.unwrap();
        assert_eq!(loc.start.line, 2);
        assert_eq!(loc.start.column, 3);
    }

    #[test]
    fn test_custom_delimiters() {
        let options = ParserOptions {
            raw_delimiters: (String::from("[["), String::from("]]")),
            ..ParserOptions::default()
        };
        let (root, errors) = parse_with_options("a [[ $x ]] {{ y }}", &options);
        assert!(errors.is_empty());
        assert!(matches!(root.children[1], Node::Interpolation(_)));
        assert_eq!(root.children[2].as_text(), Some(" {{ y }}"));
    }
}
