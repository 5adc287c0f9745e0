//! Stencil template AST node types.
//!
//! A parsed template is a [`RootNode`] holding a flat list of [`Node`]s.
//! Block directives (`@if`, `@foreach`, `@error`, `@section`) own their
//! children, so nesting is resolved once at parse time and the renderer
//! only has to walk the tree.

use serde::{Deserialize, Serialize};
use stencil_carton::String;

use crate::value::Value;

/// Source position in the template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Position {
    /// Byte offset from start of file
    pub offset: u32,
    /// 1-indexed line number
    pub line: u32,
    /// 1-indexed column number
    pub column: u32,
}

impl Position {
    pub const fn new(offset: u32, line: u32, column: u32) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }
}

/// Source location span [start, end)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub start: Position,
    pub end: Position,
}

impl Default for SourceLocation {
    fn default() -> Self {
        Self::STUB
    }
}

impl SourceLocation {
    /// Stub location for generated nodes
    pub const STUB: Self = Self {
        start: Position {
            offset: 0,
            line: 1,
            column: 1,
        },
        end: Position {
            offset: 0,
            line: 1,
            column: 1,
        },
    };

    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// Root AST node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RootNode {
    pub children: Vec<Node>,
    pub loc: SourceLocation,
}

impl RootNode {
    pub fn new(children: Vec<Node>, loc: SourceLocation) -> Self {
        Self { children, loc }
    }
}

/// Template node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Node {
    Text(TextNode),
    Interpolation(InterpolationNode),
    If(Box<IfNode>),
    ForEach(Box<ForEachNode>),
    Include(IncludeNode),
    Error(Box<ErrorNode>),
    Yield(YieldNode),
    Section(Box<SectionNode>),
    Extends(ExtendsNode),
    Csrf(CsrfNode),
    Asset(AssetNode),
}

impl Node {
    /// Whether this node owns child nodes.
    pub fn is_block(&self) -> bool {
        matches!(
            self,
            Self::If(_) | Self::ForEach(_) | Self::Error(_) | Self::Section(_)
        )
    }

    /// Plain text content, if this is a text node.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(n) => Some(&n.content),
            _ => None,
        }
    }
}

/// Literal template text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub content: std::string::String,
    pub loc: SourceLocation,
}

/// `{{ expr }}` or `{!! expr !!}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpolationNode {
    pub expr: Expr,
    /// `{!! !!}` output is HTML-escaped, `{{ }}` output is raw
    pub escape: bool,
    pub loc: SourceLocation,
}

/// `@if(cond) … @else … @endif`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfNode {
    pub condition: Expr,
    pub consequent: Vec<Node>,
    pub alternate: Option<Vec<Node>>,
    pub loc: SourceLocation,
}

/// `@foreach(source as $key => $item) … @endforeach`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForEachNode {
    pub source: Expr,
    pub key: Option<String>,
    pub item: String,
    pub body: Vec<Node>,
    pub loc: SourceLocation,
}

/// `@include('view.name')`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncludeNode {
    pub view: Expr,
    pub loc: SourceLocation,
}

/// `@error('field') … @enderror`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorNode {
    pub field: Expr,
    pub body: Vec<Node>,
    /// Single-line form with no nested block directives
    pub inline: bool,
    pub loc: SourceLocation,
}

/// `@yield('name'[, default])`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldNode {
    pub name: Expr,
    pub default: Option<Expr>,
    pub loc: SourceLocation,
}

/// `@section('name') … @endsection` or `@section('name', expr)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionNode {
    pub name: String,
    pub body: SectionBody,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SectionBody {
    Block(Vec<Node>),
    Inline(Expr),
}

/// `@extends('layout.name')`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendsNode {
    pub layout: String,
    pub loc: SourceLocation,
}

/// `@csrf`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsrfNode {
    pub loc: SourceLocation,
}

/// `@asset('path')` or `@vite(paths)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetNode {
    pub kind: AssetKind,
    pub paths: Expr,
    pub loc: SourceLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    Asset,
    Vite,
}

// ========== Expressions ==========

/// Expression tree shared by interpolations, directive arguments and
/// conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expr {
    /// Quoted string, number, or named constant
    Literal { value: Value },
    /// `[a, 'b', 3]`
    Array { items: Vec<Expr> },
    /// `$name['key'][0]`
    Variable(VariableExpr),
    /// `name(args…)`
    Call(CallExpr),
    /// `!expr`
    Not { operand: Box<Expr> },
    /// `left && right`, `left || right`
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `left == right` and friends
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Source text that could not be parsed
    Invalid { source: std::string::String },
}

impl Expr {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal {
            value: value.into(),
        }
    }

    /// The literal string value, if this expression is a quoted string.
    pub fn as_str_literal(&self) -> Option<&str> {
        match self {
            Self::Literal {
                value: Value::String(s),
            } => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableExpr {
    /// Base name without the `$` sigil
    pub name: String,
    pub accessors: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpr {
    pub name: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    StrictEq,
    StrictNe,
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StrictEq => "===",
            Self::StrictNe => "!==",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Gt => ">",
        }
    }
}
