//! Expression lexer and parser.
//!
//! Parses the small expression language used inside `{{ }}`, directive
//! arguments and `@if` conditions:
//!
//! ```text
//! or         := and ('||' and)*
//! and        := not ('&&' not)*
//! not        := '!' not | comparison
//! comparison := operand (('===' | '!==' | '==' | '!=' | '<=' | '>=' | '<' | '>') operand)?
//! operand    := '(' or ')' | array | string | number | call | constant | variable
//! variable   := ('$' ident | ident) ('[' or ']')*
//! ```
//!
//! Quoted strings are lexed as single tokens, so operator-like text inside
//! quotes never splits an expression.

use stencil_carton::String;
use stencil_relief::value::{parse_number, Value};
use stencil_relief::{CallExpr, CompareOp, Expr, LogicalOp, VariableExpr};

/// Error raised while lexing or parsing an expression
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at offset {offset}")]
pub struct ExprError {
    pub message: &'static str,
    pub offset: usize,
}

impl ExprError {
    fn new(message: &'static str, offset: usize) -> Self {
        Self { message, offset }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind<'s> {
    Variable(&'s str),
    Ident(&'s str),
    Str(std::string::String),
    Number(&'s str),
    LeftBracket,
    RightBracket,
    LeftParen,
    RightParen,
    Comma,
    Bang,
    AndAnd,
    OrOr,
    FatArrow,
    Compare(CompareOp),
}

#[derive(Debug, Clone, PartialEq)]
struct ExprToken<'s> {
    kind: TokenKind<'s>,
    offset: usize,
}

// ========== Lexer ==========

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

fn lex(src: &str) -> Result<Vec<ExprToken<'_>>, ExprError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        let kind = match c {
            b' ' | b'\t' | b'\n' | b'\r' => {
                i += 1;
                continue;
            }
            b'$' => {
                i += 1;
                if i >= bytes.len() || !is_ident_start(bytes[i]) {
                    return Err(ExprError::new("expected variable name after `$`", start));
                }
                while i < bytes.len() && is_ident_char(bytes[i]) {
                    i += 1;
                }
                TokenKind::Variable(&src[start + 1..i])
            }
            b'\'' | b'"' => {
                let (text, next) = lex_string(src, start)?;
                i = next;
                TokenKind::Str(text)
            }
            b'0'..=b'9' => {
                i = scan_number(bytes, i);
                TokenKind::Number(&src[start..i])
            }
            b'-' | b'.' if bytes.get(i + 1).is_some_and(u8::is_ascii_digit) => {
                i = scan_number(bytes, i + 1);
                TokenKind::Number(&src[start..i])
            }
            _ if is_ident_start(c) => {
                while i < bytes.len() && is_ident_char(bytes[i]) {
                    i += 1;
                }
                TokenKind::Ident(&src[start..i])
            }
            _ => {
                let rest = &src[i..];
                let (kind, len) = if rest.starts_with("===") {
                    (TokenKind::Compare(CompareOp::StrictEq), 3)
                } else if rest.starts_with("!==") {
                    (TokenKind::Compare(CompareOp::StrictNe), 3)
                } else if rest.starts_with("==") {
                    (TokenKind::Compare(CompareOp::Eq), 2)
                } else if rest.starts_with("!=") {
                    (TokenKind::Compare(CompareOp::Ne), 2)
                } else if rest.starts_with("<=") {
                    (TokenKind::Compare(CompareOp::Le), 2)
                } else if rest.starts_with(">=") {
                    (TokenKind::Compare(CompareOp::Ge), 2)
                } else if rest.starts_with("=>") {
                    (TokenKind::FatArrow, 2)
                } else if rest.starts_with("&&") {
                    (TokenKind::AndAnd, 2)
                } else if rest.starts_with("||") {
                    (TokenKind::OrOr, 2)
                } else {
                    let single = match c {
                        b'<' => TokenKind::Compare(CompareOp::Lt),
                        b'>' => TokenKind::Compare(CompareOp::Gt),
                        b'!' => TokenKind::Bang,
                        b'(' => TokenKind::LeftParen,
                        b')' => TokenKind::RightParen,
                        b'[' => TokenKind::LeftBracket,
                        b']' => TokenKind::RightBracket,
                        b',' => TokenKind::Comma,
                        _ => return Err(ExprError::new("unexpected character", start)),
                    };
                    (single, 1)
                };
                i += len;
                kind
            }
        };

        tokens.push(ExprToken {
            kind,
            offset: start,
        });
    }

    Ok(tokens)
}

fn scan_number(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
        i += 1;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            i = j;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    i
}

/// Lex a quoted string starting at `start`. Backslash escapes the quote
/// character and itself; other escapes are kept verbatim.
fn lex_string(src: &str, start: usize) -> Result<(std::string::String, usize), ExprError> {
    let quote = src.as_bytes()[start] as char;
    let mut text = std::string::String::new();
    let mut chars = src[start + 1..].char_indices();

    while let Some((offset, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, next)) if next == quote || next == '\\' => text.push(next),
                Some((_, 'n')) if quote == '"' => text.push('\n'),
                Some((_, 't')) if quote == '"' => text.push('\t'),
                Some((_, next)) => {
                    text.push('\\');
                    text.push(next);
                }
                None => break,
            },
            c if c == quote => return Ok((text, start + 1 + offset + 1)),
            c => text.push(c),
        }
    }

    Err(ExprError::new("unterminated string literal", start))
}

// ========== Parser ==========

/// Resolve a named constant such as `true` or `PHP_EOL`.
pub fn named_constant(name: &str) -> Option<Value> {
    if name.eq_ignore_ascii_case("true") {
        return Some(Value::Bool(true));
    }
    if name.eq_ignore_ascii_case("false") {
        return Some(Value::Bool(false));
    }
    if name.eq_ignore_ascii_case("null") {
        return Some(Value::Null);
    }
    match name {
        "PHP_EOL" => Some(Value::from("\n")),
        "PHP_INT_MAX" => Some(Value::from(i64::MAX)),
        _ => None,
    }
}

/// `@foreach` header: `source as $item` or `source as $key => $item`
#[derive(Debug, Clone, PartialEq)]
pub struct ForEachHeader {
    pub source: Expr,
    pub key: Option<String>,
    pub item: String,
}

struct ExprParser<'s> {
    tokens: Vec<ExprToken<'s>>,
    pos: usize,
    len: usize,
}

impl<'s> ExprParser<'s> {
    fn new(src: &'s str) -> Result<Self, ExprError> {
        Ok(Self {
            tokens: lex(src)?,
            pos: 0,
            len: src.len(),
        })
    }

    fn peek(&self) -> Option<&TokenKind<'s>> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn peek_at(&self, ahead: usize) -> Option<&TokenKind<'s>> {
        self.tokens.get(self.pos + ahead).map(|t| &t.kind)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.len, |t| t.offset)
    }

    fn advance(&mut self) -> Option<TokenKind<'s>> {
        let token = self.tokens.get(self.pos).map(|t| t.kind.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind<'s>) -> bool {
        if self.peek() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind<'s>, message: &'static str) -> Result<(), ExprError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(ExprError::new(message, self.offset()))
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_and()?;
        while self.eat(&TokenKind::OrOr) {
            let right = self.parse_and()?;
            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_not()?;
        while self.eat(&TokenKind::AndAnd) {
            let right = self.parse_not()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ExprError> {
        if self.eat(&TokenKind::Bang) {
            let operand = self.parse_not()?;
            return Ok(Expr::Not {
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let left = self.parse_operand()?;
        if let Some(TokenKind::Compare(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            let right = self.parse_operand()?;
            return Ok(Expr::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn parse_operand(&mut self) -> Result<Expr, ExprError> {
        let offset = self.offset();
        match self.advance() {
            Some(TokenKind::LeftParen) => {
                let inner = self.parse_or()?;
                self.expect(&TokenKind::RightParen, "expected `)`")?;
                Ok(inner)
            }
            Some(TokenKind::LeftBracket) => self.parse_array(),
            Some(TokenKind::Str(text)) => Ok(Expr::literal(text)),
            Some(TokenKind::Number(text)) => parse_number(text)
                .map(Expr::literal)
                .ok_or_else(|| ExprError::new("invalid number", offset)),
            Some(TokenKind::Variable(name)) => self.parse_variable(name),
            Some(TokenKind::Ident(name)) => {
                if self.peek() == Some(&TokenKind::LeftParen) {
                    self.pos += 1;
                    let args = self.parse_list(&TokenKind::RightParen)?;
                    return Ok(Expr::Call(CallExpr {
                        name: String::from(name),
                        args,
                    }));
                }
                if let Some(value) = named_constant(name) {
                    return Ok(Expr::literal(value));
                }
                self.parse_variable(name)
            }
            Some(_) => Err(ExprError::new("unexpected token", offset)),
            None => Err(ExprError::new("unexpected end of expression", offset)),
        }
    }

    fn parse_variable(&mut self, name: &str) -> Result<Expr, ExprError> {
        let mut accessors = Vec::new();
        while self.eat(&TokenKind::LeftBracket) {
            accessors.push(self.parse_or()?);
            self.expect(&TokenKind::RightBracket, "expected `]`")?;
        }
        Ok(Expr::Variable(VariableExpr {
            name: String::from(name),
            accessors,
        }))
    }

    /// Array literal items. A bare word stays a string.
    fn parse_array(&mut self) -> Result<Expr, ExprError> {
        let mut items = Vec::new();
        loop {
            if self.eat(&TokenKind::RightBracket) {
                break;
            }
            let item = match (self.peek(), self.peek_at(1)) {
                (Some(TokenKind::Ident(word)), next)
                    if next != Some(&TokenKind::LeftParen)
                        && next != Some(&TokenKind::LeftBracket)
                        && named_constant(word).is_none() =>
                {
                    let word = *word;
                    self.pos += 1;
                    Expr::literal(word)
                }
                _ => self.parse_or()?,
            };
            items.push(item);
            if !self.eat(&TokenKind::Comma) {
                self.expect(&TokenKind::RightBracket, "expected `,` or `]`")?;
                break;
            }
        }
        Ok(Expr::Array { items })
    }

    /// Comma-separated expressions up to `close`
    fn parse_list(&mut self, close: &TokenKind<'s>) -> Result<Vec<Expr>, ExprError> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Ok(items);
        }
        loop {
            items.push(self.parse_or()?);
            if self.eat(close) {
                return Ok(items);
            }
            self.expect(&TokenKind::Comma, "expected `,`")?;
        }
    }

    fn finish(&self) -> Result<(), ExprError> {
        if self.is_at_end() {
            Ok(())
        } else {
            Err(ExprError::new("unexpected trailing input", self.offset()))
        }
    }

    fn expect_variable(&mut self) -> Result<String, ExprError> {
        let offset = self.offset();
        match self.advance() {
            Some(TokenKind::Variable(name)) => Ok(String::from(name)),
            _ => Err(ExprError::new("expected loop variable", offset)),
        }
    }
}

/// Parse a single expression.
pub fn try_parse_expression(src: &str) -> Result<Expr, ExprError> {
    let mut parser = ExprParser::new(src)?;
    let expr = parser.parse_or()?;
    parser.finish()?;
    Ok(expr)
}

/// Parse a single expression, keeping unparseable text as [`Expr::Invalid`].
pub fn parse_expression(src: &str) -> Expr {
    try_parse_expression(src).unwrap_or_else(|_| Expr::Invalid {
        source: src.trim().into(),
    })
}

/// Parse a comma-separated directive argument list.
pub fn try_parse_arguments(src: &str) -> Result<Vec<Expr>, ExprError> {
    let mut parser = ExprParser::new(src)?;
    if parser.is_at_end() {
        return Ok(Vec::new());
    }
    let mut args = vec![parser.parse_or()?];
    while parser.eat(&TokenKind::Comma) {
        args.push(parser.parse_or()?);
    }
    parser.finish()?;
    Ok(args)
}

/// Parse a `@foreach` header.
pub fn parse_foreach_header(src: &str) -> Result<ForEachHeader, ExprError> {
    let mut parser = ExprParser::new(src)?;
    let source = parser.parse_or()?;

    let offset = parser.offset();
    match parser.advance() {
        Some(TokenKind::Ident(word)) if word.eq_ignore_ascii_case("as") => {}
        _ => return Err(ExprError::new("expected `as`", offset)),
    }

    let first = parser.expect_variable()?;
    let header = if parser.eat(&TokenKind::FatArrow) {
        ForEachHeader {
            source,
            key: Some(first),
            item: parser.expect_variable()?,
        }
    } else {
        ForEachHeader {
            source,
            key: None,
            item: first,
        }
    };
    parser.finish()?;
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Expr {
        Expr::Variable(VariableExpr {
            name: name.into(),
            accessors: vec![],
        })
    }

    #[test]
    fn test_variable_chain() {
        let expr = try_parse_expression("$data['user'][0][$key]").unwrap();
        assert_eq!(
            expr,
            Expr::Variable(VariableExpr {
                name: "data".into(),
                accessors: vec![Expr::literal("user"), Expr::literal(0), var("key")],
            })
        );
    }

    #[test]
    fn test_array_literal_items() {
        let expr = try_parse_expression("['a,b', 1, 2.5, bare, $x]").unwrap();
        assert_eq!(
            expr,
            Expr::Array {
                items: vec![
                    Expr::literal("a,b"),
                    Expr::literal(1),
                    Expr::literal(2.5),
                    Expr::literal("bare"),
                    var("x"),
                ]
            }
        );
    }

    #[test]
    fn test_call_with_nested_args() {
        let expr = try_parse_expression("implode(', ', [count($a), 'x)'])").unwrap();
        let Expr::Call(call) = expr else {
            panic!("expected call");
        };
        assert_eq!(call.name, "implode");
        assert_eq!(call.args.len(), 2);
        assert_eq!(call.args[0], Expr::literal(", "));
    }

    #[test]
    fn test_constants() {
        assert_eq!(try_parse_expression("TRUE").unwrap(), Expr::literal(true));
        assert_eq!(try_parse_expression("null").unwrap(), Expr::literal(Value::Null));
        assert_eq!(try_parse_expression("PHP_EOL").unwrap(), Expr::literal("\n"));
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let expr = try_parse_expression("$a || $b && $c").unwrap();
        assert_eq!(
            expr,
            Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(var("a")),
                right: Box::new(Expr::Logical {
                    op: LogicalOp::And,
                    left: Box::new(var("b")),
                    right: Box::new(var("c")),
                }),
            }
        );
    }

    #[test]
    fn test_not_covers_comparison() {
        let expr = try_parse_expression("!$a == 1").unwrap();
        assert_eq!(
            expr,
            Expr::Not {
                operand: Box::new(Expr::Compare {
                    op: CompareOp::Eq,
                    left: Box::new(var("a")),
                    right: Box::new(Expr::literal(1)),
                }),
            }
        );
    }

    #[test]
    fn test_quoted_operators_are_not_split() {
        let expr = try_parse_expression("$op === '||'").unwrap();
        assert!(matches!(
            expr,
            Expr::Compare {
                op: CompareOp::StrictEq,
                ..
            }
        ));
    }

    #[test]
    fn test_parenthesized_grouping() {
        let expr = try_parse_expression("($a || $b) && $c").unwrap();
        assert!(matches!(
            expr,
            Expr::Logical {
                op: LogicalOp::And,
                ..
            }
        ));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            try_parse_expression(r"'it\'s'").unwrap(),
            Expr::literal("it's")
        );
        assert_eq!(
            try_parse_expression(r#""a\nb""#).unwrap(),
            Expr::literal("a\nb")
        );
    }

    #[test]
    fn test_negative_number() {
        assert_eq!(try_parse_expression("-3").unwrap(), Expr::literal(-3));
    }

    #[test]
    fn test_invalid_expression() {
        assert!(try_parse_expression("$a +").is_err());
        assert_eq!(
            parse_expression(" $a + "),
            Expr::Invalid {
                source: "$a +".into()
            }
        );
    }

    #[test]
    fn test_arguments() {
        let args = try_parse_arguments("'title', 'Home (main)'").unwrap();
        assert_eq!(args, vec![Expr::literal("title"), Expr::literal("Home (main)")]);
        assert!(try_parse_arguments("  ").unwrap().is_empty());
    }

    #[test]
    fn test_foreach_header() {
        let header = parse_foreach_header("$users as $id => $user").unwrap();
        assert_eq!(header.source, var("users"));
        assert_eq!(header.key.as_deref(), Some("id"));
        assert_eq!(header.item, "user");

        let header = parse_foreach_header("[1, 2, 3] as $n").unwrap();
        assert!(header.key.is_none());
        assert_eq!(header.item, "n");
    }

    #[test]
    fn test_foreach_header_errors() {
        assert!(parse_foreach_header("$users").is_err());
        assert!(parse_foreach_header("$users as user").is_err());
    }
}
