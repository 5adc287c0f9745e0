//! Template tokenizer.
//!
//! Splits template source into a flat stream of text runs, `{{ }}` / `{!! !!}`
//! interpolations and `@directive(...)` markers. Every token is a span into
//! the source, so the tokenizer never allocates text.

use memchr::{memchr, memchr3, memchr_iter};
use phf::phf_map;
use stencil_relief::{ErrorCode, ParserOptions, Position};

/// Character codes for fast comparison
pub mod char_codes {
    pub const TAB: u8 = 0x09;
    pub const NEWLINE: u8 = 0x0A;
    pub const CARRIAGE_RETURN: u8 = 0x0D;
    pub const SPACE: u8 = 0x20;
    pub const DOUBLE_QUOTE: u8 = 0x22;
    pub const SINGLE_QUOTE: u8 = 0x27;
    pub const LEFT_PAREN: u8 = 0x28;
    pub const RIGHT_PAREN: u8 = 0x29;
    pub const AT: u8 = 0x40;
    pub const BACKSLASH: u8 = 0x5C;
}

use char_codes::*;

/// Byte range [start, end) in the template source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn slice<'s>(&self, source: &'s str) -> &'s str {
        &source[self.start..self.end]
    }
}

/// The closed set of directives the engine understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    Extends,
    Section,
    EndSection,
    Yield,
    Include,
    If,
    Else,
    EndIf,
    ForEach,
    EndForEach,
    Error,
    EndError,
    Csrf,
    Asset,
    Vite,
}

static DIRECTIVES: phf::Map<&'static str, DirectiveKind> = phf_map! {
    "extends" => DirectiveKind::Extends,
    "section" => DirectiveKind::Section,
    "endsection" => DirectiveKind::EndSection,
    "yield" => DirectiveKind::Yield,
    "include" => DirectiveKind::Include,
    "if" => DirectiveKind::If,
    "else" => DirectiveKind::Else,
    "endif" => DirectiveKind::EndIf,
    "foreach" => DirectiveKind::ForEach,
    "endforeach" => DirectiveKind::EndForEach,
    "error" => DirectiveKind::Error,
    "enderror" => DirectiveKind::EndError,
    "csrf" => DirectiveKind::Csrf,
    "asset" => DirectiveKind::Asset,
    "vite" => DirectiveKind::Vite,
};

impl DirectiveKind {
    /// Look up a directive by the name written after `@`.
    pub fn from_name(name: &str) -> Option<Self> {
        DIRECTIVES.get(name).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Extends => "@extends",
            Self::Section => "@section",
            Self::EndSection => "@endsection",
            Self::Yield => "@yield",
            Self::Include => "@include",
            Self::If => "@if",
            Self::Else => "@else",
            Self::EndIf => "@endif",
            Self::ForEach => "@foreach",
            Self::EndForEach => "@endforeach",
            Self::Error => "@error",
            Self::EndError => "@enderror",
            Self::Csrf => "@csrf",
            Self::Asset => "@asset",
            Self::Vite => "@vite",
        }
    }

    /// Whether the directive is followed by an argument list.
    pub fn takes_args(&self) -> bool {
        !matches!(
            self,
            Self::EndSection
                | Self::Else
                | Self::EndIf
                | Self::EndForEach
                | Self::EndError
                | Self::Csrf
        )
    }
}

/// Tokens produced by the tokenizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Text(Span),
    Interpolation {
        escape: bool,
        content: Span,
        span: Span,
    },
    Directive {
        kind: DirectiveKind,
        args: Option<Span>,
        span: Span,
    },
}

/// Check if character is horizontal whitespace
#[inline]
pub fn is_inline_whitespace(c: u8) -> bool {
    c == SPACE || c == TAB || c == CARRIAGE_RETURN
}

#[inline]
fn is_directive_char(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

/// Skip a quoted run starting at `index` (which holds the quote), returning
/// the index just past the closing quote or `None` if it never closes.
fn skip_quoted(input: &[u8], index: usize) -> Option<usize> {
    let quote = input[index];
    let mut i = index + 1;
    while i < input.len() {
        match input[i] {
            BACKSLASH => i += 2,
            c if c == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

/// Find the `)` matching the `(` at `open`, skipping quoted substrings and
/// nested parentheses.
pub fn find_closing_paren(input: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < input.len() {
        match input[i] {
            SINGLE_QUOTE | DOUBLE_QUOTE => {
                i = skip_quoted(input, i)?;
                continue;
            }
            LEFT_PAREN => depth += 1,
            RIGHT_PAREN => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Output of [`Tokenizer::tokenize`]
#[derive(Debug, Default)]
pub struct Tokenized {
    pub tokens: Vec<Token>,
    pub errors: Vec<(ErrorCode, Span)>,
    /// Newline offsets for line/column calculation
    pub newlines: Vec<usize>,
}

impl Tokenized {
    /// Get the position for a given byte offset
    pub fn get_pos(&self, index: usize) -> Position {
        // Binary search for line number
        let line = match self.newlines.binary_search(&index) {
            Ok(i) => i + 1,
            Err(i) => i + 1,
        };

        let column = if line == 1 {
            index + 1
        } else {
            index - self.newlines[line - 2]
        };

        Position::new(index as u32, line as u32, column as u32)
    }
}

/// Template tokenizer
pub struct Tokenizer<'a> {
    /// Input source
    input: &'a [u8],
    /// Start of the pending text run
    section_start: usize,
    /// Current index
    index: usize,
    raw_open: &'a [u8],
    raw_close: &'a [u8],
    escaped_open: &'a [u8],
    escaped_close: &'a [u8],
    out: Tokenized,
}

impl<'a> Tokenizer<'a> {
    /// Create a tokenizer with the default `{{ }}` / `{!! !!}` delimiters
    pub fn new(input: &'a str) -> Self {
        Self::with_delimiters(input, b"{{", b"}}", b"{!!", b"!!}")
    }

    /// Create a tokenizer using the delimiters from parser options
    pub fn with_options(input: &'a str, options: &'a ParserOptions) -> Self {
        Self::with_delimiters(
            input,
            options.raw_delimiters.0.as_bytes(),
            options.raw_delimiters.1.as_bytes(),
            options.escaped_delimiters.0.as_bytes(),
            options.escaped_delimiters.1.as_bytes(),
        )
    }

    pub fn with_delimiters(
        input: &'a str,
        raw_open: &'a [u8],
        raw_close: &'a [u8],
        escaped_open: &'a [u8],
        escaped_close: &'a [u8],
    ) -> Self {
        Self {
            input: input.as_bytes(),
            section_start: 0,
            index: 0,
            raw_open,
            raw_close,
            escaped_open,
            escaped_close,
            out: Tokenized::default(),
        }
    }

    /// Tokenize the input
    pub fn tokenize(mut self) -> Tokenized {
        self.out.newlines = memchr_iter(NEWLINE, self.input).collect();

        let raw_first = self.raw_open.first().copied().unwrap_or(AT);
        let escaped_first = self.escaped_open.first().copied().unwrap_or(AT);
        while self.index < self.input.len() {
            let rest = &self.input[self.index..];
            let Some(skip) = memchr3(AT, raw_first, escaped_first, rest) else {
                break;
            };
            self.index += skip;

            if self.input[self.index] == AT {
                self.state_at();
            } else if self.starts_with(self.escaped_open) {
                self.state_interpolation(true);
            } else if self.starts_with(self.raw_open) {
                self.state_interpolation(false);
            } else {
                self.index += 1;
            }
        }

        self.index = self.input.len();
        self.flush_text(self.index);
        self.out
    }

    fn starts_with(&self, pattern: &[u8]) -> bool {
        !pattern.is_empty() && self.input[self.index..].starts_with(pattern)
    }

    fn flush_text(&mut self, end: usize) {
        if self.section_start < end {
            self.out
                .tokens
                .push(Token::Text(Span::new(self.section_start, end)));
        }
    }

    fn error(&mut self, code: ErrorCode, start: usize, end: usize) {
        self.out.errors.push((code, Span::new(start, end)));
    }

    // ========== State handlers ==========

    fn state_interpolation(&mut self, escape: bool) {
        let (open, close) = if escape {
            (self.escaped_open, self.escaped_close)
        } else {
            (self.raw_open, self.raw_close)
        };
        let start = self.index;
        let content_start = start + open.len();

        let mut i = content_start;
        let mut close_at = None;
        while i < self.input.len() {
            match self.input[i] {
                SINGLE_QUOTE | DOUBLE_QUOTE => match skip_quoted(self.input, i) {
                    Some(next) => i = next,
                    None => break,
                },
                _ if self.input[i..].starts_with(close) => {
                    close_at = Some(i);
                    break;
                }
                _ => i += 1,
            }
        }

        let Some(content_end) = close_at else {
            // Leave the rest as text
            self.error(ErrorCode::UnclosedInterpolation, start, self.input.len());
            self.index = self.input.len();
            return;
        };

        self.flush_text(start);
        let end = content_end + close.len();
        self.out.tokens.push(Token::Interpolation {
            escape,
            content: Span::new(content_start, content_end),
            span: Span::new(start, end),
        });
        self.index = end;
        self.section_start = end;
    }

    fn state_at(&mut self) {
        let start = self.index;
        let name_start = start + 1;

        // `@@name` escapes a directive and renders `@name`
        if self.input.get(name_start) == Some(&AT) {
            self.flush_text(start);
            self.section_start = name_start;
            self.index = name_start + 1;
            while self.index < self.input.len() && is_directive_char(self.input[self.index]) {
                self.index += 1;
            }
            return;
        }

        let mut name_end = name_start;
        while name_end < self.input.len() && is_directive_char(self.input[name_end]) {
            name_end += 1;
        }

        let name = std::str::from_utf8(&self.input[name_start..name_end]).unwrap_or_default();
        let Some(kind) = DirectiveKind::from_name(name) else {
            // Not a directive, keep as text
            self.index = name_end.max(name_start);
            return;
        };

        let (args, end) = if kind.takes_args() {
            let Some((args, end)) = self.scan_args(kind, start, name_end) else {
                // No argument list, so the word is prose
                self.index = name_end;
                return;
            };
            (Some(args), end)
        } else {
            (None, name_end)
        };

        self.flush_text(start);

        self.out.tokens.push(Token::Directive {
            kind,
            args,
            span: Span::new(start, end),
        });
        self.index = end;
        self.section_start = end;
    }

    /// Scan the argument list after a directive name. Returns the span of
    /// the text inside the parentheses and the end of the directive, or
    /// `None` when there is no argument list.
    fn scan_args(
        &mut self,
        kind: DirectiveKind,
        start: usize,
        name_end: usize,
    ) -> Option<(Span, usize)> {
        let mut i = name_end;
        while i < self.input.len() && is_inline_whitespace(self.input[i]) {
            i += 1;
        }

        if self.input.get(i) == Some(&LEFT_PAREN) {
            return Some(match find_closing_paren(self.input, i) {
                Some(close) => (Span::new(i + 1, close), close + 1),
                None => {
                    self.error(ErrorCode::UnclosedDirectiveArgs, start, self.input.len());
                    let end = self.input.len();
                    (Span::new(i + 1, end), end)
                }
            });
        }

        // Unparenthesized condition: `@if` then whitespace, up to end of line
        if kind != DirectiveKind::If || i == name_end {
            return None;
        }
        let line_end = memchr(NEWLINE, &self.input[name_end..])
            .map_or(self.input.len(), |p| name_end + p);
        if self.input[name_end..line_end].iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        Some((Span::new(name_end, line_end), line_end))
    }
}
