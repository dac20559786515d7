use std::{collections::BTreeMap, str::Chars};

use itertools::{PeekNth, peek_nth};
use once_cell::sync::Lazy;
use strum::EnumString;
use thiserror::Error;

use super::SourceFile;

#[derive(Debug)]
pub struct Lexer<'source> {
    source: &'source SourceFile,
    position: usize,
    chars: PeekNth<Chars<'source>>,
}

#[derive(Debug, Clone, Copy)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /* Words */
    Keyword(Keyword), // evoke
    Identifier,       // main_loop

    /* Literals */
    BooleanLiteral,   // true
    NullLiteral,      // null
    IntegerLiteral,   // 1
    FloatLiteral,     // 1.0
    StringLiteral,    // "hello, world"
    GlyphLiteral,     // 'a'
    CodepointLiteral, // U+1F600

    /* Delimiters */
    OpenParen,    // (
    CloseParen,   // )
    OpenBracket,  // [
    CloseBracket, // ]
    OpenBrace,    // {
    CloseBrace,   // }
    Semicolon,    // ;
    Comma,        // ,

    /* Other */
    Colon, // :
    At,    // @
    Arrow, // ->

    /* Unary Ops */
    Bang,      // !
    Ampersand, // &

    /* Unary + Binary Ops */
    Asterisk, // *
    Minus,    // -

    /* Binary Ops */
    Plus,                 // +
    Divide,               // /
    Modulus,              // %
    Power,                // **
    LogicalAnd,           // &&
    LogicalOr,            // ||
    DoubleEquals,         // ==
    NotEquals,            // !=
    LessThan,             // <
    LessThanOrEqualTo,    // <=
    GreaterThan,          // >
    GreaterThanOrEqualTo, // >=

    /* Postfix */
    Question,  // ?
    Increment, // ++
    Decrement, // --

    /* Assignment */
    Equals, // =
}

impl TokenKind {
    pub fn is_equality_operator(&self) -> bool {
        matches!(self, Self::DoubleEquals | Self::NotEquals)
    }

    pub fn is_comparison_operator(&self) -> bool {
        matches!(
            self,
            Self::LessThan
                | Self::LessThanOrEqualTo
                | Self::GreaterThan
                | Self::GreaterThanOrEqualTo
        )
    }

    pub fn is_term_operator(&self) -> bool {
        matches!(self, Self::Plus | Self::Minus)
    }

    pub fn is_factor_operator(&self) -> bool {
        matches!(self, Self::Asterisk | Self::Divide | Self::Modulus)
    }

    pub fn is_unary_operator(&self) -> bool {
        matches!(
            self,
            Self::Asterisk | Self::Bang | Self::Minus | Self::Ampersand
        )
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Self::BooleanLiteral
                | Self::NullLiteral
                | Self::IntegerLiteral
                | Self::FloatLiteral
                | Self::StringLiteral
                | Self::GlyphLiteral
                | Self::CodepointLiteral
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Keyword {
    Affix,
    Evoke,
    Main,
    Let,
    Const,
    Exscribe,
    Invoke,
    Conjure,
    If,
    Else,
    While,
    Break,
    Return,
}

/// Table of single char tokens (matched after longer sequences are checked for)
static SINGLE_TOKENS: Lazy<BTreeMap<char, TokenKind>> = Lazy::new(|| {
    BTreeMap::from([
        ('(', TokenKind::OpenParen),
        (')', TokenKind::CloseParen),
        ('[', TokenKind::OpenBracket),
        (']', TokenKind::CloseBracket),
        ('{', TokenKind::OpenBrace),
        ('}', TokenKind::CloseBrace),
        (';', TokenKind::Semicolon),
        (',', TokenKind::Comma),
        (':', TokenKind::Colon),
        ('@', TokenKind::At),
        ('!', TokenKind::Bang),
        ('&', TokenKind::Ampersand),
        ('*', TokenKind::Asterisk),
        ('-', TokenKind::Minus),
        ('+', TokenKind::Plus),
        ('/', TokenKind::Divide),
        ('%', TokenKind::Modulus),
        ('<', TokenKind::LessThan),
        ('>', TokenKind::GreaterThan),
        ('?', TokenKind::Question),
        ('=', TokenKind::Equals),
    ])
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn to(self, other: Span) -> Span {
        Span::new(self.start, other.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SyntaxError {
    pub message: String,
    pub span: Span,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

type LexResult<T> = Result<T, SyntaxError>;

impl<'source> Lexer<'source> {
    pub fn new(source: &'source SourceFile) -> Self {
        Self {
            source,
            chars: peek_nth(source.contents.chars()),
            position: 0,
        }
    }

    pub fn source(&self) -> &'source SourceFile {
        self.source
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.position += c.len_utf8();
        Some(c)
    }

    fn peek_is(&mut self, n: usize, expected: char) -> bool {
        self.chars.peek_nth(n).is_some_and(|c| *c == expected)
    }

    fn ignore_whitespace(&mut self) {
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.bump();
        }
    }

    fn ignore_line(&mut self) {
        while self.chars.peek().is_some_and(|c| *c != '\n') {
            self.bump();
        }
    }

    /// /@ ... @/
    fn ignore_block_comment(&mut self) -> LexResult<()> {
        let start_position = self.position;

        self.bump();
        self.bump();

        loop {
            if self.peek_is(0, '@') && self.peek_is(1, '/') {
                self.bump();
                self.bump();
                return Ok(());
            }

            if self.bump().is_none() {
                return Err(SyntaxError::new(
                    "unterminated block comment",
                    self.new_span(start_position),
                ));
            }
        }
    }

    /// Reads a quoted literal, validating escapes. Single quoted text holding
    /// exactly one character is a glyph, anything else is a string.
    fn read_quoted(&mut self, wrapper: char) -> LexResult<Token> {
        let start_position = self.position;
        let mut length = 0;

        // Consume opening wrapper
        self.bump();

        loop {
            let Some(c) = self.chars.peek().copied() else {
                return Err(SyntaxError::new(
                    "reached end of file while reading quoted literal",
                    self.new_span(start_position),
                ));
            };

            if c == '\n' {
                return Err(SyntaxError::new(
                    "reached end of line while reading quoted literal",
                    self.new_span(start_position),
                ));
            }

            let escape_position = self.position;
            self.bump();

            if c == wrapper {
                break;
            }

            if c == '\\' {
                let escaped = self.bump();

                if escaped.and_then(unescape).is_none() {
                    return Err(SyntaxError::new(
                        format!(
                            "unknown escape sequence `\\{}`",
                            escaped.map(String::from).unwrap_or_default()
                        ),
                        self.new_span(escape_position),
                    ));
                }
            }

            length += 1;
        }

        let kind = if wrapper == '\'' && length == 1 {
            TokenKind::GlyphLiteral
        } else {
            TokenKind::StringLiteral
        };

        Ok(Token {
            kind,
            span: self.new_span(start_position),
        })
    }

    // Keyword, identifier, boolean literal, or null
    fn read_word(&mut self) -> Token {
        let start_position = self.position;

        while self
            .chars
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || *c == '_')
        {
            self.bump();
        }

        let span = self.new_span(start_position);
        let value = self.source.value_of_span(span);

        let kind = if let Ok(keyword) = value.parse() {
            TokenKind::Keyword(keyword)
        } else {
            match value {
                "true" | "false" => TokenKind::BooleanLiteral,
                "null" => TokenKind::NullLiteral,
                _ => TokenKind::Identifier,
            }
        };

        Token { kind, span }
    }

    // U+1F600
    fn read_codepoint(&mut self) -> LexResult<Token> {
        let start_position = self.position;

        self.bump();
        self.bump();

        while self.chars.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
            self.bump();
        }

        let span = self.new_span(start_position);

        if decode_codepoint(self.source.value_of_span(span)).is_none() {
            return Err(SyntaxError::new("invalid unicode codepoint", span));
        }

        Ok(Token {
            kind: TokenKind::CodepointLiteral,
            span,
        })
    }

    fn read_number(&mut self) -> Token {
        let start_position = self.position;
        let mut kind = TokenKind::IntegerLiteral;

        while let Some(c) = self.chars.peek().copied() {
            if c == '.' && kind == TokenKind::IntegerLiteral {
                kind = TokenKind::FloatLiteral;
            } else if !c.is_ascii_digit() {
                break;
            }

            self.bump();
        }

        Token {
            kind,
            span: self.new_span(start_position),
        }
    }

    fn read_single(&mut self, kind: TokenKind) -> Token {
        let start_position = self.position;

        self.bump();

        Token {
            kind,
            span: self.new_span(start_position),
        }
    }

    fn read_double(&mut self, kind: TokenKind) -> Token {
        let start_position = self.position;

        self.bump();
        self.bump();

        Token {
            kind,
            span: self.new_span(start_position),
        }
    }

    fn new_span(&self, start: usize) -> Span {
        Span {
            start,
            end: self.position,
        }
    }

    fn next_token(&mut self) -> Option<LexResult<Token>> {
        while let Some(c) = self.chars.peek().copied() {
            let token = match c {
                // Ignore whitespace
                c if c.is_whitespace() => {
                    self.ignore_whitespace();
                    continue;
                }
                // Ignore comments
                '/' if self.peek_is(1, '/') => {
                    self.ignore_line();
                    continue;
                }
                '/' if self.peek_is(1, '@') => {
                    if let Err(error) = self.ignore_block_comment() {
                        return Some(Err(error));
                    }
                    continue;
                }

                // String and glyph literals
                '"' => self.read_quoted('"'),
                '\'' => self.read_quoted('\''),

                // Codepoint literals
                'U' if self.peek_is(1, '+')
                    && self.chars.peek_nth(2).is_some_and(|c| c.is_ascii_hexdigit()) =>
                {
                    self.read_codepoint()
                }

                // Integer and float literals
                n if n.is_ascii_digit() => Ok(self.read_number()),
                '.' if self.chars.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) => {
                    Ok(self.read_number())
                }

                // Identifiers, keywords, and boolean literals
                a if a.is_ascii_alphabetic() || a == '_' => Ok(self.read_word()),

                '-' if self.peek_is(1, '>') => Ok(self.read_double(TokenKind::Arrow)),
                '-' if self.peek_is(1, '-') => Ok(self.read_double(TokenKind::Decrement)),
                '+' if self.peek_is(1, '+') => Ok(self.read_double(TokenKind::Increment)),
                '*' if self.peek_is(1, '*') => Ok(self.read_double(TokenKind::Power)),
                '=' if self.peek_is(1, '=') => Ok(self.read_double(TokenKind::DoubleEquals)),
                '!' if self.peek_is(1, '=') => Ok(self.read_double(TokenKind::NotEquals)),
                '<' if self.peek_is(1, '=') => {
                    Ok(self.read_double(TokenKind::LessThanOrEqualTo))
                }
                '>' if self.peek_is(1, '=') => {
                    Ok(self.read_double(TokenKind::GreaterThanOrEqualTo))
                }
                '&' if self.peek_is(1, '&') => Ok(self.read_double(TokenKind::LogicalAnd)),
                '|' if self.peek_is(1, '|') => Ok(self.read_double(TokenKind::LogicalOr)),

                s if SINGLE_TOKENS.contains_key(&s) => Ok(self.read_single(SINGLE_TOKENS[&s])),
                c => {
                    let start_position = self.position;
                    self.bump();

                    Err(SyntaxError::new(
                        format!("unexpected character in stream: `{c}`"),
                        self.new_span(start_position),
                    ))
                }
            };

            return Some(token);
        }

        None
    }
}

impl Iterator for Lexer<'_> {
    type Item = LexResult<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

fn unescape(c: char) -> Option<char> {
    Some(match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        '\\' => '\\',
        '"' => '"',
        '\'' => '\'',
        _ => return None,
    })
}

/// Strips the wrapping quotes from a lexed literal and resolves its escapes.
pub fn decode_quoted(raw: &str) -> String {
    let inner = raw
        .get(1..raw.len().saturating_sub(1))
        .unwrap_or_default();

    let mut decoded = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next().and_then(unescape) {
                decoded.push(escaped);
            }
        } else {
            decoded.push(c);
        }
    }

    decoded
}

/// `U+1F600` -> '😀'
pub fn decode_codepoint(raw: &str) -> Option<char> {
    let digits = raw.strip_prefix("U+")?;

    u32::from_str_radix(digits, 16).ok().and_then(char::from_u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let source = SourceFile::from_memory(source);

        Lexer::new(&source)
            .map(|token| token.map(|token| token.kind))
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn lexes_glyph_syntax() {
        assert_eq!(
            kinds("affix io@exscribe; let p: *int32? = &x;"),
            vec![
                TokenKind::Keyword(Keyword::Affix),
                TokenKind::Identifier,
                TokenKind::At,
                TokenKind::Keyword(Keyword::Exscribe),
                TokenKind::Semicolon,
                TokenKind::Keyword(Keyword::Let),
                TokenKind::Identifier,
                TokenKind::Colon,
                TokenKind::Asterisk,
                TokenKind::Identifier,
                TokenKind::Question,
                TokenKind::Equals,
                TokenKind::Ampersand,
                TokenKind::Identifier,
                TokenKind::Semicolon,
            ]
        );
    }

    #[test]
    fn distinguishes_multi_char_operators() {
        assert_eq!(
            kinds("a ** 2 -> x++ y-- && || == != <= >="),
            vec![
                TokenKind::Identifier,
                TokenKind::Power,
                TokenKind::IntegerLiteral,
                TokenKind::Arrow,
                TokenKind::Identifier,
                TokenKind::Increment,
                TokenKind::Identifier,
                TokenKind::Decrement,
                TokenKind::LogicalAnd,
                TokenKind::LogicalOr,
                TokenKind::DoubleEquals,
                TokenKind::NotEquals,
                TokenKind::LessThanOrEqualTo,
                TokenKind::GreaterThanOrEqualTo,
            ]
        );
    }

    #[test]
    fn single_quoted_text_is_a_glyph_only_when_one_character_long() {
        assert_eq!(
            kinds(r#"'a' '\n' 'ab' "a" U+1F600 3.14 .5 null"#),
            vec![
                TokenKind::GlyphLiteral,
                TokenKind::GlyphLiteral,
                TokenKind::StringLiteral,
                TokenKind::StringLiteral,
                TokenKind::CodepointLiteral,
                TokenKind::FloatLiteral,
                TokenKind::FloatLiteral,
                TokenKind::NullLiteral,
            ]
        );
    }

    #[test]
    fn skips_line_and_block_comments() {
        assert_eq!(
            kinds("x // trailing\n/@ let z: int32 = &(&p); @/ y"),
            vec![TokenKind::Identifier, TokenKind::Identifier]
        );
    }

    #[test]
    fn reports_unterminated_literals() {
        let source = SourceFile::from_memory("exscribe \"oops");
        let error = Lexer::new(&source)
            .find_map(Result::err)
            .unwrap();

        assert_eq!(error.span, Span::new(9, 14));
    }

    #[test]
    fn decodes_escapes_and_codepoints() {
        assert_eq!(decode_quoted(r#""a\tb\"""#), "a\tb\"");
        assert_eq!(decode_quoted("'x'"), "x");
        assert_eq!(decode_codepoint("U+41"), Some('A'));
        assert_eq!(decode_codepoint("U+D800"), None);
    }
}
