//! Lexer for Rosetta script templates.

use super::error::{ParseError, ParseErrorKind};

/// Type of a token.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum TokenKind {
    /// An open angle bracket `<`.
    OpenAngle,
    /// A closing angle bracket `>`.
    CloseAngle,
    /// A slash `/`, either opening a closing tag or ending a self-closing tag.
    Slash,
    /// An equals sign `=`.
    Equals,
    /// A bare word.
    /// This is a non-empty string of ASCII letters, digits, underscores, periods and percent signs.
    Word(String),
    /// A double quoted string, without the quotes.
    /// Quoted strings may contain whitespace but not newlines.
    Quoted(String),
}

impl TokenKind {
    /// Number of bytes the token occupies in the source.
    pub fn source_len(&self) -> usize {
        match self {
            TokenKind::OpenAngle | TokenKind::CloseAngle | TokenKind::Slash | TokenKind::Equals => 1,
            TokenKind::Word(word) => word.len(),
            TokenKind::Quoted(quoted) => quoted.len() + 2,
        }
    }
}

/// Token in a Rosetta script.
///
/// The second element is the start of the span of the token;
///     i.e., the byte offset in the file where the token starts.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Token(pub TokenKind, pub usize);

impl Token {
    /// Span of the token in the source.
    pub fn span(&self) -> std::ops::Range<usize> {
        self.1..self.1 + self.0.source_len()
    }
}

/// Returns true if the character can appear in a bare word.
pub fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '%'
}

/// Lexer for Rosetta scripts.
pub struct Lexer<'a> {
    source: &'a str,
    /// The current position within the source string.
    current: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer from source code.
    pub fn new(source: &'a str) -> Lexer<'a> {
        Lexer { source, current: 0 }
    }

    fn accumulate_word(&mut self) -> String {
        let word: String = self.source[self.current..]
            .chars()
            .take_while(|c| is_word_char(*c))
            .collect();
        self.current += word.len();
        word
    }

    fn accumulate_quoted(&mut self, start: usize) -> Result<String, ParseError> {
        // skip the opening quote
        self.current += 1;
        let mut s = String::new();
        for c in self.source[self.current..].chars() {
            match c {
                '"' => {
                    self.current += 1;
                    return Ok(s);
                }
                '\n' | '\r' => break,
                _ => {
                    self.current += c.len_utf8();
                    s.push(c);
                }
            }
        }
        Err(ParseError::new(
            self.source,
            start..self.current,
            ParseErrorKind::UnterminatedString,
        ))
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let start_of_token = self.current;
            let c = self.source[self.current..].chars().next()?;
            let kind = match c {
                ' ' | '\t' | '\n' | '\r' => {
                    self.current += 1;
                    continue;
                }
                '<' => {
                    self.current += 1;
                    TokenKind::OpenAngle
                }
                '>' => {
                    self.current += 1;
                    TokenKind::CloseAngle
                }
                '/' => {
                    self.current += 1;
                    TokenKind::Slash
                }
                '=' => {
                    self.current += 1;
                    TokenKind::Equals
                }
                '"' => match self.accumulate_quoted(start_of_token) {
                    Ok(s) => TokenKind::Quoted(s),
                    Err(err) => return Some(Err(err)),
                },
                c if is_word_char(c) => TokenKind::Word(self.accumulate_word()),
                c => {
                    self.current += c.len_utf8();
                    return Some(Err(ParseError::new(
                        self.source,
                        start_of_token..self.current,
                        ParseErrorKind::InvalidCharacter(c),
                    )));
                }
            };
            return Some(Ok(Token(kind, start_of_token)));
        }
    }
}
