//! Lexer for Whitespace source code.
//!
//! Converts source text into a stream of space/tab/linefeed tokens.
//! Every other character is a comment and is skipped.

use crate::token::{Span, Token, TokenKind};
use std::str::Chars;

/// Lexer for Whitespace source code.
pub struct Lexer<'a> {
    /// Character iterator over the source.
    chars: Chars<'a>,
    /// Current byte position.
    pos: usize,
    /// Current line number (1-indexed).
    line: u32,
    /// Current column number (1-indexed).
    column: u32,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source text.
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the entire source.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token() {
            tokens.push(token);
        }
        tokens
    }

    /// Get the next token, skipping comment characters. Returns `None` at
    /// end of input.
    pub fn next_token(&mut self) -> Option<Token> {
        loop {
            let span = Span::new(self.pos, self.line, self.column);
            let c = self.advance()?;
            let kind = match c {
                ' ' => TokenKind::Space,
                '\t' => TokenKind::Tab,
                '\n' => TokenKind::Linefeed,
                _ => continue,
            };
            return Some(Token::new(kind, span));
        }
    }

    /// Advance to the next character, returning the current one.
    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comment_characters() {
        let tokens = Lexer::new("push: \t-> \n").tokenize();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Space,
                TokenKind::Tab,
                TokenKind::Space,
                TokenKind::Linefeed
            ]
        );
    }

    #[test]
    fn tracks_lines_and_columns() {
        let tokens = Lexer::new("a \n\t").tokenize();
        assert_eq!(tokens[0].span, Span::new(1, 1, 2));
        assert_eq!(tokens[1].span, Span::new(2, 1, 3));
        // Tab on the line after the linefeed.
        assert_eq!(tokens[2].span, Span::new(3, 2, 1));
    }

    #[test]
    fn empty_source() {
        assert!(Lexer::new("").tokenize().is_empty());
        assert!(Lexer::new("nothing-significant").tokenize().is_empty());
    }
}
