//! Recursive descent parser for Whitespace programs.
//!
//! The grammar is a prefix code: an instruction modification parameter (IMP)
//! selects an instruction family, the following tokens select the opcode,
//! and `Push`/`Copy`/`Slide` and the flow-control opcodes carry a
//! linefeed-terminated number or label payload.

use crate::instruction::{Instruction, Label};
use crate::lexer::Lexer;
use crate::token::{Span, Token, TokenKind};
use thiserror::Error;

/// Parser error.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unexpected end of program at {span}")]
    UnexpectedEof { span: Span },
    #[error("unknown opcode at {span}")]
    UnknownOpcode { span: Span },
    #[error("number literal at {span} does not fit in 63 bits")]
    NumberOverflow { span: Span },
}

impl ParseError {
    /// Get the source span where this error occurred.
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedEof { span } => *span,
            ParseError::UnknownOpcode { span } => *span,
            ParseError::NumberOverflow { span } => *span,
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parse Whitespace source into a linear instruction sequence.
pub fn parse(source: &str) -> ParseResult<Vec<Instruction>> {
    Parser::new(source).parse_program()
}

/// Parser for Whitespace source code.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    /// Create a new parser from source text.
    pub fn new(source: &str) -> Self {
        Self {
            tokens: Lexer::new(source).tokenize(),
            pos: 0,
        }
    }

    /// Parse the complete program.
    pub fn parse_program(&mut self) -> ParseResult<Vec<Instruction>> {
        let mut instructions = Vec::new();
        while self.pos < self.tokens.len() {
            instructions.push(self.parse_instruction()?);
        }
        Ok(instructions)
    }

    /// Parse one instruction: IMP prefix, opcode, optional payload.
    fn parse_instruction(&mut self) -> ParseResult<Instruction> {
        use TokenKind::{Linefeed, Space, Tab};

        match self.next()? {
            // Stack manipulation.
            Space => match self.next()? {
                Space => Ok(Instruction::Push(self.parse_number()?)),
                Tab => match self.next()? {
                    Space => Ok(Instruction::Copy(self.parse_number()?)),
                    Linefeed => Ok(Instruction::Slide(self.parse_number()?)),
                    Tab => Err(self.unknown_opcode()),
                },
                Linefeed => match self.next()? {
                    Space => Ok(Instruction::Duplicate),
                    Tab => Ok(Instruction::Swap),
                    Linefeed => Ok(Instruction::Discard),
                },
            },
            Tab => match self.next()? {
                // Arithmetic.
                Space => match self.next()? {
                    Space => match self.next()? {
                        Space => Ok(Instruction::Add),
                        Tab => Ok(Instruction::Sub),
                        Linefeed => Ok(Instruction::Mul),
                    },
                    Tab => match self.next()? {
                        Space => Ok(Instruction::Div),
                        Tab => Ok(Instruction::Mod),
                        Linefeed => Err(self.unknown_opcode()),
                    },
                    Linefeed => Err(self.unknown_opcode()),
                },
                // Heap access.
                Tab => match self.next()? {
                    Space => Ok(Instruction::Store),
                    Tab => Ok(Instruction::Retrieve),
                    Linefeed => Err(self.unknown_opcode()),
                },
                // I/O.
                Linefeed => match self.next()? {
                    Space => match self.next()? {
                        Space => Ok(Instruction::OutChar),
                        Tab => Ok(Instruction::OutNum),
                        Linefeed => Err(self.unknown_opcode()),
                    },
                    Tab => match self.next()? {
                        Space => Ok(Instruction::ReadChar),
                        Tab => Ok(Instruction::ReadNum),
                        Linefeed => Err(self.unknown_opcode()),
                    },
                    Linefeed => Err(self.unknown_opcode()),
                },
            },
            // Flow control.
            Linefeed => match self.next()? {
                Space => match self.next()? {
                    Space => Ok(Instruction::Mark(self.parse_label()?)),
                    Tab => Ok(Instruction::Call(self.parse_label()?)),
                    Linefeed => Ok(Instruction::Jump(self.parse_label()?)),
                },
                Tab => match self.next()? {
                    Space => Ok(Instruction::JumpZero(self.parse_label()?)),
                    Tab => Ok(Instruction::JumpNegative(self.parse_label()?)),
                    Linefeed => Ok(Instruction::Return),
                },
                Linefeed => match self.next()? {
                    Linefeed => Ok(Instruction::Exit),
                    Space | Tab => Err(self.unknown_opcode()),
                },
            },
        }
    }

    /// Parse a signed number payload: a sign token (space = `+`, tab = `-`)
    /// followed by binary magnitude bits, terminated by a linefeed. A bare
    /// sign is zero.
    fn parse_number(&mut self) -> ParseResult<i64> {
        let span = self.current_span();
        let bits = self.parse_bits()?;
        let Some((&sign, magnitude)) = bits.split_first() else {
            // No sign bit at all: an empty payload is zero.
            return Ok(0);
        };
        if magnitude.len() > 63 {
            return Err(ParseError::NumberOverflow { span });
        }
        let mut value: i64 = 0;
        for &bit in magnitude {
            value = (value << 1) | i64::from(bit);
        }
        Ok(if sign { -value } else { value })
    }

    /// Parse a label payload: the raw bit sequence up to a linefeed.
    fn parse_label(&mut self) -> ParseResult<Label> {
        let bits = self.parse_bits()?;
        Ok(Label::from_bits(&bits))
    }

    /// Consume space/tab tokens up to and including the linefeed terminator.
    fn parse_bits(&mut self) -> ParseResult<Vec<bool>> {
        let mut bits = Vec::new();
        loop {
            match self.next()? {
                TokenKind::Space => bits.push(false),
                TokenKind::Tab => bits.push(true),
                TokenKind::Linefeed => return Ok(bits),
            }
        }
    }

    /// Consume the next token.
    fn next(&mut self) -> ParseResult<TokenKind> {
        let Some(token) = self.tokens.get(self.pos) else {
            return Err(ParseError::UnexpectedEof {
                span: self.current_span(),
            });
        };
        self.pos += 1;
        Ok(token.kind)
    }

    /// Span of the current token, or of the last token at end of input.
    fn current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.span)
            .unwrap_or_else(Span::dummy)
    }

    /// Span of the most recently consumed token.
    fn prev_span(&self) -> Span {
        self.tokens
            .get(self.pos.saturating_sub(1))
            .map(|t| t.span)
            .unwrap_or_else(Span::dummy)
    }

    fn unknown_opcode(&self) -> ParseError {
        ParseError::UnknownOpcode {
            span: self.prev_span(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Source strings below spell out tokens: ' ' = space, '\t' = tab.

    #[test]
    fn parses_push_and_output() {
        // push 72 ('H'), output as char
        let source = "   \t  \t   \n\t\n  ";
        let program = parse(source).unwrap();
        assert_eq!(
            program,
            vec![Instruction::Push(72), Instruction::OutChar]
        );
    }

    #[test]
    fn parses_negative_number() {
        // push -5: sign tab, bits 101
        let source = "  \t\t \t\n";
        assert_eq!(parse(source).unwrap(), vec![Instruction::Push(-5)]);
    }

    #[test]
    fn bare_sign_is_zero() {
        assert_eq!(parse("  \t\n").unwrap(), vec![Instruction::Push(0)]);
        assert_eq!(parse("   \n").unwrap(), vec![Instruction::Push(0)]);
    }

    #[test]
    fn empty_payload_is_zero() {
        assert_eq!(parse("  \n").unwrap(), vec![Instruction::Push(0)]);
    }

    #[test]
    fn parses_flow_control() {
        // mark "01", jump "01", exit
        let source = "\n   \t\n\n \n \t\n\n\n\n";
        let program = parse(source).unwrap();
        assert_eq!(
            program,
            vec![
                Instruction::Mark(Label::from_bits(&[false, true])),
                Instruction::Jump(Label::from_bits(&[false, true])),
                Instruction::Exit,
            ]
        );
    }

    #[test]
    fn parses_heap_and_io() {
        let source = "\t\t \t\t\t\t\n\t \t\n\t\t";
        let program = parse(source).unwrap();
        assert_eq!(
            program,
            vec![
                Instruction::Store,
                Instruction::Retrieve,
                Instruction::ReadChar,
                Instruction::ReadNum,
            ]
        );
    }

    #[test]
    fn comments_are_ignored() {
        let bare = "   \t  \t   \n\t\n  ";
        // Same token stream with commentary interleaved.
        let with_comments: String = bare
            .chars()
            .flat_map(|c| [c, 'x'])
            .collect();
        assert_eq!(parse(&with_comments).unwrap(), parse(bare).unwrap());
    }

    #[test]
    fn truncated_program_errors() {
        let err = parse(" ").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEof { .. }));
    }

    #[test]
    fn unterminated_number_errors() {
        // push with bits but no linefeed terminator
        let err = parse("   \t\t").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEof { .. }));
    }

    #[test]
    fn rejects_unknown_opcode() {
        // stack IMP followed by tab-tab is not a valid opcode
        let err = parse(" \t\t").unwrap_err();
        assert!(matches!(err, ParseError::UnknownOpcode { .. }));
    }

    #[test]
    fn number_overflow_detected() {
        let mut source = String::from("   ");
        source.push_str(&"\t".repeat(64));
        source.push('\n');
        let err = parse(&source).unwrap_err();
        assert!(matches!(err, ParseError::NumberOverflow { .. }));
    }
}
