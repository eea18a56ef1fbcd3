//! Tokenization of bencoded byte streams
//!
//! [`TokenLexer`] is the contract the [`ValueParser`](crate::parser::ValueParser) is
//! written against: one token of lookahead plus the ability to consume it. [`Lexer`]
//! implements it on top of any buffered byte source.

use std::io::{self, BufRead, Read};

use log::debug;
use smallvec::SmallVec;

use crate::{Error, token::Token};

/// A source of bencode tokens with one token of lookahead
pub trait TokenLexer {
    /// Look at the next token without consuming it
    fn peek_token(&mut self) -> &Token;

    /// Consume and return the next token
    fn next_token(&mut self) -> Token;

    /// Stop producing tokens: every later call returns `err` as a [`Token::Error`]
    ///
    /// The parser calls this when it gives up on a value, so that the rest of
    /// the broken value is never read as if it were new input.
    fn fail(&mut self, err: Error);
}

impl<L: TokenLexer + ?Sized> TokenLexer for &mut L {
    fn peek_token(&mut self) -> &Token {
        (**self).peek_token()
    }

    fn next_token(&mut self) -> Token {
        (**self).next_token()
    }

    fn fail(&mut self, err: Error) {
        (**self).fail(err)
    }
}

#[derive(Copy, Clone, Debug)]
enum Container {
    List,
    Dict,
}

/// Digits of an integer or a length prefix; short enough to live on the stack
type DigitBuf = SmallVec<[u8; 20]>;

/// Splits a byte stream into tokens
///
/// Integers are checked for canonical form (no leading zeros, no `-0`) but
/// not parsed. The lexer keeps track of open containers only to tell list ends
/// from dict ends; it does not check what appears inside them.
///
/// After the first error, every call returns that same error as a [`Token::Error`].
/// The same goes for an error handed in through [`TokenLexer::fail`], unless the
/// lexer had already failed on its own.
#[derive(Debug)]
pub struct Lexer<R> {
    source: R,
    offset: usize,
    open: Vec<Container>,
    peeked: Option<Token>,
    failed: Option<Error>,
}

impl<R: BufRead> Lexer<R> {
    /// Create a new lexer on top of the given source
    pub fn new(source: R) -> Self {
        Lexer {
            source,
            offset: 0,
            open: Vec::new(),
            peeked: None,
            failed: None,
        }
    }

    /// Number of bytes consumed from the source so far, including a peeked token
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Give back the underlying source
    pub fn into_inner(self) -> R {
        self.source
    }

    fn produce(&mut self) -> Token {
        if let Some(err) = &self.failed {
            return Token::Error(err.clone());
        }

        match self.lex() {
            Ok(Some(token)) => token,
            Ok(None) => Token::Eof,
            Err(err) => {
                debug!("lexer failed at offset {}: {}", self.offset, err);
                self.failed = Some(err.clone());
                Token::Error(err)
            },
        }
    }

    fn peek_byte(&mut self) -> Result<Option<u8>, Error> {
        loop {
            match self.source.fill_buf() {
                Ok(buf) => return Ok(buf.first().copied()),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {},
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn take_byte(&mut self) -> Result<u8, Error> {
        let byte = self.peek_byte()?.ok_or(Error::UnexpectedEof)?;
        self.source.consume(1);
        self.offset += 1;
        Ok(byte)
    }

    fn take_int(&mut self, expected_terminator: u8, signed: bool) -> Result<DigitBuf, Error> {
        enum State {
            Start,
            Sign,
            Zero,
            Digits,
        }

        let terminator = expected_terminator as char;
        let mut digits = DigitBuf::new();
        let mut state = State::Start;

        loop {
            let curpos = self.offset;
            let c = self.take_byte()?;
            state = match state {
                State::Start => match c {
                    b'-' if signed => State::Sign,
                    b'0' => State::Zero,
                    b'1'..=b'9' => State::Digits,
                    _ if signed => {
                        return Err(Error::unexpected("'-' or '0'..'9'", c as char, curpos));
                    },
                    _ => return Err(Error::unexpected("'0'..'9'", c as char, curpos)),
                },
                State::Zero => {
                    if c == expected_terminator {
                        return Ok(digits);
                    }
                    return Err(Error::unexpected(
                        format_args!("{terminator:?}"),
                        c as char,
                        curpos,
                    ));
                },
                State::Sign => match c {
                    b'1'..=b'9' => State::Digits,
                    _ => return Err(Error::unexpected("'1'..'9'", c as char, curpos)),
                },
                State::Digits => match c {
                    b'0'..=b'9' => State::Digits,
                    _ if c == expected_terminator => return Ok(digits),
                    _ => {
                        return Err(Error::unexpected(
                            format_args!("{terminator:?} or '0'..'9'"),
                            c as char,
                            curpos,
                        ));
                    },
                },
            };
            digits.push(c);
        }
    }

    fn take_string(&mut self) -> Result<Vec<u8>, Error> {
        let curpos = self.offset;
        let digits = self.take_int(b':', false)?;
        // Only ASCII digits made it into `digits`
        let text: String = digits.iter().map(|&b| b as char).collect();
        let length = text
            .parse::<u64>()
            .map_err(|_| Error::MalformedLength {
                length: text.clone(),
                offset: curpos,
            })?;

        let mut payload = Vec::new();
        let read = (&mut self.source).take(length).read_to_end(&mut payload)?;
        self.offset += read;

        if (read as u64) < length {
            return Err(Error::UnexpectedEof);
        }
        Ok(payload)
    }

    fn lex(&mut self) -> Result<Option<Token>, Error> {
        let curpos = self.offset;
        let token = match self.peek_byte()? {
            None => return Ok(None),
            Some(b'0'..=b'9') => Token::String(self.take_string()?),
            Some(b'i') => {
                self.take_byte()?;
                let digits = self.take_int(b'e', true)?;
                Token::Integer(digits.iter().map(|&b| b as char).collect())
            },
            Some(b'l') => {
                self.take_byte()?;
                self.open.push(Container::List);
                Token::ListStart
            },
            Some(b'd') => {
                self.take_byte()?;
                self.open.push(Container::Dict);
                Token::DictStart
            },
            Some(b'e') => {
                self.take_byte()?;
                match self.open.pop() {
                    Some(Container::List) => Token::ListEnd,
                    Some(Container::Dict) => Token::DictEnd,
                    None => {
                        return Err(Error::structural_mismatch(format_args!(
                            "End not allowed at top level (offset {curpos})"
                        )));
                    },
                }
            },
            Some(tok) => {
                return Err(Error::SyntaxError {
                    unexpected: format!(
                        "Invalid token starting with {:?} at offset {}",
                        tok as char, curpos
                    ),
                });
            },
        };

        Ok(Some(token))
    }
}

impl<R: BufRead> TokenLexer for Lexer<R> {
    fn peek_token(&mut self) -> &Token {
        let token = match self.peeked.take() {
            Some(token) => token,
            None => self.produce(),
        };
        self.peeked.insert(token)
    }

    fn next_token(&mut self) -> Token {
        match self.peeked.take() {
            Some(token) => token,
            None => self.produce(),
        }
    }

    fn fail(&mut self, err: Error) {
        self.peeked = None;
        if self.failed.is_none() {
            self.failed = Some(err);
        }
    }
}

#[cfg(test)]
mod test {
    use std::{io::BufReader, iter};

    use super::*;

    static SIMPLE_MSG: &[u8] = b"d3:bari1e3:fooli2ei-3eee";

    fn decode_tokens(msg: &[u8]) -> Vec<Token> {
        let mut lexer = Lexer::new(msg);
        let mut tokens = Vec::new();
        loop {
            match lexer.next_token() {
                Token::Eof => return tokens,
                Token::Error(err) => {
                    panic!("Unexpected tokenization error: {}. Received tokens: {:?}", err, tokens)
                },
                token => tokens.push(token),
            }
        }
    }

    fn decode_err(msg: &[u8], err_regex: &str) {
        let mut lexer = Lexer::new(msg);
        let err = loop {
            match lexer.next_token() {
                Token::Eof => panic!("Unexpected tokenization success"),
                Token::Error(err) => break format!("{}", err),
                _ => {},
            }
        };
        let err_regex = regex::Regex::new(err_regex).expect("Test regexes should be valid");
        if !err_regex.is_match(&err) {
            panic!("Unexpected error: {}", err);
        }
    }

    fn names(tokens: &[Token]) -> Vec<&'static str> {
        tokens.iter().map(Token::name).collect()
    }

    #[test]
    fn simple_bdecode_tokenization() {
        let tokens = decode_tokens(SIMPLE_MSG);
        assert_eq!(
            names(&tokens),
            vec![
                "DictStart",
                "String",
                "Integer",
                "String",
                "ListStart",
                "Integer",
                "Integer",
                "ListEnd",
                "DictEnd",
            ]
        );
        assert!(matches!(&tokens[1], Token::String(key) if key == b"bar"));
        assert!(matches!(&tokens[2], Token::Integer(num) if num == "1"));
        assert!(matches!(&tokens[6], Token::Integer(num) if num == "-3"));
    }

    #[test]
    fn ends_should_follow_the_innermost_container() {
        let tokens = decode_tokens(b"ldledeee");
        assert_eq!(
            names(&tokens),
            vec![
                "ListStart",
                "DictStart",
                "ListStart",
                "ListEnd",
                "DictStart",
                "DictEnd",
                "DictEnd",
                "ListEnd",
            ]
        );
    }

    #[test]
    fn peek_should_not_consume() {
        let mut lexer = Lexer::new(&b"4:spami1e"[..]);
        assert!(matches!(lexer.peek_token(), Token::String(s) if s == b"spam"));
        assert!(matches!(lexer.peek_token(), Token::String(s) if s == b"spam"));
        assert_eq!(lexer.offset(), 6);
        assert!(matches!(lexer.next_token(), Token::String(s) if s == b"spam"));
        assert!(matches!(lexer.next_token(), Token::Integer(n) if n == "1"));
        assert!(matches!(lexer.peek_token(), Token::Eof));
        assert!(matches!(lexer.next_token(), Token::Eof));
        assert!(matches!(lexer.next_token(), Token::Eof));
    }

    #[test]
    fn binary_strings_should_be_kept_intact() {
        let tokens = decode_tokens(b"4:\x00\xffe:0:");
        assert!(matches!(&tokens[0], Token::String(s) if s == b"\x00\xffe:"));
        assert!(matches!(&tokens[1], Token::String(s) if s.is_empty()));
    }

    #[test]
    fn one_byte_reads_should_be_reassembled() {
        let mut lexer = Lexer::new(BufReader::with_capacity(1, &b"11:hello worldi-42e"[..]));
        assert!(matches!(lexer.next_token(), Token::String(s) if s == b"hello world"));
        assert!(matches!(lexer.next_token(), Token::Integer(n) if n == "-42"));
        assert!(matches!(lexer.next_token(), Token::Eof));
    }

    #[test]
    fn negative_numbers_and_zero_should_parse() {
        let tokens = decode_tokens(b"i0ei-1e");
        assert!(matches!(&tokens[0], Token::Integer(n) if n == "0"));
        assert!(matches!(&tokens[1], Token::Integer(n) if n == "-1"));
    }

    #[test]
    fn negative_zero_is_illegal() {
        decode_err(b"i-0e", "got '0'");
    }

    #[test]
    fn leading_zeros_are_illegal() {
        decode_err(b"i01e", "got '1'");
        decode_err(b"i-01e", "got '0'");
        decode_err(b"01:a", "got '1'");
    }

    #[test]
    fn ints_must_have_bodies() {
        decode_err(b"ie", r"Expected.*got 'e'");
    }

    #[test]
    fn ints_must_be_terminated() {
        decode_err(b"i4:", r"Expected 'e' or '0'..'9', got ':' at offset 2");
    }

    #[test]
    fn short_int_should_fail() {
        decode_err(b"i12", r"EOF");
    }

    #[test]
    fn strings_must_have_bodies() {
        decode_err(b"3:", r"EOF");
        decode_err(b"5:spam", r"EOF");
    }

    #[test]
    fn string_lengths_cannot_be_signed() {
        decode_err(b"l-1:ae", r"Invalid token starting with '-' at offset 1");
    }

    #[test]
    fn oversized_lengths_should_fail() {
        decode_err(b"99999999999999999999999:a", r"Malformed string length");
    }

    #[test]
    fn misplaced_integer_end_should_fail() {
        decode_err(b"i4e2e", r"Expected ':' or '0'..'9', got 'e' at offset 4");
    }

    #[test]
    fn end_at_top_level_should_fail() {
        decode_err(b"lei1ee", r"End not allowed at top level \(offset 5\)");
    }

    #[test]
    fn unknown_tokens_should_fail() {
        decode_err(b"x", r"Invalid token starting with 'x' at offset 0");
    }

    #[test]
    fn errors_should_latch() {
        let mut lexer = Lexer::new(&b"i1ex4:spam"[..]);
        assert!(matches!(lexer.next_token(), Token::Integer(_)));
        assert!(matches!(lexer.next_token(), Token::Error(Error::SyntaxError { .. })));
        assert!(matches!(lexer.peek_token(), Token::Error(Error::SyntaxError { .. })));
        assert!(matches!(lexer.next_token(), Token::Error(Error::SyntaxError { .. })));
    }

    #[test]
    fn failing_should_stop_the_token_stream() {
        let mut lexer = Lexer::new(&b"li1ei2ee"[..]);
        assert!(matches!(lexer.next_token(), Token::ListStart));
        assert!(matches!(lexer.peek_token(), Token::Integer(_)));

        lexer.fail(Error::NestingTooDeep);
        assert!(matches!(lexer.peek_token(), Token::Error(Error::NestingTooDeep)));
        assert!(matches!(lexer.next_token(), Token::Error(Error::NestingTooDeep)));
        assert!(matches!(lexer.next_token(), Token::Error(Error::NestingTooDeep)));
    }

    #[test]
    fn failing_should_keep_the_first_error() {
        let mut lexer = Lexer::new(&b"x"[..]);
        assert!(matches!(lexer.next_token(), Token::Error(Error::SyntaxError { .. })));

        lexer.fail(Error::NestingTooDeep);
        assert!(matches!(lexer.next_token(), Token::Error(Error::SyntaxError { .. })));
    }

    #[test]
    fn long_inputs_should_not_grow_the_stack() {
        let mut msg = Vec::new();
        msg.extend(iter::repeat(b'l').take(10_000));
        msg.extend(iter::repeat(b'e').take(10_000));
        assert_eq!(decode_tokens(&msg).len(), 20_000);
    }
}
