//! Decodes tokens into [`Value`] trees
//!
//! ```
//! # use bendy_stream::{lexer::Lexer, parser::ValueParser, value::Value};
//! #
//! let mut lexer = Lexer::new(&b"d3:cow3:moo4:spam4:eggse"[..]);
//! let value = ValueParser::new().next_value(&mut lexer).unwrap().unwrap();
//!
//! assert_eq!(value.get("cow"), Some(&Value::from("moo")));
//! ```
//!
//! A parse either yields a whole value or fails; no partially built value is
//! returned. Dictionaries keep the last value seen for a repeated key.
//!
//! Open containers are kept on an explicit stack rather than the call stack, so
//! the nesting limit is the only bound on how deep a value may go.

use std::{collections::BTreeMap, mem};

use log::{debug, trace};

use crate::{DEFAULT_MAX_DEPTH, Error, lexer::TokenLexer, token::Token, value::Value};

/// Builds one [`Value`] per call from a [`TokenLexer`]
#[derive(Copy, Clone, Debug)]
pub struct ValueParser {
    max_depth: usize,
}

impl Default for ValueParser {
    fn default() -> Self {
        ValueParser {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// A container whose members are still being read
enum Frame {
    List(Vec<Value>),
    Dict {
        dict: BTreeMap<Vec<u8>, Value>,
        key: Option<Vec<u8>>,
    },
}

impl Frame {
    fn push(&mut self, value: Value) {
        match self {
            Frame::List(list) => list.push(value),
            // A dict only asks for a value once its key is in place
            Frame::Dict { dict, key } => {
                if let Some(key) = key.take() {
                    dict.insert(key, value);
                }
            },
        }
    }
}

/// What the token at value position started
enum Start {
    Atom(Value),
    Container(Frame),
    Eof,
}

impl ValueParser {
    /// Create a parser with the default nesting limit
    pub fn new() -> Self {
        <Self as Default>::default()
    }

    /// Set the maximum nesting depth of lists and dicts.
    ///
    /// Atoms have depth zero; a list or dict has the depth of its deepest member
    /// plus one.
    pub fn with_max_depth(mut self, new_max_depth: usize) -> Self {
        self.max_depth = new_max_depth;
        self
    }

    /// Parse the next complete value
    ///
    /// Returns `Ok(None)` when the lexer reports EOF before a new value starts.
    /// A failure is latched into the lexer with [`TokenLexer::fail`], so every
    /// later call reports it again instead of resuming inside the broken value.
    pub fn next_value<L: TokenLexer>(&self, lexer: &mut L) -> Result<Option<Value>, Error> {
        let result = self.parse_value(lexer);
        match &result {
            Ok(Some(value)) => trace!("parsed {}", value.name()),
            Ok(None) => {},
            Err(err) => {
                debug!("value parser failed: {}", err);
                lexer.fail(err.clone());
            },
        }
        result
    }

    /// Iterate over the values produced by `lexer`
    pub fn values<L: TokenLexer>(&self, lexer: L) -> Values<L> {
        Values {
            parser: *self,
            lexer,
            finished: false,
        }
    }

    fn parse_value<L: TokenLexer>(&self, lexer: &mut L) -> Result<Option<Value>, Error> {
        let mut open: Vec<Frame> = Vec::new();

        loop {
            // Close the innermost container, or read the key of its next entry
            let closed = match open.last_mut() {
                Some(Frame::List(list)) => {
                    consume_list_end(lexer)?.then(|| Value::List(mem::take(list)))
                },
                Some(Frame::Dict { dict, key }) if key.is_none() => match consume_dict_key(lexer)? {
                    Some(next_key) => {
                        *key = Some(next_key);
                        None
                    },
                    None => Some(Value::Dict(mem::take(dict))),
                },
                _ => None,
            };

            let value = match closed {
                Some(value) => {
                    open.pop();
                    value
                },
                None => match self.start_value(lexer, open.len())? {
                    Start::Atom(value) => value,
                    Start::Container(frame) => {
                        open.push(frame);
                        continue;
                    },
                    Start::Eof if open.is_empty() => return Ok(None),
                    Start::Eof => return Err(Error::UnexpectedEof),
                },
            };

            match open.last_mut() {
                Some(frame) => frame.push(value),
                None => return Ok(Some(value)),
            }
        }
    }

    /// Consume the token at value position. `depth` counts the open containers
    fn start_value<L: TokenLexer>(&self, lexer: &mut L, depth: usize) -> Result<Start, Error> {
        match lexer.peek_token() {
            Token::ListStart | Token::DictStart if depth >= self.max_depth => {
                return Err(Error::NestingTooDeep);
            },
            Token::Eof => return Ok(Start::Eof),
            Token::Error(err) => return Err(err.clone()),
            token @ (Token::ListEnd | Token::DictEnd) => {
                return Err(Error::structural_mismatch(format_args!(
                    "{} not allowed here",
                    token.name()
                )));
            },
            _ => {},
        }

        match lexer.next_token() {
            Token::ListStart => Ok(Start::Container(Frame::List(Vec::new()))),
            Token::DictStart => Ok(Start::Container(Frame::Dict {
                dict: BTreeMap::new(),
                key: None,
            })),
            Token::Integer(text) => parse_integer(text).map(Start::Atom),
            Token::String(bytes) => Ok(Start::Atom(Value::Bytes(bytes))),
            token => Err(Error::structural_mismatch(format_args!(
                "Expected a value, found {}",
                token.name()
            ))),
        }
    }
}

/// Check the token after a list member; `true` once the list end has been consumed
fn consume_list_end<L: TokenLexer>(lexer: &mut L) -> Result<bool, Error> {
    match lexer.peek_token() {
        Token::Eof => Err(Error::UnexpectedEof),
        Token::Error(err) => Err(err.clone()),
        Token::DictEnd => Err(Error::structural_mismatch("Unexpected dict end")),
        Token::ListEnd => {
            lexer.next_token();
            Ok(true)
        },
        _ => Ok(false),
    }
}

/// Read the key of the next dict entry, or `None` once the dict end has been consumed
fn consume_dict_key<L: TokenLexer>(lexer: &mut L) -> Result<Option<Vec<u8>>, Error> {
    let key = match lexer.next_token() {
        Token::DictEnd => return Ok(None),
        Token::Eof => return Err(Error::UnexpectedEof),
        Token::Error(err) => return Err(err),
        Token::String(key) => key,
        other => return Err(Error::non_string_key(other.name())),
    };

    // A key must be followed by a value
    match lexer.peek_token() {
        Token::Eof => Err(Error::UnexpectedEof),
        Token::Error(err) => Err(err.clone()),
        Token::DictEnd => Err(Error::structural_mismatch("Unexpected dict end")),
        Token::ListEnd => Err(Error::structural_mismatch("Unexpected list end")),
        _ => Ok(Some(key)),
    }
}

fn parse_integer(text: String) -> Result<Value, Error> {
    text.parse::<i64>()
        .map(Value::Integer)
        .map_err(|_| Error::MalformedInteger { integer: text })
}

/// Iterator over the values of a [`TokenLexer`]
///
/// Ends at EOF. An error is yielded once, after which the iterator is exhausted.
#[derive(Debug)]
pub struct Values<L> {
    parser: ValueParser,
    lexer: L,
    finished: bool,
}

impl<L> Values<L> {
    /// Give back the lexer
    pub fn into_inner(self) -> L {
        self.lexer
    }
}

impl<L: TokenLexer> Iterator for Values<L> {
    type Item = Result<Value, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let result = self.parser.next_value(&mut self.lexer).transpose();
        if !matches!(result, Some(Ok(_))) {
            self.finished = true;
        }
        result
    }
}
