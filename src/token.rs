//! Tokens exchanged between a [`TokenLexer`](crate::lexer::TokenLexer) and the
//! [`ValueParser`](crate::parser::ValueParser)

use crate::Error;

/// A lexical bencode token
#[derive(Clone, Debug)]
pub enum Token {
    /// A number; kept as text, it is only parsed by the consumer
    Integer(String),
    /// A byte string; may not be UTF-8
    String(Vec<u8>),
    /// The beginning of a list
    ListStart,
    /// The end of a list
    ListEnd,
    /// The beginning of a dictionary
    DictStart,
    /// The end of a dictionary
    DictEnd,
    /// The input ended cleanly between tokens
    Eof,
    /// The lexer failed; carries the failure
    Error(Error),
}

impl Token {
    /// Name of the variant, for error messages
    pub fn name(&self) -> &'static str {
        match *self {
            Token::Integer(_) => "Integer",
            Token::String(_) => "String",
            Token::ListStart => "ListStart",
            Token::ListEnd => "ListEnd",
            Token::DictStart => "DictStart",
            Token::DictEnd => "DictEnd",
            Token::Eof => "Eof",
            Token::Error(_) => "Error",
        }
    }
}
