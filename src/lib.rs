//! Decodes bencoded structures from byte streams.
//!
//! Two independent decoders read from any [`std::io::BufRead`] source, one value
//! at a time:
//!
//! - [`ChunkReader`] returns the raw bytes of each value exactly as they appeared,
//!   so they can be hashed or forwarded without re-encoding.
//! - [`ValueParser`] builds a [`Value`] tree from the tokens of a [`TokenLexer`],
//!   such as the streaming [`Lexer`].
//!
//! Neither decoder enforces canonical encoding: dictionary keys may come in any
//! order and repeat.
#![cfg_attr(not(test), warn(missing_docs))]

pub mod chunker;
mod error;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod value;

pub use self::{
    chunker::ChunkReader,
    error::Error,
    lexer::{Lexer, TokenLexer},
    parser::ValueParser,
    token::Token,
    value::Value,
};

/// Default limit on the nesting of lists and dicts
pub const DEFAULT_MAX_DEPTH: usize = 2048;
