use std::{fmt::Display, io, sync::Arc};

use thiserror::Error;

/// An error raised while reading or parsing bencode
///
/// Errors are `Clone` so that a latched error can be handed out again on every
/// later call; I/O errors are shared behind an `Arc` for that reason.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// The underlying byte source failed.
    #[error("I/O error while reading bencode: {0}")]
    Io(Arc<io::Error>),

    /// EOF reached in the middle of a value.
    #[error("Reached EOF in the middle of a message")]
    UnexpectedEof,

    /// A string length prefix is not a non-negative base-10 integer.
    #[error("Malformed string length {length:?} at offset {offset}")]
    MalformedLength {
        /// The prefix as read
        length: String,
        /// Where the prefix starts
        offset: usize,
    },

    /// An integer token could not be converted to a native integer.
    #[error("Malformed integer {integer:?}")]
    MalformedInteger {
        /// The digits of the integer token
        integer: String,
    },

    /// A value started with a byte that does not open any value.
    #[error("Unexpected delimiter {found:?} at offset {offset}")]
    UnexpectedDelimiter {
        /// The offending byte
        found: char,
        /// Where it was found
        offset: usize,
    },

    /// Open and close delimiters do not line up.
    #[error("Saw the wrong type of token: {state}")]
    StructuralMismatch {
        /// What went wrong
        state: String,
    },

    /// A dictionary key is not a byte string.
    #[error("Key is not a string: found {found}")]
    NonStringKey {
        /// What was found in key position
        found: String,
    },

    /// Unexpected characters inside an integer or length prefix.
    #[error("Malformed number or unexpected character: {unexpected}")]
    SyntaxError {
        /// What was expected and what came instead
        unexpected: String,
    },

    /// Exceeded the nesting limit.
    #[error("Maximum nesting depth exceeded")]
    NestingTooDeep,
}

impl Error {
    pub(crate) fn unexpected(expected: impl Display, got: char, offset: usize) -> Self {
        Error::SyntaxError {
            unexpected: format!("Expected {expected}, got {got:?} at offset {offset}"),
        }
    }

    pub(crate) fn structural_mismatch(state: impl Display) -> Self {
        Error::StructuralMismatch {
            state: state.to_string(),
        }
    }

    pub(crate) fn non_string_key(found: impl Display) -> Self {
        Error::NonStringKey {
            found: found.to_string(),
        }
    }

    /// True for errors caused by the source ending too early
    pub fn is_eof(&self) -> bool {
        match self {
            Error::UnexpectedEof => true,
            Error::Io(err) => err.kind() == io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::Io(Arc::new(error))
    }
}
