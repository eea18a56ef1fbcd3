//! Verbatim extraction of bencoded values
//!
//! A [`ChunkReader`] returns the exact bytes of each value in a stream without
//! decoding them. This is what you want when a value has to be hashed or passed on
//! exactly as it was received, e.g. the `info` dictionary of a torrent file:
//!
//! ```
//! # use bendy_stream::chunker::ChunkReader;
//! #
//! let mut reader = ChunkReader::new(&b"d3:fooi1eel3:bare"[..]);
//!
//! assert_eq!(reader.next_value().unwrap(), Some(b"d3:fooi1ee".to_vec()));
//! assert_eq!(reader.next_value().unwrap(), Some(b"l3:bare".to_vec()));
//! assert_eq!(reader.next_value().unwrap(), None); // EOF
//! ```
//!
//! Only the structure needed to find the end of a value is checked. Integer
//! digits are passed through untouched, and dictionary keys are neither sorted
//! nor deduplicated.

use std::{
    io::{self, BufRead, Read},
    str,
};

use log::{debug, trace};

use crate::{DEFAULT_MAX_DEPTH, Error};

/// Reads raw bencoded values from a buffered byte source
#[derive(Debug)]
pub struct ChunkReader<R> {
    source: R,
    offset: usize,
    max_depth: usize,
    failed: Option<Error>,
}

impl<R: BufRead> ChunkReader<R> {
    /// Create a new reader on top of the given source
    pub fn new(source: R) -> Self {
        ChunkReader {
            source,
            offset: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            failed: None,
        }
    }

    /// Set the maximum nesting depth of lists and dicts.
    ///
    /// Atoms have depth zero; a list or dict has the depth of its deepest member
    /// plus one.
    pub fn with_max_depth(mut self, new_max_depth: usize) -> Self {
        self.max_depth = new_max_depth;
        self
    }

    /// Number of bytes consumed from the source so far
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Get a reference to the underlying source
    pub fn get_ref(&self) -> &R {
        &self.source
    }

    /// Give back the underlying source. Any bytes it buffered past the last
    /// value are still in it.
    pub fn into_inner(self) -> R {
        self.source
    }

    /// Read the next value and return its bytes exactly as they appeared in the source
    ///
    /// Returns `Ok(None)` if the source ends cleanly before the next value starts.
    /// After an error every later call returns the same error.
    pub fn next_value(&mut self) -> Result<Option<Vec<u8>>, Error> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }

        let mut chunk = Vec::new();
        let result = match self.peek_byte() {
            Ok(None) => return Ok(None),
            Ok(Some(_)) => self.read_value(&mut chunk, 0),
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => {
                trace!("read {} byte chunk ending at offset {}", chunk.len(), self.offset);
                Ok(Some(chunk))
            },
            Err(err) => {
                debug!("chunk reader failed at offset {}: {}", self.offset, err);
                self.failed = Some(err.clone());
                Err(err)
            },
        }
    }

    /// Iterate over the raw values in the source
    pub fn chunks(self) -> Chunks<R> {
        Chunks(self)
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

    fn expect_byte(&mut self) -> Result<u8, Error> {
        self.peek_byte()?.ok_or(Error::UnexpectedEof)
    }

    fn take_byte(&mut self, buf: &mut Vec<u8>) -> Result<u8, Error> {
        let byte = self.expect_byte()?;
        self.source.consume(1);
        self.offset += 1;
        buf.push(byte);
        Ok(byte)
    }

    /// Append everything up to and including `delimiter` to `buf`
    fn take_until(&mut self, delimiter: u8, buf: &mut Vec<u8>) -> Result<(), Error> {
        let read = self.source.read_until(delimiter, buf)?;
        self.offset += read;

        if read == 0 || buf.last() != Some(&delimiter) {
            return Err(Error::UnexpectedEof);
        }
        Ok(())
    }

    fn read_value(&mut self, buf: &mut Vec<u8>, depth: usize) -> Result<(), Error> {
        match self.expect_byte()? {
            b'0'..=b'9' => self.read_string(buf),
            b'i' => self.take_until(b'e', buf),
            b'l' => self.read_list(buf, depth + 1),
            b'd' => self.read_dict(buf, depth + 1),
            other => Err(Error::UnexpectedDelimiter {
                found: other as char,
                offset: self.offset,
            }),
        }
    }

    fn read_string(&mut self, buf: &mut Vec<u8>) -> Result<(), Error> {
        let start = buf.len();
        let offset = self.offset;
        self.take_until(b':', buf)?;

        let prefix = &buf[start..buf.len() - 1];
        let length = str::from_utf8(prefix)
            .ok()
            .and_then(|text| text.parse::<u64>().ok())
            .ok_or_else(|| Error::MalformedLength {
                length: String::from_utf8_lossy(prefix).into_owned(),
                offset,
            })?;

        // `read_to_end` keeps going on short reads until the `Take` is exhausted
        // or the source hits EOF, and grows `buf` only as bytes arrive.
        let read = (&mut self.source).take(length).read_to_end(buf)?;
        self.offset += read;

        if (read as u64) < length {
            return Err(Error::UnexpectedEof);
        }
        Ok(())
    }

    fn read_list(&mut self, buf: &mut Vec<u8>, depth: usize) -> Result<(), Error> {
        if depth > self.max_depth {
            return Err(Error::NestingTooDeep);
        }
        self.take_byte(buf)?;

        loop {
            if self.expect_byte()? == b'e' {
                self.take_byte(buf)?;
                return Ok(());
            }
            self.read_value(buf, depth)?;
        }
    }

    fn read_dict(&mut self, buf: &mut Vec<u8>, depth: usize) -> Result<(), Error> {
        if depth > self.max_depth {
            return Err(Error::NestingTooDeep);
        }
        self.take_byte(buf)?;

        loop {
            match self.expect_byte()? {
                b'e' => {
                    self.take_byte(buf)?;
                    return Ok(());
                },
                b'0'..=b'9' => self.read_string(buf)?,
                other => {
                    return Err(Error::non_string_key(format_args!(
                        "{:?} at offset {}",
                        other as char, self.offset
                    )));
                },
            }
            self.read_value(buf, depth)?;
        }
    }
}

/// Iterator over the raw values of a [`ChunkReader`]
///
/// Ends at a clean EOF. An error is yielded once, after which the iterator is exhausted.
#[derive(Debug)]
pub struct Chunks<R>(ChunkReader<R>);

impl<R: BufRead> Iterator for Chunks<R> {
    type Item = Result<Vec<u8>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        // Only report an error once
        if self.0.failed.is_some() {
            return None;
        }
        self.0.next_value().transpose()
    }
}
