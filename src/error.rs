//! A custom coffsyms error
//!

use core::fmt;
use core::result;
use std::{error, io};

#[non_exhaustive]
#[derive(Debug)]
/// A custom coffsyms error
pub enum Error {
    /// The stream could not be positioned at the given absolute offset
    Seek(u64, io::Error),
    /// The stream ended early or failed while reading a table
    Read(io::Error),
    /// The symbol record size is neither 18 nor 20 bytes
    UnsupportedRecordSize(u16),
    /// An out-of-line symbol name could not be resolved at the given string table offset
    StringTableLookup(u32, String),
    /// The symbol at `index` declares `missing` more auxiliary records than the table holds
    MalformedAuxCount { index: usize, missing: u8 },
    /// The binary is malformed somehow
    Malformed(String),
    /// The binary's magic is unknown or bad
    BadMagic(u64),
    /// An error emanating from reading and interpreting bytes
    Scroll(scroll::Error),
    /// An IO based error
    IO(io::Error),
    /// Buffer is too short to hold N items
    BufferTooShort(usize, &'static str),
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Seek(_, ref io) => Some(io),
            Error::Read(ref io) => Some(io),
            Error::IO(ref io) => Some(io),
            Error::Scroll(ref scroll) => Some(scroll),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IO(err)
    }
}

impl From<scroll::Error> for Error {
    fn from(err: scroll::Error) -> Error {
        Error::Scroll(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Seek(offset, ref err) => write!(fmt, "Cannot seek to offset {:#x}: {}", offset, err),
            Error::Read(ref err) => write!(fmt, "Cannot read table: {}", err),
            Error::UnsupportedRecordSize(size) => {
                write!(fmt, "Unsupported symbol record size: {}", size)
            }
            Error::StringTableLookup(offset, ref msg) => {
                write!(fmt, "Invalid string table offset {:#x}: {}", offset, msg)
            }
            Error::MalformedAuxCount { index, missing } => write!(
                fmt,
                "Symbol {} is missing {} auxiliary records",
                index, missing
            ),
            Error::IO(ref err) => write!(fmt, "{}", err),
            Error::Scroll(ref err) => write!(fmt, "{}", err),
            Error::BadMagic(magic) => write!(fmt, "Invalid magic number: 0x{:x}", magic),
            Error::Malformed(ref msg) => write!(fmt, "Malformed entity: {}", msg),
            Error::BufferTooShort(n, item) => write!(fmt, "Buffer is too short for {} {}", n, item),
        }
    }
}

/// An impish result
pub type Result<T> = result::Result<T, Error>;
