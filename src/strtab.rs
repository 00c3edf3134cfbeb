//! The COFF string table.
//!
//! It immediately follows the symbol table and starts with a little-endian `u32`
//! holding its total size, the size field included. Symbol names longer than 8 bytes
//! refer to it by byte offset, measured from the start of the size field.

use crate::error;
use crate::pe::header::FileHeader;
use core::fmt;
use log::debug;
use scroll::{Pread, ctx};
use std::io::{Read, Seek, SeekFrom};

/// Size of the length prefix of a COFF string table.
pub const STRTAB_LENGTH_SIZE: u32 = 4;

/// Resolves a byte offset into a NUL-terminated string.
///
/// Implementors validate the offset themselves; a bad offset or unterminated data is an error.
pub trait StringTable {
    fn lookup(&self, offset: u32) -> error::Result<&str>;
}

/// An owned COFF string table, without its length prefix.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct Strtab {
    bytes: Vec<u8>,
}

impl Strtab {
    /// Wraps already loaded string table bytes which do not include the length prefix.
    pub fn new(bytes: Vec<u8>) -> Self {
        Strtab { bytes }
    }

    /// Reads the string table that follows the symbol table described by `header`.
    ///
    /// Returns an empty table if the file has no symbol table, or if the recorded size
    /// does not exceed the length prefix.
    pub fn read<H, R>(header: &H, stream: &mut R) -> error::Result<Self>
    where
        H: FileHeader + ?Sized,
        R: Read + Seek,
    {
        let pointer = header.pointer_to_symbol_table();
        if pointer == 0 {
            return Ok(Strtab::default());
        }
        let count = u64::try_from(header.number_of_symbols()).unwrap_or(0);
        let offset = u64::from(pointer) + count * u64::from(header.symbol_record_size());
        stream
            .seek(SeekFrom::Start(offset))
            .map_err(|err| error::Error::Seek(offset, err))?;

        let mut prefix = [0u8; STRTAB_LENGTH_SIZE as usize];
        stream.read_exact(&mut prefix).map_err(error::Error::Read)?;
        let length = prefix.pread_with::<u32>(0, scroll::LE)?;
        debug!("string table at {:#x} is {:#x} bytes", offset, length);
        if length <= STRTAB_LENGTH_SIZE {
            return Ok(Strtab::default());
        }

        let size = u64::from(length - STRTAB_LENGTH_SIZE);
        let mut bytes = Vec::new();
        stream
            .by_ref()
            .take(size)
            .read_to_end(&mut bytes)
            .map_err(error::Error::Read)?;
        if (bytes.len() as u64) < size {
            return Err(error::Error::Read(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("string table has {} of {} bytes", bytes.len(), size),
            )));
        }
        Ok(Strtab { bytes })
    }

    /// The raw bytes of the table, without the length prefix.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns the string at `offset`, measured from the start of the length prefix.
    pub fn get_at(&self, offset: u32) -> error::Result<&str> {
        let lookup_error = |msg: &str| error::Error::StringTableLookup(offset, msg.into());
        if offset < STRTAB_LENGTH_SIZE {
            return Err(lookup_error("before the start of the string table"));
        }
        let start = (offset - STRTAB_LENGTH_SIZE) as usize;
        if start > self.bytes.len() {
            return Err(lookup_error("beyond the end of the string table"));
        }
        let rest = &self.bytes[start..];
        if !rest.contains(&0) {
            return Err(lookup_error("string is not NUL terminated"));
        }
        rest.pread_with::<&str>(0, ctx::StrCtx::Delimiter(0))
            .map_err(|_| lookup_error("string is not valid UTF-8"))
    }

    /// Collects every string in the table, in order.
    pub fn to_vec(&self) -> error::Result<Vec<&str>> {
        let mut strings = Vec::new();
        let mut i = 0;
        while i < self.bytes.len() {
            let string = self.get_at(i as u32 + STRTAB_LENGTH_SIZE)?;
            i += string.len() + 1;
            strings.push(string);
        }
        Ok(strings)
    }
}

impl StringTable for Strtab {
    fn lookup(&self, offset: u32) -> error::Result<&str> {
        self.get_at(offset)
    }
}

impl fmt::Debug for Strtab {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Strtab")
            .field("bytes", &String::from_utf8_lossy(&self.bytes))
            .finish()
    }
}
