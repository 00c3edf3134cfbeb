//! COFF symbol tables of PE images and object files
//!

pub mod header;
pub mod options;
pub mod symbol;

use crate::error;
use crate::strtab::Strtab;
use log::debug;
use std::io::{Read, Seek};

#[derive(Debug)]
/// The symbols of a COFF object file or PE image
pub struct Coff {
    /// The file header
    pub header: header::Header,
    /// The string table holding long symbol names
    pub strings: Strtab,
    /// The symbols, in file order, without auxiliary records
    pub symbols: Vec<symbol::Symbol>,
}

impl Coff {
    /// Reads the header, string table and symbols of the file in `stream`
    pub fn read<R: Read + Seek>(stream: &mut R) -> error::Result<Self> {
        Self::read_with_opts(stream, &options::ParseOptions::default())
    }

    /// Reads the header, string table and symbols of the file in `stream` with the given options
    pub fn read_with_opts<R: Read + Seek>(
        stream: &mut R,
        opts: &options::ParseOptions,
    ) -> error::Result<Self> {
        let header = header::Header::read(stream)?;
        let raw = symbol::read_raw_symbols(&header, stream)?;
        let strings = if raw.is_empty() {
            Strtab::default()
        } else {
            Strtab::read(&header, stream)?
        };
        debug!("string table: {:?}", strings);
        let symbols = symbol::remove_aux_symbols(&raw, &strings, opts)?;
        Ok(Coff {
            header,
            strings,
            symbols,
        })
    }

    /// Finds the first symbol called `name`
    pub fn symbol(&self, name: &str) -> Option<&symbol::Symbol> {
        self.symbols.iter().find(|symbol| symbol.name == name)
    }
}
