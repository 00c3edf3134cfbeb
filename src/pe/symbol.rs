use crate::error;
use crate::pe::header::FileHeader;
use crate::pe::options::{AuxPolicy, ParseOptions};
use crate::strtab::{StringTable, Strtab};
use log::{debug, warn};
use scroll::Pread;
use std::borrow::Cow;
use std::io::{self, Read, Seek, SeekFrom};

/// Size of a single record in a regular COFF symbol table.
pub const COFF_SYMBOL_SIZE: u16 = 18;
/// Size of a single record in the symbol table of a `/bigobj` object file.
pub const COFF_BIGOBJ_SYMBOL_SIZE: u16 = 20;

// Values for `Symbol::section_number`.

/// The symbol record is not yet assigned a section. A `value` of zero
/// indicates that a reference to an external symbol is defined elsewhere.
pub const IMAGE_SYM_UNDEFINED: i32 = 0;
/// The symbol has an absolute (non-relocatable) `value` and is not an address.
pub const IMAGE_SYM_ABSOLUTE: i32 = -1;
/// The symbol provides general type or debugging information but does not
/// correspond to a section.
pub const IMAGE_SYM_DEBUG: i32 = -2;

pub const IMAGE_SYM_TYPE_MASK: u16 = 0xf;
pub const IMAGE_SYM_DTYPE_SHIFT: usize = 4;
/// The symbol is a function that returns a base type.
pub const IMAGE_SYM_DTYPE_FUNCTION: u16 = 2;

// Values for `Symbol::storage_class`.

pub const IMAGE_SYM_CLASS_END_OF_FUNCTION: u8 = 0xff;
pub const IMAGE_SYM_CLASS_NULL: u8 = 0;
/// External symbols; `value` is a size when the section number is `IMAGE_SYM_UNDEFINED`.
pub const IMAGE_SYM_CLASS_EXTERNAL: u8 = 2;
/// Static symbols; a zero `value` means the symbol names a section.
pub const IMAGE_SYM_CLASS_STATIC: u8 = 3;
pub const IMAGE_SYM_CLASS_LABEL: u8 = 6;
/// `.bf`, `.ef` and `.lf` records.
pub const IMAGE_SYM_CLASS_FUNCTION: u8 = 101;
/// The source-file symbol; followed by auxiliary records that name the file.
pub const IMAGE_SYM_CLASS_FILE: u8 = 103;
pub const IMAGE_SYM_CLASS_SECTION: u8 = 104;
pub const IMAGE_SYM_CLASS_WEAK_EXTERNAL: u8 = 105;

/// The fields shared by both symbol record layouts.
pub trait RawSymbol {
    /// The raw name field, either inline or a string table offset.
    fn name(&self) -> &[u8; 8];
    fn value(&self) -> u32;
    /// The section number, sign-extended to 32 bits.
    fn section_number(&self) -> i32;
    fn typ(&self) -> u16;
    fn storage_class(&self) -> u8;
    /// The number of auxiliary records that immediately follow this one.
    fn number_of_aux_symbols(&self) -> u8;
}

/// An 18 byte symbol record, as found in regular COFF files and PE images.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Pread)]
#[doc(alias("IMAGE_SYMBOL"))]
pub struct SmallSymbolRecord {
    /// The name of the symbol.
    ///
    /// Names of up to 8 bytes are stored inline and padded with nulls. For longer
    /// names the first 4 bytes are zero and the last 4 bytes are a string table offset.
    pub name: [u8; 8],
    pub value: u32,
    /// A one-based index into the section table. Zero and negative values have special meanings.
    pub section_number: i16,
    pub typ: u16,
    pub storage_class: u8,
    pub number_of_aux_symbols: u8,
}

/// A 20 byte symbol record, as found in `/bigobj` object files.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Pread)]
#[doc(alias("IMAGE_SYMBOL_EX"))]
pub struct BigSymbolRecord {
    pub name: [u8; 8],
    pub value: u32,
    pub section_number: i32,
    pub typ: u16,
    pub storage_class: u8,
    pub number_of_aux_symbols: u8,
}

macro_rules! impl_raw_symbol {
    ($record:ty) => {
        impl RawSymbol for $record {
            fn name(&self) -> &[u8; 8] {
                &self.name
            }
            fn value(&self) -> u32 {
                self.value
            }
            fn section_number(&self) -> i32 {
                i32::from(self.section_number)
            }
            fn typ(&self) -> u16 {
                self.typ
            }
            fn storage_class(&self) -> u8 {
                self.storage_class
            }
            fn number_of_aux_symbols(&self) -> u8 {
                self.number_of_aux_symbols
            }
        }
    };
}

impl_raw_symbol!(SmallSymbolRecord);
impl_raw_symbol!(BigSymbolRecord);

/// The physical layout of the records of one symbol table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RecordLayout {
    /// 18 byte records with a 16-bit section number
    Small,
    /// 20 byte records with a 32-bit section number
    Big,
}

impl RecordLayout {
    /// Selects the layout from the record size recorded in the file header.
    pub fn from_size(size: u16) -> error::Result<Self> {
        match size {
            COFF_SYMBOL_SIZE => Ok(RecordLayout::Small),
            COFF_BIGOBJ_SYMBOL_SIZE => Ok(RecordLayout::Big),
            size => Err(error::Error::UnsupportedRecordSize(size)),
        }
    }

    pub fn size(self) -> u16 {
        match self {
            RecordLayout::Small => COFF_SYMBOL_SIZE,
            RecordLayout::Big => COFF_BIGOBJ_SYMBOL_SIZE,
        }
    }
}

/// Every record of a symbol table in file order, primary and auxiliary alike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawSymbolTable {
    Small(Vec<SmallSymbolRecord>),
    Big(Vec<BigSymbolRecord>),
}

impl Default for RawSymbolTable {
    fn default() -> Self {
        RawSymbolTable::Small(Vec::new())
    }
}

impl RawSymbolTable {
    /// Decodes `count` records of the given layout from `bytes`.
    pub fn parse(bytes: &[u8], layout: RecordLayout, count: usize) -> error::Result<Self> {
        fn parse_records<'a, T>(bytes: &'a [u8], count: usize) -> error::Result<Vec<T>>
        where
            T: scroll::ctx::TryFromCtx<'a, scroll::Endian, Error = scroll::Error>,
        {
            let mut offset = 0;
            let mut records = Vec::with_capacity(count);
            for _ in 0..count {
                records.push(bytes.gread_with(&mut offset, scroll::LE)?);
            }
            Ok(records)
        }
        let table = match layout {
            RecordLayout::Small => RawSymbolTable::Small(parse_records(bytes, count)?),
            RecordLayout::Big => RawSymbolTable::Big(parse_records(bytes, count)?),
        };
        Ok(table)
    }

    pub fn layout(&self) -> RecordLayout {
        match self {
            RawSymbolTable::Small(_) => RecordLayout::Small,
            RawSymbolTable::Big(_) => RecordLayout::Big,
        }
    }

    /// The number of records, auxiliary records included.
    pub fn len(&self) -> usize {
        match self {
            RawSymbolTable::Small(records) => records.len(),
            RawSymbolTable::Big(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reads every record of the symbol table described by `header` from `stream`.
///
/// A zero symbol table pointer or a non-positive symbol count means the file has no
/// symbol table, and yields an empty table.
pub fn read_raw_symbols<H, R>(header: &H, stream: &mut R) -> error::Result<RawSymbolTable>
where
    H: FileHeader + ?Sized,
    R: Read + Seek,
{
    let pointer = header.pointer_to_symbol_table();
    let count = header.number_of_symbols();
    if pointer == 0 || count <= 0 {
        debug!("no symbol table (pointer {:#x}, count {})", pointer, count);
        return Ok(RawSymbolTable::default());
    }
    let offset = u64::from(pointer);
    stream
        .seek(SeekFrom::Start(offset))
        .map_err(|err| error::Error::Seek(offset, err))?;

    let layout = RecordLayout::from_size(header.symbol_record_size())?;
    let count = count as usize;
    let size = count
        .checked_mul(usize::from(layout.size()))
        .ok_or_else(|| {
            error::Error::Read(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} symbol records do not fit in memory", count),
            ))
        })?;
    debug!(
        "symbol table at {:#x}: {} {:?} records ({:#x} bytes)",
        offset, count, layout, size
    );

    // grown as data arrives so a bogus count cannot force a huge allocation up front
    let mut bytes = Vec::new();
    stream
        .by_ref()
        .take(size as u64)
        .read_to_end(&mut bytes)
        .map_err(error::Error::Read)?;
    if bytes.len() < size {
        return Err(error::Error::Read(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("symbol table holds {} of {} bytes", bytes.len(), size),
        )));
    }
    RawSymbolTable::parse(&bytes, layout, count)
}

/// Return the string table offset of a symbol name.
///
/// Returns `None` if the name is stored inline.
pub fn name_offset(name: &[u8; 8]) -> Option<u32> {
    if name[..4] == [0u8; 4] {
        Some(u32::from_le_bytes([name[4], name[5], name[6], name[7]]))
    } else {
        None
    }
}

/// Return an inline symbol name: everything before the first null, or all 8 bytes.
pub fn inline_name(name: &[u8; 8]) -> Cow<'_, str> {
    let len = name.iter().position(|&b| b == 0).unwrap_or(name.len());
    String::from_utf8_lossy(&name[..len])
}

/// Resolves a raw symbol name, looking it up in `strtab` if it is not stored inline.
pub fn resolve_name<T: StringTable + ?Sized>(name: &[u8; 8], strtab: &T) -> error::Result<String> {
    match name_offset(name) {
        Some(offset) => match strtab.lookup(offset) {
            Ok(name) => Ok(name.into()),
            Err(err @ error::Error::StringTableLookup(..)) => Err(err),
            Err(err) => Err(error::Error::StringTableLookup(offset, err.to_string())),
        },
        None => Ok(inline_name(name).into_owned()),
    }
}

/// A COFF symbol with its name resolved.
///
/// Auxiliary records never appear as symbols.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Symbol {
    pub name: String,
    /// The interpretation of this field depends on `section_number` and
    /// `storage_class`. A typical meaning is the relocatable address.
    pub value: u32,
    /// A one-based index into the section table. Zero and negative values have special meanings.
    pub section_number: i32,
    /// Microsoft tools set this field to 0x20 (function) or 0x0 (not a function).
    pub typ: u16,
    pub storage_class: u8,
}

impl Symbol {
    /// Builds a symbol from a primary record, resolving its name against `strtab`.
    pub fn from_raw<S, T>(raw: &S, strtab: &T) -> error::Result<Self>
    where
        S: RawSymbol + ?Sized,
        T: StringTable + ?Sized,
    {
        Ok(Symbol {
            name: resolve_name(raw.name(), strtab)?,
            value: raw.value(),
            section_number: raw.section_number(),
            typ: raw.typ(),
            storage_class: raw.storage_class(),
        })
    }

    /// Return the base type of the symbol.
    pub fn base_type(&self) -> u16 {
        self.typ & IMAGE_SYM_TYPE_MASK
    }

    /// Return the derived type of the symbol.
    pub fn derived_type(&self) -> u16 {
        self.typ >> IMAGE_SYM_DTYPE_SHIFT
    }

    pub fn is_function(&self) -> bool {
        self.derived_type() == IMAGE_SYM_DTYPE_FUNCTION
    }

    pub fn is_undefined(&self) -> bool {
        self.section_number == IMAGE_SYM_UNDEFINED
    }

    pub fn is_absolute(&self) -> bool {
        self.section_number == IMAGE_SYM_ABSOLUTE
    }

    pub fn is_debug(&self) -> bool {
        self.section_number == IMAGE_SYM_DEBUG
    }
}

fn canonicalize<S, T>(records: &[S], strtab: &T, opts: &ParseOptions) -> error::Result<Vec<Symbol>>
where
    S: RawSymbol,
    T: StringTable + ?Sized,
{
    let mut symbols = Vec::new();
    let mut aux = 0u8;
    let mut primary = 0;
    for (index, record) in records.iter().enumerate() {
        if aux > 0 {
            aux -= 1;
            continue;
        }
        symbols.push(Symbol::from_raw(record, strtab)?);
        aux = record.number_of_aux_symbols();
        primary = index;
    }
    if aux > 0 {
        match opts.aux_policy {
            AuxPolicy::Lenient => warn!(
                "symbol {} declares {} auxiliary records past the end of the table",
                primary, aux
            ),
            AuxPolicy::Strict => {
                return Err(error::Error::MalformedAuxCount {
                    index: primary,
                    missing: aux,
                });
            }
        }
    }
    Ok(symbols)
}

/// Turns the raw records of a symbol table into symbols, dropping auxiliary records.
pub fn remove_aux_symbols<T: StringTable + ?Sized>(
    table: &RawSymbolTable,
    strtab: &T,
    opts: &ParseOptions,
) -> error::Result<Vec<Symbol>> {
    let symbols = match table {
        RawSymbolTable::Small(records) => canonicalize(records, strtab, opts)?,
        RawSymbolTable::Big(records) => canonicalize(records, strtab, opts)?,
    };
    debug!("{} symbols from {} records", symbols.len(), table.len());
    Ok(symbols)
}

/// Reads the symbols of the file described by `header`, along with the string table
/// that follows them.
pub fn read_symbols<H, R>(header: &H, stream: &mut R) -> error::Result<Vec<Symbol>>
where
    H: FileHeader + ?Sized,
    R: Read + Seek,
{
    let table = read_raw_symbols(header, stream)?;
    if table.is_empty() {
        return Ok(Vec::new());
    }
    let strtab = Strtab::read(header, stream)?;
    remove_aux_symbols(&table, &strtab, &ParseOptions::default())
}

/// Reads the symbols of the file described by `header`, resolving long names against
/// an already loaded string table.
pub fn read_symbols_with<H, R, T>(
    header: &H,
    stream: &mut R,
    strtab: &T,
    opts: &ParseOptions,
) -> error::Result<Vec<Symbol>>
where
    H: FileHeader + ?Sized,
    R: Read + Seek,
    T: StringTable + ?Sized,
{
    let table = read_raw_symbols(header, stream)?;
    remove_aux_symbols(&table, strtab, opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scroll::Pwrite;
    use std::io::Cursor;

    fn small(name: &[u8; 8], section_number: i16, aux: u8) -> [u8; 18] {
        let mut bytes = [0u8; 18];
        let mut offset = 0;
        bytes.gwrite(&name[..], &mut offset).unwrap();
        bytes.gwrite_with(0x1234u32, &mut offset, scroll::LE).unwrap();
        bytes.gwrite_with(section_number, &mut offset, scroll::LE).unwrap();
        bytes.gwrite_with(0x20u16, &mut offset, scroll::LE).unwrap();
        bytes.gwrite_with(IMAGE_SYM_CLASS_EXTERNAL, &mut offset, scroll::LE).unwrap();
        bytes.gwrite_with(aux, &mut offset, scroll::LE).unwrap();
        bytes
    }

    #[test]
    fn layout_from_size() {
        assert_eq!(RecordLayout::from_size(18).unwrap(), RecordLayout::Small);
        assert_eq!(RecordLayout::from_size(20).unwrap(), RecordLayout::Big);
        for size in [0, 16, 19, 21, 40, u16::MAX] {
            assert!(matches!(
                RecordLayout::from_size(size),
                Err(error::Error::UnsupportedRecordSize(s)) if s == size
            ));
        }
    }

    #[test]
    fn small_record_fields() {
        let bytes = small(b".text\0\0\0", -2, 1);
        let table = RawSymbolTable::parse(&bytes, RecordLayout::Small, 1).unwrap();
        let RawSymbolTable::Small(records) = table else {
            panic!("expected small records");
        };
        let record = &records[0];
        assert_eq!(record.name(), b".text\0\0\0");
        assert_eq!(record.value(), 0x1234);
        assert_eq!(record.section_number(), -2);
        assert_eq!(record.typ(), 0x20);
        assert_eq!(record.storage_class(), IMAGE_SYM_CLASS_EXTERNAL);
        assert_eq!(record.number_of_aux_symbols(), 1);
    }

    #[test]
    fn big_record_fields() {
        let mut bytes = [0u8; 20];
        bytes[..8].copy_from_slice(b"bigname1");
        bytes.pwrite_with(7u32, 8, scroll::LE).unwrap();
        bytes.pwrite_with(0x10000i32, 12, scroll::LE).unwrap();
        bytes.pwrite_with(0x20u16, 16, scroll::LE).unwrap();
        bytes[18] = IMAGE_SYM_CLASS_STATIC;
        bytes[19] = 3;
        let table = RawSymbolTable::parse(&bytes, RecordLayout::Big, 1).unwrap();
        let RawSymbolTable::Big(records) = table else {
            panic!("expected big records");
        };
        assert_eq!(records[0].section_number(), 0x10000);
        assert_eq!(records[0].value(), 7);
        assert_eq!(records[0].storage_class(), IMAGE_SYM_CLASS_STATIC);
        assert_eq!(records[0].number_of_aux_symbols(), 3);
    }

    #[test]
    fn offset_name() {
        let strtab = Strtab::new(b"foo\0".to_vec());
        let name = [0, 0, 0, 0, 4, 0, 0, 0];
        assert_eq!(name_offset(&name), Some(4));
        assert_eq!(resolve_name(&name, &strtab).unwrap(), "foo");
    }

    #[test]
    fn inline_names() {
        let strtab = Strtab::default();
        assert_eq!(resolve_name(b"abc\0\0\0\0\0", &strtab).unwrap(), "abc");
        assert_eq!(resolve_name(b"abcdefgh", &strtab).unwrap(), "abcdefgh");
        // only a fully zeroed first word selects the string table
        assert_eq!(name_offset(&[0, 0, 0, b'x', 4, 0, 0, 0]), None);
        assert_eq!(resolve_name(&[0, 0, 0, b'x', 4, 0, 0, 0], &strtab).unwrap(), "");
        assert_eq!(resolve_name(b"a\0c\0\0\0\0\0", &strtab).unwrap(), "a");
    }

    #[test]
    fn offset_name_lookup_failure() {
        let strtab = Strtab::new(b"foo\0".to_vec());
        assert!(matches!(
            resolve_name(&[0, 0, 0, 0, 0x40, 0, 0, 0], &strtab),
            Err(error::Error::StringTableLookup(0x40, _))
        ));
    }

    #[test]
    fn foreign_lookup_errors_are_wrapped() {
        struct Broken;
        impl StringTable for Broken {
            fn lookup(&self, _offset: u32) -> error::Result<&str> {
                Err(error::Error::Malformed("no strings here".into()))
            }
        }
        assert!(matches!(
            resolve_name(&[0, 0, 0, 0, 8, 0, 0, 0], &Broken),
            Err(error::Error::StringTableLookup(8, _))
        ));
    }

    #[test]
    fn aux_records_are_skipped() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&small(b"first\0\0\0", 1, 1));
        // aux payload, deliberately shaped like a symbol with a bad offset name
        bytes.extend_from_slice(&small(&[0, 0, 0, 0, 0xff, 0xff, 0, 0], 9, 4));
        bytes.extend_from_slice(&small(b"second\0\0", 2, 0));
        let table = RawSymbolTable::parse(&bytes, RecordLayout::Small, 3).unwrap();
        let symbols = remove_aux_symbols(&table, &Strtab::default(), &ParseOptions::default()).unwrap();
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].name, "first");
        assert_eq!(symbols[0].section_number, 1);
        assert_eq!(symbols[1].name, "second");
        assert_eq!(symbols[1].section_number, 2);
    }

    #[test]
    fn aux_overrun_is_lenient_by_default() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&small(b"a\0\0\0\0\0\0\0", 1, 0));
        bytes.extend_from_slice(&small(b"b\0\0\0\0\0\0\0", 1, 5));
        bytes.extend_from_slice(&small(b"aux\0\0\0\0\0", 1, 0));
        let table = RawSymbolTable::parse(&bytes, RecordLayout::Small, 3).unwrap();
        let symbols = remove_aux_symbols(&table, &Strtab::default(), &ParseOptions::default()).unwrap();
        assert_eq!(
            symbols.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );

        let strict = ParseOptions {
            aux_policy: AuxPolicy::Strict,
        };
        assert!(matches!(
            remove_aux_symbols(&table, &Strtab::default(), &strict),
            Err(error::Error::MalformedAuxCount { index: 1, missing: 4 })
        ));
    }

    #[test]
    fn empty_table() {
        let table = RawSymbolTable::default();
        assert!(table.is_empty());
        let symbols = remove_aux_symbols(&table, &Strtab::default(), &ParseOptions::default()).unwrap();
        assert!(symbols.is_empty());
    }

    #[test]
    fn unsupported_record_size_after_seek() {
        struct Header;
        impl FileHeader for Header {
            fn pointer_to_symbol_table(&self) -> u32 {
                4
            }
            fn number_of_symbols(&self) -> i32 {
                1
            }
            fn symbol_record_size(&self) -> u16 {
                24
            }
        }
        let mut stream = Cursor::new(vec![0u8; 64]);
        assert!(matches!(
            read_raw_symbols(&Header, &mut stream),
            Err(error::Error::UnsupportedRecordSize(24))
        ));
    }

    #[test]
    fn symbol_type_helpers() {
        let symbol = Symbol {
            typ: 0x20,
            section_number: IMAGE_SYM_ABSOLUTE,
            ..Symbol::default()
        };
        assert_eq!(symbol.base_type(), 0);
        assert_eq!(symbol.derived_type(), IMAGE_SYM_DTYPE_FUNCTION);
        assert!(symbol.is_function());
        assert!(symbol.is_absolute());
        assert!(!symbol.is_undefined());
        assert!(!symbol.is_debug());
    }
}
