use crate::error;
use crate::pe::symbol;
use log::debug;
use scroll::Pread;
use std::io::{Read, Seek, SeekFrom};

/// What the symbol reader needs to know about the file that embeds a COFF symbol table.
pub trait FileHeader {
    /// The file offset of the symbol table, or zero if there is none.
    fn pointer_to_symbol_table(&self) -> u32;
    /// The declared number of symbol table records, auxiliary records included.
    fn number_of_symbols(&self) -> i32;
    /// The size in bytes of one symbol table record.
    fn symbol_record_size(&self) -> u16;
}

#[doc(alias("IMAGE_DOS_SIGNATURE"))]
pub const DOS_MAGIC: u16 = 0x5a4d;
/// `e_lfanew`: the offset of the pointer to the PE signature
pub const PE_POINTER_OFFSET: u32 = 0x3c;
pub const SIZEOF_DOS_HEADER: usize = 0x40;
/// PE\0\0, little endian
pub const PE_MAGIC: u32 = 0x0000_4550;
pub const SIZEOF_PE_MAGIC: usize = 4;

/// COFF Header
#[repr(C)]
#[derive(Debug, PartialEq, Eq, Copy, Clone, Default, Pread)]
#[doc(alias("IMAGE_FILE_HEADER"))]
pub struct CoffHeader {
    /// The machine type
    pub machine: u16,
    pub number_of_sections: u16,
    pub time_date_stamp: u32,
    pub pointer_to_symbol_table: u32,
    pub number_of_symbol_table: u32,
    pub size_of_optional_header: u16,
    pub characteristics: u16,
}

pub const SIZEOF_COFF_HEADER: usize = 20;

/// The contents of this field are assumed to be applicable to any machine type
pub const COFF_MACHINE_UNKNOWN: u16 = 0x0;
/// x64
pub const COFF_MACHINE_X86_64: u16 = 0x8664;
/// ARM Thumb-2 little endian
pub const COFF_MACHINE_ARMNT: u16 = 0x1c4;
/// ARM64 little endian
pub const COFF_MACHINE_ARM64: u16 = 0xaa64;
/// Intel 386 or later processors and compatible processors
pub const COFF_MACHINE_X86: u16 = 0x14c;

impl CoffHeader {
    pub fn parse(bytes: &[u8], offset: &mut usize) -> error::Result<Self> {
        Ok(bytes.gread_with(offset, scroll::LE)?)
    }
}

fn symbol_count(count: u32) -> i32 {
    // counts past i32::MAX cannot be satisfied by any real file; keep them positive so the
    // read fails instead of silently reporting no symbols
    i32::try_from(count).unwrap_or(i32::MAX)
}

impl FileHeader for CoffHeader {
    fn pointer_to_symbol_table(&self) -> u32 {
        self.pointer_to_symbol_table
    }
    fn number_of_symbols(&self) -> i32 {
        symbol_count(self.number_of_symbol_table)
    }
    fn symbol_record_size(&self) -> u16 {
        symbol::COFF_SYMBOL_SIZE
    }
}

/// The header of an object file produced with `/bigobj`.
///
/// It allows more than 65279 sections, which widens the section number of every
/// symbol record to 32 bits.
#[repr(C)]
#[derive(Debug, PartialEq, Eq, Copy, Clone, Default, Pread)]
#[doc(alias("ANON_OBJECT_HEADER_BIGOBJ"))]
pub struct BigObjHeader {
    /// Always `IMAGE_FILE_MACHINE_UNKNOWN`
    pub sig1: u16,
    /// Always `0xffff`
    pub sig2: u16,
    /// At least 2
    pub version: u16,
    pub machine: u16,
    pub time_date_stamp: u32,
    pub class_id: [u8; 16],
    pub size_of_data: u32,
    pub flags: u32,
    pub meta_data_size: u32,
    pub meta_data_offset: u32,
    pub number_of_sections: u32,
    pub pointer_to_symbol_table: u32,
    pub number_of_symbols: u32,
}

pub const SIZEOF_BIGOBJ_HEADER: usize = 56;

/// `{D1BAA1C7-BAEE-4ba9-AF20-FAF66AA4DCB8}` in its on-disk byte order
pub const BIGOBJ_CLASS_ID: [u8; 16] = [
    0xc7, 0xa1, 0xba, 0xd1, 0xee, 0xba, 0xa9, 0x4b, 0xaf, 0x20, 0xfa, 0xf6, 0x6a, 0xa4, 0xdc, 0xb8,
];

impl BigObjHeader {
    pub fn parse(bytes: &[u8], offset: &mut usize) -> error::Result<Self> {
        Ok(bytes.gread_with(offset, scroll::LE)?)
    }

    /// Whether `bytes` starts with a bigobj header rather than a regular COFF header.
    pub fn is_bigobj(bytes: &[u8]) -> bool {
        match BigObjHeader::parse(bytes, &mut 0) {
            Ok(header) => {
                header.sig1 == COFF_MACHINE_UNKNOWN
                    && header.sig2 == 0xffff
                    && header.version >= 2
                    && header.class_id == BIGOBJ_CLASS_ID
            }
            Err(_) => false,
        }
    }
}

impl FileHeader for BigObjHeader {
    fn pointer_to_symbol_table(&self) -> u32 {
        self.pointer_to_symbol_table
    }
    fn number_of_symbols(&self) -> i32 {
        symbol_count(self.number_of_symbols)
    }
    fn symbol_record_size(&self) -> u16 {
        symbol::COFF_BIGOBJ_SYMBOL_SIZE
    }
}

/// The header of a file carrying a COFF symbol table.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Header {
    /// A regular COFF object file
    Object(CoffHeader),
    /// A `/bigobj` COFF object file
    BigObj(BigObjHeader),
    /// A PE image; `pe_pointer` is the offset of the `PE\0\0` signature
    Image { pe_pointer: u32, coff_header: CoffHeader },
}

impl Header {
    /// Detects the kind of file at the start of `stream` and reads its header.
    pub fn read<R: Read + Seek>(stream: &mut R) -> error::Result<Self> {
        let mut prefix = [0u8; SIZEOF_DOS_HEADER];
        let len = read_prefix(stream, 0, &mut prefix)?;
        let prefix = &prefix[..len];

        if prefix.pread_with::<u16>(0, scroll::LE).ok() == Some(DOS_MAGIC) {
            let pe_pointer = prefix
                .pread_with::<u32>(PE_POINTER_OFFSET as usize, scroll::LE)
                .map_err(|_| {
                    error::Error::Malformed(format!(
                        "cannot parse PE header pointer (offset {:#x})",
                        PE_POINTER_OFFSET
                    ))
                })?;
            let mut bytes = [0u8; SIZEOF_PE_MAGIC + SIZEOF_COFF_HEADER];
            let len = read_prefix(stream, u64::from(pe_pointer), &mut bytes)?;
            let bytes = &bytes[..len];
            let mut offset = 0;
            let signature: u32 = bytes.gread_with(&mut offset, scroll::LE).map_err(|_| {
                error::Error::Malformed(format!(
                    "cannot parse PE signature (offset {:#x})",
                    pe_pointer
                ))
            })?;
            if signature != PE_MAGIC {
                return Err(error::Error::BadMagic(signature.into()));
            }
            let coff_header = CoffHeader::parse(bytes, &mut offset)?;
            debug!("PE image at {:#x}: {:#?}", pe_pointer, coff_header);
            Ok(Header::Image {
                pe_pointer,
                coff_header,
            })
        } else if BigObjHeader::is_bigobj(prefix) {
            let header = BigObjHeader::parse(prefix, &mut 0)?;
            debug!("bigobj object: {:#?}", header);
            Ok(Header::BigObj(header))
        } else {
            if prefix.len() < SIZEOF_COFF_HEADER {
                return Err(error::Error::BufferTooShort(
                    SIZEOF_COFF_HEADER,
                    "bytes of COFF header",
                ));
            }
            let header = CoffHeader::parse(prefix, &mut 0)?;
            debug!("COFF object: {:#?}", header);
            Ok(Header::Object(header))
        }
    }

    pub fn machine(&self) -> u16 {
        match self {
            Header::Object(header) => header.machine,
            Header::BigObj(header) => header.machine,
            Header::Image { coff_header, .. } => coff_header.machine,
        }
    }

    fn file_header(&self) -> &dyn FileHeader {
        match self {
            Header::Object(header) => header,
            Header::BigObj(header) => header,
            Header::Image { coff_header, .. } => coff_header,
        }
    }
}

impl FileHeader for Header {
    fn pointer_to_symbol_table(&self) -> u32 {
        self.file_header().pointer_to_symbol_table()
    }
    fn number_of_symbols(&self) -> i32 {
        self.file_header().number_of_symbols()
    }
    fn symbol_record_size(&self) -> u16 {
        self.file_header().symbol_record_size()
    }
}

/// Fills as much of `buf` as the stream holds at `offset`, returning the number of bytes read.
fn read_prefix<R: Read + Seek>(stream: &mut R, offset: u64, buf: &mut [u8]) -> error::Result<usize> {
    stream
        .seek(SeekFrom::Start(offset))
        .map_err(|err| error::Error::Seek(offset, err))?;
    let mut len = 0;
    while len < buf.len() {
        match stream.read(&mut buf[len..]) {
            Ok(0) => break,
            Ok(n) => len += n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
            Err(err) => return Err(error::Error::Read(err)),
        }
    }
    Ok(len)
}
