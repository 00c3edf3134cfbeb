//! # coffsyms, a COFF symbol table decoder
//!
//! Reads the symbol table of PE images and COFF object files, including object files
//! built with `/bigobj`, whose symbol records are 20 bytes wide instead of 18.
//!
//! Symbol names are resolved against the string table and auxiliary records are
//! dropped, so the result is one [`Symbol`](pe::symbol::Symbol) per primary record.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! fn run() -> coffsyms::error::Result<()> {
//!     let mut file = BufReader::new(File::open("foo.obj")?);
//!     let coff = coffsyms::pe::Coff::read(&mut file)?;
//!     for symbol in &coff.symbols {
//!         println!("{:>8x} {:>4} {}", symbol.value, symbol.section_number, symbol.name);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Callers that locate the symbol table themselves implement
//! [`FileHeader`](pe::header::FileHeader) and call
//! [`read_symbols`](pe::symbol::read_symbols) directly.

pub mod error;
pub mod pe;
pub mod strtab;
