#![no_main]
use coffsyms::pe::header::FileHeader;
use coffsyms::pe::symbol;
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

struct Header(u32, i32, u16);

impl FileHeader for Header {
    fn pointer_to_symbol_table(&self) -> u32 {
        self.0
    }
    fn number_of_symbols(&self) -> i32 {
        self.1
    }
    fn symbol_record_size(&self) -> u16 {
        self.2
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    // the first three bytes pick the table location and layout, the rest is the file
    let count = i32::from(data[0]) - 8;
    let size = if data[1] & 1 == 0 { 18 } else { 20 };
    let pointer = u32::from(data[2]);
    let header = Header(pointer, count, size);
    let _ = symbol::read_symbols(&header, &mut Cursor::new(&data[3..]));
});
