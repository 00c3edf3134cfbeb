#![no_main]
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    if let Ok(coff) = coffsyms::pe::Coff::read(&mut Cursor::new(data)) {
        let _ = coff.strings.to_vec();
    }
});
