use coffsyms::error;
use coffsyms::pe::Coff;
use coffsyms::pe::options::ParseOptions;
use std::env;
use std::fs::File;
use std::io::BufReader;

fn run() -> error::Result<()> {
    let mut opts = ParseOptions::default();
    for arg in env::args().skip(1) {
        if arg == "--strict" {
            opts = ParseOptions::strict();
            continue;
        }
        let mut file = BufReader::new(File::open(&arg)?);
        let coff = Coff::read_with_opts(&mut file, &opts)?;
        println!("{}: {} symbols", arg, coff.symbols.len());
        for symbol in &coff.symbols {
            println!(
                "{:08x} {:>6} {:04x} {:>3} {}",
                symbol.value, symbol.section_number, symbol.typ, symbol.storage_class, symbol.name
            );
        }
    }
    Ok(())
}

pub fn main() {
    stderrlog::new().verbosity(1).init().unwrap();
    match run() {
        Ok(()) => (),
        Err(err) => println!("{:#}", err),
    }
}
