use std::env;

use assembler::assembler::assemble_file;
use assembler::logging::error;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <basename> [<basename> ...]", args[0]);
        std::process::exit(1);
    }

    let mut any_failed = false;

    for base in &args[1..] {
        if let Err(e) = assemble_file(base) {
            error(format!("{base}: {e}"));
            any_failed = true;
        }
    }

    if any_failed {
        std::process::exit(2);
    }
}
