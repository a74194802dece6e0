//! A two-pass assembler for a small, fixed-width 15-bit instruction set,
//! featuring:
//! - macro preprocessor
//! - first pass (symbol table, address layout)
//! - second pass (instruction encoding, fix-ups)
//! - object/entry/extern file writer

pub mod assembler;
pub mod logging;
