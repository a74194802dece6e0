//! Assembles source code into 15-bit machine words in a two-pass manner,
//! with a macro preprocessor running ahead of both passes.
//!
//! The first pass resolves labels and builds the symbol table while
//! allocating instruction/data addresses; the second pass walks the same
//! expanded source again and encodes every instruction and directive into
//! its final machine words.
//!
//! The syntax supported by this assembler:
//!
//! ```ignore
//! MAIN:   mov   r3, r4
//!         add   #5, LIST
//!         jmp   LOOP
//! LOOP:   .data 7, -1
//!         .string "ab"
//!         .entry MAIN
//!         .extern EXT
//! ```
//!
//! Comments are whole lines starting with `;`. Labels are terminated with a
//! colon. Operands use `#N` for an immediate, `rN` for a register, `*rN`
//! for a register-indirect ("relative") operand, and a bare identifier for
//! a direct label reference.
//!
//! The assembler supports sixteen instructions (mov, cmp, add, sub, lea,
//! clr, not, inc, dec, jmp, bne, red, prn, jsr, rts, stop) and four
//! directives (`.data`, `.string`, `.entry`, `.extern`).

pub mod codegen_utils;
pub mod directives;
pub mod first_pass;
pub mod instructions;
pub mod preprocessor;
pub mod second_pass;
pub mod statement;
pub mod writer;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use statement::TokenSpan;

/// Address of a word in the code or data image (IC/DC space, not yet offset by 100).
pub type Address = u16;

/// Initial value of the instruction counter.
pub const IC_INIT: Address = 100;

/// Maximum combined size of the code and data images.
pub const MAX_IMAGE_WORDS: usize = 4096;

/// Maximum length of a label, in characters.
pub const MAX_LABEL_LEN: usize = 31;

/// Maximum length of a source line's user content, in characters.
pub const MAX_LINE_LEN: usize = 80;

/// Hard cap on a source line's length, including any line terminator.
pub const MAX_LINE_LEN_HARD_CAP: usize = 100;

/// What a [`Symbol`] was defined as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// Defined as a label in front of an instruction.
    Code,
    /// Defined as a label in front of a `.data` or `.string` directive.
    Data,
    /// Declared with `.extern`; never defined locally.
    Extern,
}

/// A named address: a label, and what it was attached to.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub address: Address,
    pub kind: SymbolKind,
    /// Set once a matching `.entry` declaration is resolved against this symbol.
    pub is_entry: bool,
}

/// Maps label names to the symbol defined at that address.
///
/// Insertion order is preserved (via `order`) for deterministic iteration;
/// `index` gives O(1) lookup by name.
#[derive(Debug, Default)]
pub struct SymbolTable {
    order: Vec<Symbol>,
    index: HashMap<String, usize>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    /// Look up a symbol by name.
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.index.get(name).map(|&i| &self.order[i])
    }

    /// Look up a symbol by name, mutably.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        let i = *self.index.get(name)?;
        Some(&mut self.order[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Insert a newly defined symbol. Panics if `name` is already present;
    /// callers must check `contains` first to produce a proper diagnostic.
    pub fn insert(&mut self, symbol: Symbol) {
        debug_assert!(!self.index.contains_key(&symbol.name));
        self.index.insert(symbol.name.clone(), self.order.len());
        self.order.push(symbol);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.order.iter()
    }

    /// Iterate mutably, used by the first pass to fix up `Data` symbol
    /// addresses once the final instruction-counter total is known.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Symbol> {
        self.order.iter_mut()
    }
}

/// The `.entry`/`.extern` declarations collected during the first pass.
#[derive(Debug, Default)]
pub struct RefTable {
    /// Names declared `.entry`, in declaration order.
    pub entries: Vec<String>,
    /// Names declared `.extern`, in declaration order.
    pub externs: Vec<String>,
}

/// One `(name, use_site_address)` pair per second-pass encounter of a
/// direct reference to an external symbol.
pub type ExternUses = Vec<(String, Address)>;

/// The final artifacts produced by assembling one file, ready for the writer.
pub struct Assembled {
    /// Code words, indexed from `IC_INIT`.
    pub code_image: Vec<u16>,
    /// Data words, indexed from `IC_INIT + code_image.len()`.
    pub data_image: Vec<u16>,
    /// `(name, address)` for every `.entry`, resolved and in *declaration* order.
    /// The writer reverses this list itself, per the documented `.ent` format.
    pub entries: Vec<(String, Address)>,
    /// `(name, use_address)` for every direct reference to an extern symbol,
    /// in the order second pass encountered them.
    pub ext_uses: ExternUses,
}

impl Assembled {
    pub fn ic_final(&self) -> Address {
        IC_INIT + self.code_image.len() as Address
    }

    pub fn dc_final(&self) -> Address {
        self.data_image.len() as Address
    }
}

/// Assemble an already macro-expanded source string into its final artifacts.
///
/// This is the entry point used directly by tests that want to exercise
/// both passes without touching the filesystem; [`assemble_file`] wraps it
/// with preprocessing, file I/O, and failure cleanup.
pub fn assemble_str(expanded: &str) -> Result<Assembled, Error> {
    assemble_expanded(expanded, &HashSet::new())
}

/// Like [`assemble_str`], but also checks labels against a set of macro
/// names the preprocessor defined while producing `expanded`.
fn assemble_expanded(expanded: &str, macro_names: &HashSet<String>) -> Result<Assembled, Error> {
    let mut built = first_pass::run(expanded, macro_names)?;
    second_pass::run(&mut built)
}

/// Read `<base>.as`, preprocess it to `<base>.am`, assemble it, and write
/// `<base>.ob` plus (when non-empty) `<base>.ent` and `<base>.ext`.
///
/// On any error, every output file this call may have already written for
/// `base` is deleted before the error is returned; a failed assembly leaves
/// no trace on disk.
pub fn assemble_file(base: &str) -> Result<(), Error> {
    let result = assemble_file_inner(base);
    if result.is_err() {
        for suffix in [".am", ".ob", ".ent", ".ext"] {
            let _ = fs::remove_file(format!("{base}{suffix}"));
        }
    }
    result
}

fn assemble_file_inner(base: &str) -> Result<(), Error> {
    let as_path = format!("{base}.as");
    let source = fs::read_to_string(&as_path).map_err(|_| Error::ReadError { path: as_path })?;

    let expanded = preprocessor::process(&source)?;

    let am_path = format!("{base}.am");
    fs::write(&am_path, &expanded.source).map_err(|_| Error::WriteError { path: am_path })?;

    let assembled = assemble_expanded(&expanded.source, &expanded.macro_names)?;

    let ob_path = format!("{base}.ob");
    writer::write_ob_file(&ob_path, &assembled)?;

    if !assembled.entries.is_empty() {
        let ent_path = format!("{base}.ent");
        writer::write_ent_file(&ent_path, &assembled)?;
    }

    if !assembled.ext_uses.is_empty() {
        let ext_path = format!("{base}.ext");
        writer::write_ext_file(&ext_path, &assembled)?;
    }

    Ok(())
}

/// An error that can occur at any stage of assembling a file.
#[derive(Debug)]
pub enum Error {
    /// A source line exceeded the maximum allowed length.
    LineTooLong { line_number: usize, line: String },
    /// `macr` was given an invalid name (an opcode, register, or malformed identifier).
    InvalidMacroName { name: String, line_number: usize, line: String },
    /// `endmacr` with no matching open `macr`, or an unterminated macro body.
    MalformedMacro { line_number: usize, line: String },
    /// An unknown opcode or directive.
    UnknownInstruction { instruction: String, instruction_span: TokenSpan, line_number: usize, line: String },
    /// A label did not start with a letter, contained non-alphanumerics, exceeded
    /// the length limit, or collided with an opcode, register, or macro name.
    InvalidLabel { label: String, line_number: usize, line: String },
    /// A label was already defined earlier in the file.
    DuplicateLabel { label: String, line_number: usize, line: String },
    /// Commas in an operand or `.data` list were placed incorrectly.
    InvalidCommaPlacement { line_number: usize, line: String },
    /// An operand was not a valid immediate/register/relative/direct token.
    InvalidOperand { operand: String, operand_span: TokenSpan, line_number: usize, line: String },
    /// The wrong number of operands was given for an instruction or directive.
    InvalidOperandCount {
        instruction: String,
        n_operands: usize,
        expected: Vec<usize>,
        extra_operand_spans: Vec<TokenSpan>,
        line_number: usize,
        line: String,
    },
    /// An operand's addressing mode is not legal for this opcode/position.
    IllegalAddressingMode { instruction: String, operand_span: TokenSpan, line_number: usize, line: String },
    /// A numeric operand did not fit in the number of bits available to it.
    ArgumentOverflow { value: i32, operand_span: TokenSpan, max_bits: u32, line_number: usize, line: String },
    /// A referenced label was never defined anywhere in the file.
    UnknownSymbol { name: String, operand_span: TokenSpan, line_number: usize, line: String },
    /// `.entry` named a symbol that was never defined.
    UnresolvedEntry { name: String },
    /// The combined code and data images exceeded [`MAX_IMAGE_WORDS`].
    RamOverflow { requested: usize },
    /// The source file could not be read.
    ReadError { path: String },
    /// An output file could not be written.
    WriteError { path: String },
}

impl std::error::Error for Error {}

fn underline_spans(line: &str, spans: &[&TokenSpan]) -> String {
    let mut underline = vec![' '; line.len()];
    for span in spans {
        for i in span.start()..span.end() {
            if i < underline.len() {
                underline[i] = '^';
            }
        }
    }
    underline.into_iter().collect()
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (message, line, line_number, spans): (String, Option<&String>, Option<&usize>, Vec<&TokenSpan>) = match self {
            Error::LineTooLong { line_number, line } => (
                format!("line {line_number} exceeds the maximum line length of {MAX_LINE_LEN} characters"),
                Some(line), Some(line_number), vec![]
            ),
            Error::InvalidMacroName { name, line_number, line } => (
                format!("invalid macro name \"{name}\" at line {line_number}"),
                Some(line), Some(line_number), vec![]
            ),
            Error::MalformedMacro { line_number, line } => (
                format!("malformed macro definition at line {line_number}"),
                Some(line), Some(line_number), vec![]
            ),
            Error::UnknownInstruction { instruction, instruction_span, line_number, line } => (
                format!("unknown instruction or directive \"{instruction}\" at line {line_number}"),
                Some(line), Some(line_number), vec![instruction_span]
            ),
            Error::InvalidLabel { label, line_number, line } => (
                format!("invalid label \"{label}\" at line {line_number}"),
                Some(line), Some(line_number), vec![]
            ),
            Error::DuplicateLabel { label, line_number, line } => (
                format!("label \"{label}\" redefined at line {line_number}"),
                Some(line), Some(line_number), vec![]
            ),
            Error::InvalidCommaPlacement { line_number, line } => (
                format!("invalid comma placement at line {line_number}"),
                Some(line), Some(line_number), vec![]
            ),
            Error::InvalidOperand { operand, operand_span, line_number, line } => (
                format!("invalid operand \"{operand}\" at line {line_number}"),
                Some(line), Some(line_number), vec![operand_span]
            ),
            Error::InvalidOperandCount { instruction, n_operands, expected, extra_operand_spans, line_number, line } => (
                format!(
                    "invalid operand count for \"{instruction}\" at line {line_number}: found {n_operands}, expected {expected:?}"
                ),
                Some(line), Some(line_number), extra_operand_spans.iter().collect()
            ),
            Error::IllegalAddressingMode { instruction, operand_span, line_number, line } => (
                format!("addressing mode not allowed for \"{instruction}\" at line {line_number}"),
                Some(line), Some(line_number), vec![operand_span]
            ),
            Error::ArgumentOverflow { value, operand_span, max_bits, line_number, line } => (
                format!(
                    "argument overflow at line {line_number}: {value} does not fit in {max_bits} bits"
                ),
                Some(line), Some(line_number), vec![operand_span]
            ),
            Error::UnknownSymbol { name, operand_span, line_number, line } => (
                format!("unknown symbol \"{name}\" at line {line_number}"),
                Some(line), Some(line_number), vec![operand_span]
            ),
            Error::UnresolvedEntry { name } => (
                format!(".entry \"{name}\" names a symbol that is never defined"),
                None, None, vec![]
            ),
            Error::RamOverflow { requested } => (
                format!("RAM overflow: {requested} words requested, maximum is {MAX_IMAGE_WORDS}"),
                None, None, vec![]
            ),
            Error::ReadError { path } => (
                format!("failed to read file {path}"),
                None, None, vec![]
            ),
            Error::WriteError { path } => (
                format!("failed to write file {path}"),
                None, None, vec![]
            ),
        };
        writeln!(f, "{message}")?;
        if let (Some(line), Some(line_number)) = (line, line_number) {
            write!(f, "{line_number}\t{line}")?;
            if !spans.is_empty() {
                writeln!(f)?;
                write!(f, "\t{}", underline_spans(line, &spans))?;
            }
        }
        Ok(())
    }
}
