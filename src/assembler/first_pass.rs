//! Walks the expanded source once, building the symbol table and entry/extern
//! reference lists while sizing every instruction and directive into its
//! final address. The resulting [`Statement`]s are handed unchanged to the
//! second pass, so that sizing and encoding can never disagree.

use std::collections::HashSet;

use crate::assembler::codegen_utils::instruction_word_count;
use crate::assembler::directives::{self, is_directive};
use crate::assembler::instructions::{parse_instruction_operands, InstructionOperands, Opcode};
use crate::assembler::preprocessor::RESERVED_NAMES;
use crate::assembler::statement::{parse_line, Statement};
use crate::assembler::{
    Address, Error, RefTable, Symbol, SymbolKind, SymbolTable, IC_INIT, MAX_IMAGE_WORDS, MAX_LABEL_LEN, MAX_LINE_LEN,
};

/// One source line, parsed and sized but not yet encoded.
pub enum ParsedLine {
    Instruction { address: Address, opcode: Opcode, operands: InstructionOperands, statement: Statement },
    Data { values: Vec<i32> },
    Str { text: String },
}

/// Everything the second pass needs: the resolved symbol table, the
/// `.entry`/`.extern` declarations, and the sized line list in source order.
pub struct FirstPassOutput {
    pub symbols: SymbolTable,
    pub refs: RefTable,
    pub lines: Vec<ParsedLine>,
}

/// Run the first pass over an already macro-expanded source string.
///
/// `macro_names` is the set of macro names the preprocessor defined while
/// producing `expanded`, so a label that collides with one can be rejected
/// the same way a collision with an opcode or register is.
pub fn run(expanded: &str, macro_names: &HashSet<String>) -> Result<FirstPassOutput, Error> {
    let mut symbols = SymbolTable::new();
    let mut refs = RefTable::default();
    let mut lines = Vec::new();

    let mut ic: Address = 0;
    let mut dc: Address = 0;

    for (index, raw_line) in expanded.lines().enumerate() {
        let line_number = index + 1;

        if raw_line.trim().is_empty() {
            continue;
        }
        if raw_line.len() > MAX_LINE_LEN {
            return Err(Error::LineTooLong { line_number, line: raw_line.to_string() });
        }

        let statement = parse_line(line_number, raw_line)?;
        let keyword = statement.keyword.as_str();

        let defines_entry_or_extern = keyword == ".entry" || keyword == ".extern";

        if let Some(label) = statement.label.clone() {
            if !defines_entry_or_extern {
                validate_label(&label, macro_names, &statement)?;
                if symbols.contains(&label) {
                    return Err(duplicate_label(&label, &statement));
                }
                let kind = if is_directive(keyword) { SymbolKind::Data } else { SymbolKind::Code };
                let address = match kind {
                    SymbolKind::Code => IC_INIT + ic,
                    SymbolKind::Data => dc,
                    SymbolKind::Extern => unreachable!(),
                };
                symbols.insert(Symbol { name: label, address, kind, is_entry: false });
            }
        }

        if is_directive(keyword) {
            match keyword {
                ".data" => {
                    let values = directives::parse_data_values(&statement)?;
                    dc += values.len() as Address;
                    lines.push(ParsedLine::Data { values });
                }
                ".string" => {
                    let text = directives::parse_string_literal(&statement)?;
                    dc += text.len() as Address + 1;
                    lines.push(ParsedLine::Str { text });
                }
                ".entry" => {
                    let names = directives::parse_directive_symbols(&statement)?;
                    refs.entries.extend(names);
                }
                ".extern" => {
                    let names = directives::parse_directive_symbols(&statement)?;
                    for name in names {
                        if !symbols.contains(&name) {
                            symbols.insert(Symbol { name: name.clone(), address: 0, kind: SymbolKind::Extern, is_entry: false });
                        }
                        refs.externs.push(name);
                    }
                }
                _ => unreachable!("is_directive only matches the four arms above"),
            }
        } else {
            let opcode = Opcode::from_mnemonic(keyword).ok_or_else(|| Error::UnknownInstruction {
                instruction: keyword.to_string(),
                instruction_span: statement.keyword_span,
                line_number: statement.line_number,
                line: statement.line.clone(),
            })?;
            let operands = parse_instruction_operands(&statement, opcode)?;
            let address = IC_INIT + ic;
            ic += instruction_word_count(opcode, &operands) as Address;
            lines.push(ParsedLine::Instruction { address, opcode, operands, statement });
        }
    }

    for symbol in symbols.iter_mut() {
        if symbol.kind == SymbolKind::Data {
            symbol.address += IC_INIT + ic;
        }
    }

    let total_words = ic as usize + dc as usize;
    if total_words > MAX_IMAGE_WORDS {
        return Err(Error::RamOverflow { requested: total_words });
    }

    Ok(FirstPassOutput { symbols, refs, lines })
}

fn validate_label(name: &str, macro_names: &HashSet<String>, statement: &Statement) -> Result<(), Error> {
    let mut chars = name.chars();
    let starts_with_letter = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic());
    let rest_is_alnum = chars.clone().all(|c| c.is_ascii_alphanumeric());
    let collides_with_reserved = RESERVED_NAMES.contains(&name) || macro_names.contains(name);
    if !starts_with_letter || !rest_is_alnum || name.len() > MAX_LABEL_LEN || collides_with_reserved {
        return Err(Error::InvalidLabel { label: name.to_string(), line_number: statement.line_number, line: statement.line.clone() });
    }
    Ok(())
}

fn duplicate_label(name: &str, statement: &Statement) -> Error {
    Error::DuplicateLabel { label: name.to_string(), line_number: statement.line_number, line: statement.line.clone() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(expanded: &str) -> Result<FirstPassOutput, Error> {
        super::run(expanded, &HashSet::new())
    }

    #[test]
    fn sizes_a_two_operand_instruction_as_three_words() {
        let out = run("mov r3, LIST\nLIST: .data 1").unwrap();
        assert_eq!(out.lines.len(), 2);
        match &out.lines[0] {
            ParsedLine::Instruction { address, .. } => assert_eq!(*address, IC_INIT),
            _ => panic!("expected instruction"),
        }
        // a lone register operand still gets its own extension word, so
        // `mov r3, LIST` occupies 3 words and LIST lands at IC_INIT + 3.
        assert_eq!(out.symbols.get("LIST").unwrap().address, IC_INIT + 3);
    }

    #[test]
    fn assigns_code_and_data_addresses() {
        let out = run("LOOP: mov r1, r2\nVALS: .data 1, 2, 3").unwrap();
        assert_eq!(out.symbols.get("LOOP").unwrap().address, IC_INIT);
        assert_eq!(out.symbols.get("VALS").unwrap().kind, SymbolKind::Data);
    }

    #[test]
    fn rejects_duplicate_label() {
        let err = run("A: .data 1\nA: .data 2\n");
        assert!(matches!(err, Err(Error::DuplicateLabel { .. })));
    }

    #[test]
    fn rejects_oversized_label() {
        let long_name = "x".repeat(MAX_LABEL_LEN + 5);
        let src = format!("{long_name}: .data 1\n");
        assert!(matches!(run(&src), Err(Error::InvalidLabel { .. })));
    }

    #[test]
    fn label_before_entry_is_ignored_without_error() {
        let out = run("FOO: .entry FOO\nFOO2: mov r1, r2\n");
        // FOO labeling an .entry line is simply ignored; only FOO2 is defined.
        assert!(out.is_ok());
        let out = out.unwrap();
        assert!(!out.symbols.contains("FOO"));
        assert!(out.symbols.contains("FOO2"));
    }

    #[test]
    fn extern_declares_a_symbol_with_zero_address() {
        let out = run(".extern EXT\nmov EXT, r1\n").unwrap();
        let sym = out.symbols.get("EXT").unwrap();
        assert_eq!(sym.kind, SymbolKind::Extern);
        assert_eq!(sym.address, 0);
    }

    #[test]
    fn overly_long_line_is_rejected() {
        let src = format!("mov r1, {}\n", "A".repeat(MAX_LINE_LEN));
        assert!(matches!(run(&src), Err(Error::LineTooLong { .. })));
    }

    #[test]
    fn rejects_label_colliding_with_macro_name() {
        use crate::assembler::preprocessor;
        let expanded = preprocessor::process("macr m\nmov r1, r2\nendmacr\nm: mov r1, r2\n").unwrap();
        assert!(matches!(
            super::run(&expanded.source, &expanded.macro_names),
            Err(Error::InvalidLabel { .. })
        ));
    }
}
