//! Encodes each sized line from the first pass into its final machine words,
//! resolving symbol references and collecting extern uses along the way.

use crate::assembler::codegen_utils::{
    encode_code_word, encode_data_literal, encode_ext_word, encode_shared_register_word, encode_single_register_word,
    twos_complement, ARE_ABSOLUTE, ARE_EXTERNAL, ARE_RELOCATABLE,
};
use crate::assembler::first_pass::{FirstPassOutput, ParsedLine};
use crate::assembler::instructions::AddressingMode;
use crate::assembler::statement::Statement;
use crate::assembler::{Address, Assembled, Error, ExternUses, SymbolKind, IC_INIT};

/// Run the second pass: encode every instruction and directive, then resolve
/// `.entry` declarations against the finished symbol table.
///
/// Takes `built` mutably so each resolved `.entry` name can flip its
/// symbol's `is_entry` flag, not just get copied into [`Assembled::entries`].
pub fn run(built: &mut FirstPassOutput) -> Result<Assembled, Error> {
    let mut code_image: Vec<u16> = Vec::new();
    let mut data_image: Vec<u16> = Vec::new();
    let mut ext_uses: ExternUses = Vec::new();

    for line in &built.lines {
        match line {
            ParsedLine::Instruction { opcode, operands, statement, .. } => {
                let src_mode = operands.src.as_ref().map(|m| m.mode_bit()).unwrap_or(0);
                let dest_mode = operands.dest.as_ref().map(|m| m.mode_bit()).unwrap_or(0);
                code_image.push(encode_code_word(opcode.value(), src_mode, dest_mode));

                let operand_index_for = |is_src: bool| if operands.src.is_some() && operands.dest.is_some() {
                    if is_src { 0 } else { 1 }
                } else {
                    0
                };

                match (&operands.src, &operands.dest) {
                    (Some(src), Some(dest)) if src.is_register_like() && dest.is_register_like() => {
                        let src_reg = register_number(src);
                        let dest_reg = register_number(dest);
                        code_image.push(encode_shared_register_word(src_reg, dest_reg));
                    }
                    (src, dest) => {
                        if let Some(src) = src {
                            push_operand_word(
                                &mut code_image,
                                &mut ext_uses,
                                built,
                                statement,
                                operand_index_for(true),
                                src,
                                true,
                            )?;
                        }
                        if let Some(dest) = dest {
                            push_operand_word(
                                &mut code_image,
                                &mut ext_uses,
                                built,
                                statement,
                                operand_index_for(false),
                                dest,
                                false,
                            )?;
                        }
                    }
                }
            }
            ParsedLine::Data { values } => {
                for value in values {
                    data_image.push(encode_data_literal(*value));
                }
            }
            ParsedLine::Str { text } => {
                for byte in text.bytes() {
                    data_image.push(encode_data_literal(byte as i32));
                }
                data_image.push(0);
            }
        }
    }

    let mut entries = Vec::with_capacity(built.refs.entries.len());
    for name in &built.refs.entries {
        let symbol = built
            .symbols
            .get_mut(name)
            .ok_or_else(|| Error::UnresolvedEntry { name: name.clone() })?;
        symbol.is_entry = true;
        entries.push((name.clone(), symbol.address));
    }

    Ok(Assembled { code_image, data_image, entries, ext_uses })
}

fn register_number(mode: &AddressingMode) -> u8 {
    match mode {
        AddressingMode::Register(r) | AddressingMode::Relative(r) => *r,
        _ => unreachable!("register_number called on a non register-like operand"),
    }
}

fn push_operand_word(
    code_image: &mut Vec<u16>,
    ext_uses: &mut ExternUses,
    built: &FirstPassOutput,
    statement: &Statement,
    operand_index: usize,
    mode: &AddressingMode,
    is_source: bool,
) -> Result<(), Error> {
    match mode {
        AddressingMode::Register(r) | AddressingMode::Relative(r) => {
            code_image.push(encode_single_register_word(*r, is_source))
        }
        AddressingMode::Immediate(value) => {
            if !(-2048..=2047).contains(value) {
                let operand = &statement.operands[operand_index];
                return Err(Error::ArgumentOverflow {
                    value: *value,
                    operand_span: operand.span,
                    max_bits: 12,
                    line_number: statement.line_number,
                    line: statement.line.clone(),
                });
            }
            code_image.push(encode_ext_word(twos_complement(*value, 12), ARE_ABSOLUTE))
        }
        AddressingMode::Direct(name) => {
            let symbol = built.symbols.get(name).ok_or_else(|| {
                let operand = &statement.operands[operand_index];
                Error::UnknownSymbol {
                    name: name.clone(),
                    operand_span: operand.span,
                    line_number: statement.line_number,
                    line: statement.line.clone(),
                }
            })?;
            let use_address = IC_INIT + code_image.len() as Address;
            if symbol.kind == SymbolKind::Extern {
                ext_uses.push((name.clone(), use_address));
                code_image.push(encode_ext_word(0, ARE_EXTERNAL));
            } else {
                code_image.push(encode_ext_word(symbol.address, ARE_RELOCATABLE));
            }
        }
    }
    Ok(())
}
