//! The opcode table and addressing-mode parsing shared by both passes.

use crate::assembler::statement::{Operand, Statement};
use crate::assembler::Error;

/// Addressing-mode "lamp" bits, as they appear in a code word's
/// `src_mode`/`dest_mode` fields.
pub const MODE_IMMEDIATE: u8 = 1;
pub const MODE_DIRECT: u8 = 2;
pub const MODE_RELATIVE: u8 = 4;
pub const MODE_REGISTER: u8 = 8;

/// A parsed operand, already classified into one of the four addressing modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressingMode {
    /// `#N` — a literal integer.
    Immediate(i32),
    /// A bare label name.
    Direct(String),
    /// `*rN` — indirect through a register.
    Relative(u8),
    /// `rN` — a register operand.
    Register(u8),
}

impl AddressingMode {
    /// The addressing-mode bit this operand occupies in a code word.
    pub fn mode_bit(&self) -> u8 {
        match self {
            AddressingMode::Immediate(_) => MODE_IMMEDIATE,
            AddressingMode::Direct(_) => MODE_DIRECT,
            AddressingMode::Relative(_) => MODE_RELATIVE,
            AddressingMode::Register(_) => MODE_REGISTER,
        }
    }

    /// True for [`AddressingMode::Register`] and [`AddressingMode::Relative`],
    /// the two modes that pack into a shared extension word when both
    /// operands use one of them.
    pub fn is_register_like(&self) -> bool {
        matches!(self, AddressingMode::Register(_) | AddressingMode::Relative(_))
    }
}

/// Parse one operand lexeme into its addressing mode.
///
/// Mirrors the reference implementation's `get_addressing_type`: a token
/// starting with `r` followed by a single digit 0-7 and nothing else is a
/// register; `r` followed by anything else falls through to a direct label
/// reference (a label may legally start with the letter `r`).
pub fn parse_addressing_mode(operand: &Operand) -> Result<AddressingMode, Error> {
    let text = operand.text.as_str();

    if let Some(rest) = text.strip_prefix('#') {
        return parse_signed_int(rest)
            .map(AddressingMode::Immediate)
            .ok_or_else(|| invalid_operand(operand));
    }

    if let Some(rest) = text.strip_prefix('*') {
        return parse_register_digits(rest)
            .map(AddressingMode::Relative)
            .ok_or_else(|| invalid_operand(operand));
    }

    if let Some(register) = parse_register_digits(text) {
        return Ok(AddressingMode::Register(register));
    }

    if is_label_like(text) {
        return Ok(AddressingMode::Direct(text.to_string()));
    }

    Err(invalid_operand(operand))
}

fn parse_signed_int(s: &str) -> Option<i32> {
    if s.is_empty() {
        return None;
    }
    s.parse::<i32>().ok()
}

fn parse_register_digits(s: &str) -> Option<u8> {
    let mut chars = s.chars();
    let r = chars.next()?;
    if r != 'r' {
        return None;
    }
    let digit = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    let n = digit.to_digit(10)?;
    if n <= 7 { Some(n as u8) } else { None }
}

fn is_label_like(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric())
}

fn invalid_operand(operand: &Operand) -> Error {
    Error::InvalidOperand {
        operand: operand.text.clone(),
        operand_span: operand.span,
        line_number: 0,
        line: String::new(),
    }
}

/// One of the sixteen fixed mnemonics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Mov, Cmp, Add, Sub, Lea,
    Clr, Not, Inc, Dec, Jmp, Bne, Red, Prn, Jsr,
    Rts, Stop,
}

impl Opcode {
    pub fn from_mnemonic(s: &str) -> Option<Opcode> {
        Some(match s.to_ascii_lowercase().as_str() {
            "mov" => Opcode::Mov,
            "cmp" => Opcode::Cmp,
            "add" => Opcode::Add,
            "sub" => Opcode::Sub,
            "lea" => Opcode::Lea,
            "clr" => Opcode::Clr,
            "not" => Opcode::Not,
            "inc" => Opcode::Inc,
            "dec" => Opcode::Dec,
            "jmp" => Opcode::Jmp,
            "bne" => Opcode::Bne,
            "red" => Opcode::Red,
            "prn" => Opcode::Prn,
            "jsr" => Opcode::Jsr,
            "rts" => Opcode::Rts,
            "stop" => Opcode::Stop,
            _ => return None,
        })
    }

    pub fn value(&self) -> u8 {
        match self {
            Opcode::Mov => 0,
            Opcode::Cmp => 1,
            Opcode::Add => 2,
            Opcode::Sub => 3,
            Opcode::Lea => 4,
            Opcode::Clr => 5,
            Opcode::Not => 6,
            Opcode::Inc => 7,
            Opcode::Dec => 8,
            Opcode::Jmp => 9,
            Opcode::Bne => 10,
            Opcode::Red => 11,
            Opcode::Prn => 12,
            Opcode::Jsr => 13,
            Opcode::Rts => 14,
            Opcode::Stop => 15,
        }
    }

    pub fn operand_count(&self) -> usize {
        match self {
            Opcode::Mov | Opcode::Cmp | Opcode::Add | Opcode::Sub | Opcode::Lea => 2,
            Opcode::Clr | Opcode::Not | Opcode::Inc | Opcode::Dec
            | Opcode::Jmp | Opcode::Bne | Opcode::Red | Opcode::Prn | Opcode::Jsr => 1,
            Opcode::Rts | Opcode::Stop => 0,
        }
    }

    /// Addressing modes legal for the source operand, as an OR of mode bits.
    /// Zero for single- and zero-operand opcodes, which have no source operand.
    pub fn allowed_src_modes(&self) -> u8 {
        match self {
            Opcode::Mov | Opcode::Cmp | Opcode::Add | Opcode::Sub =>
                MODE_IMMEDIATE | MODE_DIRECT | MODE_RELATIVE | MODE_REGISTER,
            Opcode::Lea => MODE_DIRECT,
            _ => 0,
        }
    }

    /// Addressing modes legal for the destination operand (or the sole
    /// operand of a single-operand instruction), as an OR of mode bits.
    pub fn allowed_dest_modes(&self) -> u8 {
        match self {
            Opcode::Mov | Opcode::Add | Opcode::Sub | Opcode::Lea =>
                MODE_DIRECT | MODE_RELATIVE | MODE_REGISTER,
            Opcode::Cmp | Opcode::Prn =>
                MODE_IMMEDIATE | MODE_DIRECT | MODE_RELATIVE | MODE_REGISTER,
            Opcode::Clr | Opcode::Not | Opcode::Inc | Opcode::Dec | Opcode::Red =>
                MODE_DIRECT | MODE_RELATIVE | MODE_REGISTER,
            Opcode::Jmp | Opcode::Bne | Opcode::Jsr => MODE_DIRECT | MODE_RELATIVE,
            Opcode::Rts | Opcode::Stop => 0,
        }
    }
}

/// Parsed and mode-classified operands for one instruction line: `(src, dest)`.
///
/// A single-operand instruction's operand occupies `dest`, per §4.2/§9 — the
/// sizing and encoding routines both key off the *destination* allowed-mode
/// list for one-operand opcodes.
pub struct InstructionOperands {
    pub src: Option<AddressingMode>,
    pub dest: Option<AddressingMode>,
}

/// Parse and validate an instruction line's operand count, addressing modes,
/// and per-opcode legality, producing both the classified operands and a
/// ready-made legality error on mismatch.
pub fn parse_instruction_operands(statement: &Statement, opcode: Opcode) -> Result<InstructionOperands, Error> {
    let expected = opcode.operand_count();
    if statement.n_operands() != expected {
        return Err(statement.invalid_operand_count(statement.n_operands(), &[expected]));
    }

    match expected {
        0 => Ok(InstructionOperands { src: None, dest: None }),
        1 => {
            let operand = statement.operand(0)?;
            let mode = parse_addressing_mode(operand).map_err(|_| line_context(statement, operand))?;
            if mode.mode_bit() & opcode.allowed_dest_modes() == 0 {
                return Err(illegal_mode(statement, operand));
            }
            Ok(InstructionOperands { src: None, dest: Some(mode) })
        }
        2 => {
            let src_operand = statement.operand(0)?;
            let dest_operand = statement.operand(1)?;
            let src_mode = parse_addressing_mode(src_operand).map_err(|_| line_context(statement, src_operand))?;
            let dest_mode = parse_addressing_mode(dest_operand).map_err(|_| line_context(statement, dest_operand))?;
            if src_mode.mode_bit() & opcode.allowed_src_modes() == 0 {
                return Err(illegal_mode(statement, src_operand));
            }
            if dest_mode.mode_bit() & opcode.allowed_dest_modes() == 0 {
                return Err(illegal_mode(statement, dest_operand));
            }
            Ok(InstructionOperands { src: Some(src_mode), dest: Some(dest_mode) })
        }
        _ => unreachable!("no opcode takes more than two operands"),
    }
}

fn line_context(statement: &Statement, operand: &Operand) -> Error {
    Error::InvalidOperand {
        operand: operand.text.clone(),
        operand_span: operand.span,
        line_number: statement.line_number,
        line: statement.line.clone(),
    }
}

fn illegal_mode(statement: &Statement, operand: &Operand) -> Error {
    Error::IllegalAddressingMode {
        instruction: statement.keyword.clone(),
        operand_span: operand.span,
        line_number: statement.line_number,
        line: statement.line.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::statement::{Operand, TokenSpan};

    fn op(text: &str) -> Operand {
        Operand { text: text.to_string(), span: TokenSpan::new(0, text.len()) }
    }

    #[test]
    fn parses_immediate() {
        assert_eq!(parse_addressing_mode(&op("#5")).unwrap(), AddressingMode::Immediate(5));
        assert_eq!(parse_addressing_mode(&op("#-5")).unwrap(), AddressingMode::Immediate(-5));
    }

    #[test]
    fn parses_register() {
        assert_eq!(parse_addressing_mode(&op("r3")).unwrap(), AddressingMode::Register(3));
    }

    #[test]
    fn parses_relative() {
        assert_eq!(parse_addressing_mode(&op("*r7")).unwrap(), AddressingMode::Relative(7));
    }

    #[test]
    fn register_out_of_range_falls_back_to_direct() {
        assert_eq!(parse_addressing_mode(&op("r9")).unwrap(), AddressingMode::Direct("r9".to_string()));
    }

    #[test]
    fn parses_direct_label() {
        assert_eq!(parse_addressing_mode(&op("LIST")).unwrap(), AddressingMode::Direct("LIST".to_string()));
    }

    #[test]
    fn rejects_malformed_immediate() {
        assert!(parse_addressing_mode(&op("#abc")).is_err());
    }
}
