//! Parsing for the four assembler directives: `.data`, `.string`,
//! `.entry`, `.extern`.

use crate::assembler::statement::Statement;
use crate::assembler::Error;

/// True if `keyword` names one of the four directives (as opposed to an
/// instruction mnemonic).
pub fn is_directive(keyword: &str) -> bool {
    matches!(keyword, ".data" | ".string" | ".entry" | ".extern")
}

/// Parse a `.data` directive's comma-separated integer list. Comma
/// placement has already been validated by [`crate::assembler::statement::parse_line`].
pub fn parse_data_values(statement: &Statement) -> Result<Vec<i32>, Error> {
    if statement.n_operands() == 0 {
        return Err(statement.invalid_operand_count(0, &[1]));
    }
    statement
        .operands
        .iter()
        .map(|operand| {
            let value = operand.text.parse::<i32>().map_err(|_| Error::InvalidOperand {
                operand: operand.text.clone(),
                operand_span: operand.span,
                line_number: statement.line_number,
                line: statement.line.clone(),
            })?;
            if !(-16384..=16383).contains(&value) {
                return Err(Error::ArgumentOverflow {
                    value,
                    operand_span: operand.span,
                    max_bits: 15,
                    line_number: statement.line_number,
                    line: statement.line.clone(),
                });
            }
            Ok(value)
        })
        .collect()
}

/// Parse a `.string` directive's single quoted argument, returning the
/// string's content (without the surrounding quotes).
pub fn parse_string_literal(statement: &Statement) -> Result<String, Error> {
    statement.assert_n_operands(1)?;
    let operand = statement.operand(0)?;
    let text = operand.text.as_str();
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        Ok(text[1..text.len() - 1].to_string())
    } else {
        Err(Error::InvalidOperand {
            operand: text.to_string(),
            operand_span: operand.span,
            line_number: statement.line_number,
            line: statement.line.clone(),
        })
    }
}

/// Parse a `.entry`/`.extern` directive's comma-separated list of symbol names.
pub fn parse_directive_symbols(statement: &Statement) -> Result<Vec<String>, Error> {
    if statement.n_operands() == 0 {
        return Err(statement.invalid_operand_count(0, &[1]));
    }
    Ok(statement.operands.iter().map(|operand| operand.text.clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::statement::parse_line;

    #[test]
    fn parses_data_values_with_negatives() {
        let statement = parse_line(1, ".data 7, -3, 0").unwrap();
        assert_eq!(parse_data_values(&statement).unwrap(), vec![7, -3, 0]);
    }

    #[test]
    fn rejects_non_numeric_data_value() {
        let statement = parse_line(1, ".data 7, abc").unwrap();
        assert!(parse_data_values(&statement).is_err());
    }

    #[test]
    fn rejects_data_value_outside_fifteen_bit_range() {
        let statement = parse_line(1, ".data 99999").unwrap();
        assert!(matches!(parse_data_values(&statement), Err(Error::ArgumentOverflow { .. })));
    }

    #[test]
    fn parses_string_literal_content() {
        let statement = parse_line(1, r#".string "hello""#).unwrap();
        assert_eq!(parse_string_literal(&statement).unwrap(), "hello");
    }

    #[test]
    fn rejects_string_without_quotes() {
        let statement = parse_line(1, ".string hello").unwrap();
        assert!(parse_string_literal(&statement).is_err());
    }

    #[test]
    fn parses_entry_symbol_name() {
        let statement = parse_line(1, ".entry LIST").unwrap();
        assert_eq!(parse_directive_symbols(&statement).unwrap(), vec!["LIST".to_string()]);
    }

    #[test]
    fn parses_multiple_entry_symbol_names() {
        let statement = parse_line(1, ".entry LIST, COUNT").unwrap();
        assert_eq!(parse_directive_symbols(&statement).unwrap(), vec!["LIST".to_string(), "COUNT".to_string()]);
    }
}
