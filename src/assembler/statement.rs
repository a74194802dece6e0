//! Lexing a single expanded source line into a label, a keyword (opcode or
//! directive name), and a comma-separated list of operand lexemes.

use regex::Regex;
use crate::assembler::Error;

/// A span of text in the source line. Used to neatly underline errors.
#[derive(Debug, Clone, Copy)]
pub struct TokenSpan {
    start: usize,
    end: usize,
}

impl TokenSpan {
    pub fn new(start: usize, end: usize) -> TokenSpan {
        TokenSpan { start, end }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }
}

/// One operand lexeme together with the span it occupies in the source line.
#[derive(Debug, Clone)]
pub struct Operand {
    pub text: String,
    pub span: TokenSpan,
}

/// A line lexed into its label (if any), keyword, and operand list.
#[derive(Debug, Clone)]
pub struct Statement {
    pub label: Option<String>,
    pub keyword: String,
    pub keyword_span: TokenSpan,
    pub operands: Vec<Operand>,
    pub line_number: usize,
    pub line: String,
}

impl Statement {
    pub fn n_operands(&self) -> usize {
        self.operands.len()
    }

    pub fn operand(&self, index: usize) -> Result<&Operand, Error> {
        self.operands
            .get(index)
            .ok_or_else(|| self.invalid_operand_count(self.operands.len(), &[index + 1]))
    }

    pub fn assert_n_operands(&self, n: usize) -> Result<(), Error> {
        if self.operands.len() != n {
            return Err(self.invalid_operand_count(self.operands.len(), &[n]));
        }
        Ok(())
    }

    pub fn invalid_operand(&self, index: usize) -> Error {
        Error::InvalidOperand {
            operand: self.operands[index].text.clone(),
            operand_span: self.operands[index].span,
            line_number: self.line_number,
            line: self.line.clone(),
        }
    }

    pub fn invalid_operand_count(&self, n_operands: usize, expected: &[usize]) -> Error {
        let max_expected = *expected.iter().max().unwrap_or(&0);
        let extra_operand_spans = self
            .operands
            .get(max_expected..)
            .unwrap_or(&[])
            .iter()
            .map(|o| o.span)
            .collect();
        Error::InvalidOperandCount {
            instruction: self.keyword.clone(),
            n_operands,
            expected: expected.to_vec(),
            extra_operand_spans,
            line_number: self.line_number,
            line: self.line.clone(),
        }
    }
}

/// Lex one already macro-expanded, already-length-checked, non-blank source
/// line into a [`Statement`].
///
/// `line_number` is the *pre-expansion* source line number, used only for
/// diagnostics.
pub fn parse_line(line_number: usize, raw_line: &str) -> Result<Statement, Error> {
    let trimmed_start = raw_line.len() - raw_line.trim_start().len();
    let content = raw_line.trim();

    let first_ws = content.find(char::is_whitespace).unwrap_or(content.len());
    let first_token = &content[..first_ws];

    let (label, rest_start) = if first_token.ends_with(':') && first_token.len() > 1 {
        (Some(first_token[..first_token.len() - 1].to_string()), trimmed_start + first_ws)
    } else {
        (None, trimmed_start)
    };

    let rest = &raw_line[rest_start..];
    let re = Regex::new(r#""[^"]*"|[^,\s]+"#).unwrap();
    let mut matches = re.find_iter(rest);

    let keyword_match = matches.next().ok_or_else(|| Error::UnknownInstruction {
        instruction: String::new(),
        instruction_span: TokenSpan::new(rest_start, rest_start),
        line_number,
        line: raw_line.to_string(),
    })?;

    let keyword = keyword_match.as_str().to_string();
    let keyword_span = TokenSpan::new(rest_start + keyword_match.start(), rest_start + keyword_match.end());
    let operand_region_start = rest_start + keyword_match.end();

    validate_comma_placement(&raw_line[operand_region_start..], line_number, raw_line)?;

    let mut operands = Vec::new();
    for m in matches {
        operands.push(Operand {
            text: m.as_str().to_string(),
            span: TokenSpan::new(rest_start + m.start(), rest_start + m.end()),
        });
    }

    Ok(Statement { label, keyword, keyword_span, operands, line_number, line: raw_line.to_string() })
}

/// Port of the reference implementation's `validate_commas`: walks the
/// operand region character by character, rejecting a comma that opens the
/// list, closes it, or follows another comma. Commas inside a `"..."`
/// string literal are ignored.
fn validate_comma_placement(operand_region: &str, line_number: usize, line: &str) -> Result<(), Error> {
    let mut expecting_operand = true;
    let mut prev_was_comma = false;
    let mut in_string = false;

    for c in operand_region.chars() {
        if c == '"' {
            in_string = !in_string;
            expecting_operand = false;
            prev_was_comma = false;
        } else if c == ',' && !in_string {
            if expecting_operand || prev_was_comma {
                return Err(Error::InvalidCommaPlacement { line_number, line: line.to_string() });
            }
            expecting_operand = true;
            prev_was_comma = true;
        } else if in_string || c.is_whitespace() {
            // no-op: whitespace and string contents don't affect the state machine
        } else {
            expecting_operand = false;
            prev_was_comma = false;
        }
    }

    if prev_was_comma {
        return Err(Error::InvalidCommaPlacement { line_number, line: line.to_string() });
    }

    Ok(())
}
