//! Comment stripping and macro expansion, conceptually producing the `.am`
//! file as an in-memory string.

use std::collections::{HashMap, HashSet};

use crate::assembler::Error;

pub(crate) const RESERVED_NAMES: &[&str] = &[
    "mov", "cmp", "add", "sub", "lea", "clr", "not", "inc", "dec", "jmp", "bne", "red", "prn",
    "jsr", "rts", "stop", "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7",
];

fn is_valid_macro_name(name: &str) -> bool {
    !name.is_empty() && !RESERVED_NAMES.contains(&name)
}

/// The macro-expanded source plus the set of macro names that were defined
/// while expanding it, so a later stage can reject a label that collides
/// with one.
pub struct Preprocessed {
    pub source: String,
    pub macro_names: HashSet<String>,
}

/// Strip comments and macro definitions from `source`, expanding each macro
/// invocation into its stored body, and return the expanded source together
/// with the set of macro names it defined.
///
/// A macro invocation is recognized only as the first token of a line (after
/// any label); the expanded body is not re-scanned for further invocations.
pub fn process(source: &str) -> Result<Preprocessed, Error> {
    let mut macros: HashMap<String, Vec<String>> = HashMap::new();
    let mut output_lines: Vec<String> = Vec::new();

    let mut open_macro: Option<(String, Vec<String>)> = None;

    for (index, raw_line) in source.lines().enumerate() {
        let line_number = index + 1;
        let stripped = raw_line.splitn(2, ';').next().unwrap_or("");
        let trimmed = stripped.trim();

        if trimmed.is_empty() {
            continue;
        }

        let mut words = trimmed.split_whitespace();
        let first = words.next().unwrap_or("");

        if first == "macr" {
            if open_macro.is_some() {
                return Err(Error::MalformedMacro { line_number, line: raw_line.to_string() });
            }
            let name = words.next().unwrap_or("").to_string();
            if !is_valid_macro_name(&name) {
                return Err(Error::InvalidMacroName { name, line_number, line: raw_line.to_string() });
            }
            open_macro = Some((name, Vec::new()));
            continue;
        }

        if first == "endmacr" {
            let (name, body) = open_macro
                .take()
                .ok_or_else(|| Error::MalformedMacro { line_number, line: raw_line.to_string() })?;
            macros.insert(name, body);
            continue;
        }

        if let Some((_, body)) = open_macro.as_mut() {
            body.push(raw_line.to_string());
            continue;
        }

        // A label may prefix an invocation ("LOOP: m"); the candidate macro
        // name is then the second token, and the label is spliced in front
        // of the expanded body's first line.
        let (label_prefix, candidate) = if first.ends_with(':') && first.len() > 1 {
            let after_label = trimmed[first.len()..].trim_start();
            let candidate = after_label.split_whitespace().next().unwrap_or("");
            (Some(first), candidate)
        } else {
            (None, first)
        };

        if let Some(body) = macros.get(candidate) {
            let mut body_lines = body.iter();
            match (label_prefix, body_lines.next()) {
                (Some(label), Some(first_body_line)) => {
                    output_lines.push(format!("{label} {first_body_line}"));
                }
                (Some(label), None) => output_lines.push(label.to_string()),
                (None, Some(first_body_line)) => output_lines.push(first_body_line.clone()),
                (None, None) => {}
            }
            for body_line in body_lines {
                output_lines.push(body_line.clone());
            }
            continue;
        }

        output_lines.push(trimmed.to_string());
    }

    if open_macro.is_some() {
        return Err(Error::MalformedMacro { line_number: source.lines().count(), line: String::new() });
    }

    Ok(Preprocessed { source: output_lines.join("\n"), macro_names: macros.into_keys().collect() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_comments_and_blank_lines() {
        let src = "; a comment\nmov r1, r2 ; trailing\n\n";
        assert_eq!(process(src).unwrap().source, "mov r1, r2");
    }

    #[test]
    fn expands_simple_macro() {
        let src = "macr m\nmov r1, r2\nadd r1, r2\nendmacr\nm\nstop";
        let out = process(src).unwrap();
        assert_eq!(out.source, "mov r1, r2\nadd r1, r2\nstop");
        assert!(out.macro_names.contains("m"));
    }

    #[test]
    fn rejects_macro_named_like_an_opcode() {
        let src = "macr mov\nstop\nendmacr\n";
        assert!(matches!(process(src), Err(Error::InvalidMacroName { .. })));
    }

    #[test]
    fn rejects_endmacr_without_open_macro() {
        let src = "endmacr\n";
        assert!(matches!(process(src), Err(Error::MalformedMacro { .. })));
    }

    #[test]
    fn rejects_unterminated_macro() {
        let src = "macr m\nmov r1, r2\n";
        assert!(matches!(process(src), Err(Error::MalformedMacro { .. })));
    }

    #[test]
    fn macro_body_is_not_rescanned_for_nested_invocation() {
        let src = "macr inner\nstop\nendmacr\nmacr outer\ninner\nendmacr\nouter";
        // "outer" expands to the literal line "inner", which is NOT expanded again.
        assert_eq!(process(src).unwrap().source, "inner");
    }
}
