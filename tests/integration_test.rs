use assembler::assembler::codegen_utils::{encode_code_word, encode_shared_register_word};
use assembler::assembler::writer::{write_ent_to, write_ob_to, write_ext_to};
use assembler::assembler::{assemble_file, assemble_str, Error, IC_INIT};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};

static SEQ: AtomicUsize = AtomicUsize::new(0);

/// Produce a unique basename under the system temp directory so parallel
/// test runs never collide on the same `.as`/`.am`/`.ob` files.
fn temp_basename(tag: &str) -> String {
    let n = SEQ.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("assembler_test_{tag}_{n}")).to_str().unwrap().to_string()
}

#[test]
fn two_register_instruction() {
    let assembled = assemble_str("MAIN: mov r3, r4").unwrap();
    assert_eq!(assembled.code_image.len(), 2);
    assert_eq!(assembled.data_image.len(), 0);
    assert_eq!(assembled.code_image[0], encode_code_word(0, 8, 8));
    assert_eq!(assembled.code_image[1], encode_shared_register_word(3, 4));

    let mut buf = Vec::new();
    write_ob_to(&mut buf, &assembled).unwrap();
    assert_eq!(String::from_utf8(buf).unwrap().lines().next().unwrap(), "2 0");
}

#[test]
fn immediate_and_label_reference() {
    let assembled = assemble_str("LIST: .data 7, -1\nadd #5, LIST").unwrap();
    assert_eq!(assembled.data_image, vec![7, 32767]);
    assert_eq!(assembled.code_image.len(), 3);
    let list_addr = IC_INIT + assembled.code_image.len() as u16;
    // the destination extension word carries ARE=2 (relocatable) and LIST's address as payload
    let expected_dest_word = ((list_addr & 0xFFF) << 3) | 2;
    assert_eq!(assembled.code_image[2], expected_dest_word);
}

#[test]
fn extern_use_is_recorded() {
    let assembled = assemble_str(".extern EXT\njmp EXT").unwrap();
    assert_eq!(assembled.code_image.len(), 2);
    assert_eq!(assembled.code_image[1], 1); // ARE=1 (external), payload=0
    assert_eq!(assembled.ext_uses, vec![("EXT".to_string(), IC_INIT + 1)]);

    let mut buf = Vec::new();
    write_ext_to(&mut buf, &assembled).unwrap();
    assert_eq!(String::from_utf8(buf).unwrap(), format!("EXT {:04}\n", IC_INIT + 1));
}

#[test]
fn string_directive_layout() {
    let assembled = assemble_str(r#"S: .string "ab""#).unwrap();
    assert_eq!(assembled.data_image, vec![97, 98, 0]);
    assert_eq!(assembled.dc_final(), 3);
}

#[test]
fn entries_are_written_in_reverse_declaration_order() {
    let assembled = assemble_str("A: mov r1, r2\nB: mov r2, r1\n.entry A\n.entry B").unwrap();
    let mut buf = Vec::new();
    write_ent_to(&mut buf, &assembled).unwrap();
    let out = String::from_utf8(buf).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert!(lines[0].starts_with('B'));
    assert!(lines[1].starts_with('A'));
}

#[test]
fn macro_is_expanded_at_each_call_site() {
    let source = "macr M\nmov r1, r2\nadd r1, r2\nendmacr\nM\nM\nstop";
    let expanded = assembler::assembler::preprocessor::process(source).unwrap();
    assert_eq!(expanded.source.lines().count(), 5); // 2 calls * 2 body lines + stop
    let assembled = assemble_str(&expanded.source).unwrap();
    // 4 two-register instructions (2 words each) + stop (1 word) = 9 words
    assert_eq!(assembled.code_image.len(), 9);
}

#[test]
fn ram_overflow_is_rejected() {
    let mut source = String::new();
    for i in 0..4100 {
        source.push_str(&format!(".data {}\n", i % 10));
    }
    assert!(matches!(assemble_str(&source), Err(Error::RamOverflow { .. })));
}

#[test]
fn label_colliding_with_macro_name_is_rejected_end_to_end() {
    let base = temp_basename("macro_label_collision");
    fs::write(format!("{base}.as"), "macr m\nmov r1, r2\nendmacr\nm: mov r1, r2\n").unwrap();

    assert!(matches!(assemble_file(&base), Err(Error::InvalidLabel { .. })));

    let _ = fs::remove_file(format!("{base}.as"));
}

#[test]
fn cleanup_on_failure_leaves_no_output_files() {
    let base = temp_basename("cleanup");
    fs::write(format!("{base}.as"), "mov r1, r2\nbadopcode r1, r2\n").unwrap();

    let result = assemble_file(&base);
    assert!(result.is_err());

    for suffix in [".am", ".ob", ".ent", ".ext"] {
        assert!(!std::path::Path::new(&format!("{base}{suffix}")).exists());
    }
    let _ = fs::remove_file(format!("{base}.as"));
}

#[test]
fn successful_file_produces_ob_and_cleans_up_am() {
    let base = temp_basename("success");
    fs::write(format!("{base}.as"), "MAIN: mov r1, r2\nstop\n.entry MAIN\n").unwrap();

    assemble_file(&base).unwrap();

    assert!(std::path::Path::new(&format!("{base}.ob")).exists());
    assert!(std::path::Path::new(&format!("{base}.ent")).exists());
    assert!(!std::path::Path::new(&format!("{base}.ext")).exists());

    for suffix in [".as", ".am", ".ob", ".ent"] {
        let _ = fs::remove_file(format!("{base}{suffix}"));
    }
}
