//! Integration tests for generated bytecode
//!
//! These tests inspect compiled programs through the public API:
//! - Exact bytecode for small grammars
//! - Disassembly listings
//! - Program serialization

use pegc::compiler::opcodes::{decompile, Opcode};
use pegc::prelude::*;
use pegc::runtime::Const;

fn program(b: GrammarBuilder) -> Program {
    let options = CompileOptions::default().with_optimize(Optimize::Size);
    compile(b.build(), options, None)
        .unwrap()
        .parser
        .unwrap()
        .program()
        .clone()
}

// ============================================================================
// Exact Bytecode
// ============================================================================

#[test]
fn test_literal_bytecode() {
    let p = program(GrammarBuilder::new().rule("start", lit("a")));

    // MATCH_STRING "a" [ACCEPT_STRING "a"] [FAIL expected]
    assert_eq!(p.rules[0].bytecode, vec![16, 0, 2, 2, 20, 0, 21, 1]);
}

#[test]
fn test_choice_bytecode() {
    let p = program(GrammarBuilder::new().rule("start", choice(vec![lit("a"), lit("b")])));

    assert_eq!(
        p.rules[0].bytecode,
        vec![16, 0, 2, 2, 20, 0, 21, 1, 10, 9, 0, 2, 16, 2, 2, 2, 20, 2, 21, 3]
    );
    assert_eq!(p.consts.len(), 4);
}

#[test]
fn test_optional_bytecode() {
    let p = program(GrammarBuilder::new().rule("start", opt(lit("a"))));

    assert_eq!(p.rules[0].bytecode, vec![16, 0, 2, 2, 20, 0, 21, 1, 10, 2, 0, 2, 27]);
}

#[test]
fn test_rule_reference_bytecode() {
    let p = program(GrammarBuilder::new().rule("start", rule_ref("r")).rule("r", lit("a")));

    assert_eq!(p.rules[0].bytecode, vec![Opcode::Rule.word(), 1]);
    assert_eq!(p.rule_name(1), "r");
}

#[test]
fn test_any_bytecode() {
    let p = program(GrammarBuilder::new().rule("start", any()));

    // MATCH_ANY [ACCEPT_N 1] [FAIL expected]
    assert_eq!(p.rules[0].bytecode, vec![15, 2, 2, 19, 1, 21, 0]);
}

#[test]
fn test_every_rule_decompiles() {
    let p = program(
        GrammarBuilder::new()
            .rule(
                "start",
                action(
                    seq(vec![
                        label("head", rule_ref("word")),
                        label("tail", star(seq(vec![lit(","), rule_ref("word")]))),
                    ]),
                    "list",
                ),
            )
            .rule("word", text(plus(class(vec![ClassPart::Range('a', 'z')], false))))
            .rule("maybe", range(1, Some(3), opt(lit("x")), Some(lit(";")))),
    );

    for rule in &p.rules {
        let listing = decompile(&rule.bytecode).unwrap();
        assert!(!listing.is_empty(), "rule {} has no code", rule.name);
    }
}

// ============================================================================
// Listings
// ============================================================================

#[test]
fn test_disassembly_listing() {
    let p = program(GrammarBuilder::new().rule("start", lit("a")));

    let listing = p.disassemble().unwrap();
    assert_eq!(
        listing,
        "rule 0 (start):\n    0  MATCH_STRING 0, 2, 2\n    4  ACCEPT_STRING 0\n    6  FAIL 1\n"
    );
}

#[test]
fn test_constant_pool_contents() {
    let p = program(GrammarBuilder::new().rule(
        "start",
        seq(vec![lit_ic("Key"), regex_with("[0-9]+", false, false)]),
    ));

    assert!(p.consts.contains(&Const::String {
        value: "key".to_string()
    }));
    assert!(p
        .consts
        .iter()
        .any(|c| matches!(c, Const::Regexp { pattern, .. } if pattern == "[0-9]+")));
}

// ============================================================================
// Serialization
// ============================================================================

#[test]
fn test_program_json_round_trip() {
    let p = program(GrammarBuilder::new().rule(
        "start",
        seq(vec![regex("[a-z]+"), opt(lit("!"))]),
    ));

    let json = p.to_json().unwrap();
    let loaded = Program::from_json(&json).unwrap();
    assert_eq!(loaded, p);

    let mut parser = Parser::interpreted(loaded);
    assert_eq!(
        parser.parse("hey!", ParseOptions::new()).unwrap(),
        Value::array(vec![Value::string("hey"), Value::string("!")])
    );
}
