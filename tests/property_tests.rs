//! Property-based tests using proptest
//!
//! Random grammars built from a small set of terminals and every
//! combinator are compiled and run on random inputs. The properties hold
//! for any grammar the compiler accepts:
//! - Generated bytecode decodes completely and leaves one result
//! - Memoization never changes a parse result or its error
//! - Both execution strategies agree
//! - Successful parses respect the computed consumption bounds

use pegc::compiler::bytecode::stack_effect;
use pegc::compiler::consumption::Max;
use pegc::compiler::dsl::Expr;
use pegc::compiler::opcodes::decompile;
use pegc::prelude::*;
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

fn leaf() -> impl Strategy<Value = Expr> {
    prop_oneof![
        Just(lit("a")),
        Just(lit("ab")),
        Just(lit_ic("B")),
        Just(any()),
        Just(class(vec![ClassPart::Range('a', 'b')], false)),
        Just(class(vec![ClassPart::Char(',')], true)),
        Just(regex("b+")),
        Just(epsilon()),
        Just(rule_ref("atom")),
    ]
}

fn expression() -> impl Strategy<Value = Expr> {
    leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(seq),
            prop::collection::vec(inner.clone(), 1..4).prop_map(choice),
            inner.clone().prop_map(opt),
            inner.clone().prop_map(star),
            inner.clone().prop_map(plus),
            inner.clone().prop_map(text),
            inner.clone().prop_map(and),
            inner.clone().prop_map(not),
            inner.clone().prop_map(|e| named("thing", e)),
            (0u32..3, 0u32..3, inner.clone(), prop::option::of(inner.clone()))
                .prop_map(|(min, extra, e, d)| range(min, Some(min + extra), e, d)),
        ]
    })
}

fn grammar(start: Expr) -> Grammar {
    GrammarBuilder::new()
        .rule("start", start)
        .rule("atom", choice(vec![lit("a"), lit(",")]))
        .build()
}

/// Compile, or `None` when the grammar is rejected (loops, empty classes, ...)
fn parser(start: &Expr, options: CompileOptions) -> Option<Parser> {
    compile(grammar(start.clone()), options, None).ok()?.parser
}

// =============================================================================
// Bytecode
// =============================================================================

proptest! {
    /// Every compiled rule decodes into whole instructions with a net effect of one
    #[test]
    fn test_bytecode_decodes(start in expression()) {
        let options = CompileOptions::default().with_optimize(Optimize::Size);
        if let Some(parser) = parser(&start, options) {
            for rule in &parser.program().rules {
                let listing = decompile(&rule.bytecode);
                prop_assert!(listing.is_ok(), "rule {} does not decode", rule.name);
                prop_assert_eq!(stack_effect(&rule.bytecode).ok(), Some(1));
            }
            prop_assert!(parser.program().disassemble().is_ok());
        }
    }
}

// =============================================================================
// Execution
// =============================================================================

proptest! {
    /// Memoized and plain parsers give the same value or the same error
    #[test]
    fn test_memoization_transparent(start in expression(), input in "[ab,B]{0,6}") {
        let plain = parser(&start, CompileOptions::default());
        let cached = parser(&start, CompileOptions::default().with_cache(true));
        if let (Some(mut plain), Some(mut cached)) = (plain, cached) {
            prop_assert_eq!(
                plain.parse(&input, ParseOptions::new()),
                cached.parse(&input, ParseOptions::new())
            );
        }
    }

    /// Inline routines and the bytecode interpreter return the same result
    #[test]
    fn test_backends_agree(start in expression(), input in "[ab,B]{0,6}") {
        let speed = parser(&start, CompileOptions::default().with_optimize(Optimize::Speed));
        let size = parser(&start, CompileOptions::default().with_optimize(Optimize::Size));
        if let (Some(mut speed), Some(mut size)) = (speed, size) {
            prop_assert_eq!(
                speed.parse(&input, ParseOptions::new()),
                size.parse(&input, ParseOptions::new())
            );
        }
    }

    /// A successful parse consumes between the bounds computed for the start rule
    #[test]
    fn test_consumption_bounds(start in expression(), input in "[ab,B]{0,6}") {
        let options = CompileOptions::default().with_outputs(vec![OutputKind::Parser, OutputKind::Ast]);
        if let Ok(out) = compile(grammar(start), options, None) {
            let ast = out.ast.unwrap();
            let root = ast.grammar.rules[0].expression;
            let bounds = ast.facts.node_consumption(root).clone();
            prop_assert!(bounds.is_consistent());

            let mut parser = out.parser.unwrap();
            if parser.parse(&input, ParseOptions::new()).is_ok() {
                let consumed = input.chars().count() as u32;
                prop_assert!(bounds.min <= consumed);
                prop_assert!(Max::Finite(consumed) <= bounds.max);
            }
        }
    }
}
