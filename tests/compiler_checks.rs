//! Integration tests for grammar checks and transforms
//!
//! These tests cover the problems the compiler reports:
//! - Missing, duplicate and unused rules
//! - Left recursion and infinite loops
//! - Duplicate labels
//! - Proxy rule elision and memoization notes

use pegc::compiler::dsl::{cache, nocache};
use pegc::prelude::*;

fn compile_ok(b: GrammarBuilder, options: CompileOptions) -> CompileOutput {
    compile(b.build(), options, None).expect("grammar should compile")
}

fn compile_err(b: GrammarBuilder, options: CompileOptions) -> CompileError {
    compile(b.build(), options, None).expect_err("grammar should be rejected")
}

fn messages(problems: &[Problem], severity: Severity) -> Vec<&str> {
    problems
        .iter()
        .filter(|p| p.severity == severity)
        .map(|p| p.message.as_str())
        .collect()
}

// ============================================================================
// Rule Checks
// ============================================================================

#[test]
fn test_missing_rule() {
    let err = compile_err(
        GrammarBuilder::new().rule("start", seq(vec![rule_ref("a"), rule_ref("b")])),
        CompileOptions::default(),
    );

    assert_eq!(err.to_string().lines().next(), Some("Stage check contains errors."));
    assert_eq!(
        messages(err.problems(), Severity::Error),
        vec![
            "Referenced rule \"a\" does not exist.",
            "Referenced rule \"b\" does not exist.",
        ]
    );
}

#[test]
fn test_duplicate_rule_warning_by_default() {
    let out = compile_ok(
        GrammarBuilder::new().rule("start", lit("a")).rule("start", lit("b")),
        CompileOptions::default(),
    );

    let warnings = messages(&out.problems, Severity::Warning);
    assert!(warnings.iter().any(|m| m.starts_with("Rule \"start\" redefined")));

    // References resolve to the first definition
    let mut parser = out.parser.unwrap();
    assert!(parser.parse("a", ParseOptions::new()).is_ok());
    assert!(parser.parse("b", ParseOptions::new()).is_err());
}

#[test]
fn test_duplicate_rule_error_when_requested() {
    let err = compile_err(
        GrammarBuilder::new().rule("start", lit("a")).rule("start", lit("b")),
        CompileOptions::default().with_report_duplicate_rules(true),
    );

    let problem = err
        .problems()
        .iter()
        .find(|p| p.severity == Severity::Error)
        .expect("duplicate error");
    assert_eq!(problem.message, "Rule \"start\" is defined at least twice.");
    assert_eq!(problem.notes.len(), 2);
}

#[test]
fn test_unused_rule_removed() {
    let options = CompileOptions::default().with_output(OutputKind::Ast);
    let out = compile_ok(
        GrammarBuilder::new().rule("start", lit("a")).rule("orphan", lit("b")),
        options,
    );

    assert_eq!(messages(&out.problems, Severity::Warning), vec!["Rule \"orphan\" is not used."]);
    let ast = out.ast.unwrap();
    assert_eq!(ast.grammar.rules.len(), 1);
    assert_eq!(ast.grammar.rules[0].name, "start");
}

#[test]
fn test_all_rules_start_nothing_unused() {
    let options = CompileOptions::default().with_start_rules(StartRules::All);
    let out = compile_ok(
        GrammarBuilder::new().rule("a", lit("a")).rule("b", lit("b")),
        options,
    );

    assert!(messages(&out.problems, Severity::Warning).is_empty());
    assert_eq!(out.parser.unwrap().starters(), vec!["a", "b"]);
}

#[test]
fn test_undefined_starters_warned() {
    let options = CompileOptions::default().with_start_rules(StartRules::listed(["nope"]));
    let out = compile_ok(GrammarBuilder::new().rule("start", lit("a")), options);

    let warnings = messages(&out.problems, Severity::Warning);
    assert_eq!(
        warnings,
        vec![
            "These rules specified in the options as starters are not defined in this grammar: nope",
            "No valid starter rule has been defined. Assuming the first rule (start) is the only starter.",
        ]
    );
}

#[test]
fn test_empty_grammar_is_fatal() {
    let err = compile(Grammar::new(), CompileOptions::default(), None).unwrap_err();
    assert!(err.to_string().starts_with("The grammar must contain at least one rule."));
    assert_eq!(err.problems()[0].severity, Severity::Fatal);
}

// ============================================================================
// Recursion and Loops
// ============================================================================

#[test]
fn test_direct_left_recursion() {
    let err = compile_err(
        GrammarBuilder::new().rule("expr", choice(vec![seq(vec![rule_ref("expr"), lit("+")]), lit("1")])),
        CompileOptions::default(),
    );

    assert_eq!(
        messages(err.problems(), Severity::Error),
        vec!["Left recursion detected for rule \"expr\"."]
    );
}

#[test]
fn test_indirect_left_recursion() {
    let err = compile_err(
        GrammarBuilder::new()
            .rule("a", seq(vec![rule_ref("b"), lit("x")]))
            .rule("b", choice(vec![seq(vec![rule_ref("a"), lit("y")]), lit("z")])),
        CompileOptions::default(),
    );

    assert!(messages(err.problems(), Severity::Error)
        .iter()
        .any(|m| m.starts_with("Left recursion detected for rule")));
}

#[test]
fn test_left_recursion_through_nullable_prefix() {
    let err = compile_err(
        GrammarBuilder::new().rule("start", seq(vec![opt(lit("-")), rule_ref("start")])),
        CompileOptions::default(),
    );

    assert_eq!(
        messages(err.problems(), Severity::Error),
        vec!["Left recursion detected for rule \"start\"."]
    );
}

#[test]
fn test_right_recursion_allowed() {
    let out = compile_ok(
        GrammarBuilder::new().rule("start", choice(vec![seq(vec![lit("a"), rule_ref("start")]), lit("b")])),
        CompileOptions::default(),
    );

    let mut parser = out.parser.unwrap();
    assert!(parser.parse("aaab", ParseOptions::new()).is_ok());
}

#[test]
fn test_infinite_loop() {
    let err = compile_err(
        GrammarBuilder::new().rule("start", star(opt(lit("a")))),
        CompileOptions::default(),
    );

    assert_eq!(
        messages(err.problems(), Severity::Error),
        vec!["Infinite loop detected in rule \"start\"."]
    );
}

#[test]
fn test_loop_over_consuming_rule_allowed() {
    let out = compile_ok(
        GrammarBuilder::new()
            .rule("start", star(rule_ref("item")))
            .rule("item", choice(vec![lit("a"), lit("b")])),
        CompileOptions::default(),
    );
    assert!(messages(&out.problems, Severity::Error).is_empty());
}

#[test]
fn test_range_with_consuming_delimiter_allowed() {
    let out = compile_ok(
        GrammarBuilder::new().rule("start", range(0, None, opt(lit("a")), Some(lit(",")))),
        CompileOptions::default(),
    );
    assert!(out.parser.is_some());
}

// ============================================================================
// Labels
// ============================================================================

#[test]
fn test_duplicate_label() {
    let err = compile_err(
        GrammarBuilder::new().rule(
            "start",
            action(seq(vec![label("x", lit("a")), label("x", lit("b"))]), "pair"),
        ),
        CompileOptions::default(),
    );

    assert_eq!(
        messages(err.problems(), Severity::Error),
        vec!["Duplicate label \"x\" detected for rule \"start\"."]
    );
}

#[test]
fn test_same_label_in_alternatives_allowed() {
    let out = compile_ok(
        GrammarBuilder::new().rule(
            "start",
            choice(vec![
                action(seq(vec![label("x", lit("a")), lit("!")]), "first"),
                action(seq(vec![label("x", lit("b")), lit("?")]), "second"),
            ]),
        ),
        CompileOptions::default(),
    );
    assert!(out.parser.is_some());
}

#[test]
fn test_duplicate_labels_ignored_when_disabled() {
    let out = compile_ok(
        GrammarBuilder::new().rule("start", seq(vec![label("x", lit("a")), label("x", lit("b"))])),
        CompileOptions::default().with_report_duplicate_labels(false),
    );
    assert!(out.parser.is_some());
}

// ============================================================================
// Transforms
// ============================================================================

#[test]
fn test_proxy_rule_reduced() {
    let options = CompileOptions::default().with_output(OutputKind::Ast);
    let out = compile_ok(
        GrammarBuilder::new()
            .rule("start", seq(vec![rule_ref("proxy"), lit("!")]))
            .rule("proxy", rule_ref("word"))
            .rule("word", lit("hi")),
        options,
    );

    let infos = messages(&out.problems, Severity::Info);
    assert!(infos.contains(&"Rule \"proxy\" is a proxy rule. (It will be reduced.)"));
    assert!(infos.contains(&"Reference to Proxy Rule \"proxy\" replaced with rule \"word\" in rule \"start\"."));

    let names: Vec<&str> = out.ast.as_ref().unwrap().grammar.rules.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["start", "word"]);
}

#[test]
fn test_proxy_starter_kept() {
    let options = CompileOptions::default().with_start_rules(StartRules::All);
    let out = compile_ok(
        GrammarBuilder::new().rule("alias", rule_ref("word")).rule("word", lit("hi")),
        options,
    );

    let mut parser = out.parser.unwrap();
    assert_eq!(
        parser.parse("hi", ParseOptions::new().with_start_rule("alias")).unwrap(),
        Value::string("hi")
    );
}

#[test]
fn test_cache_annotation_overrides_option() {
    let out = compile_ok(
        GrammarBuilder::new().annotated_rule("start", vec![cache(None)], lit("a")),
        CompileOptions::default(),
    );

    assert!(messages(&out.problems, Severity::Info).contains(
        &"The cache/nocache annotations in the grammar override the parser cache/memoize option to be MEMOIZE=ON."
    ));
    let parser = out.parser.unwrap();
    assert!(parser.program().memoize);
    assert!(parser.program().is_memoized(0));
}

#[test]
fn test_nocache_all_disables_memoization() {
    let out = compile_ok(
        GrammarBuilder::new().annotated_rule("start", vec![nocache(Some("all"))], lit("a")),
        CompileOptions::default().with_cache(true),
    );

    assert!(messages(&out.problems, Severity::Info).contains(
        &"The cache/nocache annotations in the grammar override the parser cache/memoize option to be MEMOIZE=OFF."
    ));
    assert!(!out.parser.unwrap().program().memoize);
}

#[test]
fn test_conflicting_cache_annotations_warn() {
    let out = compile_ok(
        GrammarBuilder::new().annotated_rule("start", vec![cache(None), nocache(None)], lit("a")),
        CompileOptions::default(),
    );

    let warnings = messages(&out.problems, Severity::Warning);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].starts_with("Multiple cache() declarations apply to the same rule \"start\""));
    assert!(out.parser.unwrap().program().is_memoized(0));
}

#[test]
fn test_force_cache_overrides_nocache_all() {
    let out = compile_ok(
        GrammarBuilder::new().annotated_rule("start", vec![nocache(Some("all"))], lit("a")),
        CompileOptions::default().with_force_cache(true),
    );
    assert!(out.parser.unwrap().program().memoize);
}
