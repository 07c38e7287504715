//! Parser generated by pegc 0.1.0 (interpreter backend). Do not edit.

#![allow(dead_code, unused_mut, unused_variables, unused_assignments, clippy::all)]

use pegc::runtime::*;
use std::sync::OnceLock;

/// The compiled program
pub fn program() -> &'static Program {
    static PROGRAM: OnceLock<Program> = OnceLock::new();
    PROGRAM.get_or_init(|| {
        Program::new(
            vec![
                RuleCode { name: "start".to_string(), memoize: false, bytecode: vec![1, 16, 0, 2, 2, 20, 0, 21, 1, 11, 33, 3, 16, 2, 2, 2, 20, 2, 21, 3, 11, 18, 4, 16, 4, 2, 2, 20, 4, 21, 5, 11, 3, 4, 7, 3, 5, 4, 3, 3, 28, 4, 2, 3, 28, 2, 3, 28] },
            ],
            vec![
                Const::String { value: "a".to_string() },
                Const::Expected { expected: Expectation { kind: ExpectationKind::Literal, value: Some("a".to_string()), description: "\"a\"".to_string() } },
                Const::String { value: "b".to_string() },
                Const::Expected { expected: Expectation { kind: ExpectationKind::Literal, value: Some("b".to_string()), description: "\"b\"".to_string() } },
                Const::String { value: "c".to_string() },
                Const::Expected { expected: Expectation { kind: ExpectationKind::Literal, value: Some("c".to_string()), description: "\"c\"".to_string() } },
            ],
            vec![
            ],
            vec![0],
            0,
            false,
            false,
            false,
        )
    })
}

/// Runs the grammar's actions, predicates and code terminals
#[derive(Debug, Clone, Copy, Default)]
pub struct Actions;

impl ActionHandler for Actions {
    fn call(&mut self, index: usize, _def: &ActionDef, ctx: &ActionContext<'_>, args: &[Value]) -> ActionResult {
        match index {
            _ => Err(ActionError::Unbound),
        }
    }
}

/// Parse `input` from the requested or default start rule
pub fn parse(input: &str, options: ParseOptions<'_>) -> Result<Value, ParseFailure> {
    run(input, options, None)
}

/// Parse `input` and return the run-time statistics of this parse
pub fn parse_with_statistics(input: &str, options: ParseOptions<'_>) -> (Result<Value, ParseFailure>, Statistics) {
    let program = program();
    let mut statistics = Statistics::new(program.rules.iter().map(|r| (r.name.as_str(), r.memoize && program.memoize)));
    let result = run(input, options, Some(&mut statistics));
    (result, statistics)
}

fn run(input: &str, options: ParseOptions<'_>, statistics: Option<&mut Statistics>) -> Result<Value, ParseFailure> {
    let program = program();
    let start = program.start_index(options.start_rule)?;
    let mut actions = Actions;
    let tracer = options.tracer.map(|t| t as &mut dyn Tracer);
    let state = ParserState::new(input, program, &mut actions, tracer, statistics);
    interpreter::parse(state, start)
}
