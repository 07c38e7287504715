//! Bytecode interpreter
//!
//! One dispatch loop runs every rule. Nested condition and loop blocks do
//! not recurse: entering a block pushes the current region end and the
//! resume address, and leaving it pops them. Only rule calls recurse, and
//! they do so through [`ParserState::rule`] so memoization, statistics
//! and tracing wrap every invocation.

use super::error::ParseFailure;
use super::state::ParserState;
use super::value::{Slot, Value};
use crate::compiler::opcodes::Opcode;

/// Invoke rule `index`
pub fn run_rule(state: &mut ParserState<'_>, index: usize) -> Result<Slot, ParseFailure> {
    state.rule(index, |state| execute(state, index))
}

/// Parse `input` from the start rule to a final value
pub fn parse(mut state: ParserState<'_>, start: usize) -> Result<Value, ParseFailure> {
    let result = run_rule(&mut state, start)?;
    state.finish(result)
}

#[inline]
fn top(stack: &[Slot]) -> &Slot {
    stack.last().unwrap_or(&Slot::Failed)
}

#[inline]
fn pop(stack: &mut Vec<Slot>) -> Slot {
    stack.pop().unwrap_or_default()
}

/// Entry `offset` places below the top of stack
#[inline]
fn peek(stack: &[Slot], offset: u32) -> &Slot {
    let len = stack.len();
    len.checked_sub(1 + offset as usize)
        .and_then(|i| stack.get(i))
        .unwrap_or(&Slot::Failed)
}

fn execute(state: &mut ParserState<'_>, index: usize) -> Result<Slot, ParseFailure> {
    let program = state.program();
    let Some(rule) = program.rules.get(index) else {
        return Ok(Slot::Failed);
    };
    let bc = rule.bytecode.as_slice();

    let mut stack: Vec<Slot> = Vec::with_capacity(16);
    let mut ip = 0usize;
    let mut end = bc.len();
    let mut ips: Vec<usize> = Vec::new();
    let mut ends: Vec<usize> = Vec::new();

    // Enter the then- or else-block of the condition at `ip`, whose last
    // two operands are the block lengths.
    macro_rules! branch {
        ($operands:expr, $taken:expr) => {{
            let base = ip + 1 + $operands;
            let t = bc[base - 2] as usize;
            let f = bc[base - 1] as usize;
            ends.push(end);
            ips.push(base + t + f);
            if $taken {
                end = base + t;
                ip = base;
            } else {
                end = base + t + f;
                ip = base + t;
            }
        }};
    }

    loop {
        while ip < end {
            let Some(opcode) = Opcode::from_word(bc[ip]) else {
                // Compiled programs never contain unknown words.
                ip += 1;
                continue;
            };

            match opcode {
                Opcode::Push => {
                    stack.push(state.constant(bc[ip + 1] as usize));
                    ip += 2;
                }
                Opcode::PushUndefined => {
                    stack.push(Slot::Value(Value::Undefined));
                    ip += 1;
                }
                Opcode::PushNull => {
                    stack.push(Slot::Value(Value::Null));
                    ip += 1;
                }
                Opcode::PushFailed => {
                    stack.push(state.push_failed());
                    ip += 1;
                }
                Opcode::PushEmptyArray => {
                    stack.push(Slot::empty_array());
                    ip += 1;
                }
                Opcode::PushCurrPos => {
                    stack.push(state.push_curr_pos());
                    ip += 1;
                }
                Opcode::Pop => {
                    stack.pop();
                    ip += 1;
                }
                Opcode::PopCurrPos => {
                    let saved = pop(&mut stack);
                    state.restore_pos(&saved);
                    ip += 1;
                }
                Opcode::PopN => {
                    let n = bc[ip + 1] as usize;
                    stack.truncate(stack.len().saturating_sub(n));
                    ip += 2;
                }
                Opcode::Nip => {
                    let value = pop(&mut stack);
                    stack.pop();
                    stack.push(value);
                    ip += 1;
                }
                Opcode::Append => {
                    let value = pop(&mut stack);
                    if let Some(array) = stack.last_mut() {
                        array.push(value);
                    }
                    ip += 1;
                }
                Opcode::Wrap => {
                    let n = bc[ip + 1] as usize;
                    let items = stack.split_off(stack.len().saturating_sub(n));
                    stack.push(Slot::wrap(items));
                    ip += 2;
                }
                Opcode::Text => {
                    let start = pop(&mut stack);
                    stack.push(state.text(&start));
                    ip += 1;
                }

                Opcode::If => branch!(2, top(&stack).is_truthy()),
                Opcode::IfError => branch!(2, top(&stack).is_failed()),
                Opcode::IfNotError => branch!(2, !top(&stack).is_failed()),
                Opcode::IfArrlenMin => {
                    let min = bc[ip + 1] as usize;
                    branch!(3, top(&stack).array_len() < min)
                }
                Opcode::IfArrlenMax => {
                    let max = bc[ip + 1] as usize;
                    branch!(3, top(&stack).array_len() >= max)
                }
                Opcode::WhileNotError => {
                    let body = bc[ip + 1] as usize;
                    if !top(&stack).is_failed() {
                        ends.push(end);
                        ips.push(ip);
                        end = ip + 2 + body;
                        ip += 2;
                    } else {
                        ip += 2 + body;
                    }
                }

                Opcode::MatchAny => branch!(2, state.match_any()),
                Opcode::MatchString => branch!(3, state.match_string(bc[ip + 1] as usize)),
                Opcode::MatchStringIc => {
                    branch!(3, state.match_string_ic(bc[ip + 1] as usize))
                }
                Opcode::MatchRegexp => branch!(3, state.match_regexp(bc[ip + 1] as usize)),
                Opcode::AcceptN => {
                    stack.push(state.accept_n(bc[ip + 1] as usize));
                    ip += 2;
                }
                Opcode::AcceptString => {
                    stack.push(state.accept_string(bc[ip + 1] as usize));
                    ip += 2;
                }
                Opcode::AcceptRegexp => {
                    stack.push(state.accept_regexp(bc[ip + 1] as usize));
                    ip += 2;
                }
                Opcode::Fail => {
                    stack.push(state.fail(bc[ip + 1] as usize));
                    ip += 2;
                }

                Opcode::LoadSavedPos => {
                    let saved = peek(&stack, bc[ip + 1]).clone();
                    state.load_saved_pos(&saved);
                    ip += 2;
                }
                Opcode::UpdateSavedPos => {
                    state.update_saved_pos();
                    ip += 1;
                }
                Opcode::Call => {
                    let f = bc[ip + 1] as usize;
                    let n = bc[ip + 2] as usize;
                    let pc = bc[ip + 3] as usize;
                    let args: Vec<Value> = bc[ip + 4..ip + 4 + pc]
                        .iter()
                        .map(|&p| peek(&stack, p).to_value())
                        .collect();
                    let value = state.call(f, &args)?;
                    stack.truncate(stack.len().saturating_sub(n));
                    stack.push(value);
                    ip += 4 + pc;
                }

                Opcode::Rule => {
                    let result = run_rule(state, bc[ip + 1] as usize)?;
                    stack.push(result);
                    ip += 2;
                }

                Opcode::SilentFailsOn => {
                    state.silent_fails_on();
                    ip += 1;
                }
                Opcode::SilentFailsOff => {
                    state.silent_fails_off();
                    ip += 1;
                }
                Opcode::SilentFailsReset => {
                    state.silent_fails_reset();
                    ip += 1;
                }
            }
        }

        match (ends.pop(), ips.pop()) {
            (Some(e), Some(i)) => {
                end = e;
                ip = i;
            }
            _ => break,
        }
    }

    Ok(stack.pop().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::actions::NoActions;
    use crate::runtime::error::Expectation;
    use crate::runtime::program::{Const, Program, RuleCode};

    // start = "a"*
    fn star_program() -> Program {
        let bytecode = vec![
            29, // PUSH_EMPTY_ARRAY
            16, 0, 2, 2, 20, 0, 21, 1, // "a"
            14, 9, // WHILE_NOT_ERROR
            6, // APPEND
            16, 0, 2, 2, 20, 0, 21, 1, // "a"
            2, // POP
        ];
        Program::new(
            vec![RuleCode {
                name: "start".to_string(),
                memoize: false,
                bytecode,
            }],
            vec![
                Const::String {
                    value: "a".to_string(),
                },
                Const::Expected {
                    expected: Expectation::literal("a"),
                },
            ],
            vec![],
            vec![0],
            0,
            false,
            false,
            false,
        )
    }

    fn run(program: &Program, input: &str) -> Result<Value, ParseFailure> {
        let mut actions = NoActions;
        let state = ParserState::new(input, program, &mut actions, None, None);
        parse(state, 0)
    }

    #[test]
    fn test_star_loop() {
        let p = star_program();
        assert_eq!(run(&p, "").unwrap(), Value::array(vec![]));
        assert_eq!(
            run(&p, "aaa").unwrap(),
            Value::array(vec!["a".into(), "a".into(), "a".into()])
        );
    }

    #[test]
    fn test_trailing_input_fails() {
        let p = star_program();
        let err = run(&p, "aab").unwrap_err();
        let err = err.as_syntax().unwrap();
        assert_eq!(err.location.start.offset, 2);
        assert_eq!(err.message, "Expected \"a\" or end of input but \"b\" found.");
    }
}
