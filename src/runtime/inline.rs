//! Inline routines
//!
//! The inline strategy unrolls each rule's bytecode into straight-line
//! statements over numbered slots. The operand stack disappears: a
//! simulation of the stack pointer assigns stack depth `n` to slot `sn`,
//! conditions become `if`/`else` and loops become `while`. The same
//! routines are executed in-process by [`run_rule`] and rendered to Rust
//! source by the code generator.

use super::error::ParseFailure;
use super::program::Program;
use super::state::ParserState;
use super::value::{Slot, Value};
use crate::compiler::opcodes::{instruction_len, Opcode};
use thiserror::Error;

/// Errors found while unrolling bytecode
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LowerError {
    /// A word is not a valid instruction start
    #[error("malformed bytecode in rule \"{rule}\" at offset {offset}")]
    Malformed {
        /// Rule name
        rule: String,
        /// Offset of the bad instruction
        offset: usize,
    },
    /// The two blocks of a condition leave different stack depths
    #[error("Branches of a condition must move the stack pointer in the same way.")]
    BranchMismatch {
        /// Rule name
        rule: String,
        /// Offset of the condition
        offset: usize,
    },
    /// A loop body changes the stack depth
    #[error("Body of a loop can't move the stack pointer.")]
    LoopMovesStack {
        /// Rule name
        rule: String,
        /// Offset of the loop
        offset: usize,
    },
    /// An instruction reads below the bottom of the stack
    #[error("stack underflow in rule \"{rule}\" at offset {offset}")]
    StackUnderflow {
        /// Rule name
        rule: String,
        /// Offset of the instruction
        offset: usize,
    },
    /// A rule does not end with exactly one stack entry
    #[error("rule \"{rule}\" ends with stack depth {depth}")]
    Unbalanced {
        /// Rule name
        rule: String,
        /// Final number of entries
        depth: isize,
    },
}

/// One unrolled rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routine {
    /// Rule index
    pub rule: usize,
    /// Rule name
    pub name: String,
    /// Number of slots used
    pub slots: usize,
    /// Statements; the result is left in slot 0
    pub body: Vec<Stmt>,
}

/// A statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// `sN = expr`
    Assign(usize, Expr),
    /// Restore the current position from a slot
    RestorePos(usize),
    /// Load the saved position from a slot
    LoadSavedPos(usize),
    /// Save the current position
    UpdateSavedPos,
    /// Enter a silent region
    SilentOn,
    /// Leave a silent region
    SilentOff,
    /// Leave every silent region
    SilentReset,
    /// Append the second slot's value to the array in the first
    Append(usize, usize),
    /// Two-way branch
    If {
        /// Condition
        cond: Cond,
        /// Taken block
        then: Vec<Stmt>,
        /// Other block
        otherwise: Vec<Stmt>,
    },
    /// Loop while a condition holds
    While {
        /// Condition
        cond: Cond,
        /// Body
        body: Vec<Stmt>,
    },
}

/// A value-producing expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// String constant
    Const(usize),
    /// Current position
    CurrPos,
    /// Move out of a slot
    Take(usize),
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// The failure sentinel
    Failed,
    /// A fresh empty array
    EmptyArray,
    /// Array of `n` slots starting at a slot
    Wrap(usize, usize),
    /// Input text from the position in a slot to the current position
    Text(usize),
    /// Take `n` characters
    AcceptN(usize),
    /// Take a string constant
    AcceptString(usize),
    /// Take what a regexp constant matches
    AcceptRegexp(usize),
    /// Record an expectation constant and fail
    Fail(usize),
    /// Call an action with arguments read from slots
    Call {
        /// Action index
        action: usize,
        /// Argument slots
        args: Vec<usize>,
    },
    /// Invoke a rule
    Rule(usize),
}

/// A branch or loop condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    /// The slot holds a truthy value
    Truthy(usize),
    /// The slot holds the failure sentinel
    IsFailed(usize),
    /// The slot does not hold the failure sentinel
    NotFailed(usize),
    /// Input remains
    MatchAny,
    /// A string constant follows
    MatchString(usize),
    /// A lowercased string constant follows, ignoring case
    MatchStringIc(usize),
    /// A regexp constant matches here
    MatchRegexp(usize),
    /// The array in the slot is shorter than the bound
    ArrLenLess(usize, usize),
    /// The array in the slot has at least the bound entries
    ArrLenAtLeast(usize, usize),
}

/// Unroll every rule of a program
pub fn lower(program: &Program) -> Result<Vec<Routine>, LowerError> {
    program
        .rules
        .iter()
        .enumerate()
        .map(|(index, rule)| lower_rule(index, &rule.name, &rule.bytecode))
        .collect()
}

/// Unroll one rule's bytecode
pub fn lower_rule(index: usize, name: &str, bytecode: &[u32]) -> Result<Routine, LowerError> {
    let mut lowerer = Lowerer {
        bc: bytecode,
        rule: name,
        max_depth: 0,
    };
    let mut sp: isize = -1;
    let body = lowerer.block(0, bytecode.len(), &mut sp)?;
    if sp != 0 {
        return Err(LowerError::Unbalanced {
            rule: name.to_string(),
            depth: sp + 1,
        });
    }
    Ok(Routine {
        rule: index,
        name: name.to_string(),
        slots: lowerer.max_depth.max(1),
        body,
    })
}

struct Lowerer<'b> {
    bc: &'b [u32],
    rule: &'b str,
    max_depth: usize,
}

impl Lowerer<'_> {
    fn block(&mut self, start: usize, end: usize, sp: &mut isize) -> Result<Vec<Stmt>, LowerError> {
        let mut out = Vec::new();
        let mut ip = start;

        while ip < end {
            let bc = self.bc;
            let opcode = Opcode::from_word(bc[ip]).ok_or_else(|| self.malformed(ip))?;
            let len = instruction_len(bc, ip).ok_or_else(|| self.malformed(ip))?;
            let arg = |i: usize| bc[ip + i] as usize;

            match opcode {
                Opcode::Push => out.push(self.push(sp, Expr::Const(arg(1)))),
                Opcode::PushCurrPos => out.push(self.push(sp, Expr::CurrPos)),
                Opcode::PushUndefined => out.push(self.push(sp, Expr::Undefined)),
                Opcode::PushNull => out.push(self.push(sp, Expr::Null)),
                Opcode::PushFailed => out.push(self.push(sp, Expr::Failed)),
                Opcode::PushEmptyArray => out.push(self.push(sp, Expr::EmptyArray)),
                Opcode::AcceptN => out.push(self.push(sp, Expr::AcceptN(arg(1)))),
                Opcode::AcceptString => out.push(self.push(sp, Expr::AcceptString(arg(1)))),
                Opcode::AcceptRegexp => out.push(self.push(sp, Expr::AcceptRegexp(arg(1)))),
                Opcode::Fail => out.push(self.push(sp, Expr::Fail(arg(1)))),
                Opcode::Rule => out.push(self.push(sp, Expr::Rule(arg(1)))),

                Opcode::Pop => self.drop(sp, 1, ip)?,
                Opcode::PopN => self.drop(sp, arg(1), ip)?,
                Opcode::PopCurrPos => {
                    let top = self.top(*sp, ip)?;
                    out.push(Stmt::RestorePos(top));
                    self.drop(sp, 1, ip)?;
                }
                Opcode::Nip => {
                    let top = self.top(*sp, ip)?;
                    if top == 0 {
                        return Err(self.underflow(ip));
                    }
                    out.push(Stmt::Assign(top - 1, Expr::Take(top)));
                    self.drop(sp, 1, ip)?;
                }
                Opcode::Append => {
                    let top = self.top(*sp, ip)?;
                    if top == 0 {
                        return Err(self.underflow(ip));
                    }
                    out.push(Stmt::Append(top - 1, top));
                    self.drop(sp, 1, ip)?;
                }
                Opcode::Wrap => {
                    let n = arg(1);
                    let first = *sp + 1 - n as isize;
                    if first < 0 {
                        return Err(self.underflow(ip));
                    }
                    self.drop(sp, n, ip)?;
                    out.push(self.push(sp, Expr::Wrap(first as usize, n)));
                }
                Opcode::Text => {
                    let top = self.top(*sp, ip)?;
                    out.push(Stmt::Assign(top, Expr::Text(top)));
                }

                Opcode::LoadSavedPos => {
                    let slot = self.below_top(*sp, arg(1), ip)?;
                    out.push(Stmt::LoadSavedPos(slot));
                }
                Opcode::UpdateSavedPos => out.push(Stmt::UpdateSavedPos),
                Opcode::Call => {
                    let action = arg(1);
                    let n = arg(2);
                    let pc = arg(3);
                    let args = (0..pc)
                        .map(|i| self.below_top(*sp, arg(4 + i), ip))
                        .collect::<Result<Vec<_>, _>>()?;
                    self.drop(sp, n, ip)?;
                    out.push(self.push(sp, Expr::Call { action, args }));
                }

                Opcode::SilentFailsOn => out.push(Stmt::SilentOn),
                Opcode::SilentFailsOff => out.push(Stmt::SilentOff),
                Opcode::SilentFailsReset => out.push(Stmt::SilentReset),

                Opcode::If
                | Opcode::IfError
                | Opcode::IfNotError
                | Opcode::IfArrlenMin
                | Opcode::IfArrlenMax
                | Opcode::MatchAny
                | Opcode::MatchString
                | Opcode::MatchStringIc
                | Opcode::MatchRegexp => {
                    let cond = match opcode {
                        Opcode::If => Cond::Truthy(self.top(*sp, ip)?),
                        Opcode::IfError => Cond::IsFailed(self.top(*sp, ip)?),
                        Opcode::IfNotError => Cond::NotFailed(self.top(*sp, ip)?),
                        Opcode::IfArrlenMin => Cond::ArrLenLess(self.top(*sp, ip)?, arg(1)),
                        Opcode::IfArrlenMax => Cond::ArrLenAtLeast(self.top(*sp, ip)?, arg(1)),
                        Opcode::MatchAny => Cond::MatchAny,
                        Opcode::MatchString => Cond::MatchString(arg(1)),
                        Opcode::MatchStringIc => Cond::MatchStringIc(arg(1)),
                        _ => Cond::MatchRegexp(arg(1)),
                    };
                    let base = ip + len;
                    let t = bc[base - 2] as usize;
                    let f = bc[base - 1] as usize;
                    if base + t + f > end {
                        return Err(self.malformed(ip));
                    }

                    let mut then_sp = *sp;
                    let then = self.block(base, base + t, &mut then_sp)?;
                    let mut else_sp = *sp;
                    let otherwise = self.block(base + t, base + t + f, &mut else_sp)?;
                    if then_sp != else_sp {
                        return Err(LowerError::BranchMismatch {
                            rule: self.rule.to_string(),
                            offset: ip,
                        });
                    }
                    *sp = then_sp;
                    out.push(Stmt::If {
                        cond,
                        then,
                        otherwise,
                    });
                    ip = base + t + f;
                    continue;
                }

                Opcode::WhileNotError => {
                    let cond = Cond::NotFailed(self.top(*sp, ip)?);
                    let base = ip + len;
                    let b = bc[base - 1] as usize;
                    if base + b > end {
                        return Err(self.malformed(ip));
                    }
                    let mut body_sp = *sp;
                    let body = self.block(base, base + b, &mut body_sp)?;
                    if body_sp != *sp {
                        return Err(LowerError::LoopMovesStack {
                            rule: self.rule.to_string(),
                            offset: ip,
                        });
                    }
                    out.push(Stmt::While { cond, body });
                    ip = base + b;
                    continue;
                }
            }

            ip += len;
        }

        Ok(out)
    }

    fn push(&mut self, sp: &mut isize, expr: Expr) -> Stmt {
        *sp += 1;
        let slot = *sp as usize;
        self.max_depth = self.max_depth.max(slot + 1);
        Stmt::Assign(slot, expr)
    }

    fn drop(&self, sp: &mut isize, n: usize, ip: usize) -> Result<(), LowerError> {
        *sp -= n as isize;
        if *sp < -1 {
            return Err(self.underflow(ip));
        }
        Ok(())
    }

    fn top(&self, sp: isize, ip: usize) -> Result<usize, LowerError> {
        usize::try_from(sp).map_err(|_| self.underflow(ip))
    }

    fn below_top(&self, sp: isize, offset: usize, ip: usize) -> Result<usize, LowerError> {
        usize::try_from(sp - offset as isize).map_err(|_| self.underflow(ip))
    }

    fn malformed(&self, offset: usize) -> LowerError {
        LowerError::Malformed {
            rule: self.rule.to_string(),
            offset,
        }
    }

    fn underflow(&self, offset: usize) -> LowerError {
        LowerError::StackUnderflow {
            rule: self.rule.to_string(),
            offset,
        }
    }
}

/// Invoke rule `index` by running its routine
pub fn run_rule(
    state: &mut ParserState<'_>,
    routines: &[Routine],
    index: usize,
) -> Result<Slot, ParseFailure> {
    state.rule(index, |state| {
        let Some(routine) = routines.get(index) else {
            return Ok(Slot::Failed);
        };
        let mut slots = vec![Slot::Failed; routine.slots];
        exec(state, routines, &routine.body, &mut slots)?;
        Ok(slots[0].take())
    })
}

/// Parse from the start rule to a final value
pub fn parse(
    mut state: ParserState<'_>,
    routines: &[Routine],
    start: usize,
) -> Result<Value, ParseFailure> {
    let result = run_rule(&mut state, routines, start)?;
    state.finish(result)
}

fn exec(
    state: &mut ParserState<'_>,
    routines: &[Routine],
    body: &[Stmt],
    slots: &mut [Slot],
) -> Result<(), ParseFailure> {
    for stmt in body {
        match stmt {
            Stmt::Assign(slot, expr) => {
                let value = eval(state, routines, expr, slots)?;
                slots[*slot] = value;
            }
            Stmt::RestorePos(slot) => state.restore_pos(&slots[*slot]),
            Stmt::LoadSavedPos(slot) => state.load_saved_pos(&slots[*slot]),
            Stmt::UpdateSavedPos => state.update_saved_pos(),
            Stmt::SilentOn => state.silent_fails_on(),
            Stmt::SilentOff => state.silent_fails_off(),
            Stmt::SilentReset => state.silent_fails_reset(),
            Stmt::Append(array, item) => {
                let value = slots[*item].take();
                slots[*array].push(value);
            }
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                if test(state, *cond, slots) {
                    exec(state, routines, then, slots)?;
                } else {
                    exec(state, routines, otherwise, slots)?;
                }
            }
            Stmt::While { cond, body } => {
                while test(state, *cond, slots) {
                    exec(state, routines, body, slots)?;
                }
            }
        }
    }
    Ok(())
}

#[inline]
fn test(state: &ParserState<'_>, cond: Cond, slots: &[Slot]) -> bool {
    match cond {
        Cond::Truthy(s) => slots[s].is_truthy(),
        Cond::IsFailed(s) => slots[s].is_failed(),
        Cond::NotFailed(s) => !slots[s].is_failed(),
        Cond::MatchAny => state.match_any(),
        Cond::MatchString(c) => state.match_string(c),
        Cond::MatchStringIc(c) => state.match_string_ic(c),
        Cond::MatchRegexp(c) => state.match_regexp(c),
        Cond::ArrLenLess(s, n) => slots[s].array_len() < n,
        Cond::ArrLenAtLeast(s, n) => slots[s].array_len() >= n,
    }
}

fn eval(
    state: &mut ParserState<'_>,
    routines: &[Routine],
    expr: &Expr,
    slots: &mut [Slot],
) -> Result<Slot, ParseFailure> {
    Ok(match expr {
        Expr::Const(c) => state.constant(*c),
        Expr::CurrPos => state.push_curr_pos(),
        Expr::Take(s) => slots[*s].take(),
        Expr::Undefined => Slot::Value(Value::Undefined),
        Expr::Null => Slot::Value(Value::Null),
        Expr::Failed => state.push_failed(),
        Expr::EmptyArray => Slot::empty_array(),
        Expr::Wrap(first, n) => Slot::wrap(slots[*first..*first + *n].iter_mut().map(Slot::take).collect()),
        Expr::Text(s) => state.text(&slots[*s]),
        Expr::AcceptN(n) => state.accept_n(*n),
        Expr::AcceptString(c) => state.accept_string(*c),
        Expr::AcceptRegexp(c) => state.accept_regexp(*c),
        Expr::Fail(c) => state.fail(*c),
        Expr::Call { action, args } => {
            let args: Vec<Value> = args.iter().map(|&s| slots[s].to_value()).collect();
            state.call(*action, &args)?
        }
        Expr::Rule(r) => run_rule(state, routines, *r)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // "a" / "b"
    const CHOICE: &[u32] = &[
        16, 0, 2, 2, 20, 0, 21, 1, // "a"
        10, 9, 0, // IF_ERROR
        2, // POP
        16, 2, 2, 2, 20, 2, 21, 3, // "b"
    ];

    #[test]
    fn test_lower_choice() {
        let routine = lower_rule(0, "start", CHOICE).unwrap();
        assert_eq!(routine.slots, 1);
        assert_eq!(routine.body.len(), 2);
        match &routine.body[1] {
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                assert_eq!(*cond, Cond::IsFailed(0));
                assert_eq!(then.len(), 1);
                assert!(otherwise.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_branch_mismatch_detected() {
        // IF_ERROR [PUSH_NULL] [] leaves different depths
        let bc = [28, 10, 1, 0, 27];
        assert!(matches!(
            lower_rule(0, "r", &bc),
            Err(LowerError::BranchMismatch { offset: 1, .. })
        ));
    }

    #[test]
    fn test_loop_moving_stack_detected() {
        // PUSH_NULL; WHILE_NOT_ERROR [PUSH_NULL]
        let bc = [27, 14, 1, 27];
        let err = lower_rule(0, "r", &bc).unwrap_err();
        assert_eq!(err.to_string(), "Body of a loop can't move the stack pointer.");
    }

    #[test]
    fn test_unbalanced_rule_detected() {
        let bc = [27, 27];
        assert!(matches!(
            lower_rule(0, "r", &bc),
            Err(LowerError::Unbalanced { depth: 2, .. })
        ));
    }

    #[test]
    fn test_nip_moves_top_down() {
        // PUSH_CURR_POS; PUSH_NULL; NIP
        let routine = lower_rule(0, "r", &[1, 27, 5]).unwrap();
        assert_eq!(routine.slots, 2);
        assert_eq!(routine.body[2], Stmt::Assign(0, Expr::Take(1)));
    }
}
