//! Bytecode compiler
//!
//! Translates each rule's expression tree into stack-machine code and
//! fills the constant and action pools. Every translation leaves exactly
//! one entry on the stack: the node's value or the failure sentinel.
//!
//! # Stack discipline
//!
//! The compiler tracks `sp`, the index of the current top of stack, while
//! generating. A node compiled at `sp` leaves its result at `sp + 1`.
//! Labels record the stack index of their value in an environment; a call
//! turns those indices into offsets from the top.
//!
//! Both blocks of a condition must move the stack pointer by the same
//! amount and a loop body must leave it unchanged. [`stack_effect`]
//! checks this on every block the compiler builds; a mismatch is a bug in
//! the compiler, reported as [`CompileError::Internal`].

use super::ast::{ClassPart, Grammar, NodeId, NodeKind};
use super::diagnostics::CompileError;
use super::opcodes::{instruction_len, Opcode};
use super::session::{Facts, Session};
use crate::runtime::error::Expectation;
use crate::runtime::location::Location;
use crate::runtime::program::{ActionDef, Const, Program, RuleCode};
use crate::runtime::regex_cache;
use hashbrown::HashMap;
use std::hash::Hash;

/// Net stack displacement of a block, verifying nested blocks
pub fn stack_effect(code: &[u32]) -> Result<i32, CompileError> {
    let mut effect = 0i32;
    let mut ip = 0;

    while ip < code.len() {
        let opcode = Opcode::from_word(code[ip])
            .ok_or_else(|| CompileError::Internal(format!("invalid opcode {} at offset {}", code[ip], ip)))?;
        let len = instruction_len(code, ip)
            .ok_or_else(|| CompileError::Internal(format!("truncated {} at offset {}", opcode, ip)))?;
        if opcode.is_condition() {
            let t = code[ip + len - 2] as usize;
            let f = code[ip + len - 1] as usize;
            let then_start = ip + len;
            let else_start = then_start + t;
            let end = else_start + f;
            if end > code.len() {
                return Err(CompileError::Internal(format!(
                    "{} at offset {} has blocks past the end of the code",
                    opcode, ip
                )));
            }
            let then = stack_effect(&code[then_start..else_start])?;
            let otherwise = stack_effect(&code[else_start..end])?;
            if then != otherwise {
                return Err(CompileError::Internal(format!(
                    "Branches of a condition can't move the stack pointer differently (then: {}, else: {}).",
                    then, otherwise
                )));
            }
            effect += then;
            ip = end;
            continue;
        }

        if opcode.is_loop() {
            let body_start = ip + len;
            let end = body_start + code[ip + len - 1] as usize;
            if end > code.len() {
                return Err(CompileError::Internal(format!(
                    "{} at offset {} has a body past the end of the code",
                    opcode, ip
                )));
            }
            let body = stack_effect(&code[body_start..end])?;
            if body != 0 {
                return Err(CompileError::Internal(format!(
                    "Body of a loop can't move the stack pointer (moved by {}).",
                    body
                )));
            }
            ip = end;
            continue;
        }

        effect += match opcode {
            Opcode::Push
            | Opcode::PushCurrPos
            | Opcode::AcceptN
            | Opcode::AcceptString
            | Opcode::AcceptRegexp
            | Opcode::Fail
            | Opcode::Rule
            | Opcode::PushUndefined
            | Opcode::PushNull
            | Opcode::PushFailed
            | Opcode::PushEmptyArray => 1,
            Opcode::Pop | Opcode::PopCurrPos | Opcode::Nip | Opcode::Append => -1,
            Opcode::PopN => -(code[ip + 1] as i32),
            Opcode::Wrap => 1 - code[ip + 1] as i32,
            Opcode::Call => 1 - code[ip + 2] as i32,
            _ => 0,
        };
        ip += len;
    }

    Ok(effect)
}

/// Pool de-duplicating entries by value
#[derive(Debug)]
struct Pool<T> {
    items: Vec<T>,
    index: HashMap<T, usize, ahash::RandomState>,
}

impl<T: Clone + Eq + Hash> Pool<T> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::default(),
        }
    }

    fn add(&mut self, item: T) -> u32 {
        if let Some(&i) = self.index.get(&item) {
            return i as u32;
        }
        let i = self.items.len();
        self.index.insert(item.clone(), i);
        self.items.push(item);
        i as u32
    }
}

/// Label name to stack index, in binding order
#[derive(Debug, Clone, Default)]
struct Env(Vec<(String, i32)>);

impl Env {
    fn bind(&mut self, label: &str, index: i32) {
        match self.0.iter_mut().find(|(l, _)| l == label) {
            Some(entry) => entry.1 = index,
            None => self.0.push((label.to_string(), index)),
        }
    }

    fn params(&self) -> Vec<String> {
        self.0.iter().map(|(l, _)| l.clone()).collect()
    }
}

/// Generation context of one node
#[derive(Debug, Clone, Default)]
struct Ctx {
    sp: i32,
    env: Env,
    action: Option<NodeId>,
}

impl Ctx {
    /// Child context with a copy of the environment and no action
    fn child(&self, sp: i32) -> Ctx {
        Ctx {
            sp,
            env: self.env.clone(),
            action: None,
        }
    }

    /// Child context with an empty environment
    fn isolated(sp: i32) -> Ctx {
        Ctx {
            sp,
            ..Ctx::default()
        }
    }
}

fn op(opcode: Opcode) -> u32 {
    opcode.word()
}

fn condition(head: &[u32], then: Vec<u32>, otherwise: Vec<u32>) -> Result<Vec<u32>, CompileError> {
    let t = stack_effect(&then)?;
    let f = stack_effect(&otherwise)?;
    if t != f {
        return Err(CompileError::Internal(format!(
            "Branches of a condition can't move the stack pointer differently (then: {}, else: {}).",
            t, f
        )));
    }
    let mut code = head.to_vec();
    code.push(then.len() as u32);
    code.push(otherwise.len() as u32);
    code.extend(then);
    code.extend(otherwise);
    Ok(code)
}

fn repeat_while(body: Vec<u32>) -> Result<Vec<u32>, CompileError> {
    let effect = stack_effect(&body)?;
    if effect != 0 {
        return Err(CompileError::Internal(format!(
            "Body of a loop can't move the stack pointer (moved by {}).",
            effect
        )));
    }
    let mut code = vec![op(Opcode::WhileNotError), body.len() as u32];
    code.extend(body);
    Ok(code)
}

/// Regex source of a character class (parts must be non-empty)
pub fn class_pattern(parts: &[ClassPart], inverted: bool) -> String {
    let mut pattern = String::from("[");
    if inverted {
        pattern.push('^');
    }
    for part in parts {
        match part {
            ClassPart::Char(c) => pattern.push_str(&regex::escape(&c.to_string())),
            ClassPart::Range(from, to) => {
                pattern.push_str(&regex::escape(&from.to_string()));
                pattern.push('-');
                pattern.push_str(&regex::escape(&to.to_string()));
            }
        }
    }
    pattern.push(']');
    pattern
}

/// Bytecode and pools for a whole grammar
#[derive(Debug, Clone, Default)]
pub struct Compiled {
    /// Bytecode per rule, in rule order
    pub bytecode: Vec<Vec<u32>>,
    /// Constant pool
    pub consts: Vec<Const>,
    /// Action pool
    pub actions: Vec<ActionDef>,
    /// Grammar defects found while translating
    pub errors: Vec<(String, Option<Location>)>,
}

struct Generator<'g> {
    g: &'g Grammar,
    facts: &'g Facts,
    consts: Pool<Const>,
    actions: Pool<ActionDef>,
    errors: Vec<(String, Option<Location>)>,
}

impl Generator<'_> {
    fn string(&mut self, value: &str) -> u32 {
        self.consts.add(Const::String {
            value: value.to_string(),
        })
    }

    fn expected(&mut self, expected: Expectation) -> u32 {
        self.consts.add(Const::Expected { expected })
    }

    fn regexp(&mut self, pattern: String, ignore_case: bool, multi_line: bool) -> u32 {
        self.consts.add(Const::Regexp {
            pattern,
            ignore_case,
            multi_line,
        })
    }

    fn function(&mut self, env: &Env, code: &str) -> u32 {
        self.actions.add(ActionDef {
            params: env.params(),
            code: code.to_string(),
        })
    }

    /// `CALL f n pc params..`, with parameters as offsets from the top at `sp`
    fn call(&mut self, function: u32, replace: u32, env: &Env, sp: i32) -> Result<Vec<u32>, CompileError> {
        let mut code = vec![op(Opcode::Call), function, replace, env.0.len() as u32];
        for (label, index) in &env.0 {
            let offset = sp - index;
            if offset < 0 {
                return Err(CompileError::Internal(format!(
                    "label \"{}\" at stack index {} is above the top ({})",
                    label, index, sp
                )));
            }
            code.push(offset as u32);
        }
        Ok(code)
    }

    fn rule(&mut self, rule: usize) -> Result<Vec<u32>, CompileError> {
        let root = self.g.rules[rule].expression;
        let code = self.node(root, &mut Ctx::isolated(-1))?;
        let effect = stack_effect(&code)?;
        if effect != 1 {
            return Err(CompileError::Internal(format!(
                "rule \"{}\" leaves {} entries on the stack",
                self.g.rules[rule].name, effect
            )));
        }
        Ok(code)
    }

    fn node(&mut self, node: NodeId, ctx: &mut Ctx) -> Result<Vec<u32>, CompileError> {
        let g = self.g;
        match g.kind(node) {
            NodeKind::Named { name, expression } => {
                let e = self.expected(Expectation::other(name.as_str()));
                let mut code = vec![op(Opcode::SilentFailsOn)];
                code.extend(self.node(*expression, &mut ctx.child(ctx.sp))?);
                code.push(op(Opcode::SilentFailsOff));
                code.extend(condition(
                    &[op(Opcode::IfError)],
                    vec![op(Opcode::Pop), op(Opcode::Fail), e],
                    vec![],
                )?);
                Ok(code)
            }

            NodeKind::Choice { alternatives } => {
                let mut codes = Vec::with_capacity(alternatives.len());
                for &alt in alternatives {
                    codes.push(self.node(alt, &mut ctx.child(ctx.sp))?);
                }
                let mut rest = codes.pop().unwrap_or_default();
                while let Some(mut code) = codes.pop() {
                    let mut then = vec![op(Opcode::Pop)];
                    then.extend(rest);
                    code.extend(condition(&[op(Opcode::IfError)], then, vec![])?);
                    rest = code;
                }
                Ok(rest)
            }

            NodeKind::Action { expression, code } => {
                let emit_call = !matches!(
                    g.kind(*expression),
                    NodeKind::Sequence { elements } if !elements.is_empty()
                );
                let mut inner = Ctx {
                    sp: ctx.sp + i32::from(emit_call),
                    env: ctx.env.clone(),
                    action: Some(node),
                };
                let expression_code = self.node(*expression, &mut inner)?;
                if !emit_call {
                    return Ok(expression_code);
                }

                let f = self.function(&inner.env, code);
                let mut then = vec![op(Opcode::LoadSavedPos), 1];
                then.extend(self.call(f, 1, &inner.env, ctx.sp + 2)?);

                let mut out = vec![op(Opcode::PushCurrPos)];
                out.extend(expression_code);
                out.extend(condition(&[op(Opcode::IfNotError)], then, vec![])?);
                out.push(op(Opcode::Nip));
                Ok(out)
            }

            NodeKind::Sequence { elements } => self.sequence(elements, ctx),

            NodeKind::Labeled { label, expression } => {
                let mut inner = ctx.child(ctx.sp);
                if let Some(label) = label {
                    ctx.env.bind(label, ctx.sp + 1);
                }
                self.node(*expression, &mut inner)
            }

            NodeKind::Text { expression } => {
                let mut code = vec![op(Opcode::PushCurrPos)];
                code.extend(self.node(*expression, &mut ctx.child(ctx.sp + 1))?);
                code.extend(condition(
                    &[op(Opcode::IfNotError)],
                    vec![op(Opcode::Pop), op(Opcode::Text)],
                    vec![op(Opcode::Nip)],
                )?);
                Ok(code)
            }

            NodeKind::SimpleAnd { expression } => self.simple_predicate(*expression, false, ctx),
            NodeKind::SimpleNot { expression } => self.simple_predicate(*expression, true, ctx),

            NodeKind::Optional { expression } => {
                let mut code = self.node(*expression, &mut ctx.child(ctx.sp))?;
                code.extend(condition(
                    &[op(Opcode::IfError)],
                    vec![op(Opcode::Pop), op(Opcode::PushNull)],
                    vec![],
                )?);
                Ok(code)
            }

            NodeKind::ZeroOrMore { expression } => {
                let element = self.node(*expression, &mut ctx.child(ctx.sp + 1))?;
                let mut code = vec![op(Opcode::PushEmptyArray)];
                code.extend(element.iter().copied());
                code.extend(self.append_loop(element)?);
                code.push(op(Opcode::Pop));
                Ok(code)
            }

            NodeKind::OneOrMore { expression } => {
                let element = self.node(*expression, &mut ctx.child(ctx.sp + 1))?;
                let mut then = self.append_loop(element.clone())?;
                then.push(op(Opcode::Pop));
                let mut code = vec![op(Opcode::PushEmptyArray)];
                code.extend(element);
                code.extend(condition(
                    &[op(Opcode::IfNotError)],
                    then,
                    vec![op(Opcode::Pop), op(Opcode::Pop), op(Opcode::PushFailed)],
                )?);
                Ok(code)
            }

            NodeKind::Range {
                min,
                max,
                expression,
                delimiter,
            } => self.range(*min, *max, *expression, *delimiter, ctx.sp),

            NodeKind::SemanticAnd { code } => self.semantic_predicate(code, false, ctx),
            NodeKind::SemanticNot { code } => self.semantic_predicate(code, true, ctx),

            NodeKind::RuleRef { name } => match self.facts.target(node) {
                Some(rule) => Ok(vec![op(Opcode::Rule), rule as u32]),
                None => Err(CompileError::Internal(format!(
                    "reference to rule \"{}\" was not resolved",
                    name
                ))),
            },

            NodeKind::Literal { value, ignore_case } => {
                if value.is_empty() {
                    let c = self.string("");
                    return Ok(vec![op(Opcode::Push), c]);
                }
                let stored = if *ignore_case {
                    value.to_lowercase()
                } else {
                    value.clone()
                };
                let c = self.string(&stored);
                let e = self.expected(Expectation::literal(value));
                if *ignore_case {
                    condition(
                        &[op(Opcode::MatchStringIc), c],
                        vec![op(Opcode::AcceptN), value.chars().count() as u32],
                        vec![op(Opcode::Fail), e],
                    )
                } else {
                    condition(
                        &[op(Opcode::MatchString), c],
                        vec![op(Opcode::AcceptString), c],
                        vec![op(Opcode::Fail), e],
                    )
                }
            }

            NodeKind::Class {
                parts,
                inverted,
                ignore_case,
                raw_text,
            } => {
                for part in parts {
                    if let ClassPart::Range(from, to) = part {
                        if from > to {
                            self.errors.push((
                                format!("Invalid character range: {}-{}.", from, to),
                                g.node(node).location,
                            ));
                        }
                    }
                }
                let e = self.expected(Expectation::class(raw_text));
                if parts.is_empty() {
                    return if *inverted {
                        condition(
                            &[op(Opcode::MatchAny)],
                            vec![op(Opcode::AcceptN), 1],
                            vec![op(Opcode::Fail), e],
                        )
                    } else {
                        Ok(vec![op(Opcode::Fail), e])
                    };
                }
                let r = self.regexp(class_pattern(parts, *inverted), *ignore_case, false);
                condition(
                    &[op(Opcode::MatchRegexp), r],
                    vec![op(Opcode::AcceptN), 1],
                    vec![op(Opcode::Fail), e],
                )
            }

            NodeKind::Regex {
                value,
                ignore_case,
                multi_line,
                raw_text,
            } => {
                let anchored = regex_cache::anchored(value, *ignore_case, *multi_line);
                if regex_cache::get_or_compile(&anchored).is_none() {
                    self.errors.push((
                        format!("Invalid regular expression {}.", raw_text),
                        g.node(node).location,
                    ));
                }
                let r = self.regexp(value.clone(), *ignore_case, *multi_line);
                let e = self.expected(Expectation::regex(raw_text));
                condition(
                    &[op(Opcode::MatchRegexp), r],
                    vec![op(Opcode::AcceptRegexp), r],
                    vec![op(Opcode::Fail), e],
                )
            }

            NodeKind::Any => {
                let e = self.expected(Expectation::any());
                condition(
                    &[op(Opcode::MatchAny)],
                    vec![op(Opcode::AcceptN), 1],
                    vec![op(Opcode::Fail), e],
                )
            }

            NodeKind::Epsilon => {
                let c = self.string("");
                Ok(vec![op(Opcode::Push), c])
            }

            NodeKind::Code { code } => {
                let f = self.function(&ctx.env, code);
                let e = self.expected(Expectation::code(code));
                let mut out = vec![op(Opcode::UpdateSavedPos)];
                out.extend(self.call(f, 0, &ctx.env, ctx.sp)?);
                out.extend(condition(
                    &[op(Opcode::IfError)],
                    vec![op(Opcode::Pop), op(Opcode::Fail), e],
                    vec![],
                )?);
                Ok(out)
            }
        }
    }

    fn sequence(&mut self, elements: &[NodeId], ctx: &mut Ctx) -> Result<Vec<u32>, CompileError> {
        // Labels bound by elements are visible to later elements and to the
        // action, but never outside a sequence that has no action.
        let mut env = if ctx.action.is_some() {
            std::mem::take(&mut ctx.env)
        } else {
            ctx.env.clone()
        };

        let mut codes = Vec::with_capacity(elements.len());
        for (i, &element) in elements.iter().enumerate() {
            let mut inner = Ctx {
                sp: ctx.sp + 1 + i as i32,
                env,
                action: None,
            };
            codes.push(self.node(element, &mut inner)?);
            env = inner.env;
        }

        let n = elements.len() as u32;
        let top = ctx.sp + 1 + n as i32;
        let g = self.g;
        let mut tail = match ctx.action.map(|a| g.kind(a)) {
            Some(NodeKind::Action { code, .. }) => {
                let f = self.function(&env, code);
                let mut tail = vec![op(Opcode::LoadSavedPos), n];
                tail.extend(self.call(f, n, &env, top)?);
                tail.push(op(Opcode::Nip));
                tail
            }
            _ => vec![op(Opcode::Wrap), n, op(Opcode::Nip)],
        };

        for (i, code) in codes.into_iter().enumerate().rev() {
            let processed = i as u32 + 1;
            let mut cleanup = if processed > 1 {
                vec![op(Opcode::PopN), processed]
            } else {
                vec![op(Opcode::Pop)]
            };
            cleanup.push(op(Opcode::PopCurrPos));
            cleanup.push(op(Opcode::PushFailed));

            let mut block = code;
            block.extend(condition(&[op(Opcode::IfNotError)], tail, cleanup)?);
            tail = block;
        }

        if ctx.action.is_some() {
            ctx.env = env;
        }

        let mut code = vec![op(Opcode::PushCurrPos)];
        code.extend(tail);
        Ok(code)
    }

    fn simple_predicate(&mut self, expression: NodeId, negative: bool, ctx: &Ctx) -> Result<Vec<u32>, CompileError> {
        let mut code = vec![op(Opcode::PushCurrPos), op(Opcode::SilentFailsOn)];
        code.extend(self.node(expression, &mut ctx.child(ctx.sp + 1))?);
        code.push(op(Opcode::SilentFailsOff));

        let (test, matched, unmatched) = if negative {
            (Opcode::IfError, Opcode::Pop, Opcode::PopCurrPos)
        } else {
            (Opcode::IfNotError, Opcode::PopCurrPos, Opcode::Pop)
        };
        code.extend(condition(
            &[op(test)],
            vec![op(Opcode::Pop), op(matched), op(Opcode::PushUndefined)],
            vec![op(Opcode::Pop), op(unmatched), op(Opcode::PushFailed)],
        )?);
        Ok(code)
    }

    fn semantic_predicate(&mut self, code: &str, negative: bool, ctx: &Ctx) -> Result<Vec<u32>, CompileError> {
        let f = self.function(&ctx.env, code);
        let mut out = vec![op(Opcode::UpdateSavedPos), op(Opcode::SilentFailsOn)];
        out.extend(self.call(f, 0, &ctx.env, ctx.sp)?);
        out.push(op(Opcode::SilentFailsOff));

        let (truthy, falsy) = if negative {
            (Opcode::PushFailed, Opcode::PushUndefined)
        } else {
            (Opcode::PushUndefined, Opcode::PushFailed)
        };
        out.extend(condition(
            &[op(Opcode::If)],
            vec![op(Opcode::Pop), op(truthy)],
            vec![op(Opcode::Pop), op(falsy)],
        )?);
        Ok(out)
    }

    fn append_loop(&mut self, element: Vec<u32>) -> Result<Vec<u32>, CompileError> {
        let mut body = vec![op(Opcode::Append)];
        body.extend(element);
        repeat_while(body)
    }

    fn range(
        &mut self,
        min: u32,
        max: Option<u32>,
        expression: NodeId,
        delimiter: Option<NodeId>,
        sp: i32,
    ) -> Result<Vec<u32>, CompileError> {
        if max == Some(0) && min == 0 {
            return Ok(vec![op(Opcode::PushEmptyArray)]);
        }

        // With a minimum, a saved position sits below the array.
        let base = if min > 0 { sp + 1 } else { sp };
        let element = self.node(expression, &mut Ctx::isolated(base + 1))?;

        let body = match delimiter {
            Some(delimiter) => {
                let mut code = vec![op(Opcode::PushCurrPos)];
                code.extend(self.node(delimiter, &mut Ctx::isolated(base + 2))?);

                let mut then = vec![op(Opcode::Pop)];
                then.extend(self.node(expression, &mut Ctx::isolated(base + 2))?);
                then.extend(condition(
                    &[op(Opcode::IfError)],
                    vec![op(Opcode::Pop), op(Opcode::PopCurrPos), op(Opcode::PushFailed)],
                    vec![op(Opcode::Nip)],
                )?);
                code.extend(condition(&[op(Opcode::IfNotError)], then, vec![op(Opcode::Nip)])?);
                code
            }
            None => element.clone(),
        };

        let check_max = match max {
            Some(max) => condition(&[op(Opcode::IfArrlenMax), max], vec![op(Opcode::PushFailed)], body)?,
            None => body,
        };

        let mut main = vec![op(Opcode::PushEmptyArray)];
        main.extend(element);
        main.extend(self.append_loop(check_max)?);
        main.push(op(Opcode::Pop));

        if min == 0 {
            return Ok(main);
        }

        let mut code = vec![op(Opcode::PushCurrPos)];
        code.extend(main);
        code.extend(condition(
            &[op(Opcode::IfArrlenMin), min],
            vec![op(Opcode::Pop), op(Opcode::PopCurrPos), op(Opcode::PushFailed)],
            vec![op(Opcode::Nip)],
        )?);
        Ok(code)
    }
}

/// Compile every rule of a linked grammar
pub fn compile(g: &Grammar, facts: &Facts) -> Result<Compiled, CompileError> {
    let mut generator = Generator {
        g,
        facts,
        consts: Pool::new(),
        actions: Pool::new(),
        errors: Vec::new(),
    };

    let mut bytecode = Vec::with_capacity(g.rules.len());
    for rule in 0..g.rules.len() {
        bytecode.push(generator.rule(rule)?);
    }

    Ok(Compiled {
        bytecode,
        consts: generator.consts.items,
        actions: generator.actions.items,
        errors: generator.errors,
    })
}

/// Generate pass: compile the grammar into the session's program
pub fn run(s: &mut Session<'_>) -> Result<(), CompileError> {
    let compiled = compile(&s.grammar, &s.facts)?;
    for (message, location) in compiled.errors {
        s.diagnostics.error(message, location);
    }

    let rules = s
        .grammar
        .rules
        .iter()
        .zip(compiled.bytecode)
        .enumerate()
        .map(|(i, (rule, bytecode))| RuleCode {
            name: rule.name.clone(),
            memoize: s.facts.rules.get(i).is_some_and(|r| r.memoize),
            bytecode,
        })
        .collect();

    let starters = s.facts.starter_indices(&s.grammar);
    let default_start = starters.first().copied().unwrap_or(0);
    log_debug!(
        "compiled {} rule(s): {} constant(s), {} action(s)",
        s.grammar.rules.len(),
        compiled.consts.len(),
        compiled.actions.len()
    );

    s.program = Some(Program::new(
        rules,
        compiled.consts,
        compiled.actions,
        starters,
        default_start,
        s.facts.memoize,
        s.options.trace,
        s.facts.statistics,
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::dsl::*;
    use crate::compiler::opcodes::decompile;

    fn compiled(b: GrammarBuilder) -> Compiled {
        let g = b.build();
        let facts = Facts::linked(&g);
        compile(&g, &facts).unwrap()
    }

    fn mnemonics(code: &[u32]) -> Vec<&'static str> {
        decompile(code).unwrap().into_iter().map(|i| i.mnemonic).collect()
    }

    #[test]
    fn test_literal() {
        let c = compiled(GrammarBuilder::new().rule("start", lit("a")));
        assert_eq!(c.bytecode[0], vec![16, 0, 2, 2, 20, 0, 21, 1]);
        assert_eq!(
            c.consts,
            vec![
                Const::String {
                    value: "a".to_string()
                },
                Const::Expected {
                    expected: Expectation::literal("a")
                },
            ]
        );
    }

    #[test]
    fn test_literal_ignore_case_stores_lowercase() {
        let c = compiled(GrammarBuilder::new().rule("start", lit_ic("AbC")));
        assert_eq!(c.bytecode[0], vec![17, 0, 2, 2, 19, 3, 21, 1]);
        assert_eq!(
            c.consts[0],
            Const::String {
                value: "abc".to_string()
            }
        );
    }

    #[test]
    fn test_sequence_cleanup_counts() {
        let c = compiled(GrammarBuilder::new().rule("start", seq(vec![lit("a"), lit("b")])));
        let code = &c.bytecode[0];
        assert_eq!(stack_effect(code).unwrap(), 1);
        let names = mnemonics(code);
        assert_eq!(names.first(), Some(&"PUSH_CURR_POS"));
        assert!(names.contains(&"WRAP"));
        assert!(names.contains(&"POP_N"));
        assert_eq!(names.iter().filter(|n| **n == "POP_CURR_POS").count(), 2);
    }

    #[test]
    fn test_constants_deduplicated() {
        let c = compiled(GrammarBuilder::new().rule("start", choice(vec![lit("a"), lit("a"), lit("b")])));
        assert_eq!(c.consts.len(), 4);
    }

    #[test]
    fn test_action_parameters() {
        let c = compiled(GrammarBuilder::new().rule(
            "start",
            action(seq(vec![label("x", lit("a")), lit("-"), label("y", lit("b"))]), "pair"),
        ));
        assert_eq!(
            c.actions,
            vec![ActionDef {
                params: vec!["x".to_string(), "y".to_string()],
                code: "pair".to_string(),
            }]
        );
        let listing = decompile(&c.bytecode[0]).unwrap();
        let call = listing.iter().find(|i| i.mnemonic == "CALL").unwrap();
        // f=0, replace 3, 2 params: x is 2 below the top, y is the top
        assert_eq!(call.operands, vec![0, 3, 2, 2, 0]);
    }

    #[test]
    fn test_action_on_single_expression() {
        let c = compiled(GrammarBuilder::new().rule("start", action(label("v", any()), "v")));
        let names = mnemonics(&c.bytecode[0]);
        assert_eq!(names[0], "PUSH_CURR_POS");
        assert!(names.contains(&"LOAD_SAVED_POS"));
        assert_eq!(names.last(), Some(&"NIP"));
        let listing = decompile(&c.bytecode[0]).unwrap();
        let call = listing.iter().find(|i| i.mnemonic == "CALL").unwrap();
        assert_eq!(call.operands, vec![0, 1, 1, 0]);
    }

    #[test]
    fn test_labels_do_not_leak_out_of_plain_sequence() {
        let c = compiled(GrammarBuilder::new().rule(
            "start",
            action(seq(vec![seq(vec![label("inner", lit("a"))]), label("outer", lit("b"))]), "f"),
        ));
        assert_eq!(c.actions[0].params, vec!["outer".to_string()]);
    }

    #[test]
    fn test_range_shapes() {
        let c = compiled(GrammarBuilder::new().rule("start", range(0, Some(0), lit("a"), None)));
        assert_eq!(c.bytecode[0], vec![29]);

        let c = compiled(GrammarBuilder::new().rule("start", range(2, Some(4), lit("a"), Some(lit(",")))));
        let names = mnemonics(&c.bytecode[0]);
        assert!(names.contains(&"IF_ARRLEN_MAX"));
        assert!(names.contains(&"IF_ARRLEN_MIN"));
        assert_eq!(stack_effect(&c.bytecode[0]).unwrap(), 1);
    }

    #[test]
    fn test_class_and_regex() {
        let c = compiled(GrammarBuilder::new().rule(
            "start",
            seq(vec![
                class(vec![ClassPart::Range('a', 'z'), ClassPart::Char('-')], false),
                regex("[0-9]+"),
            ]),
        ));
        assert!(c.consts.contains(&Const::Regexp {
            pattern: r"[a-z\-]".to_string(),
            ignore_case: false,
            multi_line: false,
        }));
        assert!(mnemonics(&c.bytecode[0]).contains(&"ACCEPT_REGEXP"));
        assert!(c.errors.is_empty());
    }

    #[test]
    fn test_invalid_class_range_reported() {
        let c = compiled(GrammarBuilder::new().rule("start", class(vec![ClassPart::Range('z', 'a')], false)));
        assert_eq!(c.errors.len(), 1);
        assert!(c.errors[0].0.starts_with("Invalid character range"));
    }

    #[test]
    fn test_stack_effect_rejects_unbalanced_branches() {
        // IF_ERROR [POP] []
        let code = [10, 1, 0, 2];
        assert!(matches!(stack_effect(&code), Err(CompileError::Internal(_))));
        // WHILE_NOT_ERROR [PUSH_NULL]
        let code = [14, 1, 27];
        assert!(matches!(stack_effect(&code), Err(CompileError::Internal(_))));
    }

    #[test]
    fn test_named_reports_display_name() {
        let c = compiled(GrammarBuilder::new().rule("start", named("number", lit("1"))));
        assert!(c.consts.contains(&Const::Expected {
            expected: Expectation::other("number")
        }));
        let names = mnemonics(&c.bytecode[0]);
        assert_eq!(names[0], "SILENT_FAILS_ON");
        assert!(!names.contains(&"SILENT_FAILS_RESET"));
    }
}
