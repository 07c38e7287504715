//! Inline backend: one Rust function per rule
//!
//! Rules are lowered to slot routines first, then each statement becomes
//! one line of Rust over `ParserState`. Slot `s0` holds the result.

use super::{actions, entry_points, prelude, program_fn, SourceWriter};
use crate::compiler::ast::Grammar;
use crate::compiler::diagnostics::CompileError;
use crate::compiler::session::Facts;
use crate::runtime::inline::{lower, Cond, Expr, Routine, Stmt};
use crate::runtime::program::{Const, Program};
use std::collections::BTreeSet;

fn cond(c: &Cond) -> String {
    match *c {
        Cond::Truthy(s) => format!("s{}.is_truthy()", s),
        Cond::IsFailed(s) => format!("s{}.is_failed()", s),
        Cond::NotFailed(s) => format!("!s{}.is_failed()", s),
        Cond::MatchAny => "state.match_any()".to_string(),
        Cond::MatchString(c) => format!("state.match_string({})", c),
        Cond::MatchStringIc(c) => format!("state.match_string_ic({})", c),
        Cond::MatchRegexp(c) => format!("state.match_regexp({})", c),
        Cond::ArrLenLess(s, n) => format!("s{}.array_len() < {}", s, n),
        Cond::ArrLenAtLeast(s, n) => format!("s{}.array_len() >= {}", s, n),
    }
}

fn expr(e: &Expr) -> String {
    match e {
        Expr::Const(c) => format!("state.constant({})", c),
        Expr::CurrPos => "state.push_curr_pos()".to_string(),
        Expr::Take(s) => format!("s{}.take()", s),
        Expr::Undefined => "Slot::Value(Value::Undefined)".to_string(),
        Expr::Null => "Slot::Value(Value::Null)".to_string(),
        Expr::Failed => "state.push_failed()".to_string(),
        Expr::EmptyArray => "Slot::empty_array()".to_string(),
        Expr::Wrap(first, n) => {
            let items = (*first..first + n)
                .map(|s| format!("s{}.take()", s))
                .collect::<Vec<_>>()
                .join(", ");
            format!("Slot::wrap(vec![{}])", items)
        }
        Expr::Text(s) => format!("state.text(&s{})", s),
        Expr::AcceptN(n) => format!("state.accept_n({})", n),
        Expr::AcceptString(c) => format!("state.accept_string({})", c),
        Expr::AcceptRegexp(c) => format!("state.accept_regexp({})", c),
        Expr::Fail(c) => format!("state.fail({})", c),
        Expr::Call { action, args } => {
            let args = args
                .iter()
                .map(|s| format!("s{}.to_value()", s))
                .collect::<Vec<_>>()
                .join(", ");
            format!("state.call({}, &[{}])?", action, args)
        }
        Expr::Rule(r) => format!("rule_{}(state)?", r),
    }
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

struct Renderer<'p> {
    program: &'p Program,
}

impl Renderer<'_> {
    fn comment(&self, e: &Expr) -> Option<String> {
        match e {
            Expr::Fail(c) => match self.program.consts.get(*c) {
                Some(Const::Expected { expected }) => Some(format!(" // {}", one_line(&expected.description))),
                _ => None,
            },
            Expr::Rule(r) => self.program.rules.get(*r).map(|rule| format!(" // {}", rule.name)),
            _ => None,
        }
    }

    fn block(&self, w: &mut SourceWriter, body: &[Stmt]) {
        for stmt in body {
            match stmt {
                Stmt::Assign(slot, e) => {
                    let note = self.comment(e).unwrap_or_default();
                    w.line(format!("s{} = {};{}", slot, expr(e), note));
                }
                Stmt::RestorePos(s) => w.line(format!("state.restore_pos(&s{});", s)),
                Stmt::LoadSavedPos(s) => w.line(format!("state.load_saved_pos(&s{});", s)),
                Stmt::UpdateSavedPos => w.line("state.update_saved_pos();"),
                Stmt::SilentOn => w.line("state.silent_fails_on();"),
                Stmt::SilentOff => w.line("state.silent_fails_off();"),
                Stmt::SilentReset => w.line("state.silent_fails_reset();"),
                Stmt::Append(array, item) => w.line(format!("let item = s{}.take(); s{}.push(item);", item, array)),
                Stmt::If {
                    cond: c,
                    then,
                    otherwise,
                } => {
                    w.open(format!("if {} {{", cond(c)));
                    self.block(w, then);
                    if otherwise.is_empty() {
                        w.close("}");
                    } else {
                        w.reopen("} else {");
                        self.block(w, otherwise);
                        w.close("}");
                    }
                }
                Stmt::While { cond: c, body } => {
                    w.open(format!("while {} {{", cond(c)));
                    self.block(w, body);
                    w.close("}");
                }
            }
        }
    }

    fn routine(&self, w: &mut SourceWriter, routine: &Routine, parts: &BTreeSet<&str>) {
        w.line(format!("/// `{}`", routine.name));
        if !parts.is_empty() {
            w.line("///");
            w.line(format!("/// Parts: {}", parts.iter().copied().collect::<Vec<_>>().join(", ")));
        }
        w.open(format!(
            "fn rule_{}(state: &mut ParserState<'_>) -> Result<Slot, ParseFailure> {{",
            routine.rule
        ));
        w.open(format!("state.rule({}, |state| {{", routine.rule));
        for slot in 0..routine.slots.max(1) {
            w.line(format!("let mut s{} = Slot::Failed;", slot));
        }
        self.block(w, &routine.body);
        w.line("Ok(s0)");
        w.close("})");
        w.close("}");
        w.blank();
    }
}

/// Display names and labels found in a rule, other than the rule name
fn described_parts<'a>(g: &Grammar, facts: &'a Facts, rule: usize) -> BTreeSet<&'a str> {
    let name = g.rules.get(rule).map_or("", |r| r.name.as_str());
    g.rule_nodes(rule)
        .into_iter()
        .filter_map(|n| facts.description(n))
        .filter(|d| *d != name)
        .collect()
}

/// Emit a module with one function per rule
pub fn render(g: &Grammar, facts: &Facts, program: &Program) -> Result<String, CompileError> {
    let routines = lower(program).map_err(|e| CompileError::Internal(e.to_string()))?;
    let renderer = Renderer { program };

    let mut w = SourceWriter::new();
    prelude(&mut w, g, "inline");
    program_fn(&mut w, program, false);
    actions(&mut w, &program.actions);
    entry_points(&mut w);

    w.open("fn run(input: &str, options: ParseOptions<'_>, statistics: Option<&mut Statistics>) -> Result<Value, ParseFailure> {");
    w.line("let program = program();");
    w.line("let start = program.start_index(options.start_rule)?;");
    w.line("let mut actions = Actions;");
    w.line("let tracer = options.tracer.map(|t| t as &mut dyn Tracer);");
    w.line("let mut state = ParserState::new(input, program, &mut actions, tracer, statistics);");
    w.line("let result = rule(&mut state, start)?;");
    w.line("state.finish(result)");
    w.close("}");
    w.blank();

    w.open("fn rule(state: &mut ParserState<'_>, index: usize) -> Result<Slot, ParseFailure> {");
    w.open("match index {");
    for routine in &routines {
        w.line(format!("{} => rule_{}(state),", routine.rule, routine.rule));
    }
    w.line("_ => Ok(Slot::Failed),");
    w.close("}");
    w.close("}");
    w.blank();

    for routine in &routines {
        renderer.routine(&mut w, routine, &described_parts(g, facts, routine.rule));
    }
    Ok(w.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::bytecode;
    use crate::compiler::dsl::*;
    use crate::compiler::passes;
    use crate::compiler::diagnostics::Diagnostics;
    use crate::compiler::options::CompileOptions;
    use crate::compiler::session::Session;
    use crate::runtime::program::RuleCode;

    fn render_grammar(b: GrammarBuilder) -> String {
        let mut s = Session::new(b.build(), CompileOptions::default(), Diagnostics::new());
        passes::link::run(&mut s).unwrap();
        passes::descriptions::run(&mut s).unwrap();
        let compiled = bytecode::compile(&s.grammar, &s.facts).unwrap();
        let rules = s
            .grammar
            .rules
            .iter()
            .zip(compiled.bytecode)
            .map(|(r, bytecode)| RuleCode {
                name: r.name.clone(),
                memoize: false,
                bytecode,
            })
            .collect();
        let program = Program::new(rules, compiled.consts, compiled.actions, vec![0], 0, false, false, false);
        render(&s.grammar, &s.facts, &program).unwrap()
    }

    #[test]
    fn test_rule_functions() {
        let source = render_grammar(
            GrammarBuilder::new()
                .rule("start", seq(vec![rule_ref("digit"), lit("+")]))
                .rule("digit", named("digit", class(vec![crate::compiler::ast::ClassPart::Range('0', '9')], false))),
        );
        assert!(source.contains("fn rule_0(state: &mut ParserState<'_>) -> Result<Slot, ParseFailure> {"));
        assert!(source.contains("fn rule_1(state: &mut ParserState<'_>)"));
        assert!(source.contains("= rule_1(state)?; // digit"));
        assert!(source.contains("state.fail("));
        assert!(source.contains("// \"+\""));
        assert!(source.contains("0 => rule_0(state),"));
        assert!(source.contains("bytecode: vec![]"));
    }

    #[test]
    fn test_loops_and_branches() {
        let source = render_grammar(GrammarBuilder::new().rule("start", star(choice(vec![lit("a"), lit("b")]))));
        assert!(source.contains("while !s1.is_failed() {"));
        assert!(source.contains("if s1.is_failed() {"));
        assert!(source.contains("s0.push(item);"));
    }

    #[test]
    fn test_labels_listed_as_parts() {
        let source = render_grammar(
            GrammarBuilder::new().rule("start", action(seq(vec![label("lhs", any()), label("rhs", any())]), "Ok(Value::Null)")),
        );
        assert!(source.contains("/// Parts: lhs, rhs"));
    }
}
