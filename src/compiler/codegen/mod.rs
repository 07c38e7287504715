//! Rust source emission
//!
//! Both backends emit one self-contained module that depends only on
//! `pegc::runtime`:
//!
//! - [`interpreter`] embeds the program tables and runs them through the
//!   shared bytecode loop (smaller output).
//! - [`inline`] renders every rule as its own function over numbered
//!   slots (faster output).
//!
//! Each module exposes `program()`, `parse(input, options)`,
//! `parse_with_statistics(input, options)` and an `Actions` handler with
//! one function per action, whose body is the action code.

pub mod inline;
pub mod interpreter;

use super::ast::Grammar;
use super::diagnostics::CompileError;
use super::options::{Optimize, OutputKind};
use super::session::{Facts, Session};
use crate::runtime::error::{Expectation, ExpectationKind};
use crate::runtime::program::{ActionDef, Const, Program};

/// Indentation-aware string builder
#[derive(Debug, Default)]
pub struct SourceWriter {
    out: String,
    depth: usize,
}

impl SourceWriter {
    /// Empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one line at the current indentation
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.depth {
                self.out.push_str("    ");
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    /// Write several lines verbatim, each at the current indentation
    pub fn lines(&mut self, text: &str) {
        for l in text.lines() {
            self.line(l);
        }
    }

    /// Empty line
    pub fn blank(&mut self) {
        self.out.push('\n');
    }

    /// Write `open` and indent
    pub fn open(&mut self, open: impl AsRef<str>) {
        self.line(open);
        self.depth += 1;
    }

    /// Dedent, write `text` and indent again
    pub fn reopen(&mut self, text: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.line(text);
        self.depth += 1;
    }

    /// Dedent and write `close`
    pub fn close(&mut self, close: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.line(close);
    }

    /// The text written so far
    pub fn finish(self) -> String {
        self.out
    }
}

/// Rust string literal for `s`
pub fn string_literal(s: &str) -> String {
    format!("{:?}", s)
}

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern", "false", "fn",
    "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref", "return",
    "static", "struct", "trait", "true", "type", "unsafe", "use", "where", "while", "abstract", "become",
    "box", "do", "final", "macro", "override", "priv", "try", "typeof", "unsized", "virtual", "yield",
];

/// A label usable as a Rust parameter name
pub fn identifier(label: &str) -> String {
    let mut ident: String = label
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    match ident.as_str() {
        "self" | "Self" | "super" | "crate" => format!("{}_", ident),
        k if KEYWORDS.contains(&k) => format!("r#{}", ident),
        _ => ident,
    }
}

fn expectation_literal(e: &Expectation) -> String {
    let kind = match e.kind {
        ExpectationKind::Literal => "Literal",
        ExpectationKind::Class => "Class",
        ExpectationKind::Any => "Any",
        ExpectationKind::Regex => "Regex",
        ExpectationKind::Code => "Code",
        ExpectationKind::Other => "Other",
        ExpectationKind::End => "End",
    };
    let value = match &e.value {
        Some(v) => format!("Some({}.to_string())", string_literal(v)),
        None => "None".to_string(),
    };
    format!(
        "Expectation {{ kind: ExpectationKind::{}, value: {}, description: {}.to_string() }}",
        kind,
        value,
        string_literal(&e.description)
    )
}

fn const_literal(c: &Const) -> String {
    match c {
        Const::String { value } => format!("Const::String {{ value: {}.to_string() }}", string_literal(value)),
        Const::Regexp {
            pattern,
            ignore_case,
            multi_line,
        } => format!(
            "Const::Regexp {{ pattern: {}.to_string(), ignore_case: {}, multi_line: {} }}",
            string_literal(pattern),
            ignore_case,
            multi_line
        ),
        Const::Expected { expected } => format!("Const::Expected {{ expected: {} }}", expectation_literal(expected)),
    }
}

fn list<T>(items: &[T], render: impl Fn(&T) -> String) -> String {
    items.iter().map(render).collect::<Vec<_>>().join(", ")
}

/// Header, initializer and imports shared by both backends
fn prelude(w: &mut SourceWriter, g: &Grammar, backend: &str) {
    w.line(format!(
        "//! Parser generated by pegc {} ({} backend). Do not edit.",
        env!("CARGO_PKG_VERSION"),
        backend
    ));
    w.blank();
    w.line("#![allow(dead_code, unused_mut, unused_variables, unused_assignments, clippy::all)]");
    w.blank();
    w.line("use pegc::runtime::*;");
    w.line("use std::sync::OnceLock;");
    w.blank();
    if let Some(init) = g.initializer.as_deref().filter(|i| !i.trim().is_empty()) {
        w.lines(init);
        w.blank();
    }
}

/// `program()` with the tables written out as literals
fn program_fn(w: &mut SourceWriter, program: &Program, keep_bytecode: bool) {
    w.line("/// The compiled program");
    w.open("pub fn program() -> &'static Program {");
    w.line("static PROGRAM: OnceLock<Program> = OnceLock::new();");
    w.open("PROGRAM.get_or_init(|| {");
    w.open("Program::new(");

    w.open("vec![");
    for rule in &program.rules {
        let bytecode = if keep_bytecode {
            list(&rule.bytecode, |word| word.to_string())
        } else {
            String::new()
        };
        w.line(format!(
            "RuleCode {{ name: {}.to_string(), memoize: {}, bytecode: vec![{}] }},",
            string_literal(&rule.name),
            rule.memoize,
            bytecode
        ));
    }
    w.close("],");

    w.open("vec![");
    for c in &program.consts {
        w.line(format!("{},", const_literal(c)));
    }
    w.close("],");

    w.open("vec![");
    for def in &program.actions {
        w.line(format!(
            "ActionDef {{ params: vec![{}], code: {}.to_string() }},",
            list(&def.params, |p| format!("{}.to_string()", string_literal(p))),
            string_literal(&def.code)
        ));
    }
    w.close("],");

    w.line(format!("vec![{}],", list(&program.starters, |s| s.to_string())));
    w.line(format!("{},", program.default_start));
    w.line(format!("{},", program.memoize));
    w.line(format!("{},", program.trace));
    w.line(format!("{},", program.statistics));
    w.close(")");
    w.close("})");
    w.close("}");
    w.blank();
}

/// The `Actions` handler and one function per action
fn actions(w: &mut SourceWriter, actions: &[ActionDef]) {
    w.line("/// Runs the grammar's actions, predicates and code terminals");
    w.line("#[derive(Debug, Clone, Copy, Default)]");
    w.line("pub struct Actions;");
    w.blank();
    w.open("impl ActionHandler for Actions {");
    w.open("fn call(&mut self, index: usize, _def: &ActionDef, ctx: &ActionContext<'_>, args: &[Value]) -> ActionResult {");
    w.open("match index {");
    for (i, def) in actions.iter().enumerate() {
        let args = (0..def.params.len())
            .map(|p| format!(", args.get({}).unwrap_or(&Value::Undefined)", p))
            .collect::<String>();
        w.line(format!("{} => action_{}(ctx{}),", i, i, args));
    }
    w.line("_ => Err(ActionError::Unbound),");
    w.close("}");
    w.close("}");
    w.close("}");

    for (i, def) in actions.iter().enumerate() {
        let params = def
            .params
            .iter()
            .map(|p| format!(", {}: &Value", identifier(p)))
            .collect::<String>();
        w.blank();
        w.open(format!("fn action_{}(ctx: &ActionContext<'_>{}) -> ActionResult {{", i, params));
        w.lines(&def.code);
        w.close("}");
    }
    w.blank();
}

/// `parse` and `parse_with_statistics` around a backend-specific `run`
fn entry_points(w: &mut SourceWriter) {
    w.line("/// Parse `input` from the requested or default start rule");
    w.open("pub fn parse(input: &str, options: ParseOptions<'_>) -> Result<Value, ParseFailure> {");
    w.line("run(input, options, None)");
    w.close("}");
    w.blank();
    w.line("/// Parse `input` and return the run-time statistics of this parse");
    w.open("pub fn parse_with_statistics(input: &str, options: ParseOptions<'_>) -> (Result<Value, ParseFailure>, Statistics) {");
    w.line("let program = program();");
    w.line("let mut statistics = Statistics::new(program.rules.iter().map(|r| (r.name.as_str(), r.memoize && program.memoize)));");
    w.line("let result = run(input, options, Some(&mut statistics));");
    w.line("(result, statistics)");
    w.close("}");
    w.blank();
}

/// Render the emitted module for a compiled session
pub fn render(g: &Grammar, facts: &Facts, program: &Program, optimize: Optimize) -> Result<String, CompileError> {
    match optimize {
        Optimize::Size => Ok(interpreter::render(g, program)),
        Optimize::Speed => inline::render(g, facts, program),
    }
}

/// Generate pass: emit source when it was requested
pub fn run(s: &mut Session<'_>) -> Result<(), CompileError> {
    if !s.options.output.wants(OutputKind::Source) {
        return Ok(());
    }
    let Some(program) = s.program.as_ref() else {
        return Err(CompileError::Internal("source requested before bytecode generation".to_string()));
    };
    let source = render(&s.grammar, &s.facts, program, s.options.optimize)?;
    log_debug!("emitted {} bytes of source", source.len());
    s.source = Some(source);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_indents() {
        let mut w = SourceWriter::new();
        w.open("fn f() {");
        w.line("x();");
        w.blank();
        w.close("}");
        assert_eq!(w.finish(), "fn f() {\n    x();\n\n}\n");
    }

    #[test]
    fn test_identifier() {
        assert_eq!(identifier("value"), "value");
        assert_eq!(identifier("type"), "r#type");
        assert_eq!(identifier("self"), "self_");
        assert_eq!(identifier("1st"), "_1st");
        assert_eq!(identifier("a-b"), "a_b");
    }

    #[test]
    fn test_const_literals() {
        assert_eq!(
            const_literal(&Const::String {
                value: "a\"b".to_string()
            }),
            r#"Const::String { value: "a\"b".to_string() }"#
        );
        let expected = const_literal(&Const::Expected {
            expected: Expectation::any(),
        });
        assert!(expected.contains("ExpectationKind::Any"));
        assert!(expected.contains("value: None"));
    }
}
