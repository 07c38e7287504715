//! Interpreter backend: program tables plus the shared bytecode loop

use super::{actions, entry_points, prelude, program_fn, SourceWriter};
use crate::compiler::ast::Grammar;
use crate::runtime::program::Program;

/// Emit a module running `program` through `pegc::runtime::interpreter`
pub fn render(g: &Grammar, program: &Program) -> String {
    let mut w = SourceWriter::new();
    prelude(&mut w, g, "interpreter");
    program_fn(&mut w, program, true);
    actions(&mut w, &program.actions);
    entry_points(&mut w);

    w.open("fn run(input: &str, options: ParseOptions<'_>, statistics: Option<&mut Statistics>) -> Result<Value, ParseFailure> {");
    w.line("let program = program();");
    w.line("let start = program.start_index(options.start_rule)?;");
    w.line("let mut actions = Actions;");
    w.line("let tracer = options.tracer.map(|t| t as &mut dyn Tracer);");
    w.line("let state = ParserState::new(input, program, &mut actions, tracer, statistics);");
    w.line("interpreter::parse(state, start)");
    w.close("}");
    w.finish()
}
