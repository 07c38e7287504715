//! Grammar compiler
//!
//! Turns a grammar AST into a runnable parser, Rust source, or both.
//!
//! # Architecture
//!
//! ```text
//! Grammar ──► prepare ──► check ──► transform ──► generate ──► CompileOutput
//!              link        rules     proxies       bytecode
//!              stats       recursion labels        source
//!              describe    loops     consumption
//!                          labels    memoization
//! ```
//!
//! Passes read and write [`Facts`](session::Facts), a set of side tables
//! keyed by node id or rule index. The tree itself only changes when a
//! transform removes rules or rewrites references.
//!
//! # Example
//!
//! ```
//! use pegc::compiler::{compile, dsl::*, CompileOptions};
//! use pegc::runtime::{ParseOptions, Value};
//!
//! let grammar = GrammarBuilder::new()
//!     .rule("start", seq(vec![lit("a"), lit("b")]))
//!     .build();
//! let output = compile(grammar, CompileOptions::default(), None).unwrap();
//! let mut parser = output.parser.unwrap();
//! let value = parser.parse("ab", ParseOptions::new()).unwrap();
//! assert_eq!(value, Value::array(vec![Value::string("a"), Value::string("b")]));
//! ```

pub mod ast;
pub mod bytecode;
pub mod codegen;
pub mod consumption;
pub mod diagnostics;
pub mod dsl;
pub mod opcodes;
pub mod options;
pub mod passes;
pub mod pipeline;
pub mod session;
pub mod visitor;

pub use ast::{Grammar, NodeId, NodeKind};
pub use diagnostics::{Collector, CompileError, Diagnostics, GrammarError, Problem, ProblemList, Severity};
pub use options::{CompileOptions, Optimize, OutputKind, OutputSpec, StartRules};
pub use pipeline::Pipeline;
pub use session::{AnnotatedGrammar, Facts, Session};

use crate::runtime::parser::Parser;

/// Everything a compilation produced
#[derive(Debug)]
pub struct CompileOutput {
    /// In-process parser, when `OutputKind::Parser` was requested
    pub parser: Option<Parser>,
    /// Rust source, when `OutputKind::Source` was requested
    pub source: Option<String>,
    /// The transformed grammar with its side tables, when `OutputKind::Ast` was requested
    pub ast: Option<AnnotatedGrammar>,
    /// Every problem reported, including warnings and infos
    pub problems: Vec<Problem>,
}

/// Compile a grammar
///
/// Problems are recorded internally and also forwarded to `collector`
/// when one is given. A stage that reports errors stops compilation with
/// [`CompileError::Grammar`] carrying that stage's problems.
pub fn compile(
    grammar: Grammar,
    options: CompileOptions,
    collector: Option<&mut dyn Collector>,
) -> Result<CompileOutput, CompileError> {
    let mut diagnostics = Diagnostics::new().with_verbose(options.verbose);
    if let Some(collector) = collector {
        diagnostics = diagnostics.with_collector(collector);
    }

    log_info!(
        "compiling {} rule(s), {} node(s), optimize={:?}",
        grammar.rules.len(),
        grammar.nodes.len(),
        options.optimize
    );
    let mut session = Session::new(grammar, options, diagnostics);
    Pipeline::standard().run(&mut session)?;

    let output = &session.options.output;
    let wants_parser = output.wants(OutputKind::Parser);
    let wants_ast = output.wants(OutputKind::Ast);

    let parser = match (wants_parser, session.program.take()) {
        (true, Some(program)) => Some(match session.options.optimize {
            Optimize::Speed => Parser::inlined(program).map_err(|e| CompileError::Internal(e.to_string()))?,
            Optimize::Size => Parser::interpreted(program),
        }),
        (true, None) => {
            return Err(CompileError::Internal("no program was generated".to_string()));
        }
        (false, _) => None,
    };

    let Session {
        grammar,
        facts,
        diagnostics,
        source,
        ..
    } = session;

    Ok(CompileOutput {
        parser,
        source,
        ast: wants_ast.then_some(AnnotatedGrammar { grammar, facts }),
        problems: diagnostics.into_problems(),
    })
}
