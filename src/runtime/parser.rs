//! In-process parser
//!
//! [`Parser`] runs a compiled [`Program`] directly, either through the
//! bytecode interpreter or through the unrolled inline routines. Both
//! strategies share [`ParserState`], so they accept the same inputs,
//! build the same values and report the same syntax errors.

use super::actions::{ActionHandler, NoActions};
use super::error::ParseFailure;
use super::inline::{self, LowerError, Routine};
use super::interpreter;
use super::program::Program;
use super::state::ParserState;
use super::stats::Statistics;
use super::trace::Tracer;
use super::value::Value;

/// Options for one parse call
#[derive(Default)]
pub struct ParseOptions<'a> {
    /// Starter rule to parse from (the default starter when `None`)
    pub start_rule: Option<&'a str>,
    /// Receiver of trace events for programs compiled with tracing
    pub tracer: Option<&'a mut dyn Tracer>,
}

impl<'a> ParseOptions<'a> {
    /// Parse from the default starter
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from the named starter
    pub fn with_start_rule(mut self, name: &'a str) -> Self {
        self.start_rule = Some(name);
        self
    }

    /// Send trace events to `tracer`
    pub fn with_tracer(mut self, tracer: &'a mut dyn Tracer) -> Self {
        self.tracer = Some(tracer);
        self
    }
}

impl std::fmt::Debug for ParseOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseOptions")
            .field("start_rule", &self.start_rule)
            .field("tracer", &self.tracer.is_some())
            .finish()
    }
}

/// Execution strategy
#[derive(Debug, Clone, PartialEq, Eq)]
enum Strategy {
    Interpreter,
    Inline(Vec<Routine>),
}

/// A compiled grammar ready to parse
pub struct Parser {
    program: Program,
    strategy: Strategy,
    actions: Box<dyn ActionHandler>,
    statistics: Statistics,
}

impl Parser {
    /// Run `program` through the bytecode interpreter
    pub fn interpreted(program: Program) -> Self {
        Self::with_strategy(program, Strategy::Interpreter)
    }

    /// Run `program` through unrolled inline routines
    pub fn inlined(program: Program) -> Result<Self, LowerError> {
        let routines = inline::lower(&program)?;
        Ok(Self::with_strategy(program, Strategy::Inline(routines)))
    }

    fn with_strategy(program: Program, strategy: Strategy) -> Self {
        let statistics =
            Statistics::new(program.rules.iter().map(|r| (r.name.as_str(), r.memoize && program.memoize)));
        Self {
            program,
            strategy,
            actions: Box::new(NoActions),
            statistics,
        }
    }

    /// Use `handler` for actions and predicates
    pub fn with_actions(mut self, handler: impl ActionHandler + 'static) -> Self {
        self.actions = Box::new(handler);
        self
    }

    /// Replace the action handler
    pub fn set_actions(&mut self, handler: Box<dyn ActionHandler>) {
        self.actions = handler;
    }

    /// The program being run
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Whether the inline routines are used
    pub fn is_inlined(&self) -> bool {
        matches!(self.strategy, Strategy::Inline(_))
    }

    /// Names of the rules parsing may start from
    pub fn starters(&self) -> Vec<&str> {
        self.program.starter_names()
    }

    /// Parse `input`
    pub fn parse(&mut self, input: &str, options: ParseOptions<'_>) -> Result<Value, ParseFailure> {
        let start = self.program.start_index(options.start_rule)?;
        let tracer = options.tracer.map(|t| t as &mut dyn Tracer);
        let state = ParserState::new(
            input,
            &self.program,
            self.actions.as_mut(),
            tracer,
            Some(&mut self.statistics),
        );
        match &self.strategy {
            Strategy::Interpreter => interpreter::parse(state, start),
            Strategy::Inline(routines) => inline::parse(state, routines, start),
        }
    }

    /// Run-time statistics, if the program collects them
    ///
    /// Counters accumulate across parses until `reset` is passed.
    pub fn statistics(&mut self, reset: bool) -> Option<Statistics> {
        if !self.program.statistics {
            return None;
        }
        let snapshot = self.statistics.clone();
        if reset {
            self.statistics.reset();
        }
        Some(snapshot)
    }
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("rules", &self.program.rule_count())
            .field("inlined", &self.is_inlined())
            .finish()
    }
}
