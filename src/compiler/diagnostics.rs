//! Compiler diagnostics
//!
//! Every pass reports through a [`Diagnostics`] value. Fatal problems abort
//! the current stage at once; errors are counted and abort the pipeline at
//! the end of the stage, so every instance found in one stage is reported
//! together; warnings and infos are only recorded.
//!
//! A user-supplied [`Collector`] sees every problem as it is reported. It
//! is composed with the built-in recording rather than replacing it, and
//! two user collectors can be composed with [`Chain`].
//!
//! # Example Output
//!
//! ```text
//! Stage check contains errors.
//! error: line 3, column 9: Referenced rule "digit" does not exist.
//! warning: line 7, column 1: Rule "dead" is not used.
//! ```

use crate::runtime::location::Location;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Problem severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Aborts the stage immediately
    Fatal,
    /// Aborts the pipeline at the end of the stage
    Error,
    /// Recorded only
    Warning,
    /// Recorded only
    Info,
}

impl Severity {
    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Fatal => "fatal",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A secondary location attached to a problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    /// Text
    pub message: String,
    /// Location
    pub location: Option<Location>,
}

/// One reported problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Problem {
    /// Severity
    pub severity: Severity,
    /// Message
    pub message: String,
    /// Main location
    pub location: Option<Location>,
    /// Related locations
    pub notes: Vec<Note>,
}

impl Problem {
    /// Problem without location
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            location: None,
            notes: Vec::new(),
        }
    }

    /// Attach the main location
    pub fn at(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }

    /// Attach a related location
    pub fn note(mut self, message: impl Into<String>, location: Option<Location>) -> Self {
        self.notes.push(Note {
            message: message.into(),
            location,
        });
        self
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.severity)?;
        if let Some(loc) = &self.location {
            write!(f, "{}: ", loc.start)?;
        }
        f.write_str(&self.message)
    }
}

/// Receiver of reported problems
pub trait Collector {
    /// Called once per reported problem, in report order
    fn collect(&mut self, problem: &Problem);
}

impl<F: FnMut(&Problem)> Collector for F {
    fn collect(&mut self, problem: &Problem) {
        self(problem)
    }
}

/// Collector that keeps every problem
#[derive(Debug, Clone, Default)]
pub struct ProblemList {
    /// Problems in report order
    pub problems: Vec<Problem>,
}

impl Collector for ProblemList {
    fn collect(&mut self, problem: &Problem) {
        self.problems.push(problem.clone());
    }
}

/// Two collectors, called in order
#[derive(Debug, Clone, Default)]
pub struct Chain<A, B>(pub A, pub B);

impl<A: Collector, B: Collector> Collector for Chain<A, B> {
    fn collect(&mut self, problem: &Problem) {
        self.0.collect(problem);
        self.1.collect(problem);
    }
}

/// A semantic defect of the grammar
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrammarError {
    /// Headline
    pub message: String,
    /// Location of a fatal problem
    pub location: Option<Location>,
    /// Problems recorded in the failing stage
    pub problems: Vec<Problem>,
}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(
                f,
                "Line {}, column {}: {}",
                loc.start.line, loc.start.column, self.message
            )?,
            None => f.write_str(&self.message)?,
        }
        for problem in &self.problems {
            write!(f, "\n{}", problem)?;
        }
        Ok(())
    }
}

impl std::error::Error for GrammarError {}

/// Errors returned by [`compile`](crate::compiler::compile)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The grammar is invalid
    #[error(transparent)]
    Grammar(#[from] GrammarError),
    /// The compiler produced inconsistent code
    #[error("internal compiler error: {0}")]
    Internal(String),
}

impl CompileError {
    /// The grammar error, if this is one
    pub fn as_grammar(&self) -> Option<&GrammarError> {
        match self {
            CompileError::Grammar(e) => Some(e),
            CompileError::Internal(_) => None,
        }
    }

    /// Every problem recorded before the failure
    pub fn problems(&self) -> &[Problem] {
        match self {
            CompileError::Grammar(e) => &e.problems,
            CompileError::Internal(_) => &[],
        }
    }
}

/// Built-in problem recording for one compilation
pub struct Diagnostics<'c> {
    problems: Vec<Problem>,
    stage_start: usize,
    errors: usize,
    verbose: bool,
    user: Option<&'c mut dyn Collector>,
}

impl<'c> Diagnostics<'c> {
    /// Record only
    pub fn new() -> Self {
        Self {
            problems: Vec::new(),
            stage_start: 0,
            errors: 0,
            verbose: false,
            user: None,
        }
    }

    /// Also forward every problem to `user`
    pub fn with_collector(mut self, user: &'c mut dyn Collector) -> Self {
        self.user = Some(user);
        self
    }

    /// Log problems as they are reported
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn record(&mut self, problem: Problem) {
        if self.verbose {
            log_info!("{}", problem);
        }
        if let Some(user) = self.user.as_deref_mut() {
            user.collect(&problem);
        }
        self.problems.push(problem);
    }

    /// Report a problem that aborts the current stage
    ///
    /// The returned error must be propagated by the caller.
    #[must_use]
    pub fn fatal(&mut self, message: impl Into<String>, location: Option<Location>) -> GrammarError {
        let message = message.into();
        self.record(Problem::new(Severity::Fatal, message.clone()).at(location));
        GrammarError {
            message,
            location,
            problems: self.stage_problems().to_vec(),
        }
    }

    /// Report an error
    pub fn error(&mut self, message: impl Into<String>, location: Option<Location>) {
        self.report(Problem::new(Severity::Error, message).at(location));
    }

    /// Report a warning
    pub fn warning(&mut self, message: impl Into<String>, location: Option<Location>) {
        self.report(Problem::new(Severity::Warning, message).at(location));
    }

    /// Report an informational message
    pub fn info(&mut self, message: impl Into<String>, location: Option<Location>) {
        self.report(Problem::new(Severity::Info, message).at(location));
    }

    /// Report a fully built problem
    pub fn report(&mut self, problem: Problem) {
        if matches!(problem.severity, Severity::Error | Severity::Fatal) {
            self.errors += 1;
        }
        self.record(problem);
    }

    /// Start a new stage
    pub fn begin_stage(&mut self) {
        self.stage_start = self.problems.len();
        self.errors = 0;
    }

    /// End a stage, failing if it reported errors
    pub fn end_stage(&mut self, stage: &str) -> Result<(), GrammarError> {
        if self.errors == 0 {
            return Ok(());
        }
        Err(GrammarError {
            message: format!("Stage {} contains errors.", stage),
            location: None,
            problems: self.stage_problems().to_vec(),
        })
    }

    /// Errors reported in the current stage
    pub fn error_count(&self) -> usize {
        self.errors
    }

    /// Problems reported in the current stage
    pub fn stage_problems(&self) -> &[Problem] {
        &self.problems[self.stage_start..]
    }

    /// Every problem reported so far
    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    /// Take every problem reported so far
    pub fn into_problems(self) -> Vec<Problem> {
        self.problems
    }
}

impl Default for Diagnostics<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Diagnostics<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("problems", &self.problems.len())
            .field("errors", &self.errors)
            .field("user", &self.user.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::location::Position;

    fn loc(line: usize, column: usize) -> Option<Location> {
        let p = Position::new(0, line, column);
        Some(Location::new(p, p))
    }

    #[test]
    fn test_errors_fail_stage() {
        let mut d = Diagnostics::new();
        d.begin_stage();
        d.warning("careful", None);
        assert!(d.end_stage("check").is_ok());

        d.begin_stage();
        d.error("first", loc(1, 2));
        d.error("second", None);
        let err = d.end_stage("check").unwrap_err();
        assert_eq!(err.problems.len(), 2);
        assert_eq!(
            err.to_string(),
            "Stage check contains errors.\nerror: line 1, column 2: first\nerror: second"
        );
    }

    #[test]
    fn test_fatal_message() {
        let mut d = Diagnostics::new();
        let err = d.fatal("boom", loc(3, 4));
        assert!(err.to_string().starts_with("Line 3, column 4: boom"));
    }

    #[test]
    fn test_user_collector_sees_everything() {
        let mut list = ProblemList::default();
        {
            let mut d = Diagnostics::new().with_collector(&mut list);
            d.info("a", None);
            d.warning("b", None);
        }
        let severities: Vec<Severity> = list.problems.iter().map(|p| p.severity).collect();
        assert_eq!(severities, vec![Severity::Info, Severity::Warning]);
    }

    #[test]
    fn test_chain_calls_both() {
        let mut seen = 0;
        let mut chain = Chain(ProblemList::default(), |_: &Problem| seen += 1);
        chain.collect(&Problem::new(Severity::Error, "x"));
        assert_eq!(chain.0.problems.len(), 1);
        drop(chain);
        assert_eq!(seen, 1);
    }
}
