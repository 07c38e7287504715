//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types from pegc.
//! Importing it with a wildcard brings the compiler entry point, the
//! grammar DSL and the runtime types into scope:
//!
//! ```
//! use pegc::prelude::*;
//! ```
//!
//! # Re-exported Items
//!
//! ## Compiler
//! - [`compile()`] - Compile a grammar
//! - [`CompileOptions`] - Compiler options
//! - [`CompileOutput`] - Parser, source and annotated grammar
//! - [`CompileError`] / [`GrammarError`] - Compilation failures
//! - [`Problem`] / [`Severity`] / [`Collector`] - Reported problems
//!
//! ## Grammar DSL
//! - [`GrammarBuilder`] - Builder for constructing grammars
//! - [`lit()`], [`class()`], [`regex()`], [`any()`] - Terminals
//! - [`seq()`], [`choice()`], [`star()`], [`plus()`], [`opt()`] - Combinators
//!
//! ## Runtime
//! - [`Parser`] - In-process parser
//! - [`ParseOptions`] - Start rule and tracer for one parse
//! - [`Value`] - Parse result
//! - [`ParseFailure`] / [`SyntaxError`] - Parse failures
//! - [`ActionTable`] / [`ActionHandler`] - Action bindings

// ============================================================================
// Compiler
// ============================================================================

pub use crate::compiler::{
    compile, Collector, CompileError, CompileOptions, CompileOutput, Grammar, GrammarError, Optimize,
    OutputKind, Problem, ProblemList, Severity, StartRules,
};

// ============================================================================
// Grammar DSL
// ============================================================================

pub use crate::compiler::ast::ClassPart;
pub use crate::compiler::dsl::{
    action, and, any, choice, class, class_ic, code, epsilon, label, lit, lit_ic, named, not, opt, plus,
    range, regex, regex_with, rule_ref, sem_and, sem_not, seq, star, text, GrammarBuilder,
};

// ============================================================================
// Runtime
// ============================================================================

pub use crate::runtime::{
    ActionContext, ActionError, ActionHandler, ActionResult, ActionTable, Location, ParseFailure,
    ParseOptions, Parser, Program, Statistics, SyntaxError, Tracer, Value,
};
