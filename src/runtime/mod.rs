//! Generated parser runtime
//!
//! Everything a compiled grammar needs at parse time. Emitted source
//! links against this module, and [`Parser`] uses it to run programs
//! in-process.
//!
//! # Architecture
//!
//! ```text
//! Program ──► Parser ──► ParserState ◄── interpreter (bytecode loop)
//!                            ▲
//!                            └────────── inline (unrolled routines)
//! ```
//!
//! - [`ParserState`]: cursor, failure bookkeeping, memo table, statistics, tracer
//! - [`interpreter`]: one dispatch loop over bytecode
//! - [`inline`]: per-rule routines over numbered slots

// ============================================================================
// Core modules
// ============================================================================

pub mod actions;
pub mod error;
pub mod location;
pub mod memo;
pub mod program;
pub mod regex_cache;
pub mod stats;
pub mod trace;
pub mod value;

// ============================================================================
// Execution
// ============================================================================

pub mod inline;
pub mod interpreter;
pub mod parser;
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use actions::{ActionContext, ActionError, ActionHandler, ActionResult, ActionTable, NoActions};
pub use error::{Expectation, ExpectationKind, ParseFailure, SyntaxError};
pub use location::{Location, Position, PositionTracker};
pub use memo::{MemoEntry, MemoTable};
pub use parser::{ParseOptions, Parser};
pub use program::{ActionDef, Const, Program, RuleCode};
pub use state::ParserState;
pub use stats::{ParentCounters, RuleCounters, Statistics};
pub use trace::{LogTracer, RecordedEvent, TraceEvent, TraceEventKind, TraceRecorder, Tracer};
pub use value::{Slot, Value};
