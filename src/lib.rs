//! pegc - PEG Grammar Compiler
//!
//! Compiles a parsing-expression grammar, given as an AST, into an
//! executable parser. It provides:
//! - A staged pass pipeline with semantic checks (missing, duplicate and
//!   unused rules, left recursion, infinite loops, duplicate labels)
//! - Consumption and FIRST-set analysis over the cyclic rule graph
//! - Proxy-rule elision and packrat memoization policy
//! - A stack-machine bytecode compiler with verified stack discipline
//! - Two execution strategies sharing one runtime: a bytecode interpreter
//!   and unrolled per-rule routines
//! - Rust source emission for both strategies
//!
//! ## Quick Start
//!
//! ```rust
//! use pegc::prelude::*;
//!
//! let grammar = GrammarBuilder::new()
//!     .rule("start", star(lit("a")))
//!     .build();
//!
//! let mut parser = compile(grammar, CompileOptions::default(), None)
//!     .unwrap()
//!     .parser
//!     .unwrap();
//! let value = parser.parse("aaa", ParseOptions::new()).unwrap();
//! assert_eq!(value.as_array().map(|a| a.len()), Some(3));
//! ```
//!
//! ## Grammars from JSON
//!
//! ```rust
//! use pegc::prelude::*;
//!
//! let grammar = Grammar::from_json(r#"{
//!     "rules": [
//!         { "name": "start", "expression": { "type": "literal", "value": "hi" } }
//!     ]
//! }"#).unwrap();
//! let out = compile(grammar, CompileOptions::default(), None).unwrap();
//! assert!(out.parser.is_some());
//! ```
//!
//! ## Feature Flags
//!
//! - `logging` - Enable debug logging using the `log` crate (default)

// Lint configuration for production quality
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]
#![allow(clippy::module_inception)]
#![allow(clippy::redundant_closure)]

/// Logging macros - no-op when logging feature is disabled
#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

/// Logging macros - use log crate when logging feature is enabled
#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

#[cfg(not(feature = "logging"))]
macro_rules! log_info {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "logging")]
macro_rules! log_info {
    ($($arg:tt)*) => { log::info!($($arg)*) };
}

// Prelude module for convenient imports
pub mod prelude;

// Compile-time pipeline
pub mod compiler;

// Parse-time support shared by in-process and emitted parsers
pub mod runtime;

/// Re-export commonly used types for convenience
pub use compiler::{compile, CompileError, CompileOptions, CompileOutput, Grammar};
pub use runtime::{ParseFailure, ParseOptions, Parser, Value};
