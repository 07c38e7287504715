//! Compiler passes
//!
//! Every pass has the signature `fn(&mut Session) -> Result<(), CompileError>`.
//! Checks report through the session diagnostics and return `Ok`; only a
//! fatal problem or a compiler bug returns `Err` directly. The
//! [`pipeline`](super::pipeline) groups them into stages.

pub mod auto_label;
pub mod descriptions;
pub mod infinite_loops;
pub mod labels;
pub mod left_recursion;
pub mod link;
pub mod memoization;
pub mod proxy;
pub mod rules;
pub mod statistics;

use super::diagnostics::CompileError;
use super::session::Session;

/// Consumption and FIRST-set analysis over the current grammar
pub fn consumption(s: &mut Session<'_>) -> Result<(), CompileError> {
    super::consumption::analyze(&s.grammar, &mut s.facts);
    Ok(())
}
