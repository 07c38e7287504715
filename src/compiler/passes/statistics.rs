//! Run-time statistics switch
//!
//! Statistics are collected when the option asks for them or when any
//! rule carries `@collect_statistics`.

use crate::compiler::diagnostics::CompileError;
use crate::compiler::session::Session;

/// Annotation name that turns statistics on
pub const ANNOTATION: &str = "collect_statistics";

/// Preparation pass
pub fn run(s: &mut Session<'_>) -> Result<(), CompileError> {
    let annotated = s
        .grammar
        .rules
        .iter()
        .flat_map(|r| r.annotations.iter())
        .any(|a| a.name == ANNOTATION);
    s.facts.statistics = s.options.collect_statistics || annotated;
    Ok(())
}
