//! Stage pipeline
//!
//! Passes run in a fixed order, grouped into stages. Errors accumulate
//! inside a stage and the stage fails at its end if any were reported,
//! so every independent problem of one stage surfaces together. A fatal
//! problem or an internal error stops the pipeline immediately.

use super::bytecode;
use super::codegen;
use super::diagnostics::CompileError;
use super::passes;
use super::session::Session;

/// Signature shared by all passes
pub type PassFn = fn(&mut Session<'_>) -> Result<(), CompileError>;

/// A named pass
#[derive(Clone, Copy)]
pub struct Pass {
    /// Name used in logs
    pub name: &'static str,
    /// Entry point
    pub run: PassFn,
}

impl std::fmt::Debug for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pass").field("name", &self.name).finish()
    }
}

const fn pass(name: &'static str, run: PassFn) -> Pass {
    Pass { name, run }
}

/// Passes sharing one error boundary
#[derive(Debug, Clone)]
pub struct Stage {
    /// Name used in the stage failure message
    pub name: &'static str,
    /// Passes, in order
    pub passes: Vec<Pass>,
}

/// Ordered stages
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// The full compiler pipeline
    pub fn standard() -> Self {
        Self {
            stages: vec![
                Stage {
                    name: "prepare",
                    passes: vec![
                        pass("link", passes::link::run),
                        pass("statistics", passes::statistics::run),
                        pass("descriptions", passes::descriptions::run),
                    ],
                },
                Stage {
                    name: "check",
                    passes: vec![
                        pass("duplicate_rules", passes::rules::duplicates),
                        pass("missing_rules", passes::rules::missing),
                        pass("unused_rules", passes::rules::unused),
                        pass("consumption", passes::consumption),
                        pass("left_recursion", passes::left_recursion::run),
                        pass("infinite_loops", passes::infinite_loops::run),
                        pass("duplicate_labels", passes::labels::run),
                    ],
                },
                Stage {
                    name: "transform",
                    passes: vec![
                        pass("proxy_rules", passes::proxy::run),
                        pass("auto_label", passes::auto_label::run),
                        pass("consumption", passes::consumption),
                        pass("memoization", passes::memoization::run),
                    ],
                },
                Stage {
                    name: "generate",
                    passes: vec![
                        pass("bytecode", bytecode::run),
                        pass("source", codegen::run),
                    ],
                },
            ],
        }
    }

    /// Custom pipeline
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Stages, in order
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Run every stage on a session
    pub fn run(&self, s: &mut Session<'_>) -> Result<(), CompileError> {
        for stage in &self.stages {
            log_info!("stage {}: {} pass(es)", stage.name, stage.passes.len());
            s.diagnostics.begin_stage();

            for p in &stage.passes {
                log_debug!("pass {}.{}", stage.name, p.name);
                (p.run)(s)?;
            }

            log_info!(
                "stage {} done: {} problem(s), {} error(s)",
                stage.name,
                s.diagnostics.stage_problems().len(),
                s.diagnostics.error_count()
            );
            s.diagnostics.end_stage(stage.name)?;
        }
        Ok(())
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}
