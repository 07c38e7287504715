//! Actions and predicates
//!
//! Grammar actions, semantic predicates and code terminals are plain code
//! strings in the grammar. At parse time each one is an entry of the
//! program's action pool, and an [`ActionHandler`] decides what running it
//! means. Generated source implements the handler with one function per
//! action; in-process parsers bind closures through an [`ActionTable`].

use super::location::Location;
use super::program::ActionDef;
use super::value::Value;
use hashbrown::HashMap;
use std::ops::Range;
use thiserror::Error;

/// What an action sees of the parse
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    input: &'a str,
    start: usize,
    end: usize,
    rule_name: &'a str,
}

impl<'a> ActionContext<'a> {
    /// Create a context for the span `start..end`
    pub fn new(input: &'a str, start: usize, end: usize, rule_name: &'a str) -> Self {
        Self {
            input,
            start,
            end,
            rule_name,
        }
    }

    /// Matched text
    #[inline]
    pub fn text(&self) -> &'a str {
        self.input.get(self.start..self.end).unwrap_or("")
    }

    /// Start offset of the matched text
    #[inline]
    pub fn offset(&self) -> usize {
        self.start
    }

    /// Byte range of the matched text
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Line/column span of the matched text
    pub fn location(&self) -> Location {
        Location::from_range(self.input, self.start, self.end)
    }

    /// The whole input
    #[inline]
    pub fn input(&self) -> &'a str {
        self.input
    }

    /// Name of the rule the action belongs to
    #[inline]
    pub fn rule_name(&self) -> &'a str {
        self.rule_name
    }
}

/// Ways an action can refuse to produce a value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// Soft failure: the match is withdrawn and parsing backtracks
    #[error("action failed")]
    Fail,

    /// Abort the parse expecting the described thing at the action's span
    #[error("expected {0}")]
    Expected(String),

    /// Abort the parse with a custom message
    #[error("{0}")]
    Error(String),

    /// No code is bound for this action
    #[error("no handler bound")]
    Unbound,
}

/// Result of running an action
pub type ActionResult = Result<Value, ActionError>;

/// Runs the entries of a program's action pool
pub trait ActionHandler {
    /// Run action `index` with its labeled arguments in parameter order
    fn call(
        &mut self,
        index: usize,
        def: &ActionDef,
        ctx: &ActionContext<'_>,
        args: &[Value],
    ) -> ActionResult;
}

/// Handler for grammars without actions
#[derive(Debug, Clone, Copy, Default)]
pub struct NoActions;

impl ActionHandler for NoActions {
    fn call(&mut self, _: usize, _: &ActionDef, _: &ActionContext<'_>, _: &[Value]) -> ActionResult {
        Err(ActionError::Unbound)
    }
}

/// A bound action
pub type ActionFn = Box<dyn FnMut(&ActionContext<'_>, &[Value]) -> ActionResult>;

/// Actions bound by their code text
///
/// ```
/// use pegc::runtime::{ActionTable, Value};
///
/// let table = ActionTable::new()
///     .bind("return text", |ctx, _| Ok(Value::string(ctx.text())))
///     .bind("return n", |_, args| Ok(args[0].clone()));
/// assert_eq!(table.len(), 2);
/// ```
#[derive(Default)]
pub struct ActionTable {
    actions: HashMap<String, ActionFn, ahash::RandomState>,
}

impl ActionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a closure to every action whose code is `code`
    pub fn bind<F>(mut self, code: impl Into<String>, f: F) -> Self
    where
        F: FnMut(&ActionContext<'_>, &[Value]) -> ActionResult + 'static,
    {
        self.insert(code, f);
        self
    }

    /// Bind a closure in place
    pub fn insert<F>(&mut self, code: impl Into<String>, f: F)
    where
        F: FnMut(&ActionContext<'_>, &[Value]) -> ActionResult + 'static,
    {
        self.actions.insert(code.into(), Box::new(f));
    }

    /// Whether some closure is bound to `code`
    pub fn contains(&self, code: &str) -> bool {
        self.actions.contains_key(code)
    }

    /// Number of bound closures
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether nothing is bound
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl std::fmt::Debug for ActionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut codes: Vec<&String> = self.actions.keys().collect();
        codes.sort();
        f.debug_struct("ActionTable").field("codes", &codes).finish()
    }
}

impl ActionHandler for ActionTable {
    fn call(
        &mut self,
        _index: usize,
        def: &ActionDef,
        ctx: &ActionContext<'_>,
        args: &[Value],
    ) -> ActionResult {
        match self.actions.get_mut(def.code.as_str()) {
            Some(f) => f(ctx, args),
            None => Err(ActionError::Unbound),
        }
    }
}
