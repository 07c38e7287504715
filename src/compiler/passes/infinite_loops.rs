//! Infinite loops
//!
//! A repetition whose element can succeed without consuming input never
//! terminates. This covers `*`, `+` and unbounded ranges, the latter
//! unless a delimiter that always consumes separates the repetitions.

use crate::compiler::ast::{Grammar, NodeId, NodeKind};
use crate::compiler::diagnostics::CompileError;
use crate::compiler::session::{Facts, Session};
use crate::compiler::visitor::{visit_grammar, walk_node, Parent, Visitor};

struct Check<'f> {
    facts: &'f Facts,
    found: Vec<NodeId>,
}

impl Check<'_> {
    fn empty(&self, node: NodeId) -> bool {
        self.facts.node_consumption(node).matches_empty()
    }
}

impl Visitor for Check<'_> {
    type Ctx = ();
    type Out = ();

    fn node(&mut self, g: &Grammar, node: NodeId, _parent: Parent, ctx: &mut ()) {
        let looping = match g.kind(node) {
            NodeKind::ZeroOrMore { expression } | NodeKind::OneOrMore { expression } => self.empty(*expression),
            NodeKind::Range {
                max: None,
                expression,
                delimiter,
                ..
            } => self.empty(*expression) && delimiter.map_or(true, |d| self.empty(d)),
            _ => false,
        };
        if looping {
            self.found.push(node);
        }
        walk_node(self, g, node, ctx)
    }
}

/// Repetition nodes that never terminate
pub fn find(g: &Grammar, facts: &Facts) -> Vec<NodeId> {
    let mut check = Check {
        facts,
        found: Vec::new(),
    };
    visit_grammar(&mut check, g, &mut ());
    check.found
}

/// Check pass
pub fn run(s: &mut Session<'_>) -> Result<(), CompileError> {
    for node in find(&s.grammar, &s.facts) {
        let message = format!("Infinite loop detected in rule \"{}\".", s.owner_name(node));
        let location = s.grammar.node(node).location;
        s.diagnostics.error(message, location);
    }
    Ok(())
}
