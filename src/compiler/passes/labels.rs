//! Duplicate labels
//!
//! Labels share one scope per rule. Each alternative of a choice, and the
//! expression under a label, starts from a copy of the enclosing scope, so
//! `a:x / a:y` is fine while `a:x a:y` is not.

use crate::compiler::ast::{Grammar, NodeId, NodeKind};
use crate::compiler::diagnostics::CompileError;
use crate::compiler::session::Session;
use crate::compiler::visitor::{visit, walk_node, walk_rule, Parent, Visitor};
use crate::runtime::location::Location;
use hashbrown::HashSet;

#[derive(Default)]
struct Check {
    found: Vec<(String, usize, Option<Location>)>,
}

struct Scope {
    rule: usize,
    labels: HashSet<String>,
}

impl Scope {
    fn fork(&self) -> Self {
        Scope {
            rule: self.rule,
            labels: self.labels.clone(),
        }
    }
}

impl Visitor for Check {
    type Ctx = Scope;
    type Out = ();

    fn rule(&mut self, g: &Grammar, rule: usize, _outer: &mut Scope) {
        let mut scope = Scope {
            rule,
            labels: HashSet::new(),
        };
        walk_rule(self, g, rule, &mut scope)
    }

    fn node(&mut self, g: &Grammar, node: NodeId, _parent: Parent, scope: &mut Scope) {
        let parent = Parent::Node(node);
        match g.kind(node) {
            NodeKind::Choice { alternatives } => {
                for &alt in alternatives {
                    visit(self, g, alt, parent, &mut scope.fork());
                }
            }
            NodeKind::Labeled { label, expression } => {
                visit(self, g, *expression, parent, &mut scope.fork());
                if let Some(label) = label {
                    if !scope.labels.insert(label.clone()) {
                        self.found.push((label.clone(), scope.rule, g.node(node).location));
                    }
                }
            }
            _ => walk_node(self, g, node, scope),
        }
    }
}

/// Labels bound twice in one scope, with the owning rule
pub fn find(g: &Grammar) -> Vec<(String, usize, Option<Location>)> {
    let mut check = Check::default();
    let mut scope = Scope {
        rule: 0,
        labels: HashSet::new(),
    };
    for rule in 0..g.rules.len() {
        check.rule(g, rule, &mut scope);
    }
    check.found
}

/// Check pass
pub fn run(s: &mut Session<'_>) -> Result<(), CompileError> {
    if !s.options.report_duplicate_labels {
        return Ok(());
    }
    for (label, rule, location) in find(&s.grammar) {
        let message = format!(
            "Duplicate label \"{}\" detected for rule \"{}\".",
            label,
            s.rule_name(rule)
        );
        s.diagnostics.error(message, location);
    }
    Ok(())
}
