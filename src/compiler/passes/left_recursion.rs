//! Left recursion
//!
//! Collects, per rule, the rule references reachable without consuming
//! input: the rule's *left calls*. A left call to `t` from rule `a` is
//! left-recursive when `t` is `a` or reaches `a` through left calls. Each
//! offending reference is reported once, however many rules lead to it.
//!
//! `start = "a"? start` is reported: the optional may consume nothing.
//! `start = "a" start` is not.

use crate::compiler::ast::{Grammar, NodeId, NodeKind};
use crate::compiler::diagnostics::CompileError;
use crate::compiler::session::{Facts, Session};
use crate::compiler::visitor::{visit, walk_node, walk_rule, Parent, Visitor};
use crate::runtime::location::Location;

struct LeftCalls<'f> {
    facts: &'f Facts,
}

impl Visitor for LeftCalls<'_> {
    type Ctx = Vec<(NodeId, usize)>;
    type Out = ();

    fn node(&mut self, g: &Grammar, node: NodeId, _parent: Parent, calls: &mut Vec<(NodeId, usize)>) {
        let parent = Parent::Node(node);
        match g.kind(node) {
            NodeKind::Sequence { elements } => {
                for &element in elements {
                    visit(self, g, element, parent, calls);
                    if !self.facts.node_consumption(element).matches_empty() {
                        break;
                    }
                }
            }
            NodeKind::Range {
                expression,
                delimiter,
                ..
            } => {
                visit(self, g, *expression, parent, calls);
                if let Some(delimiter) = delimiter {
                    if self.facts.node_consumption(*expression).matches_empty() {
                        visit(self, g, *delimiter, parent, calls);
                    }
                }
            }
            NodeKind::RuleRef { .. } => {
                if let Some(target) = self.facts.target(node) {
                    calls.push((node, target));
                }
            }
            _ => walk_node(self, g, node, calls),
        }
    }
}

/// Rules reachable from `from` through left calls, `from` excluded unless on a cycle
fn reachable(calls: &[Vec<(NodeId, usize)>], from: usize) -> Vec<bool> {
    let mut seen = vec![false; calls.len()];
    let mut stack = vec![from];
    while let Some(rule) = stack.pop() {
        for &(_, target) in &calls[rule] {
            if !seen[target] {
                seen[target] = true;
                stack.push(target);
            }
        }
    }
    seen
}

/// Find left-recursive references, in rule order
pub fn find(g: &Grammar, facts: &Facts) -> Vec<(String, Option<Location>)> {
    let mut visitor = LeftCalls { facts };
    let calls: Vec<Vec<(NodeId, usize)>> = (0..g.rules.len())
        .map(|rule| {
            let mut calls = Vec::new();
            walk_rule(&mut visitor, g, rule, &mut calls);
            calls
        })
        .collect();
    let reach: Vec<Vec<bool>> = (0..g.rules.len()).map(|rule| reachable(&calls, rule)).collect();

    let mut found = Vec::new();
    for (rule, rule_calls) in calls.iter().enumerate() {
        for &(node, target) in rule_calls {
            if target == rule || reach[target][rule] {
                if let NodeKind::RuleRef { name } = g.kind(node) {
                    found.push((name.clone(), g.node(node).location));
                }
            }
        }
    }
    found
}

/// Check pass
pub fn run(s: &mut Session<'_>) -> Result<(), CompileError> {
    for (name, location) in find(&s.grammar, &s.facts) {
        s.diagnostics
            .error(format!("Left recursion detected for rule \"{}\".", name), location);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::consumption;
    use crate::compiler::dsl::*;

    fn recursive_rules(b: GrammarBuilder) -> Vec<String> {
        let g = b.build();
        let mut facts = Facts::linked(&g);
        consumption::analyze(&g, &mut facts);
        find(&g, &facts).into_iter().map(|(name, _)| name).collect()
    }

    #[test]
    fn test_direct() {
        let found = recursive_rules(GrammarBuilder::new().rule("start", rule_ref("start")));
        assert_eq!(found, vec!["start"]);
    }

    #[test]
    fn test_indirect() {
        let found = recursive_rules(
            GrammarBuilder::new()
                .rule("a", rule_ref("b"))
                .rule("b", rule_ref("a")),
        );
        assert!(found.contains(&"a".to_string()));
        assert!(found.contains(&"b".to_string()));
    }

    #[test]
    fn test_behind_optional_prefix() {
        let found = recursive_rules(
            GrammarBuilder::new().rule("start", seq(vec![opt(lit("a")), rule_ref("start")])),
        );
        assert_eq!(found, vec!["start"]);
    }

    #[test]
    fn test_consuming_prefix_is_fine() {
        let found =
            recursive_rules(GrammarBuilder::new().rule("start", seq(vec![lit("a"), rule_ref("start")])));
        assert!(found.is_empty());
    }

    #[test]
    fn test_reported_once_per_reference() {
        let found = recursive_rules(
            GrammarBuilder::new()
                .rule("x", rule_ref("start"))
                .rule("start", rule_ref("start")),
        );
        assert_eq!(found, vec!["start"]);
    }

    #[test]
    fn test_cycle_reached_from_outside() {
        // only the references on the a-b cycle are left-recursive
        let found = recursive_rules(
            GrammarBuilder::new()
                .rule("start", seq(vec![rule_ref("a"), lit("!")]))
                .rule("a", choice(vec![rule_ref("b"), lit("x")]))
                .rule("b", seq(vec![rule_ref("a"), lit("y")])),
        );
        assert_eq!(found, vec!["b", "a"]);
    }

    #[test]
    fn test_every_alternative_checked() {
        let found = recursive_rules(
            GrammarBuilder::new().rule("start", choice(vec![lit("x"), rule_ref("start")])),
        );
        assert_eq!(found, vec!["start"]);
    }
}
