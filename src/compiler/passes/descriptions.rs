//! Description propagation
//!
//! A rule name, a display name or a label describes the chain of
//! single-child nodes below it. A description from a deeper origin wins
//! over a shallower one; a rule name stops at a `named` node.

use crate::compiler::ast::{Grammar, NodeId, NodeKind};
use crate::compiler::diagnostics::CompileError;
use crate::compiler::session::{Description, Facts, Session};
use crate::compiler::visitor::{visit_grammar, walk_node, walk_rule, Parent, Visitor};

struct Propagate<'f> {
    facts: &'f mut Facts,
}

/// Next node of a description chain
fn chain_child(g: &Grammar, node: NodeId) -> Option<NodeId> {
    match g.kind(node) {
        NodeKind::Range { expression, .. } => Some(*expression),
        kind => kind.single_child(),
    }
}

impl Propagate<'_> {
    fn propagate(&mut self, g: &Grammar, start: NodeId, text: &str, depth: u32, stop_at_named: bool) {
        let mut next = Some(start);
        while let Some(node) = next {
            if stop_at_named && matches!(g.kind(node), NodeKind::Named { .. }) {
                break;
            }
            let slot = &mut self.facts.descriptions[node.index()];
            if slot.as_ref().is_some_and(|d| d.depth >= depth) {
                break;
            }
            *slot = Some(Description {
                text: text.to_string(),
                depth,
            });
            next = chain_child(g, node);
        }
    }
}

impl Visitor for Propagate<'_> {
    type Ctx = ();
    type Out = ();

    fn rule(&mut self, g: &Grammar, rule: usize, ctx: &mut ()) {
        let r = &g.rules[rule];
        self.propagate(g, r.expression, &r.name, 1, true);
        walk_rule(self, g, rule, ctx)
    }

    fn node(&mut self, g: &Grammar, node: NodeId, _parent: Parent, ctx: &mut ()) {
        let depth = self.facts.depth[node.index()];
        match g.kind(node) {
            NodeKind::Named { name, .. } => self.propagate(g, node, name, depth, false),
            NodeKind::Labeled { label: Some(label), .. } => self.propagate(g, node, label, depth, false),
            _ => {}
        }
        walk_node(self, g, node, ctx)
    }
}

/// Preparation pass
pub fn run(s: &mut Session<'_>) -> Result<(), CompileError> {
    let mut propagate = Propagate { facts: &mut s.facts };
    visit_grammar(&mut propagate, &s.grammar, &mut ());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::dsl::*;

    fn described(g: &Grammar) -> Facts {
        let mut facts = Facts::linked(g);
        let mut propagate = Propagate { facts: &mut facts };
        visit_grammar(&mut propagate, g, &mut ());
        facts
    }

    #[test]
    fn test_rule_name_reaches_single_child_chain() {
        let g = GrammarBuilder::new().rule("digits", plus(class(vec![], false))).build();
        let facts = described(&g);
        let plus = g.rules[0].expression;
        let class = g.children(plus)[0];
        assert_eq!(facts.description(plus), Some("digits"));
        assert_eq!(facts.description(class), Some("digits"));
    }

    #[test]
    fn test_named_wins_and_stops_rule_name() {
        let g = GrammarBuilder::new()
            .rule("ws", named("whitespace", star(lit(" "))))
            .build();
        let facts = described(&g);
        let named = g.rules[0].expression;
        let star = g.children(named)[0];
        assert_eq!(facts.description(named), Some("whitespace"));
        assert_eq!(facts.description(star), Some("whitespace"));
    }

    #[test]
    fn test_label_deeper_than_rule() {
        let g = GrammarBuilder::new()
            .rule("pair", seq(vec![label("key", lit("k")), lit("=")]))
            .build();
        let facts = described(&g);
        let seq = g.rules[0].expression;
        let labeled = g.children(seq)[0];
        let key = g.children(labeled)[0];
        assert_eq!(facts.description(seq), Some("pair"));
        assert_eq!(facts.description(key), Some("key"));
        assert_eq!(facts.description(g.children(seq)[1]), None);
    }
}
