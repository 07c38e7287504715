//! Synthetic labels
//!
//! Gives every unlabeled element of a sequence a positional name (`$1`,
//! `$2`, ...) in the side table, so tooling reading the annotated grammar
//! can address any sequence element. The tree itself is left alone: a
//! synthetic label never becomes an action parameter.

use crate::compiler::ast::{Grammar, NodeId, NodeKind};
use crate::compiler::diagnostics::CompileError;
use crate::compiler::session::{Facts, Session};
use crate::compiler::visitor::{visit_grammar, walk_node, Parent, Visitor};

struct Namer<'f> {
    facts: &'f mut Facts,
}

impl Visitor for Namer<'_> {
    type Ctx = ();
    type Out = ();

    fn node(&mut self, g: &Grammar, node: NodeId, _parent: Parent, ctx: &mut ()) {
        if let NodeKind::Sequence { elements } = g.kind(node) {
            for (position, &element) in elements.iter().enumerate() {
                let labeled = matches!(g.kind(element), NodeKind::Labeled { label: Some(_), .. });
                self.facts.auto_labels[element.index()] =
                    (!labeled).then(|| format!("${}", position + 1));
            }
        }
        walk_node(self, g, node, ctx)
    }
}

/// Transform pass
pub fn run(s: &mut Session<'_>) -> Result<(), CompileError> {
    let mut namer = Namer { facts: &mut s.facts };
    visit_grammar(&mut namer, &s.grammar, &mut ());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::dsl::*;

    #[test]
    fn test_positional_names_skip_labeled() {
        let g = GrammarBuilder::new()
            .rule("start", seq(vec![lit("a"), label("b", lit("b")), lit("c")]))
            .build();
        let mut facts = Facts::linked(&g);
        visit_grammar(&mut Namer { facts: &mut facts }, &g, &mut ());

        let elements = g.children(g.rules[0].expression);
        let names: Vec<_> = elements
            .iter()
            .map(|e| facts.auto_labels[e.index()].as_deref())
            .collect();
        assert_eq!(names, vec![Some("$1"), None, Some("$3")]);
        assert_eq!(g.nodes.len(), 5);
    }
}
