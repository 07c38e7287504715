//! Grammar traversal
//!
//! A [`Visitor`] overrides only the hooks it cares about. The default
//! [`Visitor::node`] handler walks the children of every node kind with an
//! exhaustive match, so a new node kind cannot be silently skipped.
//!
//! Every node visit is bracketed by [`Visitor::pre`] and [`Visitor::post`];
//! `post` receives the handler's result and may replace it, which lets
//! mutation-style passes and fold-style analyses share one driver.
//! Annotations have their own pair of hooks. Per-pass context is threaded
//! through every call as `&mut Self::Ctx` instead of living in globals.

use super::ast::{Annotation, Grammar, NodeId, NodeKind};
use serde::Serialize;

/// What a node hangs off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "index", rename_all = "snake_case")]
pub enum Parent {
    /// Root expression of a rule
    Rule(usize),
    /// Child of another node
    Node(NodeId),
}

/// Traversal hooks
pub trait Visitor {
    /// Context threaded through the traversal
    type Ctx;
    /// Result of visiting a node
    type Out: Default;

    /// Called before every node
    fn pre(&mut self, _g: &Grammar, _node: NodeId, _parent: Parent, _ctx: &mut Self::Ctx) {}

    /// Called after every node with the handler's result
    fn post(
        &mut self,
        _g: &Grammar,
        _node: NodeId,
        _parent: Parent,
        out: Self::Out,
        _ctx: &mut Self::Ctx,
    ) -> Self::Out {
        out
    }

    /// Called before every annotation of a rule
    fn annotation_pre(&mut self, _g: &Grammar, _rule: usize, _annotation: &Annotation, _ctx: &mut Self::Ctx) {}

    /// Called after every annotation of a rule
    fn annotation_post(&mut self, _g: &Grammar, _rule: usize, _annotation: &Annotation, _ctx: &mut Self::Ctx) {}

    /// Rule handler; visits annotations, then the expression
    fn rule(&mut self, g: &Grammar, rule: usize, ctx: &mut Self::Ctx) -> Self::Out {
        walk_rule(self, g, rule, ctx)
    }

    /// Node handler; visits children
    fn node(&mut self, g: &Grammar, node: NodeId, _parent: Parent, ctx: &mut Self::Ctx) -> Self::Out {
        walk_node(self, g, node, ctx)
    }
}

/// Visit every rule in order
pub fn visit_grammar<V: Visitor + ?Sized>(v: &mut V, g: &Grammar, ctx: &mut V::Ctx) {
    for rule in 0..g.rules.len() {
        v.rule(g, rule, ctx);
    }
}

/// Visit one node with its hooks
pub fn visit<V: Visitor + ?Sized>(
    v: &mut V,
    g: &Grammar,
    node: NodeId,
    parent: Parent,
    ctx: &mut V::Ctx,
) -> V::Out {
    v.pre(g, node, parent, ctx);
    let out = v.node(g, node, parent, ctx);
    v.post(g, node, parent, out, ctx)
}

/// Default rule traversal
pub fn walk_rule<V: Visitor + ?Sized>(v: &mut V, g: &Grammar, rule: usize, ctx: &mut V::Ctx) -> V::Out {
    let Some(r) = g.rules.get(rule) else {
        return V::Out::default();
    };
    for annotation in &r.annotations {
        v.annotation_pre(g, rule, annotation, ctx);
        v.annotation_post(g, rule, annotation, ctx);
    }
    visit(v, g, r.expression, Parent::Rule(rule), ctx)
}

/// Default node traversal
pub fn walk_node<V: Visitor + ?Sized>(v: &mut V, g: &Grammar, node: NodeId, ctx: &mut V::Ctx) -> V::Out {
    let parent = Parent::Node(node);
    match g.kind(node) {
        NodeKind::Choice { alternatives } => {
            for &alt in alternatives {
                visit(v, g, alt, parent, ctx);
            }
        }
        NodeKind::Sequence { elements } => {
            for &element in elements {
                visit(v, g, element, parent, ctx);
            }
        }
        NodeKind::Named { expression, .. }
        | NodeKind::Action { expression, .. }
        | NodeKind::Labeled { expression, .. }
        | NodeKind::Text { expression }
        | NodeKind::SimpleAnd { expression }
        | NodeKind::SimpleNot { expression }
        | NodeKind::Optional { expression }
        | NodeKind::ZeroOrMore { expression }
        | NodeKind::OneOrMore { expression } => {
            visit(v, g, *expression, parent, ctx);
        }
        NodeKind::Range {
            expression,
            delimiter,
            ..
        } => {
            visit(v, g, *expression, parent, ctx);
            if let Some(delimiter) = delimiter {
                visit(v, g, *delimiter, parent, ctx);
            }
        }
        NodeKind::SemanticAnd { .. }
        | NodeKind::SemanticNot { .. }
        | NodeKind::RuleRef { .. }
        | NodeKind::Literal { .. }
        | NodeKind::Class { .. }
        | NodeKind::Regex { .. }
        | NodeKind::Any
        | NodeKind::Epsilon
        | NodeKind::Code { .. } => {}
    }
    V::Out::default()
}
