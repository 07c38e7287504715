//! Compilation session and side tables
//!
//! The grammar arena stays a plain tree. Everything passes learn about it
//! lives in [`Facts`], indexed by [`NodeId`] or rule index, so each pass
//! reads the facts it needs and writes the ones it computes.

use super::ast::{Grammar, NodeId, NodeKind};
use super::consumption::{Consumption, Max};
use super::diagnostics::Diagnostics;
use super::options::CompileOptions;
use super::visitor::{visit_grammar, walk_node, Parent, Visitor};
use crate::runtime::program::Program;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

static NOTHING: Consumption = Consumption {
    min: 0,
    max: Max::Finite(0),
    first: BTreeMap::new(),
};

/// Whether a rule may start a parse
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Starter {
    /// Not an entry point
    #[default]
    No,
    /// An entry point
    Yes,
    /// The entry point used when none is requested
    Default,
}

impl Starter {
    /// Whether the rule is an entry point
    pub fn is_starter(self) -> bool {
        self != Starter::No
    }
}

/// A description propagated onto a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Description {
    /// Text (rule name, display name or label)
    pub text: String,
    /// Depth of the node it originates from
    pub depth: u32,
}

/// Facts about one rule
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RuleFacts {
    /// Names of the rules referencing this one
    pub invokers: BTreeSet<String>,
    /// Entry point status
    pub starter: Starter,
    /// Consumption of the rule body
    pub consumption: Option<Consumption>,
    /// Resolved memoization
    pub memoize: bool,
}

/// Side tables computed by passes
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Facts {
    /// Tree depth per node (the grammar is 0, rules are 1)
    pub depth: Vec<u32>,
    /// Parent per node
    pub parent: Vec<Option<Parent>>,
    /// Owning rule per node
    pub rule_of: Vec<Option<usize>>,
    /// Target rule per `rule_ref` node
    pub targets: Vec<Option<usize>>,
    /// Propagated description per node
    pub descriptions: Vec<Option<Description>>,
    /// Consumption per node
    pub consumption: Vec<Option<Consumption>>,
    /// Synthetic names of unlabeled sequence elements
    pub auto_labels: Vec<Option<String>>,
    /// Per-rule facts
    pub rules: Vec<RuleFacts>,
    /// Starter rule names, in priority order
    pub starters: Vec<String>,
    /// Memoization support compiled in
    pub memoize: bool,
    /// Run-time statistics collected
    pub statistics: bool,
}

impl Facts {
    /// Facts of a grammar linked with its first rule as the only starter
    pub fn linked(g: &Grammar) -> Self {
        let mut facts = Facts::default();
        let starters: Vec<String> = g.rules.first().map(|r| r.name.clone()).into_iter().collect();
        facts.link(g, &starters);
        facts
    }

    /// Rebuild the structural tables: depth, parents, targets, invokers, starters
    ///
    /// Analysis results already computed are kept for nodes that still exist.
    pub fn link(&mut self, g: &Grammar, starters: &[String]) {
        let n = g.nodes.len();
        self.depth = vec![0; n];
        self.parent = vec![None; n];
        self.rule_of = vec![None; n];
        self.targets = vec![None; n];
        self.descriptions.resize(n, None);
        self.consumption.resize(n, None);
        self.auto_labels.resize(n, None);

        let mut rules = vec![RuleFacts::default(); g.rules.len()];
        for (old, new) in self.rules.iter().zip(rules.iter_mut()) {
            new.consumption = old.consumption.clone();
            new.memoize = old.memoize;
        }
        self.rules = rules;
        self.starters = starters.to_vec();

        let mut linker = Linker { facts: self };
        visit_grammar(&mut linker, g, &mut 0);

        for (i, name) in starters.iter().enumerate() {
            if let Some(index) = g.rule_index(name) {
                self.rules[index].starter = if i == 0 {
                    Starter::Default
                } else {
                    Starter::Yes
                };
            }
        }
    }

    /// Consumption of a node (nothing if not analyzed)
    pub fn node_consumption(&self, node: NodeId) -> &Consumption {
        self.consumption
            .get(node.index())
            .and_then(Option::as_ref)
            .unwrap_or(&NOTHING)
    }

    /// Target rule of a `rule_ref` node
    pub fn target(&self, node: NodeId) -> Option<usize> {
        self.targets.get(node.index()).copied().flatten()
    }

    /// Description of a node
    pub fn description(&self, node: NodeId) -> Option<&str> {
        self.descriptions
            .get(node.index())
            .and_then(Option::as_ref)
            .map(|d| d.text.as_str())
    }

    /// Rule owning a node
    pub fn rule_of(&self, node: NodeId) -> Option<usize> {
        self.rule_of.get(node.index()).copied().flatten()
    }

    /// Rule indices of the starters, in priority order
    pub fn starter_indices(&self, g: &Grammar) -> Vec<usize> {
        self.starters.iter().filter_map(|s| g.rule_index(s)).collect()
    }
}

struct Linker<'f> {
    facts: &'f mut Facts,
}

impl Visitor for Linker<'_> {
    type Ctx = usize;
    type Out = ();

    fn rule(&mut self, g: &Grammar, rule: usize, active: &mut usize) {
        *active = rule;
        super::visitor::walk_rule(self, g, rule, active)
    }

    fn pre(&mut self, _g: &Grammar, node: NodeId, parent: Parent, active: &mut usize) {
        let depth = match parent {
            Parent::Rule(_) => 2,
            Parent::Node(p) => self.facts.depth[p.index()] + 1,
        };
        self.facts.depth[node.index()] = depth;
        self.facts.parent[node.index()] = Some(parent);
        self.facts.rule_of[node.index()] = Some(*active);
    }

    fn node(&mut self, g: &Grammar, node: NodeId, _parent: Parent, active: &mut usize) {
        if let NodeKind::RuleRef { name } = g.kind(node) {
            if let Some(target) = g.rule_index(name) {
                self.facts.targets[node.index()] = Some(target);
                let invoker = g.rules[*active].name.clone();
                self.facts.rules[target].invokers.insert(invoker);
            }
        }
        walk_node(self, g, node, active)
    }
}

/// State of one compilation
pub struct Session<'c> {
    /// The grammar
    pub grammar: Grammar,
    /// Side tables
    pub facts: Facts,
    /// Options, possibly adjusted by passes
    pub options: CompileOptions,
    /// Problem recording
    pub diagnostics: Diagnostics<'c>,
    /// Compiled program, once generated
    pub program: Option<Program>,
    /// Emitted source, once generated
    pub source: Option<String>,
}

impl<'c> Session<'c> {
    /// Start a session
    pub fn new(grammar: Grammar, options: CompileOptions, diagnostics: Diagnostics<'c>) -> Self {
        Self {
            grammar,
            facts: Facts::default(),
            options,
            diagnostics,
            program: None,
            source: None,
        }
    }

    /// Relink after the rule list or references changed
    pub fn relink(&mut self) {
        let starters = std::mem::take(&mut self.facts.starters);
        self.facts.link(&self.grammar, &starters);
    }

    /// Remove rules by index and relink
    ///
    /// Indices are removed from the highest down so earlier ones stay valid.
    pub fn remove_rules(&mut self, indices: &[usize]) {
        let mut sorted = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        for &index in sorted.iter().rev() {
            if index < self.grammar.rules.len() {
                self.grammar.rules.remove(index);
                if index < self.facts.rules.len() {
                    self.facts.rules.remove(index);
                }
            }
        }
        self.relink();
    }

    /// Name of a rule
    pub fn rule_name(&self, rule: usize) -> &str {
        self.grammar.rules.get(rule).map_or("", |r| r.name.as_str())
    }

    /// Name of the rule owning a node
    pub fn owner_name(&self, node: NodeId) -> &str {
        self.facts.rule_of(node).map_or("", |r| self.rule_name(r))
    }
}

impl std::fmt::Debug for Session<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("rules", &self.grammar.rules.len())
            .field("nodes", &self.grammar.nodes.len())
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

/// The annotated grammar, as produced by the `ast` output
#[derive(Debug, Clone, Serialize)]
pub struct AnnotatedGrammar {
    /// The transformed grammar
    pub grammar: Grammar,
    /// Everything passes computed about it
    pub facts: Facts,
}

impl AnnotatedGrammar {
    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::dsl::*;

    #[test]
    fn test_link_depth_parent_targets() {
        let g = GrammarBuilder::new()
            .rule("start", seq(vec![rule_ref("a"), opt(rule_ref("a"))]))
            .rule("a", lit("a"))
            .build();
        let facts = Facts::linked(&g);
        let root = g.rules[0].expression;
        assert_eq!(facts.depth[root.index()], 2);
        assert_eq!(facts.parent[root.index()], Some(Parent::Rule(0)));

        let children = g.children(root);
        assert_eq!(facts.target(children[0]), Some(1));
        let inner = g.children(children[1])[0];
        assert_eq!(facts.depth[inner.index()], 4);
        assert_eq!(facts.rule_of(inner), Some(0));

        assert_eq!(facts.rules[1].invokers.iter().collect::<Vec<_>>(), vec!["start"]);
        assert_eq!(facts.rules[0].starter, Starter::Default);
        assert_eq!(facts.rules[1].starter, Starter::No);
    }

    #[test]
    fn test_remove_rules_relinks() {
        let g = GrammarBuilder::new()
            .rule("start", rule_ref("b"))
            .rule("a", lit("a"))
            .rule("b", lit("b"))
            .build();
        let mut session = Session::new(g, CompileOptions::default(), Diagnostics::new());
        session.facts = Facts::linked(&session.grammar);
        session.remove_rules(&[1]);
        assert_eq!(session.grammar.rules.len(), 2);
        let root = session.grammar.rules[0].expression;
        assert_eq!(session.facts.target(root), Some(1));
        assert_eq!(session.rule_name(1), "b");
    }
}
