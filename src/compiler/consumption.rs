//! Consumption analysis
//!
//! For every node, how many characters it consumes at least and at most,
//! and an approximate FIRST set: the terminals that may match its first
//! character. Left-recursion and infinite-loop detection read `min`.
//!
//! Rule references read the current record of their target, so recursive
//! rules are solved by sweeping all rules until no record changes. Every
//! rule starts at the placeholder `{min: 0, max: 0}` and records only
//! grow. A cycle without a base case would grow forever, so after
//! `rules + 2` sweeps any bound still moving is widened: `max` becomes
//! infinite, `min` keeps its value and FIRST sets are unioned. Whether
//! `min` is zero has settled by then, which is all the checks rely on.

use super::ast::{Grammar, NodeId, NodeKind};
use super::session::Facts;
use super::visitor::{visit, Parent, Visitor};
use crate::runtime::regex_cache;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Upper consumption bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Max {
    /// At most this many characters
    Finite(u32),
    /// No bound
    Infinite,
}

impl Max {
    /// Whether anything at all may be consumed
    pub fn is_positive(self) -> bool {
        self != Max::Finite(0)
    }

    fn add(self, other: Max) -> Max {
        match (self, other) {
            (Max::Finite(a), Max::Finite(b)) => Max::Finite(a.saturating_add(b)),
            _ => Max::Infinite,
        }
    }

    fn times(self, n: u32) -> Max {
        match self {
            _ if n == 0 => Max::Finite(0),
            Max::Finite(a) => Max::Finite(a.saturating_mul(n)),
            Max::Infinite => Max::Infinite,
        }
    }
}

impl fmt::Display for Max {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Max::Finite(n) => write!(f, "{}", n),
            Max::Infinite => f.write_str("inf"),
        }
    }
}

/// Terminal categories of FIRST sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FirstKind {
    /// Literal strings
    Literal,
    /// Character classes
    Class,
    /// Regular expressions
    Regex,
    /// Any character
    Any,
}

/// Consumption record of one node or rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Consumption {
    /// Characters consumed at least
    pub min: u32,
    /// Characters consumed at most
    pub max: Max,
    /// Terminals that may match first, by category
    pub first: BTreeMap<FirstKind, Vec<NodeId>>,
}

impl Default for Consumption {
    fn default() -> Self {
        Self::nothing()
    }
}

impl Consumption {
    /// Consumes nothing
    pub fn nothing() -> Self {
        Self {
            min: 0,
            max: Max::Finite(0),
            first: BTreeMap::new(),
        }
    }

    /// Exactly `n` characters
    pub fn exactly(n: u32) -> Self {
        Self {
            min: n,
            max: Max::Finite(n),
            first: BTreeMap::new(),
        }
    }

    fn terminal(mut self, kind: FirstKind, node: NodeId) -> Self {
        self.first.insert(kind, vec![node]);
        self
    }

    /// Whether the node may succeed without consuming
    pub fn matches_empty(&self) -> bool {
        self.min == 0
    }

    /// Whether `min <= max`
    pub fn is_consistent(&self) -> bool {
        Max::Finite(self.min) <= self.max
    }

    /// Every FIRST node, in category order
    pub fn first_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.first.values().flatten().copied()
    }

    fn merge_first(&mut self, other: &BTreeMap<FirstKind, Vec<NodeId>>) {
        for (kind, nodes) in other {
            let entry = self.first.entry(*kind).or_default();
            for node in nodes {
                if let Err(at) = entry.binary_search(node) {
                    entry.insert(at, *node);
                }
            }
        }
    }
}

struct Analyzer<'f> {
    targets: &'f [Option<usize>],
    records: Vec<Consumption>,
    nodes: Vec<Option<Consumption>>,
}

impl Analyzer<'_> {
    fn child(&mut self, g: &Grammar, node: NodeId, child: NodeId) -> Consumption {
        visit(self, g, child, Parent::Node(node), &mut ())
    }

    /// Re-evaluate every rule once; returns whether any record changed
    fn sweep(&mut self, g: &Grammar, widen: bool) -> bool {
        let mut changed = false;
        for rule in 0..g.rules.len() {
            let mut next = visit(self, g, g.rules[rule].expression, Parent::Rule(rule), &mut ());
            let current = &self.records[rule];
            if next == *current {
                continue;
            }
            if widen {
                if next.max != current.max {
                    next.max = Max::Infinite;
                }
                next.min = current.min;
                next.merge_first(&current.first);
                if next == *current {
                    continue;
                }
            }
            self.records[rule] = next;
            changed = true;
        }
        changed
    }
}

impl Visitor for Analyzer<'_> {
    type Ctx = ();
    type Out = Consumption;

    fn node(&mut self, g: &Grammar, node: NodeId, _parent: Parent, _ctx: &mut ()) -> Consumption {
        match g.kind(node) {
            NodeKind::Literal { value, .. } => {
                let n = value.chars().count() as u32;
                let c = Consumption::exactly(n);
                if n > 0 {
                    c.terminal(FirstKind::Literal, node)
                } else {
                    c
                }
            }
            NodeKind::Class { .. } => Consumption::exactly(1).terminal(FirstKind::Class, node),
            NodeKind::Any => Consumption::exactly(1).terminal(FirstKind::Any, node),
            NodeKind::Regex {
                value,
                ignore_case,
                multi_line,
                ..
            } => {
                let empty = regex_cache::matches_empty(value, *ignore_case, *multi_line).unwrap_or(true);
                Consumption {
                    min: u32::from(!empty),
                    max: Max::Infinite,
                    first: BTreeMap::new(),
                }
                .terminal(FirstKind::Regex, node)
            }
            NodeKind::Epsilon
            | NodeKind::SemanticAnd { .. }
            | NodeKind::SemanticNot { .. }
            | NodeKind::Code { .. } => Consumption::nothing(),

            NodeKind::SimpleAnd { expression } | NodeKind::SimpleNot { expression } => {
                self.child(g, node, *expression);
                Consumption::nothing()
            }
            NodeKind::Named { expression, .. }
            | NodeKind::Action { expression, .. }
            | NodeKind::Labeled { expression, .. }
            | NodeKind::Text { expression } => self.child(g, node, *expression),

            NodeKind::Optional { expression } => {
                let mut c = self.child(g, node, *expression);
                c.min = 0;
                c
            }
            NodeKind::ZeroOrMore { expression } | NodeKind::OneOrMore { expression } => {
                let mut c = self.child(g, node, *expression);
                if matches!(g.kind(node), NodeKind::ZeroOrMore { .. }) {
                    c.min = 0;
                }
                c.max = if c.max.is_positive() {
                    Max::Infinite
                } else {
                    Max::Finite(0)
                };
                c
            }
            NodeKind::Range {
                min,
                max,
                expression,
                delimiter,
            } => {
                let element = self.child(g, node, *expression);
                let delimiter = match delimiter {
                    Some(d) => self.child(g, node, *d),
                    None => Consumption::nothing(),
                };
                let mut c = Consumption {
                    min: element.min.saturating_mul(*min),
                    max: Max::Finite(0),
                    first: element.first.clone(),
                };
                if *min >= 2 {
                    c.min = c.min.saturating_add((*min - 1).saturating_mul(delimiter.min));
                }
                c.max = match max {
                    Some(m) => element.max.times(*m).add(delimiter.max.times(m.saturating_sub(1))),
                    None if element.max.is_positive() || delimiter.max.is_positive() => Max::Infinite,
                    None => Max::Finite(0),
                };
                if c.max == Max::Finite(0) {
                    c.first.clear();
                }
                c
            }

            NodeKind::Sequence { elements } => {
                let mut c = Consumption::exactly(0);
                for &element in elements {
                    let e = self.child(g, node, element);
                    if c.min == 0 {
                        c.merge_first(&e.first);
                    }
                    c.min = c.min.saturating_add(e.min);
                    c.max = c.max.add(e.max);
                }
                c
            }
            NodeKind::Choice { alternatives } => {
                let mut c: Option<Consumption> = None;
                for &alt in alternatives {
                    let a = self.child(g, node, alt);
                    c = Some(match c {
                        None => a,
                        Some(mut c) => {
                            c.min = c.min.min(a.min);
                            c.max = c.max.max(a.max);
                            c.merge_first(&a.first);
                            c
                        }
                    });
                }
                c.unwrap_or_default()
            }

            NodeKind::RuleRef { .. } => match self.targets.get(node.index()).copied().flatten() {
                Some(rule) => self.records[rule].clone(),
                None => Consumption::nothing(),
            },
        }
    }

    fn post(
        &mut self,
        _g: &Grammar,
        node: NodeId,
        _parent: Parent,
        out: Consumption,
        _ctx: &mut (),
    ) -> Consumption {
        self.nodes[node.index()] = Some(out.clone());
        out
    }
}

/// Compute consumption records for every node and rule
pub fn analyze(g: &Grammar, facts: &mut Facts) {
    let mut analyzer = Analyzer {
        targets: &facts.targets,
        records: vec![Consumption::nothing(); g.rules.len()],
        nodes: vec![None; g.nodes.len()],
    };

    let limit = g.rules.len() + 2;
    let mut sweeps = 0;
    while analyzer.sweep(g, sweeps >= limit) {
        sweeps += 1;
    }

    // The last sweep changed nothing, so node records match the rule records
    facts.consumption = analyzer.nodes;
    for (rule, record) in facts.rules.iter_mut().zip(analyzer.records) {
        rule.consumption = Some(record);
    }
}
