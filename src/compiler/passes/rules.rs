//! Rule-level checks: duplicate, missing and unused rules

use crate::compiler::ast::{Grammar, NodeId, NodeKind};
use crate::compiler::diagnostics::{CompileError, Problem, Severity};
use crate::compiler::session::{Facts, Session};
use crate::compiler::visitor::{visit_grammar, walk_node, Parent, Visitor};
use crate::runtime::location::Location;
use hashbrown::HashMap;

fn origin(location: Option<Location>) -> String {
    match location {
        Some(loc) => format!("line {}, column {}", loc.start.line, loc.start.column),
        None => "(...unspecified location...)".to_string(),
    }
}

/// Rules defined more than once
///
/// Errors when duplicates are reported, warnings about the redefinition
/// otherwise. References always resolve to the first definition.
pub fn duplicates(s: &mut Session<'_>) -> Result<(), CompileError> {
    let mut first: HashMap<&str, Option<Location>, ahash::RandomState> = HashMap::default();
    let mut problems = Vec::new();

    for rule in &s.grammar.rules {
        match first.get(rule.name.as_str()) {
            Some(previous) if s.options.report_duplicate_rules => problems.push(
                Problem::new(
                    Severity::Error,
                    format!("Rule \"{}\" is defined at least twice.", rule.name),
                )
                .at(rule.location)
                .note("First definition", *previous)
                .note("Duplicate definition", rule.location),
            ),
            Some(previous) => problems.push(
                Problem::new(
                    Severity::Warning,
                    format!(
                        "Rule \"{}\" redefined; previously defined in {}.",
                        rule.name,
                        origin(*previous)
                    ),
                )
                .at(rule.location),
            ),
            None => {
                first.insert(rule.name.as_str(), rule.location);
            }
        }
    }

    for problem in problems {
        s.diagnostics.report(problem);
    }
    Ok(())
}

struct Missing<'f> {
    facts: &'f Facts,
    found: Vec<(String, Option<Location>)>,
}

impl Visitor for Missing<'_> {
    type Ctx = ();
    type Out = ();

    fn node(&mut self, g: &Grammar, node: NodeId, _parent: Parent, ctx: &mut ()) {
        if let NodeKind::RuleRef { name } = g.kind(node) {
            if self.facts.target(node).is_none() {
                self.found.push((name.clone(), g.node(node).location));
            }
        }
        walk_node(self, g, node, ctx)
    }
}

/// References to rules that do not exist
pub fn missing(s: &mut Session<'_>) -> Result<(), CompileError> {
    let mut missing = Missing {
        facts: &s.facts,
        found: Vec::new(),
    };
    visit_grammar(&mut missing, &s.grammar, &mut ());

    for (name, location) in missing.found {
        s.diagnostics
            .error(format!("Referenced rule \"{}\" does not exist.", name), location);
    }
    Ok(())
}

/// Rules reachable from the starters
pub fn reachable(g: &Grammar, facts: &Facts) -> Vec<bool> {
    let mut used = vec![false; g.rules.len()];
    let mut stack = facts.starter_indices(g);
    while let Some(rule) = stack.pop() {
        if used[rule] {
            continue;
        }
        used[rule] = true;
        for node in g.rule_nodes(rule) {
            if let Some(target) = facts.target(node) {
                if !used[target] {
                    stack.push(target);
                }
            }
        }
    }
    used
}

/// Drop every rule not reachable from a starter
pub fn unused(s: &mut Session<'_>) -> Result<(), CompileError> {
    let used = reachable(&s.grammar, &s.facts);
    let mut dropped = Vec::new();
    for (index, rule) in s.grammar.rules.iter().enumerate() {
        if !used[index] {
            dropped.push(index);
            s.diagnostics
                .warning(format!("Rule \"{}\" is not used.", rule.name), rule.location);
        }
    }
    if !dropped.is_empty() {
        log_debug!("dropping {} unused rule(s)", dropped.len());
        s.remove_rules(&dropped);
    }
    Ok(())
}
