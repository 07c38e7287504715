//! Graph linking
//!
//! Resolves the starter set, then fills the structural side tables:
//! depth, parent, owning rule, reference targets and invoker sets.

use crate::compiler::ast::Grammar;
use crate::compiler::diagnostics::CompileError;
use crate::compiler::options::StartRules;
use crate::compiler::session::Session;

/// Outcome of matching the configured start rules against the grammar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StarterResolution {
    /// Starter names in priority order, without duplicates
    pub starters: Vec<String>,
    /// Configured names that match no rule
    pub unmatched: Vec<String>,
    /// Whether nothing matched and the first rule was taken instead
    pub fell_back: bool,
}

/// Match the configured start rules against the grammar
pub fn resolve_starters(g: &Grammar, requested: &StartRules) -> StarterResolution {
    let names: Vec<String> = match requested {
        StartRules::Default => g.rules.first().map(|r| r.name.clone()).into_iter().collect(),
        StartRules::All => g.rules.iter().map(|r| r.name.clone()).collect(),
        StartRules::Listed(names) => names.clone(),
    };

    let mut starters: Vec<String> = Vec::new();
    let mut unmatched = Vec::new();
    for name in names {
        if g.rule_index(&name).is_none() {
            unmatched.push(name);
        } else if !starters.contains(&name) {
            starters.push(name);
        }
    }

    let fell_back = starters.is_empty();
    if fell_back {
        starters.extend(g.rules.first().map(|r| r.name.clone()));
    }
    StarterResolution {
        starters,
        unmatched,
        fell_back,
    }
}

/// Preparation pass
pub fn run(s: &mut Session<'_>) -> Result<(), CompileError> {
    if s.grammar.rules.is_empty() {
        return Err(s
            .diagnostics
            .fatal("The grammar must contain at least one rule.", None)
            .into());
    }

    let resolution = resolve_starters(&s.grammar, &s.options.allowed_start_rules);
    if !resolution.unmatched.is_empty() {
        s.diagnostics.warning(
            format!(
                "These rules specified in the options as starters are not defined in this grammar: {}",
                resolution.unmatched.join(", ")
            ),
            None,
        );
    }
    if resolution.fell_back {
        s.diagnostics.warning(
            format!(
                "No valid starter rule has been defined. Assuming the first rule ({}) is the only starter.",
                s.grammar.rules[0].name
            ),
            s.grammar.rules[0].location,
        );
    }

    s.facts.link(&s.grammar, &resolution.starters);
    Ok(())
}
