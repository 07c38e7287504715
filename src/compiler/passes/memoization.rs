//! Memoization policy
//!
//! `@cache` and `@nocache` decide per rule whether results are memoized.
//! With an `all` or `none` parameter they set the grammar-wide default
//! instead:
//!
//! | annotation       | default |
//! |------------------|---------|
//! | `@cache(all)`    | on      |
//! | `@cache(none)`   | off     |
//! | `@nocache(all)`  | off     |
//! | `@nocache(none)` | on      |
//!
//! Only the first grammar-wide annotation and the first annotation of
//! each rule count; later ones are reported and ignored. `force_cache`
//! turns the default on without touching explicit per-rule annotations.

use crate::compiler::ast::{Annotation, Grammar};
use crate::compiler::diagnostics::CompileError;
use crate::compiler::session::Session;
use crate::compiler::visitor::{visit_grammar, Visitor};
use crate::runtime::location::Location;

/// Outcome of reading the cache annotations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Policy {
    /// Grammar-wide default, when annotated
    pub default: Option<bool>,
    /// Per-rule decision, when annotated
    pub rules: Vec<Option<bool>>,
    /// Annotations that were ignored, with the message explaining why
    pub conflicts: Vec<(String, Option<Location>)>,
}

fn at(location: Option<Location>) -> String {
    location
        .map(|l| format!(" The one at line {}, column {} is ignored.", l.start.line, l.start.column))
        .unwrap_or_default()
}

impl Visitor for Policy {
    type Ctx = ();
    type Out = ();

    fn annotation_pre(&mut self, g: &Grammar, rule: usize, annotation: &Annotation, _ctx: &mut ()) {
        let cache = match annotation.name.as_str() {
            "cache" => true,
            "nocache" => false,
            _ => return,
        };
        let scope = annotation
            .params
            .iter()
            .filter_map(|p| p.as_keyword())
            .find(|k| *k == "all" || *k == "none");
        let location = annotation.location.or(g.rules[rule].location);

        match scope {
            Some(scope) => {
                let on = cache == (scope == "all");
                if self.default.is_some() {
                    self.conflicts.push((
                        format!(
                            "Multiple cache(all/none) declarations; only the first one is used.{}",
                            at(location)
                        ),
                        location,
                    ));
                } else {
                    self.default = Some(on);
                }
            }
            None => {
                if self.rules[rule].is_some() {
                    self.conflicts.push((
                        format!(
                            "Multiple cache() declarations apply to the same rule \"{}\"; only the first one is used.{}",
                            g.rules[rule].name,
                            at(location)
                        ),
                        location,
                    ));
                } else {
                    self.rules[rule] = Some(cache);
                }
            }
        }
    }
}

/// Read the cache annotations of a grammar
pub fn policy(g: &Grammar) -> Policy {
    let mut policy = Policy {
        rules: vec![None; g.rules.len()],
        ..Policy::default()
    };
    visit_grammar(&mut policy, g, &mut ());
    policy
}

/// Transform pass
pub fn run(s: &mut Session<'_>) -> Result<(), CompileError> {
    let mut policy = policy(&s.grammar);
    for (message, location) in std::mem::take(&mut policy.conflicts) {
        s.diagnostics.warning(message, location);
    }
    if s.options.force_cache {
        policy.default = Some(true);
    }

    let default = policy.default.unwrap_or(s.options.cache);
    for (facts, decision) in s.facts.rules.iter_mut().zip(&policy.rules) {
        facts.memoize = decision.unwrap_or(default);
    }
    let memoize = s.facts.rules.iter().any(|r| r.memoize);

    if memoize && !s.options.cache {
        s.diagnostics.info(
            "The cache/nocache annotations in the grammar override the parser cache/memoize option to be MEMOIZE=ON.",
            None,
        );
    } else if !memoize && s.options.cache {
        s.diagnostics.info(
            "The cache/nocache annotations in the grammar override the parser cache/memoize option to be MEMOIZE=OFF.",
            None,
        );
    }
    s.facts.memoize = memoize;
    log_debug!(
        "memoization {} ({} of {} rules)",
        if memoize { "on" } else { "off" },
        s.facts.rules.iter().filter(|r| r.memoize).count(),
        s.facts.rules.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::diagnostics::{Diagnostics, Severity};
    use crate::compiler::dsl::*;
    use crate::compiler::options::CompileOptions;
    use crate::compiler::session::Facts;

    fn resolve(b: GrammarBuilder, options: CompileOptions) -> (Vec<bool>, bool, Vec<(Severity, String)>) {
        let mut s = Session::new(b.build(), options, Diagnostics::new());
        s.facts = Facts::linked(&s.grammar);
        run(&mut s).unwrap();
        let memo = s.facts.rules.iter().map(|r| r.memoize).collect();
        let problems = s
            .diagnostics
            .problems()
            .iter()
            .map(|p| (p.severity, p.message.clone()))
            .collect();
        (memo, s.facts.memoize, problems)
    }

    fn two_rules(annotations: Vec<Annotation>) -> GrammarBuilder {
        GrammarBuilder::new()
            .annotated_rule("a", annotations, rule_ref("b"))
            .rule("b", lit("b"))
    }

    #[test]
    fn test_truth_table() {
        let cases = [
            (cache(Some("all")), true),
            (cache(Some("none")), false),
            (nocache(Some("all")), false),
            (nocache(Some("none")), true),
        ];
        for (annotation, expected) in cases {
            let (memo, _, _) = resolve(two_rules(vec![annotation]), CompileOptions::default());
            assert_eq!(memo, vec![expected, expected]);

            let (memo, _, _) = resolve(two_rules(vec![]), CompileOptions::default().with_cache(expected));
            assert_eq!(memo, vec![expected, expected]);
        }
    }

    #[test]
    fn test_rule_annotation_overrides_default() {
        let (memo, program, problems) = resolve(two_rules(vec![cache(None)]), CompileOptions::default());
        assert_eq!(memo, vec![true, false]);
        assert!(program);
        assert!(problems
            .iter()
            .any(|(sev, msg)| *sev == Severity::Info && msg.ends_with("MEMOIZE=ON.")));
    }

    #[test]
    fn test_all_off_flips_cache_option() {
        let (memo, program, problems) = resolve(
            two_rules(vec![nocache(Some("all"))]),
            CompileOptions::default().with_cache(true),
        );
        assert_eq!(memo, vec![false, false]);
        assert!(!program);
        assert!(problems.iter().any(|(_, msg)| msg.ends_with("MEMOIZE=OFF.")));
    }

    #[test]
    fn test_first_declaration_wins() {
        let (memo, _, problems) = resolve(
            two_rules(vec![cache(None), nocache(None), cache(Some("all")), nocache(Some("all"))]),
            CompileOptions::default(),
        );
        assert_eq!(memo, vec![true, true]);
        let warnings = problems.iter().filter(|(sev, _)| *sev == Severity::Warning).count();
        assert_eq!(warnings, 2);
    }

    #[test]
    fn test_force_cache_keeps_explicit_nocache() {
        let (memo, _, _) = resolve(
            two_rules(vec![nocache(None)]),
            CompileOptions::default().with_force_cache(true),
        );
        assert_eq!(memo, vec![false, true]);

        let (memo, _, _) = resolve(
            GrammarBuilder::new()
                .annotated_rule("a", vec![nocache(Some("all"))], rule_ref("b"))
                .rule("b", lit("b")),
            CompileOptions::default().with_force_cache(true),
        );
        assert_eq!(memo, vec![true, true]);
    }
}
