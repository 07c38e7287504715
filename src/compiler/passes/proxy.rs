//! Proxy rule elision
//!
//! A rule whose body is only a reference, possibly labeled, is an alias.
//! References to it are pointed at the aliased rule, a label it carried
//! moves onto the target, and the alias is dropped unless it is a starter.

use crate::compiler::ast::{Grammar, NodeId, NodeKind};
use crate::compiler::diagnostics::CompileError;
use crate::compiler::session::Session;

/// A rule that only delegates to another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proxy {
    /// Index of the proxy rule
    pub rule: usize,
    /// Name of the rule it delegates to
    pub target: String,
    /// Label carried by the proxy body
    pub label: Option<String>,
}

/// The proxy shape of a rule, if it has one
pub fn proxy_of(g: &Grammar, rule: usize) -> Option<Proxy> {
    let root = g.rules.get(rule)?.expression;
    let (label, reference) = match g.kind(root) {
        NodeKind::Labeled { label, expression } => (label.clone(), *expression),
        _ => (None, root),
    };
    match g.kind(reference) {
        NodeKind::RuleRef { name } if *name != g.rules[rule].name => Some(Proxy {
            rule,
            target: name.clone(),
            label,
        }),
        _ => None,
    }
}

/// Point every reference to `from` at `to`; returns the rewritten nodes
fn redirect(g: &mut Grammar, from: &str, to: &str) -> Vec<NodeId> {
    let mut rewritten = Vec::new();
    for (index, node) in g.nodes.iter_mut().enumerate() {
        if let NodeKind::RuleRef { name } = &mut node.kind {
            if name == from {
                *name = to.to_string();
                rewritten.push(NodeId(index as u32));
            }
        }
    }
    rewritten
}

/// Move a proxy label onto the target rule's body; true when it changed
fn migrate_label(g: &mut Grammar, target: usize, label: &str) -> bool {
    let root = g.rules[target].expression;
    if let NodeKind::Labeled { label: slot, .. } = &mut g.node_mut(root).kind {
        if slot.is_some() {
            return false;
        }
        *slot = Some(label.to_string());
        return true;
    }

    let location = g.node(root).location;
    let wrapped = g.add_node(
        NodeKind::Labeled {
            label: Some(label.to_string()),
            expression: root,
        },
        location,
    );
    g.rules[target].expression = wrapped;
    true
}

/// Transform pass
pub fn run(s: &mut Session<'_>) -> Result<(), CompileError> {
    let mut doomed = Vec::new();

    for rule in 0..s.grammar.rules.len() {
        let Some(proxy) = proxy_of(&s.grammar, rule) else {
            continue;
        };
        let Some(target) = s.grammar.rule_index(&proxy.target) else {
            continue;
        };
        let from = s.grammar.rules[rule].name.clone();
        s.diagnostics.info(
            format!("Rule \"{}\" is a proxy rule. (It will be reduced.)", from),
            s.grammar.rules[rule].location,
        );

        for node in redirect(&mut s.grammar, &from, &proxy.target) {
            let message = format!(
                "Reference to Proxy Rule \"{}\" replaced with rule \"{}\" in rule \"{}\".",
                from,
                proxy.target,
                s.owner_name(node)
            );
            s.diagnostics.info(message, s.grammar.node(node).location);
        }

        if let Some(label) = &proxy.label {
            if migrate_label(&mut s.grammar, target, label) {
                s.diagnostics.info(
                    format!(
                        "Rule \"{}\" is updated with the label from the proxy rule \"{}\".",
                        proxy.target, from
                    ),
                    s.grammar.rules[target].location,
                );
            }
        }

        if !s.facts.rules[rule].starter.is_starter() {
            doomed.push(rule);
        }
    }

    if doomed.is_empty() {
        s.relink();
    } else {
        log_debug!("eliding {} proxy rule(s)", doomed.len());
        s.remove_rules(&doomed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::diagnostics::Diagnostics;
    use crate::compiler::dsl::*;
    use crate::compiler::options::{CompileOptions, StartRules};
    use crate::compiler::passes::link;

    fn elide(b: GrammarBuilder, starters: StartRules) -> Session<'static> {
        let options = CompileOptions::default().with_start_rules(starters);
        let mut s = Session::new(b.build(), options, Diagnostics::new());
        link::run(&mut s).unwrap();
        run(&mut s).unwrap();
        s
    }

    #[test]
    fn test_proxy_removed_and_references_redirected() {
        let s = elide(
            GrammarBuilder::new()
                .rule("start", seq(vec![rule_ref("proxy"), rule_ref("proxy")]))
                .rule("proxy", rule_ref("a"))
                .rule("a", lit("a")),
            StartRules::listed(["start"]),
        );
        let names: Vec<_> = s.grammar.rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["start", "a"]);

        let root = s.grammar.rules[0].expression;
        for child in s.grammar.children(root) {
            assert_eq!(s.facts.target(child), Some(1));
        }
        assert!(s.facts.rules[1].invokers.contains("start"));
        let replaced = s
            .diagnostics
            .problems()
            .iter()
            .filter(|p| p.message.starts_with("Reference to Proxy Rule"))
            .count();
        assert_eq!(replaced, 2);
    }

    #[test]
    fn test_starter_proxy_kept() {
        let s = elide(
            GrammarBuilder::new()
                .rule("start", rule_ref("proxy"))
                .rule("proxy", rule_ref("a"))
                .rule("a", lit("a")),
            StartRules::listed(["start", "proxy"]),
        );
        let names: Vec<_> = s.grammar.rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["start", "proxy", "a"]);
        assert_eq!(s.facts.target(s.grammar.rules[0].expression), Some(2));
    }

    #[test]
    fn test_label_migrates_to_target() {
        let s = elide(
            GrammarBuilder::new()
                .rule("start", seq(vec![rule_ref("digit"), lit(";")]))
                .rule("digit", label("number", rule_ref("d")))
                .rule("d", class(vec![ClassPart::Range('0', '9')], false)),
            StartRules::Default,
        );
        let d = s.grammar.rule("d").unwrap();
        assert!(matches!(
            s.grammar.kind(d.expression),
            NodeKind::Labeled { label: Some(l), .. } if l == "number"
        ));
        assert!(s
            .diagnostics
            .problems()
            .iter()
            .any(|p| p.message.contains("is updated with the label")));
    }

    #[test]
    fn test_chained_proxies() {
        let s = elide(
            GrammarBuilder::new()
                .rule("start", rule_ref("x"))
                .rule("x", rule_ref("y"))
                .rule("y", rule_ref("z"))
                .rule("z", lit("z")),
            StartRules::Default,
        );
        let names: Vec<_> = s.grammar.rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["start", "z"]);
    }
}
