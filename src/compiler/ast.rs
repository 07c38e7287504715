//! Grammar AST
//!
//! Expressions live in an arena and refer to their children by [`NodeId`].
//! Rules own one root expression each and are addressed by index. Facts
//! computed by passes (depth, parent, consumption, ...) are kept in side
//! tables keyed by `NodeId` rather than on the nodes themselves.
//!
//! The arena serializes to JSON; this is the `ast` output of the compiler.

use super::dsl::{Expr, ExprKind, GrammarSource};
use crate::runtime::location::Location;
use serde::{Deserialize, Serialize};

/// Index of a node in the grammar arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Arena index
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One part of a character class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassPart {
    /// A single character
    Char(char),
    /// An inclusive range
    Range(char, char),
}

/// Expression node kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    /// Expression reported under a human-readable name on failure
    Named {
        /// Display name
        name: String,
        /// Inner expression
        expression: NodeId,
    },
    /// Ordered choice
    Choice {
        /// Alternatives, tried left to right
        alternatives: Vec<NodeId>,
    },
    /// Expression with an action computing its value
    Action {
        /// Inner expression
        expression: NodeId,
        /// Action code
        code: String,
    },
    /// Sequence
    Sequence {
        /// Elements, matched in order
        elements: Vec<NodeId>,
    },
    /// Labeled expression (label may be absent after label migration)
    Labeled {
        /// Label
        label: Option<String>,
        /// Inner expression
        expression: NodeId,
    },
    /// Matched text instead of the value
    Text {
        /// Inner expression
        expression: NodeId,
    },
    /// Positive lookahead
    SimpleAnd {
        /// Inner expression
        expression: NodeId,
    },
    /// Negative lookahead
    SimpleNot {
        /// Inner expression
        expression: NodeId,
    },
    /// `e?`
    Optional {
        /// Inner expression
        expression: NodeId,
    },
    /// `e*`
    ZeroOrMore {
        /// Inner expression
        expression: NodeId,
    },
    /// `e+`
    OneOrMore {
        /// Inner expression
        expression: NodeId,
    },
    /// Bounded repetition with an optional delimiter
    Range {
        /// Minimum count
        min: u32,
        /// Maximum count (`None` is unbounded)
        max: Option<u32>,
        /// Repeated expression
        expression: NodeId,
        /// Expression matched between repetitions
        delimiter: Option<NodeId>,
    },
    /// `&{ code }`
    SemanticAnd {
        /// Predicate code
        code: String,
    },
    /// `!{ code }`
    SemanticNot {
        /// Predicate code
        code: String,
    },
    /// Reference to a rule by name
    RuleRef {
        /// Rule name
        name: String,
    },
    /// Literal string
    Literal {
        /// Text
        value: String,
        /// Case-insensitive match
        ignore_case: bool,
    },
    /// Character class
    Class {
        /// Characters and ranges
        parts: Vec<ClassPart>,
        /// `[^...]`
        inverted: bool,
        /// Case-insensitive match
        ignore_case: bool,
        /// Source text of the class
        raw_text: String,
    },
    /// Regular expression
    Regex {
        /// Pattern
        value: String,
        /// Case-insensitive match
        ignore_case: bool,
        /// `^`/`$` at line boundaries
        multi_line: bool,
        /// Source text of the regex
        raw_text: String,
    },
    /// Any single character
    Any,
    /// The empty match
    Epsilon,
    /// Inline code producing a value
    Code {
        /// Code
        code: String,
    },
}

impl NodeKind {
    /// Tag name as used in the JSON form
    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::Named { .. } => "named",
            NodeKind::Choice { .. } => "choice",
            NodeKind::Action { .. } => "action",
            NodeKind::Sequence { .. } => "sequence",
            NodeKind::Labeled { .. } => "labeled",
            NodeKind::Text { .. } => "text",
            NodeKind::SimpleAnd { .. } => "simple_and",
            NodeKind::SimpleNot { .. } => "simple_not",
            NodeKind::Optional { .. } => "optional",
            NodeKind::ZeroOrMore { .. } => "zero_or_more",
            NodeKind::OneOrMore { .. } => "one_or_more",
            NodeKind::Range { .. } => "range",
            NodeKind::SemanticAnd { .. } => "semantic_and",
            NodeKind::SemanticNot { .. } => "semantic_not",
            NodeKind::RuleRef { .. } => "rule_ref",
            NodeKind::Literal { .. } => "literal",
            NodeKind::Class { .. } => "class",
            NodeKind::Regex { .. } => "regex",
            NodeKind::Any => "any",
            NodeKind::Epsilon => "epsilon",
            NodeKind::Code { .. } => "code",
        }
    }

    /// Direct children, in evaluation order
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            NodeKind::Choice { alternatives } => alternatives.clone(),
            NodeKind::Sequence { elements } => elements.clone(),
            NodeKind::Named { expression, .. }
            | NodeKind::Action { expression, .. }
            | NodeKind::Labeled { expression, .. }
            | NodeKind::Text { expression }
            | NodeKind::SimpleAnd { expression }
            | NodeKind::SimpleNot { expression }
            | NodeKind::Optional { expression }
            | NodeKind::ZeroOrMore { expression }
            | NodeKind::OneOrMore { expression } => vec![*expression],
            NodeKind::Range {
                expression,
                delimiter,
                ..
            } => std::iter::once(*expression).chain(*delimiter).collect(),
            _ => Vec::new(),
        }
    }

    /// The single child of a wrapper node
    pub fn single_child(&self) -> Option<NodeId> {
        match self {
            NodeKind::Named { expression, .. }
            | NodeKind::Action { expression, .. }
            | NodeKind::Labeled { expression, .. }
            | NodeKind::Text { expression }
            | NodeKind::SimpleAnd { expression }
            | NodeKind::SimpleNot { expression }
            | NodeKind::Optional { expression }
            | NodeKind::ZeroOrMore { expression }
            | NodeKind::OneOrMore { expression } => Some(*expression),
            _ => None,
        }
    }
}

/// An expression node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// What the node is
    #[serde(flatten)]
    pub kind: NodeKind,
    /// Source location in the grammar text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// Annotation parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Param {
    /// Bare identifier such as `all`
    Keyword(String),
    /// Quoted string
    String(String),
    /// Integer
    Number(i64),
    /// `min..max`
    Range(Option<i64>, Option<i64>),
}

impl Param {
    /// Keyword parameter
    pub fn keyword(k: impl Into<String>) -> Self {
        Param::Keyword(k.into())
    }

    /// The keyword, if this is one
    pub fn as_keyword(&self) -> Option<&str> {
        match self {
            Param::Keyword(k) => Some(k),
            _ => None,
        }
    }
}

/// `@name(params)` attached to a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Name
    pub name: String,
    /// Parameters
    #[serde(default)]
    pub params: Vec<Param>,
    /// Source location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Annotation {
    /// Create an annotation without location
    pub fn new(name: impl Into<String>, params: Vec<Param>) -> Self {
        Self {
            name: name.into(),
            params,
            location: None,
        }
    }
}

/// A grammar rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Name
    pub name: String,
    /// Root expression
    pub expression: NodeId,
    /// Annotations
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    /// Source location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// A complete grammar
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Grammar {
    /// Rules in declaration order
    pub rules: Vec<Rule>,
    /// Expression arena
    pub nodes: Vec<Node>,
    /// Free-form code placed before the generated parser
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer: Option<String>,
}

impl Grammar {
    /// Create an empty grammar
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten a nested grammar description into the arena
    pub fn from_source(source: GrammarSource) -> Self {
        let mut grammar = Grammar {
            rules: Vec::with_capacity(source.rules.len()),
            nodes: Vec::new(),
            initializer: source.initializer,
        };
        for rule in source.rules {
            let expression = grammar.add_expr(rule.expression);
            grammar.rules.push(Rule {
                name: rule.name,
                expression,
                annotations: rule.annotations,
                location: rule.location,
            });
        }
        grammar
    }

    /// Deserialize a nested grammar description from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let source: GrammarSource = serde_json::from_str(json)?;
        Ok(Self::from_source(source))
    }

    /// Serialize the arena form to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Add a node and return its id
    pub fn add_node(&mut self, kind: NodeKind, location: Option<Location>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { kind, location });
        id
    }

    /// Add a nested expression, children first
    pub fn add_expr(&mut self, expr: Expr) -> NodeId {
        let location = expr.location;
        let kind = match expr.kind {
            ExprKind::Named { name, expression } => NodeKind::Named {
                name,
                expression: self.add_expr(*expression),
            },
            ExprKind::Choice { alternatives } => NodeKind::Choice {
                alternatives: alternatives.into_iter().map(|e| self.add_expr(e)).collect(),
            },
            ExprKind::Action { expression, code } => NodeKind::Action {
                expression: self.add_expr(*expression),
                code,
            },
            ExprKind::Sequence { elements } => NodeKind::Sequence {
                elements: elements.into_iter().map(|e| self.add_expr(e)).collect(),
            },
            ExprKind::Labeled { label, expression } => NodeKind::Labeled {
                label,
                expression: self.add_expr(*expression),
            },
            ExprKind::Text { expression } => NodeKind::Text {
                expression: self.add_expr(*expression),
            },
            ExprKind::SimpleAnd { expression } => NodeKind::SimpleAnd {
                expression: self.add_expr(*expression),
            },
            ExprKind::SimpleNot { expression } => NodeKind::SimpleNot {
                expression: self.add_expr(*expression),
            },
            ExprKind::Optional { expression } => NodeKind::Optional {
                expression: self.add_expr(*expression),
            },
            ExprKind::ZeroOrMore { expression } => NodeKind::ZeroOrMore {
                expression: self.add_expr(*expression),
            },
            ExprKind::OneOrMore { expression } => NodeKind::OneOrMore {
                expression: self.add_expr(*expression),
            },
            ExprKind::Range {
                min,
                max,
                expression,
                delimiter,
            } => NodeKind::Range {
                min,
                max,
                expression: self.add_expr(*expression),
                delimiter: delimiter.map(|d| self.add_expr(*d)),
            },
            ExprKind::SemanticAnd { code } => NodeKind::SemanticAnd { code },
            ExprKind::SemanticNot { code } => NodeKind::SemanticNot { code },
            ExprKind::RuleRef { name } => NodeKind::RuleRef { name },
            ExprKind::Literal { value, ignore_case } => NodeKind::Literal { value, ignore_case },
            ExprKind::Class {
                parts,
                inverted,
                ignore_case,
                raw_text,
            } => NodeKind::Class {
                raw_text: raw_text.unwrap_or_else(|| class_source(&parts, inverted, ignore_case)),
                parts,
                inverted,
                ignore_case,
            },
            ExprKind::Regex {
                value,
                ignore_case,
                multi_line,
                raw_text,
            } => NodeKind::Regex {
                raw_text: raw_text.unwrap_or_else(|| regex_source(&value, ignore_case, multi_line)),
                value,
                ignore_case,
                multi_line,
            },
            ExprKind::Any => NodeKind::Any,
            ExprKind::Epsilon => NodeKind::Epsilon,
            ExprKind::Code { code } => NodeKind::Code { code },
        };
        self.add_node(kind, location)
    }

    /// Node by id
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Node kind by id
    #[inline]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    /// Mutable node by id
    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Direct children of a node
    #[inline]
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.kind(id).children()
    }

    /// Index of the first rule with this name
    pub fn rule_index(&self, name: &str) -> Option<usize> {
        self.rules.iter().position(|r| r.name == name)
    }

    /// First rule with this name
    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Every node reachable from a rule, root first
    pub fn rule_nodes(&self, rule: usize) -> Vec<NodeId> {
        let mut out = Vec::new();
        if let Some(r) = self.rules.get(rule) {
            let mut stack = vec![r.expression];
            while let Some(id) = stack.pop() {
                out.push(id);
                let children = self.children(id);
                stack.extend(children.into_iter().rev());
            }
        }
        out
    }
}

/// Source text of a class built without one
pub fn class_source(parts: &[ClassPart], inverted: bool, ignore_case: bool) -> String {
    let mut out = String::from("[");
    if inverted {
        out.push('^');
    }
    for part in parts {
        match part {
            ClassPart::Char(c) => push_class_char(&mut out, *c),
            ClassPart::Range(a, b) => {
                push_class_char(&mut out, *a);
                out.push('-');
                push_class_char(&mut out, *b);
            }
        }
    }
    out.push(']');
    if ignore_case {
        out.push('i');
    }
    out
}

fn push_class_char(out: &mut String, c: char) {
    match c {
        '\\' | ']' | '^' | '-' => {
            out.push('\\');
            out.push(c);
        }
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        c => out.push(c),
    }
}

fn regex_source(value: &str, ignore_case: bool, multi_line: bool) -> String {
    let mut out = format!("/{}/", value);
    if ignore_case {
        out.push('i');
    }
    if multi_line {
        out.push('m');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::dsl::*;

    #[test]
    fn test_from_source_flattens_children_first() {
        let g = GrammarBuilder::new()
            .rule("start", seq(vec![lit("a"), rule_ref("b")]))
            .rule("b", lit("b"))
            .build();
        assert_eq!(g.rules.len(), 2);
        let root = g.rules[0].expression;
        assert_eq!(g.kind(root).tag(), "sequence");
        let children = g.children(root);
        assert_eq!(children.len(), 2);
        assert!(children.iter().all(|c| c.index() < root.index()));
    }

    #[test]
    fn test_class_source() {
        let parts = [ClassPart::Range('a', 'z'), ClassPart::Char('-')];
        assert_eq!(class_source(&parts, true, true), "[^a-z\\-]i");
    }

    #[test]
    fn test_rule_nodes_preorder() {
        let g = GrammarBuilder::new()
            .rule("start", choice(vec![lit("a"), opt(lit("b"))]))
            .build();
        let tags: Vec<&str> = g.rule_nodes(0).iter().map(|&n| g.kind(n).tag()).collect();
        assert_eq!(tags, vec!["choice", "literal", "optional", "literal"]);
    }

    #[test]
    fn test_json_input() {
        let json = r#"{
            "rules": [
                {"name": "start", "expression": {"type": "sequence", "elements": [
                    {"type": "literal", "value": "a"},
                    {"type": "class", "parts": [["0", "9"], "_"], "inverted": false}
                ]}}
            ]
        }"#;
        let g = Grammar::from_json(json).unwrap();
        let root = g.rules[0].expression;
        let class = g.children(root)[1];
        match g.kind(class) {
            NodeKind::Class { parts, raw_text, .. } => {
                assert_eq!(parts, &vec![ClassPart::Range('0', '9'), ClassPart::Char('_')]);
                assert_eq!(raw_text, "[0-9_]");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_arena_json_round_trip() {
        let g = GrammarBuilder::new()
            .annotated_rule(
                "start",
                vec![Annotation::new("cache", vec![Param::keyword("all")])],
                range(1, Some(3), any(), Some(lit(","))),
            )
            .build();
        let json = g.to_json().unwrap();
        let back: Grammar = serde_json::from_str(&json).unwrap();
        assert_eq!(back, g);
    }
}
