//! Grammar DSL
//!
//! Nested grammar descriptions, built either from Rust code with the
//! constructor functions below or deserialized from the JSON a grammar
//! parser emits. [`GrammarBuilder::build`] flattens them into the
//! [`Grammar`] arena the compiler works on.
//!
//! # Example
//!
//! ```rust
//! use pegc::compiler::dsl::*;
//!
//! let grammar = GrammarBuilder::new()
//!     .rule("start", seq(vec![lit("a"), star(rule_ref("digit"))]))
//!     .rule("digit", class(vec![ClassPart::Range('0', '9')], false))
//!     .build();
//! assert_eq!(grammar.rules.len(), 2);
//! ```

pub use super::ast::{Annotation, ClassPart, Grammar, Param};
use crate::runtime::location::Location;
use serde::{Deserialize, Serialize};

/// A nested expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    /// What the expression is
    #[serde(flatten)]
    pub kind: ExprKind,
    /// Source location in the grammar text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// Nested expression kinds, mirroring [`NodeKind`](super::ast::NodeKind)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum ExprKind {
    Named {
        name: String,
        expression: Box<Expr>,
    },
    Choice {
        alternatives: Vec<Expr>,
    },
    Action {
        expression: Box<Expr>,
        code: String,
    },
    Sequence {
        elements: Vec<Expr>,
    },
    Labeled {
        #[serde(default)]
        label: Option<String>,
        expression: Box<Expr>,
    },
    Text {
        expression: Box<Expr>,
    },
    SimpleAnd {
        expression: Box<Expr>,
    },
    SimpleNot {
        expression: Box<Expr>,
    },
    Optional {
        expression: Box<Expr>,
    },
    ZeroOrMore {
        expression: Box<Expr>,
    },
    OneOrMore {
        expression: Box<Expr>,
    },
    Range {
        #[serde(default)]
        min: u32,
        #[serde(default)]
        max: Option<u32>,
        expression: Box<Expr>,
        #[serde(default)]
        delimiter: Option<Box<Expr>>,
    },
    SemanticAnd {
        code: String,
    },
    SemanticNot {
        code: String,
    },
    RuleRef {
        name: String,
    },
    Literal {
        value: String,
        #[serde(default)]
        ignore_case: bool,
    },
    Class {
        parts: Vec<ClassPart>,
        #[serde(default)]
        inverted: bool,
        #[serde(default)]
        ignore_case: bool,
        #[serde(default)]
        raw_text: Option<String>,
    },
    Regex {
        value: String,
        #[serde(default)]
        ignore_case: bool,
        #[serde(default)]
        multi_line: bool,
        #[serde(default)]
        raw_text: Option<String>,
    },
    Any,
    Epsilon,
    Code {
        code: String,
    },
}

impl Expr {
    /// Wrap a kind without location
    pub fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            location: None,
        }
    }

    /// Attach a source location
    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// `self other`, flattening into an existing sequence
    pub fn then(self, other: Expr) -> Expr {
        match self.kind {
            ExprKind::Sequence { mut elements } if self.location.is_none() => {
                elements.push(other);
                seq(elements)
            }
            kind => seq(vec![Expr::new(kind), other]),
        }
    }

    /// `self / other`, flattening into an existing choice
    pub fn or(self, other: Expr) -> Expr {
        match self.kind {
            ExprKind::Choice { mut alternatives } if self.location.is_none() => {
                alternatives.push(other);
                choice(alternatives)
            }
            kind => choice(vec![Expr::new(kind), other]),
        }
    }

    /// `name:self`
    pub fn label(self, name: &str) -> Expr {
        label(name, self)
    }

    /// `self { code }`
    pub fn map(self, code: &str) -> Expr {
        action(self, code)
    }
}

fn boxed(kind: ExprKind) -> Expr {
    Expr::new(kind)
}

/// Literal string
pub fn lit(value: &str) -> Expr {
    boxed(ExprKind::Literal {
        value: value.to_string(),
        ignore_case: false,
    })
}

/// Case-insensitive literal string
pub fn lit_ic(value: &str) -> Expr {
    boxed(ExprKind::Literal {
        value: value.to_string(),
        ignore_case: true,
    })
}

/// Character class
pub fn class(parts: Vec<ClassPart>, inverted: bool) -> Expr {
    boxed(ExprKind::Class {
        parts,
        inverted,
        ignore_case: false,
        raw_text: None,
    })
}

/// Case-insensitive character class
pub fn class_ic(parts: Vec<ClassPart>, inverted: bool) -> Expr {
    boxed(ExprKind::Class {
        parts,
        inverted,
        ignore_case: true,
        raw_text: None,
    })
}

/// Regular expression
pub fn regex(pattern: &str) -> Expr {
    boxed(ExprKind::Regex {
        value: pattern.to_string(),
        ignore_case: false,
        multi_line: false,
        raw_text: None,
    })
}

/// Regular expression with flags
pub fn regex_with(pattern: &str, ignore_case: bool, multi_line: bool) -> Expr {
    boxed(ExprKind::Regex {
        value: pattern.to_string(),
        ignore_case,
        multi_line,
        raw_text: None,
    })
}

/// Any single character
pub fn any() -> Expr {
    boxed(ExprKind::Any)
}

/// The empty match
pub fn epsilon() -> Expr {
    boxed(ExprKind::Epsilon)
}

/// Reference to a rule
pub fn rule_ref(name: &str) -> Expr {
    boxed(ExprKind::RuleRef {
        name: name.to_string(),
    })
}

/// Sequence
pub fn seq(elements: Vec<Expr>) -> Expr {
    boxed(ExprKind::Sequence { elements })
}

/// Ordered choice
pub fn choice(alternatives: Vec<Expr>) -> Expr {
    boxed(ExprKind::Choice { alternatives })
}

/// `e?`
pub fn opt(e: Expr) -> Expr {
    boxed(ExprKind::Optional {
        expression: Box::new(e),
    })
}

/// `e*`
pub fn star(e: Expr) -> Expr {
    boxed(ExprKind::ZeroOrMore {
        expression: Box::new(e),
    })
}

/// `e+`
pub fn plus(e: Expr) -> Expr {
    boxed(ExprKind::OneOrMore {
        expression: Box::new(e),
    })
}

/// `e|min..max, delimiter|`
pub fn range(min: u32, max: Option<u32>, e: Expr, delimiter: Option<Expr>) -> Expr {
    boxed(ExprKind::Range {
        min,
        max,
        expression: Box::new(e),
        delimiter: delimiter.map(Box::new),
    })
}

/// `name:e`
pub fn label(name: &str, e: Expr) -> Expr {
    boxed(ExprKind::Labeled {
        label: Some(name.to_string()),
        expression: Box::new(e),
    })
}

/// `@e` without a name (plucked value)
pub fn unlabeled(e: Expr) -> Expr {
    boxed(ExprKind::Labeled {
        label: None,
        expression: Box::new(e),
    })
}

/// `e { code }`
pub fn action(e: Expr, code: &str) -> Expr {
    boxed(ExprKind::Action {
        expression: Box::new(e),
        code: code.to_string(),
    })
}

/// `$e`
pub fn text(e: Expr) -> Expr {
    boxed(ExprKind::Text {
        expression: Box::new(e),
    })
}

/// `&e`
pub fn and(e: Expr) -> Expr {
    boxed(ExprKind::SimpleAnd {
        expression: Box::new(e),
    })
}

/// `!e`
pub fn not(e: Expr) -> Expr {
    boxed(ExprKind::SimpleNot {
        expression: Box::new(e),
    })
}

/// `&{ code }`
pub fn sem_and(code: &str) -> Expr {
    boxed(ExprKind::SemanticAnd {
        code: code.to_string(),
    })
}

/// `!{ code }`
pub fn sem_not(code: &str) -> Expr {
    boxed(ExprKind::SemanticNot {
        code: code.to_string(),
    })
}

/// `e "name"`
pub fn named(name: &str, e: Expr) -> Expr {
    boxed(ExprKind::Named {
        name: name.to_string(),
        expression: Box::new(e),
    })
}

/// Inline code producing a value
pub fn code(code: &str) -> Expr {
    boxed(ExprKind::Code {
        code: code.to_string(),
    })
}

/// One rule of a nested grammar description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSource {
    /// Name
    pub name: String,
    /// Body
    pub expression: Expr,
    /// Annotations
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    /// Source location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// A nested grammar description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrammarSource {
    /// Rules in declaration order
    pub rules: Vec<RuleSource>,
    /// Code placed before the generated parser
    #[serde(default)]
    pub initializer: Option<String>,
}

/// Builder for grammars written in Rust
#[derive(Debug, Clone, Default)]
pub struct GrammarBuilder {
    source: GrammarSource,
}

impl GrammarBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule
    pub fn rule(self, name: &str, expression: Expr) -> Self {
        self.annotated_rule(name, Vec::new(), expression)
    }

    /// Add a rule with annotations
    pub fn annotated_rule(mut self, name: &str, annotations: Vec<Annotation>, expression: Expr) -> Self {
        self.source.rules.push(RuleSource {
            name: name.to_string(),
            expression,
            annotations,
            location: None,
        });
        self
    }

    /// Add a rule with a source location
    pub fn located_rule(mut self, name: &str, location: Location, expression: Expr) -> Self {
        self.source.rules.push(RuleSource {
            name: name.to_string(),
            expression,
            annotations: Vec::new(),
            location: Some(location),
        });
        self
    }

    /// Set the initializer code
    pub fn initializer(mut self, code: &str) -> Self {
        self.source.initializer = Some(code.to_string());
        self
    }

    /// The nested description built so far
    pub fn source(&self) -> &GrammarSource {
        &self.source
    }

    /// Flatten into the arena form
    pub fn build(self) -> Grammar {
        Grammar::from_source(self.source)
    }
}

/// `@cache`, `@cache(all)`, ...
pub fn cache(scope: Option<&str>) -> Annotation {
    Annotation::new("cache", scope.map(Param::keyword).into_iter().collect())
}

/// `@nocache`, `@nocache(all)`, ...
pub fn nocache(scope: Option<&str>) -> Annotation {
    Annotation::new("nocache", scope.map(Param::keyword).into_iter().collect())
}

/// `@collect_statistics`
pub fn collect_statistics() -> Annotation {
    Annotation::new("collect_statistics", Vec::new())
}
