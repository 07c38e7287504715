//! Compiler configuration
//!
//! [`CompileOptions`] is a plain struct with builder methods. It is also
//! serde-deserializable so tools can keep options in JSON:
//!
//! ```json
//! { "allowed_start_rules": "*", "cache": true, "optimize": "size", "output": ["source", "ast"] }
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use crate::runtime::parser::ParseOptions;

/// Which rules may start a parse
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StartRules {
    /// The first declared rule
    #[default]
    Default,
    /// The listed rules, in priority order
    Listed(Vec<String>),
    /// Every rule
    All,
}

impl StartRules {
    /// A list of rule names
    pub fn listed<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StartRules::Listed(names.into_iter().map(Into::into).collect())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StartRulesRepr {
    One(String),
    Many(Vec<String>),
}

impl Serialize for StartRules {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StartRules::Default => StartRulesRepr::Many(Vec::new()).serialize(serializer),
            StartRules::Listed(names) => StartRulesRepr::Many(names.clone()).serialize(serializer),
            StartRules::All => StartRulesRepr::One("*".to_string()).serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for StartRules {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match StartRulesRepr::deserialize(deserializer)? {
            StartRulesRepr::One(s) if s == "*" => StartRules::All,
            StartRulesRepr::One(s) => StartRules::Listed(vec![s]),
            StartRulesRepr::Many(v) if v.is_empty() => StartRules::Default,
            StartRulesRepr::Many(v) if v.iter().any(|s| s == "*") => StartRules::All,
            StartRulesRepr::Many(v) => StartRules::Listed(v),
        })
    }
}

/// Code generation strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Optimize {
    /// One unrolled routine per rule
    #[default]
    Speed,
    /// One shared bytecode interpreter
    Size,
}

/// A kind of compiler output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// An in-process [`Parser`](crate::runtime::Parser)
    Parser,
    /// Rust source text
    Source,
    /// The annotated grammar as JSON
    Ast,
}

/// Requested outputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputSpec {
    /// One output
    Single(OutputKind),
    /// Several outputs
    List(Vec<OutputKind>),
}

impl Default for OutputSpec {
    fn default() -> Self {
        OutputSpec::Single(OutputKind::Parser)
    }
}

impl OutputSpec {
    /// Whether `kind` is requested
    pub fn wants(&self, kind: OutputKind) -> bool {
        match self {
            OutputSpec::Single(k) => *k == kind,
            OutputSpec::List(list) => list.contains(&kind),
        }
    }
}

/// Compiler options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Rules the generated parser may start from
    pub allowed_start_rules: StartRules,
    /// Compile in memoization support
    pub cache: bool,
    /// Memoize rules even under a grammar-wide `nocache` default
    pub force_cache: bool,
    /// Code generation strategy
    pub optimize: Optimize,
    /// Requested outputs
    pub output: OutputSpec,
    /// Emit trace events
    pub trace: bool,
    /// Collect run-time statistics
    pub collect_statistics: bool,
    /// Report duplicate rule definitions as errors instead of warnings
    pub report_duplicate_rules: bool,
    /// Report labels bound twice in one scope
    pub report_duplicate_labels: bool,
    /// Log every recorded problem
    pub verbose: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            allowed_start_rules: StartRules::Default,
            cache: false,
            force_cache: false,
            optimize: Optimize::Speed,
            output: OutputSpec::default(),
            trace: false,
            collect_statistics: false,
            report_duplicate_rules: false,
            report_duplicate_labels: true,
            verbose: false,
        }
    }
}

impl CompileOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Set the allowed start rules
    pub fn with_start_rules(mut self, rules: StartRules) -> Self {
        self.allowed_start_rules = rules;
        self
    }

    /// Set memoization support
    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Force memoization over a grammar-wide `nocache` default
    pub fn with_force_cache(mut self, force: bool) -> Self {
        self.force_cache = force;
        self
    }

    /// Set the code generation strategy
    pub fn with_optimize(mut self, optimize: Optimize) -> Self {
        self.optimize = optimize;
        self
    }

    /// Request one output
    pub fn with_output(mut self, kind: OutputKind) -> Self {
        self.output = OutputSpec::Single(kind);
        self
    }

    /// Request several outputs
    pub fn with_outputs(mut self, kinds: Vec<OutputKind>) -> Self {
        self.output = OutputSpec::List(kinds);
        self
    }

    /// Set tracing
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Set run-time statistics collection
    pub fn with_statistics(mut self, collect: bool) -> Self {
        self.collect_statistics = collect;
        self
    }

    /// Report duplicate rules as errors
    pub fn with_report_duplicate_rules(mut self, report: bool) -> Self {
        self.report_duplicate_rules = report;
        self
    }

    /// Report duplicate labels
    pub fn with_report_duplicate_labels(mut self, report: bool) -> Self {
        self.report_duplicate_labels = report;
        self
    }

    /// Log every recorded problem
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let o = CompileOptions::default();
        assert_eq!(o.allowed_start_rules, StartRules::Default);
        assert_eq!(o.optimize, Optimize::Speed);
        assert!(o.output.wants(OutputKind::Parser));
        assert!(!o.report_duplicate_rules);
        assert!(o.report_duplicate_labels);
    }

    #[test]
    fn test_from_json() {
        let o = CompileOptions::from_json(
            r#"{"allowed_start_rules": "*", "cache": true, "optimize": "size", "output": ["source", "ast"]}"#,
        )
        .unwrap();
        assert_eq!(o.allowed_start_rules, StartRules::All);
        assert!(o.cache);
        assert_eq!(o.optimize, Optimize::Size);
        assert!(o.output.wants(OutputKind::Ast));
        assert!(!o.output.wants(OutputKind::Parser));
        assert!(o.report_duplicate_labels);
    }

    #[test]
    fn test_start_rules_forms() {
        let one: StartRules = serde_json::from_str(r#""expr""#).unwrap();
        assert_eq!(one, StartRules::listed(["expr"]));
        let many: StartRules = serde_json::from_str(r#"["a", "b"]"#).unwrap();
        assert_eq!(many, StartRules::listed(["a", "b"]));
        let none: StartRules = serde_json::from_str("[]").unwrap();
        assert_eq!(none, StartRules::Default);
        assert_eq!(serde_json::to_string(&StartRules::All).unwrap(), r#""*""#);
    }
}
