//! Compiled program tables
//!
//! A [`Program`] is everything a generated parser needs besides its
//! executor: per-rule bytecode, the constant pool, the action pool, the
//! starter table and the instrumentation switches. Programs serialize to
//! JSON so they can be stored and loaded later.

use super::error::{Expectation, ParseFailure};
use super::regex_cache;
use crate::compiler::opcodes::{decompile, DecompileError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// An entry of the constant pool
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Const {
    /// A string (literal text, lowercased for case-insensitive matches)
    String {
        /// The text
        value: String,
    },
    /// A regular expression, matched anchored at the current position
    Regexp {
        /// Pattern source
        pattern: String,
        /// Case-insensitive matching
        #[serde(default)]
        ignore_case: bool,
        /// `^`/`$` match at line boundaries
        #[serde(default)]
        multi_line: bool,
    },
    /// An expectation reported on failure
    Expected {
        /// The expectation
        expected: Expectation,
    },
}

impl Const {
    /// The anchored regex source for a `Regexp` constant
    pub fn anchored_pattern(&self) -> Option<String> {
        match self {
            Const::Regexp {
                pattern,
                ignore_case,
                multi_line,
            } => Some(regex_cache::anchored(pattern, *ignore_case, *multi_line)),
            _ => None,
        }
    }
}

/// An entry of the action pool: parameter names plus code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionDef {
    /// Label names bound as parameters, in order
    pub params: Vec<String>,
    /// The action code
    pub code: String,
}

/// Compiled form of one rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCode {
    /// Rule name
    pub name: String,
    /// Whether results are memoized
    pub memoize: bool,
    /// Bytecode (empty for programs emitted by the inlined backend)
    pub bytecode: Vec<u32>,
}

/// A compiled grammar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    /// Rules, addressed by index
    pub rules: Vec<RuleCode>,
    /// Constant pool
    pub consts: Vec<Const>,
    /// Action pool
    pub actions: Vec<ActionDef>,
    /// Rule indices that may start a parse, in priority order
    pub starters: Vec<usize>,
    /// Rule used when no start rule is requested
    pub default_start: usize,
    /// Memoization support compiled in
    pub memoize: bool,
    /// Trace events emitted
    pub trace: bool,
    /// Run-time statistics collected
    pub statistics: bool,
    /// Regexes compiled from `consts` (same indices, `None` elsewhere)
    #[serde(skip)]
    regexes: Vec<Option<Regex>>,
}

// `regexes` is derived from `consts`
impl PartialEq for Program {
    fn eq(&self, other: &Self) -> bool {
        self.rules == other.rules
            && self.consts == other.consts
            && self.actions == other.actions
            && self.starters == other.starters
            && self.default_start == other.default_start
            && self.memoize == other.memoize
            && self.trace == other.trace
            && self.statistics == other.statistics
    }
}

impl Program {
    /// Assemble a program and compile its regexp constants
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rules: Vec<RuleCode>,
        consts: Vec<Const>,
        actions: Vec<ActionDef>,
        starters: Vec<usize>,
        default_start: usize,
        memoize: bool,
        trace: bool,
        statistics: bool,
    ) -> Self {
        let mut program = Self {
            rules,
            consts,
            actions,
            starters,
            default_start,
            memoize,
            trace,
            statistics,
            regexes: Vec::new(),
        };
        program.prepare();
        program
    }

    /// Compile regexp constants (needed after deserializing)
    pub fn prepare(&mut self) {
        self.regexes = self
            .consts
            .iter()
            .map(|c| c.anchored_pattern().and_then(|p| regex_cache::get_or_compile(&p)))
            .collect();
    }

    /// Deserialize from JSON
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        let mut program: Program = serde_json::from_str(s)?;
        program.prepare();
        Ok(program)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Number of rules
    #[inline]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Name of a rule
    #[inline]
    pub fn rule_name(&self, index: usize) -> &str {
        self.rules.get(index).map_or("", |r| r.name.as_str())
    }

    /// Index of a rule by name
    pub fn rule_index(&self, name: &str) -> Option<usize> {
        self.rules.iter().position(|r| r.name == name)
    }

    /// Whether a rule is memoized
    #[inline]
    pub fn is_memoized(&self, index: usize) -> bool {
        self.memoize && self.rules.get(index).is_some_and(|r| r.memoize)
    }

    /// Names of the starter rules
    pub fn starter_names(&self) -> Vec<&str> {
        self.starters.iter().map(|&i| self.rule_name(i)).collect()
    }

    /// Resolve the requested start rule
    pub fn start_index(&self, requested: Option<&str>) -> Result<usize, ParseFailure> {
        match requested {
            None => Ok(self.default_start),
            Some(name) => self
                .starters
                .iter()
                .copied()
                .find(|&i| self.rule_name(i) == name)
                .ok_or_else(|| ParseFailure::UnknownStartRule(name.to_string())),
        }
    }

    /// String constant text (empty for other constants)
    #[inline]
    pub fn string(&self, index: usize) -> &str {
        match self.consts.get(index) {
            Some(Const::String { value }) => value,
            _ => "",
        }
    }

    /// Expectation constant
    #[inline]
    pub fn expectation(&self, index: usize) -> Option<&Expectation> {
        match self.consts.get(index) {
            Some(Const::Expected { expected }) => Some(expected),
            _ => None,
        }
    }

    /// Compiled regexp constant
    #[inline]
    pub fn regex(&self, index: usize) -> Option<&Regex> {
        self.regexes.get(index).and_then(Option::as_ref)
    }

    /// Readable listing of every rule's bytecode
    pub fn disassemble(&self) -> Result<String, DecompileError> {
        let mut out = String::new();
        for (index, rule) in self.rules.iter().enumerate() {
            let _ = writeln!(out, "rule {} ({}):", index, rule.name);
            for instruction in decompile(&rule.bytecode)? {
                let _ = writeln!(out, "{}", instruction);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program() -> Program {
        Program::new(
            vec![
                RuleCode {
                    name: "start".to_string(),
                    memoize: true,
                    bytecode: vec![27],
                },
                RuleCode {
                    name: "other".to_string(),
                    memoize: false,
                    bytecode: vec![26],
                },
            ],
            vec![
                Const::String {
                    value: "a".to_string(),
                },
                Const::Regexp {
                    pattern: "[0-9]+".to_string(),
                    ignore_case: false,
                    multi_line: false,
                },
                Const::Expected {
                    expected: Expectation::literal("a"),
                },
            ],
            vec![],
            vec![0, 1],
            0,
            true,
            false,
            false,
        )
    }

    #[test]
    fn test_start_index() {
        let p = program();
        assert_eq!(p.start_index(None).unwrap(), 0);
        assert_eq!(p.start_index(Some("other")).unwrap(), 1);
        assert_eq!(
            p.start_index(Some("nope")),
            Err(ParseFailure::UnknownStartRule("nope".to_string()))
        );
    }

    #[test]
    fn test_constant_accessors() {
        let p = program();
        assert_eq!(p.string(0), "a");
        assert!(p.regex(1).is_some());
        assert!(p.regex(0).is_none());
        assert_eq!(p.expectation(2), Some(&Expectation::literal("a")));
    }

    #[test]
    fn test_memoized_requires_global_switch() {
        let mut p = program();
        assert!(p.is_memoized(0));
        assert!(!p.is_memoized(1));
        p.memoize = false;
        assert!(!p.is_memoized(0));
    }

    #[test]
    fn test_json_round_trip_recompiles_regexes() {
        let p = program();
        let json = p.to_json().unwrap();
        let loaded = Program::from_json(&json).unwrap();
        assert!(loaded.regex(1).is_some());
        assert_eq!(loaded.rules, p.rules);
    }

    #[test]
    fn test_disassemble() {
        let listing = program().disassemble().unwrap();
        assert!(listing.contains("rule 0 (start):"));
        assert!(listing.contains("PUSH_NULL"));
    }
}
