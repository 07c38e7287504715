//! Run-time statistics
//!
//! When a program is compiled with statistics collection, every rule
//! invocation updates a set of counters: visits, memo cache hits, and the
//! different kinds of failure. Visits are also attributed to the calling
//! rule so hot call edges stand out in the report.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

const DISPLAY_WIDTH: usize = 120;

/// Visit counters for one caller of a rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParentCounters {
    /// Invocations from this caller
    pub visit: u64,
    /// Memo cache hits on invocations from this caller
    pub cache_hit: u64,
}

/// Counters of one rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleCounters {
    /// Rule name
    pub name: String,
    /// Whether the rule is memoized
    pub memoized: bool,
    /// Invocations
    pub visit: u64,
    /// Memo cache hits
    pub cache_hit: u64,
    /// Failed returns
    pub return_fail: u64,
    /// Failed returns inside a predicate
    pub return_silent_fail: u64,
    /// Failed returns served from the memo cache
    pub return_cached_fail: u64,
    /// Failed memoized returns inside a predicate
    pub return_cached_silent_fail: u64,
    /// Failures recorded by matching instructions
    pub fail: u64,
    /// Failures inside a predicate
    pub silent_fail: u64,
    /// Explicit failure values pushed
    pub pushed_fail: u64,
    /// Per-caller counters, keyed by caller rule index
    pub visiting_parent: BTreeMap<usize, ParentCounters>,
}

impl RuleCounters {
    fn total_failures(&self) -> u64 {
        self.fail
            + self.silent_fail
            + self.pushed_fail
            + self.return_fail
            + self.return_silent_fail
            + self.return_cached_fail
            + self.return_cached_silent_fail
    }
}

/// Statistics for every rule of a program
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    /// Counters, indexed like the program's rules
    pub rules: Vec<RuleCounters>,
}

impl Statistics {
    /// Zeroed statistics for the given rules
    pub fn new<'a>(rules: impl IntoIterator<Item = (&'a str, bool)>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|(name, memoized)| RuleCounters {
                    name: name.to_string(),
                    memoized,
                    ..RuleCounters::default()
                })
                .collect(),
        }
    }

    /// Counters of a rule by name
    pub fn rule(&self, name: &str) -> Option<&RuleCounters> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Counters of the calls from `parent` to `rule`
    pub fn parent_visits(&self, rule: &str, parent: &str) -> ParentCounters {
        let parent_index = self.rules.iter().position(|r| r.name == parent);
        match (self.rule(rule), parent_index) {
            (Some(counters), Some(p)) => counters.visiting_parent.get(&p).copied().unwrap_or_default(),
            _ => ParentCounters::default(),
        }
    }

    /// Zero every counter, keeping names
    pub fn reset(&mut self) {
        for r in &mut self.rules {
            *r = RuleCounters {
                name: std::mem::take(&mut r.name),
                memoized: r.memoized,
                ..RuleCounters::default()
            };
        }
    }

    #[inline]
    pub(crate) fn counters(&mut self, rule: usize) -> Option<&mut RuleCounters> {
        self.rules.get_mut(rule)
    }

    pub(crate) fn visit(&mut self, rule: usize, parent: Option<usize>) {
        if let Some(c) = self.rules.get_mut(rule) {
            c.visit += 1;
            if let Some(p) = parent {
                c.visiting_parent.entry(p).or_default().visit += 1;
            }
        }
    }

    pub(crate) fn cache_hit(&mut self, rule: usize, parent: Option<usize>, failed: bool, silent: bool) {
        if let Some(c) = self.rules.get_mut(rule) {
            c.cache_hit += 1;
            if let Some(p) = parent {
                c.visiting_parent.entry(p).or_default().cache_hit += 1;
            }
            if failed {
                if silent {
                    c.return_cached_silent_fail += 1;
                }
                c.return_cached_fail += 1;
            }
        }
    }

    pub(crate) fn returned(&mut self, rule: usize, failed: bool, silent: bool) {
        if let (true, Some(c)) = (failed, self.rules.get_mut(rule)) {
            if silent {
                c.return_silent_fail += 1;
            }
            c.return_fail += 1;
        }
    }

    /// Render a text report
    ///
    /// Used rules come first, ordered by visits and then by failed
    /// returns (both descending), followed by the list of unused rules.
    pub fn report(&self) -> String {
        let mut out = String::new();
        let name_width = self.rules.iter().map(|r| r.name.len()).max().unwrap_or(1).max(1);

        let mut used: Vec<&RuleCounters> = self.rules.iter().filter(|r| r.visit > 0).collect();
        used.sort_by(|a, b| {
            b.visit
                .cmp(&a.visit)
                .then_with(|| b.return_fail.cmp(&a.return_fail))
        });

        let _ = writeln!(out, "### Run-time Cache Hit Statistics: rules which used the cache:");
        for r in used {
            let _ = writeln!(out, "  {}:", r.name);
            let memo = if r.cache_hit > 0 {
                format!("memo cache hits: {}", r.cache_hit)
            } else if r.memoized {
                "--no memo cache hit--".to_string()
            } else {
                "~~ memoization OFF ~~".to_string()
            };
            let _ = writeln!(out, "    visits: {:<20}    {}", r.visit, memo);

            let mut parents: Vec<(&str, ParentCounters)> = r
                .visiting_parent
                .iter()
                .filter(|(_, p)| p.visit + p.cache_hit > 0)
                .map(|(&i, &p)| (self.rules.get(i).map_or("", |x| x.name.as_str()), p))
                .collect();
            parents.sort_by(|a, b| {
                b.1.visit
                    .cmp(&a.1.visit)
                    .then_with(|| b.1.cache_hit.cmp(&a.1.cache_hit))
            });
            for (name, p) in parents {
                let hits = if p.cache_hit > 0 {
                    p.cache_hit.to_string()
                } else {
                    "--".to_string()
                };
                let _ = writeln!(
                    out,
                    "      {}: {} / {}",
                    pad_with(name, name_width, '.'),
                    p.visit,
                    hits
                );
            }

            if r.total_failures() == 0 {
                let _ = writeln!(out, "    fail: --none--");
            } else {
                let visits = r.visit.max(1) as f64;
                let fields = [
                    ("", r.return_fail.to_string()),
                    ("predicate", r.return_silent_fail.to_string()),
                    ("memo", r.return_cached_fail.to_string()),
                    ("pred-memo", r.return_cached_silent_fail.to_string()),
                    ("state", r.fail.to_string()),
                    ("quiet", r.silent_fail.to_string()),
                    ("push", r.pushed_fail.to_string()),
                    ("F%", percent(r.return_fail, visits)),
                    ("Pred%", percent(r.return_silent_fail, visits)),
                ];
                let rendered: Vec<String> = fields
                    .iter()
                    .map(|(label, value)| {
                        let value = if value.parse::<f64>().map_or(false, |v| v == 0.0) {
                            "----"
                        } else {
                            value.as_str()
                        };
                        if label.is_empty() {
                            value.to_string()
                        } else {
                            format!("{}: {}", label, value)
                        }
                    })
                    .collect();
                let _ = writeln!(out, "    fail: {}", rendered.join(", "));
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "### Run-time Cache Hit Statistics: rules which were not used:");
        let mut unused: Vec<&str> = self
            .rules
            .iter()
            .filter(|r| r.visit == 0)
            .map(|r| r.name.as_str())
            .collect();
        unused.sort_unstable();
        for line in names_table(&unused, "  ") {
            let _ = writeln!(out, "{}", line);
        }
        out
    }
}

fn percent(count: u64, visits: f64) -> String {
    let value = format!("{:.1}", 100.0 * count as f64 / visits);
    value.strip_suffix(".0").map(str::to_string).unwrap_or(value)
}

fn pad_with(s: &str, width: usize, fill: char) -> String {
    let mut out = s.to_string();
    while out.chars().count() < width {
        out.push(fill);
    }
    out
}

/// Lay names out in as many columns as fit the display width
fn names_table(names: &[&str], indent: &str) -> Vec<String> {
    const MIN_GAP: usize = 3;
    if names.is_empty() {
        return Vec::new();
    }
    let widest = names.iter().map(|n| n.len()).max().unwrap_or(1).max(1);
    let room = DISPLAY_WIDTH.saturating_sub(indent.len());
    let columns = (room / (widest + MIN_GAP)).max(1);
    let width = widest + MIN_GAP;

    names
        .chunks(columns)
        .map(|row| {
            let mut line = indent.to_string();
            for (i, name) in row.iter().enumerate() {
                if i + 1 == row.len() {
                    line.push_str(name);
                } else {
                    line.push_str(&pad_with(name, width, ' '));
                }
            }
            line
        })
        .collect()
}
