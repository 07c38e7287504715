//! Rule tracing
//!
//! Programs compiled with tracing report every rule entry and exit to a
//! [`Tracer`]. Without a user tracer, [`LogTracer`] writes the events to
//! the `log` facade.

use super::location::Location;
use super::value::Value;
use serde::Serialize;

/// Kind of trace event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TraceEventKind {
    /// A rule is about to run
    #[serde(rename = "rule.enter")]
    RuleEnter,
    /// A rule matched
    #[serde(rename = "rule.match")]
    RuleMatch,
    /// A rule failed
    #[serde(rename = "rule.fail")]
    RuleFail,
    /// A memoized match was reused
    #[serde(rename = "rule.match.memoized")]
    RuleMatchMemoized,
    /// A memoized failure was reused
    #[serde(rename = "rule.fail.memoized")]
    RuleFailMemoized,
}

impl TraceEventKind {
    /// Dotted event name
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceEventKind::RuleEnter => "rule.enter",
            TraceEventKind::RuleMatch => "rule.match",
            TraceEventKind::RuleFail => "rule.fail",
            TraceEventKind::RuleMatchMemoized => "rule.match.memoized",
            TraceEventKind::RuleFailMemoized => "rule.fail.memoized",
        }
    }

    /// Whether the event closes a rule invocation
    pub fn is_exit(&self) -> bool {
        !matches!(self, TraceEventKind::RuleEnter)
    }
}

/// One trace event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEvent<'a> {
    /// Event kind
    #[serde(rename = "type")]
    pub kind: TraceEventKind,
    /// Rule name
    pub rule: &'a str,
    /// Matched span (empty on enter and fail)
    pub location: Location,
    /// Rule result on match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<&'a Value>,
}

/// Receiver of trace events
pub trait Tracer {
    /// Handle one event
    fn trace(&mut self, event: &TraceEvent<'_>);
}

impl<F> Tracer for F
where
    F: FnMut(&TraceEvent<'_>),
{
    fn trace(&mut self, event: &TraceEvent<'_>) {
        self(event)
    }
}

/// Tracer writing indented events through `log::debug!`
#[derive(Debug, Default)]
pub struct LogTracer {
    indent: usize,
}

impl LogTracer {
    /// Create a tracer at indentation zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Format an event the way it is logged
    pub fn format(&self, event: &TraceEvent<'_>) -> String {
        let start = &event.location.start;
        let end = &event.location.end;
        format!(
            "{}:{}-{}:{} {:<10} {}{}",
            start.line,
            start.column,
            end.line,
            end.column,
            event.kind.as_str(),
            "  ".repeat(self.indent),
            event.rule
        )
    }
}

impl Tracer for LogTracer {
    fn trace(&mut self, event: &TraceEvent<'_>) {
        if event.kind.is_exit() {
            self.indent = self.indent.saturating_sub(1);
        }
        let _line = self.format(event);
        log_debug!("{}", _line);
        if !event.kind.is_exit() {
            self.indent += 1;
        }
    }
}

/// An owned copy of a trace event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedEvent {
    /// Event kind
    #[serde(rename = "type")]
    pub kind: TraceEventKind,
    /// Rule name
    pub rule: String,
    /// Matched span
    pub location: Location,
    /// Rule result on match
    pub result: Option<Value>,
}

/// Tracer keeping every event in memory
#[derive(Debug, Default)]
pub struct TraceRecorder {
    /// Events in arrival order
    pub events: Vec<RecordedEvent>,
}

impl TraceRecorder {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// `(kind, rule)` pairs, handy for assertions
    pub fn summary(&self) -> Vec<(&'static str, &str)> {
        self.events
            .iter()
            .map(|e| (e.kind.as_str(), e.rule.as_str()))
            .collect()
    }
}

impl Tracer for TraceRecorder {
    fn trace(&mut self, event: &TraceEvent<'_>) {
        self.events.push(RecordedEvent {
            kind: event.kind,
            rule: event.rule.to_string(),
            location: event.location,
            result: event.result.cloned(),
        });
    }
}
