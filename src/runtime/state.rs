//! Parser state shared by both execution strategies
//!
//! [`ParserState`] is the abstract machine minus its operand stack: input
//! cursor, saved-position register, silent-failure counter, furthest
//! failure bookkeeping, plus the optional memo table, statistics and
//! tracer. The bytecode interpreter and the inline routines (both the
//! in-process IR and emitted source) drive parsing through the same
//! methods, which is what keeps their results identical.

use super::actions::{ActionContext, ActionError, ActionHandler};
use super::error::{Expectation, ParseFailure, SyntaxError};
use super::location::PositionTracker;
use super::memo::{MemoEntry, MemoTable};
use super::program::Program;
use super::stats::Statistics;
use super::trace::{LogTracer, TraceEvent, TraceEventKind, Tracer};
use super::value::{Slot, Value};

/// Mutable state of one parse
pub struct ParserState<'a> {
    input: &'a str,
    program: &'a Program,
    actions: &'a mut dyn ActionHandler,
    tracer: Option<&'a mut dyn Tracer>,
    log_tracer: LogTracer,
    stats: Option<&'a mut Statistics>,
    memo: Option<MemoTable>,
    tracker: PositionTracker<'a>,

    pos: usize,
    saved_pos: usize,
    silent_fails: u32,
    max_fail_pos: usize,
    max_fail_expected: Vec<Expectation>,
    current_rule: Option<usize>,
}

impl<'a> ParserState<'a> {
    /// Create the state for parsing `input` with `program`
    pub fn new(
        input: &'a str,
        program: &'a Program,
        actions: &'a mut dyn ActionHandler,
        tracer: Option<&'a mut dyn Tracer>,
        stats: Option<&'a mut Statistics>,
    ) -> Self {
        let memo = program.memoize.then(|| {
            let memoized = program.rules.iter().filter(|r| r.memoize).count();
            MemoTable::for_input(input.len(), memoized)
        });
        let stats = if program.statistics { stats } else { None };

        Self {
            input,
            program,
            actions,
            tracer,
            log_tracer: LogTracer::new(),
            stats,
            memo,
            tracker: PositionTracker::new(input),
            pos: 0,
            saved_pos: 0,
            silent_fails: 0,
            max_fail_pos: 0,
            max_fail_expected: Vec::new(),
            current_rule: None,
        }
    }

    /// The program being run
    #[inline]
    pub fn program(&self) -> &'a Program {
        self.program
    }

    /// The input
    #[inline]
    pub fn input(&self) -> &'a str {
        self.input
    }

    /// Current position
    #[inline]
    pub fn curr_pos(&self) -> usize {
        self.pos
    }

    /// `PUSH_CURR_POS`
    #[inline]
    pub fn push_curr_pos(&self) -> Slot {
        Slot::Pos(self.pos)
    }

    /// `POP_CURR_POS`
    #[inline]
    pub fn restore_pos(&mut self, saved: &Slot) {
        if let Some(p) = saved.as_pos() {
            self.pos = p;
        }
    }

    /// `LOAD_SAVED_POS`
    #[inline]
    pub fn load_saved_pos(&mut self, saved: &Slot) {
        if let Some(p) = saved.as_pos() {
            self.saved_pos = p;
        }
    }

    /// `UPDATE_SAVED_POS`
    #[inline]
    pub fn update_saved_pos(&mut self) {
        self.saved_pos = self.pos;
    }

    /// `SILENT_FAILS_ON`
    #[inline]
    pub fn silent_fails_on(&mut self) {
        self.silent_fails += 1;
    }

    /// `SILENT_FAILS_OFF`
    #[inline]
    pub fn silent_fails_off(&mut self) {
        self.silent_fails = self.silent_fails.saturating_sub(1);
    }

    /// `SILENT_FAILS_RESET`
    #[inline]
    pub fn silent_fails_reset(&mut self) {
        self.silent_fails = 0;
    }

    /// `MATCH_ANY`
    #[inline]
    pub fn match_any(&self) -> bool {
        self.pos < self.input.len()
    }

    /// `MATCH_STRING`
    #[inline]
    pub fn match_string(&self, c: usize) -> bool {
        self.rest().starts_with(self.program.string(c))
    }

    /// `MATCH_STRING_IC` (the constant is stored lowercased)
    ///
    /// Input characters are folded one at a time, since a lowercase
    /// mapping may expand to several characters.
    pub fn match_string_ic(&self, c: usize) -> bool {
        let mut expected = self.program.string(c);
        for ch in self.rest().chars() {
            if expected.is_empty() {
                break;
            }
            for lower in ch.to_lowercase() {
                match expected.strip_prefix(lower) {
                    Some(tail) => expected = tail,
                    None => return false,
                }
            }
        }
        expected.is_empty()
    }

    /// `MATCH_REGEXP` (anchored at the current position)
    #[inline]
    pub fn match_regexp(&self, c: usize) -> bool {
        self.program
            .regex(c)
            .is_some_and(|re| re.is_match(self.rest()))
    }

    /// `ACCEPT_N`: take `n` characters
    pub fn accept_n(&mut self, n: usize) -> Slot {
        let end = self.char_offset(n);
        let text = &self.input[self.pos..end];
        self.pos = end;
        Slot::value(text)
    }

    /// `ACCEPT_STRING`
    #[inline]
    pub fn accept_string(&mut self, c: usize) -> Slot {
        let s = self.program.string(c);
        self.pos += s.len();
        Slot::value(s)
    }

    /// `ACCEPT_REGEXP`: take the text the regexp matches
    pub fn accept_regexp(&mut self, c: usize) -> Slot {
        let len = self
            .program
            .regex(c)
            .and_then(|re| re.find(self.rest()))
            .map_or(0, |m| m.end());
        let text = &self.input[self.pos..self.pos + len];
        self.pos += len;
        Slot::value(text)
    }

    /// `FAIL`: record the expectation (unless silenced) and push a failure
    pub fn fail(&mut self, c: usize) -> Slot {
        let silent = self.silent_fails > 0;
        if let Some(counters) = self.current_counters() {
            counters.fail += 1;
            if silent {
                counters.silent_fail += 1;
            }
        }
        if !silent {
            if let Some(expected) = self.program.expectation(c) {
                let expected = expected.clone();
                self.record_failure(expected);
            }
        }
        Slot::Failed
    }

    /// `PUSH_FAILED`
    #[inline]
    pub fn push_failed(&mut self) -> Slot {
        if let Some(counters) = self.current_counters() {
            counters.pushed_fail += 1;
        }
        Slot::Failed
    }

    /// `PUSH` of a string constant
    #[inline]
    pub fn constant(&self, c: usize) -> Slot {
        Slot::value(self.program.string(c))
    }

    /// `TEXT`: input from a saved position to the current one
    #[inline]
    pub fn text(&self, start: &Slot) -> Slot {
        let start = start.as_pos().unwrap_or(self.pos);
        Slot::value(self.input.get(start..self.pos).unwrap_or(""))
    }

    /// `CALL`: run an action over the span starting at the saved position
    pub fn call(&mut self, f: usize, args: &[Value]) -> Result<Slot, ParseFailure> {
        let program = self.program;
        let Some(def) = program.actions.get(f) else {
            return Err(ParseFailure::UnboundAction {
                index: f,
                code: String::new(),
            });
        };
        let rule_name = self.current_rule.map_or("", |r| program.rule_name(r));
        let ctx = ActionContext::new(self.input, self.saved_pos, self.pos, rule_name);

        match self.actions.call(f, def, &ctx, args) {
            Ok(value) => Ok(Slot::Value(value)),
            Err(ActionError::Fail) => {
                self.pos = self.saved_pos;
                Ok(Slot::Failed)
            }
            Err(ActionError::Expected(description)) => {
                let location = self.tracker.location(self.saved_pos, self.pos);
                Err(SyntaxError::expected(
                    vec![Expectation::other(description)],
                    Some(ctx.text().to_string()),
                    location,
                )
                .into())
            }
            Err(ActionError::Error(message)) => {
                let location = self.tracker.location(self.saved_pos, self.pos);
                Err(SyntaxError::custom(message, Some(ctx.text().to_string()), location).into())
            }
            Err(ActionError::Unbound) => Err(ParseFailure::UnboundAction {
                index: f,
                code: def.code.clone(),
            }),
        }
    }

    /// Run a rule body with memoization, statistics and tracing around it
    pub fn rule<F>(&mut self, index: usize, body: F) -> Result<Slot, ParseFailure>
    where
        F: FnOnce(&mut Self) -> Result<Slot, ParseFailure>,
    {
        let start = self.pos;
        let parent = self.current_rule;

        if let Some(stats) = self.stats.as_deref_mut() {
            stats.visit(index, parent);
        }
        self.trace(TraceEventKind::RuleEnter, index, start, start, None);

        let memoized = self.program.is_memoized(index);
        if memoized {
            let silent = self.silent_fails > 0;
            let hit = self
                .memo
                .as_ref()
                .and_then(|m| m.get(start, index))
                .filter(|e| silent || !e.silent)
                .map(|e| (e.next_pos, e.result.clone()));
            if let Some((next_pos, result)) = hit {
                self.pos = next_pos;
                let failed = result.is_failed();
                if let Some(stats) = self.stats.as_deref_mut() {
                    stats.cache_hit(index, parent, failed, silent);
                }
                if failed {
                    self.trace(TraceEventKind::RuleFailMemoized, index, start, start, None);
                } else {
                    self.trace(TraceEventKind::RuleMatchMemoized, index, start, self.pos, Some(&result));
                }
                return Ok(result);
            }
        }

        self.current_rule = Some(index);
        let result = body(self);
        self.current_rule = parent;
        let result = result?;

        if memoized {
            if let Some(memo) = self.memo.as_mut() {
                memo.insert(MemoEntry {
                    pos: start,
                    rule: index,
                    next_pos: self.pos,
                    result: result.clone(),
                    silent: self.silent_fails > 0,
                });
            }
        }

        let failed = result.is_failed();
        let silent = self.silent_fails > 0;
        if let Some(stats) = self.stats.as_deref_mut() {
            stats.returned(index, failed, silent);
        }
        if failed {
            self.trace(TraceEventKind::RuleFail, index, start, start, None);
        } else {
            self.trace(TraceEventKind::RuleMatch, index, start, self.pos, Some(&result));
        }

        Ok(result)
    }

    /// Turn the start rule's result into the parse outcome
    ///
    /// Success requires the whole input to be consumed; otherwise the
    /// furthest failure becomes a [`SyntaxError`].
    pub fn finish(mut self, result: Slot) -> Result<Value, ParseFailure> {
        if !result.is_failed() && self.pos == self.input.len() {
            return Ok(result.into_value());
        }
        if !result.is_failed() && self.pos < self.input.len() {
            self.record_failure(Expectation::end());
        }

        let at = self.max_fail_pos;
        let found = self.input[at..].chars().next();
        let end = at + found.map_or(0, char::len_utf8);
        let location = self.tracker.location(at, end);
        let expected = std::mem::take(&mut self.max_fail_expected);

        Err(SyntaxError::expected(expected, found.map(String::from), location).into())
    }

    /// Furthest failure position so far
    #[inline]
    pub fn max_fail_pos(&self) -> usize {
        self.max_fail_pos
    }

    fn record_failure(&mut self, expected: Expectation) {
        if self.pos < self.max_fail_pos {
            return;
        }
        if self.pos > self.max_fail_pos {
            self.max_fail_pos = self.pos;
            self.max_fail_expected.clear();
        }
        self.max_fail_expected.push(expected);
    }

    #[inline]
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    /// Byte offset `n` characters after the current position (clamped)
    #[inline]
    fn char_offset(&self, n: usize) -> usize {
        self.rest()
            .char_indices()
            .nth(n)
            .map_or(self.input.len(), |(i, _)| self.pos + i)
    }

    #[inline]
    fn current_counters(&mut self) -> Option<&mut super::stats::RuleCounters> {
        let rule = self.current_rule?;
        self.stats.as_deref_mut()?.counters(rule)
    }

    fn trace(
        &mut self,
        kind: TraceEventKind,
        rule: usize,
        start: usize,
        end: usize,
        result: Option<&Slot>,
    ) {
        let program = self.program;
        if !program.trace {
            return;
        }
        let location = self.tracker.location(start, end);
        let result = match result {
            Some(Slot::Value(v)) => Some(v),
            _ => None,
        };
        let event = TraceEvent {
            kind,
            rule: program.rule_name(rule),
            location,
            result,
        };
        match self.tracer.as_deref_mut() {
            Some(tracer) => tracer.trace(&event),
            None => self.log_tracer.trace(&event),
        }
    }
}
