//! Source Location Utilities
//!
//! Line/column computation for generated parsers. Offsets are byte offsets
//! into the UTF-8 input; columns count characters. `\n`, `\r\n`, `\r`,
//! U+2028 and U+2029 each terminate a line.

use memchr::memchr3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// First byte of the UTF-8 encodings of U+2028 and U+2029
const LS_PS_LEAD: u8 = 0xE2;

/// A position in the input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Byte offset from start of input
    pub offset: usize,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based, counts characters)
    pub column: usize,
}

impl Position {
    /// Create a new position
    #[inline]
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }

    /// The position at the start of input
    #[inline]
    pub fn start() -> Self {
        Self::new(0, 1, 1)
    }

    /// Calculate the position of an offset in the input
    pub fn from_offset(input: &str, offset: usize) -> Self {
        PositionTracker::new(input).position(offset)
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// A range in the input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Location {
    /// Start position
    pub start: Position,
    /// End position
    pub end: Position,
}

impl Location {
    /// Create a new location
    #[inline]
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Compute the location of a byte range in the input
    pub fn from_range(input: &str, start: usize, end: usize) -> Self {
        let mut tracker = PositionTracker::new(input);
        let start = tracker.position(start);
        let end = tracker.position(end);
        Self { start, end }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start)
    }
}

#[derive(Debug, Clone, Copy)]
struct Details {
    offset: usize,
    line: usize,
    column: usize,
    seen_cr: bool,
}

impl Details {
    const START: Details = Details {
        offset: 0,
        line: 1,
        column: 1,
        seen_cr: false,
    };
}

/// Incremental line/column computation
///
/// Remembers the last computed position, so a sequence of queries with
/// non-decreasing offsets scans the input only once.
#[derive(Debug, Clone)]
pub struct PositionTracker<'i> {
    input: &'i str,
    last: Details,
}

impl<'i> PositionTracker<'i> {
    /// Create a tracker for an input
    pub fn new(input: &'i str) -> Self {
        Self {
            input,
            last: Details::START,
        }
    }

    /// Compute the position of a byte offset (clamped to the input length)
    pub fn position(&mut self, offset: usize) -> Position {
        let offset = offset.min(self.input.len());
        if offset < self.last.offset {
            self.last = Details::START;
        }
        self.last = self.advance(self.last, offset);
        Position::new(offset, self.last.line, self.last.column)
    }

    /// Compute the location of a byte range
    pub fn location(&mut self, start: usize, end: usize) -> Location {
        let start = self.position(start);
        let end = self.position(end);
        Location::new(start, end)
    }

    fn advance(&self, mut details: Details, to: usize) -> Details {
        let bytes = self.input.as_bytes();
        let mut p = details.offset;

        while p < to {
            let rest = &bytes[p..to];
            let Some(i) = memchr3(b'\n', b'\r', LS_PS_LEAD, rest) else {
                details.column += count_chars(rest);
                details.seen_cr = false;
                break;
            };

            if i > 0 {
                details.column += count_chars(&rest[..i]);
                details.seen_cr = false;
            }
            p += i;

            match bytes[p] {
                b'\n' => {
                    if !details.seen_cr {
                        details.line += 1;
                    }
                    details.column = 1;
                    details.seen_cr = false;
                    p += 1;
                }
                b'\r' => {
                    details.line += 1;
                    details.column = 1;
                    details.seen_cr = true;
                    p += 1;
                }
                _ => {
                    let tail = &self.input[p..];
                    if tail.starts_with('\u{2028}') || tail.starts_with('\u{2029}') {
                        details.line += 1;
                        details.column = 1;
                        details.seen_cr = false;
                    } else {
                        details.column += 1;
                        details.seen_cr = false;
                    }
                    p += tail.chars().next().map_or(1, char::len_utf8);
                }
            }
        }

        details.offset = to;
        details
    }
}

/// Count UTF-8 characters in a byte slice that starts on a char boundary
#[inline]
fn count_chars(bytes: &[u8]) -> usize {
    bytes.iter().filter(|&&b| (b & 0xC0) != 0x80).count()
}
