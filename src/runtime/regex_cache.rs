//! Thread-local regex cache for pattern compilation
//!
//! Compiled regex patterns are cached to avoid recompilation overhead when
//! the same grammar is compiled or loaded many times. Uses thread-local
//! storage for safe concurrent access.

use hashbrown::HashMap;
use regex::Regex;
use std::cell::RefCell;

thread_local! {
    /// Thread-local cache of compiled regex patterns
    static REGEX_CACHE: RefCell<HashMap<String, Regex>> = RefCell::new(HashMap::new());
}

/// Get or compile a regex pattern
///
/// # Returns
/// * `Some(Regex)` if the pattern is valid
/// * `None` if the pattern is invalid
#[inline]
pub fn get_or_compile(pattern: &str) -> Option<Regex> {
    REGEX_CACHE.with(|cache| {
        if let Some(regex) = cache.borrow().get(pattern) {
            return Some(regex.clone());
        }

        match Regex::new(pattern) {
            Ok(regex) => {
                cache
                    .borrow_mut()
                    .insert(pattern.to_string(), regex.clone());
                Some(regex)
            }
            Err(_) => None,
        }
    })
}

/// Build the source of a regex anchored at the start of the haystack
///
/// Generated parsers match against the input remaining at the current
/// position, so `\A` is the anchor (with `m`, `^` would also match after
/// every newline).
pub fn anchored(pattern: &str, ignore_case: bool, multi_line: bool) -> String {
    let mut flags = String::new();
    if ignore_case {
        flags.push('i');
    }
    if multi_line {
        flags.push('m');
    }
    if flags.is_empty() {
        format!(r"\A(?:{})", pattern)
    } else {
        format!(r"(?{})\A(?:{})", flags, pattern)
    }
}

/// Whether a pattern can match the empty string
///
/// Returns `None` for invalid patterns.
pub fn matches_empty(pattern: &str, ignore_case: bool, multi_line: bool) -> Option<bool> {
    let full = format!(r"{}\z", anchored(pattern, ignore_case, multi_line));
    get_or_compile(&full).map(|re| re.is_match(""))
}
