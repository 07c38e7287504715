//! Dense packrat memo table
//!
//! Memoized rules store their outcome keyed by `(position, rule)` so a
//! second invocation at the same position skips the rule body. The table
//! uses open addressing with linear probing over a slot index array that
//! points into a contiguous entry vector:
//!
//! 1. **Slots array**: maps hash to entry index (-1 for empty)
//! 2. **Entries array**: stores entries contiguously
//!
//! The key space is `input_length * rule_count`, so the table grows on
//! demand instead of being allocated up front. One table lives for exactly
//! one parse.
//!
//! An entry remembers whether it was recorded inside a predicate. Such an
//! entry reported no expectations, so a lookup outside any predicate must
//! run the rule again rather than replay it.

use super::value::Slot;

/// A memoized rule outcome
#[derive(Debug, Clone, PartialEq)]
pub struct MemoEntry {
    /// Position the rule was invoked at
    pub pos: usize,
    /// Rule index
    pub rule: usize,
    /// Position after the rule returned
    pub next_pos: usize,
    /// Rule result (possibly the failure sentinel)
    pub result: Slot,
    /// Recorded while failures were silenced
    pub silent: bool,
}

/// Memo table with linear probing
#[derive(Debug, Clone)]
pub struct MemoTable {
    /// Hash table: maps (hash % capacity) -> entry index, -1 means empty
    slots: Vec<i32>,

    /// Entries (stored contiguously for cache efficiency)
    entries: Vec<MemoEntry>,

    /// Number of slots in the hash table
    capacity: usize,

    /// Load factor threshold (0.0 to 1.0)
    load_factor: f64,
}

impl Default for MemoTable {
    fn default() -> Self {
        Self::new(256)
    }
}

impl MemoTable {
    /// Create a table with estimated capacity
    #[inline]
    pub fn new(estimated_entries: usize) -> Self {
        // Power of 2 for fast modulo
        let capacity = estimated_entries.next_power_of_two().max(16);

        Self {
            slots: vec![-1i32; capacity],
            entries: Vec::with_capacity(estimated_entries),
            capacity,
            load_factor: 0.75,
        }
    }

    /// Create a table sized for a given input length
    #[inline]
    pub fn for_input(input_len: usize, memoized_rules: usize) -> Self {
        let estimated = (input_len / 10) * memoized_rules.min(5);
        Self::new(estimated.clamp(64, 500_000))
    }

    /// Look up the outcome of `rule` at `pos`
    #[inline]
    pub fn get(&self, pos: usize, rule: usize) -> Option<&MemoEntry> {
        let mut slot = self.hash(pos, rule);

        loop {
            let idx = self.slots[slot];

            if idx < 0 {
                return None;
            }

            let entry = &self.entries[idx as usize];
            if entry.pos == pos && entry.rule == rule {
                return Some(entry);
            }

            slot = (slot + 1) & (self.capacity - 1);
        }
    }

    /// Store an outcome, replacing an existing entry for the same key
    #[inline]
    pub fn insert(&mut self, entry: MemoEntry) {
        if self.entries.len() as f64 / self.capacity as f64 > self.load_factor {
            self.resize();
        }

        let mut slot = self.hash(entry.pos, entry.rule);

        while self.slots[slot] >= 0 {
            let idx = self.slots[slot] as usize;
            if self.entries[idx].pos == entry.pos && self.entries[idx].rule == entry.rule {
                self.entries[idx] = entry;
                return;
            }
            slot = (slot + 1) & (self.capacity - 1);
        }

        let idx = self.entries.len() as i32;
        self.entries.push(entry);
        self.slots[slot] = idx;
    }

    /// Hash function (FNV-1a)
    #[inline]
    fn hash(&self, pos: usize, rule: usize) -> usize {
        Self::hash_static(pos, rule, self.capacity)
    }

    fn resize(&mut self) {
        let new_capacity = self.capacity * 2;
        let mut new_slots = vec![-1i32; new_capacity];

        for (idx, entry) in self.entries.iter().enumerate() {
            let mut slot = Self::hash_static(entry.pos, entry.rule, new_capacity);
            while new_slots[slot] >= 0 {
                slot = (slot + 1) & (new_capacity - 1);
            }
            new_slots[slot] = idx as i32;
        }

        self.slots = new_slots;
        self.capacity = new_capacity;
    }

    #[inline]
    fn hash_static(pos: usize, rule: usize, capacity: usize) -> usize {
        let mut h: u64 = 0x811c9dc5;
        h ^= pos as u64;
        h = h.wrapping_mul(0x01000193);
        h ^= rule as u64;
        h = h.wrapping_mul(0x01000193);
        (h as usize) & (capacity - 1)
    }
}
