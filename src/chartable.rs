//! Interning table for multi-code-point glyphs
//!
//! A cell slot is a fixed-width code unit, but a glyph built from a base
//! character plus combining marks needs a variable-length sequence of code
//! points. The table stores each distinct sequence once and hands out a
//! 16-bit handle that fits the cell slot.

use std::collections::HashMap;

use thiserror::Error;

/// Hard capacity: handles are 16-bit, so at most this many entries.
pub const TABLE_CAPACITY: usize = 1 << 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CharTableError {
    /// All 65536 handles are taken. Entries are never evicted, so once the
    /// table is full no new sequence can be interned.
    #[error("extended character table is full ({TABLE_CAPACITY} entries)")]
    TableFull,
}

/// Intern table mapping combining-character sequences to 16-bit handles.
///
/// Entries are create-only and live for the table's lifetime. Two screens of
/// the same emulation share one table behind a mutex; see `Emulation`.
#[derive(Default)]
pub struct ExtendedCharTable {
    entries: HashMap<u16, Vec<char>>,
}

impl ExtendedCharTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Polynomial hash over the code points, truncated to 16 bits.
    fn hash(sequence: &[char]) -> u16 {
        let mut hash: u16 = 0;
        for &ch in sequence {
            hash = hash.wrapping_mul(31).wrapping_add(ch as u16);
        }
        hash
    }

    /// Intern `sequence`, returning its handle.
    ///
    /// The same sequence always yields the same handle, even once the table
    /// is full; distinct sequences never collide while there are free slots.
    /// Collisions resolve by linear probing with 16-bit wrap-around, bounded
    /// by occupancy so a full-table probe terminates. Only an insert can
    /// fail: a new sequence at capacity is rejected.
    pub fn create(&mut self, sequence: &[char]) -> Result<u16, CharTableError> {
        let mut handle = Self::hash(sequence);
        // A probe chain crosses at most `len` occupied slots before hitting
        // either the sequence or an empty slot.
        for _ in 0..=self.entries.len() {
            match self.entries.get(&handle) {
                Some(existing) if existing.as_slice() == sequence => return Ok(handle),
                Some(_) => handle = handle.wrapping_add(1),
                None => {
                    tracing::trace!(handle, len = sequence.len(), "interned extended char");
                    self.entries.insert(handle, sequence.to_vec());
                    return Ok(handle);
                }
            }
        }
        Err(CharTableError::TableFull)
    }

    /// Look up the sequence behind `handle`, or `None` for an unused slot.
    pub fn lookup(&self, handle: u16) -> Option<&[char]> {
        self.entries.get(&handle).map(|seq| seq.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_is_idempotent() {
        let mut table = ExtendedCharTable::new();
        let seq = ['e', '\u{0301}'];

        let first = table.create(&seq).unwrap();
        let second = table.create(&seq).unwrap();

        assert_eq!(first, second);
        assert_eq!(table.lookup(first), Some(&seq[..]));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn distinct_sequences_get_distinct_handles() {
        let mut table = ExtendedCharTable::new();
        let a = table.create(&['a', '\u{0300}']).unwrap();
        let b = table.create(&['a', '\u{0301}']).unwrap();
        let c = table.create(&['o', '\u{0300}']).unwrap();

        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn colliding_sequences_probe_to_next_slot() {
        let mut table = ExtendedCharTable::new();
        // hash('a' + 31) == hash of ['\u{1f}', 'a'.. ] is fiddly; instead force
        // a collision directly: 31*h('a') + x == 31*h('b') + y when
        // x - y == 31. ['a', ch] and ['b', ch - 31] hash identically.
        let first = ['a', '\u{0100}'];
        let second = ['b', '\u{00E1}'];
        assert_eq!(
            ExtendedCharTable::hash(&first),
            ExtendedCharTable::hash(&second)
        );

        let h1 = table.create(&first).unwrap();
        let h2 = table.create(&second).unwrap();

        assert_eq!(h2, h1.wrapping_add(1));
        assert_eq!(table.lookup(h1), Some(&first[..]));
        assert_eq!(table.lookup(h2), Some(&second[..]));
    }

    #[test]
    fn lookup_of_unused_handle_is_none() {
        let table = ExtendedCharTable::new();
        assert_eq!(table.lookup(12345), None);
    }

    #[test]
    fn full_table_rejects_new_sequences_but_resolves_known_ones() {
        let mut table = ExtendedCharTable::new();
        // Fill every slot by brute force; one unique code point per entry,
        // drawn from a contiguous valid range (plane 2 has no surrogates).
        let mut seventh = 0;
        for i in 0..TABLE_CAPACITY as u32 {
            let seq = [char::from_u32(0x20000 + i).unwrap()];
            let handle = table.create(&seq).unwrap();
            if i == 7 {
                seventh = handle;
            }
        }
        assert_eq!(table.len(), TABLE_CAPACITY);

        let err = table.create(&['z', 'z', 'z']).unwrap_err();
        assert_eq!(err, CharTableError::TableFull);

        // Interning stays idempotent at capacity: a known sequence still
        // resolves to its handle even though no insert is possible.
        let known = [char::from_u32(0x20007).unwrap()];
        assert_eq!(table.create(&known), Ok(seventh));
        assert_eq!(table.len(), TABLE_CAPACITY);
    }
}
