/// Fixed-capacity identifier set for window deduplication.
///
/// One bit per possible 16-bit device identifier, 8 KiB total. The buffer
/// is owned by the counting engine: built once at startup, zeroed on every
/// window reset, never freed. Constant-time test and insert.

/// Number of distinct identifiers the set can track (the full u16 domain).
pub const ID_SPACE: usize = 1 << 16;

const WORDS: usize = ID_SPACE / 64;

/// A 65536-bit set recording which identifiers have been seen since the
/// last reset.
pub struct IdSet {
    bits: [u64; WORDS],
}

impl IdSet {
    /// Create an empty set (no identifiers seen).
    pub const fn new() -> Self {
        Self { bits: [0; WORDS] }
    }

    /// Check whether an identifier has been seen since the last reset.
    #[inline]
    pub fn contains(&self, id: u16) -> bool {
        let i = id as usize;
        (self.bits[i / 64] >> (i % 64)) & 1 == 1
    }

    /// Mark an identifier as seen. Returns `true` if the bit transitioned
    /// from unset to set, `false` if the identifier was already present.
    #[inline]
    pub fn insert(&mut self, id: u16) -> bool {
        let i = id as usize;
        let mask = 1u64 << (i % 64);
        let word = &mut self.bits[i / 64];
        let new = *word & mask == 0;
        *word |= mask;
        new
    }

    /// Zero every bit. Callers hold the engine lock across this, so a
    /// reset is a single critical section relative to concurrent inserts.
    pub fn clear(&mut self) {
        self.bits = [0; WORDS];
    }
}

impl Default for IdSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_on_creation() {
        let set = IdSet::new();
        for id in [0u16, 1, 63, 64, 255, 256, 32_767, 65_535] {
            assert!(!set.contains(id), "id {id} should be unset");
        }
    }

    #[test]
    fn insert_reports_new_exactly_once() {
        let mut set = IdSet::new();
        assert!(set.insert(42));
        assert!(!set.insert(42));
        assert!(!set.insert(42));
        assert!(set.contains(42));
    }

    #[test]
    fn insert_word_boundaries() {
        let mut set = IdSet::new();
        for &id in &[0u16, 63, 64, 127, 128, 65_472, 65_535] {
            assert!(set.insert(id), "id {id} should be new");
        }
        for &id in &[0u16, 63, 64, 127, 128, 65_472, 65_535] {
            assert!(set.contains(id), "id {id} should be set");
        }
        // Adjacent bits must NOT be set
        for &id in &[1u16, 62, 65, 126, 129, 65_473, 65_534] {
            assert!(!set.contains(id), "id {id} should NOT be set");
        }
    }

    #[test]
    fn insert_accepts_entire_domain() {
        let mut set = IdSet::new();
        for id in 0..=u16::MAX {
            assert!(set.insert(id));
        }
        for id in 0..=u16::MAX {
            assert!(set.contains(id));
            assert!(!set.insert(id));
        }
    }

    #[test]
    fn clear_empties_the_set() {
        let mut set = IdSet::new();
        set.insert(0);
        set.insert(1_000);
        set.insert(65_535);
        set.clear();
        for id in [0u16, 1_000, 65_535] {
            assert!(!set.contains(id));
        }
        // Everything is insertable as new again
        assert!(set.insert(1_000));
    }
}
