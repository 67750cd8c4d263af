use std::cell::OnceCell;

use ftrie_common::{Result, verify_arg};

use crate::vint::VIntStream;

/// Location of a key (or key fragment) inside the shared token arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenRange {
    pub start: usize,
    pub len: usize,
}

impl TokenRange {
    #[inline]
    pub fn bytes<'a>(&self, arena: &'a [u8]) -> &'a [u8] {
        &arena[self.start..self.start + self.len]
    }

    /// The first `len` bytes of the range.
    #[inline]
    pub fn prefix(&self, len: usize) -> TokenRange {
        debug_assert!(len <= self.len);
        TokenRange {
            start: self.start,
            len,
        }
    }

    /// The range with its first `skip` bytes removed.
    #[inline]
    pub fn suffix(&self, skip: usize) -> TokenRange {
        debug_assert!(skip <= self.len);
        TokenRange {
            start: self.start + skip,
            len: self.len - skip,
        }
    }
}

/// Postings accumulated for one distinct token.
///
/// The pre and pos streams always hold the same number of values: entry `i`
/// of the token is the pair of the `i`-th value of each stream.
pub struct TokenEntry {
    key: TokenRange,
    pre: VIntStream,
    pos: VIntStream,
}

impl TokenEntry {
    fn new(key: TokenRange) -> TokenEntry {
        TokenEntry {
            key,
            pre: VIntStream::new(),
            pos: VIntStream::new(),
        }
    }

    pub fn key(&self) -> TokenRange {
        self.key
    }

    pub fn pre(&self) -> &VIntStream {
        &self.pre
    }

    pub fn pos(&self) -> &VIntStream {
        &self.pos
    }

    /// Number of occurrences recorded for the token.
    pub fn occurrences(&self) -> u32 {
        debug_assert_eq!(self.pre.count(), self.pos.count());
        self.pre.count()
    }
}

/// Staging hash that deduplicates tokens and collects their postings.
///
/// `TokenHash` is an open-addressing table with linear probing over xxh3
/// hashes of the token bytes. Distinct tokens are appended to a single arena
/// and their entries are kept in insertion order; the table only stores
/// entry ids. Entries are never removed.
///
/// Once all tokens are indexed, [`TokenHash::iter_sorted`] visits the entries
/// in lexicographic byte order of their keys. The order is computed on first
/// use and cached until the next insertion.
pub struct TokenHash {
    /// Concatenation of all distinct tokens.
    arena: Vec<u8>,
    /// Entries in first-seen order.
    entries: Vec<TokenEntry>,
    /// Probe table: `0` marks an empty slot, otherwise `entry id + 1`.
    slots: Vec<u32>,
    /// Total number of indexed occurrences.
    token_count: u64,
    /// Entry ids sorted by key bytes.
    sorted: OnceCell<Vec<u32>>,
}

impl Default for TokenHash {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenHash {
    /// Number of probe slots of a fresh table.
    pub const INITIAL_CAPACITY: usize = 1024;

    pub fn new() -> TokenHash {
        TokenHash {
            arena: Vec::new(),
            entries: Vec::new(),
            slots: vec![0; Self::INITIAL_CAPACITY],
            token_count: 0,
            sorted: OnceCell::new(),
        }
    }

    /// Number of distinct tokens.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of probe slots currently allocated.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Total number of occurrences indexed so far.
    pub fn token_count(&self) -> u64 {
        self.token_count
    }

    pub fn arena(&self) -> &[u8] {
        &self.arena
    }

    /// Approximate number of heap bytes held by the hash.
    pub fn memory_usage(&self) -> usize {
        self.arena.capacity()
            + self.slots.capacity() * size_of::<u32>()
            + self.entries.capacity() * size_of::<TokenEntry>()
            + self
                .entries
                .iter()
                .map(|e| e.pre.allocated_size() + e.pos.allocated_size())
                .sum::<usize>()
    }

    /// Records one occurrence of `token` at (`pre`, `pos`).
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty token.
    pub fn index(&mut self, token: &[u8], pre: u32, pos: u32) -> Result<()> {
        verify_arg!(token, !token.is_empty());
        let id = match self.find_slot(token) {
            Ok(id) => id,
            Err(slot) => self.insert_new(slot, token),
        };
        let entry = &mut self.entries[id];
        entry.pre.push(pre);
        entry.pos.push(pos);
        self.token_count += 1;
        Ok(())
    }

    /// Looks up the entry of `token`, if it has been indexed.
    pub fn get(&self, token: &[u8]) -> Option<&TokenEntry> {
        self.find_slot(token).ok().map(|id| &self.entries[id])
    }

    /// Visits all entries in lexicographic order of their keys.
    pub fn iter_sorted(&self) -> impl Iterator<Item = &TokenEntry> {
        let order = self.sorted.get_or_init(|| self.sorted_order());
        order.iter().map(|&id| &self.entries[id as usize])
    }

    /// Releases the postings buffers and the probe table, keeping only the
    /// token arena that trie keys refer to.
    pub fn into_arena(self) -> Vec<u8> {
        self.arena
    }

    /// Probes for `token`: `Ok(entry id)` if present, `Err(empty slot)` otherwise.
    fn find_slot(&self, token: &[u8]) -> std::result::Result<usize, usize> {
        let mask = self.slots.len() - 1;
        let mut slot = xxhash_rust::xxh3::xxh3_64(token) as usize & mask;
        loop {
            match self.slots[slot] {
                0 => return Err(slot),
                id => {
                    let id = id as usize - 1;
                    if self.entries[id].key.bytes(&self.arena) == token {
                        return Ok(id);
                    }
                }
            }
            slot = (slot + 1) & mask;
        }
    }

    fn insert_new(&mut self, slot: usize, token: &[u8]) -> usize {
        let id = self.entries.len();
        let key = TokenRange {
            start: self.arena.len(),
            len: token.len(),
        };
        self.arena.extend_from_slice(token);
        self.entries.push(TokenEntry::new(key));
        self.slots[slot] = (id + 1) as u32;
        self.sorted = OnceCell::new();

        if self.entries.len() * 4 > self.slots.len() * 3 {
            self.grow();
        }
        id
    }

    /// Doubles the probe table and reinserts all entries.
    fn grow(&mut self) {
        let capacity = self.slots.len() * 2;
        let mask = capacity - 1;
        let mut slots = vec![0u32; capacity];
        for (id, entry) in self.entries.iter().enumerate() {
            let key = entry.key.bytes(&self.arena);
            let mut slot = xxhash_rust::xxh3::xxh3_64(key) as usize & mask;
            while slots[slot] != 0 {
                slot = (slot + 1) & mask;
            }
            slots[slot] = (id + 1) as u32;
        }
        self.slots = slots;
    }

    fn sorted_order(&self) -> Vec<u32> {
        let mut order: Vec<u32> = (0..self.entries.len() as u32).collect();
        order.sort_unstable_by(|&a, &b| {
            let key_a = self.entries[a as usize].key.bytes(&self.arena);
            let key_b = self.entries[b as usize].key.bytes(&self.arena);
            key_a.cmp(key_b)
        });
        order
    }
}
