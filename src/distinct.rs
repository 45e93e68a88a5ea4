//! The set of distinct values a hasher has observed, with their ids.
//!
//! Ids are assigned in insertion order starting at 1; id 0 is reserved
//! for NULL everywhere in the engine. The dedup map stores only entry
//! indexes and resolves hashes and equality through the raw entry API,
//! so string bytes live exactly once, in the table's own paged storage.
//!
//! A table holds values of a single column type; the integer and byte
//! entry points must not be mixed on one instance.

use ahash::RandomState;
use hashbrown::hash_map::RawEntryMut;
use hashbrown::HashMap;

/// Granularity of the string backing store. A value larger than the unit
/// gets a page of its own.
pub const STRING_BUFFER_UNIT_SIZE: usize = 1024;

/// Strings up to this many bytes are packed into the entry word itself
/// and use no backing storage.
const INLINE_LEN: usize = 8;

/// One distinct value. For integer tables `word` is the value itself.
/// For string tables `word` holds the bytes inline when `len <= 8`,
/// otherwise the packed (page, offset) position in the backing store.
#[derive(Debug, Clone, Copy)]
struct Entry {
    word: i64,
    len: u32,
}

#[derive(Debug, Default)]
struct ByteStorage {
    pages: Vec<Vec<u8>>,
    reserved: usize,
}

impl ByteStorage {
    fn append(&mut self, value: &[u8]) -> (u32, u32) {
        let needs_new_page = match self.pages.last() {
            None => true,
            Some(page) => page.len() + value.len() > page.capacity(),
        };
        if needs_new_page {
            let page = Vec::with_capacity(STRING_BUFFER_UNIT_SIZE.max(value.len()));
            self.reserved += page.capacity();
            self.pages.push(page);
        }
        let page_index = self.pages.len() - 1;
        let page = &mut self.pages[page_index];
        let pos = page.len();
        page.extend_from_slice(value);
        (page_index as u32, pos as u32)
    }

    fn get(&self, entry: &Entry) -> &[u8] {
        let page = (entry.word as u64 >> 32) as usize;
        let pos = (entry.word as u64 & 0xffff_ffff) as usize;
        &self.pages[page][pos..pos + entry.len as usize]
    }

    fn reserved_bytes(&self) -> usize {
        self.reserved
    }
}

#[derive(Debug, Default)]
pub struct DistinctTable {
    state: RandomState,
    // Entry index keyed by value hash; hashes and equality are computed
    // against `entries` through the raw entry API.
    dedup: HashMap<u32, (), ()>,
    // Insertion order; the id of entries[i] is i + 1.
    entries: Vec<Entry>,
    storage: ByteStorage,
}

impl DistinctTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reserved capacity of the string backing store, in bytes.
    pub fn storage_bytes(&self) -> usize {
        self.storage.reserved_bytes()
    }

    /// Inserts an integer value, returning its id and whether it was new.
    pub fn insert_int(&mut self, value: i64) -> (u64, bool) {
        let state = &self.state;
        let entries = &mut self.entries;
        let hash = state.hash_one(value);
        let entry = self
            .dedup
            .raw_entry_mut()
            .from_hash(hash, |&idx| entries[idx as usize].word == value);
        match entry {
            RawEntryMut::Occupied(occupied) => (*occupied.key() as u64 + 1, false),
            RawEntryMut::Vacant(vacant) => {
                let idx = entries.len() as u32;
                entries.push(Entry { word: value, len: 0 });
                let entries: &[Entry] = entries;
                vacant.insert_with_hasher(hash, idx, (), |&i| {
                    state.hash_one(entries[i as usize].word)
                });
                (idx as u64 + 1, true)
            }
        }
    }

    pub fn lookup_int(&self, value: i64) -> Option<u64> {
        let hash = self.state.hash_one(value);
        self.dedup
            .raw_entry()
            .from_hash(hash, |&idx| self.entries[idx as usize].word == value)
            .map(|(&idx, &())| idx as u64 + 1)
    }

    /// Inserts a byte-string value, copying it into the backing store
    /// when it is new and does not fit inline.
    pub fn insert_bytes(&mut self, value: &[u8]) -> (u64, bool) {
        let state = &self.state;
        let entries = &mut self.entries;
        let storage = &mut self.storage;
        let hash = state.hash_one(value);
        let entry = self
            .dedup
            .raw_entry_mut()
            .from_hash(hash, |&idx| {
                bytes_eq(&entries[idx as usize], storage, value)
            });
        match entry {
            RawEntryMut::Occupied(occupied) => (*occupied.key() as u64 + 1, false),
            RawEntryMut::Vacant(vacant) => {
                let idx = entries.len() as u32;
                entries.push(string_entry(storage, value));
                let entries: &[Entry] = entries;
                let storage: &ByteStorage = storage;
                vacant.insert_with_hasher(hash, idx, (), |&i| {
                    hash_entry_bytes(state, &entries[i as usize], storage)
                });
                (idx as u64 + 1, true)
            }
        }
    }

    pub fn lookup_bytes(&self, value: &[u8]) -> Option<u64> {
        let hash = self.state.hash_one(value);
        self.dedup
            .raw_entry()
            .from_hash(hash, |&idx| {
                bytes_eq(&self.entries[idx as usize], &self.storage, value)
            })
            .map(|(&idx, &())| idx as u64 + 1)
    }

    /// The distinct integers in insertion order.
    pub fn ints(&self) -> impl Iterator<Item = i64> + '_ {
        self.entries.iter().map(|entry| entry.word)
    }

    /// Applies `f` to each distinct byte string in insertion order.
    pub fn for_each_value(&self, mut f: impl FnMut(&[u8])) {
        for entry in &self.entries {
            if entry.len as usize <= INLINE_LEN {
                let buf = entry.word.to_le_bytes();
                f(&buf[..entry.len as usize]);
            } else {
                f(self.storage.get(entry));
            }
        }
    }
}

fn inline_word(value: &[u8]) -> i64 {
    let mut buf = [0u8; 8];
    buf[..value.len()].copy_from_slice(value);
    i64::from_le_bytes(buf)
}

fn string_entry(storage: &mut ByteStorage, value: &[u8]) -> Entry {
    if value.len() <= INLINE_LEN {
        Entry {
            word: inline_word(value),
            len: value.len() as u32,
        }
    } else {
        let (page, pos) = storage.append(value);
        Entry {
            word: (((page as u64) << 32) | pos as u64) as i64,
            len: value.len() as u32,
        }
    }
}

fn bytes_eq(entry: &Entry, storage: &ByteStorage, probe: &[u8]) -> bool {
    if entry.len as usize != probe.len() {
        return false;
    }
    if entry.len as usize <= INLINE_LEN {
        entry.word == inline_word(probe)
    } else {
        storage.get(entry) == probe
    }
}

fn hash_entry_bytes(state: &RandomState, entry: &Entry, storage: &ByteStorage) -> u64 {
    if entry.len as usize <= INLINE_LEN {
        let buf = entry.word.to_le_bytes();
        state.hash_one(&buf[..entry.len as usize])
    } else {
        state.hash_one(storage.get(entry))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn int_ids_are_insertion_ordered() {
        let mut table = DistinctTable::new();
        assert_eq!(table.insert_int(7), (1, true));
        assert_eq!(table.insert_int(9), (2, true));
        assert_eq!(table.insert_int(7), (1, false));
        assert_eq!(table.insert_int(11), (3, true));
        assert_eq!(table.len(), 3);

        assert_eq!(table.lookup_int(9), Some(2));
        assert_eq!(table.lookup_int(8), None);
        assert_eq!(table.ints().collect::<Vec<_>>(), vec![7, 9, 11]);
    }

    #[test]
    fn string_ids_compare_by_bytes() {
        let mut table = DistinctTable::new();
        assert_eq!(table.insert_bytes(b"apple"), (1, true));
        assert_eq!(table.insert_bytes(b"banana"), (2, true));

        // Equal bytes from a different buffer hit the same entry.
        let copy = b"apple".to_vec();
        assert_eq!(table.insert_bytes(&copy), (1, false));

        assert_eq!(table.lookup_bytes(b"banana"), Some(2));
        assert_eq!(table.lookup_bytes(b"cherry"), None);
    }

    #[test]
    fn long_strings_are_rebased_into_storage() {
        let mut table = DistinctTable::new();
        let long = vec![b'x'; 100];
        let (id, inserted) = table.insert_bytes(&long);
        assert_eq!((id, inserted), (1, true));
        assert!(table.storage_bytes() >= STRING_BUFFER_UNIT_SIZE);

        // The input buffer can go away; the table owns its copy.
        drop(long);
        assert_eq!(table.lookup_bytes(&vec![b'x'; 100]), Some(1));

        let mut values = Vec::new();
        table.for_each_value(|v| values.push(v.to_vec()));
        assert_eq!(values, vec![vec![b'x'; 100]]);
    }

    #[test]
    fn short_strings_use_no_storage() {
        let mut table = DistinctTable::new();
        table.insert_bytes(b"");
        table.insert_bytes(b"12345678");
        assert_eq!(table.storage_bytes(), 0);
        assert_eq!(table.lookup_bytes(b""), Some(1));
        assert_eq!(table.lookup_bytes(b"12345678"), Some(2));
    }

    #[test]
    fn oversized_value_gets_its_own_page() {
        let mut table = DistinctTable::new();
        let big = vec![b'y'; STRING_BUFFER_UNIT_SIZE * 2];
        table.insert_bytes(&big);
        assert!(table.storage_bytes() >= STRING_BUFFER_UNIT_SIZE * 2);
        assert_eq!(table.lookup_bytes(&big), Some(1));
    }

    #[test]
    fn many_values_survive_table_growth() {
        let mut table = DistinctTable::new();
        for i in 0..1000_i64 {
            let (id, inserted) = table.insert_int(i * 3);
            assert_eq!(id, i as u64 + 1);
            assert!(inserted);
        }
        for i in 0..1000_i64 {
            assert_eq!(table.lookup_int(i * 3), Some(i as u64 + 1));
        }
        assert_eq!(table.lookup_int(1), None);
    }

    #[test]
    fn string_growth_rehash_keeps_storage_backed_entries() {
        let mut table = DistinctTable::new();
        for i in 0..500_u32 {
            let value = format!("value-{:0>10}", i);
            let (id, inserted) = table.insert_bytes(value.as_bytes());
            assert_eq!(id, i as u64 + 1);
            assert!(inserted);
        }
        for i in 0..500_u32 {
            let value = format!("value-{:0>10}", i);
            assert_eq!(table.lookup_bytes(value.as_bytes()), Some(i as u64 + 1));
        }
    }
}
