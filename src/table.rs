use std::rc::Rc;

use crate::value::{fnv1a, ObjString, Value};

const TABLE_MAX_LOAD: f64 = 0.75;

enum Slot {
    Empty,
    Tombstone,
    Occupied(Rc<ObjString>, Value),
}

/// An open-addressed, linear-probed hash table keyed by interned strings.
/// Used both as the process-wide string intern set (value ignored) and,
/// generically, as a string-keyed map.
///
/// Deletions leave a tombstone behind so later entries that probed past
/// the deleted slot remain reachable; `count` includes tombstones for the
/// load-factor check, since they still occupy probe chains.
pub struct Table {
    entries: Vec<Slot>,
    count: usize,
}

impl Default for Table {
    fn default() -> Self {
        Table::new()
    }
}

impl Table {
    pub fn new() -> Self {
        Table { entries: Vec::new(), count: 0 }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Locates the slot `key` belongs in: the occupied slot for `key` if
    /// present, otherwise the first tombstone seen on its probe chain, or
    /// else the first empty slot. `key` is compared by pointer identity,
    /// since callers here always hold an already-interned key.
    fn find_slot(entries: &[Slot], capacity: usize, key: &Rc<ObjString>) -> usize {
        let mut index = (key.hash as usize) % capacity;
        let mut tombstone: Option<usize> = None;

        loop {
            match &entries[index] {
                Slot::Empty => return tombstone.unwrap_or(index),
                Slot::Tombstone => {
                    if tombstone.is_none() {
                        tombstone = Some(index);
                    }
                }
                Slot::Occupied(k, _) if Rc::ptr_eq(k, key) => return index,
                Slot::Occupied(..) => {}
            }
            index = (index + 1) % capacity;
        }
    }

    fn grow(&mut self) {
        let new_capacity = if self.capacity() < 8 { 8 } else { self.capacity() * 2 };
        let mut new_entries: Vec<Slot> = (0..new_capacity).map(|_| Slot::Empty).collect();

        let mut live = 0;
        for slot in self.entries.drain(..) {
            if let Slot::Occupied(k, v) = slot {
                let idx = Table::find_slot(&new_entries, new_capacity, &k);
                new_entries[idx] = Slot::Occupied(k, v);
                live += 1;
            }
        }

        self.entries = new_entries;
        self.count = live;
    }

    /// Inserts or overwrites `key`. Returns true iff `key` was not already
    /// present (a brand-new key, not merely reusing a tombstone).
    pub fn set(&mut self, key: Rc<ObjString>, value: Value) -> bool {
        if (self.count + 1) as f64 > self.capacity() as f64 * TABLE_MAX_LOAD {
            self.grow();
        }

        let idx = Table::find_slot(&self.entries, self.capacity(), &key);
        let is_new_key = matches!(self.entries[idx], Slot::Empty);
        if is_new_key {
            self.count += 1;
        }
        self.entries[idx] = Slot::Occupied(key, value);
        is_new_key
    }

    pub fn delete(&mut self, key: &Rc<ObjString>) -> bool {
        if self.is_empty() {
            return false;
        }
        let idx = Table::find_slot(&self.entries, self.capacity(), key);
        if matches!(self.entries[idx], Slot::Occupied(..)) {
            self.entries[idx] = Slot::Tombstone;
            true
        } else {
            false
        }
    }

    pub fn get(&self, key: &Rc<ObjString>) -> Option<&Value> {
        if self.is_empty() {
            return None;
        }
        let idx = Table::find_slot(&self.entries, self.capacity(), key);
        match &self.entries[idx] {
            Slot::Occupied(_, v) => Some(v),
            _ => None,
        }
    }

    /// Canonicalizes `chars` to a single `ObjString`: returns the existing
    /// interned object on a content match, otherwise allocates, interns,
    /// and returns a new one. Callers never need to know which happened;
    /// the intern invariant (equal content => same address) is what lets
    /// the rest of the system treat string equality as pointer equality.
    pub fn intern(&mut self, chars: String) -> Rc<ObjString> {
        let hash = fnv1a(chars.as_bytes());
        if let Some(existing) = self.find_string(&chars, hash) {
            return existing;
        }
        let obj = Rc::new(ObjString { chars, hash });
        self.set(obj.clone(), Value::Nil);
        obj
    }

    /// The intern lookup path: finds an already-interned string by content
    /// rather than by identity, since the caller does not yet hold a
    /// reference to it. Returns the canonical `Rc` on a hit.
    pub fn find_string(&self, chars: &str, hash: u32) -> Option<Rc<ObjString>> {
        if self.is_empty() {
            return None;
        }

        let capacity = self.capacity();
        let mut index = (hash as usize) % capacity;

        loop {
            match &self.entries[index] {
                Slot::Empty => return None,
                Slot::Occupied(k, _) if k.hash == hash && k.chars == chars => return Some(k.clone()),
                _ => {}
            }
            index = (index + 1) % capacity;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interned(s: &str) -> Rc<ObjString> {
        Rc::new(ObjString::new(s.to_string()))
    }

    #[test]
    fn grows_and_tracks_count() {
        let mut table = Table::new();
        for i in 0..20 {
            table.set(interned(&format!("key{}", i)), Value::Number(i as f64));
        }
        assert_eq!(table.len(), 20);
    }

    #[test]
    fn delete_leaves_a_tombstone_but_does_not_break_later_lookups() {
        let mut table = Table::new();
        let a = interned("a");
        let b = interned("b");
        table.set(a.clone(), Value::Nil);
        table.set(b.clone(), Value::Nil);

        assert!(table.delete(&a));
        assert!(table.get(&b).is_some());
    }

    #[test]
    fn find_string_locates_by_content_not_identity() {
        let mut table = Table::new();
        let key = interned("hello");
        table.set(key.clone(), Value::Nil);

        let hash = key.hash;
        let found = table.find_string("hello", hash).expect("should find by content");
        assert!(Rc::ptr_eq(&found, &key));
    }

    #[test]
    fn find_string_on_empty_table_returns_none() {
        let table = Table::new();
        assert!(table.find_string("anything", 0).is_none());
    }

    #[test]
    fn interning_is_idempotent() {
        let mut table = Table::new();
        let a = table.intern("shared".to_string());
        let b = table.intern("shared".to_string());
        assert!(Rc::ptr_eq(&a, &b));
    }
}
