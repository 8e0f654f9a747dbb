//! Immutable-after-load name -> IPv4 table

use crate::error::TableError;
use crate::name;
use rustc_hash::FxHasher;
use std::hash::{Hash, Hasher};
use std::net::Ipv4Addr;

pub const DEFAULT_BUCKETS: usize = 1024;

struct Entry {
    name: Box<str>,
    addr: Ipv4Addr,
}

/// Fixed-size chained hash table. Built once, then only read; a reload
/// builds a whole new table and swaps it in.
pub struct NameTable {
    buckets: Vec<Vec<Entry>>,
    len: usize,
}

impl Default for NameTable {
    fn default() -> Self {
        Self::new()
    }
}

impl NameTable {
    pub fn new() -> Self {
        Self::with_buckets(DEFAULT_BUCKETS)
    }

    pub fn with_buckets(count: usize) -> Self {
        let count = count.max(1);
        Self { buckets: (0..count).map(|_| Vec::new()).collect(), len: 0 }
    }

    fn bucket_of(&self, name: &str) -> usize {
        let mut hasher = FxHasher::default();
        name.hash(&mut hasher);
        (hasher.finish() % self.buckets.len() as u64) as usize
    }

    /// Inserts a validated name. The first insertion of a name wins; later
    /// ones are reported as `Duplicate` and leave the table unchanged.
    pub fn insert(&mut self, name: &str, addr: Ipv4Addr) -> Result<(), TableError> {
        if !name::is_valid(name) {
            return Err(TableError::InvalidName(name.to_string()));
        }
        let idx = self.bucket_of(name);
        let chain = &mut self.buckets[idx];
        if chain.iter().any(|e| &*e.name == name) {
            return Err(TableError::Duplicate(name.to_string()));
        }
        chain.push(Entry { name: name.into(), addr });
        self.len += 1;
        Ok(())
    }

    /// Exact, case-sensitive match.
    pub fn lookup(&self, name: &str) -> Option<Ipv4Addr> {
        self.buckets[self.bucket_of(name)]
            .iter()
            .find(|e| &*e.name == name)
            .map(|e| e.addr)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn longest_chain(&self) -> usize {
        self.buckets.iter().map(Vec::len).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_thousand_names_resolve_to_their_own_address() {
        let mut table = NameTable::new();
        for i in 0..2000u32 {
            let name = format!("host-{}.example.lan", i);
            table.insert(&name, Ipv4Addr::from(0x0A00_0000 + i)).unwrap();
        }
        assert_eq!(table.len(), 2000);
        assert!(table.longest_chain() > 1);
        for i in 0..2000u32 {
            let name = format!("host-{}.example.lan", i);
            assert_eq!(table.lookup(&name), Some(Ipv4Addr::from(0x0A00_0000 + i)));
        }
    }

    #[test]
    fn single_bucket_still_separates_keys() {
        let mut table = NameTable::with_buckets(1);
        table.insert("a.lan", Ipv4Addr::new(1, 1, 1, 1)).unwrap();
        table.insert("b.lan", Ipv4Addr::new(2, 2, 2, 2)).unwrap();
        assert_eq!(table.lookup("a.lan"), Some(Ipv4Addr::new(1, 1, 1, 1)));
        assert_eq!(table.lookup("b.lan"), Some(Ipv4Addr::new(2, 2, 2, 2)));
        assert_eq!(table.longest_chain(), 2);
    }

    #[test]
    fn lookup_is_exact_and_case_sensitive() {
        let mut table = NameTable::new();
        table.insert("Printer.lan", Ipv4Addr::new(192, 168, 1, 9)).unwrap();
        assert_eq!(table.lookup("printer.lan"), None);
        assert_eq!(table.lookup("Printer.lan."), None);
        assert_eq!(table.lookup("Printer"), None);
        assert!(table.lookup("Printer.lan").is_some());
    }

    #[test]
    fn first_insert_wins_on_duplicate() {
        let mut table = NameTable::new();
        table.insert("nas.lan", Ipv4Addr::new(10, 0, 0, 1)).unwrap();
        let err = table.insert("nas.lan", Ipv4Addr::new(10, 0, 0, 2)).unwrap_err();
        assert_eq!(err, TableError::Duplicate("nas.lan".into()));
        assert_eq!(table.lookup("nas.lan"), Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn invalid_names_are_not_inserted() {
        let mut table = NameTable::new();
        assert!(matches!(table.insert("bad_name", Ipv4Addr::LOCALHOST), Err(TableError::InvalidName(_))));
        assert!(matches!(table.insert("", Ipv4Addr::LOCALHOST), Err(TableError::InvalidName(_))));
        assert!(table.is_empty());
    }
}
