//! Data-block mapping table: a partial bijection LBN<->PBN.
//!
//! Maintained as a pair of mutually consistent `HashMap`s with paired
//! updates rather than one directional map with a linear reverse search.

use std::collections::HashMap;

use crate::types::{Lbn, Pbn};

#[derive(Debug, Default)]
pub struct DataBlockMap {
    lbn_to_pbn: HashMap<Lbn, Pbn>,
    pbn_to_lbn: HashMap<Pbn, Lbn>,
}

impl DataBlockMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lbn_to_pbn(&self, lbn: Lbn) -> Option<Pbn> {
        self.lbn_to_pbn.get(&lbn).copied()
    }

    pub fn pbn_to_lbn(&self, pbn: Pbn) -> Option<Lbn> {
        self.pbn_to_lbn.get(&pbn).copied()
    }

    /// Overrides any existing mapping for `lbn` (or `pbn`). The caller is
    /// responsible for reclaiming whichever block this displaces.
    pub fn add(&mut self, lbn: Lbn, pbn: Pbn) {
        if let Some(old_pbn) = self.lbn_to_pbn.insert(lbn, pbn) {
            self.pbn_to_lbn.remove(&old_pbn);
        }
        if let Some(old_lbn) = self.pbn_to_lbn.insert(pbn, lbn) {
            self.lbn_to_pbn.remove(&old_lbn);
        }
        self.lbn_to_pbn.insert(lbn, pbn);
        self.pbn_to_lbn.insert(pbn, lbn);
    }

    pub fn remove_by_lbn(&mut self, lbn: Lbn) -> Option<Pbn> {
        let pbn = self.lbn_to_pbn.remove(&lbn)?;
        self.pbn_to_lbn.remove(&pbn);
        Some(pbn)
    }

    pub fn remove_by_pbn(&mut self, pbn: Pbn) -> Option<Lbn> {
        let lbn = self.pbn_to_lbn.remove(&pbn)?;
        self.lbn_to_pbn.remove(&lbn);
        Some(lbn)
    }

    pub fn len(&self) -> usize {
        self.lbn_to_pbn.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lbn_to_pbn.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_look_up_both_directions() {
        let mut map = DataBlockMap::new();
        map.add(1, 10);
        assert_eq!(map.lbn_to_pbn(1), Some(10));
        assert_eq!(map.pbn_to_lbn(10), Some(1));
    }

    #[test]
    fn re_adding_lbn_overrides_and_drops_displaced_pbn_entry() {
        let mut map = DataBlockMap::new();
        map.add(1, 10);
        map.add(1, 20);
        assert_eq!(map.lbn_to_pbn(1), Some(20));
        assert_eq!(map.pbn_to_lbn(20), Some(1));
        // the old pbn's reverse entry must not linger
        assert_eq!(map.pbn_to_lbn(10), None);
    }

    #[test]
    fn remove_by_either_key_clears_both_directions() {
        let mut map = DataBlockMap::new();
        map.add(1, 10);
        map.add(2, 20);
        assert_eq!(map.remove_by_lbn(1), Some(10));
        assert_eq!(map.pbn_to_lbn(10), None);
        assert_eq!(map.remove_by_pbn(20), Some(2));
        assert_eq!(map.lbn_to_pbn(2), None);
        assert!(map.is_empty());
    }
}
