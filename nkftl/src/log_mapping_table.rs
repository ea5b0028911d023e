//! Log mapping table: dgn -> `LogGroup`, created lazily on first write into
//! a data group's log area.

use std::collections::HashMap;

use crate::config::StripeUnit;
use crate::block_pool::BlockPool;
use crate::geometry::FlashGeometry;
use crate::log_group::LogGroup;
use crate::types::{Dgn, Lpn, Pbn, Ppn};

pub struct LogMappingTable {
    geometry: FlashGeometry,
    max_n_log_blocks: u32,
    groups: HashMap<Dgn, LogGroup>,
}

impl LogMappingTable {
    pub fn new(geometry: FlashGeometry, max_n_log_blocks: u32) -> Self {
        LogMappingTable {
            geometry,
            max_n_log_blocks,
            groups: HashMap::new(),
        }
    }

    pub fn group(&self, dgn: Dgn) -> Option<&LogGroup> {
        self.groups.get(&dgn)
    }

    fn group_mut_or_create(&mut self, dgn: Dgn) -> &mut LogGroup {
        self.groups
            .entry(dgn)
            .or_insert_with(|| LogGroup::new(self.geometry, self.max_n_log_blocks))
    }

    pub fn has_group(&self, dgn: Dgn) -> bool {
        self.groups.contains_key(&dgn)
    }

    pub fn lpn_to_ppn(&self, dgn: Dgn, lpn: Lpn) -> Option<Ppn> {
        self.groups.get(&dgn)?.lpn_to_ppn(lpn)
    }

    pub fn add_mapping(&mut self, dgn: Dgn, lpn: Lpn, ppn: Ppn) {
        self.group_mut_or_create(dgn).add_mapping(lpn, ppn);
    }

    pub fn remove_lpn(&mut self, dgn: Dgn, lpn: Lpn) {
        if let Some(group) = self.groups.get_mut(&dgn) {
            group.remove_lpn(lpn);
        }
    }

    pub fn next_ppns(
        &mut self,
        dgn: Dgn,
        n: u32,
        stripe_unit: StripeUnit,
        block_pool: &mut BlockPool,
        tick: u64,
    ) -> Vec<Ppn> {
        self.group_mut_or_create(dgn).next_ppns(n, stripe_unit, block_pool, tick)
    }

    /// Drops `log_pbn` from `dgn`'s group, and drops the whole group once
    /// its log blocks are all gone — a merge leaves no partially-merged
    /// residue behind.
    pub fn remove_log_block(&mut self, dgn: Dgn, log_pbn: Pbn) {
        if let Some(group) = self.groups.get_mut(&dgn) {
            group.remove_log_block(log_pbn);
            if group.n_log_blocks() == 0 {
                self.clear_data_group_info(dgn);
            }
        }
    }

    pub fn clear_data_group_info(&mut self, dgn: Dgn) {
        self.groups.remove(&dgn);
    }

    pub fn n_log_blocks(&self, dgn: Dgn) -> u32 {
        self.groups.get(&dgn).map_or(0, |g| g.n_log_blocks())
    }

    pub fn data_group_numbers(&self) -> Vec<Dgn> {
        self.groups.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geo() -> FlashGeometry {
        FlashGeometry::new(4, 4, 2)
    }

    #[test]
    fn group_created_lazily_on_first_write() {
        let geometry = geo();
        let mut pool = BlockPool::new(geometry);
        let mut table = LogMappingTable::new(geometry, 2);
        assert!(!table.has_group(5));
        table.next_ppns(5, 1, StripeUnit::Infinity, &mut pool, 1);
        assert!(table.has_group(5));
    }

    #[test]
    fn clear_data_group_info_drops_group() {
        let geometry = geo();
        let mut pool = BlockPool::new(geometry);
        let mut table = LogMappingTable::new(geometry, 2);
        table.next_ppns(5, 1, StripeUnit::Infinity, &mut pool, 1);
        table.clear_data_group_info(5);
        assert!(!table.has_group(5));
        assert_eq!(table.n_log_blocks(5), 0);
    }
}
