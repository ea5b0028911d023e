//! Victim iterators: priority-ordered candidate blocks for GC.
//!
//! Built as pre-computed `Vec`s at construction time rather than literal
//! lazy iterators — the priority queue only needs rebuilding at iterator
//! construction, since a merge only ever removes blocks from it, so a `Vec`
//! snapshot already satisfies that and sidesteps borrowing
//! `BlockPool`/`OobArea`/`LogMappingTable` across the whole GC pass.

use crate::block_pool::BlockPool;
use crate::log_mapping_table::LogMappingTable;
use crate::oob::OobArea;
use crate::types::{Dgn, Pbn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VictimKind {
    Data,
    Log,
}

#[derive(Debug, Clone, Copy)]
pub struct VictimInfo {
    pub pbn: Pbn,
    pub kind: VictimKind,
    pub valid_ratio: f64,
    /// Only meaningful for `VictimKind::Log`.
    pub last_used: u64,
    /// Owning data group; only meaningful for `VictimKind::Log`.
    pub dgn: Option<Dgn>,
}

/// Every Data-tagged block with zero valid pages — reclaimable by pure
/// erase, no I/O, so always drained before `VictimLogBlocks`.
pub fn data_victims(block_pool: &BlockPool, oob: &OobArea) -> Vec<VictimInfo> {
    block_pool
        .data_used_blocks()
        .into_iter()
        .filter(|&pbn| !oob.is_any_page_valid(pbn))
        .map(|pbn| VictimInfo {
            pbn,
            kind: VictimKind::Data,
            valid_ratio: 0.0,
            last_used: 0,
            dgn: None,
        })
        .collect()
}

/// Every current log block across every group, ordered by last-used time
/// ascending. Any stable total order is acceptable here provided it does
/// not starve any group.
pub fn log_victims(log_table: &LogMappingTable, oob: &OobArea) -> Vec<VictimInfo> {
    let mut out = Vec::new();
    for dgn in log_table.data_group_numbers() {
        let group = match log_table.group(dgn) {
            Some(g) => g,
            None => continue,
        };
        for block in group.cur_blocks() {
            out.push(VictimInfo {
                pbn: block.pbn,
                kind: VictimKind::Log,
                valid_ratio: oob.block_valid_ratio(block.pbn),
                last_used: block.last_used,
                dgn: Some(dgn),
            });
        }
    }
    out.sort_by(|a, b| a.last_used.cmp(&b.last_used).then(a.pbn.cmp(&b.pbn)));
    out
}

/// Data victims first, then log victims — draining pure-erase reclaims
/// before any merge work, the order `try_gc` walks them in.
pub fn victim_iter(block_pool: &BlockPool, log_table: &LogMappingTable, oob: &OobArea) -> Vec<VictimInfo> {
    let mut out = data_victims(block_pool, oob);
    out.extend(log_victims(log_table, oob));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StripeUnit;
    use crate::geometry::FlashGeometry;

    fn geo() -> FlashGeometry {
        FlashGeometry::new(4, 4, 2)
    }

    #[test]
    fn empty_data_blocks_are_victims() {
        let geometry = geo();
        let mut pool = BlockPool::new(geometry);
        let oob = OobArea::new(geometry);
        let pbn = pool.pop_free_to_data(0).unwrap();
        let victims = data_victims(&pool, &oob);
        assert_eq!(victims.len(), 1);
        assert_eq!(victims[0].pbn, pbn);
    }

    #[test]
    fn data_blocks_with_valid_pages_are_not_victims() {
        let geometry = geo();
        let mut pool = BlockPool::new(geometry);
        let mut oob = OobArea::new(geometry);
        let pbn = pool.pop_free_to_data(0).unwrap();
        oob.remap(0, None, geometry.block_off_to_page(pbn, 0));
        assert!(data_victims(&pool, &oob).is_empty());
    }

    #[test]
    fn log_victims_ordered_by_last_used_ascending() {
        let geometry = geo();
        let mut pool = BlockPool::new(geometry);
        let oob = OobArea::new(geometry);
        let mut log_table = LogMappingTable::new(geometry, 4);
        log_table.next_ppns(0, 1, StripeUnit::Infinity, &mut pool, 10);
        log_table.next_ppns(1, 1, StripeUnit::Infinity, &mut pool, 5);

        let victims = log_victims(&log_table, &oob);
        assert_eq!(victims.len(), 2);
        assert!(victims[0].last_used <= victims[1].last_used);
    }
}
