//! Translator: unified LPN -> (PPN, location) lookup across the log
//! mapping table and the data-block mapping table.
//!
//! Kept as a free function rather than a struct owning both tables: the
//! garbage collector and FTL facade each hold the two tables inside a
//! single owning struct (`state.rs`) and need to borrow them independently
//! and mutably elsewhere in the same call, which a `Translator` holding
//! `&` references to both would make awkward under the borrow checker.

use crate::data_block_map::DataBlockMap;
use crate::geometry::FlashGeometry;
use crate::log_mapping_table::LogMappingTable;
use crate::types::{Lpn, Ppn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    LogBlock,
    DataBlock,
}

/// Consults the log mapping first; only on a miss does it fall through to
/// the data-block map. "Found" only means a mapping exists — callers must
/// separately check OOB validity of the returned PPN.
pub fn lpn_to_ppn(
    geometry: &FlashGeometry,
    n_blocks_in_data_group: u32,
    log_table: &LogMappingTable,
    data_map: &DataBlockMap,
    lpn: Lpn,
) -> Option<(Ppn, Location)> {
    let dgn = geometry.dgn_of_lpn(lpn, n_blocks_in_data_group);
    if let Some(ppn) = log_table.lpn_to_ppn(dgn, lpn) {
        return Some((ppn, Location::LogBlock));
    }
    let (lbn, off) = geometry.page_to_block_off(lpn);
    let pbn = data_map.lbn_to_pbn(lbn)?;
    Some((geometry.block_off_to_page(pbn, off), Location::DataBlock))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_pool::BlockPool;
    use crate::config::StripeUnit;

    fn geo() -> FlashGeometry {
        FlashGeometry::new(4, 4, 2)
    }

    #[test]
    fn log_mapping_takes_priority_over_data_mapping() {
        let geometry = geo();
        let mut pool = BlockPool::new(geometry);
        let mut log_table = LogMappingTable::new(geometry, 2);
        let mut data_map = DataBlockMap::new();

        data_map.add(0, 5); // lbn 0 -> pbn 5, data block
        let ppns = log_table.next_ppns(0, 1, StripeUnit::Infinity, &mut pool, 1);
        log_table.add_mapping(0, 0, ppns[0]);

        let result = lpn_to_ppn(&geometry, 4, &log_table, &data_map, 0);
        assert_eq!(result, Some((ppns[0], Location::LogBlock)));
    }

    #[test]
    fn falls_through_to_data_map_on_log_miss() {
        let geometry = geo();
        let log_table = LogMappingTable::new(geometry, 2);
        let mut data_map = DataBlockMap::new();
        data_map.add(0, 5);

        // lpn 1, lbn 0 offset 1 -> pbn 5 offset 1
        let result = lpn_to_ppn(&geometry, 4, &log_table, &data_map, 1);
        assert_eq!(result, Some((geometry.block_off_to_page(5, 1), Location::DataBlock)));
    }

    #[test]
    fn miss_when_neither_table_has_it() {
        let geometry = geo();
        let log_table = LogMappingTable::new(geometry, 2);
        let data_map = DataBlockMap::new();
        assert_eq!(lpn_to_ppn(&geometry, 4, &log_table, &data_map, 0), None);
    }
}
