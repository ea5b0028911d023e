//! `FtlState`: the four tables and the OOB area the FTL owns exclusively,
//! bundled so the GC and facade can borrow all of them together inside one
//! region-lock critical section without juggling five separate borrows.

use crate::block_pool::BlockPool;
use crate::clock::Clock;
use crate::config::NkftlConfig;
use crate::data_block_map::DataBlockMap;
use crate::gc_decider::GcDecider;
use crate::geometry::FlashGeometry;
use crate::log_mapping_table::LogMappingTable;
use crate::oob::OobArea;
use crate::translator::{lpn_to_ppn, Location};
use crate::types::{Lpn, Ppn};

pub struct FtlState {
    pub geometry: FlashGeometry,
    pub n_blocks_in_data_group: u32,
    pub n_pages_per_region: u32,
    pub oob: OobArea,
    pub block_pool: BlockPool,
    pub data_map: DataBlockMap,
    pub log_table: LogMappingTable,
    pub gc_decider: GcDecider,
    pub clock: Clock,
}

impl FtlState {
    pub fn new(config: &NkftlConfig) -> Self {
        FtlState {
            geometry: config.geometry,
            n_blocks_in_data_group: config.n_blocks_in_data_group,
            n_pages_per_region: config.n_pages_per_region(),
            oob: OobArea::new(config.geometry),
            block_pool: BlockPool::new(config.geometry),
            data_map: DataBlockMap::new(),
            log_table: LogMappingTable::new(config.geometry, config.max_blocks_in_log_group),
            gc_decider: GcDecider::new(
                config.geometry.blocks_per_dev(),
                config.gc_threshold_ratio,
                config.gc_low_threshold_ratio,
                config.freeze_detector,
            ),
            clock: Clock::new(),
        }
    }

    pub fn lpn_to_ppn(&self, lpn: Lpn) -> Option<(Ppn, Location)> {
        lpn_to_ppn(
            &self.geometry,
            self.n_blocks_in_data_group,
            &self.log_table,
            &self.data_map,
            lpn,
        )
    }

    pub fn is_lpn_live(&self, lpn: Lpn) -> Option<Ppn> {
        let (ppn, _) = self.lpn_to_ppn(lpn)?;
        self.oob.is_page_valid(ppn).then_some(ppn)
    }

    /// Like `lpn_to_ppn`, but filters out mappings whose OOB state is not
    /// `Valid` — the lookup found a mapping, but it's stale.
    pub fn live_location(&self, lpn: Lpn) -> Option<(Ppn, Location)> {
        let (ppn, location) = self.lpn_to_ppn(lpn)?;
        self.oob.is_page_valid(ppn).then_some((ppn, location))
    }

    pub fn region_id_of_lbn(&self, lbn: crate::types::Lbn) -> crate::types::RegionId {
        let lpn = lbn * self.geometry.pages_per_block as u64;
        self.geometry.region_id_of_lpn(lpn, self.n_pages_per_region)
    }

    pub fn used_blocks(&self) -> usize {
        self.block_pool.total_used_blocks()
    }

    /// Self-checks block-count and ownership invariants at a quiescent
    /// boundary; callers invoke this from tests, not from the hot path.
    pub fn check_invariants(&self) -> Result<(), String> {
        use crate::block_pool::BlockTag;

        let total = self.geometry.blocks_per_dev() as usize;
        let counted = self.block_pool.count_blocks(BlockTag::Free, None)
            + self.block_pool.count_blocks(BlockTag::Log, None)
            + self.block_pool.count_blocks(BlockTag::Data, None);
        if counted != total {
            let msg = format!("I3 violated: {counted} != {total}");
            log::error!("{msg}");
            return Err(msg);
        }

        for dgn in self.log_table.data_group_numbers() {
            let Some(group) = self.log_table.group(dgn) else {
                continue;
            };
            for pbn in group.log_block_numbers() {
                if self.block_pool.tag_of(pbn) != BlockTag::Log {
                    let msg = format!("I7 violated: log block {pbn} not tagged Log");
                    log::error!("{msg}");
                    return Err(msg);
                }
            }
        }

        for pbn in self.block_pool.data_used_blocks() {
            if self.data_map.pbn_to_lbn(pbn).is_none() {
                let msg = format!("I4 violated: data block {pbn} has no owning lbn");
                log::error!("{msg}");
                return Err(msg);
            }
        }

        Ok(())
    }
}
