//! Flash geometry and the address-translation arithmetic derived from it.

use serde::{Deserialize, Serialize};

use crate::types::{ChannelId, Dgn, Lbn, Lpn, Pbn, Ppn, RegionId};

/// Device geometry: pages per block, blocks per channel, and channel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashGeometry {
    pub pages_per_block: u32,
    pub blocks_per_channel: u32,
    pub channels: u32,
}

impl FlashGeometry {
    pub fn new(pages_per_block: u32, blocks_per_channel: u32, channels: u32) -> Self {
        FlashGeometry {
            pages_per_block,
            blocks_per_channel,
            channels,
        }
    }

    pub fn blocks_per_dev(&self) -> u32 {
        self.blocks_per_channel * self.channels
    }

    pub fn pages_per_dev(&self) -> u64 {
        self.pages_per_block as u64 * self.blocks_per_dev() as u64
    }

    /// `page_to_block_off(x) = (x/P, x mod P)`
    pub fn page_to_block_off(&self, ppn: Ppn) -> (Pbn, u32) {
        let p = self.pages_per_block as u64;
        ((ppn / p) as Pbn, (ppn % p) as u32)
    }

    /// `block_off_to_page(b,o) = b*P+o`
    pub fn block_off_to_page(&self, pbn: Pbn, off: u32) -> Ppn {
        pbn * self.pages_per_block as u64 + off as u64
    }

    /// Channel owning a block: blocks are laid out contiguously per
    /// channel.
    pub fn channel_of_block(&self, pbn: Pbn) -> ChannelId {
        (pbn / self.blocks_per_channel as u64) as ChannelId
    }

    /// `dgn(lpn) = (lpn/P)/N`
    pub fn dgn_of_lpn(&self, lpn: Lpn, n_blocks_in_data_group: u32) -> Dgn {
        let lbn = lpn / self.pages_per_block as u64;
        lbn / n_blocks_in_data_group as u64
    }

    /// Data-group number of a logical block number.
    pub fn dgn_of_lbn(&self, lbn: Lbn, n_blocks_in_data_group: u32) -> Dgn {
        lbn / n_blocks_in_data_group as u64
    }

    /// `region_id(lpn) = lpn/R`
    pub fn region_id_of_lpn(&self, lpn: Lpn, pages_per_region: u32) -> RegionId {
        lpn / pages_per_region as u64
    }

    pub fn block_to_page_range(&self, pbn: Pbn) -> (Ppn, Ppn) {
        let start = self.block_off_to_page(pbn, 0);
        (start, start + self.pages_per_block as u64)
    }
}
