//! Log Group: per-data-group set of log blocks plus the LPN->PPN page map,
//! with a channel-striping page allocator.

use std::collections::HashMap;

use crate::block_pool::{BlockPool, BlockTag};
use crate::config::StripeUnit;
use crate::geometry::FlashGeometry;
use crate::types::{ChannelId, Lpn, Pbn, Ppn};

/// A log block currently accepting writes: tracks the next free in-block
/// offset and when it was last written to (for victim ordering).
#[derive(Debug, Clone)]
pub struct CurrentBlock {
    pub pbn: Pbn,
    next_offset: u32,
    pages_per_block: u32,
    pub last_used: u64,
}

impl CurrentBlock {
    fn new(pbn: Pbn, pages_per_block: u32, last_used: u64) -> Self {
        CurrentBlock {
            pbn,
            next_offset: 0,
            pages_per_block,
            last_used,
        }
    }

    pub fn num_free_pages(&self) -> u32 {
        self.pages_per_block - self.next_offset
    }

    /// Consumes up to `n` free offsets in ascending order (NAND's
    /// sequential-program constraint), returning the PPNs allocated.
    fn next_ppns(&mut self, n: u32, geometry: &FlashGeometry, tick: u64) -> Vec<Ppn> {
        let take = n.min(self.num_free_pages());
        let mut out = Vec::with_capacity(take as usize);
        for _ in 0..take {
            out.push(geometry.block_off_to_page(self.pbn, self.next_offset));
            self.next_offset += 1;
        }
        if take > 0 {
            self.last_used = tick;
        }
        out
    }
}

pub struct LogGroup {
    geometry: FlashGeometry,
    max_n_log_blocks: u32,
    /// Per-channel lists of current blocks.
    channels: Vec<Vec<CurrentBlock>>,
    cur_channel: ChannelId,
    /// LPN -> PPN, paired with a PPN -> LPN reverse map kept in lockstep so
    /// either direction can be looked up or removed in O(1).
    page_map: HashMap<Lpn, Ppn>,
    reverse_map: HashMap<Ppn, Lpn>,
}

impl LogGroup {
    pub fn new(geometry: FlashGeometry, max_n_log_blocks: u32) -> Self {
        LogGroup {
            channels: vec![Vec::new(); geometry.channels as usize],
            geometry,
            max_n_log_blocks,
            cur_channel: 0,
            page_map: HashMap::new(),
            reverse_map: HashMap::new(),
        }
    }

    pub fn lpn_to_ppn(&self, lpn: Lpn) -> Option<Ppn> {
        self.page_map.get(&lpn).copied()
    }

    /// Overwrites any prior mapping for `lpn`. `ppn`'s block must be one of
    /// this group's current blocks.
    pub fn add_mapping(&mut self, lpn: Lpn, ppn: Ppn) {
        debug_assert!(
            self.log_block_numbers().contains(&self.geometry.page_to_block_off(ppn).0),
            "ppn {ppn} is not inside a current block of this log group"
        );
        if let Some(old_ppn) = self.page_map.insert(lpn, ppn) {
            self.reverse_map.remove(&old_ppn);
        }
        self.reverse_map.insert(ppn, lpn);
    }

    pub fn remove_lpn(&mut self, lpn: Lpn) {
        if let Some(ppn) = self.page_map.remove(&lpn) {
            self.reverse_map.remove(&ppn);
        }
    }

    pub fn cur_blocks(&self) -> Vec<&CurrentBlock> {
        self.channels.iter().flatten().collect()
    }

    pub fn log_block_numbers(&self) -> Vec<Pbn> {
        self.cur_blocks().iter().map(|b| b.pbn).collect()
    }

    pub fn n_log_blocks(&self) -> u32 {
        self.channels.iter().map(|c| c.len() as u32).sum()
    }

    pub fn reached_max_log_blocks(&self) -> bool {
        self.n_log_blocks() >= self.max_n_log_blocks
    }

    /// Removes every LPN whose PPN lies inside `log_pbn`'s page range from
    /// the map, and drops `log_pbn` from its channel's current-block list.
    pub fn remove_log_block(&mut self, log_pbn: Pbn) {
        let (start, end) = self.geometry.block_to_page_range(log_pbn);
        for ppn in start..end {
            if let Some(lpn) = self.reverse_map.remove(&ppn) {
                self.page_map.remove(&lpn);
            }
        }
        let ch = self.geometry.channel_of_block(log_pbn) as usize;
        self.channels[ch].retain(|b| b.pbn != log_pbn);
    }

    fn allocate_block_in_channel(&mut self, channel: ChannelId, block_pool: &mut BlockPool, tick: u64) -> bool {
        if self.reached_max_log_blocks() {
            return false;
        }
        match block_pool.pick(BlockTag::Free, channel) {
            Some(pbn) => {
                block_pool.change_tag(pbn, BlockTag::Free, BlockTag::Log);
                self.channels[channel as usize].push(CurrentBlock::new(
                    pbn,
                    self.geometry.pages_per_block,
                    tick,
                ));
                true
            }
            None => false,
        }
    }

    fn next_ppns_in_channel(&mut self, n: u32, channel: ChannelId, tick: u64) -> Vec<Ppn> {
        let mut remaining = n;
        let mut out = Vec::new();
        for block in self.channels[channel as usize].iter_mut() {
            if remaining == 0 {
                break;
            }
            let got = block.next_ppns(remaining, &self.geometry, tick);
            remaining -= got.len() as u32;
            out.extend(got);
        }
        out
    }

    fn next_ppns_in_channel_with_allocation(
        &mut self,
        reqsize: u32,
        channel: ChannelId,
        block_pool: &mut BlockPool,
        tick: u64,
    ) -> Vec<Ppn> {
        let mut remaining = reqsize;
        let mut out = Vec::new();
        while remaining > 0 {
            let got = self.next_ppns_in_channel(remaining, channel, tick);
            remaining -= got.len() as u32;
            out.extend(got);
            if remaining > 0 && !self.allocate_block_in_channel(channel, block_pool, tick) {
                break;
            }
        }
        out
    }

    /// Best-effort allocation of `n` pages, striped across channels. May
    /// return fewer than `n` pages if every channel goes "dead" (out of
    /// free blocks, or the group is at its `K`-block cap); the caller
    /// interprets a short return as a cue to trigger GC.
    pub fn next_ppns(
        &mut self,
        n: u32,
        stripe_unit: StripeUnit,
        block_pool: &mut BlockPool,
        tick: u64,
    ) -> Vec<Ppn> {
        let n_channels = self.geometry.channels;
        let mut remaining = n;
        let mut out = Vec::new();
        let mut dead_channels = std::collections::HashSet::new();

        while remaining > 0 && (dead_channels.len() as u32) < n_channels {
            let channel = self.cur_channel;
            self.cur_channel = (self.cur_channel + 1) % n_channels;

            let reqsize = stripe_unit.remaining_for_request(remaining);
            let got = self.next_ppns_in_channel_with_allocation(reqsize, channel, block_pool, tick);
            let got_len = got.len() as u32;
            remaining -= got_len;
            out.extend(got);
            if got_len < reqsize {
                dead_channels.insert(channel);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geo() -> FlashGeometry {
        FlashGeometry::new(4, 4, 2)
    }

    #[test]
    fn allocates_and_stripes_across_channels() {
        let geometry = geo();
        let mut pool = BlockPool::new(geometry);
        let mut group = LogGroup::new(geometry, 2);

        let ppns = group.next_ppns(4, StripeUnit::Pages(1), &mut pool, 1);
        assert_eq!(ppns.len(), 4);
        // round-robin with stripe unit 1: channels alternate every page
        let chans: Vec<_> = ppns.iter().map(|p| geometry.channel_of_block(geometry.page_to_block_off(*p).0)).collect();
        assert_eq!(chans, vec![0, 1, 0, 1]);
    }

    #[test]
    fn stops_short_when_k_exhausted() {
        let geometry = FlashGeometry::new(2, 2, 1);
        let mut pool = BlockPool::new(geometry);
        let mut group = LogGroup::new(geometry, 1); // K=1: only one block ever
        // block has 2 pages; ask for 5
        let ppns = group.next_ppns(5, StripeUnit::Infinity, &mut pool, 1);
        assert_eq!(ppns.len(), 2);
        assert_eq!(group.n_log_blocks(), 1);
    }

    #[test]
    fn remove_log_block_drops_its_mappings() {
        let geometry = geo();
        let mut pool = BlockPool::new(geometry);
        let mut group = LogGroup::new(geometry, 2);
        let ppns = group.next_ppns(2, StripeUnit::Infinity, &mut pool, 1);
        group.add_mapping(100, ppns[0]);
        let pbn = geometry.page_to_block_off(ppns[0]).0;
        group.remove_log_block(pbn);
        assert_eq!(group.lpn_to_ppn(100), None);
        assert!(!group.log_block_numbers().contains(&pbn));
    }

    #[test]
    fn add_mapping_overwrites_prior_entry() {
        let geometry = geo();
        let mut pool = BlockPool::new(geometry);
        let mut group = LogGroup::new(geometry, 2);
        let ppns = group.next_ppns(2, StripeUnit::Infinity, &mut pool, 1);
        group.add_mapping(1, ppns[0]);
        group.add_mapping(1, ppns[1]);
        assert_eq!(group.lpn_to_ppn(1), Some(ppns[1]));
    }
}
