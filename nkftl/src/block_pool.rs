//! Block pool: partitions every device block into {Free, Log, Data}, per
//! channel.

use std::collections::{BTreeSet, HashMap};

use crate::geometry::FlashGeometry;
use crate::types::{ChannelId, Pbn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockTag {
    Free,
    Log,
    Data,
}

/// `BTreeSet` per (channel, tag) gives a deterministic "any free block"
/// pick (lowest PBN first) in O(log n) — a stable, trivially-testable
/// stand-in for FIFO given blocks are never reordered within a tag.
pub struct BlockPool {
    geometry: FlashGeometry,
    tag_of: Vec<BlockTag>,
    by_channel_tag: HashMap<(ChannelId, BlockTag), BTreeSet<Pbn>>,
}

impl BlockPool {
    pub fn new(geometry: FlashGeometry) -> Self {
        let blocks = geometry.blocks_per_dev() as u64;
        let mut by_channel_tag: HashMap<(ChannelId, BlockTag), BTreeSet<Pbn>> = HashMap::new();
        for tag in [BlockTag::Free, BlockTag::Log, BlockTag::Data] {
            for ch in 0..geometry.channels {
                by_channel_tag.insert((ch, tag), BTreeSet::new());
            }
        }
        let mut tag_of = vec![BlockTag::Free; blocks as usize];
        for pbn in 0..blocks {
            let ch = geometry.channel_of_block(pbn);
            by_channel_tag.get_mut(&(ch, BlockTag::Free)).unwrap().insert(pbn);
        }
        // tag_of already all Free by construction
        let _ = &mut tag_of;
        BlockPool {
            geometry,
            tag_of,
            by_channel_tag,
        }
    }

    pub fn tag_of(&self, pbn: Pbn) -> BlockTag {
        self.tag_of[pbn as usize]
    }

    /// Picks any block tagged `tag` in `channel`, without removing it.
    pub fn pick(&self, tag: BlockTag, channel: ChannelId) -> Option<Pbn> {
        self.by_channel_tag.get(&(channel, tag)).and_then(|s| s.iter().next().copied())
    }

    /// Moves `pbn` from `src` to `dst`. Panics if `pbn` is not currently
    /// tagged `src` — a logic bug in the caller, not a recoverable error.
    pub fn change_tag(&mut self, pbn: Pbn, src: BlockTag, dst: BlockTag) {
        assert_eq!(
            self.tag_of[pbn as usize], src,
            "block {pbn} is not tagged {src:?}"
        );
        let ch = self.geometry.channel_of_block(pbn);
        self.by_channel_tag.get_mut(&(ch, src)).unwrap().remove(&pbn);
        self.by_channel_tag.get_mut(&(ch, dst)).unwrap().insert(pbn);
        self.tag_of[pbn as usize] = dst;
    }

    pub fn count_blocks(&self, tag: BlockTag, channels: Option<&[ChannelId]>) -> usize {
        match channels {
            Some(chs) => chs
                .iter()
                .map(|ch| self.by_channel_tag.get(&(*ch, tag)).map_or(0, |s| s.len()))
                .sum(),
            None => (0..self.geometry.channels)
                .map(|ch| self.by_channel_tag.get(&(ch, tag)).map_or(0, |s| s.len()))
                .sum(),
        }
    }

    pub fn pop_free_to_log(&mut self, channel: ChannelId) -> Option<Pbn> {
        let pbn = self.pick(BlockTag::Free, channel)?;
        self.change_tag(pbn, BlockTag::Free, BlockTag::Log);
        Some(pbn)
    }

    pub fn pop_free_to_data(&mut self, channel: ChannelId) -> Option<Pbn> {
        let pbn = self.pick(BlockTag::Free, channel)?;
        self.change_tag(pbn, BlockTag::Free, BlockTag::Data);
        Some(pbn)
    }

    pub fn free_log(&mut self, pbn: Pbn) {
        self.change_tag(pbn, BlockTag::Log, BlockTag::Free);
    }

    pub fn free_data(&mut self, pbn: Pbn) {
        self.change_tag(pbn, BlockTag::Data, BlockTag::Free);
    }

    pub fn log_to_data(&mut self, pbn: Pbn) {
        self.change_tag(pbn, BlockTag::Log, BlockTag::Data);
    }

    pub fn data_used_blocks(&self) -> Vec<Pbn> {
        (0..self.geometry.channels)
            .flat_map(|ch| self.by_channel_tag[&(ch, BlockTag::Data)].iter().copied().collect::<Vec<_>>())
            .collect()
    }

    pub fn log_used_blocks(&self) -> Vec<Pbn> {
        (0..self.geometry.channels)
            .flat_map(|ch| self.by_channel_tag[&(ch, BlockTag::Log)].iter().copied().collect::<Vec<_>>())
            .collect()
    }

    pub fn total_used_blocks(&self) -> usize {
        self.geometry.blocks_per_dev() as usize - self.count_blocks(BlockTag::Free, None)
    }

    pub fn used_ratio(&self) -> f64 {
        self.total_used_blocks() as f64 / self.geometry.blocks_per_dev() as f64
    }
}
