//! Out-of-band area: per-page state bitmap plus the PPN->LPN reverse map.
//!
//! Kept as two separate maps (the bitmap `Vec<PageState>` and the
//! `HashMap<Ppn, Lpn>` reverse map) rather than one struct-of-entries — a
//! page's state and its reverse mapping are independent facts with
//! independent lifetimes (the reverse entry survives invalidation and is
//! only dropped at erase).

use std::collections::HashMap;
use std::fmt;

use crate::geometry::FlashGeometry;
use crate::types::{Lpn, Pbn, Ppn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Erased,
    Valid,
    Invalid,
}

impl PageState {
    fn human(&self) -> char {
        match self {
            PageState::Erased => 'E',
            PageState::Valid => 'V',
            PageState::Invalid => 'I',
        }
    }
}

pub struct OobArea {
    geometry: FlashGeometry,
    states: Vec<PageState>,
    ppn_to_lpn: HashMap<Ppn, Lpn>,
}

impl OobArea {
    pub fn new(geometry: FlashGeometry) -> Self {
        let total = geometry.pages_per_dev() as usize;
        OobArea {
            geometry,
            states: vec![PageState::Erased; total],
            ppn_to_lpn: HashMap::new(),
        }
    }

    pub fn is_page_erased(&self, ppn: Ppn) -> bool {
        self.states[ppn as usize] == PageState::Erased
    }

    pub fn is_page_valid(&self, ppn: Ppn) -> bool {
        self.states[ppn as usize] == PageState::Valid
    }

    pub fn is_page_invalid(&self, ppn: Ppn) -> bool {
        self.states[ppn as usize] == PageState::Invalid
    }

    /// `None` means the page has never held a valid mapping.
    pub fn lpn_of_ppn(&self, ppn: Ppn) -> Option<Lpn> {
        self.ppn_to_lpn.get(&ppn).copied()
    }

    /// Marks `new_ppn` Valid, records its reverse mapping, and — if
    /// `old_ppn` is set — marks it Invalid. The reverse entry for
    /// `old_ppn` is *not* deleted here; that happens at `erase_block`.
    pub fn remap(&mut self, lpn: Lpn, old_ppn: Option<Ppn>, new_ppn: Ppn) {
        self.states[new_ppn as usize] = PageState::Valid;
        self.ppn_to_lpn.insert(new_ppn, lpn);
        if let Some(old) = old_ppn {
            self.states[old as usize] = PageState::Invalid;
        }
    }

    pub fn wipe_ppn(&mut self, ppn: Ppn) {
        self.states[ppn as usize] = PageState::Invalid;
    }

    pub fn erase_block(&mut self, pbn: Pbn) {
        let (start, end) = self.geometry.block_to_page_range(pbn);
        for ppn in start..end {
            self.states[ppn as usize] = PageState::Erased;
            self.ppn_to_lpn.remove(&ppn);
        }
    }

    pub fn is_any_page_valid(&self, pbn: Pbn) -> bool {
        let (start, end) = self.geometry.block_to_page_range(pbn);
        (start..end).any(|ppn| self.is_page_valid(ppn))
    }

    pub fn block_valid_ratio(&self, pbn: Pbn) -> f64 {
        let (start, end) = self.geometry.block_to_page_range(pbn);
        let n = (end - start) as f64;
        let valid = (start..end).filter(|&ppn| self.is_page_valid(ppn)).count() as f64;
        valid / n
    }

    pub fn lpns_of_block(&self, pbn: Pbn) -> Vec<Option<Lpn>> {
        let (start, end) = self.geometry.block_to_page_range(pbn);
        (start..end).map(|ppn| self.lpn_of_ppn(ppn)).collect()
    }

    /// A human-readable dump of the bitmap grouped by block, for test
    /// failure output.
    pub fn fmt_bitmap(&self) -> String {
        let mut line = String::new();
        let blocks = self.geometry.blocks_per_dev();
        for pbn in 0..blocks as u64 {
            let (start, end) = self.geometry.block_to_page_range(pbn);
            line.push(' ');
            line.push_str(&pbn.to_string());
            line.push(':');
            for ppn in start..end {
                line.push(self.states[ppn as usize].human());
                line.push('|');
            }
        }
        line
    }
}

impl fmt::Debug for OobArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OobArea").field("bitmap", &self.fmt_bitmap()).finish()
    }
}
