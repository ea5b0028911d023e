//! Garbage Collector: merge classification and the switch/partial/full
//! merge algorithms.

use std::cell::RefCell;
use std::rc::Rc;

use crate::block_pool::BlockTag;
use crate::error::{FtlError, FtlResult};
use crate::flash::FlashDevice;
use crate::recorder::Recorder;
use crate::region_lock::RegionLockPool;
use crate::state::FtlState;
use crate::tag::{RwOp, Tag};
use crate::translator::Location;
use crate::types::{Dgn, Lbn, Pbn};
use crate::victims::{victim_iter, VictimKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Empty,
    Switch { lbn: Lbn },
    Partial { lbn: Lbn, k: u32 },
    Full,
}

/// Classifies a log block from its OOB state alone. Reads only; never
/// mutates anything, so it is safe to call without holding a region lock
/// — callers that act on the result re-check it after acquiring one, since
/// another task may have mutated the block in the meantime.
pub fn classify_log_block(
    geometry: &crate::geometry::FlashGeometry,
    oob: &crate::oob::OobArea,
    pbn: Pbn,
) -> Classification {
    if !oob.is_any_page_valid(pbn) {
        return Classification::Empty;
    }

    let (start, _) = geometry.block_to_page_range(pbn);
    let p = geometry.pages_per_block;

    let mut switch_lbn: Option<Lbn> = None;
    let mut is_switch = true;
    for off in 0..p {
        let ppn = start + off as u64;
        if !oob.is_page_valid(ppn) {
            is_switch = false;
            break;
        }
        let aligned = match oob.lpn_of_ppn(ppn).map(|lpn| geometry.page_to_block_off(lpn)) {
            Some((lbn, o)) if o == off => Some(lbn),
            _ => None,
        };
        match (aligned, switch_lbn) {
            (Some(lbn), None) => switch_lbn = Some(lbn),
            (Some(lbn), Some(prev)) if lbn == prev => {}
            _ => {
                is_switch = false;
                break;
            }
        }
    }
    if is_switch {
        return Classification::Switch {
            lbn: switch_lbn.expect("switch classification requires at least one page"),
        };
    }

    let mut k = 0u32;
    let mut partial_lbn: Option<Lbn> = None;
    for off in 0..p {
        let ppn = start + off as u64;
        if !oob.is_page_valid(ppn) {
            break;
        }
        let aligned = match oob.lpn_of_ppn(ppn).map(|lpn| geometry.page_to_block_off(lpn)) {
            Some((lbn, o)) if o == off => Some(lbn),
            _ => None,
        };
        match (aligned, partial_lbn) {
            (Some(lbn), None) => {
                partial_lbn = Some(lbn);
                k += 1;
            }
            (Some(lbn), Some(prev)) if lbn == prev => k += 1,
            _ => break,
        }
    }
    if k > 0 && k < p {
        let rest_erased = (k..p).all(|off| oob.is_page_erased(start + off as u64));
        if rest_erased {
            return Classification::Partial {
                lbn: partial_lbn.expect("partial classification requires k > 0"),
                k,
            };
        }
    }

    Classification::Full
}

pub struct GarbageCollector<F: FlashDevice, R: Recorder> {
    state: Rc<RefCell<FtlState>>,
    locks: RegionLockPool,
    flash: Rc<F>,
    recorder: Rc<R>,
}

impl<F: FlashDevice, R: Recorder> GarbageCollector<F, R> {
    pub fn new(state: Rc<RefCell<FtlState>>, locks: RegionLockPool, flash: Rc<F>, recorder: Rc<R>) -> Self {
        GarbageCollector {
            state,
            locks,
            flash,
            recorder,
        }
    }

    fn region_of_lbn(&self, lbn: Lbn) -> crate::types::RegionId {
        self.state.borrow().region_id_of_lbn(lbn)
    }

    /// Copies `lbn`'s page at offset `o` into `dest_pbn:o` if a live source
    /// exists; otherwise programs an Invalid placeholder, since NAND
    /// requires every offset in a block to be programmed in order even
    /// when there's no live data for it. Reclaims the source block if this
    /// was its last valid page.
    async fn install_offset(&self, dgn: Dgn, lbn: Lbn, o: u32, dest_pbn: Pbn, tag: Tag) -> FtlResult<(), F::Error> {
        let (lpn, dest_ppn) = {
            let st = self.state.borrow();
            let p = st.geometry.pages_per_block as u64;
            (lbn * p + o as u64, st.geometry.block_off_to_page(dest_pbn, o))
        };

        let source = self.state.borrow().live_location(lpn);

        let (src_ppn, location) = match source {
            Some(found) => found,
            None => {
                self.flash.rw_ppns(&[dest_ppn], RwOp::Write, tag).await?;
                self.flash.page_write(dest_ppn, tag, None);
                self.state.borrow_mut().oob.wipe_ppn(dest_ppn);
                return Ok(());
            }
        };

        self.flash.rw_ppns(&[src_ppn], RwOp::Read, tag).await?;
        let data = self.flash.page_read(src_ppn, tag);
        self.flash.rw_ppns(&[dest_ppn], RwOp::Write, tag).await?;
        self.flash.page_write(dest_ppn, tag, data);

        let (src_pbn, now_empty) = {
            let mut st = self.state.borrow_mut();
            st.oob.remap(lpn, Some(src_ppn), dest_ppn);
            if location == Location::LogBlock {
                st.log_table.remove_lpn(dgn, lpn);
            }
            let src_pbn = st.geometry.page_to_block_off(src_ppn).0;
            (src_pbn, !st.oob.is_any_page_valid(src_pbn))
        };

        if now_empty {
            self.flash.erase_pbn_extent(src_pbn, 1, tag).await?;
            let mut st = self.state.borrow_mut();
            st.oob.erase_block(src_pbn);
            match location {
                Location::LogBlock => {
                    st.log_table.remove_log_block(dgn, src_pbn);
                    st.block_pool.free_log(src_pbn);
                }
                Location::DataBlock => {
                    st.data_map.remove_by_pbn(src_pbn);
                    st.block_pool.free_data(src_pbn);
                }
            }
        }

        Ok(())
    }

    async fn reclaim_old_data_block(&self, lbn: Lbn, tag: Tag) -> FtlResult<(), F::Error> {
        let old_pbn = self.state.borrow().data_map.lbn_to_pbn(lbn);
        if let Some(old) = old_pbn {
            self.flash.erase_pbn_extent(old, 1, tag).await?;
            let mut st = self.state.borrow_mut();
            st.oob.erase_block(old);
            st.data_map.remove_by_pbn(old);
            st.block_pool.free_data(old);
        }
        Ok(())
    }

    /// A log block that holds lbn_hint's pages in order starting at offset
    /// 0 can become the data block directly, with no page copies.
    pub async fn switch_merge(&self, dgn: Dgn, pbn: Pbn, lbn_hint: Lbn) -> FtlResult<(), F::Error> {
        let region_id = self.region_of_lbn(lbn_hint);
        let _guard = self.locks.acquire(region_id).await;

        let still_valid = {
            let st = self.state.borrow();
            matches!(
                classify_log_block(&st.geometry, &st.oob, pbn),
                Classification::Switch { lbn } if lbn == lbn_hint
            )
        };
        if !still_valid {
            return Ok(());
        }

        self.reclaim_old_data_block(lbn_hint, Tag::SwitchMerge).await?;

        {
            let mut st = self.state.borrow_mut();
            st.data_map.add(lbn_hint, pbn);
            st.log_table.remove_log_block(dgn, pbn);
            st.block_pool.log_to_data(pbn);
        }
        self.recorder.count_me("garbage_collection", "switch_merge");
        log::debug!("switch merge: log block {pbn} -> data block for lbn {lbn_hint}");
        Ok(())
    }

    /// A log block whose leading `k_hint` offsets hold lbn_hint's pages in
    /// order: copy the remaining offsets in from wherever they currently
    /// live, then switch the block in as data — cheaper than a full merge
    /// since only the tail needs copying.
    pub async fn partial_merge(&self, dgn: Dgn, pbn: Pbn, lbn_hint: Lbn, k_hint: u32) -> FtlResult<(), F::Error> {
        let region_id = self.region_of_lbn(lbn_hint);
        let _guard = self.locks.acquire(region_id).await;

        let p = {
            let st = self.state.borrow();
            let still_valid = matches!(
                classify_log_block(&st.geometry, &st.oob, pbn),
                Classification::Partial { lbn, k } if lbn == lbn_hint && k == k_hint
            );
            if !still_valid {
                return Ok(());
            }
            st.geometry.pages_per_block
        };

        for o in k_hint..p {
            self.install_offset(dgn, lbn_hint, o, pbn, Tag::PartialMerge).await?;
        }

        self.reclaim_old_data_block(lbn_hint, Tag::PartialMerge).await?;

        {
            let mut st = self.state.borrow_mut();
            st.data_map.add(lbn_hint, pbn);
            st.log_table.remove_log_block(dgn, pbn);
            st.block_pool.log_to_data(pbn);
        }
        self.recorder.count_me("garbage_collection", "partial_merge");
        log::debug!("partial merge: log block {pbn} (k={k_hint}) -> data block for lbn {lbn_hint}");
        Ok(())
    }

    /// A log block with no single LBN in switch/partial order: fans out
    /// into one `aggregate_logical_block` call per distinct LBN found
    /// valid inside `pbn`, copying each one's full page set into a fresh
    /// data block.
    pub async fn full_merge(&self, dgn: Dgn, pbn: Pbn) -> FtlResult<(), F::Error> {
        let lbns: Vec<Lbn> = {
            let st = self.state.borrow();
            let p = st.geometry.pages_per_block;
            let (start, _) = st.geometry.block_to_page_range(pbn);
            let mut set = std::collections::BTreeSet::new();
            for off in 0..p {
                let ppn = start + off as u64;
                if st.oob.is_page_valid(ppn) {
                    if let Some(lpn) = st.oob.lpn_of_ppn(ppn) {
                        set.insert(st.geometry.page_to_block_off(lpn).0);
                    }
                }
            }
            set.into_iter().collect()
        };

        log::debug!("full merge: log block {pbn} spans {} logical blocks", lbns.len());
        for lbn in lbns {
            self.aggregate_logical_block(dgn, lbn).await?;
        }
        self.recorder.count_me("garbage_collection", "full_merge");
        Ok(())
    }

    /// Copies every one of `lbn`'s pages into a freshly-allocated data
    /// block, pulling each page from wherever it currently lives (another
    /// log block or the old data block), then frees the old data block.
    async fn aggregate_logical_block(&self, dgn: Dgn, lbn: Lbn) -> FtlResult<(), F::Error> {
        let region_id = self.region_of_lbn(lbn);
        let _guard = self.locks.acquire(region_id).await;

        let p = {
            let st = self.state.borrow();
            let p = st.geometry.pages_per_block as u64;
            let still_has_log_mapping = (0..p).any(|o| st.log_table.lpn_to_ppn(dgn, lbn * p + o).is_some());
            if !still_has_log_mapping {
                return Ok(());
            }
            p as u32
        };

        let dest_pbn = {
            let mut st = self.state.borrow_mut();
            let channels = st.geometry.channels;
            let mut found = None;
            for ch in 0..channels {
                if let Some(pbn) = st.block_pool.pop_free_to_data(ch) {
                    found = Some(pbn);
                    break;
                }
            }
            found.ok_or(FtlError::OutOfSpace)?
        };

        for o in 0..p {
            self.install_offset(dgn, lbn, o, dest_pbn, Tag::FullMerge).await?;
        }

        self.reclaim_old_data_block(lbn, Tag::FullMerge).await?;

        self.state.borrow_mut().data_map.add(lbn, dest_pbn);
        Ok(())
    }

    /// Dispatches to the classified merge, or reclaims an already-empty log
    /// block directly. `tag` labels the direct-erase case only — the merge
    /// branches already tag themselves by merge type — so callers pass
    /// whichever category describes why this block is being cleaned
    /// (write-path exhaustion vs. background threshold GC).
    pub async fn clean_log_block(&self, dgn: Dgn, pbn: Pbn, tag: Tag) -> FtlResult<(), F::Error> {
        let classification = {
            let st = self.state.borrow();
            classify_log_block(&st.geometry, &st.oob, pbn)
        };

        match classification {
            Classification::Empty => {
                self.flash.erase_pbn_extent(pbn, 1, tag).await?;
                let mut st = self.state.borrow_mut();
                st.oob.erase_block(pbn);
                st.log_table.remove_log_block(dgn, pbn);
                st.block_pool.free_log(pbn);
                Ok(())
            }
            Classification::Switch { lbn } => self.switch_merge(dgn, pbn, lbn).await,
            Classification::Partial { lbn, k } => self.partial_merge(dgn, pbn, lbn, k).await,
            Classification::Full => self.full_merge(dgn, pbn).await,
        }
    }

    /// Write-path fallback: cleans a snapshot of `dgn`'s current log
    /// blocks, since merges mutate the group as they run.
    pub async fn clean_data_group(&self, dgn: Dgn, tag: Tag) -> FtlResult<(), F::Error> {
        let snapshot: Vec<Pbn> = {
            let st = self.state.borrow();
            if !st.log_table.has_group(dgn) {
                return Ok(());
            }
            st.log_table.group(dgn).map(|g| g.log_block_numbers()).unwrap_or_default()
        };

        for pbn in snapshot {
            let still_log = self.state.borrow().block_pool.tag_of(pbn) == BlockTag::Log;
            if !still_log {
                continue;
            }
            self.clean_log_block(dgn, pbn, tag).await?;
        }
        Ok(())
    }

    /// Background GC: drains victims until `should_stop` or the chain is
    /// exhausted.
    pub async fn try_gc(&self) -> FtlResult<(), F::Error> {
        loop {
            let used = self.state.borrow().used_blocks();
            let stop = self.state.borrow_mut().gc_decider.should_stop(used);
            if stop {
                self.recorder.count_me("GC", "StopIteration");
                log::debug!("try_gc: stopping, used_blocks={used}");
                return Ok(());
            }

            let victim = {
                let st = self.state.borrow();
                victim_iter(&st.block_pool, &st.log_table, &st.oob).into_iter().next()
            };

            let Some(victim) = victim else {
                self.recorder.count_me("GC", "StopIteration");
                log::warn!("try_gc: no victims left but used_blocks={used} is still above the low watermark");
                return Ok(());
            };

            match victim.kind {
                VictimKind::Data => {
                    self.flash.erase_pbn_extent(victim.pbn, 1, Tag::ThresholdGc).await?;
                    let mut st = self.state.borrow_mut();
                    st.oob.erase_block(victim.pbn);
                    st.data_map.remove_by_pbn(victim.pbn);
                    st.block_pool.free_data(victim.pbn);
                }
                VictimKind::Log => {
                    let dgn = victim.dgn.expect("log victim must carry its owning dgn");
                    self.clean_log_block(dgn, victim.pbn, Tag::ThresholdGc).await?;
                }
            }
        }
    }
}
