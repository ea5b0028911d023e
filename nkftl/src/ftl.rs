//! FTL Facade: `read_ext`/`write_ext`/`discard_ext` and the single-LPN
//! conveniences built on top of them.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::NkftlConfig;
use crate::error::{FtlError, FtlResult};
use crate::extent::{split_by_region, Extent};
use crate::flash::FlashDevice;
use crate::gc::GarbageCollector;
use crate::recorder::Recorder;
use crate::region_lock::RegionLockPool;
use crate::state::FtlState;
use crate::tag::{RwOp, Tag};
use crate::translator::Location;
use crate::types::{Lpn, Ppn, RegionId};

pub struct Ftl<F: FlashDevice, R: Recorder> {
    state: Rc<RefCell<FtlState>>,
    locks: RegionLockPool,
    flash: Rc<F>,
    recorder: Rc<R>,
    gc: GarbageCollector<F, R>,
}

impl<F: FlashDevice, R: Recorder> Clone for Ftl<F, R> {
    fn clone(&self) -> Self {
        Ftl {
            state: self.state.clone(),
            locks: self.locks.clone(),
            flash: self.flash.clone(),
            recorder: self.recorder.clone(),
            gc: GarbageCollector::new(
                self.state.clone(),
                self.locks.clone(),
                self.flash.clone(),
                self.recorder.clone(),
            ),
        }
    }
}

impl<F: FlashDevice, R: Recorder> Ftl<F, R> {
    pub fn new(config: NkftlConfig, flash: F, recorder: R) -> Result<Self, String> {
        config.validate()?;
        let state = Rc::new(RefCell::new(FtlState::new(&config)));
        let locks = RegionLockPool::new();
        let flash = Rc::new(flash);
        let recorder = Rc::new(recorder);
        let gc = GarbageCollector::new(state.clone(), locks.clone(), flash.clone(), recorder.clone());
        Ok(Ftl {
            state,
            locks,
            flash,
            recorder,
            gc,
        })
    }

    fn region_id_of(&self, lpn: Lpn) -> RegionId {
        let st = self.state.borrow();
        st.geometry.region_id_of_lpn(lpn, st.n_pages_per_region)
    }

    pub async fn lba_read(&self, lpn: Lpn) -> FtlResult<Option<F::Data>, F::Error> {
        Ok(self.read_ext(Extent::single(lpn)).await?.into_iter().next().flatten())
    }

    pub async fn lba_write(&self, lpn: Lpn, data: Option<F::Data>) -> FtlResult<(), F::Error> {
        self.write_ext(Extent::single(lpn), data.map(|d| vec![d])).await
    }

    pub async fn lba_discard(&self, lpn: Lpn) -> FtlResult<(), F::Error> {
        self.discard_ext(Extent::single(lpn)).await
    }

    /// No-op in NKFTL; kept so hosts written against other FTLs can call
    /// it unconditionally.
    pub fn post_processing(&self) {}

    /// Fraction of device blocks currently tagged Log or Data.
    pub fn used_ratio(&self) -> f64 {
        self.state.borrow().block_pool.used_ratio()
    }

    pub fn used_blocks(&self) -> usize {
        self.state.borrow().used_blocks()
    }

    /// Runs GC to completion regardless of the start watermark — a host
    /// hook for idle-time cleaning and for tests that want to drive GC
    /// deterministically rather than wait on the write path.
    pub async fn run_gc_to_stop(&self) -> FtlResult<(), F::Error> {
        self.gc.try_gc().await
    }

    /// Self-checks block-count and ownership invariants, exposed for
    /// randomized-workload tests; not called from the hot path.
    pub fn check_invariants(&self) -> Result<(), String> {
        self.state.borrow().check_invariants()
    }

    /// Explicit clean of one data group's log blocks, the same fallback
    /// the write path reaches for on log-block exhaustion. A host may also
    /// call this directly during idle time, passing whichever `Tag`
    /// describes why it's cleaning (e.g. `Tag::ThresholdGc` for an
    /// idle-time sweep).
    pub async fn clean_data_group(&self, dgn: crate::types::Dgn, tag: Tag) -> FtlResult<(), F::Error> {
        self.gc.clean_data_group(dgn, tag).await
    }

    pub async fn read_ext(&self, extent: Extent) -> FtlResult<Vec<Option<F::Data>>, F::Error> {
        let pieces = {
            let st = self.state.borrow();
            split_by_region(&st.geometry, st.n_pages_per_region, extent)
        };

        let mut out = Vec::with_capacity(extent.lpn_count as usize);
        for piece in pieces {
            let region_id = self.region_id_of(piece.lpn_start);
            let _guard = self.locks.acquire(region_id).await;

            let located: Vec<Option<Ppn>> = piece
                .lpn_iter()
                .map(|lpn| self.state.borrow().live_location(lpn).map(|(ppn, _)| ppn))
                .collect();

            let to_read: Vec<Ppn> = located.iter().filter_map(|p| *p).collect();
            if !to_read.is_empty() {
                self.flash.rw_ppns(&to_read, RwOp::Read, Tag::Foreground).await?;
            }

            for maybe_ppn in located {
                out.push(maybe_ppn.map(|ppn| self.flash.page_read(ppn, Tag::Foreground)).flatten());
            }
        }
        Ok(out)
    }

    /// `data` carries one payload per LPN in `extent`, or `None` for a
    /// whole-extent "don't care" (speed-mode) write.
    pub async fn write_ext(&self, extent: Extent, data: Option<Vec<F::Data>>) -> FtlResult<(), F::Error> {
        if let Some(ref d) = data {
            assert_eq!(
                d.len() as u64,
                extent.lpn_count,
                "data length must match the extent's LPN count"
            );
        }

        let pieces = {
            let st = self.state.borrow();
            split_by_region(&st.geometry, st.n_pages_per_region, extent)
        };

        let mut global_offset = 0usize;
        for piece in &pieces {
            self.write_region_piece(*piece, data.as_deref(), global_offset).await?;
            global_offset += piece.lpn_count as usize;
        }

        let used = self.state.borrow().used_blocks();
        let should_start = self.state.borrow().gc_decider.should_start(used);
        if should_start {
            log::debug!("write_ext: used_blocks={used} crossed the high watermark, running try_gc");
            self.gc.try_gc().await?;
        }
        Ok(())
    }

    async fn write_region_piece(
        &self,
        piece: Extent,
        data: Option<&[F::Data]>,
        global_offset: usize,
    ) -> FtlResult<(), F::Error> {
        let region_id = self.region_id_of(piece.lpn_start);
        let mut guard = self.locks.acquire(region_id).await;

        let dgn = {
            let st = self.state.borrow();
            st.geometry.dgn_of_lpn(piece.lpn_start, st.n_blocks_in_data_group)
        };
        debug_assert!(piece
            .lpn_iter()
            .all(|lpn| self.state.borrow().geometry.dgn_of_lpn(lpn, self.state.borrow().n_blocks_in_data_group) == dgn));

        let lpns: Vec<Lpn> = piece.lpn_iter().collect();
        let mut idx = 0usize;
        let mut cleaned_once = false;

        while idx < lpns.len() {
            let remaining = (lpns.len() - idx) as u32;
            let stripe = self.state.borrow().stripe_size;
            let tick = self.state.borrow().clock.tick();

            let ppns = {
                let mut st = self.state.borrow_mut();
                st.log_table.next_ppns(dgn, remaining, stripe, &mut st.block_pool, tick)
            };

            for (i, &ppn) in ppns.iter().enumerate() {
                let lpn = lpns[idx + i];
                // Old PPN must be resolved before this write's own remap overwrites it.
                let old_ppn = self.state.borrow().lpn_to_ppn(lpn).map(|(p, _)| p);
                let payload = data.map(|d| d[global_offset + idx + i].clone());

                self.flash.rw_ppns(&[ppn], RwOp::Write, Tag::Foreground).await?;
                self.flash.page_write(ppn, Tag::Foreground, payload);

                let mut st = self.state.borrow_mut();
                st.oob.remap(lpn, old_ppn, ppn);
                st.log_table.add_mapping(dgn, lpn, ppn);
            }

            let got = ppns.len();
            idx += got;

            if (got as u32) < remaining {
                if cleaned_once {
                    log::error!("write_ext: data group {dgn} still out of log blocks after one clean-and-retry");
                    return Err(FtlError::OutOfSpace);
                }
                log::debug!("write_ext: data group {dgn} exhausted its log blocks mid-write, cleaning and retrying");
                cleaned_once = true;
                drop(guard);
                self.gc.clean_data_group(dgn, Tag::WriteDrivenErase).await?;
                guard = self.locks.acquire(region_id).await;
            }
        }

        drop(guard);
        Ok(())
    }

    pub async fn discard_ext(&self, extent: Extent) -> FtlResult<(), F::Error> {
        let pieces = {
            let st = self.state.borrow();
            split_by_region(&st.geometry, st.n_pages_per_region, extent)
        };

        for piece in pieces {
            let region_id = self.region_id_of(piece.lpn_start);
            let _guard = self.locks.acquire(region_id).await;

            for lpn in piece.lpn_iter() {
                let found = self.state.borrow().lpn_to_ppn(lpn);
                let Some((ppn, location)) = found else {
                    continue;
                };

                let mut st = self.state.borrow_mut();
                if location == Location::LogBlock {
                    let dgn = st.geometry.dgn_of_lpn(lpn, st.n_blocks_in_data_group);
                    st.log_table.remove_lpn(dgn, lpn);
                }
                st.oob.wipe_ppn(ppn);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FreezeDetectorConfig, StripeUnit};
    use crate::geometry::FlashGeometry;
    use crate::recorder::NullRecorder;
    use std::cell::RefCell as StdRefCell;
    use std::convert::Infallible;

    struct MemFlash {
        pages: StdRefCell<Vec<Option<u8>>>,
    }

    impl MemFlash {
        fn new(n_pages: u64) -> Self {
            MemFlash {
                pages: StdRefCell::new(vec![None; n_pages as usize]),
            }
        }
    }

    impl FlashDevice for MemFlash {
        type Data = u8;
        type Error = Infallible;

        fn page_read(&self, ppn: Ppn, _tag: Tag) -> Option<u8> {
            self.pages.borrow()[ppn as usize]
        }

        fn page_write(&self, ppn: Ppn, _tag: Tag, data: Option<u8>) {
            self.pages.borrow_mut()[ppn as usize] = data;
        }

        fn block_erase(&self, _pbn: crate::types::Pbn, _tag: Tag) {}

        async fn rw_ppns(&self, _ppns: &[Ppn], _op: RwOp, _tag: Tag) -> Result<(), Infallible> {
            Ok(())
        }

        async fn erase_pbn_extent(&self, _pbn: crate::types::Pbn, _n: u32, _tag: Tag) -> Result<(), Infallible> {
            Ok(())
        }
    }

    fn test_config() -> NkftlConfig {
        NkftlConfig {
            geometry: FlashGeometry::new(4, 4, 2),
            n_blocks_in_data_group: 2,
            max_blocks_in_log_group: 2,
            gc_threshold_ratio: 0.8,
            gc_low_threshold_ratio: 0.6,
            provision_ratio: 1.2,
            stripe_size: StripeUnit::Infinity,
            n_pages_per_region: None,
            freeze_detector: FreezeDetectorConfig::default(),
        }
    }

    #[test]
    fn single_write_and_read_round_trips() {
        let cfg = test_config();
        let n_pages = cfg.geometry.pages_per_dev();
        let ftl = Ftl::new(cfg, MemFlash::new(n_pages), NullRecorder).unwrap();

        pollster::block_on(async {
            ftl.lba_write(8, Some(b'3')).await.unwrap();
            let got = ftl.lba_read(8).await.unwrap();
            assert_eq!(got, Some(b'3'));
        });
    }

    #[test]
    fn init_state_has_zero_used_ratio_and_no_victims() {
        let cfg = test_config();
        let n_pages = cfg.geometry.pages_per_dev();
        let ftl = Ftl::new(cfg, MemFlash::new(n_pages), NullRecorder).unwrap();
        let st = ftl.state.borrow();
        assert_eq!(st.block_pool.used_ratio(), 0.0);
        assert!(crate::victims::victim_iter(&st.block_pool, &st.log_table, &st.oob).is_empty());
    }

    #[test]
    fn discard_then_read_yields_none() {
        let cfg = test_config();
        let n_pages = cfg.geometry.pages_per_dev();
        let ftl = Ftl::new(cfg, MemFlash::new(n_pages), NullRecorder).unwrap();

        pollster::block_on(async {
            ftl.lba_write(0, Some(b'x')).await.unwrap();
            ftl.lba_discard(0).await.unwrap();
            let got = ftl.lba_read(0).await.unwrap();
            assert_eq!(got, None);
        });
    }

    #[test]
    fn write_extent_then_read_extent_round_trips() {
        let cfg = test_config();
        let n_pages = cfg.geometry.pages_per_dev();
        let ftl = Ftl::new(cfg, MemFlash::new(n_pages), NullRecorder).unwrap();

        pollster::block_on(async {
            let extent = Extent::new(0, 4);
            ftl.write_ext(extent, Some(vec![1, 2, 3, 4])).await.unwrap();
            let got = ftl.read_ext(extent).await.unwrap();
            assert_eq!(got, vec![Some(1), Some(2), Some(3), Some(4)]);
        });
    }
}
