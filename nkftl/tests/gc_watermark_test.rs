//! Boundary scenario: repeatedly rewriting the same logical blocks exhausts
//! each data group's `K` log blocks every round, forcing the write path's
//! clean-and-retry fallback to reclaim the prior round's now-stale data
//! block on every switch merge, keeping steady-state usage well clear of
//! the watermarks.

mod support;

use nkftl::config::{FreezeDetectorConfig, StripeUnit};
use nkftl::geometry::FlashGeometry;
use nkftl::{Extent, Ftl, NkftlConfig};
use support::{CountingRecorder, MemFlash};

fn config() -> NkftlConfig {
    NkftlConfig {
        geometry: FlashGeometry::new(4, 10, 1),
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
fn repeated_rewrites_settle_back_under_low_watermark() {
    let cfg = config();
    let total_blocks = cfg.geometry.blocks_per_dev() as f64;
    let n_pages = cfg.geometry.pages_per_dev();
    let flash = MemFlash::new(n_pages);
    let (recorder, _events) = CountingRecorder::new();
    let ftl = Ftl::new(cfg, flash, recorder).unwrap();

    // dgn 0 spans lbn 0,1 -> lpn 0..8, a full aligned write each round.
    let extent = Extent::new(0, 8);

    pollster::block_on(async {
        for round in 0u8..8 {
            let payload: Vec<Vec<u8>> = (0..8).map(|_| vec![round]).collect();
            ftl.write_ext(extent, Some(payload)).await.unwrap();
        }

        // Final explicit drain, the same hook a host would call at idle time.
        ftl.run_gc_to_stop().await.unwrap();

        let got = ftl.read_ext(extent).await.unwrap();
        assert_eq!(got, vec![Some(vec![7]); 8], "latest rewrite must survive every GC pass");
    });

    assert!(
        (ftl.used_blocks() as f64 / total_blocks) < 0.7,
        "used_blocks={} total={}",
        ftl.used_blocks(),
        total_blocks
    );
    assert!(ftl.check_invariants().is_ok());
}
