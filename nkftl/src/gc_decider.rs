//! GC Decider: watermark policy for when to start/stop background
//! cleaning.

use crate::config::FreezeDetectorConfig;

pub struct GcDecider {
    high_watermark: u32,
    low_watermark: u32,
    freeze_detector: FreezeDetectorConfig,
    stalled_iterations: u32,
    last_used_blocks: Option<usize>,
}

impl GcDecider {
    pub fn new(blocks_per_dev: u32, ratio_high: f64, ratio_low: f64, freeze_detector: FreezeDetectorConfig) -> Self {
        GcDecider {
            high_watermark: (ratio_high * blocks_per_dev as f64) as u32,
            low_watermark: (ratio_low * blocks_per_dev as f64) as u32,
            freeze_detector,
            stalled_iterations: 0,
            last_used_blocks: None,
        }
    }

    pub fn should_start(&self, used_blocks: usize) -> bool {
        used_blocks as u32 > self.high_watermark
    }

    /// Also folds in freeze-detector bookkeeping: callers poll this once per
    /// `try_gc` iteration and must pass the current `used_blocks` so a
    /// stalled cleaning pass can be detected.
    pub fn should_stop(&mut self, used_blocks: usize) -> bool {
        if (used_blocks as u32) < self.low_watermark {
            self.stalled_iterations = 0;
            self.last_used_blocks = None;
            return true;
        }

        if self.freeze_detector.enabled {
            match self.last_used_blocks {
                Some(prev) if prev == used_blocks => {
                    self.stalled_iterations += 1;
                }
                _ => {
                    self.stalled_iterations = 0;
                }
            }
            self.last_used_blocks = Some(used_blocks);
            if self.stalled_iterations >= self.freeze_detector.stall_threshold {
                return true;
            }
        }

        false
    }

    pub fn high_watermark(&self) -> u32 {
        self.high_watermark
    }

    pub fn low_watermark(&self) -> u32 {
        self.low_watermark
    }
}
