//! Configuration surface.
//!
//! Deserializable with `serde` so a host can load it from whatever format
//! it likes.

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::geometry::FlashGeometry;

/// `stripe_size`: a page count, or the literal `"infinity"` meaning "fill
/// one channel's current block before round-robining".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StripeUnit {
    Pages(u32),
    Infinity,
}

impl StripeUnit {
    pub fn remaining_for_request(&self, remaining: u32) -> u32 {
        match self {
            StripeUnit::Pages(n) => remaining.min(*n),
            StripeUnit::Infinity => remaining,
        }
    }
}

impl<'de> Deserialize<'de> for StripeUnit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(u32),
            Str(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Num(n) => Ok(StripeUnit::Pages(n)),
            Raw::Str(s) if s.eq_ignore_ascii_case("infinity") => Ok(StripeUnit::Infinity),
            Raw::Str(s) => Err(de::Error::custom(format!(
                "expected an integer stripe size or \"infinity\", got {s:?}"
            ))),
        }
    }
}

/// Whether to force-stop GC when `used_blocks` stops improving across
/// consecutive polls. Defaults to disabled (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreezeDetectorConfig {
    pub enabled: bool,
    /// Number of consecutive non-improving `should_stop` polls before
    /// forcing a stop, once enabled. `2 * n_pages_per_block` is a
    /// reasonable default for callers that enable the detector.
    pub stall_threshold: u32,
}

impl Default for FreezeDetectorConfig {
    fn default() -> Self {
        FreezeDetectorConfig {
            enabled: false,
            stall_threshold: 0,
        }
    }
}

/// `nkftl.*` configuration keys plus the geometry and stripe/region knobs
/// that live alongside them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NkftlConfig {
    pub geometry: FlashGeometry,

    /// N: number of logical blocks per data group.
    pub n_blocks_in_data_group: u32,
    /// K: max log blocks per data group.
    pub max_blocks_in_log_group: u32,

    /// High watermark ratio (0 < low < high < 1).
    pub gc_threshold_ratio: f64,
    /// Low watermark ratio.
    pub gc_low_threshold_ratio: f64,

    /// Over-provisioning ratio; carried for host telemetry, not consumed
    /// by the core GC decision.
    pub provision_ratio: f64,

    pub stripe_size: StripeUnit,

    /// Defaults to `geometry.pages_per_block` when absent.
    #[serde(default)]
    pub n_pages_per_region: Option<u32>,

    #[serde(default)]
    pub freeze_detector: FreezeDetectorConfig,
}

impl NkftlConfig {
    pub fn n_pages_per_region(&self) -> u32 {
        self.n_pages_per_region
            .unwrap_or(self.geometry.pages_per_block)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.gc_threshold_ratio <= self.gc_low_threshold_ratio {
            return Err(format!(
                "GC_threshold_ratio ({}) must be > GC_low_threshold_ratio ({})",
                self.gc_threshold_ratio, self.gc_low_threshold_ratio
            ));
        }
        if !(0.0..1.0).contains(&self.gc_low_threshold_ratio) {
            return Err("GC_low_threshold_ratio must be in (0,1)".into());
        }
        if !(0.0..1.0).contains(&self.gc_threshold_ratio) {
            return Err("GC_threshold_ratio must be in (0,1)".into());
        }
        if self.n_blocks_in_data_group == 0 {
            return Err("n_blocks_in_data_group must be >= 1".into());
        }
        if self.max_blocks_in_log_group == 0 {
            return Err("max_blocks_in_log_group must be >= 1".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stripe_unit_parses_integer_and_infinity() {
        let n: StripeUnit = serde_json::from_str("4").unwrap();
        assert_eq!(n, StripeUnit::Pages(4));

        let inf: StripeUnit = serde_json::from_str("\"infinity\"").unwrap();
        assert_eq!(inf, StripeUnit::Infinity);

        assert!(serde_json::from_str::<StripeUnit>("\"bogus\"").is_err());
    }

    #[test]
    fn config_round_trips_through_json() {
        let cfg = NkftlConfig {
            geometry: FlashGeometry::new(8, 16, 2),
            n_blocks_in_data_group: 4,
            max_blocks_in_log_group: 2,
            gc_threshold_ratio: 0.8,
            gc_low_threshold_ratio: 0.7,
            provision_ratio: 1.5,
            stripe_size: StripeUnit::Infinity,
            n_pages_per_region: None,
            freeze_detector: FreezeDetectorConfig::default(),
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: NkftlConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.n_pages_per_region(), 8);
        assert!(back.validate().is_ok());
    }

    #[test]
    fn validate_rejects_inverted_watermarks() {
        let mut cfg = NkftlConfig {
            geometry: FlashGeometry::new(8, 16, 2),
            n_blocks_in_data_group: 4,
            max_blocks_in_log_group: 2,
            gc_threshold_ratio: 0.5,
            gc_low_threshold_ratio: 0.7,
            provision_ratio: 1.5,
            stripe_size: StripeUnit::Infinity,
            n_pages_per_region: None,
            freeze_detector: FreezeDetectorConfig::default(),
        };
        assert!(cfg.validate().is_err());
        cfg.gc_threshold_ratio = 0.8;
        assert!(cfg.validate().is_ok());
    }
}
