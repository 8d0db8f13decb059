//! Median-filtered stream gauge sampling.
//!
//! The MaxBotix distance sensors are noisy on open water, so every
//! observation takes 60 analog samples spaced 250 ms apart (~15 s total) and
//! reports the median. The 15 s spent here is a deliberate noise-reduction
//! tradeoff.
//!
//! Two mechanically distinct sensor ranges are supported:
//! - 5-meter parts (MB7360/7369/7380/7389): 10-bit counts map to 5 mm each
//! - 10-meter parts (MB7363/7366/7383/7386): 10-bit counts map to 10 mm each
//!
//! The configured range must match the sensor physically installed.

use embassy_time::Timer;
use serde::{Deserialize, Serialize};

use crate::io::AnalogSource;

/// Samples taken per median computation.
pub const SG_BUCKETS: usize = 60;

/// Full-scale gauge count. The mm-per-count table is calibrated for 10-bit
/// counts; an [`AnalogSource`] backed by a wider converter must scale down
/// to this range.
pub const SG_COUNT_MAX: u16 = 1023;

const SAMPLE_SPACING_MS: u64 = 250;

/// Which distance sensor range is installed at this deployment.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaugeRange {
    FiveMeter,
    TenMeter,
}

impl GaugeRange {
    /// Millimeters per raw converter count for this sensor range.
    pub const fn mm_per_count(self) -> u32 {
        match self {
            GaugeRange::FiveMeter => 5,
            GaugeRange::TenMeter => 10,
        }
    }
}

/// Sort the sample buffer and return the lower median.
///
/// For the even bucket count this is index `(N + 1) / 2 - 1`; downstream
/// consumers calibrated against that tie-break, so it stays.
pub fn median_of(samples: &mut [u16; SG_BUCKETS]) -> u16 {
    samples.sort_unstable();
    samples[(SG_BUCKETS + 1) / 2 - 1]
}

pub struct StreamGauge {
    range: GaugeRange,
}

impl StreamGauge {
    pub const fn new(range: GaugeRange) -> Self {
        Self { range }
    }

    /// Collect a full sample buffer and return the median distance in mm.
    ///
    /// Blocks the observation cycle for ~15 s; nothing else runs meanwhile.
    pub async fn read_median<A: AnalogSource>(&self, adc: &mut A) -> u32 {
        let mut buckets = [0u16; SG_BUCKETS];
        for bucket in buckets.iter_mut() {
            Timer::after_millis(SAMPLE_SPACING_MS).await;
            *bucket = adc.read_counts();
        }
        median_of(&mut buckets) as u32 * self.range.mm_per_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_sorted_input() {
        let mut samples = [0u16; SG_BUCKETS];
        for (i, s) in samples.iter_mut().enumerate() {
            *s = i as u16;
        }
        // lower median of 0..=59 is element 29
        assert_eq!(median_of(&mut samples), 29);
    }

    #[test]
    fn median_of_reverse_sorted_input() {
        let mut samples = [0u16; SG_BUCKETS];
        for (i, s) in samples.iter_mut().enumerate() {
            *s = (SG_BUCKETS - 1 - i) as u16;
        }
        assert_eq!(median_of(&mut samples), 29);
    }

    #[test]
    fn median_ignores_outliers() {
        let mut samples = [500u16; SG_BUCKETS];
        samples[0] = 0;
        samples[1] = 1023;
        assert_eq!(median_of(&mut samples), 500);
    }

    #[test]
    fn full_scale_count_stays_within_sensor_range() {
        // MB736x parts resolve 0..=5119 mm (5 m) / 0..=10239 mm (10 m);
        // a full-scale 10-bit median must not render beyond that.
        let mut samples = [SG_COUNT_MAX; SG_BUCKETS];
        let median = median_of(&mut samples) as u32;
        assert!(median * GaugeRange::FiveMeter.mm_per_count() <= 5119);
        assert!(median * GaugeRange::TenMeter.mm_per_count() <= 10239);
    }

    #[test]
    fn range_scale_factors() {
        assert_eq!(GaugeRange::FiveMeter.mm_per_count(), 5);
        assert_eq!(GaugeRange::TenMeter.mm_per_count(), 10);
    }
}
