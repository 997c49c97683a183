//! Nominal Bit-Timing Table
//!
//! Pre-computed prescaler/segment combinations for each supported bit rate.

use serde::{Deserialize, Serialize};

/// Controller timing parameters for one bit rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitTiming {
    /// Nominal bit rate in bit/s
    pub bit_rate: u32,
    /// Peripheral clock divider
    pub prescaler: u16,
    /// Time quanta before the sample point (propagation + phase 1)
    pub time_segment_1: u8,
    /// Time quanta after the sample point
    pub time_segment_2: u8,
}

impl BitTiming {
    /// Create a new timing entry
    pub const fn new(bit_rate: u32, prescaler: u16, time_segment_1: u8, time_segment_2: u8) -> Self {
        Self {
            bit_rate,
            prescaler,
            time_segment_1,
            time_segment_2,
        }
    }

    /// Time quanta per bit, including the sync segment
    pub fn time_quanta(&self) -> u32 {
        1 + self.time_segment_1 as u32 + self.time_segment_2 as u32
    }

    /// Bit rate these parameters actually produce at the given clock
    pub fn bit_rate_for(&self, clock_hz: u32) -> u32 {
        clock_hz / (self.prescaler as u32 * self.time_quanta())
    }

    /// Sample point position in tenths of a percent
    pub fn sample_point_permille(&self) -> u32 {
        (1 + self.time_segment_1 as u32) * 1000 / self.time_quanta()
    }
}

/// Timings for a 40 MHz peripheral clock on a short bus.
///
/// The propagation segment is omitted, which only holds for nodes within a
/// couple of metres. Sample point is 87.5% except where noted. Any change of
/// clock, bus length or sample point needs these values recomputed.
pub const FDCAN_40MHZ_TIMINGS: &[BitTiming] = &[
    BitTiming::new(5_000, 200, 34, 5),
    BitTiming::new(10_000, 100, 34, 5),
    BitTiming::new(20_000, 50, 34, 5),
    BitTiming::new(50_000, 20, 34, 5),
    BitTiming::new(100_000, 10, 34, 5),
    BitTiming::new(125_000, 8, 34, 5),
    BitTiming::new(200_000, 5, 34, 5),
    BitTiming::new(250_000, 4, 34, 5),
    BitTiming::new(400_000, 4, 19, 5), // 80%
    BitTiming::new(500_000, 2, 34, 5),
    BitTiming::new(800_000, 2, 19, 5), // 80%
    BitTiming::new(1_000_000, 1, 34, 5),
];

/// Lookup view over a static timing table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitTimingTable {
    entries: &'static [BitTiming],
}

impl BitTimingTable {
    /// Wrap a static table; entries are expected in ascending rate order
    pub const fn new(entries: &'static [BitTiming]) -> Self {
        Self { entries }
    }

    /// Exact-match lookup, no nearest-rate fallback
    pub fn find(&self, bit_rate: u32) -> Option<BitTiming> {
        self.entries.iter().find(|t| t.bit_rate == bit_rate).copied()
    }

    /// Iterate entries in table order
    pub fn iter(&self) -> impl Iterator<Item = &BitTiming> + '_ {
        self.entries.iter()
    }

    /// Supported bit rates in table order
    pub fn rates(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.iter().map(|t| t.bit_rate)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for BitTimingTable {
    fn default() -> Self {
        Self::new(FDCAN_40MHZ_TIMINGS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_exact_only() {
        let table = BitTimingTable::default();
        let entry = table.find(500_000).unwrap();
        assert_eq!(entry.prescaler, 2);
        assert_eq!(entry.time_segment_1, 34);
        assert_eq!(entry.time_segment_2, 5);

        assert!(table.find(500_001).is_none());
        assert!(table.find(0).is_none());
        assert!(table.find(83_333).is_none());
    }

    #[test]
    fn test_default_table_matches_40mhz_clock() {
        for entry in BitTimingTable::default().iter() {
            assert_eq!(entry.bit_rate_for(40_000_000), entry.bit_rate, "{:?}", entry);
        }
    }

    #[test]
    fn test_sample_points() {
        let table = BitTimingTable::default();
        assert_eq!(table.find(500_000).unwrap().sample_point_permille(), 875);
        assert_eq!(table.find(400_000).unwrap().sample_point_permille(), 800);
        assert_eq!(table.find(800_000).unwrap().sample_point_permille(), 800);
    }

    #[test]
    fn test_rates_ascending() {
        let rates: Vec<u32> = BitTimingTable::default().rates().collect();
        assert_eq!(rates.len(), 12);
        assert!(rates.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(rates.first(), Some(&5_000));
        assert_eq!(rates.last(), Some(&1_000_000));
    }
}
