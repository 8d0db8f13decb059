//! Deployment configuration.
//!
//! Stored on the SD card as a postcard blob (`CONFIG.BIN`); the firmware
//! falls back to [`StationConfig::default`] when the file is absent or does
//! not parse.

use serde::{Deserialize, Serialize};

use crate::gauge::GaugeRange;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationConfig {
    /// Physical range of the installed stream gauge sensor.
    pub gauge_range: GaugeRange,
    /// Append each observation to the dated SD log.
    pub log_observations: bool,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            gauge_range: GaugeRange::FiveMeter,
            log_observations: true,
        }
    }
}

impl StationConfig {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }

    pub fn to_bytes<'a>(&self, buf: &'a mut [u8]) -> Result<&'a [u8], postcard::Error> {
        postcard::to_slice(self, buf).map(|written| &*written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postcard_roundtrip() {
        let config = StationConfig {
            gauge_range: GaugeRange::TenMeter,
            log_observations: false,
        };
        let mut buf = [0u8; 16];
        let bytes = config.to_bytes(&mut buf).unwrap();
        assert_eq!(StationConfig::from_bytes(bytes).unwrap(), config);
    }

    #[test]
    fn garbage_does_not_parse() {
        assert!(StationConfig::from_bytes(&[0xFF, 0xFF, 0xFF]).is_err());
    }
}
