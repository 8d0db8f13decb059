//! Process-wide system status bitmask.
//!
//! One bit per sensor/subsystem. A bit is set when the device is absent or
//! its last operation failed, and cleared when it recovers. The raw value is
//! reported in every observation (`hth` field) so the ingest side can see
//! station health without a separate channel.

/// Power-on reset occurred this boot
pub const SSB_PWRON: u32 = 0x1;
/// SD card absent or last observation append failed
pub const SSB_SD: u32 = 0x2;
/// RTC not responding or time never set
pub const SSB_RTC: u32 = 0x4;
/// OLED display absent
pub const SSB_OLED: u32 = 0x8;
/// Bosch pressure slot 1 (0x77) failed init or went offline
pub const SSB_BMX_1: u32 = 0x10;
/// Bosch pressure slot 2 (0x76) failed init or went offline
pub const SSB_BMX_2: u32 = 0x20;
/// MCP9808 precision temperature sensor not found
pub const SSB_MCP_1: u32 = 0x40;
/// Dallas one-wire probe not found
pub const SSB_DS_1: u32 = 0x80;

/// System status bits, reported verbatim in the `hth` observation field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusBits(u32);

impl StatusBits {
    pub const fn new() -> Self {
        Self(0)
    }

    pub fn set(&mut self, bit: u32) {
        self.0 |= bit;
    }

    pub fn clear(&mut self, bit: u32) {
        self.0 &= !bit;
    }

    pub fn is_set(&self, bit: u32) -> bool {
        self.0 & bit != 0
    }

    /// Raw bitmask value as rendered into the observation record.
    pub const fn value(&self) -> u32 {
        self.0
    }
}
