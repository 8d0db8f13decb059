//! Bosch pressure sensor identification and slot management.
//!
//! The station exposes two I2C slots (0x77 and 0x76) that accept any of the
//! interchangeable Bosch parts. Which part is plugged in is discovered at
//! boot by reading the chip ID register, then the matching driver is brought
//! up. Chip ID 0x60 is ambiguous between the BME280 and the BMP390, so
//! initialization tries the BME280 driver first and falls back to the BMP3xx
//! driver at the same address before declaring the slot empty.

use embedded_hal_async::i2c::I2c;
use log::{debug, info, warn};

use super::bmp280::{Bme280, Bmp280};
use super::bmp3xx::Bmp3xx;
use crate::status::StatusBits;

/// Default address, SDO high.
pub const BMX_ADDRESS_1: u8 = 0x77;
/// SDO to GND.
pub const BMX_ADDRESS_2: u8 = 0x76;

pub const BMP280_CHIP_ID: u8 = 0x58;
pub const BMP388_CHIP_ID: u8 = 0x50;
pub const BME280_BMP390_CHIP_ID: u8 = 0x60;

/// BMP3-family parts expose the ID at 0x00, BMx2 parts at 0xD0. 0x00 must be
/// probed first: reading 0xD0 on a BMP388 returns a byte that can alias a
/// valid ID from the other family.
const CHIP_ID_REGS: [u8; 2] = [0x00, 0xD0];

/// The closed set of chip variants a slot can identify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoschChip {
    Bmp280,
    Bmp388,
    /// Both parts report 0x60; disambiguated at driver init.
    Bme280OrBmp390,
}

impl BoschChip {
    /// Exact-match classification. Any unlisted byte is invalid and treated
    /// as not found.
    pub const fn classify(id: u8) -> Option<Self> {
        match id {
            BMP280_CHIP_ID => Some(BoschChip::Bmp280),
            BMP388_CHIP_ID => Some(BoschChip::Bmp388),
            BME280_BMP390_CHIP_ID => Some(BoschChip::Bme280OrBmp390),
            _ => None,
        }
    }

    pub const fn id(self) -> u8 {
        match self {
            BoschChip::Bmp280 => BMP280_CHIP_ID,
            BoschChip::Bmp388 => BMP388_CHIP_ID,
            BoschChip::Bme280OrBmp390 => BME280_BMP390_CHIP_ID,
        }
    }
}

/// Probe `addr` for a known Bosch chip ID, trying both register offsets.
///
/// A bus error or an invalid byte at one offset falls through to the next;
/// only after both fail is the address reported empty. One diagnostic line
/// per probe attempt.
pub async fn probe_chip<I: I2c>(i2c: &mut I, addr: u8) -> Option<BoschChip> {
    for reg in CHIP_ID_REGS {
        debug!("chip id probe I2C:{addr:02X} Reg:{reg:02X}");
        let mut id = [0u8; 1];
        match i2c.write_read(addr, &[reg], &mut id).await {
            Err(e) => {
                debug!("  ERR_ET:{e:?}");
                continue;
            }
            Ok(()) => match BoschChip::classify(id[0]) {
                Some(chip) => {
                    info!("  CHIPID:{:02X} {chip:?}", id[0]);
                    return Some(chip);
                }
                None => debug!("  CHIPID:{:02X} invalid", id[0]),
            },
        }
    }
    None
}

/// Driver bound to a slot once identification and init succeed.
pub enum BoschDriver {
    Absent,
    Bmp280(Bmp280),
    Bme280(Bme280),
    Bmp3xx(Bmp3xx),
}

/// One cycle's worth of values from a Bosch slot, before QC.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoschReading {
    pub pressure_hpa: f32,
    pub temperature_c: f32,
    /// 0.0 for parts without a humidity element.
    pub humidity_pct: f32,
}

/// One physical sensor slot: fixed address, status bit, discovered variant,
/// and the live driver when present.
pub struct BoschSlot {
    addr: u8,
    status_bit: u32,
    chip: Option<BoschChip>,
    driver: BoschDriver,
}

impl BoschSlot {
    pub const fn new(addr: u8, status_bit: u32) -> Self {
        Self {
            addr,
            status_bit,
            chip: None,
            driver: BoschDriver::Absent,
        }
    }

    pub fn exists(&self) -> bool {
        !matches!(self.driver, BoschDriver::Absent)
    }

    /// Variant discovered at the last full identification. Meaningful only
    /// while a chip has been seen; kept across offline periods so the cheap
    /// recheck can re-init without re-reading the ID register.
    pub fn chip(&self) -> Option<BoschChip> {
        self.chip
    }

    /// Full bring-up: identify the chip, then initialize the matching driver.
    ///
    /// An init failure sets the slot's status bit; an empty address leaves
    /// the bit untouched (nothing is wrong with a slot that was never
    /// populated).
    pub async fn init<I: I2c>(&mut self, i2c: &mut I, status: &mut StatusBits) {
        self.chip = probe_chip(i2c, self.addr).await;
        match self.chip {
            None => {
                info!("BMX {:02X} NF", self.addr);
                self.driver = BoschDriver::Absent;
            }
            Some(chip) => {
                self.driver = start_driver(i2c, self.addr, chip).await;
                if self.exists() {
                    status.clear(self.status_bit);
                    info!("BMX {:02X} OK", self.addr);
                } else {
                    status.set(self.status_bit);
                    warn!("BMX {:02X} ERR", self.addr);
                }
            }
        }
    }

    /// Cheap periodic presence recheck.
    ///
    /// A slot that went offline re-inits its remembered variant without
    /// re-reading the chip ID; a slot that was empty at boot runs full
    /// identification when something starts acknowledging its address. No
    /// side effects when the bus state matches what we already believe.
    pub async fn recheck<I: I2c>(&mut self, i2c: &mut I, status: &mut StatusBits) {
        let acked = i2c.write(self.addr, &[]).await.is_ok();
        if acked {
            if self.exists() {
                return;
            }
            let Some(chip) = self.chip else {
                // never identified anything here: adopt the newcomer
                self.init(i2c, status).await;
                return;
            };
            self.driver = start_driver(i2c, self.addr, chip).await;
            if self.exists() {
                status.clear(self.status_bit);
                info!("BMX {:02X} ONLINE", self.addr);
            }
        } else if self.exists() {
            self.driver = BoschDriver::Absent;
            status.set(self.status_bit);
            warn!("BMX {:02X} OFFLINE", self.addr);
        }
    }

    /// Read pressure/temperature/humidity from the live driver.
    ///
    /// `None` while absent. A bus failure mid-read reports NaN values so the
    /// QC filter substitutes the sentinels; presence is left to the recheck.
    pub async fn read<I: I2c>(&self, i2c: &mut I) -> Option<BoschReading> {
        let result = match &self.driver {
            BoschDriver::Absent => return None,
            BoschDriver::Bmp280(drv) => drv
                .read(i2c)
                .await
                .map(|(t, p)| (t, p, 0.0)),
            BoschDriver::Bme280(drv) => drv.read(i2c).await,
            BoschDriver::Bmp3xx(drv) => drv
                .read(i2c)
                .await
                .map(|(t, p)| (t, p, 0.0)),
        };
        Some(match result {
            Ok((t, p_pa, h)) => BoschReading {
                pressure_hpa: p_pa / 100.0,
                temperature_c: t,
                humidity_pct: h,
            },
            Err(e) => {
                warn!("BMX {:02X} read failed: {e}", self.addr);
                BoschReading {
                    pressure_hpa: f32::NAN,
                    temperature_c: f32::NAN,
                    humidity_pct: f32::NAN,
                }
            }
        })
    }
}

/// Initialize the driver for an identified variant, with the BME280→BMP390
/// fallback on the ambiguous ID.
async fn start_driver<I: I2c>(i2c: &mut I, addr: u8, chip: BoschChip) -> BoschDriver {
    match chip {
        BoschChip::Bmp280 => match Bmp280::begin(i2c, addr).await {
            Ok(drv) => BoschDriver::Bmp280(drv),
            Err(e) => {
                warn!("BMP280 {addr:02X} begin: {e}");
                BoschDriver::Absent
            }
        },
        BoschChip::Bme280OrBmp390 => match Bme280::begin(i2c, addr).await {
            Ok(drv) => BoschDriver::Bme280(drv),
            Err(_) => match Bmp3xx::begin(i2c, addr).await {
                // perhaps it is a BMP390
                Ok(drv) => BoschDriver::Bmp3xx(drv),
                Err(e) => {
                    warn!("BMX {addr:02X} begin: {e}");
                    BoschDriver::Absent
                }
            },
        },
        BoschChip::Bmp388 => match Bmp3xx::begin(i2c, addr).await {
            Ok(drv) => BoschDriver::Bmp3xx(drv),
            Err(e) => {
                warn!("BMP388 {addr:02X} begin: {e}");
                BoschDriver::Absent
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::testutil::FakeChip;
    use crate::status::{SSB_BMX_1, StatusBits};
    use embassy_futures::block_on;

    #[test]
    fn classify_known_ids() {
        assert_eq!(BoschChip::classify(0x58), Some(BoschChip::Bmp280));
        assert_eq!(BoschChip::classify(0x50), Some(BoschChip::Bmp388));
        assert_eq!(BoschChip::classify(0x60), Some(BoschChip::Bme280OrBmp390));
    }

    #[test]
    fn classify_rejects_other_bytes() {
        assert_eq!(BoschChip::classify(0x00), None);
        assert_eq!(BoschChip::classify(0x42), None);
        assert_eq!(BoschChip::classify(0xFF), None);
        assert_eq!(BoschChip::classify(0x61), None);
    }

    #[test]
    fn probe_finds_id_at_first_offset() {
        let mut chip = FakeChip::new(0x77, &[(0x00, &[0x50])]);
        let found = block_on(probe_chip(&mut chip, 0x77));
        assert_eq!(found, Some(BoschChip::Bmp388));
    }

    #[test]
    fn probe_falls_through_to_second_offset() {
        // 0x00 reads as garbage, 0xD0 carries the real ID
        let mut chip = FakeChip::new(0x76, &[(0x00, &[0x42]), (0xD0, &[0x58])]);
        let found = block_on(probe_chip(&mut chip, 0x76));
        assert_eq!(found, Some(BoschChip::Bmp280));
    }

    #[test]
    fn probe_falls_through_on_bus_error() {
        let mut chip = FakeChip::new(0x76, &[(0xD0, &[0x60])]).failing(&[0x00]);
        let found = block_on(probe_chip(&mut chip, 0x76));
        assert_eq!(found, Some(BoschChip::Bme280OrBmp390));
    }

    #[test]
    fn probe_reports_empty_address() {
        let mut chip = FakeChip::new(0x77, &[(0x00, &[0x42]), (0xD0, &[0x42])]);
        assert_eq!(block_on(probe_chip(&mut chip, 0x77)), None);
    }

    #[test]
    fn probe_handles_missing_device() {
        // device answers at 0x76 only; probing 0x77 never acks
        let mut chip = FakeChip::new(0x76, &[(0x00, &[0x58])]);
        assert_eq!(block_on(probe_chip(&mut chip, 0x77)), None);
    }

    // BMP388: ID at 0x00, calibration NVM at 0x31
    fn bmp388_at(addr: u8) -> FakeChip {
        FakeChip::new(addr, &[(0x00, &[0x50]), (0x31, &[0u8; 21])])
    }

    #[test]
    fn recheck_adopts_sensor_plugged_into_empty_slot() {
        let mut chip = bmp388_at(BMX_ADDRESS_1);
        let mut slot = BoschSlot::new(BMX_ADDRESS_1, SSB_BMX_1);
        let mut status = StatusBits::new();

        block_on(slot.recheck(&mut chip, &mut status));
        assert!(slot.exists());
        assert_eq!(slot.chip(), Some(BoschChip::Bmp388));
        assert!(!status.is_set(SSB_BMX_1));
    }

    #[test]
    fn recheck_quiet_while_slot_stays_empty() {
        // the only device on the bus lives at the other slot address
        let mut chip = bmp388_at(BMX_ADDRESS_2);
        let mut slot = BoschSlot::new(BMX_ADDRESS_1, SSB_BMX_1);
        let mut status = StatusBits::new();

        block_on(slot.recheck(&mut chip, &mut status));
        assert!(!slot.exists());
        assert_eq!(slot.chip(), None);
        assert_eq!(status.value(), 0);
    }

    #[test]
    fn recheck_marks_live_slot_offline_on_nack() {
        let mut chip = bmp388_at(BMX_ADDRESS_1);
        let mut slot = BoschSlot::new(BMX_ADDRESS_1, SSB_BMX_1);
        let mut status = StatusBits::new();
        block_on(slot.init(&mut chip, &mut status));
        assert!(slot.exists());

        // unplugged: nothing acknowledges the address anymore
        chip.addr = 0x55;
        block_on(slot.recheck(&mut chip, &mut status));
        assert!(!slot.exists());
        assert!(status.is_set(SSB_BMX_1));
        // variant stays remembered for the cheap re-init path
        assert_eq!(slot.chip(), Some(BoschChip::Bmp388));
    }
}
