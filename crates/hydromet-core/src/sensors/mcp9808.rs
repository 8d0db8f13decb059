//! MCP9808 precision I2C temperature sensor.

use embedded_hal_async::i2c::I2c;
use log::{info, warn};

use super::SensorError;
use crate::status::{SSB_MCP_1, StatusBits};

/// A2/A1/A0 strapped low.
pub const MCP9808_ADDRESS_1: u8 = 0x18;

const REG_AMBIENT_TEMP: u8 = 0x05;
const REG_MANUFACTURER_ID: u8 = 0x06;
const REG_DEVICE_ID: u8 = 0x07;

const MANUFACTURER_ID: u16 = 0x0054;
const DEVICE_ID_MSB: u8 = 0x04;

/// Sign-extend and scale the 13-bit ambient temperature register.
pub fn decode_ambient(raw: u16) -> f32 {
    let magnitude = (raw & 0x0FFF) as f32 / 16.0;
    if raw & 0x1000 != 0 {
        magnitude - 256.0
    } else {
        magnitude
    }
}

pub struct Mcp9808 {
    addr: u8,
}

impl Mcp9808 {
    /// Verify the manufacturer and device ID registers.
    pub async fn begin<I: I2c>(i2c: &mut I, addr: u8) -> Result<Self, SensorError> {
        let mut buf = [0u8; 2];
        i2c.write_read(addr, &[REG_MANUFACTURER_ID], &mut buf)
            .await
            .map_err(|_| SensorError::Bus)?;
        if u16::from_be_bytes(buf) != MANUFACTURER_ID {
            return Err(SensorError::BadId(buf[1]));
        }
        i2c.write_read(addr, &[REG_DEVICE_ID], &mut buf)
            .await
            .map_err(|_| SensorError::Bus)?;
        if buf[0] != DEVICE_ID_MSB {
            return Err(SensorError::BadId(buf[0]));
        }
        Ok(Self { addr })
    }

    /// Ambient temperature in °C.
    pub async fn read<I: I2c>(&self, i2c: &mut I) -> Result<f32, SensorError> {
        let mut buf = [0u8; 2];
        i2c.write_read(self.addr, &[REG_AMBIENT_TEMP], &mut buf)
            .await
            .map_err(|_| SensorError::Bus)?;
        Ok(decode_ambient(u16::from_be_bytes(buf)))
    }
}

/// The station's single MCP9808 slot.
pub struct Mcp9808Slot {
    driver: Option<Mcp9808>,
}

impl Mcp9808Slot {
    pub const fn new() -> Self {
        Self { driver: None }
    }

    pub fn exists(&self) -> bool {
        self.driver.is_some()
    }

    pub async fn init<I: I2c>(&mut self, i2c: &mut I, status: &mut StatusBits) {
        match Mcp9808::begin(i2c, MCP9808_ADDRESS_1).await {
            Ok(drv) => {
                self.driver = Some(drv);
                status.clear(SSB_MCP_1);
                info!("MCP1 OK");
            }
            Err(e) => {
                self.driver = None;
                status.set(SSB_MCP_1);
                warn!("MCP1 NF: {e}");
            }
        }
    }

    /// Raw temperature, NaN on a mid-cycle bus failure so QC substitutes the
    /// sentinel. `None` while absent.
    pub async fn read<I: I2c>(&self, i2c: &mut I) -> Option<f32> {
        let drv = self.driver.as_ref()?;
        match drv.read(i2c).await {
            Ok(celsius) => Some(celsius),
            Err(e) => {
                warn!("MCP1 read failed: {e}");
                Some(f32::NAN)
            }
        }
    }
}

impl Default for Mcp9808Slot {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::testutil::FakeChip;
    use embassy_futures::block_on;

    #[test]
    fn decode_positive_temperature() {
        // +25.25 °C = 0x0194
        assert_eq!(decode_ambient(0x0194), 25.25);
    }

    #[test]
    fn decode_negative_temperature() {
        // -0.0625 °C: sign bit set, magnitude 255.9375
        assert_eq!(decode_ambient(0x1FFF), -0.0625);
    }

    #[test]
    fn decode_masks_alert_flags() {
        // upper three alert bits must not disturb the value
        assert_eq!(decode_ambient(0xE194), 25.25);
    }

    #[test]
    fn begin_accepts_genuine_part() {
        let mut chip = FakeChip::new(
            MCP9808_ADDRESS_1,
            &[(0x06, &[0x00, 0x54]), (0x07, &[0x04, 0x00])],
        );
        assert!(block_on(Mcp9808::begin(&mut chip, MCP9808_ADDRESS_1)).is_ok());
    }

    #[test]
    fn begin_rejects_imposter() {
        let mut chip = FakeChip::new(
            MCP9808_ADDRESS_1,
            &[(0x06, &[0x12, 0x34]), (0x07, &[0x04, 0x00])],
        );
        let err = block_on(Mcp9808::begin(&mut chip, MCP9808_ADDRESS_1))
            .map(|_| ())
            .unwrap_err();
        assert_eq!(err, SensorError::BadId(0x34));
    }

    #[test]
    fn read_decodes_register() {
        let mut chip = FakeChip::new(MCP9808_ADDRESS_1, &[(0x05, &[0x01, 0x94])]);
        let drv = Mcp9808 {
            addr: MCP9808_ADDRESS_1,
        };
        assert_eq!(block_on(drv.read(&mut chip)), Ok(25.25));
    }
}
