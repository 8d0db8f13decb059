//! BMP388 / BMP390 register-level driver.
//!
//! The two parts differ only in chip ID (0x50 vs 0x60) and share the NVM
//! calibration block at 0x31 and the 6-byte data window at 0x04.
//! Compensation follows the vendor's floating-point reference formulas.

use embedded_hal_async::i2c::I2c;
use log::debug;

use super::SensorError;

const REG_CHIP_ID: u8 = 0x00;
const REG_DATA: u8 = 0x04;
const REG_PWR_CTRL: u8 = 0x1B;
const REG_CALIB: u8 = 0x31;

/// press_en | temp_en | normal mode
const PWR_CTRL_NORMAL: u8 = 0x33;

/// Calibration coefficients, already converted to the floating-point form
/// the compensation formulas use.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bmp3xxCalib {
    par_t1: f64,
    par_t2: f64,
    par_t3: f64,
    par_p1: f64,
    par_p2: f64,
    par_p3: f64,
    par_p4: f64,
    par_p5: f64,
    par_p6: f64,
    par_p7: f64,
    par_p8: f64,
    par_p9: f64,
    par_p10: f64,
    par_p11: f64,
}

impl Bmp3xxCalib {
    fn parse(raw: &[u8; 21]) -> Self {
        let le16 = |i: usize| u16::from_le_bytes([raw[i], raw[i + 1]]);
        let t1 = le16(0) as f64;
        let t2 = le16(2) as f64;
        let t3 = raw[4] as i8 as f64;
        let p1 = le16(5) as i16 as f64;
        let p2 = le16(7) as i16 as f64;
        let p3 = raw[9] as i8 as f64;
        let p4 = raw[10] as i8 as f64;
        let p5 = le16(11) as f64;
        let p6 = le16(13) as f64;
        let p7 = raw[15] as i8 as f64;
        let p8 = raw[16] as i8 as f64;
        let p9 = le16(17) as i16 as f64;
        let p10 = raw[19] as i8 as f64;
        let p11 = raw[20] as i8 as f64;
        Self {
            par_t1: t1 * 256.0,
            par_t2: t2 / 1_073_741_824.0,
            par_t3: t3 / 281_474_976_710_656.0,
            par_p1: (p1 - 16384.0) / 1_048_576.0,
            par_p2: (p2 - 16384.0) / 536_870_912.0,
            par_p3: p3 / 4_294_967_296.0,
            par_p4: p4 / 137_438_953_472.0,
            par_p5: p5 * 8.0,
            par_p6: p6 / 64.0,
            par_p7: p7 / 256.0,
            par_p8: p8 / 32768.0,
            par_p9: p9 / 281_474_976_710_656.0,
            par_p10: p10 / 281_474_976_710_656.0,
            par_p11: p11 / 36_893_488_147_419_103_232.0,
        }
    }
}

/// Linearized temperature in °C.
pub(crate) fn compensate_temperature(calib: &Bmp3xxCalib, raw_t: u32) -> f64 {
    let partial1 = raw_t as f64 - calib.par_t1;
    let partial2 = partial1 * calib.par_t2;
    partial2 + partial1 * partial1 * calib.par_t3
}

/// Pressure in Pa, given the linearized temperature.
pub(crate) fn compensate_pressure(calib: &Bmp3xxCalib, raw_p: u32, t_lin: f64) -> f32 {
    let p = raw_p as f64;

    let partial1 = calib.par_p6 * t_lin;
    let partial2 = calib.par_p7 * t_lin * t_lin;
    let partial3 = calib.par_p8 * t_lin * t_lin * t_lin;
    let out1 = calib.par_p5 + partial1 + partial2 + partial3;

    let partial1 = calib.par_p2 * t_lin;
    let partial2 = calib.par_p3 * t_lin * t_lin;
    let partial3 = calib.par_p4 * t_lin * t_lin * t_lin;
    let out2 = p * (calib.par_p1 + partial1 + partial2 + partial3);

    let partial1 = p * p;
    let partial2 = calib.par_p9 + calib.par_p10 * t_lin;
    let partial3 = partial1 * partial2;
    let partial4 = partial3 + p * p * p * calib.par_p11;

    (out1 + out2 + partial4) as f32
}

pub struct Bmp3xx {
    addr: u8,
    calib: Bmp3xxCalib,
}

impl Bmp3xx {
    /// Verify the chip ID (either part), load calibration, and enable
    /// normal-mode pressure+temperature sampling.
    pub async fn begin<I: I2c>(i2c: &mut I, addr: u8) -> Result<Self, SensorError> {
        let mut id = [0u8; 1];
        i2c.write_read(addr, &[REG_CHIP_ID], &mut id)
            .await
            .map_err(|_| SensorError::Bus)?;
        if id[0] != super::bosch::BMP388_CHIP_ID && id[0] != super::bosch::BME280_BMP390_CHIP_ID
        {
            return Err(SensorError::BadId(id[0]));
        }
        let mut raw = [0u8; 21];
        i2c.write_read(addr, &[REG_CALIB], &mut raw)
            .await
            .map_err(|_| SensorError::Bus)?;
        let calib = Bmp3xxCalib::parse(&raw);
        i2c.write(addr, &[REG_PWR_CTRL, PWR_CTRL_NORMAL])
            .await
            .map_err(|_| SensorError::Bus)?;
        debug!("BMP3xx begin ok at {addr:#04x} (id {:#04x})", id[0]);
        Ok(Self { addr, calib })
    }

    /// (temperature °C, pressure Pa)
    pub async fn read<I: I2c>(&self, i2c: &mut I) -> Result<(f32, f32), SensorError> {
        let mut buf = [0u8; 6];
        i2c.write_read(self.addr, &[REG_DATA], &mut buf)
            .await
            .map_err(|_| SensorError::Bus)?;
        let raw_p = u32::from_le_bytes([buf[0], buf[1], buf[2], 0]);
        let raw_t = u32::from_le_bytes([buf[3], buf[4], buf[5], 0]);
        let t_lin = compensate_temperature(&self.calib, raw_t);
        let pressure = compensate_pressure(&self.calib, raw_p, t_lin);
        Ok((t_lin as f32, pressure))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calib_parse_layout() {
        let mut raw = [0u8; 21];
        // T1 = 0x6C27, T3 = -5, P1 = 0x00F6, P11 = 0xF4 (-12)
        raw[0] = 0x27;
        raw[1] = 0x6C;
        raw[4] = 0xFB;
        raw[5] = 0xF6;
        raw[6] = 0x00;
        raw[20] = 0xF4;
        let calib = Bmp3xxCalib::parse(&raw);
        assert_eq!(calib.par_t1, 0x6C27 as f64 * 256.0);
        assert_eq!(calib.par_t3, -5.0 / 281_474_976_710_656.0);
        assert_eq!(calib.par_p1, (246.0 - 16384.0) / 1_048_576.0);
        assert_eq!(calib.par_p11, -12.0 / 36_893_488_147_419_103_232.0);
    }

    #[test]
    fn temperature_is_zero_at_par_t1() {
        let mut raw = [0u8; 21];
        raw[0] = 0x00;
        raw[1] = 0x01; // T1 = 256 -> par_t1 = 65536
        let calib = Bmp3xxCalib::parse(&raw);
        assert_eq!(compensate_temperature(&calib, 65536), 0.0);
    }
}
