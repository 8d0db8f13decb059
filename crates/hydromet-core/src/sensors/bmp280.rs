//! BMP280 / BME280 register-level driver.
//!
//! Both parts share the calibration block at 0x88 and the burst data window
//! at 0xF7; the BME280 adds the humidity calibration split across 0xA1 and
//! 0xE1..0xE7. Compensation follows the vendor's double-precision reference
//! formulas, carried out in `f64` so the hPa value matches deployed stations.

use embedded_hal_async::i2c::I2c;
use log::debug;

use super::SensorError;

const REG_CHIP_ID: u8 = 0xD0;
const REG_CALIB_00: u8 = 0x88;
const REG_CALIB_H1: u8 = 0xA1;
const REG_CALIB_H2: u8 = 0xE1;
const REG_CTRL_HUM: u8 = 0xF2;
const REG_CTRL_MEAS: u8 = 0xF4;
const REG_CONFIG: u8 = 0xF5;
const REG_DATA: u8 = 0xF7;

/// osrs_t x2, osrs_p x16, normal mode
const CTRL_MEAS_NORMAL: u8 = 0x57;
/// osrs_h x16
const CTRL_HUM_X16: u8 = 0x05;

/// Temperature/pressure calibration words (0x88..0x9F, little-endian).
#[derive(Debug, Clone, Copy, Default)]
pub struct TpCalib {
    dig_t1: u16,
    dig_t2: i16,
    dig_t3: i16,
    dig_p1: u16,
    dig_p2: i16,
    dig_p3: i16,
    dig_p4: i16,
    dig_p5: i16,
    dig_p6: i16,
    dig_p7: i16,
    dig_p8: i16,
    dig_p9: i16,
}

impl TpCalib {
    fn parse(raw: &[u8; 24]) -> Self {
        let le16 = |i: usize| u16::from_le_bytes([raw[i], raw[i + 1]]);
        Self {
            dig_t1: le16(0),
            dig_t2: le16(2) as i16,
            dig_t3: le16(4) as i16,
            dig_p1: le16(6),
            dig_p2: le16(8) as i16,
            dig_p3: le16(10) as i16,
            dig_p4: le16(12) as i16,
            dig_p5: le16(14) as i16,
            dig_p6: le16(16) as i16,
            dig_p7: le16(18) as i16,
            dig_p8: le16(20) as i16,
            dig_p9: le16(22) as i16,
        }
    }
}

/// Humidity calibration words (BME280 only).
#[derive(Debug, Clone, Copy, Default)]
pub struct HumCalib {
    dig_h1: u8,
    dig_h2: i16,
    dig_h3: u8,
    dig_h4: i16,
    dig_h5: i16,
    dig_h6: i8,
}

impl HumCalib {
    fn parse(h1: u8, raw: &[u8; 7]) -> Self {
        Self {
            dig_h1: h1,
            dig_h2: i16::from_le_bytes([raw[0], raw[1]]),
            dig_h3: raw[2],
            dig_h4: ((raw[3] as i16) << 4) | (raw[4] & 0x0F) as i16,
            dig_h5: ((raw[5] as i16) << 4) | (raw[4] >> 4) as i16,
            dig_h6: raw[6] as i8,
        }
    }
}

/// Shared t_fine computation; returns (t_fine, °C).
pub(crate) fn compensate_temperature(calib: &TpCalib, adc_t: i32) -> (f64, f32) {
    let t1 = calib.dig_t1 as f64;
    let t2 = calib.dig_t2 as f64;
    let t3 = calib.dig_t3 as f64;
    let var1 = (adc_t as f64 / 16384.0 - t1 / 1024.0) * t2;
    let var2 = adc_t as f64 / 131072.0 - t1 / 8192.0;
    let var2 = var2 * var2 * t3;
    let t_fine = var1 + var2;
    (t_fine, (t_fine / 5120.0) as f32)
}

/// Pressure in Pa from the 20-bit raw sample.
pub(crate) fn compensate_pressure(calib: &TpCalib, t_fine: f64, adc_p: i32) -> f32 {
    let mut var1 = t_fine / 2.0 - 64000.0;
    let mut var2 = var1 * var1 * calib.dig_p6 as f64 / 32768.0;
    var2 += var1 * calib.dig_p5 as f64 * 2.0;
    var2 = var2 / 4.0 + calib.dig_p4 as f64 * 65536.0;
    var1 = (calib.dig_p3 as f64 * var1 * var1 / 524288.0 + calib.dig_p2 as f64 * var1)
        / 524288.0;
    var1 = (1.0 + var1 / 32768.0) * calib.dig_p1 as f64;
    if var1 == 0.0 {
        // division by zero guard per the vendor reference
        return 0.0;
    }
    let mut p = 1048576.0 - adc_p as f64;
    p = (p - var2 / 4096.0) * 6250.0 / var1;
    var1 = calib.dig_p9 as f64 * p * p / 2147483648.0;
    var2 = p * calib.dig_p8 as f64 / 32768.0;
    p += (var1 + var2 + calib.dig_p7 as f64) / 16.0;
    p as f32
}

/// Relative humidity in % from the 16-bit raw sample (BME280).
pub(crate) fn compensate_humidity(calib: &HumCalib, t_fine: f64, adc_h: i32) -> f32 {
    let var_h = t_fine - 76800.0;
    let var_h = (adc_h as f64
        - (calib.dig_h4 as f64 * 64.0 + calib.dig_h5 as f64 / 16384.0 * var_h))
        * (calib.dig_h2 as f64 / 65536.0
            * (1.0
                + calib.dig_h6 as f64 / 67108864.0
                    * var_h
                    * (1.0 + calib.dig_h3 as f64 / 67108864.0 * var_h)));
    let var_h = var_h * (1.0 - calib.dig_h1 as f64 * var_h / 524288.0);
    (var_h.clamp(0.0, 100.0)) as f32
}

fn split_raw(buf: &[u8; 8]) -> (i32, i32, i32) {
    let adc_p = ((buf[0] as i32) << 12) | ((buf[1] as i32) << 4) | ((buf[2] as i32) >> 4);
    let adc_t = ((buf[3] as i32) << 12) | ((buf[4] as i32) << 4) | ((buf[5] as i32) >> 4);
    let adc_h = ((buf[6] as i32) << 8) | buf[7] as i32;
    (adc_p, adc_t, adc_h)
}

async fn read_calib<I: I2c>(i2c: &mut I, addr: u8) -> Result<TpCalib, SensorError> {
    let mut raw = [0u8; 24];
    i2c.write_read(addr, &[REG_CALIB_00], &mut raw)
        .await
        .map_err(|_| SensorError::Bus)?;
    Ok(TpCalib::parse(&raw))
}

pub struct Bmp280 {
    addr: u8,
    calib: TpCalib,
}

impl Bmp280 {
    /// Verify the chip ID, load calibration, and start normal-mode sampling.
    pub async fn begin<I: I2c>(i2c: &mut I, addr: u8) -> Result<Self, SensorError> {
        let mut id = [0u8; 1];
        i2c.write_read(addr, &[REG_CHIP_ID], &mut id)
            .await
            .map_err(|_| SensorError::Bus)?;
        if id[0] != super::bosch::BMP280_CHIP_ID {
            return Err(SensorError::BadId(id[0]));
        }
        let calib = read_calib(i2c, addr).await?;
        i2c.write(addr, &[REG_CONFIG, 0x00])
            .await
            .map_err(|_| SensorError::Bus)?;
        i2c.write(addr, &[REG_CTRL_MEAS, CTRL_MEAS_NORMAL])
            .await
            .map_err(|_| SensorError::Bus)?;
        debug!("BMP280 begin ok at {addr:#04x}");
        Ok(Self { addr, calib })
    }

    /// (temperature °C, pressure Pa)
    pub async fn read<I: I2c>(&self, i2c: &mut I) -> Result<(f32, f32), SensorError> {
        let mut buf = [0u8; 8];
        i2c.write_read(self.addr, &[REG_DATA], &mut buf[..6])
            .await
            .map_err(|_| SensorError::Bus)?;
        let (adc_p, adc_t, _) = split_raw(&buf);
        let (t_fine, temp) = compensate_temperature(&self.calib, adc_t);
        Ok((temp, compensate_pressure(&self.calib, t_fine, adc_p)))
    }
}

pub struct Bme280 {
    addr: u8,
    calib: TpCalib,
    hum: HumCalib,
}

impl Bme280 {
    /// Verify the chip ID, load both calibration blocks, and start
    /// normal-mode sampling with humidity enabled.
    pub async fn begin<I: I2c>(i2c: &mut I, addr: u8) -> Result<Self, SensorError> {
        let mut id = [0u8; 1];
        i2c.write_read(addr, &[REG_CHIP_ID], &mut id)
            .await
            .map_err(|_| SensorError::Bus)?;
        // a BMP390 reports the same 0x60; it has no humidity calibration and
        // the caller falls through to the BMP3xx driver on this error
        if id[0] != super::bosch::BME280_BMP390_CHIP_ID {
            return Err(SensorError::BadId(id[0]));
        }
        let calib = read_calib(i2c, addr).await?;
        let mut h1 = [0u8; 1];
        i2c.write_read(addr, &[REG_CALIB_H1], &mut h1)
            .await
            .map_err(|_| SensorError::Bus)?;
        let mut h_rest = [0u8; 7];
        i2c.write_read(addr, &[REG_CALIB_H2], &mut h_rest)
            .await
            .map_err(|_| SensorError::Bus)?;
        let hum = HumCalib::parse(h1[0], &h_rest);
        // ctrl_hum writes only latch after a ctrl_meas write
        i2c.write(addr, &[REG_CTRL_HUM, CTRL_HUM_X16])
            .await
            .map_err(|_| SensorError::Bus)?;
        i2c.write(addr, &[REG_CONFIG, 0x00])
            .await
            .map_err(|_| SensorError::Bus)?;
        i2c.write(addr, &[REG_CTRL_MEAS, CTRL_MEAS_NORMAL])
            .await
            .map_err(|_| SensorError::Bus)?;
        debug!("BME280 begin ok at {addr:#04x}");
        Ok(Self { addr, calib, hum })
    }

    /// (temperature °C, pressure Pa, relative humidity %)
    pub async fn read<I: I2c>(&self, i2c: &mut I) -> Result<(f32, f32, f32), SensorError> {
        let mut buf = [0u8; 8];
        i2c.write_read(self.addr, &[REG_DATA], &mut buf)
            .await
            .map_err(|_| SensorError::Bus)?;
        let (adc_p, adc_t, adc_h) = split_raw(&buf);
        let (t_fine, temp) = compensate_temperature(&self.calib, adc_t);
        let pressure = compensate_pressure(&self.calib, t_fine, adc_p);
        let humidity = compensate_humidity(&self.hum, t_fine, adc_h);
        Ok((temp, pressure, humidity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Vendor datasheet worked example (section "compensation formulas").
    fn sample_calib() -> TpCalib {
        TpCalib {
            dig_t1: 27504,
            dig_t2: 26435,
            dig_t3: -1000,
            dig_p1: 36477,
            dig_p2: -10685,
            dig_p3: 3024,
            dig_p4: 2855,
            dig_p5: 140,
            dig_p6: -7,
            dig_p7: 15500,
            dig_p8: -14600,
            dig_p9: 6000,
        }
    }

    #[test]
    fn datasheet_temperature_example() {
        let (_, temp) = compensate_temperature(&sample_calib(), 519888);
        assert!((temp - 25.08).abs() < 0.01, "got {temp}");
    }

    #[test]
    fn datasheet_pressure_example() {
        let calib = sample_calib();
        let (t_fine, _) = compensate_temperature(&calib, 519888);
        let p = compensate_pressure(&calib, t_fine, 415148);
        assert!((p - 100653.27).abs() < 1.0, "got {p}");
    }

    #[test]
    fn raw_sample_unpacking() {
        // 20-bit values sit left-aligned in three bytes each
        let buf = [0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00, 0x7A, 0x12];
        let (adc_p, adc_t, adc_h) = split_raw(&buf);
        assert_eq!(adc_p, (0x65 << 12) | (0x5A << 4) | 0x0C);
        assert_eq!(adc_t, (0x7E << 12) | (0xED << 4) | 0x00);
        assert_eq!(adc_h, 0x7A12);
    }

    #[test]
    fn humidity_calib_nibble_split() {
        // H4/H5 share byte E5: H4 = E4<<4 | E5[3:0], H5 = E6<<4 | E5[7:4]
        let hum = HumCalib::parse(75, &[0x6A, 0x01, 0x00, 0x14, 0x2F, 0x03, 0x1E]);
        assert_eq!(hum.dig_h2, 0x016A);
        assert_eq!(hum.dig_h4, (0x14 << 4) | 0x0F);
        assert_eq!(hum.dig_h5, (0x03 << 4) | 0x02);
        assert_eq!(hum.dig_h6, 0x1E);
    }
}
