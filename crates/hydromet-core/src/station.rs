//! Station context and the observation cycle.
//!
//! All sensor-presence state and the status bitmask live in one explicit
//! [`Station`] struct handed to the acquisition and assembly functions; there
//! is a single thread of control, so call order is the only synchronization.

use embedded_hal_async::i2c::I2c;
use log::{info, warn};

use crate::config::StationConfig;
use crate::gauge::StreamGauge;
use crate::io::{AnalogSource, BatterySource, ObservationLog, TimeSource, TransmitSink};
use crate::observation::{BoschObs, ObservationRecord};
use crate::qc::{Quantity, filter};
use crate::sensors::bosch::{BMX_ADDRESS_1, BMX_ADDRESS_2, BoschReading, BoschSlot};
use crate::sensors::ds18b20::{Ds18b20, OneWireBus};
use crate::sensors::mcp9808::Mcp9808Slot;
use crate::status::{SSB_BMX_1, SSB_BMX_2, SSB_PWRON, SSB_RTC, SSB_SD, StatusBits};

fn qc_bosch(raw: BoschReading) -> BoschObs {
    BoschObs {
        pressure: filter(Quantity::Pressure, raw.pressure_hpa),
        temperature: filter(Quantity::Temperature, raw.temperature_c),
        humidity: filter(Quantity::Humidity, raw.humidity_pct),
    }
}

pub struct Station {
    pub bmx1: BoschSlot,
    pub bmx2: BoschSlot,
    pub mcp1: Mcp9808Slot,
    pub ds1: Ds18b20,
    pub gauge: StreamGauge,
    pub status: StatusBits,
}

impl Station {
    pub fn new(config: &StationConfig) -> Self {
        // power-on flag rides along until the first line goes out
        let mut status = StatusBits::new();
        status.set(SSB_PWRON);
        Self {
            bmx1: BoschSlot::new(BMX_ADDRESS_1, SSB_BMX_1),
            bmx2: BoschSlot::new(BMX_ADDRESS_2, SSB_BMX_2),
            mcp1: Mcp9808Slot::new(),
            ds1: Ds18b20::new(),
            gauge: StreamGauge::new(config.gauge_range),
            status,
        }
    }

    /// Full sensor bring-up at boot.
    pub async fn init<I: I2c, W: OneWireBus>(&mut self, i2c: &mut I, ow: &mut W) {
        info!("BMX:INIT");
        self.bmx1.init(i2c, &mut self.status).await;
        self.bmx2.init(i2c, &mut self.status).await;
        info!("MCP9808:INIT");
        self.mcp1.init(i2c, &mut self.status).await;
        info!("DS:INIT");
        self.ds1.init(ow, &mut self.status).await;
    }

    /// Periodic hot-swap recheck for the I2C pressure slots. Idempotent and
    /// side-effect-free when nothing changed on the bus.
    pub async fn recheck<I: I2c>(&mut self, i2c: &mut I) {
        self.bmx1.recheck(i2c, &mut self.status).await;
        self.bmx2.recheck(i2c, &mut self.status).await;
    }

    /// Collect one observation: gauge median, every present sensor's read
    /// path, QC filtering, assembly.
    ///
    /// Returns `None` (and skips the cycle) while the wall clock has never
    /// been set; the record is meaningless without its timestamp.
    pub async fn observe<I, W, A, B, C>(
        &mut self,
        i2c: &mut I,
        ow: &mut W,
        adc: &mut A,
        battery: &mut B,
        clock: &mut C,
    ) -> Option<ObservationRecord>
    where
        I: I2c,
        W: OneWireBus,
        A: AnalogSource,
        B: BatterySource,
        C: TimeSource,
    {
        let Some(timestamp) = clock.timestamp() else {
            self.status.set(SSB_RTC);
            warn!("OBS: time not valid");
            return None;
        };
        self.status.clear(SSB_RTC);
        info!("OBS: collecting");

        // ~15 s spent reading the gauge
        let gauge_mm = self.gauge.read_median(adc).await;

        let bmx1 = self.bmx1.read(i2c).await.map(qc_bosch);
        let bmx2 = self.bmx2.read(i2c).await.map(qc_bosch);
        let mcp1 = self
            .mcp1
            .read(i2c)
            .await
            .map(|celsius| filter(Quantity::Temperature, celsius));
        let ds1 = if self.ds1.found() {
            let reading = self.ds1.read(ow).await;
            Some(filter(Quantity::Temperature, reading.value))
        } else {
            None
        };
        let battery_v = battery.read_volts();

        Some(ObservationRecord {
            timestamp,
            gauge_mm,
            bmx1,
            bmx2,
            mcp1,
            ds1,
            battery_v,
            status: self.status.value(),
        })
    }

    /// One full observation cycle: collect, render, persist, transmit.
    ///
    /// The rendered line always goes to the transmission sink; it goes to
    /// the persistence sink only when `log_obs` is set. Sink failures are
    /// absorbed into the status bitmask and reported with the *next*
    /// observation.
    #[allow(clippy::too_many_arguments, reason = "one seam per collaborator")]
    pub async fn obs_do<I, W, A, B, C, TX, L>(
        &mut self,
        i2c: &mut I,
        ow: &mut W,
        adc: &mut A,
        battery: &mut B,
        clock: &mut C,
        uplink: &mut TX,
        obs_log: &mut L,
        log_obs: bool,
    ) where
        I: I2c,
        W: OneWireBus,
        A: AnalogSource,
        B: BatterySource,
        C: TimeSource,
        TX: TransmitSink,
        L: ObservationLog,
    {
        let Some(record) = self.observe(i2c, ow, adc, battery, clock).await else {
            return;
        };
        let line = match record.render() {
            Ok(line) => line,
            Err(_) => {
                warn!("OBS: record overflowed message buffer");
                return;
            }
        };

        if log_obs {
            match obs_log.append(&record.timestamp, &line).await {
                Ok(()) => self.status.clear(SSB_SD),
                Err(e) => {
                    self.status.set(SSB_SD);
                    warn!("OBS log append failed: {e}");
                }
            }
        }
        match uplink.send(&line).await {
            Ok(()) => self.status.clear(SSB_PWRON),
            Err(e) => warn!("OBS uplink send failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qc_applies_uniformly_per_quantity() {
        let obs = qc_bosch(BoschReading {
            pressure_hpa: 1013.25,
            temperature_c: 85.0,
            humidity_pct: f32::NAN,
        });
        assert_eq!(obs.pressure, 1013.25);
        assert_eq!(obs.temperature, Quantity::Temperature.error_value());
        assert_eq!(obs.humidity, Quantity::Humidity.error_value());
    }

    #[test]
    fn bmp_style_zero_humidity_survives_qc() {
        // parts without a humidity element report 0.0, which is in range
        let obs = qc_bosch(BoschReading {
            pressure_hpa: 998.7,
            temperature_c: 23.5,
            humidity_pct: 0.0,
        });
        assert_eq!(obs.humidity, 0.0);
    }
}
