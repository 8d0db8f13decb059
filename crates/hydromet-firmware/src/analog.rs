//! ADC front ends for the stream gauge and the battery divider.

use esp_hal::Blocking;
use esp_hal::analog::adc::{Adc, AdcChannel, AdcPin};
use esp_hal::peripherals::{ADC1, ADC2};
use hydromet_core::io::{AnalogSource, BatterySource};
use log::warn;

/// Bounded retry for a oneshot conversion still in flight.
const READ_ATTEMPTS: u32 = 1000;

/// The S3 converter is 12-bit but the gauge mm-per-count table is calibrated
/// for 10-bit counts ([`hydromet_core::gauge::SG_COUNT_MAX`]); shift down so
/// one count stays one 5/10 mm unit.
const GAUGE_COUNT_SHIFT: u16 = 2;

/// 12-bit converter, 11 dB attenuation.
const COUNTS_FULL_SCALE: f32 = 4095.0;
const VOLTS_FULL_SCALE: f32 = 3.3;

/// The battery sits behind a 2:1 resistor divider.
const BATTERY_DIVIDER: f32 = 2.0;

/// Ultrasonic stream gauge on ADC1, raw converter counts.
pub struct GaugeSensor<PIN> {
    adc: Adc<'static, ADC1<'static>, Blocking>,
    pin: AdcPin<PIN, ADC1<'static>>,
}

impl<PIN: AdcChannel> GaugeSensor<PIN> {
    pub fn new(
        adc: Adc<'static, ADC1<'static>, Blocking>,
        pin: AdcPin<PIN, ADC1<'static>>,
    ) -> Self {
        Self { adc, pin }
    }
}

impl<PIN: AdcChannel> AnalogSource for GaugeSensor<PIN> {
    fn read_counts(&mut self) -> u16 {
        for _ in 0..READ_ATTEMPTS {
            if let Ok(counts) = self.adc.read_oneshot(&mut self.pin) {
                return counts >> GAUGE_COUNT_SHIFT;
            }
        }
        warn!("SG conversion never completed");
        0
    }
}

/// Battery divider on ADC2, scaled to volts.
pub struct BatteryMonitor<PIN> {
    adc: Adc<'static, ADC2<'static>, Blocking>,
    pin: AdcPin<PIN, ADC2<'static>>,
}

impl<PIN: AdcChannel> BatteryMonitor<PIN> {
    pub fn new(
        adc: Adc<'static, ADC2<'static>, Blocking>,
        pin: AdcPin<PIN, ADC2<'static>>,
    ) -> Self {
        Self { adc, pin }
    }
}

impl<PIN: AdcChannel> BatteryMonitor<PIN> {
    fn read_counts(&mut self) -> u16 {
        for _ in 0..READ_ATTEMPTS {
            if let Ok(counts) = self.adc.read_oneshot(&mut self.pin) {
                return counts;
            }
        }
        warn!("BV conversion never completed");
        0
    }
}

impl<PIN: AdcChannel> BatterySource for BatteryMonitor<PIN> {
    fn read_volts(&mut self) -> f32 {
        let counts = self.read_counts();
        counts as f32 / COUNTS_FULL_SCALE * VOLTS_FULL_SCALE * BATTERY_DIVIDER
    }
}
