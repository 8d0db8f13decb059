//! Read-only diagnostic view of the station.
//!
//! Four fixed-width lines suitable for a small character display or a serial
//! console: wall-clock time, both Bosch slots, and a summary line with the
//! raw gauge counts, battery voltage, and the status bitmask in hex. Values
//! here are raw sensor output, not QC-filtered; the point of the view is to
//! see what the hardware is actually saying.

use core::fmt::Write;

use embedded_hal_async::i2c::I2c;
use heapless::String;

use crate::io::{AnalogSource, BatterySource, TimeSource, Timestamp};
use crate::observation::push_fixed2;
use crate::sensors::bosch::BoschReading;
use crate::station::Station;

/// Display width in characters; longer renderings are clipped.
pub const MONITOR_WIDTH: usize = 21;

pub type MonitorLine = String<MONITOR_WIDTH>;

/// One rendered diagnostic snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorFrame {
    pub lines: [MonitorLine; 4],
}

/// Clip a scratch rendering to the display width.
fn clip(full: &str) -> MonitorLine {
    let mut line = MonitorLine::new();
    for ch in full.chars().take(MONITOR_WIDTH) {
        // cannot fail: take() bounds the length
        let _ = line.push(ch);
    }
    line
}

fn time_line(timestamp: Option<&Timestamp>) -> MonitorLine {
    match timestamp {
        Some(at) => clip(at),
        None => clip("TIME NOT SET"),
    }
}

/// `<p> <t> <h>` for a populated slot, `BMX<n>:NF` otherwise.
fn sensor_line(index: usize, reading: Option<BoschReading>) -> MonitorLine {
    let mut scratch: String<64> = String::new();
    match reading {
        None => {
            let _ = write!(scratch, "BMX{index}:NF");
        }
        Some(obs) => {
            let _ = push_fixed2(&mut scratch, obs.pressure_hpa);
            let _ = scratch.push(' ');
            let _ = push_fixed2(&mut scratch, obs.temperature_c);
            let _ = scratch.push(' ');
            let _ = push_fixed2(&mut scratch, obs.humidity_pct);
        }
    }
    clip(&scratch)
}

fn summary_line(counts: u16, battery_v: f32, status: u32) -> MonitorLine {
    let mut scratch: String<64> = String::new();
    let _ = write!(scratch, "SG:{counts:3} ");
    let _ = push_fixed2(&mut scratch, battery_v);
    let _ = write!(scratch, " {status:04X}");
    clip(&scratch)
}

/// Render one diagnostic frame from live sensor reads.
///
/// The gauge line shows a single raw conversion, not the median; the frame
/// is a spot check, not an observation.
pub async fn render_frame<I, A, B, C>(
    station: &Station,
    i2c: &mut I,
    adc: &mut A,
    battery: &mut B,
    clock: &mut C,
) -> MonitorFrame
where
    I: I2c,
    A: AnalogSource,
    B: BatterySource,
    C: TimeSource,
{
    let bmx1 = station.bmx1.read(i2c).await;
    let bmx2 = station.bmx2.read(i2c).await;
    MonitorFrame {
        lines: [
            time_line(clock.timestamp().as_ref()),
            sensor_line(1, bmx1),
            sensor_line(2, bmx2),
            summary_line(adc.read_counts(), battery.read_volts(), station.status.value()),
        ],
    }
}
