//! Trait seams for the station's external collaborators.
//!
//! The RTC, the analog front end, the transmission link, and the SD card
//! observation log are all thin wrappers over existing hardware/libraries.
//! The core only sees these traits; the firmware crate provides the real
//! implementations.

use thiserror_no_std::Error;

/// Formatted wall-clock time, `YYYY-MM-DDTHH:MM:SS`.
pub type Timestamp = heapless::String<20>;

/// Source of valid wall-clock time. `None` until the RTC has been set.
pub trait TimeSource {
    fn timestamp(&mut self) -> Option<Timestamp>;
}

/// One analog channel, raw converter counts.
pub trait AnalogSource {
    fn read_counts(&mut self) -> u16;
}

/// Battery voltage monitor.
pub trait BatterySource {
    fn read_volts(&mut self) -> f32;
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    #[error("sink not available")]
    Unavailable,
    #[error("write failed")]
    WriteFailed,
}

/// Outbound send of one formatted observation line. No acknowledgment or
/// retry semantics at this level.
pub trait TransmitSink {
    async fn send(&mut self, line: &str) -> Result<(), SinkError>;
}

/// Append-only persistence of one formatted observation line to a dated log.
/// `timestamp` is the observation time the sink derives the log name from.
pub trait ObservationLog {
    async fn append(&mut self, timestamp: &str, line: &str) -> Result<(), SinkError>;
}
