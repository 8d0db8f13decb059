//! Soft wall clock.
//!
//! There is no battery-backed RTC on the board; the clock is a Unix epoch
//! anchor paired with the monotonic `embassy_time::Instant` it was set at,
//! synced over the serial console. Until the first sync the clock reports
//! no time and the station skips observations.

use core::cell::Cell;
use core::fmt::Write;

use critical_section::Mutex;
use embassy_time::Instant;
use hydromet_core::io::{TimeSource, Timestamp};
use log::info;

#[derive(Clone, Copy)]
struct SyncPoint {
    unix: u64,
    at: Instant,
}

static WALL_CLOCK: Mutex<Cell<Option<SyncPoint>>> = Mutex::new(Cell::new(None));

/// Gregorian date from days since the Unix epoch.
fn civil_from_days(days: i64) -> (i32, u8, u8) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year as i32, month as u8, day as u8)
}

/// Broken-down UTC time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CivilTime {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

fn civil_from_unix(unix: u64) -> CivilTime {
    let (year, month, day) = civil_from_days((unix / 86_400) as i64);
    let secs_of_day = unix % 86_400;
    CivilTime {
        year,
        month,
        day,
        hours: (secs_of_day / 3600) as u8,
        minutes: (secs_of_day % 3600 / 60) as u8,
        seconds: (secs_of_day % 60) as u8,
    }
}

/// Copyable handle to the shared clock state. Every subsystem that needs
/// time (observation loop, SD card timestamps) holds its own copy.
#[derive(Clone, Copy, Default)]
pub struct Clock;

impl Clock {
    pub const fn new() -> Self {
        Self
    }

    /// Anchor the clock to a Unix epoch second, as of now.
    pub fn set_unix_time(&self, unix: u64) {
        critical_section::with(|cs| {
            WALL_CLOCK.borrow(cs).set(Some(SyncPoint {
                unix,
                at: Instant::now(),
            }));
        });
        info!("RTC set to {unix}");
    }

    pub fn is_set(&self) -> bool {
        critical_section::with(|cs| WALL_CLOCK.borrow(cs).get()).is_some()
    }

    /// Current UTC time, `None` until the first sync.
    pub fn now(&self) -> Option<CivilTime> {
        let sync = critical_section::with(|cs| WALL_CLOCK.borrow(cs).get())?;
        let unix = sync.unix + sync.at.elapsed().as_secs();
        Some(civil_from_unix(unix))
    }
}

impl TimeSource for Clock {
    fn timestamp(&mut self) -> Option<Timestamp> {
        let now = self.now()?;
        let mut out = Timestamp::new();
        write!(
            out,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
            now.year, now.month, now.day, now.hours, now.minutes, now.seconds
        )
        .ok()?;
        Some(out)
    }
}

impl embedded_sdmmc::TimeSource for Clock {
    fn get_timestamp(&self) -> embedded_sdmmc::Timestamp {
        match self.now() {
            Some(now) => embedded_sdmmc::Timestamp {
                year_since_1970: (now.year - 1970).clamp(0, 255) as u8,
                zero_indexed_month: now.month - 1,
                zero_indexed_day: now.day - 1,
                hours: now.hours,
                minutes: now.minutes,
                seconds: now.seconds,
            },
            None => embedded_sdmmc::Timestamp {
                year_since_1970: 0,
                zero_indexed_month: 0,
                zero_indexed_day: 0,
                hours: 0,
                minutes: 0,
                seconds: 0,
            },
        }
    }
}

/// Parse a `T<unix-seconds>` console sync line.
pub fn parse_time_sync(line: &str) -> Option<u64> {
    let digits = line.strip_prefix('T')?.trim_end();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
