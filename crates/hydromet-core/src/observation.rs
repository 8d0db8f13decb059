//! Observation record and its wire format.
//!
//! One record per polling cycle, rendered to a single-line JSON object with
//! a fixed key order:
//!
//! ```text
//! {"at":"2021-03-05T11:43:59","sg":49,"bp1":1013.25,"bt1":24.01,"bh1":40.20,"bv":3.50,"hth":9}
//! ```
//!
//! Absent sensors contribute no keys at all, so consumers must not assume a
//! fixed key set. Fractions are two digits, truncated toward zero via
//! integer-cast-then-modulo; the ingest side was calibrated against that
//! exact lossy rendering, so it is replicated rather than rounded.

use core::fmt::{self, Write};

use heapless::String;

use crate::io::Timestamp;

/// Upper bound for a fully populated record.
pub const MAX_MESSAGE_LEN: usize = 256;

/// QC-filtered values from one Bosch slot: hPa, °C, %RH.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoschObs {
    pub pressure: f32,
    pub temperature: f32,
    pub humidity: f32,
}

/// One assembled observation, built fresh per cycle and discarded after
/// rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRecord {
    pub timestamp: Timestamp,
    /// Median stream gauge distance, mm.
    pub gauge_mm: u32,
    pub bmx1: Option<BoschObs>,
    pub bmx2: Option<BoschObs>,
    /// MCP9808 temperature, °C.
    pub mcp1: Option<f32>,
    /// DS18B20 temperature, °C.
    pub ds1: Option<f32>,
    pub battery_v: f32,
    /// Raw status bitmask, rendered as a decimal integer.
    pub status: u32,
}

/// `<int>.<2-digit-fraction>`, truncated toward zero.
///
/// 25.996 renders as `25.99`. Negative values carry the sign on both parts
/// (`-2.-50`), matching the deployed formatter byte for byte.
pub fn push_fixed2<const N: usize>(out: &mut String<N>, value: f32) -> fmt::Result {
    let whole = value as i32;
    let frac = ((value * 100.0) as i32) % 100;
    write!(out, "{whole}.{frac:02}")
}

fn push_bosch<const N: usize>(
    out: &mut String<N>,
    index: usize,
    obs: &BoschObs,
) -> fmt::Result {
    write!(out, ",\"bp{index}\":")?;
    push_fixed2(out, obs.pressure)?;
    write!(out, ",\"bt{index}\":")?;
    push_fixed2(out, obs.temperature)?;
    write!(out, ",\"bh{index}\":")?;
    push_fixed2(out, obs.humidity)
}

impl ObservationRecord {
    /// Render the record to its single-line JSON form.
    pub fn render(&self) -> Result<String<MAX_MESSAGE_LEN>, fmt::Error> {
        let mut out = String::new();
        write!(out, "{{\"at\":\"{}\",\"sg\":{}", self.timestamp, self.gauge_mm)?;
        if let Some(obs) = &self.bmx1 {
            push_bosch(&mut out, 1, obs)?;
        }
        if let Some(obs) = &self.bmx2 {
            push_bosch(&mut out, 2, obs)?;
        }
        if let Some(celsius) = self.mcp1 {
            write!(out, ",\"mt1\":")?;
            push_fixed2(&mut out, celsius)?;
        }
        if let Some(celsius) = self.ds1 {
            write!(out, ",\"dt1\":")?;
            push_fixed2(&mut out, celsius)?;
        }
        write!(out, ",\"bv\":")?;
        push_fixed2(&mut out, self.battery_v)?;
        write!(out, ",\"hth\":{}}}", self.status)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::str::FromStr;

    fn at() -> Timestamp {
        Timestamp::from_str("2021-03-05T11:43:59").unwrap()
    }

    fn base_record() -> ObservationRecord {
        ObservationRecord {
            timestamp: at(),
            gauge_mm: 49,
            bmx1: None,
            bmx2: None,
            mcp1: None,
            ds1: None,
            battery_v: 3.5,
            status: 9,
        }
    }

    #[test]
    fn fixed2_truncates_toward_zero() {
        let mut out: String<16> = String::new();
        push_fixed2(&mut out, 25.996).unwrap();
        assert_eq!(out, "25.99");
    }

    #[test]
    fn fixed2_pads_fraction() {
        let mut out: String<16> = String::new();
        push_fixed2(&mut out, 3.5).unwrap();
        assert_eq!(out, "3.50");
    }

    #[test]
    fn fixed2_negative_keeps_legacy_shape() {
        let mut out: String<16> = String::new();
        push_fixed2(&mut out, -2.5).unwrap();
        assert_eq!(out, "-2.-50");
    }

    #[test]
    fn gauge_and_mcp_only() {
        let mut record = base_record();
        record.mcp1 = Some(25.0625);
        assert_eq!(
            record.render().unwrap(),
            "{\"at\":\"2021-03-05T11:43:59\",\"sg\":49,\"mt1\":25.06,\"bv\":3.50,\"hth\":9}"
        );
    }

    #[test]
    fn absent_sensors_contribute_no_keys() {
        let line = base_record().render().unwrap();
        for key in ["bp1", "bt1", "bh1", "bp2", "bt2", "bh2", "mt1", "dt1"] {
            assert!(!line.contains(key), "unexpected key {key} in {line}");
        }
    }

    #[test]
    fn fully_populated_key_order() {
        let mut record = base_record();
        record.bmx1 = Some(BoschObs {
            pressure: 1013.25,
            temperature: 24.0,
            humidity: 40.2,
        });
        record.bmx2 = Some(BoschObs {
            pressure: 998.7,
            temperature: 23.5,
            humidity: 0.0,
        });
        record.mcp1 = Some(25.0625);
        record.ds1 = Some(8.9375);
        let line = record.render().unwrap();

        let keys = ["at", "sg", "bp1", "bt1", "bh1", "bp2", "bt2", "bh2", "mt1", "dt1", "bv", "hth"];
        let mut last = 0;
        for key in keys {
            let needle = alloc_key(key);
            let pos = line[last..]
                .find(needle.as_str())
                .unwrap_or_else(|| panic!("key {key} missing or out of order in {line}"));
            last += pos;
        }
        assert!(line.starts_with('{') && line.ends_with('}'));
    }

    fn alloc_key(key: &str) -> String<8> {
        let mut s: String<8> = String::new();
        write!(s, "\"{key}\"").unwrap();
        s
    }
}
