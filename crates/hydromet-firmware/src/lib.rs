//! ESP32-S3 hardware bindings for the hydromet station.
//!
//! Everything here is a thin implementation of a `hydromet-core` trait over
//! an `esp-hal` peripheral: the ADC front ends, the bit-banged One-Wire pin,
//! the soft wall clock, the UART uplink, and the SD card observation log.

#![no_std]

pub mod analog;
pub mod clock;
pub mod one_wire;
pub mod sd_log;
pub mod uplink;
