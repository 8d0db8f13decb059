//! Hardware-independent core library for hydromet-rs
//!
//! This crate contains all platform-agnostic logic for the hydromet stream
//! gauge station: Bosch chip identification, sensor drivers generic over the
//! `embedded-hal-async` bus traits, QC range filtering, median-filtered
//! analog sampling, and observation assembly.
//!
//! It is `#![no_std]` so it compiles on both embedded targets (ESP32-S3) and
//! desktop hosts (for unit tests).

#![no_std]

pub mod config;
pub mod gauge;
pub mod io;
pub mod monitor;
pub mod observation;
pub mod qc;
pub mod sensors;
pub mod station;
pub mod status;
