//! Sensor drivers and shared sensor types.
//!
//! Every I2C driver is generic over [`embedded_hal_async::i2c::I2c`] and
//! borrows the bus per operation, so one bus instance serves all attached
//! parts. The one-wire probe goes through the byte-level [`ds18b20::OneWireBus`]
//! trait instead; bit timing lives in the firmware crate.

pub mod bmp280;
pub mod bmp3xx;
pub mod bosch;
pub mod ds18b20;
pub mod mcp9808;

use thiserror_no_std::Error;

/// One sensor reading for the current polling cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub value: f32,
    pub valid: bool,
}

impl Reading {
    pub const fn valid(value: f32) -> Self {
        Self { value, valid: true }
    }

    /// An invalid reading reports 0.0.
    pub const fn invalid() -> Self {
        Self {
            value: 0.0,
            valid: false,
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("bus transaction failed")]
    Bus,
    #[error("checksum mismatch")]
    Checksum,
    #[error("device not present")]
    NotPresent,
    #[error("unexpected chip or device id {0:#04x}")]
    BadId(u8),
}

#[cfg(test)]
pub(crate) mod testutil {
    //! Scripted I2C device for driver unit tests.

    use embedded_hal_async::i2c::{ErrorKind, I2c, NoAcknowledgeSource, Operation};

    /// Fake I2C target: a register map plus a list of registers whose access
    /// fails at the bus level. Reads walk forward from the last written
    /// register index; unmapped registers read as 0x00.
    pub struct FakeChip {
        pub addr: u8,
        pub mem: &'static [(u8, &'static [u8])],
        pub fail: &'static [u8],
        last_reg: Option<u8>,
    }

    impl FakeChip {
        pub fn new(addr: u8, mem: &'static [(u8, &'static [u8])]) -> Self {
            Self {
                addr,
                mem,
                fail: &[],
                last_reg: None,
            }
        }

        pub fn failing(mut self, fail: &'static [u8]) -> Self {
            self.fail = fail;
            self
        }

        fn lookup(&self, reg: u8, buf: &mut [u8]) {
            buf.fill(0);
            if let Some((_, data)) = self.mem.iter().find(|(r, _)| *r == reg) {
                let n = buf.len().min(data.len());
                buf[..n].copy_from_slice(&data[..n]);
            }
        }
    }

    impl embedded_hal_async::i2c::ErrorType for FakeChip {
        type Error = ErrorKind;
    }

    impl I2c for FakeChip {
        async fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if address != self.addr {
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
            }
            for op in operations.iter_mut() {
                match op {
                    Operation::Write(bytes) => {
                        if let Some(&reg) = bytes.first() {
                            if self.fail.contains(&reg) {
                                return Err(ErrorKind::NoAcknowledge(
                                    NoAcknowledgeSource::Data,
                                ));
                            }
                            self.last_reg = Some(reg);
                        }
                    }
                    Operation::Read(buf) => match self.last_reg {
                        Some(reg) => self.lookup(reg, buf),
                        None => buf.fill(0),
                    },
                }
            }
            Ok(())
        }
    }
}
