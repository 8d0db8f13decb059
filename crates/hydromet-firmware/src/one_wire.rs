//! Bit-banged One-Wire master on a single open-drain GPIO.
//!
//! Standard-speed Maxim timings throughout. The time-critical windows of
//! each bit slot run inside a critical section so an interrupt cannot
//! stretch a low pulse past its budget; the long recovery waits run with
//! interrupts enabled.

use esp_hal::delay::Delay;
use esp_hal::gpio::{DriveMode, Flex, OutputConfig, Pull};
use hydromet_core::sensors::ds18b20::OneWireBus;

// Standard-speed slot timings, microseconds.
const RESET_LOW_US: u32 = 480;
const PRESENCE_SAMPLE_US: u32 = 70;
const RESET_TAIL_US: u32 = 410;
const WRITE_1_LOW_US: u32 = 6;
const WRITE_1_HIGH_US: u32 = 64;
const WRITE_0_LOW_US: u32 = 60;
const WRITE_0_HIGH_US: u32 = 10;
const READ_LOW_US: u32 = 6;
const READ_SAMPLE_US: u32 = 9;
const READ_TAIL_US: u32 = 55;

const CMD_SEARCH_ROM: u8 = 0xF0;
const CMD_MATCH_ROM: u8 = 0x55;

pub struct OneWirePin {
    pin: Flex<'static>,
    delay: Delay,
    // Maxim ROM search state
    rom_no: [u8; 8],
    last_discrepancy: u8,
    last_device_flag: bool,
}

impl OneWirePin {
    /// Take over a GPIO as an open-drain One-Wire master. The line needs an
    /// external pull-up; the weak internal one is enabled as a backup.
    pub fn new(mut pin: Flex<'static>) -> Self {
        pin.apply_output_config(
            &OutputConfig::default()
                .with_drive_mode(DriveMode::OpenDrain)
                .with_pull(Pull::Up),
        );
        pin.set_output_enable(true);
        pin.set_input_enable(true);
        pin.set_high();
        Self {
            pin,
            delay: Delay::new(),
            rom_no: [0; 8],
            last_discrepancy: 0,
            last_device_flag: false,
        }
    }

    fn write_bit(&mut self, bit: bool) {
        let (low_us, high_us) = if bit {
            (WRITE_1_LOW_US, WRITE_1_HIGH_US)
        } else {
            (WRITE_0_LOW_US, WRITE_0_HIGH_US)
        };
        critical_section::with(|_| {
            self.pin.set_low();
            self.delay.delay_micros(low_us);
            self.pin.set_high();
        });
        self.delay.delay_micros(high_us);
    }

    fn read_bit(&mut self) -> bool {
        let bit = critical_section::with(|_| {
            self.pin.set_low();
            self.delay.delay_micros(READ_LOW_US);
            self.pin.set_high();
            self.delay.delay_micros(READ_SAMPLE_US);
            self.pin.is_high()
        });
        self.delay.delay_micros(READ_TAIL_US);
        bit
    }

    /// One triplet of the ROM search: read a bit and its complement, then
    /// write the chosen direction back.
    fn search_triplet(&mut self, direction: bool) -> (bool, bool) {
        let id_bit = self.read_bit();
        let cmp_id_bit = self.read_bit();
        if !(id_bit && cmp_id_bit) {
            let chosen = if id_bit != cmp_id_bit { id_bit } else { direction };
            self.write_bit(chosen);
        }
        (id_bit, cmp_id_bit)
    }
}

impl OneWireBus for OneWirePin {
    fn reset(&mut self) -> bool {
        self.pin.set_low();
        self.delay.delay_micros(RESET_LOW_US);
        let present = critical_section::with(|_| {
            self.pin.set_high();
            self.delay.delay_micros(PRESENCE_SAMPLE_US);
            !self.pin.is_high()
        });
        self.delay.delay_micros(RESET_TAIL_US);
        present
    }

    fn select(&mut self, addr: &[u8; 8]) {
        self.write_byte(CMD_MATCH_ROM);
        for &byte in addr {
            self.write_byte(byte);
        }
    }

    fn write_byte(&mut self, byte: u8) {
        for i in 0..8 {
            self.write_bit(byte & (1 << i) != 0);
        }
    }

    fn read_byte(&mut self) -> u8 {
        let mut byte = 0u8;
        for i in 0..8 {
            if self.read_bit() {
                byte |= 1 << i;
            }
        }
        byte
    }

    fn reset_search(&mut self) {
        self.rom_no = [0; 8];
        self.last_discrepancy = 0;
        self.last_device_flag = false;
    }

    fn search(&mut self, addr: &mut [u8; 8]) -> bool {
        if self.last_device_flag {
            return false;
        }
        if !self.reset() {
            self.reset_search();
            return false;
        }
        self.write_byte(CMD_SEARCH_ROM);

        let mut last_zero: u8 = 0;
        for id_bit_number in 1u8..=64 {
            let byte = usize::from((id_bit_number - 1) / 8);
            let mask = 1u8 << ((id_bit_number - 1) % 8);

            let direction = if id_bit_number < self.last_discrepancy {
                self.rom_no[byte] & mask != 0
            } else {
                id_bit_number == self.last_discrepancy
            };

            let (id_bit, cmp_id_bit) = self.search_triplet(direction);
            if id_bit && cmp_id_bit {
                // no device answered this bit
                self.reset_search();
                return false;
            }
            let chosen = if id_bit != cmp_id_bit { id_bit } else { direction };
            if !id_bit && !cmp_id_bit && !chosen {
                last_zero = id_bit_number;
            }
            if chosen {
                self.rom_no[byte] |= mask;
            } else {
                self.rom_no[byte] &= !mask;
            }
        }

        self.last_discrepancy = last_zero;
        if self.last_discrepancy == 0 {
            self.last_device_flag = true;
        }
        *addr = self.rom_no;
        true
    }
}
