#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use embedded_hal_bus::spi::ExclusiveDevice;
use embedded_io::{Read, ReadReady};
use embedded_sdmmc::SdCard;
use esp_hal::analog::adc::{Adc, AdcConfig, Attenuation};
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::gpio::{Flex, Level, Output, OutputConfig};
use esp_hal::i2c::master::Config as I2cConfig;
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::uart::{Config as UartConfig, Uart};
use heapless::String;
use log::info;

use hydromet_core::monitor;
use hydromet_core::station::Station;
use hydromet_firmware::analog::{BatteryMonitor, GaugeSensor};
use hydromet_firmware::clock::{Clock, parse_time_sync};
use hydromet_firmware::one_wire::OneWirePin;
use hydromet_firmware::sd_log::SdCardLog;
use hydromet_firmware::uplink::SerialUplink;

/// Seconds between observation cycles, measured from the end of one cycle
/// to the start of the next.
const OBS_INTERVAL_SECS: u32 = 60;

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    log::error!("PANIC: {info}");
    loop {}
}

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

/// Drain any pending console bytes; a completed `T<unix-seconds>` line sets
/// the wall clock.
fn poll_console<R>(rx: &mut R, line: &mut String<24>, clock: Clock)
where
    R: Read + ReadReady,
{
    while rx.read_ready().unwrap_or(false) {
        let mut byte = [0u8; 1];
        let Ok(n) = rx.read(&mut byte) else { return };
        if n == 0 {
            return;
        }
        match byte[0] {
            b'\r' | b'\n' => {
                if let Some(epoch) = parse_time_sync(line.as_str()) {
                    clock.set_unix_time(epoch);
                }
                line.clear();
            }
            other => {
                // oversized garbage: throw the line away
                if line.push(other as char).is_err() {
                    line.clear();
                }
            }
        }
    }
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(_spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized");

    // Sensor I2C bus, shared by both Bosch slots and the MCP9808
    let mut i2c = esp_hal::i2c::master::I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_khz(400)),
    )
    .unwrap()
    .with_sda(peripherals.GPIO8)
    .with_scl(peripherals.GPIO9)
    .into_async();

    // DS18B20 probe cable
    let mut one_wire = OneWirePin::new(Flex::new(peripherals.GPIO5));

    // Stream gauge on ADC1, battery divider on ADC2
    let mut adc1_cfg = AdcConfig::new();
    let gauge_pin = adc1_cfg.enable_pin(peripherals.GPIO4, Attenuation::_11dB);
    let adc1 = Adc::new(peripherals.ADC1, adc1_cfg);
    let mut gauge = GaugeSensor::new(adc1, gauge_pin);

    let mut adc2_cfg = AdcConfig::new();
    let battery_pin = adc2_cfg.enable_pin(peripherals.GPIO11, Attenuation::_11dB);
    let adc2 = Adc::new(peripherals.ADC2, adc2_cfg);
    let mut battery = BatteryMonitor::new(adc2, battery_pin);

    // Uplink modem / console UART
    let uart = Uart::new(peripherals.UART1, UartConfig::default())
        .unwrap()
        .with_tx(peripherals.GPIO17)
        .with_rx(peripherals.GPIO18);
    let (mut console_rx, uplink_tx) = uart.split();
    let mut uplink = SerialUplink::new(uplink_tx);

    let mut clock = Clock::new();

    // SD card on SPI2
    let spi = Spi::new(
        peripherals.SPI2,
        SpiConfig::default().with_frequency(Rate::from_khz(400)),
    )
    .unwrap()
    .with_sck(peripherals.GPIO36)
    .with_mosi(peripherals.GPIO35)
    .with_miso(peripherals.GPIO37);
    let sd_cs = Output::new(peripherals.GPIO34, Level::High, OutputConfig::default());
    let sd_spi = ExclusiveDevice::new_no_delay(spi, sd_cs).unwrap();
    let mut obs_log = SdCardLog::new(SdCard::new(sd_spi, Delay::new()), clock);

    let station_config = obs_log.load_config();
    let mut station = Station::new(&station_config);
    station.init(&mut i2c, &mut one_wire).await;

    let mut console_line: String<24> = String::new();
    let mut seconds_until_obs = 0u32;
    loop {
        poll_console(&mut console_rx, &mut console_line, clock);

        if seconds_until_obs == 0 {
            seconds_until_obs = OBS_INTERVAL_SECS;
            station.recheck(&mut i2c).await;
            station
                .obs_do(
                    &mut i2c,
                    &mut one_wire,
                    &mut gauge,
                    &mut battery,
                    &mut clock,
                    &mut uplink,
                    &mut obs_log,
                    station_config.log_observations,
                )
                .await;

            let frame =
                monitor::render_frame(&station, &mut i2c, &mut gauge, &mut battery, &mut clock)
                    .await;
            for line in &frame.lines {
                info!("{line}");
            }
        }

        Timer::after(Duration::from_secs(1)).await;
        seconds_until_obs -= 1;
    }
}
