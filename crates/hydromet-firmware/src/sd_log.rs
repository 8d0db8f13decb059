//! SD card persistence: the dated observation log and the config blob.
//!
//! Card operations are blocking; the SPI bus is ours alone and one
//! observation line per minute does not justify an async rewrite.

use embedded_sdmmc::{Mode, SdCard, SdCardError, TimeSource, VolumeIdx, VolumeManager};
use heapless::String;
use hydromet_core::config::StationConfig;
use hydromet_core::io::{ObservationLog, SinkError};
use log::{info, warn};

const OBS_DIR: &str = "OBS";
const CONFIG_FILE: &str = "CONFIG.BIN";

type SdError = embedded_sdmmc::Error<SdCardError>;

/// `YYYYMMDD.LOG`, derived from the observation timestamp.
fn log_file_name(timestamp: &str) -> Option<String<12>> {
    let mut name = String::new();
    for range in [0..4, 5..7, 8..10] {
        name.push_str(timestamp.get(range)?).ok()?;
    }
    name.push_str(".LOG").ok()?;
    Some(name)
}

pub struct SdCardLog<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    volume_mgr: VolumeManager<SdCard<S, D>, T, 4, 4, 1>,
}

impl<S, D, T> SdCardLog<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    pub fn new(sd_card: SdCard<S, D>, ts: T) -> Self {
        Self {
            volume_mgr: VolumeManager::new(sd_card, ts),
        }
    }

    /// Read and decode `CONFIG.BIN` from the card root. Any failure falls
    /// back to the default configuration.
    pub fn load_config(&self) -> StationConfig {
        match self.read_config() {
            Ok(config) => {
                info!("CONFIG.BIN loaded: {config:?}");
                config
            }
            Err(e) => {
                warn!("CONFIG.BIN unavailable ({e:?}), using defaults");
                StationConfig::default()
            }
        }
    }

    fn read_config(&self) -> Result<StationConfig, SdError> {
        let volume = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root_dir = volume.open_root_dir()?;
        let file = root_dir.open_file_in_dir(CONFIG_FILE, Mode::ReadOnly)?;

        let mut buf = [0u8; 32];
        let len = file.read(&mut buf)?;

        file.close()?;
        root_dir.close()?;
        volume.close()?;

        StationConfig::from_bytes(&buf[..len]).map_err(|_| SdError::FormatError("bad config blob"))
    }

    fn append_line(&self, file_name: &str, line: &str) -> Result<(), SdError> {
        let volume = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root_dir = volume.open_root_dir()?;

        let obs_dir = match root_dir.open_dir(OBS_DIR) {
            Ok(dir) => dir,
            Err(_) => {
                root_dir.make_dir_in_dir(OBS_DIR)?;
                root_dir.open_dir(OBS_DIR)?
            }
        };
        let file = obs_dir.open_file_in_dir(file_name, Mode::ReadWriteCreateOrAppend)?;

        file.write(line.as_bytes())?;
        file.write(b"\n")?;

        // close explicitly so errors surface here, not at drop
        file.close()?;
        obs_dir.close()?;
        root_dir.close()?;
        volume.close()?;

        Ok(())
    }
}

impl<S, D, T> ObservationLog for SdCardLog<S, D, T>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
    T: TimeSource,
{
    async fn append(&mut self, timestamp: &str, line: &str) -> Result<(), SinkError> {
        let Some(file_name) = log_file_name(timestamp) else {
            return Err(SinkError::WriteFailed);
        };
        self.append_line(&file_name, line).map_err(|e| {
            warn!("SD append to {file_name} failed: {e:?}");
            SinkError::WriteFailed
        })
    }
}
