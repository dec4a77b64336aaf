//! # Flag Storage
//!
//! Persists the three runtime-selectable tracker flags across power cycles.
//! Every flag is a record whose mere presence means `true`; a missing record
//! (first boot, erased storage) reads as `false`.

use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::error::{Result, TrackerError};
use crate::payload::LocationFormat;

/// Present when high GNSS precision is selected
pub const GNSS_PRECISION_RECORD: &str = "GNSS";
/// Present when the mapper payload format is selected
pub const MAPPER_FORMAT_RECORD: &str = "HELIUM";
/// Present when battery protection is enabled
pub const BATTERY_CHECK_RECORD: &str = "BATT";

/// Persistent key/value storage holding presence-only records
#[cfg_attr(test, mockall::automock)]
pub trait FlagStorage: Send {
    fn exists(&self, name: &str) -> bool;

    fn create(&mut self, name: &str) -> Result<()>;

    /// Removing a missing record is not an error
    fn remove(&mut self, name: &str) -> Result<()>;
}

/// One empty file per record
#[derive(Debug, Clone)]
pub struct FileFlagStorage {
    dir: PathBuf,
}

impl FileFlagStorage {
    /// Open (and create if needed) the record directory
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::Io` if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!("Flag storage at {}", dir.display());
        Ok(Self { dir })
    }
}

impl FlagStorage for FileFlagStorage {
    fn exists(&self, name: &str) -> bool {
        self.dir.join(name).is_file()
    }

    fn create(&mut self, name: &str) -> Result<()> {
        fs::write(self.dir.join(name), b"").map_err(|source| TrackerError::Storage {
            record: name.to_string(),
            source,
        })
    }

    fn remove(&mut self, name: &str) -> Result<()> {
        match fs::remove_file(self.dir.join(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(TrackerError::Storage {
                record: name.to_string(),
                source,
            }),
        }
    }
}

/// Runtime-selectable tracker flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerSettings {
    pub high_precision: bool,
    pub mapper_format: bool,
    pub battery_check: bool,
}

impl TrackerSettings {
    /// Location encoding selected by the flags
    ///
    /// The mapper format wins over the precision flag.
    pub fn location_format(&self) -> LocationFormat {
        if self.mapper_format {
            LocationFormat::Mapper
        } else if self.high_precision {
            LocationFormat::Precise
        } else {
            LocationFormat::Standard
        }
    }
}

/// Loads and saves [`TrackerSettings`] as flag records
pub struct SettingsStore {
    storage: Box<dyn FlagStorage>,
}

impl SettingsStore {
    pub fn new(storage: Box<dyn FlagStorage>) -> Self {
        Self { storage }
    }

    /// Read all flags, absent records read as `false`
    pub fn load_flags(&self) -> TrackerSettings {
        let settings = TrackerSettings {
            high_precision: self.storage.exists(GNSS_PRECISION_RECORD),
            mapper_format: self.storage.exists(MAPPER_FORMAT_RECORD),
            battery_check: self.storage.exists(BATTERY_CHECK_RECORD),
        };
        info!(
            "Loaded settings: high precision {}, mapper format {}, battery check {}",
            settings.high_precision, settings.mapper_format, settings.battery_check
        );
        settings
    }

    /// Write all flags
    ///
    /// # Errors
    ///
    /// Returns the first record that could not be written or removed.
    pub fn save_flags(&mut self, settings: &TrackerSettings) -> Result<()> {
        self.store(GNSS_PRECISION_RECORD, settings.high_precision)?;
        self.store(MAPPER_FORMAT_RECORD, settings.mapper_format)?;
        self.store(BATTERY_CHECK_RECORD, settings.battery_check)?;
        debug!("Saved settings {:?}", settings);
        Ok(())
    }

    fn store(&mut self, record: &str, value: bool) -> Result<()> {
        if value {
            self.storage.create(record)
        } else {
            self.storage.remove(record)
        }
    }
}
