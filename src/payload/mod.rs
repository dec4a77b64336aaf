//! # Uplink Payload Module
//!
//! Encoding of tracker readings into the uplink byte layouts, and the
//! matching decoder.
//!
//! This module handles:
//! - Selecting the layout from the location format and fix availability
//! - Cayenne-LPP style location and sensor fields (4 and 6 digit precision)
//! - The fixed 14-byte mapper record
//! - Knowing the exact length of every layout before transmission

pub mod decoder;
pub mod encoder;
pub mod lpp;

use serde::{Deserialize, Serialize};

use crate::drivers::{EnvReading, Fix};
use lpp::*;

/// How the location is carried in the uplink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationFormat {
    /// Cayenne GPS field, 0.0001° resolution
    #[default]
    Standard,
    /// Extended GPS field, 0.000001° resolution
    Precise,
    /// Fixed mapper record with accuracy and battery
    Mapper,
}

/// What to send in place of coordinates when no fix was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoFixPolicy {
    /// Leave the location field out, the uplink gets shorter
    #[default]
    Omit,
    /// Keep the location field with all coordinates zero
    ZeroFill,
}

/// Location part of a layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationBlock {
    None,
    Standard,
    Precise,
    Mapper,
}

/// Sensor part of a layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorBlock {
    None,
    BatteryOnly,
    Full,
}

/// A concrete uplink layout; its byte length is fixed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PayloadLayout {
    pub location: LocationBlock,
    pub sensors: SensorBlock,
}

impl PayloadLayout {
    /// Battery field only, used while battery protection is active
    pub const BATTERY_ONLY: PayloadLayout = PayloadLayout {
        location: LocationBlock::None,
        sensors: SensorBlock::BatteryOnly,
    };

    /// Exact encoded length in bytes
    pub const fn len(&self) -> usize {
        let location = match self.location {
            LocationBlock::None => 0,
            LocationBlock::Standard => LPP_TAG_SIZE + LPP_GPS4_SIZE,
            LocationBlock::Precise => LPP_TAG_SIZE + LPP_GPS6_SIZE,
            LocationBlock::Mapper => LPP_GPSH_SIZE,
        };
        let sensors = match self.sensors {
            SensorBlock::None => 0,
            SensorBlock::BatteryOnly => BATTERY_FIELD_LEN,
            SensorBlock::Full => SENSOR_BLOCK_LEN,
        };
        location + sensors
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_location(&self) -> bool {
        self.location != LocationBlock::None
    }
}

/// Everything measured during one tracking cycle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Readings {
    pub fix: Option<Fix>,
    pub env: Option<EnvReading>,
    /// Battery level in mV / 10
    pub battery: u16,
}

/// Encoder configuration derived from the persisted flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PayloadSettings {
    pub format: LocationFormat,
    pub no_fix_policy: NoFixPolicy,
}

impl PayloadSettings {
    /// Choose the layout for a cycle's readings
    pub fn layout_for(&self, readings: &Readings) -> PayloadLayout {
        let has_fix = readings.fix.is_some();
        let keep_location = has_fix || self.no_fix_policy == NoFixPolicy::ZeroFill;

        let sensors = if readings.env.is_some() {
            SensorBlock::Full
        } else {
            SensorBlock::BatteryOnly
        };

        match (self.format, keep_location) {
            // The mapper record already carries the battery level
            (LocationFormat::Mapper, true) => PayloadLayout {
                location: LocationBlock::Mapper,
                sensors: SensorBlock::None,
            },
            (LocationFormat::Standard, true) => PayloadLayout {
                location: LocationBlock::Standard,
                sensors,
            },
            (LocationFormat::Precise, true) => PayloadLayout {
                location: LocationBlock::Precise,
                sensors,
            },
            (_, false) => PayloadLayout {
                location: LocationBlock::None,
                sensors,
            },
        }
    }
}

pub use decoder::{decode_cayenne, decode_mapper, DecodedUplink};
pub use encoder::{encode_battery_only, encode_uplink, Uplink};
