//! # Payload Wire Constants
//!
//! Channel / type tag pairs and field sizes of the uplink layouts.
//!
//! Cayenne-LPP style fields are `[channel, type, value...]` with big-endian
//! fixed-point values:
//!
//! | Channel | Type | Field | Value bytes | Scale |
//! |---------|------|-------|-------------|-------|
//! | 0x01 | 0x88 | location, 4 digit | 3 + 3 + 3 | 0.0001°, 0.0001°, 0.01 m |
//! | 0x01 | 0x89 | location, 6 digit | 4 + 4 + 3 | 0.000001°, 0.000001°, 0.01 m |
//! | 0x02 | 0x02 | battery | 2 | 0.01 V |
//! | 0x03 | 0x68 | humidity | 1 | 0.5 %RH |
//! | 0x04 | 0x67 | temperature | 2 | 0.1 °C, signed |
//! | 0x05 | 0x73 | pressure | 2 | 0.1 hPa |
//! | 0x06 | 0x02 | gas resistance | 2 | 0.01 kΩ |
//!
//! The mapper layout has no tags: latitude and longitude as signed 32-bit
//! 1e-7°, altitude as signed 16-bit meters, accuracy and battery as unsigned
//! 16-bit values, 14 bytes in total.

/// Location channel
pub const LPP_CHANNEL_LOCATION: u8 = 0x01;
/// Battery channel
pub const LPP_CHANNEL_BATTERY: u8 = 0x02;
/// Humidity channel
pub const LPP_CHANNEL_HUMIDITY: u8 = 0x03;
/// Temperature channel
pub const LPP_CHANNEL_TEMPERATURE: u8 = 0x04;
/// Barometric pressure channel
pub const LPP_CHANNEL_PRESSURE: u8 = 0x05;
/// Gas resistance channel
pub const LPP_CHANNEL_GAS: u8 = 0x06;

/// Standard Cayenne GPS type (4 digit precision)
pub const LPP_TYPE_GPS4: u8 = 0x88;
/// Extended GPS type (6 digit precision), not understood by stock decoders
pub const LPP_TYPE_GPS6: u8 = 0x89;
/// Analog input type
pub const LPP_TYPE_ANALOG: u8 = 0x02;
/// Relative humidity type
pub const LPP_TYPE_HUMIDITY: u8 = 0x68;
/// Temperature type
pub const LPP_TYPE_TEMPERATURE: u8 = 0x67;
/// Barometric pressure type
pub const LPP_TYPE_PRESSURE: u8 = 0x73;

/// Size of a channel + type tag pair
pub const LPP_TAG_SIZE: usize = 2;

/// Data bytes of the standard location field
pub const LPP_GPS4_SIZE: usize = 9;
/// Data bytes of the extended location field
pub const LPP_GPS6_SIZE: usize = 11;
/// Data bytes of the mapper location record
pub const LPP_GPSH_SIZE: usize = 14;

/// Battery field including tag
pub const BATTERY_FIELD_LEN: usize = LPP_TAG_SIZE + 2;
/// Battery, humidity, temperature, pressure and gas fields including tags
pub const SENSOR_BLOCK_LEN: usize =
    BATTERY_FIELD_LEN + (LPP_TAG_SIZE + 1) + 3 * (LPP_TAG_SIZE + 2);

/// Largest 24-bit signed value
pub const I24_MAX: i32 = 0x7F_FFFF;
/// Smallest 24-bit signed value
pub const I24_MIN: i32 = -0x80_0000;
