//! # Uplink Decoder
//!
//! Decodes uplinks produced by the encoder back into physical units. Used by
//! the uplink journal and useful for checking network-side decoders.

use serde::Serialize;

use super::lpp::*;
use crate::error::{Result, TrackerError};

/// An uplink decoded into physical units
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecodedUplink {
    /// Degrees
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    /// Degrees
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Meters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    /// HDOP
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    /// Volts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery: Option<f64>,
    /// %RH
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    /// °C
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// hPa
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    /// kΩ
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_resistance: Option<f64>,
}

impl DecodedUplink {
    /// A zero-filled location means the tracker had no fix
    pub fn has_fix(&self) -> bool {
        matches!(
            (self.latitude, self.longitude),
            (Some(lat), Some(lon)) if lat != 0.0 || lon != 0.0
        )
    }
}

fn short(what: &str, needed: usize, left: usize) -> TrackerError {
    TrackerError::Payload(format!(
        "{} field truncated: needs {} bytes, {} left",
        what, needed, left
    ))
}

fn read_i24(b: &[u8]) -> i32 {
    // Sign-extend from bit 23
    ((i32::from(b[0]) << 24) | (i32::from(b[1]) << 16) | (i32::from(b[2]) << 8)) >> 8
}

fn read_i32(b: &[u8]) -> i32 {
    i32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

fn read_i16(b: &[u8]) -> i16 {
    i16::from_be_bytes([b[0], b[1]])
}

fn read_u16(b: &[u8]) -> u16 {
    u16::from_be_bytes([b[0], b[1]])
}

/// Decode a Cayenne-style uplink by walking its channel / type tags
///
/// # Errors
///
/// Returns `TrackerError::Payload` on an unknown tag pair or a truncated
/// field.
pub fn decode_cayenne(payload: &[u8]) -> Result<DecodedUplink> {
    let mut decoded = DecodedUplink::default();
    let mut rest = payload;

    while !rest.is_empty() {
        if rest.len() < LPP_TAG_SIZE {
            return Err(short("tag", LPP_TAG_SIZE, rest.len()));
        }
        let (channel, kind) = (rest[0], rest[1]);
        rest = &rest[LPP_TAG_SIZE..];

        let size = match (channel, kind) {
            (LPP_CHANNEL_LOCATION, LPP_TYPE_GPS4) => LPP_GPS4_SIZE,
            (LPP_CHANNEL_LOCATION, LPP_TYPE_GPS6) => LPP_GPS6_SIZE,
            (LPP_CHANNEL_HUMIDITY, LPP_TYPE_HUMIDITY) => 1,
            (LPP_CHANNEL_BATTERY, LPP_TYPE_ANALOG)
            | (LPP_CHANNEL_TEMPERATURE, LPP_TYPE_TEMPERATURE)
            | (LPP_CHANNEL_PRESSURE, LPP_TYPE_PRESSURE)
            | (LPP_CHANNEL_GAS, LPP_TYPE_ANALOG) => 2,
            _ => {
                return Err(TrackerError::Payload(format!(
                    "unknown field: channel 0x{:02X} type 0x{:02X}",
                    channel, kind
                )))
            }
        };
        if rest.len() < size {
            return Err(short("value", size, rest.len()));
        }
        let value = &rest[..size];

        match (channel, kind) {
            (LPP_CHANNEL_LOCATION, LPP_TYPE_GPS4) => {
                decoded.latitude = Some(read_i24(&value[0..3]) as f64 * 0.0001);
                decoded.longitude = Some(read_i24(&value[3..6]) as f64 * 0.0001);
                decoded.altitude = Some(read_i24(&value[6..9]) as f64 * 0.01);
            }
            (LPP_CHANNEL_LOCATION, _) => {
                decoded.latitude = Some(read_i32(&value[0..4]) as f64 * 0.000001);
                decoded.longitude = Some(read_i32(&value[4..8]) as f64 * 0.000001);
                decoded.altitude = Some(read_i24(&value[8..11]) as f64 * 0.01);
            }
            (LPP_CHANNEL_BATTERY, _) => {
                decoded.battery = Some(read_u16(value) as f64 * 0.01);
            }
            (LPP_CHANNEL_HUMIDITY, _) => {
                decoded.humidity = Some(value[0] as f64 * 0.5);
            }
            (LPP_CHANNEL_TEMPERATURE, _) => {
                decoded.temperature = Some(read_i16(value) as f64 * 0.1);
            }
            (LPP_CHANNEL_PRESSURE, _) => {
                decoded.pressure = Some(read_u16(value) as f64 * 0.1);
            }
            _ => {
                decoded.gas_resistance = Some(read_u16(value) as f64 * 0.01);
            }
        }
        rest = &rest[size..];
    }

    Ok(decoded)
}

/// Decode the fixed 14-byte mapper record
///
/// # Errors
///
/// Returns `TrackerError::Payload` if the record is not exactly 14 bytes.
pub fn decode_mapper(payload: &[u8]) -> Result<DecodedUplink> {
    if payload.len() != LPP_GPSH_SIZE {
        return Err(TrackerError::Payload(format!(
            "mapper record must be {} bytes, got {}",
            LPP_GPSH_SIZE,
            payload.len()
        )));
    }

    Ok(DecodedUplink {
        latitude: Some(read_i32(&payload[0..4]) as f64 / 1e7),
        longitude: Some(read_i32(&payload[4..8]) as f64 / 1e7),
        altitude: Some(read_i16(&payload[8..10]) as f64),
        accuracy: Some(read_u16(&payload[10..12]) as f64 / 100.0),
        battery: Some(read_u16(&payload[12..14]) as f64 * 0.01),
        ..DecodedUplink::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{EnvReading, Fix};
    use crate::payload::{encode_uplink, LocationFormat, NoFixPolicy, PayloadSettings, Readings};

    fn fixes() -> Vec<Fix> {
        vec![
            Fix {
                latitude: 144_213_730,
                longitude: 1_210_069_140,
                altitude_mm: 35_000,
                accuracy: 90,
            },
            Fix {
                latitude: -80_487_749,
                longitude: -349_021_589,
                altitude_mm: 156_024,
                accuracy: 150,
            },
            Fix {
                latitude: 899_999_999,
                longitude: -1_799_999_999,
                altitude_mm: -12_345,
                accuracy: 999,
            },
            Fix { latitude: 1, longitude: -1, altitude_mm: 9, accuracy: 0 },
        ]
    }

    fn env() -> EnvReading {
        EnvReading { humidity: 48.5, temperature: 21.7, pressure: 99_870, gas_resistance: 120_000 }
    }

    #[test]
    fn test_standard_precision_recovers_position() {
        let settings = PayloadSettings {
            format: LocationFormat::Standard,
            no_fix_policy: NoFixPolicy::Omit,
        };
        for fix in fixes() {
            let readings = Readings { fix: Some(fix), env: Some(env()), battery: 400 };
            let uplink = encode_uplink(&settings, &readings);
            let decoded = decode_cayenne(&uplink.bytes).unwrap();

            assert!((decoded.latitude.unwrap() - fix.latitude_deg()).abs() < 1e-4);
            assert!((decoded.longitude.unwrap() - fix.longitude_deg()).abs() < 1e-4);
            assert!((decoded.altitude.unwrap() - fix.altitude_m()).abs() < 0.01);
        }
    }

    #[test]
    fn test_extended_precision_recovers_position() {
        let settings = PayloadSettings {
            format: LocationFormat::Precise,
            no_fix_policy: NoFixPolicy::Omit,
        };
        for fix in fixes() {
            let uplink =
                encode_uplink(&settings, &Readings { fix: Some(fix), env: None, battery: 400 });
            let decoded = decode_cayenne(&uplink.bytes).unwrap();

            assert!((decoded.latitude.unwrap() - fix.latitude_deg()).abs() < 1e-6);
            assert!((decoded.longitude.unwrap() - fix.longitude_deg()).abs() < 1e-6);
            assert!((decoded.altitude.unwrap() - fix.altitude_m()).abs() < 0.01);
        }
    }

    #[test]
    fn test_sensor_fields_decode() {
        let uplink = encode_uplink(
            &PayloadSettings::default(),
            &Readings { fix: None, env: Some(env()), battery: 376 },
        );
        let decoded = decode_cayenne(&uplink.bytes).unwrap();

        assert!(decoded.latitude.is_none());
        assert!(!decoded.has_fix());
        assert!((decoded.battery.unwrap() - 3.76).abs() < 1e-9);
        assert!((decoded.humidity.unwrap() - 48.5).abs() < 1e-9);
        assert!((decoded.temperature.unwrap() - 21.7).abs() < 1e-6);
        assert!((decoded.pressure.unwrap() - 998.7).abs() < 1e-6);
        assert!((decoded.gas_resistance.unwrap() - 120.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_filled_location_has_no_fix() {
        let settings = PayloadSettings {
            format: LocationFormat::Standard,
            no_fix_policy: NoFixPolicy::ZeroFill,
        };
        let uplink =
            encode_uplink(&settings, &Readings { fix: None, env: Some(env()), battery: 400 });
        let decoded = decode_cayenne(&uplink.bytes).unwrap();

        assert_eq!(decoded.latitude, Some(0.0));
        assert!(!decoded.has_fix());
    }

    #[test]
    fn test_mapper_record_decodes() {
        let settings = PayloadSettings {
            format: LocationFormat::Mapper,
            no_fix_policy: NoFixPolicy::Omit,
        };
        let fix = fixes()[1];
        let uplink =
            encode_uplink(&settings, &Readings { fix: Some(fix), env: Some(env()), battery: 405 });
        let decoded = decode_mapper(&uplink.bytes).unwrap();

        assert!((decoded.latitude.unwrap() - fix.latitude_deg()).abs() < 1e-9);
        assert_eq!(decoded.altitude, Some(156.0));
        assert_eq!(decoded.accuracy, Some(1.5));
        assert!((decoded.battery.unwrap() - 4.05).abs() < 1e-9);
        assert!(decoded.has_fix());
    }

    #[test]
    fn test_mapper_wrong_length() {
        assert!(decode_mapper(&[0u8; 13]).is_err());
        assert!(decode_mapper(&[0u8; 15]).is_err());
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let result = decode_cayenne(&[0x07, 0x71, 0x00, 0x00]);
        match result {
            Err(TrackerError::Payload(msg)) => assert!(msg.contains("0x07")),
            other => panic!("Expected Payload error, got: {:?}", other),
        }
    }

    #[test]
    fn test_truncated_field_rejected() {
        assert!(decode_cayenne(&[0x01, 0x88, 0x00, 0x00]).is_err());
        assert!(decode_cayenne(&[0x02]).is_err());
    }

    #[test]
    fn test_empty_payload_decodes_to_nothing() {
        assert_eq!(decode_cayenne(&[]).unwrap(), DecodedUplink::default());
    }

    #[test]
    fn test_read_i24_sign_extension() {
        assert_eq!(read_i24(&[0xFF, 0xFF, 0xFF]), -1);
        assert_eq!(read_i24(&[0x80, 0x00, 0x00]), -8_388_608);
        assert_eq!(read_i24(&[0x7F, 0xFF, 0xFF]), 8_388_607);
    }
}
