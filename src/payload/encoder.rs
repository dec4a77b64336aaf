//! # Uplink Encoder
//!
//! Builds uplink payloads from [`Readings`]. Every value is written with
//! explicit big-endian shifts, so the wire format does not depend on the host
//! memory layout.

use bytes::{BufMut, Bytes, BytesMut};

use super::lpp::*;
use super::{LocationBlock, PayloadLayout, PayloadSettings, Readings, SensorBlock};
use crate::drivers::{EnvReading, Fix};

/// An encoded uplink and the layout it was built with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uplink {
    pub layout: PayloadLayout,
    pub bytes: Bytes,
}

impl Uplink {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Encode a tracking cycle's readings
///
/// The layout is picked by [`PayloadSettings::layout_for`]; the returned
/// buffer is always exactly `layout.len()` bytes.
///
/// # Examples
///
/// ```
/// use lpwan_tracker::payload::{encode_uplink, PayloadSettings, Readings};
///
/// let readings = Readings { fix: None, env: None, battery: 395 };
/// let uplink = encode_uplink(&PayloadSettings::default(), &readings);
/// assert_eq!(uplink.bytes.as_ref(), &[0x02, 0x02, 0x01, 0x8B]);
/// ```
pub fn encode_uplink(settings: &PayloadSettings, readings: &Readings) -> Uplink {
    let layout = settings.layout_for(readings);
    encode_with_layout(layout, readings)
}

/// Encode only the battery field
pub fn encode_battery_only(battery: u16) -> Uplink {
    encode_with_layout(
        PayloadLayout::BATTERY_ONLY,
        &Readings { fix: None, env: None, battery },
    )
}

fn encode_with_layout(layout: PayloadLayout, readings: &Readings) -> Uplink {
    let mut buf = BytesMut::with_capacity(layout.len());
    // Zero-filled location when the layout keeps it without a fix
    let fix = readings.fix.unwrap_or(Fix {
        latitude: 0,
        longitude: 0,
        altitude_mm: 0,
        accuracy: 0,
    });

    match layout.location {
        LocationBlock::None => {}
        LocationBlock::Standard => put_location_standard(&mut buf, &fix),
        LocationBlock::Precise => put_location_precise(&mut buf, &fix),
        LocationBlock::Mapper => put_location_mapper(&mut buf, &fix, readings.battery),
    }

    match layout.sensors {
        SensorBlock::None => {}
        SensorBlock::BatteryOnly => put_battery(&mut buf, readings.battery),
        SensorBlock::Full => {
            put_battery(&mut buf, readings.battery);
            match readings.env {
                Some(env) => put_environment(&mut buf, &env),
                None => put_environment(&mut buf, &EnvReading {
                    humidity: 0.0,
                    temperature: 0.0,
                    pressure: 0,
                    gas_resistance: 0,
                }),
            }
        }
    }

    debug_assert_eq!(buf.len(), layout.len());
    Uplink {
        layout,
        bytes: buf.freeze(),
    }
}

/// Write a signed value as 3 big-endian bytes, saturating at the 24-bit range
fn put_i24(buf: &mut BytesMut, value: i32) {
    let value = value.clamp(I24_MIN, I24_MAX);
    buf.put_u8((value >> 16) as u8);
    buf.put_u8((value >> 8) as u8);
    buf.put_u8(value as u8);
}

/// Standard location field: 0.0001° coordinates, 0.01 m altitude
pub fn put_location_standard(buf: &mut BytesMut, fix: &Fix) {
    buf.put_u8(LPP_CHANNEL_LOCATION);
    buf.put_u8(LPP_TYPE_GPS4);
    put_i24(buf, fix.latitude / 1000);
    put_i24(buf, fix.longitude / 1000);
    put_i24(buf, fix.altitude_mm / 10);
}

/// Extended location field: 0.000001° coordinates, 0.01 m altitude
pub fn put_location_precise(buf: &mut BytesMut, fix: &Fix) {
    buf.put_u8(LPP_CHANNEL_LOCATION);
    buf.put_u8(LPP_TYPE_GPS6);
    buf.put_i32(fix.latitude / 10);
    buf.put_i32(fix.longitude / 10);
    put_i24(buf, fix.altitude_mm / 10);
}

/// Mapper record: raw 1e-7° coordinates, meters, accuracy, battery
pub fn put_location_mapper(buf: &mut BytesMut, fix: &Fix, battery: u16) {
    let altitude_m = (fix.altitude_mm / 1000).clamp(i16::MIN as i32, i16::MAX as i32) as i16;
    buf.put_i32(fix.latitude);
    buf.put_i32(fix.longitude);
    buf.put_i16(altitude_m);
    buf.put_u16(fix.accuracy);
    buf.put_u16(battery);
}

/// Battery field, mV / 10 == 0.01 V
pub fn put_battery(buf: &mut BytesMut, battery: u16) {
    buf.put_u8(LPP_CHANNEL_BATTERY);
    buf.put_u8(LPP_TYPE_ANALOG);
    buf.put_u16(battery);
}

/// Humidity, temperature, pressure and gas resistance fields
pub fn put_environment(buf: &mut BytesMut, env: &EnvReading) {
    let humidity = (env.humidity * 2.0).round().clamp(0.0, 255.0) as u8;
    let temperature = (env.temperature * 10.0)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16;
    let pressure = (env.pressure / 10).min(u16::MAX as u32) as u16;
    let gas = (env.gas_resistance / 10).min(u16::MAX as u32) as u16;

    buf.put_u8(LPP_CHANNEL_HUMIDITY);
    buf.put_u8(LPP_TYPE_HUMIDITY);
    buf.put_u8(humidity);

    buf.put_u8(LPP_CHANNEL_TEMPERATURE);
    buf.put_u8(LPP_TYPE_TEMPERATURE);
    buf.put_i16(temperature);

    buf.put_u8(LPP_CHANNEL_PRESSURE);
    buf.put_u8(LPP_TYPE_PRESSURE);
    buf.put_u16(pressure);

    buf.put_u8(LPP_CHANNEL_GAS);
    buf.put_u8(LPP_TYPE_ANALOG);
    buf.put_u16(gas);
}
