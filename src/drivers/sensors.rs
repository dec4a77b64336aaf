//! # Sensor Interfaces
//!
//! Environmental sensor (BME680 class), accelerometer and battery ADC.

use async_trait::async_trait;
use std::time::Duration;

/// One environmental measurement in the sensor's native units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvReading {
    /// Relative humidity in %
    pub humidity: f32,
    /// Temperature in °C
    pub temperature: f32,
    /// Barometric pressure in Pa
    pub pressure: u32,
    /// Gas resistance in Ω
    pub gas_resistance: u32,
}

/// Environmental sensor with split start / finish reading
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EnvSensor: Send {
    fn is_present(&self) -> bool;

    /// Kick off a measurement without waiting for it
    fn start_reading(&mut self);

    /// Wait at most `timeout` for the measurement started last
    async fn try_finish_reading(&mut self, timeout: Duration) -> Option<EnvReading>;
}

/// Accelerometer whose motion interrupt wakes the tracker
#[cfg_attr(test, mockall::automock)]
pub trait Accelerometer: Send {
    fn is_present(&self) -> bool;

    /// Acknowledge the latched motion interrupt
    fn clear_interrupt(&mut self);
}

/// Battery voltage ADC
#[cfg_attr(test, mockall::automock)]
pub trait BatteryReader: Send {
    fn read_millivolts(&mut self) -> u16;
}
