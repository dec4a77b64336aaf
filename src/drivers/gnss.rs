//! # GNSS Interface

use async_trait::async_trait;
use std::time::Duration;

/// A 3D position solution
///
/// Coordinates use the receiver's native integer scales so no precision is
/// lost before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fix {
    /// Latitude in 1e-7 degrees
    pub latitude: i32,
    /// Longitude in 1e-7 degrees
    pub longitude: i32,
    /// Altitude above mean sea level in millimeters
    pub altitude_mm: i32,
    /// Horizontal dilution of precision × 100
    pub accuracy: u16,
}

impl Fix {
    /// Latitude in degrees
    pub fn latitude_deg(&self) -> f64 {
        self.latitude as f64 / 1e7
    }

    /// Longitude in degrees
    pub fn longitude_deg(&self) -> f64 {
        self.longitude as f64 / 1e7
    }

    /// Altitude in meters
    pub fn altitude_m(&self) -> f64 {
        self.altitude_mm as f64 / 1000.0
    }
}

/// GNSS receiver interface
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Gnss: Send {
    /// Whether the receiver answered during initialization
    fn is_present(&self) -> bool;

    fn power_on(&mut self);

    fn power_off(&mut self);

    /// Search for a 3D fix for at most `timeout`
    async fn acquire_fix(&mut self, timeout: Duration) -> Option<Fix>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fix_unit_conversion() {
        let fix = Fix {
            latitude: -80_487_740,
            longitude: -349_021_580,
            altitude_mm: 156_024,
            accuracy: 150,
        };
        assert!((fix.latitude_deg() - -8.048774).abs() < 1e-9);
        assert!((fix.longitude_deg() - -34.902158).abs() < 1e-9);
        assert!((fix.altitude_m() - 156.024).abs() < 1e-9);
    }
}
