//! # Driver Interfaces
//!
//! Traits for the external collaborators the scheduler drives: the LoRaWAN/P2P
//! radio stack, the GNSS module, the environmental sensor, the accelerometer
//! and the battery ADC. The tracker never talks to hardware registers; it only
//! sees these interfaces, so the host build can plug in simulated devices
//! (see [`crate::sim`]) and tests can plug in mocks.

pub mod gnss;
pub mod radio;
pub mod sensors;

pub use gnss::{Fix, Gnss};
pub use radio::{Radio, Region, RxPacket, SendStatus};
pub use sensors::{Accelerometer, BatteryReader, EnvReading, EnvSensor};

/// Optional modules found during initialization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectedModules {
    pub gnss: bool,
    pub accelerometer: bool,
    pub env_sensor: bool,
}

impl DetectedModules {
    /// Names of the modules that answered, in console order
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.gnss {
            names.push("GNSS");
        }
        if self.accelerometer {
            names.push("ACC");
        }
        if self.env_sensor {
            names.push("ENV");
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_names() {
        let modules = DetectedModules { gnss: true, accelerometer: false, env_sensor: true };
        assert_eq!(modules.names(), vec!["GNSS", "ENV"]);
        assert!(DetectedModules::default().names().is_empty());
    }
}
