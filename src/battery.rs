//! # Battery Guard
//!
//! Battery level reading and the low-power hysteresis used to protect a
//! draining battery.
//!
//! Thresholds are asymmetric: the tracker enters low-power mode below the low
//! threshold and only leaves it above the (higher) recover threshold, so a
//! level hovering around a single boundary cannot make the reporting rate
//! oscillate.

use tracing::debug;

use crate::drivers::BatteryReader;

/// Reads the battery and scales it to the payload unit (mV / 10)
pub struct BatteryGuard {
    reader: Box<dyn BatteryReader>,
}

impl BatteryGuard {
    pub fn new(reader: Box<dyn BatteryReader>) -> Self {
        Self { reader }
    }

    /// Current battery level in mV / 10 (0.01 V)
    pub fn read_level(&mut self) -> u16 {
        let millivolts = self.reader.read_millivolts();
        let level = millivolts / 10;
        debug!("Battery {} mV (level {})", millivolts, level);
        level
    }
}

/// Change of the battery protection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerTransition {
    EnterLowPower,
    ExitLowPower,
}

/// Low-power hysteresis thresholds in mV / 10
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LowPowerHysteresis {
    pub enter_below: u16,
    pub exit_above: u16,
}

impl LowPowerHysteresis {
    pub fn new(enter_below: u16, exit_above: u16) -> Self {
        Self { enter_below, exit_above }
    }

    /// Decide whether `level` changes the protection state
    pub fn evaluate(&self, level: u16, low_power_active: bool) -> Option<PowerTransition> {
        if level < self.enter_below && !low_power_active {
            Some(PowerTransition::EnterLowPower)
        } else if level > self.exit_above && low_power_active {
            Some(PowerTransition::ExitLowPower)
        } else {
            None
        }
    }
}
