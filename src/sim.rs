//! # Simulated Devices
//!
//! Host stand-ins for the radio stack, GNSS module, sensors and battery ADC,
//! driven by the `[simulation]` config section. They report through the
//! [`EventBus`] exactly like the real drivers' interrupt handlers would, so
//! the binary exercises the full scheduler on a development machine.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};
use tracing::{debug, info, trace};

use crate::config::SimulationConfig;
use crate::drivers::{
    Accelerometer, BatteryReader, EnvReading, EnvSensor, Fix, Gnss, Radio, SendStatus,
};
use crate::events::{EventBus, ACC_TRIGGER};
use crate::scheduler::Devices;
use crate::timer::SoftTimer;

/// Time the simulated network takes to accept a join
const JOIN_DELAY: Duration = Duration::from_secs(3);

/// Largest frame the simulated radio accepts
const MAX_FRAME_LEN: usize = 222;

/// Conversion time of the simulated environment sensor
const ENV_CONVERSION_TIME: Duration = Duration::from_millis(150);

/// Build the full set of simulated devices
pub fn devices(config: &SimulationConfig, bus: &Arc<EventBus>) -> Devices {
    Devices {
        radio: Box::new(SimRadio::new(config, Arc::clone(bus))),
        gnss: Box::new(SimGnss::new(config)),
        env_sensor: Box::new(SimEnvSensor::default()),
        accelerometer: Box::new(SimAccelerometer),
        battery: Box::new(SimBattery { millivolts: config.battery_mv }),
    }
}

/// Periodic motion interrupts, `None` when disabled
pub fn motion_source(config: &SimulationConfig, bus: &Arc<EventBus>) -> Option<SoftTimer> {
    if config.motion_interval_ms == 0 {
        return None;
    }
    let bus = Arc::clone(bus);
    let mut timer = SoftTimer::periodic("motion", move || bus.signal(ACC_TRIGGER));
    timer.start(Duration::from_millis(config.motion_interval_ms));
    info!("Simulated motion every {} ms", config.motion_interval_ms);
    Some(timer)
}

/// Radio stack that completes joins and transmissions after a delay
pub struct SimRadio {
    bus: Arc<EventBus>,
    join_success: bool,
    tx_success: bool,
    airtime: Duration,
    tx_in_flight: Arc<AtomicBool>,
}

impl SimRadio {
    pub fn new(config: &SimulationConfig, bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            join_success: config.join_success,
            tx_success: config.tx_success,
            airtime: Duration::from_millis(config.airtime_ms),
            tx_in_flight: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Radio for SimRadio {
    fn start_join(&mut self) {
        let bus = Arc::clone(&self.bus);
        let success = self.join_success;
        tokio::spawn(async move {
            time::sleep(JOIN_DELAY).await;
            debug!("Simulated join finished (success: {})", success);
            bus.post_join_result(success);
        });
    }

    fn send(&mut self, payload: &[u8]) -> SendStatus {
        if payload.len() > MAX_FRAME_LEN {
            return SendStatus::SizeError;
        }
        if self.tx_in_flight.swap(true, Ordering::AcqRel) {
            return SendStatus::Busy;
        }

        let bus = Arc::clone(&self.bus);
        let in_flight = Arc::clone(&self.tx_in_flight);
        let success = self.tx_success;
        let airtime = self.airtime;
        tokio::spawn(async move {
            time::sleep(airtime).await;
            in_flight.store(false, Ordering::Release);
            bus.post_tx_done(success);
        });
        SendStatus::Enqueued
    }
}

/// GNSS receiver with a fixed position and time to fix
pub struct SimGnss {
    fix: Option<Fix>,
    time_to_fix: Duration,
    powered: bool,
}

impl SimGnss {
    pub fn new(config: &SimulationConfig) -> Self {
        let fix = config.has_fix.then_some(Fix {
            latitude: config.latitude,
            longitude: config.longitude,
            altitude_mm: config.altitude_mm,
            accuracy: config.accuracy,
        });
        Self {
            fix,
            time_to_fix: Duration::from_millis(config.fix_delay_ms),
            powered: true,
        }
    }
}

#[async_trait]
impl Gnss for SimGnss {
    fn is_present(&self) -> bool {
        true
    }

    fn power_on(&mut self) {
        trace!("Simulated GNSS powered on");
        self.powered = true;
    }

    fn power_off(&mut self) {
        trace!("Simulated GNSS powered off");
        self.powered = false;
    }

    async fn acquire_fix(&mut self, timeout: Duration) -> Option<Fix> {
        if !self.powered {
            return None;
        }
        match self.fix {
            Some(fix) if self.time_to_fix <= timeout => {
                time::sleep(self.time_to_fix).await;
                Some(fix)
            }
            _ => {
                time::sleep(timeout).await;
                None
            }
        }
    }
}

/// Environment sensor returning a constant indoor climate
#[derive(Default)]
pub struct SimEnvSensor {
    started: Option<Instant>,
}

#[async_trait]
impl EnvSensor for SimEnvSensor {
    fn is_present(&self) -> bool {
        true
    }

    fn start_reading(&mut self) {
        self.started = Some(Instant::now());
    }

    async fn try_finish_reading(&mut self, timeout: Duration) -> Option<EnvReading> {
        let started = self.started.take()?;
        let ready_at = started + ENV_CONVERSION_TIME;
        if ready_at > Instant::now() + timeout {
            return None;
        }
        time::sleep_until(ready_at).await;
        Some(EnvReading {
            humidity: 45.5,
            temperature: 22.4,
            pressure: 101_325,
            gas_resistance: 85_000,
        })
    }
}

pub struct SimAccelerometer;

impl Accelerometer for SimAccelerometer {
    fn is_present(&self) -> bool {
        true
    }

    fn clear_interrupt(&mut self) {
        trace!("Simulated motion interrupt cleared");
    }
}

pub struct SimBattery {
    millivolts: u16,
}

impl BatteryReader for SimBattery {
    fn read_millivolts(&mut self) -> u16 {
        self.millivolts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{LORA_JOIN_FIN, LORA_TX_FIN};

    #[tokio::test(start_paused = true)]
    async fn test_radio_join_and_tx_cycle() {
        let bus = Arc::new(EventBus::new());
        let mut radio = SimRadio::new(&SimulationConfig::default(), Arc::clone(&bus));

        radio.start_join();
        assert_eq!(bus.wait().await, LORA_JOIN_FIN);
        assert!(bus.join_result());
        bus.take(LORA_JOIN_FIN);

        assert_eq!(radio.send(&[0x02, 0x02, 0x01, 0x90]), SendStatus::Enqueued);
        assert_eq!(radio.send(&[0x02, 0x02, 0x01, 0x90]), SendStatus::Busy);
        assert_eq!(bus.wait().await, LORA_TX_FIN);
        assert!(bus.tx_result());

        assert_eq!(radio.send(&[0u8; MAX_FRAME_LEN + 1]), SendStatus::SizeError);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gnss_without_fix_waits_full_timeout() {
        let config = SimulationConfig { has_fix: false, ..SimulationConfig::default() };
        let mut gnss = SimGnss::new(&config);

        let started = Instant::now();
        assert_eq!(gnss.acquire_fix(Duration::from_secs(45)).await, None);
        assert_eq!(started.elapsed(), Duration::from_secs(45));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gnss_fix_after_delay() {
        let mut gnss = SimGnss::new(&SimulationConfig::default());
        let fix = gnss.acquire_fix(Duration::from_secs(60)).await.unwrap();
        assert_eq!(fix.latitude, SimulationConfig::default().latitude);

        gnss.power_off();
        assert_eq!(gnss.acquire_fix(Duration::from_secs(60)).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_env_reading_requires_start() {
        let mut sensor = SimEnvSensor::default();
        assert_eq!(sensor.try_finish_reading(Duration::from_secs(1)).await, None);

        sensor.start_reading();
        assert!(sensor.try_finish_reading(Duration::from_secs(1)).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_motion_source() {
        let bus = Arc::new(EventBus::new());
        let config = SimulationConfig { motion_interval_ms: 0, ..SimulationConfig::default() };
        assert!(motion_source(&config, &bus).is_none());

        let config = SimulationConfig { motion_interval_ms: 5_000, ..SimulationConfig::default() };
        let _timer = motion_source(&config, &bus).unwrap();
        assert_eq!(bus.wait().await, ACC_TRIGGER);
    }
}
