//! # Scheduler Module
//!
//! The event loop of the tracker. Timers, the radio stack, the motion
//! interrupt and the acquisition task only set bits on the
//! [`EventBus`](crate::events::EventBus); the scheduler consumes the bits one
//! group at a time and does the actual work.
//!
//! This module handles:
//! - Periodic status cycles (battery, sensors, location request)
//! - Motion triggers with send throttling (see [`throttle`])
//! - Building and sending the uplink once a location attempt finishes
//! - Join / TX / RX results from the radio stack
//! - Battery protection (low-power reporting interval)
//! - Restart after too many failed uplinks
//! - AT console lines

pub mod throttle;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use crate::acquisition::{fix_search_timeout, AcquisitionHandle, AcquisitionSettings};
use crate::battery::{BatteryGuard, LowPowerHysteresis, PowerTransition};
use crate::config::{Config, LoraWanConfig, TrackerConfig};
use crate::console::at::{AtCommandSet, AtContext};
use crate::console::Console;
use crate::drivers::{
    Accelerometer, BatteryReader, DetectedModules, EnvReading, EnvSensor, Gnss, Radio, RxPacket,
    SendStatus,
};
use crate::events::{
    EventBus, SharedFlags, ACC_TRIGGER, GNSS_FIN, LORA_DATA, LORA_JOIN_FIN, LORA_TX_FIN, STATUS,
};
use crate::payload::{encode_battery_only, encode_uplink, PayloadSettings, Readings, Uplink};
use crate::storage::{SettingsStore, TrackerSettings};
use crate::telemetry::UplinkJournal;
use crate::timer::SoftTimer;
use throttle::ThrottleDecision;

const HANDLED_EVENTS: u16 =
    STATUS | ACC_TRIGGER | GNSS_FIN | LORA_JOIN_FIN | LORA_TX_FIN | LORA_DATA;

/// Application hook for received downlinks / P2P packets
pub type RxHandler = Box<dyn FnMut(&RxPacket) + Send>;

/// The external collaborators the scheduler drives
pub struct Devices {
    pub radio: Box<dyn Radio>,
    pub gnss: Box<dyn Gnss>,
    pub env_sensor: Box<dyn EnvSensor>,
    pub accelerometer: Box<dyn Accelerometer>,
    pub battery: Box<dyn BatteryReader>,
}

/// Why the scheduler asks for a restart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// This many uplinks in a row were not delivered
    SendFailures(u8),
}

/// The tracker's event-driven scheduler
pub struct Scheduler {
    lorawan: LoraWanConfig,
    tracker: TrackerConfig,
    bus: Arc<EventBus>,
    flags: Arc<SharedFlags>,
    console: Arc<dyn Console>,

    radio: Box<dyn Radio>,
    gnss: Option<Box<dyn Gnss>>,
    env_sensor: Box<dyn EnvSensor>,
    accelerometer: Box<dyn Accelerometer>,
    battery: BatteryGuard,
    hysteresis: LowPowerHysteresis,
    modules: DetectedModules,
    acquisition: Option<AcquisitionHandle>,

    store: SettingsStore,
    settings: TrackerSettings,
    at_commands: AtCommandSet,
    journal: Option<UplinkJournal>,
    rx_handler: Option<RxHandler>,

    status_timer: SoftTimer,
    delayed_timer: SoftTimer,
    last_send: Instant,
    battery_level: u16,
    send_failures: u8,
}

impl Scheduler {
    /// Create a scheduler
    ///
    /// Loads the persisted flags from `store`. Nothing runs until
    /// [`start`](Self::start) is called.
    ///
    /// # Arguments
    ///
    /// * `config` - Deployment configuration
    /// * `devices` - Radio, GNSS, sensors and battery ADC
    /// * `store` - Persisted tracker flags
    /// * `console` - Sink for `+EVT:` notifications and AT replies
    /// * `bus` - Event bus shared with the devices
    pub fn new(
        config: &Config,
        devices: Devices,
        store: SettingsStore,
        console: Arc<dyn Console>,
        bus: Arc<EventBus>,
    ) -> Self {
        let flags = Arc::new(SharedFlags::new());
        let settings = store.load_flags();

        let status_timer = {
            let bus = Arc::clone(&bus);
            SoftTimer::periodic("status", move || bus.signal(STATUS))
        };
        let delayed_timer = {
            let bus = Arc::clone(&bus);
            let flags = Arc::clone(&flags);
            SoftTimer::one_shot("delayed send", move || {
                flags.set_delayed_active(false);
                bus.signal(STATUS);
            })
        };

        Self {
            lorawan: config.lorawan.clone(),
            tracker: config.tracker.clone(),
            bus,
            flags,
            console,
            radio: devices.radio,
            gnss: Some(devices.gnss),
            env_sensor: devices.env_sensor,
            accelerometer: devices.accelerometer,
            battery: BatteryGuard::new(devices.battery),
            hysteresis: LowPowerHysteresis::new(
                config.tracker.battery_low_threshold,
                config.tracker.battery_recover_threshold,
            ),
            modules: DetectedModules::default(),
            acquisition: None,
            store,
            settings,
            at_commands: AtCommandSet::tracker(),
            journal: None,
            rx_handler: None,
            status_timer,
            delayed_timer,
            last_send: Instant::now(),
            battery_level: 0,
            send_failures: 0,
        }
    }

    /// Journal every enqueued uplink
    pub fn with_journal(mut self, journal: UplinkJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn set_rx_handler(&mut self, handler: RxHandler) {
        self.rx_handler = Some(handler);
    }

    pub fn at_commands_mut(&mut self) -> &mut AtCommandSet {
        &mut self.at_commands
    }

    pub fn flags(&self) -> &Arc<SharedFlags> {
        &self.flags
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    pub fn modules(&self) -> &DetectedModules {
        &self.modules
    }

    /// Current period of the status timer
    pub fn status_period(&self) -> Duration {
        self.status_timer.period()
    }

    /// Last battery level read, mV / 10
    pub fn battery_level(&self) -> u16 {
        self.battery_level
    }

    pub fn send_failures(&self) -> u8 {
        self.send_failures
    }

    fn interval(&self) -> Duration {
        Duration::from_millis(self.lorawan.send_repeat_time_ms)
    }

    fn payload_settings(&self) -> PayloadSettings {
        PayloadSettings {
            format: self.settings.location_format(),
            no_fix_policy: self.tracker.no_fix_policy,
        }
    }

    /// Detect modules, arm the status timer and join (or enter P2P mode)
    pub fn start(&mut self) {
        self.detect_modules();
        self.battery_level = self.battery.read_level();

        let interval = self.interval();
        if interval.is_zero() {
            info!("No reporting interval, motion-triggered uplinks only");
        } else {
            info!("Reporting every {:?}", interval);
        }
        self.status_timer.start(interval);

        if self.lorawan.enabled {
            info!("Starting OTAA join");
            self.radio.start_join();
        } else {
            info!("LoRa P2P mode");
            self.flags.set_joined(true);
            self.start_acquisition();
            self.last_send = Instant::now();
        }
    }

    fn detect_modules(&mut self) {
        self.modules = DetectedModules {
            gnss: self.gnss.as_ref().is_some_and(|g| g.is_present()),
            accelerometer: self.accelerometer.is_present(),
            env_sensor: self.env_sensor.is_present(),
        };

        let missing = [
            ("GNSS", self.modules.gnss),
            ("accelerometer", self.modules.accelerometer),
            ("environment sensor", self.modules.env_sensor),
        ];
        for (name, found) in missing {
            if found {
                info!("{} found", name);
            } else {
                warn!("{} not found", name);
            }
        }
    }

    fn start_acquisition(&mut self) {
        if self.acquisition.is_some() {
            return;
        }
        let Some(gnss) = self.gnss.take() else {
            return;
        };

        let settings = AcquisitionSettings {
            search_timeout: fix_search_timeout(
                self.interval(),
                Duration::from_millis(self.tracker.gnss_timeout_max_ms),
            ),
            busy_skip_limit: self.tracker.busy_skip_limit,
            always_on: self.tracker.gnss_always_on,
        };
        self.acquisition = Some(AcquisitionHandle::spawn(
            gnss,
            settings,
            Arc::clone(&self.bus),
            Arc::clone(&self.flags),
            Arc::clone(&self.console),
        ));
    }

    /// Run until a restart is required
    ///
    /// Console lines are executed as AT commands between event groups. A
    /// closed console input is not an error; the tracker keeps running.
    pub async fn run(&mut self, console_input: &mut mpsc::Receiver<String>) -> RestartReason {
        let bus = Arc::clone(&self.bus);
        let mut console_open = true;

        loop {
            tokio::select! {
                _ = bus.wait() => {
                    if let Some(reason) = self.handle_events().await {
                        return reason;
                    }
                }
                line = console_input.recv(), if console_open => match line {
                    Some(line) => self.handle_console_line(&line),
                    None => {
                        debug!("Console input closed");
                        console_open = false;
                    }
                },
            }
        }
    }

    /// Process every pending event group once
    ///
    /// Returns a restart reason if the failure limit was reached.
    pub async fn handle_events(&mut self) -> Option<RestartReason> {
        if self.bus.take(STATUS) {
            self.on_status();
        }
        if self.bus.take(ACC_TRIGGER) {
            self.on_motion();
        }
        if self.bus.take(GNSS_FIN) {
            self.on_location_finished().await;
        }
        if self.bus.take(LORA_JOIN_FIN) {
            self.on_join_finished();
        }
        if self.bus.take(LORA_TX_FIN) {
            if let Some(reason) = self.on_tx_finished() {
                return Some(reason);
            }
        }
        if self.bus.take(LORA_DATA) {
            self.on_rx();
        }

        let unknown = self.bus.mask().snapshot() & !HANDLED_EVENTS;
        if unknown != 0 {
            warn!("Dropping unknown event bits {:#06x}", unknown);
            self.bus.mask().clear(unknown);
        }
        None
    }

    fn on_status(&mut self) {
        debug!("Status wakeup");
        self.battery_level = self.battery.read_level();
        self.update_power_mode();

        if self.flags.low_power() {
            info!("Low-power mode, sending battery level only");
            self.send_uplink(encode_battery_only(self.battery_level));
            return;
        }

        if self.modules.env_sensor {
            self.env_sensor.start_reading();
        }
        match &self.acquisition {
            Some(acquisition) => acquisition.request(),
            None => debug!("Not joined yet, no location requested"),
        }
    }

    fn update_power_mode(&mut self) {
        let active = self.flags.low_power();
        if !self.settings.battery_check {
            if active {
                self.exit_low_power();
            }
            return;
        }

        match self.hysteresis.evaluate(self.battery_level, active) {
            Some(PowerTransition::EnterLowPower) => {
                let period = Duration::from_millis(self.tracker.low_power_interval_ms);
                warn!(
                    "Battery low ({} < {}), reporting every {:?}",
                    self.battery_level, self.hysteresis.enter_below, period
                );
                self.flags.set_low_power(true);
                self.status_timer.start(period);
            }
            Some(PowerTransition::ExitLowPower) => self.exit_low_power(),
            None => {}
        }
    }

    fn exit_low_power(&mut self) {
        info!("Battery protection released (level {})", self.battery_level);
        self.flags.set_low_power(false);
        self.status_timer.start(self.interval());
    }

    fn on_motion(&mut self) {
        self.accelerometer.clear_interrupt();
        if !self.flags.joined() {
            debug!("Motion before join ignored");
            return;
        }

        let interval = self.interval();
        let min_delay =
            throttle::min_delay(interval, Duration::from_millis(self.tracker.min_delay_floor_ms));
        let since_last_send = self.last_send.elapsed();

        match throttle::decide(since_last_send, min_delay, self.flags.delayed_active()) {
            ThrottleDecision::SendNow => {
                info!("Motion detected, sending now");
                self.last_send = Instant::now();
                self.bus.signal(STATUS);
            }
            ThrottleDecision::Delay(wait) => {
                info!(
                    "Motion {:?} after last send, delaying uplink by {:?}",
                    since_last_send, wait
                );
                self.flags.set_delayed_active(true);
                self.delayed_timer.start(wait);
            }
            ThrottleDecision::AlreadyDelayed => {
                debug!("Motion detected, delayed uplink already pending")
            }
        }

        if !interval.is_zero() {
            self.status_timer.reset();
        }
    }

    async fn on_location_finished(&mut self) {
        let env = self.finish_env_reading().await;
        self.flags.set_delayed_active(false);
        self.last_send = Instant::now();

        let readings = Readings {
            fix: self.acquisition.as_ref().and_then(|a| a.take_fix()),
            env,
            battery: self.battery_level,
        };
        let uplink = encode_uplink(&self.payload_settings(), &readings);
        debug!("Uplink layout {:?} ({} bytes)", uplink.layout, uplink.len());
        self.send_uplink(uplink);
    }

    async fn finish_env_reading(&mut self) -> Option<EnvReading> {
        if !self.modules.env_sensor {
            return None;
        }
        let limit = Duration::from_millis(self.tracker.env_read_timeout_ms);
        match time::timeout(limit, self.env_sensor.try_finish_reading(limit)).await {
            Ok(Some(reading)) => Some(reading),
            Ok(None) | Err(_) => {
                warn!("Environment reading not available, sending battery only");
                None
            }
        }
    }

    fn send_uplink(&mut self, uplink: Uplink) {
        if !self.flags.joined() {
            debug!("Not joined, uplink dropped");
            return;
        }

        if self.lorawan.enabled {
            if let Some(max) = self.lorawan.region.max_payload_len(self.lorawan.data_rate) {
                if uplink.len() > max {
                    warn!(
                        "{} byte uplink exceeds {} bytes allowed at DR{}",
                        uplink.len(),
                        max,
                        self.lorawan.data_rate
                    );
                    self.console.event("DR_ERROR");
                    return;
                }
            }
        }

        let attempts = u16::from(self.tracker.size_error_retries) + 1;
        for attempt in 1..=attempts {
            match self.radio.send(&uplink.bytes) {
                SendStatus::Enqueued => {
                    info!(
                        "Uplink enqueued ({} bytes): {}",
                        uplink.len(),
                        hex::encode_upper(&uplink.bytes)
                    );
                    if self.lorawan.enabled {
                        self.flags.set_radio_busy(true);
                    }
                    self.journal_uplink(&uplink);
                    return;
                }
                SendStatus::Busy => {
                    warn!("Radio busy, uplink dropped");
                    self.console.event("BUSY");
                    return;
                }
                SendStatus::SizeError if attempt < attempts => {
                    warn!("Uplink rejected as too large, retry {} of {}", attempt, attempts - 1);
                    self.console.event("SIZE_ERROR RETRY");
                }
                SendStatus::SizeError => {}
            }
        }

        error!("Uplink rejected as too large after {} attempts", attempts);
        self.console.event("SIZE_ERROR");
    }

    fn journal_uplink(&mut self, uplink: &Uplink) {
        if let Some(journal) = self.journal.as_mut() {
            if let Err(e) = journal.record(uplink) {
                warn!("Failed to journal uplink: {}", e);
            }
        }
    }

    fn on_join_finished(&mut self) {
        if self.bus.join_result() {
            info!("Joined network");
            self.console.event("JOINED");
            self.flags.set_joined(true);
            self.start_acquisition();
            self.last_send = Instant::now();
        } else {
            warn!("Join failed");
            self.console.event("JOIN FAILED");
        }
    }

    fn on_tx_finished(&mut self) -> Option<RestartReason> {
        self.flags.set_radio_busy(false);
        let delivered = self.bus.tx_result();

        if self.lorawan.enabled && self.lorawan.confirmed_messages {
            self.console.event(if delivered {
                "SEND CONFIRMED SUCCESS"
            } else {
                "SEND CONFIRMED FAIL"
            });
        } else {
            self.console.event("SEND OK");
        }

        if delivered {
            if self.send_failures > 0 {
                debug!("Uplink delivered, clearing {} failures", self.send_failures);
            }
            self.send_failures = 0;
            return None;
        }

        self.send_failures = self.send_failures.saturating_add(1);
        warn!(
            "Uplink not delivered ({} of {} allowed failures)",
            self.send_failures, self.tracker.max_send_failures
        );
        if self.send_failures >= self.tracker.max_send_failures {
            error!("{} uplinks in a row failed, restarting", self.send_failures);
            let reason = RestartReason::SendFailures(self.send_failures);
            self.send_failures = 0;
            return Some(reason);
        }
        None
    }

    fn on_rx(&mut self) {
        let Some(packet) = self.bus.take_rx_packet() else {
            return;
        };
        self.flags.set_radio_busy(false);

        let data = hex::encode_upper(&packet.data);
        info!(
            "Received {} bytes on port {} (RSSI {}, SNR {})",
            packet.data.len(),
            packet.port,
            packet.rssi,
            packet.snr
        );
        if self.lorawan.enabled {
            self.console.event(&format!("RX_1, RSSI {}, SNR {}", packet.rssi, packet.snr));
            self.console.event(&format!("{}:{}", packet.port, data));
        } else {
            self.console.event(&format!("RXP2P, RSSI {}, SNR {}", packet.rssi, packet.snr));
            self.console.event(&data);
        }

        if let Some(handler) = self.rx_handler.as_mut() {
            handler(&packet);
        }
    }

    /// Execute one AT console line, persisting changed flags
    pub fn handle_console_line(&mut self, line: &str) {
        let before = self.settings;
        let mut reply = {
            let mut ctx = AtContext {
                settings: &mut self.settings,
                modules: &self.modules,
            };
            self.at_commands.handle_line(line, &mut ctx)
        };

        if self.settings != before {
            info!("Settings changed: {:?}", self.settings);
            if let Err(e) = self.store.save_flags(&self.settings) {
                error!("Failed to persist settings: {}", e);
                // A partial save may have left some records behind
                self.settings = before;
                if let Err(e) = self.store.save_flags(&before) {
                    error!("Failed to restore previous settings: {}", e);
                }
                reply.lines = vec!["AT_ERROR".to_string()];
            }
        }

        for line in &reply.lines {
            self.console.print(line);
        }
    }
}
