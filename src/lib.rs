//! # LPWAN Tracker Library
//!
//! Event-driven scheduler for battery-powered LoRaWAN / LoRa P2P asset
//! trackers.
//!
//! This library provides the core functionality for deciding when to wake,
//! acquire a GNSS location, read sensors and transmit a compact uplink, while
//! protecting the battery and the radio duty cycle.

pub mod acquisition;
pub mod battery;
pub mod config;
pub mod console;
pub mod drivers;
pub mod error;
pub mod events;
pub mod payload;
pub mod scheduler;
pub mod sim;
pub mod storage;
pub mod telemetry;
pub mod timer;
