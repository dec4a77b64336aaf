//! # Radio Interface
//!
//! The LoRaWAN MAC / LoRa P2P stack is an external collaborator. Sending only
//! enqueues a frame; completion, join results and downlinks come back
//! asynchronously through the [`EventBus`](crate::events::EventBus).

use serde::Deserialize;

/// Result of handing a payload to the radio stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// Frame accepted, a TX-done event will follow
    Enqueued,
    /// A previous TX cycle is still running
    Busy,
    /// Payload does not fit the current data rate
    SizeError,
}

/// A received downlink (LoRaWAN) or P2P packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RxPacket {
    /// LoRaWAN application port, 0 for P2P packets
    pub port: u8,
    pub rssi: i16,
    pub snr: i8,
    pub data: Vec<u8>,
}

/// LoRaWAN regional parameter set
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    #[serde(rename = "EU868")]
    Eu868,
    #[serde(rename = "US915")]
    Us915,
}

/// Maximum application payload (N) per data rate for EU868, DR0..DR7
const EU868_MAX_PAYLOAD: [usize; 8] = [51, 51, 51, 115, 222, 222, 222, 222];

/// Maximum application payload (N) per data rate for US915 uplinks, DR0..DR4
const US915_MAX_PAYLOAD: [usize; 5] = [11, 53, 125, 242, 242];

impl Region {
    /// Highest uplink data rate index defined for the region
    pub fn max_data_rate(self) -> u8 {
        match self {
            Region::Eu868 => (EU868_MAX_PAYLOAD.len() - 1) as u8,
            Region::Us915 => (US915_MAX_PAYLOAD.len() - 1) as u8,
        }
    }

    /// Largest application payload the region allows at `data_rate`
    ///
    /// Returns `None` for data rates the region does not define.
    pub fn max_payload_len(self, data_rate: u8) -> Option<usize> {
        let table: &[usize] = match self {
            Region::Eu868 => &EU868_MAX_PAYLOAD,
            Region::Us915 => &US915_MAX_PAYLOAD,
        };
        table.get(data_rate as usize).copied()
    }
}

/// Radio stack interface
#[cfg_attr(test, mockall::automock)]
pub trait Radio: Send {
    /// Start the OTAA join procedure; the result arrives as a join event
    fn start_join(&mut self);

    /// Enqueue an uplink
    fn send(&mut self, payload: &[u8]) -> SendStatus;
}
