//! # Event Bus
//!
//! Shared event mask between the wakeup sources (timers, motion interrupt,
//! acquisition task, radio callbacks) and the single scheduler loop.
//!
//! Producers set a bit and wake the consumer; they never block. The consumer
//! takes bits out of the mask atomically, so a bit set while a handler runs is
//! seen on the next pass instead of being lost.

use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;
use tracing::trace;

use crate::drivers::RxPacket;

/// Periodic timer fired (or a send was synthesized)
pub const STATUS: u16 = 0b0000_0000_0000_0001;
/// LoRaWAN join procedure finished
pub const LORA_JOIN_FIN: u16 = 0b0000_0000_0000_0010;
/// LoRa TX cycle finished
pub const LORA_TX_FIN: u16 = 0b0000_0000_0000_0100;
/// Downlink / P2P packet received
pub const LORA_DATA: u16 = 0b0000_0000_0000_1000;
/// GNSS location search finished
pub const GNSS_FIN: u16 = 0b0100_0000_0000_0000;
/// Accelerometer motion interrupt
pub const ACC_TRIGGER: u16 = 0b1000_0000_0000_0000;

/// Atomic set of pending event bits
#[derive(Debug, Default)]
pub struct EventMask {
    bits: AtomicU16,
}

impl EventMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, flags: u16) {
        self.bits.fetch_or(flags, Ordering::AcqRel);
    }

    pub fn clear(&self, flags: u16) {
        self.bits.fetch_and(!flags, Ordering::AcqRel);
    }

    /// Clear `flag` and report whether it was set
    pub fn take(&self, flag: u16) -> bool {
        self.bits.fetch_and(!flag, Ordering::AcqRel) & flag != 0
    }

    pub fn contains(&self, flag: u16) -> bool {
        self.bits.load(Ordering::Acquire) & flag == flag
    }

    pub fn snapshot(&self) -> u16 {
        self.bits.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot() == 0
    }
}

/// Flags shared between the scheduler, the acquisition task and timers
#[derive(Debug, Default)]
pub struct SharedFlags {
    /// A LoRaWAN TX cycle is running
    radio_busy: AtomicBool,
    /// Battery protection reduced the reporting rate
    low_power: AtomicBool,
    /// The delayed-send timer is armed
    delayed_active: AtomicBool,
    /// Network joined (always true in P2P mode)
    joined: AtomicBool,
}

impl SharedFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn radio_busy(&self) -> bool {
        self.radio_busy.load(Ordering::Acquire)
    }

    pub fn set_radio_busy(&self, busy: bool) {
        self.radio_busy.store(busy, Ordering::Release);
    }

    pub fn low_power(&self) -> bool {
        self.low_power.load(Ordering::Acquire)
    }

    pub fn set_low_power(&self, active: bool) {
        self.low_power.store(active, Ordering::Release);
    }

    pub fn delayed_active(&self) -> bool {
        self.delayed_active.load(Ordering::Acquire)
    }

    pub fn set_delayed_active(&self, active: bool) {
        self.delayed_active.store(active, Ordering::Release);
    }

    pub fn joined(&self) -> bool {
        self.joined.load(Ordering::Acquire)
    }

    pub fn set_joined(&self, joined: bool) {
        self.joined.store(joined, Ordering::Release);
    }
}

/// Event mask plus the wakeup primitive of the scheduler loop
///
/// Radio events carry a small result alongside their bit; the result is
/// stored before the bit is set so the consumer always sees both.
#[derive(Debug, Default)]
pub struct EventBus {
    mask: EventMask,
    wakeup: Notify,
    join_result: AtomicBool,
    tx_result: AtomicBool,
    rx_packet: Mutex<Option<RxPacket>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set event bits and wake the scheduler
    pub fn signal(&self, flags: u16) {
        trace!("signal event bits {:#06x}", flags);
        self.mask.set(flags);
        self.wakeup.notify_one();
    }

    /// Report the outcome of the join procedure
    pub fn post_join_result(&self, success: bool) {
        self.join_result.store(success, Ordering::Release);
        self.signal(LORA_JOIN_FIN);
    }

    /// Report the end of a TX cycle and whether it was delivered
    pub fn post_tx_done(&self, success: bool) {
        self.tx_result.store(success, Ordering::Release);
        self.signal(LORA_TX_FIN);
    }

    /// Hand a received packet to the scheduler
    ///
    /// Only the latest packet is kept if the scheduler has not consumed the
    /// previous one yet.
    pub fn post_rx(&self, packet: RxPacket) {
        match self.rx_packet.lock() {
            Ok(mut slot) => *slot = Some(packet),
            Err(poisoned) => *poisoned.into_inner() = Some(packet),
        }
        self.signal(LORA_DATA);
    }

    pub fn mask(&self) -> &EventMask {
        &self.mask
    }

    pub fn take(&self, flag: u16) -> bool {
        self.mask.take(flag)
    }

    pub fn join_result(&self) -> bool {
        self.join_result.load(Ordering::Acquire)
    }

    pub fn tx_result(&self) -> bool {
        self.tx_result.load(Ordering::Acquire)
    }

    pub fn take_rx_packet(&self) -> Option<RxPacket> {
        match self.rx_packet.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    /// Wait until at least one event bit is pending
    ///
    /// Returns the pending bits without clearing them.
    pub async fn wait(&self) -> u16 {
        loop {
            let pending = self.mask.snapshot();
            if pending != 0 {
                return pending;
            }
            self.wakeup.notified().await;
        }
    }
}
