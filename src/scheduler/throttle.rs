//! Motion-trigger throttling
//!
//! Motion events may ask for an uplink at any time. They are honored at most
//! once per minimum delay; an early request arms a single delayed send for
//! the remainder instead.

use std::time::Duration;

/// What to do with a motion-triggered send request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Enough time has passed, send right away
    SendNow,
    /// Arm the delayed-send timer for this long
    Delay(Duration),
    /// A delayed send is already pending, drop the request
    AlreadyDelayed,
}

/// Minimum spacing of motion-triggered sends
///
/// Half the reporting interval, or `floor` when there is no periodic
/// schedule.
pub fn min_delay(interval: Duration, floor: Duration) -> Duration {
    if interval.is_zero() {
        floor
    } else {
        interval / 2
    }
}

/// Decide how to handle a motion event
///
/// # Arguments
///
/// * `since_last_send` - Time since the last send attempt
/// * `min_delay` - Minimum spacing, see [`min_delay`]
/// * `delayed_active` - Whether a delayed send is already armed
pub fn decide(
    since_last_send: Duration,
    min_delay: Duration,
    delayed_active: bool,
) -> ThrottleDecision {
    if since_last_send >= min_delay {
        return ThrottleDecision::SendNow;
    }
    if delayed_active {
        return ThrottleDecision::AlreadyDelayed;
    }

    let wait = min_delay
        .checked_sub(since_last_send)
        .filter(|d| !d.is_zero())
        .unwrap_or(min_delay);
    ThrottleDecision::Delay(wait)
}
