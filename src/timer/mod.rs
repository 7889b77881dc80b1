//! Timer service and host-loop utilities for the SOFA MAC.
//!
//! The MAC arms three single-shot alarms, named by [`TimerId`], through a
//! [`TimerService`]. Re-arming an alarm replaces its pending deadline, so at
//! most one firing per alarm is ever outstanding. When an alarm expires the
//! host calls [`SofaMac::on_timer`](crate::driver::SofaMac::on_timer).
//!
//! Two ways of driving the MAC are provided:
//! - [`SoftTimers`]: a polled software alarm table over a [`Clock`], serviced
//!   by [`SofaMac::poll`](crate::driver::SofaMac::poll) and the blocking
//!   `run_sofa_loop` (feature `delay-loop`)
//! - `global_sofa_*` helpers and `sofa_timer_fired!()` for hardware alarm
//!   interrupts sharing a `critical_section` protected singleton (feature `timer-isr`)
//!
//! Hardware alarms count in timer ticks; [`duration_to_ticks`] and
//! [`const_duration_to_ticks`] convert protocol durations.
//!
//! | Timer clock | 5 ms on-time | 1 s period  |
//! |-------------|--------------|-------------|
//! |   32 768 Hz |          164 |      32 768 |
//! |     128 Hz  |            1 |         128 |

use libm::round;

use crate::consts::MICROS_PER_SECOND;

#[cfg(feature = "delay-loop")]
mod delay;
#[cfg_attr(feature = "delay-loop", allow(unused_imports))]
#[cfg(feature = "delay-loop")]
pub use delay::*;

#[cfg(feature = "timer-isr")]
mod isr;
#[cfg_attr(feature = "timer-isr", allow(unused_imports))]
#[cfg(feature = "timer-isr")]
pub use isr::*;

#[cfg(feature = "timer-isr")]
mod macros;
#[cfg_attr(feature = "timer-isr", allow(unused_imports))]
#[cfg(feature = "timer-isr")]
pub use macros::*;

/// The alarms used by the MAC.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum TimerId {
    /// Bounds every peer-waiting state; firing returns the node to idle.
    IdleTimeout,
    /// Carrier-sense delay before a strobe burst.
    Backoff,
    /// Drives the radio duty cycle.
    PowerCycle,
}

impl TimerId {
    /// Every alarm, in slot order.
    pub const ALL: [TimerId; 3] = [TimerId::IdleTimeout, TimerId::Backoff, TimerId::PowerCycle];

    /// Slot index of this alarm in a timer table.
    pub const fn index(&self) -> usize {
        match self {
            TimerId::IdleTimeout => 0,
            TimerId::Backoff => 1,
            TimerId::PowerCycle => 2,
        }
    }
}

/// Monotonic microsecond clock.
pub trait Clock {
    /// Microseconds since an arbitrary epoch.
    fn now_us(&self) -> u64;
}

/// Single-shot alarms with re-arm-cancels-previous semantics.
pub trait TimerService {
    /// Current time in microseconds; used to bound the strobe burst.
    fn now_us(&self) -> u64;

    /// Arms `id` to fire `after_us` microseconds from now, superseding any
    /// pending firing of `id`.
    fn schedule(&mut self, id: TimerId, after_us: u32);

    /// Cancels any pending firing of `id`.
    fn cancel(&mut self, id: TimerId);

    /// Takes one expired alarm, for polled implementations.
    ///
    /// Interrupt-driven implementations deliver firings themselves and keep
    /// the default, which never reports anything.
    fn take_expired(&mut self) -> Option<TimerId> {
        None
    }
}

/// A polled software [`TimerService`] with one deadline slot per [`TimerId`].
#[derive(Debug)]
pub struct SoftTimers<C: Clock> {
    clock: C,
    deadlines: [Option<u64>; 3],
}

impl<C: Clock> SoftTimers<C> {
    /// Creates a table with every alarm disarmed.
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            deadlines: [None; 3],
        }
    }

    /// Whether `id` has a pending firing.
    pub fn is_armed(&self, id: TimerId) -> bool {
        self.deadlines[id.index()].is_some()
    }

    /// Absolute deadline of `id`, if armed.
    pub fn deadline(&self, id: TimerId) -> Option<u64> {
        self.deadlines[id.index()]
    }

    /// The underlying clock.
    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<C: Clock> TimerService for SoftTimers<C> {
    fn now_us(&self) -> u64 {
        self.clock.now_us()
    }

    fn schedule(&mut self, id: TimerId, after_us: u32) {
        let now = self.clock.now_us();
        self.deadlines[id.index()] = Some(now.saturating_add(u64::from(after_us)));
    }

    fn cancel(&mut self, id: TimerId) {
        self.deadlines[id.index()] = None;
    }

    fn take_expired(&mut self) -> Option<TimerId> {
        let now = self.clock.now_us();
        let due = TimerId::ALL
            .iter()
            .copied()
            .filter_map(|id| match self.deadlines[id.index()] {
                Some(deadline) if deadline <= now => Some((deadline, id)),
                _ => None,
            })
            .min_by_key(|&(deadline, _)| deadline)
            .map(|(_, id)| id)?;
        self.deadlines[due.index()] = None;
        Some(due)
    }
}

/// Converts a duration to hardware timer ticks.
///
/// # Arguments
/// - `duration_us`: duration in microseconds (e.g. an on-time)
/// - `timer_hz`: tick frequency of the alarm peripheral
///
/// # Returns
/// - The tick count, rounded to nearest and never below 1 so a zero-length
///   alarm still fires on the next tick
pub fn duration_to_ticks(duration_us: u32, timer_hz: u32) -> u32 {
    let ticks = f64::from(duration_us) * f64::from(timer_hz) / f64::from(MICROS_PER_SECOND);
    let ticks = round(ticks) as u32;
    if ticks == 0 { 1 } else { ticks }
}

/// Compile-time duration to tick converter.
///
/// Integer arithmetic, rounding to nearest, never below 1.
///
/// # Arguments
/// - `duration_us`: duration in microseconds
/// - `timer_hz`: tick frequency of the alarm peripheral
pub const fn const_duration_to_ticks(duration_us: u32, timer_hz: u32) -> u32 {
    let scaled = duration_us as u64 * timer_hz as u64;
    let ticks = (scaled + (MICROS_PER_SECOND as u64 / 2)) / MICROS_PER_SECOND as u64;
    if ticks == 0 { 1 } else { ticks as u32 }
}
