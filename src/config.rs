//! Runtime configuration of the MAC.
//!
//! A [`SofaConfig`] is handed to [`SofaMac::new`](crate::driver::SofaMac::new)
//! once and never changes afterwards. Durations are in microseconds.

use crate::consts::{
    BACKOFF_ON_TIMES, DEFAULT_CHANNEL_CHECK_RATE, DEFAULT_STROBE_ACK_RETX_PERCENT,
    MICROS_PER_SECOND, ON_TIME_DIVISOR, WAIT_ON_TIMES,
};
use crate::frame::Address;

/// Radio duty-cycle timing, derived from a channel check rate.
///
/// The four base durations are fixed at construction. The peer-waiting
/// windows and the backoff are multiples of the on-time.
///
/// ```rust
/// use sofamac::config::TimingConfig;
///
/// let timing = TimingConfig::from_check_rate(1);
/// assert_eq!(timing.on_time(), 5_000);
/// assert_eq!(timing.off_time(), 995_000);
/// assert_eq!(timing.period(), 1_000_000);
/// ```
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct TimingConfig {
    on_time: u32,
    off_time: u32,
    strobe_time: u32,
    strobe_wait_time: u32,
}

impl TimingConfig {
    /// Derives the timing from the number of channel checks per second.
    ///
    /// A rate of zero, or one so high the period rounds to zero, is clamped so
    /// that every duration is at least one microsecond.
    pub const fn from_check_rate(checks_per_second: u32) -> Self {
        let rate = if checks_per_second == 0 {
            1
        } else {
            checks_per_second
        };
        let mut period = MICROS_PER_SECOND / rate;
        if period < 2 {
            period = 2;
        }
        let mut on_time = period / ON_TIME_DIVISOR;
        if on_time == 0 {
            on_time = 1;
        }
        Self {
            on_time,
            off_time: period - on_time,
            strobe_time: period,
            strobe_wait_time: on_time,
        }
    }

    /// Time the radio stays on during each wake-up.
    pub const fn on_time(&self) -> u32 {
        self.on_time
    }

    /// Time the radio stays off between wake-ups.
    pub const fn off_time(&self) -> u32 {
        self.off_time
    }

    /// Total budget of a strobe burst.
    pub const fn strobe_time(&self) -> u32 {
        self.strobe_time
    }

    /// How long the initiator listens for an acknowledgment between two strobes.
    pub const fn strobe_wait_time(&self) -> u32 {
        self.strobe_wait_time
    }

    /// One full on/off cycle, which is also the channel check interval.
    pub const fn period(&self) -> u32 {
        self.on_time + self.off_time
    }

    /// How long a responder waits for the initiator's data after acking a strobe.
    pub const fn master_packet_wait(&self) -> u32 {
        WAIT_ON_TIMES * self.on_time
    }

    /// How long a responder waits for the final data acknowledgment.
    pub const fn master_ack_wait(&self) -> u32 {
        WAIT_ON_TIMES * self.on_time
    }

    /// How long the initiator waits for the responder's data.
    pub const fn slave_packet_wait(&self) -> u32 {
        WAIT_ON_TIMES * self.on_time
    }

    /// Carrier-sense delay between powering on and starting a strobe burst.
    pub const fn backoff(&self) -> u32 {
        BACKOFF_ON_TIMES * self.on_time
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::from_check_rate(DEFAULT_CHANNEL_CHECK_RATE)
    }
}

/// What a node waiting to send does when it hears traffic during its backoff.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum BusyPolicy {
    /// Drop the pending push silently, return to idle and handle the overheard
    /// frame like any idle node would (possibly becoming its responder).
    #[default]
    YieldToPeer,
    /// Report [`Outcome::Busy`](crate::hal::Outcome::Busy), power the radio down
    /// and keep the push pending until the next wake-up re-arms the backoff.
    /// The overheard frame is dropped.
    SleepOnBusy,
}

/// Complete configuration of a [`SofaMac`](crate::driver::SofaMac).
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct SofaConfig {
    /// Link address of this node.
    pub address: Address,
    /// Duty-cycle timing.
    pub timing: TimingConfig,
    /// Listen for [`TimingConfig::backoff`] before strobing. When `false`,
    /// [`transmit`](crate::driver::SofaMac::transmit) starts the strobe burst immediately.
    pub use_backoff: bool,
    /// Reaction to traffic heard during the backoff.
    pub busy_policy: BusyPolicy,
    /// Chance (0-100) of re-sending a strobe acknowledgment when a strobe is
    /// heard while already waiting for the initiator's data.
    pub strobe_ack_retx_percent: u8,
}

impl SofaConfig {
    /// Default configuration for the node at `address`.
    pub const fn new(address: Address) -> Self {
        Self {
            address,
            timing: TimingConfig::from_check_rate(DEFAULT_CHANNEL_CHECK_RATE),
            use_backoff: true,
            busy_policy: BusyPolicy::YieldToPeer,
            strobe_ack_retx_percent: DEFAULT_STROBE_ACK_RETX_PERCENT,
        }
    }

    /// Replaces the duty-cycle timing.
    pub const fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    /// Enables or disables the carrier-sense backoff.
    pub const fn with_backoff(mut self, use_backoff: bool) -> Self {
        self.use_backoff = use_backoff;
        self
    }

    /// Replaces the busy-channel policy.
    pub const fn with_busy_policy(mut self, policy: BusyPolicy) -> Self {
        self.busy_policy = policy;
        self
    }

    /// Sets the strobe-ack retransmission chance, clamped to 100.
    pub const fn with_strobe_ack_retx(mut self, percent: u8) -> Self {
        self.strobe_ack_retx_percent = if percent > 100 { 100 } else { percent };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_from_default_rate() {
        let timing = TimingConfig::default();
        assert_eq!(timing.on_time(), 5_000);
        assert_eq!(timing.off_time(), 995_000);
        assert_eq!(timing.strobe_time(), 1_000_000);
        assert_eq!(timing.strobe_wait_time(), 5_000);
        assert_eq!(timing.master_packet_wait(), 25_000);
        assert_eq!(timing.backoff(), 10_000);
    }

    #[test]
    fn test_timing_from_faster_rate() {
        let timing = TimingConfig::from_check_rate(8);
        assert_eq!(timing.period(), 125_000);
        assert_eq!(timing.on_time(), 625);
        assert_eq!(timing.off_time(), 124_375);
        assert_eq!(timing.strobe_time(), timing.period());
    }

    #[test]
    fn test_timing_clamps_degenerate_rates() {
        let zero = TimingConfig::from_check_rate(0);
        assert_eq!(zero, TimingConfig::from_check_rate(1));

        let huge = TimingConfig::from_check_rate(u32::MAX);
        assert_eq!(huge.on_time(), 1);
        assert_eq!(huge.off_time(), 1);
        assert!(huge.strobe_wait_time() > 0);
    }

    #[test]
    fn test_config_builders() {
        let config = SofaConfig::new(Address::new(1, 2))
            .with_backoff(false)
            .with_busy_policy(BusyPolicy::SleepOnBusy)
            .with_strobe_ack_retx(250);
        assert_eq!(config.address, Address::new(1, 2));
        assert!(!config.use_backoff);
        assert_eq!(config.busy_policy, BusyPolicy::SleepOnBusy);
        assert_eq!(config.strobe_ack_retx_percent, 100);
    }
}
