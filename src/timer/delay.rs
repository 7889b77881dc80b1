use crate::driver::SofaMac;
use crate::frame::Framer;
use crate::hal::{Application, Radio, Watchdog};
use crate::timer::TimerService;
use embedded_hal::delay::DelayNs;
use rand_core::RngCore;

/// Services every pending event of `mac`, then sleeps for `poll_us`.
///
/// # Arguments
/// - `mac`: A MAC whose [`TimerService`] reports expiries through
///   [`take_expired()`](TimerService::take_expired), e.g. [`SoftTimers`](crate::timer::SoftTimers).
/// - `delay`: A delay provider implementing `DelayNs`, typically from the HAL.
/// - `poll_us`: Sleep between polls, in microseconds. Keep it well below the
///   on-time or strobes will be missed.
///
/// # Returns
/// - The number of events handled before sleeping.
pub fn sofa_loop_step<D, R, F, T, N, A, W>(
    mac: &mut SofaMac<R, F, T, N, A, W>,
    delay: &mut D,
    poll_us: u32,
) -> usize
where
    D: DelayNs,
    R: Radio,
    F: Framer,
    T: TimerService,
    N: RngCore,
    A: Application,
    W: Watchdog,
{
    let mut handled = 0;
    while mac.poll() {
        handled += 1;
    }
    delay.delay_us(poll_us);
    handled
}

/// Runs a blocking loop that drives the MAC with [`sofa_loop_step`].
///
/// This is a simple polling loop for use in environments where alarm
/// interrupts are unavailable or undesired.
///
/// # Example
/// ```rust,ignore
/// let mut mac = SofaMac::new(radio, AddressFramer, SoftTimers::new(clock), rng, NoWatchdog, config);
/// mac.register(app);
/// mac.init();
/// run_sofa_loop(&mut mac, &mut delay, 100);
/// ```
///
/// # Notes
/// - This loop will never return; it is intended for single-purpose polling firmware.
/// - Transmits must then come from the application's callbacks.
pub fn run_sofa_loop<D, R, F, T, N, A, W>(
    mac: &mut SofaMac<R, F, T, N, A, W>,
    delay: &mut D,
    poll_us: u32,
) -> !
where
    D: DelayNs,
    R: Radio,
    F: Framer,
    T: TimerService,
    N: RngCore,
    A: Application,
    W: Watchdog,
{
    loop {
        let _ = sofa_loop_step(mac, delay, poll_us);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Address, Body};
    use crate::fsm::State;
    use crate::testing::*;
    use embedded_hal_mock::eh1::delay::NoopDelay;

    #[test]
    fn test_loop_step_wakes_and_answers() {
        let clock = SimClock::new(5);
        let mut mac = sim_node(2, &clock, 0);
        let mut delay = NoopDelay::new();
        mac.init();

        assert_eq!(sofa_loop_step(&mut mac, &mut delay, 100), 0);

        clock.advance(u64::from(mac.config().timing.off_time()));
        mac.radio.queue(raw_frame(addr(1), Address::NULL, Body::Strobe));
        assert_eq!(sofa_loop_step(&mut mac, &mut delay, 100), 2);
        assert!(mac.is_radio_on());
        assert_eq!(mac.state(), State::WaitMasterPacket);
    }
}
