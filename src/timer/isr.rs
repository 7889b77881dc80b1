use crate::driver::SofaMac;
use crate::error::MacError;
use crate::frame::Framer;
use crate::fsm::State;
use crate::hal::{Application, NoWatchdog, Radio, Watchdog};
use crate::timer::{TimerId, TimerService};
use core::cell::RefCell;
use critical_section::Mutex;
use rand_core::RngCore;

/// A [`SofaMac`] shared between the main thread and interrupt handlers.
pub type GlobalSofaMac<R, F, T, N, A, W = NoWatchdog> =
    Mutex<RefCell<Option<SofaMac<R, F, T, N, A, W>>>>;

/// Used to initialize the global static `SofaMac` for use with
/// `critical_section`.
///
/// # Returns
/// * An empty mutable ref-cell
///
/// # Example
/// ```rust,ignore
/// static SOFA_MAC: GlobalSofaMac<MyRadio, AddressFramer, MyAlarms, MyRng, MyApp> =
///     global_sofa_init();
/// ```
pub const fn global_sofa_init<R, F, T, N, A, W>() -> GlobalSofaMac<R, F, T, N, A, W>
where
    R: Radio,
    F: Framer,
    T: TimerService,
    N: RngCore,
    A: Application,
    W: Watchdog,
{
    Mutex::new(RefCell::new(None))
}

/// Installs `mac` in the global slot and starts its duty cycle.
///
/// # Arguments
/// * The global static `SofaMac`
/// * A configured MAC, usually with its application already registered
///
/// # Example
/// ```rust,ignore
/// fn main() {
///     let mut mac = SofaMac::new(radio, AddressFramer, alarms, rng, NoWatchdog, config);
///     mac.register(app);
///     global_sofa_setup(&SOFA_MAC, mac);
/// }
/// ```
pub fn global_sofa_setup<R, F, T, N, A, W>(
    global_mac: &'static GlobalSofaMac<R, F, T, N, A, W>,
    mut mac: SofaMac<R, F, T, N, A, W>,
) where
    R: Radio,
    F: Framer,
    T: TimerService,
    N: RngCore,
    A: Application,
    W: Watchdog,
{
    critical_section::with(|cs| {
        mac.init();
        let _ = global_mac.borrow(cs).replace(Some(mac));
    });
}

/// Delivers an alarm expiry from its interrupt handler.
///
/// # Example
/// ```rust,ignore
/// #[interrupt]
/// fn RTC0() {
///     global_sofa_timer_fired(&SOFA_MAC, TimerId::PowerCycle);
/// }
/// ```
pub fn global_sofa_timer_fired<R, F, T, N, A, W>(
    global_mac: &'static GlobalSofaMac<R, F, T, N, A, W>,
    id: TimerId,
) where
    R: Radio,
    F: Framer,
    T: TimerService,
    N: RngCore,
    A: Application,
    W: Watchdog,
{
    critical_section::with(|cs| {
        if let Some(mac) = global_mac.borrow(cs).borrow_mut().as_mut() {
            mac.on_timer(id);
        }
    });
}

/// Delivers a frame from the radio's receive interrupt.
pub fn global_sofa_frame_received<R, F, T, N, A, W>(
    global_mac: &'static GlobalSofaMac<R, F, T, N, A, W>,
    frame: &[u8],
) where
    R: Radio,
    F: Framer,
    T: TimerService,
    N: RngCore,
    A: Application,
    W: Watchdog,
{
    critical_section::with(|cs| {
        if let Some(mac) = global_mac.borrow(cs).borrow_mut().as_mut() {
            mac.on_frame_received(frame);
        }
    });
}

/// Requests a push of `value` from thread context.
///
/// # Returns
/// * `None` if the MAC has not been set up yet, otherwise the result of
///   [`SofaMac::transmit`]
pub fn global_sofa_transmit<R, F, T, N, A, W>(
    global_mac: &'static GlobalSofaMac<R, F, T, N, A, W>,
    value: u16,
) -> Option<Result<(), MacError>>
where
    R: Radio,
    F: Framer,
    T: TimerService,
    N: RngCore,
    A: Application,
    W: Watchdog,
{
    critical_section::with(|cs| {
        global_mac
            .borrow(cs)
            .borrow_mut()
            .as_mut()
            .map(|mac| mac.transmit(value))
    })
}

/// Current protocol state, or `None` before setup.
pub fn global_sofa_state<R, F, T, N, A, W>(
    global_mac: &'static GlobalSofaMac<R, F, T, N, A, W>,
) -> Option<State>
where
    R: Radio,
    F: Framer,
    T: TimerService,
    N: RngCore,
    A: Application,
    W: Watchdog,
{
    critical_section::with(|cs| global_mac.borrow(cs).borrow().as_ref().map(|mac| mac.state()))
}
