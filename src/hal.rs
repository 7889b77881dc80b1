//! Collaborator traits the MAC is generic over.
//!
//! The MAC does not own a radio driver, a link header codec, a timer
//! peripheral or a random source. The host supplies them through these traits
//! (and [`Framer`](crate::frame::Framer), [`TimerService`](crate::timer::TimerService)
//! and [`rand_core::RngCore`]), plus the [`Application`] receiving exchange results.

use core::fmt::Debug;

/// Radio transceiver driver.
pub trait Radio {
    /// Driver error type.
    type Error: Debug;

    /// Powers the transceiver up and starts listening.
    fn on(&mut self) -> Result<(), Self::Error>;

    /// Powers the transceiver down.
    fn off(&mut self) -> Result<(), Self::Error>;

    /// Transmits one complete frame.
    fn send(&mut self, frame: &[u8]) -> Result<(), Self::Error>;

    /// Copies the next received frame into `buf` and returns its length.
    ///
    /// Returns [`nb::Error::WouldBlock`] when nothing has been received.
    fn read(&mut self, buf: &mut [u8]) -> nb::Result<usize, Self::Error>;
}

/// Platform fault supervision, suspended for the duration of a strobe burst.
pub trait Watchdog {
    /// Stops supervision.
    fn stop(&mut self);
    /// Restarts supervision.
    fn start(&mut self);
}

/// A [`Watchdog`] for platforms without one.
#[derive(Clone, Copy, Default, Debug)]
pub struct NoWatchdog;

impl Watchdog for NoWatchdog {
    fn stop(&mut self) {}
    fn start(&mut self) {}
}

/// Result of an exchange, reported through [`Application::result`].
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Outcome {
    /// Values were exchanged and acknowledged.
    Success,
    /// The exchange failed: unexpected frame, foreign destination, decode
    /// failure, encode failure or the peer never followed up.
    Error,
    /// The channel was busy during the backoff (sleep-on-busy policy only).
    Busy,
    /// An unexpected frame was heard during the strobe burst.
    Collision,
    /// No neighbor acknowledged the strobe burst.
    NoAck,
}

impl Outcome {
    /// Numeric result code, for applications that log or forward outcomes as integers.
    pub const fn code(&self) -> u16 {
        match self {
            Outcome::Success => 1,
            Outcome::Error => 2,
            Outcome::Busy => 3,
            Outcome::Collision => 4,
            Outcome::NoAck => 5,
        }
    }
}

/// The application bound to the MAC.
///
/// All methods are called synchronously from inside
/// [`on_frame_received`](crate::driver::SofaMac::on_frame_received),
/// [`on_timer`](crate::driver::SofaMac::on_timer) or
/// [`transmit`](crate::driver::SofaMac::transmit), never reentrantly.
/// The provided defaults ignore values, supply `0` and drop results.
pub trait Application {
    /// A peer's value was received.
    fn recv(&mut self, _value: u16) {}

    /// Supplies this node's value when answering as a responder.
    fn pull(&mut self) -> u16 {
        0
    }

    /// An exchange finished.
    fn result(&mut self, _outcome: Outcome) {}
}
