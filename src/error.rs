//! Error type returned by the MAC's fallible operations.

use thiserror::Error;

use crate::fsm::State;

/// Errors reported by [`SofaMac`](crate::driver::SofaMac).
///
/// Exchange failures detected while processing frames or timers are also
/// delivered to the bound [`Application`](crate::hal::Application) as an
/// [`Outcome`](crate::hal::Outcome); these errors are what the direct caller sees.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Error)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum MacError {
    /// A transmit was requested while the node was not idle.
    #[error("node is busy ({0:?}), transmit rejected")]
    NotIdle(State),
    /// Link header and payload do not fit in the frame buffer.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge {
        /// Length the frame would have had.
        len: usize,
        /// Frame length limit.
        max: usize,
    },
    /// The framer could not create a link header.
    #[error("link header could not be created")]
    HeaderEncode,
    /// An unexpected frame was heard during the strobe burst.
    #[error("collision during strobe burst")]
    Collision,
    /// The strobe burst ran out of time without an acknowledgment.
    #[error("no strobe acknowledgment before the burst deadline")]
    NoAck,
    /// The radio driver reported an error.
    #[error("radio driver error")]
    Radio,
}
