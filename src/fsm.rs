//! Protocol state register and the inbound-frame dispatch table.
//!
//! [`react`] is the whole receive-side protocol as a pure function of the
//! current [`State`], the decoded frame and the local address. The driver
//! executes the returned [`Reaction`]; only it mutates the state.
//!
//! The table is role-agnostic: the same node answers strobes as a responder
//! and completes its own pushes as an initiator through the same match.

use crate::frame::{Address, Body, Inbound};

/// What the node is doing right now. Exactly one value is active at a time.
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum State {
    /// The MAC is shut down; the radio is off and nothing is rescheduled.
    #[default]
    Disabled,
    /// Duty cycling, no exchange in progress. The only state accepting a transmit.
    Idle,
    /// A push is pending; the radio is on and the carrier-sense backoff is running.
    WaitToSend,
    /// Strobing and listening for a strobe acknowledgment.
    WaitSlaveStrobeAck,
    /// Initiator: value sent, waiting for the responder's value.
    WaitSlavePacket,
    /// Responder: strobe acknowledged, waiting for the initiator's value.
    WaitMasterPacket,
    /// Responder: value returned, waiting for the final acknowledgment.
    WaitMasterPacketAck,
}

impl State {
    /// Whether the node is waiting for a peer and has an idle timeout armed.
    pub const fn awaits_peer(&self) -> bool {
        matches!(
            self,
            State::WaitSlavePacket | State::WaitMasterPacket | State::WaitMasterPacketAck
        )
    }
}

/// What the driver must do with an inbound frame.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Reaction {
    /// Nothing to do.
    Ignore,
    /// Acknowledge the strobe and wait for the initiator's value.
    AckStrobe {
        /// Initiator of the strobe.
        master: Address,
    },
    /// Another strobe while already waiting for data: the ack may have been
    /// lost. Re-ack with the configured probability, otherwise give up.
    RepeatStrobeAck {
        /// Initiator of the strobe.
        master: Address,
    },
    /// Responder: deliver the initiator's value and answer with our own.
    ServeMaster {
        /// Initiator's value.
        value: u16,
        /// Initiator to answer.
        master: Address,
    },
    /// Initiator: deliver the responder's value, acknowledge, report success.
    CompleteAsMaster {
        /// Responder's value.
        value: u16,
        /// Responder to acknowledge.
        slave: Address,
    },
    /// Responder: the exchange was acknowledged, report success.
    CompleteAsSlave,
    /// Return to idle with the radio off, reporting an error if `report`.
    Abort {
        /// Whether the application is told [`Outcome::Error`](crate::hal::Outcome::Error).
        report: bool,
    },
}

/// Decides the reaction to `frame` in `state` for the node at `me`.
///
/// The backoff cancellation for [`State::WaitToSend`] is a policy decision
/// taken by the driver before consulting this table.
pub fn react(state: State, frame: &Inbound, me: Address) -> Reaction {
    let sender = frame.header.sender;
    match frame.body {
        Body::Strobe => match state {
            State::Idle => Reaction::AckStrobe { master: sender },
            State::WaitMasterPacket => Reaction::RepeatStrobeAck { master: sender },
            // Only an initiator that lost its peer has an attempt to report.
            State::WaitSlavePacket => Reaction::Abort { report: true },
            State::Disabled
            | State::WaitToSend
            | State::WaitSlaveStrobeAck
            | State::WaitMasterPacketAck => Reaction::Abort { report: false },
        },
        Body::StrobeAck => Reaction::Ignore,
        Body::DataM { dst, .. } | Body::DataS { dst, .. } if dst != me => {
            Reaction::Abort { report: true }
        }
        Body::DataM { value, .. } => match state {
            State::WaitMasterPacket => Reaction::ServeMaster {
                value,
                master: sender,
            },
            _ => Reaction::Abort { report: true },
        },
        Body::DataS { value, .. } => match state {
            State::WaitSlavePacket => Reaction::CompleteAsMaster {
                value,
                slave: sender,
            },
            _ => Reaction::Abort { report: true },
        },
        Body::DataAck => {
            if state == State::WaitMasterPacketAck && frame.header.receiver == me {
                Reaction::CompleteAsSlave
            } else {
                Reaction::Abort { report: true }
            }
        }
        Body::Unknown(_) => Reaction::Abort { report: true },
    }
}
